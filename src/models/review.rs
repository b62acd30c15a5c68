use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer feedback on a completed case
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub case_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub case_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.rating) {
            return Err("Rating must be between 1 and 5".to_string());
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > 2000 {
                return Err("Comment must be at most 2000 characters".to_string());
            }
        }
        Ok(())
    }

    pub fn into_review(self) -> Review {
        Review {
            id: Uuid::new_v4(),
            case_id: self.case_id,
            customer_id: self.customer_id,
            provider_id: self.provider_id,
            rating: self.rating,
            comment: self.comment,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
