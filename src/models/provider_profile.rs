use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public profile and points wallet of a provider (tradesperson)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProviderProfile {
    pub user_id: Uuid,
    pub business_name: String,
    pub category: String,
    pub city: String,
    pub description: Option<String>,
    pub experience_years: i32,
    pub hourly_rate: Option<Decimal>, // NUMERIC(10, 2), BGN
    pub points_balance: i64,
    pub rating_avg: Decimal, // NUMERIC(3, 2)
    pub review_count: i32,
    pub completed_cases: i32,
    pub updated_at: NaiveDateTime,
}

/// Editable part of a provider profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfileInput {
    pub business_name: String,
    pub category: String,
    pub city: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub experience_years: i32,
    #[serde(default)]
    pub hourly_rate: Option<Decimal>,
}

impl ProviderProfileInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.business_name.trim().is_empty() {
            return Err("Business name is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Category is required".to_string());
        }
        if self.city.trim().is_empty() {
            return Err("City is required".to_string());
        }
        if self.experience_years < 0 {
            return Err("Experience years cannot be negative".to_string());
        }
        if let Some(rate) = self.hourly_rate {
            if rate <= Decimal::ZERO {
                return Err("Hourly rate must be greater than zero".to_string());
            }
        }
        Ok(())
    }

    /// Category slugs are compared case-insensitively
    pub fn normalized_category(&self) -> String {
        self.category.trim().to_lowercase()
    }
}

impl ProviderProfile {
    /// Fresh profile with an empty wallet
    pub fn from_input(user_id: Uuid, input: &ProviderProfileInput) -> Self {
        Self {
            user_id,
            business_name: input.business_name.trim().to_string(),
            category: input.normalized_category(),
            city: input.city.trim().to_string(),
            description: input.description.clone(),
            experience_years: input.experience_years,
            hourly_rate: input.hourly_rate,
            points_balance: 0,
            rating_avg: Decimal::ZERO,
            review_count: 0,
            completed_cases: 0,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Overwrite editable fields, keeping wallet and reputation
    pub fn apply_input(&mut self, input: &ProviderProfileInput) {
        self.business_name = input.business_name.trim().to_string();
        self.category = input.normalized_category();
        self.city = input.city.trim().to_string();
        self.description = input.description.clone();
        self.experience_years = input.experience_years;
        self.hourly_rate = input.hourly_rate;
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}
