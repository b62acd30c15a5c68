use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Case lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl CaseStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(CaseStatus::Pending),
            "accepted" => Ok(CaseStatus::Accepted),
            "declined" => Ok(CaseStatus::Declined),
            "completed" => Ok(CaseStatus::Completed),
            "cancelled" => Ok(CaseStatus::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Accepted => "accepted",
            CaseStatus::Declined => "declined",
            CaseStatus::Completed => "completed",
            CaseStatus::Cancelled => "cancelled",
        }
    }

    /// Allowed status transitions
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        use CaseStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Declined)
                | (Declined, Pending)
                | (Accepted, Completed)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
        )
    }
}

impl From<CaseStatus> for String {
    fn from(status: CaseStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePriority {
    Normal,
    Urgent,
}

impl CasePriority {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(CasePriority::Normal),
            "urgent" => Ok(CasePriority::Urgent),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CasePriority::Normal => "normal",
            CasePriority::Urgent => "urgent",
        }
    }
}

/// Open cases are visible to every provider; direct cases name one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    Open,
    Direct,
}

impl AssignmentType {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "open" => Ok(AssignmentType::Open),
            "direct" => Ok(AssignmentType::Direct),
            _ => Err(format!("Invalid assignment type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Open => "open",
            AssignmentType::Direct => "direct",
        }
    }
}

/// A customer's service request
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Case {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>, // Target of a direct case, or the assigned provider
    pub category: String,
    pub title: String,
    pub description: String,
    pub city: String,
    pub address: Option<String>,
    pub budget: Option<Decimal>, // NUMERIC(12, 2), BGN
    pub priority: String,
    pub assignment_type: String,
    pub status: String, // Stored as TEXT, use CaseStatus enum for type safety
    pub bidding_enabled: bool,
    pub max_bidders: i32,
    pub current_bidders: i32,
    pub bidding_closed: bool,
    pub winning_bid_id: Option<Uuid>,
    pub preferred_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Case {
    /// Get status as an enum
    pub fn status_enum(&self) -> CaseStatus {
        CaseStatus::from_str(&self.status).unwrap_or(CaseStatus::Pending)
    }

    pub fn assignment_enum(&self) -> AssignmentType {
        AssignmentType::from_str(&self.assignment_type).unwrap_or(AssignmentType::Open)
    }

    pub fn is_pending(&self) -> bool {
        self.status_enum() == CaseStatus::Pending
    }

    pub fn is_direct(&self) -> bool {
        self.assignment_enum() == AssignmentType::Direct
    }

    pub fn remaining_slots(&self) -> i32 {
        (self.max_bidders - self.current_bidders).max(0)
    }

    /// Customer or the provider attached to the case
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.provider_id == Some(user_id)
    }
}

/// Insert payload for a new case
#[derive(Debug, Clone)]
pub struct NewCase {
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub category: String,
    pub title: String,
    pub description: String,
    pub city: String,
    pub address: Option<String>,
    pub budget: Option<Decimal>,
    pub priority: CasePriority,
    pub assignment_type: AssignmentType,
    pub bidding_enabled: bool,
    pub max_bidders: i32,
    pub preferred_date: Option<NaiveDateTime>,
}

impl NewCase {
    pub fn validate(&self) -> Result<(), String> {
        let title_len = self.title.trim().chars().count();
        if !(3..=200).contains(&title_len) {
            return Err("Title must be between 3 and 200 characters".to_string());
        }
        if self.description.chars().count() > 5000 {
            return Err("Description must be at most 5000 characters".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Category is required".to_string());
        }
        if self.city.trim().is_empty() {
            return Err("City is required".to_string());
        }
        if let Some(budget) = self.budget {
            if budget <= Decimal::ZERO {
                return Err("Budget must be greater than zero".to_string());
            }
        }
        match self.assignment_type {
            AssignmentType::Direct if self.provider_id.is_none() => {
                Err("Direct cases must name a provider".to_string())
            }
            AssignmentType::Direct if self.bidding_enabled => {
                Err("Direct cases cannot take bids".to_string())
            }
            AssignmentType::Open if self.provider_id.is_some() => {
                Err("Open cases cannot name a provider".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Materialize a row for adapters that do not generate ids themselves
    pub fn into_case(self) -> Case {
        let now = chrono::Utc::now().naive_utc();
        Case {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            provider_id: self.provider_id,
            category: self.category.trim().to_lowercase(),
            title: self.title.trim().to_string(),
            description: self.description,
            city: self.city.trim().to_string(),
            address: self.address,
            budget: self.budget,
            priority: self.priority.as_str().to_string(),
            assignment_type: self.assignment_type.as_str().to_string(),
            status: CaseStatus::Pending.as_str().to_string(),
            bidding_enabled: self.bidding_enabled,
            max_bidders: self.max_bidders,
            current_bidders: 0,
            bidding_closed: false,
            winning_bid_id: None,
            preferred_date: self.preferred_date,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Listing filter; every field narrows the result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub customer_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        self.status.map_or(true, |s| case.status_enum() == s)
            && self
                .category
                .as_deref()
                .map_or(true, |c| case.category.eq_ignore_ascii_case(c))
            && self.city.as_deref().map_or(true, |c| case.city == c)
            && self.customer_id.map_or(true, |id| case.customer_id == id)
            && self.provider_id.map_or(true, |id| case.provider_id == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_case() -> NewCase {
        NewCase {
            customer_id: Uuid::new_v4(),
            provider_id: None,
            category: "Plumbing".into(),
            title: "Теч в банята".into(),
            description: "Капе под мивката".into(),
            city: "Пловдив".into(),
            address: None,
            budget: Some(Decimal::new(150, 0)),
            priority: CasePriority::Normal,
            assignment_type: AssignmentType::Open,
            bidding_enabled: true,
            max_bidders: 3,
            preferred_date: None,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(CaseStatus::Pending.can_transition_to(CaseStatus::Accepted));
        assert!(CaseStatus::Pending.can_transition_to(CaseStatus::Declined));
        assert!(CaseStatus::Declined.can_transition_to(CaseStatus::Pending));
        assert!(CaseStatus::Accepted.can_transition_to(CaseStatus::Completed));
        assert!(!CaseStatus::Pending.can_transition_to(CaseStatus::Completed));
        assert!(!CaseStatus::Completed.can_transition_to(CaseStatus::Cancelled));
        assert!(!CaseStatus::Declined.can_transition_to(CaseStatus::Cancelled));
        assert!(!CaseStatus::Cancelled.can_transition_to(CaseStatus::Pending));
    }

    #[test]
    fn test_new_case_normalizes_category() {
        let case = open_case().into_case();
        assert_eq!(case.category, "plumbing");
        assert_eq!(case.status, "pending");
        assert!(case.bidding_enabled && !case.bidding_closed);
        assert_eq!(case.remaining_slots(), 3);
    }

    #[test]
    fn test_direct_case_requires_provider() {
        let mut input = open_case();
        input.assignment_type = AssignmentType::Direct;
        input.bidding_enabled = false;
        assert!(input.validate().is_err());

        input.provider_id = Some(Uuid::new_v4());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_short_title_rejected() {
        let mut input = open_case();
        input.title = "ab".into();
        assert!(input.validate().is_err());
    }
}
