use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bid settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Pending,
    Won,
    Lost,
    Refunded,
}

impl BidStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BidStatus::Pending),
            "won" => Ok(BidStatus::Won),
            "lost" => Ok(BidStatus::Lost),
            "refunded" => Ok(BidStatus::Refunded),
            _ => Err(format!("Invalid bid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Won => "won",
            BidStatus::Lost => "lost",
            BidStatus::Refunded => "refunded",
        }
    }
}

/// A provider's priced offer on an open case
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub case_id: Uuid,
    pub provider_id: Uuid,
    pub proposed_price: Decimal, // NUMERIC(12, 2), BGN
    pub message: Option<String>,
    pub estimated_days: Option<i32>,
    pub points_spent: i64,
    pub points_refunded: i64,
    pub status: String, // Stored as TEXT, use BidStatus enum for type safety
    pub created_at: NaiveDateTime,
    pub settled_at: Option<NaiveDateTime>,
}

impl Bid {
    pub fn status_enum(&self) -> BidStatus {
        BidStatus::from_str(&self.status).unwrap_or(BidStatus::Pending)
    }

    pub fn is_pending(&self) -> bool {
        self.status_enum() == BidStatus::Pending
    }
}

/// Bid placement request
#[derive(Debug, Clone)]
pub struct NewBid {
    pub case_id: Uuid,
    pub provider_id: Uuid,
    pub proposed_price: Decimal,
    pub message: Option<String>,
    pub estimated_days: Option<i32>,
}

impl NewBid {
    pub fn validate(&self) -> Result<(), String> {
        if self.proposed_price <= Decimal::ZERO {
            return Err("Proposed price must be greater than zero".to_string());
        }
        if let Some(message) = &self.message {
            if message.chars().count() > 2000 {
                return Err("Bid message must be at most 2000 characters".to_string());
            }
        }
        if let Some(days) = self.estimated_days {
            if days <= 0 {
                return Err("Estimated days must be greater than zero".to_string());
            }
        }
        Ok(())
    }

    /// Materialize a pending row for adapters that do not generate ids themselves
    pub fn into_bid(self, points_spent: i64) -> Bid {
        Bid {
            id: Uuid::new_v4(),
            case_id: self.case_id,
            provider_id: self.provider_id,
            proposed_price: self.proposed_price,
            message: self.message,
            estimated_days: self.estimated_days,
            points_spent,
            points_refunded: 0,
            status: BidStatus::Pending.as_str().to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            settled_at: None,
        }
    }
}
