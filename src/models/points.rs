//! Points wallet bookkeeping

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Transaction types for points movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsTransactionType {
    Purchase,
    Bonus,
    BidPlaced,
    BidRefund,
}

impl PointsTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Bonus => "bonus",
            Self::BidPlaced => "bid_placed",
            Self::BidRefund => "bid_refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "bonus" => Some(Self::Bonus),
            "bid_placed" => Some(Self::BidPlaced),
            "bid_refund" => Some(Self::BidRefund),
            _ => None,
        }
    }
}

/// Ledger row; `amount` is signed (negative for spending)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub case_id: Option<Uuid>,
    pub bid_id: Option<Uuid>,
    pub transaction_type: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl PointsTransaction {
    pub fn tx_type(&self) -> Option<PointsTransactionType> {
        PointsTransactionType::from_str(&self.transaction_type)
    }
}

/// Purchasable points packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsPackage {
    Small,
    Medium,
    Large,
}

impl PointsPackage {
    pub fn points(&self) -> i64 {
        match self {
            PointsPackage::Small => 50,
            PointsPackage::Medium => 120,
            PointsPackage::Large => 300,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointsPackage::Small => "small",
            PointsPackage::Medium => "medium",
            PointsPackage::Large => "large",
        }
    }
}
