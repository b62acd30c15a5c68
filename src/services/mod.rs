pub mod audit;
pub mod auth_service;
pub mod bidding_service;
pub mod case_service;
pub mod chat_service;
pub mod expiry;
pub mod points_service;
pub mod provider_service;
pub mod review_service;

pub use audit::AuditTrailService;
pub use auth_service::{AuthResponse, AuthService, LoginRequest, RegisterRequest};
pub use bidding_service::{BiddingService, PlaceBidRequest};
pub use case_service::{CaseService, CreateCaseRequest};
pub use chat_service::{ChatService, OpenConversationRequest};
pub use expiry::CaseExpirySweeper;
pub use points_service::PointsService;
pub use provider_service::{ProviderDashboard, ProviderService};
pub use review_service::{CreateReviewRequest, ReviewService};

use serde::Deserialize;

/// `?page=&limit=` query; pages start at 1
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page.unwrap_or(1).max(1) - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        let default = Pagination::default();
        assert_eq!(default.limit(), 20);
        assert_eq!(default.offset(), 0);

        let page = Pagination::new(3, 500);
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 200);

        assert_eq!(Pagination::new(0, 0).limit(), 1);
    }
}
