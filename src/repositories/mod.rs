//! Storage seam.
//!
//! Services only see these traits. Two adapters implement them: PostgreSQL
//! (row locks inside transactions) and an in-process store used for local
//! runs and tests. Bidding decisions come from `crate::bidding` in both.

pub mod memory;
pub mod postgres;

use crate::bidding::{BidSettlement, BidderSnapshot, BiddingRules};
use crate::error::RepositoryError;
use crate::models::{
    Bid, Case, CaseFilter, CaseStatus, Conversation, ConversationSummary, Message, NewBid, NewCase,
    NewReview, NewUser, PointsTransaction, PointsTransactionType, ProviderProfile,
    ProviderProfileInput, Review, User,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::{
    PgBidRepository, PgCaseRepository, PgChatRepository, PgPointsRepository, PgProviderRepository,
    PgReviewRepository, PgUserRepository,
};

pub type RepoResult<T> = Result<T, RepositoryError>;

pub const SIGNUP_BONUS_DESCRIPTION: &str = "Signup bonus";

/// Result of a successful bid placement
#[derive(Debug, Clone, Serialize)]
pub struct PlacedBid {
    pub bid: Bid,
    pub case: Case,
    pub points_balance: i64,
}

/// Result of picking a winning bid
#[derive(Debug, Clone, Serialize)]
pub struct WinnerSelection {
    pub case: Case,
    pub winner: Bid,
    #[serde(skip)]
    pub settlements: Vec<BidSettlement>,
}

/// Result of cancelling a case
#[derive(Debug, Clone)]
pub struct CancelledCase {
    pub case: Case,
    pub refunds: Vec<BidSettlement>,
}

/// Provider dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub available_cases: i64,
    pub active_cases: i64,
    pub completed_cases: i64,
    pub pending_bids: i64,
    pub won_bids: i64,
}

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` when the email or phone is taken
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
}

#[async_trait::async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Create the profile or overwrite its editable fields. A newly created
    /// profile is credited `signup_bonus` points in the same write.
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        input: &ProviderProfileInput,
        signup_bonus: i64,
    ) -> RepoResult<ProviderProfile>;

    async fn find_profile(&self, user_id: Uuid) -> RepoResult<Option<ProviderProfile>>;

    /// Ordered by rating, then completed cases
    async fn search(
        &self,
        category: Option<&str>,
        city: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ProviderProfile>>;

    async fn stats(&self, provider_id: Uuid) -> RepoResult<ProviderStats>;
}

#[async_trait::async_trait]
pub trait PointsRepository: Send + Sync {
    /// Add points to a wallet and record the ledger row
    async fn credit(
        &self,
        provider_id: Uuid,
        amount: i64,
        tx_type: PointsTransactionType,
        description: Option<String>,
    ) -> RepoResult<PointsTransaction>;

    async fn balance(&self, provider_id: Uuid) -> RepoResult<i64>;

    /// Newest first
    async fn history(&self, provider_id: Uuid, limit: i64) -> RepoResult<Vec<PointsTransaction>>;
}

#[async_trait::async_trait]
pub trait CaseRepository: Send + Sync {
    async fn create_case(&self, case: NewCase) -> RepoResult<Case>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Case>>;

    /// Newest first
    async fn list(&self, filter: &CaseFilter) -> RepoResult<Vec<Case>>;

    /// Pending cases a provider can act on
    async fn list_available(&self, provider_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<Case>>;

    /// Compare-and-set on status; `BusinessRule` when the current status is not in `from`
    async fn transition(&self, id: Uuid, from: &[CaseStatus], to: CaseStatus) -> RepoResult<Case>;

    /// pending -> accepted with the provider attached
    async fn assign(&self, id: Uuid, provider_id: Uuid) -> RepoResult<Case>;

    /// accepted -> completed, bumps the provider's completed counter
    async fn complete(&self, id: Uuid) -> RepoResult<Case>;

    /// Cancel and refund every pending bid in full
    async fn cancel(&self, id: Uuid, from: &[CaseStatus]) -> RepoResult<CancelledCase>;

    /// Idempotent
    async fn add_decline(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<()>;

    /// Returns whether a decline existed
    async fn remove_decline(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<bool>;

    async fn has_declined(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<bool>;

    /// Pending cases created before the cutoff, oldest first
    async fn find_stale(&self, created_before: NaiveDateTime, limit: i64) -> RepoResult<Vec<Case>>;
}

#[async_trait::async_trait]
pub trait BidRepository: Send + Sync {
    /// Re-checks eligibility under lock, charges the cost and inserts the bid
    async fn place_bid(&self, bid: NewBid, rules: &BiddingRules) -> RepoResult<PlacedBid>;

    /// First come first
    async fn list_for_case(&self, case_id: Uuid) -> RepoResult<Vec<Bid>>;

    /// Newest first
    async fn list_for_provider(&self, provider_id: Uuid) -> RepoResult<Vec<Bid>>;

    async fn snapshot(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<BidderSnapshot>;

    /// Settle every pending bid and hand the case to the winner
    async fn select_winner(&self, case_id: Uuid, bid_id: Uuid, rules: &BiddingRules) -> RepoResult<WinnerSelection>;
}

#[async_trait::async_trait]
pub trait ChatRepository: Send + Sync {
    /// Idempotent per (customer, provider, case)
    async fn find_or_create_conversation(
        &self,
        customer_id: Uuid,
        provider_id: Uuid,
        case_id: Option<Uuid>,
    ) -> RepoResult<Conversation>;

    async fn find_conversation(&self, id: Uuid) -> RepoResult<Option<Conversation>>;

    /// Newest activity first, with the user's unread count
    async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<ConversationSummary>>;

    async fn add_message(&self, message: Message) -> RepoResult<Message>;

    /// Chronological; `before` pages backwards
    async fn list_messages(
        &self,
        conversation_id: Uuid,
        before: Option<NaiveDateTime>,
        limit: i64,
    ) -> RepoResult<Vec<Message>>;

    /// Marks messages not sent by `reader_id` as read; returns how many changed
    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> RepoResult<u64>;
}

#[async_trait::async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Inserts the review and recomputes the provider's rating
    async fn create_review(&self, review: NewReview) -> RepoResult<Review>;

    async fn find_by_case(&self, case_id: Uuid) -> RepoResult<Option<Review>>;

    async fn list_for_provider(&self, provider_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<Review>>;
}

/// Every repository behind one handle
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub providers: Arc<dyn ProviderRepository>,
    pub points: Arc<dyn PointsRepository>,
    pub cases: Arc<dyn CaseRepository>,
    pub bids: Arc<dyn BidRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            providers: Arc::new(PgProviderRepository::new(pool.clone())),
            points: Arc::new(PgPointsRepository::new(pool.clone())),
            cases: Arc::new(PgCaseRepository::new(pool.clone())),
            bids: Arc::new(PgBidRepository::new(pool.clone())),
            chat: Arc::new(PgChatRepository::new(pool.clone())),
            reviews: Arc::new(PgReviewRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(MemoryStore::new())
    }

    pub fn from_store(store: MemoryStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            providers: Arc::new(store.clone()),
            points: Arc::new(store.clone()),
            cases: Arc::new(store.clone()),
            bids: Arc::new(store.clone()),
            chat: Arc::new(store.clone()),
            reviews: Arc::new(store),
        }
    }
}
