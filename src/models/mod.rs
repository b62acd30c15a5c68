//! Domain models for the Majstor backend.
//!
//! Database-backed records for users, provider profiles, cases, bids,
//! points bookkeeping, chat and reviews. Status columns are stored as TEXT;
//! each model exposes an enum accessor for type-safe checks.

pub mod bid;
pub mod case;
pub mod conversation;
pub mod points;
pub mod provider_profile;
pub mod review;
pub mod user;

pub use bid::{Bid, BidStatus, NewBid};
pub use case::{AssignmentType, Case, CaseFilter, CasePriority, CaseStatus, NewCase};
pub use conversation::{Conversation, ConversationSummary, Message};
pub use points::{PointsPackage, PointsTransaction, PointsTransactionType};
pub use provider_profile::{ProviderProfile, ProviderProfileInput};
pub use review::{NewReview, Review};
pub use user::{NewUser, User, UserRole};
