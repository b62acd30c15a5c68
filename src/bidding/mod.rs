//! Points-based bidding rules.
//!
//! Pure functions shared by every storage adapter: bid pricing, bidder
//! eligibility and the settlement plan applied when a case closes.

pub mod rules;
pub mod settlement;

pub use rules::{check_eligibility, BidRejection, BidderSnapshot, BiddingRules, CostTier, Eligibility};
pub use settlement::{plan_full_refund, plan_winner_settlement, BidSettlement};
