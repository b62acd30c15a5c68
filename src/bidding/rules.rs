use crate::models::Case;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Budgets strictly below `below` cost `cost` points
#[derive(Debug, Clone, PartialEq)]
pub struct CostTier {
    pub below: Decimal,
    pub cost: i64,
}

/// Tunable bidding parameters
#[derive(Debug, Clone)]
pub struct BiddingRules {
    /// Bidding closes once this many providers have bid
    pub max_bidders: i32,
    /// Cost when the case has no budget
    pub default_cost: i64,
    /// Ascending budget tiers
    pub cost_tiers: Vec<CostTier>,
    /// Cost for budgets above the last tier
    pub top_cost: i64,
    /// Share of the cost returned to losing bidders, 0..=100
    pub loser_refund_percent: i64,
    /// Points credited to a newly registered provider
    pub signup_bonus: i64,
}

impl Default for BiddingRules {
    fn default() -> Self {
        Self {
            max_bidders: 3,
            default_cost: 10,
            cost_tiers: vec![
                CostTier { below: Decimal::new(250, 0), cost: 5 },
                CostTier { below: Decimal::new(1000, 0), cost: 10 },
                CostTier { below: Decimal::new(5000, 0), cost: 20 },
            ],
            top_cost: 40,
            loser_refund_percent: 50,
            signup_bonus: 20,
        }
    }
}

impl BiddingRules {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bidders <= 0 {
            return Err("BID_MAX_BIDDERS must be greater than 0".to_string());
        }
        if self.default_cost < 0 || self.top_cost < 0 {
            return Err("BID_DEFAULT_COST must not be negative".to_string());
        }
        if !(0..=100).contains(&self.loser_refund_percent) {
            return Err("BID_LOSER_REFUND_PERCENT must be between 0 and 100".to_string());
        }
        if self.signup_bonus < 0 {
            return Err("PROVIDER_SIGNUP_BONUS must not be negative".to_string());
        }
        if self.cost_tiers.windows(2).any(|w| w[0].below >= w[1].below) {
            return Err("Bid cost tiers must be strictly ascending".to_string());
        }
        if self.cost_tiers.iter().any(|t| t.cost < 0) {
            return Err("Bid cost tiers must not be negative".to_string());
        }
        Ok(())
    }

    /// Points needed to bid on a case with this budget
    pub fn cost_for_budget(&self, budget: Option<Decimal>) -> i64 {
        let Some(budget) = budget else {
            return self.default_cost;
        };
        self.cost_tiers
            .iter()
            .find(|tier| budget < tier.below)
            .map(|tier| tier.cost)
            .unwrap_or(self.top_cost)
    }

    pub fn cost_for_case(&self, case: &Case) -> i64 {
        self.cost_for_budget(case.budget)
    }

    /// Refund for a losing bid, rounded down
    pub fn loser_refund(&self, points_spent: i64) -> i64 {
        points_spent * self.loser_refund_percent / 100
    }
}

/// Why a provider may not bid on a case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidRejection {
    CaseNotPending,
    NotOpenForBidding,
    BiddingClosed,
    OwnCase,
    NotAProvider,
    AlreadyBid,
    Declined,
    NoSlotsLeft,
    InsufficientPoints { required: i64, available: i64 },
}

impl BidRejection {
    pub fn code(&self) -> &'static str {
        match self {
            BidRejection::CaseNotPending => "case_not_pending",
            BidRejection::NotOpenForBidding => "not_open_for_bidding",
            BidRejection::BiddingClosed => "bidding_closed",
            BidRejection::OwnCase => "own_case",
            BidRejection::NotAProvider => "not_a_provider",
            BidRejection::AlreadyBid => "already_bid",
            BidRejection::Declined => "declined",
            BidRejection::NoSlotsLeft => "no_slots_left",
            BidRejection::InsufficientPoints { .. } => "insufficient_points",
        }
    }
}

impl fmt::Display for BidRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidRejection::CaseNotPending => write!(f, "Case is no longer pending"),
            BidRejection::NotOpenForBidding => write!(f, "Case is not open for bidding"),
            BidRejection::BiddingClosed => write!(f, "Bidding on this case is closed"),
            BidRejection::OwnCase => write!(f, "You cannot bid on your own case"),
            BidRejection::NotAProvider => write!(f, "Only providers with a profile can bid"),
            BidRejection::AlreadyBid => write!(f, "You have already bid on this case"),
            BidRejection::Declined => write!(f, "You have declined this case"),
            BidRejection::NoSlotsLeft => write!(f, "All bidding slots are taken"),
            BidRejection::InsufficientPoints { required, available } => write!(
                f,
                "Insufficient points: {} required, {} available",
                required, available
            ),
        }
    }
}

/// What the store knows about the bidder at decision time
#[derive(Debug, Clone)]
pub struct BidderSnapshot {
    pub provider_id: Uuid,
    pub has_profile: bool,
    pub points_balance: i64,
    pub has_bid: bool,
    pub has_declined: bool,
}

/// Check every bidding rule; returns the cost on success
pub fn check_eligibility(
    rules: &BiddingRules,
    case: &Case,
    bidder: &BidderSnapshot,
) -> Result<i64, BidRejection> {
    if !case.is_pending() {
        return Err(BidRejection::CaseNotPending);
    }
    if case.is_direct() || !case.bidding_enabled {
        return Err(BidRejection::NotOpenForBidding);
    }
    if case.customer_id == bidder.provider_id {
        return Err(BidRejection::OwnCase);
    }
    if !bidder.has_profile {
        return Err(BidRejection::NotAProvider);
    }
    if bidder.has_bid {
        return Err(BidRejection::AlreadyBid);
    }
    if case.bidding_closed {
        return Err(BidRejection::BiddingClosed);
    }
    if case.current_bidders >= case.max_bidders {
        return Err(BidRejection::NoSlotsLeft);
    }
    if bidder.has_declined {
        return Err(BidRejection::Declined);
    }

    let cost = rules.cost_for_case(case);
    if bidder.points_balance < cost {
        return Err(BidRejection::InsufficientPoints {
            required: cost,
            available: bidder.points_balance,
        });
    }

    Ok(cost)
}

/// `can-bid` answer for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub allowed: bool,
    pub reason: Option<String>,
    pub reason_code: Option<&'static str>,
    pub cost: i64,
    pub points_balance: i64,
    pub remaining_slots: i32,
}

impl Eligibility {
    pub fn evaluate(rules: &BiddingRules, case: &Case, bidder: &BidderSnapshot) -> Self {
        let result = check_eligibility(rules, case, bidder);
        Self {
            allowed: result.is_ok(),
            reason: result.as_ref().err().map(|r| r.to_string()),
            reason_code: result.as_ref().err().map(|r| r.code()),
            cost: rules.cost_for_case(case),
            points_balance: bidder.points_balance,
            remaining_slots: case.remaining_slots(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignmentType, CasePriority, NewCase};

    fn case_with_budget(budget: Option<Decimal>) -> Case {
        NewCase {
            customer_id: Uuid::new_v4(),
            provider_id: None,
            category: "electrician".into(),
            title: "Смяна на табло".into(),
            description: String::new(),
            city: "Варна".into(),
            address: None,
            budget,
            priority: CasePriority::Normal,
            assignment_type: AssignmentType::Open,
            bidding_enabled: true,
            max_bidders: 3,
            preferred_date: None,
        }
        .into_case()
    }

    fn bidder(points: i64) -> BidderSnapshot {
        BidderSnapshot {
            provider_id: Uuid::new_v4(),
            has_profile: true,
            points_balance: points,
            has_bid: false,
            has_declined: false,
        }
    }

    #[test]
    fn test_cost_tiers() {
        let rules = BiddingRules::default();
        assert_eq!(rules.cost_for_budget(None), 10);
        assert_eq!(rules.cost_for_budget(Some(Decimal::new(100, 0))), 5);
        assert_eq!(rules.cost_for_budget(Some(Decimal::new(250, 0))), 10);
        assert_eq!(rules.cost_for_budget(Some(Decimal::new(4999, 0))), 20);
        assert_eq!(rules.cost_for_budget(Some(Decimal::new(12000, 0))), 40);
    }

    #[test]
    fn test_loser_refund_rounds_down() {
        let rules = BiddingRules::default();
        assert_eq!(rules.loser_refund(5), 2);
        assert_eq!(rules.loser_refund(10), 5);

        let none = BiddingRules { loser_refund_percent: 0, ..BiddingRules::default() };
        assert_eq!(none.loser_refund(40), 0);
    }

    #[test]
    fn test_eligible_bidder_pays_tier_cost() {
        let rules = BiddingRules::default();
        let case = case_with_budget(Some(Decimal::new(600, 0)));
        assert_eq!(check_eligibility(&rules, &case, &bidder(10)), Ok(10));
    }

    #[test]
    fn test_insufficient_points() {
        let rules = BiddingRules::default();
        let case = case_with_budget(Some(Decimal::new(600, 0)));
        assert_eq!(
            check_eligibility(&rules, &case, &bidder(9)),
            Err(BidRejection::InsufficientPoints { required: 10, available: 9 })
        );
    }

    #[test]
    fn test_full_case_rejects_bids() {
        let rules = BiddingRules::default();
        let mut case = case_with_budget(None);
        case.current_bidders = 3;
        assert_eq!(check_eligibility(&rules, &case, &bidder(100)), Err(BidRejection::NoSlotsLeft));

        case.bidding_closed = true;
        assert_eq!(check_eligibility(&rules, &case, &bidder(100)), Err(BidRejection::BiddingClosed));
    }

    #[test]
    fn test_customer_cannot_bid_on_own_case() {
        let rules = BiddingRules::default();
        let case = case_with_budget(None);
        let mut own = bidder(100);
        own.provider_id = case.customer_id;
        assert_eq!(check_eligibility(&rules, &case, &own), Err(BidRejection::OwnCase));
    }

    #[test]
    fn test_eligibility_report() {
        let rules = BiddingRules::default();
        let case = case_with_budget(None);
        let mut repeat = bidder(100);
        repeat.has_bid = true;

        let report = Eligibility::evaluate(&rules, &case, &repeat);
        assert!(!report.allowed);
        assert_eq!(report.reason_code, Some("already_bid"));
        assert_eq!(report.cost, 10);
        assert_eq!(report.remaining_slots, 3);
    }

    #[test]
    fn test_rules_validation() {
        assert!(BiddingRules::default().validate().is_ok());
        let bad = BiddingRules { loser_refund_percent: 150, ..BiddingRules::default() };
        assert!(bad.validate().is_err());
    }
}
