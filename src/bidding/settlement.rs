use super::BiddingRules;
use crate::models::{Bid, BidStatus};
use uuid::Uuid;

/// Final state of one bid after its case closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidSettlement {
    pub bid_id: Uuid,
    pub provider_id: Uuid,
    pub status: BidStatus,
    pub refund: i64,
}

/// Winner keeps nothing back; every other pending bid loses with a partial refund.
/// Bids that are already settled are left out.
pub fn plan_winner_settlement(rules: &BiddingRules, bids: &[Bid], winner_id: Uuid) -> Vec<BidSettlement> {
    bids.iter()
        .filter(|bid| bid.is_pending())
        .map(|bid| {
            if bid.id == winner_id {
                BidSettlement {
                    bid_id: bid.id,
                    provider_id: bid.provider_id,
                    status: BidStatus::Won,
                    refund: 0,
                }
            } else {
                BidSettlement {
                    bid_id: bid.id,
                    provider_id: bid.provider_id,
                    status: BidStatus::Lost,
                    refund: rules.loser_refund(bid.points_spent),
                }
            }
        })
        .collect()
}

/// Cancelled or expired case: every pending bid gets its full cost back
pub fn plan_full_refund(bids: &[Bid]) -> Vec<BidSettlement> {
    bids.iter()
        .filter(|bid| bid.is_pending())
        .map(|bid| BidSettlement {
            bid_id: bid.id,
            provider_id: bid.provider_id,
            status: BidStatus::Refunded,
            refund: bid.points_spent,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBid;
    use rust_decimal::Decimal;

    fn pending_bid(case_id: Uuid, cost: i64) -> Bid {
        NewBid {
            case_id,
            provider_id: Uuid::new_v4(),
            proposed_price: Decimal::new(200, 0),
            message: None,
            estimated_days: None,
        }
        .into_bid(cost)
    }

    #[test]
    fn test_winner_settlement() {
        let rules = BiddingRules::default();
        let case_id = Uuid::new_v4();
        let bids = vec![pending_bid(case_id, 10), pending_bid(case_id, 10), pending_bid(case_id, 5)];

        let plan = plan_winner_settlement(&rules, &bids, bids[1].id);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.iter().filter(|s| s.status == BidStatus::Won).count(), 1);
        assert_eq!(plan[1].refund, 0);
        assert_eq!(plan[0].refund, 5);
        assert_eq!(plan[2].refund, 2);
    }

    #[test]
    fn test_settled_bids_are_skipped() {
        let case_id = Uuid::new_v4();
        let mut bids = vec![pending_bid(case_id, 10), pending_bid(case_id, 10)];
        bids[0].status = BidStatus::Refunded.as_str().to_string();

        let plan = plan_full_refund(&bids);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].bid_id, bids[1].id);
        assert_eq!(plan[0].refund, 10);
    }
}
