//! In-process storage adapter.
//!
//! One async mutex guards the whole state, so every mutating call is
//! serialized the same way the PostgreSQL adapter serializes bidders with
//! row locks. Rows live in insertion-ordered vectors.

use super::{
    BidRepository, CancelledCase, CaseRepository, ChatRepository, PlacedBid, PointsRepository,
    ProviderRepository, ProviderStats, RepoResult, ReviewRepository, UserRepository, WinnerSelection,
    SIGNUP_BONUS_DESCRIPTION,
};
use crate::bidding::{
    check_eligibility, plan_full_refund, plan_winner_settlement, BidSettlement, BidderSnapshot,
    BiddingRules,
};
use crate::error::RepositoryError;
use crate::models::{
    AssignmentType, Bid, BidStatus, Case, CaseFilter, CaseStatus, Conversation, ConversationSummary,
    Message, NewBid, NewCase, NewReview, NewUser, PointsTransaction, PointsTransactionType,
    ProviderProfile, ProviderProfileInput, Review, User,
};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    profiles: HashMap<Uuid, ProviderProfile>,
    cases: Vec<Case>,
    declines: HashSet<(Uuid, Uuid)>,
    bids: Vec<Bid>,
    points: Vec<PointsTransaction>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    reviews: Vec<Review>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

impl MemoryState {
    fn case_mut(&mut self, id: Uuid) -> RepoResult<&mut Case> {
        self.cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Case {} not found", id)))
    }

    fn check_status(case: &Case, from: &[CaseStatus], to: CaseStatus) -> RepoResult<()> {
        let current = case.status_enum();
        if !from.contains(&current) || !current.can_transition_to(to) {
            return Err(RepositoryError::BusinessRule(format!(
                "Cannot move case from {} to {}",
                current.as_str(),
                to.as_str()
            )));
        }
        Ok(())
    }

    /// Apply a signed points change; the wallet may not go below zero
    fn change_points(
        &mut self,
        provider_id: Uuid,
        amount: i64,
        tx_type: PointsTransactionType,
        case_id: Option<Uuid>,
        bid_id: Option<Uuid>,
        description: Option<String>,
    ) -> RepoResult<PointsTransaction> {
        let profile = self
            .profiles
            .get_mut(&provider_id)
            .ok_or_else(|| RepositoryError::NotFound("Provider profile not found".to_string()))?;

        let balance_before = profile.points_balance;
        let balance_after = balance_before + amount;
        if balance_after < 0 {
            return Err(RepositoryError::BusinessRule(format!(
                "Insufficient points: {} required, {} available",
                -amount, balance_before
            )));
        }
        profile.points_balance = balance_after;
        profile.updated_at = now();

        let tx = PointsTransaction {
            id: Uuid::new_v4(),
            provider_id,
            case_id,
            bid_id,
            transaction_type: tx_type.as_str().to_string(),
            amount,
            balance_before,
            balance_after,
            description,
            created_at: now(),
        };
        self.points.push(tx.clone());
        Ok(tx)
    }

    fn apply_settlements(&mut self, case_id: Uuid, settlements: &[BidSettlement]) -> RepoResult<()> {
        let settled_at = now();
        for settlement in settlements {
            if let Some(bid) = self.bids.iter_mut().find(|b| b.id == settlement.bid_id) {
                bid.status = settlement.status.as_str().to_string();
                bid.points_refunded = settlement.refund;
                bid.settled_at = Some(settled_at);
            }
            if settlement.refund > 0 {
                self.change_points(
                    settlement.provider_id,
                    settlement.refund,
                    PointsTransactionType::BidRefund,
                    Some(case_id),
                    Some(settlement.bid_id),
                    Some(format!("Refund for bid ({})", settlement.status.as_str())),
                )?;
            }
        }
        Ok(())
    }

    fn bids_for_case(&self, case_id: Uuid) -> Vec<Bid> {
        self.bids.iter().filter(|b| b.case_id == case_id).cloned().collect()
    }

    fn snapshot(&self, case_id: Uuid, provider_id: Uuid) -> BidderSnapshot {
        let profile = self.profiles.get(&provider_id);
        BidderSnapshot {
            provider_id,
            has_profile: profile.is_some(),
            points_balance: profile.map(|p| p.points_balance).unwrap_or(0),
            has_bid: self
                .bids
                .iter()
                .any(|b| b.case_id == case_id && b.provider_id == provider_id),
            has_declined: self.declines.contains(&(case_id, provider_id)),
        }
    }

    fn is_available_to(&self, case: &Case, provider_id: Uuid) -> bool {
        if !case.is_pending() || case.customer_id == provider_id {
            return false;
        }
        match case.assignment_enum() {
            AssignmentType::Direct => case.provider_id == Some(provider_id),
            AssignmentType::Open => {
                !case.bidding_closed && !self.declines.contains(&(case.id, provider_id))
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepositoryError::Duplicate("Email already registered".to_string()));
        }
        if user.phone.is_some() && state.users.iter().any(|u| u.phone == user.phone) {
            return Err(RepositoryError::Duplicate("Phone already registered".to_string()));
        }
        let user = user.into_user();
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait::async_trait]
impl ProviderRepository for MemoryStore {
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        input: &ProviderProfileInput,
        signup_bonus: i64,
    ) -> RepoResult<ProviderProfile> {
        let mut state = self.state.lock().await;
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(RepositoryError::ConstraintViolation(format!("User {} does not exist", user_id)));
        }
        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.apply_input(input);
            return Ok(profile.clone());
        }

        state
            .profiles
            .insert(user_id, ProviderProfile::from_input(user_id, input));
        if signup_bonus > 0 {
            state.change_points(
                user_id,
                signup_bonus,
                PointsTransactionType::Bonus,
                None,
                None,
                Some(SIGNUP_BONUS_DESCRIPTION.to_string()),
            )?;
        }

        state
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound("Provider profile not found".to_string()))
    }

    async fn find_profile(&self, user_id: Uuid) -> RepoResult<Option<ProviderProfile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(&user_id).cloned())
    }

    async fn search(
        &self,
        category: Option<&str>,
        city: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ProviderProfile>> {
        let state = self.state.lock().await;
        let category = category.map(|c| c.trim().to_lowercase());
        let city = city.map(|c| c.trim().to_lowercase());

        let mut found: Vec<ProviderProfile> = state
            .profiles
            .values()
            .filter(|p| category.as_deref().map_or(true, |c| p.category == c))
            .filter(|p| city.as_deref().map_or(true, |c| p.city.to_lowercase() == c))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.rating_avg
                .cmp(&a.rating_avg)
                .then(b.completed_cases.cmp(&a.completed_cases))
                .then(a.business_name.cmp(&b.business_name))
        });

        Ok(page(found.into_iter(), limit, offset))
    }

    async fn stats(&self, provider_id: Uuid) -> RepoResult<ProviderStats> {
        let state = self.state.lock().await;
        let assigned = |status: CaseStatus| {
            state
                .cases
                .iter()
                .filter(|c| c.provider_id == Some(provider_id) && c.status_enum() == status)
                .count() as i64
        };
        let bids_with = |status: BidStatus| {
            state
                .bids
                .iter()
                .filter(|b| b.provider_id == provider_id && b.status_enum() == status)
                .count() as i64
        };

        Ok(ProviderStats {
            available_cases: state
                .cases
                .iter()
                .filter(|c| state.is_available_to(c, provider_id))
                .count() as i64,
            active_cases: assigned(CaseStatus::Accepted),
            completed_cases: assigned(CaseStatus::Completed),
            pending_bids: bids_with(BidStatus::Pending),
            won_bids: bids_with(BidStatus::Won),
        })
    }
}

#[async_trait::async_trait]
impl PointsRepository for MemoryStore {
    async fn credit(
        &self,
        provider_id: Uuid,
        amount: i64,
        tx_type: PointsTransactionType,
        description: Option<String>,
    ) -> RepoResult<PointsTransaction> {
        if amount <= 0 {
            return Err(RepositoryError::InvalidInput("Credit amount must be positive".to_string()));
        }
        let mut state = self.state.lock().await;
        state.change_points(provider_id, amount, tx_type, None, None, description)
    }

    async fn balance(&self, provider_id: Uuid) -> RepoResult<i64> {
        let state = self.state.lock().await;
        state
            .profiles
            .get(&provider_id)
            .map(|p| p.points_balance)
            .ok_or_else(|| RepositoryError::NotFound("Provider profile not found".to_string()))
    }

    async fn history(&self, provider_id: Uuid, limit: i64) -> RepoResult<Vec<PointsTransaction>> {
        let state = self.state.lock().await;
        Ok(page(
            state.points.iter().rev().filter(|t| t.provider_id == provider_id).cloned(),
            limit,
            0,
        ))
    }
}

#[async_trait::async_trait]
impl CaseRepository for MemoryStore {
    async fn create_case(&self, case: NewCase) -> RepoResult<Case> {
        let mut state = self.state.lock().await;
        let case = case.into_case();
        state.cases.push(case.clone());
        Ok(case)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Case>> {
        let state = self.state.lock().await;
        Ok(state.cases.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, filter: &CaseFilter) -> RepoResult<Vec<Case>> {
        let state = self.state.lock().await;
        Ok(page(
            state.cases.iter().rev().filter(|c| filter.matches(c)).cloned(),
            filter.limit,
            filter.offset,
        ))
    }

    async fn list_available(&self, provider_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<Case>> {
        let state = self.state.lock().await;
        Ok(page(
            state
                .cases
                .iter()
                .rev()
                .filter(|c| state.is_available_to(c, provider_id))
                .cloned(),
            limit,
            offset,
        ))
    }

    async fn transition(&self, id: Uuid, from: &[CaseStatus], to: CaseStatus) -> RepoResult<Case> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(id)?;
        MemoryState::check_status(case, from, to)?;
        case.status = to.as_str().to_string();
        case.updated_at = now();
        Ok(case.clone())
    }

    async fn assign(&self, id: Uuid, provider_id: Uuid) -> RepoResult<Case> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(id)?;
        MemoryState::check_status(case, &[CaseStatus::Pending], CaseStatus::Accepted)?;
        case.status = CaseStatus::Accepted.as_str().to_string();
        case.provider_id = Some(provider_id);
        case.bidding_closed = true;
        case.updated_at = now();
        Ok(case.clone())
    }

    async fn complete(&self, id: Uuid) -> RepoResult<Case> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(id)?;
        MemoryState::check_status(case, &[CaseStatus::Accepted], CaseStatus::Completed)?;
        let completed_at = now();
        case.status = CaseStatus::Completed.as_str().to_string();
        case.completed_at = Some(completed_at);
        case.updated_at = completed_at;
        let case = case.clone();

        if let Some(profile) = case.provider_id.and_then(|p| state.profiles.get_mut(&p)) {
            profile.completed_cases += 1;
            profile.updated_at = completed_at;
        }
        Ok(case)
    }

    async fn cancel(&self, id: Uuid, from: &[CaseStatus]) -> RepoResult<CancelledCase> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(id)?;
        MemoryState::check_status(case, from, CaseStatus::Cancelled)?;
        case.status = CaseStatus::Cancelled.as_str().to_string();
        case.bidding_closed = true;
        case.updated_at = now();
        let case = case.clone();

        let refunds = plan_full_refund(&state.bids_for_case(id));
        state.apply_settlements(id, &refunds)?;
        Ok(CancelledCase { case, refunds })
    }

    async fn add_decline(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        state.case_mut(case_id)?;
        state.declines.insert((case_id, provider_id));
        Ok(())
    }

    async fn remove_decline(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.declines.remove(&(case_id, provider_id)))
    }

    async fn has_declined(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<bool> {
        let state = self.state.lock().await;
        Ok(state.declines.contains(&(case_id, provider_id)))
    }

    async fn find_stale(&self, created_before: NaiveDateTime, limit: i64) -> RepoResult<Vec<Case>> {
        let state = self.state.lock().await;
        let mut stale: Vec<Case> = state
            .cases
            .iter()
            .filter(|c| c.is_pending() && c.created_at < created_before)
            .cloned()
            .collect();
        stale.sort_by_key(|c| c.created_at);
        Ok(page(stale.into_iter(), limit, 0))
    }
}

#[async_trait::async_trait]
impl BidRepository for MemoryStore {
    async fn place_bid(&self, bid: NewBid, rules: &BiddingRules) -> RepoResult<PlacedBid> {
        let mut state = self.state.lock().await;
        let case = state
            .cases
            .iter()
            .find(|c| c.id == bid.case_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Case {} not found", bid.case_id)))?;

        let snapshot = state.snapshot(case.id, bid.provider_id);
        let cost = check_eligibility(rules, &case, &snapshot)
            .map_err(|rejection| RepositoryError::BusinessRule(rejection.to_string()))?;

        let bid = bid.into_bid(cost);
        let charge = state.change_points(
            bid.provider_id,
            -cost,
            PointsTransactionType::BidPlaced,
            Some(case.id),
            Some(bid.id),
            Some(format!("Bid on case: {}", case.title)),
        )?;
        state.bids.push(bid.clone());

        let case = state.case_mut(bid.case_id)?;
        case.current_bidders += 1;
        if case.current_bidders >= case.max_bidders {
            case.bidding_closed = true;
        }
        case.updated_at = now();

        Ok(PlacedBid {
            bid,
            case: case.clone(),
            points_balance: charge.balance_after,
        })
    }

    async fn list_for_case(&self, case_id: Uuid) -> RepoResult<Vec<Bid>> {
        let state = self.state.lock().await;
        Ok(state.bids_for_case(case_id))
    }

    async fn list_for_provider(&self, provider_id: Uuid) -> RepoResult<Vec<Bid>> {
        let state = self.state.lock().await;
        Ok(state
            .bids
            .iter()
            .rev()
            .filter(|b| b.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn snapshot(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<BidderSnapshot> {
        let state = self.state.lock().await;
        Ok(state.snapshot(case_id, provider_id))
    }

    async fn select_winner(&self, case_id: Uuid, bid_id: Uuid, rules: &BiddingRules) -> RepoResult<WinnerSelection> {
        let mut state = self.state.lock().await;
        let case = state.case_mut(case_id)?;
        MemoryState::check_status(case, &[CaseStatus::Pending], CaseStatus::Accepted)?;

        let bids = state.bids_for_case(case_id);
        let winner = bids
            .iter()
            .find(|b| b.id == bid_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Bid {} not found on this case", bid_id)))?;
        if !winner.is_pending() {
            return Err(RepositoryError::BusinessRule("Bid is already settled".to_string()));
        }

        let settlements = plan_winner_settlement(rules, &bids, bid_id);
        state.apply_settlements(case_id, &settlements)?;

        let case = state.case_mut(case_id)?;
        case.status = CaseStatus::Accepted.as_str().to_string();
        case.provider_id = Some(winner.provider_id);
        case.winning_bid_id = Some(winner.id);
        case.bidding_closed = true;
        case.updated_at = now();
        let case = case.clone();

        let winner = state
            .bids
            .iter()
            .find(|b| b.id == bid_id)
            .cloned()
            .unwrap_or(winner);

        Ok(WinnerSelection { case, winner, settlements })
    }
}

#[async_trait::async_trait]
impl ChatRepository for MemoryStore {
    async fn find_or_create_conversation(
        &self,
        customer_id: Uuid,
        provider_id: Uuid,
        case_id: Option<Uuid>,
    ) -> RepoResult<Conversation> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.conversations.iter().find(|c| {
            c.customer_id == customer_id && c.provider_id == provider_id && c.case_id == case_id
        }) {
            return Ok(existing.clone());
        }
        let conversation = Conversation::new(customer_id, provider_id, case_id);
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: Uuid) -> RepoResult<Option<Conversation>> {
        let state = self.state.lock().await;
        Ok(state.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<ConversationSummary>> {
        let state = self.state.lock().await;
        let mut mine: Vec<ConversationSummary> = state
            .conversations
            .iter()
            .rev()
            .filter(|c| c.is_participant(user_id))
            .map(|c| ConversationSummary {
                conversation: c.clone(),
                unread_count: state
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == c.id && m.sender_id != user_id && m.read_at.is_none())
                    .count() as i64,
            })
            .collect();
        mine.sort_by(|a, b| b.conversation.last_message_at.cmp(&a.conversation.last_message_at));
        Ok(page(mine.into_iter(), limit, offset))
    }

    async fn add_message(&self, message: Message) -> RepoResult<Message> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
            .ok_or_else(|| RepositoryError::NotFound("Conversation not found".to_string()))?;
        conversation.last_message_at = message.created_at;
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        before: Option<NaiveDateTime>,
        limit: i64,
    ) -> RepoResult<Vec<Message>> {
        let state = self.state.lock().await;
        let matching: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| before.map_or(true, |b| m.created_at < b))
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit.max(0) as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> RepoResult<u64> {
        let mut state = self.state.lock().await;
        let read_at = now();
        let mut changed = 0;
        for message in state.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id && m.sender_id != reader_id && m.read_at.is_none()
        }) {
            message.read_at = Some(read_at);
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait::async_trait]
impl ReviewRepository for MemoryStore {
    async fn create_review(&self, review: NewReview) -> RepoResult<Review> {
        let mut state = self.state.lock().await;
        if state.reviews.iter().any(|r| r.case_id == review.case_id) {
            return Err(RepositoryError::Duplicate("Case already reviewed".to_string()));
        }
        let review = review.into_review();
        state.reviews.push(review.clone());

        let ratings: Vec<i64> = state
            .reviews
            .iter()
            .filter(|r| r.provider_id == review.provider_id)
            .map(|r| r.rating as i64)
            .collect();
        if let Some(profile) = state.profiles.get_mut(&review.provider_id) {
            let count = ratings.len() as i64;
            let sum: i64 = ratings.iter().sum();
            profile.review_count = count as i32;
            profile.rating_avg = (Decimal::from(sum) / Decimal::from(count)).round_dp(2);
            profile.updated_at = now();
        }
        Ok(review)
    }

    async fn find_by_case(&self, case_id: Uuid) -> RepoResult<Option<Review>> {
        let state = self.state.lock().await;
        Ok(state.reviews.iter().find(|r| r.case_id == case_id).cloned())
    }

    async fn list_for_provider(&self, provider_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<Review>> {
        let state = self.state.lock().await;
        Ok(page(
            state.reviews.iter().rev().filter(|r| r.provider_id == provider_id).cloned(),
            limit,
            offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CasePriority, UserRole};

    async fn provider(store: &MemoryStore, points: i64) -> Uuid {
        let user = store
            .create_user(NewUser {
                email: format!("{}@majstor.bg", Uuid::new_v4()),
                phone: None,
                full_name: "Георги Майстора".into(),
                role: UserRole::Provider,
                city: None,
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        store
            .upsert_profile(
                user.id,
                &ProviderProfileInput {
                    business_name: "ВиК Георги".into(),
                    category: "plumbing".into(),
                    city: "София".into(),
                    description: None,
                    experience_years: 5,
                    hourly_rate: None,
                },
                0,
            )
            .await
            .unwrap();
        if points > 0 {
            store
                .credit(user.id, points, PointsTransactionType::Purchase, None)
                .await
                .unwrap();
        }
        user.id
    }

    fn open_case(customer_id: Uuid, max_bidders: i32) -> NewCase {
        NewCase {
            customer_id,
            provider_id: None,
            category: "plumbing".into(),
            title: "Смяна на смесител".into(),
            description: String::new(),
            city: "София".into(),
            address: None,
            budget: None,
            priority: CasePriority::Normal,
            assignment_type: AssignmentType::Open,
            bidding_enabled: true,
            max_bidders,
            preferred_date: None,
        }
    }

    fn bid_on(case_id: Uuid, provider_id: Uuid) -> NewBid {
        NewBid {
            case_id,
            provider_id,
            proposed_price: Decimal::new(120, 0),
            message: None,
            estimated_days: Some(2),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let new_user = || NewUser {
            email: "maria@abv.bg".into(),
            phone: None,
            full_name: "Мария".into(),
            role: UserRole::Customer,
            city: None,
            password_hash: "x".into(),
        };
        store.create_user(new_user()).await.unwrap();
        let err = store.create_user(new_user()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_signup_bonus_only_on_first_profile() {
        let store = MemoryStore::new();
        let id = provider(&store, 0).await;
        let fresh = store
            .create_user(NewUser {
                email: "nov@majstor.bg".into(),
                phone: None,
                full_name: "Нов Майстор".into(),
                role: UserRole::Provider,
                city: None,
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        let input = ProviderProfileInput {
            business_name: "Електро Нов".into(),
            category: "electrical".into(),
            city: "Пловдив".into(),
            description: None,
            experience_years: 2,
            hourly_rate: None,
        };

        let created = store.upsert_profile(fresh.id, &input, 20).await.unwrap();
        assert_eq!(created.points_balance, 20);
        let updated = store.upsert_profile(fresh.id, &input, 20).await.unwrap();
        assert_eq!(updated.points_balance, 20);

        let history = store.history(fresh.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].description.as_deref(), Some(SIGNUP_BONUS_DESCRIPTION));

        // Existing profiles never pick up a late bonus
        let existing = store.upsert_profile(id, &input, 20).await.unwrap();
        assert_eq!(existing.points_balance, 0);
    }

    #[tokio::test]
    async fn test_bid_closes_case_at_capacity() {
        let store = MemoryStore::new();
        let rules = BiddingRules::default();
        let case = store.create_case(open_case(Uuid::new_v4(), 1)).await.unwrap();
        let first = provider(&store, 50).await;
        let second = provider(&store, 50).await;

        let placed = store.place_bid(bid_on(case.id, first), &rules).await.unwrap();
        assert_eq!(placed.case.current_bidders, 1);
        assert!(placed.case.bidding_closed);
        assert_eq!(placed.points_balance, 40);

        let err = store.place_bid(bid_on(case.id, second), &rules).await.unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRule(_)));
        assert_eq!(store.balance(second).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_failed_bid_leaves_no_trace() {
        let store = MemoryStore::new();
        let rules = BiddingRules::default();
        let case = store.create_case(open_case(Uuid::new_v4(), 3)).await.unwrap();
        let poor = provider(&store, 3).await;

        assert!(store.place_bid(bid_on(case.id, poor), &rules).await.is_err());
        assert!(store.list_for_case(case.id).await.unwrap().is_empty());
        let case = CaseRepository::find_by_id(&store, case.id).await.unwrap().unwrap();
        assert_eq!(case.current_bidders, 0);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let case = store.create_case(open_case(Uuid::new_v4(), 3)).await.unwrap();

        store.assign(case.id, Uuid::new_v4()).await.unwrap();
        let err = store.assign(case.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_review_updates_rating() {
        let store = MemoryStore::new();
        let provider_id = provider(&store, 0).await;
        for rating in [5, 4] {
            store
                .create_review(NewReview {
                    case_id: Uuid::new_v4(),
                    customer_id: Uuid::new_v4(),
                    provider_id,
                    rating,
                    comment: None,
                })
                .await
                .unwrap();
        }
        let profile = store.find_profile(provider_id).await.unwrap().unwrap();
        assert_eq!(profile.review_count, 2);
        assert_eq!(profile.rating_avg, Decimal::new(450, 2));
    }
}
