mod helpers;

use helpers::*;
use majstor_backend::auth::AuthUser;
use majstor_backend::config::AppConfig;
use majstor_backend::error::AppError;
use majstor_backend::models::*;
use majstor_backend::repositories::{MemoryStore, Repositories, UserRepository};
use majstor_backend::services::AuditTrailService;
use majstor_backend::websocket::WebSocketServer;
use majstor_backend::AppState;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_place_bid_charges_points_and_counts_bidder() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_open_case(&state, &customer).await;

    assert_eq!(state.points.balance(&provider).await.unwrap(), 20);

    let placed = state
        .bidding
        .place_bid(&provider, case.id, bid_request(120))
        .await
        .unwrap();

    assert_eq!(placed.bid.points_spent, 5);
    assert_eq!(placed.points_balance, 15);
    assert_eq!(placed.case.current_bidders, 1);
    assert!(!placed.case.bidding_closed);
    assert_eq!(state.points.balance(&provider).await.unwrap(), 15);

    let history = state.points.history(&provider, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].transaction_type, "bid_placed");
    assert_eq!(history[0].amount, -5);
}

#[tokio::test]
async fn test_bidding_closes_at_max_bidders() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;

    for i in 0..3 {
        let provider = register_provider(&state).await;
        let placed = state
            .bidding
            .place_bid(&provider, case.id, bid_request(100 + i))
            .await
            .unwrap();
        assert_eq!(placed.case.current_bidders, i as i32 + 1);
    }

    let case = state.cases.get_case(case.id).await.unwrap();
    assert_eq!(case.current_bidders, 3);
    assert!(case.bidding_closed);

    let late = register_provider(&state).await;
    let eligibility = state.bidding.can_bid(&late, case.id).await.unwrap();
    assert!(!eligibility.allowed);
    assert_eq!(eligibility.reason_code, Some("bidding_closed"));

    let result = state.bidding.place_bid(&late, case.id, bid_request(90)).await;
    assert!(matches!(result, Err(AppError::BusinessLogic(_))));
    assert_eq!(state.points.balance(&late).await.unwrap(), 20);
}

#[tokio::test]
async fn test_duplicate_bid_rejected() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_open_case(&state, &customer).await;

    assert_ok!(state.bidding.place_bid(&provider, case.id, bid_request(120)).await);
    let second = assert_err!(state.bidding.place_bid(&provider, case.id, bid_request(110)).await);

    assert!(matches!(second, AppError::BusinessLogic(_)));
    assert_eq!(state.points.balance(&provider).await.unwrap(), 15);
    assert_eq!(state.cases.get_case(case.id).await.unwrap().current_bidders, 1);
}

#[tokio::test]
async fn test_insufficient_points_leaves_balance_untouched() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;

    // Top tier costs 40 points, more than the signup bonus
    let case = state
        .cases
        .create_case(&customer, case_request(Some(8000)))
        .await
        .unwrap();

    let eligibility = state.bidding.can_bid(&provider, case.id).await.unwrap();
    assert!(!eligibility.allowed);
    assert_eq!(eligibility.cost, 40);
    assert_eq!(eligibility.reason_code, Some("insufficient_points"));

    let result = state.bidding.place_bid(&provider, case.id, bid_request(7000)).await;
    assert!(result.is_err());
    assert_eq!(state.points.balance(&provider).await.unwrap(), 20);
    assert_eq!(state.cases.get_case(case.id).await.unwrap().current_bidders, 0);
}

#[tokio::test]
async fn test_customers_cannot_bid() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let other = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;

    let result = state.bidding.place_bid(&other, case.id, bid_request(100)).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_select_winner_refunds_losers() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;
    let winner = register_provider(&state).await;
    let loser = register_provider(&state).await;

    let winning = state
        .bidding
        .place_bid(&winner, case.id, bid_request(100))
        .await
        .unwrap();
    state
        .bidding
        .place_bid(&loser, case.id, bid_request(130))
        .await
        .unwrap();

    let selection = state
        .bidding
        .select_winner(&customer, case.id, winning.bid.id)
        .await
        .unwrap();

    assert_eq!(selection.case.status, "accepted");
    assert_eq!(selection.case.provider_id, Some(winner.id));
    assert_eq!(selection.case.winning_bid_id, Some(winning.bid.id));
    assert_eq!(selection.winner.status, "won");

    // Winner keeps paying 5; the loser gets half of 5 back, rounded down
    assert_eq!(state.points.balance(&winner).await.unwrap(), 15);
    assert_eq!(state.points.balance(&loser).await.unwrap(), 17);

    let bids = state.bidding.list_bids(&customer, case.id).await.unwrap();
    let lost = bids.iter().find(|b| b.provider_id == loser.id).unwrap();
    assert_eq!(lost.status, "lost");
}

#[tokio::test]
async fn test_only_case_owner_selects_winner() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let stranger = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_open_case(&state, &customer).await;

    let placed = state
        .bidding
        .place_bid(&provider, case.id, bid_request(100))
        .await
        .unwrap();
    let result = state
        .bidding
        .select_winner(&stranger, case.id, placed.bid.id)
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(state.cases.get_case(case.id).await.unwrap().is_pending());
}

#[tokio::test]
async fn test_cancel_refunds_every_pending_bid() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;
    let first = register_provider(&state).await;
    let second = register_provider(&state).await;

    for provider in [&first, &second] {
        state
            .bidding
            .place_bid(provider, case.id, bid_request(100))
            .await
            .unwrap();
    }

    let cancelled = state.cases.cancel_case(&customer, case.id).await.unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(state.points.balance(&first).await.unwrap(), 20);
    assert_eq!(state.points.balance(&second).await.unwrap(), 20);

    let bids = state.bidding.my_bids(&first).await.unwrap();
    assert_eq!(bids[0].status, "refunded");
}

#[tokio::test]
async fn test_bid_listing_visibility() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;
    let bidder = register_provider(&state).await;
    let other_bidder = register_provider(&state).await;
    let outsider = register_provider(&state).await;

    for provider in [&bidder, &other_bidder] {
        state
            .bidding
            .place_bid(provider, case.id, bid_request(100))
            .await
            .unwrap();
    }

    assert_eq!(state.bidding.list_bids(&customer, case.id).await.unwrap().len(), 2);

    let own = state.bidding.list_bids(&bidder, case.id).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].provider_id, bidder.id);

    let result = state.bidding.list_bids(&outsider, case.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_purchase_points_package() {
    let state = test_state();
    let provider = register_provider(&state).await;

    let tx = state
        .points
        .purchase(&provider, PointsPackage::Medium)
        .await
        .unwrap();
    assert_eq!(tx.amount, 120);
    assert_eq!(tx.balance_after, 140);
    assert_eq!(state.points.balance(&provider).await.unwrap(), 140);
}

#[tokio::test]
async fn test_zero_signup_bonus_blocks_bidding() {
    let mut config = AppConfig::default();
    config.bidding.signup_bonus = 0;
    let state = test_state_with(config);
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_open_case(&state, &customer).await;

    assert_eq!(state.points.balance(&provider).await.unwrap(), 0);
    let result = state.bidding.place_bid(&provider, case.id, bid_request(100)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_first_profile_save_grants_signup_bonus() {
    let store = MemoryStore::new();
    let state = AppState::new(
        AppConfig::default(),
        Repositories::from_store(store.clone()),
        WebSocketServer::new(),
        Arc::new(AuditTrailService::disabled()),
        None,
    );

    // Account whose profile write never happened during registration
    let user = store
        .create_user(NewUser {
            email: "bez-profil@example.bg".to_string(),
            phone: None,
            full_name: "Петър Стоянов".to_string(),
            role: UserRole::Provider,
            city: None,
            password_hash: "x".to_string(),
        })
        .await
        .unwrap();
    let provider = AuthUser {
        id: user.id,
        role: UserRole::Provider,
    };
    let input = provider_request("Петър Стоянов", "painting").profile.unwrap();

    let profile = state.providers.upsert_profile(&provider, input.clone()).await.unwrap();
    assert_eq!(profile.points_balance, 20);

    let profile = state.providers.upsert_profile(&provider, input).await.unwrap();
    assert_eq!(profile.points_balance, 20);
    assert_eq!(state.points.history(&provider, 50).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_bids_respect_capacity() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;

    let mut providers = Vec::new();
    for _ in 0..6 {
        providers.push(register_provider(&state).await);
    }

    let handles: Vec<_> = providers
        .into_iter()
        .map(|provider| {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .bidding
                    .place_bid(&provider, case.id, bid_request(100))
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 3);
    let case = state.cases.get_case(case.id).await.unwrap();
    assert_eq!(case.current_bidders, 3);
    assert!(case.bidding_closed);
}
