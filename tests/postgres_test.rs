//! Runs against a real database: `DATABASE_URL=... cargo test -- --ignored`

mod helpers;

use helpers::*;
use majstor_backend::config::AppConfig;
use majstor_backend::database::Database;
use majstor_backend::repositories::Repositories;
use majstor_backend::services::AuditTrailService;
use majstor_backend::websocket::WebSocketServer;
use majstor_backend::AppState;
use sqlx::PgPool;
use std::sync::Arc;

fn postgres_state(pool: PgPool) -> AppState {
    AppState::new(
        AppConfig::default(),
        Repositories::postgres(pool.clone()),
        WebSocketServer::new(),
        Arc::new(AuditTrailService::disabled()),
        Some(Database::new(pool)),
    )
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_postgres_bid_and_settle(pool: PgPool) {
    let state = postgres_state(pool);
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
        .place_bid(&loser, case.id, bid_request(140))
        .await
        .unwrap();
    assert!(state
        .bidding
        .place_bid(&loser, case.id, bid_request(90))
        .await
        .is_err());

    state
        .bidding
        .select_winner(&customer, case.id, winning.bid.id)
        .await
        .unwrap();

    assert_eq!(state.points.balance(&winner).await.unwrap(), 15);
    assert_eq!(state.points.balance(&loser).await.unwrap(), 17);
    assert_eq!(state.cases.get_case(case.id).await.unwrap().status, "accepted");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_postgres_concurrent_bids_respect_capacity(pool: PgPool) {
    let state = postgres_state(pool);
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

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_postgres_decline_round_trip(pool: PgPool) {
    let state = postgres_state(pool);
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_direct_case(&state, &customer, &provider).await;

    let declined = state.cases.decline_case(&provider, case.id).await.unwrap();
    assert_eq!(declined.status, "declined");
    let restored = state.cases.undecline_case(&provider, case.id).await.unwrap();
    assert_eq!(restored.status, "pending");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_postgres_profile_resave_keeps_single_bonus(pool: PgPool) {
    let state = postgres_state(pool);
    let provider = register_provider(&state).await;
    assert_eq!(state.points.balance(&provider).await.unwrap(), 20);

    let input = provider_request("Георги Майсторов", "plumbing").profile.unwrap();
    let profile = state.providers.upsert_profile(&provider, input).await.unwrap();
    assert_eq!(profile.points_balance, 20);
    assert_eq!(state.points.history(&provider, 50).await.unwrap().len(), 1);
}
