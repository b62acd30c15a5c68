#![allow(dead_code)]

use majstor_backend::auth::AuthUser;
use majstor_backend::config::AppConfig;
use majstor_backend::models::*;
use majstor_backend::services::*;
use majstor_backend::AppState;
use rust_decimal::Decimal;
use uuid::Uuid;

pub const PASSWORD: &str = "tainaparola123";

/// Fresh in-memory application with default rules
pub fn test_state() -> AppState {
    AppState::in_memory(AppConfig::default())
}

pub fn test_state_with(config: AppConfig) -> AppState {
    AppState::in_memory(config)
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.bg", prefix, Uuid::new_v4().simple())
}

pub fn customer_request(name: &str) -> RegisterRequest {
    RegisterRequest {
        email: unique_email("customer"),
        password: PASSWORD.to_string(),
        full_name: name.to_string(),
        phone: None,
        city: Some("София".to_string()),
        role: UserRole::Customer,
        profile: None,
    }
}

pub fn provider_request(name: &str, category: &str) -> RegisterRequest {
    RegisterRequest {
        email: unique_email("provider"),
        password: PASSWORD.to_string(),
        full_name: name.to_string(),
        phone: None,
        city: Some("София".to_string()),
        role: UserRole::Provider,
        profile: Some(ProviderProfileInput {
            business_name: format!("{} ЕООД", name),
            category: category.to_string(),
            city: "София".to_string(),
            description: None,
            experience_years: 5,
            hourly_rate: Some(Decimal::new(35, 0)),
        }),
    }
}

pub async fn register_customer(state: &AppState) -> AuthUser {
    let response = state
        .auth
        .register(customer_request("Иван Петров"))
        .await
        .expect("Failed to register customer");
    AuthUser {
        id: response.user.id,
        role: UserRole::Customer,
    }
}

pub async fn register_provider(state: &AppState) -> AuthUser {
    let response = state
        .auth
        .register(provider_request("Георги Майсторов", "plumbing"))
        .await
        .expect("Failed to register provider");
    AuthUser {
        id: response.user.id,
        role: UserRole::Provider,
    }
}

pub fn case_request(budget: Option<i64>) -> CreateCaseRequest {
    CreateCaseRequest {
        category: "plumbing".to_string(),
        title: "Спукана тръба в кухнята".to_string(),
        description: "Тече вода под мивката".to_string(),
        city: "София".to_string(),
        address: None,
        budget: budget.map(|b| Decimal::new(b, 0)),
        priority: None,
        assignment_type: None,
        provider_id: None,
        bidding_enabled: None,
        preferred_date: None,
    }
}

/// Open bidding case; a 150 BGN budget costs 5 points per bid
pub async fn create_open_case(state: &AppState, customer: &AuthUser) -> Case {
    state
        .cases
        .create_case(customer, case_request(Some(150)))
        .await
        .expect("Failed to create case")
}

pub async fn create_direct_case(state: &AppState, customer: &AuthUser, provider: &AuthUser) -> Case {
    let mut request = case_request(Some(150));
    request.assignment_type = Some(AssignmentType::Direct);
    request.provider_id = Some(provider.id);
    state
        .cases
        .create_case(customer, request)
        .await
        .expect("Failed to create direct case")
}

pub fn bid_request(price: i64) -> PlaceBidRequest {
    PlaceBidRequest {
        proposed_price: Decimal::new(price, 0),
        message: Some("Мога утре сутринта".to_string()),
        estimated_days: Some(1),
    }
}
