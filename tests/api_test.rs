mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use helpers::*;
use majstor_backend::app;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, role: &str) -> (String, String) {
    let mut payload = json!({
        "email": format!("{}-{}@example.bg", role, uuid::Uuid::new_v4().simple()),
        "password": PASSWORD,
        "full_name": "Тест Потребител",
        "role": role,
    });
    if role == "provider" {
        payload["profile"] = json!({
            "business_name": "ВиК Експерт",
            "category": "plumbing",
            "city": "Варна",
        });
    }

    let (status, body) = send(app, "POST", "/api/v1/auth/register", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["data"]["token"].as_str().unwrap().to_string(),
        body["data"]["user"]["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health_check() {
    let app = app(test_state());
    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app(test_state());

    let (status, body) = send(&app, "GET", "/api/v1/points/balance", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_roundtrip() {
    let app = app(test_state());
    let email = format!("login-{}@example.bg", uuid::Uuid::new_v4().simple());
    let payload = json!({
        "email": email,
        "password": PASSWORD,
        "full_name": "Мария Иванова",
        "role": "customer",
    });
    let (status, _) = send(&app, "POST", "/api/v1/auth/register", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", body);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], email);
}

#[tokio::test]
async fn test_case_and_bid_flow_over_http() {
    let app = app(test_state());
    let (customer_token, _) = register(&app, "customer").await;
    let (provider_token, provider_id) = register(&app, "provider").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/cases",
        Some(&customer_token),
        Some(json!({
            "category": "plumbing",
            "title": "Смяна на бойлер",
            "description": "80-литров бойлер",
            "city": "Варна",
            "budget": "400",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let case_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/cases/{}/can-bid", case_id),
        Some(&provider_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allowed"], true);
    assert_eq!(body["data"]["cost"], 10);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/cases/{}/bids", case_id),
        Some(&provider_token),
        Some(json!({ "proposed_price": "350", "estimated_days": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["points_balance"], 10);
    assert_eq!(body["data"]["case"]["current_bidders"], 1);
    let bid_id = body["data"]["bid"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/cases/{}/bids", case_id),
        Some(&provider_token),
        Some(json!({ "proposed_price": "300" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/cases/{}/bids/{}/select", case_id, bid_id),
        Some(&customer_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["case"]["status"], "accepted");
    assert_eq!(body["data"]["case"]["provider_id"], provider_id.as_str());

    let (status, body) = send(&app, "GET", "/api/v1/providers/me/dashboard", Some(&provider_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active_cases"], 1);
    assert_eq!(body["data"]["won_bids"], 1);
}

#[tokio::test]
async fn test_customer_cannot_buy_points() {
    let app = app(test_state());
    let (customer_token, _) = register(&app, "customer").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/points/purchase",
        Some(&customer_token),
        Some(json!({ "package": "small" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_provider_search_is_public() {
    let app = app(test_state());
    register(&app, "provider").await;

    let (status, body) = send(&app, "GET", "/api/v1/providers?category=plumbing&city=%D0%92%D0%B0%D1%80%D0%BD%D0%B0", None, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_request_bodies_use_error_envelope() {
    let app = app(test_state());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": "nepalen@example.bg" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_case_id_uses_error_envelope() {
    let app = app(test_state());
    let (token, _) = register(&app, "customer").await;

    let (status, body) = send(&app, "GET", "/api/v1/cases/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
