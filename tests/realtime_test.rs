mod helpers;

use futures_util::{SinkExt, StreamExt};
use helpers::*;
use majstor_backend::auth::AuthUser;
use majstor_backend::services::OpenConversationRequest;
use majstor_backend::websocket::{case_channel, conversation_channel, WebSocketServer};
use majstor_backend::AppState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve_realtime(ws: WebSocketServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let ws = ws.clone();
            tokio::spawn(async move {
                let _ = ws.handle_connection(stream).await;
            });
        }
    });
    addr
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["type"], "connected");
    client
}

async fn subscribe(client: &mut Client, channel: &str, token: Option<&str>) -> Value {
    let request = json!({ "type": "subscribe", "channel": channel, "token": token });
    client.send(Message::Text(request.to_string())).await.unwrap();
    next_json(client).await
}

fn token_for(state: &AppState, user: &AuthUser) -> String {
    state.jwt.issue(user.id, user.role).unwrap()
}

async fn wait_for_connections(ws: &WebSocketServer, expected: usize) -> bool {
    for _ in 0..100 {
        if ws.connection_count() == expected {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_case_subscriber_only_gets_its_case() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case_a = create_open_case(&state, &customer).await;
    let case_b = create_open_case(&state, &customer).await;

    let addr = serve_realtime(state.ws.clone()).await;
    let mut client = connect(addr).await;
    let token = token_for(&state, &customer);

    let reply = subscribe(&mut client, &case_channel(case_a.id), Some(&token)).await;
    assert_eq!(reply["type"], "subscribed");

    state
        .bidding
        .place_bid(&provider, case_b.id, bid_request(100))
        .await
        .unwrap();
    state
        .bidding
        .place_bid(&provider, case_a.id, bid_request(120))
        .await
        .unwrap();

    let event = next_json(&mut client).await;
    assert_eq!(event["type"], "bid_placed");
    assert_eq!(event["case_id"], case_a.id.to_string());
    assert_eq!(event["current_bidders"], 1);
    assert!(event.get("provider_id").is_none());
    assert!(event.get("bid_id").is_none());
}

#[tokio::test]
async fn test_closed_connection_releases_its_receiver() {
    let state = test_state();
    let addr = serve_realtime(state.ws.clone()).await;

    let mut client = connect(addr).await;
    assert!(wait_for_connections(&state.ws, 1).await);

    client.close(None).await.unwrap();
    drop(client);

    assert!(wait_for_connections(&state.ws, 0).await);
}

#[tokio::test]
async fn test_anonymous_case_subscription_is_refused() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let case = create_open_case(&state, &customer).await;

    let addr = serve_realtime(state.ws.clone()).await;
    let mut client = connect(addr).await;

    let reply = subscribe(&mut client, &case_channel(case.id), None).await;
    assert_eq!(reply["type"], "error");
}

#[tokio::test]
async fn test_direct_case_channel_is_limited_to_its_parties() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let target = register_provider(&state).await;
    let outsider = register_provider(&state).await;
    let case = create_direct_case(&state, &customer, &target).await;
    let channel = case_channel(case.id);

    assert!(state.ws.authorize(&channel, Some(&token_for(&state, &customer))).await.is_ok());
    assert!(state.ws.authorize(&channel, Some(&token_for(&state, &target))).await.is_ok());
    assert!(state.ws.authorize(&channel, Some(&token_for(&state, &outsider))).await.is_err());
}

#[tokio::test]
async fn test_conversation_channel_requires_participant() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let stranger = register_customer(&state).await;
    let conversation = state
        .chat
        .open_conversation(
            &customer,
            OpenConversationRequest {
                participant_id: provider.id,
                case_id: None,
            },
        )
        .await
        .unwrap();
    let channel = conversation_channel(conversation.id);

    assert!(state.ws.authorize(&channel, Some(&token_for(&state, &provider))).await.is_ok());
    assert!(state.ws.authorize(&channel, Some(&token_for(&state, &stranger))).await.is_err());
    assert!(state.ws.authorize(&channel, None).await.is_err());
}
