use crate::auth::JwtKeys;
use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::repositories::Repositories;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        channel: String, // "case:{id}", "conversation:{id}", "user:{id}"
        #[serde(default)]
        token: Option<String>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channel: String },
    #[serde(rename = "bid_placed")]
    BidPlaced {
        case_id: String,
        // Only set on the customer's own channel
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bid_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_id: Option<String>,
        current_bidders: i32,
        max_bidders: i32,
        bidding_closed: bool,
    },
    #[serde(rename = "case_status_changed")]
    CaseStatusChanged {
        case_id: String,
        status: String,
        provider_id: Option<String>,
    },
    #[serde(rename = "bid_settled")]
    BidSettled {
        case_id: String,
        bid_id: String,
        status: String,
        refund: i64,
    },
    #[serde(rename = "new_message")]
    NewMessage {
        conversation_id: String,
        message_id: String,
        sender_id: String,
        created_at: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// A server message addressed to one channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub message: WsMessage,
}

pub fn case_channel(case_id: Uuid) -> String {
    format!("case:{}", case_id)
}

pub fn conversation_channel(conversation_id: Uuid) -> String {
    format!("conversation:{}", conversation_id)
}

pub fn user_channel(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// WebSocket server for real-time updates
pub struct WebSocketServer {
    /// Fan-out of every channel message to all connection tasks
    tx: broadcast::Sender<ChannelMessage>,
    /// Active subscriptions: channel -> client IDs
    subscriptions: Arc<RwLock<HashMap<String, HashSet<Uuid>>>>,
    /// Client subscriptions: client_id -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, HashSet<String>>>>,
    /// Token and membership checks; without it every subscription is refused
    access: Option<ChannelAccess>,
}

#[derive(Clone)]
struct ChannelAccess {
    jwt: JwtKeys,
    repos: Repositories,
}

impl WebSocketServer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000); // Buffer up to 1000 messages

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
            access: None,
        }
    }

    /// Enable subscriptions, checked against the token holder's cases and conversations
    pub fn with_access(mut self, jwt: JwtKeys, repos: Repositories) -> Self {
        self.access = Some(ChannelAccess { jwt, repos });
        self
    }

    /// Broadcast receivers still held by connection tasks
    pub fn connection_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Receiver of every broadcast, before per-client filtering
    pub fn receiver(&self) -> broadcast::Receiver<ChannelMessage> {
        self.tx.subscribe()
    }

    /// Broadcast a message to all subscribers of a channel
    pub async fn broadcast_to_channel(&self, channel: &str, message: WsMessage) {
        let subscriptions = self.subscriptions.read().await;
        let count = subscriptions.get(channel).map(|s| s.len()).unwrap_or(0);
        drop(subscriptions);

        debug!("Broadcasting to {} subscribers on channel {}", count, channel);
        // No receivers is not an error here
        let _ = self.tx.send(ChannelMessage {
            channel: channel.to_string(),
            message,
        });
    }

    /// Check whether the token holder may join a channel.
    ///
    /// `user:{id}` is the holder's own channel. `conversation:{id}` needs a
    /// participant. `case:{id}` is open to the case's customer and assigned
    /// provider, to admins, and to any provider while the case is open bidding.
    pub async fn authorize(&self, channel: &str, token: Option<&str>) -> Result<(), String> {
        let Some((kind, id)) = channel.split_once(':') else {
            return Err(format!("Invalid channel: {}", channel));
        };
        let id = Uuid::parse_str(id).map_err(|_| format!("Invalid channel id: {}", channel))?;
        let Some(access) = &self.access else {
            return Err("Subscriptions are not enabled".to_string());
        };
        let token = token.ok_or_else(|| "Token required".to_string())?;
        let user = access
            .jwt
            .verify(token)
            .map_err(|_| "Invalid or expired token".to_string())?;

        let allowed = match kind {
            "user" => user.id == id,
            "case" => match access.repos.cases.find_by_id(id).await {
                Ok(Some(case)) => {
                    user.role == UserRole::Admin
                        || case.is_participant(user.id)
                        || (user.role == UserRole::Provider && !case.is_direct())
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("Channel check for {} failed: {}", channel, e);
                    false
                }
            },
            "conversation" => match access.repos.chat.find_conversation(id).await {
                Ok(Some(conversation)) => conversation.is_participant(user.id),
                Ok(None) => false,
                Err(e) => {
                    warn!("Channel check for {} failed: {}", channel, e);
                    false
                }
            },
            _ => return Err(format!("Unknown channel type: {}", kind)),
        };

        if allowed {
            Ok(())
        } else {
            Err("Not allowed to subscribe to this channel".to_string())
        }
    }

    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        subscriptions.entry(channel.clone()).or_default().insert(client_id);
        client_channels.entry(client_id).or_default().insert(channel.clone());

        info!("Client {} subscribed to {}", client_id, channel);
    }

    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.remove(&client_id);
            if subscribers.is_empty() {
                subscriptions.remove(channel);
            }
        }
        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.remove(channel);
        }

        info!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Drop every subscription of a disconnected client
    pub async fn disconnect(&self, client_id: Uuid) {
        let channels = self
            .client_channels
            .write()
            .await
            .remove(&client_id)
            .unwrap_or_default();

        let mut subscriptions = self.subscriptions.write().await;
        for channel in channels {
            if let Some(subscribers) = subscriptions.get_mut(&channel) {
                subscribers.remove(&client_id);
                if subscribers.is_empty() {
                    subscriptions.remove(&channel);
                }
            }
        }
    }

    pub async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(channel)
            .map(|subscribers| subscribers.contains(&client_id))
            .unwrap_or(false)
    }

    /// Handle a new WebSocket connection
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);

        let welcome = serde_json::json!({
            "type": "connected",
            "client_id": client_id.to_string(),
            "message": "Connected to Majstor realtime server"
        });
        if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
            warn!("Failed to send welcome message: {}", e);
        }

        // Shared between the reader and the broadcast forwarder
        let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
        let ws_sender_for_receiver = ws_sender.clone();
        let ws_server_for_receiver = self.clone();
        let (closed_tx, mut closed_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<WsMessage>(&text) {
                            Ok(WsMessage::Subscribe { channel, token }) => {
                                match ws_server_for_receiver.authorize(&channel, token.as_deref()).await {
                                    Ok(()) => {
                                        ws_server_for_receiver.subscribe(client_id, channel.clone()).await;
                                        serde_json::json!({ "type": "subscribed", "channel": channel })
                                    }
                                    Err(message) => {
                                        serde_json::json!({ "type": "error", "message": message })
                                    }
                                }
                            }
                            Ok(WsMessage::Unsubscribe { channel }) => {
                                ws_server_for_receiver.unsubscribe(client_id, &channel).await;
                                serde_json::json!({ "type": "unsubscribed", "channel": channel })
                            }
                            Ok(_) => {
                                warn!("Unexpected message type from client {}", client_id);
                                serde_json::json!({ "type": "error", "message": "Unsupported message type" })
                            }
                            Err(_) => {
                                warn!("Failed to parse message from client {}: {}", client_id, text);
                                serde_json::json!({ "type": "error", "message": "Invalid message format" })
                            }
                        };

                        let mut sender = ws_sender_for_receiver.lock().await;
                        if let Err(e) = sender.send(Message::Text(reply.to_string())).await {
                            warn!("Failed to reply to client {}: {}", client_id, e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed: {}", client_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            ws_server_for_receiver.disconnect(client_id).await;
            // Forwarder may already be gone
            let _ = closed_tx.send(());
        });

        let ws_server_clone = self.clone();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = &mut closed_rx => break,
                    received = rx.recv() => received,
                };
                let outgoing = match received {
                    Ok(outgoing) => outgoing,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} messages", client_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !ws_server_clone.is_client_subscribed(client_id, &outgoing.channel).await {
                    continue;
                }

                let json = match serde_json::to_string(&outgoing.message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                let mut sender = ws_sender.lock().await;
                if let Err(e) = sender.send(Message::Text(json)).await {
                    debug!("Stopped forwarding to client {}: {}", client_id, e);
                    break;
                }
            }
            debug!("Forwarder for client {} stopped", client_id);
        });

        Ok(())
    }

    /// Counts go to the case channel; the bidder's identity only to the customer
    pub async fn broadcast_bid_placed(
        &self,
        case_id: Uuid,
        customer_id: Uuid,
        bid_id: Uuid,
        provider_id: Uuid,
        current_bidders: i32,
        max_bidders: i32,
        bidding_closed: bool,
    ) {
        let counts = WsMessage::BidPlaced {
            case_id: case_id.to_string(),
            bid_id: None,
            provider_id: None,
            current_bidders,
            max_bidders,
            bidding_closed,
        };
        let detailed = WsMessage::BidPlaced {
            case_id: case_id.to_string(),
            bid_id: Some(bid_id.to_string()),
            provider_id: Some(provider_id.to_string()),
            current_bidders,
            max_bidders,
            bidding_closed,
        };
        self.broadcast_to_channel(&case_channel(case_id), counts).await;
        self.broadcast_to_channel(&user_channel(customer_id), detailed).await;
    }

    /// Goes to the case channel and to each listed participant
    pub async fn broadcast_case_status(
        &self,
        case_id: Uuid,
        status: &str,
        provider_id: Option<Uuid>,
        participants: &[Uuid],
    ) {
        let message = WsMessage::CaseStatusChanged {
            case_id: case_id.to_string(),
            status: status.to_string(),
            provider_id: provider_id.map(|p| p.to_string()),
        };
        self.broadcast_to_channel(&case_channel(case_id), message.clone()).await;
        for user_id in participants {
            self.broadcast_to_channel(&user_channel(*user_id), message.clone()).await;
        }
    }

    pub async fn broadcast_bid_settled(&self, provider_id: Uuid, case_id: Uuid, bid_id: Uuid, status: &str, refund: i64) {
        let message = WsMessage::BidSettled {
            case_id: case_id.to_string(),
            bid_id: bid_id.to_string(),
            status: status.to_string(),
            refund,
        };
        self.broadcast_to_channel(&user_channel(provider_id), message).await;
    }

    /// Message bodies stay behind the REST API; the event only carries ids
    pub async fn broadcast_new_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        created_at: chrono::NaiveDateTime,
    ) {
        let message = WsMessage::NewMessage {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            sender_id: sender_id.to_string(),
            created_at: created_at.and_utc().to_rfc3339(),
        };
        self.broadcast_to_channel(&conversation_channel(conversation_id), message.clone())
            .await;
        self.broadcast_to_channel(&user_channel(recipient_id), message).await;
    }
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            client_channels: Arc::clone(&self.client_channels),
            access: self.access.clone(),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}
