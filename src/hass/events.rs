//! Home Assistant websocket event stream.
//!
//! Connects to `/api/websocket`, authenticates with the bearer token,
//! subscribes to `state_changed` events and forwards them through a
//! channel. The listener reconnects with a delay on connection loss so
//! a Home Assistant restart does not kill the notifier.

use crate::error::{NotifierError, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One `state_changed` event, reduced to what the source readers need.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub entity_id: String,
    /// `None` when the entity was removed.
    pub state: Option<String>,
    pub attributes: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    AuthRequired,
    AuthOk,
    AuthInvalid {
        #[serde(default)]
        message: String,
    },
    Result {
        success: bool,
    },
    Event {
        event: EventBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(default)]
    entity_id: String,
    new_state: Option<NewState>,
}

#[derive(Debug, Deserialize)]
struct NewState {
    #[serde(default)]
    state: String,
    #[serde(default)]
    attributes: Value,
}

/// Websocket listener for `state_changed` events.
pub struct EventListener {
    url: String,
    token: String,
    reconnect_delay: Duration,
}

impl EventListener {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    /// Run the listener, forwarding events into `tx`. Returns when the
    /// receiving side of the channel is dropped; connection errors are
    /// logged and followed by a reconnect.
    pub async fn run(self, tx: mpsc::Sender<StateChange>) {
        loop {
            match self.connect_and_listen(&tx).await {
                Ok(()) => {
                    info!("[WS] Event channel closed, stopping listener");
                    return;
                }
                Err(NotifierError::AuthFailed(message)) => {
                    // A bad token will not get better by retrying.
                    error!("[WS] Authentication rejected: {}", message);
                    return;
                }
                Err(e) => {
                    error!("[WS] Connection error: {}", e);
                }
            }
            tokio::time::sleep(self.reconnect_delay).await;
            info!("[WS] Reconnecting to {}", self.url);
        }
    }

    async fn connect_and_listen(&self, tx: &mpsc::Sender<StateChange>) -> Result<()> {
        info!("[WS] Connecting to {}", self.url);
        let (mut ws, _) = connect_async(self.url.as_str()).await?;

        self.authenticate(&mut ws).await?;
        subscribe_state_changes(&mut ws).await?;
        info!("[WS] Subscribed to state_changed events");

        while let Some(message) = ws.next().await {
            let message = message?;
            let Message::Text(text) = message else {
                continue;
            };
            let parsed: ServerMessage = match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("[WS] Unparseable message: {}", e);
                    continue;
                }
            };
            if let ServerMessage::Event { event } = parsed {
                if event.event_type != "state_changed" {
                    continue;
                }
                let change = StateChange {
                    entity_id: event.data.entity_id,
                    state: event.data.new_state.as_ref().map(|s| s.state.clone()),
                    attributes: event
                        .data
                        .new_state
                        .map(|s| s.attributes)
                        .unwrap_or(Value::Null),
                };
                debug!("[WS] {} -> {:?}", change.entity_id, change.state);
                if tx.send(change).await.is_err() {
                    return Ok(());
                }
            }
        }

        Err(NotifierError::StreamClosed)
    }

    async fn authenticate(&self, ws: &mut WsStream) -> Result<()> {
        loop {
            let message = ws.next().await.ok_or(NotifierError::StreamClosed)??;
            let Message::Text(text) = message else {
                continue;
            };
            match serde_json::from_str(&text)? {
                ServerMessage::AuthRequired => {
                    let auth = json!({ "type": "auth", "access_token": self.token });
                    ws.send(Message::Text(auth.to_string().into())).await?;
                }
                ServerMessage::AuthOk => return Ok(()),
                ServerMessage::AuthInvalid { message } => {
                    return Err(NotifierError::AuthFailed(message));
                }
                _ => {}
            }
        }
    }
}

async fn subscribe_state_changes(ws: &mut WsStream) -> Result<()> {
    let subscribe = json!({
        "id": 1,
        "type": "subscribe_events",
        "event_type": "state_changed",
    });
    ws.send(Message::Text(subscribe.to_string().into())).await?;

    // The subscription result arrives before any event.
    loop {
        let message = ws.next().await.ok_or(NotifierError::StreamClosed)??;
        let Message::Text(text) = message else {
            continue;
        };
        match serde_json::from_str(&text)? {
            ServerMessage::Result { success: true } => return Ok(()),
            ServerMessage::Result { success: false } => {
                return Err(NotifierError::SubscribeRejected);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_state_changed_event() {
        let raw = r#"{
            "id": 1,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {
                    "entity_id": "update.esphome",
                    "new_state": {
                        "state": "on",
                        "attributes": { "installed_version": "2024.6.0" }
                    }
                }
            }
        }"#;
        let parsed: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Event { event } = parsed else {
            panic!("expected event");
        };
        assert_eq!(event.event_type, "state_changed");
        assert_eq!(event.data.entity_id, "update.esphome");
        assert_eq!(event.data.new_state.unwrap().state, "on");
    }

    #[test]
    fn test_decode_removed_entity() {
        let raw = r#"{
            "id": 1,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": { "entity_id": "update.esphome", "new_state": null }
            }
        }"#;
        let parsed: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Event { event } = parsed else {
            panic!("expected event");
        };
        assert!(event.data.new_state.is_none());
    }

    #[test]
    fn test_decode_auth_messages() {
        assert!(matches!(
            serde_json::from_str(r#"{"type":"auth_required","ha_version":"2024.6.0"}"#).unwrap(),
            ServerMessage::AuthRequired
        ));
        assert!(matches!(
            serde_json::from_str(r#"{"type":"auth_ok","ha_version":"2024.6.0"}"#).unwrap(),
            ServerMessage::AuthOk
        ));
        assert!(matches!(
            serde_json::from_str(r#"{"type":"pong","id":2}"#).unwrap(),
            ServerMessage::Other
        ));
    }
}
