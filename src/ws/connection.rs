//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered activities.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::auth::AuthUser;
use crate::domain::{Activity, EventId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards activities of subscribed events from `activity_rx`.
pub async fn run_connection(
    socket: WebSocket,
    mut activity_rx: broadcast::Receiver<Activity>,
    viewer: AuthUser,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();
    tracing::debug!(user_id = %viewer.id, "ws connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if ws_tx.send(Message::text(encode(&response))).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            activity = activity_rx.recv() => {
                match activity {
                    Ok(activity) => {
                        if subs.matches(activity.event_id()) {
                            let msg = WsMessage::reply(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&activity).unwrap_or_default(),
                            );
                            if ws_tx.send(Message::text(encode(&msg))).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, user_id = %viewer.id, "ws client lagged behind activity bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(user_id = %viewer.id, "ws connection closed");
}

fn encode(msg: &WsMessage) -> String {
    serde_json::to_string(msg).unwrap_or_default()
}

/// Splits raw ids into parsed event ids and the wildcard flag. Unparsable
/// entries are skipped.
fn parse_ids(raw: &[String]) -> (Vec<EventId>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for value in raw {
        if value == "*" {
            wildcard = true;
        } else if let Ok(uuid) = value.parse::<uuid::Uuid>() {
            ids.push(EventId::from_uuid(uuid));
        }
    }
    (ids, wildcard)
}

/// Handles a text message from the client and builds the reply.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { event_ids } => {
            let (ids, wildcard) = parse_ids(&event_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::reply(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { event_ids } => {
            let (ids, wildcard) = parse_ids(&event_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::reply(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Ping => WsMessage::reply(
            msg.id,
            WsMessageType::Response,
            serde_json::json!({ "pong": true }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_updates_filter() {
        let mut subs = SubscriptionManager::new();
        let id = EventId::new();
        let raw = format!(
            r#"{{"id":"a","type":"command","payload":{{"command":"subscribe","event_ids":["{id}","not-a-uuid"]}}}}"#
        );
        let reply = handle_text_message(&raw, &mut subs);
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.id, "a");
        assert_eq!(reply.payload["count"], 1);
        assert!(subs.matches(id));
    }

    #[test]
    fn malformed_and_unknown_messages_are_errors() {
        let mut subs = SubscriptionManager::new();
        let reply = handle_text_message("{nope", &mut subs);
        assert_eq!(reply.msg_type, WsMessageType::Error);

        let reply = handle_text_message(
            r#"{"id":"b","type":"command","payload":{"command":"swap"}}"#,
            &mut subs,
        );
        assert_eq!(reply.payload["code"], 404);
    }

    #[test]
    fn ping_answers_pong() {
        let mut subs = SubscriptionManager::new();
        let reply = handle_text_message(
            r#"{"id":"c","type":"command","payload":{"command":"ping"}}"#,
            &mut subs,
        );
        assert_eq!(reply.payload["pong"], true);
    }
}
