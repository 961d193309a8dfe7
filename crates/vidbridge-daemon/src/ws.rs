//! WebSocket handler for real-time updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use vidbridge_core::{InputId, InputInfo, OutputLane};

use crate::state::{AppState, BridgeEvent};

/// WebSocket message types
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum WsMessage {
    InputAdded(InputInfo),
    InputRemoved { id: InputId },
    Routed { input: InputInfo, output: OutputLane },
    StreamChanged { device: String, on: bool },
    DeviceDetached { device: String, inputs: Vec<InputId> },
    Pong,
}

impl From<BridgeEvent> for WsMessage {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::InputAdded(input) => Self::InputAdded(input),
            BridgeEvent::InputRemoved(id) => Self::InputRemoved { id },
            BridgeEvent::Routed { input, output } => Self::Routed { input, output },
            BridgeEvent::StreamChanged { device, on } => Self::StreamChanged { device, on },
            BridgeEvent::DeviceDetached { device, inputs } => {
                Self::DeviceDetached { device, inputs }
            }
        }
    }
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send<S>(sender: &mut S, msg: &WsMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode event");
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();

    info!("WebSocket client connected");

    // Send current inputs on connect
    let inputs = match state.context.inputs() {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!(error = %e, "Input snapshot failed");
            Vec::new()
        }
    };
    for input in inputs {
        if !send(&mut sender, &WsMessage::InputAdded(input)).await {
            return;
        }
    }

    loop {
        tokio::select! {
            // Forward bridge events to client
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send(&mut sender, &WsMessage::from(event)).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Event channel lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }

            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == "ping" && !send(&mut sender, &WsMessage::Pong).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_are_type_tagged() {
        let msg = WsMessage::from(BridgeEvent::StreamChanged {
            device: "adv7481-0".to_string(),
            on: false,
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "stream_changed", "data": {"device": "adv7481-0", "on": false}})
        );

        let msg = WsMessage::from(BridgeEvent::DeviceDetached {
            device: "adv7481-1".to_string(),
            inputs: vec![InputId(4), InputId(5)],
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "device_detached", "data": {"device": "adv7481-1", "inputs": [4, 5]}})
        );

        assert_eq!(
            serde_json::to_value(WsMessage::Pong).unwrap(),
            json!({"type": "pong"})
        );
    }

    #[test]
    fn test_removed_carries_id() {
        let msg = WsMessage::from(BridgeEvent::InputRemoved(InputId(2)));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "input_removed", "data": {"id": 2}})
        );
    }
}
