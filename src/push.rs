//! Push channel subscription
//!
//! Keeps a WebSocket open to the backend and forwards decoded events to the UI
//! loop over an mpsc channel. Accepts Socket.IO (Engine.IO v4) text packets and
//! plain `{"event", "data"}` JSON envelopes.

use crate::api::ReplyStatus;
use crate::error::Result;
use crate::relay::ProgressEvent;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 30;
const KEEPALIVE: Duration = Duration::from_secs(20);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event delivered by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// `reindex_progress`
    Progress(ProgressEvent),
    /// `reindex_error`
    IndexError(String),
    /// `reindex_complete`
    IndexComplete { status: ReplyStatus, message: String },
    /// `upload_progress`
    UploadProgress { fraction: f64, message: String },
    /// The channel (re)connected
    Connected,
    /// The channel dropped; a reconnect is pending
    Disconnected,
}

/// Result of decoding one text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(PushEvent),
    /// Protocol frame the client must answer with
    Reply(&'static str),
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ProgressPayload {
    #[serde(default)]
    value: f64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    can_cancel: bool,
    #[serde(default)]
    job_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessagePayload {
    status: ReplyStatus,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl From<ProgressPayload> for ProgressEvent {
    fn from(payload: ProgressPayload) -> Self {
        let event = ProgressEvent::new(payload.value, payload.message, payload.can_cancel);
        match payload.job_id {
            Some(Value::String(id)) => event.with_job(id),
            Some(Value::Number(id)) => event.with_job(id.to_string()),
            _ => event,
        }
    }
}

/// Map a named event and its payload to a [`PushEvent`]
pub fn event_from(name: &str, data: Value) -> Option<PushEvent> {
    let decoded = match name {
        "reindex_progress" => serde_json::from_value::<ProgressPayload>(data)
            .map(|p| PushEvent::Progress(p.into())),
        "reindex_error" => serde_json::from_value::<MessagePayload>(data)
            .map(|p| PushEvent::IndexError(p.message)),
        "reindex_complete" => serde_json::from_value::<MessagePayload>(data).map(|p| {
            PushEvent::IndexComplete {
                status: p.status,
                message: p.message,
            }
        }),
        "upload_progress" => serde_json::from_value::<ProgressPayload>(data).map(|p| {
            let event = ProgressEvent::from(p);
            PushEvent::UploadProgress {
                fraction: event.fraction,
                message: event.message,
            }
        }),
        other => {
            debug!(event = other, "Ignoring unknown push event");
            return None;
        }
    };

    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(event = name, error = %e, "Malformed push event payload");
            None
        }
    }
}

/// Decode one text frame
pub fn decode_frame(text: &str) -> Frame {
    let text = text.trim();

    if text.starts_with('{') {
        return match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => event_from(&envelope.event, envelope.data)
                .map(Frame::Event)
                .unwrap_or(Frame::Ignored),
            Err(e) => {
                warn!(error = %e, "Unparseable push envelope");
                Frame::Ignored
            }
        };
    }

    match text.as_bytes().first() {
        // Engine.IO open; join the default namespace
        Some(b'0') => Frame::Reply("40"),
        Some(b'2') => Frame::Reply("3"),
        Some(b'4') => decode_socketio(&text[1..]),
        _ => Frame::Ignored,
    }
}

/// Socket.IO packet (the part after the Engine.IO `4` message type)
fn decode_socketio(packet: &str) -> Frame {
    let Some(body) = packet.strip_prefix('2') else {
        // connect ack, disconnect, acks
        debug!(packet = %packet, "Socket.IO control packet");
        return Frame::Ignored;
    };

    // optional namespace ("/ns,") before the payload
    let body = match body.find('[') {
        Some(start) => &body[start..],
        None => return Frame::Ignored,
    };

    let Ok(Value::Array(mut items)) = serde_json::from_str::<Value>(body) else {
        warn!(body = %body, "Unparseable Socket.IO event");
        return Frame::Ignored;
    };
    if items.is_empty() {
        return Frame::Ignored;
    }

    let name = match items.remove(0) {
        Value::String(name) => name,
        _ => return Frame::Ignored,
    };
    let data = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };

    event_from(&name, data)
        .map(Frame::Event)
        .unwrap_or(Frame::Ignored)
}

/// Spawn the subscription task. It runs until `shutdown` flips to true or the
/// receiving side of `events` is dropped.
pub fn spawn(
    url: String,
    events: mpsc::Sender<PushEvent>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(url, events, shutdown))
}

async fn backoff(secs: &mut u64, shutdown: &mut watch::Receiver<bool>) -> bool {
    let stop = tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(*secs)) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    };
    *secs = (*secs * 2).min(MAX_BACKOFF_SECS);
    stop
}

async fn connect(url: &str) -> Result<WsStream> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(stream)
}

async fn run(url: String, events: mpsc::Sender<PushEvent>, mut shutdown: watch::Receiver<bool>) {
    let mut backoff_secs = 1_u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let ws = match connect(&url).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, %url, "Push channel connect failed");
                if backoff(&mut backoff_secs, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        info!(%url, "Push channel connected");
        backoff_secs = 1;
        if events.send(PushEvent::Connected).await.is_err() {
            return;
        }

        let (mut writer, mut reader) = ws.split();
        let mut keepalive = tokio::time::interval(KEEPALIVE);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let _ = keepalive.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = writer.send(WsMessage::Close(None)).await;
                        return;
                    }
                }
                _ = keepalive.tick() => {
                    if writer.send(WsMessage::Ping(Vec::new())).await.is_err() {
                        warn!("Push channel keepalive failed; reconnecting");
                        break;
                    }
                }
                next = reader.next() => {
                    let Some(next) = next else {
                        break;
                    };

                    match next {
                        Ok(WsMessage::Text(text)) => match decode_frame(&text) {
                            Frame::Event(event) => {
                                if events.send(event).await.is_err() {
                                    return;
                                }
                            }
                            Frame::Reply(reply) => {
                                if writer.send(WsMessage::Text(reply.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Frame::Ignored => {}
                        },
                        Ok(WsMessage::Ping(payload)) => {
                            if writer.send(WsMessage::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Ok(WsMessage::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "Push channel read failed");
                            break;
                        }
                    }
                }
            }
        }

        if events.send(PushEvent::Disconnected).await.is_err() {
            return;
        }
        if backoff(&mut backoff_secs, &mut shutdown).await {
            break;
        }
    }

    debug!("Push channel stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engineio_handshake_and_ping() {
        assert_eq!(
            decode_frame(r#"0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}"#),
            Frame::Reply("40")
        );
        assert_eq!(decode_frame("2"), Frame::Reply("3"));
        assert_eq!(decode_frame(r#"40{"sid":"xyz"}"#), Frame::Ignored);
    }

    #[test]
    fn test_socketio_progress_event() {
        let frame = decode_frame(
            r#"42["reindex_progress",{"value":0.5,"message":"Indexing a.pdf...","can_cancel":true}]"#,
        );
        assert_eq!(
            frame,
            Frame::Event(PushEvent::Progress(ProgressEvent::new(
                0.5,
                "Indexing a.pdf...",
                true
            )))
        );
    }

    #[test]
    fn test_namespaced_event_and_numeric_job_id() {
        let frame = decode_frame(r#"42/rag,["reindex_progress",{"value":0.1,"message":"m","job_id":7}]"#);
        match frame {
            Frame::Event(PushEvent::Progress(event)) => {
                assert_eq!(event.job_id.as_deref(), Some("7"));
                assert!(!event.cancellable);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_json_envelope() {
        let frame = decode_frame(r#"{"event":"reindex_error","data":{"message":"disk full"}}"#);
        assert_eq!(frame, Frame::Event(PushEvent::IndexError("disk full".to_string())));

        let frame = decode_frame(
            r#"{"event":"reindex_complete","data":{"status":"success","message":"Indexed 3 files"}}"#,
        );
        assert_eq!(
            frame,
            Frame::Event(PushEvent::IndexComplete {
                status: ReplyStatus::Success,
                message: "Indexed 3 files".to_string()
            })
        );
    }

    #[test]
    fn test_out_of_range_value_is_clamped() {
        let frame = decode_frame(r#"42["upload_progress",{"value":1.5,"message":"done"}]"#);
        assert_eq!(
            frame,
            Frame::Event(PushEvent::UploadProgress {
                fraction: 1.0,
                message: "done".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_and_garbage_frames_are_ignored() {
        assert_eq!(decode_frame(r#"42["chat_token",{"t":"x"}]"#), Frame::Ignored);
        assert_eq!(decode_frame(r#"{"event":"other"}"#), Frame::Ignored);
        assert_eq!(decode_frame("42[not json"), Frame::Ignored);
        assert_eq!(decode_frame("6"), Frame::Ignored);
    }

    #[tokio::test]
    async fn refused_connect_is_a_push_error() {
        let err = connect("ws://127.0.0.1:9/socket.io/?EIO=4&transport=websocket")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ConsoleError::Push(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_backoff() {
        let (tx, mut rx) = watch::channel(false);
        let mut secs = 8;
        let waiter = tokio::spawn(async move { backoff(&mut secs, &mut rx).await });

        tx.send(true).unwrap();
        assert!(waiter.await.unwrap());
    }
}
