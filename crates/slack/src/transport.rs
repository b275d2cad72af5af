use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::events::{SlackEnvelope, SlackEvent};
use crate::socket::{SocketTransport, TransportError};
use crate::web::SlackWebClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How the bot session is opened.
#[derive(Clone)]
pub enum ConnectionMode {
    /// `apps.connections.open` with an app-level token; every envelope is acked.
    SocketMode { app_token: SecretString },
    /// `rtm.connect` with the access token; events arrive without envelopes.
    Rtm,
}

impl ConnectionMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SocketMode { .. } => "socket_mode",
            Self::Rtm => "rtm",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Hello,
    Reconnect { reason: String },
    Envelope(SlackEnvelope),
    Ignored,
}

/// Decodes one Socket Mode text frame.
pub fn parse_socket_mode_frame(text: &str) -> Frame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Frame::Ignored;
    };
    let frame_type = value.get("type").and_then(Value::as_str).unwrap_or_default();

    match frame_type {
        "hello" => return Frame::Hello,
        "disconnect" => {
            let reason = value.get("reason").and_then(Value::as_str).unwrap_or("unknown");
            return Frame::Reconnect { reason: reason.to_owned() };
        }
        _ => {}
    }

    let Some(envelope_id) = value.get("envelope_id").and_then(Value::as_str) else {
        return Frame::Ignored;
    };
    let event = match (frame_type, value.pointer("/payload/event")) {
        ("events_api", Some(event)) => SlackEvent::from_json(event.clone()),
        _ => SlackEvent::Unsupported { event_type: frame_type.to_owned() },
    };

    Frame::Envelope(SlackEnvelope { envelope_id: envelope_id.to_owned(), event })
}

/// Decodes one RTM text frame. RTM events carry no envelope id, so `sequence`
/// is used to synthesize one.
pub fn parse_rtm_frame(text: &str, sequence: u64) -> Frame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Frame::Ignored;
    };

    match value.get("type").and_then(Value::as_str) {
        Some("hello") => Frame::Hello,
        Some("goodbye") => Frame::Reconnect { reason: "goodbye".to_owned() },
        Some(_) => Frame::Envelope(SlackEnvelope {
            envelope_id: format!("rtm-{sequence}"),
            event: SlackEvent::from_json(value),
        }),
        // Replies to client-sent frames (`{"ok": true, "reply_to": ..}`) carry no type.
        None => Frame::Ignored,
    }
}

/// Live Slack WebSocket connection in either Socket Mode or RTM.
pub struct WebSocketTransport {
    web: SlackWebClient,
    mode: ConnectionMode,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    rtm_sequence: AtomicU64,
}

impl WebSocketTransport {
    pub fn new(web: SlackWebClient, mode: ConnectionMode) -> Self {
        Self {
            web,
            mode,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            rtm_sequence: AtomicU64::new(0),
        }
    }

    fn parse(&self, text: &str) -> Frame {
        match self.mode {
            ConnectionMode::SocketMode { .. } => parse_socket_mode_frame(text),
            ConnectionMode::Rtm => {
                let sequence = self.rtm_sequence.fetch_add(1, Ordering::Relaxed) + 1;
                parse_rtm_frame(text, sequence)
            }
        }
    }

    async fn send(&self, message: Message) -> Result<(), String> {
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err("not connected".to_owned());
        };
        sink.send(message).await.map_err(|error| error.to_string())
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = match &self.mode {
            ConnectionMode::SocketMode { app_token } => {
                self.web.open_socket_mode_connection(app_token).await
            }
            ConnectionMode::Rtm => self.web.rtm_connect().await,
        }
        .map_err(|error| TransportError::Connect(error.to_string()))?;

        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, source) = stream.split();
        *self.writer.lock().await = Some(sink);
        *self.reader.lock().await = Some(source);

        info!(mode = self.mode.label(), "slack websocket connected");
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut reader = self.reader.lock().await;
        let Some(source) = reader.as_mut() else {
            return Err(TransportError::Receive("not connected".to_owned()));
        };

        loop {
            let message = match source.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Receive("stream ended".to_owned())),
            };

            match message {
                Message::Text(text) => match self.parse(text.as_str()) {
                    Frame::Envelope(envelope) => return Ok(Some(envelope)),
                    Frame::Hello => debug!(mode = self.mode.label(), "slack hello received"),
                    Frame::Reconnect { reason } => {
                        info!(reason = %reason, "slack requested reconnect");
                        let message = format!("server requested reconnect: {reason}");
                        return Err(TransportError::Receive(message));
                    }
                    Frame::Ignored => {}
                },
                Message::Ping(payload) => {
                    if let Err(error) = self.send(Message::Pong(payload)).await {
                        debug!(error = %error, "failed to answer websocket ping");
                    }
                }
                Message::Close(frame) => {
                    let reason =
                        frame.map(|frame| frame.reason.as_str().to_owned()).unwrap_or_default();
                    return Err(TransportError::Receive(format!("closed by server: {reason}")));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        if matches!(self.mode, ConnectionMode::Rtm) {
            return Ok(());
        }

        let ack = json!({ "envelope_id": envelope_id }).to_string();
        self.send(Message::Text(ack.into())).await.map_err(TransportError::Acknowledge)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.reader.lock().await.take();
        let Some(mut sink) = self.writer.lock().await.take() else {
            return Ok(());
        };
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
