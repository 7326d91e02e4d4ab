//! Discord gateway client
//!
//! Keeps one websocket session alive (heartbeats, resume after drops) and
//! forwards READY and INTERACTION_CREATE as [`BotEvent`]s.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use super::models::{self, op, GatewayPayload, Hello, RawInteraction, Ready};
use crate::application::errors::BotError;
use crate::application::messaging::BotEvent;
use crate::domain::traits::BotInfo;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Close codes after which reconnecting cannot help
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// State needed to resume a dropped session
#[derive(Debug, Clone)]
struct ResumeState {
    session_id: String,
    url: String,
}

/// How a session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
}

pub struct Gateway {
    url: String,
    token: String,
    events: mpsc::Sender<BotEvent>,
    shutdown: CancellationToken,
    resume: Option<ResumeState>,
    sequence: Option<u64>,
}

impl Gateway {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        events: mpsc::Sender<BotEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            events,
            shutdown,
            resume: None,
            sequence: None,
        }
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Reconnect until shutdown or a fatal error
    pub async fn run(mut self) {
        loop {
            match self.session().await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Reconnect) => {
                    tracing::info!("Reconnecting to gateway");
                }
                Err(e @ BotError::Auth(_)) => {
                    tracing::error!("Gateway refused the session: {}", e);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Gateway session failed: {}, retrying in {:?}", e, RECONNECT_DELAY);
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
            }
        }
        let _ = self.events.send(BotEvent::Closed).await;
    }

    fn identify(&self) -> Value {
        json!({
            "op": op::IDENTIFY,
            "d": {
                "token": self.token,
                "intents": models::INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "lucky-draw-bot",
                    "device": "lucky-draw-bot",
                }
            }
        })
    }

    fn heartbeat(&self) -> WsMessage {
        WsMessage::Text(json!({ "op": op::HEARTBEAT, "d": self.sequence }).to_string())
    }

    async fn session(&mut self) -> Result<SessionEnd, BotError> {
        let url = match &self.resume {
            Some(resume) => format!("{}/?v=10&encoding=json", resume.url.trim_end_matches('/')),
            None => self.url.clone(),
        };
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let hello = match read.next().await {
            Some(Ok(WsMessage::Text(text))) => parse_hello(&text)?,
            Some(Ok(other)) => return Err(BotError::Parse(format!("expected HELLO, got {:?}", other))),
            Some(Err(e)) => return Err(BotError::Network(e.to_string())),
            None => return Err(BotError::GatewayClosed("closed before HELLO".into())),
        };

        let greeting = match (&self.resume, self.sequence) {
            (Some(resume), Some(seq)) => json!({
                "op": op::RESUME,
                "d": { "token": self.token, "session_id": resume.session_id, "seq": seq }
            }),
            _ => self.identify(),
        };
        write
            .send(WsMessage::Text(greeting.to_string()))
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let period = Duration::from_millis(hello.heartbeat_interval);
        let mut beat = interval_at(Instant::now() + period, period);
        let mut acked = true;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = beat.tick() => {
                    if !acked {
                        tracing::warn!("Heartbeat not acknowledged, dropping connection");
                        return Ok(SessionEnd::Reconnect);
                    }
                    acked = false;
                    write.send(self.heartbeat()).await.map_err(|e| BotError::Network(e.to_string()))?;
                }
                message = read.next() => {
                    let text = match message {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code)).unwrap_or(1000);
                            if FATAL_CLOSE_CODES.contains(&code) {
                                return Err(BotError::Auth(format!("gateway closed with code {}", code)));
                            }
                            tracing::warn!("Gateway closed with code {}", code);
                            return Ok(SessionEnd::Reconnect);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(BotError::Network(e.to_string())),
                        None => return Err(BotError::GatewayClosed("stream ended".into())),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!("Unreadable gateway payload: {}", e);
                            continue;
                        }
                    };
                    if let Some(seq) = payload.s {
                        self.sequence = Some(seq);
                    }

                    match payload.op {
                        op::DISPATCH => self.dispatch(payload).await,
                        op::HEARTBEAT => {
                            write.send(self.heartbeat()).await.map_err(|e| BotError::Network(e.to_string()))?;
                        }
                        op::HEARTBEAT_ACK => acked = true,
                        op::RECONNECT => return Ok(SessionEnd::Reconnect),
                        op::INVALID_SESSION => {
                            if !payload.d.as_bool().unwrap_or(false) {
                                self.resume = None;
                                self.sequence = None;
                            }
                            tokio::time::sleep(Duration::from_secs(2)).await;
                            return Ok(SessionEnd::Reconnect);
                        }
                        other => tracing::debug!("Ignoring gateway opcode {}", other),
                    }
                }
            }
        }
    }

    async fn dispatch(&mut self, payload: GatewayPayload) {
        match payload.t.as_deref() {
            Some("READY") => match serde_json::from_value::<Ready>(payload.d) {
                Ok(ready) => {
                    self.resume = Some(ResumeState {
                        session_id: ready.session_id,
                        url: ready.resume_gateway_url,
                    });
                    let info = BotInfo {
                        id: ready.user.id.clone(),
                        name: ready.user.global_name.clone().unwrap_or_else(|| ready.user.username.clone()),
                        username: ready.user.username,
                    };
                    let _ = self.events.send(BotEvent::Ready(info)).await;
                }
                Err(e) => tracing::error!("Malformed READY: {}", e),
            },
            Some("RESUMED") => tracing::info!("Gateway session resumed"),
            Some("INTERACTION_CREATE") => {
                match serde_json::from_value::<RawInteraction>(payload.d).map(RawInteraction::into_interaction) {
                    Ok(Some(interaction)) => {
                        let _ = self.events.send(BotEvent::Interaction(interaction)).await;
                    }
                    Ok(None) => tracing::debug!("Ignoring unsupported interaction"),
                    Err(e) => tracing::warn!("Malformed interaction: {}", e),
                }
            }
            _ => {}
        }
    }
}

fn parse_hello(text: &str) -> Result<Hello, BotError> {
    let payload: GatewayPayload = serde_json::from_str(text).map_err(|e| BotError::Parse(e.to_string()))?;
    if payload.op != op::HELLO {
        return Err(BotError::Parse(format!("expected HELLO, got opcode {}", payload.op)));
    }
    serde_json::from_value(payload.d).map_err(|e| BotError::Parse(e.to_string()))
}
