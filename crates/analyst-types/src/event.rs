//! Wire frames and the events derived from them.
//!
//! Inbound frames from either channel decode into [`ServerFrame`] and are
//! normalised into a closed [`TransportEvent`]. Unknown `type` tags land in
//! an explicit `Unknown` variant instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::AgentName;
use crate::session::RepositoryRef;

// ─── Client → server ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every duplex connection; resumes a session when set
    Init { session_id: Option<String> },
    Analyze {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        repo: Option<String>,
    },
    Cancel,
    Ping,
}

impl ClientFrame {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A user request handed to a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub message: String,
    pub repository: Option<RepositoryRef>,
}

impl OutboundRequest {
    pub fn to_frame(&self) -> ClientFrame {
        ClientFrame::Analyze {
            message: self.message.clone(),
            owner: self.repository.as_ref().map(|r| r.owner.clone()),
            repo: self.repository.as_ref().map(|r| r.name.clone()),
        }
    }

    /// Body of a push-stream POST
    pub fn to_stream_body(&self, session_id: Option<&str>) -> Value {
        let mut body = serde_json::json!({ "message": self.message });
        if let Some(id) = session_id {
            body["session_id"] = Value::String(id.to_string());
        }
        if let Some(repo) = &self.repository {
            body["owner"] = Value::String(repo.owner.clone());
            body["repo"] = Value::String(repo.name.clone());
        }
        body
    }
}

// ─── Server → client ─────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(alias = "start")]
    Connected { session_id: Option<String> },
    #[serde(alias = "progress")]
    Processing {
        agent: Option<String>,
        message: Option<String>,
        #[serde(alias = "percent")]
        progress: Option<f64>,
    },
    AgentComplete {
        agent: String,
        result: Option<Value>,
        data: Option<Value>,
    },
    #[serde(alias = "final_answer")]
    Answer {
        content: Option<Value>,
        message: Option<Value>,
        data: Option<Value>,
        #[serde(default)]
        suggestions: Vec<String>,
    },
    Warning {
        message: Option<String>,
    },
    Error {
        message: Option<String>,
        error: Option<String>,
        agent: Option<String>,
    },
    Done,
    Cancelled,
    Pong,
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    pub fn decode(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_event(self) -> TransportEvent {
        match self {
            ServerFrame::Connected { session_id } => TransportEvent::Connected { session_id },
            ServerFrame::Processing { agent, message, progress } => TransportEvent::Progress {
                agent: agent.and_then(|a| a.parse().ok()),
                message: message.unwrap_or_default(),
                percent: progress.map(|p| p.clamp(0.0, 100.0) as u8),
            },
            ServerFrame::AgentComplete { agent, result, data } => match agent.parse() {
                Ok(agent) => TransportEvent::AgentComplete {
                    agent,
                    payload: result.or(data).unwrap_or(Value::Null),
                },
                Err(_) => TransportEvent::Unknown {
                    tag: format!("agent_complete:{}", agent),
                },
            },
            ServerFrame::Answer { content, message, data, suggestions } => {
                answer_event(content, message, data, suggestions)
            }
            ServerFrame::Warning { message } => TransportEvent::Warning {
                text: message.unwrap_or_else(|| "Warning from server".to_string()),
            },
            ServerFrame::Error { message, error, agent } => {
                let text = message
                    .or(error)
                    .unwrap_or_else(|| "Unknown server error".to_string());
                match agent.and_then(|a| a.parse().ok()) {
                    Some(agent) => TransportEvent::AgentError { agent, text },
                    None => TransportEvent::Error { text },
                }
            }
            ServerFrame::Done => TransportEvent::Done,
            ServerFrame::Cancelled => TransportEvent::Cancelled,
            ServerFrame::Pong => TransportEvent::HeartbeatAck,
            ServerFrame::Unknown => TransportEvent::Unknown { tag: "unknown".to_string() },
        }
    }
}

/// Decode one raw text frame. Malformed frames are logged and become
/// `Unknown` so the caller never has to handle a decode error.
pub fn decode_frame(text: &str) -> TransportEvent {
    match ServerFrame::decode(text) {
        Ok(ServerFrame::Unknown) => {
            let tag = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("type").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| "unknown".to_string());
            TransportEvent::Unknown { tag }
        }
        Ok(frame) => frame.into_event(),
        Err(e) => {
            log::warn!("Dropping malformed frame: {} ({})", e, text);
            TransportEvent::Unknown { tag: "malformed".to_string() }
        }
    }
}

fn answer_event(
    content: Option<Value>,
    message: Option<Value>,
    data: Option<Value>,
    mut suggestions: Vec<String>,
) -> TransportEvent {
    let mut text = None;
    let mut attachments = Vec::new();

    for value in [content, message, data].into_iter().flatten() {
        match value {
            Value::String(s) => {
                if text.is_none() {
                    text = Some(s);
                }
            }
            Value::Object(ref obj) => {
                if text.is_none() {
                    text = ["answer", "response", "content", "message"]
                        .iter()
                        .find_map(|k| obj.get(*k).and_then(Value::as_str))
                        .map(String::from);
                }
                if suggestions.is_empty() {
                    if let Some(Value::Array(items)) = obj.get("suggestions") {
                        suggestions = items
                            .iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect();
                    }
                }
                attachments.extend(collect_attachments(&value));
            }
            _ => {}
        }
    }

    TransportEvent::Answer {
        text: text.unwrap_or_default(),
        suggestions,
        attachments,
    }
}

/// Pull agent-named sections (`diagnosis`, `onboarding_plan`, ...) out of a
/// JSON object. Keys are checked in a fixed order so an agent appears once.
pub fn collect_attachments(value: &Value) -> Vec<AgentAttachment> {
    let Some(obj) = value.as_object() else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for (key, payload) in obj {
        if payload.is_null() {
            continue;
        }
        if let Ok(agent) = key.parse::<AgentName>() {
            if !seen.contains(&agent) {
                seen.push(agent);
                out.push(AgentAttachment {
                    agent,
                    payload: payload.clone(),
                });
            }
        }
    }
    out
}

/// An agent payload carried inside an answer or a REST response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAttachment {
    pub agent: AgentName,
    pub payload: Value,
}

/// Normalised inbound event, one variant per routing target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    Connected { session_id: Option<String> },
    Progress {
        agent: Option<AgentName>,
        message: String,
        percent: Option<u8>,
    },
    AgentComplete { agent: AgentName, payload: Value },
    AgentError { agent: AgentName, text: String },
    Answer {
        text: String,
        suggestions: Vec<String>,
        attachments: Vec<AgentAttachment>,
    },
    Warning { text: String },
    Error { text: String },
    Done,
    Cancelled,
    HeartbeatAck,
    /// The channel closed; `will_reconnect` is false once recovery is exhausted
    Disconnected { code: u16, will_reconnect: bool },
    Unknown { tag: String },
}

impl TransportEvent {
    /// Events after which a push stream read loop stops
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Done | TransportEvent::Error { .. })
    }

    /// Replay a non-streaming analysis response as agent completions.
    pub fn from_analysis_response(response: &Value) -> Vec<TransportEvent> {
        let mut events: Vec<TransportEvent> = collect_attachments(response)
            .into_iter()
            .map(|a| TransportEvent::AgentComplete {
                agent: a.agent,
                payload: a.payload,
            })
            .collect();
        events.push(TransportEvent::Done);
        events
    }
}

// ─── Connection state ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Closed,
    Connecting,
    /// Socket open, init sent, waiting for `connected`
    Handshaking,
    Open,
}

// ─── Client → presentation ───────────────────────────────────

/// Change notifications drained by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEvent {
    SessionChanged { session_id: Option<String> },
    TranscriptChanged,
    ViewModelChanged,
    IndicatorsChanged { typing: bool, streaming: bool },
    HistoryChanged { len: usize, cursor: Option<usize> },
    ProgressChanged { message: String },
    ConnectionChanged { connected: bool, reconnecting: bool },
}
