use serde::{Deserialize, Serialize};

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub transport: TransportKind,
    pub keepalive_interval_ms: u32,
    pub reconnect: ReconnectConfig,
    /// How long a cached analysis stays valid
    pub cache_ttl_secs: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            transport: TransportKind::WebSocket,
            keepalive_interval_ms: 30_000,
            reconnect: ReconnectConfig::default(),
            cache_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub ws_path: String,
    pub stream_path: String,
    pub api_prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ws_path: "/ws/chat".to_string(),
            stream_path: "/api/chat/stream".to_string(),
            api_prefix: "/api".to_string(),
        }
    }
}

impl BackendConfig {
    fn trimmed_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Duplex endpoint, with the http scheme swapped for ws.
    pub fn ws_url(&self, session_id: Option<&str>) -> String {
        let base = self.trimmed_base();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        match session_id {
            Some(id) if !id.is_empty() => format!("{}{}?session_id={}", base, self.ws_path, id),
            _ => format!("{}{}", base, self.ws_path),
        }
    }

    pub fn stream_url(&self) -> String {
        format!("{}{}", self.trimmed_base(), self.stream_path)
    }

    /// REST endpoint under the api prefix, e.g. `endpoint("analyze")`
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}{}/{}", self.trimmed_base(), self.api_prefix, name)
    }
}

/// Which delivery mechanism the client talks to the backend through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    WebSocket,
    PushStream,
    /// Plain request/response, no streaming
    Rest,
}

impl TransportKind {
    pub fn label(&self) -> &str {
        match self {
            TransportKind::WebSocket => "WebSocket",
            TransportKind::PushStream => "Push stream",
            TransportKind::Rest => "REST",
        }
    }

    pub fn all() -> &'static [TransportKind] {
        &[
            TransportKind::WebSocket,
            TransportKind::PushStream,
            TransportKind::Rest,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u32,
    pub max_delay_ms: u32,
    /// Consecutive failed reconnects before the error is surfaced
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 3_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}
