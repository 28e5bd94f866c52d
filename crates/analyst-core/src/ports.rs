//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `analyst-core` (pure Rust).
//! Browser implementations live in `analyst-platform`.
//! The core never imports platform code; it only depends on these traits.

use async_trait::async_trait;
use futures::channel::mpsc;
use serde_json::Value;

use analyst_types::{
    Result,
    analysis::AnalysisViewModel,
    config::TransportKind,
    event::{ChannelState, OutboundRequest, TransportEvent},
};

// ─── Storage Port ────────────────────────────────────────────

/// Client-local string storage (localStorage in the browser).
///
/// Synchronous: the only backing store in use is synchronous, and the
/// session store must be readable during construction.
pub trait StoragePort {
    /// Get a value by key
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    fn delete(&self, key: &str) -> Result<()>;

    /// List keys with a given prefix
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check if a key exists
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Transport Port ──────────────────────────────────────────

/// Where transports deliver inbound events.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// One delivery mechanism to the backend pipeline.
///
/// All methods return immediately. Results arrive on the [`EventSink`]
/// handed to the implementation at construction.
pub trait TransportPort {
    /// Open (or reuse) the channel, resuming `session_id` when given
    fn connect(&self, session_id: Option<&str>);

    /// Send a request. Returns false, and emits an error event, when the
    /// channel is not open. Never queues.
    fn send(&self, request: &OutboundRequest) -> bool;

    /// Stop the in-flight request: cancel frame or request abort. Returns
    /// true when the server was told and will close the request with a
    /// terminal frame; false when the request was dropped client-side.
    fn cancel_in_flight(&self) -> bool;

    /// Close without scheduling a reconnect
    fn disconnect(&self);

    fn state(&self) -> ChannelState;

    fn kind(&self) -> TransportKind;
}

// ─── REST Port ───────────────────────────────────────────────

/// Output format for `export_report`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Pdf,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "markdown",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "pdf" => Some(ReportFormat::Pdf),
            _ => None,
        }
    }
}

/// Plain request/response endpoints, no streaming
#[async_trait(?Send)]
pub trait RestPort {
    async fn analyze(&self, repo_url: &str) -> Result<Value>;

    async fn compare(&self, repo_urls: &[String]) -> Result<Value>;

    async fn generate_onboarding_plan(
        &self,
        repo_url: &str,
        experience_level: &str,
    ) -> Result<Value>;

    async fn export_report(
        &self,
        report: &AnalysisViewModel,
        format: ReportFormat,
    ) -> Result<Vec<u8>>;

    async fn send_report_pdf(&self, email: &str, report: &AnalysisViewModel) -> Result<()>;
}
