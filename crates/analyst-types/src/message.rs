use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{AgentName, AgentStatus};
use crate::session::RepositoryRef;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub body: MessageBody,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageBody {
    Text(String),
    /// Non-fatal notice; the turn continues
    Warning(String),
    /// The turn (or one agent) failed
    Error(String),
    /// Live aggregation progress, mutated in place until its turn ends
    Report(ReportGeneration),
}

impl MessageBody {
    pub fn as_text(&self) -> &str {
        match self {
            MessageBody::Text(s) | MessageBody::Warning(s) | MessageBody::Error(s) => s,
            MessageBody::Report(r) => &r.progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportGeneration {
    pub repository: RepositoryRef,
    pub agents: BTreeMap<AgentName, AgentStatus>,
    pub progress: String,
    pub complete: bool,
}

impl ReportGeneration {
    pub fn new(repository: RepositoryRef) -> Self {
        Self {
            repository,
            agents: BTreeMap::new(),
            progress: "Starting analysis...".to_string(),
            complete: false,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.agents
            .values()
            .filter(|s| **s == AgentStatus::Complete)
            .count()
    }
}

impl ChatMessage {
    fn with_body(role: Role, body: MessageBody) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            body,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_body(Role::User, MessageBody::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_body(Role::Assistant, MessageBody::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_body(Role::System, MessageBody::Text(text.into()))
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::with_body(Role::System, MessageBody::Warning(text.into()))
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::with_body(Role::Assistant, MessageBody::Error(text.into()))
    }

    pub fn report(report: ReportGeneration) -> Self {
        Self::with_body(Role::Assistant, MessageBody::Report(report))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, MessageBody::Error(_))
    }
}
