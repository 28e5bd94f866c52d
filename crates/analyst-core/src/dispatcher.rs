//! Inbound event reducer.
//!
//! `handle` folds one [`TransportEvent`] into the client state and returns
//! the side effects the coordinator must perform. The dispatcher itself
//! does no I/O. Every state change is recorded as a [`ClientEvent`] and
//! collected with [`Dispatcher::take_changes`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use analyst_types::{
    Result,
    analysis::{AgentName, AnalysisViewModel},
    event::{AgentAttachment, ClientEvent, OutboundRequest, TransportEvent},
    message::{ChatMessage, ReportGeneration},
    session::RepositoryRef,
};

use crate::aggregator::{Aggregator, Completion};
use crate::history::HistoryNavigator;
use crate::transcript::Transcript;

/// Side effects requested by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistSessionId(String),
    Send(OutboundRequest),
    CacheAnalysis {
        repository: RepositoryRef,
        view_model: AnalysisViewModel,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Analysis,
    Chat,
    Comparison,
    PlanRegeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Analyzing,
    StreamingAnswer,
    Comparing,
    RegeneratingPlan,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicators {
    pub typing: bool,
    pub streaming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnEnd {
    Done,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone)]
struct Turn {
    id: u64,
    kind: TurnKind,
    repository: Option<RepositoryRef>,
    report_id: Option<String>,
    /// Set once the first event for this turn arrived
    receiving: bool,
}

pub struct Dispatcher {
    aggregator: Aggregator,
    transcript: Transcript,
    history: HistoryNavigator,
    indicators: Indicators,
    turn: Option<Turn>,
    pending: Option<OutboundRequest>,
    /// Cancelled requests whose terminal frame has not arrived yet. Frames
    /// received meanwhile belong to them, not to the current turn.
    awaiting_cancel_ack: u32,
    next_turn_id: u64,
    suggestions: Vec<String>,
    progress: String,
    changes: Vec<ClientEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            aggregator: Aggregator::new(),
            transcript: Transcript::new(),
            history: HistoryNavigator::new(),
            indicators: Indicators::default(),
            turn: None,
            pending: None,
            awaiting_cancel_ack: 0,
            next_turn_id: 0,
            suggestions: Vec::new(),
            progress: String::new(),
            changes: Vec::new(),
        }
    }

    // ─── Accessors ───────────────────────────────────────────

    pub fn view_model(&self) -> &AnalysisViewModel {
        self.aggregator.view_model()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn history(&self) -> &HistoryNavigator {
        &self.history
    }

    pub fn indicators(&self) -> Indicators {
        self.indicators
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn progress(&self) -> &str {
        &self.progress
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.turn.is_some()
    }

    pub fn turn_kind(&self) -> Option<TurnKind> {
        self.turn.as_ref().map(|t| t.kind)
    }

    /// Id of the active turn
    pub fn turn_id(&self) -> Option<u64> {
        self.turn.as_ref().map(|t| t.id)
    }

    pub fn awaiting_cancel_ack(&self) -> u32 {
        self.awaiting_cancel_ack
    }

    pub fn phase(&self) -> Phase {
        match &self.turn {
            None => Phase::Idle,
            Some(turn) => match turn.kind {
                TurnKind::Comparison => Phase::Comparing,
                TurnKind::PlanRegeneration => Phase::RegeneratingPlan,
                TurnKind::Analysis | TurnKind::Chat if turn.receiving => Phase::StreamingAnswer,
                TurnKind::Analysis | TurnKind::Chat => Phase::Analyzing,
            },
        }
    }

    /// Notifications accumulated since the last call
    pub fn take_changes(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.changes)
    }

    // ─── Turn control ────────────────────────────────────────

    /// Start a streamed turn. Analysis turns reset the board and add a
    /// live report message.
    pub fn begin_turn(
        &mut self,
        kind: TurnKind,
        user_text: &str,
        repository: Option<RepositoryRef>,
    ) {
        self.append(ChatMessage::user(user_text));
        self.suggestions.clear();

        let mut report_id = None;
        if kind == TurnKind::Analysis {
            if let Some(repo) = &repository {
                self.aggregator.begin_turn(repo.clone());
                let report = ChatMessage::report(ReportGeneration::new(repo.clone()));
                report_id = Some(self.append(report));
                self.changed(ClientEvent::ViewModelChanged);
            }
        }

        let id = self.allocate_turn_id();
        self.turn = Some(Turn {
            id,
            kind,
            repository,
            report_id,
            receiving: false,
        });
        self.set_progress(match kind {
            TurnKind::Analysis => "Starting analysis...",
            _ => "Thinking...",
        });
        self.set_indicators(true, false);
    }

    /// Start a single-agent turn served by a REST call. The returned id
    /// must be handed back to [`Dispatcher::finish_agent_turn`].
    pub fn begin_agent_turn(&mut self, kind: TurnKind, agent: AgentName, notice: &str) -> u64 {
        self.aggregator.begin_agent(agent);
        let id = self.allocate_turn_id();
        self.turn = Some(Turn {
            id,
            kind,
            repository: self.aggregator.view_model().repository.clone(),
            report_id: None,
            receiving: false,
        });
        self.append(ChatMessage::system(notice));
        self.set_progress(notice);
        self.set_indicators(true, false);
        id
    }

    /// Finish single-agent turn `turn_id` with the REST result. Results
    /// for a turn that was cancelled or replaced are dropped.
    pub fn finish_agent_turn(
        &mut self,
        turn_id: u64,
        agent: AgentName,
        result: Result<Value>,
        success: &str,
    ) {
        if self.turn_id() != Some(turn_id) {
            log::debug!("Dropping {} result: turn {} no longer active", agent, turn_id);
            return;
        }

        match result {
            Ok(payload) => match self.aggregator.complete(agent, payload) {
                Ok(_) => {
                    self.changed(ClientEvent::ViewModelChanged);
                    self.append(ChatMessage::assistant(success));
                }
                Err(e) => {
                    self.append(ChatMessage::warning(e.to_string()));
                }
            },
            Err(e) => {
                self.aggregator.mark_error(agent);
                self.append(ChatMessage::error(e.to_string()));
            }
        }
        self.turn = None;
        self.set_progress("");
        self.set_indicators(false, false);
    }

    /// Append a standalone message outside any turn.
    pub fn note(&mut self, message: ChatMessage) {
        self.append(message);
    }

    /// Hold a request until the channel reports `Connected`.
    pub fn queue(&mut self, request: OutboundRequest) {
        if self.pending.replace(request).is_some() {
            log::warn!("Replacing a request that was still waiting for the connection");
        }
    }

    /// Show a cached analysis without touching the network.
    pub fn hydrate_from_cache(&mut self, user_text: &str, view_model: AnalysisViewModel) {
        self.append(ChatMessage::user(user_text));
        let name = view_model.repository_key().unwrap_or_default();
        self.aggregator.hydrate(view_model.clone());
        self.history.add(view_model);
        self.suggestions.clear();
        self.append(ChatMessage::assistant(format!(
            "Showing the saved analysis of {} from the last hour.",
            name
        )));
        self.changed(ClientEvent::ViewModelChanged);
        self.history_changed();
    }

    /// End the turn locally. Returns false when nothing was running.
    /// `expect_ack` is set when the server was asked to stop and will close
    /// the request with a terminal frame of its own.
    pub fn cancel_local(&mut self, expect_ack: bool) -> bool {
        self.pending = None;
        if self.turn.is_none() {
            return false;
        }
        if expect_ack {
            self.awaiting_cancel_ack += 1;
        }
        self.finalize(TurnEnd::Cancelled);
        self.append(ChatMessage::system("Request cancelled."));
        true
    }

    /// Fail the active turn with a readable message.
    pub fn fail_turn(&mut self, text: &str) {
        self.pending = None;
        self.append(ChatMessage::error(text));
        self.finalize(TurnEnd::Failed);
    }

    pub fn go_back(&mut self) -> bool {
        let Some(vm) = self.history.go_back().cloned() else {
            return false;
        };
        self.show_history_entry(vm);
        true
    }

    pub fn go_forward(&mut self) -> bool {
        let Some(vm) = self.history.go_forward().cloned() else {
            return false;
        };
        self.show_history_entry(vm);
        true
    }

    /// Forget everything: transcript, view model, history.
    pub fn reset(&mut self) {
        self.aggregator = Aggregator::new();
        self.transcript.clear();
        self.history.clear();
        self.turn = None;
        self.pending = None;
        self.awaiting_cancel_ack = 0;
        self.suggestions.clear();
        self.set_progress("");
        self.set_indicators(false, false);
        self.changed(ClientEvent::TranscriptChanged);
        self.changed(ClientEvent::ViewModelChanged);
        self.history_changed();
    }

    // ─── Reducer ─────────────────────────────────────────────

    pub fn handle(&mut self, event: TransportEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.absorb_cancelled_frame(&event) {
            return effects;
        }

        match event {
            TransportEvent::Connected { session_id } => {
                log::info!("Channel connected (session {:?})", session_id);
                self.awaiting_cancel_ack = 0;
                if let Some(id) = session_id.filter(|id| !id.is_empty()) {
                    effects.push(Effect::PersistSessionId(id));
                }
                self.changed(ClientEvent::ConnectionChanged {
                    connected: true,
                    reconnecting: false,
                });
                if let Some(request) = self.pending.take() {
                    effects.push(Effect::Send(request));
                }
            }

            TransportEvent::Progress { agent, message, percent } => {
                if !self.mark_receiving() {
                    log::debug!("Progress outside a turn: {}", message);
                    return effects;
                }
                if let Some(agent) = agent {
                    self.aggregator.mark_running(agent);
                }
                let text = match (message.is_empty(), agent, percent) {
                    (false, _, Some(p)) => format!("{} ({}%)", message, p),
                    (false, _, None) => message,
                    (true, Some(agent), _) => format!("Running {} agent...", agent),
                    (true, None, _) => "Working...".to_string(),
                };
                self.set_progress(&text);
                self.set_indicators(self.indicators.typing, true);
                self.sync_report();
            }

            TransportEvent::AgentComplete { agent, payload } => {
                if !self.mark_receiving() {
                    log::debug!("Dropping {} result outside a turn", agent);
                    return effects;
                }
                self.apply_agent_payload(agent, payload);
                self.set_indicators(self.indicators.typing, true);
                self.sync_report();
            }

            TransportEvent::AgentError { agent, text } => {
                if !self.mark_receiving() {
                    log::debug!("Dropping {} error outside a turn", agent);
                    return effects;
                }
                self.aggregator.mark_error(agent);
                self.append(ChatMessage::error(format!("The {} agent failed: {}", agent, text)));
                self.sync_report();
            }

            TransportEvent::Answer { text, suggestions, attachments } => {
                if self.turn.is_none() {
                    log::debug!("Dropping answer outside a turn");
                    return effects;
                }
                self.mark_receiving();
                if !text.trim().is_empty() {
                    self.append(ChatMessage::assistant(text));
                }
                if !suggestions.is_empty() {
                    self.suggestions = suggestions;
                }
                self.apply_attachments(attachments);
                self.set_indicators(false, false);
                self.sync_report();
                if self.turn_kind() == Some(TurnKind::Chat) {
                    effects.extend(self.finalize(TurnEnd::Done));
                }
            }

            TransportEvent::Warning { text } => {
                self.append(ChatMessage::warning(text));
            }

            TransportEvent::Error { text } => {
                log::error!("Server error: {}", text);
                self.pending = None;
                self.append(ChatMessage::error(text));
                self.finalize(TurnEnd::Failed);
            }

            TransportEvent::Done => {
                effects.extend(self.finalize(TurnEnd::Done));
            }

            TransportEvent::Cancelled => {
                effects.extend(self.finalize(TurnEnd::Cancelled));
            }

            TransportEvent::HeartbeatAck => {}

            TransportEvent::Disconnected { code, will_reconnect } => {
                self.awaiting_cancel_ack = 0;
                self.changed(ClientEvent::ConnectionChanged {
                    connected: false,
                    reconnecting: will_reconnect,
                });
                if !will_reconnect && self.turn.is_some() {
                    self.fail_turn(&format!("Connection lost (code {}).", code));
                }
            }

            TransportEvent::Unknown { tag } => {
                log::debug!("Ignoring frame of type {}", tag);
            }
        }

        effects
    }

    // ─── Internals ───────────────────────────────────────────

    fn allocate_turn_id(&mut self) -> u64 {
        self.next_turn_id += 1;
        self.next_turn_id
    }

    /// Swallow frames of a cancelled request. Its terminal frame
    /// (`cancelled`, `done` or `error`) settles one outstanding cancel.
    fn absorb_cancelled_frame(&mut self, event: &TransportEvent) -> bool {
        if self.awaiting_cancel_ack == 0 {
            return false;
        }
        match event {
            TransportEvent::Cancelled | TransportEvent::Done | TransportEvent::Error { .. } => {
                self.awaiting_cancel_ack -= 1;
                log::debug!("Cancelled request closed by {:?}", event);
                true
            }
            TransportEvent::Progress { .. }
            | TransportEvent::AgentComplete { .. }
            | TransportEvent::AgentError { .. }
            | TransportEvent::Answer { .. } => {
                log::debug!("Dropping frame of a cancelled request");
                true
            }
            _ => false,
        }
    }

    fn apply_attachments(&mut self, attachments: Vec<AgentAttachment>) {
        for attachment in attachments {
            self.apply_agent_payload(attachment.agent, attachment.payload);
        }
    }

    fn apply_agent_payload(&mut self, agent: AgentName, payload: Value) {
        match self.aggregator.complete(agent, payload) {
            Ok(Completion::Ignored) => {}
            Ok(_) => self.changed(ClientEvent::ViewModelChanged),
            Err(e) => {
                log::warn!("{}", e);
                self.append(ChatMessage::warning(e.to_string()));
            }
        }
    }

    /// Ends the turn and returns the effects of a finished analysis.
    fn finalize(&mut self, end: TurnEnd) -> Vec<Effect> {
        let Some(turn) = self.turn.take() else {
            return Vec::new();
        };
        let mut effects = Vec::new();

        if end != TurnEnd::Failed {
            let unfinished = self.aggregator.finalize();
            if !unfinished.is_empty() {
                let names: Vec<&str> = unfinished.iter().map(AgentName::as_str).collect();
                self.append(ChatMessage::warning(format!(
                    "Some agents did not finish: {}",
                    names.join(", ")
                )));
            }
        }

        if let Some(id) = &turn.report_id {
            let statuses = self.aggregator.active_statuses();
            let label = match end {
                TurnEnd::Done => "Analysis complete",
                TurnEnd::Cancelled => "Analysis cancelled",
                TurnEnd::Failed => "Analysis failed",
            };
            self.transcript.update_report(id, |report| {
                report.agents = statuses;
                report.progress = label.to_string();
                report.complete = true;
            });
            self.changed(ClientEvent::TranscriptChanged);
        }

        if turn.kind == TurnKind::Analysis && end != TurnEnd::Failed {
            let vm = self.aggregator.view_model().clone();
            if vm.has_content() {
                self.history.add(vm.clone());
                self.history_changed();
                if end == TurnEnd::Done {
                    if let Some(repository) = turn.repository {
                        effects.push(Effect::CacheAnalysis {
                            repository,
                            view_model: vm,
                        });
                    }
                }
            }
        }

        self.set_progress("");
        self.set_indicators(false, false);
        effects
    }

    fn show_history_entry(&mut self, view_model: AnalysisViewModel) {
        self.aggregator.hydrate(view_model);
        self.changed(ClientEvent::ViewModelChanged);
        self.history_changed();
    }

    fn mark_receiving(&mut self) -> bool {
        match self.turn.as_mut() {
            Some(turn) => {
                turn.receiving = true;
                true
            }
            None => false,
        }
    }

    fn sync_report(&mut self) {
        let Some(id) = self.turn.as_ref().and_then(|t| t.report_id.clone()) else {
            return;
        };
        let statuses = self.aggregator.active_statuses();
        let progress = self.progress.clone();
        if self.transcript.update_report(&id, |report| {
            report.agents = statuses;
            if !progress.is_empty() {
                report.progress = progress;
            }
        }) {
            self.changed(ClientEvent::TranscriptChanged);
        }
    }

    fn append(&mut self, message: ChatMessage) -> String {
        let id = self.transcript.push(message);
        self.changed(ClientEvent::TranscriptChanged);
        id
    }

    fn set_indicators(&mut self, typing: bool, streaming: bool) {
        let next = Indicators { typing, streaming };
        if self.indicators != next {
            self.indicators = next;
            self.changed(ClientEvent::IndicatorsChanged { typing, streaming });
        }
    }

    fn set_progress(&mut self, text: &str) {
        if self.progress != text {
            self.progress = text.to_string();
            self.changed(ClientEvent::ProgressChanged {
                message: self.progress.clone(),
            });
        }
    }

    fn history_changed(&mut self) {
        self.changed(ClientEvent::HistoryChanged {
            len: self.history.len(),
            cursor: self.history.cursor(),
        });
    }

    fn changed(&mut self, event: ClientEvent) {
        if self.changes.last() != Some(&event) {
            self.changes.push(event);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
