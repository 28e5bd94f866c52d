//! Chat/request coordinator, the client's single entry point.
//!
//! Owns the dispatcher, session store, analysis cache and transport, and
//! turns user intents into transport calls:
//! 1. Validate synchronously (empty input, busy, missing repository)
//! 2. Classify the input as an analysis or a chat turn
//! 3. Serve analyses from the cache when fresh
//! 4. Send now, or queue until the channel reports `connected`
//!
//! REST-backed operations are split into `begin_*` / `finish_*` halves so
//! the caller can await the network call without holding a borrow.

use std::rc::Rc;

use chrono::Utc;
use serde_json::Value;

use analyst_types::{
    AnalystError, Result,
    analysis::{AgentName, AnalysisViewModel},
    config::ClientConfig,
    event::{ChannelState, ClientEvent, OutboundRequest, TransportEvent, collect_attachments},
    message::ChatMessage,
};

use crate::cache::AnalysisCache;
use crate::dispatcher::{Dispatcher, Effect, Indicators, Phase, TurnKind};
use crate::event_bus::EventBus;
use crate::history::UniqueRepository;
use crate::ports::{ReportFormat, StoragePort, TransportPort};
use crate::repository::{InputClass, classify_input};
use crate::session_store::SessionStore;

pub const EXPERIENCE_LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];

/// Arguments for the compare endpoint, tied to the turn that issued them
#[derive(Debug, Clone, PartialEq)]
pub struct CompareRequest {
    pub turn_id: u64,
    pub repo_urls: Vec<String>,
}

/// Arguments for the onboarding plan endpoint, tied to the turn that
/// issued them
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub turn_id: u64,
    pub repo_url: String,
    pub experience_level: String,
}

pub struct ChatCoordinator {
    pub config: ClientConfig,
    dispatcher: Dispatcher,
    session: SessionStore,
    cache: AnalysisCache,
    transport: Rc<dyn TransportPort>,
    bus: EventBus,
}

impl ChatCoordinator {
    pub fn new(
        config: ClientConfig,
        storage: Rc<dyn StoragePort>,
        transport: Rc<dyn TransportPort>,
        bus: EventBus,
    ) -> Self {
        let session = SessionStore::load(storage.clone());
        let cache = AnalysisCache::new(storage, config.cache_ttl_secs);
        let purged = cache.purge_expired(Utc::now());
        if purged > 0 {
            log::info!("Purged {} expired cached analyses", purged);
        }
        Self {
            config,
            dispatcher: Dispatcher::new(),
            session,
            cache,
            transport,
            bus,
        }
    }

    /// Open the channel, resuming the stored session if there is one.
    pub fn connect(&mut self) {
        log::info!(
            "Connecting via {} (session {:?})",
            self.transport.kind().label(),
            self.session.session_id()
        );
        self.transport.connect(self.session.session_id());
        self.bus.emit(ClientEvent::SessionChanged {
            session_id: self.session.session_id().map(String::from),
        });
    }

    // ─── Accessors ───────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.dispatcher.phase()
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn view_model(&self) -> &AnalysisViewModel {
        self.dispatcher.view_model()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.dispatcher.messages()
    }

    pub fn indicators(&self) -> Indicators {
        self.dispatcher.indicators()
    }

    pub fn suggestions(&self) -> &[String] {
        self.dispatcher.suggestions()
    }

    pub fn progress(&self) -> &str {
        self.dispatcher.progress()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.session_id()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn unique_repositories(&self) -> Vec<UniqueRepository> {
        self.dispatcher.history().unique_repositories()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ─── User intents ────────────────────────────────────────

    /// Submit user input. Validation failures return before any I/O.
    pub fn submit(&mut self, text: &str) -> Result<TurnKind> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalystError::Validation("Please enter a message".to_string()));
        }
        self.ensure_idle()?;
        self.session.record_turn();

        let kind = match classify_input(text) {
            InputClass::Analysis(repo) => {
                log::info!("Analysis requested for {}", repo);
                self.session.set_repository(Some(repo.clone()));

                if let Some(cached) = self.cache.lookup(&repo) {
                    self.dispatcher.hydrate_from_cache(text, cached);
                    self.flush();
                    return Ok(TurnKind::Analysis);
                }

                self.dispatcher
                    .begin_turn(TurnKind::Analysis, text, Some(repo.clone()));
                self.dispatch(OutboundRequest {
                    message: text.to_string(),
                    repository: Some(repo),
                });
                TurnKind::Analysis
            }
            InputClass::Chat => {
                let hint = self.session.get().repository.clone();
                self.dispatcher.begin_turn(TurnKind::Chat, text, hint.clone());
                self.dispatch(OutboundRequest {
                    message: text.to_string(),
                    repository: hint,
                });
                TurnKind::Chat
            }
        };

        self.flush();
        Ok(kind)
    }

    /// Stop the current turn. Indicators clear immediately, whatever the
    /// server does afterwards.
    pub fn cancel(&mut self) -> bool {
        if !self.dispatcher.is_busy() && !self.dispatcher.has_pending() {
            return false;
        }
        // Only streamed turns have a server-side request to stop; a queued
        // request never reached the server.
        let streamed = matches!(
            self.dispatcher.turn_kind(),
            Some(TurnKind::Analysis | TurnKind::Chat)
        );
        let expect_ack =
            streamed && !self.dispatcher.has_pending() && self.transport.cancel_in_flight();
        let cancelled = self.dispatcher.cancel_local(expect_ack);
        self.flush();
        cancelled
    }

    /// Drop the session and start over with a fresh connection.
    pub fn new_conversation(&mut self) {
        log::info!("Starting a new conversation");
        self.transport.disconnect();
        self.session.clear();
        self.dispatcher.reset();
        self.bus.emit(ClientEvent::SessionChanged { session_id: None });
        self.transport.connect(None);
        self.flush();
    }

    pub fn go_back(&mut self) -> bool {
        if self.dispatcher.is_busy() {
            return false;
        }
        let moved = self.dispatcher.go_back();
        self.flush();
        moved
    }

    pub fn go_forward(&mut self) -> bool {
        if self.dispatcher.is_busy() {
            return false;
        }
        let moved = self.dispatcher.go_forward();
        self.flush();
        moved
    }

    // ─── Inbound events ──────────────────────────────────────

    /// Fold one transport event into the state and run its effects.
    /// A rejected send needs no handling here: the channel reports it as
    /// an `Error` event, which ends the turn.
    pub fn handle_event(&mut self, event: TransportEvent) {
        let effects = self.dispatcher.handle(event);
        for effect in effects {
            self.apply(effect);
        }
        self.flush();
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::PersistSessionId(id) => {
                if self.session.session_id() != Some(id.as_str()) {
                    self.session.set_session_id(Some(id.clone()));
                    self.bus.emit(ClientEvent::SessionChanged {
                        session_id: Some(id),
                    });
                }
            }
            Effect::Send(request) => {
                log::debug!("Sending queued request");
                if !self.transport.send(&request) {
                    log::warn!("Queued request was rejected by the channel");
                }
            }
            Effect::CacheAnalysis { repository, view_model } => {
                self.cache.store(&repository, &view_model);
            }
        }
    }

    // ─── REST-backed operations ──────────────────────────────

    /// Validate a comparison of two analysed repositories (`owner/name`
    /// keys) and mark the coordinator busy.
    pub fn begin_compare(&mut self, keys: &[String]) -> Result<CompareRequest> {
        if keys.len() != 2 {
            return Err(AnalystError::Validation(
                "Select exactly two repositories to compare".to_string(),
            ));
        }
        if keys[0].eq_ignore_ascii_case(&keys[1]) {
            return Err(AnalystError::Validation(
                "Select two different repositories".to_string(),
            ));
        }
        self.ensure_idle()?;

        let history = self.dispatcher.history();
        let mut repo_urls = Vec::with_capacity(2);
        for key in keys {
            let entry = history.find(key).ok_or_else(|| {
                AnalystError::Validation(format!("{} has not been analysed yet", key))
            })?;
            let repo = entry.view_model.repository.as_ref().ok_or_else(|| {
                AnalystError::Validation(format!("{} has no repository", key))
            })?;
            repo_urls.push(repo.url());
        }

        let turn_id = self.dispatcher.begin_agent_turn(
            TurnKind::Comparison,
            AgentName::Comparison,
            &format!("Comparing {} and {}...", keys[0], keys[1]),
        );
        self.flush();
        Ok(CompareRequest { turn_id, repo_urls })
    }

    pub fn finish_compare(&mut self, request: &CompareRequest, result: Result<Value>) {
        let result = result.map(|v| agent_section(v, AgentName::Comparison));
        self.dispatcher.finish_agent_turn(
            request.turn_id,
            AgentName::Comparison,
            result,
            "Comparison ready.",
        );
        self.flush();
    }

    /// Validate a plan regeneration for the current repository.
    pub fn begin_plan_regeneration(&mut self, experience_level: &str) -> Result<PlanRequest> {
        let level = experience_level.trim().to_ascii_lowercase();
        if !EXPERIENCE_LEVELS.contains(&level.as_str()) {
            return Err(AnalystError::Validation(format!(
                "Unknown experience level: {}",
                experience_level
            )));
        }
        let repo = self
            .dispatcher
            .view_model()
            .repository
            .clone()
            .or_else(|| self.session.get().repository.clone())
            .ok_or_else(|| {
                AnalystError::Validation("Analyse a repository first".to_string())
            })?;
        self.ensure_idle()?;

        let turn_id = self.dispatcher.begin_agent_turn(
            TurnKind::PlanRegeneration,
            AgentName::Onboarding,
            &format!("Regenerating the {} onboarding plan for {}...", level, repo),
        );
        self.flush();
        Ok(PlanRequest {
            turn_id,
            repo_url: repo.url(),
            experience_level: level,
        })
    }

    pub fn finish_plan_regeneration(&mut self, request: &PlanRequest, result: Result<Value>) {
        let experience_level = request.experience_level.as_str();
        let result = result.map(|v| {
            let mut section = agent_section(v, AgentName::Onboarding);
            if let Value::Array(_) = section {
                section = serde_json::json!({ "weeks": section });
            }
            if let Some(obj) = section.as_object_mut() {
                obj.entry("experience_level")
                    .or_insert_with(|| Value::String(experience_level.to_string()));
            }
            section
        });
        self.dispatcher.finish_agent_turn(
            request.turn_id,
            AgentName::Onboarding,
            result,
            "Onboarding plan updated.",
        );
        self.flush();
    }

    /// Snapshot of the current report for export.
    pub fn prepare_export(&self, format: &str) -> Result<(AnalysisViewModel, ReportFormat)> {
        let format = ReportFormat::parse(format).ok_or_else(|| {
            AnalystError::Validation(format!("Unsupported export format: {}", format))
        })?;
        Ok((self.report_snapshot()?, format))
    }

    /// Snapshot of the current report for e-mailing.
    pub fn prepare_report_email(&self, email: &str) -> Result<(String, AnalysisViewModel)> {
        let email = email.trim();
        if !is_plausible_email(email) {
            return Err(AnalystError::Validation(
                "Please enter a valid e-mail address".to_string(),
            ));
        }
        Ok((email.to_string(), self.report_snapshot()?))
    }

    /// Record the outcome of an export or e-mail call in the transcript.
    pub fn note_outcome(&mut self, result: Result<String>) {
        let message = match result {
            Ok(text) => ChatMessage::system(text),
            Err(e) => {
                log::error!("{}", e);
                ChatMessage::error(e.to_string())
            }
        };
        self.dispatcher.note(message);
        self.flush();
    }

    // ─── Internals ───────────────────────────────────────────

    fn report_snapshot(&self) -> Result<AnalysisViewModel> {
        let vm = self.dispatcher.view_model();
        if !vm.has_content() {
            return Err(AnalystError::Validation(
                "There is no report to export yet".to_string(),
            ));
        }
        Ok(vm.clone())
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.dispatcher.phase() {
            Phase::Idle => Ok(()),
            Phase::Comparing => Err(AnalystError::Busy("a comparison is running".to_string())),
            Phase::RegeneratingPlan => Err(AnalystError::Busy(
                "the onboarding plan is being regenerated".to_string(),
            )),
            Phase::Analyzing | Phase::StreamingAnswer => {
                Err(AnalystError::Busy("a request is in progress".to_string()))
            }
        }
    }

    fn dispatch(&mut self, request: OutboundRequest) {
        match self.transport.state() {
            ChannelState::Open => {
                if !self.transport.send(&request) {
                    log::warn!("Request was rejected by the channel");
                }
            }
            ChannelState::Connecting | ChannelState::Handshaking => {
                log::debug!("Channel not ready; queueing request");
                self.dispatcher.queue(request);
            }
            ChannelState::Closed => {
                log::info!("Channel closed; queueing request and reconnecting");
                self.dispatcher.queue(request);
                self.transport.connect(self.session.session_id());
            }
        }
    }

    /// Move the dispatcher's accumulated notifications onto the bus.
    fn flush(&mut self) {
        for event in self.dispatcher.take_changes() {
            self.bus.emit(event);
        }
    }
}

/// The agent's own section of a REST response, or the whole response.
fn agent_section(response: Value, agent: AgentName) -> Value {
    collect_attachments(&response)
        .into_iter()
        .find(|a| a.agent == agent)
        .map(|a| a.payload)
        .unwrap_or(response)
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
