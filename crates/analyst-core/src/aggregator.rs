//! Agent result aggregation.
//!
//! Each agent owns a fixed slice of the [`AnalysisViewModel`]. The aggregator
//! keeps the last accepted payload per agent and the order agents completed
//! in; the view model is always `base` with those payloads replayed in that
//! order. A repeated completion moves the agent to the end of the order and
//! replaces its payload, so retries overwrite instead of accumulating.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use analyst_types::{
    AnalystError, Result,
    analysis::*,
    session::RepositoryRef,
};

/// Status and last payload of one agent in the current turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSlot {
    pub status: AgentStatus,
    pub result: Option<Value>,
}

impl Default for AgentSlot {
    fn default() -> Self {
        Self {
            status: AgentStatus::Idle,
            result: None,
        }
    }
}

/// What a completion did to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    First,
    /// Agent had already completed; payload replaced
    Repeat,
    /// Agent already failed this turn; payload dropped
    Ignored,
}

pub struct Aggregator {
    base: AnalysisViewModel,
    slots: BTreeMap<AgentName, AgentSlot>,
    order: Vec<AgentName>,
    view_model: AnalysisViewModel,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            base: AnalysisViewModel::default(),
            slots: fresh_slots(),
            order: Vec::new(),
            view_model: AnalysisViewModel::default(),
        }
    }

    /// New analysis turn: all agents idle, empty view model.
    pub fn begin_turn(&mut self, repository: RepositoryRef) {
        self.hydrate(AnalysisViewModel::for_repository(repository));
    }

    /// Replace the view model wholesale (cache hit, history navigation).
    pub fn hydrate(&mut self, view_model: AnalysisViewModel) {
        self.slots = fresh_slots();
        self.order.clear();
        self.base = view_model.clone();
        self.view_model = view_model;
    }

    /// Start a single-agent turn on top of the current view model,
    /// leaving the other agents' state alone.
    pub fn begin_agent(&mut self, agent: AgentName) {
        self.base = self.view_model.clone();
        self.order.clear();
        self.slots.insert(
            agent,
            AgentSlot {
                status: AgentStatus::Running,
                result: None,
            },
        );
    }

    pub fn view_model(&self) -> &AnalysisViewModel {
        &self.view_model
    }

    pub fn status(&self, agent: AgentName) -> AgentStatus {
        self.slots
            .get(&agent)
            .map(|s| s.status)
            .unwrap_or(AgentStatus::Idle)
    }

    pub fn slot(&self, agent: AgentName) -> Option<&AgentSlot> {
        self.slots.get(&agent)
    }

    pub fn statuses(&self) -> BTreeMap<AgentName, AgentStatus> {
        self.slots.iter().map(|(a, s)| (*a, s.status)).collect()
    }

    /// Agents that reported any activity this turn
    pub fn active_statuses(&self) -> BTreeMap<AgentName, AgentStatus> {
        self.slots
            .iter()
            .filter(|(_, s)| s.status != AgentStatus::Idle)
            .map(|(a, s)| (*a, s.status))
            .collect()
    }

    /// Returns false when the agent is already terminal.
    pub fn mark_running(&mut self, agent: AgentName) -> bool {
        let slot = self.slots.entry(agent).or_default();
        if slot.status.is_terminal() {
            return false;
        }
        slot.status = AgentStatus::Running;
        true
    }

    /// Merge an agent's payload. A payload that does not decode marks the
    /// agent failed and leaves the view model untouched.
    pub fn complete(&mut self, agent: AgentName, payload: Value) -> Result<Completion> {
        let previous = self.status(agent);
        if previous == AgentStatus::Error {
            log::warn!("Ignoring completion for failed agent {}", agent);
            return Ok(Completion::Ignored);
        }

        let mut scratch = self.view_model.clone();
        if let Err(e) = merge_agent_payload(&mut scratch, agent, &payload) {
            self.mark_error(agent);
            return Err(e);
        }

        let slot = self.slots.entry(agent).or_default();
        slot.status = AgentStatus::Complete;
        slot.result = Some(payload);
        self.order.retain(|a| *a != agent);
        self.order.push(agent);

        if previous == AgentStatus::Complete {
            log::debug!("Agent {} completed again; replacing its result", agent);
            self.rebuild();
            Ok(Completion::Repeat)
        } else {
            self.view_model = scratch;
            Ok(Completion::First)
        }
    }

    /// Mark an agent failed. A completed agent keeps its result.
    pub fn mark_error(&mut self, agent: AgentName) -> bool {
        let slot = self.slots.entry(agent).or_default();
        if slot.status.is_terminal() {
            return false;
        }
        slot.status = AgentStatus::Error;
        true
    }

    /// End of turn: agents still running are marked failed and returned.
    pub fn finalize(&mut self) -> Vec<AgentName> {
        let unfinished: Vec<AgentName> = self
            .slots
            .iter()
            .filter(|(_, s)| s.status == AgentStatus::Running)
            .map(|(a, _)| *a)
            .collect();
        for agent in &unfinished {
            self.mark_error(*agent);
        }
        unfinished
    }

    fn rebuild(&mut self) {
        let mut vm = self.base.clone();
        for agent in &self.order {
            if let Some(payload) = self.slots.get(agent).and_then(|s| s.result.as_ref()) {
                if let Err(e) = merge_agent_payload(&mut vm, *agent, payload) {
                    log::error!("Stored payload for {} no longer merges: {}", agent, e);
                }
            }
        }
        self.view_model = vm;
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_slots() -> BTreeMap<AgentName, AgentSlot> {
    AgentName::all()
        .iter()
        .map(|a| (*a, AgentSlot::default()))
        .collect()
}

// ─── Merge routines ──────────────────────────────────────────

/// Apply one agent's payload to the slice of the view model it owns.
pub fn merge_agent_payload(
    vm: &mut AnalysisViewModel,
    agent: AgentName,
    payload: &Value,
) -> Result<()> {
    let payload = normalize_payload(agent, payload);
    match agent {
        AgentName::Diagnosis => merge_diagnosis(vm, decode(agent, payload)?),
        AgentName::Security => merge_security(vm, decode(agent, payload)?),
        AgentName::Onboarding => merge_onboarding(vm, decode(agent, payload)?),
        AgentName::Recommend => merge_recommend(vm, decode(agent, payload)?),
        AgentName::Contributor => merge_contributor(vm, decode(agent, payload)?),
        AgentName::Comparison => merge_comparison(vm, decode(agent, payload)?),
    }
    Ok(())
}

/// Bare arrays are shorthand for the agent's main list.
fn normalize_payload(agent: AgentName, payload: &Value) -> Value {
    match (agent, payload) {
        (_, Value::Null) => Value::Object(Map::new()),
        (AgentName::Onboarding, Value::Array(_)) => {
            serde_json::json!({ "weeks": payload })
        }
        (AgentName::Recommend, Value::Array(_)) => {
            serde_json::json!({ "recommendations": payload })
        }
        (AgentName::Contributor, Value::Object(obj))
            if obj.get("guide").is_some_and(Value::is_object) =>
        {
            obj["guide"].clone()
        }
        _ => payload.clone(),
    }
}

fn decode<T: DeserializeOwned>(agent: AgentName, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| AnalystError::Agent {
        agent: agent.to_string(),
        message: format!("malformed payload: {}", e),
    })
}

fn merge_diagnosis(vm: &mut AnalysisViewModel, p: DiagnosisPayload) {
    if p.health_score.is_some() || p.health_level.is_some() || p.summary.is_some() {
        let summary = vm.summary.get_or_insert_with(HealthSummary::default);
        if let Some(score) = p.health_score {
            summary.score = Some(score);
        }
        if let Some(level) = p.health_level {
            summary.level = Some(level);
        }
        if let Some(text) = p.summary {
            summary.description = Some(text);
        }
    }
    if let Some(metrics) = p.metrics {
        vm.metrics.extend(metrics);
    }
    if let Some(risks) = p.risks {
        vm.risks = risks;
    }
}

fn merge_security(vm: &mut AnalysisViewModel, p: SecurityPayload) {
    let report = vm.security.get_or_insert_with(SecurityReport::default);
    if let Some(score) = p.score {
        report.score = Some(score);
    }
    if let Some(grade) = p.grade {
        report.grade = Some(grade);
    }
    match (p.vulnerabilities, p.breakdown) {
        (vulns, Some(breakdown)) => {
            if let Some(vulns) = vulns {
                report.vulnerabilities = vulns;
            }
            report.breakdown = breakdown;
        }
        (Some(vulns), None) => {
            report.breakdown = severity_counts(&vulns);
            report.vulnerabilities = vulns;
        }
        (None, None) => {}
    }
}

fn severity_counts(vulns: &[Vulnerability]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for v in vulns {
        let severity = if v.severity.is_empty() {
            "unknown".to_string()
        } else {
            v.severity.to_ascii_lowercase()
        };
        *counts.entry(severity).or_insert(0) += 1;
    }
    counts
}

fn merge_onboarding(vm: &mut AnalysisViewModel, p: OnboardingPayload) {
    if p.weeks.is_some() || p.experience_level.is_some() {
        let plan = vm.onboarding_plan.get_or_insert_with(OnboardingPlan::default);
        if let Some(weeks) = p.weeks {
            plan.weeks = weeks;
        }
        if let Some(level) = p.experience_level {
            plan.experience_level = Some(level);
        }
    }
    if let Some(similar) = p.similar_projects {
        vm.similar_projects = similar;
    }
}

fn merge_recommend(vm: &mut AnalysisViewModel, p: RecommendPayload) {
    if let Some(recommendations) = p.recommendations {
        vm.recommendations = recommendations;
    }
    if let Some(similar) = p.similar_projects {
        vm.similar_projects = similar;
    }
}

fn merge_contributor(vm: &mut AnalysisViewModel, p: ContributorPayload) {
    let guide = vm.contributor_guide.get_or_insert_with(ContributorGuide::default);
    if let Some(summary) = p.summary {
        guide.summary = Some(summary);
    }
    if let Some(steps) = p.first_steps {
        guide.first_steps = steps;
    }
    if let Some(issues) = p.good_first_issues {
        guide.good_first_issues = issues;
    }
}

fn merge_comparison(vm: &mut AnalysisViewModel, p: ComparisonPayload) {
    let report = vm.comparison.get_or_insert_with(ComparisonReport::default);
    if let Some(repos) = p.repositories {
        report.repositories = repos;
    }
    if let Some(summary) = p.summary {
        report.summary = Some(summary);
    }
    if let Some(winner) = p.winner {
        report.winner = Some(winner);
    }
    if let Some(scores) = p.scores {
        report.scores = scores;
    }
}
