//! Analysis view model and the per-agent payload shapes it is assembled from.
//!
//! Payload structs are deliberately lenient: every field is optional so a
//! partial payload only overwrites what it actually carries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::session::RepositoryRef;

/// The fixed set of backend agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentName {
    Diagnosis,
    Security,
    Onboarding,
    Recommend,
    Contributor,
    Comparison,
}

impl AgentName {
    pub fn all() -> &'static [AgentName] {
        &[
            AgentName::Diagnosis,
            AgentName::Security,
            AgentName::Onboarding,
            AgentName::Recommend,
            AgentName::Contributor,
            AgentName::Comparison,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::Diagnosis => "diagnosis",
            AgentName::Security => "security",
            AgentName::Onboarding => "onboarding",
            AgentName::Recommend => "recommend",
            AgentName::Contributor => "contributor",
            AgentName::Comparison => "comparison",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentName {
    type Err = String;

    /// Accepts the backend's wire names, including the `_agent` suffixed
    /// and pluralised spellings some pipeline stages use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let base = normalized.strip_suffix("_agent").unwrap_or(&normalized);
        match base {
            "diagnosis" => Ok(AgentName::Diagnosis),
            "security" => Ok(AgentName::Security),
            "onboarding" | "onboarding_plan" => Ok(AgentName::Onboarding),
            "recommend" | "recommendation" | "recommendations" => Ok(AgentName::Recommend),
            "contributor" | "contributor_guide" => Ok(AgentName::Contributor),
            "comparison" | "compare" => Ok(AgentName::Comparison),
            _ => Err(format!("unknown agent: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Complete,
    Error,
}

impl AgentStatus {
    /// Complete and Error end an agent's work for the current turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Complete | AgentStatus::Error)
    }
}

// ─── View model ──────────────────────────────────────────────

/// Merged projection of all agent outputs for one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisViewModel {
    pub repository: Option<RepositoryRef>,
    pub summary: Option<HealthSummary>,
    pub metrics: BTreeMap<String, f64>,
    pub security: Option<SecurityReport>,
    pub risks: Vec<Risk>,
    pub recommendations: Vec<Recommendation>,
    pub similar_projects: Vec<SimilarProject>,
    pub onboarding_plan: Option<OnboardingPlan>,
    pub contributor_guide: Option<ContributorGuide>,
    pub comparison: Option<ComparisonReport>,
}

impl AnalysisViewModel {
    pub fn for_repository(repository: RepositoryRef) -> Self {
        Self {
            repository: Some(repository),
            ..Self::default()
        }
    }

    /// True once any agent has contributed something worth keeping
    pub fn has_content(&self) -> bool {
        self.summary.is_some()
            || !self.metrics.is_empty()
            || self.security.is_some()
            || !self.risks.is_empty()
            || !self.recommendations.is_empty()
            || !self.similar_projects.is_empty()
            || self.onboarding_plan.is_some()
            || self.contributor_guide.is_some()
            || self.comparison.is_some()
    }

    pub fn repository_key(&self) -> Option<String> {
        self.repository.as_ref().map(RepositoryRef::full_name)
    }

    pub fn score(&self) -> Option<f64> {
        self.summary.as_ref().and_then(|s| s.score)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSummary {
    pub score: Option<f64>,
    pub level: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityReport {
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub vulnerabilities: Vec<Vulnerability>,
    /// Vulnerability count per severity
    pub breakdown: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vulnerability {
    pub id: Option<String>,
    pub package: Option<String>,
    pub severity: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Risk {
    pub title: String,
    pub severity: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarProject {
    pub full_name: String,
    pub url: Option<String>,
    pub stars: Option<u64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingPlan {
    pub experience_level: Option<String>,
    pub weeks: Vec<OnboardingWeek>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingWeek {
    pub week: u32,
    pub title: String,
    pub goals: Vec<String>,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributorGuide {
    pub summary: Option<String>,
    pub first_steps: Vec<String>,
    pub good_first_issues: Vec<IssueRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueRef {
    pub number: u64,
    pub title: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonReport {
    pub repositories: Vec<String>,
    pub summary: Option<String>,
    pub winner: Option<String>,
    pub scores: BTreeMap<String, f64>,
}

// ─── Agent payloads ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiagnosisPayload {
    #[serde(alias = "score")]
    pub health_score: Option<f64>,
    pub health_level: Option<String>,
    #[serde(alias = "description")]
    pub summary: Option<String>,
    pub metrics: Option<BTreeMap<String, f64>>,
    pub risks: Option<Vec<Risk>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityPayload {
    #[serde(alias = "security_score")]
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub vulnerabilities: Option<Vec<Vulnerability>>,
    #[serde(alias = "vulnerability_counts")]
    pub breakdown: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OnboardingPayload {
    pub experience_level: Option<String>,
    #[serde(alias = "plan", alias = "onboarding_plan")]
    pub weeks: Option<Vec<OnboardingWeek>>,
    pub similar_projects: Option<Vec<SimilarProject>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecommendPayload {
    pub recommendations: Option<Vec<Recommendation>>,
    pub similar_projects: Option<Vec<SimilarProject>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContributorPayload {
    pub summary: Option<String>,
    pub first_steps: Option<Vec<String>>,
    pub good_first_issues: Option<Vec<IssueRef>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComparisonPayload {
    pub repositories: Option<Vec<String>>,
    pub summary: Option<String>,
    pub winner: Option<String>,
    pub scores: Option<BTreeMap<String, f64>>,
}
