use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::DateFilter;

/// Product area a task ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Kanban,
    Insights,
    Roadmap,
    Ideation,
    Changelog,
    GithubPrs,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Kanban,
        Feature::Insights,
        Feature::Roadmap,
        Feature::Ideation,
        Feature::Changelog,
        Feature::GithubPrs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Kanban => "kanban",
            Feature::Insights => "insights",
            Feature::Roadmap => "roadmap",
            Feature::Ideation => "ideation",
            Feature::Changelog => "changelog",
            Feature::GithubPrs => "github-prs",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Feature::Kanban => "Kanban",
            Feature::Insights => "Insights",
            Feature::Roadmap => "Roadmap",
            Feature::Ideation => "Ideation",
            Feature::Changelog => "Changelog",
            Feature::GithubPrs => "GitHub PRs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal or in-flight status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Done,
    PrCreated,
    Staged,
    Error,
    InProgress,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::Done,
        Outcome::PrCreated,
        Outcome::Staged,
        Outcome::Error,
        Outcome::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Done => "done",
            Outcome::PrCreated => "pr_created",
            Outcome::Staged => "staged",
            Outcome::Error => "error",
            Outcome::InProgress => "in_progress",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|o| o.as_str() == s)
    }

    /// Done, staged, and PR-created all count as a successful run.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Done | Outcome::Staged | Outcome::PrCreated)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution stage of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Coding,
    Validation,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Planning, Phase::Coding, Phase::Validation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::Coding => "coding",
            Phase::Validation => "validation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Planning => "Planning",
            Phase::Coding => "Coding",
            Phase::Validation => "Validation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokens and time spent in one phase of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub phase: Phase,
    pub tokens: u64,
    pub duration_ms: u64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Optional token/cost detail reported alongside the totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

/// One recorded unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalytics {
    pub task_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub feature: Feature,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    #[serde(default)]
    pub phases: Vec<PhaseMetrics>,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub breakdown: Option<TokenBreakdown>,
}

impl TaskAnalytics {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseMetrics> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.task_id)
    }
}

/// Aggregate for one feature over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMetrics {
    pub feature: Feature,
    pub total_tokens: u64,
    pub task_count: u64,
    pub average_duration_ms: f64,
    pub success_count: u64,
    pub error_count: u64,
    pub in_progress_count: u64,
    /// Percentage of finished tasks that succeeded.
    pub success_rate: f64,
}

impl FeatureMetrics {
    pub fn empty(feature: Feature) -> Self {
        Self {
            feature,
            total_tokens: 0,
            task_count: 0,
            average_duration_ms: 0.0,
            success_count: 0,
            error_count: 0,
            in_progress_count: 0,
            success_rate: 0.0,
        }
    }
}

/// Token and time totals for one phase across a set of tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTotals {
    pub phase: Phase,
    pub tokens: u64,
    pub duration_ms: u64,
    pub task_count: u64,
    /// Percentage of the group's phase tokens spent in this phase.
    pub token_share: f64,
}

/// Snapshot of all analytics for one date filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub date_filter: DateFilter,
    pub total_tasks: u64,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub average_duration_ms: f64,
    pub success_count: u64,
    pub error_count: u64,
    pub in_progress_count: u64,
    pub success_rate: f64,
    pub total_cost_usd: Option<f64>,
    /// Every feature is present, including those with no tasks.
    pub by_feature: BTreeMap<Feature, FeatureMetrics>,
    pub tasks: Vec<TaskAnalytics>,
}

impl AnalyticsSummary {
    pub fn feature(&self, feature: Feature) -> Option<&FeatureMetrics> {
        self.by_feature.get(&feature)
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskAnalytics> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn tasks_for(&self, feature: Feature) -> impl Iterator<Item = &TaskAnalytics> {
        self.tasks.iter().filter(move |t| t.feature == feature)
    }

    pub fn is_empty(&self) -> bool {
        self.total_tasks == 0
    }
}
