//! Pure view selection from a summary and the current drill-down level.

use serde::Serialize;

use crate::analytics::{
    self, AnalyticsSummary, Feature, FeatureMetrics, PhaseMetrics, PhaseTotals, TaskAnalytics,
};
use crate::drilldown::DrillDownState;

/// One row of the overview's feature table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow<'a> {
    pub label: &'static str,
    pub metrics: &'a FeatureMetrics,
    /// Percentage of the period's tokens spent in this feature.
    pub token_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewModel<'a> {
    Overview {
        summary: &'a AnalyticsSummary,
        features: Vec<FeatureRow<'a>>,
    },
    Feature {
        metrics: &'a FeatureMetrics,
        /// Newest first.
        tasks: Vec<&'a TaskAnalytics>,
        phases: Vec<PhaseTotals>,
    },
    Task {
        task: &'a TaskAnalytics,
    },
    Phase {
        task: &'a TaskAnalytics,
        metrics: &'a PhaseMetrics,
    },
    /// The selection points at something this summary doesn't contain,
    /// e.g. a task outside a newly chosen date filter.
    NotFound {
        state: DrillDownState,
    },
}

pub fn view_model<'a>(summary: &'a AnalyticsSummary, state: &DrillDownState) -> ViewModel<'a> {
    let not_found = || ViewModel::NotFound {
        state: state.clone(),
    };

    match state {
        DrillDownState::Overview => ViewModel::Overview {
            summary,
            features: feature_rows(summary),
        },
        DrillDownState::Feature { feature } => match summary.feature(*feature) {
            Some(metrics) => feature_view(summary, *feature, metrics),
            None => not_found(),
        },
        DrillDownState::Task { feature, task_id } => match find_task(summary, *feature, task_id) {
            Some(task) => ViewModel::Task { task },
            None => not_found(),
        },
        DrillDownState::Phase {
            feature,
            task_id,
            phase,
        } => find_task(summary, *feature, task_id)
            .and_then(|task| task.phase(*phase).map(|metrics| ViewModel::Phase { task, metrics }))
            .unwrap_or_else(not_found),
    }
}

/// Feature rows with activity, heaviest token users first. Features with
/// no tasks in the period are left out.
pub fn feature_rows(summary: &AnalyticsSummary) -> Vec<FeatureRow<'_>> {
    let mut rows: Vec<FeatureRow<'_>> = summary
        .by_feature
        .values()
        .filter(|m| m.task_count > 0)
        .map(|metrics| FeatureRow {
            label: metrics.feature.label(),
            metrics,
            token_share: analytics::token_share(summary, metrics.feature),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.metrics
            .total_tokens
            .cmp(&a.metrics.total_tokens)
            .then(a.metrics.feature.cmp(&b.metrics.feature))
    });
    rows
}

fn feature_view<'a>(
    summary: &'a AnalyticsSummary,
    feature: Feature,
    metrics: &'a FeatureMetrics,
) -> ViewModel<'a> {
    let mut tasks: Vec<&TaskAnalytics> = summary.tasks_for(feature).collect();
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let phases = analytics::phase_breakdown(tasks.iter().copied());
    ViewModel::Feature {
        metrics,
        tasks,
        phases,
    }
}

fn find_task<'a>(
    summary: &'a AnalyticsSummary,
    feature: Feature,
    task_id: &str,
) -> Option<&'a TaskAnalytics> {
    summary.task(task_id).filter(|t| t.feature == feature)
}
