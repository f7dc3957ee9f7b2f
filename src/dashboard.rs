//! Explicit dashboard state with pure transitions, owned by the caller.

use serde::Serialize;

use crate::analytics::AnalyticsSummary;
use crate::drilldown::{DrillDownAction, DrillDownState};
use crate::filter::DateFilter;
use crate::view::{view_model, ViewModel};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum DashboardAction {
    /// Choose another period. The drill-down resets because the selected
    /// task may not exist in the new period, and the old summary is dropped.
    SetDateFilter(DateFilter),
    LoadStarted,
    LoadSucceeded(AnalyticsSummary),
    LoadFailed(String),
    Navigate(DrillDownAction),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardState {
    pub date_filter: DateFilter,
    pub summary: Option<AnalyticsSummary>,
    pub drill_down: DrillDownState,
    pub loading: LoadingState,
}

impl DashboardState {
    pub fn new(date_filter: DateFilter) -> Self {
        Self {
            date_filter,
            ..Self::default()
        }
    }

    pub fn apply(mut self, action: DashboardAction) -> Self {
        match action {
            DashboardAction::SetDateFilter(filter) => {
                if filter != self.date_filter {
                    self.date_filter = filter;
                    self.summary = None;
                    self.drill_down = DrillDownState::Overview;
                    self.loading = LoadingState::Loading;
                }
            }
            DashboardAction::LoadStarted => {
                self.loading = LoadingState::Loading;
            }
            DashboardAction::LoadSucceeded(summary) => {
                if summary.date_filter == self.date_filter {
                    self.summary = Some(summary);
                    self.loading = LoadingState::Loaded;
                } else {
                    log::debug!(
                        "Dropping summary for {} (current filter is {})",
                        summary.date_filter,
                        self.date_filter
                    );
                }
            }
            DashboardAction::LoadFailed(message) => {
                log::warn!("Analytics load failed: {message}");
                self.loading = LoadingState::Failed(message);
            }
            DashboardAction::Navigate(nav) => {
                self.drill_down = self.drill_down.apply(nav);
            }
        }
        self
    }

    /// View for the current state, or `None` until a summary has loaded.
    pub fn view(&self) -> Option<ViewModel<'_>> {
        self.summary
            .as_ref()
            .map(|summary| view_model(summary, &self.drill_down))
    }
}
