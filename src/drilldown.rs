//! Four-level navigation through a summary: overview → feature → task → phase.
//!
//! A deeper level always carries every shallower selector, so a state that
//! points at a task without a feature cannot be built.

use serde::{Deserialize, Serialize};

use crate::analytics::{Feature, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillDownLevel {
    Overview,
    Feature,
    Task,
    Phase,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum DrillDownState {
    #[default]
    Overview,
    Feature {
        feature: Feature,
    },
    Task {
        feature: Feature,
        task_id: String,
    },
    Phase {
        feature: Feature,
        task_id: String,
        phase: Phase,
    },
}

/// Navigation events issued by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrillDownAction {
    SelectFeature(Feature),
    SelectTask { feature: Feature, task_id: String },
    SelectPhase { feature: Feature, task_id: String, phase: Phase },
    Up,
    Reset,
}

impl DrillDownState {
    /// Apply one navigation event. Selections replace the whole selector set
    /// for the target level, whatever the current level is.
    pub fn apply(self, action: DrillDownAction) -> Self {
        match action {
            DrillDownAction::SelectFeature(feature) => DrillDownState::Feature { feature },
            DrillDownAction::SelectTask { feature, task_id } => {
                DrillDownState::Task { feature, task_id }
            }
            DrillDownAction::SelectPhase {
                feature,
                task_id,
                phase,
            } => DrillDownState::Phase {
                feature,
                task_id,
                phase,
            },
            DrillDownAction::Up => self.up(),
            DrillDownAction::Reset => DrillDownState::Overview,
        }
    }

    /// One level shallower, dropping the deepest selector.
    pub fn up(self) -> Self {
        match self {
            DrillDownState::Overview | DrillDownState::Feature { .. } => DrillDownState::Overview,
            DrillDownState::Task { feature, .. } => DrillDownState::Feature { feature },
            DrillDownState::Phase {
                feature, task_id, ..
            } => DrillDownState::Task { feature, task_id },
        }
    }

    /// Select a task under the current feature. Stays put at the overview,
    /// where no feature is selected.
    pub fn select_task(self, task_id: impl Into<String>) -> Self {
        match self.feature() {
            Some(feature) => self.apply(DrillDownAction::SelectTask {
                feature,
                task_id: task_id.into(),
            }),
            None => self,
        }
    }

    /// Select a phase of the current task. Stays put above the task level.
    pub fn select_phase(self, phase: Phase) -> Self {
        let (Some(feature), Some(task_id)) = (self.feature(), self.task_id().map(str::to_string))
        else {
            return self;
        };
        self.apply(DrillDownAction::SelectPhase {
            feature,
            task_id,
            phase,
        })
    }

    pub fn level(&self) -> DrillDownLevel {
        match self {
            DrillDownState::Overview => DrillDownLevel::Overview,
            DrillDownState::Feature { .. } => DrillDownLevel::Feature,
            DrillDownState::Task { .. } => DrillDownLevel::Task,
            DrillDownState::Phase { .. } => DrillDownLevel::Phase,
        }
    }

    pub fn feature(&self) -> Option<Feature> {
        match self {
            DrillDownState::Overview => None,
            DrillDownState::Feature { feature }
            | DrillDownState::Task { feature, .. }
            | DrillDownState::Phase { feature, .. } => Some(*feature),
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            DrillDownState::Task { task_id, .. } | DrillDownState::Phase { task_id, .. } => {
                Some(task_id)
            }
            _ => None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            DrillDownState::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Path labels from the overview down to the current level.
    pub fn breadcrumbs(&self) -> Vec<String> {
        let mut crumbs = vec!["Overview".to_string()];
        if let Some(feature) = self.feature() {
            crumbs.push(feature.label().to_string());
        }
        if let Some(task_id) = self.task_id() {
            crumbs.push(task_id.to_string());
        }
        if let Some(phase) = self.phase() {
            crumbs.push(phase.label().to_string());
        }
        crumbs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deepest() -> DrillDownState {
        DrillDownState::Phase {
            feature: Feature::Roadmap,
            task_id: "T9".into(),
            phase: Phase::Coding,
        }
    }

    #[test]
    fn test_initial_state_is_overview() {
        assert_eq!(DrillDownState::default(), DrillDownState::Overview);
        assert_eq!(DrillDownState::default().level(), DrillDownLevel::Overview);
    }

    #[test]
    fn test_select_feature_then_task_then_up() {
        let state = DrillDownState::Overview.apply(DrillDownAction::SelectFeature(Feature::Kanban));
        assert_eq!(
            state,
            DrillDownState::Feature {
                feature: Feature::Kanban
            }
        );

        let state = state.select_task("T1");
        assert_eq!(
            state,
            DrillDownState::Task {
                feature: Feature::Kanban,
                task_id: "T1".into()
            }
        );

        let state = state.apply(DrillDownAction::Up);
        assert_eq!(
            state,
            DrillDownState::Feature {
                feature: Feature::Kanban
            }
        );
        assert_eq!(state.task_id(), None);
    }

    #[test]
    fn test_up_chain() {
        let state = deepest().up();
        assert_eq!(state.level(), DrillDownLevel::Task);
        assert_eq!(state.phase(), None);
        assert_eq!(state.task_id(), Some("T9"));

        let state = state.up();
        assert_eq!(state.level(), DrillDownLevel::Feature);
        let state = state.up();
        assert_eq!(state, DrillDownState::Overview);
        assert_eq!(state.up(), DrillDownState::Overview);
    }

    #[test]
    fn test_reset_clears_everything() {
        let state = deepest().apply(DrillDownAction::Reset);
        assert_eq!(state, DrillDownState::Overview);
        assert_eq!(state.feature(), None);
        assert_eq!(serde_json::to_value(&state).unwrap(), serde_json::json!({"level": "overview"}));
    }

    #[test]
    fn test_select_replaces_selectors_from_other_branch() {
        let state = deepest().apply(DrillDownAction::SelectFeature(Feature::Kanban));
        assert_eq!(
            state,
            DrillDownState::Feature {
                feature: Feature::Kanban
            }
        );

        let state = deepest().apply(DrillDownAction::SelectTask {
            feature: Feature::Insights,
            task_id: "T2".into(),
        });
        assert_eq!(state.phase(), None);
        assert_eq!(state.feature(), Some(Feature::Insights));
    }

    #[test]
    fn test_select_without_parent_is_noop() {
        assert_eq!(DrillDownState::Overview.select_task("T1"), DrillDownState::Overview);
        let feature = DrillDownState::Feature {
            feature: Feature::Changelog,
        };
        assert_eq!(feature.clone().select_phase(Phase::Planning), feature);
    }

    #[test]
    fn test_select_phase_keeps_task() {
        let state = DrillDownState::Task {
            feature: Feature::Ideation,
            task_id: "T4".into(),
        }
        .select_phase(Phase::Validation);
        assert_eq!(
            state,
            DrillDownState::Phase {
                feature: Feature::Ideation,
                task_id: "T4".into(),
                phase: Phase::Validation
            }
        );
    }

    #[test]
    fn test_serialized_shape() {
        let state = DrillDownState::Task {
            feature: Feature::Kanban,
            task_id: "T1".into(),
        };
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            serde_json::json!({"level": "task", "feature": "kanban", "task_id": "T1"})
        );
    }

    #[test]
    fn test_breadcrumbs() {
        assert_eq!(
            deepest().breadcrumbs(),
            vec!["Overview", "Roadmap", "T9", "Coding"]
        );
        assert_eq!(DrillDownState::Overview.breadcrumbs(), vec!["Overview"]);
    }
}
