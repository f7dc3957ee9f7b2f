pub mod types;

pub use types::*;

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};

use crate::filter::{DateFilter, DateRange};

/// Build a summary for `date_filter` as seen from the wall clock `now`.
pub fn summarize<Tz: TimeZone>(
    tasks: &[TaskAnalytics],
    date_filter: DateFilter,
    now: &DateTime<Tz>,
) -> AnalyticsSummary {
    let range = DateRange::for_filter(date_filter, now);
    compute_summary(tasks, date_filter, range.as_ref())
}

/// Reduce task records into a summary.
///
/// Only tasks whose `created_at` falls inside `range` (inclusive) are counted;
/// `None` keeps everything. An empty selection yields a zeroed summary with
/// every feature present.
pub fn compute_summary(
    tasks: &[TaskAnalytics],
    date_filter: DateFilter,
    range: Option<&DateRange>,
) -> AnalyticsSummary {
    let selected: Vec<&TaskAnalytics> = tasks
        .iter()
        .filter(|t| range.map_or(true, |r| r.contains(&t.created_at)))
        .collect();

    log::debug!(
        "Aggregating {} of {} tasks for {}",
        selected.len(),
        tasks.len(),
        date_filter
    );

    let by_feature: BTreeMap<Feature, FeatureMetrics> = Feature::ALL
        .iter()
        .map(|&feature| {
            let group: Vec<&TaskAnalytics> = selected
                .iter()
                .copied()
                .filter(|t| t.feature == feature)
                .collect();
            (feature, compute_feature_metrics(feature, &group))
        })
        .collect();

    let counts = OutcomeCounts::tally(&selected);
    let total_tokens = saturating_sum(selected.iter().map(|t| t.total_tokens));
    let total_duration_ms = saturating_sum(selected.iter().map(|t| t.total_duration_ms));

    let costs: Vec<f64> = selected
        .iter()
        .filter_map(|t| t.breakdown.as_ref().and_then(|b| b.cost_usd))
        .collect();
    let total_cost_usd = if costs.is_empty() {
        None
    } else {
        Some(costs.iter().sum())
    };

    AnalyticsSummary {
        date_filter,
        total_tasks: selected.len() as u64,
        total_tokens,
        total_duration_ms,
        average_duration_ms: average_duration(&selected),
        success_count: counts.success,
        error_count: counts.error,
        in_progress_count: counts.in_progress,
        success_rate: success_rate(counts.success, counts.error),
        total_cost_usd,
        by_feature,
        tasks: selected.into_iter().cloned().collect(),
    }
}

/// Aggregate one feature's tasks. The caller does the grouping.
pub fn compute_feature_metrics(feature: Feature, tasks: &[&TaskAnalytics]) -> FeatureMetrics {
    if tasks.is_empty() {
        return FeatureMetrics::empty(feature);
    }
    let counts = OutcomeCounts::tally(tasks);
    FeatureMetrics {
        feature,
        total_tokens: saturating_sum(tasks.iter().map(|t| t.total_tokens)),
        task_count: tasks.len() as u64,
        average_duration_ms: average_duration(tasks),
        success_count: counts.success,
        error_count: counts.error,
        in_progress_count: counts.in_progress,
        success_rate: success_rate(counts.success, counts.error),
    }
}

/// Success percentage over finished tasks. In-progress tasks never enter
/// the denominator; 0 when nothing has finished.
pub fn success_rate(success: u64, error: u64) -> f64 {
    let finished = success + error;
    if finished == 0 {
        0.0
    } else {
        success as f64 / finished as f64 * 100.0
    }
}

/// `part` as a percentage of `total`, 0 when `total` is 0.
pub fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Share of the summary's tokens spent in `feature`.
pub fn token_share(summary: &AnalyticsSummary, feature: Feature) -> f64 {
    let tokens = summary
        .feature(feature)
        .map(|m| m.total_tokens)
        .unwrap_or(0);
    percent_of(tokens, summary.total_tokens)
}

/// Mean `total_duration_ms`, 0 for an empty slice.
pub fn average_duration(tasks: &[&TaskAnalytics]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let sum: u128 = tasks.iter().map(|t| u128::from(t.total_duration_ms)).sum();
    sum as f64 / tasks.len() as f64
}

/// Per-phase totals across `tasks`, in execution order. Phases no task
/// reported still appear with zeroes.
pub fn phase_breakdown<'a, I>(tasks: I) -> Vec<PhaseTotals>
where
    I: IntoIterator<Item = &'a TaskAnalytics>,
{
    let mut totals: Vec<PhaseTotals> = Phase::ALL
        .iter()
        .map(|&phase| PhaseTotals {
            phase,
            tokens: 0,
            duration_ms: 0,
            task_count: 0,
            token_share: 0.0,
        })
        .collect();

    for task in tasks {
        for pm in &task.phases {
            let slot = &mut totals[pm.phase as usize];
            slot.tokens = slot.tokens.saturating_add(pm.tokens);
            slot.duration_ms = slot.duration_ms.saturating_add(pm.duration_ms);
            slot.task_count += 1;
        }
    }

    let all_tokens = saturating_sum(totals.iter().map(|t| t.tokens));
    for slot in &mut totals {
        slot.token_share = percent_of(slot.tokens, all_tokens);
    }
    totals
}

/// Counters come from imported records, so totals clamp at `u64::MAX`.
fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

#[derive(Debug, Default)]
struct OutcomeCounts {
    success: u64,
    error: u64,
    in_progress: u64,
}

impl OutcomeCounts {
    fn tally(tasks: &[&TaskAnalytics]) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            match task.outcome {
                Outcome::Error => counts.error += 1,
                Outcome::InProgress => counts.in_progress += 1,
                Outcome::Done | Outcome::Staged | Outcome::PrCreated => counts.success += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{TimeZone, Utc};

    pub fn task(id: &str, feature: Feature, outcome: Outcome, day: u32) -> TaskAnalytics {
        TaskAnalytics {
            task_id: id.to_string(),
            title: None,
            feature,
            total_tokens: 1_000,
            total_duration_ms: 60_000,
            phases: vec![
                PhaseMetrics {
                    phase: Phase::Planning,
                    tokens: 200,
                    duration_ms: 10_000,
                    started_at: None,
                    completed_at: None,
                },
                PhaseMetrics {
                    phase: Phase::Coding,
                    tokens: 600,
                    duration_ms: 40_000,
                    started_at: None,
                    completed_at: None,
                },
                PhaseMetrics {
                    phase: Phase::Validation,
                    tokens: 200,
                    duration_ms: 10_000,
                    started_at: None,
                    completed_at: None,
                },
            ],
            outcome,
            created_at: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
            completed_at: None,
            breakdown: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::task;
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<TaskAnalytics> {
        vec![
            task("T1", Feature::Kanban, Outcome::Done, 5),
            task("T2", Feature::Kanban, Outcome::Error, 6),
            task("T3", Feature::Roadmap, Outcome::PrCreated, 7),
            task("T4", Feature::Insights, Outcome::InProgress, 8),
            task("T5", Feature::GithubPrs, Outcome::Staged, 9),
            task("T6", Feature::Kanban, Outcome::InProgress, 20),
        ]
    }

    #[test]
    fn test_success_rate_zero_denominator() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(3, 1), 75.0);
        assert_eq!(success_rate(0, 4), 0.0);
        assert_eq!(success_rate(2, 0), 100.0);
    }

    #[test]
    fn test_summary_counts_partition_total() {
        let summary = compute_summary(&sample(), DateFilter::AllTime, None);
        assert_eq!(summary.total_tasks, 6);
        assert_eq!(
            summary.success_count + summary.error_count + summary.in_progress_count,
            summary.total_tasks
        );
        let feature_sum: u64 = summary.by_feature.values().map(|m| m.task_count).sum();
        assert_eq!(feature_sum, summary.total_tasks);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.in_progress_count, 2);
    }

    #[test]
    fn test_success_rate_excludes_in_progress() {
        let summary = compute_summary(&sample(), DateFilter::AllTime, None);
        assert_eq!(summary.success_rate, 75.0);
        assert!((0.0..=100.0).contains(&summary.success_rate));

        let kanban = summary.feature(Feature::Kanban).unwrap();
        assert_eq!(kanban.task_count, 3);
        assert_eq!(kanban.success_rate, 50.0);
        assert_eq!(kanban.in_progress_count, 1);

        let insights = summary.feature(Feature::Insights).unwrap();
        assert_eq!(insights.task_count, 1);
        assert_eq!(insights.success_rate, 0.0);
    }

    #[test]
    fn test_every_feature_present() {
        let summary = compute_summary(&sample(), DateFilter::AllTime, None);
        assert_eq!(summary.by_feature.len(), Feature::ALL.len());
        let ideation = summary.feature(Feature::Ideation).unwrap();
        assert_eq!(ideation, &FeatureMetrics::empty(Feature::Ideation));
    }

    #[test]
    fn test_empty_input_is_zeroed() {
        let summary = compute_summary(&[], DateFilter::Today, None);
        assert_eq!(summary.total_tasks, 0);
        assert_eq!(summary.total_tokens, 0);
        assert_eq!(summary.average_duration_ms, 0.0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.total_cost_usd.is_none());
        assert!(summary.is_empty());
        for f in Feature::ALL {
            assert_eq!(summary.feature(f).unwrap().task_count, 0);
        }
    }

    #[test]
    fn test_range_filter_is_inclusive() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap(),
        );
        let summary = compute_summary(&sample(), DateFilter::ThisMonth, Some(&range));
        let ids: Vec<&str> = summary.tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["T2", "T3", "T4"]);
        assert_eq!(summary.date_filter, DateFilter::ThisMonth);
    }

    #[test]
    fn test_period_with_no_tasks() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let summary = summarize(&sample(), DateFilter::Today, &now);
        assert_eq!(summary.total_tasks, 0);
        assert!(summary.by_feature.values().all(|m| m.task_count == 0));
    }

    #[test]
    fn test_summarize_last_7_days() {
        let now = Utc.with_ymd_and_hms(2025, 1, 11, 9, 0, 0).unwrap();
        let summary = summarize(&sample(), DateFilter::Last7Days, &now);
        // Jan 5 through Jan 11
        assert_eq!(summary.total_tasks, 5);
    }

    #[test]
    fn test_averages_and_totals() {
        let mut tasks = sample();
        tasks[0].total_duration_ms = 120_000;
        tasks[0].total_tokens = 5_000;
        let summary = compute_summary(&tasks, DateFilter::AllTime, None);
        let kanban = summary.feature(Feature::Kanban).unwrap();
        assert_eq!(kanban.average_duration_ms, 80_000.0);
        assert_eq!(kanban.total_tokens, 7_000);
        assert_eq!(summary.total_tokens, 10_000);
        assert_eq!(summary.total_duration_ms, 420_000);
        assert_eq!(token_share(&summary, Feature::Kanban), 70.0);
        assert_eq!(token_share(&summary, Feature::Changelog), 0.0);
    }

    #[test]
    fn test_total_cost_sums_reported_costs() {
        let mut tasks = sample();
        tasks[0].breakdown = Some(TokenBreakdown {
            cost_usd: Some(0.25),
            ..Default::default()
        });
        tasks[1].breakdown = Some(TokenBreakdown {
            cost_usd: Some(0.5),
            ..Default::default()
        });
        tasks[2].breakdown = Some(TokenBreakdown::default());
        let summary = compute_summary(&tasks, DateFilter::AllTime, None);
        assert_eq!(summary.total_cost_usd, Some(0.75));
    }

    #[test]
    fn test_phase_breakdown() {
        let tasks = sample();
        let totals = phase_breakdown(tasks.iter().filter(|t| t.feature == Feature::Kanban));
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].phase, Phase::Planning);
        assert_eq!(totals[1].tokens, 1_800);
        assert_eq!(totals[1].task_count, 3);
        assert_eq!(totals[1].token_share, 60.0);
        let share_sum: f64 = totals.iter().map(|t| t.token_share).sum();
        assert!((share_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_huge_counters_clamp_instead_of_overflowing() {
        let mut a = task("T1", Feature::Kanban, Outcome::Done, 1);
        let mut b = task("T2", Feature::Kanban, Outcome::Done, 2);
        for t in [&mut a, &mut b] {
            t.total_tokens = u64::MAX / 2 + 1;
            t.total_duration_ms = u64::MAX;
            t.phases[1].tokens = u64::MAX;
            t.phases[1].duration_ms = u64::MAX;
        }
        let tasks = vec![a, b];

        let summary = compute_summary(&tasks, DateFilter::AllTime, None);
        assert_eq!(summary.total_tokens, u64::MAX);
        assert_eq!(summary.total_duration_ms, u64::MAX);
        assert_eq!(summary.feature(Feature::Kanban).unwrap().total_tokens, u64::MAX);
        assert_eq!(summary.average_duration_ms, u64::MAX as f64);

        let phases = phase_breakdown(&tasks);
        assert_eq!(phases[1].tokens, u64::MAX);
        assert_eq!(phases[1].duration_ms, u64::MAX);
        assert!(phases.iter().all(|p| p.token_share <= 100.0));
    }

    #[test]
    fn test_phase_breakdown_without_phases() {
        let mut t = task("T1", Feature::Kanban, Outcome::Done, 1);
        t.phases.clear();
        let totals = phase_breakdown([&t]);
        assert!(totals.iter().all(|p| p.tokens == 0 && p.token_share == 0.0));
    }
}
