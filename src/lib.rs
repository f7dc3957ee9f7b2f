pub mod analytics;
pub mod dashboard;
pub mod date_util;
pub mod drilldown;
pub mod error;
pub mod filter;
pub mod format;
pub mod import;
pub mod storage;
pub mod view;

pub use analytics::{
    AnalyticsSummary, Feature, FeatureMetrics, Outcome, Phase, PhaseMetrics, TaskAnalytics,
};
pub use dashboard::{DashboardAction, DashboardState, LoadingState};
pub use drilldown::{DrillDownAction, DrillDownLevel, DrillDownState};
pub use error::{Error, Result};
pub use filter::{DateFilter, DateRange};
pub use import::{ImportProgress, ImportReport, ImportStatus, NoopProgress};
pub use storage::repository::StoreStatus;
pub use storage::Database;
pub use view::{view_model, ViewModel};

use chrono::{DateTime, TimeZone};
use storage::repository;

/// Config key holding the date filter used when none is given.
pub const DEFAULT_PERIOD_KEY: &str = "default_period";

/// Main entry point: a task store plus the aggregation over it.
pub struct TaskPulse {
    db: Database,
}

impl TaskPulse {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Records ────────────────────────────────────────────────────

    /// Validate and store one task record, replacing any previous version.
    pub async fn record_task(&self, task: TaskAnalytics) -> Result<()> {
        import::validate(&task)?;
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                repository::upsert_task(&tx, &task)?;
                tx.commit()?;
                Ok::<(), rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }

    pub async fn import_file(
        &self,
        path: impl AsRef<std::path::Path>,
        progress: &dyn ImportProgress,
    ) -> Result<ImportReport> {
        import::import_file(&self.db, path, progress).await
    }

    pub async fn task(&self, task_id: &str) -> Result<TaskAnalytics> {
        let id = task_id.to_string();
        self.db
            .reader()
            .call(move |conn| repository::get_task(conn, &id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))
    }

    pub async fn remove_task(&self, task_id: &str) -> Result<bool> {
        let id = task_id.to_string();
        self.db
            .writer()
            .call(move |conn| repository::delete_task(conn, &id))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Summaries ──────────────────────────────────────────────────

    /// Load the tasks for `date_filter` relative to `now`.
    pub async fn load_tasks<Tz: TimeZone>(
        &self,
        date_filter: DateFilter,
        now: &DateTime<Tz>,
    ) -> Result<Vec<TaskAnalytics>> {
        let bounds = DateRange::for_filter(date_filter, now).map(|r| {
            (
                repository::timestamp_key(&r.start),
                repository::timestamp_key(&r.end),
            )
        });
        let tasks = self
            .db
            .reader()
            .call(move |conn| {
                let bounds = bounds.as_ref().map(|(s, e)| (s.as_str(), e.as_str()));
                repository::list_tasks(conn, bounds)
            })
            .await?;
        log::debug!("Loaded {} tasks for {date_filter}", tasks.len());
        Ok(tasks)
    }

    /// Summary for `date_filter` as of `now`.
    pub async fn summary_at<Tz: TimeZone>(
        &self,
        date_filter: DateFilter,
        now: &DateTime<Tz>,
    ) -> Result<AnalyticsSummary> {
        let tasks = self.load_tasks(date_filter, now).await?;
        Ok(analytics::summarize(&tasks, date_filter, now))
    }

    /// Summary for `date_filter` as of the local wall clock.
    pub async fn summary(&self, date_filter: DateFilter) -> Result<AnalyticsSummary> {
        self.summary_at(date_filter, &chrono::Local::now()).await
    }

    /// Run a load and fold its result into `state` (loading → loaded/failed).
    pub async fn refresh(&self, state: DashboardState) -> DashboardState {
        let state = state.apply(DashboardAction::LoadStarted);
        match self.summary(state.date_filter).await {
            Ok(summary) => state.apply(DashboardAction::LoadSucceeded(summary)),
            Err(e) => state.apply(DashboardAction::LoadFailed(e.to_string())),
        }
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        self.db
            .reader()
            .call(|conn| repository::store_status(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Config ─────────────────────────────────────────────────────

    /// The configured default date filter, or `Last7Days` when unset or invalid.
    pub async fn default_filter(&self) -> Result<DateFilter> {
        match self.config_get(DEFAULT_PERIOD_KEY).await? {
            Some(value) => match DateFilter::parse(&value) {
                Ok(filter) => Ok(filter),
                Err(e) => {
                    log::warn!("Ignoring {DEFAULT_PERIOD_KEY} config: {e}");
                    Ok(DateFilter::default())
                }
            },
            None => Ok(DateFilter::default()),
        }
    }

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Store a config value. Known keys are validated before writing.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let value = if key == DEFAULT_PERIOD_KEY {
            DateFilter::parse(value)
                .map_err(|e| Error::Config(e.to_string()))?
                .to_key()
                .to_string()
        } else {
            value.to_string()
        };
        self.db
            .writer()
            .call({
                let key = key.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
