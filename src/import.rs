use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::analytics::TaskAnalytics;
use crate::error::{Error, Result};
use crate::storage::{repository, Database};

/// Records written per transaction.
pub const BATCH_SIZE: usize = 500;

/// Callbacks for reporting import progress.
pub trait ImportProgress: Send + Sync {
    fn on_start(&self, _source: &str, _total: usize) {}
    fn on_batch(&self, _source: &str, _written: usize, _total: usize) {}
    fn on_complete(&self, _report: &ImportReport) {}
}

/// Progress reporter that discards every event.
pub struct NoopProgress;

impl ImportProgress for NoopProgress {}

/// Report returned after an import completes.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub status: ImportStatus,
    pub records_imported: u64,
    pub records_failed: u64,
    pub batches_completed: u32,
    pub batches_total: u32,
    pub error: Option<String>,
}

impl ImportReport {
    /// Create an ImportReport with the appropriate status derived from counts.
    pub fn from_counts(
        source: String,
        records_imported: u64,
        records_failed: u64,
        batches_completed: u32,
        batches_total: u32,
    ) -> Self {
        let status = if records_failed == 0 {
            ImportStatus::Success
        } else if records_imported > 0 {
            ImportStatus::PartialFailure
        } else {
            ImportStatus::Failed
        };
        let error = if records_failed > 0 {
            Some(format!("{records_failed} records rejected"))
        } else {
            None
        };
        Self {
            source,
            status,
            records_imported,
            records_failed,
            batches_completed,
            batches_total,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Split an import document into raw records. Accepts a bare array or an
/// object with a `tasks` array.
pub fn split_records(json: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("tasks") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(Error::Import(
                "expected an array of tasks or an object with a \"tasks\" array".into(),
            )),
        },
        _ => Err(Error::Import("expected a JSON array or object".into())),
    }
}

/// Deserialize and check one record.
pub fn parse_record(value: Value) -> Result<TaskAnalytics> {
    let hint = value
        .get("task_id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    let task: TaskAnalytics = serde_json::from_value(value).map_err(|e| Error::InvalidRecord {
        task_id: hint,
        message: e.to_string(),
    })?;
    validate(&task)?;
    Ok(task)
}

pub fn validate(task: &TaskAnalytics) -> Result<()> {
    let invalid = |message: &str| Error::InvalidRecord {
        task_id: task.task_id.clone(),
        message: message.to_string(),
    };
    if task.task_id.trim().is_empty() {
        return Err(invalid("task_id is empty"));
    }
    if let Some(completed) = task.completed_at {
        if completed < task.created_at {
            return Err(invalid("completed_at is before created_at"));
        }
    }
    Ok(())
}

/// Import task records from a JSON file.
pub async fn import_file(
    db: &Database,
    path: impl AsRef<Path>,
    progress: &dyn ImportProgress,
) -> Result<ImportReport> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let json = std::fs::read_to_string(path)?;
    let values = split_records(&json)?;
    import_values(db, &source, values, progress).await
}

/// Validate and upsert raw records in batches. Invalid records are skipped
/// and counted; storage errors abort the import. When a task id repeats,
/// the last record wins and the task is counted once.
pub async fn import_values(
    db: &Database,
    source: &str,
    values: Vec<Value>,
    progress: &dyn ImportProgress,
) -> Result<ImportReport> {
    let total = values.len();
    progress.on_start(source, total);

    let mut failed = 0u64;
    let mut tasks: Vec<TaskAnalytics> = Vec::with_capacity(total);
    let mut positions: HashMap<String, usize> = HashMap::new();
    for value in values {
        match parse_record(value) {
            Ok(task) => match positions.get(&task.task_id) {
                Some(&i) => {
                    log::debug!(
                        "Task {} repeats in {source}, keeping the later record",
                        task.task_id
                    );
                    tasks[i] = task;
                }
                None => {
                    positions.insert(task.task_id.clone(), tasks.len());
                    tasks.push(task);
                }
            },
            Err(e) => {
                log::warn!("Skipping record from {source}: {e}");
                failed += 1;
            }
        }
    }

    let accepted = tasks.len();
    let batches_total = accepted.div_ceil(BATCH_SIZE) as u32;
    let mut batches_completed = 0u32;
    let mut imported = 0u64;

    for chunk in tasks.chunks(BATCH_SIZE) {
        let batch = chunk.to_vec();
        let written = db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                for task in &batch {
                    repository::upsert_task(&tx, task)?;
                }
                tx.commit()?;
                Ok::<usize, rusqlite::Error>(batch.len())
            })
            .await?;
        imported += written as u64;
        batches_completed += 1;
        progress.on_batch(source, imported as usize, accepted);
    }

    let report = ImportReport::from_counts(
        source.to_string(),
        imported,
        failed,
        batches_completed,
        batches_total,
    );
    log::info!(
        "Imported {} records from {source} ({} rejected)",
        report.records_imported,
        report.records_failed
    );
    progress.on_complete(&report);
    Ok(report)
}
