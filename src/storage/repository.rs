use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::analytics::{Feature, Outcome, Phase, PhaseMetrics, TaskAnalytics, TokenBreakdown};
use crate::date_util::parse_timestamp;

/// Fixed-width UTC timestamp, so string order in SQLite matches time order.
pub fn timestamp_key(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Tasks ──────────────────────────────────────────────────────────

pub fn upsert_task(conn: &Connection, task: &TaskAnalytics) -> Result<(), rusqlite::Error> {
    let breakdown = task.breakdown.as_ref();
    conn.execute(
        "INSERT INTO task_analytics (
            task_id, title, feature, total_tokens, total_duration_ms, outcome,
            created_at, completed_at, has_breakdown, input_tokens, output_tokens,
            cache_read_tokens, cache_write_tokens, cost_usd, recorded_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, datetime('now')
        )
        ON CONFLICT(task_id) DO UPDATE SET
            title=excluded.title, feature=excluded.feature,
            total_tokens=excluded.total_tokens, total_duration_ms=excluded.total_duration_ms,
            outcome=excluded.outcome, created_at=excluded.created_at,
            completed_at=excluded.completed_at, has_breakdown=excluded.has_breakdown,
            input_tokens=excluded.input_tokens, output_tokens=excluded.output_tokens,
            cache_read_tokens=excluded.cache_read_tokens,
            cache_write_tokens=excluded.cache_write_tokens,
            cost_usd=excluded.cost_usd, recorded_at=excluded.recorded_at",
        params![
            task.task_id,
            task.title,
            task.feature.as_str(),
            task.total_tokens as i64,
            task.total_duration_ms as i64,
            task.outcome.as_str(),
            timestamp_key(&task.created_at),
            task.completed_at.as_ref().map(timestamp_key),
            breakdown.is_some() as i32,
            breakdown.map(|b| b.input_tokens as i64),
            breakdown.map(|b| b.output_tokens as i64),
            breakdown.map(|b| b.cache_read_tokens as i64),
            breakdown.map(|b| b.cache_write_tokens as i64),
            breakdown.and_then(|b| b.cost_usd),
        ],
    )?;

    conn.execute(
        "DELETE FROM task_phases WHERE task_id = ?1",
        params![task.task_id],
    )?;
    for (seq, pm) in task.phases.iter().enumerate() {
        conn.execute(
            "INSERT INTO task_phases (task_id, seq, phase, tokens, duration_ms, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.task_id,
                seq as i64,
                pm.phase.as_str(),
                pm.tokens as i64,
                pm.duration_ms as i64,
                pm.started_at.as_ref().map(timestamp_key),
                pm.completed_at.as_ref().map(timestamp_key),
            ],
        )?;
    }
    Ok(())
}

pub fn delete_task(conn: &Connection, task_id: &str) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "DELETE FROM task_analytics WHERE task_id = ?1",
        params![task_id],
    )?;
    Ok(count > 0)
}

const TASK_COLUMNS: &str = "task_id, title, feature, total_tokens, total_duration_ms, outcome,
    created_at, completed_at, has_breakdown, input_tokens, output_tokens,
    cache_read_tokens, cache_write_tokens, cost_usd";

/// Load tasks created within `[start, end]` (both `timestamp_key` strings),
/// or all tasks when no bounds are given. Ordered by creation time.
pub fn list_tasks(
    conn: &Connection,
    bounds: Option<(&str, &str)>,
) -> Result<Vec<TaskAnalytics>, rusqlite::Error> {
    let (start, end) = bounds.unwrap_or(("", "\u{10FFFF}"));

    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM task_analytics
         WHERE created_at >= ?1 AND created_at <= ?2
         ORDER BY created_at, task_id"
    ))?;
    let mut tasks: Vec<TaskAnalytics> = stmt
        .query_map(params![start, end], task_from_row)?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT p.task_id, p.phase, p.tokens, p.duration_ms, p.started_at, p.completed_at
         FROM task_phases p
         JOIN task_analytics t ON t.task_id = p.task_id
         WHERE t.created_at >= ?1 AND t.created_at <= ?2
         ORDER BY p.task_id, p.seq",
    )?;
    let mut phases: HashMap<String, Vec<PhaseMetrics>> = HashMap::new();
    let rows = stmt.query_map(params![start, end], |row| {
        Ok((row.get::<_, String>(0)?, phase_from_row(row, 1)?))
    })?;
    for row in rows {
        let (task_id, pm) = row?;
        phases.entry(task_id).or_default().push(pm);
    }

    for task in &mut tasks {
        if let Some(p) = phases.remove(&task.task_id) {
            task.phases = p;
        }
    }
    Ok(tasks)
}

pub fn get_task(conn: &Connection, task_id: &str) -> Result<Option<TaskAnalytics>, rusqlite::Error> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM task_analytics WHERE task_id = ?1"),
            params![task_id],
            task_from_row,
        )
        .optional()?;
    let Some(mut task) = task else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT task_id, phase, tokens, duration_ms, started_at, completed_at
         FROM task_phases WHERE task_id = ?1 ORDER BY seq",
    )?;
    task.phases = stmt
        .query_map(params![task_id], |row| phase_from_row(row, 1))?
        .collect::<Result<_, _>>()?;
    Ok(Some(task))
}

/// Row counts and the span of `created_at` values in the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStatus {
    pub task_count: u64,
    pub phase_count: u64,
    pub earliest_created_at: Option<String>,
    pub latest_created_at: Option<String>,
    pub tasks_by_feature: Vec<(String, u64)>,
}

pub fn store_status(conn: &Connection) -> Result<StoreStatus, rusqlite::Error> {
    let (task_count, earliest, latest): (i64, Option<String>, Option<String>) = conn.query_row(
        "SELECT COUNT(*), MIN(created_at), MAX(created_at) FROM task_analytics",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let phase_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM task_phases", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT feature, COUNT(*) FROM task_analytics GROUP BY feature ORDER BY feature",
    )?;
    let tasks_by_feature: Vec<(String, u64)> = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<Result<_, _>>()?;

    Ok(StoreStatus {
        task_count: task_count as u64,
        phase_count: phase_count as u64,
        earliest_created_at: earliest,
        latest_created_at: latest,
        tasks_by_feature,
    })
}

fn task_from_row(row: &Row<'_>) -> Result<TaskAnalytics, rusqlite::Error> {
    let feature: String = row.get(2)?;
    let outcome: String = row.get(5)?;
    let has_breakdown: bool = row.get(8)?;

    let breakdown = if has_breakdown {
        Some(TokenBreakdown {
            input_tokens: row.get::<_, Option<i64>>(9)?.unwrap_or(0) as u64,
            output_tokens: row.get::<_, Option<i64>>(10)?.unwrap_or(0) as u64,
            cache_read_tokens: row.get::<_, Option<i64>>(11)?.unwrap_or(0) as u64,
            cache_write_tokens: row.get::<_, Option<i64>>(12)?.unwrap_or(0) as u64,
            cost_usd: row.get(13)?,
        })
    } else {
        None
    };

    Ok(TaskAnalytics {
        task_id: row.get(0)?,
        title: row.get(1)?,
        feature: Feature::parse(&feature).ok_or_else(|| conversion_error(2, "feature", &feature))?,
        total_tokens: row.get::<_, i64>(3)? as u64,
        total_duration_ms: row.get::<_, i64>(4)? as u64,
        phases: Vec::new(),
        outcome: Outcome::parse(&outcome).ok_or_else(|| conversion_error(5, "outcome", &outcome))?,
        created_at: timestamp_column(row, 6)?
            .ok_or_else(|| conversion_error(6, "created_at", "NULL"))?,
        completed_at: timestamp_column(row, 7)?,
        breakdown,
    })
}

// `offset` is the index of the phase column; the task id precedes it.
fn phase_from_row(row: &Row<'_>, offset: usize) -> Result<PhaseMetrics, rusqlite::Error> {
    let phase: String = row.get(offset)?;
    Ok(PhaseMetrics {
        phase: Phase::parse(&phase).ok_or_else(|| conversion_error(offset, "phase", &phase))?,
        tokens: row.get::<_, i64>(offset + 1)? as u64,
        duration_ms: row.get::<_, i64>(offset + 2)? as u64,
        started_at: timestamp_column(row, offset + 3)?,
        completed_at: timestamp_column(row, offset + 4)?,
    })
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, "timestamp", &s)),
        None => Ok(None),
    }
}

fn conversion_error(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {what}: {value}").into(),
    )
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::task;
    use crate::storage::Database;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_task_round_trip() {
        let db = Database::open_memory().await.unwrap();

        let mut original = task("T1", Feature::GithubPrs, Outcome::PrCreated, 10);
        original.title = Some("Review PR #42".into());
        original.completed_at = Some(Utc.with_ymd_and_hms(2025, 1, 10, 13, 0, 0).unwrap());
        original.breakdown = Some(TokenBreakdown {
            input_tokens: 700,
            output_tokens: 300,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd: Some(0.12),
        });

        let loaded = db
            .writer()
            .call({
                let original = original.clone();
                move |conn| {
                    upsert_task(conn, &original)?;
                    get_task(conn, "T1")
                }
            })
            .await
            .unwrap();

        assert_eq!(loaded, Some(original));
    }

    #[tokio::test]
    async fn test_upsert_replaces_phases() {
        let db = Database::open_memory().await.unwrap();

        let phase_count = db
            .writer()
            .call(|conn| {
                let mut t = task("T1", Feature::Kanban, Outcome::InProgress, 3);
                upsert_task(conn, &t)?;
                t.outcome = Outcome::Done;
                t.phases.truncate(2);
                upsert_task(conn, &t)?;
                let stored = get_task(conn, "T1")?.unwrap();
                assert_eq!(stored.outcome, Outcome::Done);
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM task_phases WHERE task_id = 'T1'",
                    [],
                    |row| row.get(0),
                )?;
                Ok::<i64, rusqlite::Error>(count)
            })
            .await
            .unwrap();

        assert_eq!(phase_count, 2);
    }

    #[tokio::test]
    async fn test_list_tasks_bounds_inclusive() {
        let db = Database::open_memory().await.unwrap();

        let ids: Vec<String> = db
            .writer()
            .call(|conn| {
                for (id, day) in [("T1", 1), ("T2", 2), ("T3", 3), ("T4", 4)] {
                    upsert_task(conn, &task(id, Feature::Roadmap, Outcome::Done, day))?;
                }
                let start = timestamp_key(&Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap());
                let end = timestamp_key(&Utc.with_ymd_and_hms(2025, 1, 3, 12, 0, 0).unwrap());
                let tasks = list_tasks(conn, Some((start.as_str(), end.as_str())))?;
                assert!(tasks.iter().all(|t| t.phases.len() == 3));
                Ok::<Vec<String>, rusqlite::Error>(tasks.into_iter().map(|t| t.task_id).collect())
            })
            .await
            .unwrap();

        assert_eq!(ids, vec!["T2", "T3"]);
    }

    #[tokio::test]
    async fn test_list_all_and_delete_cascades() {
        let db = Database::open_memory().await.unwrap();

        let status = db
            .writer()
            .call(|conn| {
                upsert_task(conn, &task("T1", Feature::Kanban, Outcome::Done, 1))?;
                upsert_task(conn, &task("T2", Feature::Insights, Outcome::Error, 2))?;
                assert_eq!(list_tasks(conn, None)?.len(), 2);
                assert!(delete_task(conn, "T1")?);
                assert!(!delete_task(conn, "T1")?);
                store_status(conn)
            })
            .await
            .unwrap();

        assert_eq!(status.task_count, 1);
        assert_eq!(status.phase_count, 3);
        assert_eq!(status.tasks_by_feature, vec![("insights".to_string(), 1)]);
        assert_eq!(
            status.earliest_created_at.as_deref(),
            Some("2025-01-02T12:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_get_missing_task() {
        let db = Database::open_memory().await.unwrap();
        let task = db.reader().call(|conn| get_task(conn, "nope")).await.unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                assert_eq!(get_config(conn, "default_period")?, None);
                set_config(conn, "default_period", "this_month")?;
                set_config(conn, "default_period", "today")?;
                assert_eq!(get_config(conn, "default_period")?, Some("today".to_string()));
                assert_eq!(
                    list_config(conn)?,
                    vec![("default_period".to_string(), "today".to_string())]
                );
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
