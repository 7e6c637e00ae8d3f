//! SQLite-backed task snapshot shared by every herald component.
//!
//! All mutations are single-row atomic statements; callers never
//! read-modify-write a row across an await point.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, Row};

use crate::task::{FetchedTask, Priority, TaskRecord};

const STORE_SCHEMA_VERSION: i64 = 1;

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub tasks_deleted: usize,
    pub watermarks_deleted: usize,
    pub audits_deleted: usize,
}

pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open task store {}", path.display()))?;
        Self::bootstrap(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory task store")?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .context("failed to read task store schema version")?;
        if version > STORE_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported task store schema: expected <= {STORE_SCHEMA_VERSION}, found {version}"
            ));
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                title TEXT NOT NULL,
                priority TEXT NOT NULL,
                department TEXT NOT NULL,
                issue_type TEXT NOT NULL,
                resolution TEXT NOT NULL,
                assignee TEXT NOT NULL,
                date_added INTEGER NOT NULL,
                last_sent INTEGER,
                archived INTEGER NOT NULL DEFAULT 0,
                archived_date INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_source_archived
                ON tasks(source, archived);
            CREATE TABLE IF NOT EXISTS comment_watermarks (
                task_id TEXT PRIMARY KEY,
                last_comment_id INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS action_audits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                action TEXT NOT NULL,
                actor TEXT NOT NULL,
                performed_at INTEGER NOT NULL
            );
            ",
        )
        .context("failed to bootstrap task store schema")?;
        conn.pragma_update(None, "user_version", STORE_SCHEMA_VERSION)
            .context("failed to record task store schema version")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("task store connection lock poisoned"))
    }

    /// Inserts a fetched issue or refreshes its mutable fields. `date_added`
    /// and `last_sent` are preserved on update; `archived` is forced back to
    /// false because the issue was present in the latest fetch.
    pub fn upsert_fetched(&self, source: &str, fetched: &FetchedTask, now_unix_ms: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "
            INSERT INTO tasks (
                id, source, title, priority, department, issue_type,
                resolution, assignee, date_added, last_sent, archived, archived_date
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, 0, NULL)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                priority = excluded.priority,
                department = excluded.department,
                issue_type = excluded.issue_type,
                resolution = excluded.resolution,
                assignee = excluded.assignee,
                archived = 0,
                archived_date = NULL
            ",
            params![
                fetched.id,
                source,
                fetched.title,
                fetched.priority.as_str(),
                fetched.department,
                fetched.issue_type,
                fetched.resolution,
                fetched.assignee,
                now_unix_ms,
            ],
        )
        .with_context(|| format!("failed to upsert task {}", fetched.id))?;
        Ok(())
    }

    /// Archives every unarchived task for `source` whose id is not in
    /// `fetched_ids`. An empty fetched set archives all of them; an empty
    /// exclude list must never be treated as "match nothing".
    pub fn archive_missing(
        &self,
        source: &str,
        fetched_ids: &[String],
        now_unix_ms: i64,
    ) -> Result<usize> {
        let conn = self.conn()?;
        if fetched_ids.is_empty() {
            let archived = conn
                .execute(
                    "UPDATE tasks SET archived = 1, archived_date = ?1
                     WHERE source = ?2 AND archived = 0",
                    params![now_unix_ms, source],
                )
                .with_context(|| format!("failed to archive all tasks for source {source}"))?;
            return Ok(archived);
        }

        let placeholders = fetched_ids
            .iter()
            .enumerate()
            .map(|(index, _)| format!("?{}", index + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE tasks SET archived = 1, archived_date = ?1
             WHERE source = ?2 AND archived = 0 AND id NOT IN ({placeholders})"
        );
        let mut values: Vec<&dyn rusqlite::types::ToSql> = vec![&now_unix_ms, &source];
        for id in fetched_ids {
            values.push(id);
        }
        let archived = conn
            .execute(&sql, values.as_slice())
            .with_context(|| format!("failed to archive missing tasks for source {source}"))?;
        Ok(archived)
    }

    pub fn task_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, source, title, priority, department, issue_type,
                        resolution, assignee, date_added, last_sent, archived, archived_date
                 FROM tasks WHERE id = ?1",
            )
            .context("failed to prepare task lookup")?;
        let mut rows = stmt
            .query_map(params![id], map_task_row)
            .with_context(|| format!("failed to query task {id}"))?;
        rows.next()
            .transpose()
            .with_context(|| format!("failed to read task {id}"))
    }

    /// All unarchived tasks, ordered by id so repeated queries over the same
    /// store state return the same sequence.
    pub fn unarchived_tasks(&self) -> Result<Vec<TaskRecord>> {
        self.query_tasks(
            "SELECT id, source, title, priority, department, issue_type,
                    resolution, assignee, date_added, last_sent, archived, archived_date
             FROM tasks WHERE archived = 0 ORDER BY id ASC",
            [],
        )
    }

    /// Unarchived tasks already resolved as Done within the given
    /// department; these are the comment-watcher candidates.
    pub fn unarchived_done_tasks(&self, department: &str) -> Result<Vec<TaskRecord>> {
        self.query_tasks(
            "SELECT id, source, title, priority, department, issue_type,
                    resolution, assignee, date_added, last_sent, archived, archived_date
             FROM tasks
             WHERE archived = 0 AND lower(resolution) = 'done' AND department = ?1
             ORDER BY id ASC",
            params![department],
        )
    }

    fn query_tasks<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<TaskRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).context("failed to prepare task query")?;
        let rows = stmt
            .query_map(params, map_task_row)
            .context("failed to query tasks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read task rows")
    }

    /// Records a confirmed notification send. Never called speculatively.
    pub fn mark_sent(&self, id: &str, now_unix_ms: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tasks SET last_sent = ?1 WHERE id = ?2",
            params![now_unix_ms, id],
        )
        .with_context(|| format!("failed to record notification send for task {id}"))?;
        Ok(())
    }

    pub fn comment_watermark(&self, task_id: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT last_comment_id FROM comment_watermarks WHERE task_id = ?1")
            .context("failed to prepare watermark lookup")?;
        let mut rows = stmt
            .query_map(params![task_id], |row| row.get::<_, i64>(0))
            .with_context(|| format!("failed to query watermark for task {task_id}"))?;
        rows.next()
            .transpose()
            .with_context(|| format!("failed to read watermark for task {task_id}"))
    }

    /// Advances the per-task comment watermark. Monotonic: a value at or
    /// below the stored one leaves the row untouched. Returns whether the
    /// watermark moved.
    pub fn advance_comment_watermark(
        &self,
        task_id: &str,
        comment_id: i64,
        now_unix_ms: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "
                INSERT INTO comment_watermarks (task_id, last_comment_id, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(task_id) DO UPDATE SET
                    last_comment_id = excluded.last_comment_id,
                    updated_at = excluded.updated_at
                WHERE excluded.last_comment_id > comment_watermarks.last_comment_id
                ",
                params![task_id, comment_id, now_unix_ms],
            )
            .with_context(|| format!("failed to advance watermark for task {task_id}"))?;
        Ok(changed > 0)
    }

    /// Appends one action-audit row.
    pub fn record_action(
        &self,
        task_id: &str,
        action: &str,
        actor: &str,
        now_unix_ms: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO action_audits (task_id, action, actor, performed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![task_id, action, actor, now_unix_ms],
        )
        .with_context(|| format!("failed to record {action} audit for task {task_id}"))?;
        Ok(())
    }

    pub fn actions_for_task(&self, task_id: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT action, actor FROM action_audits
                 WHERE task_id = ?1 ORDER BY id ASC",
            )
            .context("failed to prepare audit query")?;
        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .with_context(|| format!("failed to query audits for task {task_id}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read audit rows")
    }

    /// Deletes archived, Done tasks whose archival is older than the cutoff,
    /// then drops watermarks and audits whose task no longer exists.
    pub fn sweep_expired(&self, cutoff_unix_ms: i64) -> Result<SweepReport> {
        let conn = self.conn()?;
        let tasks_deleted = conn
            .execute(
                "DELETE FROM tasks
                 WHERE archived = 1
                   AND lower(resolution) = 'done'
                   AND archived_date IS NOT NULL
                   AND archived_date < ?1",
                params![cutoff_unix_ms],
            )
            .context("failed to delete expired tasks")?;
        let watermarks_deleted = conn
            .execute(
                "DELETE FROM comment_watermarks
                 WHERE task_id NOT IN (SELECT id FROM tasks)",
                [],
            )
            .context("failed to delete orphaned watermarks")?;
        let audits_deleted = conn
            .execute(
                "DELETE FROM action_audits
                 WHERE task_id NOT IN (SELECT id FROM tasks)",
                [],
            )
            .context("failed to delete orphaned audits")?;
        Ok(SweepReport {
            tasks_deleted,
            watermarks_deleted,
            audits_deleted,
        })
    }

    pub fn task_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .context("failed to count tasks")?;
        Ok(count as usize)
    }
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let priority: String = row.get(3)?;
    let archived: i64 = row.get(10)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        title: row.get(2)?,
        priority: Priority::parse(&priority),
        department: row.get(4)?,
        issue_type: row.get(5)?,
        resolution: row.get(6)?,
        assignee: row.get(7)?,
        date_added_unix_ms: row.get(8)?,
        last_sent_unix_ms: row.get(9)?,
        archived: archived != 0,
        archived_date_unix_ms: row.get(11)?,
    })
}
