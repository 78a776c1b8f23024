use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;

use crate::domain::task::stored_precision;
use crate::domain::{PageRequest, TaskDraft, TaskId, TaskRecord, TaskStatus};

/// Record-store contract for tasks.
///
/// Default queries (`get`, `page`, `count`) never return soft-deleted rows;
/// `get_any` and `list_deleted` are the only unfiltered entry points.
/// Mutations are not visible to anyone until `commit` succeeds.
pub trait TaskStore: Send + Sync {
    /// A live record by id.
    fn get(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    /// A record by id, deleted or not.
    fn get_any(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    /// Live records matching `search`, newest first, windowed by `page`.
    fn page(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> impl Future<Output = Result<Vec<TaskRecord>, sqlx::Error>> + Send;

    /// Number of live records matching `search`.
    fn count(
        &self,
        search: Option<&str>,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Insert `draft` and return it with its assigned id.
    fn add(
        &self,
        draft: TaskDraft,
    ) -> impl Future<Output = Result<TaskRecord, sqlx::Error>> + Send;

    /// Persist the mutable fields of a live record.
    /// Fails with [`sqlx::Error::RowNotFound`] if no live row has that id.
    fn update(
        &self,
        record: &TaskRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Stamp the deletion time on `record` and persist the soft delete.
    /// Fails with [`sqlx::Error::RowNotFound`] if no live row has that id.
    fn soft_delete(
        &self,
        record: &mut TaskRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Every soft-deleted record, most recently deleted first.
    fn list_deleted(&self) -> impl Future<Output = Result<Vec<TaskRecord>, sqlx::Error>> + Send;

    /// Make all staged mutations visible at once. No-op when nothing is staged.
    fn commit(&self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

type TaskRow = (
    i64,
    String,
    Option<String>,
    i64,
    String,
    Option<String>,
    Option<String>,
);

const SELECT_COLUMNS: &str =
    "SELECT id, title, description, status, created_at, due_date, deleted_at FROM tasks";

const SEARCH_PREDICATE: &str = "(?1 IS NULL \
     OR title LIKE ?1 ESCAPE '\\' \
     OR description LIKE ?1 ESCAPE '\\')";

/// One unit of work against the SQLite pool.
///
/// The first mutation opens a transaction that every later mutation joins.
/// Dropping the session without committing (including dropping an in-flight
/// future) rolls that transaction back. Reads go to the pool and see
/// committed state only.
pub struct SqliteTaskSession {
    pool: SqlitePool,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl std::fmt::Debug for SqliteTaskSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.tx.try_lock().map(|tx| tx.is_some()).unwrap_or(true);
        write!(f, "SqliteTaskSession(pending={pending})")
    }
}

impl SqliteTaskSession {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    async fn transaction<'a>(
        &self,
        slot: &'a mut Option<Transaction<'static, Sqlite>>,
    ) -> Result<&'a mut Transaction<'static, Sqlite>, sqlx::Error> {
        let tx = match slot.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(slot.insert(tx))
    }
}

impl TaskStore for SqliteTaskSession {
    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, sqlx::Error> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1 AND is_deleted = 0"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;
        row.map(decode_row).transpose()
    }

    async fn get_any(&self, id: TaskId) -> Result<Option<TaskRecord>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_row).transpose()
    }

    async fn page(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE is_deleted = 0 AND {SEARCH_PREDICATE} \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(like_pattern(search))
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(decode_row).collect()
    }

    async fn count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM tasks WHERE is_deleted = 0 AND {SEARCH_PREDICATE}"
        ))
        .bind(like_pattern(search))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn add(&self, draft: TaskDraft) -> Result<TaskRecord, sqlx::Error> {
        let mut slot = self.tx.lock().await;
        let tx = self.transaction(&mut slot).await?;
        let result = sqlx::query(
            "INSERT INTO tasks (title, description, status, created_at, due_date, is_deleted, deleted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL)",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.status.code())
        .bind(encode_time(draft.created_at))
        .bind(draft.due_date.map(encode_time))
        .execute(&mut **tx)
        .await?;
        let id = TaskId::new(result.last_insert_rowid());
        tracing::debug!(task_id = %id, "task insert staged");
        Ok(draft.into_record(id))
    }

    async fn update(&self, record: &TaskRecord) -> Result<(), sqlx::Error> {
        let mut slot = self.tx.lock().await;
        let tx = self.transaction(&mut slot).await?;
        let result = sqlx::query(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, due_date = ?4 \
             WHERE id = ?5 AND is_deleted = 0",
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.status.code())
        .bind(record.due_date.map(encode_time))
        .bind(record.id().get())
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn soft_delete(&self, record: &mut TaskRecord) -> Result<(), sqlx::Error> {
        let deleted_at = now();
        let mut slot = self.tx.lock().await;
        let tx = self.transaction(&mut slot).await?;
        let result = sqlx::query(
            "UPDATE tasks SET is_deleted = 1, deleted_at = ?1 WHERE id = ?2 AND is_deleted = 0",
        )
        .bind(encode_time(deleted_at))
        .bind(record.id().get())
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        record.mark_deleted(deleted_at);
        Ok(())
    }

    async fn list_deleted(&self) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE is_deleted = 1 ORDER BY deleted_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(decode_row).collect()
    }

    async fn commit(&self) -> Result<(), sqlx::Error> {
        let pending = self.tx.lock().await.take();
        if let Some(tx) = pending {
            tx.commit().await?;
        }
        Ok(())
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

/// Current UTC time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    stored_precision(Utc::now())
}

/// Fixed-width RFC 3339 so that text order is time order.
fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(column: &str, raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_owned(),
            source: Box::new(e),
        })
}

/// `%needle%` with LIKE wildcards in the needle escaped. Blank searches
/// become `None`, which the query treats as "no filter".
fn like_pattern(search: Option<&str>) -> Option<String> {
    let needle = search.filter(|s| !s.trim().is_empty())?;
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

fn decode_row(row: TaskRow) -> Result<TaskRecord, sqlx::Error> {
    let (id, title, description, status, created_at, due_date, deleted_at) = row;
    let status = TaskStatus::try_from(status).map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_owned(),
        source: Box::new(e),
    })?;
    Ok(TaskRecord::from_parts(
        TaskId::new(id),
        title,
        description,
        status,
        decode_time("created_at", &created_at)?,
        due_date
            .as_deref()
            .map(|raw| decode_time("due_date", raw))
            .transpose()?,
        deleted_at
            .as_deref()
            .map(|raw| decode_time("deleted_at", raw))
            .transpose()?,
    ))
}
