use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

/// Timestamps are stored as epoch milliseconds so owner-scoped range scans
/// (the due-day filter) hit the integer indexes directly.
pub fn to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// One persisted task. Enum columns hold the lowercase wire strings; the
/// service layer parses them back into the closed enums.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub due_date: Option<i64>,
    pub reminder: Option<i64>,
    /// Display rank. Exposed as `order` in the API; renamed in SQL because
    /// ORDER is a keyword.
    pub sort_order: i64,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("taskd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            use sqlx::ConnectOptions as _;
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Close the connection pool. Called once at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ─── Tasks ──────────────────────────────────────────────────────────────

    pub async fn insert_task(&self, row: &TaskRow) -> Result<TaskRow> {
        sqlx::query(
            "INSERT INTO tasks
             (id, owner, title, description, category, priority, status,
              due_date, reminder, sort_order, created_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.owner)
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.category)
        .bind(&row.priority)
        .bind(&row.status)
        .bind(row.due_date)
        .bind(row.reminder)
        .bind(row.sort_order)
        .bind(row.created_at)
        .bind(row.completed_at)
        .execute(&self.pool)
        .await?;

        self.get_task(&row.owner, &row.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("task not found after insert"))
    }

    /// Owner-scoped lookup — a foreign-owned id is indistinguishable from an
    /// absent one.
    pub async fn get_task(&self, owner: &str, id: &str) -> Result<Option<TaskRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM tasks WHERE id = ? AND owner = ?")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// All of one owner's tasks, ascending by rank. Filtering on the optional
    /// fields happens in the service layer.
    pub async fn list_tasks(&self, owner: &str) -> Result<Vec<TaskRow>> {
        let pool = self.pool.clone();
        let owner = owner.to_string();
        with_timeout(async move {
            Ok(sqlx::query_as(
                "SELECT * FROM tasks WHERE owner = ? ORDER BY sort_order ASC, created_at ASC",
            )
            .bind(&owner)
            .fetch_all(&pool)
            .await?)
        })
        .await
    }

    pub async fn update_task(&self, row: &TaskRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tasks
             SET title = ?, description = ?, category = ?, priority = ?, status = ?,
                 due_date = ?, reminder = ?, sort_order = ?, completed_at = ?
             WHERE id = ? AND owner = ?",
        )
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.category)
        .bind(&row.priority)
        .bind(&row.status)
        .bind(row.due_date)
        .bind(row.reminder)
        .bind(row.sort_order)
        .bind(row.completed_at)
        .bind(&row.id)
        .bind(&row.owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_task(&self, owner: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Assign a single task's rank, scoped to the owner. Returns false when
    /// the id is absent or foreign-owned — reorder skips those silently.
    pub async fn set_task_order(&self, owner: &str, id: &str, rank: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE tasks SET sort_order = ? WHERE id = ? AND owner = ?")
            .bind(rank)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
