// tasks/service.rs — the Task Service.
//
// Every task mutation and query goes through here: validation, ownership
// scoping, completion stamping, and reorder semantics. No other component
// touches task rows directly.

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::storage::{from_ms, to_ms, Storage, TaskRow};
use crate::tasks::model::{
    local_day_bounds, Category, ListFilter, Priority, Status, Task, TaskDraft, TaskPatch,
    ValidationError,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("task not found")]
    NotFound,
    /// Opaque persistence failure. Logged server-side; never classified
    /// further or leaked to clients.
    #[error("storage failure")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct TaskService {
    storage: Storage,
}

impl TaskService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Tasks matching all supplied filters, ascending by rank. An empty
    /// result is not an error.
    pub async fn list(&self, owner: &str, filter: &ListFilter) -> Result<Vec<Task>, TaskError> {
        let mut rows = self.storage.list_tasks(owner).await?;

        // Post-filter the optional fields on the owner-scoped base query
        // (SQLite has limited dynamic WHERE support without a query builder).
        if let Some(category) = filter.category {
            rows.retain(|r| r.category == category.as_str());
        }
        if let Some(status) = filter.status {
            rows.retain(|r| r.status == status.as_str());
        }
        if let Some(priority) = filter.priority {
            rows.retain(|r| r.priority == priority.as_str());
        }
        if let Some(day) = filter.due_day {
            let (start, end) = local_day_bounds(day);
            let (start_ms, end_ms) = (to_ms(start), to_ms(end));
            rows.retain(|r| {
                r.due_date
                    .map(|due| due >= start_ms && due <= end_ms)
                    .unwrap_or(false)
            });
        }

        rows.into_iter().map(row_to_task).collect()
    }

    pub async fn create(&self, owner: &str, draft: &TaskDraft) -> Result<Task, TaskError> {
        let now = Utc::now();
        let new = draft.validate(now)?;

        let row = TaskRow {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            title: new.title,
            description: new.description,
            category: new.category.as_str().to_string(),
            priority: new.priority.as_str().to_string(),
            status: new.status.as_str().to_string(),
            due_date: new.due_date.map(to_ms),
            reminder: new.reminder.map(to_ms),
            sort_order: new.order,
            created_at: to_ms(now),
            completed_at: None,
        };

        let inserted = self.storage.insert_task(&row).await?;
        debug!(task_id = %inserted.id, owner, "task created");
        row_to_task(inserted)
    }

    /// Merge a validated patch onto the existing record. Entering Completed
    /// from a non-Completed state stamps completedAt; leaving Completed does
    /// not clear it.
    pub async fn update(&self, owner: &str, id: &str, patch: &TaskPatch) -> Result<Task, TaskError> {
        let now = Utc::now();
        let valid = patch.validate(now)?;

        let mut row = self
            .storage
            .get_task(owner, id)
            .await?
            .ok_or(TaskError::NotFound)?;

        let was_completed = row.status == Status::Completed.as_str();

        if let Some(title) = valid.title {
            row.title = title;
        }
        if let Some(description) = valid.description {
            row.description = Some(description);
        }
        if let Some(category) = valid.category {
            row.category = category.as_str().to_string();
        }
        if let Some(priority) = valid.priority {
            row.priority = priority.as_str().to_string();
        }
        if let Some(status) = valid.status {
            row.status = status.as_str().to_string();
            if status == Status::Completed && !was_completed {
                row.completed_at = Some(to_ms(now));
            }
        }
        if let Some(due) = valid.due_date {
            row.due_date = Some(to_ms(due));
        }
        if let Some(reminder) = valid.reminder {
            row.reminder = Some(to_ms(reminder));
        }
        if let Some(order) = valid.order {
            row.sort_order = order;
        }

        if !self.storage.update_task(&row).await? {
            // Deleted between the read and the write.
            return Err(TaskError::NotFound);
        }
        debug!(task_id = %row.id, owner, "task updated");
        row_to_task(row)
    }

    pub async fn get(&self, owner: &str, id: &str) -> Result<Task, TaskError> {
        let row = self
            .storage
            .get_task(owner, id)
            .await?
            .ok_or(TaskError::NotFound)?;
        row_to_task(row)
    }

    /// Permanent removal — no soft delete, no cascading effects.
    pub async fn delete(&self, owner: &str, id: &str) -> Result<(), TaskError> {
        if !self.storage.delete_task(owner, id).await? {
            return Err(TaskError::NotFound);
        }
        debug!(task_id = %id, owner, "task deleted");
        Ok(())
    }

    /// Assign each task's rank to its zero-based position in `ids`. Ids not
    /// owned by the caller are skipped silently (the owner-scoped update
    /// matches nothing). Applied as independent per-task updates, not one
    /// transaction — a crash or an interleaved write mid-reorder can leave
    /// ranks partially updated. Returns the number of tasks updated.
    pub async fn reorder(&self, owner: &str, ids: &[String]) -> Result<usize, TaskError> {
        let mut updated = 0;
        for (position, id) in ids.iter().enumerate() {
            if self
                .storage
                .set_task_order(owner, id, position as i64)
                .await?
            {
                updated += 1;
            }
        }
        debug!(owner, updated, requested = ids.len(), "tasks reordered");
        Ok(updated)
    }

    /// Projection of `list` with a single fixed category filter.
    pub async fn get_by_category(
        &self,
        owner: &str,
        category: Category,
    ) -> Result<Vec<Task>, TaskError> {
        let filter = ListFilter {
            category: Some(category),
            ..Default::default()
        };
        self.list(owner, &filter).await
    }

    /// Projection of `list` with a single fixed due-day filter.
    pub async fn get_by_due_date(
        &self,
        owner: &str,
        day: NaiveDate,
    ) -> Result<Vec<Task>, TaskError> {
        let filter = ListFilter {
            due_day: Some(day),
            ..Default::default()
        };
        self.list(owner, &filter).await
    }
}

/// A row that fails to parse means the table was written by something other
/// than this service; surface it as a storage fault.
fn row_to_task(row: TaskRow) -> Result<Task, TaskError> {
    let category = Category::parse(&row.category)
        .ok_or_else(|| anyhow::anyhow!("corrupt category column: {}", row.category))?;
    let priority = Priority::parse(&row.priority)
        .ok_or_else(|| anyhow::anyhow!("corrupt priority column: {}", row.priority))?;
    let status = Status::parse(&row.status)
        .ok_or_else(|| anyhow::anyhow!("corrupt status column: {}", row.status))?;

    Ok(Task {
        id: row.id,
        owner: row.owner,
        title: row.title,
        description: row.description,
        category,
        priority,
        status,
        due_date: row.due_date.map(from_ms),
        reminder: row.reminder.map(from_ms),
        order: row.sort_order,
        created_at: from_ms(row.created_at),
        completed_at: row.completed_at.map(from_ms),
    })
}
