// rest/routes/tasks.rs — Task REST routes.
//
// Handlers stay thin: parse the boundary inputs, call the Task Service with
// the authenticated principal, shape the JSON. Responses carry the derived
// `age` and `isOverdue` fields alongside the persisted attributes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::identity::Principal;
use crate::rest::error::ApiError;
use crate::tasks::model::{FieldViolation, ValidationError};
use crate::tasks::{Category, ListFilter, Task, TaskDraft, TaskError, TaskPatch};
use crate::AppContext;

/// Serialize a task plus its derived, never-persisted fields.
fn task_json(task: &Task) -> Value {
    let now = Utc::now();
    let mut value = serde_json::to_value(task).unwrap_or_else(|_| json!({}));
    value["age"] = json!(task.age_days(now));
    value["isOverdue"] = json!(task.is_overdue(now));
    value
}

fn tasks_json(tasks: &[Task]) -> Value {
    json!({ "tasks": tasks.iter().map(task_json).collect::<Vec<_>>() })
}

fn single_field_error(field: &str, message: &str) -> ApiError {
    ApiError::Task(TaskError::Validation(ValidationError {
        violations: vec![FieldViolation {
            field: field.to_string(),
            message: message.to_string(),
        }],
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = ListFilter::parse(
        q.category.as_deref(),
        q.status.as_deref(),
        q.priority.as_deref(),
        q.due_date.as_deref(),
    )
    .map_err(TaskError::Validation)?;

    let tasks = ctx.tasks.list(principal.id(), &filter).await?;
    Ok(Json(tasks_json(&tasks)))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let task = ctx.tasks.create(principal.id(), &draft).await?;
    Ok((StatusCode::CREATED, Json(task_json(&task))))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = ctx.tasks.get(principal.id(), &id).await?;
    Ok(Json(task_json(&task)))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Value>, ApiError> {
    let task = ctx.tasks.update(principal.id(), &id, &patch).await?;
    Ok(Json(task_json(&task)))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.tasks.delete(principal.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reorder payload entry: `{"id": "..."}`. The service assigns each task's
/// rank from its position in the sequence.
#[derive(Debug, Deserialize)]
pub struct ReorderItem {
    pub id: String,
}

pub async fn reorder_tasks(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Json(items): Json<Vec<ReorderItem>>,
) -> Result<Json<Value>, ApiError> {
    let ids: Vec<String> = items.into_iter().map(|i| i.id).collect();
    let updated = ctx.tasks.reorder(principal.id(), &ids).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn tasks_by_category(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Path(category): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let category = Category::parse(&category).ok_or_else(|| {
        single_field_error("category", "must be one of: personal, work, study, health, other")
    })?;
    let tasks = ctx.tasks.get_by_category(principal.id(), category).await?;
    Ok(Json(tasks_json(&tasks)))
}

pub async fn tasks_by_due_date(
    State(ctx): State<Arc<AppContext>>,
    Extension(principal): Extension<Principal>,
    Path(date): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        single_field_error("dueDate", "must be an ISO calendar date (YYYY-MM-DD)")
    })?;
    let tasks = ctx.tasks.get_by_due_date(principal.id(), day).await?;
    Ok(Json(tasks_json(&tasks)))
}
