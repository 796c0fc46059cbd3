// tasks/model.rs — Task entity, closed enums, and write-time validation.
//
// All task mutations flow through TaskDraft (create) or TaskPatch (update).
// Validation collects every violation before failing, so callers get an
// itemized field list rather than the first error only.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

// ─── Enums ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Personal,
    Work,
    Study,
    Health,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Work => "work",
            Category::Study => "study",
            Category::Health => "health",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "personal" => Some(Category::Personal),
            "work" => Some(Category::Work),
            "study" => Some(Category::Study),
            "health" => Some(Category::Health),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Task lifecycle status. Any transition between any two states is permitted;
/// only entering Completed from a non-Completed state has a side effect
/// (completedAt stamping, handled by the service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(Status::Pending),
            "in-progress" => Some(Status::InProgress),
            "completed" => Some(Status::Completed),
            _ => None,
        }
    }
}

// ─── Task ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder: Option<DateTime<Utc>>,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whole days elapsed since creation. Derived, never persisted.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// True iff a due date is set, lies in the past, and the task is not
    /// completed. Derived, never persisted.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && self.status != Status::Completed,
            None => false,
        }
    }
}

// ─── Validation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// One or more field-level violations, enumerated. Never collapses to a
/// single message — clients need the full list to correct the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Accumulates violations across all fields before failing.
#[derive(Debug, Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations: self.0 })
        }
    }
}

fn check_title(title: &str, out: &mut Violations) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        out.push("title", "title is required");
        return None;
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        out.push(
            "title",
            format!("title must be at most {TITLE_MAX_CHARS} characters"),
        );
        return None;
    }
    Some(trimmed.to_string())
}

fn check_description(desc: &str, out: &mut Violations) -> Option<String> {
    if desc.chars().count() > DESCRIPTION_MAX_CHARS {
        out.push(
            "description",
            format!("description must be at most {DESCRIPTION_MAX_CHARS} characters"),
        );
        return None;
    }
    Some(desc.to_string())
}

/// Parses an RFC 3339 timestamp and enforces the strictly-future rule.
/// The rule is checked at write time only — a stored value is free to
/// become past as time advances.
fn check_future_timestamp(
    field: &str,
    raw: &str,
    now: DateTime<Utc>,
    out: &mut Violations,
) -> Option<DateTime<Utc>> {
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            out.push(field, "must be a valid RFC 3339 timestamp");
            return None;
        }
    };
    if parsed <= now {
        out.push(field, "must be in the future");
        return None;
    }
    Some(parsed)
}

// ─── Create payload ───────────────────────────────────────────────────────────

/// Create payload as received at the boundary. Enum and timestamp fields
/// arrive as raw strings so unknown values become itemized violations
/// instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub reminder: Option<String>,
    pub order: Option<i64>,
}

/// A fully validated create payload with defaults applied.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder: Option<DateTime<Utc>>,
    pub order: i64,
}

impl TaskDraft {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<NewTask, ValidationError> {
        let mut out = Violations::default();

        let title = match self.title.as_deref() {
            Some(t) => check_title(t, &mut out),
            None => {
                out.push("title", "title is required");
                None
            }
        };

        let description = match self.description.as_deref() {
            Some(d) => check_description(d, &mut out),
            None => None,
        };

        let category = match self.category.as_deref() {
            Some(raw) => match Category::parse(raw) {
                Some(c) => c,
                None => {
                    out.push(
                        "category",
                        "must be one of: personal, work, study, health, other",
                    );
                    Category::Personal
                }
            },
            None => Category::Personal,
        };

        let priority = match self.priority.as_deref() {
            Some(raw) => match Priority::parse(raw) {
                Some(p) => p,
                None => {
                    out.push("priority", "must be one of: low, medium, high");
                    Priority::Medium
                }
            },
            None => Priority::Medium,
        };

        let status = match self.status.as_deref() {
            Some(raw) => match Status::parse(raw) {
                Some(s) => s,
                None => {
                    out.push("status", "must be one of: pending, in-progress, completed");
                    Status::Pending
                }
            },
            None => Status::Pending,
        };

        let due_date = self
            .due_date
            .as_deref()
            .and_then(|raw| check_future_timestamp("dueDate", raw, now, &mut out));
        let reminder = self
            .reminder
            .as_deref()
            .and_then(|raw| check_future_timestamp("reminder", raw, now, &mut out));

        out.finish()?;

        Ok(NewTask {
            // finish() returned Ok, so every failed check already bailed
            title: title.unwrap_or_default(),
            description,
            category,
            priority,
            status,
            due_date,
            reminder,
            order: self.order.unwrap_or(0),
        })
    }
}

// ─── Update payload ───────────────────────────────────────────────────────────

/// Partial update payload. Absent fields are left unchanged; present fields
/// go through the same validation as creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub reminder: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder: Option<DateTime<Utc>>,
    pub order: Option<i64>,
}

impl TaskPatch {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<ValidatedPatch, ValidationError> {
        let mut out = Violations::default();

        let title = self.title.as_deref().and_then(|t| check_title(t, &mut out));
        let description = self
            .description
            .as_deref()
            .and_then(|d| check_description(d, &mut out));

        let category = self.category.as_deref().and_then(|raw| {
            let parsed = Category::parse(raw);
            if parsed.is_none() {
                out.push(
                    "category",
                    "must be one of: personal, work, study, health, other",
                );
            }
            parsed
        });

        let priority = self.priority.as_deref().and_then(|raw| {
            let parsed = Priority::parse(raw);
            if parsed.is_none() {
                out.push("priority", "must be one of: low, medium, high");
            }
            parsed
        });

        let status = self.status.as_deref().and_then(|raw| {
            let parsed = Status::parse(raw);
            if parsed.is_none() {
                out.push("status", "must be one of: pending, in-progress, completed");
            }
            parsed
        });

        let due_date = self
            .due_date
            .as_deref()
            .and_then(|raw| check_future_timestamp("dueDate", raw, now, &mut out));
        let reminder = self
            .reminder
            .as_deref()
            .and_then(|raw| check_future_timestamp("reminder", raw, now, &mut out));

        out.finish()?;

        Ok(ValidatedPatch {
            title,
            description,
            category,
            priority,
            status,
            due_date,
            reminder,
            order: self.order,
        })
    }
}

// ─── List filter ──────────────────────────────────────────────────────────────

/// Owner-scoped list filter. All fields optional and combinable; the due-day
/// filter matches any task whose dueDate falls within that calendar day in
/// the server's local time zone.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_day: Option<NaiveDate>,
}

impl ListFilter {
    /// Parse raw query-string values. Unknown enum values and bad dates are
    /// itemized, same as payload validation.
    pub fn parse(
        category: Option<&str>,
        status: Option<&str>,
        priority: Option<&str>,
        due_date: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let mut out = Violations::default();

        let category = category.and_then(|raw| {
            let parsed = Category::parse(raw);
            if parsed.is_none() {
                out.push(
                    "category",
                    "must be one of: personal, work, study, health, other",
                );
            }
            parsed
        });

        let status = status.and_then(|raw| {
            let parsed = Status::parse(raw);
            if parsed.is_none() {
                out.push("status", "must be one of: pending, in-progress, completed");
            }
            parsed
        });

        let priority = priority.and_then(|raw| {
            let parsed = Priority::parse(raw);
            if parsed.is_none() {
                out.push("priority", "must be one of: low, medium, high");
            }
            parsed
        });

        let due_day = due_date.and_then(|raw| {
            let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();
            if parsed.is_none() {
                out.push("dueDate", "must be an ISO calendar date (YYYY-MM-DD)");
            }
            parsed
        });

        out.finish()?;

        Ok(Self {
            category,
            status,
            priority,
            due_day,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_day.is_none()
    }
}

/// UTC bounds of a calendar day in the server's local time zone:
/// [00:00:00.000, 23:59:59.999].
pub fn local_day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end_naive = day.and_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();

    // On DST transitions a local wall-clock time can be ambiguous or absent;
    // take the earliest/latest mapping, falling back to a UTC reading.
    let start = Local
        .from_local_datetime(&start_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&start_naive));
    let end = Local
        .from_local_datetime(&end_naive)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&end_naive));

    (start, end)
}
