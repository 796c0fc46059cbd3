// Task domain: entity + validation (model) and the owner-scoped service
// that performs all mutations against storage.

pub mod model;
pub mod service;

pub use model::{
    Category, FieldViolation, ListFilter, Priority, Status, Task, TaskDraft, TaskPatch,
    ValidationError,
};
pub use service::{TaskError, TaskService};
