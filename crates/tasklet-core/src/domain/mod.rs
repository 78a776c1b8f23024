//! Task domain model.

pub mod page;
pub mod task;

pub use page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest};
pub use task::{NewTask, TaskDraft, TaskId, TaskPatch, TaskRecord, TaskStatus, UnknownStatus};
