pub mod task;

pub use task::{TaskPage, TaskService};
