use tracing::{debug, info};

use crate::domain::{NewTask, PageRequest, TaskDraft, TaskId, TaskPatch, TaskRecord};
use crate::entities::{task::now, SessionFactory, TaskStore};

/// One page of live tasks plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPage {
    pub items: Vec<TaskRecord>,
    pub total: i64,
    /// Effective page number after normalization.
    pub page_number: i64,
    /// Effective page size after normalization.
    pub page_size: i64,
}

/// Task use cases on top of a [`SessionFactory`].
///
/// Every call runs in its own store session, so each mutating call is exactly
/// one commit. Storage errors are returned untouched.
#[derive(Debug, Clone)]
pub struct TaskService<F> {
    sessions: F,
}

impl<F: SessionFactory> TaskService<F> {
    pub fn new(sessions: F) -> Self {
        Self { sessions }
    }

    /// List live tasks. Out-of-range paging input is normalized, never rejected.
    pub async fn list(
        &self,
        page_number: i64,
        page_size: i64,
        search: Option<&str>,
    ) -> Result<TaskPage, sqlx::Error> {
        let page = PageRequest::new(page_number, page_size);
        let store = self.sessions.session();
        let (total, items) = tokio::try_join!(store.count(search), store.page(page, search))?;
        debug!(
            page_number = page.page_number(),
            page_size = page.page_size(),
            total,
            returned = items.len(),
            "listed tasks"
        );
        Ok(TaskPage {
            items,
            total,
            page_number: page.page_number(),
            page_size: page.page_size(),
        })
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, sqlx::Error> {
        self.sessions.session().get(id).await
    }

    /// Create a task. The creation time is stamped here, never taken from input.
    pub async fn create(&self, task: NewTask) -> Result<TaskRecord, sqlx::Error> {
        let store = self.sessions.session();
        let record = store.add(TaskDraft::new(task, now())).await?;
        store.commit().await?;
        info!(task_id = %record.id(), "task created");
        Ok(record)
    }

    /// Merge `patch` into a live task. `None` if there is no such task.
    pub async fn update(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        let store = self.sessions.session();
        let Some(mut record) = store.get(id).await? else {
            return Ok(None);
        };
        if patch.is_empty() {
            debug!(task_id = %id, "empty patch; nothing to write");
            return Ok(Some(record));
        }
        patch.apply(&mut record);
        match store.update(&record).await {
            Ok(()) => {}
            // Deleted between the read and the write.
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(e) => return Err(e),
        }
        store.commit().await?;
        info!(task_id = %id, "task updated");
        Ok(Some(record))
    }

    /// Soft-delete a live task. `false` if there is no such task.
    pub async fn soft_delete(&self, id: TaskId) -> Result<bool, sqlx::Error> {
        let store = self.sessions.session();
        let Some(mut record) = store.get(id).await? else {
            return Ok(false);
        };
        match store.soft_delete(&mut record).await {
            Ok(()) => {}
            Err(sqlx::Error::RowNotFound) => return Ok(false),
            Err(e) => return Err(e),
        }
        store.commit().await?;
        info!(task_id = %id, "task soft-deleted");
        Ok(true)
    }

    pub async fn list_deleted(&self) -> Result<Vec<TaskRecord>, sqlx::Error> {
        self.sessions.session().list_deleted().await
    }
}
