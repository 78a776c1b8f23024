use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Store-assigned identifier of a task record. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a task. Persisted as its integer code.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum TaskStatus {
    #[default]
    Pending = 0,
    InProgress = 1,
    Done = 2,
    Archived = 3,
}

impl TaskStatus {
    pub const fn code(self) -> i64 {
        self as i64
    }
}

/// A status code read from storage that maps to no [`TaskStatus`].
#[derive(Debug, thiserror::Error)]
#[error("unknown task status code {0}")]
pub struct UnknownStatus(pub i64);

impl TryFrom<i64> for TaskStatus {
    type Error = UnknownStatus;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Done),
            3 => Ok(Self::Archived),
            other => Err(UnknownStatus(other)),
        }
    }
}

/// A persisted task.
///
/// `created_at` is fixed once the record exists. The deletion timestamp is
/// the only soft-delete state, so "deleted" and "has a deletion timestamp"
/// cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Rebuild a record from stored columns.
    pub(crate) fn from_parts(
        id: TaskId,
        title: String,
        description: Option<String>,
        status: TaskStatus,
        created_at: DateTime<Utc>,
        due_date: Option<DateTime<Utc>>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            title,
            description,
            status,
            created_at,
            due_date,
            deleted_at,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub(crate) fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }
}

/// Input for creating a task. Validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// A task that has a creation timestamp but no identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(task: NewTask, created_at: DateTime<Utc>) -> Self {
        Self {
            title: task.title,
            description: task.description,
            status: TaskStatus::default(),
            created_at: stored_precision(created_at),
            due_date: task.due_date.map(stored_precision),
        }
    }

    pub(crate) fn into_record(self, id: TaskId) -> TaskRecord {
        TaskRecord {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            created_at: self.created_at,
            due_date: self.due_date,
            deleted_at: None,
        }
    }
}

/// Merge-patch for a task.
///
/// Outer `None` leaves a field untouched. For the nullable fields,
/// `Some(None)` clears the value and `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
    }

    /// Copy every present field onto `record`.
    pub fn apply(self, record: &mut TaskRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(due_date) = self.due_date {
            record.due_date = due_date.map(stored_precision);
        }
    }
}

/// Timestamps are kept to the microsecond so a record read back from storage
/// compares equal to the one that was written.
pub(crate) fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    fn sample() -> TaskRecord {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        TaskDraft::new(
            NewTask {
                title: "Buy milk".into(),
                description: Some("2 litres".into()),
                due_date: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            },
            created,
        )
        .into_record(TaskId::new(7))
    }

    #[test]
    fn status_codes_round_trip() {
        for status in TaskStatus::iter() {
            assert_eq!(TaskStatus::try_from(status.code()).unwrap(), status);
        }
        assert!(TaskStatus::try_from(9).is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("inprogress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::Done.to_string(), "Done");
    }

    #[test]
    fn draft_defaults_to_pending_and_live() {
        let record = sample();
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(!record.is_deleted());
        assert_eq!(record.deleted_at(), None);
    }

    #[test]
    fn patch_with_only_status_leaves_other_fields() {
        let mut record = sample();
        let before = record.clone();
        TaskPatch {
            status: Some(TaskStatus::Done),
            ..TaskPatch::default()
        }
        .apply(&mut record);

        assert_eq!(record.status, TaskStatus::Done);
        assert_eq!(record.title, before.title);
        assert_eq!(record.description, before.description);
        assert_eq!(record.due_date, before.due_date);
        assert_eq!(record.created_at(), before.created_at());
    }

    #[test]
    fn patch_distinguishes_clear_from_absent() {
        let mut record = sample();
        TaskPatch {
            description: Some(None),
            ..TaskPatch::default()
        }
        .apply(&mut record);
        assert_eq!(record.description, None);
        assert!(record.due_date.is_some());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(TaskPatch::default().is_empty());
        assert!(
            !TaskPatch {
                title: Some("x".into()),
                ..TaskPatch::default()
            }
            .is_empty()
        );
    }
}
