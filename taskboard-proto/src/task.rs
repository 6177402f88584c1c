//! Task model shared by the board client and the CRUD backend.
//!
//! Tasks travel as JSON between the client and the CRUD collaborator, so
//! field names follow the backend's wire shape (`_id`, `dueDate`) while the
//! Rust side keeps snake case.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque task identifier assigned by the CRUD backend.
///
/// The empty string marks a draft that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier carried by a draft task.
    #[must_use]
    pub const fn draft() -> Self {
        Self(String::new())
    }

    /// Returns `true` if this id belongs to a task not yet persisted.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the string form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Error returned when a status or priority string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Board column a task lives in.
///
/// Declaration order is the left-to-right column order on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[serde(rename = "To Do")]
    ToDo,
    /// Actively being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Done.
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [Self; 3] = [Self::ToDo, Self::InProgress, Self::Completed];

    /// The wire/display label of this status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    /// Accepts the wire labels plus compact spellings (`todo`, `in-progress`,
    /// `in_progress`, `done`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "todo" => Ok(Self::ToDo),
            "inprogress" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(ParseEnumError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// Task priority. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskPriority {
    /// Can wait.
    Low,
    /// The default for new tasks.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl TaskPriority {
    /// All priorities from lowest to highest.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// The wire/display label of this priority.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend-assigned id; empty for drafts.
    #[serde(rename = "_id", default, skip_serializing_if = "TaskId::is_draft")]
    pub id: TaskId,
    /// Required, non-empty.
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Calendar date only. See [`due_date`] for the accepted input forms.
    #[serde(default, with = "due_date")]
    pub due_date: Option<NaiveDate>,
}

impl Task {
    /// The blank template a new task starts from: `To Do`, `Medium`, no
    /// due date, empty id.
    #[must_use]
    pub fn draft() -> Self {
        Self {
            id: TaskId::draft(),
            title: String::new(),
            description: String::new(),
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            due_date: None,
        }
    }

    /// Returns `true` if the task has not been persisted yet.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.id.is_draft()
    }

    /// Checks the fields a task must carry before it can be submitted.
    ///
    /// Whitespace-only titles count as empty.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every failing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut fields = BTreeMap::new();
        if self.title.trim().is_empty() {
            fields.insert(TaskField::Title, "title is required".to_string());
        }
        if self.due_date.is_none() {
            fields.insert(TaskField::DueDate, "due date is required".to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields })
        }
    }
}

/// Task fields that can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskField {
    Title,
    DueDate,
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::DueDate => f.write_str("dueDate"),
        }
    }
}

/// Field-level validation failures for a task submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task: {}", summarize(.fields))]
pub struct ValidationError {
    /// One message per failing field.
    pub fields: BTreeMap<TaskField, String>,
}

impl ValidationError {
    /// Returns the message for `field`, if it failed.
    #[must_use]
    pub fn message(&self, field: TaskField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }
}

fn summarize(fields: &BTreeMap<TaskField, String>) -> String {
    fields
        .values()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serde adapter for the optional due date.
///
/// Writes `YYYY-MM-DD`. Reads either that form or an RFC 3339 timestamp
/// (the backend stores dates as midnight UTC instants), keeping only the
/// calendar date. Empty strings and `null` read as `None`.
pub mod due_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_some(&date.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Parses a due date from either accepted form.
    ///
    /// # Errors
    ///
    /// Returns a description of the rejected input.
    pub fn parse(raw: &str) -> Result<Option<NaiveDate>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, FORMAT) {
            return Ok(Some(date));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.date_naive()))
            .map_err(|e| format!("invalid due date {raw:?}: {e}"))
    }
}
