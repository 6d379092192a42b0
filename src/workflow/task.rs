use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::channel::{Channel, Column, FieldType};

/// A custom field value, tagged by the field type it was written as.
///
/// The source of record for a task's per-stage data. Type conformance against
/// the field's declared [`FieldType`] is enforced where values enter the
/// system, so a stored value can be trusted on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Link(String),
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Dropdown(String),
    Checkbox(bool),
}

impl FieldValue {
    /// A value is blank when its string content is empty or whitespace-only.
    /// Numbers, dates and checkboxes (checked or not) are never blank.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Link(s) | FieldValue::Text(s) | FieldValue::Dropdown(s) => {
                s.trim().is_empty()
            }
            FieldValue::Number(_) | FieldValue::Date(_) | FieldValue::Checkbox(_) => false,
        }
    }

    /// Whether this value's variant matches the declared field type.
    pub fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Link(_), FieldType::Link)
                | (FieldValue::Text(_), FieldType::Text)
                | (FieldValue::Number(_), FieldType::Number)
                | (FieldValue::Date(_), FieldType::Date)
                | (FieldValue::Dropdown(_), FieldType::Dropdown)
                | (FieldValue::Checkbox(_), FieldType::Checkbox)
        )
    }
}

/// A single work item moving through its channel's pipeline.
///
/// A task exists exactly while it is active; finalization replaces it with a
/// [`CompletedTask`] snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub channel_id: String,
    /// Current stage; always a column of `channel_id`.
    pub column_id: String,
    #[serde(default)]
    pub assigned_to: BTreeSet<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub field_values: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        channel_id: impl Into<String>,
        column_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            channel_id: channel_id.into(),
            column_id: column_id.into(),
            assigned_to: BTreeSet::new(),
            due_date: None,
            field_values: BTreeMap::new(),
            notes: String::new(),
            links: Vec::new(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_field_value(&mut self, field_id: impl Into<String>, value: FieldValue) {
        self.field_values.insert(field_id.into(), value);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What kind of transition a [`StageEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEventType {
    StageCompleted,
    Finalized,
}

impl fmt::Display for StageEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageEventType::StageCompleted => write!(f, "stage_completed"),
            StageEventType::Finalized => write!(f, "finalized"),
        }
    }
}

/// Immutable audit record of one stage transition. Append-only: the store
/// exposes no way to edit or delete one, and transition history has no other
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub id: String,
    pub task_id: String,
    pub channel_id: String,
    pub actor_user_id: String,
    pub from_column_id: String,
    pub to_column_id: String,
    pub event_type: StageEventType,
    pub occurred_at: DateTime<Utc>,
}

impl StageEvent {
    /// Records a task leaving `from` for `to`.
    pub fn stage_completed(
        task: &Task,
        actor_user_id: &str,
        from: &Column,
        to: &Column,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            channel_id: task.channel_id.clone(),
            actor_user_id: actor_user_id.to_string(),
            from_column_id: from.id.clone(),
            to_column_id: to.id.clone(),
            event_type: StageEventType::StageCompleted,
            occurred_at,
        }
    }

    /// Records terminal completion. Self-referential from/to marks the final
    /// column.
    pub fn finalized(
        task: &Task,
        actor_user_id: &str,
        last: &Column,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            channel_id: task.channel_id.clone(),
            actor_user_id: actor_user_id.to_string(),
            from_column_id: last.id.clone(),
            to_column_id: last.id.clone(),
            event_type: StageEventType::Finalized,
            occurred_at,
        }
    }
}

/// Write-once archival snapshot produced at finalization.
///
/// Channel and column are copied by *name*, not referenced by id, so later
/// renames never rewrite history. No update operation exists for this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub channel_name: String,
    pub column_name: String,
    pub assigned_to: BTreeSet<String>,
    pub field_values: BTreeMap<String, FieldValue>,
    pub notes: String,
    pub links: Vec<String>,
    pub completed_by: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletedTask {
    /// Pure derivation from the task's full state at the moment of
    /// finalization.
    pub fn from_task(
        task: &Task,
        channel: &Channel,
        column: &Column,
        completed_by: &str,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            channel_name: channel.name.clone(),
            column_name: column.name.clone(),
            assigned_to: task.assigned_to.clone(),
            field_values: task.field_values.clone(),
            notes: task.notes.clone(),
            links: task.links.clone(),
            completed_by: completed_by.to_string(),
            completed_at,
        }
    }
}
