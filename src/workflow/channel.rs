use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ordered step in a channel's pipeline.
///
/// `order` defines a strict total order within the channel: the "next column"
/// is the one with `order + 1`, and a column with no successor is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub order: u32,
}

impl Column {
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            order,
        }
    }
}

/// Declared type of a custom field. Values are validated against this at the
/// edit boundary, not on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Link,
    Text,
    Number,
    Date,
    Dropdown,
    Checkbox,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Link => write!(f, "link"),
            FieldType::Text => write!(f, "text"),
            FieldType::Number => write!(f, "number"),
            FieldType::Date => write!(f, "date"),
            FieldType::Dropdown => write!(f, "dropdown"),
            FieldType::Checkbox => write!(f, "checkbox"),
        }
    }
}

/// Who may edit a field's value on a task.
///
/// A field with no permission record at all is open to every channel member.
/// A record where nothing is granted is treated the same way, so an empty
/// record never locks a field shut.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPermissions {
    #[serde(default)]
    pub editable_by_roles: BTreeSet<String>,
    #[serde(default)]
    pub editable_by_column_responsibility: bool,
    #[serde(default)]
    pub editable_by_users: BTreeSet<String>,
}

impl FieldPermissions {
    /// True when the record grants nothing, i.e. imposes no restriction.
    pub fn is_open(&self) -> bool {
        self.editable_by_roles.is_empty()
            && !self.editable_by_column_responsibility
            && self.editable_by_users.is_empty()
    }
}

/// A typed, optionally mandatory, optionally permission-restricted data slot
/// attached to every task of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    pub field_type: FieldType,
    pub order: u32,
    /// Display hint for card rendering; carries no validation weight.
    #[serde(default)]
    pub show_on_card_front: bool,
    /// Only meaningful for `FieldType::Dropdown`.
    #[serde(default)]
    pub dropdown_options: Vec<String>,
    /// The field must hold a non-blank value before a task may leave any of
    /// these columns.
    #[serde(default)]
    pub required_in_columns: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<FieldPermissions>,
}

impl CustomField {
    pub fn new(name: impl Into<String>, field_type: FieldType, order: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            field_type,
            order,
            show_on_card_front: false,
            dropdown_options: Vec::new(),
            required_in_columns: BTreeSet::new(),
            permissions: None,
        }
    }
}

/// A unit of work with its own pipeline of columns and membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub members: BTreeSet<String>,
    pub manager_id: Option<String>,
    /// Column id → user ids and/or role ids responsible for work in that
    /// column.
    #[serde(default)]
    pub column_assignments: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description,
            columns: Vec::new(),
            custom_fields: Vec::new(),
            members: BTreeSet::new(),
            manager_id: None,
            column_assignments: BTreeMap::new(),
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// The column with `order + 1`, or `None` when `column` is terminal.
    pub fn next_column(&self, column: &Column) -> Option<&Column> {
        self.columns.iter().find(|c| c.order == column.order + 1)
    }

    /// The entry column of the pipeline (order 0).
    pub fn first_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.order == 0)
    }

    pub fn field(&self, field_id: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.id == field_id)
    }

    /// Members, the manager included, have channel access.
    pub fn has_access(&self, user_id: &str) -> bool {
        self.members.contains(user_id) || self.manager_id.as_deref() == Some(user_id)
    }

    /// Column `order` values must be unique and gapless from 0. Holding this
    /// is what makes the next-column lookup single-valued.
    pub fn column_order_is_valid(&self) -> bool {
        let mut orders: Vec<u32> = self.columns.iter().map(|c| c.order).collect();
        orders.sort_unstable();
        orders
            .iter()
            .enumerate()
            .all(|(i, &order)| order == i as u32)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_with_columns(orders: &[u32]) -> Channel {
        let mut channel = Channel::new("Launch Videos", None);
        channel.columns = orders
            .iter()
            .map(|&o| Column {
                id: format!("col-{o}"),
                name: format!("Column {o}"),
                order: o,
            })
            .collect();
        channel
    }

    #[test]
    fn next_column_follows_order() {
        let channel = channel_with_columns(&[0, 1, 2]);
        let first = channel.column("col-0").unwrap();
        let next = channel.next_column(first).unwrap();
        assert_eq!(next.id, "col-1");
    }

    #[test]
    fn last_column_has_no_next() {
        let channel = channel_with_columns(&[0, 1]);
        let last = channel.column("col-1").unwrap();
        assert!(channel.next_column(last).is_none());
    }

    #[test]
    fn next_column_ignores_declaration_order() {
        // Columns stored out of order still resolve by `order`.
        let channel = channel_with_columns(&[2, 0, 1]);
        let first = channel.column("col-0").unwrap();
        assert_eq!(channel.next_column(first).unwrap().id, "col-1");
        assert_eq!(channel.first_column().unwrap().id, "col-0");
    }

    #[test]
    fn column_order_valid_when_gapless_from_zero() {
        assert!(channel_with_columns(&[0, 1, 2]).column_order_is_valid());
        assert!(channel_with_columns(&[]).column_order_is_valid());
    }

    #[test]
    fn column_order_invalid_on_gap() {
        assert!(!channel_with_columns(&[0, 2]).column_order_is_valid());
    }

    #[test]
    fn column_order_invalid_on_duplicate() {
        assert!(!channel_with_columns(&[0, 1, 1]).column_order_is_valid());
    }

    #[test]
    fn column_order_invalid_when_not_starting_at_zero() {
        assert!(!channel_with_columns(&[1, 2]).column_order_is_valid());
    }

    #[test]
    fn manager_has_channel_access() {
        let mut channel = channel_with_columns(&[0]);
        channel.members.insert("user-a".to_string());
        channel.manager_id = Some("user-m".to_string());

        assert!(channel.has_access("user-a"));
        assert!(channel.has_access("user-m"));
        assert!(!channel.has_access("user-x"));
    }

    #[test]
    fn empty_permissions_record_is_open() {
        assert!(FieldPermissions::default().is_open());

        let restricted = FieldPermissions {
            editable_by_users: BTreeSet::from(["user-a".to_string()]),
            ..Default::default()
        };
        assert!(!restricted.is_open());
    }

    #[test]
    fn field_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FieldType::Dropdown).unwrap(),
            "\"dropdown\""
        );
        let parsed: FieldType = serde_json::from_str("\"checkbox\"").unwrap();
        assert_eq!(parsed, FieldType::Checkbox);
    }

    #[test]
    fn channel_serialization_roundtrip() {
        let mut channel = channel_with_columns(&[0, 1]);
        channel
            .column_assignments
            .insert("col-0".to_string(), BTreeSet::from(["user-a".to_string()]));
        let mut field = CustomField::new("Video Link", FieldType::Link, 0);
        field.required_in_columns.insert("col-0".to_string());
        channel.custom_fields.push(field);

        let json = serde_json::to_string(&channel).unwrap();
        let parsed: Channel = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, channel.id);
        assert_eq!(parsed.columns, channel.columns);
        assert_eq!(parsed.custom_fields, channel.custom_fields);
        assert_eq!(parsed.column_assignments, channel.column_assignments);
        assert_eq!(parsed.created_at, channel.created_at);
    }
}
