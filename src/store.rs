//! Canonical in-memory collections and their persistence round-trip.
//!
//! The store is an explicitly owned object handed to the engine by reference;
//! there is no ambient singleton. Every mutating operation is synchronous and
//! immediately durable: the full collection set is written through the
//! persistence port before the call returns. Collections keep insertion order,
//! mirroring the JSON arrays they round-trip as.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::TrellisError;
use crate::persist::SlotStore;
use crate::workflow::{
    AppSettings, Channel, Column, CompletedTask, CustomField, FieldValue, OvertimeEntry, Role,
    RoleLevel, StageEvent, Task, User,
};

const SLOT_CHANNELS: &str = "channels";
const SLOT_TASKS: &str = "tasks";
const SLOT_USERS: &str = "users";
const SLOT_ROLES: &str = "roles";
const SLOT_OVERTIME: &str = "overtime_entries";
const SLOT_COMPLETED: &str = "completed_tasks";
const SLOT_EVENTS: &str = "stage_events";
const SLOT_SETTINGS: &str = "app_settings";

/// Fields of a channel that plain CRUD may replace. `None` leaves the
/// existing value untouched (shallow merge).
#[derive(Debug, Default, Clone)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub columns: Option<Vec<Column>>,
    pub custom_fields: Option<Vec<CustomField>>,
    pub members: Option<BTreeSet<String>>,
    pub manager_id: Option<Option<String>>,
    pub column_assignments: Option<BTreeMap<String, BTreeSet<String>>>,
    pub archived: Option<bool>,
}

/// Shallow-merge patch for a task. Stage moves are not patchable; they go
/// through the stage-transition engine only.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assigned_to: Option<BTreeSet<String>>,
    pub due_date: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub notes: Option<String>,
    pub links: Option<Vec<String>>,
}

pub struct EntityStore {
    port: Box<dyn SlotStore>,
    channels: Vec<Channel>,
    tasks: Vec<Task>,
    users: Vec<User>,
    roles: Vec<Role>,
    overtime_entries: Vec<OvertimeEntry>,
    completed_tasks: Vec<CompletedTask>,
    stage_events: Vec<StageEvent>,
    settings: AppSettings,
}

impl EntityStore {
    /// Load every collection from the port. A slot that is missing, unreadable
    /// or malformed falls back to its built-in default dataset — availability
    /// over strict durability, with a diagnostic.
    pub fn open(port: Box<dyn SlotStore>) -> Self {
        let channels = load_slot(port.as_ref(), SLOT_CHANNELS, Vec::new);
        let tasks = load_slot(port.as_ref(), SLOT_TASKS, Vec::new);
        let users = load_slot(port.as_ref(), SLOT_USERS, default_users);
        let roles = load_slot(port.as_ref(), SLOT_ROLES, default_roles);
        let overtime_entries = load_slot(port.as_ref(), SLOT_OVERTIME, Vec::new);
        let completed_tasks = load_slot(port.as_ref(), SLOT_COMPLETED, Vec::new);
        let stage_events = load_slot(port.as_ref(), SLOT_EVENTS, Vec::new);
        let settings = load_slot(port.as_ref(), SLOT_SETTINGS, default_settings);

        Self {
            port,
            channels,
            tasks,
            users,
            roles,
            overtime_entries,
            completed_tasks,
            stage_events,
            settings,
        }
    }

    /// Write the full collection set through the port.
    pub fn flush(&self) -> Result<(), TrellisError> {
        write_slot(self.port.as_ref(), SLOT_CHANNELS, &self.channels)?;
        write_slot(self.port.as_ref(), SLOT_TASKS, &self.tasks)?;
        write_slot(self.port.as_ref(), SLOT_USERS, &self.users)?;
        write_slot(self.port.as_ref(), SLOT_ROLES, &self.roles)?;
        write_slot(self.port.as_ref(), SLOT_OVERTIME, &self.overtime_entries)?;
        write_slot(self.port.as_ref(), SLOT_COMPLETED, &self.completed_tasks)?;
        write_slot(self.port.as_ref(), SLOT_EVENTS, &self.stage_events)?;
        write_slot(self.port.as_ref(), SLOT_SETTINGS, &self.settings)?;
        Ok(())
    }

    // --- channels ---

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    pub fn add_channel(&mut self, channel: Channel) -> Result<String, TrellisError> {
        if !channel.column_order_is_valid() {
            return Err(TrellisError::InvalidColumnOrder(channel.name));
        }
        let id = channel.id.clone();
        self.channels.push(channel);
        self.flush()?;
        Ok(id)
    }

    pub fn update_channel(
        &mut self,
        channel_id: &str,
        patch: ChannelPatch,
    ) -> Result<(), TrellisError> {
        // Validate a column replacement before touching anything, so a bad
        // patch leaves no partial mutation behind.
        if let Some(columns) = &patch.columns {
            let mut orders: Vec<u32> = columns.iter().map(|c| c.order).collect();
            orders.sort_unstable();
            let gapless = orders.iter().enumerate().all(|(i, &o)| o == i as u32);
            if !gapless {
                return Err(TrellisError::InvalidColumnOrder(channel_id.to_string()));
            }
        }

        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| TrellisError::ChannelNotFound(channel_id.to_string()))?;

        if let Some(name) = patch.name {
            channel.name = name;
        }
        if let Some(description) = patch.description {
            channel.description = description;
        }
        if let Some(columns) = patch.columns {
            channel.columns = columns;
        }
        if let Some(custom_fields) = patch.custom_fields {
            channel.custom_fields = custom_fields;
        }
        if let Some(members) = patch.members {
            channel.members = members;
        }
        if let Some(manager_id) = patch.manager_id {
            channel.manager_id = manager_id;
        }
        if let Some(column_assignments) = patch.column_assignments {
            channel.column_assignments = column_assignments;
        }
        if let Some(archived) = patch.archived {
            channel.archived = archived;
        }
        channel.touch();

        self.flush()
    }

    /// Hard delete. The channel's active tasks go with it; stage events and
    /// completed snapshots are history and stay.
    pub fn delete_channel(&mut self, channel_id: &str) -> Result<(), TrellisError> {
        let before = self.channels.len();
        self.channels.retain(|c| c.id != channel_id);
        if self.channels.len() == before {
            return Err(TrellisError::ChannelNotFound(channel_id.to_string()));
        }
        self.tasks.retain(|t| t.channel_id != channel_id);
        self.flush()
    }

    // --- tasks ---

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks_in_channel(&self, channel_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.channel_id == channel_id)
            .collect()
    }

    pub fn add_task(&mut self, task: Task) -> Result<String, TrellisError> {
        let id = task.id.clone();
        self.tasks.push(task);
        self.flush()?;
        Ok(id)
    }

    /// Shallow merge; always refreshes `updated_at`, even for an empty patch.
    pub fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> Result<(), TrellisError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| TrellisError::TaskNotFound(task_id.to_string()))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(assigned_to) = patch.assigned_to {
            task.assigned_to = assigned_to;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(notes) = patch.notes {
            task.notes = notes;
        }
        if let Some(links) = patch.links {
            task.links = links;
        }
        task.touch();

        self.flush()
    }

    pub fn delete_task(&mut self, task_id: &str) -> Result<(), TrellisError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != task_id);
        if self.tasks.len() == before {
            return Err(TrellisError::TaskNotFound(task_id.to_string()));
        }
        self.flush()
    }

    pub fn set_task_field(
        &mut self,
        task_id: &str,
        field_id: &str,
        value: FieldValue,
    ) -> Result<(), TrellisError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| TrellisError::TaskNotFound(task_id.to_string()))?;
        task.set_field_value(field_id, value);
        self.flush()
    }

    // --- stage transitions ---
    //
    // The two mutations below are the only ways a task changes column or
    // leaves the active set, and both carry their audit event in the same
    // call: a task cannot advance without its StageEvent.

    pub fn advance_task(
        &mut self,
        task_id: &str,
        to_column_id: &str,
        event: StageEvent,
    ) -> Result<(), TrellisError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| TrellisError::TaskNotFound(task_id.to_string()))?;
        task.column_id = to_column_id.to_string();
        task.touch();
        self.stage_events.push(event);
        self.flush()
    }

    pub fn finalize_task(
        &mut self,
        task_id: &str,
        event: StageEvent,
        snapshot: CompletedTask,
    ) -> Result<(), TrellisError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != task_id);
        if self.tasks.len() == before {
            return Err(TrellisError::TaskNotFound(task_id.to_string()));
        }
        self.stage_events.push(event);
        self.completed_tasks.push(snapshot);
        self.flush()
    }

    // --- audit & archival (append-only) ---

    pub fn stage_events(&self) -> &[StageEvent] {
        &self.stage_events
    }

    pub fn events_for_task(&self, task_id: &str) -> Vec<&StageEvent> {
        self.stage_events
            .iter()
            .filter(|e| e.task_id == task_id)
            .collect()
    }

    pub fn add_stage_event(&mut self, event: StageEvent) -> Result<(), TrellisError> {
        self.stage_events.push(event);
        self.flush()
    }

    pub fn completed_tasks(&self) -> &[CompletedTask] {
        &self.completed_tasks
    }

    pub fn add_completed_task(&mut self, snapshot: CompletedTask) -> Result<(), TrellisError> {
        self.completed_tasks.push(snapshot);
        self.flush()
    }

    // --- directory ---

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn add_user(&mut self, user: User) -> Result<String, TrellisError> {
        let id = user.id.clone();
        self.users.push(user);
        self.flush()?;
        Ok(id)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn role(&self, role_id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }

    pub fn add_role(&mut self, role: Role) -> Result<String, TrellisError> {
        let id = role.id.clone();
        self.roles.push(role);
        self.flush()?;
        Ok(id)
    }

    pub fn overtime_entries(&self) -> &[OvertimeEntry] {
        &self.overtime_entries
    }

    pub fn add_overtime_entry(&mut self, entry: OvertimeEntry) -> Result<String, TrellisError> {
        let id = entry.id.clone();
        self.overtime_entries.push(entry);
        self.flush()?;
        Ok(id)
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: AppSettings) -> Result<(), TrellisError> {
        self.settings = settings;
        self.flush()
    }
}

fn load_slot<T: DeserializeOwned>(
    port: &dyn SlotStore,
    slot: &str,
    default: impl FnOnce() -> T,
) -> T {
    match port.read(slot) {
        Ok(Some(payload)) => match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(slot, %err, "malformed slot, using default dataset");
                default()
            }
        },
        Ok(None) => default(),
        Err(err) => {
            tracing::warn!(slot, %err, "unreadable slot, using default dataset");
            default()
        }
    }
}

fn write_slot<T: Serialize>(
    port: &dyn SlotStore,
    slot: &str,
    value: &T,
) -> Result<(), TrellisError> {
    let payload = serde_json::to_string_pretty(value)?;
    port.write(slot, &payload)
}

// Built-in default dataset: the three authority tiers and a single owner
// account, so a fresh (or unrecoverable) installation is immediately usable.

pub const DEFAULT_ADMIN_ID: &str = "user-admin";

fn default_roles() -> Vec<Role> {
    vec![
        Role {
            id: "role-owner".to_string(),
            name: "Owner".to_string(),
            level: RoleLevel::Owner,
        },
        Role {
            id: "role-manager".to_string(),
            name: "Manager".to_string(),
            level: RoleLevel::Manager,
        },
        Role {
            id: "role-member".to_string(),
            name: "Member".to_string(),
            level: RoleLevel::Member,
        },
    ]
}

fn default_users() -> Vec<User> {
    vec![User {
        id: DEFAULT_ADMIN_ID.to_string(),
        name: "Admin".to_string(),
        role_id: "role-owner".to_string(),
    }]
}

fn default_settings() -> AppSettings {
    AppSettings {
        default_actor: Some(DEFAULT_ADMIN_ID.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use crate::workflow::{FieldType, StageEventType};
    use chrono::Utc;

    fn empty_store() -> EntityStore {
        EntityStore::open(Box::new(MemoryStore::new()))
    }

    fn sample_channel() -> Channel {
        let mut channel = Channel::new("Launch Videos", Some("Weekly uploads".to_string()));
        channel.columns = vec![
            Column {
                id: "script".to_string(),
                name: "Script".to_string(),
                order: 0,
            },
            Column {
                id: "audio".to_string(),
                name: "Audio".to_string(),
                order: 1,
            },
        ];
        channel
    }

    #[test]
    fn fresh_store_carries_default_dataset() {
        let store = empty_store();
        assert!(store.channels().is_empty());
        assert!(store.tasks().is_empty());
        assert_eq!(store.roles().len(), 3);
        assert_eq!(store.users().len(), 1);
        assert_eq!(
            store.settings().default_actor.as_deref(),
            Some(DEFAULT_ADMIN_ID)
        );
    }

    #[test]
    fn add_channel_rejects_bad_column_order() {
        let mut store = empty_store();
        let mut channel = sample_channel();
        channel.columns[1].order = 5;

        let result = store.add_channel(channel);
        assert!(matches!(result, Err(TrellisError::InvalidColumnOrder(_))));
        assert!(store.channels().is_empty());
    }

    #[test]
    fn update_channel_merges_supplied_fields_only() {
        let mut store = empty_store();
        let id = store.add_channel(sample_channel()).unwrap();

        store
            .update_channel(
                &id,
                ChannelPatch {
                    name: Some("Launch Videos v2".to_string()),
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let channel = store.channel(&id).unwrap();
        assert_eq!(channel.name, "Launch Videos v2");
        assert!(channel.archived);
        // Untouched fields survive the merge.
        assert_eq!(channel.description.as_deref(), Some("Weekly uploads"));
        assert_eq!(channel.columns.len(), 2);
    }

    #[test]
    fn update_channel_rejects_bad_column_patch_without_mutation() {
        let mut store = empty_store();
        let id = store.add_channel(sample_channel()).unwrap();

        let result = store.update_channel(
            &id,
            ChannelPatch {
                name: Some("Should not apply".to_string()),
                columns: Some(vec![Column {
                    id: "only".to_string(),
                    name: "Only".to_string(),
                    order: 3,
                }]),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(TrellisError::InvalidColumnOrder(_))));
        let channel = store.channel(&id).unwrap();
        assert_eq!(channel.name, "Launch Videos");
        assert_eq!(channel.columns.len(), 2);
    }

    #[test]
    fn update_task_always_refreshes_updated_at() {
        let mut store = empty_store();
        let channel_id = store.add_channel(sample_channel()).unwrap();
        let task_id = store
            .add_task(Task::new(channel_id, "script", "Episode 12"))
            .unwrap();

        let before = store.task(&task_id).unwrap().updated_at;
        store.update_task(&task_id, TaskPatch::default()).unwrap();
        assert!(store.task(&task_id).unwrap().updated_at >= before);

        store
            .update_task(
                &task_id,
                TaskPatch {
                    notes: Some("shorter intro".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.task(&task_id).unwrap().notes, "shorter intro");
    }

    #[test]
    fn delete_channel_drops_its_active_tasks() {
        let mut store = empty_store();
        let channel_id = store.add_channel(sample_channel()).unwrap();
        store
            .add_task(Task::new(channel_id.clone(), "script", "Episode 12"))
            .unwrap();

        let other_id = store.add_channel(sample_channel()).unwrap();
        let kept = store
            .add_task(Task::new(other_id, "script", "Keep me"))
            .unwrap();

        store.delete_channel(&channel_id).unwrap();
        assert!(store.channel(&channel_id).is_none());
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].id, kept);
    }

    #[test]
    fn unknown_ids_are_invalid_references() {
        let mut store = empty_store();
        assert!(matches!(
            store.update_task("ghost", TaskPatch::default()),
            Err(TrellisError::TaskNotFound(_))
        ));
        assert!(matches!(
            store.delete_channel("ghost"),
            Err(TrellisError::ChannelNotFound(_))
        ));
    }

    #[test]
    fn advance_couples_move_and_event() {
        let mut store = empty_store();
        let channel_id = store.add_channel(sample_channel()).unwrap();
        let task_id = store
            .add_task(Task::new(channel_id, "script", "Episode 12"))
            .unwrap();

        let channel_id = store.task(&task_id).unwrap().channel_id.clone();
        let channel = store.channel(&channel_id).unwrap();
        let from = channel.column("script").unwrap().clone();
        let to = channel.column("audio").unwrap().clone();
        let event = StageEvent::stage_completed(
            store.task(&task_id).unwrap(),
            "user-admin",
            &from,
            &to,
            Utc::now(),
        );

        store.advance_task(&task_id, "audio", event).unwrap();

        assert_eq!(store.task(&task_id).unwrap().column_id, "audio");
        assert_eq!(store.events_for_task(&task_id).len(), 1);
        assert_eq!(
            store.events_for_task(&task_id)[0].event_type,
            StageEventType::StageCompleted
        );
    }

    #[test]
    fn finalize_removes_task_and_stores_snapshot() {
        let mut store = empty_store();
        let channel_id = store.add_channel(sample_channel()).unwrap();
        let task_id = store
            .add_task(Task::new(channel_id.clone(), "audio", "Episode 12"))
            .unwrap();

        let channel = store.channel(&channel_id).unwrap();
        let last = channel.column("audio").unwrap().clone();
        let task = store.task(&task_id).unwrap();
        let now = Utc::now();
        let event = StageEvent::finalized(task, "user-admin", &last, now);
        let snapshot = CompletedTask::from_task(task, channel, &last, "user-admin", now);

        store.finalize_task(&task_id, event, snapshot).unwrap();

        assert!(store.task(&task_id).is_none());
        assert_eq!(store.completed_tasks().len(), 1);
        assert_eq!(store.completed_tasks()[0].column_name, "Audio");
        assert_eq!(store.events_for_task(&task_id).len(), 1);
    }

    #[test]
    fn full_roundtrip_through_port() {
        let port = Box::new(MemoryStore::new());
        // First lifetime: populate and let write-through persist everything.
        let reread = {
            let mut store = EntityStore::open(port);
            let channel_id = store.add_channel(sample_channel()).unwrap();
            let mut task = Task::new(channel_id, "script", "Episode 12");
            task.due_date = Some(Utc::now());
            task.set_field_value("field-link", FieldValue::Link("https://x.com".into()));
            store.add_task(task).unwrap();

            // Hand the port to a second lifetime, as a restart would.
            let snapshot_port = MemoryStore::new();
            for slot in [
                SLOT_CHANNELS,
                SLOT_TASKS,
                SLOT_USERS,
                SLOT_ROLES,
                SLOT_OVERTIME,
                SLOT_COMPLETED,
                SLOT_EVENTS,
                SLOT_SETTINGS,
            ] {
                if let Some(payload) = store.port.read(slot).unwrap() {
                    snapshot_port.write(slot, &payload).unwrap();
                }
            }
            EntityStore::open(Box::new(snapshot_port))
        };

        assert_eq!(reread.channels().len(), 1);
        assert_eq!(reread.tasks().len(), 1);
        let task = &reread.tasks()[0];
        // Date-bearing fields come back as typed values, not strings.
        assert!(task.due_date.is_some());
        assert_eq!(
            task.field_values.get("field-link"),
            Some(&FieldValue::Link("https://x.com".into()))
        );
        assert_eq!(reread.roles().len(), 3);
    }

    #[test]
    fn malformed_slot_falls_back_per_collection() {
        let port = MemoryStore::new();
        port.write(SLOT_CHANNELS, "{not json").unwrap();
        port.write(SLOT_USERS, "[\"wrong shape\"]").unwrap();
        port.write(
            SLOT_ROLES,
            &serde_json::to_string(&default_roles()).unwrap(),
        )
        .unwrap();

        let store = EntityStore::open(Box::new(port));

        // Broken slots fall back to their defaults...
        assert!(store.channels().is_empty());
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.users()[0].id, DEFAULT_ADMIN_ID);
        // ...while intact slots load normally.
        assert_eq!(store.roles().len(), 3);
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut store = empty_store();
        let a = store.add_channel(sample_channel()).unwrap();
        let b = store.add_channel(sample_channel()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn custom_field_roundtrip_with_permissions() {
        let mut channel = sample_channel();
        let mut field = CustomField::new("Status", FieldType::Dropdown, 0);
        field.dropdown_options = vec!["draft".to_string(), "final".to_string()];
        channel.custom_fields.push(field);

        let mut store = empty_store();
        let id = store.add_channel(channel).unwrap();

        let json = store.port.read(SLOT_CHANNELS).unwrap().unwrap();
        let parsed: Vec<Channel> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].id, id);
        assert_eq!(parsed[0].custom_fields[0].dropdown_options.len(), 2);
    }
}
