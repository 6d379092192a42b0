//! The stage-transition engine: the one place a task changes stage.
//!
//! Business conditions (missing fields, denied edits, bad values) come back as
//! outcome values, never as errors — they are expected and frequent in
//! interactive use. Errors are reserved for invalid references and
//! persistence faults.

use chrono::Utc;

use crate::error::TrellisError;
use crate::store::{ChannelPatch, EntityStore};
use crate::workflow::permissions::can_edit;
use crate::workflow::validation::missing_required_fields;
use crate::workflow::{
    ActingUser, Channel, Column, CompletedTask, FieldValue, RoleLevel, StageEvent, Task,
};

/// Result of an [`StageEngine::advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// Moved to the next column; the task stays active.
    Advanced { to_column_id: String },
    /// The task was in its last column: snapshot stored, task retired.
    Finalized { completed_task_id: String },
    /// Mandatory fields unmet; nothing changed. Names in field order, ready
    /// to surface to the user.
    Rejected { missing: Vec<String> },
}

/// Result of an [`StageEngine::set_field_value`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Updated,
    PermissionDenied,
    InvalidValue { reason: String },
}

/// Drives tasks through their channel's pipeline against a borrowed store.
pub struct StageEngine<'a> {
    store: &'a mut EntityStore,
}

impl<'a> StageEngine<'a> {
    pub fn new(store: &'a mut EntityStore) -> Self {
        Self { store }
    }

    /// Advance `task_id` to the next column, or finalize it when its current
    /// column is terminal.
    ///
    /// The guard check, the mutation and the audit append happen as one
    /// uninterrupted unit: a rejection leaves no trace, and a success is never
    /// observable without its [`StageEvent`]. Calling twice performs two real
    /// transitions — idempotence is the caller's concern.
    pub fn advance(
        &mut self,
        task_id: &str,
        actor: &ActingUser,
    ) -> Result<AdvanceOutcome, TrellisError> {
        let (task, channel, current) = self.resolve_task_context(task_id)?;

        let missing = missing_required_fields(task, channel);
        if !missing.is_empty() {
            let missing = missing.iter().map(|f| f.name.clone()).collect();
            return Ok(AdvanceOutcome::Rejected { missing });
        }

        let now = Utc::now();
        let next = channel.next_column(current).cloned();
        match next {
            Some(next) => {
                let event = StageEvent::stage_completed(task, &actor.user_id, current, &next, now);
                self.store.advance_task(task_id, &next.id, event)?;
                Ok(AdvanceOutcome::Advanced {
                    to_column_id: next.id,
                })
            }
            None => {
                let event = StageEvent::finalized(task, &actor.user_id, current, now);
                let snapshot =
                    CompletedTask::from_task(task, channel, current, &actor.user_id, now);
                let completed_task_id = snapshot.id.clone();
                self.store.finalize_task(task_id, event, snapshot)?;
                Ok(AdvanceOutcome::Finalized { completed_task_id })
            }
        }
    }

    /// The permission- and type-checked way a field value enters the system.
    pub fn set_field_value(
        &mut self,
        task_id: &str,
        field_id: &str,
        value: FieldValue,
        actor: &ActingUser,
    ) -> Result<EditOutcome, TrellisError> {
        let (task, channel, _) = self.resolve_task_context(task_id)?;
        let Some(field) = channel.field(field_id) else {
            tracing::error!(task_id, field_id, "set_field_value: unknown custom field");
            return Err(TrellisError::FieldNotFound(field_id.to_string()));
        };

        if !can_edit(field, task, channel, actor) {
            return Ok(EditOutcome::PermissionDenied);
        }
        if !value.matches(field.field_type) {
            return Ok(EditOutcome::InvalidValue {
                reason: format!("expected a {} value", field.field_type),
            });
        }
        if let FieldValue::Dropdown(choice) = &value
            && !field.dropdown_options.iter().any(|option| option == choice)
        {
            return Ok(EditOutcome::InvalidValue {
                reason: format!("\"{choice}\" is not a dropdown option"),
            });
        }

        self.store.set_task_field(task_id, field_id, value)?;
        Ok(EditOutcome::Updated)
    }

    /// Create a channel with a fresh pipeline, one column per name in the
    /// given order. Owner-level actors only; the creator joins as a member.
    pub fn create_channel(
        &mut self,
        name: &str,
        description: Option<String>,
        column_names: &[String],
        actor: &ActingUser,
    ) -> Result<String, TrellisError> {
        self.require_level(actor, RoleLevel::Owner, "channel creation")?;

        let mut channel = Channel::new(name, description);
        channel.columns = column_names
            .iter()
            .enumerate()
            .map(|(order, column_name)| Column::new(column_name.clone(), order as u32))
            .collect();
        channel.members.insert(actor.user_id.clone());
        self.store.add_channel(channel)
    }

    /// Normal-operation retirement: a field update, not a delete.
    pub fn archive_channel(
        &mut self,
        channel_id: &str,
        actor: &ActingUser,
    ) -> Result<(), TrellisError> {
        self.require_level(actor, RoleLevel::Manager, "channel archival")?;
        self.store.update_channel(
            channel_id,
            ChannelPatch {
                archived: Some(true),
                ..Default::default()
            },
        )
    }

    /// Explicit hard delete, owner-level only. Active tasks of the channel go
    /// with it; events and snapshots are history and stay.
    pub fn delete_channel(
        &mut self,
        channel_id: &str,
        actor: &ActingUser,
    ) -> Result<(), TrellisError> {
        self.require_level(actor, RoleLevel::Owner, "channel deletion")?;
        self.store.delete_channel(channel_id)
    }

    /// Any actor with channel access may create a task; it enters the
    /// pipeline at the order-0 column.
    pub fn create_task(
        &mut self,
        channel_id: &str,
        title: &str,
        actor: &ActingUser,
    ) -> Result<String, TrellisError> {
        let Some(channel) = self.store.channel(channel_id) else {
            tracing::error!(channel_id, "create_task: unknown channel");
            return Err(TrellisError::ChannelNotFound(channel_id.to_string()));
        };
        if !channel.has_access(&actor.user_id) && !self.has_level(actor, RoleLevel::Owner) {
            return Err(TrellisError::NotPermitted(format!(
                "user {} has no access to channel {}",
                actor.user_id, channel_id
            )));
        }
        let Some(first) = channel.first_column() else {
            return Err(TrellisError::ColumnNotFound(format!(
                "channel {channel_id} has no entry column"
            )));
        };

        let task = Task::new(channel_id, first.id.clone(), title);
        self.store.add_task(task)
    }

    fn resolve_task_context(
        &self,
        task_id: &str,
    ) -> Result<(&Task, &Channel, &Column), TrellisError> {
        let Some(task) = self.store.task(task_id) else {
            tracing::error!(task_id, "unknown task");
            return Err(TrellisError::TaskNotFound(task_id.to_string()));
        };
        let Some(channel) = self.store.channel(&task.channel_id) else {
            tracing::error!(task_id, channel_id = %task.channel_id, "task references unknown channel");
            return Err(TrellisError::ChannelNotFound(task.channel_id.clone()));
        };
        let Some(current) = channel.column(&task.column_id) else {
            tracing::error!(task_id, column_id = %task.column_id, "task references unknown column");
            return Err(TrellisError::ColumnNotFound(task.column_id.clone()));
        };
        Ok((task, channel, current))
    }

    fn require_level(
        &self,
        actor: &ActingUser,
        min: RoleLevel,
        operation: &str,
    ) -> Result<(), TrellisError> {
        let role = self
            .store
            .role(&actor.role_id)
            .ok_or_else(|| TrellisError::RoleNotFound(actor.role_id.clone()))?;
        if role.level < min {
            return Err(TrellisError::NotPermitted(format!(
                "{operation} requires {min:?} authority"
            )));
        }
        Ok(())
    }

    fn has_level(&self, actor: &ActingUser, min: RoleLevel) -> bool {
        self.store
            .role(&actor.role_id)
            .is_some_and(|role| role.level >= min)
    }
}
