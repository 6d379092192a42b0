//! Field-level edit authorization.

use super::account::ActingUser;
use super::channel::{Channel, CustomField};
use super::task::Task;

/// Whether `actor` may edit `field`'s value on `task`.
///
/// Pure predicate: no mutation, no failure. A field without a permission
/// record — or with a record that grants nothing — is open to every channel
/// member. Otherwise access is granted when any one of the grants applies:
/// the actor's role is listed, the actor is responsible for the task's
/// current column, or the actor is listed by user id.
pub fn can_edit(field: &CustomField, task: &Task, channel: &Channel, actor: &ActingUser) -> bool {
    let Some(perms) = &field.permissions else {
        return true;
    };
    if perms.is_open() {
        return true;
    }

    if perms.editable_by_roles.contains(&actor.role_id) {
        return true;
    }

    if perms.editable_by_column_responsibility
        && channel
            .column_assignments
            .get(&task.column_id)
            .is_some_and(|assigned| {
                assigned.contains(&actor.user_id) || assigned.contains(&actor.role_id)
            })
    {
        return true;
    }

    perms.editable_by_users.contains(&actor.user_id)
}
