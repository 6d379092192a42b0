//! Mandatory-field validation for stage transitions.
//!
//! Stateless and re-derivable at any time: the presentation layer uses it to
//! render a live checklist, and the stage-transition engine uses the same
//! check as its guard.

use super::channel::{Channel, CustomField};
use super::task::{FieldValue, Task};

/// The channel's custom fields that must be filled before `task` may leave
/// its current column, and currently are not.
///
/// A field counts as missing when the task holds no value for it, or holds a
/// blank one (see [`FieldValue::is_blank`]). The result follows field `order`.
/// Requirements only gate forward progress out of the columns they list; a
/// field required elsewhere never shows up here.
pub fn missing_required_fields<'a>(task: &Task, channel: &'a Channel) -> Vec<&'a CustomField> {
    let mut missing: Vec<&CustomField> = channel
        .custom_fields
        .iter()
        .filter(|field| field.required_in_columns.contains(&task.column_id))
        .filter(|field| {
            task.field_values
                .get(&field.id)
                .is_none_or(FieldValue::is_blank)
        })
        .collect();

    missing.sort_by_key(|field| field.order);
    missing
}
