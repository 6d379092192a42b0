mod account;
mod channel;
mod task;

pub mod permissions;
pub mod validation;

pub use account::{ActingUser, AppSettings, OvertimeEntry, Role, RoleLevel, User};
pub use channel::{Channel, Column, CustomField, FieldPermissions, FieldType};
pub use task::{CompletedTask, FieldValue, StageEvent, StageEventType, Task};
