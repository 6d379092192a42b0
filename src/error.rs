use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Custom field not found: {0}")]
    FieldNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Channel {0}: column order values must be unique and gapless from 0")]
    InvalidColumnOrder(String),

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
