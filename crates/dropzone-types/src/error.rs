use thiserror::Error;

#[derive(Debug, Error)]
pub enum DropzoneError {
    #[error("Invalid ARN '{arn}': {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Container '{container}' is not defined in task definition {task_definition}")]
    UnknownContainer {
        container: String,
        task_definition: String,
    },

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Access denied: {action} on {resource}")]
    AccessDenied { action: String, resource: String },

    #[error("Task invocation failed: {0}")]
    Invocation(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Rule already registered: {0}")]
    DuplicateRule(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DropzoneError {
    fn from(err: serde_json::Error) -> Self {
        DropzoneError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DropzoneError>;
