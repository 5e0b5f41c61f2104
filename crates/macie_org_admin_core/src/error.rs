use thiserror::Error;

pub type SynthResult<T> = Result<T, SynthError>;

/// Failures raised while assembling a stack's resource graph.
///
/// Deploy-time problems (unknown accounts, missing keys, handler failures)
/// never show up here; they belong to the deployment engine.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("stack '{stack}' already declares a resource with logical id '{logical_id}'")]
    DuplicateLogicalId { stack: String, logical_id: String },

    #[error("stack '{stack}' has no resource with logical id '{logical_id}'")]
    UnknownResource { stack: String, logical_id: String },

    #[error("stack '{stack}' already declares an output named '{name}'")]
    DuplicateOutput { stack: String, name: String },

    #[error("construct id '{0}' does not contain any alphanumeric characters")]
    InvalidLogicalId(String),

    #[error("invalid synthesis config: {0}")]
    InvalidConfig(String),

    #[error("failed to serialize template: {0}")]
    Serialization(#[from] serde_json::Error),
}
