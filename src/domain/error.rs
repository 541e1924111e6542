use thiserror::Error;

/// Common error type for the approval workflow engine
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    /// Authoring or wiring problems detected while assembling a workflow graph
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A transition references a state no handler is registered for
    #[error("workflow '{workflow}' has no handler for state {state}")]
    MissingHandler { workflow: String, state: String },

    /// Two handlers claim the same state in one workflow
    #[error("workflow '{workflow}' declares state {state} twice ({first} and {second})")]
    DuplicateState { workflow: String, state: String, first: String, second: String },

    /// Identical transition declared more than once under the reject policy
    #[error("transition {from} --{trigger}--> {to} declared by both {first} and {second}")]
    DuplicateTransition { from: String, to: String, trigger: String, first: String, second: String },

    /// Storage read/write errors
    #[error("{0}")]
    Persistence(String),

    /// Requested entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Notification rendering or delivery errors
    #[error("{0}")]
    Notification(String),

    /// The persisted aggregate moved on since this workflow instance was built
    #[error("conflict: {0}")]
    Conflict(String),

    /// Guard predicate could not be evaluated
    #[error("{0}")]
    Guard(String),

    /// Behaviour declared by a handler but not written yet
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Serialization/deserialization errors
    #[error("{0}")]
    Serialization(String),

    /// Actor messaging errors
    #[error("{0}")]
    Actor(String),

    /// Spawn errors
    #[error("{0}")]
    Spawn(String),

    /// Timeout errors
    #[error("{0}")]
    Timeout(String),

    /// A request was queued but no answer arrived in time; it may still be applied
    #[error("outcome unknown: {0}")]
    OutcomeUnknown(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String)
}

impl WorkflowError {
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, WorkflowError::NotImplemented(_))
    }

    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, WorkflowError::OutcomeUnknown(_))
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for WorkflowError {
    fn from(err: anyhow::Error) -> Self {
        WorkflowError::Generic(err.to_string())
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        WorkflowError::Persistence(err.to_string())
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for WorkflowError {
    fn from(err: serde_yaml::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

/// Convert from rocksdb::Error
impl From<rocksdb::Error> for WorkflowError {
    fn from(err: rocksdb::Error) -> Self {
        WorkflowError::Persistence(err.to_string())
    }
}

/// Convert from ractor::SpawnErr
impl From<ractor::SpawnErr> for WorkflowError {
    fn from(err: ractor::SpawnErr) -> Self {
        WorkflowError::Spawn(err.to_string())
    }
}
