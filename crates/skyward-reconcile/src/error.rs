//! Reconciliation error types

use crate::action::ActionContext;
use crate::tags::TagPhase;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the reconciliation layer
///
/// Wrapper variants (`Action`, the tag and workflow variants) keep the
/// underlying platform error as their source. Use [`CloudError::root_cause`]
/// to classify a failure regardless of how many labels were added on the way up.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {resource_type} ({id})")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No operations found for {context} request")]
    NoOperationScheduled { context: ActionContext },

    #[error(
        "Operation {operation_id} failed ({}): {}",
        .code.as_deref().unwrap_or("no error code"),
        .details.as_deref().unwrap_or("no details")
    )]
    OperationFailed {
        operation_id: String,
        code: Option<String>,
        details: Option<String>,
    },

    #[error(
        "Timeout while waiting for operation {operation_id} after {timeout:?} (last status: {last_status})"
    )]
    OperationTimeout {
        operation_id: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("Cancelled while waiting for {waiting_for}")]
    Cancelled { waiting_for: String },

    #[error(
        "Timeout while waiting for {resource_type} ({id}) to become {expected} after {timeout:?} (last state: {last_state})"
    )]
    StateTimeout {
        resource_type: String,
        id: String,
        expected: String,
        last_state: String,
        timeout: Duration,
    },

    #[error("Unexpected state '{state}' for {resource_type} ({id}), expected {expected}")]
    UnexpectedState {
        resource_type: String,
        id: String,
        state: String,
        expected: String,
    },

    #[error("Invalid {kind} identifier: expected {expected} parts, got {actual}")]
    PartCountMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed {kind} identifier {id:?}: {reason}")]
    MalformedIdentifier {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Failed {phase} tags on {resource}: {source}")]
    TagPhaseFailed {
        phase: TagPhase,
        resource: String,
        source: Box<CloudError>,
    },

    #[error(
        "Failed {phase} tags on {resource} after {batches_applied} batch(es) were applied: {source}"
    )]
    TagReconciliationPartialFailure {
        phase: TagPhase,
        resource: String,
        batches_applied: usize,
        source: Box<CloudError>,
    },

    #[error("Workflow '{workflow}': transition '{step}' failed: {source}")]
    PreconditionTransitionFailed {
        workflow: String,
        step: String,
        source: Box<CloudError>,
    },

    #[error("Workflow '{workflow}': restore '{step}' failed: {source}")]
    PostconditionRestoreFailed {
        workflow: String,
        step: String,
        source: Box<CloudError>,
    },

    #[error("Workflow '{workflow}' partially applied (completed: {}): {source}", .completed_steps.join(", "))]
    PartiallyApplied {
        workflow: String,
        completed_steps: Vec<String>,
        source: Box<CloudError>,
    },

    #[error("Failed to {context}: {source}")]
    Action {
        context: ActionContext,
        source: Box<CloudError>,
    },

    #[error("Settings error: {0}")]
    Config(#[from] skyward_config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn not_found(resource_type: impl ToString, id: impl Into<String>) -> Self {
        CloudError::ResourceNotFound {
            resource_type: resource_type.to_string(),
            id: id.into(),
        }
    }

    /// Wrap with the action being performed when this error occurred
    pub fn in_action(self, context: ActionContext) -> Self {
        CloudError::Action {
            context,
            source: Box::new(self),
        }
    }

    /// The innermost error, with every labelling wrapper removed
    pub fn root_cause(&self) -> &CloudError {
        match self {
            CloudError::Action { source, .. }
            | CloudError::TagPhaseFailed { source, .. }
            | CloudError::TagReconciliationPartialFailure { source, .. }
            | CloudError::PreconditionTransitionFailed { source, .. }
            | CloudError::PostconditionRestoreFailed { source, .. }
            | CloudError::PartiallyApplied { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Errors worth retrying while a wait still has time left
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root_cause(),
            CloudError::Throttled(_) | CloudError::ServiceUnavailable(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), CloudError::ResourceNotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.root_cause(),
            CloudError::OperationTimeout { .. } | CloudError::StateTimeout { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), CloudError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::resource::ResourceKind;

    #[test]
    fn test_root_cause_peels_wrappers() {
        let context = ActionContext::new(ActionKind::Detach, ResourceKind::Disk, "d1");
        let err = CloudError::PartiallyApplied {
            workflow: "detach disk".to_string(),
            completed_steps: vec!["stop instance (i1)".to_string()],
            source: Box::new(
                CloudError::Cancelled {
                    waiting_for: "operation op-1".to_string(),
                }
                .in_action(context),
            ),
        };

        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
        assert!(matches!(err.root_cause(), CloudError::Cancelled { .. }));
    }

    #[test]
    fn test_action_label_in_message() {
        let context = ActionContext::new(ActionKind::Attach, ResourceKind::Disk, "d1,i1");
        let err = CloudError::OperationFailed {
            operation_id: "op-7".to_string(),
            code: Some("InvalidInput".to_string()),
            details: Some("disk path in use".to_string()),
        }
        .in_action(context);

        let message = err.to_string();
        assert!(message.starts_with("Failed to attach disk (d1,i1): Operation op-7 failed"));
        assert!(message.contains("disk path in use"));
    }

    #[test]
    fn test_messages_start_capitalized() {
        let context = ActionContext::new(ActionKind::Tag, ResourceKind::Disk, "d1");
        let errors = vec![
            CloudError::NoOperationScheduled {
                context: context.clone(),
            },
            CloudError::Cancelled {
                waiting_for: "operation op-1".to_string(),
            },
            CloudError::PartCountMismatch {
                kind: "disk attachment",
                expected: 2,
                actual: 3,
            },
            CloudError::TagPhaseFailed {
                phase: TagPhase::Update,
                resource: "disk (d1)".to_string(),
                source: Box::new(CloudError::ApiError("denied".to_string())),
            },
            CloudError::PartiallyApplied {
                workflow: "detach disk".to_string(),
                completed_steps: vec![],
                source: Box::new(CloudError::ApiError("denied".to_string())),
            },
            CloudError::ApiError("denied".to_string()).in_action(context),
        ];

        for err in errors {
            let message = err.to_string();
            assert!(
                message.starts_with(|c: char| c.is_ascii_uppercase()),
                "{}",
                message
            );
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(CloudError::Throttled("rate exceeded".into()).is_transient());
        assert!(CloudError::ServiceUnavailable("503".into()).is_transient());
        assert!(!CloudError::ApiError("bad request".into()).is_transient());
        assert!(CloudError::not_found("disk", "d1").is_not_found());
    }
}
