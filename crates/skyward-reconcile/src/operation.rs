//! Operation handles returned by mutating calls

use serde::{Deserialize, Serialize};

/// Status of an asynchronous operation as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    Started,
    Completed,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperationStatus::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::NotStarted => write!(f, "NotStarted"),
            OperationStatus::Started => write!(f, "Started"),
            OperationStatus::Completed => write!(f, "Completed"),
            OperationStatus::Succeeded => write!(f, "Succeeded"),
            OperationStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Handle for one asynchronous mutation
///
/// Issued by the platform and only ever read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub status: OperationStatus,

    /// Platform operation type (e.g. "StopInstance")
    #[serde(default)]
    pub operation_type: Option<String>,

    /// Name of the resource the operation acts on
    #[serde(default)]
    pub resource_name: Option<String>,

    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    pub error_details: Option<String>,
}

impl Operation {
    pub fn new(id: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            id: id.into(),
            status,
            operation_type: None,
            resource_name: None,
            error_code: None,
            error_details: None,
        }
    }

    pub fn with_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = Some(operation_type.into());
        self
    }

    pub fn with_resource(mut self, resource_name: impl Into<String>) -> Self {
        self.resource_name = Some(resource_name.into());
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, details: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self.error_details = Some(details.into());
        self
    }
}
