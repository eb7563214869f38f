//! Action labels and mutating platform calls

use crate::resource::{ResourceKind, ResourceRef};
use serde::{Deserialize, Serialize};

/// Kind of mutation performed against a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Attach,
    Detach,
    Start,
    Stop,
    Tag,
    Untag,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::Attach => write!(f, "attach"),
            ActionKind::Detach => write!(f, "detach"),
            ActionKind::Start => write!(f, "start"),
            ActionKind::Stop => write!(f, "stop"),
            ActionKind::Tag => write!(f, "tag"),
            ActionKind::Untag => write!(f, "untag"),
        }
    }
}

/// Attribution attached to every error raised while an action is in flight
///
/// Renders as `"<action> <resource type> (<id>)"`, e.g. `attach disk (d1,i1)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub action: ActionKind,
    pub resource_type: ResourceKind,
    pub resource_id: String,
}

impl ActionContext {
    pub fn new(
        action: ActionKind,
        resource_type: ResourceKind,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

impl std::fmt::Display for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.action, self.resource_type, self.resource_id
        )
    }
}

/// A mutating call issued against the control plane
///
/// Workflow support calls have dedicated variants. Everything a generated
/// CRUD handler sends goes through [`PlatformCall::Resource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PlatformCall {
    StartInstance {
        instance_name: String,
    },
    StopInstance {
        instance_name: String,
        force: bool,
    },
    AttachDisk {
        disk_name: String,
        instance_name: String,
        disk_path: String,
    },
    DetachDisk {
        disk_name: String,
    },
    UpdateDatabase {
        database_name: String,
        changes: serde_json::Value,
    },
    Resource {
        action: ActionKind,
        resource: ResourceRef,
        payload: serde_json::Value,
    },
}

impl PlatformCall {
    /// Label used to attribute errors raised by this call
    pub fn context(&self) -> ActionContext {
        match self {
            PlatformCall::StartInstance { instance_name } => {
                ActionContext::new(ActionKind::Start, ResourceKind::Instance, instance_name)
            }
            PlatformCall::StopInstance { instance_name, .. } => {
                ActionContext::new(ActionKind::Stop, ResourceKind::Instance, instance_name)
            }
            PlatformCall::AttachDisk { disk_name, .. } => {
                ActionContext::new(ActionKind::Attach, ResourceKind::Disk, disk_name)
            }
            PlatformCall::DetachDisk { disk_name } => {
                ActionContext::new(ActionKind::Detach, ResourceKind::Disk, disk_name)
            }
            PlatformCall::UpdateDatabase { database_name, .. } => {
                ActionContext::new(ActionKind::Update, ResourceKind::Database, database_name)
            }
            PlatformCall::Resource {
                action, resource, ..
            } => ActionContext::new(*action, resource.kind, &resource.name),
        }
    }

    /// Short name of the API call, used in logs and by test doubles
    pub fn name(&self) -> &'static str {
        match self {
            PlatformCall::StartInstance { .. } => "StartInstance",
            PlatformCall::StopInstance { .. } => "StopInstance",
            PlatformCall::AttachDisk { .. } => "AttachDisk",
            PlatformCall::DetachDisk { .. } => "DetachDisk",
            PlatformCall::UpdateDatabase { .. } => "UpdateDatabase",
            PlatformCall::Resource { .. } => "Resource",
        }
    }
}
