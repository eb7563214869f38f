//! Compound workflow step lists

use crate::action::PlatformCall;
use crate::catalog::states::{
    DATABASE_AVAILABLE, DISK_AVAILABLE, DISK_IN_USE, INSTANCE_RUNNING, INSTANCE_SETTLED,
    INSTANCE_STOPPED,
};
use crate::resource::ResourceRef;
use crate::workflow::{Precondition, Step, Transition, Workflow};

/// Attach a disk to an instance at `disk_path`
///
/// The disk must be available and the instance must not be mid-transition.
/// Finishes once the disk reports `in-use`.
pub fn disk_attach(disk_name: &str, instance_name: &str, disk_path: &str) -> Workflow {
    let disk = ResourceRef::disk(disk_name);
    let instance = ResourceRef::instance(instance_name);

    Workflow::new(format!("attach disk {} to {}", disk_name, instance_name)).step(
        Step::new(
            "attach",
            PlatformCall::AttachDisk {
                disk_name: disk_name.to_string(),
                instance_name: instance_name.to_string(),
                disk_path: disk_path.to_string(),
            },
        )
        .requires(Precondition::new(disk.clone(), DISK_AVAILABLE))
        .requires(Precondition::new(instance, INSTANCE_SETTLED))
        .settles(disk, DISK_IN_USE),
    )
}

/// Detach a disk, stopping its instance first if it is running
///
/// A running instance is started again afterwards; a stopped one is left
/// alone.
pub fn disk_detach(disk_name: &str, instance_name: &str) -> Workflow {
    let instance = ResourceRef::instance(instance_name);

    Workflow::new(format!("detach disk {} from {}", disk_name, instance_name)).step(
        Step::new(
            "detach",
            PlatformCall::DetachDisk {
                disk_name: disk_name.to_string(),
            },
        )
        .requires(
            Precondition::new(instance, INSTANCE_STOPPED).with_transition(
                Transition::new(
                    PlatformCall::StopInstance {
                        instance_name: instance_name.to_string(),
                        force: false,
                    },
                    &["running"],
                )
                .restored_by(
                    PlatformCall::StartInstance {
                        instance_name: instance_name.to_string(),
                    },
                    INSTANCE_RUNNING,
                ),
            ),
        ),
    )
}

/// Apply `changes` to a database
///
/// The platform exposes no operation for the state change itself, so the
/// database's own state is awaited both before and after.
pub fn database_update(database_name: &str, changes: serde_json::Value) -> Workflow {
    let database = ResourceRef::database(database_name);

    Workflow::new(format!("update database {}", database_name)).step(
        Step::new(
            "update",
            PlatformCall::UpdateDatabase {
                database_name: database_name.to_string(),
                changes,
            },
        )
        .requires(Precondition::new(database.clone(), DATABASE_AVAILABLE))
        .settles(database, DATABASE_AVAILABLE),
    )
}
