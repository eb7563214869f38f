//! Expected resource states
//!
//! Values are the raw state strings the platform reports, so casing follows
//! each API (instances are lower-case, certificates upper-case).

use crate::waiter::StateExpectation;

pub const INSTANCE_RUNNING: StateExpectation =
    StateExpectation::new("running", &["pending", "starting", "stopped"], &["running"]);

pub const INSTANCE_STOPPED: StateExpectation =
    StateExpectation::new("stopped", &["running", "stopping"], &["stopped"]);

/// Not mid-transition, whichever power state that is
pub const INSTANCE_SETTLED: StateExpectation = StateExpectation::new(
    "running or stopped",
    &["pending", "starting", "stopping", "rebooting"],
    &["running", "stopped"],
);

pub const INSTANCE_DELETING: &[&str] = &["running", "stopping", "stopped", "shutting-down"];

pub const DISK_AVAILABLE: StateExpectation =
    StateExpectation::new("available", &["pending"], &["available"]);

pub const DISK_CREATED: StateExpectation = DISK_AVAILABLE.while_creating();

pub const DISK_IN_USE: StateExpectation =
    StateExpectation::new("in-use", &["available", "pending"], &["in-use"]);

pub const DATABASE_AVAILABLE: StateExpectation = StateExpectation::new(
    "available",
    &[
        "creating",
        "modifying",
        "backing-up",
        "rebooting",
        "starting",
        "configuring-log-delivery",
        "storage-optimization",
        "upgrading",
    ],
    &["available"],
);

pub const DATABASE_CREATED: StateExpectation = DATABASE_AVAILABLE.while_creating();

pub const DATABASE_DELETING: &[&str] = &["available", "deleting"];

pub const CERTIFICATE_ISSUED: StateExpectation =
    StateExpectation::new("issued", &["PENDING_VALIDATION"], &["ISSUED"]).while_creating();

pub const CONTAINER_SERVICE_READY: StateExpectation = StateExpectation::new(
    "ready",
    &["PENDING", "DEPLOYING", "UPDATING"],
    &["READY", "RUNNING"],
)
.while_creating();

pub const CONTAINER_SERVICE_DISABLED: StateExpectation =
    StateExpectation::new("disabled", &["UPDATING"], &["DISABLED"]);

pub const CONTAINER_SERVICE_DELETING: &[&str] = &["DELETING"];

pub const LOAD_BALANCER_ACTIVE: StateExpectation =
    StateExpectation::new("active", &["provisioning"], &["active"]).while_creating();

pub const DISTRIBUTION_DEPLOYED: StateExpectation =
    StateExpectation::new("deployed", &["InProgress"], &["Deployed"]).while_creating();
