//! Skyward Reconciliation Core
//!
//! Mutating control-plane calls are asynchronous: they return an operation
//! handle right away and the change completes later. This crate provides the
//! primitives resource handlers use to wait for that work safely.
//!
//! # Components
//!
//! - **Operation poller / gate**: wait on the handle(s) returned by a call
//! - **State waiter**: wait on a resource's own state field
//! - **Tag reconciler**: turn an (old, new) tag pair into minimal calls
//! - **Workflow orchestrator**: run compound actions such as disk detach
//! - **Identifier codec**: composite ids for attachment-style resources
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              resource handlers                   │
//! │          (create / update / delete)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               skyward-reconcile                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Reconciler (policies + cancellation)     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐ ┌────────────┐ ┌──────────┐  │
//! │  │   Workflow   │ │    Tags    │ │ catalog  │  │
//! │  └──────┬───────┘ └─────┬──────┘ └──────────┘  │
//! │  ┌──────▼───────┐ ┌─────▼──────┐               │
//! │  │ StateWaiter  │ │    Gate    │─► Poller      │
//! │  └──────────────┘ └────────────┘               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │        trait ControlPlane { ... }                │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod catalog;
pub mod error;
pub mod gate;
pub mod identifier;
pub mod operation;
pub mod poller;
pub mod policy;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod tags;
pub mod waiter;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use action::{ActionContext, ActionKind, PlatformCall};
pub use error::{CloudError, Result};
pub use gate::OperationGate;
pub use identifier::IdentifierFormat;
pub use operation::{Operation, OperationStatus};
pub use poller::OperationPoller;
pub use policy::{WaitPolicies, WaitPolicy};
pub use provider::ControlPlane;
pub use reconciler::Reconciler;
pub use resource::{ResourceKind, ResourceRef, ResourceSnapshot};
pub use tags::{TagDelta, TagPhase, TagPolicy, TagReconciler, TagSet};
pub use waiter::{StateExpectation, StateWaiter};
pub use workflow::{
    Phase, Precondition, Step, Transition, Workflow, WorkflowOrchestrator, WorkflowReport,
};
