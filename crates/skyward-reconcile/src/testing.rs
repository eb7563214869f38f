//! Scripted in-memory control plane for tests
//!
//! Records every call in order and serves pre-configured operation statuses
//! and resource states, so orchestration code can be tested deterministically
//! under a paused tokio clock.

use crate::action::PlatformCall;
use crate::error::{CloudError, Result};
use crate::operation::{Operation, OperationStatus};
use crate::provider::ControlPlane;
use crate::resource::{ResourceRef, ResourceSnapshot};
use crate::tags::TagSet;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// One call received by [`FakeControlPlane`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    GetOperation(String),
    GetResource(ResourceRef),
    Invoke(PlatformCall),
    Tag { resource: ResourceRef, tags: TagSet },
    Untag { resource: ResourceRef, keys: Vec<String> },
}

impl RecordedCall {
    /// API name of the call, as used by [`FakeControlPlane::count_calls`]
    pub fn name(&self) -> &'static str {
        match self {
            RecordedCall::GetOperation(_) => "GetOperation",
            RecordedCall::GetResource(_) => "GetResource",
            RecordedCall::Invoke(call) => call.name(),
            RecordedCall::Tag { .. } => "TagResource",
            RecordedCall::Untag { .. } => "UntagResource",
        }
    }
}

impl std::fmt::Display for RecordedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordedCall::GetOperation(id) => write!(f, "GetOperation {}", id),
            RecordedCall::GetResource(resource) => write!(f, "GetResource {}", resource),
            RecordedCall::Invoke(call) => write!(f, "{} {}", call.name(), call.context()),
            RecordedCall::Tag { resource, .. } => write!(f, "TagResource {}", resource),
            RecordedCall::Untag { resource, .. } => write!(f, "UntagResource {}", resource),
        }
    }
}

/// What one `get_resource` read returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    State(String),
    Missing,
    Throttled,
    Error(String),
}

impl Observation {
    pub fn state(state: &str) -> Self {
        Observation::State(state.to_string())
    }
}

struct ScriptedOperation {
    statuses: VecDeque<OperationStatus>,
    error: Option<(String, String)>,
    checks: usize,
}

struct CallFailure {
    successes_left: usize,
    error: Option<CloudError>,
}

#[derive(Default)]
struct Inner {
    calls: Vec<RecordedCall>,
    operations: HashMap<String, ScriptedOperation>,
    resources: HashMap<ResourceRef, VecDeque<Observation>>,
    reactions: HashMap<String, Vec<(ResourceRef, Vec<Observation>)>>,
    next_statuses: VecDeque<Vec<OperationStatus>>,
    next_operation: usize,
    get_operation_failure: Option<CloudError>,
    call_failures: HashMap<String, CallFailure>,
    no_operations: HashSet<String>,
}

/// Test double for [`ControlPlane`]
///
/// Unscripted resources read as not found. Each mutating call issues one
/// operation `op-N`; its statuses come from [`script_next_operations`]
/// or default to a single `Succeeded`.
///
/// [`script_next_operations`]: FakeControlPlane::script_next_operations
#[derive(Default)]
pub struct FakeControlPlane {
    inner: Mutex<Inner>,
    max_tags_per_call: Option<usize>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tags_per_call(mut self, max: usize) -> Self {
        self.max_tags_per_call = Some(max);
        self
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an operation; the last status repeats once the others are used up
    pub fn insert_operation(&self, id: &str, statuses: Vec<OperationStatus>) {
        self.state().operations.insert(
            id.to_string(),
            ScriptedOperation {
                statuses: statuses.into(),
                error: None,
                checks: 0,
            },
        );
    }

    pub fn set_operation_error(&self, id: &str, code: &str, details: &str) {
        if let Some(op) = self.state().operations.get_mut(id) {
            op.error = Some((code.to_string(), details.to_string()));
        }
    }

    /// Make the next `get_operation` call fail with `error`
    pub fn fail_get_operation(&self, error: CloudError) {
        self.state().get_operation_failure = Some(error);
    }

    /// Status scripts for the operations issued by the next mutating calls, in order
    pub fn script_next_operations(&self, scripts: Vec<Vec<OperationStatus>>) {
        self.state().next_statuses.extend(scripts);
    }

    /// Replace the observations served for `resource`; the last one repeats
    pub fn script_resource(&self, resource: &ResourceRef, observations: Vec<Observation>) {
        self.state()
            .resources
            .insert(resource.clone(), observations.into());
    }

    /// Shorthand for [`script_resource`](Self::script_resource) with plain states
    pub fn script_states(&self, resource: &ResourceRef, states: &[&str]) {
        self.script_resource(
            resource,
            states.iter().map(|s| Observation::state(s)).collect(),
        );
    }

    /// When a call named `call_name` is invoked, re-script `resource`
    ///
    /// Models the platform effect of a mutation on the resource's state field.
    pub fn on_call(&self, call_name: &str, resource: &ResourceRef, observations: Vec<Observation>) {
        self.state()
            .reactions
            .entry(call_name.to_string())
            .or_default()
            .push((resource.clone(), observations));
    }

    /// Let `successes` calls named `call_name` through, then fail the next one
    pub fn fail_call(&self, call_name: &str, successes: usize, error: CloudError) {
        self.state().call_failures.insert(
            call_name.to_string(),
            CallFailure {
                successes_left: successes,
                error: Some(error),
            },
        );
    }

    /// Make calls named `call_name` succeed without scheduling any operation
    pub fn return_no_operations(&self, call_name: &str) {
        self.state().no_operations.insert(call_name.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Calls rendered one per line, for order assertions
    pub fn call_log(&self) -> Vec<String> {
        self.state().calls.iter().map(ToString::to_string).collect()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    pub fn operation_checks(&self, id: &str) -> usize {
        self.state()
            .operations
            .get(id)
            .map(|op| op.checks)
            .unwrap_or(0)
    }

    /// Shared path for every mutating call
    fn mutate(&self, call: RecordedCall) -> Result<Vec<Operation>> {
        let name = call.name();
        let mut inner = self.state();
        inner.calls.push(call);

        if let Some(failure) = inner.call_failures.get_mut(name) {
            if failure.successes_left > 0 {
                failure.successes_left -= 1;
            } else if let Some(error) = failure.error.take() {
                return Err(error);
            }
        }

        if let Some(reactions) = inner.reactions.get(name).cloned() {
            for (resource, observations) in reactions {
                inner.resources.insert(resource, observations.into());
            }
        }

        if inner.no_operations.contains(name) {
            return Ok(Vec::new());
        }

        inner.next_operation += 1;
        let id = format!("op-{}", inner.next_operation);
        let statuses = inner
            .next_statuses
            .pop_front()
            .unwrap_or_else(|| vec![OperationStatus::Succeeded]);
        inner.operations.insert(
            id.clone(),
            ScriptedOperation {
                statuses: statuses.into(),
                error: None,
                checks: 0,
            },
        );

        Ok(vec![
            Operation::new(id, OperationStatus::Started).with_type(name),
        ])
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    fn name(&self) -> &str {
        "fake"
    }

    async fn get_operation(&self, operation_id: &str) -> Result<Operation> {
        let mut inner = self.state();
        inner
            .calls
            .push(RecordedCall::GetOperation(operation_id.to_string()));

        if let Some(error) = inner.get_operation_failure.take() {
            return Err(error);
        }

        let op = inner
            .operations
            .get_mut(operation_id)
            .ok_or_else(|| CloudError::not_found("operation", operation_id))?;
        op.checks += 1;

        let status = if op.statuses.len() > 1 {
            op.statuses.pop_front()
        } else {
            op.statuses.front().copied()
        }
        .unwrap_or(OperationStatus::Succeeded);

        let mut operation = Operation::new(operation_id, status);
        if let Some((code, details)) = &op.error {
            operation = operation.with_error(code.as_str(), details.as_str());
        }
        Ok(operation)
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<ResourceSnapshot> {
        let mut inner = self.state();
        inner.calls.push(RecordedCall::GetResource(resource.clone()));

        let observation = match inner.resources.get_mut(resource) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match observation {
            Some(Observation::State(state)) => Ok(ResourceSnapshot::new(resource.clone(), state)),
            Some(Observation::Throttled) => Err(CloudError::Throttled("Rate exceeded".to_string())),
            Some(Observation::Error(message)) => Err(CloudError::ApiError(message)),
            Some(Observation::Missing) | None => {
                Err(CloudError::not_found(resource.kind, &resource.name))
            }
        }
    }

    async fn invoke(&self, call: &PlatformCall) -> Result<Vec<Operation>> {
        self.mutate(RecordedCall::Invoke(call.clone()))
    }

    async fn tag_resource(&self, resource: &ResourceRef, tags: &TagSet) -> Result<Vec<Operation>> {
        self.mutate(RecordedCall::Tag {
            resource: resource.clone(),
            tags: tags.clone(),
        })
    }

    async fn untag_resource(
        &self,
        resource: &ResourceRef,
        keys: &[String],
    ) -> Result<Vec<Operation>> {
        self.mutate(RecordedCall::Untag {
            resource: resource.clone(),
            keys: keys.to_vec(),
        })
    }

    fn max_tags_per_call(&self) -> Option<usize> {
        self.max_tags_per_call
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_resource_is_not_found() {
        let fake = FakeControlPlane::new();
        let err = fake
            .get_resource(&ResourceRef::disk("d1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_last_observation_repeats() {
        let fake = FakeControlPlane::new();
        let disk = ResourceRef::disk("d1");
        fake.script_states(&disk, &["pending", "available"]);

        for expected in ["pending", "available", "available"] {
            assert_eq!(fake.get_resource(&disk).await.unwrap().state, expected);
        }
    }

    #[tokio::test]
    async fn test_reaction_rescripts_resource() {
        let fake = FakeControlPlane::new();
        let instance = ResourceRef::instance("i1");
        fake.script_states(&instance, &["running"]);
        fake.on_call("StopInstance", &instance, vec![Observation::state("stopped")]);

        let ops = fake
            .invoke(&PlatformCall::StopInstance {
                instance_name: "i1".to_string(),
                force: false,
            })
            .await
            .unwrap();

        assert_eq!(ops[0].id, "op-1");
        assert_eq!(fake.get_resource(&instance).await.unwrap().state, "stopped");
        assert_eq!(
            fake.call_log(),
            vec!["StopInstance stop instance (i1)", "GetResource instance (i1)"]
        );
    }
}
