//! Compound workflow orchestration
//!
//! A workflow is a fixed, ordered list of steps. Each step may require its
//! resources to be in a given state first (transitioning them if allowed),
//! issues one primary call, optionally waits for a resource to settle, and
//! finally restores whatever it transitioned.
//!
//! ```text
//! Idle -> PreconditionCheck -> [PreconditionTransition] -> Action
//!      -> [PostconditionRestore] -> Done
//! ```
//!
//! Any failure ends the workflow. Completed sub-steps are never rolled back;
//! once something was applied the error is `PartiallyApplied` and lists it.

use crate::action::PlatformCall;
use crate::error::{CloudError, Result};
use crate::gate::OperationGate;
use crate::poller::OperationPoller;
use crate::policy::WaitPolicies;
use crate::provider::ControlPlane;
use crate::resource::ResourceRef;
use crate::waiter::{StateExpectation, StateWaiter};
use tokio_util::sync::CancellationToken;

/// Phase of a workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PreconditionCheck,
    PreconditionTransition,
    Action,
    PostconditionRestore,
    Done,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::PreconditionCheck => write!(f, "precondition check"),
            Phase::PreconditionTransition => write!(f, "precondition transition"),
            Phase::Action => write!(f, "action"),
            Phase::PostconditionRestore => write!(f, "postcondition restore"),
            Phase::Done => write!(f, "done"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Call that reverses a transition once the step's action is done
#[derive(Debug, Clone)]
pub struct Restore {
    pub call: PlatformCall,
    pub expectation: StateExpectation,
}

/// Call that moves a resource into the state a step requires
#[derive(Debug, Clone)]
pub struct Transition {
    pub call: PlatformCall,

    /// States from which the transition may be issued
    pub from: &'static [&'static str],

    pub restore: Option<Restore>,
}

impl Transition {
    pub fn new(call: PlatformCall, from: &'static [&'static str]) -> Self {
        Self {
            call,
            from,
            restore: None,
        }
    }

    pub fn restored_by(mut self, call: PlatformCall, expectation: StateExpectation) -> Self {
        self.restore = Some(Restore { call, expectation });
        self
    }

    fn applies_to(&self, state: &str) -> bool {
        self.from.iter().any(|s| *s == state)
    }
}

/// State a resource must be in before a step's action runs
///
/// Target state: nothing to do. Transition `from` state: transition, then
/// wait. Pending state: wait only. Anything else is an unexpected state.
#[derive(Debug, Clone)]
pub struct Precondition {
    pub resource: ResourceRef,
    pub satisfied: StateExpectation,
    pub transition: Option<Transition>,
}

impl Precondition {
    pub fn new(resource: ResourceRef, satisfied: StateExpectation) -> Self {
        Self {
            resource,
            satisfied,
            transition: None,
        }
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// State awaited after a step's action succeeds
#[derive(Debug, Clone)]
pub struct Settle {
    pub resource: ResourceRef,
    pub expectation: StateExpectation,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub label: String,
    pub preconditions: Vec<Precondition>,
    pub action: PlatformCall,
    pub settle: Option<Settle>,
}

impl Step {
    pub fn new(label: impl Into<String>, action: PlatformCall) -> Self {
        Self {
            label: label.into(),
            preconditions: Vec::new(),
            action,
            settle: None,
        }
    }

    pub fn requires(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn settles(mut self, resource: ResourceRef, expectation: StateExpectation) -> Self {
        self.settle = Some(Settle {
            resource,
            expectation,
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// How a precondition was met
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionOutcome {
    AlreadySatisfied,
    Awaited,
    Transitioned,
}

/// How a transition was reversed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    AlreadyRestored,
    Restored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub label: String,
    pub preconditions: Vec<(ResourceRef, PreconditionOutcome)>,
    /// Id of the operation that completed the step's action
    pub operation_id: String,
    pub restores: Vec<(ResourceRef, RestoreOutcome)>,
    pub phase: Phase,
}

impl StepReport {
    pub fn transitioned(&self) -> bool {
        self.preconditions
            .iter()
            .any(|(_, o)| *o == PreconditionOutcome::Transitioned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub workflow: String,
    pub steps: Vec<StepReport>,
}

/// Runs workflows against one control plane
pub struct WorkflowOrchestrator<'a> {
    client: &'a dyn ControlPlane,
    policies: WaitPolicies,
    cancel: CancellationToken,
}

impl<'a> WorkflowOrchestrator<'a> {
    pub fn new(client: &'a dyn ControlPlane, policies: WaitPolicies) -> Self {
        Self {
            client,
            policies,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn gate(&self) -> OperationGate<'_> {
        OperationGate::new(
            OperationPoller::new(self.client, self.policies.operation)
                .with_cancellation(self.cancel.clone()),
        )
    }

    fn waiter(&self) -> StateWaiter<'_> {
        StateWaiter::new(self.client, self.policies.resource_state)
            .with_cancellation(self.cancel.clone())
    }

    /// Run every step in order
    pub async fn run(&self, workflow: &Workflow) -> Result<WorkflowReport> {
        tracing::info!("Starting workflow: {}", workflow.name);

        let mut completed = Vec::new();
        let mut report = WorkflowReport {
            workflow: workflow.name.clone(),
            steps: Vec::with_capacity(workflow.steps.len()),
        };

        for step in &workflow.steps {
            match self.run_step(workflow, step, &mut completed).await {
                Ok(step_report) => report.steps.push(step_report),
                Err(e) => {
                    if completed.is_empty() {
                        return Err(e);
                    }
                    tracing::warn!(
                        "{} left partially applied after: {}",
                        workflow.name,
                        completed.join(", ")
                    );
                    return Err(CloudError::PartiallyApplied {
                        workflow: workflow.name.clone(),
                        completed_steps: completed,
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::info!("Workflow complete: {}", workflow.name);
        Ok(report)
    }

    async fn run_step(
        &self,
        workflow: &Workflow,
        step: &Step,
        completed: &mut Vec<String>,
    ) -> Result<StepReport> {
        let mut phase = Phase::Idle;
        let result = self.drive_step(workflow, step, completed, &mut phase).await;

        if let Err(e) = &result {
            tracing::warn!(
                workflow = %workflow.name,
                step = %step.label,
                failed_in = %phase,
                "Step failed: {}",
                e
            );
            enter(workflow, step, &mut phase, Phase::Failed);
        }
        result
    }

    async fn drive_step(
        &self,
        workflow: &Workflow,
        step: &Step,
        completed: &mut Vec<String>,
        phase: &mut Phase,
    ) -> Result<StepReport> {
        let mut preconditions = Vec::with_capacity(step.preconditions.len());
        let mut pending_restores: Vec<(&ResourceRef, &Restore)> = Vec::new();

        for precondition in &step.preconditions {
            enter(workflow, step, phase, Phase::PreconditionCheck);
            let state = self.read_state(&precondition.resource).await?;

            let outcome = if precondition.satisfied.is_target(&state) {
                PreconditionOutcome::AlreadySatisfied
            } else if let Some(transition) = precondition
                .transition
                .as_ref()
                .filter(|t| t.applies_to(&state))
            {
                enter(workflow, step, phase, Phase::PreconditionTransition);
                let label = transition.call.context().to_string();
                self.transition(&precondition.resource, &transition.call, &precondition.satisfied)
                    .await
                    .map_err(|e| CloudError::PreconditionTransitionFailed {
                        workflow: workflow.name.clone(),
                        step: label.clone(),
                        source: Box::new(e),
                    })?;
                completed.push(label);

                if let Some(restore) = &transition.restore {
                    pending_restores.push((&precondition.resource, restore));
                }
                PreconditionOutcome::Transitioned
            } else if precondition.satisfied.is_pending(&state) {
                tracing::info!(
                    "{} is {}, waiting for {}",
                    precondition.resource,
                    state,
                    precondition.satisfied
                );
                self.waiter()
                    .wait_for(&precondition.resource, &precondition.satisfied)
                    .await?;
                PreconditionOutcome::Awaited
            } else {
                return Err(CloudError::UnexpectedState {
                    resource_type: precondition.resource.kind.to_string(),
                    id: precondition.resource.name.clone(),
                    state,
                    expected: precondition.satisfied.name.to_string(),
                });
            };
            preconditions.push((precondition.resource.clone(), outcome));
        }

        enter(workflow, step, phase, Phase::Action);
        let operation = self.gate().apply(&step.action).await?;
        completed.push(step.action.context().to_string());

        if let Some(settle) = &step.settle {
            self.waiter()
                .wait_for(&settle.resource, &settle.expectation)
                .await?;
        }

        let mut restores = Vec::with_capacity(pending_restores.len());
        for (resource, restore) in pending_restores.into_iter().rev() {
            enter(workflow, step, phase, Phase::PostconditionRestore);
            let label = restore.call.context().to_string();
            let outcome = self.restore(resource, restore).await.map_err(|e| {
                CloudError::PostconditionRestoreFailed {
                    workflow: workflow.name.clone(),
                    step: label.clone(),
                    source: Box::new(e),
                }
            })?;
            if outcome == RestoreOutcome::Restored {
                completed.push(label);
            }
            restores.push((resource.clone(), outcome));
        }

        enter(workflow, step, phase, Phase::Done);
        Ok(StepReport {
            label: step.label.clone(),
            preconditions,
            operation_id: operation.id,
            restores,
            phase: *phase,
        })
    }

    async fn read_state(&self, resource: &ResourceRef) -> Result<String> {
        self.waiter()
            .current(resource)
            .await?
            .map(|snapshot| snapshot.state)
            .ok_or_else(|| CloudError::not_found(resource.kind, &resource.name))
    }

    /// The mutating call alone is never trusted; the state is re-read until it settles
    async fn transition(
        &self,
        resource: &ResourceRef,
        call: &PlatformCall,
        expectation: &StateExpectation,
    ) -> Result<()> {
        self.gate().apply(call).await?;
        self.waiter().wait_for(resource, expectation).await?;
        Ok(())
    }

    async fn restore(&self, resource: &ResourceRef, restore: &Restore) -> Result<RestoreOutcome> {
        let state = self.read_state(resource).await?;
        if restore.expectation.is_target(&state) {
            tracing::info!("{} already {}, skipping restore", resource, state);
            return Ok(RestoreOutcome::AlreadyRestored);
        }

        self.transition(resource, &restore.call, &restore.expectation)
            .await?;
        Ok(RestoreOutcome::Restored)
    }
}

fn enter(workflow: &Workflow, step: &Step, phase: &mut Phase, next: Phase) {
    tracing::info!(
        workflow = %workflow.name,
        step = %step.label,
        from = %phase,
        to = %next,
        "Workflow phase"
    );
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationStatus;
    use crate::testing::{FakeControlPlane, Observation};

    const UP: StateExpectation = StateExpectation::new("up", &["booting", "down"], &["up"]);
    const DOWN: StateExpectation = StateExpectation::new("down", &["up", "halting"], &["down"]);

    fn box_ref() -> ResourceRef {
        ResourceRef::instance("box")
    }

    fn call(name: &str) -> PlatformCall {
        PlatformCall::Resource {
            action: crate::action::ActionKind::Update,
            resource: ResourceRef::instance(name),
            payload: serde_json::Value::Null,
        }
    }

    fn halt_workflow() -> Workflow {
        Workflow::new("service box").step(
            Step::new("service", call("box")).requires(
                Precondition::new(box_ref(), DOWN).with_transition(
                    Transition::new(
                        PlatformCall::StopInstance {
                            instance_name: "box".to_string(),
                            force: false,
                        },
                        &["up"],
                    )
                    .restored_by(
                        PlatformCall::StartInstance {
                            instance_name: "box".to_string(),
                        },
                        UP,
                    ),
                ),
            ),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_action_restore_order() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["up"]);
        fake.on_call("StopInstance", &box_ref(), vec![Observation::state("down")]);
        fake.on_call("StartInstance", &box_ref(), vec![Observation::state("up")]);

        let report = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap();

        let mutations: Vec<&str> = fake
            .calls()
            .iter()
            .map(|c| c.name())
            .filter(|n| !n.starts_with("Get"))
            .collect();
        assert_eq!(mutations, vec!["StopInstance", "Resource", "StartInstance"]);

        let step = &report.steps[0];
        assert!(step.transitioned());
        assert_eq!(step.restores, vec![(box_ref(), RestoreOutcome::Restored)]);
        assert_eq!(step.phase, Phase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_precondition_skips_transition() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["down"]);

        let report = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap();

        assert_eq!(fake.count_calls("StopInstance"), 0);
        assert_eq!(fake.count_calls("StartInstance"), 0);
        assert_eq!(
            report.steps[0].preconditions,
            vec![(box_ref(), PreconditionOutcome::AlreadySatisfied)]
        );
        assert!(report.steps[0].restores.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_precondition_waits_without_transition() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["halting", "halting", "down"]);

        let report = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap();

        assert_eq!(fake.count_calls("StopInstance"), 0);
        assert_eq!(fake.count_calls("StartInstance"), 0);
        assert_eq!(
            report.steps[0].preconditions,
            vec![(box_ref(), PreconditionOutcome::Awaited)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_precondition_state() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["exploded"]);

        let err = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::UnexpectedState { .. }));
        assert_eq!(fake.count_calls("Resource"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_skipped_when_already_restored() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["up"]);
        fake.on_call("StopInstance", &box_ref(), vec![Observation::state("down")]);
        // something else brought the box back while the action ran
        fake.on_call("Resource", &box_ref(), vec![Observation::state("up")]);

        let report = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap();

        assert_eq!(fake.count_calls("StartInstance"), 0);
        assert_eq!(
            report.steps[0].restores,
            vec![(box_ref(), RestoreOutcome::AlreadyRestored)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_failure_before_anything_applied() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["up"]);
        fake.script_next_operations(vec![vec![OperationStatus::Failed]]);

        let err = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::PreconditionTransitionFailed { .. }));
        assert!(matches!(err.root_cause(), CloudError::OperationFailed { .. }));
        assert_eq!(fake.count_calls("Resource"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_failure_after_transition_is_partial() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["up"]);
        fake.on_call("StopInstance", &box_ref(), vec![Observation::state("down")]);
        fake.fail_call("Resource", 0, CloudError::ApiError("busy".into()));

        let err = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap_err();

        match &err {
            CloudError::PartiallyApplied {
                completed_steps, ..
            } => assert_eq!(completed_steps, &vec!["stop instance (box)".to_string()]),
            other => panic!("Expected PartiallyApplied, got {:?}", other),
        }
        assert!(matches!(err.root_cause(), CloudError::ApiError(_)));
        // no compensation
        assert_eq!(fake.count_calls("StartInstance"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_failure() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["up"]);
        fake.on_call("StopInstance", &box_ref(), vec![Observation::state("down")]);
        fake.fail_call("StartInstance", 0, CloudError::ServiceUnavailable("503".into()));

        let err = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .run(&halt_workflow())
            .await
            .unwrap_err();

        match &err {
            CloudError::PartiallyApplied {
                completed_steps,
                source,
                ..
            } => {
                assert_eq!(completed_steps.len(), 2);
                assert!(matches!(
                    source.as_ref(),
                    CloudError::PostconditionRestoreFailed { .. }
                ));
            }
            other => panic!("Expected PartiallyApplied, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_before_start() {
        let fake = FakeControlPlane::new();
        fake.script_states(&box_ref(), &["up"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = WorkflowOrchestrator::new(&fake, WaitPolicies::default())
            .with_cancellation(cancel)
            .run(&halt_workflow())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(fake.calls().is_empty());
    }
}
