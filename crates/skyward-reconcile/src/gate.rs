//! Operation result gate
//!
//! Answers "did this mutating call actually schedule work, and did it finish".

use crate::action::{ActionContext, PlatformCall};
use crate::error::{CloudError, Result};
use crate::operation::Operation;
use crate::poller::OperationPoller;

/// Waits on the operation handles returned by one mutating call
pub struct OperationGate<'a> {
    poller: OperationPoller<'a>,
}

impl<'a> OperationGate<'a> {
    pub fn new(poller: OperationPoller<'a>) -> Self {
        Self { poller }
    }

    /// Require at least one handle and wait for the first one to succeed
    ///
    /// An empty list fails with `NoOperationScheduled` without polling: a
    /// mutation that returns no handle scheduled nothing. Only the first
    /// handle is awaited; auxiliary handles are logged and ignored. Poll
    /// failures are wrapped with `context`.
    pub async fn wait(
        &self,
        operations: &[Operation],
        context: &ActionContext,
    ) -> Result<Operation> {
        let Some(first) = operations.first() else {
            return Err(CloudError::NoOperationScheduled {
                context: context.clone(),
            });
        };

        if operations.len() > 1 {
            tracing::warn!(
                "{} returned {} operations, waiting on {} only",
                context,
                operations.len(),
                first.id
            );
        }

        tracing::debug!("Waiting for {} ({})", context, first.id);

        self.poller
            .wait(&first.id)
            .await
            .map_err(|e| e.in_action(context.clone()))
    }

    /// Issue a mutating call and gate the handles it returns
    pub async fn apply(&self, call: &PlatformCall) -> Result<Operation> {
        let context = call.context();
        tracing::debug!("Issuing {} ({})", call.name(), context);

        let operations = self
            .poller
            .client()
            .invoke(call)
            .await
            .map_err(|e| e.in_action(context.clone()))?;
        self.wait(&operations, &context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::operation::OperationStatus::*;
    use crate::policy::WaitPolicy;
    use crate::resource::ResourceKind;
    use crate::testing::FakeControlPlane;

    fn context() -> ActionContext {
        ActionContext::new(ActionKind::Create, ResourceKind::Disk, "d1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_never_polls() {
        let fake = FakeControlPlane::new();
        let gate = OperationGate::new(OperationPoller::new(&fake, WaitPolicy::operation()));

        let err = gate.wait(&[], &context()).await.unwrap_err();

        match err {
            CloudError::NoOperationScheduled { context: c } => assert_eq!(c, context()),
            other => panic!("Expected NoOperationScheduled, got {:?}", other),
        }
        assert!(fake.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_first_check_is_not_retried() {
        let fake = FakeControlPlane::new();
        fake.insert_operation("op-1", vec![Failed, Succeeded]);
        let gate = OperationGate::new(OperationPoller::new(&fake, WaitPolicy::operation()));

        let err = gate
            .wait(&[Operation::new("op-1", Started)], &context())
            .await
            .unwrap_err();

        assert!(matches!(err.root_cause(), CloudError::OperationFailed { .. }));
        assert!(err.to_string().starts_with("Failed to create disk (d1): "));
        assert_eq!(fake.operation_checks("op-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_first_handle_awaited() {
        let fake = FakeControlPlane::new();
        fake.insert_operation("op-1", vec![Succeeded]);
        fake.insert_operation("op-aux", vec![Failed]);
        let gate = OperationGate::new(OperationPoller::new(&fake, WaitPolicy::operation()));

        let op = gate
            .wait(
                &[
                    Operation::new("op-1", Started),
                    Operation::new("op-aux", Started),
                ],
                &context(),
            )
            .await
            .unwrap();

        assert_eq!(op.id, "op-1");
        assert_eq!(fake.operation_checks("op-aux"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_invokes_then_waits() {
        let fake = FakeControlPlane::new();
        let gate = OperationGate::new(OperationPoller::new(&fake, WaitPolicy::operation()));
        let call = PlatformCall::StopInstance {
            instance_name: "i1".to_string(),
            force: false,
        };

        let op = gate.apply(&call).await.unwrap();

        assert_eq!(op.id, "op-1");
        assert_eq!(
            fake.call_log(),
            vec!["StopInstance stop instance (i1)", "GetOperation op-1"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_labels_call_errors() {
        let fake = FakeControlPlane::new();
        fake.fail_call(
            "StopInstance",
            0,
            CloudError::AuthenticationFailed("expired token".to_string()),
        );
        let gate = OperationGate::new(OperationPoller::new(&fake, WaitPolicy::operation()));
        let call = PlatformCall::StopInstance {
            instance_name: "i1".to_string(),
            force: false,
        };

        let err = gate.apply(&call).await.unwrap_err();

        assert!(matches!(err, CloudError::Action { .. }));
        assert_eq!(fake.count_calls("GetOperation"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_wrapped_with_context() {
        let fake = FakeControlPlane::new();
        fake.insert_operation("op-1", vec![Started]);
        let policy = WaitPolicy::operation().with_timeout(std::time::Duration::from_secs(20));
        let gate = OperationGate::new(OperationPoller::new(&fake, policy));

        let err = gate
            .wait(&[Operation::new("op-1", Started)], &context())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(matches!(err, CloudError::Action { .. }));
    }
}
