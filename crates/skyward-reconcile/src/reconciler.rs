//! Entry point used by resource handlers
//!
//! Bundles the control-plane client with the wait and tag policies so a
//! handler needs one value to drive every reconciliation primitive.

use crate::action::{ActionContext, PlatformCall};
use crate::catalog::{ids, workflows};
use crate::error::{CloudError, Result};
use crate::gate::OperationGate;
use crate::operation::Operation;
use crate::poller::OperationPoller;
use crate::policy::WaitPolicies;
use crate::provider::ControlPlane;
use crate::resource::{ResourceRef, ResourceSnapshot};
use crate::tags::{TagDelta, TagPolicy, TagReconciler, TagSet};
use crate::waiter::{StateExpectation, StateWaiter};
use crate::workflow::{Workflow, WorkflowOrchestrator, WorkflowReport};
use skyward_config::Settings;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Reconciler {
    client: Arc<dyn ControlPlane>,
    policies: WaitPolicies,
    tag_policy: TagPolicy,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self {
            client,
            policies: WaitPolicies::default(),
            tag_policy: TagPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_settings(client: Arc<dyn ControlPlane>, settings: &Settings) -> Self {
        Self {
            client,
            policies: WaitPolicies::from_settings(settings),
            tag_policy: TagPolicy::from_settings(&settings.tags),
            cancel: CancellationToken::new(),
        }
    }

    /// Build from the discovered settings file, or defaults if there is none
    pub fn load(client: Arc<dyn ControlPlane>) -> Result<Self> {
        let settings = skyward_config::load_settings()?;
        Ok(Self::from_settings(client, &settings))
    }

    pub fn with_policies(mut self, policies: WaitPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_tag_policy(mut self, tag_policy: TagPolicy) -> Self {
        self.tag_policy = tag_policy;
        self
    }

    /// Every wait started by this reconciler stops when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policies(&self) -> &WaitPolicies {
        &self.policies
    }

    pub fn tag_policy(&self) -> &TagPolicy {
        &self.tag_policy
    }

    fn gate(&self) -> OperationGate<'_> {
        OperationGate::new(
            OperationPoller::new(self.client.as_ref(), self.policies.operation)
                .with_cancellation(self.cancel.clone()),
        )
    }

    fn waiter(&self) -> StateWaiter<'_> {
        StateWaiter::new(self.client.as_ref(), self.policies.resource_state)
            .with_cancellation(self.cancel.clone())
    }

    /// Gate the handles returned by a mutating call
    pub async fn await_operations(
        &self,
        operations: &[Operation],
        context: &ActionContext,
    ) -> Result<Operation> {
        self.gate().wait(operations, context).await
    }

    /// Issue one mutating call and wait for its operation
    pub async fn apply(&self, call: &PlatformCall) -> Result<Operation> {
        self.gate().apply(call).await
    }

    pub async fn wait_for_state(
        &self,
        resource: &ResourceRef,
        expectation: &StateExpectation,
    ) -> Result<ResourceSnapshot> {
        self.waiter().wait_for(resource, expectation).await
    }

    pub async fn wait_for_absence(&self, resource: &ResourceRef, pending: &[&str]) -> Result<()> {
        self.waiter().wait_for_absence(resource, pending).await
    }

    /// Hide the tags the policy ignores from a set read back from the platform
    ///
    /// Run this over the current tags before handing them to
    /// [`Reconciler::reconcile_tags`], which diffs exactly what it is given.
    pub fn visible_tags(&self, current: &TagSet) -> TagSet {
        current.without_ignored(&self.tag_policy)
    }

    pub async fn reconcile_tags(
        &self,
        resource: &ResourceRef,
        old: &TagSet,
        new: &TagSet,
    ) -> Result<TagDelta> {
        TagReconciler::new(
            self.client.as_ref(),
            self.tag_policy.clone(),
            self.policies.operation,
        )
        .with_cancellation(self.cancel.clone())
        .reconcile(resource, old, new)
        .await
    }

    pub async fn run_workflow(&self, workflow: &Workflow) -> Result<WorkflowReport> {
        WorkflowOrchestrator::new(self.client.as_ref(), self.policies)
            .with_cancellation(self.cancel.clone())
            .run(workflow)
            .await
    }

    /// Attach a disk and return the attachment's composite id
    pub async fn attach_disk(
        &self,
        disk_name: &str,
        instance_name: &str,
        disk_path: &str,
    ) -> Result<String> {
        if disk_path.is_empty() {
            return Err(CloudError::InvalidInput(
                "disk path must not be empty".to_string(),
            ));
        }
        let id = ids::DISK_ATTACHMENT.encode(&[disk_name, instance_name])?;

        self.run_workflow(&workflows::disk_attach(disk_name, instance_name, disk_path))
            .await?;
        Ok(id)
    }

    /// Detach the disk named by an attachment id
    pub async fn detach_disk(&self, attachment_id: &str) -> Result<WorkflowReport> {
        let [disk_name, instance_name] = ids::DISK_ATTACHMENT.decode_array(attachment_id)?;
        self.run_workflow(&workflows::disk_detach(&disk_name, &instance_name))
            .await
    }

    pub async fn update_database(
        &self,
        database_name: &str,
        changes: serde_json::Value,
    ) -> Result<WorkflowReport> {
        self.run_workflow(&workflows::database_update(database_name, changes))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeControlPlane;
    use skyward_config::{TagSettings, WaitSettings};
    use std::time::Duration;

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            operation: WaitSettings {
                timeout_secs: Some(120),
                ..Default::default()
            },
            tags: TagSettings {
                max_per_call: Some(25),
                ..Default::default()
            },
            ..Default::default()
        };

        let reconciler = Reconciler::from_settings(Arc::new(FakeControlPlane::new()), &settings);
        assert_eq!(reconciler.policies().operation.timeout, Duration::from_secs(120));
        assert_eq!(reconciler.tag_policy().max_per_call, Some(25));
        assert!(reconciler.tag_policy().ignore_reserved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_rejects_bad_input_before_calling() {
        let fake = Arc::new(FakeControlPlane::new());
        let reconciler = Reconciler::new(fake.clone());

        assert!(reconciler.attach_disk("d1", "i1", "").await.is_err());
        assert!(reconciler.attach_disk("", "i1", "/dev/xvdf").await.is_err());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_rejects_malformed_id() {
        let fake = Arc::new(FakeControlPlane::new());
        let reconciler = Reconciler::new(fake.clone());

        let err = reconciler.detach_disk("d1").await.unwrap_err();
        assert!(matches!(err, CloudError::MalformedIdentifier { .. }));
        assert!(fake.calls().is_empty());
    }
}
