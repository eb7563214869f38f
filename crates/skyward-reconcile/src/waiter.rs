//! Resource state waiter
//!
//! Polls a resource's own descriptive state rather than an operation handle.
//! Used where the platform exposes no handle for a transition, and to
//! re-confirm the state after a workflow transition.

use crate::error::{CloudError, Result};
use crate::poller::{ensure_not_cancelled, pause_before_check};
use crate::policy::WaitPolicy;
use crate::provider::ControlPlane;
use crate::resource::{ResourceRef, ResourceSnapshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// States a resource is expected to pass through and settle in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateExpectation {
    /// Human-readable name, used in errors (e.g. "stopped")
    pub name: &'static str,

    /// States that mean "still moving"; empty means every non-target state
    pub pending: &'static [&'static str],

    /// States that end the wait
    pub target: &'static [&'static str],

    /// Whether the resource may not be readable yet (it is being created)
    pub during_creation: bool,
}

impl StateExpectation {
    pub const fn new(
        name: &'static str,
        pending: &'static [&'static str],
        target: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            pending,
            target,
            during_creation: false,
        }
    }

    /// Tolerate not-found reads for the wait policy's grace period
    pub const fn while_creating(mut self) -> Self {
        self.during_creation = true;
        self
    }

    pub fn is_target(&self, state: &str) -> bool {
        self.target.iter().any(|s| *s == state)
    }

    pub fn is_pending(&self, state: &str) -> bool {
        self.pending.is_empty() || self.pending.iter().any(|s| *s == state)
    }
}

impl std::fmt::Display for StateExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

const NOT_FOUND: &str = "not found";

/// Waits on a resource's state field
pub struct StateWaiter<'a> {
    client: &'a dyn ControlPlane,
    policy: WaitPolicy,
    cancel: CancellationToken,
}

impl<'a> StateWaiter<'a> {
    pub fn new(client: &'a dyn ControlPlane, policy: WaitPolicy) -> Self {
        Self {
            client,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read the resource once; `None` when it does not exist
    pub async fn current(&self, resource: &ResourceRef) -> Result<Option<ResourceSnapshot>> {
        ensure_not_cancelled(&self.cancel, &resource.to_string())?;

        match self.client.get_resource(resource).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Wait until the resource reports a target state
    ///
    /// For expectations built with [`StateExpectation::while_creating`],
    /// not-found reads count as pending for up to `not_found_checks`
    /// consecutive reads; otherwise the first one ends the wait. Throttling and service-unavailable errors are
    /// retried until the deadline; any other error ends the wait.
    pub async fn wait_for(
        &self,
        resource: &ResourceRef,
        expectation: &StateExpectation,
    ) -> Result<ResourceSnapshot> {
        let waiting_for = format!("{} to become {}", resource, expectation);
        let deadline = Instant::now() + self.policy.timeout;
        let mut pause = self.policy.delay;
        let mut not_found: u32 = 0;
        let grace = if expectation.during_creation {
            self.policy.not_found_checks
        } else {
            0
        };
        let mut last_state = String::from(NOT_FOUND);

        loop {
            pause_before_check(&self.cancel, pause, deadline, &waiting_for).await?;

            match self.client.get_resource(resource).await {
                Ok(snapshot) => {
                    not_found = 0;
                    tracing::debug!(
                        resource = %resource,
                        state = %snapshot.state,
                        expected = expectation.name,
                        "Polled resource state"
                    );

                    if expectation.is_target(&snapshot.state) {
                        return Ok(snapshot);
                    }
                    if !expectation.is_pending(&snapshot.state) {
                        return Err(CloudError::UnexpectedState {
                            resource_type: resource.kind.to_string(),
                            id: resource.name.clone(),
                            state: snapshot.state,
                            expected: expectation.name.to_string(),
                        });
                    }
                    last_state = snapshot.state;
                }
                Err(e) if e.is_not_found() => {
                    not_found += 1;
                    if not_found > grace {
                        return Err(e);
                    }
                    tracing::warn!(
                        "{} not found yet ({}/{}), treating as pending",
                        resource,
                        not_found,
                        grace
                    );
                    last_state = String::from(NOT_FOUND);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Retrying state read for {}: {}", resource, e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(CloudError::StateTimeout {
                    resource_type: resource.kind.to_string(),
                    id: resource.name.clone(),
                    expected: expectation.name.to_string(),
                    last_state,
                    timeout: self.policy.timeout,
                });
            }

            pause = self.policy.poll_interval();
        }
    }

    /// Wait until the resource no longer exists
    ///
    /// States in `pending` are tolerated while deletion progresses; an empty
    /// list tolerates any state.
    pub async fn wait_for_absence(
        &self,
        resource: &ResourceRef,
        pending: &[&str],
    ) -> Result<()> {
        let waiting_for = format!("{} to be deleted", resource);
        let deadline = Instant::now() + self.policy.timeout;
        let mut pause = self.policy.delay;
        let mut last_state = String::from("unknown");

        loop {
            pause_before_check(&self.cancel, pause, deadline, &waiting_for).await?;

            match self.client.get_resource(resource).await {
                Ok(snapshot) => {
                    if !pending.is_empty() && !pending.iter().any(|s| *s == snapshot.state) {
                        return Err(CloudError::UnexpectedState {
                            resource_type: resource.kind.to_string(),
                            id: resource.name.clone(),
                            state: snapshot.state,
                            expected: "deleted".to_string(),
                        });
                    }
                    tracing::debug!(resource = %resource, state = %snapshot.state, "Awaiting deletion");
                    last_state = snapshot.state;
                }
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) if e.is_transient() => {
                    tracing::warn!("Retrying state read for {}: {}", resource, e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(CloudError::StateTimeout {
                    resource_type: resource.kind.to_string(),
                    id: resource.name.clone(),
                    expected: "deleted".to_string(),
                    last_state,
                    timeout: self.policy.timeout,
                });
            }

            pause = self.policy.poll_interval();
        }
    }
}
