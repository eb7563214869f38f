//! Operation status polling
//!
//! Blocks the calling task until an operation handle reaches a terminal
//! status, the wait policy's timeout elapses, or the caller cancels.

use crate::error::{CloudError, Result};
use crate::operation::{Operation, OperationStatus};
use crate::policy::WaitPolicy;
use crate::provider::ControlPlane;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Polls one operation handle at a fixed interval
pub struct OperationPoller<'a> {
    client: &'a dyn ControlPlane,
    policy: WaitPolicy,
    cancel: CancellationToken,
}

impl<'a> OperationPoller<'a> {
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

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    pub(crate) fn client(&self) -> &'a dyn ControlPlane {
        self.client
    }

    /// Wait until the operation succeeds
    ///
    /// Returns the final operation on `Completed`/`Succeeded`. A `Failed`
    /// status, the timeout, and cancellation each map to their own error.
    /// Errors from the status call itself are returned unchanged.
    pub async fn wait(&self, operation_id: &str) -> Result<Operation> {
        if operation_id.is_empty() {
            return Err(CloudError::InvalidInput(
                "operation id must not be empty".to_string(),
            ));
        }

        let waiting_for = format!("operation {}", operation_id);
        let deadline = Instant::now() + self.policy.timeout;
        let mut pause = self.policy.delay;
        let mut checks: u32 = 0;

        loop {
            pause_before_check(&self.cancel, pause, deadline, &waiting_for).await?;

            let operation = self.client.get_operation(operation_id).await?;
            checks += 1;

            tracing::debug!(
                operation_id,
                status = %operation.status,
                checks,
                "Polled operation"
            );

            match operation.status {
                OperationStatus::Completed | OperationStatus::Succeeded => return Ok(operation),
                OperationStatus::Failed => {
                    return Err(CloudError::OperationFailed {
                        operation_id: operation.id,
                        code: operation.error_code,
                        details: operation.error_details,
                    });
                }
                status @ (OperationStatus::NotStarted | OperationStatus::Started) => {
                    if Instant::now() >= deadline {
                        return Err(CloudError::OperationTimeout {
                            operation_id: operation_id.to_string(),
                            timeout: self.policy.timeout,
                            last_status: status.to_string(),
                        });
                    }
                }
            }

            pause = self.policy.poll_interval();
        }
    }
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken, waiting_for: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(CloudError::Cancelled {
            waiting_for: waiting_for.to_string(),
        });
    }
    Ok(())
}

/// Sleep until the next check, never past the deadline
///
/// Cancellation is checked on entry, raced against the sleep, and checked
/// again before returning so no API call is made after a cancel.
pub(crate) async fn pause_before_check(
    cancel: &CancellationToken,
    pause: Duration,
    deadline: Instant,
    waiting_for: &str,
) -> Result<()> {
    ensure_not_cancelled(cancel, waiting_for)?;

    let pause = pause.min(deadline.saturating_duration_since(Instant::now()));
    if !pause.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(pause) => {}
        }
    }

    ensure_not_cancelled(cancel, waiting_for)
}
