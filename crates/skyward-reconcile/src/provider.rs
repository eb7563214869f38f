//! Control plane trait definition

use crate::action::PlatformCall;
use crate::error::Result;
use crate::operation::Operation;
use crate::resource::{ResourceRef, ResourceSnapshot};
use crate::tags::TagSet;
use async_trait::async_trait;

/// The cloud platform's control-plane API
///
/// Every reconciliation component receives an implementation of this trait
/// explicitly; nothing in this crate holds a process-wide client.
///
/// Implementations report a missing resource as
/// [`CloudError::ResourceNotFound`](crate::CloudError::ResourceNotFound) and
/// rate limiting as [`CloudError::Throttled`](crate::CloudError::Throttled) so
/// the waiters can tell pending from fatal.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Returns the platform name (e.g. "lightsail")
    fn name(&self) -> &str;

    /// Read the current status of an operation
    async fn get_operation(&self, operation_id: &str) -> Result<Operation>;

    /// Read a resource's descriptive state
    async fn get_resource(&self, resource: &ResourceRef) -> Result<ResourceSnapshot>;

    /// Issue a mutating call; the platform answers with zero or more operation handles
    async fn invoke(&self, call: &PlatformCall) -> Result<Vec<Operation>>;

    /// Add or overwrite tags on a resource
    async fn tag_resource(&self, resource: &ResourceRef, tags: &TagSet) -> Result<Vec<Operation>>;

    /// Remove tags from a resource by key
    async fn untag_resource(
        &self,
        resource: &ResourceRef,
        keys: &[String],
    ) -> Result<Vec<Operation>>;

    /// Maximum number of tags accepted by one tag/untag call, if limited
    fn max_tags_per_call(&self) -> Option<usize> {
        None
    }
}
