//! Tag set diffing and reconciliation
//!
//! Turns an (old, new) pair of tag sets into the minimal untag/tag calls,
//! split into batches when the platform limits tags per call.
//!
//! The reconciler diffs exactly the sets it is given. Keys the policy ignores
//! are dropped on the read side with [`TagSet::without_ignored`], before the
//! current tags ever reach a diff.

use crate::action::{ActionContext, ActionKind};
use crate::error::{CloudError, Result};
use crate::gate::OperationGate;
use crate::poller::OperationPoller;
use crate::policy::WaitPolicy;
use crate::provider::ControlPlane;
use crate::resource::ResourceRef;
use serde::{Deserialize, Serialize};
use skyward_config::TagSettings;
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;

/// Key prefix the platform reserves for its own tags
pub const RESERVED_TAG_PREFIX: &str = "aws:";

/// Tags keyed by tag key; values may be empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Tags in `self` whose key is absent from `new`
    pub fn removed(&self, new: &TagSet) -> TagSet {
        self.0
            .iter()
            .filter(|(k, _)| !new.0.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Tags in `new` that are missing from `self` or carry a different value
    pub fn updated(&self, new: &TagSet) -> TagSet {
        new.0
            .iter()
            .filter(|(k, v)| self.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Split into sets of at most `size` tags, in key order
    pub fn chunks(&self, size: usize) -> Vec<TagSet> {
        let size = size.max(1);
        let entries: Vec<(&String, &String)> = self.0.iter().collect();
        entries
            .chunks(size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|(k, v)| ((*k).clone(), (*v).clone()))
                    .collect()
            })
            .collect()
    }

    /// Drop every tag the policy says is not ours to manage
    ///
    /// Applied to tags read back from the platform so reserved and
    /// externally managed keys never show up as drift.
    pub fn without_ignored(&self, policy: &TagPolicy) -> TagSet {
        self.0
            .iter()
            .filter(|(k, _)| !policy.ignores(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for TagSet {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

/// Which tags are hidden when reading, and how calls are batched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    pub max_per_call: Option<usize>,
    pub ignore_keys: Vec<String>,
    pub ignore_key_prefixes: Vec<String>,
    pub ignore_reserved: bool,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            max_per_call: None,
            ignore_keys: Vec::new(),
            ignore_key_prefixes: Vec::new(),
            ignore_reserved: true,
        }
    }
}

impl TagPolicy {
    pub fn from_settings(settings: &TagSettings) -> Self {
        Self {
            max_per_call: settings.max_per_call,
            ignore_keys: settings.ignore_keys.clone(),
            ignore_key_prefixes: settings.ignore_key_prefixes.clone(),
            ignore_reserved: settings.ignore_reserved.unwrap_or(true),
        }
    }

    pub fn ignores(&self, key: &str) -> bool {
        (self.ignore_reserved && key.starts_with(RESERVED_TAG_PREFIX))
            || self.ignore_keys.iter().any(|k| k == key)
            || self.ignore_key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Phase of a tag reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagPhase {
    Remove,
    Update,
}

impl std::fmt::Display for TagPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagPhase::Remove => write!(f, "removing"),
            TagPhase::Update => write!(f, "updating"),
        }
    }
}

/// Changes applied by one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub removed: Vec<String>,
    pub updated: TagSet,
    /// Number of tag/untag calls issued
    pub batches: usize,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Applies tag differences to one resource
pub struct TagReconciler<'a> {
    client: &'a dyn ControlPlane,
    policy: TagPolicy,
    wait: WaitPolicy,
    cancel: CancellationToken,
}

impl<'a> TagReconciler<'a> {
    pub fn new(client: &'a dyn ControlPlane, policy: TagPolicy, wait: WaitPolicy) -> Self {
        Self {
            client,
            policy,
            wait,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Batch size: the configured limit, else the platform's, else unbounded
    fn batch_size(&self, len: usize) -> usize {
        self.policy
            .max_per_call
            .or_else(|| self.client.max_tags_per_call())
            .unwrap_or(len)
            .max(1)
    }

    /// Compute the delta between `old` and `new` without calling the platform
    pub fn plan(&self, old: &TagSet, new: &TagSet) -> TagDelta {
        TagDelta {
            removed: old.removed(new).keys(),
            updated: old.updated(new),
            batches: 0,
        }
    }

    /// Remove, then update, gating every batch on its operation
    ///
    /// The first failing batch stops the reconciliation. Batches already
    /// applied are not rolled back; the error reports how many there were.
    pub async fn reconcile(
        &self,
        resource: &ResourceRef,
        old: &TagSet,
        new: &TagSet,
    ) -> Result<TagDelta> {
        let mut delta = self.plan(old, new);
        if delta.is_empty() {
            tracing::debug!("Tags on {} already up to date", resource);
            return Ok(delta);
        }

        let gate = OperationGate::new(
            OperationPoller::new(self.client, self.wait).with_cancellation(self.cancel.clone()),
        );

        let untag = ActionContext::new(ActionKind::Untag, resource.kind, &resource.name);
        for keys in delta.removed.chunks(self.batch_size(delta.removed.len())) {
            tracing::debug!("Removing {} tag(s) from {}", keys.len(), resource);
            let result = match self.client.untag_resource(resource, keys).await {
                Ok(operations) => gate.wait(&operations, &untag).await.map(|_| ()),
                Err(e) => Err(e.in_action(untag.clone())),
            };
            if let Err(e) = result {
                return Err(phase_error(TagPhase::Remove, resource, delta.batches, e));
            }
            delta.batches += 1;
        }

        let tag = ActionContext::new(ActionKind::Tag, resource.kind, &resource.name);
        for chunk in delta.updated.chunks(self.batch_size(delta.updated.len())) {
            tracing::debug!("Setting {} tag(s) on {}", chunk.len(), resource);
            let result = match self.client.tag_resource(resource, &chunk).await {
                Ok(operations) => gate.wait(&operations, &tag).await.map(|_| ()),
                Err(e) => Err(e.in_action(tag.clone())),
            };
            if let Err(e) = result {
                return Err(phase_error(TagPhase::Update, resource, delta.batches, e));
            }
            delta.batches += 1;
        }

        tracing::info!(
            "Reconciled tags on {}: {} removed, {} updated in {} call(s)",
            resource,
            delta.removed.len(),
            delta.updated.len(),
            delta.batches
        );
        Ok(delta)
    }
}

fn phase_error(
    phase: TagPhase,
    resource: &ResourceRef,
    batches_applied: usize,
    source: CloudError,
) -> CloudError {
    if batches_applied == 0 {
        CloudError::TagPhaseFailed {
            phase,
            resource: resource.to_string(),
            source: Box::new(source),
        }
    } else {
        CloudError::TagReconciliationPartialFailure {
            phase,
            resource: resource.to_string(),
            batches_applied,
            source: Box::new(source),
        }
    }
}
