//! Target group reconciler - converges ELBv2 target group membership onto
//! the live host ports.
//!
//! Ports are the comparison key. A port present on both sides is left alone
//! even when it is registered for a different node than the one now bound
//! to it, so a port reused by another instance keeps its stale registration
//! until the port itself disappears from the live set.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::Reconciler;
use crate::clients::LoadBalancer;
use crate::error::{ClientError, Mutation, Result, SyncError};
use crate::model::{LiveSet, RegisteredSet, Target, TargetGroupEntry};

/// Targets to add and remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Live ports not registered yet.
    pub fresh: Vec<Target>,
    /// Registered entries whose port is no longer live.
    pub obsolete: Vec<Target>,
}

impl Delta {
    pub fn compute(live: &LiveSet, registered: &RegisteredSet) -> Self {
        let fresh = live
            .iter()
            .filter(|(port, _)| !registered.contains_port(**port))
            .map(|(port, node)| Target {
                id: node.clone(),
                port: *port,
            })
            .collect();

        let obsolete = registered
            .entries()
            .iter()
            .filter(|entry| !live.contains_port(entry.port))
            .map(TargetGroupEntry::as_target)
            .collect();

        Self { fresh, obsolete }
    }

    pub fn is_empty(&self) -> bool {
        self.fresh.is_empty() && self.obsolete.is_empty()
    }
}

/// Result of one target group reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub removed: usize,
}

/// Target group reconciler that interacts with the load balancer.
pub struct TargetGroupReconciler {
    lb: Arc<dyn LoadBalancer>,
}

impl TargetGroupReconciler {
    pub fn new(lb: Arc<dyn LoadBalancer>) -> Self {
        Self { lb }
    }
}

#[async_trait]
impl Reconciler for TargetGroupReconciler {
    type Spec = LiveSet;
    type Status = ReconcileOutcome;

    async fn reconcile(&self, name: &str, live: &Self::Spec) -> Result<Self::Status> {
        info!("Reconciling target group {}", name);

        let handle = self
            .lb
            .resolve_target_group(name)
            .await
            .map_err(|e| match e {
                ClientError::NotFound(name) => SyncError::NotFound(name),
                other => SyncError::UpstreamQuery(other),
            })?;
        info!("Target group {} is {}", name, handle);

        let registered = RegisteredSet::new(
            self.lb
                .describe_target_health(&handle)
                .await
                .map_err(SyncError::UpstreamQuery)?,
        );
        info!("Registered targets: {:?}", registered.entries());

        let delta = Delta::compute(live, &registered);
        info!("Obsolete targets to deregister: {:?}", delta.obsolete);
        info!("New targets to register: {:?}", delta.fresh);

        let mut outcome = ReconcileOutcome::default();
        if delta.is_empty() {
            info!("Target group {} already matches live tasks", name);
            return Ok(outcome);
        }

        if !delta.fresh.is_empty() {
            self.lb
                .register_targets(&handle, &delta.fresh)
                .await
                .map_err(|source| SyncError::UpstreamMutation {
                    mutation: Mutation::Register,
                    registered: 0,
                    source,
                })?;
            outcome.added = delta.fresh.len();
        }

        if !delta.obsolete.is_empty() {
            if let Err(source) = self.lb.deregister_targets(&handle, &delta.obsolete).await {
                error!(
                    "Deregistration from {} failed, {} new targets stay registered",
                    name, outcome.added
                );
                return Err(SyncError::UpstreamMutation {
                    mutation: Mutation::Deregister,
                    registered: outcome.added,
                    source,
                });
            }
            outcome.removed = delta.obsolete.len();
        }

        info!(
            "Target group {}: registered {}, deregistered {}",
            name, outcome.added, outcome.removed
        );
        Ok(outcome)
    }
}
