//! Sync agent - runs one reconciliation pass per task state change event.
//!
//! A pass is filter, collect, reconcile. Nothing is kept between passes:
//! every fact is re-read from ECS and ELBv2, so redelivered or duplicated
//! events converge to the same target group membership.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::clients::{LoadBalancer, Orchestrator};
use crate::collector::StateCollector;
use crate::config::Config;
use crate::error::Result;
use crate::event::{LifecycleEvent, should_reconcile};
use crate::reconciler::{ReconcileOutcome, Reconciler, TargetGroupReconciler};

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    /// The event was not relevant; no collaborator was called.
    Skipped { reason: String },
    /// The target group was reconciled.
    Reconciled { added: usize, removed: usize },
}

impl From<ReconcileOutcome> for PassOutcome {
    fn from(o: ReconcileOutcome) -> Self {
        PassOutcome::Reconciled {
            added: o.added,
            removed: o.removed,
        }
    }
}

/// Agent bound to one service and one target group.
pub struct SyncAgent {
    service: String,
    target_group: String,
    collector: StateCollector,
    reconciler: TargetGroupReconciler,
}

impl SyncAgent {
    pub fn new(
        config: &Config,
        orchestrator: Arc<dyn Orchestrator>,
        lb: Arc<dyn LoadBalancer>,
    ) -> Self {
        Self {
            service: config.ecs_service.clone(),
            target_group: config.target_group.clone(),
            collector: StateCollector::new(orchestrator)
                .with_container_name(config.container_name.clone())
                .with_concurrency(config.max_concurrency),
            reconciler: TargetGroupReconciler::new(lb),
        }
    }

    /// Handle one event.
    pub async fn handle_event(&self, event: &LifecycleEvent) -> Result<PassOutcome> {
        info!("ECS service = {}", event.service_name());
        info!(
            "Task status = {:?}, container status = {:?}",
            event.task_status(),
            event.container_status()
        );

        if !should_reconcile(event, &self.service) {
            let reason = skip_reason(event, &self.service);
            debug!("Skipping event {:?}: {}", event.id, reason);
            return Ok(PassOutcome::Skipped { reason });
        }

        let live = self
            .collector
            .collect_live_bindings(event.cluster(), event.service_name())
            .await?;

        let outcome = self.reconciler.reconcile(&self.target_group, &live).await?;
        Ok(outcome.into())
    }
}

fn skip_reason(event: &LifecycleEvent, service: &str) -> String {
    if event.service_name() != service {
        return format!("service {} is not {}", event.service_name(), service);
    }
    match event.container_status() {
        Some(status) => format!("container status {:?} is not actionable", status),
        None => "event carries no container status".to_string(),
    }
}
