//! Reconcilers.
//!
//! A reconciler compares desired state (from the orchestrator) with actual
//! state (from the target's own API) and takes actions to converge.

pub mod target_group;

pub use target_group::{Delta, ReconcileOutcome, TargetGroupReconciler};

use async_trait::async_trait;

use crate::error::Result;

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The desired state.
    type Spec;
    /// What the pass changed.
    type Status;

    /// Reconcile the resource - compare desired vs actual state and take action.
    async fn reconcile(&self, id: &str, spec: &Self::Spec) -> Result<Self::Status>;
}
