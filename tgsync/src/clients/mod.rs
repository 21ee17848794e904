//! Clients for the two external systems a pass reads and mutates.
//!
//! - orchestrator (ECS): tasks, their bindings and hosting instances
//! - load balancer (ELBv2): target group membership
//!
//! Both are consumed through traits so passes can run against the AWS
//! adapters or the in-memory doubles in [`memory`].

pub mod ecs;
pub mod elb;
pub mod memory;

pub use ecs::EcsClient;
pub use elb::ElbClient;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::model::{
    InstanceDetail, InstanceRef, Target, TargetGroupEntry, TargetGroupHandle, TaskDetail, TaskRef,
};

/// Container orchestrator queries.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// All tasks currently belonging to `service` in `cluster`.
    async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<TaskRef>, ClientError>;

    /// Full detail for the given tasks.
    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[TaskRef],
    ) -> Result<Vec<TaskDetail>, ClientError>;

    /// Resolve container instances to the node ids the load balancer knows.
    async fn describe_container_instances(
        &self,
        cluster: &str,
        instances: &[InstanceRef],
    ) -> Result<Vec<InstanceDetail>, ClientError>;
}

/// Load balancer target group queries and mutations.
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Resolve a target group name. Fails with [`ClientError::NotFound`] if unknown.
    async fn resolve_target_group(&self, name: &str) -> Result<TargetGroupHandle, ClientError>;

    /// Every registered target, whatever its health state.
    async fn describe_target_health(
        &self,
        target_group: &TargetGroupHandle,
    ) -> Result<Vec<TargetGroupEntry>, ClientError>;

    async fn register_targets(
        &self,
        target_group: &TargetGroupHandle,
        targets: &[Target],
    ) -> Result<(), ClientError>;

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupHandle,
        targets: &[Target],
    ) -> Result<(), ClientError>;
}
