//! State collector - builds the live host port map of a service from ECS.

use std::num::NonZeroUsize;
use std::slice;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, warn};

use crate::clients::Orchestrator;
use crate::error::{ClientError, Result, SyncError};
use crate::model::{LiveSet, NodeId, PortBinding, TaskRef};

/// Default number of tasks resolved concurrently.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(8).unwrap();

/// Collects the live port bindings of a service.
pub struct StateCollector {
    orchestrator: Arc<dyn Orchestrator>,
    container_name: Option<String>,
    concurrency: NonZeroUsize,
}

impl StateCollector {
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            orchestrator,
            container_name: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Use the bindings of this container instead of the task's first one.
    pub fn with_container_name(mut self, name: Option<String>) -> Self {
        self.container_name = name;
        self
    }

    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Map every live host port of `service` to the node hosting it.
    ///
    /// Any failed lookup aborts the whole collection.
    pub async fn collect_live_bindings(&self, cluster: &str, service: &str) -> Result<LiveSet> {
        info!("Listing tasks of service {}", service);
        let tasks = self
            .orchestrator
            .list_tasks(cluster, service)
            .await
            .map_err(SyncError::UpstreamQuery)?;
        info!("Service {} has {} tasks: {:?}", service, tasks.len(), tasks);

        // buffered() keeps list order so collisions resolve the same way every run
        let per_task: Vec<Vec<PortBinding>> = stream::iter(&tasks)
            .map(|task| self.resolve_task(cluster, task))
            .buffered(self.concurrency.get())
            .try_collect()
            .await?;

        let mut live = LiveSet::new();
        for binding in per_task.into_iter().flatten() {
            let port = binding.host_port;
            let node = binding.node.clone();
            if let Some(previous) = live.insert(binding)
                && previous != node
            {
                warn!(
                    "Host port {} is bound on both {} and {}; keeping {}",
                    port, previous, node, node
                );
            }
        }

        info!("Live host ports: {:?}", live);
        Ok(live)
    }

    /// Bindings of one task, resolved to load balancer node ids.
    async fn resolve_task(&self, cluster: &str, task: &TaskRef) -> Result<Vec<PortBinding>> {
        let detail = self
            .orchestrator
            .describe_tasks(cluster, slice::from_ref(task))
            .await
            .map_err(SyncError::UpstreamQuery)?
            .into_iter()
            .find(|d| &d.task == task)
            .ok_or_else(|| {
                SyncError::UpstreamQuery(ClientError::malformed(
                    "DescribeTasks",
                    format!("task {} missing from response", task),
                ))
            })?;

        let Some(container) = detail.select_container(self.container_name.as_deref()) else {
            debug!("Task {} has no matching container, skipping", task);
            return Ok(Vec::new());
        };
        if container.host_ports.is_empty() {
            debug!("Task {} has no host port bindings yet", task);
            return Ok(Vec::new());
        }
        let ports = container.host_ports.clone();

        let instance = detail.instance.ok_or_else(|| {
            SyncError::UpstreamQuery(ClientError::malformed(
                "DescribeTasks",
                format!("task {} has host bindings but no container instance", task),
            ))
        })?;

        let node: NodeId = self
            .orchestrator
            .describe_container_instances(cluster, slice::from_ref(&instance))
            .await
            .map_err(SyncError::UpstreamQuery)?
            .into_iter()
            .find(|i| i.instance == instance)
            .and_then(|i| i.node)
            .ok_or_else(|| {
                SyncError::UpstreamQuery(ClientError::malformed(
                    "DescribeContainerInstances",
                    format!("no EC2 instance id for {}", instance),
                ))
            })?;

        debug!("Task {} on {} binds {:?}", task, node, ports);
        Ok(ports
            .into_iter()
            .map(|host_port| PortBinding {
                host_port,
                node: node.clone(),
            })
            .collect())
    }
}
