//! In-memory orchestrator and load balancer.
//!
//! Both record every call and can be told to fail a named operation, so a
//! pass can be checked for exactly which reads and mutations it issued.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LoadBalancer, Orchestrator};
use crate::error::ClientError;
use crate::model::{
    InstanceDetail, InstanceRef, NodeId, Target, TargetGroupEntry, TargetGroupHandle, TaskDetail,
    TaskRef,
};

fn injected(operation: &'static str) -> ClientError {
    ClientError::Api {
        operation,
        message: "injected failure".to_string(),
    }
}

#[derive(Default)]
struct OrchestratorState {
    tasks: Vec<TaskDetail>,
    instances: HashMap<InstanceRef, Option<NodeId>>,
    failing: Vec<&'static str>,
    omitted: Vec<TaskRef>,
    calls: Vec<&'static str>,
}

/// Orchestrator holding one service's tasks.
#[derive(Default)]
pub struct MemoryOrchestrator {
    state: Mutex<OrchestratorState>,
}

impl MemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_instance(&self, instance: &str, node: Option<&str>) {
        let mut state = self.state.lock().await;
        state
            .instances
            .insert(InstanceRef::from(instance), node.map(NodeId::from));
    }

    pub async fn add_task(&self, task: TaskDetail) {
        self.state.lock().await.tasks.push(task);
    }

    pub async fn remove_task(&self, task: &str) {
        self.state
            .lock()
            .await
            .tasks
            .retain(|t| t.task.as_str() != task);
    }

    /// Keep listing `task` but leave it out of DescribeTasks responses.
    pub async fn omit_from_describe(&self, task: &str) {
        self.state.lock().await.omitted.push(TaskRef::from(task));
    }

    /// Fail every subsequent call to `operation` ("ListTasks", "DescribeTasks", ...).
    pub async fn fail(&self, operation: &'static str) {
        self.state.lock().await.failing.push(operation);
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.lock().await.calls.clone()
    }

    async fn enter(&self, operation: &'static str) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(operation);
        if state.failing.contains(&operation) {
            return Err(injected(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl Orchestrator for MemoryOrchestrator {
    async fn list_tasks(
        &self,
        _cluster: &str,
        _service: &str,
    ) -> Result<Vec<TaskRef>, ClientError> {
        self.enter("ListTasks").await?;
        let state = self.state.lock().await;
        Ok(state.tasks.iter().map(|t| t.task.clone()).collect())
    }

    async fn describe_tasks(
        &self,
        _cluster: &str,
        tasks: &[TaskRef],
    ) -> Result<Vec<TaskDetail>, ClientError> {
        self.enter("DescribeTasks").await?;
        let state = self.state.lock().await;
        tasks
            .iter()
            .filter(|wanted| !state.omitted.contains(*wanted))
            .map(|wanted| {
                state
                    .tasks
                    .iter()
                    .find(|t| &t.task == wanted)
                    .cloned()
                    .ok_or_else(|| ClientError::Failure {
                        operation: "DescribeTasks",
                        arn: wanted.to_string(),
                        reason: "MISSING".to_string(),
                    })
            })
            .collect()
    }

    async fn describe_container_instances(
        &self,
        _cluster: &str,
        instances: &[InstanceRef],
    ) -> Result<Vec<InstanceDetail>, ClientError> {
        self.enter("DescribeContainerInstances").await?;
        let state = self.state.lock().await;
        instances
            .iter()
            .map(|wanted| match state.instances.get(wanted) {
                Some(node) => Ok(InstanceDetail {
                    instance: wanted.clone(),
                    node: node.clone(),
                }),
                None => Err(ClientError::Failure {
                    operation: "DescribeContainerInstances",
                    arn: wanted.to_string(),
                    reason: "MISSING".to_string(),
                }),
            })
            .collect()
    }
}

/// A call issued against [`MemoryLoadBalancer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBalancerCall {
    Resolve(String),
    DescribeTargetHealth,
    Register(Vec<Target>),
    Deregister(Vec<Target>),
}

#[derive(Default)]
struct LoadBalancerState {
    groups: HashMap<String, (TargetGroupHandle, Vec<TargetGroupEntry>)>,
    failing: Vec<&'static str>,
    calls: Vec<LoadBalancerCall>,
}

/// Load balancer with named target groups.
#[derive(Default)]
pub struct MemoryLoadBalancer {
    state: Mutex<LoadBalancerState>,
}

impl MemoryLoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_target_group(&self, name: &str, entries: &[(u16, &str)]) {
        let handle = TargetGroupHandle::new(format!(
            "arn:aws:elasticloadbalancing:local:000000000000:targetgroup/{}",
            name
        ));
        let entries = entries
            .iter()
            .map(|(port, target)| TargetGroupEntry {
                port: *port,
                target: NodeId::from(*target),
                health: Some("healthy".to_string()),
            })
            .collect();
        self.state
            .lock()
            .await
            .groups
            .insert(name.to_string(), (handle, entries));
    }

    /// Fail every subsequent call to `operation` ("RegisterTargets", ...).
    pub async fn fail(&self, operation: &'static str) {
        self.state.lock().await.failing.push(operation);
    }

    pub async fn calls(&self) -> Vec<LoadBalancerCall> {
        self.state.lock().await.calls.clone()
    }

    /// Mutation calls only.
    pub async fn mutations(&self) -> Vec<LoadBalancerCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    LoadBalancerCall::Register(_) | LoadBalancerCall::Deregister(_)
                )
            })
            .collect()
    }

    /// Registered (port, target) pairs of a group, sorted.
    pub async fn registered(&self, name: &str) -> Vec<(u16, String)> {
        let state = self.state.lock().await;
        let mut out: Vec<(u16, String)> = state
            .groups
            .get(name)
            .map(|(_, entries)| {
                entries
                    .iter()
                    .map(|e| (e.port, e.target.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        out.sort();
        out
    }

    async fn enter(
        &self,
        operation: &'static str,
        call: LoadBalancerCall,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if state.failing.contains(&operation) {
            return Err(injected(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl LoadBalancer for MemoryLoadBalancer {
    async fn resolve_target_group(&self, name: &str) -> Result<TargetGroupHandle, ClientError> {
        self.enter(
            "DescribeTargetGroups",
            LoadBalancerCall::Resolve(name.to_string()),
        )
        .await?;
        let state = self.state.lock().await;
        state
            .groups
            .get(name)
            .map(|(handle, _)| handle.clone())
            .ok_or_else(|| ClientError::NotFound(name.to_string()))
    }

    async fn describe_target_health(
        &self,
        target_group: &TargetGroupHandle,
    ) -> Result<Vec<TargetGroupEntry>, ClientError> {
        self.enter(
            "DescribeTargetHealth",
            LoadBalancerCall::DescribeTargetHealth,
        )
        .await?;
        let state = self.state.lock().await;
        state
            .groups
            .values()
            .find(|(handle, _)| handle == target_group)
            .map(|(_, entries)| entries.clone())
            .ok_or_else(|| ClientError::NotFound(target_group.to_string()))
    }

    async fn register_targets(
        &self,
        target_group: &TargetGroupHandle,
        targets: &[Target],
    ) -> Result<(), ClientError> {
        self.enter(
            "RegisterTargets",
            LoadBalancerCall::Register(targets.to_vec()),
        )
        .await?;
        let mut state = self.state.lock().await;
        let (_, entries) = state
            .groups
            .values_mut()
            .find(|(handle, _)| handle == target_group)
            .ok_or_else(|| ClientError::NotFound(target_group.to_string()))?;
        for target in targets {
            if !entries
                .iter()
                .any(|e| e.port == target.port && e.target == target.id)
            {
                entries.push(TargetGroupEntry {
                    port: target.port,
                    target: target.id.clone(),
                    health: Some("initial".to_string()),
                });
            }
        }
        Ok(())
    }

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupHandle,
        targets: &[Target],
    ) -> Result<(), ClientError> {
        self.enter(
            "DeregisterTargets",
            LoadBalancerCall::Deregister(targets.to_vec()),
        )
        .await?;
        let mut state = self.state.lock().await;
        let (_, entries) = state
            .groups
            .values_mut()
            .find(|(handle, _)| handle == target_group)
            .ok_or_else(|| ClientError::NotFound(target_group.to_string()))?;
        entries.retain(|e| {
            !targets
                .iter()
                .any(|t| t.port == e.port && t.id == e.target)
        });
        Ok(())
    }
}
