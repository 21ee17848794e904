//! Orchestrator adapter over the ECS API.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecs::Client;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::Failure;
use tracing::debug;

use super::Orchestrator;
use crate::error::ClientError;
use crate::model::{ContainerDetail, InstanceDetail, InstanceRef, NodeId, TaskDetail, TaskRef};

/// DescribeTasks and DescribeContainerInstances accept at most 100 ids.
const DESCRIBE_BATCH: usize = 100;

/// ECS client.
#[derive(Clone)]
pub struct EcsClient {
    inner: Client,
}

impl EcsClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            inner: Client::new(config),
        }
    }
}

fn api_error<E: std::error::Error>(operation: &'static str, err: E) -> ClientError {
    ClientError::Api {
        operation,
        message: DisplayErrorContext(&err).to_string(),
    }
}

fn check_failures(operation: &'static str, failures: &[Failure]) -> Result<(), ClientError> {
    match failures.first() {
        Some(failure) => Err(ClientError::Failure {
            operation,
            arn: failure.arn().unwrap_or("unknown").to_string(),
            reason: failure.reason().unwrap_or("unknown").to_string(),
        }),
        None => Ok(()),
    }
}

fn host_port(operation: &'static str, port: i32) -> Result<u16, ClientError> {
    u16::try_from(port)
        .map_err(|_| ClientError::malformed(operation, format!("host port {} out of range", port)))
}

#[async_trait]
impl Orchestrator for EcsClient {
    async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<TaskRef>, ClientError> {
        let mut tasks = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let out = self
                .inner
                .list_tasks()
                .cluster(cluster)
                .service_name(service)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("ListTasks", e))?;

            tasks.extend(out.task_arns().iter().map(|arn| TaskRef::new(arn.as_str())));

            match out.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!("ListTasks {}/{}: {} tasks", cluster, service, tasks.len());
        Ok(tasks)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[TaskRef],
    ) -> Result<Vec<TaskDetail>, ClientError> {
        const OP: &str = "DescribeTasks";
        let mut details = Vec::with_capacity(tasks.len());

        for chunk in tasks.chunks(DESCRIBE_BATCH) {
            let out = self
                .inner
                .describe_tasks()
                .cluster(cluster)
                .set_tasks(Some(chunk.iter().map(|t| t.to_string()).collect()))
                .send()
                .await
                .map_err(|e| api_error(OP, e))?;

            check_failures(OP, out.failures())?;

            for task in out.tasks() {
                let arn = task
                    .task_arn()
                    .ok_or_else(|| ClientError::malformed(OP, "task without taskArn"))?;

                let mut containers = Vec::with_capacity(task.containers().len());
                for container in task.containers() {
                    let host_ports = container
                        .network_bindings()
                        .iter()
                        .filter_map(|b| b.host_port())
                        .map(|p| host_port(OP, p))
                        .collect::<Result<Vec<_>, _>>()?;
                    containers.push(ContainerDetail {
                        name: container.name().unwrap_or_default().to_string(),
                        host_ports,
                    });
                }

                details.push(TaskDetail {
                    task: TaskRef::new(arn),
                    instance: task.container_instance_arn().map(InstanceRef::new),
                    containers,
                });
            }
        }

        Ok(details)
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        instances: &[InstanceRef],
    ) -> Result<Vec<InstanceDetail>, ClientError> {
        const OP: &str = "DescribeContainerInstances";
        let mut details = Vec::with_capacity(instances.len());

        for chunk in instances.chunks(DESCRIBE_BATCH) {
            let out = self
                .inner
                .describe_container_instances()
                .cluster(cluster)
                .set_container_instances(Some(chunk.iter().map(|i| i.to_string()).collect()))
                .send()
                .await
                .map_err(|e| api_error(OP, e))?;

            check_failures(OP, out.failures())?;

            for ci in out.container_instances() {
                let arn = ci.container_instance_arn().ok_or_else(|| {
                    ClientError::malformed(OP, "container instance without containerInstanceArn")
                })?;
                details.push(InstanceDetail {
                    instance: InstanceRef::new(arn),
                    node: ci.ec2_instance_id().map(NodeId::new),
                });
            }
        }

        Ok(details)
    }
}
