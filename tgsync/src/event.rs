//! ECS task state change events and the relevance filter.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Prefix ECS puts in front of service-launched task groups.
const SERVICE_GROUP_PREFIX: &str = "service:";

/// ECS task and container lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Provisioning,
    Pending,
    Activating,
    Running,
    Deactivating,
    Stopping,
    Deprovisioning,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Only settled states change the set of live bindings.
    pub fn is_actionable(self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Stopped)
    }
}

/// EventBridge "ECS Task State Change" envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LifecycleEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub detail_type: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub detail: TaskStateChange,
}

/// Event detail.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateChange {
    /// `service:<name>` or `<name>`.
    pub group: String,
    pub cluster_arn: String,
    #[serde(default)]
    pub task_arn: Option<String>,
    #[serde(default)]
    pub last_status: Option<TaskStatus>,
    #[serde(default)]
    pub containers: Vec<ContainerStateChange>,
}

/// Container entry of an event detail.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateChange {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_status: Option<TaskStatus>,
}

impl LifecycleEvent {
    /// Service name with the `service:` prefix removed.
    pub fn service_name(&self) -> &str {
        normalize_service_name(&self.detail.group)
    }

    pub fn cluster(&self) -> &str {
        &self.detail.cluster_arn
    }

    pub fn task_status(&self) -> Option<TaskStatus> {
        self.detail.last_status
    }

    /// Status of the first container, which triggers reconciliation.
    pub fn container_status(&self) -> Option<TaskStatus> {
        self.detail.containers.first().and_then(|c| c.last_status)
    }
}

/// Strip one leading `service:` from a task group.
pub fn normalize_service_name(group: &str) -> &str {
    group.strip_prefix(SERVICE_GROUP_PREFIX).unwrap_or(group)
}

/// Whether an event should trigger a reconciliation pass.
pub fn should_reconcile(event: &LifecycleEvent, configured_service: &str) -> bool {
    event.service_name() == configured_service
        && event
            .container_status()
            .is_some_and(TaskStatus::is_actionable)
}
