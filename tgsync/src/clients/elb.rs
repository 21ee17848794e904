//! Load balancer adapter over the ELBv2 API.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_elasticloadbalancingv2::Client;
use aws_sdk_elasticloadbalancingv2::error::DisplayErrorContext;
use aws_sdk_elasticloadbalancingv2::types::{TargetDescription, TargetHealthDescription};
use tracing::debug;

use super::LoadBalancer;
use crate::error::ClientError;
use crate::model::{NodeId, Target, TargetGroupEntry, TargetGroupHandle};

/// ELBv2 client.
#[derive(Clone)]
pub struct ElbClient {
    inner: Client,
}

impl ElbClient {
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

fn descriptions(targets: &[Target]) -> Vec<TargetDescription> {
    targets
        .iter()
        .map(|t| {
            TargetDescription::builder()
                .id(t.id.as_str())
                .port(i32::from(t.port))
                .build()
        })
        .collect()
}

/// Registered entry of one health description. Id and port are required.
fn entry(
    operation: &'static str,
    description: &TargetHealthDescription,
) -> Result<TargetGroupEntry, ClientError> {
    let target = description
        .target()
        .ok_or_else(|| ClientError::malformed(operation, "description without Target"))?;
    let id = target
        .id()
        .ok_or_else(|| ClientError::malformed(operation, "target without Id"))?;
    let port = target.port().ok_or_else(|| {
        ClientError::malformed(operation, format!("target {} without port", id))
    })?;
    let port = u16::try_from(port).map_err(|_| {
        ClientError::malformed(operation, format!("port {} out of range", port))
    })?;

    Ok(TargetGroupEntry {
        port,
        target: NodeId::new(id),
        health: description
            .target_health()
            .and_then(|h| h.state())
            .map(|s| s.as_str().to_string()),
    })
}

#[async_trait]
impl LoadBalancer for ElbClient {
    async fn resolve_target_group(&self, name: &str) -> Result<TargetGroupHandle, ClientError> {
        const OP: &str = "DescribeTargetGroups";
        let out = match self.inner.describe_target_groups().names(name).send().await {
            Ok(out) => out,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_target_group_not_found_exception()) =>
            {
                return Err(ClientError::NotFound(name.to_string()));
            }
            Err(e) => return Err(api_error(OP, e)),
        };

        let arn = out
            .target_groups()
            .first()
            .ok_or_else(|| ClientError::NotFound(name.to_string()))?
            .target_group_arn()
            .ok_or_else(|| ClientError::malformed(OP, "target group without TargetGroupArn"))?;

        Ok(TargetGroupHandle::new(arn))
    }

    async fn describe_target_health(
        &self,
        target_group: &TargetGroupHandle,
    ) -> Result<Vec<TargetGroupEntry>, ClientError> {
        const OP: &str = "DescribeTargetHealth";
        let out = self
            .inner
            .describe_target_health()
            .target_group_arn(target_group.as_str())
            .send()
            .await
            .map_err(|e| api_error(OP, e))?;

        let entries = out
            .target_health_descriptions()
            .iter()
            .map(|d| entry(OP, d))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("{} has {} registered targets", target_group, entries.len());
        Ok(entries)
    }

    async fn register_targets(
        &self,
        target_group: &TargetGroupHandle,
        targets: &[Target],
    ) -> Result<(), ClientError> {
        const OP: &str = "RegisterTargets";
        self.inner
            .register_targets()
            .target_group_arn(target_group.as_str())
            .set_targets(Some(descriptions(targets)))
            .send()
            .await
            .map_err(|e| api_error(OP, e))?;
        Ok(())
    }

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupHandle,
        targets: &[Target],
    ) -> Result<(), ClientError> {
        const OP: &str = "DeregisterTargets";
        self.inner
            .deregister_targets()
            .target_group_arn(target_group.as_str())
            .set_targets(Some(descriptions(targets)))
            .send()
            .await
            .map_err(|e| api_error(OP, e))?;
        Ok(())
    }
}
