//! tgsync: target group sync for ECS services with dynamic host ports.
//!
//! Runs as an AWS Lambda function subscribed to ECS task state change
//! events. Each relevant event triggers one pass that:
//! - lists the service's tasks and resolves their host port bindings
//! - reads the target group's registered targets
//! - registers new ports and deregisters ports no longer bound

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lambda_runtime::{LambdaEvent, service_fn};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tgsync::clients::{EcsClient, ElbClient};
use tgsync::{Config, LifecycleEvent, SyncAgent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tgsync=info,aws=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .init();

    let config = Config::parse();
    info!(
        "Starting tgsync: service {} -> target group {}",
        config.ecs_service, config.target_group
    );

    let sdk_config = aws_config::load_from_env().await;
    let agent = Arc::new(SyncAgent::new(
        &config,
        Arc::new(EcsClient::new(&sdk_config)),
        Arc::new(ElbClient::new(&sdk_config)),
    ));

    match &config.event_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read event file {}", path.display()))?;
            let event: LifecycleEvent =
                serde_json::from_str(&raw).context("Failed to parse lifecycle event")?;
            let outcome = agent.handle_event(&event).await.map_err(|e| {
                error!("Reconciliation failed: {}", e);
                e
            })?;
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(())
        }
        None => lambda_runtime::run(service_fn(move |event: LambdaEvent<LifecycleEvent>| {
            let agent = Arc::clone(&agent);
            async move {
                agent.handle_event(&event.payload).await.map_err(|e| {
                    error!("Reconciliation failed: {}", e);
                    lambda_runtime::Error::from(e)
                })
            }
        }))
        .await
        .map_err(|e| anyhow::anyhow!(e)),
    }
}
