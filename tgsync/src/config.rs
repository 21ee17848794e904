//! Command line and environment configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

use crate::collector::DEFAULT_CONCURRENCY;

/// Keeps an ELBv2 target group in sync with the dynamic host ports of an ECS service
#[derive(Parser, Debug, Clone)]
#[command(name = "tgsync", version, about)]
pub struct Config {
    /// ECS service whose task state changes trigger reconciliation
    #[arg(long, env = "ECS_SERVICE", value_parser = NonEmptyStringValueParser::new())]
    pub ecs_service: String,

    /// Name of the target group to reconcile
    #[arg(long, env = "TARGET_GROUP", value_parser = NonEmptyStringValueParser::new())]
    pub target_group: String,

    /// Container whose host ports are registered (defaults to the task's first container)
    #[arg(long, env = "CONTAINER_NAME")]
    pub container_name: Option<String>,

    /// Maximum number of tasks resolved concurrently
    #[arg(long, env = "TGSYNC_MAX_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub max_concurrency: NonZeroUsize,

    /// Run a single pass for the event in this JSON file instead of serving the Lambda runtime
    #[arg(long)]
    pub event_file: Option<PathBuf>,
}
