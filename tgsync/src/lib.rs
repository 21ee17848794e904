//! tgsync: keeps an ELBv2 target group in sync with the dynamic host ports
//! of an ECS service, one stateless pass per task state change event.

pub mod agent;
pub mod clients;
pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod reconciler;

pub use agent::{PassOutcome, SyncAgent};
pub use config::Config;
pub use error::{ClientError, Mutation, SyncError};
pub use event::{LifecycleEvent, TaskStatus, should_reconcile};
