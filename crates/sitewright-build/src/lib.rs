//! Asset pipeline for sitewright.
//!
//! Stylesheet, script, sprite and page tasks, the task graph that composes
//! them, and a runner that executes plans stage by stage.

pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod runner;
pub mod tasks;

pub use config::{ConfigError, SiteConfig, TaskSpec};
pub use context::BuildContext;
pub use error::{BuildError, TaskError};
pub use graph::{DepMode, ExecutionPlan, PlannedTask, TaskAction, TaskDef, TaskGraph};
pub use runner::{RunSummary, TaskReport, TaskRunner};
pub use tasks::TaskOutput;
