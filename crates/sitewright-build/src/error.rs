//! Error types shared by tasks and the runner.

use sitewright_bundle::BundleError;
use sitewright_templates::TemplateError;

use crate::tasks::clear::ClearError;
use crate::tasks::css::CssError;
use crate::tasks::svg::SvgError;

/// Failure inside a single task action.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Css(#[from] CssError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Svg(#[from] SvgError),

    #[error(transparent)]
    Clear(#[from] ClearError),

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Templates must be loaded before pages can be built")]
    TemplatesNotLoaded,
}

/// Errors from planning or running tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Task dependency cycle: {0}")]
    Cycle(String),

    #[error("Tasks must run both before and after each other: {0}")]
    OrderConflict(String),

    #[error("Task '{0}' runs an action and cannot be redefined")]
    Redefined(String),

    #[error("Task '{task}' failed: {source}")]
    Failed {
        task: String,
        #[source]
        source: BuildError,
    },
}
