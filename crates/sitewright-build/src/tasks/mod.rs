//! Task actions. Each one is a plain function over the build context.

pub mod clear;
pub mod css;
pub mod js;
pub mod pages;
pub mod svg;

use std::fs;
use std::path::{Path, PathBuf};

use sitewright_templates::TemplateRegistry;

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::graph::TaskAction;

/// What an action hands back to the runner.
pub enum TaskOutput {
    /// Files written (or removed, for `clear`)
    Files(Vec<PathBuf>),
    /// A freshly loaded registry for later stages
    Templates(Box<TemplateRegistry>),
}

/// Run one action.
pub fn execute(action: TaskAction, ctx: &BuildContext) -> Result<TaskOutput, BuildError> {
    let config = ctx.config();

    match action {
        TaskAction::Clear => Ok(TaskOutput::Files(clear::run(config)?)),
        TaskAction::Css => Ok(TaskOutput::Files(vec![css::run(config)?])),
        TaskAction::Js => Ok(TaskOutput::Files(vec![js::run(config)?])),
        TaskAction::Svg => Ok(TaskOutput::Files(vec![svg::run(config)?])),
        TaskAction::Load => Ok(TaskOutput::Templates(Box::new(pages::load(config)?))),
        TaskAction::Build => {
            let registry = ctx.templates().ok_or(BuildError::TemplatesNotLoaded)?;
            Ok(TaskOutput::Files(pages::build(config, registry)?))
        }
        // Started by the caller once every other stage is done.
        TaskAction::Serve => Ok(TaskOutput::Files(Vec::new())),
    }
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: &str) -> Result<(), BuildError> {
    let write_error = |e: std::io::Error| BuildError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, contents).map_err(write_error)
}
