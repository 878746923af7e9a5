//! Print the task graph.

use std::path::Path;

use anyhow::{Context, Result};
use sitewright_build::{DepMode, SiteConfig, TaskDef, TaskGraph};

/// Run the list command.
pub fn run(config_path: &Path) -> Result<()> {
    let config = SiteConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let graph = TaskGraph::with_custom(&config.tasks).context("Invalid task configuration")?;

    let width = graph.tasks().map(|t| t.name.len()).max().unwrap_or(0);
    for task in graph.tasks() {
        println!("{}", describe(task, width));
    }

    Ok(())
}

fn describe(task: &TaskDef, width: usize) -> String {
    let mut line = format!("{:width$}", task.name, width = width);

    if !task.depends.is_empty() {
        let mode = match task.mode {
            DepMode::Parallel => "parallel",
            DepMode::Series => "series",
        };
        line.push_str(&format!("  [{}] ({})", task.depends.join(", "), mode));
    }
    if !task.description.is_empty() {
        line.push_str(&format!("  {}", task.description));
    }

    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_aggregates_with_mode() {
        let graph = TaskGraph::builtin();
        let deploy = graph.get("deploy").unwrap();

        assert_eq!(
            describe(deploy, 6),
            "deploy  [clear, build-site] (series)  Clean full build"
        );
    }

    #[test]
    fn action_tasks_have_no_dependency_list() {
        let graph = TaskGraph::builtin();
        let css = graph.get("css").unwrap();

        assert_eq!(describe(css, 3), "css  Compile and prefix the stylesheet");
    }
}
