//! Executes task plans against a build context.

use std::time::Instant;

use rayon::prelude::*;

use crate::context::BuildContext;
use crate::error::TaskError;
use crate::graph::{ExecutionPlan, PlannedTask, TaskAction, TaskGraph};
use crate::tasks::{self, TaskOutput};

/// Outcome of one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub name: String,
    pub action: TaskAction,
    /// Files written or removed
    pub outputs: Vec<std::path::PathBuf>,
    pub duration_ms: u64,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<TaskReport>,
    /// The plan contained `serve`; the caller should start the dev server
    pub serve: bool,
    pub duration_ms: u64,
}

/// Runs named tasks from a [`TaskGraph`].
#[derive(Debug, Clone)]
pub struct TaskRunner {
    graph: TaskGraph,
}

impl TaskRunner {
    pub fn new(graph: TaskGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Plan and run `names` in order.
    pub fn run(&self, names: &[&str], ctx: &mut BuildContext) -> Result<RunSummary, TaskError> {
        let plan = self.graph.plan(names)?;
        self.execute(&plan, ctx)
    }

    /// Run a plan stage by stage. Tasks inside a stage run in parallel and
    /// see the context as it was when the stage started; their outputs are
    /// applied before the next stage. The first failing stage stops the run.
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &mut BuildContext,
    ) -> Result<RunSummary, TaskError> {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        for stage in &plan.stages {
            let (deferred, runnable): (Vec<&PlannedTask>, Vec<&PlannedTask>) = stage
                .iter()
                .partition(|task| task.action == TaskAction::Serve);
            if !deferred.is_empty() {
                summary.serve = true;
            }

            let shared: &BuildContext = ctx;
            let results: Vec<Result<(TaskReport, TaskOutput), TaskError>> = runnable
                .par_iter()
                .map(|task| run_task(task, shared))
                .collect();

            let mut first_error = None;
            for result in results {
                match result {
                    Ok((report, output)) => {
                        if let TaskOutput::Templates(registry) = output {
                            ctx.set_templates(*registry);
                        }
                        summary.reports.push(report);
                    }
                    Err(err) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        } else {
                            tracing::error!("{}", err);
                        }
                    }
                }
            }

            if let Some(err) = first_error {
                return Err(err);
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }
}

fn run_task(task: &PlannedTask, ctx: &BuildContext) -> Result<(TaskReport, TaskOutput), TaskError> {
    tracing::info!("Starting '{}'...", task.name);
    let start = Instant::now();

    let output = tasks::execute(task.action, ctx).map_err(|source| TaskError::Failed {
        task: task.name.clone(),
        source,
    })?;

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!("Finished '{}' after {}ms", task.name, duration_ms);

    let outputs = match &output {
        TaskOutput::Files(files) => files.clone(),
        TaskOutput::Templates(_) => Vec::new(),
    };

    Ok((
        TaskReport {
            name: task.name.clone(),
            action: task.action,
            outputs,
            duration_ms,
        },
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn scaffold(root: &Path) {
        write(root, "src/_css/index.scss", "$c: red;\nbody { color: $c; }\n");
        write(root, "src/_js/index.js", "export const ready = true;\n");
        write(root, "src/_icons/dot.svg", "<svg viewBox=\"0 0 2 2\"><circle r=\"1\"/></svg>");
        write(
            root,
            "src/_templates/layouts/standard.jinja",
            "<main>{{ body }}</main>",
        );
        write(
            root,
            "src/_templates/pages/index.jinja",
            "{% include 'spritesheet' ignore missing %}<p>{{ js_filename }}</p>",
        );
    }

    #[test]
    fn build_site_produces_every_artifact() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());
        let mut ctx = BuildContext::new(SiteConfig::with_root(temp.path()));

        let summary = TaskRunner::new(TaskGraph::builtin())
            .run(&["build-site"], &mut ctx)
            .unwrap();

        assert!(!summary.serve);
        let dist = temp.path().join("dist");
        assert!(dist.join("assets/css/style.css").is_file());
        assert!(dist.join("assets/js/script.js").is_file());

        // svg and load share a stage, so a first build may miss the sprite.
        let index = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(index.starts_with("<main>"));
        assert!(index.contains("<p>script.js</p>"));

        let names: Vec<&str> = summary.reports.iter().map(|r| r.name.as_str()).collect();
        for task in ["svg", "load", "css", "js", "build"] {
            assert!(names.contains(&task), "missing report for {}", task);
        }
    }

    #[test]
    fn default_defers_serve_to_the_caller() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());
        let mut ctx = BuildContext::new(SiteConfig::with_root(temp.path()));

        let summary = TaskRunner::new(TaskGraph::builtin())
            .run(&["default"], &mut ctx)
            .unwrap();

        assert!(summary.serve);
        assert!(summary.reports.iter().all(|r| r.action != TaskAction::Serve));
    }

    #[test]
    fn deploy_clears_stale_output() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());
        write(temp.path(), "dist/stale.html", "old");
        let mut ctx = BuildContext::new(SiteConfig::with_root(temp.path()));

        TaskRunner::new(TaskGraph::builtin())
            .run(&["deploy"], &mut ctx)
            .unwrap();

        assert!(!temp.path().join("dist/stale.html").exists());
        assert!(temp.path().join("dist/index.html").is_file());
    }

    #[test]
    fn failing_task_is_named_in_the_error() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());
        write(temp.path(), "src/_css/index.scss", "body { color: $missing; }\n");
        let mut ctx = BuildContext::new(SiteConfig::with_root(temp.path()));

        let err = TaskRunner::new(TaskGraph::builtin())
            .run(&["css"], &mut ctx)
            .unwrap_err();

        assert!(matches!(err, TaskError::Failed { task, .. } if task == "css"));
    }

    #[test]
    fn build_without_load_in_context_fails() {
        let temp = tempdir().unwrap();
        let mut ctx = BuildContext::new(SiteConfig::with_root(temp.path()));
        let plan = ExecutionPlan {
            stages: vec![vec![PlannedTask {
                name: "build".to_string(),
                action: TaskAction::Build,
            }]],
        };

        let err = TaskRunner::new(TaskGraph::builtin())
            .execute(&plan, &mut ctx)
            .unwrap_err();

        assert!(matches!(
            err,
            TaskError::Failed {
                source: crate::error::BuildError::TemplatesNotLoaded,
                ..
            }
        ));
    }
}
