//! Task definitions and execution planning.
//!
//! A task has an optional action and a list of dependencies that run either
//! in parallel or in series. Planning flattens a task into stages: tasks in
//! one stage may run together, stages run in order.
//!
//! A task reached more than once runs once, at its latest required position.
//! Requested names run in series, so `plan(["css", "deploy"])` compiles the
//! stylesheet after `deploy` clears the output directory, not before.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::config::TaskSpec;
use crate::error::TaskError;

/// The work a task performs once its dependencies are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    Clear,
    Css,
    Js,
    Load,
    Build,
    Svg,
    /// Long-running; started by the caller after every other stage
    Serve,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clear => "clear",
            Self::Css => "css",
            Self::Js => "js",
            Self::Load => "load",
            Self::Build => "build",
            Self::Svg => "svg",
            Self::Serve => "serve",
        };
        f.write_str(name)
    }
}

/// How a task's dependencies are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepMode {
    #[default]
    Parallel,
    Series,
}

/// A named task.
#[derive(Debug, Clone)]
pub struct TaskDef {
    pub name: String,
    pub description: String,
    pub depends: Vec<String>,
    pub mode: DepMode,
    pub action: Option<TaskAction>,
}

impl TaskDef {
    fn action(name: &str, action: TaskAction, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            depends: Vec::new(),
            mode: DepMode::Parallel,
            action: Some(action),
        }
    }

    fn aggregate(name: &str, depends: &[&str], mode: DepMode, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            depends: depends.iter().map(|d| d.to_string()).collect(),
            mode,
            action: None,
        }
    }
}

/// A task scheduled in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub name: String,
    pub action: TaskAction,
}

/// Ordered stages of tasks; each task appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub stages: Vec<Vec<PlannedTask>>,
}

impl ExecutionPlan {
    /// Names per stage, handy for logging and assertions.
    pub fn stage_names(&self) -> Vec<Vec<&str>> {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|t| t.name.as_str()).collect())
            .collect()
    }

    pub fn contains(&self, action: TaskAction) -> bool {
        self.stages.iter().flatten().any(|t| t.action == action)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Registry of task definitions.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<String, TaskDef>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in site tasks.
    pub fn builtin() -> Self {
        let mut graph = Self::new();

        graph.insert(TaskDef::action("clear", TaskAction::Clear, "Delete the output directory"));
        graph.insert(TaskDef::action("css", TaskAction::Css, "Compile and prefix the stylesheet"));
        graph.insert(TaskDef::action("js", TaskAction::Js, "Bundle the site script"));
        graph.insert(TaskDef::action(
            "load",
            TaskAction::Load,
            "Load data, partials, layouts and helpers",
        ));
        graph.insert(TaskDef {
            depends: vec!["load".to_string()],
            ..TaskDef::action("build", TaskAction::Build, "Render pages into the output directory")
        });
        graph.insert(TaskDef::action("svg", TaskAction::Svg, "Combine icons into the sprite include"));
        graph.insert(TaskDef::action(
            "serve",
            TaskAction::Serve,
            "Serve the output directory with live reload",
        ));
        graph.insert(TaskDef::aggregate(
            "build-site",
            &["svg", "build", "css", "js"],
            DepMode::Parallel,
            "Full build",
        ));
        graph.insert(TaskDef::aggregate(
            "deploy",
            &["clear", "build-site"],
            DepMode::Series,
            "Clean full build",
        ));
        graph.insert(TaskDef::aggregate(
            "default",
            &["build-site", "serve"],
            DepMode::Series,
            "Full build, then serve",
        ));

        graph
    }

    /// Built-in tasks plus user-defined aggregates, validated.
    pub fn with_custom(specs: &BTreeMap<String, TaskSpec>) -> Result<Self, TaskError> {
        let mut graph = Self::builtin();

        for (name, spec) in specs {
            if let Some(existing) = graph.tasks.get(name) {
                if existing.action.is_some() {
                    return Err(TaskError::Redefined(name.clone()));
                }
                tracing::warn!("Task '{}' from config replaces the built-in definition", name);
            }

            let mode = if spec.series {
                DepMode::Series
            } else {
                DepMode::Parallel
            };
            graph.insert(TaskDef {
                name: name.clone(),
                description: spec.description.clone().unwrap_or_default(),
                depends: spec.depends.clone(),
                mode,
                action: None,
            });
        }

        graph.validate()?;
        Ok(graph)
    }

    pub fn insert(&mut self, task: TaskDef) {
        self.tasks.insert(task.name.clone(), task);
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    /// Tasks in name order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.values()
    }

    /// Check every dependency exists and every task has a valid plan.
    pub fn validate(&self) -> Result<(), TaskError> {
        for task in self.tasks.values() {
            for dep in &task.depends {
                if !self.tasks.contains_key(dep) {
                    return Err(TaskError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        for name in self.tasks.keys() {
            self.plan(&[name.as_str()])?;
        }

        Ok(())
    }

    /// Plan `names` to run one after another.
    pub fn plan(&self, names: &[&str]) -> Result<ExecutionPlan, TaskError> {
        let mut ordering = Ordering::default();
        let mut closures = Vec::with_capacity(names.len());
        for name in names {
            closures.push(self.constrain(name, &mut Vec::new(), &mut ordering)?);
        }
        ordering.series(&closures);

        let mut plan = ExecutionPlan::default();
        for stage in ordering.stages()? {
            let planned = stage
                .into_iter()
                .filter_map(|name| {
                    let action = self.tasks.get(&name).and_then(|t| t.action)?;
                    Some(PlannedTask { name, action })
                })
                .collect();
            plan.stages.push(planned);
        }

        Ok(plan)
    }

    /// Record the ordering constraints below `name`. Returns every action
    /// task it reaches, itself included.
    fn constrain(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
        ordering: &mut Ordering,
    ) -> Result<BTreeSet<String>, TaskError> {
        if visiting.iter().any(|v| v == name) {
            visiting.push(name.to_string());
            return Err(TaskError::Cycle(visiting.join(" -> ")));
        }

        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;

        visiting.push(name.to_string());
        let mut closures = Vec::with_capacity(task.depends.len());
        for dep in &task.depends {
            closures.push(self.constrain(dep, visiting, ordering)?);
        }
        visiting.pop();

        if task.mode == DepMode::Series {
            ordering.series(&closures);
        }

        let mut reached: BTreeSet<String> = closures.into_iter().flatten().collect();
        if task.action.is_some() {
            for dep in &reached {
                ordering.before(dep, name);
            }
            ordering.discover(name);
            reached.insert(name.to_string());
        }

        Ok(reached)
    }
}

/// "Runs before" edges between action tasks.
#[derive(Debug, Default)]
struct Ordering {
    edges: BTreeSet<(String, String)>,
    /// Action tasks in first-discovered order; orders tasks within a stage
    discovered: Vec<String>,
}

impl Ordering {
    fn discover(&mut self, name: &str) {
        if !self.discovered.iter().any(|d| d == name) {
            self.discovered.push(name.to_string());
        }
    }

    fn before(&mut self, first: &str, then: &str) {
        self.edges.insert((first.to_string(), then.to_string()));
    }

    /// Each group runs after the ones listed before it. A task that also
    /// appears in a later group only keeps that later position.
    fn series(&mut self, groups: &[BTreeSet<String>]) {
        for (i, group) in groups.iter().enumerate() {
            let later = &groups[i + 1..];
            for first in group {
                if later.iter().any(|g| g.contains(first)) {
                    continue;
                }
                for then in later.iter().flatten() {
                    if first != then {
                        self.before(first, then);
                    }
                }
            }
        }
    }

    /// Layer tasks by longest path from the ones with no prerequisites.
    fn stages(&self) -> Result<Vec<Vec<String>>, TaskError> {
        let mut pending: HashMap<&str, usize> =
            self.discovered.iter().map(|d| (d.as_str(), 0)).collect();
        for (_, then) in &self.edges {
            if let Some(count) = pending.get_mut(then.as_str()) {
                *count += 1;
            }
        }

        let mut stages = Vec::new();
        loop {
            let ready: Vec<String> = self
                .discovered
                .iter()
                .filter(|d| pending.get(d.as_str()) == Some(&0))
                .cloned()
                .collect();
            if ready.is_empty() {
                break;
            }

            for name in &ready {
                pending.remove(name.as_str());
                for (_, then) in self.edges.iter().filter(|(first, _)| first == name) {
                    if let Some(count) = pending.get_mut(then.as_str()) {
                        *count -= 1;
                    }
                }
            }
            stages.push(ready);
        }

        if !pending.is_empty() {
            let stuck: Vec<&str> = self
                .discovered
                .iter()
                .map(|d| d.as_str())
                .filter(|d| pending.contains_key(d))
                .collect();
            return Err(TaskError::OrderConflict(stuck.join(", ")));
        }

        Ok(stages)
    }
}
