//! Reruns tasks for watch events and tells browsers what changed.

use std::sync::{Arc, Mutex};

use sitewright_build::{BuildContext, RunSummary, TaskError, TaskRunner};

use crate::livereload::{ReloadHub, ReloadMessage};
use crate::watcher::WatchEvent;

/// Shared rerun state for every watcher.
///
/// Runs go through one context mutex, so two watchers never write the output
/// tree at the same time.
#[derive(Clone)]
pub struct Rebuilder {
    runner: TaskRunner,
    ctx: Arc<Mutex<BuildContext>>,
    hub: ReloadHub,
}

impl Rebuilder {
    pub fn new(runner: TaskRunner, ctx: BuildContext, hub: ReloadHub) -> Self {
        Self {
            runner,
            ctx: Arc::new(Mutex::new(ctx)),
            hub,
        }
    }

    /// Rerun the event's task. On success the matching reload message is
    /// broadcast and returned; failures are logged and nothing is sent.
    pub async fn handle(&self, event: &WatchEvent) -> Option<ReloadMessage> {
        tracing::info!(
            "{} changed ({} files), running '{}'",
            event.group,
            event.paths.len(),
            event.task
        );

        let runner = self.runner.clone();
        let ctx = Arc::clone(&self.ctx);
        let task = event.task.clone();

        let joined = tokio::task::spawn_blocking(move || rerun(&runner, &ctx, &task)).await;

        let message = match joined {
            Ok(Ok((summary, message))) => {
                tracing::info!("Rebuilt '{}' in {}ms", event.task, summary.duration_ms);
                message
            }
            Ok(Err(e)) => {
                tracing::error!("{}", e);
                return None;
            }
            Err(e) => {
                tracing::error!("Rebuild of '{}' panicked: {}", event.task, e);
                return None;
            }
        };

        self.hub.send(message.clone());
        Some(message)
    }
}

fn rerun(
    runner: &TaskRunner,
    ctx: &Mutex<BuildContext>,
    task: &str,
) -> Result<(RunSummary, ReloadMessage), TaskError> {
    // A panicked run leaves the context usable; the next run reloads state.
    let mut ctx = ctx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let summary = runner.run(&[task], &mut ctx)?;

    let message = if task == "css" {
        let assets = &ctx.config().assets;
        ReloadMessage::Css {
            path: format!("/{}{}", assets.css_path, assets.css_filename),
        }
    } else {
        ReloadMessage::Reload
    };

    Ok((summary, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sitewright_build::{SiteConfig, TaskGraph};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn rebuilder(root: &std::path::Path) -> (Rebuilder, ReloadHub) {
        let hub = ReloadHub::new();
        let rebuilder = Rebuilder::new(
            TaskRunner::new(TaskGraph::builtin()),
            BuildContext::new(SiteConfig::with_root(root)),
            hub.clone(),
        );
        (rebuilder, hub)
    }

    fn event(group: &str, task: &str) -> WatchEvent {
        WatchEvent {
            group: group.to_string(),
            task: task.to_string(),
            paths: vec![PathBuf::from("changed")],
        }
    }

    #[tokio::test]
    async fn css_changes_hot_swap_the_stylesheet() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/_css")).unwrap();
        fs::write(temp.path().join("src/_css/index.scss"), "a { b: c; }").unwrap();
        let (rebuilder, hub) = rebuilder(temp.path());
        let mut rx = hub.subscribe();

        let message = rebuilder.handle(&event("css", "css")).await;

        let expected = ReloadMessage::Css {
            path: "/assets/css/style.css".to_string(),
        };
        assert_eq!(message, Some(expected.clone()));
        assert_eq!(rx.try_recv().unwrap(), expected);
    }

    #[tokio::test]
    async fn template_changes_reload_the_page() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("src/_templates/pages");
        fs::create_dir_all(&pages).unwrap();
        fs::write(pages.join("index.jinja"), "---\nlayout: false\n---\nhi").unwrap();
        let (rebuilder, _hub) = rebuilder(temp.path());

        let message = rebuilder.handle(&event("templates", "build")).await;

        assert_eq!(message, Some(ReloadMessage::Reload));
        assert!(temp.path().join("dist/index.html").is_file());
    }

    #[tokio::test]
    async fn failures_are_logged_and_not_broadcast() {
        let temp = tempdir().unwrap();
        let (rebuilder, hub) = rebuilder(temp.path());
        let mut rx = hub.subscribe();

        // No stylesheet entry exists.
        assert_eq!(rebuilder.handle(&event("css", "css")).await, None);
        assert!(rx.try_recv().is_err());

        // The watcher keeps working after a failure.
        fs::create_dir_all(temp.path().join("src/_css")).unwrap();
        fs::write(temp.path().join("src/_css/index.scss"), "a { b: c; }").unwrap();
        assert!(rebuilder.handle(&event("css", "css")).await.is_some());
    }
}
