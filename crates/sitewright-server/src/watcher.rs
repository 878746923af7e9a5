//! File watching for task reruns.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sitewright_build::SiteConfig;
use tokio::sync::mpsc as async_mpsc;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// A directory tree whose changes rerun one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchGroup {
    pub name: String,
    pub root: PathBuf,
    /// Only these extensions trigger; `None` accepts any file
    pub extensions: Option<Vec<String>>,
    pub task: String,
}

impl WatchGroup {
    fn matches(&self, path: &Path) -> bool {
        if !path.starts_with(&self.root) {
            return false;
        }
        match &self.extensions {
            None => true,
            Some(exts) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| exts.iter().any(|x| x == ext)),
        }
    }
}

/// A debounced change for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub group: String,
    pub task: String,
    pub paths: Vec<PathBuf>,
}

fn group(name: &str, root: PathBuf, extensions: Option<&[&str]>, task: &str) -> WatchGroup {
    WatchGroup {
        name: name.to_string(),
        root,
        extensions: extensions.map(|e| e.iter().map(|x| x.to_string()).collect()),
        task: task.to_string(),
    }
}

/// The four source watchers: stylesheets, scripts, templates and icons.
pub fn watch_groups(config: &SiteConfig) -> Vec<WatchGroup> {
    vec![
        group("css", config.css_dir(), Some(&["scss", "sass", "css"]), "css"),
        group("js", config.js_dir(), None, "js"),
        group("templates", config.templates_dir(), None, "build"),
        group("icons", config.icons_dir(), Some(&["svg"]), "svg"),
    ]
}

/// Watches every group root and reports debounced changes per group.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching. Groups whose root does not exist are skipped.
    ///
    /// Events arriving within the debounce window of each other are merged,
    /// and each affected group is reported once.
    pub fn new(
        groups: Vec<WatchGroup>,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), notify::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })?;

        let mut active = Vec::new();
        for mut group in groups {
            if !group.root.exists() {
                tracing::warn!(
                    "Not watching {} for '{}': directory does not exist",
                    group.root.display(),
                    group.name
                );
                continue;
            }
            // Notify reports absolute paths.
            if let Ok(root) = group.root.canonicalize() {
                group.root = root;
            }
            watcher.watch(&group.root, RecursiveMode::Recursive)?;
            tracing::debug!("Watching {} -> '{}'", group.root.display(), group.task);
            active.push(group);
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut batch = vec![first];
                while let Ok(event) = sync_rx.recv_timeout(DEBOUNCE) {
                    batch.push(event);
                }

                for event in classify(&active, &batch) {
                    if async_tx.blocking_send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Group a batch of notify events by watch group, in group order.
fn classify(groups: &[WatchGroup], events: &[notify::Event]) -> Vec<WatchEvent> {
    groups
        .iter()
        .filter_map(|group| {
            let paths: BTreeSet<PathBuf> = events
                .iter()
                .filter(|e| is_change(&e.kind))
                .flat_map(|e| e.paths.iter())
                .filter(|p| group.matches(p))
                .cloned()
                .collect();

            (!paths.is_empty()).then(|| WatchEvent {
                group: group.name.clone(),
                task: group.task.clone(),
                paths: paths.into_iter().collect(),
            })
        })
        .collect()
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn default_groups_map_to_tasks() {
        let groups = watch_groups(&SiteConfig::with_root("/site"));
        let pairs: Vec<(&str, &str)> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.task.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("css", "css"),
                ("js", "js"),
                ("templates", "build"),
                ("icons", "svg")
            ]
        );
    }

    #[test]
    fn batches_collapse_per_group() {
        let groups = watch_groups(&SiteConfig::with_root("/site"));
        let events = vec![
            event(EventKind::Modify(ModifyKind::Any), "/site/src/_css/a.scss"),
            event(EventKind::Modify(ModifyKind::Any), "/site/src/_css/a.scss"),
            event(EventKind::Create(CreateKind::File), "/site/src/_css/_b.scss"),
            event(EventKind::Modify(ModifyKind::Any), "/site/src/_icons/star.svg"),
        ];

        let classified = classify(&groups, &events);

        assert_eq!(classified.len(), 2);
        assert_eq!(classified[0].task, "css");
        assert_eq!(classified[0].paths.len(), 2);
        assert_eq!(classified[1].task, "svg");
    }

    #[test]
    fn ignores_unrelated_files_and_access_events() {
        let groups = watch_groups(&SiteConfig::with_root("/site"));
        let events = vec![
            event(EventKind::Modify(ModifyKind::Any), "/site/src/_css/notes.txt"),
            event(EventKind::Access(notify::event::AccessKind::Any), "/site/src/_js/a.js"),
            event(EventKind::Modify(ModifyKind::Any), "/site/dist/index.html"),
        ];

        assert!(classify(&groups, &events).is_empty());
    }

    #[tokio::test]
    async fn reports_file_changes() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        fs::create_dir_all(config.js_dir()).unwrap();

        let (watcher, mut rx) = FileWatcher::new(watch_groups(&config)).unwrap();

        // Give the backend time to register.
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(config.js_dir().join("index.js"), "console.log(1);").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        let event = event
            .expect("timeout waiting for file watch event")
            .expect("channel should not be closed");
        assert_eq!(event.task, "js");
    }
}
