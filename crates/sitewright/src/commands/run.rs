//! Run named tasks, then serve if the plan asked for it.

use std::path::Path;

use anyhow::{Context, Result};
use sitewright_build::{BuildContext, SiteConfig, TaskGraph, TaskRunner};
use sitewright_server::{watch_groups, DevServer, DevServerConfig, Rebuilder};

/// Run the run command.
pub async fn run(config_path: &Path, tasks: Vec<String>, port: Option<u16>) -> Result<()> {
    let mut config = SiteConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(port) = port {
        config.server.port = port;
        config.validate()?;
    }

    let graph = TaskGraph::with_custom(&config.tasks).context("Invalid task configuration")?;
    let runner = TaskRunner::new(graph);

    let tasks = if tasks.is_empty() {
        vec!["default".to_string()]
    } else {
        tasks
    };

    let ctx = BuildContext::new(config.clone());
    let (ctx, summary) = {
        let runner = runner.clone();
        tokio::task::spawn_blocking(move || {
            let mut ctx = ctx;
            let names: Vec<&str> = tasks.iter().map(String::as_str).collect();
            runner.run(&names, &mut ctx).map(|summary| (ctx, summary))
        })
        .await
        .context("Task runner panicked")??
    };

    tracing::info!(
        "Finished {} tasks after {}ms",
        summary.reports.len(),
        summary.duration_ms
    );

    if summary.serve {
        let server = DevServer::new(DevServerConfig::from_site(&config));
        let rebuilder = Rebuilder::new(runner, ctx, server.hub());
        server
            .with_watch(rebuilder, watch_groups(&config))
            .start()
            .await?;
    }

    Ok(())
}
