//! Development server with live reload for sitewright.
//!
//! Serves the output directory twice: plain on the static port, and with a
//! live-reload client injected on the reload port. File watchers rerun the
//! matching task and notify connected browsers.

pub mod livereload;
pub mod rebuild;
pub mod server;
pub mod watcher;

pub use livereload::{client_script, inject_script, ReloadHub, ReloadMessage};
pub use rebuild::Rebuilder;
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{watch_groups, FileWatcher, WatchEvent, WatchGroup};
