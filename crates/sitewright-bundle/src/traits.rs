//! Trait definitions for module transpilers.

use std::path::Path;

/// Errors that can occur while bundling.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Cannot resolve '{specifier}' from {from}")]
    Unresolved { specifier: String, from: String },

    #[error("No transpiler handles {0}")]
    UnsupportedModule(String),

    #[error("Invalid JSON module {path}: {message}")]
    Json { path: String, message: String },

    #[error("Unknown syntax target '{target}': {message}")]
    Target { target: String, message: String },

    #[error("Failed to lower {path}: {message}")]
    Transform { path: String, message: String },
}

/// Turns one module's source into CommonJS the runtime can execute.
pub trait Transpiler: Send + Sync {
    /// Transpiler identifier (e.g., "es-modules")
    fn name(&self) -> &'static str;

    /// File extensions this transpiler handles
    fn extensions(&self) -> &[&'static str];

    /// Transpile `source`, read from `path`, into a CommonJS module body.
    fn transpile(&self, source: &str, path: &Path) -> Result<String, BundleError>;
}
