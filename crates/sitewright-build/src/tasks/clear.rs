//! Removes the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::SiteConfig;

/// Errors from the clear task.
#[derive(Debug, thiserror::Error)]
pub enum ClearError {
    #[error("Refusing to clear {output}: {reason}")]
    Unsafe { output: String, reason: String },

    #[error("Failed to remove {path}: {message}")]
    Io { path: String, message: String },
}

fn io_error(path: &Path, e: impl std::fmt::Display) -> ClearError {
    ClearError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Delete the output directory. Returns the files that were removed.
pub fn run(config: &SiteConfig) -> Result<Vec<PathBuf>, ClearError> {
    let output = config.output_dir();
    if !output.exists() {
        tracing::debug!("{} does not exist, nothing to clear", output.display());
        return Ok(Vec::new());
    }

    let output = output.canonicalize().map_err(|e| io_error(&output, e))?;
    check_safe(config, &output)?;

    let mut removed = Vec::new();
    for entry in WalkDir::new(&output) {
        let entry = entry.map_err(|e| io_error(&output, e))?;
        if entry.file_type().is_file() {
            removed.push(entry.into_path());
        }
    }

    fs::remove_dir_all(&output).map_err(|e| io_error(&output, e))?;
    tracing::info!("Removed {} ({} files)", output.display(), removed.len());
    Ok(removed)
}

fn check_safe(config: &SiteConfig, output: &Path) -> Result<(), ClearError> {
    let unsafe_output = |reason: &str| ClearError::Unsafe {
        output: output.display().to_string(),
        reason: reason.to_string(),
    };

    let root = config
        .root
        .canonicalize()
        .map_err(|e| io_error(&config.root, e))?;
    let source = config
        .source_dir()
        .canonicalize()
        .unwrap_or_else(|_| root.join(&config.paths.source));

    if output == root {
        return Err(unsafe_output("it is the project root"));
    }
    if root.starts_with(output) {
        return Err(unsafe_output("it contains the project root"));
    }
    if source.starts_with(output) {
        return Err(unsafe_output("it contains the source directory"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn project() -> (tempfile::TempDir, SiteConfig) {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        fs::create_dir_all(config.source_dir().join("_css")).unwrap();
        fs::write(config.source_dir().join("_css/index.scss"), "a{}").unwrap();
        (temp, config)
    }

    #[test]
    fn removes_every_output_file() {
        let (_temp, config) = project();
        let out = config.output_dir();
        fs::create_dir_all(out.join("assets/css")).unwrap();
        fs::write(out.join("index.html"), "<p>hi</p>").unwrap();
        fs::write(out.join("assets/css/style.css"), "a{}").unwrap();

        let removed = run(&config).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!out.exists());
        assert!(config.source_dir().join("_css/index.scss").exists());
    }

    #[test]
    fn missing_output_is_a_no_op() {
        let (_temp, config) = project();
        assert!(run(&config).unwrap().is_empty());
    }

    #[test]
    fn refuses_to_clear_the_root() {
        let (_temp, mut config) = project();
        config.paths.output = PathBuf::from(".");

        let err = run(&config).unwrap_err();
        assert!(matches!(err, ClearError::Unsafe { .. }));
        assert!(config.source_dir().exists());
    }

    #[test]
    fn refuses_output_containing_source() {
        let (_temp, mut config) = project();
        config.paths.source = PathBuf::from("site/src");
        config.paths.output = PathBuf::from("site");
        fs::create_dir_all(config.source_dir()).unwrap();

        let err = run(&config).unwrap_err();
        assert!(matches!(err, ClearError::Unsafe { reason, .. } if reason.contains("source")));
        assert!(config.source_dir().exists());
    }
}
