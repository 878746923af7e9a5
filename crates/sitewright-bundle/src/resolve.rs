//! Module specifier resolution.
//!
//! Relative specifiers resolve against the requiring file; bare specifiers
//! try each search path in order, then `node_modules` directories walking up
//! from the requiring file.

use std::fs;
use std::path::{Path, PathBuf};

/// Resolves `require` specifiers to files on disk.
#[derive(Debug, Clone)]
pub struct Resolver {
    search_paths: Vec<PathBuf>,
    extensions: Vec<&'static str>,
}

impl Resolver {
    /// Create a resolver with the given bare-specifier search paths.
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            extensions: vec!["js", "json"],
        }
    }

    /// Resolve `specifier` as required from the file `from`.
    pub fn resolve(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let base_dir = from.parent().unwrap_or(Path::new("."));

        if is_relative(specifier) {
            return self.resolve_path(&base_dir.join(specifier));
        }

        if Path::new(specifier).is_absolute() {
            return self.resolve_path(Path::new(specifier));
        }

        for dir in &self.search_paths {
            if let Some(found) = self.resolve_path(&dir.join(specifier)) {
                return Some(found);
            }
        }

        for ancestor in base_dir.ancestors() {
            let candidate = ancestor.join("node_modules").join(specifier);
            if let Some(found) = self.resolve_path(&candidate) {
                return Some(found);
            }
        }

        None
    }

    /// Try `path` as a file, with each extension, then as a directory.
    fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(normalize(path));
        }

        for ext in &self.extensions {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(normalize(&candidate));
            }
        }

        if path.is_dir() {
            if let Some(main) = package_main(path) {
                if let Some(found) = self.resolve_file_or_ext(&path.join(main)) {
                    return Some(found);
                }
            }
            return self.resolve_file_or_ext(&path.join("index"));
        }

        None
    }

    fn resolve_file_or_ext(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(normalize(path));
        }
        self.extensions.iter().find_map(|ext| {
            let candidate = path.with_extension(ext);
            candidate.is_file().then(|| normalize(&candidate))
        })
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// The `main` entry of a package directory, if it declares one.
fn package_main(dir: &Path) -> Option<String> {
    let manifest = fs::read_to_string(dir.join("package.json")).ok()?;
    let json: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    json.get("main")?.as_str().map(str::to_string)
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
