//! Template registry: partials, layouts, helpers and site data.
//!
//! Names share one namespace per kind. Registering a name twice replaces the
//! earlier entry and logs a warning with both sources, so the last
//! registration wins.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Value};

use crate::frontmatter::{split_front_matter, FrontMatter, FrontMatterError, LayoutChoice};
use crate::helpers::{markdown_filter, BlockHelper, HelperCallable, IfEq};

/// Errors that can occur while loading or rendering templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Front matter error in {path}: {source}")]
    FrontMatter {
        path: String,
        #[source]
        source: FrontMatterError,
    },

    #[error("Invalid data file {path}: {message}")]
    Data { path: String, message: String },

    #[error("Template error in {name}: {message}")]
    Render { name: String, message: String },

    #[error("Layout not found: {0}")]
    LayoutNotFound(String),

    #[error("Layout cycle detected: {0}")]
    LayoutCycle(String),

    #[error("Pages {first} and {second} both flatten to {output}")]
    OutputCollision {
        first: String,
        second: String,
        output: String,
    },
}

/// A registered layout.
#[derive(Debug, Clone)]
struct LayoutEntry {
    origin: PathBuf,
    front_matter: FrontMatter,
}

/// Registry of everything a page render needs.
#[derive(Clone)]
pub struct TemplateRegistry {
    env: Environment<'static>,
    data: BTreeMap<String, Value>,
    data_sources: HashMap<String, PathBuf>,
    partials: HashMap<String, PathBuf>,
    layouts: HashMap<String, LayoutEntry>,
    helpers: Vec<String>,
    default_layout: Option<String>,
}

impl TemplateRegistry {
    /// Create an empty registry with the built-in helpers installed.
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Every template renders HTML, whatever its file name.
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_filter("markdown", markdown_filter);

        let mut registry = Self {
            env,
            data: BTreeMap::new(),
            data_sources: HashMap::new(),
            partials: HashMap::new(),
            layouts: HashMap::new(),
            helpers: Vec::new(),
            default_layout: None,
        };
        registry.register_helper("if_eq", Arc::new(IfEq));
        registry
    }

    /// Set a site-wide data value.
    pub fn set_data(&mut self, key: &str, value: Value, origin: &Path) {
        if let Some(previous) = self.data_sources.get(key) {
            tracing::warn!(
                "Data key '{}' from {} overrides {}",
                key,
                origin.display(),
                previous.display()
            );
        }
        self.data.insert(key.to_string(), value);
        self.data_sources.insert(key.to_string(), origin.to_path_buf());
    }

    /// Load a JSON data file, keyed by its file stem.
    pub fn load_data_file(&mut self, path: &Path) -> Result<String, TemplateError> {
        let content = read(path)?;
        let json: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| TemplateError::Data {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let key = file_stem(path);
        self.set_data(&key, Value::from_serialize(&json), path);
        Ok(key)
    }

    /// Register a partial under `name`.
    pub fn register_partial(
        &mut self,
        name: &str,
        source: String,
        origin: &Path,
    ) -> Result<(), TemplateError> {
        if let Some(previous) = self.partials.get(name) {
            tracing::warn!(
                "Partial '{}' from {} overrides {}",
                name,
                origin.display(),
                previous.display()
            );
        }

        self.env
            .add_template_owned(name.to_string(), source)
            .map_err(|e| render_error(name, e))?;
        self.partials.insert(name.to_string(), origin.to_path_buf());
        Ok(())
    }

    /// Register a layout under `name`. Layouts may carry front matter.
    pub fn register_layout(
        &mut self,
        name: &str,
        source: &str,
        origin: &Path,
    ) -> Result<(), TemplateError> {
        let (front_matter, body) =
            split_front_matter(source).map_err(|e| TemplateError::FrontMatter {
                path: origin.display().to_string(),
                source: e,
            })?;

        if let Some(previous) = self.layouts.get(name) {
            tracing::warn!(
                "Layout '{}' from {} overrides {}",
                name,
                origin.display(),
                previous.origin.display()
            );
        }

        let key = layout_key(name);
        self.env
            .add_template_owned(key.clone(), body.to_string())
            .map_err(|e| render_error(&key, e))?;
        self.layouts.insert(
            name.to_string(),
            LayoutEntry {
                origin: origin.to_path_buf(),
                front_matter,
            },
        );
        Ok(())
    }

    /// Register a block helper callable as `name(a, b, on_true, on_false)`.
    pub fn register_helper(&mut self, name: &str, helper: Arc<dyn BlockHelper>) {
        if self.helpers.iter().any(|h| h == name) {
            tracing::warn!("Helper '{}' registered twice; keeping the latest", name);
        } else {
            self.helpers.push(name.to_string());
        }
        self.env.add_global(
            name.to_string(),
            Value::from_object(HelperCallable::new(name, helper)),
        );
    }

    /// Layout applied to pages whose front matter names none.
    pub fn set_default_layout(&mut self, layout: Option<String>) {
        self.default_layout = layout;
    }

    /// Register every file in `dir` (non-recursive) as a partial.
    ///
    /// With `extension` set, other files are skipped. Files are visited in
    /// name order. A missing directory registers nothing.
    pub fn load_partials(
        &mut self,
        dir: &Path,
        extension: Option<&str>,
    ) -> Result<usize, TemplateError> {
        let mut count = 0;
        for path in list_files(dir, extension)? {
            let source = read(&path)?;
            self.register_partial(&file_stem(&path), source, &path)?;
            count += 1;
        }
        Ok(count)
    }

    /// Register every matching file in `dir` (non-recursive) as a layout.
    pub fn load_layouts(&mut self, dir: &Path, extension: &str) -> Result<usize, TemplateError> {
        let mut count = 0;
        for path in list_files(dir, Some(extension))? {
            let source = read(&path)?;
            self.register_layout(&file_stem(&path), &source, &path)?;
            count += 1;
        }
        Ok(count)
    }

    /// Load every `*.json` file in `dir` (non-recursive) as site data.
    pub fn load_data_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let mut count = 0;
        for path in list_files(dir, Some("json"))? {
            self.load_data_file(&path)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn has_partial(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    pub fn has_layout(&self, name: &str) -> bool {
        self.layouts.contains_key(name)
    }

    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn helper_names(&self) -> &[String] {
        &self.helpers
    }

    pub fn partial_count(&self) -> usize {
        self.partials.len()
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    /// Render a page template and wrap it in its layout chain.
    ///
    /// The render context is the site data overlaid by the page's front
    /// matter keys; the front matter is also available as `page`. Layouts
    /// receive the rendered content as `body`.
    pub fn render_page(&self, name: &str, source: &str) -> Result<String, TemplateError> {
        let (front_matter, body) =
            split_front_matter(source).map_err(|e| TemplateError::FrontMatter {
                path: name.to_string(),
                source: e,
            })?;

        let mut ctx = self.data.clone();
        let page = Value::from_serialize(&front_matter.fields);
        for (key, value) in &front_matter.fields {
            if let Some(key) = key.as_str() {
                ctx.insert(key.to_string(), Value::from_serialize(value));
            }
        }
        ctx.insert("page".to_string(), page);

        let mut html = self
            .env
            .render_named_str(name, body, Value::from_serialize(&ctx))
            .map_err(|e| render_error(name, e))?;

        let mut next = match front_matter.layout() {
            LayoutChoice::Default => self.default_layout.clone(),
            LayoutChoice::Named(layout) => Some(layout),
            LayoutChoice::Disabled => None,
        };
        let mut seen: Vec<String> = Vec::new();

        while let Some(layout) = next {
            if seen.contains(&layout) {
                seen.push(layout);
                return Err(TemplateError::LayoutCycle(seen.join(" -> ")));
            }

            let entry = self
                .layouts
                .get(&layout)
                .ok_or_else(|| TemplateError::LayoutNotFound(layout.clone()))?;

            ctx.insert("body".to_string(), Value::from_safe_string(html));

            let key = layout_key(&layout);
            let tmpl = self
                .env
                .get_template(&key)
                .map_err(|e| render_error(&key, e))?;
            html = tmpl
                .render(Value::from_serialize(&ctx))
                .map_err(|e| render_error(&key, e))?;

            // Nested layouts are opt-in; the default never applies to a layout.
            next = match entry.front_matter.layout() {
                LayoutChoice::Named(parent) => Some(parent),
                LayoutChoice::Default | LayoutChoice::Disabled => None,
            };
            seen.push(layout);
        }

        Ok(html)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn layout_key(name: &str) -> String {
    format!("layouts/{}", name)
}

fn render_error(name: &str, err: minijinja::Error) -> TemplateError {
    TemplateError::Render {
        name: name.to_string(),
        message: err.to_string(),
    }
}

fn read(path: &Path) -> Result<String, TemplateError> {
    fs::read_to_string(path).map_err(|e| TemplateError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

/// Files directly inside `dir`, sorted by name.
fn list_files(dir: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>, TemplateError> {
    if !dir.exists() {
        tracing::debug!("Skipping missing template directory {}", dir.display());
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| TemplateError::Read {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| match extension {
            Some(ext) => p.extension().and_then(|e| e.to_str()) == Some(ext),
            None => true,
        })
        .collect();
    files.sort();

    Ok(files)
}
