//! Template load and page build.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::Value;
use rayon::prelude::*;
use sitewright_templates::{TemplateError, TemplateRegistry};
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::error::BuildError;
use crate::tasks::write_output;

/// A page scheduled for rendering.
#[derive(Debug, Clone)]
struct Page {
    name: String,
    source: PathBuf,
    output: PathBuf,
}

/// Load data, partials and layouts into a fresh registry.
pub fn load(config: &SiteConfig) -> Result<TemplateRegistry, TemplateError> {
    let mut registry = TemplateRegistry::new();
    let templates = config.templates_dir();
    let ext = config.templates.extension.as_str();

    let assets_origin = Path::new("[assets]");
    for (key, value) in [
        ("css_path", &config.assets.css_path),
        ("css_filename", &config.assets.css_filename),
        ("js_path", &config.assets.js_path),
        ("js_filename", &config.assets.js_filename),
    ] {
        // Site configuration, so trusted in attribute values.
        registry.set_data(key, Value::from_safe_string(value.clone()), assets_origin);
    }
    let data_files = registry.load_data_dir(&config.data_dir())?;

    registry.set_default_layout(config.default_layout());

    let mut partials = registry.load_partials(&templates.join("components"), Some(ext))?;
    partials += registry.load_partials(&templates.join("pages"), Some(ext))?;
    partials += registry.load_partials(&templates.join("includes"), None)?;

    let layouts = registry.load_layouts(&templates.join("layouts"), ext)?;

    tracing::info!(
        "Loaded {} data files, {} partials, {} layouts, {} helpers",
        data_files,
        partials,
        layouts,
        registry.helper_names().len()
    );
    Ok(registry)
}

/// Render pages into the output directory. Returns the written files.
pub fn build(config: &SiteConfig, registry: &TemplateRegistry) -> Result<Vec<PathBuf>, BuildError> {
    let pages = discover_pages(config)?;

    let results: Vec<Result<PathBuf, BuildError>> = pages
        .par_iter()
        .map(|page| render_page(registry, page))
        .collect();

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        written.push(result?);
    }

    tracing::info!("Rendered {} pages", written.len());
    Ok(written)
}

fn render_page(registry: &TemplateRegistry, page: &Page) -> Result<PathBuf, BuildError> {
    let source = fs::read_to_string(&page.source).map_err(|e| TemplateError::Read {
        path: page.source.display().to_string(),
        message: e.to_string(),
    })?;

    let html = registry.render_page(&page.name, &source)?;
    write_output(&page.output, &html)?;
    Ok(page.output.clone())
}

/// Find page templates, apply the configured selection and flatten output
/// paths. Pages are returned in path order.
fn discover_pages(config: &SiteConfig) -> Result<Vec<Page>, TemplateError> {
    let pages_dir = config.templates_dir().join("pages");
    if !pages_dir.is_dir() {
        tracing::warn!("No pages directory at {}", pages_dir.display());
        return Ok(Vec::new());
    }

    let ext = config.templates.extension.as_str();
    let output_dir = config.output_dir();
    let selected = &config.templates.pages;

    let mut sources: Vec<PathBuf> = WalkDir::new(&pages_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect();
    sources.sort();

    let mut pages = Vec::new();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    for source in sources {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !selected.is_empty() && !selected.contains(&stem) {
            continue;
        }

        let output = output_dir.join(format!("{}.{}", stem, config.templates.output_extension));
        if let Some(first) = claimed.get(&output) {
            return Err(TemplateError::OutputCollision {
                first: first.display().to_string(),
                second: source.display().to_string(),
                output: output.display().to_string(),
            });
        }
        claimed.insert(output.clone(), source.clone());

        let name = source
            .strip_prefix(&pages_dir)
            .unwrap_or(&source)
            .display()
            .to_string();
        pages.push(Page {
            name,
            source,
            output,
        });
    }

    for name in selected {
        if !pages.iter().any(|p| p.output.file_stem().is_some_and(|s| s == name.as_str())) {
            tracing::warn!("Configured page '{}' was not found", name);
        }
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn site() -> (tempfile::TempDir, SiteConfig) {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        let t = config.templates_dir();

        write(
            &t,
            "layouts/standard.jinja",
            "<html><head><link href=\"/{{ css_path }}{{ css_filename }}\"></head><body>{{ body }}</body></html>",
        );
        write(&t, "components/button.jinja", "<button>{{ label }}</button>");
        write(&t, "includes/spritesheet.svg", "<svg></svg>");
        write(
            &t,
            "pages/index.jinja",
            "---\ntitle: Home\n---\n<h1>{{ title }}</h1>{% with label = site.cta %}{% include 'button' %}{% endwith %}",
        );
        write(&t, "pages/blog/post.jinja", "---\nlayout: false\n---\n<article>{{ page.layout }}</article>");
        write(&config.data_dir(), "site.json", r#"{"cta": "Go"}"#);

        (temp, config)
    }

    #[test]
    fn load_registers_everything() {
        let (_temp, config) = site();
        let registry = load(&config).unwrap();

        assert!(registry.has_partial("button"));
        assert!(registry.has_partial("index"));
        assert!(registry.has_partial("spritesheet"));
        assert!(registry.has_layout("standard"));
        assert!(registry.helper_names().iter().any(|h| h == "if_eq"));
        assert_eq!(
            registry.data("css_path").map(|v| v.to_string()),
            Some("assets/css/".to_string())
        );
        assert!(registry.data("site").is_some());
    }

    #[test]
    fn load_tolerates_empty_project() {
        let temp = tempdir().unwrap();
        let registry = load(&SiteConfig::with_root(temp.path())).unwrap();

        assert_eq!(registry.partial_count(), 0);
        assert_eq!(registry.layout_count(), 0);
    }

    #[test]
    fn build_renders_and_flattens_pages() {
        let (temp, config) = site();
        let registry = load(&config).unwrap();

        let mut written = build(&config, &registry).unwrap();
        written.sort();

        let dist = temp.path().join("dist");
        assert_eq!(written, vec![dist.join("index.html"), dist.join("post.html")]);

        let index = fs::read_to_string(dist.join("index.html")).unwrap();
        assert_eq!(
            index,
            "<html><head><link href=\"/assets/css/style.css\"></head><body><h1>Home</h1><button>Go</button></body></html>"
        );

        let post = fs::read_to_string(dist.join("post.html")).unwrap();
        assert_eq!(post, "<article>False</article>");
    }

    #[test]
    fn build_honours_page_selection() {
        let (temp, mut config) = site();
        config.templates.pages = vec!["post".to_string()];
        let registry = load(&config).unwrap();

        let written = build(&config, &registry).unwrap();

        assert_eq!(written, vec![temp.path().join("dist/post.html")]);
        assert!(!temp.path().join("dist/index.html").exists());
    }

    #[test]
    fn flattened_name_collisions_are_errors() {
        let (_temp, config) = site();
        write(&config.templates_dir(), "pages/docs/index.jinja", "<p>docs</p>");
        let registry = load(&config).unwrap();

        let err = build(&config, &registry).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Template(TemplateError::OutputCollision { .. })
        ));
    }

    #[test]
    fn missing_layout_fails_the_build() {
        let (_temp, config) = site();
        write(
            &config.templates_dir(),
            "pages/about.jinja",
            "---\nlayout: nowhere\n---\nabout",
        );
        let registry = load(&config).unwrap();

        let err = build(&config, &registry).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Template(TemplateError::LayoutNotFound(name)) if name == "nowhere"
        ));
    }
}
