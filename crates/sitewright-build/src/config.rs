//! Site configuration (site.toml).
//!
//! Every field has a default matching the conventional project layout, so a
//! project without a config file builds as-is.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Project root; all relative paths resolve against it
    #[serde(skip)]
    pub root: PathBuf,

    pub paths: PathsConfig,
    pub assets: AssetPaths,
    pub css: CssConfig,
    pub js: JsConfig,
    pub templates: TemplatesConfig,
    pub svg: SvgConfig,
    pub server: ServerConfig,

    /// Extra aggregate tasks
    pub tasks: BTreeMap<String, TaskSpec>,
}

/// Source and output roots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Where the compiled stylesheet and script land inside the output dir.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetPaths {
    pub css_path: String,
    pub css_filename: String,
    pub js_path: String,
    pub js_filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CssConfig {
    /// Entry stylesheet, relative to the CSS source dir
    pub entry: String,
    /// Browserslist queries used for vendor prefixing
    pub browsers: Vec<String>,
    pub minify: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JsConfig {
    /// Entry module, relative to the JS source dir
    pub entry: String,
    /// Bare-specifier search dirs, relative to the source dir
    pub module_paths: Vec<PathBuf>,
    /// Syntax target such as `es2015` or `chrome58`; empty skips lowering
    pub target: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Extension of component, page and layout templates
    pub extension: String,
    /// Layout applied to pages that name none; empty disables it
    pub default_layout: String,
    /// Page stems to render; empty renders every page
    pub pages: Vec<String>,
    pub output_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SvgConfig {
    /// Sprite basename inside the includes dir
    pub sprite_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Static file server port
    pub port: u16,
    /// Live-reload server port
    pub reload_port: u16,
    /// Open a browser once the server is up
    pub open: bool,
}

/// A user-defined aggregate task.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskSpec {
    pub depends: Vec<String>,
    /// Run dependencies one after another instead of in parallel
    pub series: bool,
    pub description: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            paths: PathsConfig::default(),
            assets: AssetPaths::default(),
            css: CssConfig::default(),
            js: JsConfig::default(),
            templates: TemplatesConfig::default(),
            svg: SvgConfig::default(),
            server: ServerConfig::default(),
            tasks: BTreeMap::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            output: PathBuf::from("dist"),
        }
    }
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            css_path: "assets/css/".to_string(),
            css_filename: "style.css".to_string(),
            js_path: "assets/js/".to_string(),
            js_filename: "script.js".to_string(),
        }
    }
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            entry: "index.scss".to_string(),
            browsers: vec!["last 2 versions".to_string()],
            minify: false,
        }
    }
}

impl Default for JsConfig {
    fn default() -> Self {
        Self {
            entry: "index.js".to_string(),
            module_paths: vec![
                PathBuf::from("_js/modules"),
                PathBuf::from("_js/helpers"),
                PathBuf::from("_data"),
            ],
            target: "es2015".to_string(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            extension: "jinja".to_string(),
            default_layout: "standard".to_string(),
            pages: Vec::new(),
            output_extension: "html".to_string(),
        }
    }
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            sprite_name: "spritesheet".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            reload_port: 3000,
            open: false,
        }
    }
}

impl SiteConfig {
    /// Defaults rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `path` if it exists, otherwise use defaults.
    ///
    /// The project root is the directory containing `path`. A file that
    /// exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::with_root(root));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut config: SiteConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.root = root;
        config.validate()?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings that would make tasks clobber each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.source == self.paths.output {
            return Err(ConfigError::Invalid(
                "paths.source and paths.output must differ".to_string(),
            ));
        }
        if self.assets.css_filename.is_empty() || self.assets.js_filename.is_empty() {
            return Err(ConfigError::Invalid(
                "asset filenames must not be empty".to_string(),
            ));
        }
        if self.server.port == self.server.reload_port {
            return Err(ConfigError::Invalid(
                "server.port and server.reload_port must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.paths.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.paths.output)
    }

    pub fn css_dir(&self) -> PathBuf {
        self.source_dir().join("_css")
    }

    pub fn js_dir(&self) -> PathBuf {
        self.source_dir().join("_js")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.source_dir().join("_templates")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.source_dir().join("_icons")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.source_dir().join("_data")
    }

    /// Bare-specifier search dirs, resolved against the source dir.
    pub fn module_paths(&self) -> Vec<PathBuf> {
        let source = self.source_dir();
        self.js.module_paths.iter().map(|p| source.join(p)).collect()
    }

    /// Syntax target for script lowering, if one is configured.
    pub fn js_target(&self) -> Option<&str> {
        let target = self.js.target.trim();
        (!target.is_empty()).then_some(target)
    }

    /// Final path of the compiled stylesheet.
    pub fn css_output(&self) -> PathBuf {
        self.output_dir()
            .join(&self.assets.css_path)
            .join(&self.assets.css_filename)
    }

    /// Final path of the script bundle.
    pub fn js_output(&self) -> PathBuf {
        self.output_dir()
            .join(&self.assets.js_path)
            .join(&self.assets.js_filename)
    }

    /// Sprite location; it feeds the next template load.
    pub fn sprite_output(&self) -> PathBuf {
        self.templates_dir()
            .join("includes")
            .join(format!("{}.svg", self.svg.sprite_name))
    }

    /// Default layout, if one is configured.
    pub fn default_layout(&self) -> Option<String> {
        let layout = self.templates.default_layout.trim();
        (!layout.is_empty()).then(|| layout.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_conventional_layout() {
        let config = SiteConfig::with_root("/site");

        assert_eq!(
            config.css_output(),
            PathBuf::from("/site/dist/assets/css/style.css")
        );
        assert_eq!(
            config.js_output(),
            PathBuf::from("/site/dist/assets/js/script.js")
        );
        assert_eq!(
            config.sprite_output(),
            PathBuf::from("/site/src/_templates/includes/spritesheet.svg")
        );
        assert_eq!(config.server.port, 8888);
        assert!(!config.server.open);
        assert_eq!(config.default_layout().as_deref(), Some("standard"));
    }

    #[test]
    fn missing_file_uses_defaults_rooted_at_parent() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::load(&temp.path().join("site.toml")).unwrap();

        assert_eq!(config.root, temp.path());
        assert_eq!(config.assets, AssetPaths::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("site.toml");
        fs::write(
            &path,
            r#"
[paths]
output = "public"

[server]
port = 9000

[templates]
default_layout = ""

[tasks.assets]
depends = ["css", "js"]
"#,
        )
        .unwrap();

        let config = SiteConfig::load(&path).unwrap();

        assert_eq!(config.output_dir(), temp.path().join("public"));
        assert_eq!(config.paths.source, PathBuf::from("src"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.reload_port, 3000);
        assert_eq!(config.default_layout(), None);
        assert_eq!(config.tasks["assets"].depends, vec!["css", "js"]);
        assert!(!config.tasks["assets"].series);
    }

    #[test]
    fn module_paths_follow_the_source_dir() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("site.toml");
        fs::write(&path, "[paths]\nsource = \"site\"\n\n[js]\ntarget = \"\"\n").unwrap();

        let config = SiteConfig::load(&path).unwrap();

        assert_eq!(
            config.module_paths(),
            vec![
                temp.path().join("site/_js/modules"),
                temp.path().join("site/_js/helpers"),
                temp.path().join("site/_data"),
            ]
        );
        assert_eq!(config.js_target(), None);
        assert_eq!(SiteConfig::default().js_target(), Some("es2015"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("site.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = SiteConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_clashing_ports() {
        let mut config = SiteConfig::default();
        config.server.reload_port = config.server.port;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
