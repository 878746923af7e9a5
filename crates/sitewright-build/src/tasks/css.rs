//! Stylesheet pipeline: Sass compile, vendor prefixing, write.

use std::path::{Path, PathBuf};

use crate::config::SiteConfig;
use crate::error::BuildError;
use crate::tasks::write_output;

/// Errors from the stylesheet pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CssError {
    #[error("Stylesheet entry not found: {0}")]
    MissingEntry(String),

    #[error("Sass compile error: {0}")]
    Compile(String),

    #[error("Invalid browser query '{query}': {message}")]
    Browsers { query: String, message: String },

    #[error("CSS parse error: {0}")]
    Parse(String),

    #[error("CSS print error: {0}")]
    Print(String),
}

/// Compile a Sass entry file. `load_paths` are searched for imports.
pub fn compile_scss(entry: &Path, load_paths: &[PathBuf]) -> Result<String, CssError> {
    let mut options = grass::Options::default();
    for path in load_paths {
        options = options.load_path(path.as_path());
    }

    grass::from_path(entry, &options).map_err(|e| CssError::Compile(e.to_string()))
}

/// Add vendor prefixes for the given browserslist queries.
pub fn autoprefix(css: &str, browsers: &[String], minify: bool) -> Result<String, CssError> {
    use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
    use lightningcss::targets::{Browsers, Targets};

    let browsers =
        Browsers::from_browserslist(browsers.iter().map(String::as_str)).map_err(|e| {
            CssError::Browsers {
                query: browsers.join(", "),
                message: e.to_string(),
            }
        })?;

    let targets = Targets {
        browsers,
        ..Targets::default()
    };

    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| CssError::Parse(e.to_string()))?;

    stylesheet
        .minify(MinifyOptions {
            targets,
            ..Default::default()
        })
        .map_err(|e| CssError::Parse(e.to_string()))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..Default::default()
        })
        .map_err(|e| CssError::Print(e.to_string()))?;

    Ok(printed.code)
}

/// Compile the configured entry and write it to the stylesheet output path.
pub fn run(config: &SiteConfig) -> Result<PathBuf, BuildError> {
    let entry = config.css_dir().join(&config.css.entry);
    if !entry.is_file() {
        return Err(CssError::MissingEntry(entry.display().to_string()).into());
    }

    let compiled = compile_scss(&entry, &[config.css_dir()])?;
    let prefixed = autoprefix(&compiled, &config.css.browsers, config.css.minify)?;

    let output = config.css_output();
    write_output(&output, &prefixed)?;

    tracing::debug!("Wrote {}", output.display());
    Ok(output)
}
