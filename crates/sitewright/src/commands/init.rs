//! Scaffold a new site.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Files written by `init`, relative to the project root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("src/_css/index.scss", DEFAULT_SCSS),
    ("src/_css/_variables.scss", DEFAULT_VARIABLES),
    ("src/_js/index.js", DEFAULT_JS),
    ("src/_js/modules/greeting.js", DEFAULT_MODULE),
    ("src/_templates/layouts/standard.jinja", DEFAULT_LAYOUT),
    ("src/_templates/pages/index.jinja", DEFAULT_INDEX),
    ("src/_templates/components/nav.jinja", DEFAULT_NAV),
    ("src/_icons/check.svg", DEFAULT_ICON),
    ("src/_data/site.json", DEFAULT_DATA),
];

/// Directories created even when empty.
const DIRS: &[&str] = &["src/_templates/includes", "src/_js/helpers"];

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing sitewright...");

    let root = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let written = scaffold(&root, config_path, yes)?;
    if written.is_empty() {
        tracing::warn!("Nothing written; files already exist. Use --yes to overwrite.");
        return Ok(());
    }

    for path in &written {
        tracing::info!("Created {}", path.display());
    }
    tracing::info!("Initialization complete!");
    tracing::info!("Run 'sitewright' to build and serve the site.");

    Ok(())
}

/// Write the starter files under `root`. Existing files are kept unless
/// `overwrite` is set. Returns the files written.
fn scaffold(root: &Path, config_path: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for dir in DIRS {
        let dir = root.join(dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let files = SCAFFOLD
        .iter()
        .map(|(rel, contents)| (root.join(rel), *contents))
        .chain(std::iter::once((config_path.to_path_buf(), DEFAULT_CONFIG)));

    for (path, contents) in files {
        if path.exists() && !overwrite {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# Sitewright configuration

[paths]
source = "src"
output = "dist"

[assets]
css_path = "assets/css/"
css_filename = "style.css"
js_path = "assets/js/"
js_filename = "script.js"

[css]
entry = "index.scss"
browsers = ["last 2 versions"]
minify = false

[templates]
extension = "jinja"
default_layout = "standard"

[server]
port = 8888
reload_port = 3000
open = false

# Extra aggregate tasks:
# [tasks.assets]
# depends = ["css", "js"]
"#;

const DEFAULT_VARIABLES: &str = r#"$text: #1d1d1f;
$accent: #0b6bcb;
$gap: 1rem;
"#;

const DEFAULT_SCSS: &str = r#"@import 'variables';

body {
  margin: 0;
  color: $text;
  font-family: system-ui, sans-serif;
}

nav {
  display: flex;
  gap: $gap;
  user-select: none;

  a {
    color: $accent;
  }
}

.icon {
  width: 1em;
  height: 1em;
}
"#;

const DEFAULT_JS: &str = r#"import { greet } from 'greeting';

document.addEventListener('DOMContentLoaded', () => {
  greet(document.querySelector('[data-greeting]'));
});
"#;

const DEFAULT_MODULE: &str = r#"export function greet(el) {
  if (el) {
    el.textContent = 'Hello from sitewright';
  }
}
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title | default(site.name) }}</title>
  <link rel="stylesheet" href="/{{ css_path }}{{ css_filename }}">
</head>
<body>
  {% include 'spritesheet' ignore missing %}
  {% include 'nav' %}
  <main>{{ body }}</main>
  <script src="/{{ js_path }}{{ js_filename }}"></script>
</body>
</html>
"#;

const DEFAULT_INDEX: &str = r##"---
title: Home
section: home
---
{% macro current() %}You are here{% endmacro %}
<h1>{{ title }}</h1>
<p data-greeting></p>
<p>{{ if_eq(section, "home", current, "") }}</p>
<svg class="icon"><use xlink:href="#check"></use></svg>
{{ "Built with **sitewright**." | markdown }}
"##;

const DEFAULT_NAV: &str = r#"<nav>
  {% for link in site.nav %}<a href="{{ link.href }}">{{ link.label }}</a>{% endfor %}
</nav>
"#;

const DEFAULT_ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M9 16.2 4.8 12l-1.4 1.4L9 19 21 7l-1.4-1.4z"/></svg>
"#;

const DEFAULT_DATA: &str = r#"{
  "name": "My Site",
  "nav": [
    { "href": "/index.html", "label": "Home" }
  ]
}
"#;
