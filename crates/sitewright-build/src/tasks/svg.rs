//! Icon sprite: minify every icon and combine them into one inline `<svg>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::SiteConfig;
use crate::error::BuildError;
use crate::tasks::write_output;

/// Errors from the sprite task.
#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("{0} has no <svg> root element")]
    MissingRoot(String),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
}

static XML_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\?xml[^>]*\?>").expect("Invalid xml declaration regex"));

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").expect("Invalid doctype regex"));

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex"));

static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<metadata\b[^>]*?(?:/>|>.*?</metadata>)").expect("Invalid metadata regex")
});

// Elements from drawing-editor namespaces, self-closing or paired.
static EDITOR_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<(?:sodipodi|inkscape):[\w-]+\b[^>]*?(?:/>|>.*?</(?:sodipodi|inkscape):[\w-]+>)",
    )
    .expect("Invalid editor element regex")
});

static EDITOR_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+(?:xmlns:)?(?:sodipodi|inkscape)(?::[\w-]+)?\s*=\s*(?:"[^"]*"|'[^']*')"#)
        .expect("Invalid editor attribute regex")
});

static BETWEEN_TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("Invalid whitespace regex"));

static ROOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<svg\b([^>]*?)/?>(?:(.*)</svg>)?").expect("Invalid svg root regex")
});

static VIEWBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bviewBox\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid viewBox regex")
});

static ASPECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bpreserveAspectRatio\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid preserveAspectRatio regex")
});

const SPRITE_OPEN: &str =
    r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#;

/// Strip markup that does not affect rendering.
pub fn minify_svg(source: &str) -> String {
    let svg = XML_DECL_RE.replace_all(source, "");
    let svg = DOCTYPE_RE.replace_all(&svg, "");
    let svg = COMMENT_RE.replace_all(&svg, "");
    let svg = METADATA_RE.replace_all(&svg, "");
    let svg = EDITOR_ELEMENT_RE.replace_all(&svg, "");
    let svg = EDITOR_ATTR_RE.replace_all(&svg, "");
    let svg = BETWEEN_TAGS_RE.replace_all(&svg, "><");
    svg.trim().to_string()
}

/// Turn one minified icon into a `<symbol>` with the given id.
fn symbol(id: &str, svg: &str) -> Result<String, SvgError> {
    let caps = ROOT_RE
        .captures(svg)
        .ok_or_else(|| SvgError::MissingRoot(id.to_string()))?;
    let attrs = caps.get(1).map_or("", |m| m.as_str());
    let inner = caps.get(2).map_or("", |m| m.as_str());

    let mut out = format!(r#"<symbol id="{}""#, escape_attr(id));
    for (name, re) in [("viewBox", &*VIEWBOX_RE), ("preserveAspectRatio", &*ASPECT_RE)] {
        if let Some(value) = attr_value(re, attrs) {
            out.push_str(&format!(r#" {}="{}""#, name, escape_attr(value)));
        }
    }
    out.push('>');
    out.push_str(inner.trim());
    out.push_str("</symbol>");
    Ok(out)
}

/// Escape a value for a double-quoted attribute.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn attr_value<'a>(re: &Regex, attrs: &'a str) -> Option<&'a str> {
    let caps = re.captures(attrs)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Combine `(id, svg)` pairs into one sprite. Icons are emitted in id order.
pub fn build_sprite(icons: &[(String, String)]) -> Result<String, SvgError> {
    let mut sorted: Vec<&(String, String)> = icons.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sprite = String::from(SPRITE_OPEN);
    for (id, svg) in sorted {
        sprite.push_str(&symbol(id, &minify_svg(svg))?);
    }
    sprite.push_str("</svg>");
    Ok(sprite)
}

/// Read icons from the icon directory and write the sprite include.
pub fn run(config: &SiteConfig) -> Result<PathBuf, BuildError> {
    let icons = read_icons(&config.icons_dir())?;
    let sprite = build_sprite(&icons)?;

    let output = config.sprite_output();
    write_output(&output, &sprite)?;

    tracing::debug!("Combined {} icons into {}", icons.len(), output.display());
    Ok(output)
}

fn read_icons(dir: &Path) -> Result<Vec<(String, String)>, SvgError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let read_error = |path: &Path, e: std::io::Error| SvgError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| read_error(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "svg"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let source = fs::read_to_string(&path).map_err(|e| read_error(&path, e))?;
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok::<_, SvgError>((id, source))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const EDITOR_ICON: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<!-- Generator: some editor -->
<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     viewBox="0 0 24 24" inkscape:version="1.0">
  <metadata><rdf:RDF></rdf:RDF></metadata>
  <sodipodi:namedview id="base" pagecolor="#ffffff"/>
  <path d="M0 0h24v24H0z"   inkscape:label="bg" />
</svg>
"##;

    #[test]
    fn minify_strips_editor_noise() {
        let svg = minify_svg(EDITOR_ICON);

        assert!(!svg.contains("<?xml"));
        assert!(!svg.contains("DOCTYPE"));
        assert!(!svg.contains("Generator"));
        assert!(!svg.contains("metadata"));
        assert!(!svg.contains("sodipodi"));
        assert!(!svg.contains("inkscape"));
        assert!(!svg.contains(">\n"));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"<path d="M0 0h24v24H0z" />"#));
    }

    #[test]
    fn sprite_has_one_symbol_per_icon() {
        let icons = vec![
            (
                "star".to_string(),
                r#"<svg viewBox="0 0 10 10"><path d="M1 1"/></svg>"#.to_string(),
            ),
            (
                "arrow".to_string(),
                r#"<svg viewBox="0 0 16 16" preserveAspectRatio="xMidYMid"><g><path d="M2 2"/></g></svg>"#
                    .to_string(),
            ),
        ];

        let sprite = build_sprite(&icons).unwrap();

        assert_eq!(
            sprite,
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
                r#"<symbol id="arrow" viewBox="0 0 16 16" preserveAspectRatio="xMidYMid"><g><path d="M2 2"/></g></symbol>"#,
                r#"<symbol id="star" viewBox="0 0 10 10"><path d="M1 1"/></symbol>"#,
                "</svg>"
            )
        );
    }

    #[test]
    fn sprite_is_independent_of_input_order() {
        let a = ("a".to_string(), "<svg><circle r=\"1\"/></svg>".to_string());
        let b = ("b".to_string(), "<svg><rect/></svg>".to_string());

        let forward = build_sprite(&[a.clone(), b.clone()]).unwrap();
        let backward = build_sprite(&[b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn symbol_attributes_are_escaped() {
        let icons = vec![(
            "a&\"b".to_string(),
            r#"<svg viewBox='0 0 "8" 8'><rect/></svg>"#.to_string(),
        )];

        let sprite = build_sprite(&icons).unwrap();

        assert!(sprite.contains(r#"<symbol id="a&amp;&quot;b" viewBox="0 0 &quot;8&quot; 8">"#));
    }

    #[test]
    fn icon_without_root_is_rejected() {
        let icons = vec![("broken".to_string(), "<path d=\"M0 0\"/>".to_string())];
        let err = build_sprite(&icons).unwrap_err();
        assert!(matches!(err, SvgError::MissingRoot(id) if id == "broken"));
    }

    #[test]
    fn missing_icon_dir_writes_empty_sprite() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());

        let output = run(&config).unwrap();

        assert_eq!(
            output,
            temp.path().join("src/_templates/includes/spritesheet.svg")
        );
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            format!("{}</svg>", SPRITE_OPEN)
        );
    }

    #[test]
    fn run_reads_only_top_level_svg_files() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        let icons = config.icons_dir();
        fs::create_dir_all(icons.join("nested")).unwrap();
        fs::write(icons.join("menu.svg"), "<svg viewBox=\"0 0 4 4\"><rect/></svg>").unwrap();
        fs::write(icons.join("notes.txt"), "not an icon").unwrap();
        fs::write(icons.join("nested/deep.svg"), "<svg><rect/></svg>").unwrap();

        let output = run(&config).unwrap();
        let sprite = fs::read_to_string(output).unwrap();

        assert_eq!(sprite.matches("<symbol").count(), 1);
        assert!(sprite.contains(r#"<symbol id="menu" viewBox="0 0 4 4">"#));
    }
}
