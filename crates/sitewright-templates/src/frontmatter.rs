//! Front matter extraction for page and layout templates.

use serde_yaml::{Mapping, Value};

/// YAML front matter attached to a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Raw key/value pairs, exposed to templates as-is
    pub fields: Mapping,
}

/// Which layout a template asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutChoice {
    /// No `layout` key: use the registry default
    Default,
    /// `layout: name`
    Named(String),
    /// `layout: false` or `layout: null`
    Disabled,
}

impl FrontMatter {
    /// Resolve the `layout` key.
    pub fn layout(&self) -> LayoutChoice {
        match self.fields.get("layout") {
            None => LayoutChoice::Default,
            Some(Value::String(name)) if !name.is_empty() => LayoutChoice::Named(name.clone()),
            Some(Value::Bool(true)) => LayoutChoice::Default,
            Some(_) => LayoutChoice::Disabled,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split front matter from a template source.
///
/// Returns the parsed front matter and the template body that follows it.
/// Sources without a leading `---` fence come back untouched.
pub fn split_front_matter(source: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((FrontMatter::default(), source));
    }

    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontMatterError::Unclosed);
    };

    let yaml_content = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    // The closing fence may be followed by the rest of its line.
    let body = match remaining.find('\n') {
        Some(pos) if remaining[..pos].trim().is_empty() => &remaining[pos + 1..],
        None if remaining.trim().is_empty() => "",
        _ => remaining,
    };

    if yaml_content.is_empty() {
        return Ok((FrontMatter::default(), body));
    }

    let value: Value = serde_yaml::from_str(yaml_content)
        .map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?;

    let fields = match value {
        Value::Mapping(map) => map,
        Value::Null => Mapping::new(),
        _ => return Err(FrontMatterError::NotAMapping),
    };

    Ok((FrontMatter { fields }, body))
}

/// Errors that can occur when parsing front matter.
#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("Unclosed front matter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in front matter: {0}")]
    InvalidYaml(String),

    #[error("Front matter must be a mapping of keys to values")]
    NotAMapping,
}
