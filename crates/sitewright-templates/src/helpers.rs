//! Block helpers available to templates.
//!
//! A block helper receives two values and a pair of continuations and renders
//! exactly one of them. Helpers are exposed to templates as callables:
//!
//! ```jinja
//! {% macro active() %}class="active"{% endmacro %}
//! <a {{ if_eq(page.slug, "home", active) }} href="/">Home</a>
//! ```
//!
//! A branch may be a macro or a plain string; a missing branch renders empty.

use std::fmt;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr, Value, ValueKind};
use minijinja::{AutoEscape, Error, ErrorKind, HtmlEscape, State};

type Continuation<'a> = Box<dyn Fn() -> Result<String, Error> + 'a>;

/// The two continuations handed to a block helper.
pub struct BlockOptions<'a> {
    on_true: Continuation<'a>,
    on_false: Continuation<'a>,
}

impl<'a> BlockOptions<'a> {
    pub fn new(
        on_true: impl Fn() -> Result<String, Error> + 'a,
        on_false: impl Fn() -> Result<String, Error> + 'a,
    ) -> Self {
        Self {
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        }
    }

    /// Render the "true" branch.
    pub fn render_true(&self) -> Result<String, Error> {
        (self.on_true)()
    }

    /// Render the "false" branch.
    pub fn render_false(&self) -> Result<String, Error> {
        (self.on_false)()
    }
}

/// A helper that picks one of two continuations based on its arguments.
pub trait BlockHelper: Send + Sync {
    fn call(&self, a: &Value, b: &Value, options: &BlockOptions<'_>) -> Result<String, Error>;
}

/// Renders the true branch iff both values are strictly equal.
#[derive(Debug, Default, Clone, Copy)]
pub struct IfEq;

impl BlockHelper for IfEq {
    fn call(&self, a: &Value, b: &Value, options: &BlockOptions<'_>) -> Result<String, Error> {
        if strict_eq(a, b) {
            options.render_true()
        } else {
            options.render_false()
        }
    }
}

/// Strict equality: same kind and same value.
///
/// `1` and `"1"` differ, and so do `none` and `undefined`.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    a.kind() == b.kind() && a == b
}

/// Adapter exposing a [`BlockHelper`] as a template callable.
pub(crate) struct HelperCallable {
    name: String,
    helper: Arc<dyn BlockHelper>,
}

impl HelperCallable {
    pub(crate) fn new(name: impl Into<String>, helper: Arc<dyn BlockHelper>) -> Self {
        Self {
            name: name.into(),
            helper,
        }
    }
}

impl fmt::Debug for HelperCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperCallable")
            .field("name", &self.name)
            .finish()
    }
}

impl Object for HelperCallable {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call(self: &Arc<Self>, state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
        let (a, b, rest) = match args {
            [a, b, rest @ ..] if rest.len() <= 2 => (a, b, rest),
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!(
                        "{} expects (a, b, on_true, on_false), got {} arguments",
                        self.name,
                        args.len()
                    ),
                ))
            }
        };

        let on_true = rest.first();
        let on_false = rest.get(1);

        let options = BlockOptions::new(
            || render_branch(state, on_true),
            || render_branch(state, on_false),
        );

        self.helper
            .call(a, b, &options)
            .map(Value::from_safe_string)
    }
}

/// Render one branch: callables (macros) are invoked, strings are escaped
/// unless already safe.
fn render_branch(state: &State<'_, '_>, branch: Option<&Value>) -> Result<String, Error> {
    let Some(branch) = branch else {
        return Ok(String::new());
    };

    match branch.kind() {
        ValueKind::Undefined | ValueKind::None => Ok(String::new()),
        ValueKind::String
            if branch.is_safe() || matches!(state.auto_escape(), AutoEscape::None) =>
        {
            Ok(branch.to_string())
        }
        ValueKind::String => Ok(HtmlEscape(&branch.to_string()).to_string()),
        _ => branch.call(state, &[]).map(|v| v.to_string()),
    }
}

/// Render markdown to HTML; registered as the `markdown` filter.
pub(crate) fn markdown_filter(value: String) -> Value {
    use pulldown_cmark::{html, Options, Parser};

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(&value, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    Value::from_safe_string(html_output)
}
