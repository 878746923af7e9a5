//! Syntax lowering to an older ECMAScript target.
//!
//! Runs before module lowering, so newer syntax (`**`, `??`, `?.`, object
//! spread and so on) is rewritten for the configured browsers while
//! `import`/`export` are left for [`crate::esm`].

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::traits::BundleError;

/// Extensions whose sources are lowered.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// A parsed syntax target such as `es2015` or `chrome58,firefox60`.
pub struct SyntaxTarget {
    target: String,
    options: TransformOptions,
}

impl SyntaxTarget {
    pub fn new(target: &str) -> Result<Self, BundleError> {
        let options =
            TransformOptions::from_target(target).map_err(|message| BundleError::Target {
                target: target.to_string(),
                message,
            })?;

        Ok(Self {
            target: target.to_string(),
            options,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether files with this extension are lowered.
    pub fn handles(&self, extension: &str) -> bool {
        SCRIPT_EXTENSIONS.contains(&extension)
    }

    /// Rewrite `source` for this target and print it back out.
    pub fn lower(&self, source: &str, path: &Path) -> Result<String, BundleError> {
        let allocator = Allocator::default();
        let module = Parser::new(&allocator, source, SourceType::mjs()).parse();

        let parsed = if module.panicked || !module.errors.is_empty() {
            let script = Parser::new(&allocator, source, SourceType::cjs()).parse();
            if script.panicked || !script.errors.is_empty() {
                return Err(BundleError::Parse {
                    path: path.display().to_string(),
                    message: join_errors(module.errors.iter()),
                });
            }
            script
        } else {
            module
        };

        let mut program = parsed.program;
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let ret = Transformer::new(&allocator, path, &self.options)
            .build_with_scoping(scoping, &mut program);
        if !ret.errors.is_empty() {
            return Err(BundleError::Transform {
                path: path.display().to_string(),
                message: join_errors(ret.errors.iter()),
            });
        }

        tracing::trace!("Lowered {} to {}", path.display(), self.target);
        Ok(Codegen::new().build(&program).code)
    }
}

fn join_errors<E: ToString>(errors: impl Iterator<Item = E>) -> String {
    errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> String {
        SyntaxTarget::new("es2015")
            .unwrap()
            .lower(source, Path::new("test.js"))
            .unwrap()
    }

    #[test]
    fn lowers_exponent_and_nullish_operators() {
        let out = lower("export const f = (a, b) => (a ?? 1) ** b;\n");

        assert!(out.contains("Math.pow"));
        assert!(!out.contains("??"));
        assert!(!out.contains("**"));
        assert!(out.contains("export const f"));
    }

    #[test]
    fn keeps_commonjs_scripts_parseable() {
        let out = lower("var a = require('./a');\nmodule.exports = a?.b;\n");

        assert!(out.contains("require(\"./a\")"));
        assert!(!out.contains("?."));
    }

    #[test]
    fn rejects_unknown_targets() {
        let err = SyntaxTarget::new("netscape4").err().unwrap();
        assert!(matches!(err, BundleError::Target { target, .. } if target == "netscape4"));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = SyntaxTarget::new("es2015")
            .unwrap()
            .lower("let = = ;", Path::new("broken.js"))
            .unwrap_err();
        assert!(matches!(err, BundleError::Parse { path, .. } if path == "broken.js"));
    }

    #[test]
    fn only_scripts_are_lowered() {
        let target = SyntaxTarget::new("es2015").unwrap();
        assert!(target.handles("mjs"));
        assert!(!target.handles("json"));
    }
}
