//! Module graph walk and bundle emission.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::esm::{EsModules, JsonModules};
use crate::resolve::Resolver;
use crate::traits::{BundleError, Transpiler};
use crate::transform::SyntaxTarget;

/// Configuration for one bundle.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Entry module
    pub entry: PathBuf,

    /// Directories searched for bare specifiers, in order
    pub search_paths: Vec<PathBuf>,

    /// Module paths in bundle comments are shown relative to this
    pub base_dir: PathBuf,
}

/// A finished bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Bundled script
    pub code: String,

    /// Every module included, in id order (the entry is first)
    pub modules: Vec<PathBuf>,
}

struct ModuleRecord {
    path: PathBuf,
    code: String,
    deps: BTreeMap<String, usize>,
}

/// Bundles a module graph into a single script.
pub struct Bundler {
    config: BundleConfig,
    resolver: Resolver,
    transpilers: Vec<Box<dyn Transpiler>>,
    target: Option<SyntaxTarget>,
}

impl Bundler {
    /// Create a bundler with the default transpilers.
    pub fn new(config: BundleConfig) -> Self {
        let resolver = Resolver::new(config.search_paths.clone());
        Self {
            config,
            resolver,
            transpilers: vec![Box::new(EsModules), Box::new(JsonModules)],
            target: None,
        }
    }

    /// Lower script syntax to `target` before module lowering.
    pub fn with_target(mut self, target: SyntaxTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Add a transpiler. Later transpilers take precedence for shared extensions.
    pub fn with_transpiler(mut self, transpiler: Box<dyn Transpiler>) -> Self {
        self.transpilers.insert(0, transpiler);
        self
    }

    /// Walk the module graph from the entry and emit the bundle.
    pub fn bundle(&self) -> Result<Bundle, BundleError> {
        let entry = fs::canonicalize(&self.config.entry).map_err(|e| BundleError::Read {
            path: self.config.entry.display().to_string(),
            message: e.to_string(),
        })?;

        let mut ids: HashMap<PathBuf, usize> = HashMap::new();
        let mut records: Vec<Option<ModuleRecord>> = Vec::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        ids.insert(entry.clone(), 0);
        records.push(None);
        queue.push_back(entry);

        while let Some(path) = queue.pop_front() {
            let id = ids[&path];
            let code = self.transpile(&path)?;

            let mut deps = BTreeMap::new();
            for specifier in find_requires(&code, &path)? {
                if deps.contains_key(&specifier) {
                    continue;
                }

                let resolved = self.resolver.resolve(&specifier, &path).ok_or_else(|| {
                    BundleError::Unresolved {
                        specifier: specifier.clone(),
                        from: path.display().to_string(),
                    }
                })?;

                // Already-seen modules (including cycles) keep their id.
                let dep_id = match ids.get(&resolved) {
                    Some(existing) => *existing,
                    None => {
                        let next = records.len();
                        ids.insert(resolved.clone(), next);
                        records.push(None);
                        queue.push_back(resolved);
                        next
                    }
                };
                deps.insert(specifier, dep_id);
            }

            tracing::debug!("Bundled module {} ({})", id, path.display());
            records[id] = Some(ModuleRecord { path, code, deps });
        }

        let records: Vec<ModuleRecord> = records.into_iter().flatten().collect();
        let code = self.emit(&records);

        Ok(Bundle {
            code,
            modules: records.into_iter().map(|r| r.path).collect(),
        })
    }

    fn transpile(&self, path: &Path) -> Result<String, BundleError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let transpiler = self
            .transpilers
            .iter()
            .find(|t| t.extensions().contains(&ext))
            .ok_or_else(|| BundleError::UnsupportedModule(path.display().to_string()))?;

        let source = fs::read_to_string(path).map_err(|e| BundleError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let source = match &self.target {
            Some(target) if target.handles(ext) => target.lower(&source, path)?,
            _ => source,
        };

        transpiler.transpile(&source, path)
    }

    fn emit(&self, records: &[ModuleRecord]) -> String {
        let base_dir = fs::canonicalize(&self.config.base_dir)
            .unwrap_or_else(|_| self.config.base_dir.clone());

        let mut out = String::from(RUNTIME_PRELUDE);
        out.push_str("({\n");

        for (id, record) in records.iter().enumerate() {
            let display = record
                .path
                .strip_prefix(&base_dir)
                .unwrap_or(&record.path)
                .display()
                .to_string();
            let deps = serde_json::to_string(&record.deps).unwrap_or_else(|_| "{}".to_string());

            out.push_str(&format!(
                "{}: [function (require, module, exports) {{\n// {}\n{}\n}}, {}],\n",
                id,
                display,
                record.code.trim_end(),
                deps
            ));
        }

        out.push_str("}, 0);\n");
        out
    }
}

/// Specifiers passed to `require("...")` calls, in source order.
///
/// Only real calls count: mentions in comments and strings, member calls
/// such as `loader.require(...)` and non-literal arguments are skipped.
fn find_requires(code: &str, path: &Path) -> Result<Vec<String>, BundleError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(BundleError::Parse {
            path: path.display().to_string(),
            message,
        });
    }

    let mut calls = RequireCalls::default();
    calls.visit_program(&ret.program);
    Ok(calls.specifiers)
}

#[derive(Default)]
struct RequireCalls {
    specifiers: Vec<String>,
}

impl<'a> Visit<'a> for RequireCalls {
    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let (Expression::Identifier(callee), [Argument::StringLiteral(specifier)]) =
            (&it.callee, it.arguments.as_slice())
        {
            if callee.name.as_str() == "require" {
                self.specifiers.push(specifier.value.to_string());
            }
        }
        walk::walk_call_expression(self, it);
    }
}

/// Module runtime. The cache entry is created before a module body runs, so
/// a cycle hands back the partially initialised exports instead of recursing.
const RUNTIME_PRELUDE: &str = r#"(function (modules, entry) {
  var cache = {};
  function load(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var module = (cache[id] = { exports: {} });
    var def = modules[id];
    def[0].call(module.exports, function (name) {
      var target = def[1][name];
      if (target === undefined) throw new Error("Cannot find module '" + name + "'");
      return load(target);
    }, module, module.exports);
    return module.exports;
  }
  load(entry);
})"#;
