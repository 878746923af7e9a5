//! ES module to CommonJS lowering.
//!
//! Only module syntax is rewritten; everything else is passed through byte
//! for byte. Exports become getters installed before the module body runs,
//! and every use of an imported name reads through the required module
//! object, so bindings stay live and cyclic imports see values as they get
//! initialised.

use std::collections::HashMap;
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, CallExpression, Declaration, ExportAllDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference,
    ImportDeclaration, ImportDeclarationSpecifier, ObjectProperty, Statement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType, Span};

use crate::traits::{BundleError, Transpiler};

/// Lowers `import`/`export` statements in JavaScript modules.
#[derive(Debug, Default, Clone, Copy)]
pub struct EsModules;

impl Transpiler for EsModules {
    fn name(&self) -> &'static str {
        "es-modules"
    }

    fn extensions(&self) -> &[&'static str] {
        &["js", "mjs", "cjs"]
    }

    fn transpile(&self, source: &str, path: &Path) -> Result<String, BundleError> {
        lower_es_modules(source, path)
    }
}

/// Wraps JSON documents as `module.exports = <json>;`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModules;

impl Transpiler for JsonModules {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn transpile(&self, source: &str, path: &Path) -> Result<String, BundleError> {
        let value: serde_json::Value =
            serde_json::from_str(source).map_err(|e| BundleError::Json {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(format!("module.exports = {};", value))
    }
}

/// Parse `source` and rewrite its module syntax to CommonJS.
///
/// Sources that only parse as classic scripts are returned unchanged.
pub fn lower_es_modules(source: &str, path: &Path) -> Result<String, BundleError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let script = Parser::new(&allocator, source, SourceType::cjs()).parse();
        if !script.panicked && script.errors.is_empty() {
            return Ok(source.to_string());
        }

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

    // Symbol ids on import bindings are filled in here.
    let semantic = SemanticBuilder::new().build(&ret.program).semantic;

    let mut lowering = Lowering::new(source);
    for stmt in &ret.program.body {
        lowering.statement(stmt);
    }
    if !lowering.is_module {
        return Ok(source.to_string());
    }

    let mut uses = ImportedUses {
        scoping: semantic.scoping(),
        bindings: &lowering.bindings,
        edits: Vec::new(),
    };
    uses.visit_program(&ret.program);
    let edits = uses.edits;
    lowering.edits.extend(edits);

    Ok(lowering.finish())
}

struct Lowering<'s> {
    source: &'s str,
    edits: Vec<(u32, u32, String)>,
    /// Exported name and the expression its getter returns
    exports: Vec<(String, String)>,
    /// `export { local as name }` pairs, resolved once imports are known
    local_exports: Vec<(String, String)>,
    /// Import binding and the member access that replaces it
    bindings: HashMap<SymbolId, String>,
    /// Same accesses keyed by local name
    imported_names: HashMap<String, String>,
    is_module: bool,
    counter: usize,
}

impl<'s> Lowering<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: Vec::new(),
            exports: Vec::new(),
            local_exports: Vec::new(),
            bindings: HashMap::new(),
            imported_names: HashMap::new(),
            is_module: false,
            counter: 0,
        }
    }

    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("__{}{}", prefix, self.counter);
        self.counter += 1;
        name
    }

    fn replace(&mut self, span: Span, text: String) {
        self.edits.push((span.start, span.end, text));
    }

    /// Replace the `export ...` keywords in front of `inner` with `text`.
    fn replace_prefix(&mut self, outer: Span, inner: Span, text: &str) {
        self.replace(Span::new(outer.start, inner.start), text.to_string());
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        let module = quote(decl.source.value.as_str());

        let specs = match &decl.specifiers {
            Some(specs) if !specs.is_empty() => specs,
            _ => {
                self.replace(decl.span, format!("require({});", module));
                return;
            }
        };

        let binding = self.temp("m");
        let mut text = format!("var {} = require({});", binding, module);
        let mut default_holder: Option<String> = None;

        for spec in specs {
            let (local, access) = match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    (&s.local, member(&binding, s.imported.name().as_str()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    // CommonJS modules are their own default export.
                    let holder = default_holder.get_or_insert_with(|| {
                        let holder = format!("{}_default", binding);
                        text.push_str(&format!(
                            " var {h} = {b} && {b}.__esModule ? {b} : {{ default: {b} }};",
                            h = holder,
                            b = binding
                        ));
                        holder
                    });
                    (&s.local, format!("{}.default", holder))
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (&s.local, binding.clone())
                }
            };

            if let Some(symbol) = local.symbol_id.get() {
                self.bindings.insert(symbol, access.clone());
            }
            self.imported_names.insert(local.name.to_string(), access);
        }

        self.replace(decl.span, text);
    }

    fn statement(&mut self, stmt: &Statement<'_>) {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                self.is_module = true;
                self.import(decl);
            }

            Statement::ExportNamedDeclaration(decl) => {
                self.is_module = true;

                if let Some(declaration) = &decl.declaration {
                    for name in declared_names(declaration) {
                        self.exports.push((name.clone(), name));
                    }
                    self.replace_prefix(decl.span, declaration.span(), "");
                } else if let Some(source) = &decl.source {
                    let binding = self.temp("re");
                    for spec in &decl.specifiers {
                        self.exports.push((
                            spec.exported.name().to_string(),
                            member(&binding, spec.local.name().as_str()),
                        ));
                    }
                    let text = format!(
                        "var {} = require({});",
                        binding,
                        quote(source.value.as_str())
                    );
                    self.replace(decl.span, text);
                } else {
                    for spec in &decl.specifiers {
                        self.local_exports.push((
                            spec.exported.name().to_string(),
                            spec.local.name().to_string(),
                        ));
                    }
                    self.replace(decl.span, String::new());
                }
            }

            Statement::ExportDefaultDeclaration(decl) => {
                self.is_module = true;

                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        func.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        class.id.as_ref().map(|id| id.name.to_string())
                    }
                    _ => None,
                };

                let inner = decl.declaration.span();
                match named {
                    Some(name) => {
                        self.exports.push(("default".to_string(), name));
                        self.replace_prefix(decl.span, inner, "");
                    }
                    None => self.replace_prefix(decl.span, inner, "exports.default = "),
                }
            }

            Statement::ExportAllDeclaration(decl) => {
                self.is_module = true;
                let module = quote(decl.source.value.as_str());

                let text = match &decl.exported {
                    Some(name) => format!(
                        "exports[{}] = require({});",
                        quote(name.name().as_str()),
                        module
                    ),
                    None => format!(
                        "(function (m) {{ Object.keys(m).forEach(function (k) {{ \
                         if (k !== \"default\" && !(k in exports)) \
                         Object.defineProperty(exports, k, {{ enumerable: true, get: function () {{ return m[k]; }} }}); \
                         }}); }})(require({}));",
                        module
                    ),
                };
                self.replace(decl.span, text);
            }

            _ => {}
        }
    }

    fn finish(mut self) -> String {
        let mut out = String::from("\"use strict\";\n");
        out.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");

        let local_exports = std::mem::take(&mut self.local_exports);
        let resolved = local_exports.into_iter().map(|(name, local)| {
            let expr = self.imported_names.get(&local).cloned().unwrap_or(local);
            (name, expr)
        });
        let exports: Vec<(String, String)> =
            std::mem::take(&mut self.exports).into_iter().chain(resolved).collect();

        for (name, expr) in &exports {
            out.push_str(&format!(
                "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});\n",
                quote(name),
                expr
            ));
        }

        let mut edits = std::mem::take(&mut self.edits);
        edits.sort_by_key(|(start, _, _)| *start);

        let mut cursor = 0usize;
        for (start, end, text) in edits {
            out.push_str(&self.source[cursor..start as usize]);
            out.push_str(&text);
            cursor = end as usize;
        }
        out.push_str(&self.source[cursor..]);

        out
    }
}

/// Finds every read of an import binding and rewrites it to a member access
/// on the required module.
struct ImportedUses<'s> {
    scoping: &'s Scoping,
    bindings: &'s HashMap<SymbolId, String>,
    edits: Vec<(u32, u32, String)>,
}

impl ImportedUses<'_> {
    fn access(&self, ident: &IdentifierReference<'_>) -> Option<String> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.bindings.get(&symbol).cloned()
    }
}

impl<'a> Visit<'a> for ImportedUses<'_> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(access) = self.access(it) {
            self.edits.push((it.span.start, it.span.end, access));
        }
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        // Imported functions are called without the module as `this`.
        if let Expression::Identifier(callee) = &it.callee {
            if let Some(access) = self.access(callee) {
                self.edits
                    .push((callee.span.start, callee.span.end, format!("(0, {})", access)));
                self.visit_arguments(&it.arguments);
                return;
            }
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                if let Some(access) = self.access(ident) {
                    let text = format!("{}: {}", ident.name, access);
                    self.edits.push((it.span.start, it.span.end, text));
                    return;
                }
            }
        }
        walk::walk_object_property(self, it);
    }

    // Import and export lists are rewritten whole by the statement pass.
    fn visit_import_declaration(&mut self, _it: &ImportDeclaration<'a>) {}

    fn visit_export_all_declaration(&mut self, _it: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
    }
}

/// Names bound by an exported declaration.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| pattern_names(&d.id))
            .collect(),
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn pattern_names(pattern: &BindingPattern<'_>) -> Vec<String> {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => vec![ident.name.to_string()],
        BindingPatternKind::ObjectPattern(obj) => {
            let mut names: Vec<String> = obj
                .properties
                .iter()
                .flat_map(|p| pattern_names(&p.value))
                .collect();
            if let Some(rest) = &obj.rest {
                names.extend(pattern_names(&rest.argument));
            }
            names
        }
        BindingPatternKind::ArrayPattern(arr) => {
            let mut names: Vec<String> = arr
                .elements
                .iter()
                .flatten()
                .flat_map(pattern_names)
                .collect();
            if let Some(rest) = &arr.rest {
                names.extend(pattern_names(&rest.argument));
            }
            names
        }
        BindingPatternKind::AssignmentPattern(assign) => pattern_names(&assign.left),
    }
}

/// A JavaScript string literal for `s`.
pub(crate) fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// `object.name`, or `object["name"]` when `name` is not an identifier.
fn member(object: &str, name: &str) -> String {
    let mut chars = name.chars();
    let is_ident = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if is_ident {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, quote(name))
    }
}
