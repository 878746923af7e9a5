//! JavaScript bundling for sitewright.
//!
//! Walks `require` edges from one entry module, lowers newer syntax to a
//! configured target and ES module syntax to CommonJS, and emits every
//! reachable module into a single script with a small module runtime.

pub mod bundler;
pub mod esm;
pub mod resolve;
pub mod traits;
pub mod transform;

pub use bundler::{Bundle, BundleConfig, Bundler};
pub use esm::{lower_es_modules, EsModules, JsonModules};
pub use resolve::Resolver;
pub use traits::{BundleError, Transpiler};
pub use transform::SyntaxTarget;
