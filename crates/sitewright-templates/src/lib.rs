//! Template registry for sitewright.
//!
//! Holds partials, layouts, helpers and site data for one build cycle and
//! renders page templates through their layout chain.

pub mod frontmatter;
pub mod helpers;
pub mod registry;

pub use frontmatter::{split_front_matter, FrontMatter, FrontMatterError, LayoutChoice};
pub use helpers::{strict_eq, BlockHelper, BlockOptions, IfEq};
pub use registry::{TemplateError, TemplateRegistry};
