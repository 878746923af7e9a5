//! Build context threaded through every task invocation.

use sitewright_templates::TemplateRegistry;

use crate::config::SiteConfig;

/// Single-owner state for a run: the configuration plus whatever earlier
/// tasks produced that later tasks read (the loaded template registry).
pub struct BuildContext {
    config: SiteConfig,
    templates: Option<TemplateRegistry>,
}

impl BuildContext {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            templates: None,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Registry from the most recent `load` run.
    pub fn templates(&self) -> Option<&TemplateRegistry> {
        self.templates.as_ref()
    }

    pub fn set_templates(&mut self, registry: TemplateRegistry) {
        self.templates = Some(registry);
    }
}
