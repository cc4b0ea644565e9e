//! HTML template rendering for the landing page
//!
//! Templates are embedded in the binary and rendered with minijinja.

use crate::{GatewayError, Result};
use minijinja::Environment;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the landing page template
pub const INDEX_TEMPLATE: &str = "index";

/// Template renderer for HTML pages using minijinja
#[derive(Clone)]
pub struct TemplateRenderer {
    env: Arc<Environment<'static>>,
    templates: HashMap<String, String>,
}

impl TemplateRenderer {
    /// Create a renderer with the embedded templates loaded
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Auto-escape HTML
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);

        let mut templates = HashMap::new();
        templates.insert(
            INDEX_TEMPLATE.to_string(),
            include_str!("../../static/index.html").to_string(),
        );

        Self {
            env: Arc::new(env),
            templates,
        }
    }

    /// Render a template with JSON data
    pub fn render_json(&self, name: &str, data: &serde_json::Value) -> Result<String> {
        let template_content = self
            .templates
            .get(name)
            .ok_or_else(|| GatewayError::config(format!("Template '{}' not found", name)))?;

        self.env.render_str(template_content, data).map_err(|e| {
            GatewayError::Other(anyhow::anyhow!(
                "Failed to render template '{}': {}",
                name,
                e
            ))
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}
