//! Template rendering utilities using Tera
//!
//! Prompt templates are plain text, so templates are registered under a name
//! without an `.html` suffix and Tera leaves autoescaping off.

use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

const TEMPLATE_NAME: &str = "prompt";

/// A parsed template that can be rendered many times.
#[derive(Debug, Clone)]
pub struct Template {
    tera: Tera,
}

impl Template {
    /// Parse `source`, failing early on syntax errors.
    pub fn parse(source: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, source)
            .map_err(|e| Error::Validation(format!("Failed to parse template: {}", e)))?;
        Ok(Self { tera })
    }

    pub fn render(&self, context: &Value) -> Result<String> {
        self.tera
            .render(TEMPLATE_NAME, &to_tera_context(context))
            .map_err(|e| Error::Internal(format!("Failed to render template: {}", e)))
    }
}

/// Render a template string with the given context
pub fn render_template(template: &str, context: &Value) -> Result<String> {
    Template::parse(template)?.render(context)
}

fn to_tera_context(context: &Value) -> Context {
    let mut tera_context = Context::new();

    match context {
        Value::Object(map) => {
            for (key, value) in map {
                tera_context.insert(key, value);
            }
        }
        _ => {
            // If not an object, make it available as "data"
            tera_context.insert("data", context);
        }
    }

    tera_context
}
