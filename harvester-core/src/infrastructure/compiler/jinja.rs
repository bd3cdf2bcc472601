// harvester-core/src/infrastructure/compiler/jinja.rs

// Renders query templates and file naming patterns. Undefined variables are
// errors, so a typo in a template fails at config check time, not mid-run.

use crate::application::ports::TemplateEngine;
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use minijinja::{Environment, UndefinedBehavior};

pub struct JinjaRenderer<'a> {
    env: Environment<'a>,
}

impl<'a> JinjaRenderer<'a> {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        // Single-quoted SQL literal: {{ quote(start_date) }} -> '2026-01-01'
        env.add_function("quote", |value: String| -> String {
            format!("'{}'", value.replace('\'', "''"))
        });

        Self { env }
    }

    pub fn render_str(
        &self,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String, InfrastructureError> {
        Ok(self.env.render_str(template, context)?)
    }
}

impl<'a> Default for JinjaRenderer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TemplateEngine for JinjaRenderer<'a> {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, HarvestError> {
        Ok(self.render_str(template, context)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_renders_paging_variables() -> Result<()> {
        let renderer = JinjaRenderer::new();
        let sql = renderer.render_str(
            "SELECT * FROM {{ table }} WHERE visit_date >= '{{ start_date }}' LIMIT {{ batch_size }} OFFSET {{ batch_offset }}",
            &json!({ "table": "visits", "start_date": "2026-01-01", "batch_size": 500, "batch_offset": 1000 }),
        )?;
        assert_eq!(
            sql,
            "SELECT * FROM visits WHERE visit_date >= '2026-01-01' LIMIT 500 OFFSET 1000"
        );
        Ok(())
    }

    #[test]
    fn test_quote_escapes() -> Result<()> {
        let renderer = JinjaRenderer::new();
        let out = renderer.render_str("{{ quote(name) }}", &json!({ "name": "O'Neil" }))?;
        assert_eq!(out, "'O''Neil'");
        Ok(())
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let renderer = JinjaRenderer::new();
        let err = renderer.render_str("SELECT {{ nope }}", &json!({})).unwrap_err();
        assert!(matches!(err, InfrastructureError::Template(_)));
    }
}
