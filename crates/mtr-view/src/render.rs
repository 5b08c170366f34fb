use std::collections::BTreeMap;
use std::fmt;

use handlebars::{Handlebars, RenderErrorReason};
use serde_json::json;

/// Template helper expanding a dynamic dependency's generated view name:
/// `{{generationQueryViewName "node-cpu"}}`.
pub const VIEW_NAME_HELPER: &str = "generationQueryViewName";

/// Renders GenerationQuery text.
///
/// Strict mode: referencing an unknown variable is an error rather than an
/// empty string. Output is not HTML-escaped.
pub struct QueryRenderer {
    hb: Handlebars<'static>,
}

impl Default for QueryRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRenderer {
    pub fn new() -> Self {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);
        hb.register_escape_fn(handlebars::no_escape);
        hb.register_helper(VIEW_NAME_HELPER, Box::new(view_name_helper));
        Self { hb }
    }

    /// Render `template` for the query `namespace/name`.
    ///
    /// The context exposes `dynamicDependencyViewNames` and
    /// `query.name` / `query.namespace`.
    pub fn render(
        &self,
        template: &str,
        namespace: &str,
        name: &str,
        dynamic_view_names: &BTreeMap<String, String>,
    ) -> Result<String, TemplateError> {
        let ctx = json!({
            "dynamicDependencyViewNames": dynamic_view_names,
            "query": { "name": name, "namespace": namespace },
        });
        self.hb
            .render_template(template, &ctx)
            .map_err(|e| match e.reason() {
                RenderErrorReason::TemplateError(t) => TemplateError::Syntax(t.to_string()),
                _ => TemplateError::Render(e.to_string()),
            })
    }
}

fn view_name_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    ctx: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let Some(dep) = h.param(0).and_then(|v| v.value().as_str()) else {
        return Err(RenderErrorReason::Other(format!(
            "{VIEW_NAME_HELPER} expects a GenerationQuery name"
        ))
        .into());
    };
    let view = ctx
        .data()
        .get("dynamicDependencyViewNames")
        .and_then(|m| m.get(dep))
        .and_then(|v| v.as_str());
    match view {
        Some(view) => {
            out.write(view)?;
            Ok(())
        }
        None => Err(RenderErrorReason::Other(format!(
            "{dep:?} is not a dynamic dependency with a generated view"
        ))
        .into()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template text does not parse.
    Syntax(String),
    /// Parsed, but rendering failed (unknown variable, bad helper argument).
    Render(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Syntax(msg) => write!(f, "invalid query template: {msg}"),
            TemplateError::Render(msg) => write!(f, "query template render failed: {msg}"),
        }
    }
}

impl std::error::Error for TemplateError {}
