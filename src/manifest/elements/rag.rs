//! Retrieval widgets. All of them read straight from state.
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::ir::{ItemKind as I, PreviewSource, render_state_path};
use crate::manifest::builder::BuildCtx;

use super::{Built, Node};

pub fn build(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Option<Result<Built>> {
    let mut element = Map::new();
    let result = match &node.item.kind {
        I::CitationChips { source } => bind_list(ctx, &mut element, source, "Citation chips source", "citations"),
        I::TrustIndicator { source } => {
            element.insert("source".to_owned(), json!(render_state_path(source)));
            element.insert("value".to_owned(), ctx.state.lookup(source).cloned().unwrap_or(Value::Null));
            Ok(())
        }
        I::SourcePreview { source } => {
            match source {
                PreviewSource::State { path } => {
                    element.insert("source".to_owned(), json!(render_state_path(path)));
                    element.insert("value".to_owned(), ctx.state.lookup(path).cloned().unwrap_or(Value::Null));
                }
                PreviewSource::Text { value } => {
                    element.insert("value".to_owned(), json!(value));
                }
            }
            Ok(())
        }
        I::ScopeSelector { options_source, active } => {
            bind_list(ctx, &mut element, options_source, "Scope selector options", "options").map(|()| {
                element.insert("active_source".to_owned(), json!(render_state_path(active)));
                element.insert("active".to_owned(), ctx.state.lookup(active).cloned().unwrap_or(Value::Null));
            })
        }
        _ => return None,
    };
    Some(result.map(|()| Built::new(element)))
}

fn bind_list(
    ctx: &BuildCtx<'_>,
    element: &mut Map<String, Value>,
    path: &[String],
    what: &str,
    key: &str,
) -> Result<()> {
    element.insert("source".to_owned(), json!(render_state_path(path)));
    element.insert(key.to_owned(), Value::Array(ctx.state.read_list(path, what)?));
    Ok(())
}
