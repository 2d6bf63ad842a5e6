//! Loading indicators, snackbars, tooltips, sliders and grids.
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::ir::{ItemKind as I, render_state_path};
use crate::manifest::builder::BuildCtx;

use super::{ActionMap, Built, Node, insert_opt, register};

pub fn build(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Option<Result<Built>> {
    let mut element = Map::new();
    match &node.item.kind {
        I::Loading { variant } => {
            element.insert("variant".to_owned(), json!(variant));
        }
        I::Snackbar { message, duration } => {
            element.insert("message".to_owned(), json!(message));
            element.insert("duration".to_owned(), json!(duration));
        }
        I::Tooltip { text, anchor_label, collapsed_by_default } => {
            element.insert("text".to_owned(), json!(text));
            element.insert("anchor_label".to_owned(), json!(anchor_label));
            element.insert("collapsed_by_default".to_owned(), json!(collapsed_by_default));
        }
        I::Slider { label, min, max, step, value, flow, help_text } => {
            let mut actions = ActionMap::new();
            element.insert("label".to_owned(), json!(label));
            element.insert("min".to_owned(), json!(min));
            element.insert("max".to_owned(), json!(max));
            element.insert("step".to_owned(), json!(step));
            element.insert("value_path".to_owned(), json!(render_state_path(value)));
            element.insert("value".to_owned(), ctx.state.lookup(value).cloned().unwrap_or(Value::Null));
            insert_opt(&mut element, "help_text", help_text.as_ref());
            if let Some(flow) = flow {
                let mut payload = Map::new();
                payload.insert("type".to_owned(), json!("call_flow"));
                payload.insert("flow".to_owned(), json!(flow));
                payload.insert("value_path".to_owned(), json!(render_state_path(value)));
                let id = register(ctx, &mut actions, node, "slider", label, payload);
                element.insert("action_id".to_owned(), json!(id));
            }
            return Some(Ok(Built::with_actions(element, actions)));
        }
        I::Grid { columns, children } => {
            return Some(ctx.build_children(children, &node.path, node.visible).map(|(children, actions)| {
                element.insert("columns".to_owned(), json!(columns));
                element.insert("children".to_owned(), Value::Array(children));
                Built::with_actions(element, actions)
            }));
        }
        _ => return None,
    }
    Some(Ok(Built::new(element)))
}
