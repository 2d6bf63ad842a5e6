//! Interactive elements: buttons, links, inputs, cards and uploads.
use serde_json::{Map, Value, json};

use crate::error::{CompileError, Result};
use crate::ir::{self, AvailabilityRule, ItemKind as I, render_state_path};
use crate::manifest::builder::BuildCtx;
use crate::manifest::eval::{self, literal_value, values_equal};

use super::{ActionMap, Built, Node, action_entry, action_payload, entry_actions, insert_opt, merge_actions, register};

pub fn build(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Option<Result<Built>> {
    let built = match &node.item.kind {
        I::Button { .. } => button(ctx, node),
        I::Link { label, target } => {
            let mut payload = Map::new();
            payload.insert("type".to_owned(), json!("open_page"));
            payload.insert("target".to_owned(), json!(target));
            Ok(simple(ctx, node, "link", label, payload, |element| {
                element.insert("label".to_owned(), json!(label));
                element.insert("target".to_owned(), json!(target));
            }))
        }
        I::TextInput { name, flow, label } => {
            let mut payload = Map::new();
            payload.insert("type".to_owned(), json!("call_flow"));
            payload.insert("flow".to_owned(), json!(flow));
            payload.insert("input_field".to_owned(), json!(name));
            Ok(simple(ctx, node, "input", name, payload, |element| {
                element.insert("name".to_owned(), json!(name));
                element.insert("label".to_owned(), json!(label));
                element.insert("flow".to_owned(), json!(flow));
            }))
        }
        I::Upload { name, accept, multiple, required, preview, label } => {
            let mut payload = Map::new();
            payload.insert("type".to_owned(), json!("upload_select"));
            payload.insert("name".to_owned(), json!(name));
            payload.insert("accept".to_owned(), json!(accept));
            payload.insert("multiple".to_owned(), json!(multiple));
            Ok(simple(ctx, node, "upload", name, payload, |element| {
                element.insert("name".to_owned(), json!(name));
                element.insert("label".to_owned(), json!(label));
                element.insert("accept".to_owned(), json!(accept));
                element.insert("multiple".to_owned(), json!(multiple));
                element.insert("required".to_owned(), json!(required));
                element.insert("preview".to_owned(), json!(preview));
            }))
        }
        I::Card { .. } => card(ctx, node),
        _ => return None,
    };
    Some(built)
}

/// One element, one action: `fields` fills the element, then `action_id`.
fn simple(
    ctx: &mut BuildCtx<'_>,
    node: &Node<'_>,
    kind: &str,
    key: &str,
    payload: Map<String, Value>,
    fields: impl FnOnce(&mut Map<String, Value>),
) -> Built {
    let mut actions = ActionMap::new();
    let id = register(ctx, &mut actions, node, kind, key, payload);
    let mut element = Map::new();
    fields(&mut element);
    element.insert("action_id".to_owned(), json!(id));
    Built::with_actions(element, actions)
}

fn button(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::Button { label, action, explicit_id, icon, availability } = &node.item.kind else {
        return Err(CompileError::internal("button builder called on another kind"));
    };
    let payload = action_payload(action, &ctx.slug);
    let id = match explicit_id {
        Some(id) => ctx.claim_explicit(id),
        None => ctx.allocate_action("button", label, &node.element_id),
    };
    let mut actions = ActionMap::new();
    actions.insert(id.clone(), action_entry(&id, &node.element_id, payload.clone()));

    let mut element = Map::new();
    element.insert("label".to_owned(), json!(label));
    insert_opt(&mut element, "icon", icon.as_ref());
    element.insert("id".to_owned(), json!(id));
    element.insert("action_id".to_owned(), json!(id));
    element.insert("action".to_owned(), Value::Object(payload));
    let enabled = match availability {
        Some(rule) => {
            let (enabled, info) = availability_info(ctx, rule);
            element.insert("availability".to_owned(), info);
            enabled
        }
        None => true,
    };
    element.insert("enabled".to_owned(), Value::Bool(enabled));
    Ok(Built::with_actions(element, actions))
}

/// Enabled when the state value equals the rule's literal.
fn availability_info(ctx: &BuildCtx<'_>, rule: &AvailabilityRule) -> (bool, Value) {
    let expected = literal_value(&rule.value);
    let enabled = ctx.state.lookup(&rule.path).is_some_and(|actual| values_equal(actual, &expected));
    let info = json!({
        "state_path": render_state_path(&rule.path),
        "value": expected,
        "enabled": enabled,
    });
    (enabled, info)
}

fn card(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::Card { label, stat, actions: entries, children } = &node.item.kind else {
        return Err(CompileError::internal("card builder called on another kind"));
    };
    let mut element = Map::new();
    insert_opt(&mut element, "label", label.as_ref());
    if let Some(stat) = stat {
        element.insert("stat".to_owned(), card_stat(ctx, stat)?);
    }
    let owner = label.as_deref().unwrap_or("card");
    let (descriptors, mut actions) = entry_actions(ctx, node, "card", Some(owner), entries);
    if !descriptors.is_empty() {
        element.insert("actions".to_owned(), Value::Array(descriptors));
    }
    let (children, child_actions) = ctx.build_children(children, &node.path, node.visible)?;
    merge_actions(&mut actions, child_actions)?;
    element.insert("children".to_owned(), Value::Array(children));
    Ok(Built::with_actions(element, actions))
}

fn card_stat(ctx: &BuildCtx<'_>, stat: &ir::CardStat) -> Result<Value> {
    let mut out = Map::new();
    insert_opt(&mut out, "label", stat.label.as_ref());
    out.insert("expression".to_owned(), json!(eval::render(&stat.value)));
    out.insert("value".to_owned(), eval::evaluate(&stat.value, &ctx.state)?);
    Ok(Value::Object(out))
}
