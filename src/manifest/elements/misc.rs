//! Text, media, numbers, stories, custom components and theme settings.
use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::error::{CompileError, Result};
use crate::ir::{Expr, ItemKind as I, Literal, NumberEntry, StoryStep};
use crate::manifest::builder::BuildCtx;
use crate::manifest::eval;
use crate::manifest::storage::RecordScope;

use super::{ActionMap, Built, Node, insert_opt, register};

pub fn build(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Option<Result<Built>> {
    let mut element = Map::new();
    match &node.item.kind {
        I::Title { value } | I::Text { value } => {
            element.insert("value".to_owned(), json!(value));
        }
        I::Divider => {}
        I::Image { src, alt, role } => {
            element.insert("src".to_owned(), json!(src));
            element.insert("alt".to_owned(), json!(alt));
            insert_opt(&mut element, "role", role.as_ref());
        }
        I::Icon { name, size, role, label } => {
            element.insert("name".to_owned(), json!(name));
            element.insert("size".to_owned(), json!(size));
            element.insert("role".to_owned(), json!(role));
            insert_opt(&mut element, "label", label.as_ref());
        }
        I::Lightbox { images, start_index } => {
            element.insert("images".to_owned(), json!(images));
            element.insert("start_index".to_owned(), json!(start_index));
        }
        I::Number { entries } => return Some(number(ctx, entries).map(Built::new)),
        I::Story { title, steps } => {
            element.insert("title".to_owned(), json!(title));
            element.insert("steps".to_owned(), Value::Array(story_steps(steps)));
        }
        I::CustomComponent { component, plugin, properties } => {
            return Some(custom_component(ctx, node, component, plugin, properties));
        }
        I::ThemeSettings => {
            let current = ctx.options.runtime_theme.as_deref().unwrap_or(&ctx.program.theme.setting);
            element.insert("current".to_owned(), json!(current));
            element.insert("options".to_owned(), json!(["light", "dark", "system"]));
        }
        _ => return None,
    }
    Some(Ok(Built::new(element)))
}

/// Count entries report how many rows the current identity can see.
fn number(ctx: &BuildCtx<'_>, entries: &[NumberEntry]) -> Result<Map<String, Value>> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        out.push(match entry {
            NumberEntry::Phrase { value } => json!({"kind": "phrase", "value": value}),
            NumberEntry::Count { record, label } => {
                let schema = ctx
                    .program
                    .records
                    .get(record)
                    .ok_or_else(|| CompileError::internal(format!("record '{record}' vanished after lowering")))?;
                let scope = RecordScope::for_identity(record, ctx.options.identity.as_ref());
                let count = ctx.storage.list_records(schema, &scope, None)?.len();
                json!({"kind": "count", "record": record, "label": label, "value": count})
            }
        });
    }
    let mut element = Map::new();
    element.insert("entries".to_owned(), Value::Array(out));
    Ok(element)
}

/// Steps with their resolved `next`: explicit, else the following step.
fn story_steps(steps: &[StoryStep]) -> Vec<Value> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let mut out = Map::new();
            out.insert("title".to_owned(), json!(step.title));
            insert_opt(&mut out, "text", step.text.as_ref());
            insert_opt(&mut out, "icon", step.icon.as_ref());
            insert_opt(&mut out, "image", step.image.as_ref());
            insert_opt(&mut out, "tone", step.tone.as_ref());
            insert_opt(&mut out, "requires", step.requires.as_ref().map(eval::render));
            let next = step.next.clone().or_else(|| steps.get(index + 1).map(|s| s.title.clone()));
            out.insert("next".to_owned(), json!(next));
            Value::Object(out)
        })
        .collect()
}

fn custom_component(
    ctx: &mut BuildCtx<'_>,
    node: &Node<'_>,
    component: &str,
    plugin: &str,
    properties: &IndexMap<String, Expr>,
) -> Result<Built> {
    let mut props = Map::new();
    let mut events = Map::new();
    let mut actions = ActionMap::new();
    for (name, expr) in properties {
        if name.starts_with("on_") {
            let flow = match expr {
                Expr::Literal { value: Literal::Text(flow) } => flow,
                _ => return Err(CompileError::internal(format!("event prop '{name}' is not a flow name"))),
            };
            let mut payload = Map::new();
            payload.insert("type".to_owned(), json!("call_flow"));
            payload.insert("flow".to_owned(), json!(flow));
            let id = register(ctx, &mut actions, node, "component", &format!("{component} {name}"), payload);
            events.insert(name.clone(), json!(id));
        } else {
            props.insert(name.clone(), eval::evaluate(expr, &ctx.state)?);
        }
    }
    let mut element = Map::new();
    element.insert("component".to_owned(), json!(component));
    element.insert("plugin".to_owned(), json!(plugin));
    element.insert("props".to_owned(), Value::Object(props));
    if !events.is_empty() {
        element.insert("events".to_owned(), Value::Object(events));
    }
    Ok(Built::with_actions(element, actions))
}
