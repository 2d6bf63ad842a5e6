//! Data-bound elements: tables, lists, forms, views, charts and chat.
use serde_json::{Map, Value, json};

use crate::error::{CompileError, Result};
use crate::ir::{DataSource, ItemKind as I, SortOrder, ViewRepresentation, render_state_path};
use crate::manifest::builder::BuildCtx;
use crate::manifest::eval::total_order;
use crate::manifest::storage::Row;

use super::{ActionMap, Built, Node, entry_actions, insert_opt, register};

pub fn build(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Option<Result<Built>> {
    let built = match &node.item.kind {
        I::Table { .. } => table(ctx, node),
        I::List { .. } => list(ctx, node),
        I::Form { .. } => form(ctx, node),
        I::View { record, representation } => view(ctx, record, *representation),
        I::Chart { .. } => chart(ctx, node),
        I::Chat { .. } => chat(ctx, node),
        I::ChatMessages { source } => state_list(ctx, source, "Chat messages source", "messages"),
        I::ChatCitations { source } => state_list(ctx, source, "Chat citations source", "citations"),
        I::ChatMemory { source, lane } => state_list(ctx, source, "Chat memory source", "items").map(|mut built| {
            insert_opt(&mut built.element, "lane", lane.as_ref());
            built
        }),
        I::ChatComposer { flow, fields } => {
            let mut actions = ActionMap::new();
            let mut payload = Map::new();
            payload.insert("type".to_owned(), json!("call_flow"));
            payload.insert("flow".to_owned(), json!(flow));
            let id = register(ctx, &mut actions, node, "composer", flow, payload);
            let mut element = Map::new();
            element.insert("flow".to_owned(), json!(flow));
            element.insert("fields".to_owned(), json!(fields));
            element.insert("action_id".to_owned(), json!(id));
            Ok(Built::with_actions(element, actions))
        }
        I::ChatThinking { when } => {
            let active = matches!(ctx.state.lookup(when), Some(Value::Bool(true)));
            let mut element = Map::new();
            element.insert("when".to_owned(), json!(render_state_path(when)));
            element.insert("active".to_owned(), Value::Bool(active));
            Ok(Built::new(element))
        }
        _ => return None,
    };
    Some(built)
}

// ————————————————————————————————————————————————————————————————————————————
// COLLECTIONS
// ————————————————————————————————————————————————————————————————————————————

fn rows_value(rows: Vec<Row>) -> Vec<Value> {
    rows.into_iter().map(Value::Object).collect()
}

/// Writes `record` or `source` into `element` and reads the initial rows.
fn source_rows(
    ctx: &BuildCtx<'_>,
    source: &DataSource,
    what: &str,
    element: &mut Map<String, Value>,
) -> Result<Vec<Value>> {
    match source {
        DataSource::Record { name } => {
            element.insert("record".to_owned(), json!(name));
            Ok(rows_value(ctx.read_rows(name)?))
        }
        DataSource::State { path } => {
            element.insert("source".to_owned(), json!(render_state_path(path)));
            ctx.state.read_list(path, what)
        }
    }
}

fn table(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::Table { source, columns, empty_text, empty_state_hidden, sort, page_size, selection, row_actions } =
        &node.item.kind
    else {
        return Err(CompileError::internal("table builder called on another kind"));
    };
    let mut element = Map::new();
    let mut rows = source_rows(ctx, source, "Table source", &mut element)?;
    if let Some(sort) = sort {
        rows.sort_by(|a, b| {
            let ordering = total_order(a.get(&sort.by).unwrap_or(&Value::Null), b.get(&sort.by).unwrap_or(&Value::Null));
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        element.insert("sort".to_owned(), json!(sort));
    }
    if let Some(page_size) = page_size {
        rows.truncate(*page_size as usize);
        element.insert("pagination".to_owned(), json!({"page_size": page_size}));
    }
    element.insert("columns".to_owned(), json!(columns));
    element.insert("rows".to_owned(), Value::Array(rows));
    insert_opt(&mut element, "empty_text", empty_text.as_ref());
    if *empty_state_hidden {
        element.insert("empty_state_hidden".to_owned(), Value::Bool(true));
    }
    element.insert("selection".to_owned(), json!(selection));
    if let DataSource::Record { name } = source {
        insert_opt(&mut element, "id_field", ctx.program.records.get(name).and_then(|r| r.id_field()));
    }
    let (descriptors, actions) = entry_actions(ctx, node, "table", None, row_actions);
    element.insert("row_actions".to_owned(), Value::Array(descriptors));
    Ok(Built::with_actions(element, actions))
}

fn list(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::List { source, variant, item, empty_text, empty_state_hidden, selection, actions } = &node.item.kind
    else {
        return Err(CompileError::internal("list builder called on another kind"));
    };
    let mut element = Map::new();
    let rows = source_rows(ctx, source, "List source", &mut element)?;
    element.insert("variant".to_owned(), json!(variant));
    insert_opt(&mut element, "item", item.as_ref());
    element.insert("rows".to_owned(), Value::Array(rows));
    insert_opt(&mut element, "empty_text", empty_text.as_ref());
    if *empty_state_hidden {
        element.insert("empty_state_hidden".to_owned(), Value::Bool(true));
    }
    element.insert("selection".to_owned(), json!(selection));
    let (descriptors, registered) = entry_actions(ctx, node, "list", None, actions);
    element.insert("actions".to_owned(), Value::Array(descriptors));
    Ok(Built::with_actions(element, registered))
}

fn form(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::Form { record, groups, fields } = &node.item.kind else {
        return Err(CompileError::internal("form builder called on another kind"));
    };
    let mut actions = ActionMap::new();
    let mut payload = Map::new();
    payload.insert("type".to_owned(), json!("submit_form"));
    payload.insert("record".to_owned(), json!(record));
    let id = register(ctx, &mut actions, node, "form", record, payload);

    let fields: Vec<Value> = fields
        .iter()
        .map(|field| {
            let mut out = Map::new();
            out.insert("name".to_owned(), json!(field.name));
            out.insert("type".to_owned(), json!(field.type_name));
            out.insert("required".to_owned(), Value::Bool(field.required));
            out.insert("readonly".to_owned(), Value::Bool(field.readonly));
            insert_opt(&mut out, "help", field.help.as_ref());
            Value::Object(out)
        })
        .collect();
    let mut element = Map::new();
    element.insert("record".to_owned(), json!(record));
    element.insert("fields".to_owned(), Value::Array(fields));
    if !groups.is_empty() {
        element.insert("groups".to_owned(), json!(groups));
    }
    element.insert("action_id".to_owned(), json!(id));
    Ok(Built::with_actions(element, actions))
}

fn view(ctx: &BuildCtx<'_>, record: &str, representation: ViewRepresentation) -> Result<Built> {
    let columns: Vec<&str> = ctx
        .program
        .records
        .get(record)
        .map(|schema| schema.field_names().collect())
        .unwrap_or_default();
    let mut element = Map::new();
    element.insert("record".to_owned(), json!(record));
    element.insert("representation".to_owned(), json!(representation));
    element.insert("columns".to_owned(), json!(columns));
    element.insert("rows".to_owned(), Value::Array(rows_value(ctx.read_rows(record)?)));
    Ok(Built::new(element))
}

fn chart(ctx: &BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::Chart { source, chart_type, x, y, explain } = &node.item.kind else {
        return Err(CompileError::internal("chart builder called on another kind"));
    };
    let mut element = Map::new();
    let rows = source_rows(ctx, source, "Chart source", &mut element)?;
    element.insert("chart_type".to_owned(), json!(chart_type));
    insert_opt(&mut element, "x", x.as_ref());
    insert_opt(&mut element, "y", y.as_ref());
    insert_opt(&mut element, "explain", explain.as_ref());
    element.insert("data".to_owned(), Value::Array(rows));
    Ok(Built::new(element))
}

// ————————————————————————————————————————————————————————————————————————————
// CHAT
// ————————————————————————————————————————————————————————————————————————————

fn chat(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    let I::Chat { style, show_avatars, group_messages, streaming, attachments, composer_placeholder, children } =
        &node.item.kind
    else {
        return Err(CompileError::internal("chat builder called on another kind"));
    };
    let (children, actions) = ctx.build_children(children, &node.path, node.visible)?;
    let mut element = Map::new();
    element.insert("style".to_owned(), json!(style));
    element.insert("show_avatars".to_owned(), json!(show_avatars));
    element.insert("group_messages".to_owned(), json!(group_messages));
    element.insert("streaming".to_owned(), json!(streaming));
    element.insert("attachments".to_owned(), json!(attachments));
    insert_opt(&mut element, "composer_placeholder", composer_placeholder.as_ref());
    element.insert("children".to_owned(), Value::Array(children));
    Ok(Built::with_actions(element, actions))
}

fn state_list(ctx: &BuildCtx<'_>, source: &[String], what: &str, key: &str) -> Result<Built> {
    let mut element = Map::new();
    element.insert("source".to_owned(), json!(render_state_path(source)));
    element.insert(key.to_owned(), Value::Array(ctx.state.read_list(source, what)?));
    Ok(Built::new(element))
}
