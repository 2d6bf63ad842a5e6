//! Containers: sections, rows, columns, compose blocks, sidebars, sticky
//! regions, conditionals, tabs and overlays.
//!
//! Children at `path + [i]`; containers with several child lists (sidebar
//! layouts, conditionals, tabs) insert the list index first, so the `j`-th
//! list's `i`-th child sits at `path + [j, i]`.
use serde_json::{Map, Value, json};

use crate::error::{CompileError, Result};
use crate::ir::{self, ItemKind as I};
use crate::manifest::builder::BuildCtx;
use crate::manifest::ids;
use crate::manifest::visibility::{evaluate_predicate, evaluate_visibility};

use super::{ActionMap, Built, Node, insert_opt, merge_actions};

pub fn build(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Option<Result<Built>> {
    let mut element = Map::new();
    let children = match &node.item.kind {
        I::Section { label, children } => {
            insert_opt(&mut element, "label", label.as_ref());
            children
        }
        I::Row { children } | I::Column { children } | I::CardGroup { children } => children,
        I::Compose { name, children } => {
            element.insert("name".to_owned(), json!(name));
            element.insert("slug".to_owned(), json!(ids::slugify(name)));
            children
        }
        I::Sticky { position, children } => {
            element.insert("position".to_owned(), json!(position));
            children
        }
        I::Modal { label, children } | I::Drawer { label, children } => {
            let kind = if matches!(node.item.kind, I::Modal { .. }) { "modal" } else { "drawer" };
            element.insert("id".to_owned(), json!(ids::overlay_id(&ctx.slug, kind, label)));
            element.insert("label".to_owned(), json!(label));
            element.insert("open".to_owned(), Value::Bool(false));
            children
        }
        I::SidebarLayout { sidebar, main } => return Some(sidebar_layout(ctx, node, sidebar, main)),
        I::Conditional { condition, then, otherwise } => {
            return Some(conditional(ctx, node, condition, then, otherwise.as_deref()));
        }
        I::Tabs { tabs, default } => return Some(tabs_element(ctx, node, tabs, default)),
        _ => return None,
    };
    Some(ctx.build_children(children, &node.path, node.visible).map(|(children, actions)| {
        element.insert("children".to_owned(), Value::Array(children));
        Built::with_actions(element, actions)
    }))
}

fn nested_path(node: &Node<'_>, list: usize) -> Vec<usize> {
    let mut path = node.path.clone();
    path.push(list);
    path
}

fn sidebar_layout(
    ctx: &mut BuildCtx<'_>,
    node: &Node<'_>,
    sidebar: &[ir::PageItem],
    main: &[ir::PageItem],
) -> Result<Built> {
    let (sidebar, mut actions) = ctx.build_children(sidebar, &nested_path(node, 0), node.visible)?;
    let (main, main_actions) = ctx.build_children(main, &nested_path(node, 1), node.visible)?;
    merge_actions(&mut actions, main_actions)?;
    let mut element = Map::new();
    element.insert("sidebar".to_owned(), Value::Array(sidebar));
    element.insert("main".to_owned(), Value::Array(main));
    Ok(Built::with_actions(element, actions))
}

/// The branch not taken is built hidden.
fn conditional(
    ctx: &mut BuildCtx<'_>,
    node: &Node<'_>,
    condition: &ir::Expr,
    then: &[ir::PageItem],
    otherwise: Option<&[ir::PageItem]>,
) -> Result<Built> {
    let evaluated = evaluate_predicate(condition, &ctx.state, node.item.meta.span)?;
    let taken = evaluated.visible;
    let mut element = Map::new();
    element.insert("condition".to_owned(), evaluated.info);

    let (then, mut actions) = ctx.build_children(then, &nested_path(node, 0), node.visible && taken)?;
    element.insert("then".to_owned(), Value::Array(then));
    if let Some(otherwise) = otherwise {
        let (otherwise, else_actions) = ctx.build_children(otherwise, &nested_path(node, 1), node.visible && !taken)?;
        merge_actions(&mut actions, else_actions)?;
        element.insert("else".to_owned(), Value::Array(otherwise));
    }
    Ok(Built::with_actions(element, actions))
}

/// `active` is the default tab when it is visible, else the first visible
/// tab.
fn tabs_element(ctx: &mut BuildCtx<'_>, node: &Node<'_>, tabs: &[ir::Tab], default: &str) -> Result<Built> {
    if tabs.is_empty() {
        return Err(CompileError::internal("empty tabs block survived lowering"));
    }
    let mut actions = ActionMap::new();
    let mut out = Vec::with_capacity(tabs.len());
    let mut visible_labels = Vec::new();
    for (index, tab) in tabs.iter().enumerate() {
        let tab_visible = evaluate_visibility(tab.visibility.as_ref(), None, &ctx.state, tab.span)?
            .is_none_or(|evaluated| evaluated.visible);
        if tab_visible {
            visible_labels.push(tab.label.as_str());
        }
        let (children, tab_actions) =
            ctx.build_children(&tab.children, &nested_path(node, index), node.visible && tab_visible)?;
        merge_actions(&mut actions, tab_actions).map_err(|err| err.at(tab.span))?;
        out.push(json!({"label": tab.label, "visible": tab_visible, "children": children}));
    }
    let active = if visible_labels.contains(&default) {
        Some(default)
    } else {
        visible_labels.first().copied()
    };
    let mut element = Map::new();
    element.insert("tabs".to_owned(), Value::Array(out));
    element.insert("default".to_owned(), json!(default));
    element.insert("active".to_owned(), json!(active));
    Ok(Built::with_actions(element, actions))
}
