//! Element builders.
//!
//! Each family module exposes one `build` function that either recognizes
//! the IR node (`Some`) or passes (`None`). [`dispatch`] walks the families
//! in a fixed order: misc → view → rag → polish → layout → action. A node no
//! family recognizes is an internal error.
pub mod action;
pub mod layout;
pub mod misc;
pub mod polish;
pub mod rag;
pub mod view;

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::error::{CompileError, Result};
use crate::ir::{self, ItemKind as I};

use super::builder::{BuildCtx, duplicate_action};
use super::ids;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Action id → registry entry, sorted by id.
pub type ActionMap = BTreeMap<String, Value>;

/// An IR item positioned in the page tree.
#[derive(Debug)]
pub struct Node<'n> {
    pub item: &'n ir::PageItem,
    pub path: Vec<usize>,
    pub element_id: String,
    /// Effective visibility, ancestors included.
    pub visible: bool,
}

/// Type-specific element fields plus the actions the element (and its
/// subtree) registered.
#[derive(Debug, Default)]
pub struct Built {
    pub element: Map<String, Value>,
    pub actions: ActionMap,
}

impl Built {
    pub fn new(element: Map<String, Value>) -> Self {
        Self { element, actions: ActionMap::new() }
    }

    pub fn with_actions(element: Map<String, Value>, actions: ActionMap) -> Self {
        Self { element, actions }
    }
}

type Builder = fn(&mut BuildCtx<'_>, &Node<'_>) -> Option<Result<Built>>;

const CHAIN: &[(&str, Builder)] = &[
    ("misc", misc::build),
    ("view", view::build),
    ("rag", rag::build),
    ("polish", polish::build),
    ("layout", layout::build),
    ("action", action::build),
];

// ————————————————————————————————————————————————————————————————————————————
// DISPATCH
// ————————————————————————————————————————————————————————————————————————————

pub fn dispatch(ctx: &mut BuildCtx<'_>, node: &Node<'_>) -> Result<Built> {
    for (family, builder) in CHAIN {
        if let Some(built) = builder(ctx, node) {
            trace!(element_id = %node.element_id, family = *family, "built element");
            return built;
        }
    }
    Err(CompileError::internal(format!(
        "No element builder recognizes '{}'",
        type_tag(&node.item.kind)
    )))
}

/// Manifest `type` of an element; also the element id's type segment.
pub fn type_tag(kind: &I) -> &'static str {
    match kind {
        I::Title { .. } => "title",
        I::Text { .. } => "text",
        I::Divider => "divider",
        I::Image { .. } => "image",
        I::Icon { .. } => "icon",
        I::Lightbox { .. } => "lightbox",
        I::Loading { .. } => "loading",
        I::Snackbar { .. } => "snackbar",
        I::Tooltip { .. } => "tooltip",
        I::Button { .. } => "button",
        I::Link { .. } => "link",
        I::TextInput { .. } => "input",
        I::Slider { .. } => "slider",
        I::Section { .. } => "section",
        I::Row { .. } => "row",
        I::Column { .. } => "column",
        I::Grid { .. } => "grid",
        I::Card { .. } => "card",
        I::CardGroup { .. } => "card_group",
        I::Compose { .. } => "compose",
        I::Modal { .. } => "modal",
        I::Drawer { .. } => "drawer",
        I::Tabs { .. } => "tabs",
        I::Table { .. } => "table",
        I::List { .. } => "list",
        I::Form { .. } => "form",
        I::View { .. } => "view",
        I::Number { .. } => "number",
        I::Chart { .. } => "chart",
        I::Chat { .. } => "chat",
        I::ChatMessages { .. } => "messages",
        I::ChatComposer { .. } => "composer",
        I::ChatThinking { .. } => "thinking",
        I::ChatCitations { .. } => "citations",
        I::ChatMemory { .. } => "memory",
        I::Story { .. } => "story",
        I::Upload { .. } => "upload",
        I::CustomComponent { .. } => "custom_component",
        I::CitationChips { .. } => "citation_chips",
        I::SourcePreview { .. } => "source_preview",
        I::TrustIndicator { .. } => "trust_indicator",
        I::ScopeSelector { .. } => "scope_selector",
        I::SidebarLayout { .. } => "sidebar_layout",
        I::Sticky { .. } => "sticky",
        I::Conditional { .. } => "conditional",
        I::ThemeSettings => "theme_settings",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ACTION HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `{type, ...}` for an IR action. Overlay targets become overlay ids.
pub fn action_payload(action: &ir::Action, slug: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    let (kind, target) = match action {
        ir::Action::CallFlow { flow } => {
            payload.insert("type".to_owned(), json!("call_flow"));
            payload.insert("flow".to_owned(), json!(flow));
            return payload;
        }
        ir::Action::NavigateTo { page } => {
            payload.insert("type".to_owned(), json!("open_page"));
            payload.insert("target".to_owned(), json!(page));
            return payload;
        }
        ir::Action::GoBack => {
            payload.insert("type".to_owned(), json!("go_back"));
            return payload;
        }
        ir::Action::OpenModal { target } => ("open_modal", ids::overlay_id(slug, "modal", target)),
        ir::Action::CloseModal { target } => ("close_modal", ids::overlay_id(slug, "modal", target)),
        ir::Action::OpenDrawer { target } => ("open_drawer", ids::overlay_id(slug, "drawer", target)),
        ir::Action::CloseDrawer { target } => ("close_drawer", ids::overlay_id(slug, "drawer", target)),
    };
    payload.insert("type".to_owned(), json!(kind));
    payload.insert("target".to_owned(), json!(target));
    payload
}

/// Registry entry: `{id, <payload>, source_element_id}`.
pub fn action_entry(id: &str, element_id: &str, payload: Map<String, Value>) -> Value {
    let mut entry = Map::new();
    entry.insert("id".to_owned(), json!(id));
    entry.extend(payload);
    entry.insert("source_element_id".to_owned(), json!(element_id));
    Value::Object(entry)
}

/// Allocates and registers one action; returns its id.
pub fn register(
    ctx: &mut BuildCtx<'_>,
    actions: &mut ActionMap,
    node: &Node<'_>,
    kind: &str,
    key: &str,
    payload: Map<String, Value>,
) -> String {
    let id = ctx.allocate_action(kind, key, &node.element_id);
    actions.insert(id.clone(), action_entry(&id, &node.element_id, payload));
    id
}

/// Folds a nested list's actions into `into`; a repeated id is fatal.
pub fn merge_actions(into: &mut ActionMap, from: ActionMap) -> Result<()> {
    for (id, action) in from {
        if into.contains_key(&id) {
            return Err(duplicate_action(&id));
        }
        into.insert(id, action);
    }
    Ok(())
}

/// Labelled actions of cards, table rows and list items. Returns the
/// element-side descriptors and the registry entries.
pub fn entry_actions(
    ctx: &mut BuildCtx<'_>,
    node: &Node<'_>,
    kind: &str,
    owner: Option<&str>,
    entries: &[ir::EntryAction],
) -> (Vec<Value>, ActionMap) {
    let mut actions = ActionMap::new();
    let mut descriptors = Vec::with_capacity(entries.len());
    for entry in entries {
        let key = match owner {
            Some(owner) => format!("{owner} {}", entry.label),
            None => entry.label.clone(),
        };
        let mut payload = action_payload(&entry.action, &ctx.slug);
        payload.insert("label".to_owned(), json!(entry.label));
        let id = register(ctx, &mut actions, node, kind, &key, payload.clone());

        let mut descriptor = Map::new();
        descriptor.insert("id".to_owned(), json!(id));
        descriptor.extend(payload);
        descriptors.push(Value::Object(descriptor));
    }
    (descriptors, actions)
}

// ————————————————————————————————————————————————————————————————————————————
// TREE HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Keys under which an element nests child elements.
pub const CHILD_KEYS: &[&str] = &["children", "then", "else", "sidebar", "main"];

/// Child elements of a built element, in document order.
pub fn child_elements(element: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    for key in CHILD_KEYS {
        if let Some(Value::Array(children)) = element.get(*key) {
            out.extend(children);
        }
    }
    if let Some(Value::Array(tabs)) = element.get("tabs") {
        for tab in tabs {
            if let Some(Value::Array(children)) = tab.get("children") {
                out.extend(children);
            }
        }
    }
    out
}

/// Every element of a tree, pre-order.
pub fn walk_elements<'v>(elements: impl IntoIterator<Item = &'v Value>, visit: &mut impl FnMut(&'v Value)) {
    for element in elements {
        visit(element);
        walk_elements(child_elements(element), visit);
    }
}

/// Top-level elements of a built page payload (flat or layout).
pub fn page_roots(page: &Value) -> Vec<&Value> {
    if let Some(Value::Array(elements)) = page.get("elements") {
        return elements.iter().collect();
    }
    let mut out = Vec::new();
    if let Some(Value::Object(layout)) = page.get("layout") {
        for slot in layout.values() {
            if let Value::Array(elements) = slot {
                out.extend(elements);
            }
        }
    }
    out
}

pub fn page_roots_mut(page: &mut Value) -> Vec<&mut Value> {
    let Value::Object(page) = page else { return Vec::new() };
    if page.contains_key("elements") {
        return match page.get_mut("elements") {
            Some(Value::Array(elements)) => elements.iter_mut().collect(),
            _ => Vec::new(),
        };
    }
    match page.get_mut("layout") {
        Some(Value::Object(layout)) => layout.values_mut().filter_map(Value::as_array_mut).flatten().collect(),
        _ => Vec::new(),
    }
}

pub fn insert_opt<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_owned(), json!(value));
    }
}

// ------------------------------- Tests ------------------------------------ //
