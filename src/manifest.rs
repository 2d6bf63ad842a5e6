//! Manifest building: validated IR + runtime state + storage → manifest JSON.
//!
//! ```text
//! { "pages":          [ {name, slug, elements | layout, purpose?, debug_only?} ],
//!   "actions":        { "<action id>": {id, type, ..., source_element_id} },
//!   "theme":          {schema_version, setting, current, tokens},
//!   "state_defaults": {app, pages},
//!   "ui":             {settings, persistence} }
//! ```
//!
//! A build is a pure function of its inputs: the same IR, state snapshot and
//! storage contents always render to the same canonical JSON. Every
//! accumulator (claimed action ids, warnings) belongs to one call.
pub mod accessibility;
pub mod builder;
pub mod elements;
pub mod eval;
pub mod ids;
pub mod state;
pub mod storage;
pub mod theme;
pub mod visibility;
pub mod warnings;

use std::collections::BTreeMap;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::{CompileError, ErrorKind, Result, Warning};
use crate::ir;

use builder::{BuildCtx, duplicate_action};
use elements::{ActionMap, CHILD_KEYS, merge_actions, page_roots_mut};
use state::StateContext;

pub use storage::{MemoryStorage, RecordScope, Row, Storage, StorageError, StorageMetadata};

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

pub const DEFAULT_ROW_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Everything, debug-only elements included.
    #[default]
    Studio,
    /// Debug-only pages, elements and actions removed.
    Production,
}

impl FromStr for DisplayMode {
    type Err = CompileError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "studio" => Ok(Self::Studio),
            "production" => Ok(Self::Production),
            other => Err(CompileError::new(
                ErrorKind::Input,
                format!("Display mode '{other}' must be studio or production"),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub display_mode: DisplayMode,
    /// `light`, `dark` or `system`; overrides the declared setting.
    pub runtime_theme: Option<String>,
    /// The viewer; `identity.id` scopes owned records.
    pub identity: Option<Value>,
    /// Rows read per data-bound element.
    pub row_limit: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { display_mode: DisplayMode::default(), runtime_theme: None, identity: None, row_limit: DEFAULT_ROW_LIMIT }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

pub fn build_manifest(
    program: &ir::Program,
    state: &Value,
    storage: &dyn Storage,
    options: &BuildOptions,
    warnings: &mut Vec<Warning>,
) -> Result<Value> {
    let theme = theme::theme_manifest(program, options.runtime_theme.as_deref())?;
    let app_tokens = theme::app_tokens(program);

    let mut taken = IndexSet::new();
    let mut registry = ActionMap::new();
    let mut pages = Vec::with_capacity(program.pages.len());
    for page in &program.pages {
        let Some((payload, actions)) = build_page(program, page, state, storage, options, &app_tokens, &mut taken)?
        else {
            continue;
        };
        for (id, action) in actions {
            if registry.contains_key(&id) {
                return Err(duplicate_action(&id).at(page.span));
            }
            registry.insert(id, action);
        }
        pages.push(payload);
    }

    warnings::run_passes(program, &pages, warnings);
    if options.display_mode == DisplayMode::Production {
        strip_debug(&mut pages, &mut registry);
    }
    accessibility::annotate_pages(&mut pages);

    info!(
        pages = pages.len(),
        actions = registry.len(),
        mode = ?options.display_mode,
        warnings = warnings.len(),
        "built manifest"
    );
    Ok(json!({
        "pages": pages,
        "actions": registry,
        "theme": theme,
        "state_defaults": state::manifest_state_defaults(program),
        "ui": theme::ui_manifest(program, &storage.metadata()),
    }))
}

/// Renders `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let ordered: BTreeMap<&String, &Value> = map.iter().collect();
                Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

// ————————————————————————————————————————————————————————————————————————————
// PAGES
// ————————————————————————————————————————————————————————————————————————————

/// `None` when the page's own visibility is false.
fn build_page(
    program: &ir::Program,
    page: &ir::Page,
    state: &Value,
    storage: &dyn Storage,
    options: &BuildOptions,
    app_tokens: &IndexMap<String, String>,
    taken: &mut IndexSet<String>,
) -> Result<Option<(Value, ActionMap)>> {
    let slug = ids::slugify(&page.name);
    let state = StateContext::new(state, &page.state_defaults, &program.state_defaults);
    let page_visibility =
        visibility::evaluate_visibility(page.visibility.as_ref(), page.visibility_rule.as_ref(), &state, page.span)?;
    if page_visibility.is_some_and(|evaluated| !evaluated.visible) {
        debug!(page = %page.name, "page hidden by its visibility rule");
        return Ok(None);
    }
    debug!(page = %page.name, slug, "building page");

    let mut ctx = BuildCtx {
        program,
        page,
        slug: slug.clone(),
        state,
        storage,
        options,
        taken,
        page_tokens: theme::page_tokens(app_tokens, page),
    };
    let mut payload = Map::new();
    payload.insert("name".to_owned(), json!(page.name));
    payload.insert("slug".to_owned(), json!(slug));
    let mut actions = match &page.body {
        ir::PageBody::Elements(items) => {
            let (elements, actions) = ctx.build_children(items, &[], true)?;
            payload.insert("elements".to_owned(), Value::Array(elements));
            actions
        }
        ir::PageBody::Layout(layout) => {
            let mut slots = Map::new();
            let mut actions = ActionMap::new();
            for (index, (name, items)) in layout.slots().into_iter().enumerate() {
                let (elements, slot_actions) = ctx.build_children(items, &[index], true)?;
                merge_actions(&mut actions, slot_actions).map_err(|err| err.at(page.span))?;
                slots.insert(name.to_owned(), Value::Array(elements));
            }
            payload.insert("layout".to_owned(), Value::Object(slots));
            actions
        }
    };
    if let Some(purpose) = &page.purpose {
        payload.insert("purpose".to_owned(), json!(purpose));
    }
    if page.debug_only {
        payload.insert("debug_only".to_owned(), Value::Bool(true));
        for action in actions.values_mut() {
            if let Value::Object(action) = action {
                action.insert("debug_only".to_owned(), Value::Bool(true));
            }
        }
    }

    let mut payload = Value::Object(payload);
    wire_overlays(&mut payload, &actions);
    Ok(Some((payload, actions)))
}

/// Gives each page-root modal and drawer the sorted ids of the actions
/// that open it.
fn wire_overlays(page: &mut Value, actions: &ActionMap) {
    let mut openers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (id, action) in actions {
        let kind = action.get("type").and_then(Value::as_str);
        if matches!(kind, Some("open_modal" | "open_drawer")) {
            if let Some(target) = action.get("target").and_then(Value::as_str) {
                openers.entry(target).or_default().push(id);
            }
        }
    }
    for element in page_roots_mut(page) {
        let Value::Object(object) = element else { continue };
        if !matches!(object.get("type").and_then(Value::as_str), Some("modal" | "drawer")) {
            continue;
        }
        let ids = object
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| openers.get(id))
            .cloned()
            .unwrap_or_default();
        object.insert("opened_by".to_owned(), json!(ids));
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PRODUCTION FILTER
// ————————————————————————————————————————————————————————————————————————————

fn is_debug(value: &Value) -> bool {
    value.get("debug_only") == Some(&Value::Bool(true))
}

fn strip_debug(pages: &mut Vec<Value>, registry: &mut ActionMap) {
    pages.retain(|page| !is_debug(page));
    registry.retain(|_, action| !is_debug(action));
    for page in pages.iter_mut() {
        let Value::Object(object) = page else { continue };
        if let Some(Value::Array(elements)) = object.get_mut("elements") {
            strip_debug_elements(elements);
        }
        if let Some(Value::Object(layout)) = object.get_mut("layout") {
            for slot in layout.values_mut() {
                if let Value::Array(elements) = slot {
                    strip_debug_elements(elements);
                }
            }
        }
        for element in page_roots_mut(page) {
            if let Some(Value::Array(opened_by)) = element.get_mut("opened_by") {
                opened_by.retain(|id| id.as_str().is_some_and(|id| registry.contains_key(id)));
            }
        }
    }
}

fn strip_debug_elements(elements: &mut Vec<Value>) {
    elements.retain(|element| !is_debug(element));
    for element in elements.iter_mut() {
        let Value::Object(object) = element else { continue };
        for key in CHILD_KEYS {
            if let Some(Value::Array(children)) = object.get_mut(*key) {
                strip_debug_elements(children);
            }
        }
        if let Some(Value::Array(tabs)) = object.get_mut("tabs") {
            for tab in tabs {
                if let Some(Value::Array(children)) = tab.get_mut("children") {
                    strip_debug_elements(children);
                }
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::lower::lower_program;

    fn compile(program: Value) -> ir::Program {
        let program: ast::Program = serde_json::from_value(program).unwrap();
        lower_program(&program).unwrap()
    }

    fn build(program: &ir::Program, state: Value, options: &BuildOptions) -> (Value, Vec<Warning>) {
        let mut warnings = Vec::new();
        let manifest = build_manifest(program, &state, &MemoryStorage::new(), options, &mut warnings).unwrap();
        (manifest, warnings)
    }

    #[test]
    fn canonical_rendering_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": [{"z": 0, "y": 1}], "c": null}});
        assert_eq!(canonical_json(&value), r#"{"a":{"c":null,"d":[{"y":1,"z":0}]},"b":1}"#);
    }

    #[test]
    fn display_modes_parse() {
        assert_eq!("production".parse::<DisplayMode>().unwrap(), DisplayMode::Production);
        assert_eq!("studio".parse::<DisplayMode>().unwrap(), DisplayMode::Studio);
        assert_eq!("debug".parse::<DisplayMode>().unwrap_err().kind, ErrorKind::Input);
    }

    #[test]
    fn envelope_and_actions() {
        let program = compile(json!({
            "flows": ["save"],
            "pages": [{"name": "Home", "items": [
                {"type": "title", "value": "Welcome", "line": 2, "column": 3},
                {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "save"}},
            ]}],
        }));
        let (manifest, _) = build(&program, json!({}), &BuildOptions::default());
        let title = &manifest["pages"][0]["elements"][0];
        assert_eq!(title["element_id"], json!("page.home.title.0"));
        assert_eq!(title["line"], json!(2));
        assert_eq!(title["visible"], json!(true));
        let action = &manifest["actions"]["page.home.button.save"];
        assert_eq!(action["type"], json!("call_flow"));
        assert_eq!(action["source_element_id"], json!("page.home.button.1"));
    }

    #[test]
    fn production_strips_debug_elements_and_actions() {
        let program = compile(json!({
            "flows": ["inspect"],
            "pages": [
                {"name": "Home", "items": [
                    {"type": "text", "value": "visible"},
                    {"type": "button", "label": "Inspect", "debug_only": true,
                     "action": {"kind": "call_flow", "target": "inspect"}},
                ]},
                {"name": "Debug", "debug_only": true, "items": [{"type": "text", "value": "x"}]},
            ],
        }));
        let (studio, _) = build(&program, json!({}), &BuildOptions::default());
        assert_eq!(studio["pages"].as_array().unwrap().len(), 2);
        assert_eq!(studio["actions"]["page.home.button.inspect"]["debug_only"], json!(true));

        let options = BuildOptions { display_mode: DisplayMode::Production, ..BuildOptions::default() };
        let (production, _) = build(&program, json!({}), &options);
        assert_eq!(production["pages"].as_array().unwrap().len(), 1);
        assert_eq!(production["pages"][0]["elements"].as_array().unwrap().len(), 1);
        assert!(production["actions"].as_object().unwrap().is_empty());
    }

    #[test]
    fn hidden_pages_are_omitted() {
        let program = compile(json!({
            "pages": [{"name": "Admin", "visibility_rule": {"path": ["role"], "value": "admin"}, "items": []}],
        }));
        let (manifest, _) = build(&program, json!({"role": "viewer"}), &BuildOptions::default());
        assert!(manifest["pages"].as_array().unwrap().is_empty());
        let (manifest, _) = build(&program, json!({"role": "admin"}), &BuildOptions::default());
        assert_eq!(manifest["pages"][0]["slug"], json!("admin"));
    }

    #[test]
    fn overlays_know_their_openers() {
        let program = compile(json!({
            "pages": [{"name": "Home", "items": [
                {"type": "modal", "label": "Confirm", "children": [{"type": "text", "value": "Sure?"}]},
                {"type": "drawer", "label": "Help", "children": [{"type": "text", "value": "..."}]},
                {"type": "card", "label": "Order", "actions": [{"label": "Delete", "kind": "open_modal", "target": "Confirm"}]},
            ]}],
        }));
        let (manifest, warnings) = build(&program, json!({}), &BuildOptions::default());
        let modal = &manifest["pages"][0]["elements"][0];
        assert_eq!(modal["id"], json!("page.home.modal.confirm"));
        assert_eq!(modal["opened_by"], json!(["page.home.card.order_delete"]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "overlay.unreachable");
        assert_eq!(warnings[0].element_id.as_deref(), Some("page.home.drawer.1"));
    }
}
