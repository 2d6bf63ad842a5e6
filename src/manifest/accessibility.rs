//! Accessibility metadata: roles, labels, focus order and keyboard hints.
//!
//! Runs over built pages. Hidden elements are annotated like visible ones
//! but never enter the focus order; closed overlays and inactive tabs are
//! not traversed. Focusable roles on visible elements get a `tab_order`
//! counting up per page in document order.
use serde_json::{Map, Value, json};

use super::elements::{CHILD_KEYS, page_roots_mut};

const FOCUSABLE_ROLES: &[&str] = &["button", "link", "textbox", "checkbox", "spinbutton", "slider", "tab"];

pub fn annotate_pages(pages: &mut [Value]) {
    for page in pages {
        let mut order = 0usize;
        for element in page_roots_mut(page) {
            annotate(element, &mut order);
        }
    }
}

fn descriptor(role: &str, label: Option<&str>, order: Option<&mut usize>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("role".to_owned(), json!(role));
    if let Some(label) = label {
        out.insert("label".to_owned(), json!(label));
    }
    if let Some(order) = order {
        if FOCUSABLE_ROLES.contains(&role) {
            *order += 1;
            out.insert("tab_order".to_owned(), json!(*order));
        }
    }
    out
}

fn text<'v>(object: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
    object.get(key).and_then(Value::as_str)
}

fn has_entries(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).and_then(Value::as_array).is_some_and(|items| !items.is_empty())
}

fn selectable(object: &Map<String, Value>) -> bool {
    text(object, "selection").is_some_and(|selection| selection != "none")
}

fn field_role(type_name: &str) -> &'static str {
    match type_name {
        "number" | "int" | "integer" | "float" => "spinbutton",
        "boolean" | "bool" => "checkbox",
        _ => "textbox",
    }
}

/// Labels entry actions; `order` is given only where they are focusable.
fn annotate_entries(object: &mut Map<String, Value>, key: &str, mut order: Option<&mut usize>) {
    if let Some(Value::Array(entries)) = object.get_mut(key) {
        for entry in entries {
            if let Value::Object(entry) = entry {
                let label = text(entry, "label").map(str::to_owned);
                let a11y = descriptor("button", label.as_deref(), order.as_deref_mut());
                entry.insert("accessibility".to_owned(), Value::Object(a11y));
            }
        }
    }
}

fn annotate(element: &mut Value, order: &mut usize) {
    let Value::Object(object) = element else { return };
    let visible = object.get("visible") != Some(&Value::Bool(false));
    let kind = text(object, "type").unwrap_or_default().to_owned();
    let label = text(object, "label").map(str::to_owned);
    let a11y = match kind.as_str() {
        "button" | "link" => Some(descriptor(&kind, label.as_deref(), visible.then_some(&mut *order))),
        "input" => Some(descriptor("textbox", label.as_deref().or(text(object, "name")), visible.then_some(&mut *order))),
        "slider" => Some(descriptor("slider", label.as_deref(), visible.then_some(&mut *order))),
        "upload" => Some(descriptor("button", label.as_deref(), visible.then_some(&mut *order))),
        "composer" => Some(descriptor("textbox", Some("Message"), visible.then_some(&mut *order))),
        "form" => {
            let record = text(object, "record").map(str::to_owned);
            if let Some(Value::Array(fields)) = object.get_mut("fields") {
                for field in fields.iter_mut() {
                    if let Value::Object(field) = field {
                        let role = field_role(text(field, "type").unwrap_or("text"));
                        let name = text(field, "name").map(str::to_owned);
                        let a11y = descriptor(role, name.as_deref(), visible.then_some(&mut *order));
                        field.insert("accessibility".to_owned(), Value::Object(a11y));
                    }
                }
            }
            Some(descriptor("form", record.as_deref(), None))
        }
        "table" => {
            let role = if selectable(object) || has_entries(object, "row_actions") { "grid" } else { "table" };
            annotate_entries(object, "row_actions", None);
            Some(descriptor(role, None, None))
        }
        "list" => {
            let role = if selectable(object) || has_entries(object, "actions") { "listbox" } else { "list" };
            annotate_entries(object, "actions", None);
            Some(descriptor(role, None, None))
        }
        "view" => {
            let role = if text(object, "representation") == Some("table") { "table" } else { "list" };
            Some(descriptor(role, text(object, "record"), None))
        }
        "card" => {
            annotate_entries(object, "actions", visible.then_some(&mut *order));
            None
        }
        "tabs" => {
            annotate_tabs(object, order, visible);
            return;
        }
        "modal" | "drawer" => {
            let role = if kind == "modal" { "dialog" } else { "complementary" };
            let mut a11y = descriptor(role, label.as_deref(), None);
            a11y.insert("focus".to_owned(), json!({"entry": "overlay", "containment": true, "restoration": "opener"}));
            a11y.insert("keyboard".to_owned(), json!({"dismissal": "escape"}));
            object.insert("accessibility".to_owned(), Value::Object(a11y));
            if object.get("open") != Some(&Value::Bool(true)) {
                return;
            }
            None
        }
        _ => None,
    };
    if let Some(a11y) = a11y {
        object.insert("accessibility".to_owned(), Value::Object(a11y));
    }
    for key in CHILD_KEYS {
        if let Some(Value::Array(children)) = object.get_mut(*key) {
            for child in children {
                annotate(child, order);
            }
        }
    }
}

/// Only the active tab's panel is in the focus order.
fn annotate_tabs(object: &mut Map<String, Value>, order: &mut usize, visible: bool) {
    let active = text(object, "active").map(str::to_owned);
    let mut a11y = descriptor("tablist", None, None);
    a11y.insert("focus".to_owned(), json!({"entry": "active_tab"}));
    a11y.insert("keyboard".to_owned(), json!({"navigation": "arrow"}));
    object.insert("accessibility".to_owned(), Value::Object(a11y));

    let Some(Value::Array(tabs)) = object.get_mut("tabs") else { return };
    for tab in tabs {
        let Value::Object(tab) = tab else { continue };
        let focusable = visible && tab.get("visible") != Some(&Value::Bool(false));
        let label = text(tab, "label").map(str::to_owned);
        let selected = label.is_some() && label == active;
        let mut a11y = descriptor("tab", label.as_deref(), focusable.then_some(&mut *order));
        a11y.insert("selected".to_owned(), Value::Bool(selected));
        tab.insert("accessibility".to_owned(), Value::Object(a11y));
        if selected {
            if let Some(Value::Array(children)) = tab.get_mut("children") {
                for child in children {
                    annotate(child, order);
                }
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
