//! Non-fatal findings over a built manifest.
//!
//! Passes run in a fixed order and only read the manifest. Each finding is
//! appended to the caller's accumulator and mirrored as a `warn!` event.
use serde_json::Value;
use tracing::warn;

use crate::error::Warning;
use crate::ir;

use super::elements::{page_roots, walk_elements};

type Pass = fn(&ir::Program, &Value, &Value, &mut Vec<Warning>);

const PASSES: &[Pass] = &[unused_uploads, missing_empty_states, unreachable_overlays];

pub fn run_passes(program: &ir::Program, pages: &[Value], warnings: &mut Vec<Warning>) {
    let start = warnings.len();
    for pass in PASSES {
        for page in pages {
            let mut visit = |element: &Value| pass(program, page, element, warnings);
            walk_elements(page_roots(page), &mut visit);
        }
    }
    for warning in &warnings[start..] {
        warn!(code = %warning.code, element_id = warning.element_id.as_deref(), "{}", warning.message);
    }
}

fn located(code: &str, message: String, element: &Value) -> Warning {
    let number = |key: &str| element.get(key).and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok());
    Warning::new(code, message)
        .at(number("line"), number("column"))
        .on_element(element.get("element_id").and_then(Value::as_str))
}

fn field<'v>(value: &'v Value, key: &str) -> &'v str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn unused_uploads(program: &ir::Program, page: &Value, element: &Value, warnings: &mut Vec<Warning>) {
    if field(element, "type") != "upload" {
        return;
    }
    let name = field(element, "name");
    if !program.upload_references.contains(name) {
        warnings.push(located(
            "upload.unused",
            format!("Upload '{name}' on page '{}' is not read by any flow", field(page, "name")),
            element,
        ));
    }
}

fn missing_empty_states(_: &ir::Program, page: &Value, element: &Value, warnings: &mut Vec<Warning>) {
    let kind = field(element, "type");
    if kind != "table" && kind != "list" {
        return;
    }
    let hidden = element.get("empty_state_hidden") == Some(&Value::Bool(true));
    if element.get("empty_text").is_none() && !hidden {
        let noun = if kind == "table" { "Table" } else { "List" };
        warnings.push(located(
            "view.missing_empty_state",
            format!(
                "{noun} on page '{}' has no empty state; add empty text or hide the empty state",
                field(page, "name")
            ),
            element,
        ));
    }
}

fn unreachable_overlays(_: &ir::Program, page: &Value, element: &Value, warnings: &mut Vec<Warning>) {
    let kind = field(element, "type");
    if kind != "modal" && kind != "drawer" {
        return;
    }
    let opened = element.get("opened_by").and_then(Value::as_array).is_some_and(|ids| !ids.is_empty());
    if !opened {
        let noun = if kind == "modal" { "Modal" } else { "Drawer" };
        warnings.push(located(
            "overlay.unreachable",
            format!("{noun} '{}' on page '{}' is never opened", field(element, "label"), field(page, "name")),
            element,
        ));
    }
}
