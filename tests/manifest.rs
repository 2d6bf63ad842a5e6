use std::collections::BTreeSet;

use rstest::rstest;
use serde_json::{Value, json};

use page_manifest::error::{CompileError, ErrorKind, Warning};
use page_manifest::manifest::{BuildOptions, DisplayMode, MemoryStorage, canonical_json};
use page_manifest::{ast, compile};

fn build_with(
    program: Value,
    state: Value,
    storage: &MemoryStorage,
    options: &BuildOptions,
) -> Result<(Value, Vec<Warning>), CompileError> {
    let program: ast::Program = serde_json::from_value(program).unwrap();
    let mut warnings = Vec::new();
    compile(&program, &state, storage, options, &mut warnings).map(|manifest| (manifest, warnings))
}

fn build(program: Value, state: Value) -> Value {
    build_with(program, state, &MemoryStorage::new(), &BuildOptions::default()).unwrap().0
}

fn elements(manifest: &Value) -> impl Iterator<Item = &Value> {
    let mut stack: Vec<&Value> = Vec::new();
    for page in manifest["pages"].as_array().into_iter().flatten() {
        if let Some(items) = page["elements"].as_array() {
            stack.extend(items);
        }
        if let Some(slots) = page["layout"].as_object() {
            stack.extend(slots.values().filter_map(Value::as_array).flatten());
        }
    }
    let mut out = Vec::new();
    while let Some(element) = stack.pop() {
        out.push(element);
        for key in ["children", "then", "else", "sidebar", "main"] {
            stack.extend(element[key].as_array().into_iter().flatten());
        }
        for tab in element["tabs"].as_array().into_iter().flatten() {
            stack.extend(tab["children"].as_array().into_iter().flatten());
        }
    }
    out.into_iter()
}

/// A program exercising most element families on two pages.
fn storefront() -> Value {
    json!({
        "records": [
            {"name": "Order", "fields": [{"name": "id"}, {"name": "total", "type": "number"}, {"name": "status"}]},
        ],
        "flows": ["save", "refund", "search", "checkout"],
        "capabilities": ["uploads"],
        "upload_references": ["receipt"],
        "state_defaults": {"role": "viewer", "open": []},
        "pages": [
            {"name": "Orders", "items": [
                {"type": "title", "value": "Orders"},
                {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "save"}},
                {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "save"}},
                {"type": "table", "record": "Order", "empty_text": "No orders",
                 "sort": {"by": "total", "order": "desc"},
                 "row_actions": [{"label": "Refund", "kind": "call_flow", "target": "refund"},
                                 {"label": "Details", "kind": "open_modal", "target": "Order details"}]},
                {"type": "card_group", "children": [
                    {"type": "card", "label": "Open", "stat": {"label": "Count",
                        "value": {"kind": "list_op", "op": "length", "target": {"kind": "state_path", "path": ["open"]}}},
                     "actions": [{"label": "Save", "kind": "call_flow", "target": "save"}]},
                ]},
                {"type": "text_input", "name": "query", "flow": "search"},
                {"type": "upload", "name": "receipt", "accept": ["application/pdf", ".png"]},
                {"type": "form", "record": "Order"},
                {"type": "modal", "label": "Order details", "children": [{"type": "text", "value": "..."}]},
            ]},
            {"name": "Checkout", "items": [
                {"type": "section", "label": "Pay", "children": [
                    {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "checkout"}},
                ]},
                {"type": "tabs", "tabs": [
                    {"label": "Card", "children": [{"type": "text", "value": "card"}]},
                    {"label": "Invoice", "children": [{"type": "link", "label": "Back", "target": "Orders"}]},
                ]},
            ]},
        ],
    })
}

fn order_rows() -> MemoryStorage {
    MemoryStorage::from_value(
        json!({"Order": [
            {"id": "o3", "total": 30, "status": "open"},
            {"id": "o1", "total": 10, "status": "open"},
            {"id": "o2", "total": 20, "status": "paid"},
        ]}),
        None,
    )
    .unwrap()
}

// ————————————————————————————————————————————————————————————————————————————
// DETERMINISM & UNIQUENESS
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn repeated_builds_are_identical() {
    let storage = order_rows();
    let options = BuildOptions::default();
    let state = json!({"open": [1, 2, 3]});
    let (first, _) = build_with(storefront(), state.clone(), &storage, &options).unwrap();
    let (second, _) = build_with(storefront(), state, &storage, &options).unwrap();
    assert_eq!(canonical_json(&first), canonical_json(&second));
}

#[test]
fn every_action_id_is_unique_and_referenced_once() {
    let manifest = build(storefront(), json!({}));
    let registry = manifest["actions"].as_object().unwrap();
    let mut owners = BTreeSet::new();
    for element in elements(&manifest) {
        if let Some(id) = element["action_id"].as_str() {
            assert!(owners.insert(id.to_owned()), "action {id} owned twice");
            assert!(registry.contains_key(id), "action {id} not registered");
        }
    }
    let ids: Vec<&String> = registry.keys().collect();
    let sorted: Vec<&String> = {
        let mut sorted = ids.clone();
        sorted.sort();
        sorted
    };
    assert_eq!(ids, sorted, "registry is sorted by id");
    for (id, action) in registry {
        assert_eq!(action["id"].as_str(), Some(id.as_str()));
        assert!(action["source_element_id"].is_string());
    }
}

#[test]
fn same_label_actions_are_disambiguated() {
    let manifest = build(storefront(), json!({}));
    let actions = &manifest["actions"];
    assert_eq!(actions["page.orders.button.save"]["source_element_id"], json!("page.orders.button.1"));
    assert_eq!(actions["page.orders.button.save__button_2"]["source_element_id"], json!("page.orders.button.2"));
    // Same label on another page gets its own base id.
    assert_eq!(actions["page.checkout.button.save"]["flow"], json!("checkout"));
    assert_eq!(actions["page.orders.card.open_save"]["label"], json!("Save"));
}

// ————————————————————————————————————————————————————————————————————————————
// ELEMENTS
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn tables_read_rows_then_sort() {
    let (manifest, warnings) =
        build_with(storefront(), json!({}), &order_rows(), &BuildOptions::default()).unwrap();
    let table = &manifest["pages"][0]["elements"][3];
    assert_eq!(table["type"], json!("table"));
    let ids: Vec<&str> = table["rows"].as_array().unwrap().iter().map(|row| row["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["o3", "o2", "o1"]);
    assert_eq!(table["row_actions"][1]["type"], json!("open_modal"));
    assert_eq!(table["row_actions"][1]["target"], json!("page.orders.modal.order_details"));
    let modal = &manifest["pages"][0]["elements"][8];
    assert_eq!(modal["opened_by"], json!(["page.orders.table.details"]));
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn row_limit_caps_reads_before_sorting() {
    let options = BuildOptions { row_limit: 2, ..BuildOptions::default() };
    let (manifest, _) = build_with(storefront(), json!({}), &order_rows(), &options).unwrap();
    let rows = manifest["pages"][0]["elements"][3]["rows"].as_array().unwrap();
    // Storage order o3, o1 is read, then ordered by total descending.
    let ids: Vec<&str> = rows.iter().map(|row| row["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["o3", "o1"]);
}

#[test]
fn card_stats_evaluate_against_state() {
    let manifest = build(storefront(), json!({"open": [1, 2, 3]}));
    let stat = &manifest["pages"][0]["elements"][4]["children"][0]["stat"];
    assert_eq!(stat["label"], json!("Count"));
    assert_eq!(stat["value"], json!(3));
}

#[test]
fn element_owned_actions_are_registered() {
    let manifest = build(storefront(), json!({}));
    let actions = &manifest["actions"];
    assert_eq!(actions["page.orders.input.query"]["input_field"], json!("query"));
    assert_eq!(actions["page.orders.upload.receipt"]["type"], json!("upload_select"));
    assert_eq!(actions["page.orders.form.order"]["type"], json!("submit_form"));
    assert_eq!(actions["page.checkout.link.back"]["target"], json!("Orders"));
}

#[test]
fn tabs_activate_their_default() {
    let manifest = build(storefront(), json!({}));
    let tabs = &manifest["pages"][1]["elements"][1];
    assert_eq!(tabs["active"], json!("Card"));
    assert_eq!(tabs["tabs"][1]["children"][0]["element_id"], json!("page.checkout.link.1.1.0"));
    assert_eq!(tabs["accessibility"]["role"], json!("tablist"));
}

#[test]
fn hidden_default_tab_falls_back_to_first_visible() {
    let manifest = build(
        json!({"pages": [{"name": "Home", "items": [{
            "type": "tabs", "default": "Admin",
            "tabs": [
                {"label": "Admin", "visibility": {"kind": "comparison", "op": "eq",
                    "left": {"kind": "state_path", "path": ["role"]},
                    "right": {"kind": "literal", "value": "admin"}}},
                {"label": "Public"},
            ],
        }]}]}),
        json!({"role": "viewer"}),
    );
    let tabs = &manifest["pages"][0]["elements"][0];
    assert_eq!(tabs["tabs"][0]["visible"], json!(false));
    assert_eq!(tabs["active"], json!("Public"));
}

#[test]
fn layout_pages_keep_slot_paths() {
    let manifest = build(
        json!({"pages": [{"name": "Dash", "layout": {
            "header": [{"type": "title", "value": "Top"}],
            "main": [{"type": "text", "value": "a"}, {"type": "text", "value": "b"}],
        }}]}),
        json!({}),
    );
    let layout = &manifest["pages"][0]["layout"];
    assert_eq!(layout["header"][0]["element_id"], json!("page.dash.title.0.0"));
    assert_eq!(layout["main"][1]["element_id"], json!("page.dash.text.2.1"));
    assert_eq!(layout["footer"], json!([]));
}

// ————————————————————————————————————————————————————————————————————————————
// VISIBILITY
// ————————————————————————————————————————————————————————————————————————————

fn nested_visibility_program() -> Value {
    let shown = json!({"kind": "literal", "value": true});
    json!({
        "flows": ["go"],
        "pages": [{"name": "Home", "items": [
            {"type": "section", "label": "Outer",
             "visibility": {"kind": "state_path", "path": ["outer"]},
             "children": [
                {"type": "text", "value": "always", "visibility": shown},
                {"type": "column", "children": [
                    {"type": "button", "label": "Go", "action": {"kind": "call_flow", "target": "go"},
                     "show_when": shown},
                ]},
             ]},
            {"type": "conditional",
             "condition": {"kind": "state_path", "path": ["outer"]},
             "then": [{"type": "text", "value": "yes"}],
             "else": [{"type": "text", "value": "no"}]},
        ]}],
    })
}

#[rstest]
#[case(true)]
#[case(false)]
fn hidden_ancestors_hide_every_descendant(#[case] outer: bool) {
    let manifest = build(nested_visibility_program(), json!({"outer": outer}));
    let section = &manifest["pages"][0]["elements"][0];
    assert_eq!(section["visible"], json!(outer));
    for child in [&section["children"][0], &section["children"][1], &section["children"][1]["children"][0]] {
        assert_eq!(child["visible"], json!(outer), "{}", child["element_id"]);
    }
    assert_eq!(section["children"][0]["visibility"]["result"], json!(true));
    assert_eq!(manifest["actions"].as_object().unwrap().contains_key("page.home.button.go"), outer);

    let conditional = &manifest["pages"][0]["elements"][1];
    assert_eq!(conditional["condition"]["result"], json!(outer));
    assert_eq!(conditional["then"][0]["visible"], json!(outer));
    assert_eq!(conditional["else"][0]["visible"], json!(!outer));
    assert_eq!(conditional["else"][0]["element_id"], json!("page.home.text.1.1.0"));
}

#[test]
fn visible_elements_never_sit_under_hidden_ones() {
    for state in [json!({"outer": true}), json!({"outer": false})] {
        let manifest = build(nested_visibility_program(), state);
        for element in elements(&manifest) {
            if element["visible"] == json!(false) {
                for key in ["children", "then", "else"] {
                    for child in element[key].as_array().into_iter().flatten() {
                        assert_eq!(child["visible"], json!(false));
                    }
                }
            }
        }
    }
}

#[test]
fn both_visibility_forms_conflict() {
    let err = build_with(
        json!({"pages": [{"name": "Home", "items": [{
            "type": "text", "value": "x", "line": 2, "column": 1,
            "visibility": {"kind": "literal", "value": true},
            "visibility_rule": {"path": ["role"], "value": "admin"},
        }]}]}),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Visibility);
    assert_eq!(err.line, Some(2));
}

// ————————————————————————————————————————————————————————————————————————————
// COLLISIONS, THEME, MODES
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn explicit_ids_collide_across_pages() {
    let button = json!({"type": "button", "label": "Save", "id": "save", "action": {"kind": "call_flow", "target": "save"}});
    let err = build_with(
        json!({"flows": ["save"], "pages": [
            {"name": "One", "items": [button.clone()]},
            {"name": "Two", "items": [button]},
        ]}),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ActionCollision);
    assert_eq!(err.message, "Duplicate action id 'save'. Use a unique id or omit to auto-generate.");
}

#[rstest]
#[case(true)]
#[case(false)]
fn hidden_elements_still_collide_on_explicit_ids(#[case] hidden_first: bool) {
    let button = |visible: bool| {
        json!({"type": "button", "label": "Save", "id": "dup",
               "visibility": {"kind": "literal", "value": visible},
               "action": {"kind": "call_flow", "target": "save"}})
    };
    let items = if hidden_first { [button(false), button(true)] } else { [button(true), button(false)] };
    let err = build_with(
        json!({"flows": ["save"], "pages": [{"name": "Home", "items": items}]}),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ActionCollision);
    assert_eq!(err.message, "Duplicate action id 'dup'. Use a unique id or omit to auto-generate.");
}

#[test]
fn hidden_containers_check_nested_explicit_ids() {
    let err = build_with(
        json!({"flows": ["save"], "pages": [{"name": "Home", "items": [
            {"type": "button", "label": "Save", "id": "dup", "action": {"kind": "call_flow", "target": "save"}},
            {"type": "section", "visibility": {"kind": "literal", "value": false}, "children": [
                {"type": "button", "label": "Again", "id": "dup", "action": {"kind": "call_flow", "target": "save"}},
            ]},
        ]}]}),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ActionCollision);
}

#[rstest]
#[case(json!({}), false)]
#[case(json!({"is_admin": null}), false)]
#[case(json!({"is_admin": ""}), false)]
#[case(json!({"is_admin": "yes"}), true)]
#[case(json!({"is_admin": true}), true)]
fn bare_state_path_visibility_reads_truthiness(#[case] state: Value, #[case] visible: bool) {
    let manifest = build(
        json!({"pages": [{"name": "Home", "items": [
            {"type": "text", "value": "secret", "visibility": {"kind": "state_path", "path": ["is_admin"]}},
        ]}]}),
        state,
    );
    let text = &manifest["pages"][0]["elements"][0];
    assert_eq!(text["visible"], json!(visible));
    assert_eq!(text["visibility"]["predicate"], json!("state.is_admin"));
}

#[test]
fn path_rules_on_undeclared_state_fail() {
    let err = build_with(
        json!({"pages": [{"name": "Home", "items": [
            {"type": "text", "value": "x", "line": 3, "column": 5,
             "visibility_rule": {"path": ["role"], "value": "admin"}},
        ]}]}),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Visibility);
    assert_eq!(err.message, "Visibility rule requires declared state path 'state.role'.");
    assert_eq!((err.line, err.column), (Some(3), Some(5)));
}

#[test]
fn theme_overrides_merge_over_page_tokens() {
    let manifest = build(
        json!({
            "theme": {"tokens": {"primary_color": "#111111"}},
            "pages": [{"name": "Home", "theme": {"radius": "lg"}, "items": [
                {"type": "text", "value": "x", "theme_overrides": {"primary_color": "#ff0000"}},
            ]}],
        }),
        json!({}),
    );
    let element = &manifest["pages"][0]["elements"][0];
    assert_eq!(element["theme_overrides"], json!({"primary_color": "#ff0000"}));
    assert_eq!(element["theme"]["primary_color"], json!("#ff0000"));
    assert_eq!(element["theme"]["radius"], json!("lg"));
    assert_eq!(manifest["theme"]["tokens"]["primary_color"], json!("#111111"));
}

#[test]
fn unknown_override_tokens_fail_the_build() {
    let err = build_with(
        json!({"pages": [{"name": "Home", "items": [
            {"type": "text", "value": "x", "theme_overrides": {"primry_color": "#ff0000"}},
        ]}]}),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Theme);
    assert!(err.message.contains("Did you mean \"primary_color\"?"), "{}", err.message);
}

#[rstest]
#[case(Some("dark"), Ok("dark"))]
#[case(None, Ok("system"))]
#[case(Some("sepia"), Err(()))]
fn runtime_theme_selection(#[case] runtime: Option<&str>, #[case] expected: Result<&str, ()>) {
    let options = BuildOptions { runtime_theme: runtime.map(str::to_owned), ..BuildOptions::default() };
    let outcome = build_with(
        json!({"theme": {"setting": "system"}, "pages": [{"name": "Home"}]}),
        json!({}),
        &MemoryStorage::new(),
        &options,
    );
    match expected {
        Ok(current) => assert_eq!(outcome.unwrap().0["theme"]["current"], json!(current)),
        Err(()) => assert_eq!(outcome.unwrap_err().kind, ErrorKind::Theme),
    }
}

#[test]
fn production_mode_keeps_ids_stable() {
    let program = json!({
        "flows": ["save", "dump"],
        "pages": [{"name": "Home", "items": [
            {"type": "button", "label": "Dump", "debug_only": true, "action": {"kind": "call_flow", "target": "dump"}},
            {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "save"}},
        ]}],
    });
    let options = BuildOptions { display_mode: DisplayMode::Production, ..BuildOptions::default() };
    let (manifest, _) = build_with(program, json!({}), &MemoryStorage::new(), &options).unwrap();
    let elements = manifest["pages"][0]["elements"].as_array().unwrap();
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0]["element_id"], json!("page.home.button.1"));
    assert_eq!(manifest["actions"].as_object().unwrap().len(), 1);
}

#[test]
fn warnings_follow_pass_order() {
    let (_, warnings) = build_with(
        json!({
            "records": [{"name": "Task", "fields": [{"name": "id"}]}],
            "capabilities": ["uploads"],
            "pages": [{"name": "Home", "items": [
                {"type": "drawer", "label": "Help"},
                {"type": "list", "record": "Task"},
                {"type": "upload", "name": "scan"},
            ]}],
        }),
        json!({}),
        &MemoryStorage::new(),
        &BuildOptions::default(),
    )
    .unwrap();
    let codes: Vec<&str> = warnings.iter().map(|w| w.code.as_str()).collect();
    assert_eq!(codes, ["upload.unused", "view.missing_empty_state", "overlay.unreachable"]);
    assert_eq!(warnings[1].element_id.as_deref(), Some("page.home.list.1"));
}
