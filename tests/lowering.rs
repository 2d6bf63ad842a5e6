use rstest::rstest;
use serde_json::{Value, json};

use page_manifest::ast;
use page_manifest::error::{CompileError, ErrorKind};
use page_manifest::ir::{self, ItemKind as I};
use page_manifest::lower::lower_program;

fn lower(program: Value) -> Result<ir::Program, CompileError> {
    let program: ast::Program = serde_json::from_value(program).unwrap();
    lower_program(&program)
}

fn page_items(program: &ir::Program) -> &[ir::PageItem] {
    match &program.pages[0].body {
        ir::PageBody::Elements(items) => items,
        ir::PageBody::Layout(_) => panic!("expected an element page"),
    }
}

fn button(target: &str) -> Value {
    json!({"type": "button", "label": "Go", "action": {"kind": "call_flow", "target": target}})
}

// ————————————————————————————————————————————————————————————————————————————
// SUGGESTIONS
// ————————————————————————————————————————————————————————————————————————————

#[rstest]
#[case("sav", " Did you mean \"save\"?")]
#[case("submit_ordr", " Did you mean \"submit_order\"?")]
#[case("zzz", "")]
fn unknown_flows_suggest_only_close_names(#[case] target: &str, #[case] hint: &str) {
    let err = lower(json!({
        "flows": ["save", "submit_order"],
        "pages": [{"name": "Home", "items": [button(target)]}],
    }))
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, format!("Page 'Home' button 'Go' references unknown flow '{target}'.{hint}"));
}

#[test]
fn navigation_targets_must_exist() {
    let err = lower(json!({
        "pages": [
            {"name": "Home", "items": [
                {"type": "button", "label": "Next", "action": {"kind": "navigate_to", "target": "Setings"}},
            ]},
            {"name": "Settings"},
        ],
    }))
    .unwrap_err();
    assert!(err.message.ends_with("references unknown page 'Setings'. Did you mean \"Settings\"?"), "{}", err.message);
}

// ————————————————————————————————————————————————————————————————————————————
// STRUCTURE
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn table_with_both_sources_is_rejected() {
    let err = lower(json!({
        "records": [{"name": "Order", "fields": [{"name": "id"}]}],
        "pages": [{"name": "Orders", "items": [{
            "type": "table", "record": "Order", "line": 4, "column": 3,
            "source": {"kind": "state_path", "path": ["orders"]},
        }]}],
    }))
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::StateBinding);
    assert!(err.message.contains("must use either a record or state source, not both"));
    assert_eq!((err.line, err.column), (Some(4), Some(3)));
}

#[rstest]
#[case(json!({"sort": {"by": "id"}}), "sort")]
#[case(json!({"pagination": {"page_size": 5}}), "pagination")]
#[case(json!({"selection": "single"}), "selection")]
fn state_bound_tables_refuse_record_features(#[case] extra: Value, #[case] what: &str) {
    let mut table = json!({"type": "table", "source": {"kind": "state_path", "path": ["rows"]}});
    table.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());
    let err = lower(json!({"pages": [{"name": "Home", "items": [table]}]})).unwrap_err();
    assert_eq!(err.message, format!("Table bound to state cannot declare {what}"));
}

#[test]
fn missing_default_tab_is_identified() {
    let err = lower(json!({"pages": [{"name": "Home", "items": [{
        "type": "tabs", "default": "Missing",
        "tabs": [{"label": "Overview"}, {"label": "Details"}],
    }]}]}))
    .unwrap_err();
    assert!(err.message.starts_with("Default tab 'Missing' does not match any tab"), "{}", err.message);
}

#[test]
fn first_tab_is_the_default() {
    let program = lower(json!({"pages": [{"name": "Home", "items": [{
        "type": "tabs",
        "tabs": [{"label": "Overview"}, {"label": "Details"}],
    }]}]}))
    .unwrap();
    let I::Tabs { default, tabs } = &page_items(&program)[0].kind else { panic!("expected tabs") };
    assert_eq!(default, "Overview");
    assert_eq!(tabs.len(), 2);
}

#[rstest]
#[case(json!({"type": "row", "children": [{"type": "text", "value": "x", "line": 6}]}), "Rows may only contain columns")]
#[case(json!({"type": "card_group", "children": [{"type": "divider", "line": 6}]}), "Card groups may only contain cards")]
fn containers_restrict_their_children(#[case] container: Value, #[case] message: &str) {
    let err = lower(json!({"pages": [{"name": "Home", "items": [container]}]})).unwrap_err();
    assert_eq!(err.message, message);
    assert_eq!(err.line, Some(6));
}

#[test]
fn compose_names_are_unique_per_page() {
    let err = lower(json!({"pages": [{"name": "Home", "items": [
        {"type": "compose", "name": "Header"},
        {"type": "section", "children": [{"type": "compose", "name": "Header"}]},
    ]}]}))
    .unwrap_err();
    assert_eq!(err.message, "Compose name 'Header' is duplicated");
}

// ————————————————————————————————————————————————————————————————————————————
// PURITY
// ————————————————————————————————————————————————————————————————————————————

/// A function call wrapped in `depth` layers of arithmetic and list ops.
fn nested_call(depth: usize) -> Value {
    let mut expr = json!({"kind": "call_function", "function": "lookup_total", "arguments": []});
    for level in 0..depth {
        expr = if level % 2 == 0 {
            json!({"kind": "binary", "op": "add", "left": {"kind": "literal", "value": 1}, "right": expr})
        } else {
            json!({"kind": "list_op", "op": "length", "target": {"kind": "list", "items": [expr]}})
        };
    }
    expr
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4)]
#[case(9)]
fn card_stats_reject_calls_at_any_depth(#[case] depth: usize) {
    let err = lower(json!({"pages": [{"name": "Home", "items": [{
        "type": "card", "label": "Revenue", "stat": {"value": nested_call(depth)},
    }]}]}))
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Purity);
    assert_eq!(err.message, "Card stat expressions cannot call functions");
}

#[test]
fn pure_card_stats_lower() {
    let program = lower(json!({"pages": [{"name": "Home", "items": [{
        "type": "card", "label": "Open",
        "stat": {"label": "Orders", "value": {"kind": "list_op", "op": "length",
                 "target": {"kind": "state_path", "path": ["orders"]}}},
    }]}]}))
    .unwrap();
    assert!(matches!(&page_items(&program)[0].kind, I::Card { stat: Some(_), .. }));
}

// ————————————————————————————————————————————————————————————————————————————
// STORIES
// ————————————————————————————————————————————————————————————————————————————

fn story(steps: Value) -> Result<ir::Program, CompileError> {
    lower(json!({"pages": [{"name": "Tour", "items": [{"type": "story", "title": "Intro", "steps": steps}]}]}))
}

#[test]
fn two_step_loop_is_a_cycle() {
    let err = story(json!([{"title": "A", "next": "B"}, {"title": "B", "next": "A"}])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cycle);
    assert!(err.message.contains("A -> B -> A"), "{}", err.message);
}

#[rstest]
#[case(json!([{"title": "A"}]))]
#[case(json!([{"title": "A", "next": "A"}]))]
#[case(json!([{"title": "A"}, {"title": "B"}, {"title": "C"}]))]
#[case(json!([{"title": "A", "next": "C"}, {"title": "B"}, {"title": "C"}]))]
fn acyclic_or_single_step_stories_lower(#[case] steps: Value) {
    assert!(story(steps).is_ok());
}

#[test]
fn unknown_next_step_suggests() {
    let err = story(json!([{"title": "Welcome", "next": "Profle"}, {"title": "Profile"}])).unwrap_err();
    assert!(err.message.contains("Did you mean \"Profile\"?"), "{}", err.message);
}
