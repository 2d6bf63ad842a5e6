//! Actions, overlays and the simple containers (rows, cards, compose blocks).
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{self, ActionDecl, AvailabilityDecl, CardStatDecl, EntryActionDecl, Span};
use crate::error::{CompileError, Result};
use crate::ir::{self, ItemKind as I};

use super::expr::{reject_impure, reject_pattern_params};
use super::refs::OverlayKind;
use super::{Lowerer, PageCtx};

static EXPLICIT_ACTION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("static regex"));

impl Lowerer {
    /// Resolves an action declaration. Buttons accept navigation kinds only;
    /// entry actions (cards, rows, lists) may also open and close overlays.
    pub fn lower_action(
        &self,
        decl: &ActionDecl,
        subject: &str,
        allow_overlays: bool,
        ctx: &PageCtx,
        span: Span,
    ) -> Result<ir::Action> {
        let target = || {
            decl.target.clone().ok_or_else(|| {
                CompileError::structure(format!("{subject} action '{}' needs a target", decl.kind)).at(span)
            })
        };
        let overlay = |kind: OverlayKind| -> Result<String> {
            let name = target()?;
            ctx.resolve_overlay(kind, &name, subject, span)?;
            Ok(name)
        };
        match decl.kind.as_str() {
            "call_flow" => {
                let flow = target()?;
                self.resolve_flow(&flow, subject, span)?;
                Ok(ir::Action::CallFlow { flow })
            }
            "navigate_to" => {
                let page = target()?;
                self.resolve_page(&page, subject, span)?;
                Ok(ir::Action::NavigateTo { page })
            }
            "go_back" => match &decl.target {
                None => Ok(ir::Action::GoBack),
                Some(_) => Err(CompileError::structure(format!(
                    "{subject} action 'go_back' does not take a target"
                ))
                .at(span)),
            },
            "open_modal" if allow_overlays => Ok(ir::Action::OpenModal { target: overlay(OverlayKind::Modal)? }),
            "close_modal" if allow_overlays => Ok(ir::Action::CloseModal { target: overlay(OverlayKind::Modal)? }),
            "open_drawer" if allow_overlays => Ok(ir::Action::OpenDrawer { target: overlay(OverlayKind::Drawer)? }),
            "close_drawer" if allow_overlays => {
                Ok(ir::Action::CloseDrawer { target: overlay(OverlayKind::Drawer)? })
            }
            other => Err(CompileError::structure(format!("{subject} uses unsupported action '{other}'"))
                .with_details("unsupported_action", Some(other))
                .at(span)),
        }
    }

    /// Labelled actions owned by one element; labels must be unique there.
    pub fn lower_entry_actions(
        &self,
        decls: &[EntryActionDecl],
        owner: &str,
        ctx: &PageCtx,
        span: Span,
    ) -> Result<Vec<ir::EntryAction>> {
        let mut labels = BTreeSet::new();
        let mut out = Vec::with_capacity(decls.len());
        for decl in decls {
            let at = if decl.line > 0 { Span { line: decl.line, column: decl.column } } else { span };
            if decl.label.trim().is_empty() {
                return Err(CompileError::structure(format!("{owner} action label cannot be empty")).at(at));
            }
            if !labels.insert(decl.label.as_str()) {
                return Err(CompileError::structure(format!(
                    "{owner} action label '{}' is duplicated",
                    decl.label
                ))
                .at(at));
            }
            let subject = format!("Page '{}' {} action '{}'", ctx.page, owner.to_lowercase(), decl.label);
            let action = self.lower_action(&decl.action, &subject, true, ctx, at)?;
            out.push(ir::EntryAction { label: decl.label.clone(), action });
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn lower_button(
        &self,
        label: &str,
        action: &ActionDecl,
        explicit_id: Option<&str>,
        icon: &Option<String>,
        availability: Option<&AvailabilityDecl>,
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        if label.trim().is_empty() {
            return Err(CompileError::structure("Button label cannot be empty").at(span));
        }
        if let Some(id) = explicit_id {
            if !EXPLICIT_ACTION_ID.is_match(id) {
                return Err(CompileError::structure(format!(
                    "Button id '{id}' may only use letters, digits, '.', '_' and '-'"
                ))
                .at(span));
            }
        }
        let subject = format!("Page '{}' button '{label}'", ctx.page);
        let action = self.lower_action(action, &subject, false, ctx, span)?;
        let availability = match availability {
            Some(rule) if rule.path.is_empty() => {
                return Err(CompileError::state_binding(format!(
                    "Button '{label}' availability rule needs a state path"
                ))
                .at(span));
            }
            Some(rule) => Some(ir::AvailabilityRule { path: rule.path.clone(), value: rule.value.clone() }),
            None => None,
        };
        Ok(I::Button {
            label: label.to_owned(),
            action,
            explicit_id: explicit_id.map(str::to_owned),
            icon: icon.clone(),
            availability,
        })
    }

    pub fn lower_link(&self, label: &str, target: &str, span: Span, ctx: &PageCtx) -> Result<I> {
        let subject = format!("Page '{}' link '{label}'", ctx.page);
        self.resolve_page(target, &subject, span)?;
        Ok(I::Link { label: label.to_owned(), target: target.to_owned() })
    }

    pub fn lower_text_input(
        &self,
        name: &str,
        flow: &str,
        label: &Option<String>,
        span: Span,
        ctx: &PageCtx,
    ) -> Result<I> {
        if name.trim().is_empty() {
            return Err(CompileError::structure("Text input name cannot be empty").at(span));
        }
        self.resolve_flow(flow, &format!("Page '{}' text input '{name}'", ctx.page), span)?;
        Ok(I::TextInput {
            name: name.to_owned(),
            flow: flow.to_owned(),
            label: label.clone().unwrap_or_else(|| name.to_owned()),
        })
    }

    pub fn lower_row(&self, children: &[ast::PageItem], ctx: &mut PageCtx) -> Result<I> {
        let lowered = self.lower_children(children, ctx)?;
        for child in &lowered {
            if !matches!(child.kind, I::Column { .. }) {
                return Err(CompileError::structure("Rows may only contain columns").at(child.meta.span));
            }
        }
        Ok(I::Row { children: lowered })
    }

    pub fn lower_card_group(&self, children: &[ast::PageItem], ctx: &mut PageCtx) -> Result<I> {
        let lowered = self.lower_children(children, ctx)?;
        for child in &lowered {
            if !matches!(child.kind, I::Card { .. }) {
                return Err(CompileError::structure("Card groups may only contain cards").at(child.meta.span));
            }
        }
        Ok(I::CardGroup { children: lowered })
    }

    pub fn lower_card(
        &self,
        label: &Option<String>,
        stat: Option<&CardStatDecl>,
        actions: &[EntryActionDecl],
        children: &[ast::PageItem],
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        let stat = match stat {
            Some(stat) => {
                reject_impure(&stat.value, "Card stat expressions").map_err(|err| err.at(span))?;
                reject_pattern_params(&stat.value, "Card stat").map_err(|err| err.at(span))?;
                Some(ir::CardStat { value: stat.value.clone(), label: stat.label.clone() })
            }
            None => None,
        };
        let actions = self.lower_entry_actions(actions, "Card", ctx, span)?;
        Ok(I::Card {
            label: label.clone(),
            stat,
            actions,
            children: self.lower_children(children, ctx)?,
        })
    }

    /// Compose names are unique across the whole page.
    pub fn lower_compose(
        &self,
        name: &str,
        children: &[ast::PageItem],
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        if name.trim().is_empty() {
            return Err(CompileError::structure("Compose name cannot be empty").at(span));
        }
        if !ctx.compose_names.insert(name.to_owned()) {
            return Err(CompileError::structure(format!("Compose name '{name}' is duplicated"))
                .with_details("duplicate_compose", Some(name))
                .at(span));
        }
        Ok(I::Compose { name: name.to_owned(), children: self.lower_children(children, ctx)? })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::lower::lower_program;
    use serde_json::{json, Value};

    fn lower_items(items: Value) -> crate::error::Result<crate::ir::Program> {
        let program = serde_json::from_value(json!({
            "flows": ["save", "archive"],
            "pages": [{"name": "Home", "items": items}, {"name": "Settings"}],
        }))
        .unwrap();
        lower_program(&program)
    }

    #[test]
    fn button_kinds() {
        assert!(lower_items(json!([
            {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "save"}},
            {"type": "button", "label": "Go", "action": {"kind": "navigate_to", "target": "Settings"}},
            {"type": "button", "label": "Back", "action": {"kind": "go_back"}},
        ]))
        .is_ok());
    }

    #[test]
    fn button_unknown_flow_suggests() {
        let err = lower_items(json!([
            {"type": "button", "label": "Save", "action": {"kind": "call_flow", "target": "sav"}},
        ]))
        .unwrap_err();
        assert_eq!(
            err.message,
            "Page 'Home' button 'Save' references unknown flow 'sav'. Did you mean \"save\"?"
        );
    }

    #[test]
    fn button_rejects_other_kinds() {
        let err = lower_items(json!([
            {"type": "modal", "label": "Confirm"},
            {"type": "button", "label": "Open", "action": {"kind": "open_modal", "target": "Confirm"}},
        ]))
        .unwrap_err();
        assert_eq!(err.message, "Page 'Home' button 'Open' uses unsupported action 'open_modal'");
    }

    #[test]
    fn go_back_takes_no_target() {
        let err = lower_items(json!([
            {"type": "button", "label": "Back", "action": {"kind": "go_back", "target": "Home"}},
        ]))
        .unwrap_err();
        assert!(err.message.contains("does not take a target"));
    }

    #[test]
    fn card_group_child_error_points_at_child() {
        let err = lower_items(json!([{"type": "card_group", "line": 1, "column": 1, "children": [
            {"type": "card", "label": "A"},
            {"type": "text", "value": "oops", "line": 5, "column": 9},
        ]}]))
        .unwrap_err();
        assert_eq!(err.message, "Card groups may only contain cards");
        assert_eq!((err.line, err.column), (Some(5), Some(9)));
    }

    #[test]
    fn rows_only_hold_columns() {
        let err = lower_items(json!([{"type": "row", "children": [{"type": "divider", "line": 2}]}]))
            .unwrap_err();
        assert_eq!(err.message, "Rows may only contain columns");
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn compose_names_are_unique_across_nesting() {
        let err = lower_items(json!([
            {"type": "compose", "name": "summary"},
            {"type": "section", "children": [{"type": "compose", "name": "summary"}]},
        ]))
        .unwrap_err();
        assert_eq!(err.message, "Compose name 'summary' is duplicated");
    }

    #[test]
    fn card_actions_resolve_overlays_and_labels() {
        assert!(lower_items(json!([
            {"type": "drawer", "label": "Details"},
            {"type": "card", "label": "Order", "actions": [
                {"label": "Open", "kind": "open_drawer", "target": "Details"},
                {"label": "Archive", "kind": "call_flow", "target": "archive"},
            ]},
        ]))
        .is_ok());

        let err = lower_items(json!([{"type": "card", "actions": [
            {"label": "Open", "kind": "open_modal", "target": "Nope"},
        ]}]))
        .unwrap_err();
        assert!(err.message.contains("references unknown modal 'Nope'"));

        let err = lower_items(json!([{"type": "card", "actions": [
            {"label": "Go", "kind": "call_flow", "target": "save"},
            {"label": "Go", "kind": "call_flow", "target": "archive"},
        ]}]))
        .unwrap_err();
        assert_eq!(err.message, "Card action label 'Go' is duplicated");
    }

    #[test]
    fn card_stats_must_be_pure() {
        let err = lower_items(json!([{"type": "card", "stat": {"value": {
            "kind": "binary", "op": "add",
            "left": {"kind": "literal", "value": 1},
            "right": {"kind": "call_function", "function": "total"},
        }}}]))
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Purity);
        assert_eq!(err.message, "Card stat expressions cannot call functions");
    }

    #[test]
    fn explicit_ids_are_checked() {
        let err = lower_items(json!([
            {"type": "button", "label": "Save", "id": "has space",
             "action": {"kind": "call_flow", "target": "save"}},
        ]))
        .unwrap_err();
        assert!(err.message.starts_with("Button id 'has space'"));
    }
}
