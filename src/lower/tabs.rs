//! Tab blocks.
use std::collections::BTreeSet;

use crate::ast::{Span, TabDecl};
use crate::error::{CompileError, Result};
use crate::ir::{self, ItemKind as I};
use crate::suggest::did_you_mean;

use super::expr::check_predicate;
use super::{Lowerer, PageCtx};

impl Lowerer {
    /// Labels are unique; the default falls back to the first tab.
    pub fn lower_tabs(
        &self,
        tabs: &[TabDecl],
        default: Option<&str>,
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        if tabs.is_empty() {
            return Err(CompileError::structure("Tabs block has no tabs").at(span));
        }
        let mut labels = BTreeSet::new();
        let mut lowered = Vec::with_capacity(tabs.len());
        for tab in tabs {
            let at = if tab.line > 0 { Span { line: tab.line, column: tab.column } } else { span };
            if tab.label.trim().is_empty() {
                return Err(CompileError::structure("Tab label cannot be empty").at(at));
            }
            if !labels.insert(tab.label.as_str()) {
                return Err(CompileError::structure(format!("Tab label '{}' is duplicated", tab.label)).at(at));
            }
            if let Some(visibility) = &tab.visibility {
                check_predicate(visibility, "Visibility", at)?;
            }
            lowered.push(ir::Tab {
                label: tab.label.clone(),
                children: self.lower_children(&tab.children, ctx)?,
                visibility: tab.visibility.clone(),
                span: at,
            });
        }
        let default = match default {
            Some(label) if labels.contains(label) => label.to_owned(),
            Some(label) => {
                let hint = did_you_mean(label, labels.iter().copied());
                return Err(CompileError::structure(format!(
                    "Default tab '{label}' does not match any tab.{hint}"
                ))
                .with_details("unknown_default_tab", Some(label))
                .at(span));
            }
            None => lowered[0].label.clone(),
        };
        Ok(I::Tabs { tabs: lowered, default })
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{ItemKind as I, PageBody};
    use crate::lower::lower_program;
    use serde_json::{json, Value};

    fn lower_tabs(tabs: Value) -> crate::error::Result<I> {
        let program = serde_json::from_value(json!({
            "pages": [{"name": "Home", "items": [tabs]}],
        }))
        .unwrap();
        let ir = lower_program(&program)?;
        let PageBody::Elements(mut items) = ir.pages.into_iter().next().unwrap().body else {
            panic!("elements")
        };
        Ok(items.remove(0).kind)
    }

    #[test]
    fn default_falls_back_to_first_tab() {
        let kind = lower_tabs(json!({"type": "tabs", "tabs": [
            {"label": "Overview"}, {"label": "History"},
        ]}))
        .unwrap();
        let I::Tabs { default, .. } = kind else { panic!("tabs") };
        assert_eq!(default, "Overview");
    }

    #[test]
    fn missing_default_is_rejected() {
        let err = lower_tabs(json!({"type": "tabs", "default": "Missing", "line": 3, "column": 1, "tabs": [
            {"label": "Overview"}, {"label": "History"},
        ]}))
        .unwrap_err();
        assert!(err.message.starts_with("Default tab 'Missing' does not match any tab"));
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn duplicate_and_empty_tabs() {
        let err = lower_tabs(json!({"type": "tabs", "tabs": [{"label": "A"}, {"label": "A"}]})).unwrap_err();
        assert_eq!(err.message, "Tab label 'A' is duplicated");
        let err = lower_tabs(json!({"type": "tabs", "tabs": []})).unwrap_err();
        assert_eq!(err.message, "Tabs block has no tabs");
    }
}
