//! Layout primitives: sidebar layouts, sticky regions and conditionals.
use crate::ast::{self, Expr, Span};
use crate::error::{CompileError, Result};
use crate::ir::ItemKind as I;

use super::expr::check_predicate;
use super::{Lowerer, PageCtx};

impl Lowerer {
    pub fn lower_sidebar_layout(
        &self,
        sidebar: &[ast::PageItem],
        main: &[ast::PageItem],
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        if sidebar.is_empty() || main.is_empty() {
            return Err(CompileError::structure("Sidebar layout needs both a sidebar and a main area").at(span));
        }
        Ok(I::SidebarLayout {
            sidebar: self.lower_children(sidebar, ctx)?,
            main: self.lower_children(main, ctx)?,
        })
    }

    pub fn lower_sticky(
        &self,
        position: &str,
        children: &[ast::PageItem],
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        if !matches!(position, "top" | "bottom") {
            return Err(CompileError::structure(format!("Sticky position '{position}' must be top or bottom")).at(span));
        }
        Ok(I::Sticky { position: position.to_owned(), children: self.lower_children(children, ctx)? })
    }

    /// `then` and `else` are lowered independently; `else` is optional.
    pub fn lower_conditional(
        &self,
        condition: &Expr,
        then: &[ast::PageItem],
        otherwise: Option<&[ast::PageItem]>,
        span: Span,
        ctx: &mut PageCtx,
    ) -> Result<I> {
        check_predicate(condition, "Condition", span)?;
        if then.is_empty() {
            return Err(CompileError::structure("Conditional block needs at least one item in its then branch").at(span));
        }
        let then = self.lower_children(then, ctx)?;
        let otherwise = match otherwise {
            Some(items) => Some(self.lower_children(items, ctx)?),
            None => None,
        };
        Ok(I::Conditional { condition: condition.clone(), then, otherwise })
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{ItemKind as I, PageBody};
    use crate::lower::lower_program;
    use serde_json::json;

    #[test]
    fn conditional_branches_lower_independently() {
        let program = serde_json::from_value(json!({"pages": [{"name": "Home", "items": [{
            "type": "conditional",
            "condition": {"kind": "state_path", "path": ["signed_in"]},
            "then": [{"type": "text", "value": "Welcome back"}],
            "else": [{"type": "text", "value": "Sign in"}, {"type": "divider"}],
        }]}]}))
        .unwrap();
        let ir = lower_program(&program).unwrap();
        let PageBody::Elements(items) = &ir.pages[0].body else { panic!("elements") };
        let I::Conditional { then, otherwise, .. } = &items[0].kind else { panic!("conditional") };
        assert_eq!(then.len(), 1);
        assert_eq!(otherwise.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn conditions_must_be_pure() {
        let program = serde_json::from_value(json!({"pages": [{"name": "Home", "items": [{
            "type": "conditional",
            "condition": {"kind": "tool_call", "tool": "is_admin"},
            "then": [{"type": "text", "value": "x"}],
        }]}]}))
        .unwrap();
        let err = lower_program(&program).unwrap_err();
        assert_eq!(err.message, "Condition expressions cannot call tools");
    }

    #[test]
    fn sticky_positions() {
        let program = serde_json::from_value(json!({"pages": [{"name": "Home", "items": [
            {"type": "sticky", "position": "left"},
        ]}]}))
        .unwrap();
        let err = lower_program(&program).unwrap_err();
        assert_eq!(err.message, "Sticky position 'left' must be top or bottom");
    }
}
