//! Retrieval widgets: citation chips, source previews, trust indicators and
//! scope selectors. All of them read from state.
use crate::ast::{self, Expr, Literal, Span};
use crate::error::{CompileError, Result};
use crate::ir::{ItemKind as I, PreviewSource};

use super::expr::require_state_path;
use super::Lowerer;

impl Lowerer {
    pub fn lower_rag_widget(&self, kind: &ast::ItemKind, span: Span) -> Result<I> {
        self.require_capability("rag_ui", kind.keyword(), span)?;
        match kind {
            ast::ItemKind::CitationChips { source } => Ok(I::CitationChips {
                source: require_state_path(source, "Citation chips source", span)?,
            }),
            ast::ItemKind::SourcePreview { source } => Ok(I::SourcePreview { source: preview_source(source, span)? }),
            ast::ItemKind::TrustIndicator { source } => Ok(I::TrustIndicator {
                source: require_state_path(source, "Trust indicator source", span)?,
            }),
            ast::ItemKind::ScopeSelector { options_source, active } => Ok(I::ScopeSelector {
                options_source: require_state_path(options_source, "Scope selector options", span)?,
                active: require_state_path(active, "Scope selector active value", span)?,
            }),
            other => Err(CompileError::internal(format!(
                "'{}' is not a retrieval widget",
                other.keyword()
            ))
            .at(span)),
        }
    }
}

/// A preview reads a state path or shows a fixed text.
fn preview_source(source: &Expr, span: Span) -> Result<PreviewSource> {
    match source {
        Expr::Literal { value: Literal::Text(value) } => Ok(PreviewSource::Text { value: value.clone() }),
        _ => Ok(PreviewSource::State { path: require_state_path(source, "Source preview source", span)? }),
    }
}
