//! Feedback and polish items: loading, snackbar, tooltip, slider, grid.
use crate::ast::{self, Expr, Span};
use crate::error::{CompileError, Result};
use crate::ir::ItemKind as I;

use super::expr::require_state_path;
use super::{Lowerer, PageCtx};

const DEFAULT_SNACKBAR_MS: u64 = 3000;

pub fn lower_loading(variant: &Option<String>, span: Span) -> Result<I> {
    let variant = variant.clone().unwrap_or_else(|| "spinner".to_owned());
    if !matches!(variant.as_str(), "spinner" | "skeleton") {
        return Err(CompileError::structure(format!("Loading variant '{variant}' must be spinner or skeleton")).at(span));
    }
    Ok(I::Loading { variant })
}

pub fn lower_snackbar(message: &str, duration: Option<u64>, span: Span) -> Result<I> {
    if message.trim().is_empty() {
        return Err(CompileError::structure("Snackbar message cannot be empty").at(span));
    }
    let duration = duration.unwrap_or(DEFAULT_SNACKBAR_MS);
    if duration == 0 {
        return Err(CompileError::structure("Snackbar duration must be greater than zero").at(span));
    }
    Ok(I::Snackbar { message: message.to_owned(), duration })
}

pub fn lower_tooltip(text: &str, anchor_label: &str, collapsed: Option<bool>, span: Span) -> Result<I> {
    if text.trim().is_empty() {
        return Err(CompileError::structure("Tooltip text cannot be empty").at(span));
    }
    if anchor_label.trim().is_empty() {
        return Err(CompileError::structure("Tooltip anchor label cannot be empty").at(span));
    }
    Ok(I::Tooltip {
        text: text.to_owned(),
        anchor_label: anchor_label.to_owned(),
        collapsed_by_default: collapsed.unwrap_or(true),
    })
}

impl Lowerer {
    #[allow(clippy::too_many_arguments)]
    pub fn lower_slider(
        &self,
        label: &str,
        min: f64,
        max: f64,
        step: Option<f64>,
        value: &Expr,
        flow: &Option<String>,
        help_text: &Option<String>,
        span: Span,
        ctx: &PageCtx,
    ) -> Result<I> {
        if min >= max {
            return Err(CompileError::structure(format!("Slider '{label}' min must be less than max")).at(span));
        }
        let step = step.unwrap_or(1.0);
        if step <= 0.0 {
            return Err(CompileError::structure(format!("Slider '{label}' step must be greater than zero")).at(span));
        }
        if step > max - min {
            return Err(CompileError::structure(format!("Slider '{label}' step must not exceed its range")).at(span));
        }
        let value = require_state_path(value, &format!("Slider '{label}' value"), span)?;
        if let Some(flow) = flow {
            self.resolve_flow(flow, &format!("Page '{}' slider '{label}'", ctx.page), span)?;
        }
        Ok(I::Slider {
            label: label.to_owned(),
            min,
            max,
            step,
            value,
            flow: flow.clone(),
            help_text: help_text.clone(),
        })
    }

    pub fn lower_grid(&self, columns: i64, children: &[ast::PageItem], span: Span, ctx: &mut PageCtx) -> Result<I> {
        let columns = u8::try_from(columns)
            .ok()
            .filter(|c| (1..=12).contains(c))
            .ok_or_else(|| CompileError::structure("Grid columns must be between 1 and 12").at(span))?;
        Ok(I::Grid { columns, children: self.lower_children(children, ctx)? })
    }
}
