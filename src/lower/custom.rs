//! Custom components supplied by plugins.
//!
//! A component is declared once at program level with its plugin and prop
//! list. Uses must name a declared component, pass only declared props,
//! pass every required prop and keep every expression pure. Props named
//! `on_*` are event handlers and must name a known flow as a text literal.
use indexmap::IndexMap;

use crate::ast::{Expr, Literal, Span};
use crate::error::{CompileError, Result};
use crate::ir::ItemKind as I;
use crate::suggest::did_you_mean;

use super::expr::{reject_impure, reject_pattern_params};
use super::refs::unknown_reference;
use super::{Lowerer, PageCtx};

const EVENT_PREFIX: &str = "on_";

impl Lowerer {
    pub fn lower_custom_component(
        &self,
        component: &str,
        properties: &IndexMap<String, Expr>,
        span: Span,
        ctx: &PageCtx,
    ) -> Result<I> {
        self.require_capability("custom_ui", "custom_component", span)?;
        let subject = format!("Page '{}'", ctx.page);
        let decl = self.components.get(component).ok_or_else(|| {
            unknown_reference(&subject, "component", component, self.components.keys().map(String::as_str))
                .at(span)
        })?;

        for (name, value) in properties {
            if !decl.props.iter().any(|prop| &prop.name == name) {
                let hint = did_you_mean(name, decl.props.iter().map(|prop| prop.name.as_str()));
                return Err(CompileError::reference(format!(
                    "Component '{component}' has no prop '{name}'.{hint}"
                ))
                .with_details("unknown_prop", Some(name))
                .at(span));
            }
            let context = format!("Component '{component}' prop '{name}'");
            reject_pattern_params(value, &context).map_err(|err| err.at(span))?;
            reject_impure(value, &format!("{context} expressions")).map_err(|err| err.at(span))?;
            if name.starts_with(EVENT_PREFIX) {
                self.check_event_handler(component, name, value, span)?;
            }
        }

        if let Some(missing) = decl
            .props
            .iter()
            .find(|prop| prop.required && !properties.contains_key(&prop.name))
        {
            return Err(CompileError::structure(format!(
                "Component '{component}' is missing required prop '{}'",
                missing.name
            ))
            .at(span));
        }

        Ok(I::CustomComponent {
            component: component.to_owned(),
            plugin: decl.plugin.clone(),
            properties: properties.clone(),
        })
    }

    fn check_event_handler(&self, component: &str, prop: &str, value: &Expr, span: Span) -> Result<()> {
        let Expr::Literal { value: Literal::Text(flow) } = value else {
            return Err(CompileError::structure(format!(
                "Component '{component}' event prop '{prop}' must name a flow"
            ))
            .at(span));
        };
        self.resolve_flow(flow, &format!("Component '{component}' event prop '{prop}'"), span)
    }
}
