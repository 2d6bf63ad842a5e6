//! Reference resolvers: pure lookups with "did you mean" diagnostics.
use crate::ast::{RecordSchema, Span};
use crate::error::{CompileError, ErrorKind, Result};
use crate::suggest::did_you_mean;

use super::{Lowerer, PageCtx};

/// `<subject> references unknown <kind> '<name>'.` plus a suggestion.
pub fn unknown_reference<'c>(
    subject: &str,
    kind: &str,
    name: &str,
    candidates: impl IntoIterator<Item = &'c str>,
) -> CompileError {
    let hint = did_you_mean(name, candidates);
    CompileError::reference(format!("{subject} references unknown {kind} '{name}'.{hint}"))
        .with_details(format!("unknown_{kind}"), Some(name))
}

impl Lowerer {
    pub fn resolve_record(&self, name: &str, subject: &str, span: Span) -> Result<&RecordSchema> {
        self.records.get(name).ok_or_else(|| {
            unknown_reference(subject, "record", name, self.records.keys().map(String::as_str)).at(span)
        })
    }

    pub fn resolve_flow(&self, name: &str, subject: &str, span: Span) -> Result<()> {
        if self.flows.contains(name) {
            return Ok(());
        }
        Err(unknown_reference(subject, "flow", name, self.flows.iter().map(String::as_str)).at(span))
    }

    pub fn resolve_page(&self, name: &str, subject: &str, span: Span) -> Result<()> {
        if self.pages.contains(name) {
            return Ok(());
        }
        Err(unknown_reference(subject, "page", name, self.pages.iter().map(String::as_str)).at(span))
    }

    /// Field of an already-resolved record.
    pub fn resolve_field<'r>(
        &self,
        record: &'r RecordSchema,
        field: &str,
        subject: &str,
        span: Span,
    ) -> Result<&'r crate::ast::FieldSchema> {
        record.field(field).ok_or_else(|| {
            let hint = did_you_mean(field, record.field_names());
            CompileError::reference(format!(
                "{subject} references unknown field '{field}' in record '{}'.{hint}",
                record.name
            ))
            .with_details("unknown_field", Some(field))
            .at(span)
        })
    }

    /// Items gated behind a capability fail instead of degrading.
    pub fn require_capability(&self, capability: &str, keyword: &str, span: Span) -> Result<()> {
        if self.capabilities.contains(capability) {
            return Ok(());
        }
        Err(CompileError::new(
            ErrorKind::Capability,
            format!("'{keyword}' requires the '{capability}' capability to be enabled"),
        )
        .with_details("missing_capability", Some(capability))
        .at(span))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Modal,
    Drawer,
}

impl PageCtx {
    pub fn resolve_overlay(&self, kind: OverlayKind, name: &str, subject: &str, span: Span) -> Result<()> {
        let (set, noun) = match kind {
            OverlayKind::Modal => (&self.modals, "modal"),
            OverlayKind::Drawer => (&self.drawers, "drawer"),
        };
        if set.contains(name) {
            return Ok(());
        }
        Err(unknown_reference(subject, noun, name, set.iter().map(String::as_str)).at(span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use serde_json::json;

    fn lowerer() -> Lowerer {
        let program: Program = serde_json::from_value(json!({
            "records": [{"name": "Order", "fields": [{"name": "id"}, {"name": "total"}]}],
            "flows": ["save_order", "delete_order"],
            "pages": [{"name": "Home"}, {"name": "Orders"}],
        }))
        .unwrap();
        Lowerer::new(&program).unwrap()
    }

    #[test]
    fn unknown_record_with_suggestion() {
        let err = lowerer().resolve_record("Ordr", "Page 'Home'", Span { line: 3, column: 7 }).unwrap_err();
        assert_eq!(err.message, "Page 'Home' references unknown record 'Ordr'. Did you mean \"Order\"?");
        assert_eq!(err.kind, ErrorKind::Reference);
        assert_eq!(err.line, Some(3));
        let details = err.details.unwrap();
        assert_eq!(details.error_id.as_deref(), Some("unknown_record"));
        assert_eq!(details.keyword.as_deref(), Some("Ordr"));
    }

    #[test]
    fn unknown_flow_without_close_candidate() {
        let err = lowerer().resolve_flow("export_everything", "Button", Span::default()).unwrap_err();
        assert_eq!(err.message, "Button references unknown flow 'export_everything'.");
    }

    #[test]
    fn known_names_resolve() {
        let l = lowerer();
        assert!(l.resolve_page("Orders", "Link", Span::default()).is_ok());
        let record = l.resolve_record("Order", "x", Span::default()).unwrap();
        assert!(l.resolve_field(record, "total", "Table", Span::default()).is_ok());
        let err = l.resolve_field(record, "totl", "Table", Span::default()).unwrap_err();
        assert!(err.message.ends_with("Did you mean \"total\"?"));
    }

    #[test]
    fn capabilities_gate_items() {
        let err = lowerer().require_capability("uploads", "upload", Span::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Capability);
    }
}
