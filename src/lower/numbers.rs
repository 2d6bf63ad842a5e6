//! Number blocks: literal phrases and record counts.
use crate::ast::{NumberEntryDecl, Span};
use crate::error::{CompileError, Result};
use crate::ir::{ItemKind as I, NumberEntry};

use super::{Lowerer, PageCtx};

impl Lowerer {
    pub fn lower_number(&self, entries: &[NumberEntryDecl], span: Span, ctx: &PageCtx) -> Result<I> {
        if entries.is_empty() {
            return Err(CompileError::structure("Number block needs at least one entry").at(span));
        }
        let subject = format!("Page '{}' number block", ctx.page);
        let entries = entries
            .iter()
            .map(|entry| match entry {
                NumberEntryDecl::Phrase { value } if value.trim().is_empty() => {
                    Err(CompileError::structure("Number phrase cannot be empty").at(span))
                }
                NumberEntryDecl::Phrase { value } => Ok(NumberEntry::Phrase { value: value.clone() }),
                NumberEntryDecl::Count { record, label } => {
                    self.resolve_record(record, &subject, span)?;
                    Ok(NumberEntry::Count {
                        record: record.clone(),
                        label: label.clone().unwrap_or_else(|| record.clone()),
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(I::Number { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use serde_json::json;

    #[test]
    fn counts_need_known_records() {
        let program: Program = serde_json::from_value(json!({
            "records": [{"name": "Order", "fields": [{"name": "id"}]}],
        }))
        .unwrap();
        let lowerer = Lowerer::new(&program).unwrap();
        let ctx = PageCtx { page: "Home".into(), ..PageCtx::default() };
        let entries: Vec<NumberEntryDecl> = serde_json::from_value(json!([
            {"kind": "phrase", "value": "Open orders"},
            {"kind": "count", "record": "Order"},
        ]))
        .unwrap();
        let I::Number { entries } = lowerer.lower_number(&entries, Span::default(), &ctx).unwrap() else {
            panic!("number")
        };
        assert_eq!(entries[1], NumberEntry::Count { record: "Order".into(), label: "Order".into() });

        let bad: Vec<NumberEntryDecl> =
            serde_json::from_value(json!([{"kind": "count", "record": "Ordr"}])).unwrap();
        let err = lowerer.lower_number(&bad, Span::default(), &ctx).unwrap_err();
        assert!(err.message.starts_with("Page 'Home' number block references unknown record 'Ordr'."));
        assert!(lowerer.lower_number(&[], Span::default(), &ctx).is_err());
    }
}
