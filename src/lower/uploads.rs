//! Upload fields.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Expr, Literal, Span};
use crate::error::{CompileError, Result};
use crate::ir::ItemKind as I;

use super::{Lowerer, PageCtx};

static MIME_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9!#$&^_.+\-]+/[A-Za-z0-9!#$&^_.+*\-]+$").expect("static regex")
});
static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.+\-]+$").expect("static regex"));

const DEFAULT_LABEL: &str = "Upload";

pub struct UploadDecl<'a> {
    pub name: &'a str,
    pub accept: Option<&'a [String]>,
    pub multiple: Option<&'a Expr>,
    pub required: Option<&'a Expr>,
    pub preview: Option<&'a Expr>,
    pub label: Option<&'a str>,
}

/// `image/png`, `image/*`, `.pdf` and `pdf` are all accepted.
pub fn is_valid_accept_entry(entry: &str) -> bool {
    let entry = entry.trim();
    if entry.contains('/') {
        return MIME_TYPE.is_match(entry);
    }
    let extension = entry.strip_prefix('.').unwrap_or(entry);
    !extension.is_empty() && EXTENSION.is_match(extension)
}

fn literal_flag(value: Option<&Expr>, what: &str, span: Span) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(Expr::Literal { value: Literal::Bool(flag) }) => Ok(*flag),
        Some(_) => Err(CompileError::structure(format!("{what} must be true or false")).at(span)),
    }
}

impl Lowerer {
    pub fn lower_upload(&self, decl: UploadDecl<'_>, span: Span, ctx: &mut PageCtx) -> Result<I> {
        self.require_capability("uploads", "upload", span)?;
        let name = decl.name.trim();
        if name.is_empty() {
            return Err(CompileError::structure("Upload name cannot be empty").at(span));
        }
        if !ctx.upload_names.insert(name.to_owned()) {
            return Err(CompileError::structure(format!(
                "Upload '{name}' is declared more than once on page '{}'",
                ctx.page
            ))
            .at(span));
        }
        let accept = match decl.accept {
            Some([]) => {
                return Err(CompileError::structure("Upload accept list must include at least one value").at(span));
            }
            Some(entries) => {
                if let Some(bad) = entries.iter().find(|entry| !is_valid_accept_entry(entry)) {
                    return Err(CompileError::structure(
                        "Upload accept entries must be valid MIME types or extensions",
                    )
                    .with_details("invalid_accept", Some(bad))
                    .at(span));
                }
                entries.iter().map(|entry| entry.trim().to_owned()).collect()
            }
            None => Vec::new(),
        };
        Ok(I::Upload {
            name: name.to_owned(),
            accept,
            multiple: literal_flag(decl.multiple, "Multiple", span)?,
            required: literal_flag(decl.required, "Required", span)?,
            preview: literal_flag(decl.preview, "Preview", span)?,
            label: decl
                .label
                .filter(|label| !label.trim().is_empty())
                .unwrap_or(DEFAULT_LABEL)
                .to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::PageBody;
    use crate::lower::lower_program;
    use rstest::rstest;
    use serde_json::{json, Value};

    #[rstest]
    #[case("image/png", true)]
    #[case("image/*", true)]
    #[case("application/vnd.ms-excel", true)]
    #[case(".pdf", true)]
    #[case("csv", true)]
    #[case("image/", false)]
    #[case(".", false)]
    #[case("no spaces", false)]
    fn accept_entries(#[case] entry: &str, #[case] ok: bool) {
        assert_eq!(is_valid_accept_entry(entry), ok);
    }

    fn lower_upload(item: Value) -> crate::error::Result<I> {
        let program = serde_json::from_value(json!({
            "capabilities": ["uploads"],
            "pages": [{"name": "Home", "items": [item]}],
        }))
        .unwrap();
        let ir = lower_program(&program)?;
        let PageBody::Elements(mut items) = ir.pages.into_iter().next().unwrap().body else {
            panic!("elements")
        };
        Ok(items.remove(0).kind)
    }

    #[test]
    fn defaults() {
        let kind = lower_upload(json!({"type": "upload", "name": "receipt"})).unwrap();
        let I::Upload { label, multiple, .. } = kind else { panic!("upload") };
        assert_eq!(label, "Upload");
        assert!(!multiple);
    }

    #[test]
    fn flags_must_be_literal_booleans() {
        let err = lower_upload(json!({"type": "upload", "name": "receipt",
            "multiple": {"kind": "state_path", "path": ["many"]}}))
        .unwrap_err();
        assert_eq!(err.message, "Multiple must be true or false");
    }

    #[test]
    fn empty_accept_list() {
        let err = lower_upload(json!({"type": "upload", "name": "receipt", "accept": []})).unwrap_err();
        assert_eq!(err.message, "Upload accept list must include at least one value");
    }

    #[test]
    fn capability_required() {
        let program = serde_json::from_value(json!({
            "pages": [{"name": "Home", "items": [{"type": "upload", "name": "receipt"}]}],
        }))
        .unwrap();
        let err = lower_program(&program).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Capability);
    }
}
