//! Page manifest compiler.
//!
//! Parsed page declarations ([`ast`]) are validated and lowered into a
//! typed intermediate representation ([`ir`]), which is then rendered
//! against a runtime state snapshot and record storage into a JSON UI
//! manifest ([`manifest`]).
//!
//! ```text
//! ast::Program ──lower──▶ ir::Program ──build_manifest──▶ serde_json::Value
//! ```
pub mod ast;
pub mod error;
pub mod ir;
pub mod lower;
pub mod manifest;
pub mod path_de;
pub mod suggest;

pub use error::{CompileError, ErrorKind, Result, Warning};
pub use manifest::{BuildOptions, DisplayMode, MemoryStorage, Storage, build_manifest, canonical_json};

/// Lowers `program` and builds its manifest in one step.
pub fn compile(
    program: &ast::Program,
    state: &serde_json::Value,
    storage: &dyn Storage,
    options: &BuildOptions,
    warnings: &mut Vec<Warning>,
) -> Result<serde_json::Value> {
    let program = lower::lower_program(program)?;
    build_manifest(&program, state, storage, options, warnings)
}
