//! CLI: program JSON → (ir | manifest)
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

use page_manifest::ast;
use page_manifest::error::{CompileError, ErrorKind, Warning};
use page_manifest::lower::lower_program;
use page_manifest::manifest::{self, BuildOptions, DisplayMode, MemoryStorage};
use page_manifest::path_de;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile parsed page programs into validated IR or UI manifests
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate and print the lowered IR
    Lower(LowerOut),
    /// lower and build the UI manifest
    Manifest(ManifestOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more program documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct LowerOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file, or directory when several inputs match (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ManifestOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// runtime state snapshot (.json)
    #[arg(long)]
    state: Option<PathBuf>,

    /// record rows, `{"Record": [{...}]}` (.json)
    #[arg(long)]
    rows: Option<PathBuf>,

    /// viewer identity (.json); `id` scopes owned records
    #[arg(long)]
    identity: Option<PathBuf>,

    /// studio | production
    #[arg(long, default_value = "studio")]
    display_mode: DisplayMode,

    /// runtime theme: light | dark | system
    #[arg(long)]
    theme: Option<String>,

    /// rows read per data-bound element
    #[arg(long, default_value_t = manifest::DEFAULT_ROW_LIMIT)]
    row_limit: usize,

    /// emit compact JSON with sorted keys
    #[arg(long)]
    canonical: bool,

    /// print warnings to stderr
    #[arg(long)]
    warnings: bool,

    /// output .json file, or directory when several inputs match (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

/// One compiled input.
struct Compiled {
    source_path: PathBuf,
    outcome: Result<(String, Vec<Warning>), CompileError>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn source_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `Ok(false)` when at least one input failed to compile.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Lower(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(true);
                }
                let source_paths = target.input_settings.source_paths()?;
                let compiled = compile_all(&source_paths, |program| {
                    let ir = lower_program(&program)?;
                    let rendered = serde_json::to_string_pretty(&ir)
                        .map_err(|err| CompileError::internal(format!("cannot render IR: {err}")))?;
                    Ok((rendered, Vec::new()))
                });
                report(compiled, target.out.as_deref(), false)
            }
            Command::Manifest(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(true);
                }
                let state = match &target.state {
                    Some(path) => read_json(path)?,
                    None => Value::Object(Default::default()),
                };
                let storage = match &target.rows {
                    Some(path) => {
                        let rows = read_json(path)?;
                        MemoryStorage::from_value(rows, Some(path.to_string_lossy().to_string()))
                            .with_context(|| format!("invalid rows document {}", path.display()))?
                    }
                    None => MemoryStorage::new(),
                };
                let options = BuildOptions {
                    display_mode: target.display_mode,
                    runtime_theme: target.theme.clone(),
                    identity: target.identity.as_deref().map(read_json).transpose()?,
                    row_limit: target.row_limit,
                };
                let source_paths = target.input_settings.source_paths()?;
                let compiled = compile_all(&source_paths, |program| {
                    let mut warnings = Vec::new();
                    let value = page_manifest::compile(&program, &state, &storage, &options, &mut warnings)?;
                    let rendered = if target.canonical {
                        manifest::canonical_json(&value)
                    } else {
                        serde_json::to_string_pretty(&value)
                            .map_err(|err| CompileError::internal(format!("cannot render manifest: {err}")))?
                    };
                    Ok((rendered, warnings))
                });
                report(compiled, target.out.as_deref(), target.warnings)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Compiles every input in parallel; results keep the input order.
fn compile_all<F>(source_paths: &[PathBuf], compile: F) -> Vec<Compiled>
where
    F: Fn(ast::Program) -> Result<(String, Vec<Warning>), CompileError> + Sync,
{
    source_paths
        .par_iter()
        .map(|source_path| {
            debug!(path = %source_path.display(), "compiling");
            let outcome = std::fs::read(source_path)
                .map_err(|err| CompileError::new(ErrorKind::Input, format!("failed to read source file: {err}")))
                .and_then(|bytes| path_de::from_slice_with_path::<ast::Program>(&bytes))
                .and_then(&compile);
            Compiled { source_path: source_path.clone(), outcome }
        })
        .collect()
}

fn report(compiled: Vec<Compiled>, out: Option<&Path>, show_warnings: bool) -> anyhow::Result<bool> {
    let many = compiled.len() > 1;
    let mut all_ok = true;
    for Compiled { source_path, outcome } in compiled {
        let source = source_path.to_string_lossy();
        match outcome {
            Ok((rendered, warnings)) => {
                if show_warnings {
                    for warning in &warnings {
                        eprintln!("{} {source}: {} [{}]", "warning:".yellow().bold(), warning.message, warning.code);
                    }
                }
                write_output(&source_path, &rendered, out, many)?;
            }
            Err(err) => {
                all_ok = false;
                eprintln!("{} {source}: {}", "error:".red().bold(), err.located());
            }
        }
    }
    Ok(all_ok)
}

fn write_output(source_path: &Path, rendered: &str, out: Option<&Path>, many: bool) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{rendered}");
        return Ok(());
    };
    let target = if many {
        let stem = source_path.file_stem().context("input path has no file name")?;
        out.join(stem).with_extension("json")
    } else {
        out.to_path_buf()
    };
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(&target, rendered).with_context(|| format!("cannot write {}", target.display()))?;
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    path_de::from_slice_with_path(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}

