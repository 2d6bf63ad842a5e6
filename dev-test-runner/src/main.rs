//! Fixture runner: compiles every case under a fixtures directory and
//! checks it against the case's expectations.
//!
//! ```text
//! { "description": "...",
//!   "program": {...}, "state": {...}, "rows": {...}, "identity": {...},
//!   "display_mode": "production", "theme": "dark",
//!   "expect": { "error_matches": "<regex>", "error_kind": "reference",
//!               "pointers": {"/pages/0/slug": "home"}, "absent": ["/actions/x"],
//!               "warnings": ["upload.unused"] } }
//! ```
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use page_manifest::{BuildOptions, DisplayMode, MemoryStorage, ast, canonical_json, compile, path_de};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    #[serde(default)]
    description: Option<String>,
    program: ast::Program,
    #[serde(default)]
    state: Option<Value>,
    #[serde(default)]
    rows: Option<Value>,
    #[serde(default)]
    identity: Option<Value>,
    #[serde(default)]
    display_mode: Option<String>,
    #[serde(default)]
    theme: Option<String>,
    expect: Expect,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Expect {
    #[serde(default)]
    error_matches: Option<String>,
    #[serde(default)]
    error_kind: Option<String>,
    /// JSON pointer → expected value.
    #[serde(default)]
    pointers: Map<String, Value>,
    /// JSON pointers that must not resolve.
    #[serde(default)]
    absent: Vec<String>,
    /// Expected warning codes, in order.
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

fn main() -> ExitCode {
    let dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("fixtures"));
    let cases = match fixture_paths(&dir) {
        Ok(cases) => cases,
        Err(error) => {
            eprintln!("{} cannot list {}: {error}", "error:".red().bold(), dir.display());
            return ExitCode::from(2);
        }
    };

    let mut failed = 0usize;
    for path in &cases {
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        match run_case(path) {
            Ok(()) => eprintln!("✅ {name}"),
            Err(problems) => {
                failed += 1;
                eprintln!("❌ {}", name.red());
                for problem in problems {
                    eprintln!("   {problem}");
                }
            }
        }
    }
    eprintln!("{} passed, {} failed", cases.len() - failed, failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn fixture_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn run_case(path: &Path) -> Result<(), Vec<String>> {
    let source = std::fs::read(path).map_err(|err| vec![format!("cannot read fixture: {err}")])?;
    let case: Case = path_de::from_slice_with_path(&source).map_err(|err| vec![err.message])?;
    if let Some(description) = &case.description {
        print_description(description);
    }

    let storage = match case.rows.clone() {
        Some(rows) => MemoryStorage::from_value(rows, None).map_err(|err| vec![err.to_string()])?,
        None => MemoryStorage::new(),
    };
    let display_mode = match case.display_mode.as_deref() {
        Some(mode) => mode.parse::<DisplayMode>().map_err(|err| vec![err.message])?,
        None => DisplayMode::default(),
    };
    let options = BuildOptions {
        display_mode,
        runtime_theme: case.theme.clone(),
        identity: case.identity.clone(),
        ..BuildOptions::default()
    };
    let state = case.state.clone().unwrap_or_else(|| Value::Object(Map::new()));

    let mut warnings = Vec::new();
    let outcome = compile(&case.program, &state, &storage, &options, &mut warnings);
    let mut problems = Vec::new();
    let expect = &case.expect;

    match (&outcome, &expect.error_matches) {
        (Err(err), Some(pattern)) => {
            let matcher = Regex::new(pattern).map_err(|err| vec![format!("bad error_matches regex: {err}")])?;
            if !matcher.is_match(&err.message) {
                problems.push(format!("error {:?} does not match /{pattern}/", err.message));
            }
            if let Some(kind) = &expect.error_kind {
                let actual = serde_json::to_value(err.kind).unwrap_or(Value::Null);
                if actual.as_str() != Some(kind.as_str()) {
                    problems.push(format!("error kind {actual} is not {kind}"));
                }
            }
        }
        (Err(err), None) => problems.push(format!("unexpected error: {}", err.located())),
        (Ok(_), Some(pattern)) => problems.push(format!("expected an error matching /{pattern}/")),
        (Ok(manifest), None) => {
            check_manifest(manifest, expect, &mut problems);
            let mut again = Vec::new();
            match compile(&case.program, &state, &storage, &options, &mut again) {
                Ok(second) if canonical_json(&second) == canonical_json(manifest) => {}
                Ok(_) => problems.push("second build differs from the first".to_owned()),
                Err(err) => problems.push(format!("second build failed: {}", err.message)),
            }
        }
    }

    if let Some(codes) = &expect.warnings {
        let actual: Vec<&str> = warnings.iter().map(|w| w.code.as_str()).collect();
        if actual != codes.iter().map(String::as_str).collect::<Vec<_>>() {
            problems.push(format!("warnings {actual:?} are not {codes:?}"));
        }
    }

    if problems.is_empty() { Ok(()) } else { Err(problems) }
}

fn check_manifest(manifest: &Value, expect: &Expect, problems: &mut Vec<String>) {
    for (pointer, expected) in &expect.pointers {
        match manifest.pointer(pointer) {
            Some(actual) if actual == expected => {}
            Some(actual) => problems.push(format!("{pointer}: {actual} is not {expected}")),
            None => problems.push(format!("{pointer}: missing")),
        }
    }
    for pointer in &expect.absent {
        if manifest.pointer(pointer).is_some() {
            problems.push(format!("{pointer}: should be absent"));
        }
    }
}

fn print_description(description: &str) {
    if std::env::var_os("FIXTURE_VERBOSE").is_some() {
        eprintln!("   {}", description.dimmed());
    }
}
