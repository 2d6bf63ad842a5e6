//! Stories and the step graph validator.
//!
//! Steps link to each other through `next`: an explicit title, or the
//! following sibling when omitted. The graph must be acyclic and every
//! explicit target must exist.
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Span, StoryStepDecl};
use crate::error::{CompileError, ErrorKind, Result};
use crate::ir::{ItemKind as I, StoryStep};
use crate::suggest::did_you_mean;

use super::expr::check_predicate;

const TONES: &[&str] = &["neutral", "info", "success", "caution", "critical"];

pub fn lower_story(title: &str, steps: &[StoryStepDecl], span: Span) -> Result<I> {
    if title.trim().is_empty() {
        return Err(CompileError::structure("Story title cannot be empty").at(span));
    }
    if steps.is_empty() {
        return Err(CompileError::structure(format!("Story '{title}' has no steps")).at(span));
    }
    let mut titles = BTreeSet::new();
    let mut lowered = Vec::with_capacity(steps.len());
    for step in steps {
        let at = if step.line > 0 { step.span() } else { span };
        if !titles.insert(step.title.as_str()) {
            return Err(CompileError::structure(format!("Story step '{}' is duplicated", step.title)).at(at));
        }
        if let Some(tone) = &step.tone {
            if !TONES.contains(&tone.as_str()) {
                return Err(CompileError::structure(format!(
                    "Story step tone '{tone}' must be one of {}",
                    TONES.join(", ")
                ))
                .at(at));
            }
        }
        if let Some(requires) = &step.requires {
            check_predicate(requires, "Story requirement", at)?;
        }
        lowered.push(StoryStep {
            title: step.title.clone(),
            text: step.text.clone(),
            icon: step.icon.clone(),
            image: step.image.clone(),
            tone: step.tone.clone(),
            requires: step.requires.clone(),
            next: step.next.clone(),
            span: at,
        });
    }
    validate_next_targets(&lowered)?;
    detect_cycles(&lowered, span)?;
    Ok(I::Story { title: title.to_owned(), steps: lowered })
}

/// Every explicit `next` names a sibling step.
pub fn validate_next_targets(steps: &[StoryStep]) -> Result<()> {
    let titles: BTreeSet<&str> = steps.iter().map(|s| s.title.as_str()).collect();
    for step in steps {
        if let Some(next) = &step.next {
            if !titles.contains(next.as_str()) {
                let hint = did_you_mean(next, titles.iter().copied());
                return Err(CompileError::reference(format!(
                    "Story step '{}' points to unknown next step '{next}'.{hint}",
                    step.title
                ))
                .with_details("unknown_story_step", Some(next))
                .at(step.span));
            }
        }
    }
    Ok(())
}

/// Depth-first walk over the `next` graph. Reports the cycle as
/// `A -> B -> A`, starting at the step that closes it.
pub fn detect_cycles(steps: &[StoryStep], span: Span) -> Result<()> {
    if steps.len() < 2 {
        return Ok(());
    }
    let next: BTreeMap<&str, Option<&str>> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let target = step
                .next
                .as_deref()
                .or_else(|| steps.get(i + 1).map(|s| s.title.as_str()));
            (step.title.as_str(), target)
        })
        .collect();

    let mut done: BTreeSet<&str> = BTreeSet::new();
    for start in steps.iter().map(|s| s.title.as_str()) {
        if done.contains(start) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut active: BTreeSet<&str> = BTreeSet::new();
        let mut current = Some(start);
        while let Some(title) = current {
            if active.contains(title) {
                let from = path.iter().position(|t| *t == title).unwrap_or(0);
                let mut cycle = path[from..].to_vec();
                cycle.push(title);
                return Err(CompileError::new(
                    ErrorKind::Cycle,
                    format!("Story steps form a cycle: {}", cycle.join(" -> ")),
                )
                .at(span));
            }
            if done.contains(title) {
                break;
            }
            active.insert(title);
            path.push(title);
            current = next.get(title).copied().flatten();
        }
        done.extend(path);
    }
    Ok(())
}

// ------------------------------- Tests ------------------------------------ //
