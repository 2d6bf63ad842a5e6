//! "Did you mean" suggestions over a finite candidate set.
use strsim::normalized_levenshtein;

/// Minimum normalized similarity for a candidate to be suggested.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Closest candidate with similarity ≥ [`SIMILARITY_THRESHOLD`].
/// Ties go to the lexicographically smallest candidate.
pub fn closest_match<'c, I>(name: &str, candidates: I) -> Option<&'c str>
where
    I: IntoIterator<Item = &'c str>,
{
    let mut best: Option<(f64, &str)> = None;
    for candidate in candidates {
        let score = normalized_levenshtein(name, candidate);
        if score < SIMILARITY_THRESHOLD {
            continue;
        }
        best = match best {
            Some((top, current)) if top > score || (top == score && current <= candidate) => {
                Some((top, current))
            }
            _ => Some((score, candidate)),
        };
    }
    best.map(|(_, candidate)| candidate)
}

/// ` Did you mean "x"?` or the empty string.
pub fn did_you_mean<'c, I>(name: &str, candidates: I) -> String
where
    I: IntoIterator<Item = &'c str>,
{
    match closest_match(name, candidates) {
        Some(hit) => format!(" Did you mean \"{hit}\"?"),
        None => String::new(),
    }
}
