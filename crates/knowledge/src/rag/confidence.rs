//! Answer confidence from wording.

use super::types::Confidence;

/// Phrases that mean the model could not answer from context.
const UNCERTAIN_PHRASES: &[&str] = &[
    "don't have enough information",
    "cannot find",
    "not mentioned",
    "unclear",
    "ambiguous",
];

/// Hedging words; several of them lower confidence.
const HEDGE_PHRASES: &[&str] = &[
    "might",
    "may",
    "possibly",
    "perhaps",
    "seems",
    "appears",
    "suggests",
    "could be",
];

/// Classify an answer. Uncertainty wins over any hedge count.
pub fn assess(answer: &str) -> Confidence {
    let answer = answer.to_lowercase();

    if UNCERTAIN_PHRASES.iter().any(|p| answer.contains(p)) {
        return Confidence::Low;
    }

    // Substring match, as with the uncertainty list.
    let hedges = HEDGE_PHRASES.iter().filter(|p| answer.contains(*p)).count();
    match hedges {
        0 => Confidence::High,
        1 | 2 => Confidence::MediumHigh,
        _ => Confidence::Medium,
    }
}
