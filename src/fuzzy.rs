//! Fuzzy string matching for show names and directory names.

use difference::{Changeset, Difference};

/// Minimum similarity score for a candidate to be considered a match.
///
/// Hand-tuned value, not derived from anything.
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Lowercase and drop everything that is not alphanumeric.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Similarity of two strings in the range `0.0..=1.0`.
///
/// Case and punctuation are ignored.
/// When the lengths differ, the shorter string is also compared against every
/// block it shares with the longer one, so a name fully contained in a longer
/// name scores 1.0.
#[must_use]
pub fn score(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == b_len {
        return ratio(&a, &b);
    }

    let (short, long) = if a_len < b_len { (a, b) } else { (b, a) };
    let changeset = Changeset::new(&short, &long, "");
    let mut best = similarity(&changeset, &short, &long);
    for block in matching_blocks(&changeset) {
        best = best.max(ratio(&short, block));
    }
    best
}

/// Find the candidates that best match the target.
///
/// Candidates scoring below [`MATCH_THRESHOLD`] are discarded.
/// An exact match (score 1.0 with the same normalized length) is returned alone,
/// otherwise all candidates tied at the best score are returned in input order.
#[must_use]
pub fn best_matches<S: AsRef<str>>(target: &str, candidates: &[S]) -> Vec<String> {
    let scores: Vec<f64> = candidates.iter().map(|c| score(target, c.as_ref())).collect();
    let max_score = scores.iter().copied().fold(0.0_f64, f64::max);
    if max_score < MATCH_THRESHOLD {
        return Vec::new();
    }

    let target_length = normalize(target).chars().count();
    let best: Vec<&str> = candidates
        .iter()
        .zip(&scores)
        .filter(|&(_, &value)| (value - max_score).abs() < f64::EPSILON)
        .map(|(candidate, _)| candidate.as_ref())
        .collect();

    if (max_score - 1.0).abs() < f64::EPSILON
        && let Some(exact) = best
            .iter()
            .find(|candidate| normalize(candidate).chars().count() == target_length)
    {
        return vec![(*exact).to_string()];
    }

    best.into_iter().map(ToString::to_string).collect()
}

/// Ratio `2 * M / T` where `M` is the number of matched characters and `T` the combined length.
fn ratio(a: &str, b: &str) -> f64 {
    let changeset = Changeset::new(a, b, "");
    similarity(&changeset, a, b)
}

fn similarity(changeset: &Changeset, a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    let matched: usize = matching_blocks(changeset).map(|block| block.chars().count()).sum();
    2.0 * matched as f64 / total as f64
}

/// Runs of characters shared by both strings.
fn matching_blocks(changeset: &Changeset) -> impl Iterator<Item = &str> {
    changeset.diffs.iter().filter_map(|diff| match diff {
        Difference::Same(block) if !block.is_empty() => Some(block.as_str()),
        _ => None,
    })
}
