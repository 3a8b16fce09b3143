//! Fuzzy passphrase matching.
//!
//! A recognised candidate is compared against each stored passphrase in store
//! order.  For every passphrase the strategies below are tried in this fixed
//! order; the first passphrase that satisfies any of them wins:
//!
//! | # | Strategy      | Rule                                                   |
//! |---|---------------|--------------------------------------------------------|
//! | 1 | `Exact`       | `candidate == passphrase`                              |
//! | 2 | `Containment` | passphrase inside candidate, or a multi-word candidate inside the passphrase |
//! | 3 | `WordOverlap` | at least two passphrase words occur in the candidate   |
//! | 4 | `SingleWord`  | one-word passphrase and the whole candidate is that word |
//! | 5 | `Similarity`  | Jaccard similarity of the word sets ≥ 0.8              |
//!
//! Both sides are expected to be normalised already (see
//! [`normalize`](crate::passphrase::normalize)).  With normalised input
//! `SingleWord` never fires, because a one-word candidate equal to a one-word
//! passphrase is already `Exact`; it only matters for raw passphrases with
//! stray whitespace.  `Similarity` is reached by passphrases with repeated
//! words, e.g. `"otevři otevři"` against `"otevři"`.

use std::collections::HashSet;

/// Minimum Jaccard similarity accepted by [`MatchStrategy::Similarity`].
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Minimum number of shared words for [`MatchStrategy::WordOverlap`].
const MIN_SHARED_WORDS: usize = 2;

// ---------------------------------------------------------------------------
// MatchStrategy / MatchResult
// ---------------------------------------------------------------------------

/// The rule that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    Containment,
    WordOverlap,
    SingleWord,
    Similarity,
}

impl MatchStrategy {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Containment => "containment",
            MatchStrategy::WordOverlap => "word-overlap",
            MatchStrategy::SingleWord => "single-word",
            MatchStrategy::Similarity => "similarity",
        }
    }
}

/// Outcome of matching one candidate against the passphrase set.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// The passphrase that matched, `None` when `matched` is false.
    pub passphrase: Option<String>,
    /// The strategy that fired, `None` when `matched` is false.
    pub strategy: Option<MatchStrategy>,
}

impl MatchResult {
    fn hit(passphrase: &str, strategy: MatchStrategy) -> Self {
        Self {
            matched: true,
            passphrase: Some(passphrase.to_string()),
            strategy: Some(strategy),
        }
    }

    fn miss() -> Self {
        Self {
            matched: false,
            passphrase: None,
            strategy: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Match `candidate` against `passphrases`, returning the first hit in store
/// order.
///
/// ```
/// use voice_gate::passphrase::{match_candidate, MatchStrategy};
///
/// let set = vec!["otevři".to_string()];
/// let result = match_candidate("otevři", &set);
/// assert!(result.matched);
/// assert_eq!(result.strategy, Some(MatchStrategy::Exact));
/// ```
pub fn match_candidate<S: AsRef<str>>(candidate: &str, passphrases: &[S]) -> MatchResult {
    for passphrase in passphrases {
        let passphrase = passphrase.as_ref();
        if let Some(strategy) = compare(candidate, passphrase) {
            log::debug!(
                "passphrase: '{candidate}' matched '{passphrase}' ({})",
                strategy.label()
            );
            return MatchResult::hit(passphrase, strategy);
        }
    }
    MatchResult::miss()
}

/// Every passphrase that `candidate` would match, in store order.
///
/// Used when tuning the passphrase list to see which entries a recognised
/// phrase overlaps with.
pub fn matches_all<S: AsRef<str>>(candidate: &str, passphrases: &[S]) -> Vec<String> {
    passphrases
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| compare(candidate, p).is_some())
        .map(str::to_string)
        .collect()
}

/// Apply the strategies in order to a single passphrase.
fn compare(candidate: &str, passphrase: &str) -> Option<MatchStrategy> {
    if candidate.is_empty() || passphrase.is_empty() {
        return None;
    }

    if candidate == passphrase {
        return Some(MatchStrategy::Exact);
    }

    let candidate_words: HashSet<&str> = candidate.split_whitespace().collect();
    let passphrase_words: HashSet<&str> = passphrase.split_whitespace().collect();

    // A lone recognised word must not unlock a longer phrase just because it
    // happens to be a piece of it; single words go through the SingleWord rule.
    let reverse_allowed = candidate_words.len() >= MIN_SHARED_WORDS;
    if candidate.contains(passphrase) || (reverse_allowed && passphrase.contains(candidate)) {
        return Some(MatchStrategy::Containment);
    }

    let shared = passphrase_words.intersection(&candidate_words).count();
    if shared >= MIN_SHARED_WORDS {
        return Some(MatchStrategy::WordOverlap);
    }

    if passphrase_words.len() == 1 && shared == 1 && candidate == passphrase.trim() {
        return Some(MatchStrategy::SingleWord);
    }

    if jaccard(&candidate_words, &passphrase_words) >= SIMILARITY_THRESHOLD {
        return Some(MatchStrategy::Similarity);
    }

    None
}

/// `|a ∩ b| / |a ∪ b|`, or `0.0` when either set is empty.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match() {
        let r = match_candidate("otevři", &set(&["otevři"]));
        assert!(r.matched);
        assert_eq!(r.passphrase.as_deref(), Some("otevři"));
        assert_eq!(r.strategy, Some(MatchStrategy::Exact));
    }

    #[test]
    fn passphrase_contained_in_candidate() {
        let r = match_candidate("prosím otevři dveře", &set(&["otevři dveře"]));
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::Containment));
    }

    #[test]
    fn single_word_rule_matches_unnormalised_passphrase() {
        let r = match_candidate("otevři", &set(&[" otevři "]));
        assert!(r.matched);
        assert_eq!(r.passphrase.as_deref(), Some(" otevři "));
        assert_eq!(r.strategy, Some(MatchStrategy::SingleWord));
    }

    #[test]
    fn repeated_word_passphrase_matches_by_similarity() {
        let r = match_candidate("otevři", &set(&["otevři otevři"]));
        assert!(r.matched);
        assert_eq!(r.passphrase.as_deref(), Some("otevři otevři"));
        assert_eq!(r.strategy, Some(MatchStrategy::Similarity));
    }

    #[test]
    fn multi_word_candidate_contained_in_passphrase() {
        let r = match_candidate("otevři dveře", &set(&["otevři dveře prosím"]));
        assert_eq!(r.strategy, Some(MatchStrategy::Containment));
    }

    #[test]
    fn word_overlap_when_order_differs() {
        // Neither string contains the other, so only the overlap rule fires.
        let r = match_candidate("otevři prosím dveře", &set(&["otevři dveře"]));
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::WordOverlap));
        assert_eq!(r.passphrase.as_deref(), Some("otevři dveře"));
    }

    #[test]
    fn word_overlap_ignores_extra_words() {
        let r = match_candidate(
            "no tak prosím bránu hned otevři",
            &set(&["otevři bránu"]),
        );
        assert_eq!(r.strategy, Some(MatchStrategy::WordOverlap));
    }

    #[test]
    fn single_word_of_two_word_passphrase_does_not_match() {
        let r = match_candidate("dveře", &set(&["otevři dveře", "garáž"]));
        assert!(!r.matched);
        assert!(r.passphrase.is_none());
        assert!(r.strategy.is_none());

        assert!(!match_candidate("otevři", &set(&["otevři dveře"])).matched);
    }

    #[test]
    fn one_letter_does_not_match_anything() {
        let r = match_candidate("o", &set(&["otevři", "otevři dveře"]));
        assert!(!r.matched);
    }

    #[test]
    fn single_word_passphrase_is_not_matched_by_other_words() {
        let r = match_candidate("vrata", &set(&["garáž"]));
        assert!(!r.matched);

        let r = match_candidate("garáž vrata", &set(&["garáž"]));
        assert_eq!(r.strategy, Some(MatchStrategy::Containment));
    }

    #[test]
    fn jaccard_threshold_boundary() {
        let a: HashSet<&str> = ["a", "b", "c", "d"].into_iter().collect();
        let b: HashSet<&str> = ["a", "b", "c", "d", "e"].into_iter().collect();
        assert!((jaccard(&a, &b) - SIMILARITY_THRESHOLD).abs() < 1e-9);
    }

    #[test]
    fn jaccard_of_empty_sets_is_zero() {
        let empty: HashSet<&str> = HashSet::new();
        let one: HashSet<&str> = ["x"].into_iter().collect();
        assert_eq!(jaccard(&empty, &one), 0.0);
        assert_eq!(jaccard(&one, &empty), 0.0);
    }

    #[test]
    fn first_passphrase_in_store_order_wins() {
        let r = match_candidate(
            "otevři dveře prosím",
            &set(&["otevři", "otevři dveře"]),
        );
        assert_eq!(r.passphrase.as_deref(), Some("otevři"));
        assert_eq!(r.strategy, Some(MatchStrategy::Containment));

        let r = match_candidate(
            "otevři dveře prosím",
            &set(&["otevři dveře", "otevři"]),
        );
        assert_eq!(r.passphrase.as_deref(), Some("otevři dveře"));
    }

    #[test]
    fn strategy_is_reported_per_winning_passphrase() {
        // The first passphrase only overlaps by words, the second is exact.
        // Store order wins over strategy rank.
        let r = match_candidate("vrata otevři", &set(&["otevři vrata", "vrata otevři"]));
        assert_eq!(r.passphrase.as_deref(), Some("otevři vrata"));
        assert_eq!(r.strategy, Some(MatchStrategy::WordOverlap));
    }

    #[test]
    fn no_passphrases_never_match() {
        let empty: Vec<String> = Vec::new();
        assert!(!match_candidate("otevři", &empty).matched);
    }

    #[test]
    fn matches_all_lists_every_hit() {
        let hits = matches_all(
            "otevři dveře prosím",
            &set(&["otevři", "otevři dveře", "otevři garáž", "garáž"]),
        );
        assert_eq!(hits, vec!["otevři".to_string(), "otevři dveře".to_string()]);
    }

    #[test]
    fn unrelated_text_does_not_match() {
        let r = match_candidate(
            "dobrý den jak se máte",
            &set(&["otevři", "otevři dveře", "otevři bránu"]),
        );
        assert!(!r.matched);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(MatchStrategy::Exact.label(), "exact");
        assert_eq!(MatchStrategy::WordOverlap.label(), "word-overlap");
        assert_eq!(MatchStrategy::Similarity.label(), "similarity");
    }
}
