//! Text normalisation shared by the passphrase file and the matcher.
//!
//! The recogniser produces lowercase-ish text with stray `[unk]` markers for
//! words it could not decode and irregular spacing.  Both stored passphrases
//! and recognised candidates go through [`normalize`] so that comparisons
//! operate on the same canonical form.

/// Marker emitted by the recogniser for an unknown word.
pub const UNKNOWN_WORD_MARKER: &str = "[unk]";

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Canonicalise `raw` for passphrase comparison.
///
/// * trims surrounding whitespace,
/// * lowercases unless `case_sensitive` is set,
/// * removes every `[unk]` marker,
/// * collapses whitespace runs into single spaces.
///
/// Returns `None` when nothing is left.
///
/// ```
/// use voice_gate::passphrase::normalize;
///
/// assert_eq!(
///     normalize("  Otevři   Dveře  ", false).as_deref(),
///     Some("otevři dveře")
/// );
/// assert_eq!(normalize("[unk] [unk]", false), None);
/// ```
pub fn normalize(raw: &str, case_sensitive: bool) -> Option<String> {
    let folded = if case_sensitive {
        raw.trim().to_string()
    } else {
        raw.trim().to_lowercase()
    };

    // The marker is matched literally.  In case-sensitive mode an "[UNK]"
    // spelling is left alone, which is what the recogniser never emits.
    let stripped = folded.replace(UNKNOWN_WORD_MARKER, " ");

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
