//! Passphrase list persisted as a plain text file.
//!
//! File format (UTF-8):
//!
//! ```text
//! # comment lines start with '#'
//!
//! otevři
//! otevři dveře
//! ```
//!
//! One phrase per line, blank lines ignored, no escaping.  Every phrase is
//! normalised on load; duplicates are kept as they appear in the file.
//! [`PassphraseStore::save`] rewrites the file with a header and the phrases
//! sorted lexicographically.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::matcher::{match_candidate, MatchResult};
use super::normalize::normalize;

/// Phrases written when the passphrase file does not exist yet.
pub const DEFAULT_PASSPHRASES: &[&str] = &[
    "otevři",
    "otevři dveře",
    "otevři prosím",
    "otevři dveře prosím",
    "otevři bránu",
    "otevři bránu prosím",
    "otevři vrata",
    "otevři vrata prosím",
    "otevři garáž",
    "otevři garáž prosím",
];

const FILE_HEADER: &str = "# Voice gate passphrases\n\
                           # One passphrase per line, '#' starts a comment\n\
                           # Matched against the recogniser's final transcript\n\n";

// ---------------------------------------------------------------------------
// PassphraseError
// ---------------------------------------------------------------------------

/// Errors raised while loading or persisting passphrases.
#[derive(Debug, Error)]
pub enum PassphraseError {
    /// The passphrase file could not be read, created or written.
    #[error("passphrase file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Parsing finished without a single usable phrase.
    #[error("no passphrases loaded from {0}")]
    Empty(String),

    /// The phrase is empty after normalisation.
    #[error("passphrase is empty after normalisation")]
    Invalid,

    /// `add` was called with a phrase that is already stored.
    #[error("passphrase already exists: {0}")]
    Duplicate(String),

    /// `remove` was called with a phrase that is not stored.
    #[error("passphrase not found: {0}")]
    NotFound(String),
}

impl PassphraseError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse passphrase file content into normalised phrases, in file order.
pub fn parse_passphrases(content: &str, case_sensitive: bool) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| normalize(line, case_sensitive))
        .collect()
}

/// Render phrases in the on-disk format, sorted.
pub fn render_passphrases(passphrases: &[String]) -> String {
    let mut sorted: Vec<&String> = passphrases.iter().collect();
    sorted.sort();

    let mut out = String::from(FILE_HEADER);
    for phrase in sorted {
        out.push_str(phrase);
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// PassphraseStore
// ---------------------------------------------------------------------------

/// Accepted passphrases backed by a text file.
#[derive(Debug, Clone)]
pub struct PassphraseStore {
    passphrases: Vec<String>,
    path: PathBuf,
    case_sensitive: bool,
}

impl PassphraseStore {
    /// Load passphrases from `path`, writing the default list first when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// [`PassphraseError::Io`] when the file cannot be created or read, and
    /// [`PassphraseError::Empty`] when it contains no usable phrase.
    pub fn load(path: impl Into<PathBuf>, case_sensitive: bool) -> Result<Self, PassphraseError> {
        let path = path.into();
        let mut store = Self {
            passphrases: Vec::new(),
            path,
            case_sensitive,
        };
        store.reload()?;
        Ok(store)
    }

    /// Build an in-memory store from already known phrases (normalising
    /// them).  Nothing is read from disk until [`reload`](Self::reload).
    pub fn from_phrases<I, S>(path: impl Into<PathBuf>, phrases: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let passphrases = phrases
            .into_iter()
            .filter_map(|p| normalize(p.as_ref(), case_sensitive))
            .collect();
        Self {
            passphrases,
            path: path.into(),
            case_sensitive,
        }
    }

    /// Re-read the passphrase file, replacing the in-memory list.
    ///
    /// On error the previous list is left untouched.
    pub fn reload(&mut self) -> Result<usize, PassphraseError> {
        log::info!("passphrase: loading from {}", self.path.display());

        if !self.path.exists() {
            log::warn!(
                "passphrase: {} not found, writing default list",
                self.path.display()
            );
            let defaults: Vec<String> = DEFAULT_PASSPHRASES
                .iter()
                .filter_map(|p| normalize(p, self.case_sensitive))
                .collect();
            write_file(&self.path, &defaults)?;
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PassphraseError::io(&self.path, e))?;
        let parsed = parse_passphrases(&content, self.case_sensitive);

        if parsed.is_empty() {
            return Err(PassphraseError::Empty(self.path.display().to_string()));
        }

        for phrase in &parsed {
            log::debug!("passphrase: loaded '{phrase}'");
        }
        log::info!("passphrase: {} loaded", parsed.len());

        self.passphrases = parsed;
        Ok(self.passphrases.len())
    }

    /// Write the current list back to the passphrase file, sorted.
    pub fn save(&self) -> Result<(), PassphraseError> {
        write_file(&self.path, &self.passphrases)?;
        log::info!(
            "passphrase: saved {} to {}",
            self.passphrases.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Normalise and append `phrase`, then persist the file.
    ///
    /// Returns the stored (normalised) form.
    pub fn add(&mut self, phrase: &str) -> Result<String, PassphraseError> {
        let normalized = normalize(phrase, self.case_sensitive).ok_or(PassphraseError::Invalid)?;
        if self.passphrases.contains(&normalized) {
            return Err(PassphraseError::Duplicate(normalized));
        }
        self.passphrases.push(normalized.clone());
        self.save()?;
        log::debug!("passphrase: added '{normalized}'");
        Ok(normalized)
    }

    /// Remove the first occurrence of `phrase` (after normalisation), then
    /// persist the file.
    pub fn remove(&mut self, phrase: &str) -> Result<String, PassphraseError> {
        let normalized = normalize(phrase, self.case_sensitive).ok_or(PassphraseError::Invalid)?;
        let index = self
            .passphrases
            .iter()
            .position(|p| *p == normalized)
            .ok_or_else(|| PassphraseError::NotFound(normalized.clone()))?;
        self.passphrases.remove(index);
        self.save()?;
        log::debug!("passphrase: removed '{normalized}'");
        Ok(normalized)
    }

    /// A copy of the stored phrases in store order.
    pub fn list(&self) -> Vec<String> {
        self.passphrases.clone()
    }

    /// Borrow the stored phrases in store order.
    pub fn as_slice(&self) -> &[String] {
        &self.passphrases
    }

    /// Number of stored phrases (duplicates included).
    pub fn count(&self) -> usize {
        self.passphrases.len()
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.passphrases.is_empty()
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalise `raw` recognised text and match it against the store.
    pub fn check(&self, raw: &str) -> MatchResult {
        match normalize(raw, self.case_sensitive) {
            Some(candidate) => match_candidate(&candidate, &self.passphrases),
            None => match_candidate("", &self.passphrases),
        }
    }
}

fn write_file(path: &Path, passphrases: &[String]) -> Result<(), PassphraseError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PassphraseError::io(path, e))?;
        }
    }
    std::fs::write(path, render_passphrases(passphrases)).map_err(|e| PassphraseError::io(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
