//! Passphrase handling: normalisation, fuzzy matching and the on-disk list.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_gate::passphrase::PassphraseStore;
//!
//! let store = PassphraseStore::load("passwords.txt", false).unwrap();
//! let result = store.check("prosím otevři dveře");
//! if result.matched {
//!     println!("accepted: {:?}", result.passphrase);
//! }
//! ```

pub mod matcher;
pub mod normalize;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use matcher::{match_candidate, matches_all, MatchResult, MatchStrategy, SIMILARITY_THRESHOLD};
pub use normalize::normalize;
pub use store::{PassphraseError, PassphraseStore, DEFAULT_PASSPHRASES};
