//! PassGen Core
//!
//! Reproducible, secret-free passwords from one memorized master secret.
//!
//! # Fingerprints
//!
//! A key list stores a fingerprint of the master secret, never the secret.
//! Three schemes exist, selected by the document's scheme version:
//! - 0: HMAC-SHA256 of `"CHECK"` keyed by the secret (unsalted, legacy)
//! - 1: iterated SHA-256 over `acc || secret || salt`
//! - 2: PBKDF2-HMAC-SHA256 (current)
//!
//! Documents on an older scheme are migrated by [`Engine::verify_master`].
//!
//! # Derivation
//!
//! Passwords are HMAC-SHA256(master, label [|| change counter]), base64
//! encoded and shaped by the entry's output mode. Derivation never touches
//! document-level state, so the same inputs give the same password anywhere.

pub mod derive;
pub mod document;
pub mod engine;
pub mod scheme;

pub use derive::{derive_password, DeriveError};
pub use document::{
    DocumentError, Entry, KeyListDocument, MasterFingerprint, OutputMode,
    DEFAULT_ITERATION_COUNT,
};
pub use engine::{DocumentChanges, Engine, EngineError, Verification};
pub use scheme::{FingerprintScheme, SchemeVersion};
