//! Master verification, scheme migration and checked derivation
//!
//! An [`Engine`] borrows one [`KeyListDocument`] for a session. Verification
//! is NOT read-only: it may generate the salt, enroll a first fingerprint, or
//! migrate the document to the current scheme. Every such write is reported
//! in [`Verification::changes`] so the caller knows the document must be
//! persisted.
//!
//! # Migration on mismatch
//!
//! A document on an outdated scheme is rewritten on the first verification
//! attempt, whether or not the candidate matches. After a mistyped secret the
//! stored fingerprint belongs to the mistyped secret. Existing key lists
//! depend on this behavior, so it is kept and logged at warn level.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::derive::{self, DeriveError};
use crate::document::{DocumentError, Entry, KeyListDocument};
use crate::scheme::{self, FingerprintScheme, SchemeVersion};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Master password check mismatch")]
    MasterMismatch,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Derive(#[from] DeriveError),
}

/// Writes performed on the document by a verification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentChanges {
    /// A salt was generated for a document that had none
    pub salt_generated: bool,
    /// The candidate became the document's first fingerprint
    pub enrolled: bool,
    /// The document moved from this scheme to the current one
    pub migrated_from: Option<SchemeVersion>,
}

impl DocumentChanges {
    pub fn any(&self) -> bool {
        self.salt_generated || self.enrolled || self.migrated_from.is_some()
    }
}

/// Outcome of [`Engine::verify_master`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "verification may have mutated the document; check `changes` before discarding"]
pub struct Verification {
    pub matched: bool,
    pub changes: DocumentChanges,
}

impl Verification {
    /// Whether the document must be persisted
    pub fn document_mutated(&self) -> bool {
        self.changes.any()
    }
}

pub struct Engine<'a> {
    document: &'a mut KeyListDocument,
}

impl<'a> Engine<'a> {
    pub fn new(document: &'a mut KeyListDocument) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &KeyListDocument {
        self.document
    }

    /// Check `candidate` against the stored fingerprint.
    ///
    /// 1. Generate the salt if absent.
    /// 2. Fingerprint the candidate under the document's current scheme.
    /// 3. No stored fingerprint: adopt the candidate's (enrollment).
    /// 4. Outdated scheme: bump to the current scheme, store the candidate's
    ///    fingerprint under it, and report whether the candidate matched the
    ///    old fingerprint. The rewrite happens on mismatch too.
    /// 5. Otherwise compare.
    pub fn verify_master(&mut self, candidate: &str) -> Result<Verification, EngineError> {
        let mut changes = DocumentChanges::default();

        if self.document.master().salt().is_none() {
            let salt = scheme::generate_salt();
            self.document.master_mut().salt = Some(STANDARD.encode(salt));
            changes.salt_generated = true;
            log::debug!("Generated master salt");
        }

        let version = self.document.scheme_version();
        let candidate_hash = self.fingerprint(candidate, version)?;

        let Some(stored) = self.document.master().hash().map(str::to_string) else {
            self.document.master_mut().hash = Some(candidate_hash);
            changes.enrolled = true;
            log::info!("Enrolled master fingerprint under scheme {}", version);
            return Ok(Verification {
                matched: true,
                changes,
            });
        };

        if version.is_outdated() {
            let current = SchemeVersion::CURRENT;
            self.document.set_scheme_version(current);
            let migrated_hash = self.fingerprint(candidate, current)?;
            self.document.master_mut().hash = Some(migrated_hash);
            changes.migrated_from = Some(version);

            let matched = scheme::fingerprints_match(&candidate_hash, &stored);
            if matched {
                log::info!("Migrated master fingerprint from scheme {} to {}", version, current);
            } else {
                log::warn!(
                    "Migrated master fingerprint from scheme {} to {} on a mismatched secret; \
                     the stored fingerprint now belongs to that secret",
                    version,
                    current
                );
            }
            return Ok(Verification { matched, changes });
        }

        Ok(Verification {
            matched: scheme::fingerprints_match(&candidate_hash, &stored),
            changes,
        })
    }

    /// Derive the password for `entry`, refusing if `master_secret` does not
    /// match the stored fingerprint.
    ///
    /// The check is read-only: it neither generates a salt nor migrates.
    /// Call [`Engine::verify_master`] first.
    pub fn derive_password(&self, entry: &Entry, master_secret: &str) -> Result<String, EngineError> {
        if !self.matches(master_secret)? {
            return Err(EngineError::MasterMismatch);
        }
        Ok(derive::derive_password(entry, master_secret)?)
    }

    /// Return the stored entry labeled like `entry`, appending `entry` if
    /// there is none.
    pub fn entry_or_insert(&mut self, entry: Entry) -> Result<&Entry, EngineError> {
        let position = self
            .document
            .entries()
            .iter()
            .position(|e| e.label == entry.label);
        match position {
            Some(index) => Ok(&self.document.entries()[index]),
            None => {
                log::debug!("Adding entry '{}'", entry.label);
                Ok(self.document.push_entry(entry)?)
            }
        }
    }

    fn matches(&self, secret: &str) -> Result<bool, EngineError> {
        let Some(stored) = self.document.master().hash() else {
            return Ok(false);
        };
        if self.document.master().salt().is_none()
            && self.document.scheme_version() != SchemeVersion::HmacCheck
        {
            return Ok(false);
        }
        let candidate = self.fingerprint(secret, self.document.scheme_version())?;
        Ok(scheme::fingerprints_match(&candidate, stored))
    }

    fn fingerprint(&self, secret: &str, version: SchemeVersion) -> Result<String, EngineError> {
        let master = self.document.master();
        let salt = master.decoded_salt()?.unwrap_or_default();
        let scheme = FingerprintScheme::new(version, &salt, master.iteration_count());
        Ok(scheme.compute(secret))
    }
}
