//! Subcommand logic over an in-memory key list.
//!
//! Nothing here touches the terminal or the filesystem. `main` prompts,
//! saves when [`Outcome::dirty`] says so, and prints.

use anyhow::{anyhow, Result};
use passgen_core::{derive_password, Engine, Entry, KeyListDocument, Verification};
use zeroize::Zeroizing;

/// What a command did to the document and what it produced
pub struct Outcome {
    pub verification: Verification,
    /// `None` when nothing was derived
    pub password: Option<Zeroizing<String>>,
    /// An entry was added, changed or removed
    pub entries_changed: bool,
}

impl Outcome {
    fn unchanged(verification: Verification) -> Self {
        Self {
            verification,
            password: None,
            entries_changed: false,
        }
    }

    /// Whether the document has to be saved.
    ///
    /// True after a mismatch too when the verification migrated the list.
    pub fn dirty(&self) -> bool {
        self.verification.document_mutated() || self.entries_changed
    }
}

/// Fresh list enrolled with `secret`.
pub fn init(iterations: u32, secret: &str) -> Result<KeyListDocument> {
    let mut document = KeyListDocument::new(iterations)?;
    let verification = Engine::new(&mut document).verify_master(secret)?;
    anyhow::ensure!(
        verification.changes.enrolled,
        "New key list was not enrolled"
    );
    Ok(document)
}

pub fn verify(document: &mut KeyListDocument, secret: &str) -> Result<Outcome> {
    let verification = Engine::new(document).verify_master(secret)?;
    Ok(Outcome::unchanged(verification))
}

/// Verify, select or create the entry labeled like `template`, derive.
///
/// On a mismatch `derive_anyway` decides whether to continue. A declined
/// mismatch leaves the entries untouched.
pub fn generate(
    document: &mut KeyListDocument,
    secret: &str,
    template: Entry,
    derive_anyway: impl FnOnce() -> Result<bool>,
) -> Result<Outcome> {
    let mut engine = Engine::new(document);
    let verification = engine.verify_master(secret)?;
    if !verification.matched && !derive_anyway()? {
        return Ok(Outcome::unchanged(verification));
    }

    let added = engine.document().find_entry(&template.label).is_none();
    let entry = engine.entry_or_insert(template)?.clone();
    let password = if verification.matched {
        engine.derive_password(&entry, secret)?
    } else {
        log::warn!(
            "Deriving '{}' despite a master password mismatch",
            entry.label
        );
        derive_password(&entry, secret)?
    };

    Ok(Outcome {
        verification,
        password: Some(Zeroizing::new(password)),
        entries_changed: added,
    })
}

/// Verify, bump the entry's change counter and derive its new password.
pub fn rotate(document: &mut KeyListDocument, secret: &str, label: &str) -> Result<Outcome> {
    ensure_entry(document, label)?;
    let verification = Engine::new(document).verify_master(secret)?;
    if !verification.matched {
        return Ok(Outcome::unchanged(verification));
    }

    let entry = document
        .find_entry_mut(label)
        .ok_or_else(|| anyhow!("No entry labeled '{}'", label))?;
    let counter = entry.bump_change_counter();
    let entry = entry.clone();
    log::info!("Entry '{}' moved to change counter {}", label, counter);

    let password = Engine::new(document).derive_password(&entry, secret)?;
    Ok(Outcome {
        verification,
        password: Some(Zeroizing::new(password)),
        entries_changed: true,
    })
}

pub fn remove(document: &mut KeyListDocument, secret: &str, label: &str) -> Result<Outcome> {
    ensure_entry(document, label)?;
    let verification = Engine::new(document).verify_master(secret)?;
    if !verification.matched {
        return Ok(Outcome::unchanged(verification));
    }

    let removed = document.remove_entry(label).is_some();
    Ok(Outcome {
        verification,
        password: None,
        entries_changed: removed,
    })
}

fn ensure_entry(document: &KeyListDocument, label: &str) -> Result<()> {
    anyhow::ensure!(
        document.find_entry(label).is_some(),
        "No entry labeled '{}'",
        label
    );
    Ok(())
}
