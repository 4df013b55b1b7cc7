//! Deterministic password derivation
//!
//! `password = shape(base64(HMAC-SHA256(master, label [|| counter])))`
//!
//! The output depends only on the master secret and the entry's own
//! configuration. Salt, iteration count and scheme version of the document
//! never enter the computation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::document::{Entry, OutputMode};
use crate::scheme::hmac_sha256;

/// Characters dropped by [`OutputMode::AlphanumericOnly`]
const NON_ALPHANUMERIC: [char; 3] = ['/', '+', '='];

/// Suffix added by [`OutputMode::Base64WithTrailingSymbol`]
const TRAILING_SYMBOL: char = '!';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeriveError {
    #[error("Requested {requested} characters but only {available} are available")]
    TruncationOutOfRange { requested: usize, available: usize },
}

/// Derive the password for `entry` without checking the master secret.
///
/// [`crate::Engine::derive_password`] is the checked form; this is the path a
/// caller takes after deciding to proceed despite a mismatch.
///
/// # Example
/// ```
/// use passgen_core::{derive_password, Entry, OutputMode};
/// let entry = Entry::new("example.com").with_output_mode(OutputMode::AlphanumericOnly);
/// let a = derive_password(&entry, "hunter2").unwrap();
/// let b = derive_password(&entry, "hunter2").unwrap();
/// assert_eq!(a, b);
/// assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn derive_password(entry: &Entry, master_secret: &str) -> Result<String, DeriveError> {
    let counter = match entry.change_counter {
        Some(n) if n != 0 => n.to_string(),
        _ => String::new(),
    };

    let raw = Zeroizing::new(hmac_sha256(
        master_secret.as_bytes(),
        &[entry.label.as_bytes(), counter.as_bytes()],
    ));

    let mut password = encode(&raw[..], entry.output_mode);

    if let Some(max_length) = entry.max_length {
        truncate(&mut password, max_length)?;
    }

    Ok(password)
}

fn encode(raw: &[u8], mode: OutputMode) -> String {
    let mut encoded = STANDARD.encode(raw);
    match mode {
        OutputMode::Base64 => {}
        OutputMode::Base64WithTrailingSymbol => encoded.push(TRAILING_SYMBOL),
        OutputMode::AlphanumericOnly => encoded.retain(|c| !NON_ALPHANUMERIC.contains(&c)),
    }
    encoded
}

fn truncate(password: &mut String, max_length: usize) -> Result<(), DeriveError> {
    // Base64 output is ASCII, so bytes and characters coincide.
    let available = password.len();
    if max_length > available {
        return Err(DeriveError::TruncationOutOfRange {
            requested: max_length,
            available,
        });
    }
    password.truncate(max_length);
    Ok(())
}
