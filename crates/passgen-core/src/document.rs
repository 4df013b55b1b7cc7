//! Key list document
//!
//! A named key list: the master fingerprint plus an ordered list of entries.
//! Entry order is meaningful and survives load/save.
//!
//! # On-disk shape
//!
//! ```json
//! {
//!   "schemeVersion": 2,
//!   "master": { "hash": "...", "salt": "...", "iterCount": 1000 },
//!   "keys": [ { "label": "example.com", "genMode": "AlphaNum", "maxLength": 16 } ]
//! }
//! ```
//!
//! Files written by the desktop shell use PascalCase names (`Version`,
//! `Master`, `IterCount`, `Keys`, `GenMode`, `PasswordChanges`, ...). Those
//! are accepted on read; output always uses the names above.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::scheme::{SchemeVersion, FINGERPRINT_LEN};

/// Iteration count for new documents and for documents that omit it
pub const DEFAULT_ITERATION_COUNT: u32 = 1000;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unexpected scheme version: {0}")]
    UnexpectedSchemeVersion(u32),
    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Post-hash encoding of a derived password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// Standard base64 of the MAC
    #[default]
    #[serde(rename = "Base64")]
    Base64,
    /// Standard base64 followed by `!`
    #[serde(rename = "Base64WithSymbol", alias = "Base64WithTrailingSymbol")]
    Base64WithTrailingSymbol,
    /// Standard base64 with `/`, `+` and `=` removed
    #[serde(rename = "AlphaNum", alias = "AlphanumericOnly")]
    AlphanumericOnly,
}

impl OutputMode {
    /// Name used in the persisted document
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base64 => "Base64",
            Self::Base64WithTrailingSymbol => "Base64WithSymbol",
            Self::AlphanumericOnly => "AlphaNum",
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "base64withsymbol" | "base64withtrailingsymbol" | "symbol" => {
                Ok(Self::Base64WithTrailingSymbol)
            }
            "alphanum" | "alphanumericonly" | "alphanumeric" => Ok(Self::AlphanumericOnly),
            _ => Err(DocumentError::Malformed(format!("unknown output mode: {}", s))),
        }
    }
}

/// One labeled derivation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(alias = "Label")]
    pub label: String,

    #[serde(rename = "genMode", alias = "GenMode", default)]
    pub output_mode: OutputMode,

    /// Keep only this many leading characters. Stored values of 0 or below
    /// read as no limit.
    #[serde(
        rename = "maxLength",
        alias = "MaxLength",
        default,
        deserialize_with = "positive_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<usize>,

    /// Non-zero values are appended to the label before hashing
    #[serde(
        rename = "changeCounter",
        alias = "PasswordChanges",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub change_counter: Option<u32>,
}

fn positive_or_none<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.and_then(|n| usize::try_from(n).ok()).filter(|&n| n > 0))
}

impl Entry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            output_mode: OutputMode::default(),
            max_length: None,
            change_counter: None,
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_change_counter(mut self, counter: u32) -> Self {
        self.change_counter = Some(counter);
        self
    }

    /// Move to the next password for this label.
    ///
    /// Returns the new counter value.
    pub fn bump_change_counter(&mut self) -> u32 {
        let next = self.change_counter.unwrap_or(0).saturating_add(1);
        self.change_counter = Some(next);
        next
    }

    fn validate(&self) -> Result<(), DocumentError> {
        if self.label.is_empty() {
            return Err(DocumentError::Malformed("entry label is empty".to_string()));
        }
        if self.max_length == Some(0) {
            return Err(DocumentError::Malformed(format!(
                "entry '{}' has a max length of 0",
                self.label
            )));
        }
        Ok(())
    }
}

/// Stored fingerprint of the master secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterFingerprint {
    #[serde(alias = "Hash", default, skip_serializing_if = "Option::is_none")]
    pub(crate) hash: Option<String>,

    #[serde(alias = "Salt", default, skip_serializing_if = "Option::is_none")]
    pub(crate) salt: Option<String>,

    #[serde(
        rename = "iterCount",
        alias = "IterCount",
        default = "default_iteration_count"
    )]
    pub(crate) iteration_count: u32,
}

fn default_iteration_count() -> u32 {
    DEFAULT_ITERATION_COUNT
}

impl MasterFingerprint {
    /// Empty fingerprint: nothing enrolled, no salt yet.
    pub fn new(iteration_count: u32) -> Self {
        Self {
            hash: None,
            salt: None,
            iteration_count,
        }
    }

    /// Rebuild a fingerprint from persisted parts (base64 hash and salt).
    pub fn from_parts(hash: Option<String>, salt: Option<String>, iteration_count: u32) -> Self {
        Self {
            hash,
            salt,
            iteration_count,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn is_enrolled(&self) -> bool {
        self.hash.is_some()
    }

    /// Salt bytes, if a salt has been generated
    pub fn decoded_salt(&self) -> Result<Option<Vec<u8>>, DocumentError> {
        self.salt
            .as_deref()
            .map(|s| {
                STANDARD
                    .decode(s)
                    .map_err(|e| DocumentError::Malformed(format!("salt is not valid base64: {}", e)))
            })
            .transpose()
    }

    fn validate(&self, version: SchemeVersion) -> Result<(), DocumentError> {
        if self.iteration_count == 0 {
            return Err(DocumentError::Malformed(
                "iteration count must be at least 1".to_string(),
            ));
        }

        self.decoded_salt()?;

        if let Some(hash) = &self.hash {
            let bytes = STANDARD
                .decode(hash)
                .map_err(|e| DocumentError::Malformed(format!("hash is not valid base64: {}", e)))?;
            if bytes.len() != FINGERPRINT_LEN {
                return Err(DocumentError::Malformed(format!(
                    "hash is {} bytes, expected {}",
                    bytes.len(),
                    FINGERPRINT_LEN
                )));
            }
            // Salted schemes always generate the salt before the first hash.
            if self.salt.is_none() && version != SchemeVersion::HmacCheck {
                return Err(DocumentError::Malformed(format!(
                    "scheme {} fingerprint has no salt",
                    version
                )));
            }
        }

        Ok(())
    }
}

/// A named key list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct KeyListDocument {
    #[serde(rename = "schemeVersion")]
    scheme_version: SchemeVersion,

    master: MasterFingerprint,

    #[serde(rename = "keys")]
    entries: Vec<Entry>,
}

/// Persisted form before the scheme tag and invariants are checked
#[derive(Deserialize)]
struct RawDocument {
    #[serde(rename = "schemeVersion", alias = "Version")]
    scheme_version: u32,

    #[serde(alias = "Master")]
    master: MasterFingerprint,

    #[serde(alias = "Keys", default)]
    keys: Vec<Entry>,
}

impl TryFrom<RawDocument> for KeyListDocument {
    type Error = DocumentError;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let version = SchemeVersion::try_from(raw.scheme_version)?;
        Self::from_parts(version, raw.master, raw.keys)
    }
}

impl Default for KeyListDocument {
    fn default() -> Self {
        Self {
            scheme_version: SchemeVersion::CURRENT,
            master: MasterFingerprint::new(DEFAULT_ITERATION_COUNT),
            entries: Vec::new(),
        }
    }
}

impl KeyListDocument {
    /// Empty document on the current scheme.
    ///
    /// Fails with [`DocumentError::Malformed`] for an iteration count of 0.
    pub fn new(iteration_count: u32) -> Result<Self, DocumentError> {
        Self::from_parts(
            SchemeVersion::CURRENT,
            MasterFingerprint::new(iteration_count),
            Vec::new(),
        )
    }

    /// Assemble a document from loaded state, rejecting broken invariants.
    pub fn from_parts(
        scheme_version: SchemeVersion,
        master: MasterFingerprint,
        entries: Vec<Entry>,
    ) -> Result<Self, DocumentError> {
        let document = Self {
            scheme_version,
            master,
            entries,
        };
        document.validate()?;
        Ok(document)
    }

    /// Parse the persisted JSON form.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let raw: RawDocument =
            serde_json::from_str(json).map_err(|e| DocumentError::Malformed(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Persisted JSON form, indented
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Malformed(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        self.master.validate(self.scheme_version)?;
        for entry in &self.entries {
            entry.validate()?;
        }
        Ok(())
    }

    pub fn scheme_version(&self) -> SchemeVersion {
        self.scheme_version
    }

    pub fn master(&self) -> &MasterFingerprint {
        &self.master
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// First entry with `label`
    pub fn find_entry(&self, label: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.label == label)
    }

    pub fn find_entry_mut(&mut self, label: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.label == label)
    }

    /// Append an entry, keeping insertion order.
    pub fn push_entry(&mut self, entry: Entry) -> Result<&Entry, DocumentError> {
        entry.validate()?;
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Remove the first entry with `label`.
    pub fn remove_entry(&mut self, label: &str) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.label == label)?;
        Some(self.entries.remove(index))
    }

    pub(crate) fn master_mut(&mut self) -> &mut MasterFingerprint {
        &mut self.master
    }

    pub(crate) fn set_scheme_version(&mut self, version: SchemeVersion) {
        debug_assert!(version >= self.scheme_version, "scheme version never decreases");
        self.scheme_version = version;
    }
}
