//! Master fingerprint schemes
//!
//! Each key list records which scheme produced its stored fingerprint.
//!
//! | Version | Scheme                                              |
//! |---------|-----------------------------------------------------|
//! | 0       | base64(HMAC-SHA256(key = secret, msg = `"CHECK"`))   |
//! | 1       | `acc = SHA256(acc ‖ secret ‖ salt)`, `n` rounds       |
//! | 2       | base64(PBKDF2-HMAC-SHA256(secret, salt, n, 32))      |
//!
//! Version 0 ignores salt and iteration count. Fingerprints produced here
//! are persisted, so every byte of every scheme is frozen.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{digest::KeyInit, Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::document::DocumentError;

type HmacSha256 = Hmac<Sha256>;

/// Salt length for schemes 1 and 2
pub const SALT_LEN: usize = 32;

/// Fingerprint output length (all schemes)
pub const FINGERPRINT_LEN: usize = 32;

/// Message authenticated by the legacy scheme
const LEGACY_CHECK_MESSAGE: &[u8] = b"CHECK";

/// Scheme version tag stored in a key list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SchemeVersion {
    /// Unsalted HMAC over a fixed message
    HmacCheck = 0,
    /// Salted, iterated SHA-256 chain
    IteratedSha256 = 1,
    /// PBKDF2-HMAC-SHA256
    Pbkdf2Sha256 = 2,
}

impl SchemeVersion {
    /// Version written for new documents and targeted by migration
    pub const CURRENT: SchemeVersion = SchemeVersion::Pbkdf2Sha256;

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether a document on this version is due for migration
    pub fn is_outdated(self) -> bool {
        self < Self::CURRENT
    }
}

impl TryFrom<u32> for SchemeVersion {
    type Error = DocumentError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::HmacCheck),
            1 => Ok(Self::IteratedSha256),
            2 => Ok(Self::Pbkdf2Sha256),
            other => Err(DocumentError::UnexpectedSchemeVersion(other)),
        }
    }
}

impl From<SchemeVersion> for u32 {
    fn from(version: SchemeVersion) -> Self {
        version.as_u32()
    }
}

impl std::fmt::Display for SchemeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// A fingerprint algorithm bound to its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintScheme<'a> {
    HmacCheck,
    IteratedSha256 { salt: &'a [u8], iterations: u32 },
    Pbkdf2Sha256 { salt: &'a [u8], iterations: u32 },
}

impl<'a> FingerprintScheme<'a> {
    /// Select the scheme for `version`, binding the parameters it uses.
    pub fn new(version: SchemeVersion, salt: &'a [u8], iterations: u32) -> Self {
        match version {
            SchemeVersion::HmacCheck => Self::HmacCheck,
            SchemeVersion::IteratedSha256 => Self::IteratedSha256 { salt, iterations },
            SchemeVersion::Pbkdf2Sha256 => Self::Pbkdf2Sha256 { salt, iterations },
        }
    }

    pub fn version(&self) -> SchemeVersion {
        match self {
            Self::HmacCheck => SchemeVersion::HmacCheck,
            Self::IteratedSha256 { .. } => SchemeVersion::IteratedSha256,
            Self::Pbkdf2Sha256 { .. } => SchemeVersion::Pbkdf2Sha256,
        }
    }

    /// Compute the base64 fingerprint of `secret`.
    ///
    /// Zero rounds of the iterated scheme leave the chain empty and yield an
    /// empty string, which matches no real fingerprint.
    pub fn compute(&self, secret: &str) -> String {
        let secret = secret.as_bytes();

        match *self {
            Self::HmacCheck => STANDARD.encode(hmac_sha256(secret, &[LEGACY_CHECK_MESSAGE])),
            Self::IteratedSha256 { salt, iterations } => {
                let mut acc = Vec::new();
                for _ in 0..iterations {
                    let mut hasher = Sha256::new();
                    hasher.update(&acc);
                    hasher.update(secret);
                    hasher.update(salt);
                    acc = hasher.finalize().to_vec();
                }
                STANDARD.encode(&acc)
            }
            Self::Pbkdf2Sha256 { salt, iterations } => {
                let mut out = [0u8; FINGERPRINT_LEN];
                pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut out);
                STANDARD.encode(out)
            }
        }
    }
}

/// Compare two base64 fingerprints without short-circuiting on content.
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Fresh salt from the OS CSPRNG
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// HMAC-SHA256 over the concatenation of `parts`
pub(crate) fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac: HmacSha256 = KeyInit::new_from_slice(key).expect("hmac accepts any key length");
    for part in parts {
        Mac::update(&mut mac, part);
    }
    mac.finalize().into_bytes().into()
}
