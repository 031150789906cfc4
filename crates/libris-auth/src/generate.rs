//! One-time password and barcode generation.
//!
//! A barcode is a public login handle, not a credential: it is derived
//! deterministically from caller-supplied entropy. One-time passwords come
//! from the OS CSPRNG.

use rand::distributions::{Distribution, Slice};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Default one-time password length.
pub const DEFAULT_OTP_LENGTH: usize = 10;

/// Default number of hash characters in a generated barcode.
pub const DEFAULT_BARCODE_LENGTH: usize = 10;

/// OTP alphabet without look-alike characters (0/O, 1/l/I).
const OTP_ALPHABET: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v',
    'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q',
    'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Generate a random one-time password of `length` characters.
#[must_use]
pub fn generate_one_time_password(length: usize) -> String {
    match Slice::new(OTP_ALPHABET) {
        Ok(alphabet) => alphabet.sample_iter(&mut OsRng).take(length).collect(),
        Err(_) => String::new(),
    }
}

/// Barcode generator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeGenerator {
    pub prefix: Option<String>,
    /// Hash characters kept after the prefix (max 64).
    pub length: usize,
}

impl Default for BarcodeGenerator {
    fn default() -> Self {
        Self {
            prefix: None,
            length: DEFAULT_BARCODE_LENGTH,
        }
    }
}

impl BarcodeGenerator {
    #[must_use]
    pub fn new(prefix: Option<String>, length: usize) -> Self {
        Self { prefix, length }
    }

    /// Uppercased, truncated SHA-256 hex of `entropy`, with the prefix.
    #[must_use]
    pub fn generate(&self, entropy: &str) -> String {
        let digest = hex::encode_upper(Sha256::digest(entropy.as_bytes()));
        let hash = &digest[..self.length.min(digest.len())];
        match &self.prefix {
            Some(prefix) => format!("{prefix}{hash}"),
            None => hash.to_string(),
        }
    }
}

/// Fallback entropy when no signature is available.
#[must_use]
pub fn fallback_entropy(name: &str, email: &str, timestamp: i64) -> String {
    format!("{name}|{email}|{timestamp}")
}
