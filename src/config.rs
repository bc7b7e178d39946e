//! Signing configuration.

use serde::{Deserialize, Serialize};

/// Modulus size for newly generated keys.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// File name of the PIN-wrapped private key.
pub const PRIVATE_KEY_FILE: &str = "private_key.enc";

/// File name of the plain public key.
pub const PUBLIC_KEY_FILE: &str = "public_key.key";

/// Suffix appended to the stem of a signed copy.
pub const SIGNED_SUFFIX: &str = "_signed";

/// Key and file-layout configuration shared by enrollment, signing and
/// verification.
///
/// ```
/// use pdf_pinsign::SignerConfig;
///
/// let config = SignerConfig::new().with_signed_suffix("-approved");
/// assert_eq!(config.signed_suffix, "-approved");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// RSA modulus size for new keys.
    pub key_bits: usize,

    /// Name of the wrapped private key file on the storage target.
    pub private_key_file: String,

    /// Name of the public key file on the storage target.
    pub public_key_file: String,

    /// Suffix inserted before `.pdf` when signing to a sibling path.
    pub signed_suffix: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerConfig {
    /// Create configuration with defaults.
    pub fn new() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            private_key_file: PRIVATE_KEY_FILE.to_string(),
            public_key_file: PUBLIC_KEY_FILE.to_string(),
            signed_suffix: SIGNED_SUFFIX.to_string(),
        }
    }

    /// Set the RSA modulus size.
    ///
    /// Anything below 4096 bits is meant for tests and tooling only.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the wrapped private key file name.
    pub fn with_private_key_file(mut self, name: impl Into<String>) -> Self {
        self.private_key_file = name.into();
        self
    }

    /// Set the public key file name.
    pub fn with_public_key_file(mut self, name: impl Into<String>) -> Self {
        self.public_key_file = name.into();
        self
    }

    /// Set the signed-copy suffix.
    pub fn with_signed_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.signed_suffix = suffix.into();
        self
    }
}
