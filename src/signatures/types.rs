//! Key, signature and verification result types.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the random AEAD nonce at the start of a wrapped key.
pub const NONCE_LEN: usize = 16;

/// Length of the AEAD tag that follows the nonce.
pub const TAG_LEN: usize = 16;

/// Contents of `private_key.enc`: `nonce(16) || tag(16) || ciphertext`.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedPrivateKey(Vec<u8>);

impl WrappedPrivateKey {
    /// Wrap raw file bytes. No validation happens until unwrap.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Assemble from the three components.
    pub(crate) fn from_parts(nonce: &[u8], tag: &[u8], ciphertext: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(nonce.len() + tag.len() + ciphertext.len());
        bytes.extend_from_slice(nonce);
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(ciphertext);
        Self(bytes)
    }

    /// Split into nonce, tag and ciphertext.
    ///
    /// Anything shorter than nonce plus tag cannot have come from a wrap
    /// and is reported the same way as a failed tag check.
    pub fn split(&self) -> Result<(&[u8], &[u8], &[u8])> {
        if self.0.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::WrongPinOrCorrupted);
        }
        let (nonce, rest) = self.0.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        Ok((nonce, tag, ciphertext))
    }

    /// Raw file bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into raw file bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for WrappedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WrappedPrivateKey")
            .field(&format!("{} bytes", self.0.len()))
            .finish()
    }
}

/// Contents of `public_key.key`: SubjectPublicKeyInfo PEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainPublicKey(String);

impl PlainPublicKey {
    /// Wrap an exported PEM string.
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    /// The PEM text.
    pub fn as_pem(&self) -> &str {
        &self.0
    }

    /// The PEM text as file bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// SHA-256 of a PIN, used directly as the AEAD key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PinHash([u8; 32]);

impl PinHash {
    /// Hash a PIN. The same PIN always yields the same key.
    pub fn derive(pin: &str) -> Result<Self> {
        if pin.is_empty() {
            return Err(Error::EmptyPin);
        }
        Ok(Self(Sha256::digest(pin.as_bytes()).into()))
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for PinHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PinHash([REDACTED])")
    }
}

/// Raw PKCS#1 v1.5 signature bytes (modulus length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse the lowercase (or uppercase) hex stored in a document.
    pub fn from_hex(text: &str) -> Result<Self> {
        hex::decode(text.trim())
            .map(Self)
            .map_err(|e| Error::MalformedSignatureEncoding(e.to_string()))
    }

    /// Lowercase hex, as stored in the information dictionary.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no signature bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Why a well-formed signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Signature does not match the document digest under this key
    DigestMismatch,
    /// Signature length does not match the key's modulus
    WrongLength {
        /// Bytes found in the document
        found: usize,
        /// Modulus size in bytes
        expected: usize,
    },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::DigestMismatch => {
                f.write_str("signature does not match document contents")
            },
            RejectionReason::WrongLength { found, expected } => {
                write!(f, "signature is {} bytes, key expects {}", found, expected)
            },
        }
    }
}

/// Result of checking a signature that could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Document is unchanged since it was signed with the matching key
    Valid,
    /// Signature present and well-formed but rejected
    Invalid(RejectionReason),
}

impl VerificationOutcome {
    /// Check if the signature verified.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }

    /// Map `Invalid` to [`Error::SignatureRejected`].
    pub fn into_result(self) -> Result<()> {
        match self {
            VerificationOutcome::Valid => Ok(()),
            VerificationOutcome::Invalid(reason) => {
                log::debug!("Signature rejected: {}", reason);
                Err(Error::SignatureRejected)
            },
        }
    }
}

/// Last stage a signing run completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SigningStage {
    /// Nothing done yet
    #[default]
    NotStarted,
    /// Private key unwrapped
    KeyUnwrapped,
    /// Canonical digest computed
    Hashed,
    /// Digest signed
    Signed,
    /// Signature placed in the document model
    Embedded,
    /// Output file persisted
    Saved,
}

/// Last stage a verification run completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VerificationStage {
    /// Nothing done yet
    #[default]
    NotStarted,
    /// Signature read from the document
    SignatureExtracted,
    /// Unsigned canonical form rebuilt
    Recanonicalized,
    /// Digest computed
    Hashed,
    /// Signature accepted
    Verified,
    /// Signature rejected
    Rejected,
}
