//! Error types for key protection, PDF parsing and signing.
//!
//! One enum covers the whole crate: the protocol failures a caller is expected
//! to branch on (wrong PIN, missing signature, ...) and the lower-level PDF
//! and I/O failures underneath them.

use std::path::PathBuf;

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while wrapping keys or signing documents.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// The wrapped private key (or public key) file does not exist
    #[error("Key file not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    /// AEAD tag mismatch: either the PIN is wrong or the key file was altered.
    ///
    /// The cipher cannot tell the two apart, so neither can we.
    #[error("Decryption failed: invalid PIN or corrupted key")]
    WrongPinOrCorrupted,

    /// The tag verified but the plaintext is not a private key we can read
    #[error("Decrypted key has an unreadable encoding: {0}")]
    CorruptedKeyEncoding(String),

    /// The PDF to sign or verify does not exist
    #[error("PDF file not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// The document information dictionary has no `Signature` entry
    #[error("No signature found in PDF metadata")]
    NoSignaturePresent,

    /// The `Signature` entry is not a hex string
    #[error("Malformed signature encoding: {0}")]
    MalformedSignatureEncoding(String),

    /// The public key bytes could not be parsed
    #[error("Invalid public key encoding: {0}")]
    InvalidPublicKeyEncoding(String),

    /// Verification ran and the signature did not match
    #[error("Signature verification failed")]
    SignatureRejected,

    /// PIN strings must not be empty
    #[error("PIN must not be empty")]
    EmptyPin,

    /// No storage target has been selected
    #[error("No storage target selected")]
    NoStorageTarget,

    /// RSA key generation failed (entropy or arithmetic failure)
    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),

    /// Exporting a key to PEM failed
    #[error("Key export failed: {0}")]
    KeyExport(String),

    /// The RSA signing primitive failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// IO error (disk full, permission denied, media removed mid-write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

impl Error {
    /// Whether this failure belongs to the "wrong PIN" message family.
    ///
    /// A wrong PIN and a damaged key file are reported to users the same way.
    pub fn is_wrong_pin_family(&self) -> bool {
        matches!(self, Error::WrongPinOrCorrupted | Error::CorruptedKeyEncoding(_))
    }
}
