//! Canonical document hashing.
//!
//! Signing and verification both hash the same thing: the canonical
//! rewrite of the document with its `Signature` information entry removed.
//! Everything goes through [`DocumentHasher::unsigned_form`] so the two
//! sides cannot drift apart.

use super::codec::SIGNATURE_KEY;
use crate::document::PdfDocument;
use crate::error::Result;
use crate::writer::CanonicalDocument;
use sha2::{Digest, Sha256};

/// SHA-256 digest size in bytes.
pub const DIGEST_LEN: usize = 32;

/// Computes document digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentHasher;

impl DocumentHasher {
    /// SHA-256 of `bytes`.
    pub fn digest(bytes: &[u8]) -> [u8; DIGEST_LEN] {
        Sha256::digest(bytes).into()
    }

    /// Canonical form of `doc` without any signature.
    pub fn unsigned_form(doc: &mut PdfDocument) -> Result<CanonicalDocument> {
        CanonicalDocument::from_document(doc, |key| key != SIGNATURE_KEY)
    }

    /// Digest of the unsigned canonical form.
    pub fn canonical_digest(doc: &mut PdfDocument) -> Result<[u8; DIGEST_LEN]> {
        let canonical = Self::unsigned_form(doc)?;
        let digest = Self::digest(&canonical.to_bytes());
        log::debug!(
            "Canonical digest over {} pages: {}",
            canonical.page_count(),
            hex::encode(digest)
        );
        Ok(digest)
    }
}
