//! Signature verification.
//!
//! Verification never touches the filesystem beyond reading its inputs:
//! the unsigned canonical form is rebuilt in memory and hashed.

use super::codec::SignatureCodec;
use super::digest::DocumentHasher;
use super::types::{RejectionReason, VerificationOutcome, VerificationStage};
use crate::config::SignerConfig;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::progress::{report, NoProgress, ProgressObserver, Stage};
use crate::storage::KeyStorage;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;

/// Checks signed PDFs against a public key.
#[derive(Debug, Clone)]
pub struct VerificationService<O = NoProgress> {
    config: SignerConfig,
    observer: O,
}

impl VerificationService {
    /// Create a service with the given configuration.
    pub fn new(config: SignerConfig) -> Self {
        Self {
            config,
            observer: NoProgress,
        }
    }
}

impl Default for VerificationService {
    fn default() -> Self {
        Self::new(SignerConfig::default())
    }
}

impl<O: ProgressObserver> VerificationService<O> {
    /// Report progress to `observer`.
    pub fn with_observer<P: ProgressObserver>(self, observer: P) -> VerificationService<P> {
        VerificationService {
            config: self.config,
            observer,
        }
    }

    /// Verify the file at `document_path` against `public_key_bytes`
    /// (PEM or DER, SubjectPublicKeyInfo or PKCS#1).
    ///
    /// A signature that is present but does not match is an
    /// [`VerificationOutcome::Invalid`], not an error.
    pub fn verify(
        &self,
        public_key_bytes: &[u8],
        document_path: impl AsRef<Path>,
    ) -> Result<VerificationOutcome> {
        let public_key = decode_public_key(public_key_bytes)?;
        let pdf = read_document(document_path.as_ref())?;
        self.verify_document(&public_key, pdf)
    }

    /// Verify a PDF held in memory.
    pub fn verify_bytes(
        &self,
        public_key_bytes: &[u8],
        pdf_bytes: impl Into<bytes::Bytes>,
    ) -> Result<VerificationOutcome> {
        let public_key = decode_public_key(public_key_bytes)?;
        self.verify_document(&public_key, pdf_bytes.into())
    }

    /// Verify using a public key file on disk.
    pub fn verify_with_key_file(
        &self,
        key_path: impl AsRef<Path>,
        document_path: impl AsRef<Path>,
    ) -> Result<VerificationOutcome> {
        let key_path = key_path.as_ref();
        let key_bytes = std::fs::read(key_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::KeyNotFound(key_path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        self.verify(&key_bytes, document_path)
    }

    /// Verify using the public key file kept in `storage`.
    pub fn verify_with_storage(
        &self,
        storage: &dyn KeyStorage,
        document_path: impl AsRef<Path>,
    ) -> Result<VerificationOutcome> {
        let key_bytes = storage.read_bytes(&self.config.public_key_file)?;
        self.verify(&key_bytes, document_path)
    }

    fn verify_document(
        &self,
        public_key: &RsaPublicKey,
        pdf: bytes::Bytes,
    ) -> Result<VerificationOutcome> {
        let mut doc = PdfDocument::from_bytes(pdf)?;
        let mut stage = VerificationStage::NotStarted;

        let signature = SignatureCodec::extract(&mut doc)?;
        stage = advance(stage, VerificationStage::SignatureExtracted);
        report(&self.observer, Stage::SignatureExtracted);

        let unsigned = DocumentHasher::unsigned_form(&mut doc)?;
        stage = advance(stage, VerificationStage::Recanonicalized);
        let digest = DocumentHasher::digest(&unsigned.to_bytes());
        stage = advance(stage, VerificationStage::Hashed);

        let outcome = if signature.len() != public_key.size() {
            VerificationOutcome::Invalid(RejectionReason::WrongLength {
                found: signature.len(),
                expected: public_key.size(),
            })
        } else {
            match public_key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature.as_bytes()) {
                Ok(()) => VerificationOutcome::Valid,
                Err(_) => VerificationOutcome::Invalid(RejectionReason::DigestMismatch),
            }
        };
        report(&self.observer, Stage::Verified);

        stage = match outcome {
            VerificationOutcome::Valid => advance(stage, VerificationStage::Verified),
            VerificationOutcome::Invalid(reason) => {
                log::info!("Signature rejected: {}", reason);
                advance(stage, VerificationStage::Rejected)
            },
        };
        log::debug!("Verification finished at {:?}", stage);
        report(&self.observer, Stage::VerifyDone);
        Ok(outcome)
    }
}

fn advance(from: VerificationStage, to: VerificationStage) -> VerificationStage {
    log::trace!("Verification {:?} -> {:?}", from, to);
    to
}

fn read_document(path: &Path) -> Result<bytes::Bytes> {
    std::fs::read(path).map(bytes::Bytes::from).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::DocumentNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Parse an RSA public key: PEM or DER, SubjectPublicKeyInfo or PKCS#1.
pub fn decode_public_key(bytes: &[u8]) -> Result<RsaPublicKey> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        let text = text.trim();
        if text.starts_with("-----BEGIN") {
            return RsaPublicKey::from_public_key_pem(text)
                .or_else(|_| RsaPublicKey::from_pkcs1_pem(text))
                .map_err(|e| Error::InvalidPublicKeyEncoding(e.to_string()));
        }
    }
    RsaPublicKey::from_public_key_der(bytes)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(bytes))
        .map_err(|e| Error::InvalidPublicKeyEncoding(e.to_string()))
}
