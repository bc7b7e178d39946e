//! Signing PDFs with a PIN-protected key.

use super::codec::SignatureCodec;
use super::digest::DocumentHasher;
use super::keywrap::KeyWrapCodec;
use super::types::{Signature, SigningStage};
use crate::config::SignerConfig;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::progress::{report, NoProgress, ProgressObserver, Stage};
use crate::storage::{write_atomic, KeyStorage};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;
use std::path::{Path, PathBuf};

/// Produces signed copies of PDF files.
///
/// ```no_run
/// use pdf_pinsign::signatures::SigningService;
/// use pdf_pinsign::storage::DirectoryStorage;
///
/// let usb = DirectoryStorage::new("/media/usb0");
/// let signed = SigningService::new(Default::default()).sign("1234", &usb, "contract.pdf")?;
/// println!("wrote {}", signed.display());
/// # Ok::<(), pdf_pinsign::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SigningService<O = NoProgress> {
    codec: KeyWrapCodec,
    observer: O,
}

impl SigningService {
    /// Create a service with the given configuration.
    pub fn new(config: SignerConfig) -> Self {
        Self {
            codec: KeyWrapCodec::new(config),
            observer: NoProgress,
        }
    }
}

impl Default for SigningService {
    fn default() -> Self {
        Self::new(SignerConfig::default())
    }
}

impl<O: ProgressObserver> SigningService<O> {
    /// Report progress to `observer`.
    pub fn with_observer<P: ProgressObserver>(self, observer: P) -> SigningService<P> {
        SigningService {
            codec: self.codec,
            observer,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SignerConfig {
        self.codec.config()
    }

    /// Where [`sign`](Self::sign) writes the signed copy of `document_path`:
    /// the same directory, `<stem><suffix>.pdf`.
    pub fn signed_path(&self, document_path: &Path) -> PathBuf {
        let stem = document_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{}{}.pdf", stem, self.config().signed_suffix);
        match document_path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Sign `document_path` with the key in `key_source` and write the
    /// result next to it. Returns the output path.
    pub fn sign(
        &self,
        pin: &str,
        key_source: &dyn KeyStorage,
        document_path: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let document_path = document_path.as_ref();
        let output_path = self.signed_path(document_path);
        self.sign_to(pin, key_source, document_path, &output_path)?;
        Ok(output_path)
    }

    /// Sign `document_path` and write the result to `output_path`.
    ///
    /// Nothing is written unless every step succeeds, and the input file is
    /// never modified.
    pub fn sign_to(
        &self,
        pin: &str,
        key_source: &dyn KeyStorage,
        document_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let document_path = document_path.as_ref();
        let output_path = output_path.as_ref();
        report(&self.observer, Stage::SignInit);

        if !document_path.is_file() {
            log::error!("Document not found: {}", document_path.display());
            return Err(Error::DocumentNotFound(document_path.to_path_buf()));
        }
        if same_file(document_path, output_path) {
            return Err(Error::Unsupported("writing a signed copy over its input".to_string()));
        }

        let mut stage = SigningStage::NotStarted;
        let result = self.run(pin, key_source, document_path, output_path, &mut stage);
        match &result {
            Ok(()) => log::info!(
                "Signed {} -> {}",
                document_path.display(),
                output_path.display()
            ),
            Err(e) => log::error!("Signing stopped after {:?}: {}", stage, e),
        }
        result
    }

    fn run(
        &self,
        pin: &str,
        key_source: &dyn KeyStorage,
        document_path: &Path,
        output_path: &Path,
        stage: &mut SigningStage,
    ) -> Result<()> {
        let private_key = self.codec.unwrap_from(pin, key_source)?;
        *stage = SigningStage::KeyUnwrapped;

        let mut doc = PdfDocument::open(document_path)?;
        let mut model = DocumentHasher::unsigned_form(&mut doc)?;
        let digest = DocumentHasher::digest(&model.to_bytes());
        *stage = SigningStage::Hashed;
        report(&self.observer, Stage::Hashed);

        let signature = sign_digest(&private_key, &digest)?;
        *stage = SigningStage::Signed;
        report(&self.observer, Stage::Signed);

        SignatureCodec::embed(&mut model, &signature);
        *stage = SigningStage::Embedded;
        report(&self.observer, Stage::Embedded);

        write_atomic(output_path, &model.to_bytes())?;
        *stage = SigningStage::Saved;
        report(&self.observer, Stage::Saved);
        Ok(())
    }
}

/// Whether two paths name the same existing file, after resolving `.`, `..`
/// and symlinks.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// PKCS#1 v1.5 signature over a SHA-256 digest.
pub fn sign_digest(private_key: &RsaPrivateKey, digest: &[u8]) -> Result<Signature> {
    private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
        .map(Signature::from_bytes)
        .map_err(|e| Error::SigningFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_path() {
        let service = SigningService::new(SignerConfig::default());
        assert_eq!(
            service.signed_path(Path::new("/docs/contract.pdf")),
            PathBuf::from("/docs/contract_signed.pdf")
        );
        assert_eq!(service.signed_path(Path::new("report.pdf")), PathBuf::from("report_signed.pdf"));

        let custom = SigningService::new(SignerConfig::new().with_signed_suffix(".sig"));
        assert_eq!(custom.signed_path(Path::new("/a/b.pdf")), PathBuf::from("/a/b.sig.pdf"));
    }

    #[test]
    fn test_missing_document() {
        let storage = crate::storage::MemoryStorage::new();
        let service = SigningService::new(SignerConfig::default());
        let result = service.sign("1234", &storage, "/nonexistent/in.pdf");
        assert!(matches!(result, Err(Error::DocumentNotFound(_))));
    }

    #[test]
    fn test_missing_key_checked_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, crate::document::tests::simple_pdf_with_info(b"")).unwrap();

        let storage = crate::storage::MemoryStorage::new();
        let service = SigningService::new(SignerConfig::default());
        let result = service.sign("1234", &storage, &input);
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
        assert!(!service.signed_path(&input).exists());
    }

    #[test]
    fn test_output_aliasing_input_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let original = crate::document::tests::simple_pdf_with_info(b"");
        std::fs::write(&input, &original).unwrap();

        let storage = crate::storage::MemoryStorage::new();
        let service = SigningService::new(SignerConfig::default());
        let aliases = [
            input.clone(),
            dir.path().join(".").join("in.pdf"),
            dir.path().join("sub").join("..").join("in.pdf"),
        ];
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        for alias in &aliases {
            let result = service.sign_to("1234", &storage, &input, alias);
            assert!(
                matches!(result, Err(Error::Unsupported(_))),
                "{} was not recognised as the input",
                alias.display()
            );
        }
        assert_eq!(std::fs::read(&input).unwrap(), original);
    }

    #[test]
    fn test_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, b"%PDF-1.4").unwrap();
        assert!(same_file(&a, &dir.path().join(".").join("a.pdf")));
        assert!(!same_file(&a, &dir.path().join("b.pdf")));
    }
}
