//! Storage of the signature inside the document information dictionary.

use super::types::Signature;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::writer::CanonicalDocument;

/// Information dictionary key holding the hex signature.
pub const SIGNATURE_KEY: &str = "Signature";

/// Embeds and extracts signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureCodec;

impl SignatureCodec {
    /// Set `Signature` to the lowercase hex of `signature`, replacing any
    /// previous value.
    pub fn embed(model: &mut CanonicalDocument, signature: &Signature) {
        let previous = model
            .info_mut()
            .insert(SIGNATURE_KEY.to_string(), Object::String(signature.to_hex().into_bytes()));
        if previous.is_some() {
            log::debug!("Replaced existing signature entry");
        }
    }

    /// Read the signature from the information dictionary.
    pub fn extract(doc: &mut PdfDocument) -> Result<Signature> {
        let info = doc.info()?.ok_or(Error::NoSignaturePresent)?;
        let value = match info.get(SIGNATURE_KEY) {
            Some(value) => doc.resolve(value)?,
            None => return Err(Error::NoSignaturePresent),
        };

        let text = match value {
            Object::String(bytes) => bytes,
            Object::Null => return Err(Error::NoSignaturePresent),
            other => {
                return Err(Error::MalformedSignatureEncoding(format!(
                    "expected a string, found {}",
                    other.type_name()
                )))
            },
        };
        if text.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(Error::NoSignaturePresent);
        }

        let text = std::str::from_utf8(&text)
            .map_err(|_| Error::MalformedSignatureEncoding("not ASCII hex".to_string()))?;
        let signature = Signature::from_hex(text)?;
        log::debug!("Extracted {}-byte signature", signature.len());
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::simple_pdf_with_info;

    fn open(info: &[u8]) -> PdfDocument {
        PdfDocument::from_bytes(simple_pdf_with_info(info)).unwrap()
    }

    #[test]
    fn test_extract_hex() {
        let sig = SignatureCodec::extract(&mut open(b"/Signature (00ab10)")).unwrap();
        assert_eq!(sig.as_bytes(), &[0x00, 0xab, 0x10]);
    }

    #[test]
    fn test_extract_absent_or_empty() {
        assert!(matches!(
            SignatureCodec::extract(&mut open(b"/Title (x)")),
            Err(Error::NoSignaturePresent)
        ));
        assert!(matches!(
            SignatureCodec::extract(&mut open(b"/Signature ()")),
            Err(Error::NoSignaturePresent)
        ));
    }

    #[test]
    fn test_extract_malformed() {
        assert!(matches!(
            SignatureCodec::extract(&mut open(b"/Signature (not hex!)")),
            Err(Error::MalformedSignatureEncoding(_))
        ));
        assert!(matches!(
            SignatureCodec::extract(&mut open(b"/Signature 42")),
            Err(Error::MalformedSignatureEncoding(_))
        ));
        assert!(matches!(
            SignatureCodec::extract(&mut open(b"/Signature (abc)")),
            Err(Error::MalformedSignatureEncoding(_))
        ));
    }

    #[test]
    fn test_embed_then_extract() {
        let mut doc = open(b"/Title (Report) /Signature (dead)");
        let mut model = super::super::DocumentHasher::unsigned_form(&mut doc).unwrap();
        SignatureCodec::embed(&mut model, &Signature::from_bytes(vec![0xbe, 0xef]));

        let mut reopened = PdfDocument::from_bytes(model.to_bytes()).unwrap();
        let sig = SignatureCodec::extract(&mut reopened).unwrap();
        assert_eq!(sig.to_hex(), "beef");
    }
}
