//! Test PDFs assembled at runtime with correct cross-reference offsets.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_pinsign::config::SignerConfig;
use pdf_pinsign::signatures::KeyWrapCodec;
use pdf_pinsign::storage::MemoryStorage;
use pdf_pinsign::Enrollment;
use std::io::Write;
use std::sync::OnceLock;

/// Key size used across the integration tests.
pub const TEST_KEY_BITS: usize = 1024;

/// Content stream of the sample page.
pub const HELLO_CONTENT: &[u8] = b"BT /F1 24 Tf 72 700 Td (Hello) Tj ET";

pub fn test_config() -> SignerConfig {
    SignerConfig::new().with_key_bits(TEST_KEY_BITS)
}

/// Builds a PDF from numbered object bodies.
#[derive(Default)]
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, id: u32, body: impl AsRef<[u8]>) -> Self {
        self.objects.push((id, body.as_ref().to_vec()));
        self
    }

    pub fn stream(self, id: u32, extra_dict: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), extra_dict).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(id, body)
    }

    fn size(&self) -> u32 {
        self.objects.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1
    }

    fn write_objects(&self, out: &mut Vec<u8>) -> Vec<(u32, usize)> {
        let mut offsets = Vec::new();
        for (id, body) in &self.objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        offsets
    }

    /// Classic `xref` table and trailer.
    pub fn build(&self, trailer: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let offsets = self.write_objects(&mut out);
        append_xref_table(&mut out, &offsets, self.size(), trailer);
        out
    }

    /// Cross-reference stream, with `packed` objects moved into an object
    /// stream.
    pub fn build_with_xref_stream(&self, packed: &[u32], trailer: &str) -> Vec<u8> {
        let loose = PdfBuilder {
            objects: self
                .objects
                .iter()
                .filter(|(id, _)| !packed.contains(id))
                .cloned()
                .collect(),
        };
        let objstm_id = self.size();
        let xref_id = objstm_id + 1;

        let mut header = String::new();
        let mut body = Vec::new();
        for id in packed {
            let (_, obj) = self.objects.iter().find(|(i, _)| i == id).expect("packed object");
            header.push_str(&format!("{} {} ", id, body.len()));
            body.extend_from_slice(obj);
            body.push(b'\n');
        }
        let mut objstm_data = header.clone().into_bytes();
        objstm_data.extend_from_slice(&body);
        let objstm_data = zlib(&objstm_data);

        let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = loose.write_objects(&mut out);

        offsets.push((objstm_id, out.len()));
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
                objstm_id,
                packed.len(),
                header.len(),
                objstm_data.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&objstm_data);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        let xref_offset = out.len();
        offsets.push((xref_id, xref_offset));

        // Entries: type(1) field2(4) field3(2)
        let mut rows = Vec::new();
        for id in 0..=xref_id {
            if let Some(index) = packed.iter().position(|p| *p == id) {
                rows.push(2u8);
                rows.extend_from_slice(&objstm_id.to_be_bytes());
                rows.extend_from_slice(&(index as u16).to_be_bytes());
            } else if let Some((_, off)) = offsets.iter().find(|(i, _)| *i == id) {
                rows.push(1u8);
                rows.extend_from_slice(&(*off as u32).to_be_bytes());
                rows.extend_from_slice(&0u16.to_be_bytes());
            } else {
                rows.push(0u8);
                rows.extend_from_slice(&0u32.to_be_bytes());
                rows.extend_from_slice(&0xFFFFu16.to_be_bytes());
            }
        }
        let rows = zlib(&rows);

        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Filter /FlateDecode /Length {} {} >>\nstream\n",
                xref_id,
                xref_id + 1,
                rows.len(),
                trailer
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        out
    }
}

/// Append an incremental update replacing or adding `objects`.
pub fn append_update(mut pdf: Vec<u8>, objects: &[(u32, &[u8])], size: u32, trailer: &str) -> Vec<u8> {
    let prev = last_startxref(&pdf);
    let mut offsets = Vec::new();
    for (id, body) in objects {
        offsets.push((*id, pdf.len()));
        pdf.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(b"xref\n");
    for (id, off) in &offsets {
        pdf.extend_from_slice(format!("{} 1\n{:010} 00000 n \n", id, off).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Prev {} {} >>\nstartxref\n{}\n%%EOF\n",
            size, prev, trailer, xref_offset
        )
        .as_bytes(),
    );
    pdf
}

fn append_xref_table(out: &mut Vec<u8>, offsets: &[(u32, usize)], size: u32, trailer: &str) {
    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
    for id in 1..size {
        match offsets.iter().find(|(i, _)| *i == id) {
            Some((_, off)) => out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes()),
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", size, trailer, xref_offset)
            .as_bytes(),
    );
}

fn last_startxref(pdf: &[u8]) -> usize {
    let pos = pdf
        .windows(9)
        .rposition(|w| w == b"startxref")
        .expect("startxref");
    let digits: String = pdf[pos + 9..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits.parse().expect("startxref offset")
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Objects of the one-page sample document, shared by the classic and
/// xref-stream variants.
pub fn hello_builder(info: &str) -> PdfBuilder {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .stream(4, "", HELLO_CONTENT)
        .object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
        .object(6, format!("<< {} >>", info))
}

/// One page saying "Hello", classic xref.
pub fn hello_pdf() -> Vec<u8> {
    hello_builder("/Title (Greeting) /Producer (tests)").build("/Root 1 0 R /Info 6 0 R")
}

/// Three pages under a nested page tree, with inherited resources.
pub fn three_page_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R /Outlines 20 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 3 /MediaBox [0 0 595 842] /Resources << /Font << /F1 10 0 R >> >> >>",
        )
        .object(3, "<< /Type /Page /Parent 2 0 R /Contents 11 0 R >>")
        .object(4, "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R 6 0 R] /Count 2 /Rotate 90 >>")
        .object(5, "<< /Type /Page /Parent 4 0 R /Contents 12 0 R >>")
        .object(
            6,
            "<< /Type /Page /Parent 4 0 R /Contents [12 0 R 13 0 R] /MediaBox [0 0 300 300] >>",
        )
        .object(10, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")
        .stream(11, "", b"BT /F1 12 Tf 10 10 Td (Page one) Tj ET")
        .stream(12, "", b"BT /F1 12 Tf 10 10 Td (Shared) Tj ET")
        .stream(13, "", b"0.5 g 0 0 10 10 re f")
        .object(14, "<< /Title (Three pages) /Author (QA) /Pi 3.14159265 >>")
        .object(20, "<< /Type /Outlines /Count 0 >>")
        .build("/Root 1 0 R /Info 14 0 R")
}

/// Storage enrolled once per test binary with `pin`.
pub fn enrolled_storage(pin: &str) -> MemoryStorage {
    static WRAPPED: OnceLock<(Vec<u8>, Vec<u8>)> = OnceLock::new();
    let storage = MemoryStorage::new();
    let (private, public) = WRAPPED.get_or_init(|| {
        let scratch = MemoryStorage::new();
        Enrollment::new(test_config())
            .enroll("1234", &scratch)
            .expect("enroll");
        (
            pdf_pinsign::KeyStorage::read_bytes(&scratch, "private_key.enc").unwrap(),
            pdf_pinsign::KeyStorage::read_bytes(&scratch, "public_key.key").unwrap(),
        )
    });
    assert_eq!(pin, "1234", "shared keys are enrolled with PIN 1234");
    storage.put("private_key.enc", private.clone());
    storage.put("public_key.key", public.clone());
    storage
}

/// A second, unrelated keypair.
pub fn other_public_key() -> Vec<u8> {
    static OTHER: OnceLock<Vec<u8>> = OnceLock::new();
    OTHER
        .get_or_init(|| {
            let (_, public) = KeyWrapCodec::new(test_config()).generate("9999").expect("generate");
            public.as_bytes().to_vec()
        })
        .clone()
}

/// Replace the first occurrence of `from` with `to` (same length).
pub fn patch(data: &mut [u8], from: &[u8], to: &[u8]) {
    assert_eq!(from.len(), to.len());
    let pos = data
        .windows(from.len())
        .position(|w| w == from)
        .expect("pattern present");
    data[pos..pos + to.len()].copy_from_slice(to);
}
