//! PIN-protected document signing.
//!
//! The protocol has three parts:
//!
//! - **Key wrapping**: an RSA private key sealed with AES-256-EAX under the
//!   SHA-256 of a PIN and kept on removable media as `private_key.enc`,
//!   next to the plain `public_key.key`.
//! - **Signing**: the document is rewritten into a canonical form without
//!   any `Signature` entry, hashed with SHA-256 and signed with PKCS#1 v1.5.
//!   The hex signature goes into the document information dictionary and
//!   the canonical form is saved as a new file.
//! - **Verification**: the same canonical form is rebuilt from the signed
//!   file, hashed and checked against the embedded signature.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_pinsign::signatures::{Enrollment, SigningService, VerificationService};
//! use pdf_pinsign::storage::{DirectoryStorage, KeyStorage};
//!
//! let usb = DirectoryStorage::new("/media/usb0");
//! Enrollment::new(Default::default()).enroll("1234", &usb)?;
//!
//! let signed = SigningService::new(Default::default()).sign("1234", &usb, "contract.pdf")?;
//!
//! let public_key = usb.read_bytes("public_key.key")?;
//! let outcome = VerificationService::new(Default::default()).verify(&public_key, &signed)?;
//! assert!(outcome.is_valid());
//! # Ok::<(), pdf_pinsign::Error>(())
//! ```

mod codec;
mod digest;
mod enrollment;
mod keywrap;
mod signer;
mod types;
mod verifier;

pub use codec::{SignatureCodec, SIGNATURE_KEY};
pub use digest::{DocumentHasher, DIGEST_LEN};
pub use enrollment::Enrollment;
pub use keywrap::{export_public_key, KeyWrapCodec};
pub use signer::{sign_digest, SigningService};
pub use types::{
    PinHash, PlainPublicKey, RejectionReason, Signature, SigningStage, VerificationOutcome,
    VerificationStage, WrappedPrivateKey, NONCE_LEN, TAG_LEN,
};
pub use verifier::{decode_public_key, VerificationService};
