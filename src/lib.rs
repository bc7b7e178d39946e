// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF PinSign
//!
//! PIN-protected RSA keys on removable media, and detached signatures kept
//! inside the PDFs they sign.
//!
//! ## Core Features
//!
//! - **Key Wrapping**: 4096-bit RSA private key sealed with AES-256-EAX under
//!   the SHA-256 of a PIN; a wrong PIN never yields key material
//! - **Signing**: PKCS#1 v1.5 over the SHA-256 of a canonical rewrite of the
//!   document, stored as hex in the document information dictionary
//! - **Verification**: entirely in memory, against PEM or DER public keys
//! - **Storage**: any mounted directory (a USB stick in practice) or memory
//! - **PDF Reading**: classic and stream cross-reference tables, object
//!   streams, incremental updates and xref reconstruction for damaged files
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_pinsign::{DirectoryStorage, Enrollment, SignerConfig, SigningService};
//!
//! let usb = DirectoryStorage::new("/media/usb0");
//! Enrollment::new(SignerConfig::default()).enroll("1234", &usb)?;
//!
//! let signed = SigningService::new(SignerConfig::default()).sign("1234", &usb, "contract.pdf")?;
//! println!("signed copy at {}", signed.display());
//! # Ok::<(), pdf_pinsign::Error>(())
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Canonical PDF writing
pub mod writer;

// Signing protocol
pub mod signatures;

// Key storage and progress reporting
pub mod progress;
pub mod storage;

// Configuration
pub mod config;

// Re-exports
pub use config::SignerConfig;
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use progress::{NoProgress, Progress, ProgressObserver, Stage};
pub use signatures::{
    Enrollment, KeyWrapCodec, SigningService, VerificationOutcome, VerificationService,
};
pub use storage::{DirectoryStorage, KeyStorage, MemoryStorage};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
