//! PDF output.
//!
//! ```text
//! PdfDocument
//!     ↓
//! [CanonicalDocument] (renumbered pages + info dictionary)
//!     ↓
//! [ObjectSerializer] (deterministic object bytes)
//!     ↓
//! PDF bytes
//! ```

mod canonical;
mod object_serializer;

pub use canonical::{CanonicalDocument, CANONICAL_HEADER};
pub use object_serializer::ObjectSerializer;
