//! Stream decoders for document structure.
//!
//! Only the filters that appear on cross-reference streams and object streams
//! are implemented: FlateDecode (with PNG predictors) and ASCIIHexDecode.
//! Page content is copied through untouched, so image and font filters are
//! never needed.

use crate::error::{Error, Result};
use crate::object::Object;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Maximum decompressed stream size (decompression bomb protection).
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// ASCIIHexDecode filter.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let end = input.iter().position(|&b| b == b'>').unwrap_or(input.len());
        crate::parser::decode_hex(&input[..end])
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Decode stream data through a filter pipeline, then undo any predictor.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            "ASCIIHexDecode" | "AHx" => Box::new(AsciiHexDecoder),
            other => return Err(Error::Unsupported(format!("filter {}", other))),
        };

        log::debug!("Applying {} to {} bytes", decoder.name(), current.len());
        current = decoder.decode(&current)?;

        if current.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    match params {
        Some(params) if params.predictor != 1 => decode_predictor(&current, params),
        _ => Ok(current),
    }
}

impl DecodeParams {
    /// Read predictor parameters from a `/DecodeParms` entry.
    ///
    /// Accepts a dictionary or an array of dictionaries (first one wins).
    pub fn from_object(params_obj: Option<&Object>) -> Option<Self> {
        let dict = match params_obj? {
            Object::Dictionary(d) => d,
            Object::Array(arr) => arr.iter().filter_map(|obj| obj.as_dict()).next()?,
            _ => return None,
        };

        let int = |key: &str, default: i64| {
            dict.get(key).and_then(|obj| obj.as_integer()).unwrap_or(default)
        };

        Some(DecodeParams {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1).max(1) as usize,
            colors: int("Colors", 1).max(1) as usize,
            bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
        })
    }
}
