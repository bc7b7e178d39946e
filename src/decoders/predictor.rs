//! PNG and TIFF predictor reversal.
//!
//! Cross-reference streams are almost always written with `/Predictor 12`
//! (PNG Up), so the PNG path is the one that matters here.

use crate::error::{Error, Result};

/// Decode parameters for predictor reversal.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of sample data per row, excluding any PNG tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component + 7) / 8
    }

    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component + 7) / 8).max(1)
    }
}

/// Reverse the predictor named in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Unsupported(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }

    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let row_start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[row_start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }

    Ok(output)
}

/// Every PNG-predicted row starts with a tag byte naming its own filter,
/// whatever value `/Predictor` carries.
fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let stride = row_len + 1;
    let bpp = params.bytes_per_pixel();

    if data.len() % stride != 0 {
        log::warn!(
            "Predictor data length {} is not a multiple of row size {}, dropping trailing bytes",
            data.len(),
            stride
        );
    }

    let mut output: Vec<u8> = Vec::with_capacity((data.len() / stride) * row_len);
    let mut prev = vec![0u8; row_len];
    let mut current = vec![0u8; row_len];

    for row in data.chunks_exact(stride) {
        let tag = row[0];
        let encoded = &row[1..];

        for i in 0..row_len {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };

            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other)))
                },
            };
            current[i] = encoded[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&current);
        std::mem::swap(&mut prev, &mut current);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_params(columns: usize) -> DecodeParams {
        DecodeParams {
            predictor: 12,
            columns,
            ..Default::default()
        }
    }

    #[test]
    fn test_png_up_xref_rows() {
        // Two 4-byte xref rows: type 1, offset 0x000F, gen 0 then offset 0x0030
        let data = vec![2, 1, 0, 15, 0, 2, 0, 0, 33, 0];
        let decoded = decode_predictor(&data, &png_params(4)).unwrap();
        assert_eq!(decoded, vec![1, 0, 15, 0, 1, 0, 48, 0]);
    }

    #[test]
    fn test_png_sub() {
        let data = vec![1, 10, 5, 5];
        let decoded = decode_predictor(&data, &png_params(3)).unwrap();
        assert_eq!(decoded, vec![10, 15, 20]);
    }

    #[test]
    fn test_png_mixed_tags_per_row() {
        let data = vec![0, 1, 2, 4, 1, 1, 1];
        let decoded = decode_predictor(&data, &png_params(3)).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_invalid_tag() {
        let data = vec![9, 1, 2, 3];
        assert!(decode_predictor(&data, &png_params(3)).is_err());
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 4,
            ..Default::default()
        };
        let decoded = decode_predictor(&[1, 1, 1, 1], &params).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_paeth() {
        assert_eq!(paeth(10, 20, 10), 20);
        assert_eq!(paeth(20, 10, 10), 20);
        assert_eq!(paeth(0, 0, 0), 0);
    }
}
