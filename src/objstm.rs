//! Object stream (`/Type /ObjStm`) unpacking.
//!
//! The decoded stream starts with `/N` pairs of `object-number offset`,
//! followed at byte `/First` by the objects themselves, each offset being
//! relative to `/First`.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Decode an object stream and parse every object it holds.
///
/// Objects that fail to parse are skipped with a warning.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidPdf(format!(
                "object stream is a {}, not a stream",
                other.type_name()
            )))
        },
    };

    if let Some(kind) = dict.get("Type").and_then(|t| t.as_name()) {
        if kind != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let n = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .filter(|n| (0..=1_000_000).contains(n))
        .ok_or_else(|| Error::InvalidPdf("object stream has no valid /N".to_string()))?
        as usize;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .filter(|f| *f >= 0)
        .ok_or_else(|| Error::InvalidPdf("object stream has no valid /First".to_string()))?
        as usize;

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data is {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let (header, body) = decoded.split_at(first);
    let pairs = parse_pairs(header, n)?;

    let mut objects = HashMap::with_capacity(pairs.len());
    for (id, offset) in pairs {
        let Some(slice) = body.get(offset..) else {
            log::warn!("Object {} offset {} is past the end of its object stream", id, offset);
            continue;
        };
        match parse_object(slice) {
            Ok((_, obj)) => {
                objects.insert(id, obj);
            },
            Err(e) => log::warn!("Failed to parse object {} from object stream: {:?}", id, e),
        }
    }

    Ok(objects)
}

/// Read `count` pairs of `object-number offset`.
fn parse_pairs(header: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut rest = header;

    for i in 0..count {
        let mut next_int = || -> Result<i64> {
            match token(rest) {
                Ok((after, Token::Integer(v))) if v >= 0 => {
                    rest = after;
                    Ok(v)
                },
                _ => Err(Error::ParseError {
                    offset: header.len() - rest.len(),
                    reason: format!("object stream header ends before pair {}", i),
                }),
            }
        };
        let id = next_int()?;
        let offset = next_int()?;
        pairs.push((id as u32, offset as usize));
    }

    Ok(pairs)
}
