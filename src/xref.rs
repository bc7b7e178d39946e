//! Cross-reference table parser.
//!
//! Maps object numbers to byte offsets (or object stream slots). Handles
//! classic `xref` tables, cross-reference streams, hybrid files carrying
//! `/XRefStm`, and `/Prev` chains left by incremental updates.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::{HashMap, HashSet};

/// Upper bound on `/Prev` hops.
const MAX_PREV_CHAIN: usize = 100;

/// Where to find one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused object number
    Free,
    /// Object stored directly in the file
    Uncompressed {
        /// Byte offset of the `N G obj` header
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing object stream
        stream_id: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Cross-reference table plus the trailer that accompanied it.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<Dictionary>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = Some(trailer);
    }

    /// Trailer dictionary, if one was found.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Record an entry, replacing any previous one.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Look up an entry.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Object numbers that are in use.
    pub fn in_use_objects(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !matches!(e, XRefEntry::Free))
            .map(|(id, _)| *id)
    }

    /// Merge an older table underneath this one.
    ///
    /// Entries already present win, matching incremental-update semantics.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the offset after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];

    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: String = tail[pos + keyword.len()..]
        .iter()
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .map(|&c| c as char)
        .collect();

    digits.parse().map_err(|_| Error::InvalidXref)
}

/// Parse the table at `offset` and everything reachable through `/Prev`.
pub fn parse_xref(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut next = Some(offset);
    let mut combined: Option<CrossRefTable> = None;

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("Cycle in /Prev chain at offset {}", offset);
            break;
        }
        if visited.len() > MAX_PREV_CHAIN {
            return Err(Error::InvalidPdf(format!(
                "xref /Prev chain longer than {}",
                MAX_PREV_CHAIN
            )));
        }

        let mut section = parse_section(data, offset)?;

        // Hybrid files: the classic table is supplemented by an xref stream
        let xref_stm = section
            .trailer()
            .and_then(|t| t.get("XRefStm"))
            .and_then(|o| o.as_integer());
        if let Some(stm_offset) = xref_stm {
            match parse_xref_stream(data, stm_offset as u64) {
                Ok(stream_section) => {
                    for (id, entry) in stream_section.entries {
                        section.entries.entry(id).or_insert(entry);
                    }
                },
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }

        next = section
            .trailer()
            .and_then(|t| t.get("Prev"))
            .and_then(|o| o.as_integer())
            .filter(|&p| p >= 0)
            .map(|p| p as u64);

        combined = Some(match combined {
            None => section,
            Some(mut newer) => {
                newer.merge_from(section);
                newer
            },
        });
    }

    combined.ok_or(Error::InvalidXref)
}

fn parse_section(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&s| s < data.len())
        .ok_or(Error::InvalidXref)?;
    let body = &data[start..];
    let trimmed = trim_leading_ws(body);

    if trimmed.starts_with(b"xref") {
        log::debug!("Classic xref table at offset {}", offset);
        parse_traditional_xref(trimmed)
    } else if trimmed.first().is_some_and(|c| c.is_ascii_digit()) {
        log::debug!("Cross-reference stream at offset {}", offset);
        parse_xref_stream(data, offset)
    } else {
        Err(Error::InvalidXref)
    }
}

fn trim_leading_ws(data: &[u8]) -> &[u8] {
    let skip = data
        .iter()
        .take_while(|&&c| crate::lexer::is_pdf_whitespace(c))
        .count();
    &data[skip..]
}

/// Split off the next whitespace-delimited word.
fn next_word(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let data = trim_leading_ws(data);
    if data.is_empty() {
        return None;
    }
    let len = data
        .iter()
        .take_while(|&&c| !crate::lexer::is_pdf_whitespace(c))
        .count();
    Some((&data[..len], &data[len..]))
}

fn word_as<T: std::str::FromStr>(word: &[u8]) -> Option<T> {
    std::str::from_utf8(word).ok()?.parse().ok()
}

/// Parse a classic table:
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000081 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(input: &[u8]) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut rest = &input[b"xref".len()..];

    loop {
        let (word, after) = next_word(rest).ok_or(Error::InvalidXref)?;

        if word.starts_with(b"trailer") {
            let dict_start = &rest[rest.len() - after.len() - word.len() + b"trailer".len()..];
            let (_, trailer) = parse_object(dict_start).map_err(|e| Error::ParseError {
                offset: 0,
                reason: format!("unreadable trailer: {}", e),
            })?;
            match trailer {
                Object::Dictionary(dict) => table.set_trailer(dict),
                other => {
                    return Err(Error::InvalidPdf(format!(
                        "trailer is a {}, not a dictionary",
                        other.type_name()
                    )))
                },
            }
            return Ok(table);
        }

        let first: u32 = word_as(word).ok_or(Error::InvalidXref)?;
        let (count_word, after) = next_word(after).ok_or(Error::InvalidXref)?;
        let count: u32 = word_as(count_word).ok_or(Error::InvalidXref)?;
        rest = after;

        for i in 0..count {
            let (offset_word, after) = next_word(rest).ok_or(Error::InvalidXref)?;
            let (gen_word, after) = next_word(after).ok_or(Error::InvalidXref)?;
            let (kind, after) = next_word(after).ok_or(Error::InvalidXref)?;
            rest = after;

            let offset: u64 = word_as(offset_word).ok_or(Error::InvalidXref)?;
            let generation: u16 = word_as(gen_word).ok_or(Error::InvalidXref)?;
            let entry = match kind {
                b"n" => XRefEntry::Uncompressed { offset, generation },
                b"f" => XRefEntry::Free,
                _ => return Err(Error::InvalidXref),
            };
            table.add_entry(first + i, entry);
        }
    }
}

/// Parse a cross-reference stream (`/Type /XRef`).
///
/// Each row has three big-endian fields whose widths come from `/W`:
/// type (0 free, 1 uncompressed, 2 compressed), then offset or stream
/// number, then generation or index.
fn parse_xref_stream(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&s| s < data.len())
        .ok_or(Error::InvalidXref)?;

    let (_, (_, obj)) = parse_indirect_object(&data[start..]).map_err(|e| Error::ParseError {
        offset: start,
        reason: format!("unreadable xref stream: {}", e),
    })?;

    let dict = match &obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidPdf(format!(
                "xref stream is a {}, not a stream",
                other.type_name()
            )))
        },
    };

    if dict.get("Type").and_then(|t| t.as_name()) != Some("XRef") {
        return Err(Error::InvalidPdf("object at startxref is not /Type /XRef".to_string()));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|w| w.as_array())
        .map(|w| {
            w.iter()
                .filter_map(|v| v.as_integer())
                .map(|v| v.max(0) as usize)
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidPdf(format!("invalid /W array {:?}", widths)));
    }

    let size = dict
        .get("Size")
        .and_then(|s| s.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|i| i.as_array()) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_integer()? as u32, pair[1].as_integer()? as u32)))
            .collect(),
        None => vec![(0, size as u32)],
    };

    let decoded = obj.decode_stream_data()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidPdf("xref stream rows have zero width".to_string()));
    }

    let mut table = CrossRefTable::new();
    let mut rows = decoded.chunks_exact(row_len);

    for (first, count) in ranges {
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);

            // A zero-width type field defaults to 1
            let kind = if widths[0] == 0 { 1 } else { read_be(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: read_be(f2),
                    generation: read_be(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: read_be(f2) as u32,
                    index: read_be(f3) as u32,
                },
                // Unknown types are treated as references to the null object
                _ => XRefEntry::Free,
            };
            table.add_entry(first + i, entry);
        }
    }

    table.set_trailer(dict.clone());
    Ok(table)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
