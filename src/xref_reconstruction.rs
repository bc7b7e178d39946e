//! Cross-reference reconstruction for damaged files.
//!
//! When `startxref` is missing or points nowhere useful, the whole file is
//! scanned for `N G obj` headers and a trailer is recovered from the last
//! readable `trailer` dictionary, or synthesized around the catalog.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;

lazy_static! {
    /// "N G obj" at the start of a token
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?:^|[\s\x00])(\d{1,10})[ \t\r\n\x00\x0C]+(\d{1,5})[ \t\r\n\x00\x0C]+obj\b").unwrap();

    /// "trailer" followed by a dictionary
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Rebuild the table by scanning every object header in `data`.
///
/// Later definitions of the same object number win, as they would after an
/// incremental update.
pub fn reconstruct_xref(data: &[u8]) -> Result<(CrossRefTable, Dictionary)> {
    log::info!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut table = CrossRefTable::new();
    let mut found = 0usize;

    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let (Some(id_match), Some(gen_match)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let (Some(id), Some(generation)) = (
            parse_digits::<u32>(id_match.as_bytes()),
            parse_digits::<u16>(gen_match.as_bytes()),
        ) else {
            continue;
        };

        table.add_entry(
            id,
            XRefEntry::Uncompressed {
                offset: id_match.start() as u64,
                generation,
            },
        );
        found += 1;
    }

    if found == 0 {
        return Err(Error::InvalidPdf("no objects found during xref reconstruction".to_string()));
    }
    log::info!("Reconstructed xref with {} object headers", found);

    let trailer = find_trailer(data).map_or_else(|| synthesize_trailer(data, &table), Ok)?;
    Ok((table, trailer))
}

fn parse_digits<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Last `trailer` dictionary that names a `/Root`.
fn find_trailer(data: &[u8]) -> Option<Dictionary> {
    let candidates: Vec<usize> = RE_TRAILER.find_iter(data).map(|m| m.start()).collect();

    candidates.into_iter().rev().find_map(|start| {
        let (_, obj) = parse_object(&data[start + b"trailer".len()..]).ok()?;
        match obj {
            Object::Dictionary(dict) if dict.contains_key("Root") => Some(dict),
            _ => None,
        }
    })
}

/// Build `<< /Root .. /Info .. /Size .. >>` from the objects themselves.
///
/// Cross-reference streams carry the trailer keys in their own dictionary,
/// so those are checked first.
fn synthesize_trailer(data: &[u8], table: &CrossRefTable) -> Result<Dictionary> {
    log::info!("No usable trailer found, searching for the catalog");

    let mut ids: Vec<u32> = table.in_use_objects().collect();
    ids.sort_unstable();

    let mut catalog = None;
    let mut info = None;

    for &id in &ids {
        let Some(XRefEntry::Uncompressed { offset, generation }) = table.get(id).copied() else {
            continue;
        };
        let Ok((_, (_, obj))) = parse_indirect_object(&data[offset as usize..]) else {
            continue;
        };

        match &obj {
            Object::Stream { dict, .. } if dict.get("Type").and_then(|t| t.as_name()) == Some("XRef") => {
                if dict.contains_key("Root") {
                    let mut trailer = dict.clone();
                    for key in ["Type", "W", "Index", "Filter", "DecodeParms", "Length", "Prev"] {
                        trailer.remove(key);
                    }
                    return Ok(trailer);
                }
            },
            Object::Dictionary(dict) => {
                if dict.get("Type").and_then(|t| t.as_name()) == Some("Catalog") {
                    catalog.get_or_insert(ObjectRef::new(id, generation));
                } else if info.is_none()
                    && ["Producer", "Creator", "Title"].iter().any(|k| dict.contains_key(*k))
                {
                    info = Some(ObjectRef::new(id, generation));
                }
            },
            _ => {},
        }
    }

    let root = catalog
        .ok_or_else(|| Error::InvalidPdf("could not find catalog in reconstructed xref".to_string()))?;

    let mut trailer = Dictionary::new();
    trailer.insert("Root".to_string(), Object::Reference(root));
    if let Some(info) = info {
        trailer.insert("Info".to_string(), Object::Reference(info));
    }
    let size = ids.last().map_or(0, |&max| max as i64 + 1);
    trailer.insert("Size".to_string(), Object::Integer(size));
    Ok(trailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKEN: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n3 0 obj\n<< /Producer (test) >>\nendobj\n%%EOF";

    #[test]
    fn test_scan_finds_all_headers() {
        let (table, _) = reconstruct_xref(BROKEN).unwrap();
        assert_eq!(table.in_use_objects().count(), 3);
        match table.get(2) {
            Some(XRefEntry::Uncompressed { offset, .. }) => {
                assert!(BROKEN[*offset as usize..].starts_with(b"2 0 obj"))
            },
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_synthesized_trailer_points_at_catalog_and_info() {
        let (_, trailer) = reconstruct_xref(BROKEN).unwrap();
        assert_eq!(trailer.get("Root").unwrap().as_reference(), Some(ObjectRef::new(1, 0)));
        assert_eq!(trailer.get("Info").unwrap().as_reference(), Some(ObjectRef::new(3, 0)));
        assert_eq!(trailer.get("Size").unwrap().as_integer(), Some(4));
    }

    #[test]
    fn test_existing_trailer_preferred() {
        let mut data = BROKEN.to_vec();
        data.extend_from_slice(b"\ntrailer\n<< /Size 4 /Root 1 0 R >>\n");
        let (_, trailer) = reconstruct_xref(&data).unwrap();
        assert!(!trailer.contains_key("Info"));
        assert_eq!(trailer.get("Size").unwrap().as_integer(), Some(4));
    }

    #[test]
    fn test_later_definition_wins() {
        let mut data = BROKEN.to_vec();
        let second = data.len() + 1;
        data.extend_from_slice(b"\n3 0 obj\n<< /Producer (newer) >>\nendobj\n");
        let (table, _) = reconstruct_xref(&data).unwrap();
        assert_eq!(
            table.get(3),
            Some(&XRefEntry::Uncompressed {
                offset: second as u64,
                generation: 0
            })
        );
    }

    #[test]
    fn test_no_objects() {
        assert!(reconstruct_xref(b"%PDF-1.4\nnothing here").is_err());
    }
}
