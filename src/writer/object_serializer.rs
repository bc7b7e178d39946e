//! PDF object serialization.
//!
//! Output is deterministic: dictionary keys are sorted, reals are rounded to
//! five decimals, and the same object always produces the same bytes.
//! Serializing a parsed serialization reproduces it exactly.

use crate::object::{Dictionary, Object};
use std::io::Write;

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize one object.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an indirect object definition:
    /// `{id} {gen} obj\n{object}\nendobj\n`.
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    /// Append `obj` to `buf`.
    pub fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => push_display(buf, i),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => {
                buf.push(b'[');
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    self.write_object(buf, item);
                }
                buf.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => {
                // Length always reflects the bytes actually written
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                self.write_dictionary(buf, &dict);
                buf.extend_from_slice(b"\nstream\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => push_display(buf, r),
        }
    }

    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        buf.extend_from_slice(b"<<");
        for key in keys {
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, &dict[key]);
        }
        buf.extend_from_slice(b">>");
    }
}

fn push_display(buf: &mut Vec<u8>, value: impl std::fmt::Display) {
    // Writing into a Vec cannot fail
    let _ = write!(buf, "{}", value);
}

/// Reals are rounded to five decimals with trailing zeros trimmed. Values
/// that round to a whole number are written as integers, so `-0.000001`
/// becomes `0` and never `-0`.
fn write_real(buf: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        buf.push(b'0');
        return;
    }

    let rounded = (value * 1e5).round() / 1e5;
    if rounded.fract() == 0.0 {
        push_display(buf, rounded as i64);
    } else {
        let formatted = format!("{:.5}", rounded);
        buf.extend_from_slice(formatted.trim_end_matches('0').as_bytes());
    }
}

/// Printable text goes out as a literal string, anything else as hex.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7E));

    if printable {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        buf.extend_from_slice(hex::encode_upper(data).as_bytes());
        buf.push(b'>');
    }
}

/// Names escape delimiters, whitespace, `#` and non-ASCII bytes as `#XX`.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'..=b'~'
                if !matches!(
                    byte,
                    b'#' | b'%' | b'(' | b')' | b'/' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
                ) =>
            {
                buf.push(byte)
            },
            _ => push_display(buf, format_args!("#{:02X}", byte)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use crate::parser::parse_object;

    fn ser(obj: &Object) -> String {
        String::from_utf8(ObjectSerializer::new().serialize(obj)).unwrap()
    }

    #[test]
    fn test_primitives() {
        assert_eq!(ser(&Object::Null), "null");
        assert_eq!(ser(&Object::Boolean(false)), "false");
        assert_eq!(ser(&Object::Integer(-42)), "-42");
        assert_eq!(ser(&Object::Reference(ObjectRef::new(7, 0))), "7 0 R");
    }

    #[test]
    fn test_reals() {
        assert_eq!(ser(&Object::Real(612.0)), "612");
        assert_eq!(ser(&Object::Real(0.5)), "0.5");
        assert_eq!(ser(&Object::Real(1.0 / 3.0)), "0.33333");
        assert_eq!(ser(&Object::Real(-0.000001)), "0");
        assert_eq!(ser(&Object::Real(-2.500004)), "-2.5");
        assert_eq!(ser(&Object::Real(f64::NAN)), "0");
    }

    #[test]
    fn test_strings() {
        assert_eq!(ser(&Object::String(b"a(b)\\".to_vec())), "(a\\(b\\)\\\\)");
        assert_eq!(ser(&Object::String(vec![0x00, 0xFF])), "<00FF>");
        assert_eq!(ser(&Object::String(Vec::new())), "()");
    }

    #[test]
    fn test_names() {
        assert_eq!(ser(&Object::Name("Type".to_string())), "/Type");
        assert_eq!(ser(&Object::Name("A B".to_string())), "/A#20B");
        assert_eq!(ser(&Object::Name("a#b".to_string())), "/a#23b");
        assert_eq!(ser(&Object::Name("Caf\u{e9}".to_string())), "/Caf#C3#A9");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        dict.insert("Annots".to_string(), Object::Array(vec![]));
        dict.insert("MediaBox".to_string(), Object::Array(vec![Object::Integer(0)]));
        assert_eq!(ser(&Object::Dictionary(dict)), "<</Annots []/MediaBox [0]/Type /Page>>");
    }

    #[test]
    fn test_stream_length_is_actual() {
        let mut dict = Dictionary::new();
        dict.insert("Length".to_string(), Object::Integer(999));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"BT ET"),
        };
        assert_eq!(ser(&obj), "<</Length 5>>\nstream\nBT ET\nendstream");
    }

    #[test]
    fn test_indirect() {
        let out = ObjectSerializer::new().serialize_indirect(3, 0, &Object::Integer(1));
        assert_eq!(out, b"3 0 obj\n1\nendobj\n");
    }

    #[test]
    fn test_reparse_is_stable() {
        let source: &[u8] =
            b"<< /A [1 2.50 -0.0 (x\\)y) <00ff> /N#20ame] /B << /C true >> /D 4 0 R >>";
        let (_, first) = parse_object(source).unwrap();
        let once = ObjectSerializer::new().serialize(&first);
        let (_, second) = parse_object(&once).unwrap();
        let twice = ObjectSerializer::new().serialize(&second);
        assert_eq!(once, twice);
    }
}
