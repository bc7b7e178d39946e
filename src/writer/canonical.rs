//! Canonical rewrite of a PDF.
//!
//! The document is rebuilt from its pages and information dictionary into a
//! fresh file with a fixed layout:
//!
//! ```text
//! 1 0 obj   catalog (/Type /Catalog /Pages 2 0 R, nothing else)
//! 2 0 obj   single page tree node
//! 3 0 obj   first page ... one object per page, in order
//! ...       everything reachable from the pages, breadth-first
//! N 0 obj   document information dictionary
//! ```
//!
//! Object numbers depend only on the document's structure, dictionary keys
//! are visited in sorted order, and serialization is deterministic. Loading
//! the output and rewriting it again reproduces the same bytes.

use super::object_serializer::ObjectSerializer;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;

/// Header written at the top of every canonical file.
pub const CANONICAL_HEADER: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";

const CATALOG_ID: u32 = 1;
const PAGES_ID: u32 = 2;
const FIRST_PAGE_ID: u32 = 3;

/// A document in canonical form, ready to serialize.
#[derive(Debug, Clone)]
pub struct CanonicalDocument {
    /// Objects 1..=len, in object-number order
    objects: Vec<Object>,
    page_count: usize,
    info: Dictionary,
}

impl CanonicalDocument {
    /// Rebuild `doc` in canonical form.
    ///
    /// Information dictionary entries are kept only when `retain_info`
    /// returns true for their key. Dropped entries are removed before any
    /// traversal, so objects reachable only through them disappear too. The
    /// filter also applies when a page reaches the information dictionary
    /// by reference.
    pub fn from_document(doc: &mut PdfDocument, retain_info: impl Fn(&str) -> bool) -> Result<Self> {
        let tree = doc.page_tree()?;
        let page_count = tree.pages.len();
        log::debug!("Canonicalizing {} pages", page_count);

        let info_ref = doc.trailer().get("Info").and_then(|r| r.as_reference());
        let mut renumber = Renumberer::new(doc, info_ref, &retain_info);

        if let Some(root) = renumber.doc.trailer().get("Root").and_then(|r| r.as_reference()) {
            renumber.ids.insert(root, CATALOG_ID);
        }
        for node in &tree.nodes {
            renumber.ids.insert(*node, PAGES_ID);
        }
        for (i, page) in tree.pages.iter().enumerate() {
            if let Some(r) = page.reference {
                renumber.ids.entry(r).or_insert(FIRST_PAGE_ID + i as u32);
            }
        }
        renumber.next_id = FIRST_PAGE_ID + page_count as u32;

        let mut objects = Vec::with_capacity(page_count + 2);
        objects.push(Object::Dictionary(Dictionary::from([
            ("Type".to_string(), Object::Name("Catalog".to_string())),
            ("Pages".to_string(), Object::Reference(ObjectRef::new(PAGES_ID, 0))),
        ])));

        let kids = (0..page_count)
            .map(|i| Object::Reference(ObjectRef::new(FIRST_PAGE_ID + i as u32, 0)))
            .collect();
        objects.push(Object::Dictionary(Dictionary::from([
            ("Type".to_string(), Object::Name("Pages".to_string())),
            ("Kids".to_string(), Object::Array(kids)),
            ("Count".to_string(), Object::Integer(page_count as i64)),
        ])));

        for page in tree.pages {
            let mut dict = page.dict;
            dict.remove("Parent");
            let mut rewritten = renumber.rewrite_dictionary(&dict)?;
            rewritten.insert("Type".to_string(), Object::Name("Page".to_string()));
            rewritten.insert("Parent".to_string(), Object::Reference(ObjectRef::new(PAGES_ID, 0)));
            objects.push(Object::Dictionary(rewritten));
        }
        renumber.drain(&mut objects)?;

        let mut info = renumber.doc.info()?.unwrap_or_default();
        info.retain(|key, _| retain_info(key));
        let info = renumber.rewrite_dictionary(&info)?;
        renumber.drain(&mut objects)?;

        Ok(Self {
            objects,
            page_count,
            info,
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Document information dictionary.
    pub fn info(&self) -> &Dictionary {
        &self.info
    }

    /// Mutable document information dictionary.
    pub fn info_mut(&mut self) -> &mut Dictionary {
        &mut self.info
    }

    /// Object number the information dictionary is written under.
    pub fn info_id(&self) -> u32 {
        self.objects.len() as u32 + 1
    }

    /// Serialize to a complete PDF file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let serializer = ObjectSerializer::new();
        let info_id = self.info_id();
        let mut out = CANONICAL_HEADER.to_vec();
        let mut offsets = Vec::with_capacity(self.objects.len() + 1);

        for (i, obj) in self.objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(&serializer.serialize_indirect(i as u32 + 1, 0, obj));
        }
        offsets.push(out.len());
        out.extend_from_slice(&serializer.serialize_indirect(
            info_id,
            0,
            &Object::Dictionary(self.info.clone()),
        ));

        let xref_offset = out.len();
        let size = info_id + 1;
        // Writing into a Vec cannot fail
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", size);
        for offset in offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }

        let trailer = Dictionary::from([
            ("Size".to_string(), Object::Integer(size as i64)),
            ("Root".to_string(), Object::Reference(ObjectRef::new(CATALOG_ID, 0))),
            ("Info".to_string(), Object::Reference(ObjectRef::new(info_id, 0))),
        ]);
        out.extend_from_slice(b"trailer\n");
        serializer.write_object(&mut out, &Object::Dictionary(trailer));
        let _ = write!(out, "\nstartxref\n{}\n%%EOF\n", xref_offset);

        out
    }
}

/// Assigns new object numbers in discovery order.
struct Renumberer<'a> {
    doc: &'a mut PdfDocument,
    info_ref: Option<ObjectRef>,
    retain_info: &'a dyn Fn(&str) -> bool,
    ids: HashMap<ObjectRef, u32>,
    missing: HashSet<ObjectRef>,
    queue: VecDeque<(u32, Object)>,
    next_id: u32,
}

impl<'a> Renumberer<'a> {
    fn new(
        doc: &'a mut PdfDocument,
        info_ref: Option<ObjectRef>,
        retain_info: &'a dyn Fn(&str) -> bool,
    ) -> Self {
        Self {
            doc,
            info_ref,
            retain_info,
            ids: HashMap::new(),
            missing: HashSet::new(),
            queue: VecDeque::new(),
            next_id: FIRST_PAGE_ID,
        }
    }

    /// Rewrite queued objects until nothing new is discovered.
    fn drain(&mut self, objects: &mut Vec<Object>) -> Result<()> {
        while let Some((id, original)) = self.queue.pop_front() {
            debug_assert_eq!(id as usize, objects.len() + 1);
            let rewritten = self.rewrite(&original)?;
            objects.push(rewritten);
        }
        Ok(())
    }

    fn map_reference(&mut self, r: ObjectRef) -> Result<Object> {
        if let Some(&id) = self.ids.get(&r) {
            return Ok(Object::Reference(ObjectRef::new(id, 0)));
        }
        if self.missing.contains(&r) {
            return Ok(Object::Null);
        }

        match self.doc.load_object(r) {
            Ok(mut target) => {
                if self.info_ref == Some(r) {
                    let retain = self.retain_info;
                    if let Object::Dictionary(dict) = &mut target {
                        dict.retain(|key, _| retain(key));
                    }
                }
                let id = self.next_id;
                self.next_id += 1;
                self.ids.insert(r, id);
                self.queue.push_back((id, target));
                Ok(Object::Reference(ObjectRef::new(id, 0)))
            },
            Err(Error::ObjectNotFound(..)) => {
                log::debug!("Reference {} has no target, writing null", r);
                self.missing.insert(r);
                Ok(Object::Null)
            },
            Err(e) => Err(e),
        }
    }

    fn rewrite(&mut self, obj: &Object) -> Result<Object> {
        Ok(match obj {
            Object::Reference(r) => self.map_reference(*r)?,
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.rewrite(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.rewrite_dictionary(dict)?),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.remove("Length");
                Object::Stream {
                    dict: self.rewrite_dictionary(&dict)?,
                    data: data.clone(),
                }
            },
            other => other.clone(),
        })
    }

    /// Keys are visited in sorted order; entries that become null are
    /// dropped, as a parsed `/Key null` would be.
    fn rewrite_dictionary(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        let mut out = Dictionary::with_capacity(dict.len());
        for key in keys {
            let value = self.rewrite(&dict[key])?;
            if !value.is_null() {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }
}
