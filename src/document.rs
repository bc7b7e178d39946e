//! PDF document model.
//!
//! Loads a whole file into memory, locates its cross-reference data and
//! resolves objects on demand. Only what signing needs is exposed: the
//! trailer, the catalog, the page tree with inherited attributes, and the
//! document information dictionary.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::parse_indirect_object;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Maximum depth of the page tree.
const MAX_PAGE_TREE_DEPTH: u32 = 64;

/// Page attributes that a page inherits from its ancestors when absent.
pub const INHERITABLE_PAGE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// One leaf of the page tree.
#[derive(Debug, Clone)]
pub struct Page {
    /// Reference the page was reached through (`None` for inline kids)
    pub reference: Option<ObjectRef>,
    /// Page dictionary with inherited attributes filled in
    pub dict: Dictionary,
}

/// Flattened page tree.
#[derive(Debug, Clone, Default)]
pub struct PageTree {
    /// Leaf pages in document order
    pub pages: Vec<Page>,
    /// Intermediate `/Pages` nodes, including the root
    pub nodes: HashSet<ObjectRef>,
}

/// An open PDF document.
///
/// ```no_run
/// use pdf_pinsign::document::PdfDocument;
///
/// let mut doc = PdfDocument::open("contract.pdf")?;
/// println!("PDF {}.{} with {} pages", doc.version().0, doc.version().1, doc.page_tree()?.pages.len());
/// # Ok::<(), pdf_pinsign::Error>(())
/// ```
pub struct PdfDocument {
    data: bytes::Bytes,
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: Dictionary,
    object_cache: HashMap<ObjectRef, Object>,
    object_streams: HashMap<u32, HashMap<u32, Object>>,
    resolving: HashSet<ObjectRef>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("size", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Read and index a PDF file.
    ///
    /// A missing file is reported as [`Error::DocumentNotFound`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::DocumentNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        log::debug!("Read {} bytes from {}", data.len(), path.display());
        Self::from_bytes(data)
    }

    /// Index a PDF held in memory.
    pub fn from_bytes(data: impl Into<bytes::Bytes>) -> Result<Self> {
        let data: bytes::Bytes = data.into();
        let version = parse_header(&data)?;

        let (xref, trailer) = match Self::read_regular_xref(&data) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Regular xref parsing failed: {}, attempting reconstruction", e);
                crate::xref_reconstruction::reconstruct_xref(&data)?
            },
        };

        let mut doc = Self {
            data,
            version,
            xref,
            trailer,
            object_cache: HashMap::new(),
            object_streams: HashMap::new(),
            resolving: HashSet::new(),
        };

        if doc.trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents".to_string()));
        }

        // A table that parses but points at garbage gets one more chance
        if let Err(e) = doc.catalog() {
            log::warn!("Catalog unreadable through xref ({}), reconstructing", e);
            let (xref, trailer) = crate::xref_reconstruction::reconstruct_xref(&doc.data)?;
            doc.xref = xref;
            doc.trailer = trailer;
            doc.object_cache.clear();
            doc.object_streams.clear();
            doc.catalog()?;
        }

        Ok(doc)
    }

    fn read_regular_xref(data: &[u8]) -> Result<(CrossRefTable, Dictionary)> {
        let offset = find_xref_offset(data)?;
        let xref = parse_xref(data, offset)?;
        let trailer = xref
            .trailer()
            .filter(|t| t.contains_key("Root"))
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
        Ok((xref, trailer))
    }

    /// PDF version from the header as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The raw file bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Load an indirect object, following object streams as needed.
    ///
    /// Stream objects come back with `/Length` corrected to the actual size
    /// of their data.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        if !self.resolving.insert(obj_ref) {
            log::error!("Circular reference detected for object {}", obj_ref);
            return Err(Error::CircularReference(obj_ref));
        }
        let result = self.load_uncached(obj_ref);
        self.resolving.remove(&obj_ref);

        let object = result?;
        self.object_cache.insert(obj_ref, object.clone());
        Ok(object)
    }

    fn load_uncached(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        match self.xref.get(obj_ref.id).copied() {
            Some(XRefEntry::Uncompressed { offset, generation }) => {
                if generation != obj_ref.gen {
                    log::debug!("Reference {} resolves to generation {}", obj_ref, generation);
                }
                let object = match self.parse_at(obj_ref, offset) {
                    Some(object) => object,
                    None => {
                        let offset = self
                            .scan_for_object(obj_ref)
                            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
                        log::info!("Found object {} by scanning at offset {}", obj_ref, offset);
                        self.parse_at(obj_ref, offset)
                            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?
                    },
                };
                self.fix_stream_length(object)
            },
            Some(XRefEntry::Compressed { stream_id, index }) => {
                log::debug!("Object {} is #{} in object stream {}", obj_ref, index, stream_id);
                self.load_compressed(obj_ref, stream_id)
            },
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    /// Parse `N G obj` at `offset`, checking that the object number matches.
    fn parse_at(&self, obj_ref: ObjectRef, offset: u64) -> Option<Object> {
        let slice = self.data.get(usize::try_from(offset).ok()?..)?;
        match parse_indirect_object(slice) {
            Ok((_, (found, object))) if found.id == obj_ref.id => Some(object),
            Ok((_, (found, _))) => {
                log::warn!("Expected object {} at offset {}, found {}", obj_ref, offset, found);
                None
            },
            Err(e) => {
                log::warn!("Failed to parse object {} at offset {}: {}", obj_ref, offset, e);
                None
            },
        }
    }

    /// Last `N G obj` header for this object anywhere in the file.
    fn scan_for_object(&self, obj_ref: ObjectRef) -> Option<u64> {
        let needle = format!("{} {} obj", obj_ref.id, obj_ref.gen);
        let needle = needle.as_bytes();
        self.data
            .windows(needle.len())
            .enumerate()
            .filter(|(pos, window)| {
                *window == needle
                    && (*pos == 0 || !self.data[*pos - 1].is_ascii_digit())
            })
            .map(|(pos, _)| pos as u64)
            .last()
    }

    /// Resolve an indirect `/Length` and trim the data to it.
    fn fix_stream_length(&mut self, object: Object) -> Result<Object> {
        let Object::Stream { mut dict, mut data } = object else {
            return Ok(object);
        };

        if let Some(length_ref) = dict.get("Length").and_then(|l| l.as_reference()) {
            match self.load_object(length_ref) {
                Ok(Object::Integer(length)) if length >= 0 && (length as usize) <= data.len() => {
                    data.truncate(length as usize);
                },
                Ok(other) => log::warn!("Stream /Length {} resolves to {:?}", length_ref, other),
                Err(e) => log::warn!("Stream /Length {} unreadable: {}", length_ref, e),
            }
        }
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

        Ok(Object::Stream { dict, data })
    }

    fn load_compressed(&mut self, obj_ref: ObjectRef, stream_id: u32) -> Result<Object> {
        if !self.object_streams.contains_key(&stream_id) {
            let stream = self.load_object(ObjectRef::new(stream_id, 0))?;
            let objects = crate::objstm::parse_object_stream(&stream)?;
            log::debug!("Object stream {} holds {} objects", stream_id, objects.len());
            self.object_streams.insert(stream_id, objects);
        }

        self.object_streams
            .get(&stream_id)
            .and_then(|objects| objects.get(&obj_ref.id))
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }

    /// Follow a reference one level; other objects are returned as-is.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.load_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// Document catalog (`/Root`).
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self
            .trailer
            .get("Root")
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
        match self.resolve(&root)? {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidPdf(format!("catalog is a {}", other.type_name()))),
        }
    }

    /// Document information dictionary, if the trailer names one.
    pub fn info(&mut self) -> Result<Option<Dictionary>> {
        let Some(info) = self.trailer.get("Info").cloned() else {
            return Ok(None);
        };
        match self.resolve(&info) {
            Ok(Object::Dictionary(dict)) => Ok(Some(dict)),
            Ok(other) => {
                log::warn!("/Info is a {}, ignoring it", other.type_name());
                Ok(None)
            },
            Err(Error::ObjectNotFound(..)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Walk the page tree, pushing inherited attributes down to each page.
    pub fn page_tree(&mut self) -> Result<PageTree> {
        let catalog = self.catalog()?;
        let root = catalog
            .get("Pages")
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages".to_string()))?;

        let mut tree = PageTree::default();
        let mut visited = HashSet::new();
        self.collect_pages(&root, &Dictionary::new(), 0, &mut visited, &mut tree)?;
        log::debug!("Page tree has {} pages and {} nodes", tree.pages.len(), tree.nodes.len());
        Ok(tree)
    }

    fn collect_pages(
        &mut self,
        node: &Object,
        inherited: &Dictionary,
        depth: u32,
        visited: &mut HashSet<ObjectRef>,
        tree: &mut PageTree,
    ) -> Result<()> {
        if depth > MAX_PAGE_TREE_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_PAGE_TREE_DEPTH));
        }

        let reference = node.as_reference();
        if let Some(r) = reference {
            if !visited.insert(r) {
                log::warn!("Page tree revisits {}, skipping", r);
                return Ok(());
            }
        }

        let dict = match self.resolve(node) {
            Ok(Object::Dictionary(dict)) => dict,
            Ok(other) => {
                log::warn!("Page tree entry is a {}, skipping", other.type_name());
                return Ok(());
            },
            Err(Error::ObjectNotFound(..)) => {
                log::warn!("Page tree entry {:?} is missing, skipping", reference);
                return Ok(());
            },
            Err(e) => return Err(e),
        };

        let kind = dict.get("Type").and_then(|t| t.as_name());
        let kids = match dict.get("Kids") {
            Some(kids) if kind != Some("Page") => self.resolve(kids)?.as_array().cloned(),
            _ => None,
        };

        match kids {
            Some(kids) => {
                if let Some(r) = reference {
                    tree.nodes.insert(r);
                }
                let mut inherited = inherited.clone();
                for key in INHERITABLE_PAGE_KEYS {
                    if let Some(value) = dict.get(key) {
                        inherited.insert(key.to_string(), value.clone());
                    }
                }
                for kid in &kids {
                    self.collect_pages(kid, &inherited, depth + 1, visited, tree)?;
                }
            },
            None => {
                let mut page = dict;
                for (key, value) in inherited {
                    page.entry(key.clone()).or_insert_with(|| value.clone());
                }
                tree.pages.push(Page { reference, dict: page });
            },
        }

        Ok(())
    }
}

/// Find `%PDF-M.m` within the first kilobyte and return the version.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned())
        })?;

    match data.get(pos + 5..pos + 8) {
        Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok((major - b'0', minor - b'0'))
        },
        _ => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[pos..data.len().min(pos + 8)]).into_owned(),
        )),
    }
}
