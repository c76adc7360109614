//! In-memory object store.
//!
//! A [`Document`] is an ordered list of indirect objects plus the trailer
//! entries the editor needs. Payloads are kept as raw bytes exactly as they
//! appeared between `obj` and `endobj`; only objects the editor touches are
//! parsed into [`Object`] values, and only rewritten objects are
//! re-serialized.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::parser::parse_payload;
use crate::writer::ObjectSerializer;
use std::collections::{HashMap, HashSet};

/// One indirect object: its number and its opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectObject {
    /// Object number (generation is always written as 0)
    pub id: u32,
    /// Bytes between `obj` and `endobj`, surrounding whitespace trimmed
    pub payload: Vec<u8>,
}

impl IndirectObject {
    /// Create an indirect object from raw payload bytes.
    pub fn new(id: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Create an indirect object by serializing a parsed value.
    pub fn from_object(id: u32, obj: &Object) -> Self {
        Self::new(id, ObjectSerializer::new().serialize(obj))
    }

    /// Parse the payload.
    pub fn parse(&self) -> Result<Object> {
        parse_payload(&self.payload)
    }
}

/// Trailer entries carried through a load/save cycle.
///
/// `/Size` is not stored; the writer derives it from the highest object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Catalog object id
    pub root: u32,
    /// Document information dictionary id, if the input had one
    pub info: Option<u32>,
}

/// Ordered collection of indirect objects with unique ids.
#[derive(Debug, Clone)]
pub struct Document {
    objects: Vec<IndirectObject>,
    index: HashMap<u32, usize>,
    trailer: Trailer,
}

impl Document {
    /// Create a document from objects in file order.
    ///
    /// A repeated id replaces the earlier payload but keeps the earlier
    /// position, matching how incremental updates supersede objects.
    /// Fails if the root object is missing.
    pub fn new(objects: Vec<IndirectObject>, trailer: Trailer) -> Result<Self> {
        let mut doc = Self {
            objects: Vec::with_capacity(objects.len()),
            index: HashMap::with_capacity(objects.len()),
            trailer,
        };
        for obj in objects {
            if doc.contains(obj.id) {
                log::warn!("Object {} defined more than once, keeping last definition", obj.id);
            }
            doc.put(obj);
        }

        if !doc.contains(trailer.root) {
            return Err(Error::MalformedDocument(format!(
                "trailer /Root references missing object {}",
                trailer.root
            )));
        }
        if let Some(info) = trailer.info.filter(|id| !doc.contains(*id)) {
            log::warn!("Trailer /Info references missing object {}, dropping it", info);
            doc.trailer.info = None;
        }
        Ok(doc)
    }

    /// Trailer entries.
    pub fn trailer(&self) -> Trailer {
        self.trailer
    }

    /// Catalog object id.
    pub fn root_id(&self) -> u32 {
        self.trailer.root
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in serialization order.
    pub fn objects(&self) -> &[IndirectObject] {
        &self.objects
    }

    /// True if object `id` exists.
    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    /// Look up an object by id.
    pub fn get(&self, id: u32) -> Option<&IndirectObject> {
        self.index.get(&id).map(|&pos| &self.objects[pos])
    }

    /// Insert an object, or replace the payload of an existing one in place.
    pub fn put(&mut self, obj: IndirectObject) {
        match self.index.get(&obj.id) {
            Some(&pos) => self.objects[pos].payload = obj.payload,
            None => {
                self.index.insert(obj.id, self.objects.len());
                self.objects.push(obj);
            },
        }
    }

    /// Highest object id in the store (0 when empty).
    pub fn max_id(&self) -> u32 {
        self.index.keys().copied().max().unwrap_or(0)
    }

    /// Parse object `id`.
    pub fn load_object(&self, id: u32) -> Result<Object> {
        self.get(id)
            .ok_or(Error::ObjectNotFound(id, 0))?
            .parse()
            .map_err(|e| match e {
                Error::ParseError { offset, reason } => Error::ParseError {
                    offset,
                    reason: format!("object {}: {}", id, reason),
                },
                other => other,
            })
    }

    /// Replace object `id` with the serialization of `obj`.
    pub fn replace_object(&mut self, id: u32, obj: &Object) {
        self.put(IndirectObject::from_object(id, obj));
    }

    /// Follow a reference (one level); direct objects are returned as-is.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(ObjectRef { id, .. }) => self.load_object(*id),
            other => Ok(other.clone()),
        }
    }

    /// Parse object `id` and require a dictionary (or stream dictionary).
    pub fn load_dict(&self, id: u32) -> Result<Dict> {
        let obj = self.load_object(id)?;
        match obj {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Ids of all page objects in document order.
    ///
    /// Walks `/Root /Pages` depth-first through `/Kids`, skipping nodes
    /// already visited so a cyclic tree cannot loop forever.
    pub fn page_ids(&self) -> Result<Vec<u32>> {
        let catalog = self.load_dict(self.root_id())?;
        let pages_root = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::MalformedDocument("catalog has no /Pages reference".into()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![pages_root.id];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                log::warn!("Page tree revisits object {}, skipping", id);
                continue;
            }
            let node = self.load_dict(id)?;
            let is_page = match node.get("Type").and_then(Object::as_name) {
                Some("Page") => true,
                Some("Pages") => false,
                _ => !node.contains_key("Kids"),
            };
            if is_page {
                pages.push(id);
                continue;
            }
            let kids = match node.get("Kids") {
                Some(kids) => self.resolve(kids)?,
                None => Object::Array(Vec::new()),
            };
            let kid_ids: Vec<u32> = kids
                .as_array()
                .map(|arr| arr.iter().filter_map(Object::as_reference).map(|r| r.id).collect())
                .unwrap_or_default();
            // Reverse so the first kid is popped first.
            stack.extend(kid_ids.into_iter().rev());
        }

        Ok(pages)
    }
}
