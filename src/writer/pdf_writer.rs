//! PDF document writer.
//!
//! Serializes a working [`Document`] as header, body, classic xref table and
//! trailer. A writer runs once per save:
//!
//! ```text
//! AssigningIds -> WritingObjects -> BuildingXref -> Done
//! ```
//!
//! New objects reserve their ids while the writer is still assigning. When
//! protection is configured, the `/Encrypt` dictionary takes the last id,
//! after every other object exists.

use super::object_serializer::ObjectSerializer;
use crate::config::EditorConfig;
use crate::document::{Document, IndirectObject};
use crate::encryption::{EncryptionWriteHandler, StandardSecurity};
use crate::error::{Error, Result};
use crate::lexer::skip_whitespace;
use crate::object::{Dict, Object};
use crate::parser::{find_keyword, parse_object};
use std::collections::BTreeMap;
use std::io::Write;

/// Binary comment after the header line.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Generation written for free xref entries.
const FREE_GENERATION: u32 = 65535;

/// Serialization progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// New objects may reserve ids
    AssigningIds,
    /// Emitting `N 0 obj ... endobj` blocks
    WritingObjects,
    /// Emitting the xref table and trailer
    BuildingXref,
    /// Output complete
    Done,
}

/// One row of the classic cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// In-use object at a byte offset
    InUse {
        /// Offset of the `N 0 obj` line
        offset: usize,
    },
    /// Free object, linked to the next free object number
    Free {
        /// Next free object number (0 ends the chain)
        next: u32,
    },
}

/// Build xref rows `0..size` for the given in-use offsets.
///
/// Every object number without an offset is free. Entry 0 heads the free
/// list; each free entry points at the next free number in ascending order
/// and the last one points back at 0.
pub fn build_xref_entries(offsets: &BTreeMap<u32, usize>, size: u32) -> Vec<XrefEntry> {
    let free: Vec<u32> = (0..size).filter(|id| !offsets.contains_key(id)).collect();
    let mut entries: Vec<XrefEntry> = (0..size)
        .map(|id| match offsets.get(&id) {
            Some(&offset) if id != 0 => XrefEntry::InUse { offset },
            _ => XrefEntry::Free { next: 0 },
        })
        .collect();

    // `free` always starts with 0; link each to its successor.
    for pair in free.windows(2) {
        entries[pair[0] as usize] = XrefEntry::Free { next: pair[1] };
    }
    entries
}

/// Writes one document.
pub struct PdfWriter<'a> {
    config: &'a EditorConfig,
    document: Document,
    security: Option<StandardSecurity>,
    state: WriterState,
    next_id: u32,
}

impl<'a> PdfWriter<'a> {
    /// Start a writer over a working copy of the document.
    pub fn new(document: Document, config: &'a EditorConfig) -> Self {
        let next_id = document.max_id() + 1;
        Self {
            config,
            document,
            security: None,
            state: WriterState::AssigningIds,
            next_id,
        }
    }

    /// Encrypt the output with `security`.
    pub fn with_security(mut self, security: StandardSecurity) -> Self {
        self.security = Some(security);
        self
    }

    /// Current state.
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Next id that [`allocate`](Self::allocate) would return.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Reserve `count` consecutive ids and return the first.
    pub fn allocate(&mut self, count: u32) -> Result<u32> {
        if self.state != WriterState::AssigningIds {
            return Err(Error::MalformedDocument(format!(
                "cannot allocate ids in state {:?}",
                self.state
            )));
        }
        let first = self.next_id;
        self.next_id += count;
        log::debug!("Allocated object ids {}..{}", first, self.next_id);
        Ok(first)
    }

    /// The working document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The working document, for injection.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Add or replace an object in the working document.
    pub fn put(&mut self, obj: IndirectObject) {
        self.document.put(obj);
    }

    /// Serialize everything and return the file bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let encrypt_id = match &self.security {
            Some(security) => {
                let id = self.document.max_id().max(self.next_id - 1) + 1;
                self.document
                    .put(IndirectObject::from_object(id, &security.encrypt_dict()));
                log::debug!("Encryption dictionary is object {}", id);
                Some(id)
            },
            None => None,
        };

        self.state = WriterState::WritingObjects;
        let mut output = Vec::new();
        writeln!(output, "%PDF-{}", self.config.pdf_version)?;
        output.extend_from_slice(BINARY_MARKER);

        let handler = self.security.as_ref().map(StandardSecurity::write_handler);
        let serializer = ObjectSerializer::new();
        let mut offsets = BTreeMap::new();

        for obj in self.document.objects() {
            offsets.insert(obj.id, output.len());
            writeln!(output, "{} 0 obj", obj.id)?;
            match &handler {
                Some(handler) if Some(obj.id) != encrypt_id => match obj.parse() {
                    Ok(parsed) if parsed.has_encryptable_content() => {
                        output.extend(serializer.serialize_encrypted(&parsed, obj.id, 0, handler)?);
                    },
                    Ok(_) => output.extend_from_slice(&obj.payload),
                    Err(e) => {
                        log::warn!("Object {} does not parse ({}), encrypting raw bytes", obj.id, e);
                        output.extend(encrypt_raw_payload(&obj.payload, obj.id, handler, &serializer)?);
                    },
                },
                _ => output.extend_from_slice(&obj.payload),
            }
            output.extend_from_slice(b"\nendobj\n");
        }

        self.state = WriterState::BuildingXref;
        let size = offsets.keys().next_back().copied().unwrap_or(0) + 1;
        let xref_start = output.len();
        writeln!(output, "xref\n0 {}", size)?;
        for entry in build_xref_entries(&offsets, size) {
            match entry {
                XrefEntry::InUse { offset } => writeln!(output, "{:010} 00000 n ", offset)?,
                XrefEntry::Free { next } => {
                    writeln!(output, "{:010} {:05} f ", next, FREE_GENERATION)?
                },
            }
        }

        let trailer = self.trailer_dict(size, encrypt_id);
        output.extend_from_slice(b"trailer\n");
        output.extend(serializer.serialize(&trailer));
        write!(output, "\nstartxref\n{}\n%%EOF\n", xref_start)?;

        self.state = WriterState::Done;
        log::info!(
            "Wrote {} objects ({} bytes, encrypted: {})",
            offsets.len(),
            output.len(),
            encrypt_id.is_some()
        );
        Ok(output)
    }

    fn trailer_dict(&self, size: u32, encrypt_id: Option<u32>) -> Object {
        let trailer = self.document.trailer();
        let mut dict = Dict::new();
        dict.insert("Size".into(), Object::Integer(size as i64));
        dict.insert("Root".into(), Object::reference(trailer.root));
        if let Some(info) = trailer.info {
            dict.insert("Info".into(), Object::reference(info));
        }
        if let Some(id) = encrypt_id {
            dict.insert("Encrypt".into(), Object::reference(id));
            dict.insert(
                "ID".into(),
                Object::Array(vec![Object::String(Vec::new()), Object::String(Vec::new())]),
            );
        }
        Object::Dictionary(dict)
    }
}

/// Encrypt a payload the object parser rejects.
///
/// Stream data between `stream` and `endstream` is encrypted as bytes; a
/// parseable stream dictionary gets its strings encrypted and `/Length`
/// updated. Payloads without stream data are written unchanged.
fn encrypt_raw_payload(
    payload: &[u8],
    id: u32,
    handler: &EncryptionWriteHandler,
    serializer: &ObjectSerializer,
) -> Result<Vec<u8>> {
    let keyword = match find_keyword(payload, b"stream") {
        Some(pos) if !payload[..pos].ends_with(b"end") => pos,
        _ => return Ok(payload.to_vec()),
    };
    let mut data_start = keyword + b"stream".len();
    if payload[data_start..].starts_with(b"\r\n") {
        data_start += 2;
    } else if payload[data_start..].starts_with(b"\n") || payload[data_start..].starts_with(b"\r") {
        data_start += 1;
    }
    let end = match find_keyword(&payload[data_start..], b"endstream") {
        Some(pos) => data_start + pos,
        None => return Ok(payload.to_vec()),
    };
    let mut data = &payload[data_start..end];
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    let encrypted = handler.encrypt_stream(data, id, 0)?;

    let head = &payload[..keyword];
    let mut out = Vec::with_capacity(payload.len() + 32);
    match parse_object(head) {
        Ok((rest, Object::Dictionary(mut dict))) if skip_whitespace(rest).is_empty() => {
            dict.insert("Length".into(), Object::Integer(encrypted.len() as i64));
            out.extend(serializer.serialize_encrypted(&Object::Dictionary(dict), id, 0, handler)?);
            out.push(b'\n');
        },
        _ => out.extend_from_slice(head),
    }
    out.extend_from_slice(b"stream\n");
    out.extend(encrypted);
    out.push(b'\n');
    out.extend_from_slice(&payload[end..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Trailer;
    use crate::encryption::{rc4_crypt, Algorithm, ProtectionConfig};

    fn document(ids: &[u32]) -> Document {
        let objects = ids
            .iter()
            .map(|&id| {
                if id == ids[0] {
                    IndirectObject::new(id, "<< /Type /Catalog >>")
                } else {
                    IndirectObject::new(id, "(text)")
                }
            })
            .collect();
        Document::new(
            objects,
            Trailer {
                root: ids[0],
                info: None,
            },
        )
        .unwrap()
    }

    fn free_chain(entries: &[XrefEntry]) -> Vec<u32> {
        let mut chain = vec![0];
        let mut current = 0usize;
        loop {
            match entries[current] {
                XrefEntry::Free { next } => {
                    chain.push(next);
                    if next == 0 {
                        return chain;
                    }
                    current = next as usize;
                },
                XrefEntry::InUse { .. } => panic!("chain reached in-use entry {}", current),
            }
        }
    }

    #[test]
    fn test_free_list_single_gap() {
        let offsets: BTreeMap<u32, usize> = [(1, 15), (3, 40), (4, 60)].into_iter().collect();
        let entries = build_xref_entries(&offsets, 5);
        assert_eq!(free_chain(&entries), vec![0, 2, 0]);
    }

    #[test]
    fn test_free_list_consecutive_gaps() {
        let offsets: BTreeMap<u32, usize> = [(1, 15), (5, 40)].into_iter().collect();
        let entries = build_xref_entries(&offsets, 6);
        assert_eq!(free_chain(&entries), vec![0, 2, 3, 4, 0]);
    }

    #[test]
    fn test_no_gaps() {
        let offsets: BTreeMap<u32, usize> = [(1, 15), (2, 40)].into_iter().collect();
        let entries = build_xref_entries(&offsets, 3);
        assert_eq!(entries[0], XrefEntry::Free { next: 0 });
        assert_eq!(entries[2], XrefEntry::InUse { offset: 40 });
    }

    #[test]
    fn test_output_layout() {
        let config = EditorConfig::default();
        let bytes = PdfWriter::new(document(&[1, 3]), &config).finish().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7\n"));
        assert!(text.contains("1 0 obj\n<< /Type /Catalog >>\nendobj\n"));
        assert!(text.contains("xref\n0 4\n0000000002 65535 f \n"));
        assert!(text.contains("0000000000 65535 f \n"));
        assert!(text.contains("trailer\n<< /Size 4 /Root 1 0 R >>"));
        assert!(text.ends_with("%%EOF\n"));

        let offset = bytes.windows(7).position(|w| w == b"3 0 obj").unwrap();
        assert!(text.contains(&format!("{:010} 00000 n \n", offset)));

        let startxref: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert_eq!(&bytes[startxref..startxref + 4], b"xref");
    }

    #[test]
    fn test_xref_rows_are_twenty_bytes() {
        let config = EditorConfig::default();
        let bytes = PdfWriter::new(document(&[1, 2, 4]), &config).finish().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let table = text.split("xref\n0 5\n").nth(1).unwrap();
        for row in table.split_inclusive('\n').take(5) {
            assert_eq!(row.len(), 20, "row {:?}", row);
        }
    }

    #[test]
    fn test_allocate_continues_after_max_id() {
        let config = EditorConfig::default();
        let mut writer = PdfWriter::new(document(&[1, 7]), &config);
        assert_eq!(writer.allocate(5).unwrap(), 8);
        assert_eq!(writer.allocate(1).unwrap(), 13);
        assert_eq!(writer.state(), WriterState::AssigningIds);
    }

    #[test]
    fn test_encryption_dictionary_is_last() {
        let config = EditorConfig::default();
        let security = StandardSecurity::new(&ProtectionConfig::new(0, b"u", b"o")).unwrap();
        let bytes = PdfWriter::new(document(&[1, 2]), &config)
            .with_security(security)
            .finish()
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("3 0 obj\n<< /Filter /Standard"));
        assert!(text.contains("/Encrypt 3 0 R /ID [() ()]"));
        // The catalog has nothing to encrypt; the string does.
        assert!(text.contains("1 0 obj\n<< /Type /Catalog >>"));
        assert!(!text.contains("(text)"));
    }

    fn loosely_formed() -> Document {
        let objects = vec![
            IndirectObject::new(1, "<< /Type /Catalog >>"),
            IndirectObject::new(2, "<< /Length 5 >>\nstream\nhello\nendstream junk"),
            IndirectObject::new(3, "<< /A 1 >> (x)"),
        ];
        Document::new(objects, Trailer { root: 1, info: None }).unwrap()
    }

    #[test]
    fn test_unparseable_payloads_encrypt_raw_stream_bytes() {
        let config = EditorConfig::default();
        let security = StandardSecurity::new(&ProtectionConfig::new(0, b"u", b"o")).unwrap();
        let key = security.write_handler().derive_object_key(2, 0);
        let bytes = PdfWriter::new(loosely_formed(), &config)
            .with_security(security)
            .finish()
            .unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("3 0 obj\n<< /A 1 >> (x)\nendobj\n"));

        let head = b"2 0 obj\n<< /Length 5 >>\nstream\n";
        let start = bytes.windows(head.len()).position(|w| w == head).unwrap() + head.len();
        assert_eq!(rc4_crypt(&key, &bytes[start..start + 5]), b"hello");
        assert_eq!(&bytes[start + 5..start + 20], b"\nendstream junk");
    }

    #[test]
    fn test_raw_stream_length_follows_aes_ciphertext() {
        let config = EditorConfig::default();
        let protection = ProtectionConfig::new(0, b"u", b"o").with_algorithm(Algorithm::Aes128);
        let security = StandardSecurity::new(&protection).unwrap();
        let bytes = PdfWriter::new(loosely_formed(), &config)
            .with_security(security)
            .finish()
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("2 0 obj\n<< /Length 32 >>\nstream\n"));
    }
}
