//! Load a classic PDF file into a [`Document`].
//!
//! The file is scanned front to back for `N G obj ... endobj` spans rather
//! than read through its xref table, so stale or broken offsets in the input
//! do not matter. Each body is parsed once to find where it ends; the stored
//! payload is the original byte slice, not a re-serialization.

use crate::document::{Document, IndirectObject, Trailer};
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::{find_keyword, parse_object};
use lazy_static::lazy_static;
use std::path::Path;

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)(\d+)[ \t\r\n\x0C\x00]+(\d+)[ \t\r\n\x0C\x00]+obj\b")
            .expect("static regex is valid");

    /// "trailer <<" markers
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)trailer[ \t\r\n\x0C\x00]*<<").expect("static regex is valid");
}

/// Distance from the start of the file within which `%PDF-` must appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Read and parse a PDF file.
pub fn load_document(path: impl AsRef<Path>) -> Result<Document> {
    let data = std::fs::read(path.as_ref())?;
    parse_document(&data)
}

/// Parse raw PDF bytes into a [`Document`].
///
/// Fails with [`Error::MalformedDocument`] when the header, the object
/// structure or the trailer `/Root` is missing or broken, and with
/// [`Error::Unsupported`] for encrypted inputs and inputs that only carry a
/// cross-reference stream.
pub fn parse_document(data: &[u8]) -> Result<Document> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    if find_keyword(window, b"%PDF-").is_none() {
        return Err(Error::MalformedDocument("missing %PDF- header".into()));
    }

    let objects = scan_objects(data)?;
    if objects.is_empty() {
        return Err(Error::MalformedDocument("no indirect objects found".into()));
    }

    let trailer = match find_trailer(data)? {
        Some(trailer) => trailer,
        None if has_xref_stream(&objects) => {
            return Err(Error::Unsupported(
                "documents with cross-reference streams are not supported".into(),
            ))
        },
        None => return Err(Error::MalformedDocument("no trailer with /Root found".into())),
    };

    let doc = Document::new(objects, trailer)?;
    log::info!(
        "Loaded document: {} objects, root {}, max id {}",
        doc.len(),
        doc.root_id(),
        doc.max_id()
    );
    Ok(doc)
}

fn scan_objects(data: &[u8]) -> Result<Vec<IndirectObject>> {
    let mut objects = Vec::new();
    let mut pos = 0;

    while let Some(caps) = RE_OBJ_HEADER.captures_at(data, pos) {
        let whole = caps.get(0).map_or(pos..pos, |m| m.range());
        // Reject matches glued to a preceding regular character ("x12 0 obj").
        if whole.start > 0 && is_regular(data[whole.start - 1]) {
            pos = whole.start + 1;
            continue;
        }

        let id = parse_number::<u32>(caps.get(1).map(|m| m.as_bytes()))
            .ok_or_else(|| malformed_at(whole.start, "object number out of range"))?;
        let gen = parse_number::<u16>(caps.get(2).map(|m| m.as_bytes()))
            .ok_or_else(|| malformed_at(whole.start, "generation number out of range"))?;
        if gen != 0 {
            log::warn!("Object {} has generation {}, it will be written as 0", id, gen);
        }

        let body_start = whole.end;
        let (payload_end, next) = find_object_end(data, body_start)
            .ok_or_else(|| malformed_at(whole.start, &format!("object {} has no endobj", id)))?;

        let payload = trim_whitespace(&data[body_start..payload_end]);
        log::debug!("Found object {} at byte {} ({} bytes)", id, whole.start, payload.len());
        objects.push(IndirectObject::new(id, payload));
        pos = next;
    }

    Ok(objects)
}

/// Returns (end of payload, position after `endobj`).
fn find_object_end(data: &[u8], body_start: usize) -> Option<(usize, usize)> {
    let body = &data[body_start..];

    if let Ok((rest, _)) = parse_object(body) {
        if let Ok((after, Token::ObjEnd)) = token(rest) {
            let payload_end = body_start + (body.len() - rest.len());
            return Some((payload_end, body_start + (body.len() - after.len())));
        }
    }

    // Unparseable body: fall back to keywords, skipping over stream data so
    // an "endobj" inside binary content is not mistaken for the end.
    let endobj = find_keyword(body, b"endobj")?;
    let search_from = match find_keyword(&body[..endobj], b"stream") {
        Some(stream_pos) => {
            stream_pos + find_keyword(&body[stream_pos..], b"endstream")? + b"endstream".len()
        },
        None => 0,
    };
    let endobj = search_from + find_keyword(&body[search_from..], b"endobj")?;
    log::debug!("Object body at byte {} located by keyword scan", body_start);
    Some((body_start + endobj, body_start + endobj + b"endobj".len()))
}

/// Last trailer dictionary carrying `/Root`.
fn find_trailer(data: &[u8]) -> Result<Option<Trailer>> {
    let starts: Vec<usize> = RE_TRAILER.find_iter(data).map(|m| m.end() - 2).collect();

    for &start in starts.iter().rev() {
        let dict = match parse_object(&data[start..]) {
            Ok((_, Object::Dictionary(dict))) => dict,
            _ => {
                log::warn!("Unparseable trailer dictionary at byte {}", start);
                continue;
            },
        };
        if dict.contains_key("Encrypt") {
            return Err(Error::Unsupported("input document is already encrypted".into()));
        }
        let Some(root) = dict.get("Root").and_then(Object::as_reference) else {
            continue;
        };
        let info = dict.get("Info").and_then(Object::as_reference).map(|r| r.id);
        return Ok(Some(Trailer {
            root: root.id,
            info,
        }));
    }

    Ok(None)
}

fn has_xref_stream(objects: &[IndirectObject]) -> bool {
    objects.iter().any(|obj| {
        find_keyword(&obj.payload, b"/XRef").is_some()
            && matches!(obj.parse(), Ok(Object::Stream { ref dict, .. })
                if dict.get("Type").and_then(Object::as_name) == Some("XRef"))
    })
}

fn parse_number<T: std::str::FromStr>(digits: Option<&[u8]>) -> Option<T> {
    std::str::from_utf8(digits?).ok()?.parse().ok()
}

fn is_regular(c: u8) -> bool {
    !crate::lexer::is_whitespace(c) && !crate::lexer::is_delimiter(c)
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&c| !crate::lexer::is_whitespace(c))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&c| !crate::lexer::is_whitespace(c))
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

fn malformed_at(offset: usize, reason: &str) -> Error {
    Error::MalformedDocument(format!("{} (byte {})", reason, offset))
}
