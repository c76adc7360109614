//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! placements
//!     ↓
//! [ContentStreamBuilder] (operators for one page)
//!     ↓
//! [FontSubset] / [ImageData] (new indirect objects)
//!     ↓
//! [PdfWriter] (ids, body, xref, trailer)
//!     ↓
//! [ObjectSerializer] (object syntax, optional encryption)
//!     ↓
//! PDF bytes
//! ```
//!
//! [FontSubset]: crate::fonts::FontSubset

mod content_stream;
mod image_handler;
mod object_serializer;
mod pdf_writer;

pub use content_stream::{ContentStreamBuilder, ContentStreamOp};
pub use image_handler::{ColorSpace, ImageData, ImageError, ImageFormat};
pub use object_serializer::{format_real, ObjectSerializer};
pub use pdf_writer::{build_xref_entries, PdfWriter, WriterState, XrefEntry};

use crate::error::Result;
use crate::object::{Dict, Object};
use std::io::Write;

/// Compress data using Flate/Deflate compression.
///
/// Returns compressed bytes suitable for the FlateDecode filter.
pub fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Stream object with an exact `/Length`, Flate-compressed when `compress`
/// is set.
pub fn stream_object(mut dict: Dict, data: Vec<u8>, compress: bool) -> Result<Object> {
    let data = if compress {
        dict.insert("Filter".into(), Object::name("FlateDecode"));
        compress_data(&data)?
    } else {
        data
    };
    dict.insert("Length".into(), Object::Integer(data.len() as i64));
    Ok(Object::Stream {
        dict,
        data: data.into(),
    })
}
