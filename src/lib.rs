// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]

//! # pdf_inject
//!
//! Fill existing PDF documents with text and images.
//!
//! ## Features
//! - **Object-level parsing**: classic `N 0 obj ... endobj` files are loaded
//!   into an object store; untouched objects are written back byte for byte
//! - **TrueType subsetting**: registered fonts are embedded as Type0 /
//!   CIDFontType2 subsets holding only the glyphs actually used, with a
//!   ToUnicode CMap so the text stays extractable
//! - **Images**: JPEG (passed through) and PNG (re-encoded, alpha as `/SMask`)
//! - **Placement**: rectangles in top-left page coordinates with six
//!   alignment flags
//! - **Protection**: standard security handler, RC4 40/128-bit and AES-128
//! - **Output**: classic xref table with a linked free list
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_inject::{Alignment, DocumentEditor};
//!
//! # fn main() -> pdf_inject::Result<()> {
//! let mut editor = DocumentEditor::open("form.pdf")?;
//! editor.register_font("mono", std::fs::read("DejaVuSansMono.ttf")?)?;
//! editor.set_font("mono", 12.0)?;
//! editor.insert_text("Jane Doe", 1, 72.0, 100.0, 200.0, 20.0, Alignment::LEFT | Alignment::MIDDLE)?;
//!
//! let logo = editor.register_image(&std::fs::read("logo.png")?)?;
//! editor.insert_image(logo, 1, 400.0, 40.0, 120.0, 60.0)?;
//!
//! editor.set_protection(0, b"user", b"owner")?;
//! editor.save("filled.pdf")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling and configuration
pub mod config;
pub mod error;

// Core PDF parsing
pub mod document;
pub mod document_parser;
pub mod lexer;
pub mod object;
pub mod parser;

// Font embedding
pub mod fonts;

// Encryption support
pub mod encryption;

// PDF writing
pub mod writer;

// Editing
pub mod editor;

pub use config::EditorConfig;
pub use document::{Document, IndirectObject, Trailer};
pub use document_parser::{load_document, parse_document};
pub use editor::{Alignment, DocumentEditor, ImageHandle};
pub use encryption::{Algorithm, Permissions, ProtectionConfig};
pub use error::{Error, Result};
