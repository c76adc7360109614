//! Editing existing PDF documents.
//!
//! ## Architecture
//!
//! ```text
//! Document (parsed, read-only)
//!     ↓
//! [DocumentEditor] (fonts, images, queued placements, protection)
//!     ↓ save: clone document
//! PdfWriter (allocates ids: fonts → images → page streams → /Encrypt)
//!     ↓
//! [Injector] per page (content stream + merged /Resources)
//!     ↓
//! header, objects, xref, trailer
//! ```
//!
//! Coordinates passed to the editor are in points from the top-left corner
//! of a page whose height is [`EditorConfig::reference_height`](crate::EditorConfig).

mod document_editor;
mod injector;
mod placement;
mod resource_manager;

pub use document_editor::DocumentEditor;
pub use injector::{text_anchor, Injector};
pub use placement::{Alignment, Horizontal, ImageHandle, PlacementRequest, Rect, TextStyle, Vertical};
pub use resource_manager::{append_contents, ResourceManager};
