//! Error types for the PDF editor.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors raised by
//! collaborators (font parsing, image decoding, ciphers) are converted into one
//! of the variants below before they cross a module boundary.

/// Result type alias for editor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, editing or saving a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural failure while loading a document
    #[error("Malformed PDF document: {0}")]
    MalformedDocument(String),

    /// Parse error at a specific byte offset inside an object body
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Referenced object does not exist in the store
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has the wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// A font with the same name was already registered
    #[error("Font name already registered: {0}")]
    DuplicateFontName(String),

    /// Text insertion referenced a font that was never registered
    #[error("Font name not found: {0}")]
    UnknownFont(String),

    /// Placement targets a page outside the document
    #[error("Invalid page number {page} (document has {page_count} pages)")]
    InvalidPage {
        /// Requested 1-based page number
        page: usize,
        /// Number of pages in the document
        page_count: usize,
    },

    /// Font program could not be parsed or subset
    #[error("Font build error: {0}")]
    FontBuild(String),

    /// Image could not be turned into an XObject
    #[error("Image build error: {0}")]
    ImageBuild(String),

    /// Input bytes could not be decoded (base64, image container)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid security handler parameters
    #[error("Protection error: {0}")]
    Protection(String),

    /// Valid PDF outside the supported subset
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
