//! Font embedding.
//!
//! TrueType programs registered with the editor are embedded as CID-keyed
//! `Type0` fonts with `Identity-H` encoding, subset to the characters the
//! injected text actually uses.

pub mod cmap;
pub mod font_subsetter;
pub mod truetype_parser;

pub use cmap::to_unicode_cmap;
pub use font_subsetter::{FontObjectIds, FontSubset};
pub use truetype_parser::{FontMetrics, TrueTypeError, TrueTypeFont};
