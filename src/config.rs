//! Editor configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Height of an A4 page in points; caller coordinates are measured from the
/// top of a page this tall.
pub const A4_HEIGHT: f64 = 841.89;

/// Settings that shape how injected content is laid out and written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Page height the caller's top-left coordinates are relative to.
    pub reference_height: f64,

    /// FlateDecode new content, font and CMap streams.
    pub compress_streams: bool,

    /// Version written in the `%PDF-` header.
    pub pdf_version: String,

    /// Font size used until `set_font` picks one.
    pub default_font_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            reference_height: A4_HEIGHT,
            compress_streams: true,
            pdf_version: "1.7".to_string(),
            default_font_size: 14.0,
        }
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Decode(format!("invalid editor config: {}", e)))?;
        if !(config.reference_height.is_finite() && config.reference_height > 0.0) {
            return Err(Error::Decode(format!(
                "reference_height must be positive, got {}",
                config.reference_height
            )));
        }
        Ok(config)
    }

    /// Set the reference page height.
    pub fn with_reference_height(mut self, height: f64) -> Self {
        self.reference_height = height;
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compression(mut self, enable: bool) -> Self {
        self.compress_streams = enable;
        self
    }

    /// Set the header version.
    pub fn with_pdf_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Set the fallback font size.
    pub fn with_default_font_size(mut self, size: f64) -> Self {
        self.default_font_size = size;
        self
    }
}
