//! TrueType font access for embedding.
//!
//! Wraps `ttf-parser` to answer the questions the subset builder and the
//! text layout ask: glyph lookup, advance widths and the metrics that go
//! into a FontDescriptor.

use ttf_parser::{Face, GlyphId};

/// Error types for TrueType font parsing.
#[derive(Debug, thiserror::Error)]
pub enum TrueTypeError {
    /// Failed to parse font file
    #[error("Failed to parse font file: {0}")]
    ParseError(String),

    /// Font file is empty
    #[error("Font file is empty")]
    EmptyFont,

    /// Required table is missing
    #[error("Required font table is missing: {0}")]
    MissingTable(&'static str),
}

impl From<TrueTypeError> for crate::error::Error {
    fn from(err: TrueTypeError) -> Self {
        crate::error::Error::FontBuild(err.to_string())
    }
}

/// Result type for TrueType operations.
pub type TrueTypeResult<T> = Result<T, TrueTypeError>;

/// A parsed TrueType font borrowing its program bytes.
pub struct TrueTypeFont<'a> {
    face: Face<'a>,
}

impl<'a> TrueTypeFont<'a> {
    /// Parse a TrueType font. Fonts without a `glyf` table (CFF outlines)
    /// are rejected since they cannot be embedded as `FontFile2`.
    pub fn parse(data: &'a [u8]) -> TrueTypeResult<Self> {
        if data.is_empty() {
            return Err(TrueTypeError::EmptyFont);
        }
        let face = Face::parse(data, 0).map_err(|e| TrueTypeError::ParseError(e.to_string()))?;
        if face.tables().glyf.is_none() {
            return Err(TrueTypeError::MissingTable("glyf"));
        }
        if face.units_per_em() == 0 {
            return Err(TrueTypeError::ParseError("unitsPerEm is zero".into()));
        }
        Ok(Self { face })
    }

    /// PostScript name from the `name` table.
    pub fn postscript_name(&self) -> Option<String> {
        self.face
            .names()
            .into_iter()
            .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|name| name.to_string())
    }

    /// Units per em.
    pub fn units_per_em(&self) -> u16 {
        self.face.units_per_em()
    }

    /// Glyph for a character; `None` if the cmap has no entry.
    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.face.glyph_index(ch).map(|gid| gid.0)
    }

    /// Advance width of a glyph in 1/1000 em.
    pub fn glyph_width(&self, glyph_id: u16) -> u16 {
        let advance = self.face.glyph_hor_advance(GlyphId(glyph_id)).unwrap_or(0) as u32;
        (advance * 1000 / self.units_per_em() as u32) as u16
    }

    /// Advance width of a character in 1/1000 em. Unmapped characters
    /// measure as `.notdef`.
    pub fn char_width(&self, ch: char) -> u16 {
        self.glyph_width(self.glyph_id(ch).unwrap_or(0))
    }

    /// Width of `text` in points at `font_size`.
    pub fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let units: u32 = text.chars().map(|ch| self.char_width(ch) as u32).sum();
        units as f64 * font_size / 1000.0
    }

    /// FontDescriptor `/Flags`: FixedPitch, Nonsymbolic and Italic bits.
    pub fn font_flags(&self) -> u32 {
        let mut flags = 1 << 5;
        if self.face.is_monospaced() {
            flags |= 1;
        }
        if self.face.is_italic() {
            flags |= 1 << 6;
        }
        flags
    }
}

/// FontDescriptor metrics in PDF glyph space (1/1000 em).
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// PostScript name, or "Unknown"
    pub postscript_name: String,
    /// Ascent above the baseline
    pub ascent: i32,
    /// Descent below the baseline (negative)
    pub descent: i32,
    /// Height of capital letters
    pub cap_height: i32,
    /// Font bounding box (llx, lly, urx, ury)
    pub bbox: (i32, i32, i32, i32),
    /// Italic angle in degrees
    pub italic_angle: f64,
    /// Dominant vertical stem width
    pub stem_v: i32,
    /// FontDescriptor flags
    pub flags: u32,
}

impl FontMetrics {
    /// Extract metrics from a parsed font.
    pub fn from_font(font: &TrueTypeFont<'_>) -> Self {
        let face = &font.face;
        let upem = font.units_per_em() as i32;
        let to_pdf = |v: i16| v as i32 * 1000 / upem;
        let bbox = face.global_bounding_box();

        Self {
            postscript_name: font.postscript_name().unwrap_or_else(|| "Unknown".to_string()),
            ascent: to_pdf(face.ascender()),
            descent: to_pdf(face.descender()),
            cap_height: to_pdf(face.capital_height().unwrap_or(face.ascender())),
            bbox: (
                to_pdf(bbox.x_min),
                to_pdf(bbox.y_min),
                to_pdf(bbox.x_max),
                to_pdf(bbox.y_max),
            ),
            italic_angle: if face.is_italic() { -12.0 } else { 0.0 },
            stem_v: if face.is_bold() { 140 } else { 80 },
            flags: font.font_flags(),
        }
    }
}
