//! CID font subsets for embedding.
//!
//! A [`FontSubset`] collects the characters injected text uses, then builds
//! the five objects of an embedded Type0 font:
//!
//! 1. `FontFile2` stream holding the subset TrueType program
//! 2. `CIDToGIDMap` stream
//! 3. `ToUnicode` CMap stream
//! 4. `FontDescriptor`
//! 5. `Type0` font dictionary with an inline `CIDFontType2` descendant
//!
//! CIDs are dense: CID 0 is `.notdef` and the used characters, sorted by
//! scalar value, take CIDs 1..=n. The CID assignment and the subset
//! program therefore depend only on the final character set, so the same
//! text always produces the same bytes.

use super::cmap::to_unicode_cmap;
use super::truetype_parser::{FontMetrics, TrueTypeFont};
use crate::document::IndirectObject;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::writer::stream_object;
use md5::{Digest, Md5};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use subsetter::GlyphRemapper;

/// CID 0 is `.notdef`, so at most this many characters fit in two-byte CIDs.
const MAX_CHARACTERS: usize = u16::MAX as usize;

/// Object ids of the five objects that make up one embedded font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontObjectIds {
    /// `FontFile2` stream
    pub font_file: u32,
    /// `CIDToGIDMap` stream
    pub cid_to_gid: u32,
    /// `ToUnicode` CMap stream
    pub to_unicode: u32,
    /// `FontDescriptor`
    pub descriptor: u32,
    /// `Type0` font dictionary, the one pages reference
    pub dictionary: u32,
}

/// A registered TrueType font and the characters used with it.
#[derive(Debug, Clone)]
pub struct FontSubset {
    name: String,
    program: Arc<Vec<u8>>,
    metrics: FontMetrics,
    used: BTreeSet<char>,
    cids: BTreeMap<char, u16>,
    ids: Option<FontObjectIds>,
}

impl FontSubset {
    /// Register a TrueType program under `name`.
    ///
    /// The program is parsed once here so a broken font is reported at
    /// registration rather than at save.
    pub fn new(name: impl Into<String>, program: Vec<u8>) -> Result<Self> {
        let metrics = FontMetrics::from_font(&TrueTypeFont::parse(&program)?);
        let name = name.into();
        log::debug!(
            "Registered font '{}' ({}, {} bytes)",
            name,
            metrics.postscript_name,
            program.len()
        );
        Ok(Self {
            name,
            program: Arc::new(program),
            metrics,
            used: BTreeSet::new(),
            cids: BTreeMap::new(),
            ids: None,
        })
    }

    /// Name the font was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor metrics of the source font.
    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    /// Add every character of `text` to the used set.
    pub fn add_characters(&mut self, text: &str) {
        let before = self.used.len();
        self.used.extend(text.chars());
        if self.used.len() != before {
            // Dense CIDs shift when a smaller character arrives.
            self.cids = self
                .used
                .iter()
                .zip(1..=u16::MAX)
                .map(|(&ch, cid)| (ch, cid))
                .collect();
        }
    }

    /// Characters used so far, in CID order.
    pub fn used_characters(&self) -> &BTreeSet<char> {
        &self.used
    }

    /// Whether any text has been added.
    pub fn is_used(&self) -> bool {
        !self.used.is_empty()
    }

    /// CID of a used character.
    pub fn cid_for(&self, ch: char) -> Option<u16> {
        self.cids.get(&ch).copied()
    }

    /// Encode `text` as a hex string of two-byte CIDs for `Tj`.
    ///
    /// Characters that were never added encode as CID 0.
    pub fn encode_hex(&self, text: &str) -> String {
        let mut hex = String::with_capacity(text.len() * 4 + 2);
        hex.push('<');
        for ch in text.chars() {
            hex.push_str(&format!("{:04X}", self.cid_for(ch).unwrap_or(0)));
        }
        hex.push('>');
        hex
    }

    /// Width of `text` in points at `font_size`.
    pub fn text_width(&self, text: &str, font_size: f64) -> Result<f64> {
        Ok(self.parse()?.text_width(text, font_size))
    }

    /// Reserve five consecutive ids starting at `start`; returns the next
    /// free id.
    pub fn assign_object_ids(&mut self, start: u32) -> u32 {
        self.ids = Some(FontObjectIds {
            font_file: start,
            cid_to_gid: start + 1,
            to_unicode: start + 2,
            descriptor: start + 3,
            dictionary: start + 4,
        });
        start + 5
    }

    /// Ids reserved by [`assign_object_ids`](Self::assign_object_ids).
    pub fn object_ids(&self) -> Option<FontObjectIds> {
        self.ids
    }

    /// Build the subset program and its five objects.
    pub fn build(&self, compress: bool) -> Result<Vec<IndirectObject>> {
        let ids = self.ids.ok_or_else(|| {
            Error::FontBuild(format!("font '{}' has no object ids assigned", self.name))
        })?;
        if self.used.len() > MAX_CHARACTERS {
            return Err(Error::FontBuild(format!(
                "font '{}' uses {} characters, more than {} CIDs",
                self.name,
                self.used.len(),
                MAX_CHARACTERS
            )));
        }
        let font = self.parse()?;

        let mut remapper = GlyphRemapper::new();
        remapper.remap(0);
        let mut cid_to_gid = vec![0u8, 0u8];
        let mut widths = Vec::with_capacity(self.used.len());
        for &ch in &self.used {
            let gid = match font.glyph_id(ch) {
                Some(gid) => gid,
                None => {
                    log::warn!(
                        "Font '{}' has no glyph for U+{:04X}, using .notdef",
                        self.name,
                        ch as u32
                    );
                    0
                },
            };
            cid_to_gid.extend_from_slice(&remapper.remap(gid).to_be_bytes());
            widths.push(Object::Integer(font.glyph_width(gid) as i64));
        }

        let program = subsetter::subset(&self.program, 0, &remapper)
            .map_err(|e| Error::FontBuild(format!("subsetting '{}' failed: {:?}", self.name, e)))?;
        log::debug!(
            "Subset font '{}': {} characters, {} -> {} bytes",
            self.name,
            self.used.len(),
            self.program.len(),
            program.len()
        );

        let base_font = format!("{}+{}", self.subset_tag(), self.metrics.postscript_name);
        let mappings: Vec<(u16, char)> = self.cids.iter().map(|(&ch, &cid)| (cid, ch)).collect();
        let cmap = to_unicode_cmap(&mappings);

        let mut file_dict = Dict::new();
        file_dict.insert("Length1".into(), Object::Integer(program.len() as i64));
        let font_file = stream_object(file_dict, program, compress)?;
        let cid_to_gid = stream_object(Dict::new(), cid_to_gid, compress)?;
        let to_unicode = stream_object(Dict::new(), cmap.into_bytes(), compress)?;
        let descriptor = self.descriptor(&base_font, ids.font_file);
        let dictionary = type0_dictionary(&base_font, widths, ids);

        Ok(vec![
            IndirectObject::from_object(ids.font_file, &font_file),
            IndirectObject::from_object(ids.cid_to_gid, &cid_to_gid),
            IndirectObject::from_object(ids.to_unicode, &to_unicode),
            IndirectObject::from_object(ids.descriptor, &descriptor),
            IndirectObject::from_object(ids.dictionary, &dictionary),
        ])
    }

    fn parse(&self) -> Result<TrueTypeFont<'_>> {
        Ok(TrueTypeFont::parse(&self.program)?)
    }

    /// Six uppercase letters derived from the font name and the used set.
    fn subset_tag(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.name.as_bytes());
        for ch in &self.used {
            hasher.update((*ch as u32).to_be_bytes());
        }
        hasher.finalize()[..6]
            .iter()
            .map(|b| (b'A' + b % 26) as char)
            .collect()
    }

    fn descriptor(&self, base_font: &str, font_file: u32) -> Object {
        let m = &self.metrics;
        let mut dict = Dict::new();
        dict.insert("Type".into(), Object::name("FontDescriptor"));
        dict.insert("FontName".into(), Object::name(base_font));
        dict.insert("Flags".into(), Object::Integer(m.flags as i64));
        dict.insert(
            "FontBBox".into(),
            Object::Array(
                [m.bbox.0, m.bbox.1, m.bbox.2, m.bbox.3]
                    .iter()
                    .map(|&v| Object::Integer(v as i64))
                    .collect(),
            ),
        );
        dict.insert("ItalicAngle".into(), Object::Real(m.italic_angle));
        dict.insert("Ascent".into(), Object::Integer(m.ascent as i64));
        dict.insert("Descent".into(), Object::Integer(m.descent as i64));
        dict.insert("CapHeight".into(), Object::Integer(m.cap_height as i64));
        dict.insert("StemV".into(), Object::Integer(m.stem_v as i64));
        dict.insert("FontFile2".into(), Object::reference(font_file));
        Object::Dictionary(dict)
    }
}

fn type0_dictionary(base_font: &str, widths: Vec<Object>, ids: FontObjectIds) -> Object {
    let mut system_info = Dict::new();
    system_info.insert("Registry".into(), Object::String(b"Adobe".to_vec()));
    system_info.insert("Ordering".into(), Object::String(b"Identity".to_vec()));
    system_info.insert("Supplement".into(), Object::Integer(0));

    let w = if widths.is_empty() {
        Vec::new()
    } else {
        vec![Object::Integer(1), Object::Array(widths)]
    };

    let mut descendant = Dict::new();
    descendant.insert("Type".into(), Object::name("Font"));
    descendant.insert("Subtype".into(), Object::name("CIDFontType2"));
    descendant.insert("BaseFont".into(), Object::name(base_font));
    descendant.insert("CIDSystemInfo".into(), Object::Dictionary(system_info));
    descendant.insert("FontDescriptor".into(), Object::reference(ids.descriptor));
    descendant.insert("DW".into(), Object::Integer(1000));
    descendant.insert("W".into(), Object::Array(w));
    descendant.insert("CIDToGIDMap".into(), Object::reference(ids.cid_to_gid));

    let mut dict = Dict::new();
    dict.insert("Type".into(), Object::name("Font"));
    dict.insert("Subtype".into(), Object::name("Type0"));
    dict.insert("BaseFont".into(), Object::name(base_font));
    dict.insert("Encoding".into(), Object::name("Identity-H"));
    dict.insert(
        "DescendantFonts".into(),
        Object::Array(vec![Object::Dictionary(descendant)]),
    );
    dict.insert("ToUnicode".into(), Object::reference(ids.to_unicode));
    Object::Dictionary(dict)
}
