//! Main document editing interface.
//!
//! Provides the [`DocumentEditor`] type: register fonts and images, queue
//! text and image placements, optionally protect, then save.

use super::injector::Injector;
use super::placement::{Alignment, ImageHandle, PlacementRequest, Rect, TextStyle};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::document_parser::{load_document, parse_document};
use crate::encryption::{ProtectionConfig, StandardSecurity};
use crate::error::{Error, Result};
use crate::fonts::FontSubset;
use crate::writer::{ImageData, PdfWriter};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Font and size used by `insert_text`.
#[derive(Debug, Clone, PartialEq)]
struct CurrentFont {
    name: String,
    size: f64,
}

/// PDF document editor.
///
/// Holds the parsed document, the font and image registries and the queue
/// of placements. Nothing touches the parsed document until save, and save
/// works on a copy, so an editor can be saved any number of times.
///
/// # Example
///
/// ```ignore
/// use pdf_inject::{Alignment, DocumentEditor};
///
/// let mut editor = DocumentEditor::open("form.pdf")?;
/// editor.register_font("mono", std::fs::read("DejaVuSansMono.ttf")?)?;
/// editor.set_font("mono", 12.0)?;
/// editor.insert_text("Jane Doe", 1, 72.0, 100.0, 200.0, 20.0, Alignment::default())?;
/// editor.save("filled.pdf")?;
/// ```
#[derive(Debug, Clone)]
pub struct DocumentEditor {
    /// Parsed source document
    document: Document,
    /// Layout and output settings
    config: EditorConfig,
    /// Registered fonts in registration order
    fonts: IndexMap<String, FontSubset>,
    /// Registered images; an [`ImageHandle`] indexes this list
    images: Vec<ImageData>,
    /// Queued placements in insertion order
    placements: Vec<PlacementRequest>,
    /// Style for `insert_text`
    current_font: Option<CurrentFont>,
    /// Draw cell borders around subsequent text
    show_border: bool,
    /// Security handler derived by `set_protection`
    security: Option<StandardSecurity>,
}

impl DocumentEditor {
    /// Open a PDF document for editing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let document = load_document(path.as_ref())?;
        log::info!(
            "Opened {} ({} objects)",
            path.as_ref().display(),
            document.len()
        );
        Ok(Self::from_document(document))
    }

    /// Parse a PDF from memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::from_document(parse_document(data)?))
    }

    /// Edit an already parsed document.
    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            config: EditorConfig::default(),
            fonts: IndexMap::new(),
            images: Vec::new(),
            placements: Vec::new(),
            current_font: None,
            show_border: false,
            security: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The parsed source document. Placements never modify it.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Number of pages in the source document.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.document.page_ids()?.len())
    }

    /// Queued placements.
    pub fn placements(&self) -> &[PlacementRequest] {
        &self.placements
    }

    /// Register a TrueType program under `name`.
    ///
    /// Fails with [`Error::DuplicateFontName`] if `name` is taken and with
    /// [`Error::FontBuild`] if the program cannot be parsed.
    pub fn register_font(&mut self, name: impl Into<String>, ttf: Vec<u8>) -> Result<()> {
        let name = name.into();
        if self.fonts.contains_key(&name) {
            return Err(Error::DuplicateFontName(name));
        }
        let font = FontSubset::new(name.clone(), ttf)?;
        self.fonts.insert(name, font);
        Ok(())
    }

    /// Whether a font is registered under `name`.
    pub fn has_font(&self, name: &str) -> bool {
        self.fonts.contains_key(name)
    }

    /// Characters used so far with font `name`.
    pub fn used_characters(&self, name: &str) -> Option<String> {
        self.fonts
            .get(name)
            .map(|font| font.used_characters().iter().collect())
    }

    /// Select the font and size for subsequent [`insert_text`](Self::insert_text) calls.
    pub fn set_font(&mut self, name: &str, size: f64) -> Result<()> {
        if !self.fonts.contains_key(name) {
            return Err(Error::UnknownFont(name.to_string()));
        }
        self.current_font = Some(CurrentFont {
            name: name.to_string(),
            size,
        });
        Ok(())
    }

    /// Select a font at the configured default size.
    pub fn select_font(&mut self, name: &str) -> Result<()> {
        self.set_font(name, self.config.default_font_size)
    }

    /// Draw a dotted hairline around the rectangle of each text inserted
    /// from now on.
    pub fn show_cell_border(&mut self, show: bool) {
        self.show_border = show;
    }

    /// Queue `text` in the rectangle `(x, y, w, h)` of 1-based `page`, with
    /// the font selected by [`set_font`](Self::set_font).
    ///
    /// Coordinates are in points from the top-left corner. The current font,
    /// size and border setting are captured now; later changes do not affect
    /// this placement. Fails with [`Error::UnknownFont`] when no font is
    /// selected.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_text(
        &mut self,
        text: &str,
        page: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        alignment: Alignment,
    ) -> Result<()> {
        let current = self
            .current_font
            .clone()
            .ok_or_else(|| Error::UnknownFont("(no font selected)".to_string()))?;
        self.insert_text_with_font(&current.name, current.size, text, page, x, y, w, h, alignment)
    }

    /// Like [`insert_text`](Self::insert_text) with an explicit font and size.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_text_with_font(
        &mut self,
        font: &str,
        size: f64,
        text: &str,
        page: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        alignment: Alignment,
    ) -> Result<()> {
        let subset = self
            .fonts
            .get_mut(font)
            .ok_or_else(|| Error::UnknownFont(font.to_string()))?;
        subset.add_characters(text);

        self.placements.push(PlacementRequest::Text {
            page,
            rect: Rect::new(x, y, w, h),
            alignment,
            text: text.to_string(),
            style: TextStyle {
                font: font.to_string(),
                size,
                show_border: self.show_border,
            },
        });
        Ok(())
    }

    /// Register a JPEG or PNG image.
    pub fn register_image(&mut self, data: &[u8]) -> Result<ImageHandle> {
        let image = ImageData::from_bytes(data)?;
        Ok(self.push_image(image))
    }

    /// Register a base64 encoded JPEG or PNG image. A `data:` URI prefix is
    /// accepted.
    pub fn register_image_base64(&mut self, encoded: &str) -> Result<ImageHandle> {
        let image = ImageData::from_base64(encoded)?;
        Ok(self.push_image(image))
    }

    fn push_image(&mut self, image: ImageData) -> ImageHandle {
        let handle = ImageHandle(self.images.len());
        log::debug!(
            "Registered image {} ({}x{}, {:?})",
            handle.index(),
            image.width,
            image.height,
            image.format
        );
        self.images.push(image);
        handle
    }

    /// Queue a registered image, scaled to fill `(x, y, w, h)` of 1-based
    /// `page`.
    pub fn insert_image(
        &mut self,
        image: ImageHandle,
        page: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    ) -> Result<()> {
        if image.index() >= self.images.len() {
            return Err(Error::ImageBuild(format!(
                "image handle {} was not registered with this editor",
                image.index()
            )));
        }
        self.placements.push(PlacementRequest::Image {
            page,
            rect: Rect::new(x, y, w, h),
            image,
        });
        Ok(())
    }

    /// Register a base64 image and queue it in one call.
    pub fn insert_image_base64(
        &mut self,
        encoded: &str,
        page: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    ) -> Result<ImageHandle> {
        let handle = self.register_image_base64(encoded)?;
        self.insert_image(handle, page, x, y, w, h)?;
        Ok(handle)
    }

    /// Encrypt the output with 40-bit RC4.
    ///
    /// `permissions` uses the bit positions of the `/P` entry (see
    /// [`Permissions`](crate::encryption::Permissions)). The key is derived
    /// here, so invalid parameters fail this call rather than the save.
    pub fn set_protection(
        &mut self,
        permissions: u32,
        user_password: &[u8],
        owner_password: &[u8],
    ) -> Result<()> {
        self.set_protection_with(ProtectionConfig::new(permissions, user_password, owner_password))
    }

    /// Encrypt the output with an explicit algorithm and passwords.
    pub fn set_protection_with(&mut self, config: ProtectionConfig) -> Result<()> {
        let security = StandardSecurity::new(&config)?;
        log::debug!("Protection set: {:?}", security.algorithm());
        self.security = Some(security);
        Ok(())
    }

    /// Remove protection set earlier.
    pub fn clear_protection(&mut self) {
        self.security = None;
    }

    /// Whether the output will be encrypted.
    pub fn is_protected(&self) -> bool {
        self.security.is_some()
    }

    /// Write the edited document to `path`.
    ///
    /// The file is only created once the whole document has been built.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        log::info!("Saved {} ({} bytes)", path.as_ref().display(), bytes.len());
        Ok(())
    }

    /// Write the edited document to `out`.
    pub fn save_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        out.write_all(&bytes)?;
        Ok(())
    }

    /// Build the edited document in memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let working = self.document.clone();
        let pages = if self.placements.is_empty() {
            Vec::new()
        } else {
            working.page_ids()?
        };
        for placement in &self.placements {
            let page = placement.page();
            if page == 0 || page > pages.len() {
                return Err(Error::InvalidPage {
                    page,
                    page_count: pages.len(),
                });
            }
        }

        let mut writer = PdfWriter::new(working, &self.config);
        if let Some(security) = &self.security {
            writer = writer.with_security(security.clone());
        }

        // Fonts first, then images, then page content.
        let mut fonts = self.fonts.clone();
        for font in fonts.values_mut() {
            if font.is_used() {
                let start = writer.allocate(5)?;
                font.assign_object_ids(start);
            } else {
                log::warn!("Font '{}' registered but never used, not embedding", font.name());
            }
        }

        let mut image_ids: HashMap<ImageHandle, u32> = HashMap::new();
        for placement in &self.placements {
            if let PlacementRequest::Image { image, .. } = placement {
                if !image_ids.contains_key(image) {
                    let count = self.images[image.index()].object_count();
                    image_ids.insert(*image, writer.allocate(count)?);
                }
            }
        }

        let mut by_page: BTreeMap<usize, Vec<&PlacementRequest>> = BTreeMap::new();
        for placement in &self.placements {
            by_page.entry(placement.page()).or_default().push(placement);
        }

        let injector = Injector::new(&self.config, &fonts, &image_ids);
        for (page, placements) in &by_page {
            let prefix_id = writer.allocate(2)?;
            let page_id = pages[page - 1];
            injector.inject_page(writer.document_mut(), page_id, placements, prefix_id, prefix_id + 1)?;
        }

        for font in fonts.values().filter(|font| font.is_used()) {
            for obj in font.build(self.config.compress_streams)? {
                writer.put(obj);
            }
        }

        let mut placed: Vec<(&ImageHandle, &u32)> = image_ids.iter().collect();
        placed.sort();
        for (handle, &id) in placed {
            for obj in self.images[handle.index()].build_objects(id) {
                writer.put(obj);
            }
        }

        writer.finish()
    }
}
