//! Placement requests to content stream operators.
//!
//! Callers measure from the top-left corner of a page of fixed reference
//! height; PDF measures from the bottom-left. A rectangle at caller `y`
//! with height `h` has its PDF bottom edge at `reference_height - y - h`.

use super::placement::{Alignment, Horizontal, ImageHandle, PlacementRequest, Rect, TextStyle, Vertical};
use super::resource_manager::{append_contents, ResourceManager};
use crate::config::EditorConfig;
use crate::document::{Document, IndirectObject};
use crate::error::{Error, Result};
use crate::fonts::FontSubset;
use crate::object::{Dict, Object};
use crate::writer::{stream_object, ContentStreamBuilder};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Width of the diagnostic cell border.
const BORDER_WIDTH: f64 = 0.1;
/// Default line width restored when borders are off.
const DEFAULT_LINE_WIDTH: f64 = 1.0;

/// PDF-space point where text drawing starts: left end of the baseline.
///
/// `ascent` and `descent` are in points, `descent` negative. The result
/// is clamped into the rectangle, so text wider or taller than its cell
/// still starts inside it.
pub fn text_anchor(
    rect: &Rect,
    reference_height: f64,
    text_width: f64,
    ascent: f64,
    descent: f64,
    alignment: Alignment,
) -> (f64, f64) {
    let left = rect.x;
    let right = rect.x + rect.width;
    let bottom = rect.pdf_bottom(reference_height);
    let top = rect.pdf_top(reference_height);

    let x = match alignment.horizontal() {
        Horizontal::Left => left,
        Horizontal::Center => left + (rect.width - text_width) / 2.0,
        Horizontal::Right => right - text_width,
    };
    let y = match alignment.vertical() {
        Vertical::Top => top - ascent,
        Vertical::Bottom => bottom - descent,
        Vertical::Middle => bottom + (rect.height - (ascent - descent)) / 2.0 - descent,
    };

    (clamp(x, left, right), clamp(y, bottom, top))
}

fn clamp(value: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    value.max(lo).min(hi)
}

/// Applies placements to pages of a working document.
pub struct Injector<'a> {
    config: &'a EditorConfig,
    fonts: &'a IndexMap<String, FontSubset>,
    images: &'a HashMap<ImageHandle, u32>,
}

impl<'a> Injector<'a> {
    /// `fonts` must have object ids assigned; `images` maps each placed
    /// image to its XObject id.
    pub fn new(
        config: &'a EditorConfig,
        fonts: &'a IndexMap<String, FontSubset>,
        images: &'a HashMap<ImageHandle, u32>,
    ) -> Self {
        Self {
            config,
            fonts,
            images,
        }
    }

    /// Append `placements` to page `page_id`.
    ///
    /// Writes two new streams: `prefix_id` saves the graphics state ahead of
    /// the existing contents, `content_id` restores it and draws the
    /// placements. The page's `/Resources` becomes a direct dictionary with
    /// the injected fonts and images merged in.
    pub fn inject_page(
        &self,
        doc: &mut Document,
        page_id: u32,
        placements: &[&PlacementRequest],
        prefix_id: u32,
        content_id: u32,
    ) -> Result<()> {
        let mut page = doc.load_dict(page_id)?;
        let mut resources = ResourceManager::for_page(doc, &page)?;

        let mut builder = ContentStreamBuilder::new();
        builder.restore_state();
        for placement in placements {
            match placement {
                PlacementRequest::Text {
                    rect,
                    alignment,
                    text,
                    style,
                    ..
                } => self.text_ops(&mut builder, &mut resources, rect, *alignment, text, style)?,
                PlacementRequest::Image { rect, image, .. } => {
                    self.image_ops(&mut builder, &mut resources, rect, *image)?
                },
            }
        }

        page.insert(
            "Resources".to_string(),
            Object::Dictionary(resources.into_resources()),
        );
        append_contents(doc, &mut page, prefix_id, content_id)?;
        doc.replace_object(page_id, &Object::Dictionary(page));

        let prefix = stream_object(Dict::new(), b"q\n".to_vec(), false)?;
        let content = stream_object(Dict::new(), builder.build(), self.config.compress_streams)?;
        doc.put(IndirectObject::from_object(prefix_id, &prefix));
        doc.put(IndirectObject::from_object(content_id, &content));
        log::debug!(
            "Injected {} placements into page object {}",
            placements.len(),
            page_id
        );
        Ok(())
    }

    fn text_ops(
        &self,
        builder: &mut ContentStreamBuilder,
        resources: &mut ResourceManager,
        rect: &Rect,
        alignment: Alignment,
        text: &str,
        style: &TextStyle,
    ) -> Result<()> {
        let font = self
            .fonts
            .get(&style.font)
            .ok_or_else(|| Error::UnknownFont(style.font.clone()))?;

        if style.show_border {
            builder
                .save_state()
                .set_line_width(BORDER_WIDTH)
                .set_dash_pattern(vec![1.0, 1.0], 0.0)
                .rect(
                    rect.x,
                    rect.pdf_bottom(self.config.reference_height),
                    rect.width,
                    rect.height,
                )
                .stroke()
                .restore_state();
        } else {
            builder
                .set_line_width(DEFAULT_LINE_WIDTH)
                .set_dash_pattern(Vec::new(), 0.0);
        }

        // Empty text only draws its cell; the font may not be embedded.
        if text.is_empty() {
            return Ok(());
        }

        let ids = font.object_ids().ok_or_else(|| {
            Error::FontBuild(format!("font '{}' has no object ids assigned", style.font))
        })?;
        let name = resources.font_resource(&style.font, ids.dictionary)?;

        let metrics = font.metrics();
        let ascent = metrics.ascent as f64 * style.size / 1000.0;
        let descent = metrics.descent as f64 * style.size / 1000.0;
        let width = font.text_width(text, style.size)?;
        let (x, y) = text_anchor(
            rect,
            self.config.reference_height,
            width,
            ascent,
            descent,
            alignment,
        );

        builder
            .begin_text()
            .set_font(&name, style.size)
            .hex_text(&font.encode_hex(text), x, y)
            .end_text();
        Ok(())
    }

    fn image_ops(
        &self,
        builder: &mut ContentStreamBuilder,
        resources: &mut ResourceManager,
        rect: &Rect,
        image: ImageHandle,
    ) -> Result<()> {
        let image_id = self.images.get(&image).copied().ok_or_else(|| {
            Error::ImageBuild(format!("image {} has no object id assigned", image.index()))
        })?;
        let name = resources.image_resource(image, image_id)?;
        builder.draw_image(
            &name,
            rect.x,
            rect.pdf_bottom(self.config.reference_height),
            rect.width,
            rect.height,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Trailer;

    const H: f64 = 841.89;

    #[test]
    fn test_left_top_anchor() {
        let rect = Rect::new(50.0, 100.0, 200.0, 30.0);
        let (x, y) = text_anchor(&rect, H, 80.0, 10.0, -3.0, Alignment::default());
        assert_eq!(x, 50.0);
        assert!((y - (H - 100.0 - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_right_bottom_anchor() {
        let rect = Rect::new(50.0, 100.0, 200.0, 30.0);
        let (x, y) = text_anchor(&rect, H, 80.0, 10.0, -3.0, Alignment::RIGHT | Alignment::BOTTOM);
        assert!((x - 170.0).abs() < 1e-9);
        assert!((y - (H - 130.0 + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_center_middle_anchor() {
        let rect = Rect::new(0.0, 0.0, 100.0, 20.0);
        let (x, y) = text_anchor(&rect, H, 40.0, 10.0, -2.0, Alignment::CENTER | Alignment::MIDDLE);
        assert!((x - 30.0).abs() < 1e-9);
        // Glyph box of 12pt centered in 20pt: 4pt below, baseline 2pt above that
        assert!((y - (H - 20.0 + 4.0 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_wide_text_is_clamped() {
        let rect = Rect::new(10.0, 10.0, 20.0, 5.0);
        let (x, y) = text_anchor(&rect, H, 100.0, 10.0, -3.0, Alignment::RIGHT | Alignment::TOP);
        assert_eq!(x, 10.0);
        assert_eq!(y, rect.pdf_bottom(H));
    }

    #[test]
    fn test_image_injection() {
        let mut doc = Document::new(
            vec![
                IndirectObject::new(1, "<< /Type /Catalog /Pages 2 0 R >>"),
                IndirectObject::new(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                IndirectObject::new(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>"),
                IndirectObject::new(4, "<< /Length 2 >>\nstream\nq\n\nendstream"),
            ],
            Trailer { root: 1, info: None },
        )
        .unwrap();

        let config = EditorConfig::default().with_compression(false);
        let fonts = IndexMap::new();
        let images: HashMap<ImageHandle, u32> = [(ImageHandle(0), 9)].into_iter().collect();
        let placement = PlacementRequest::Image {
            page: 1,
            rect: Rect::new(10.0, 20.0, 100.0, 50.0),
            image: ImageHandle(0),
        };

        Injector::new(&config, &fonts, &images)
            .inject_page(&mut doc, 3, &[&placement], 10, 11)
            .unwrap();

        let page = doc.load_dict(3).unwrap();
        assert_eq!(
            page["Contents"],
            Object::Array(vec![
                Object::reference(10),
                Object::reference(4),
                Object::reference(11)
            ])
        );
        let xobjects = page["Resources"].as_dict().unwrap()["XObject"].as_dict().unwrap();
        assert_eq!(xobjects["InjIm1"], Object::reference(9));

        let content = String::from_utf8_lossy(&doc.get(11).unwrap().payload).to_string();
        assert!(content.contains(&format!(
            "Q\nq\n100 0 0 50 10 {} cm\n/InjIm1 Do\nQ\n",
            crate::writer::format_real(H - 70.0)
        )));
    }

    #[test]
    fn test_unknown_font_in_placement() {
        let mut doc = Document::new(
            vec![
                IndirectObject::new(1, "<< /Type /Catalog /Pages 2 0 R >>"),
                IndirectObject::new(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                IndirectObject::new(3, "<< /Type /Page /Parent 2 0 R >>"),
            ],
            Trailer { root: 1, info: None },
        )
        .unwrap();
        let config = EditorConfig::default();
        let fonts = IndexMap::new();
        let images = HashMap::new();
        let placement = PlacementRequest::Text {
            page: 1,
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            alignment: Alignment::default(),
            text: "x".into(),
            style: TextStyle {
                font: "Foo".into(),
                size: 12.0,
                show_border: false,
            },
        };
        let err = Injector::new(&config, &fonts, &images)
            .inject_page(&mut doc, 3, &[&placement], 10, 11)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFont(name) if name == "Foo"));
    }
}
