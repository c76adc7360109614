//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::fmt::Write as _;

/// TrueType program used across tests.
pub const FONT: &[u8] = include_bytes!("../fixtures/DejaVuSansMono.ttf");

/// Route `log` output through the test harness.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Minimal classic PDF writer for test inputs.
pub struct PdfBuilder {
    objects: Vec<(u32, String)>,
    root: u32,
    info: Option<u32>,
}

impl PdfBuilder {
    pub fn new(root: u32) -> Self {
        Self {
            objects: Vec::new(),
            root,
            info: None,
        }
    }

    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.push((id, body.to_string()));
        self
    }

    pub fn stream(self, id: u32, content: &str) -> Self {
        let body = format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content);
        self.object(id, &body)
    }

    pub fn info(mut self, id: u32) -> Self {
        self.info = Some(id);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (id, body) in &self.objects {
            offsets.push((*id, out.len()));
            write!(out, "{} 0 obj\n{}\nendobj\n", id, body).unwrap();
        }

        let size = self.objects.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;
        let xref = out.len();
        write!(out, "xref\n0 {}\n", size).unwrap();
        for id in 0..size {
            match offsets.iter().find(|(obj, _)| *obj == id) {
                Some((_, offset)) => write!(out, "{:010} 00000 n \n", offset).unwrap(),
                None => out.push_str("0000000000 65535 f \n"),
            }
        }
        write!(out, "trailer\n<< /Size {} /Root {} 0 R", size, self.root).unwrap();
        if let Some(info) = self.info {
            write!(out, " /Info {} 0 R", info).unwrap();
        }
        write!(out, " >>\nstartxref\n{}\n%%EOF\n", xref).unwrap();
        out.into_bytes()
    }
}

/// A document with `pages` pages, each with its own content stream and a
/// shared Helvetica resource, plus an `/Info` dictionary.
///
/// Object layout: 1 catalog, 2 page tree, 3 info, 4 font, then page `n`
/// (1-based) at `3 + 2n` with its content at `4 + 2n`.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (1..=pages).map(|n| format!("{} 0 R", 3 + 2 * n)).collect();
    let mut builder = PdfBuilder::new(1)
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages),
        )
        .object(3, "<< /Title (Sample form) /Producer (tests) >>")
        .object(4, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
        .info(3);
    for n in 1..=pages {
        let page_id = 3 + 2 * n as u32;
        builder = builder
            .object(
                page_id,
                &format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595.28 841.89] \
                     /Resources << /Font << /F1 4 0 R >> >> /Contents {} 0 R >>",
                    page_id + 1
                ),
            )
            .stream(
                page_id + 1,
                &format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", n),
            );
    }
    builder.build()
}

/// Object id of 1-based page `n` in [`sample_pdf`].
pub fn page_object(n: usize) -> u32 {
    3 + 2 * n as u32
}

/// Small RGBA PNG with a transparent pixel.
pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = image::RgbaImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let alpha = if x == 0 && y == 0 { 0 } else { 255 };
        *pixel = image::Rgba([(x * 40) as u8, (y * 40) as u8, 128, alpha]);
    }
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Body of object `id` in serialized PDF bytes.
pub fn object_body(pdf: &[u8], id: u32) -> Option<Vec<u8>> {
    let header = format!("\n{} 0 obj\n", id);
    let start = find(pdf, header.as_bytes())? + header.len();
    let end = start + find(&pdf[start..], b"\nendobj\n")?;
    Some(pdf[start..end].to_vec())
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `startxref` value of serialized PDF bytes.
pub fn startxref(pdf: &[u8]) -> usize {
    let text = String::from_utf8_lossy(pdf);
    text.rsplit("startxref\n")
        .next()
        .and_then(|tail| tail.lines().next())
        .and_then(|n| n.trim().parse().ok())
        .unwrap()
}
