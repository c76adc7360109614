//! Image XObjects.
//!
//! Images are represented as XObjects (ISO 32000-1, section 8.9).
//!
//! # Supported Formats
//!
//! - **JPEG**: pass-through embedding with the `DCTDecode` filter
//! - **PNG**: decoded, then Flate-compressed; an alpha channel becomes a
//!   separate `/SMask` image

use super::compress_data;
use crate::document::IndirectObject;
use crate::object::{Dict, Object};
use base64::Engine;

/// Image format for PDF embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG image (DCTDecode filter)
    Jpeg,
    /// PNG image (FlateDecode filter)
    Png,
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Image embedding error.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Neither JPEG nor PNG
    #[error("Unsupported image format")]
    UnsupportedFormat,

    /// Failed to decode image or its base64 wrapping
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    /// Color model with no PDF device color space
    #[error("Unsupported color model: {0}")]
    UnsupportedColor(String),

    /// Failed to compress image data
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// Invalid image data
    #[error("Invalid image data: {0}")]
    InvalidData(String),
}

impl From<ImageError> for crate::error::Error {
    fn from(err: ImageError) -> Self {
        use crate::error::Error;
        match err {
            ImageError::UnsupportedColor(_) | ImageError::CompressionError(_) => {
                Error::ImageBuild(err.to_string())
            },
            _ => Error::Decode(err.to_string()),
        }
    }
}

/// A decoded image ready to be written as one or two XObjects.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bits per component
    pub bits_per_component: u8,
    /// Color space
    pub color_space: ColorSpace,
    /// Source format, which decides the filter
    pub format: ImageFormat,
    /// Encoded sample data (DCT or Flate)
    pub data: Vec<u8>,
    /// Flate-compressed alpha channel
    pub soft_mask: Option<Vec<u8>>,
}

impl ImageData {
    /// Load a JPEG image. The data is embedded without transcoding.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self, ImageError> {
        let (width, height, color_space) = parse_jpeg_header(&data)?;
        Ok(Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            format: ImageFormat::Jpeg,
            data,
            soft_mask: None,
        })
    }

    /// Load a PNG image.
    pub fn from_png(data: &[u8]) -> Result<Self, ImageError> {
        use image::GenericImageView;

        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| ImageError::DecodeError(e.to_string()))?;
        let (width, height) = img.dimensions();

        let (color_space, pixels, alpha) = match img.color() {
            image::ColorType::L8 | image::ColorType::L16 => {
                (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None)
            },
            image::ColorType::La8 | image::ColorType::La16 => {
                let la = img.to_luma_alpha8();
                let (gray, alpha) = split_alpha(la.as_raw(), 1);
                (ColorSpace::DeviceGray, gray, Some(alpha))
            },
            image::ColorType::Rgb8 | image::ColorType::Rgb16 => {
                (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None)
            },
            image::ColorType::Rgba8 | image::ColorType::Rgba16 => {
                let rgba = img.to_rgba8();
                let (rgb, alpha) = split_alpha(rgba.as_raw(), 3);
                (ColorSpace::DeviceRGB, rgb, Some(alpha))
            },
            other => return Err(ImageError::UnsupportedColor(format!("{:?}", other))),
        };

        let compress =
            |bytes: &[u8]| compress_data(bytes).map_err(|e| ImageError::CompressionError(e.to_string()));

        Ok(Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            format: ImageFormat::Png,
            data: compress(&pixels)?,
            soft_mask: alpha.map(|a| compress(&a)).transpose()?,
        })
    }

    /// Load an image from raw bytes, detecting the format from its magic
    /// number.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ImageError> {
        if data.starts_with(&[0xFF, 0xD8]) {
            return Self::from_jpeg(data.to_vec());
        }
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Self::from_png(data);
        }
        Err(ImageError::UnsupportedFormat)
    }

    /// Load an image from standard base64, with or without a
    /// `data:image/...;base64,` prefix.
    pub fn from_base64(encoded: &str) -> Result<Self, ImageError> {
        let payload = match encoded.trim_start().strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, data)| data)
                .ok_or_else(|| ImageError::DecodeError("data URI without ','".into()))?,
            None => encoded,
        };
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| ImageError::DecodeError(format!("base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Number of indirect objects this image needs: one, plus one for a
    /// soft mask.
    pub fn object_count(&self) -> u32 {
        if self.soft_mask.is_some() {
            2
        } else {
            1
        }
    }

    /// Write the image as object `id`, and its soft mask as `id + 1`.
    pub fn build_objects(&self, id: u32) -> Vec<IndirectObject> {
        let mut dict = self.base_dict(self.color_space, self.data.len());
        match self.format {
            ImageFormat::Jpeg => {
                dict.insert("Filter".into(), Object::name("DCTDecode"));
            },
            ImageFormat::Png => {
                dict.insert("Filter".into(), Object::name("FlateDecode"));
            },
        }

        let mut objects = Vec::with_capacity(self.object_count() as usize);
        if let Some(mask) = &self.soft_mask {
            dict.insert("SMask".into(), Object::reference(id + 1));
            let mut mask_dict = self.base_dict(ColorSpace::DeviceGray, mask.len());
            mask_dict.insert("Filter".into(), Object::name("FlateDecode"));
            let mask_obj = Object::Stream {
                dict: mask_dict,
                data: mask.clone().into(),
            };
            objects.push(IndirectObject::from_object(id + 1, &mask_obj));
        }

        let image = Object::Stream {
            dict,
            data: self.data.clone().into(),
        };
        objects.insert(0, IndirectObject::from_object(id, &image));
        objects
    }

    fn base_dict(&self, color_space: ColorSpace, length: usize) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Type".into(), Object::name("XObject"));
        dict.insert("Subtype".into(), Object::name("Image"));
        dict.insert("Width".into(), Object::Integer(self.width as i64));
        dict.insert("Height".into(), Object::Integer(self.height as i64));
        dict.insert("ColorSpace".into(), Object::name(color_space.pdf_name()));
        dict.insert(
            "BitsPerComponent".into(),
            Object::Integer(self.bits_per_component as i64),
        );
        dict.insert("Length".into(), Object::Integer(length as i64));
        dict
    }
}

/// Split interleaved samples with a trailing alpha byte into color and
/// alpha planes.
fn split_alpha(samples: &[u8], color_components: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = color_components + 1;
    let pixels = samples.len() / stride;
    let mut color = Vec::with_capacity(pixels * color_components);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in samples.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..color_components]);
        alpha.push(pixel[color_components]);
    }
    (color, alpha)
}

/// Parse JPEG header to extract dimensions and color space.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, ColorSpace), ImageError> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(ImageError::InvalidData("Not a valid JPEG".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        pos += 2;

        // Fill bytes and stuffed zeros
        if marker == 0xFF || marker == 0x00 {
            continue;
        }

        // SOF markers, excluding DHT (C4), JPG (C8) and DAC (CC)
        if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            if pos + 8 > data.len() {
                return Err(ImageError::InvalidData("Truncated JPEG header".to_string()));
            }
            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let color_space = match data[pos + 7] {
                1 => ColorSpace::DeviceGray,
                3 => ColorSpace::DeviceRGB,
                4 => ColorSpace::DeviceCMYK,
                n => {
                    return Err(ImageError::UnsupportedColor(format!(
                        "JPEG with {} components",
                        n
                    )))
                },
            };
            return Ok((width, height, color_space));
        }

        if pos + 2 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += length;
    }

    Err(ImageError::InvalidData("Could not find JPEG dimensions".to_string()))
}
