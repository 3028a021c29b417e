//! Mask payload codec.
//!
//! Every mask crossing a boundary is an [`InlineImage`]: a MIME tag plus raw
//! bytes, rendered as a `data:` URL for upload bodies and inline display.
//! Locally drawn masks, segmentation output and persisted masks all decode
//! to the same [`MaskBitmap`] coverage representation.

use crate::editor::error::DecodeError;
use crate::editor::surface::CanvasSurface;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, GrayImage, ImageEncoder, ImageFormat, Luma};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";
const DEFAULT_MIME: &str = "image/png";
/// Luma at or above which an opaque decoded pixel counts as covered.
const COVERAGE_LUMA_THRESHOLD: u32 = 128;
const COVERAGE_ALPHA_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    mime: String,
    bytes: Vec<u8>,
}

pub type MaskImage = InlineImage;

impl InlineImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Wrap raw image bytes, sniffing the MIME type from their header.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(mime_for_format)
            .unwrap_or(DEFAULT_MIME);
        Self::new(mime, bytes)
    }

    /// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(DecodeError::new("empty payload"));
        }

        if let Some(rest) = payload.strip_prefix(DATA_URL_PREFIX) {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| DecodeError::new("data URL without a payload separator"))?;
            let Some(mime) = header.strip_suffix(BASE64_MARKER) else {
                return Err(DecodeError::new("data URL is not base64 encoded"));
            };
            let bytes = decode_base64(data)?;
            let mime = if mime.is_empty() {
                sniff_mime(&bytes)
            } else {
                mime
            };
            return Ok(Self::new(mime, bytes));
        }

        let bytes = decode_base64(payload)?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}{BASE64_MARKER},{}", self.mime, self.to_base64())
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(DecodeError::new("empty base64 payload"));
    }
    general_purpose::STANDARD
        .decode(&compact)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(&compact))
        .map_err(|err| DecodeError::new(format!("invalid base64: {err}")))
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(mime_for_format)
        .unwrap_or(DEFAULT_MIME)
}

fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Decoded coverage at the payload's native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskBitmap {
    width: u32,
    height: u32,
    coverage: Vec<bool>,
}

impl MaskBitmap {
    /// Row-major coverage; the length must be `width * height`.
    pub fn new(width: u32, height: u32, coverage: Vec<bool>) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize;
        if coverage.len() != expected {
            return Err(DecodeError::new(format!(
                "coverage has {} cells, {width}x{height} needs {expected}",
                coverage.len()
            )));
        }
        Ok(Self {
            width,
            height,
            coverage,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn coverage(&self) -> &[bool] {
        &self.coverage
    }

    pub fn covered_count(&self) -> usize {
        self.coverage.iter().filter(|c| **c).count()
    }

    /// Nearest-neighbour rescale so hard mask edges stay binary.
    pub fn scaled_to(&self, width: u32, height: u32) -> MaskBitmap {
        if self.width == width && self.height == height {
            return self.clone();
        }
        let gray = GrayImage::from_fn(self.width, self.height, |x, y| {
            let covered = self.coverage[(y * self.width + x) as usize];
            Luma([if covered { 255 } else { 0 }])
        });
        let resized = image::imageops::resize(&gray, width, height, FilterType::Nearest);
        MaskBitmap {
            width,
            height,
            coverage: resized.pixels().map(|px| px.0[0] >= 128).collect(),
        }
    }
}

/// Encode the surface as a PNG mask payload.
pub fn encode(surface: &CanvasSurface) -> Result<MaskImage, image::ImageError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        surface.pixels(),
        surface.width(),
        surface.height(),
        ColorType::Rgba8,
    )?;
    Ok(InlineImage::new(DEFAULT_MIME, bytes))
}

/// Decode any supported payload into coverage. A pixel is covered when it is
/// opaque enough and bright enough, which matches both transparent-background
/// masks drawn here and black/white masks returned by segmentation.
pub fn decode(mask: &MaskImage) -> Result<MaskBitmap, DecodeError> {
    let decoded = image::load_from_memory(mask.bytes())
        .map_err(|err| DecodeError::new(format!("{} payload: {err}", mask.mime())))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::new("image has no pixels"));
    }

    let coverage = rgba
        .pixels()
        .map(|px| {
            let [r, g, b, a] = px.0;
            let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
            a >= COVERAGE_ALPHA_THRESHOLD && luma >= COVERAGE_LUMA_THRESHOLD
        })
        .collect();

    Ok(MaskBitmap {
        width,
        height,
        coverage,
    })
}

/// Replace the surface content with `mask`. Nothing is written unless the
/// whole payload decodes.
pub fn draw(surface: &mut CanvasSurface, mask: &MaskImage) -> Result<(), DecodeError> {
    let bitmap = decode(mask)?;
    draw_bitmap(surface, &bitmap);
    Ok(())
}

pub fn draw_bitmap(surface: &mut CanvasSurface, bitmap: &MaskBitmap) {
    let scaled = bitmap.scaled_to(surface.width(), surface.height());
    surface.replace_with_coverage(&scaled.coverage);
}
