//! Deterministic bitmap transforms applied after background removal.
//!
//! The sprite chain is always trim -> square -> nearest-neighbor resize:
//!
//! 1. [`trim_transparent`] crops to the bounding box of non-transparent
//!    pixels, plus a padding margin clamped to the image bounds.
//! 2. [`make_square`] centers the result on a transparent square canvas.
//! 3. [`resize_nearest`] scales to the target size without any smoothing,
//!    so every output pixel is a copy of exactly one source pixel.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::CoreError;

/// Fully transparent pixel used for padding canvases.
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Pixel-space rectangle. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Grow by `padding` on every side, clamped to `width` x `height`.
    pub fn expand_clamped(&self, padding: u32, width: u32, height: u32) -> Self {
        Self {
            left: self.left.saturating_sub(padding),
            top: self.top.saturating_sub(padding),
            right: self.right.saturating_add(padding).min(width),
            bottom: self.bottom.saturating_add(padding).min(height),
        }
    }
}

/// Tight bounding box of all pixels with alpha > 0, or `None` when the
/// image is fully transparent.
pub fn alpha_bounding_box(img: &RgbaImage) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bbox = Some(match bbox {
            None => BoundingBox {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            },
            Some(b) => BoundingBox {
                left: b.left.min(x),
                top: b.top.min(y),
                right: b.right.max(x + 1),
                bottom: b.bottom.max(y + 1),
            },
        });
    }

    bbox
}

/// Crop to the non-transparent content plus `padding` pixels per side.
///
/// A fully transparent image is returned as-is.
pub fn trim_transparent(img: RgbaImage, padding: u32) -> RgbaImage {
    let Some(bbox) = alpha_bounding_box(&img) else {
        return img;
    };
    let crop = bbox.expand_clamped(padding, img.width(), img.height());
    image::imageops::crop_imm(&img, crop.left, crop.top, crop.width(), crop.height()).to_image()
}

/// Center `img` on a transparent `s x s` canvas where `s = max(w, h)`.
///
/// Offsets use floor division, so an odd leftover pixel ends up in the
/// right/bottom margin.
pub fn make_square(img: RgbaImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width == height {
        return img;
    }

    let size = width.max(height);
    let mut canvas = RgbaImage::from_pixel(size, size, TRANSPARENT);
    let x = (size - width) / 2;
    let y = (size - height) / 2;
    image::imageops::replace(&mut canvas, &img, i64::from(x), i64::from(y));
    canvas
}

/// Nearest-neighbor resize to `size x size`.
///
/// Output pixel `(x, y)` copies source pixel
/// `(floor((x + 0.5) * w / size), floor((y + 0.5) * h / size))`.
pub fn resize_nearest(img: &RgbaImage, size: u32) -> Result<RgbaImage, CoreError> {
    if size == 0 {
        return Err(CoreError::Validation(
            "Target size must be greater than 0".to_string(),
        ));
    }
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Cannot resize an empty image".to_string(),
        ));
    }

    Ok(RgbaImage::from_fn(size, size, |x, y| {
        let sx = nearest_source(x, size, width);
        let sy = nearest_source(y, size, height);
        *img.get_pixel(sx, sy)
    }))
}

/// Source coordinate sampled by output coordinate `dst` when scaling
/// `src_len` pixels to `dst_len` pixels.
fn nearest_source(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let scaled = (2 * u64::from(dst) + 1) * u64::from(src_len) / (2 * u64::from(dst_len));
    (scaled as u32).min(src_len - 1)
}

/// Trim with `padding`, then square. Runs once per job; the result feeds
/// every [`resize_nearest`] call.
pub fn prepare_sprite(img: RgbaImage, padding: u32) -> RgbaImage {
    make_square(trim_transparent(img, padding))
}

/// Decode any supported format into 8-bit RGBA.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode an RGBA bitmap as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
