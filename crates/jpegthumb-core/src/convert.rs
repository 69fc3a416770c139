//! Extraction of pixel blocks from a decoded buffer.
//!
//! A block is a caller-chosen rectangle of the current view, copied into a
//! fresh allocation in one of the [`ColorSpace`] layouts. The source pixels
//! are whatever the codec produced for the layout's decode family: one byte
//! for gray, three for YCbCr or RGB, four for CMYK.
//!
//! | layout   | bytes | written from source pixel `s`          |
//! |----------|-------|-----------------------------------------|
//! | `Gray8`  | 1     | `s0`                                    |
//! | `Yuv8`   | 3     | `s0 s1 s2`                              |
//! | `Rgb8`   | 3     | `s0 s1 s2`                              |
//! | `Bgr8`   | 3     | `s2 s1 s0`                              |
//! | `Rgba8`  | 4     | `s0 s1 s2 FF`                           |
//! | `Bgra8`  | 4     | `FF s2 s1 s0`                           |
//! | `Argb32` | 4     | `0xFF000000 + (s0 << 16) + (s1 << 8) + s2`, native endian |
//! | `Cmyk`   | 4     | `s0 s1 s2 FF`                           |
//!
//! One-component sources feed `s0` to all three colour channels, except
//! `Yuv8`, which writes `s0 128 128` (neutral chroma).

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{ColorSpace, PixelBuffer};

/// Errors that can occur while extracting a block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The requested rectangle does not overlap the image.
    #[error("Requested region is empty after clamping")]
    EmptyRegion,

    /// The block allocation could not be reserved.
    #[error("Out of memory while extracting pixels")]
    OutOfMemory,
}

/// A requested rectangle, possibly extending past the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A rectangle known to lie inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampedRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// A run past the far edge is cut at the edge. A negative origin moves to
    /// zero and the run loses the overhang twice: once for the move and once
    /// for the left padding, which is never materialised. Returns `None` when
    /// nothing is left.
    pub fn clamp(self, width: u32, height: u32) -> Option<ClampedRegion> {
        let (x, w) = clamp_axis(self.x, self.width, width)?;
        let (y, h) = clamp_axis(self.y, self.height, height)?;
        Some(ClampedRegion {
            x,
            y,
            width: w,
            height: h,
        })
    }
}

fn clamp_axis(origin: i32, len: i32, extent: u32) -> Option<(u32, u32)> {
    let (origin, extent) = (origin as i64, extent as i64);
    let mut run = len as i64;
    if origin + run > extent {
        run = extent - origin;
    }
    if origin < 0 {
        run += 2 * origin;
    }
    (run > 0).then(|| (origin.max(0) as u32, run as u32))
}

/// An extracted, caller-owned block of pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBlock {
    width: u32,
    height: u32,
    layout: ColorSpace,
    data: Vec<u8>,
}

impl PixelBlock {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layout of [`PixelBlock::data`].
    pub fn layout(&self) -> ColorSpace {
        self.layout
    }

    /// Tightly packed pixel bytes, `width * height * bytes_per_pixel` long.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Read an `Argb32` block as one word per pixel.
    ///
    /// Returns `None` for every other layout.
    pub fn argb_words(&self) -> Option<Vec<u32>> {
        (self.layout == ColorSpace::Argb32).then(|| {
            self.data
                .chunks_exact(4)
                .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
    }

    /// Convert into an `image` crate buffer.
    ///
    /// Only `Gray8`, `Rgb8` and `Rgba8` have a direct counterpart; other
    /// layouts return `None`.
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        let (w, h, data) = (self.width, self.height, self.data.clone());
        match self.layout {
            ColorSpace::Gray8 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            ColorSpace::Rgb8 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            ColorSpace::Rgba8 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            _ => None,
        }
    }
}

type PixelFn = fn(&[u8], &mut [u8]);

/// Cb and Cr of a colourless pixel.
const NEUTRAL_CHROMA: u8 = 128;

#[inline]
fn channels(s: &[u8]) -> (u8, u8, u8) {
    if s.len() >= 3 {
        (s[0], s[1], s[2])
    } else {
        (s[0], s[0], s[0])
    }
}

fn to_gray8(s: &[u8], d: &mut [u8]) {
    d[0] = s[0];
}

fn to_packed3(s: &[u8], d: &mut [u8]) {
    let (c0, c1, c2) = channels(s);
    d.copy_from_slice(&[c0, c1, c2]);
}

fn to_yuv8(s: &[u8], d: &mut [u8]) {
    if s.len() >= 3 {
        d.copy_from_slice(&s[..3]);
    } else {
        d.copy_from_slice(&[s[0], NEUTRAL_CHROMA, NEUTRAL_CHROMA]);
    }
}

fn to_bgr8(s: &[u8], d: &mut [u8]) {
    let (c0, c1, c2) = channels(s);
    d.copy_from_slice(&[c2, c1, c0]);
}

fn to_opaque4(s: &[u8], d: &mut [u8]) {
    let (c0, c1, c2) = channels(s);
    d.copy_from_slice(&[c0, c1, c2, 0xFF]);
}

fn to_bgra8(s: &[u8], d: &mut [u8]) {
    let (c0, c1, c2) = channels(s);
    d.copy_from_slice(&[0xFF, c2, c1, c0]);
}

fn to_argb32(s: &[u8], d: &mut [u8]) {
    let (c0, c1, c2) = channels(s);
    let word = 0xFF00_0000 | (c0 as u32) << 16 | (c1 as u32) << 8 | c2 as u32;
    d.copy_from_slice(&word.to_ne_bytes());
}

fn gray_to_rgb(s: &[u8], d: &mut [u8]) {
    d.copy_from_slice(&[s[0], s[0], s[0]]);
}

fn copy_rgb(s: &[u8], d: &mut [u8]) {
    d.copy_from_slice(&s[..3]);
}

fn weighted_to_rgb(s: &[u8], d: &mut [u8]) {
    let alpha = s[3] as u32;
    for (out, &channel) in d.iter_mut().zip(&s[..3]) {
        *out = (channel as u32 * alpha / 255).min(255) as u8;
    }
}

/// Copy a region of `buffer` into a new block in `layout`.
///
/// # Errors
///
/// Returns `ConvertError::EmptyRegion` if the region does not overlap the
/// view and `ConvertError::OutOfMemory` if the block cannot be allocated.
pub fn extract(
    buffer: &PixelBuffer,
    region: Region,
    layout: ColorSpace,
) -> Result<PixelBlock, ConvertError> {
    let convert: PixelFn = match layout {
        ColorSpace::Gray8 => to_gray8,
        ColorSpace::Yuv8 => to_yuv8,
        ColorSpace::Rgb8 => to_packed3,
        ColorSpace::Bgr8 => to_bgr8,
        ColorSpace::Rgba8 | ColorSpace::Cmyk => to_opaque4,
        ColorSpace::Bgra8 => to_bgra8,
        ColorSpace::Argb32 => to_argb32,
    };
    extract_with(buffer, region, layout, convert)
}

/// Copy a region of `buffer` into a new `Rgb8` block, whatever was decoded.
///
/// Gray sources are replicated into all three channels. Four-component
/// sources are weighted by their last component:
/// `d = min(255, s * s3 / 255)` per channel.
pub fn extract_rgb(buffer: &PixelBuffer, region: Region) -> Result<PixelBlock, ConvertError> {
    let convert: PixelFn = match buffer.components() {
        1 => gray_to_rgb,
        3 => copy_rgb,
        _ => weighted_to_rgb,
    };
    extract_with(buffer, region, ColorSpace::Rgb8, convert)
}

fn extract_with(
    buffer: &PixelBuffer,
    region: Region,
    layout: ColorSpace,
    convert: PixelFn,
) -> Result<PixelBlock, ConvertError> {
    let area = region
        .clamp(buffer.width(), buffer.height())
        .ok_or(ConvertError::EmptyRegion)?;

    let bpp = layout.bytes_per_pixel();
    let components = buffer.components();
    let row_len = area.width as usize * bpp;
    let len = row_len * area.height as usize;

    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| ConvertError::OutOfMemory)?;
    data.resize(len, 0u8);

    for (dy, dst_row) in data.chunks_exact_mut(row_len).enumerate() {
        let row = buffer.row(area.y + dy as u32);
        let start = area.x as usize * components;
        let src_row = &row[start..start + area.width as usize * components];
        for (s, d) in src_row
            .chunks_exact(components)
            .zip(dst_row.chunks_exact_mut(bpp))
        {
            convert(s, d);
        }
    }

    Ok(PixelBlock {
        width: area.width,
        height: area.height,
        layout,
        data,
    })
}


// ============================================================================
// Property-Based Tests
// ============================================================================
