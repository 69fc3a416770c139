//! Core types for scaled decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::ProvenanceRecord;

/// Error types for header parsing and decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not a JPEG stream.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The codec reported a fatal error while reading the stream.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The header declares a size too small to thumbnail.
    #[error("Degenerate image dimensions: {width}x{height}")]
    DegenerateDimensions { width: u32, height: u32 },

    /// The pixel allocation could not be reserved.
    #[error("Out of memory during decoding")]
    OutOfMemory,

    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Pixel layouts an image can be decoded into and extracted as.
///
/// Each layout implies the colour space the codec decodes to (see
/// [`ColorSpace::decode_family`]) and the byte order of extracted pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    /// One luma byte per pixel.
    Gray8,
    /// Packed Y, Cb, Cr.
    Yuv8,
    /// Packed R, G, B.
    #[default]
    Rgb8,
    /// Packed B, G, R.
    Bgr8,
    /// Packed R, G, B with an opaque alpha byte.
    Rgba8,
    /// Opaque alpha byte followed by B, G, R.
    Bgra8,
    /// One native-endian `0xAARRGGBB` word per pixel.
    Argb32,
    /// Four channel CMYK passthrough.
    Cmyk,
}

impl ColorSpace {
    /// Every layout, in index order.
    pub const ALL: [ColorSpace; 8] = [
        ColorSpace::Gray8,
        ColorSpace::Yuv8,
        ColorSpace::Rgb8,
        ColorSpace::Bgr8,
        ColorSpace::Rgba8,
        ColorSpace::Bgra8,
        ColorSpace::Argb32,
        ColorSpace::Cmyk,
    ];

    /// Look up a layout by its index in [`ColorSpace::ALL`].
    ///
    /// Returns `None` for out-of-range indices.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Size of one extracted pixel in bytes.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorSpace::Gray8 => 1,
            ColorSpace::Yuv8 | ColorSpace::Rgb8 | ColorSpace::Bgr8 => 3,
            ColorSpace::Rgba8 | ColorSpace::Bgra8 | ColorSpace::Argb32 | ColorSpace::Cmyk => 4,
        }
    }

    /// The colour space the codec must decode to for this layout.
    ///
    /// All RGB-ordered layouts share an RGB decode; the reordering and alpha
    /// synthesis happen at extraction time.
    pub fn decode_family(self) -> ColorSpace {
        match self {
            ColorSpace::Gray8 => ColorSpace::Gray8,
            ColorSpace::Yuv8 => ColorSpace::Yuv8,
            ColorSpace::Rgb8
            | ColorSpace::Bgr8
            | ColorSpace::Rgba8
            | ColorSpace::Bgra8
            | ColorSpace::Argb32 => ColorSpace::Rgb8,
            ColorSpace::Cmyk => ColorSpace::Cmyk,
        }
    }

    /// Number of components the codec writes per pixel for this layout's
    /// decode family.
    pub fn decoded_components(self) -> usize {
        match self.decode_family() {
            ColorSpace::Gray8 => 1,
            ColorSpace::Cmyk => 4,
            _ => 3,
        }
    }
}

/// IDCT method used by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdctMethod {
    /// Fast integer IDCT, used for thumbnails.
    #[default]
    Fast,
    /// Accurate integer IDCT, used for the trim workflow.
    Accurate,
}

/// Information read from a JPEG header before any pixel is decoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Colour space detected from the stream.
    pub color_space: ColorSpace,
    /// Number of components in the stream.
    pub components: usize,
    /// Horizontal and vertical sampling factors per component.
    pub sampling_factors: Vec<(u8, u8)>,
    /// Text of the first COM marker.
    pub comment: Option<String>,
    /// Thumbnail provenance carried in an APP7 marker.
    pub provenance: Option<ProvenanceRecord>,
}

impl SourceInfo {
    /// Returns true when every component is sampled 1x1, i.e. chroma is
    /// stored at full resolution.
    pub fn is_unsubsampled(&self) -> bool {
        self.sampling_factors.iter().all(|&(h, v)| h == 1 && v == 1)
    }
}

/// A decoded pixel allocation and the view that locates rows inside it.
///
/// The allocation is made once and never resized. Resampling compacts pixels
/// towards its front and cropping moves the view origin, so rows are always
/// found through [`PixelBuffer::row`] rather than by striding the raw data.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub(crate) data: Vec<u8>,
    pub(crate) color_space: ColorSpace,
    pub(crate) components: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) stride: usize,
    pub(crate) origin: usize,
}

impl PixelBuffer {
    /// Wrap tightly packed pixel data in `color_space`'s decode family.
    ///
    /// Returns `None` if `data` is not exactly
    /// `width * height * decoded_components` bytes long.
    pub fn from_raw(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        data: Vec<u8>,
    ) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(color_space.decoded_components())?;
        (data.len() == expected).then(|| Self::new(width, height, color_space, data))
    }

    /// Wrap data whose length the caller has already checked.
    pub(crate) fn new(width: u32, height: u32, color_space: ColorSpace, data: Vec<u8>) -> Self {
        let components = color_space.decoded_components();
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * components,
            "Pixel buffer size mismatch"
        );
        Self {
            data,
            color_space: color_space.decode_family(),
            components,
            width,
            height,
            stride: width as usize * components,
            origin: 0,
        }
    }

    /// Width of the current view in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the current view in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decode family of the stored pixels.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Bytes per stored pixel.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Distance in bytes between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel bytes of row `y` of the current view.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = self.origin + y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.components]
    }

    /// Rows of the current view, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.height).map(move |y| self.row(y))
    }

    /// Component bytes of the pixel at `(x, y)` in the current view.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = x as usize * self.components;
        &self.row(y)[start..start + self.components]
    }

    /// Size of the underlying allocation in bytes.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Check if the view covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
