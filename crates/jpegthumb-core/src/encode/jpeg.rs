//! JPEG encoding of decoded thumbnails.
//!
//! This module drives the codec's compressor over rows of a pixel view. It
//! applies the quality setting, disables chroma subsampling for high quality
//! output and writes the optional comment and provenance markers.

use std::io::Write;

use mozjpeg::{Compress, Marker};
use thiserror::Error;
use tracing::debug;

use crate::codec::{codec_color_space, run_guarded};
use crate::decode::{ColorSpace, PixelBuffer};
use crate::metadata::{ProvenanceRecord, PROVENANCE_APP_MARKER};

/// Quality at and above which chroma is stored at full resolution.
pub const FULL_CHROMA_QUALITY: u8 = 90;

/// Quality used when none is configured.
pub const DEFAULT_QUALITY: u8 = 75;

/// Largest marker payload; the two length bytes count towards the 16-bit size.
pub const MAX_MARKER_PAYLOAD: usize = 65533;

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// A comment or provenance payload does not fit in one marker
    #[error("{marker} marker payload too long: {len} bytes, at most 65533")]
    MarkerTooLong { marker: &'static str, len: usize },

    /// No output file or memory destination was configured
    #[error("No output destination configured")]
    NoDestination,

    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),

    /// Writing the destination failed
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Settings applied to one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// JPEG quality (0-100). Values above 100 are clamped.
    pub quality: u8,
    /// Text written verbatim into a COM marker.
    pub comment: Option<String>,
    /// Record written into an APP7 marker.
    pub provenance: Option<ProvenanceRecord>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            comment: None,
            provenance: None,
        }
    }
}

/// Encode tightly packed pixel data to JPEG bytes.
///
/// # Arguments
///
/// * `pixels` - Row-major pixel data in `color_space`'s decode family
///   (1 byte per pixel for gray, 3 for YCbCr/RGB, 4 for CMYK)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `color_space` - Layout of `pixels`
/// * `options` - Quality and markers
///
/// # Returns
///
/// JPEG-encoded bytes on success, or an error if encoding fails.
///
/// # Quality Guidelines
///
/// * 90-100: chroma kept at full resolution, suitable for further editing
/// * 70-90: good thumbnails (default: 75)
/// * Below 60: visible artifacts
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    color_space: ColorSpace,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let row_len = width as usize * color_space.decoded_components();
    let expected = row_len * height as usize;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }

    write_rows(
        Vec::new(),
        pixels.chunks_exact(row_len),
        width,
        height,
        color_space,
        options,
    )
}

/// Encode the current view of a decoded buffer into `writer`.
///
/// Rows are taken through [`PixelBuffer::row`], so resampled and cropped
/// views encode at their own size.
pub fn encode_buffer<W: Write>(
    writer: W,
    buffer: &PixelBuffer,
    options: &EncodeOptions,
) -> Result<W, EncodeError> {
    if buffer.is_empty() {
        return Err(EncodeError::InvalidDimensions {
            width: buffer.width(),
            height: buffer.height(),
        });
    }

    write_rows(
        writer,
        buffer.rows(),
        buffer.width(),
        buffer.height(),
        buffer.color_space(),
        options,
    )
}

fn write_rows<'a, W: Write>(
    writer: W,
    rows: impl Iterator<Item = &'a [u8]>,
    width: u32,
    height: u32,
    color_space: ColorSpace,
    options: &EncodeOptions,
) -> Result<W, EncodeError> {
    let comment = options.comment.as_deref().map(str::as_bytes);
    let provenance = options.provenance.as_ref().map(ProvenanceRecord::to_marker_bytes);
    for (marker, payload) in [("COM", comment), ("APP7", provenance.as_deref())] {
        if let Some(len) = payload.map(<[u8]>::len).filter(|&len| len > MAX_MARKER_PAYLOAD) {
            return Err(EncodeError::MarkerTooLong { marker, len });
        }
    }

    let quality = options.quality.min(100);
    let full_chroma = quality >= FULL_CHROMA_QUALITY;

    debug!(
        width,
        height,
        quality,
        full_chroma,
        color_space = ?color_space.decode_family(),
        "encode"
    );

    run_guarded(
        || {
            let mut compress = Compress::new(codec_color_space(color_space));
            compress.set_size(width as usize, height as usize);
            compress.set_quality(quality as f32);

            if full_chroma {
                for component in compress.components_mut() {
                    component.h_samp_factor = 1;
                    component.v_samp_factor = 1;
                }
            }

            let mut started = compress
                .start_compress(writer)
                .map_err(|e| EncodeError::IoError(e.to_string()))?;

            if let Some(comment) = comment {
                started.write_marker(Marker::COM, comment);
            }
            if let Some(record) = &provenance {
                started.write_marker(Marker::APP(PROVENANCE_APP_MARKER), record);
            }

            for row in rows {
                started
                    .write_scanlines(row)
                    .map_err(|e| EncodeError::IoError(e.to_string()))?;
            }

            started
                .finish()
                .map_err(|e| EncodeError::IoError(e.to_string()))
        },
        EncodeError::EncodingFailed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::read_header;

    fn gradient_rgb(width: usize, height: usize) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(128u8);
            }
        }
        pixels
    }

    fn with_quality(quality: u8) -> EncodeOptions {
        EncodeOptions {
            quality,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_jpeg_basic() {
        let pixels = vec![128u8; 100 * 100 * 3];

        let jpeg_bytes = encode_jpeg(&pixels, 100, 100, ColorSpace::Rgb8, &with_quality(90))
            .unwrap();

        // Check JPEG magic bytes (SOI marker)
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);

        // Check JPEG ends with EOI marker
        let len = jpeg_bytes.len();
        assert_eq!(&jpeg_bytes[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_high_quality_disables_subsampling() {
        let pixels = gradient_rgb(64, 64);
        let jpeg = encode_jpeg(&pixels, 64, 64, ColorSpace::Rgb8, &with_quality(95)).unwrap();

        let info = read_header(&jpeg).unwrap();
        assert_eq!(info.sampling_factors, vec![(1, 1), (1, 1), (1, 1)]);
        assert!(info.is_unsubsampled());
    }

    #[test]
    fn test_threshold_quality_disables_subsampling() {
        let pixels = gradient_rgb(32, 32);
        let jpeg = encode_jpeg(&pixels, 32, 32, ColorSpace::Rgb8, &with_quality(90)).unwrap();

        assert!(read_header(&jpeg).unwrap().is_unsubsampled());
    }

    #[test]
    fn test_low_quality_keeps_subsampling() {
        let pixels = gradient_rgb(64, 64);
        let jpeg = encode_jpeg(&pixels, 64, 64, ColorSpace::Rgb8, &with_quality(75)).unwrap();

        let info = read_header(&jpeg).unwrap();
        assert!(!info.is_unsubsampled());
        assert_eq!(info.sampling_factors[0], (2, 2));
    }

    #[test]
    fn test_encode_quality_affects_size() {
        let pixels = gradient_rgb(100, 100);

        let low_q = encode_jpeg(&pixels, 100, 100, ColorSpace::Rgb8, &with_quality(20)).unwrap();
        let high_q = encode_jpeg(&pixels, 100, 100, ColorSpace::Rgb8, &with_quality(95)).unwrap();

        assert!(high_q.len() > low_q.len());
    }

    #[test]
    fn test_encode_quality_clamping() {
        let pixels = vec![128u8; 10 * 10 * 3];

        assert!(encode_jpeg(&pixels, 10, 10, ColorSpace::Rgb8, &with_quality(0)).is_ok());
        assert!(encode_jpeg(&pixels, 10, 10, ColorSpace::Rgb8, &with_quality(255)).is_ok());
    }

    #[test]
    fn test_encode_writes_markers() {
        let options = EncodeOptions {
            comment: Some("made by a test".to_string()),
            provenance: Some(ProvenanceRecord {
                mimetype: Some("image/jpeg".to_string()),
                height: Some(3000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let pixels = vec![0u8; 8 * 8 * 3];
        let jpeg = encode_jpeg(&pixels, 8, 8, ColorSpace::Rgb8, &options).unwrap();

        let info = read_header(&jpeg).unwrap();
        assert_eq!(info.comment.as_deref(), Some("made by a test"));
        assert_eq!(info.provenance, options.provenance);
    }

    #[test]
    fn test_encode_gray_and_cmyk() {
        let gray = vec![40u8; 12 * 12];
        let jpeg = encode_jpeg(&gray, 12, 12, ColorSpace::Gray8, &EncodeOptions::default())
            .unwrap();
        assert_eq!(read_header(&jpeg).unwrap().components, 1);

        let cmyk = vec![40u8; 12 * 12 * 4];
        let jpeg = encode_jpeg(&cmyk, 12, 12, ColorSpace::Cmyk, &EncodeOptions::default())
            .unwrap();
        let info = read_header(&jpeg).unwrap();
        assert_eq!(info.components, 4);
        assert_eq!(info.color_space, ColorSpace::Cmyk);
    }

    #[test]
    fn test_encode_jpeg_invalid_pixel_data() {
        let short = vec![128u8; 99 * 100 * 3];
        let result = encode_jpeg(&short, 100, 100, ColorSpace::Rgb8, &EncodeOptions::default());
        assert!(matches!(result, Err(EncodeError::InvalidPixelData { .. })));

        // Gray layout expects one byte per pixel
        let rgb_sized = vec![128u8; 10 * 10 * 3];
        let result = encode_jpeg(&rgb_sized, 10, 10, ColorSpace::Gray8, &EncodeOptions::default());
        assert!(matches!(
            result,
            Err(EncodeError::InvalidPixelData {
                expected: 100,
                actual: 300
            })
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_markers() {
        let pixels = vec![128u8; 8 * 8 * 3];

        let options = EncodeOptions {
            comment: Some("x".repeat(MAX_MARKER_PAYLOAD + 1)),
            ..Default::default()
        };
        let result = encode_jpeg(&pixels, 8, 8, ColorSpace::Rgb8, &options);
        assert!(matches!(
            result,
            Err(EncodeError::MarkerTooLong {
                marker: "COM",
                len: 65534
            })
        ));

        let options = EncodeOptions {
            provenance: Some(ProvenanceRecord {
                uri: Some("u".repeat(70_000)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = encode_jpeg(&pixels, 8, 8, ColorSpace::Rgb8, &options);
        assert!(matches!(
            result,
            Err(EncodeError::MarkerTooLong { marker: "APP7", .. })
        ));

        // Exactly at the limit still encodes
        let options = EncodeOptions {
            comment: Some("x".repeat(MAX_MARKER_PAYLOAD)),
            ..Default::default()
        };
        let jpeg = encode_jpeg(&pixels, 8, 8, ColorSpace::Rgb8, &options).unwrap();
        assert_eq!(read_header(&jpeg).unwrap().comment.unwrap().len(), MAX_MARKER_PAYLOAD);
    }

    #[test]
    fn test_encode_jpeg_zero_dimensions() {
        let result = encode_jpeg(&[], 0, 100, ColorSpace::Rgb8, &EncodeOptions::default());
        assert!(matches!(result, Err(EncodeError::InvalidDimensions { .. })));

        let result = encode_jpeg(&[], 100, 0, ColorSpace::Rgb8, &EncodeOptions::default());
        assert!(matches!(result, Err(EncodeError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_encode_buffer_uses_view() {
        let mut buffer = PixelBuffer::new(20, 10, ColorSpace::Rgb8, gradient_rgb(20, 10));
        crate::decode::crop(&mut buffer, 5, 2, 8, 4);

        let jpeg = encode_buffer(Vec::new(), &buffer, &EncodeOptions::default()).unwrap();
        let info = read_header(&jpeg).unwrap();
        assert_eq!((info.width, info.height), (8, 4));
    }

    #[test]
    fn test_output_decodes_with_independent_decoder() {
        let pixels = gradient_rgb(30, 20);
        let jpeg = encode_jpeg(&pixels, 30, 20, ColorSpace::Rgb8, &EncodeOptions::default())
            .unwrap();

        let decoded = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg)
            .unwrap()
            .into_rgb8();
        assert_eq!(decoded.dimensions(), (30, 20));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::decode::read_header;
    use proptest::prelude::*;

    /// Strategy for generating image dimensions (keep small for speed).
    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (2u32..=40, 2u32..=40)
    }

    proptest! {
        /// Property: valid input always produces a stream whose header
        /// reports the encoded size.
        #[test]
        fn prop_header_matches_input(
            (width, height) in dimensions_strategy(),
            quality in 0u8..=100,
        ) {
            let pixels = vec![128u8; (width * height * 3) as usize];
            let jpeg = encode_jpeg(&pixels, width, height, ColorSpace::Rgb8, &EncodeOptions {
                quality,
                ..Default::default()
            });
            prop_assert!(jpeg.is_ok());

            let info = read_header(&jpeg.unwrap()).unwrap();
            prop_assert_eq!((info.width, info.height), (width, height));
            prop_assert_eq!(info.is_unsubsampled(), quality >= FULL_CHROMA_QUALITY);
        }

        /// Property: same input always produces same output (deterministic).
        #[test]
        fn prop_deterministic_output(
            (width, height) in (2u32..=20, 2u32..=20),
            quality in 1u8..=100,
        ) {
            let pixels = vec![100u8; (width * height * 3) as usize];
            let options = EncodeOptions { quality, ..Default::default() };

            let first = encode_jpeg(&pixels, width, height, ColorSpace::Rgb8, &options).unwrap();
            let second = encode_jpeg(&pixels, width, height, ColorSpace::Rgb8, &options).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
