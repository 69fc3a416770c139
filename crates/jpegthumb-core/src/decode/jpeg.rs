//! JPEG header parsing and scaled decoding through the codec.

use mozjpeg::{DctMethod, Decompress, Marker};
use tracing::{debug, trace};

use super::plan::scale_numerator;
use super::{ColorSpace, DecodeError, IdctMethod, PixelBuffer, SourceInfo};
use crate::codec::{codec_color_space, decodable_family, detected_color_space, run_guarded};
use crate::metadata::{decode_comment, ProvenanceRecord, PROVENANCE_APP_MARKER};

/// Markers kept while reading a header.
const HEADER_MARKERS: &[Marker] = &[Marker::COM, Marker::APP(PROVENANCE_APP_MARKER)];

/// Markers kept while decoding pixels.
const NO_MARKERS: &[Marker] = &[];

/// Smallest width or height accepted as a thumbnail source.
pub const MIN_SOURCE_DIMENSION: u32 = 2;

/// Parameters for one decode of a JPEG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRequest {
    /// Decode at `1/scale` of full resolution (1 to 8).
    pub scale: u32,
    /// Layout the pixels will be extracted as.
    pub color_space: ColorSpace,
    /// IDCT method.
    pub method: IdctMethod,
}

impl Default for DecodeRequest {
    fn default() -> Self {
        Self {
            scale: 1,
            color_space: ColorSpace::Rgb8,
            method: IdctMethod::Fast,
        }
    }
}

/// Read the header of a JPEG stream without decoding any pixels.
///
/// # Arguments
///
/// * `bytes` - Complete JPEG file bytes
///
/// # Returns
///
/// The dimensions, detected colour space, sampling factors, comment and
/// provenance record of the stream.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the bytes do not start with a JPEG
/// marker, `DecodeError::CorruptedFile` if the codec rejects the header, and
/// `DecodeError::DegenerateDimensions` if either side is smaller than
/// [`MIN_SOURCE_DIMENSION`].
pub fn read_header(bytes: &[u8]) -> Result<SourceInfo, DecodeError> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return Err(DecodeError::InvalidFormat);
    }

    let info = run_guarded(
        || {
            let decompress = Decompress::with_markers(HEADER_MARKERS)
                .from_mem(bytes)
                .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

            let mut info = SourceInfo {
                width: decompress.width() as u32,
                height: decompress.height() as u32,
                color_space: detected_color_space(decompress.color_space()),
                components: decompress.components().len(),
                sampling_factors: decompress
                    .components()
                    .iter()
                    .map(|c| (c.h_samp_factor as u8, c.v_samp_factor as u8))
                    .collect(),
                comment: None,
                provenance: None,
            };

            for marker in decompress.markers() {
                match marker.marker {
                    Marker::COM if info.comment.is_none() => {
                        trace!(len = marker.data.len(), "comment marker");
                        info.comment = Some(decode_comment(marker.data));
                    }
                    Marker::APP(PROVENANCE_APP_MARKER) if info.provenance.is_none() => {
                        trace!(len = marker.data.len(), "provenance marker");
                        info.provenance = ProvenanceRecord::parse(marker.data);
                    }
                    _ => {}
                }
            }

            Ok(info)
        },
        DecodeError::CorruptedFile,
    )?;

    if info.width < MIN_SOURCE_DIMENSION || info.height < MIN_SOURCE_DIMENSION {
        return Err(DecodeError::DegenerateDimensions {
            width: info.width,
            height: info.height,
        });
    }

    Ok(info)
}

/// Decode a JPEG stream at a reduced DCT resolution.
///
/// The codec decodes at `ceil(8 / scale) / 8` of full size, which for the
/// power-of-two scales is exactly `1/scale` and otherwise slightly larger.
/// Fancy upsampling and block smoothing are disabled. CMYK and YCCK sources
/// always decode as CMYK because the codec cannot convert them further; other
/// layouts the codec cannot produce from the source fall back as described in
/// `decodable_family`, so the buffer's colour space may differ from the
/// requested layout.
///
/// # Arguments
///
/// * `bytes` - Complete JPEG file bytes
/// * `request` - Scale, output layout and IDCT method
///
/// # Returns
///
/// A `PixelBuffer` holding the decoded pixels in the layout's decode family.
///
/// # Errors
///
/// Returns `DecodeError::CorruptedFile` if the codec fails and
/// `DecodeError::OutOfMemory` if the pixel allocation cannot be reserved.
pub fn decode_scaled(bytes: &[u8], request: &DecodeRequest) -> Result<PixelBuffer, DecodeError> {
    run_guarded(
        || {
            let mut decompress = Decompress::with_markers(NO_MARKERS)
                .from_mem(bytes)
                .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

            let numerator = scale_numerator(request.scale);
            decompress.scale(numerator);
            decompress.dct_method(match request.method {
                IdctMethod::Fast => DctMethod::IntegerFast,
                IdctMethod::Accurate => DctMethod::IntegerSlow,
            });
            decompress.do_fancy_upsampling(false);
            decompress.do_block_smoothing(false);

            let family = decodable_family(decompress.color_space(), request.color_space);

            let mut started = decompress
                .to_colorspace(codec_color_space(family))
                .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

            let width = started.width();
            let height = started.height();
            let len = width * height * family.decoded_components();

            debug!(
                scale = request.scale,
                numerator,
                width,
                height,
                color_space = ?family,
                "scaled decode"
            );

            let mut data = Vec::new();
            data.try_reserve_exact(len)
                .map_err(|_| DecodeError::OutOfMemory)?;
            data.resize(len, 0u8);

            started
                .read_scanlines_into(&mut data)
                .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
            started
                .finish()
                .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

            Ok(PixelBuffer::new(width as u32, height as u32, family, data))
        },
        DecodeError::CorruptedFile,
    )
}
