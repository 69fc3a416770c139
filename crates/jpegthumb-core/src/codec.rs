//! Shared plumbing for calls into the JPEG codec.
//!
//! libjpeg reports fatal errors through a callback that must not return; the
//! `mozjpeg` bindings turn that callback into an unwinding panic. Every call
//! site in this crate runs the codec inside [`run_guarded`], which turns such a
//! panic back into an ordinary error value for the caller.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use mozjpeg::ColorSpace as CodecColorSpace;

use crate::decode::ColorSpace;

/// Run `f`, converting a codec unwind into `Err(on_unwind(message))`.
pub(crate) fn run_guarded<T, E>(
    f: impl FnOnce() -> Result<T, E>,
    on_unwind: impl FnOnce(String) -> E,
) -> Result<T, E> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(on_unwind(unwind_message(payload.as_ref()))),
    }
}

fn unwind_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "codec reported a fatal error".to_string()
    }
}

/// Codec colour space for a layout's decode family.
pub(crate) fn codec_color_space(color_space: ColorSpace) -> CodecColorSpace {
    match color_space.decode_family() {
        ColorSpace::Gray8 => CodecColorSpace::JCS_GRAYSCALE,
        ColorSpace::Yuv8 => CodecColorSpace::JCS_YCbCr,
        ColorSpace::Cmyk => CodecColorSpace::JCS_CMYK,
        _ => CodecColorSpace::JCS_RGB,
    }
}

/// Layout that best describes a stream's native colour space.
pub(crate) fn detected_color_space(codec: CodecColorSpace) -> ColorSpace {
    match codec {
        CodecColorSpace::JCS_GRAYSCALE => ColorSpace::Gray8,
        CodecColorSpace::JCS_CMYK | CodecColorSpace::JCS_YCCK => ColorSpace::Cmyk,
        _ => ColorSpace::Rgb8,
    }
}

/// Decode family the codec can produce from `source` for a requested layout.
///
/// The codec converts YCbCr and RGB streams to gray, RGB or YCbCr, gray
/// streams only to gray or RGB, and four-channel streams only to CMYK. Pairs
/// it cannot convert fall back to the nearest family it can; extraction
/// widens or reorders from there.
pub(crate) fn decodable_family(source: CodecColorSpace, requested: ColorSpace) -> ColorSpace {
    match (source, requested.decode_family()) {
        (CodecColorSpace::JCS_CMYK | CodecColorSpace::JCS_YCCK, _) => ColorSpace::Cmyk,
        (CodecColorSpace::JCS_GRAYSCALE, ColorSpace::Yuv8 | ColorSpace::Cmyk) => ColorSpace::Gray8,
        (_, ColorSpace::Cmyk) => ColorSpace::Rgb8,
        (_, family) => family,
    }
}
