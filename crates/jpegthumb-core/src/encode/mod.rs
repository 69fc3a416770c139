//! Thumbnail encoding.
//!
//! This module provides functionality for:
//! - Encoding decoded pixel views back to JPEG with a configurable quality
//! - Writing the comment and provenance markers
//!
//! Quality at or above [`FULL_CHROMA_QUALITY`] stores chroma at full
//! resolution; below it the codec's default 2x2 chroma subsampling is kept.
//!
//! # Examples
//!
//! ```ignore
//! use jpegthumb_core::decode::ColorSpace;
//! use jpegthumb_core::encode::{encode_jpeg, EncodeOptions};
//!
//! let pixels = vec![128u8; 100 * 100 * 3]; // Gray image
//! let jpeg_bytes = encode_jpeg(&pixels, 100, 100, ColorSpace::Rgb8, &EncodeOptions::default()).unwrap();
//! println!("Encoded {} bytes", jpeg_bytes.len());
//! ```

mod jpeg;

pub use jpeg::{
    encode_buffer, encode_jpeg, EncodeError, EncodeOptions, DEFAULT_QUALITY, FULL_CHROMA_QUALITY,
    MAX_MARKER_PAYLOAD,
};
