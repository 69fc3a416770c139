//! Scaled JPEG decoding for thumbnails.
//!
//! This module provides functionality for:
//! - Reading a JPEG header (size, colour space, comment, provenance)
//! - Planning a reduced DCT decode for a target size
//! - Decoding at that reduced size into a single pixel allocation
//! - Nearest-neighbour resampling and cropping of the decoded pixels in place
//!
//! # Performance Strategy
//!
//! A thumbnail is produced in two steps:
//! - **Scaled decode**: the codec runs its inverse DCT at 1/2, 1/4 or 1/8 size,
//!   so a large photo is never decoded at full resolution
//! - **Resample**: a nearest-neighbour pass shrinks the already small decode to
//!   the exact requested size
//!
//! # Examples
//!
//! ```ignore
//! use jpegthumb_core::decode::{decode_scaled, plan_scale, read_header, resample_nearest, DecodeRequest};
//!
//! let jpeg_bytes = std::fs::read("photo.jpg").unwrap();
//! let info = read_header(&jpeg_bytes).unwrap();
//! let request = DecodeRequest {
//!     scale: plan_scale(info.width, info.height, 128, 96),
//!     ..Default::default()
//! };
//! let mut pixels = decode_scaled(&jpeg_bytes, &request).unwrap();
//! resample_nearest(&mut pixels, 128, 96);
//! ```

mod jpeg;
mod plan;
mod resize;
mod types;

pub use jpeg::{decode_scaled, read_header, DecodeRequest, MIN_SOURCE_DIMENSION};
pub use plan::{plan_scale, scale_numerator, MAX_SCALE};
pub use resize::{crop, resample_nearest};
pub use types::{ColorSpace, DecodeError, IdctMethod, PixelBuffer, SourceInfo};
