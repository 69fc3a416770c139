//! JpegThumb Core - JPEG thumbnailing library
//!
//! This crate makes thumbnails of JPEG images without decoding them at full
//! size: the codec decodes at the coarsest DCT scale that still covers the
//! requested size and a nearest-neighbour pass trims the rest. Decoded pixels
//! can be extracted in eight layouts or re-encoded with comment and
//! provenance markers.
//!
//! # Module Structure
//!
//! - `decode` - Header parsing, scale planning, scaled decode, resample and crop
//! - `encode` - JPEG encoding with quality dependent chroma sampling
//! - `convert` - Pixel block extraction in the supported layouts
//! - `metadata` - Comment decoding and the provenance record
//!
//! # Usage
//!
//! ```ignore
//! use jpegthumb_core::JpegImage;
//!
//! let mut image = JpegImage::open_file("photo.jpg")?;
//! image.set_decode_size(128, 96);
//! let block = image.pixels_rgb(0, 0, 128, 96)?;
//! ```

mod codec;
pub mod convert;
pub mod decode;
pub mod encode;
mod handle;
pub mod metadata;

pub use convert::{ConvertError, PixelBlock, Region};
pub use decode::{ColorSpace, DecodeError, IdctMethod, PixelBuffer, SourceInfo};
pub use encode::{EncodeError, EncodeOptions};
pub use handle::{Bounds, Destination, JpegImage, Source, ThumbError};
pub use metadata::ProvenanceRecord;
