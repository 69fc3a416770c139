//! The image handle tying header, decode, resample, extraction and encode
//! together.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::convert::{self, ConvertError, PixelBlock, Region};
use crate::decode::{
    crop, decode_scaled, plan_scale, read_header, resample_nearest, ColorSpace, DecodeError,
    DecodeRequest, IdctMethod, PixelBuffer, SourceInfo,
};
use crate::encode::{encode_buffer, EncodeError, EncodeOptions, DEFAULT_QUALITY};
use crate::metadata::{ProvenanceRecord, JPEG_MIMETYPE};

/// Errors returned by [`JpegImage`] operations.
#[derive(Debug, Error)]
pub enum ThumbError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Trim needs full resolution pixels but a scaled decode already ran.
    #[error("Pixels were already scaled; trim needs a full resolution decode")]
    AlreadyScaled,
}

/// Where the compressed input comes from.
#[derive(Debug, Clone)]
pub enum Source {
    File { path: PathBuf, bytes: Vec<u8> },
    Memory(Vec<u8>),
}

impl Source {
    fn bytes(&self) -> &[u8] {
        match self {
            Source::File { bytes, .. } => bytes,
            Source::Memory(bytes) => bytes,
        }
    }

    /// Path of a file source.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::File { path, .. } => Some(path),
            Source::Memory(_) => None,
        }
    }
}

/// Where [`JpegImage::encode`] writes the thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(PathBuf),
    /// Kept by the handle, read back with [`JpegImage::encoded_bytes`].
    Memory,
}

/// Output size and crop origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An opened JPEG and the thumbnail configuration applied to it.
///
/// The header is parsed on open; pixels are decoded lazily on the first
/// request that needs them and exactly once per handle.
///
/// # Example
///
/// ```ignore
/// let mut image = JpegImage::open_file("photo.jpg")?;
/// image.set_decode_size(128, 96);
/// image.set_quality(75);
/// image.set_file_output("thumb.jpg");
/// image.encode()?;
/// ```
#[derive(Debug)]
pub struct JpegImage {
    source: Source,
    info: SourceInfo,
    bounds: Bounds,
    color_space: ColorSpace,
    quality: u8,
    comment: Option<String>,
    provenance: bool,
    destination: Option<Destination>,
    pixels: Option<PixelBuffer>,
    scaled: bool,
    encoded: bool,
    output: Option<Vec<u8>>,
}

impl JpegImage {
    /// Open a JPEG file and parse its header.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::IoError` if the file cannot be read, or any
    /// error of [`read_header`].
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, ThumbError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| DecodeError::IoError(format!("{}: {e}", path.display())))?;
        Self::open(Source::File {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Open a JPEG held in memory and parse its header.
    pub fn open_memory(bytes: impl Into<Vec<u8>>) -> Result<Self, ThumbError> {
        Self::open(Source::Memory(bytes.into()))
    }

    fn open(source: Source) -> Result<Self, ThumbError> {
        let info = read_header(source.bytes())?;
        debug!(
            width = info.width,
            height = info.height,
            color_space = ?info.color_space,
            path = ?source.path(),
            "opened jpeg"
        );

        Ok(Self {
            bounds: Bounds {
                x: 0,
                y: 0,
                width: info.width,
                height: info.height,
            },
            color_space: info.color_space,
            quality: DEFAULT_QUALITY,
            comment: None,
            provenance: false,
            destination: None,
            pixels: None,
            scaled: false,
            encoded: false,
            output: None,
            source,
            info,
        })
    }

    /// Source dimensions.
    pub fn size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Colour space detected in the source.
    pub fn color_space(&self) -> ColorSpace {
        self.info.color_space
    }

    /// Text of the source's comment marker.
    pub fn comment(&self) -> Option<&str> {
        self.info.comment.as_deref()
    }

    /// Provenance record carried by the source, if it is itself a thumbnail.
    pub fn provenance(&self) -> Option<&ProvenanceRecord> {
        self.info.provenance.as_ref()
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Everything read from the source header.
    pub fn source_info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Layout pixels are decoded and extracted in.
    pub fn output_color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Set the thumbnail size, clamped to `[1, source]` on each axis.
    ///
    /// Resets the crop origin. Ignored once pixels are decoded.
    pub fn set_decode_size(&mut self, width: u32, height: u32) {
        if self.pixels.is_some() {
            return;
        }
        self.bounds = Bounds {
            x: 0,
            y: 0,
            width: width.clamp(1, self.info.width),
            height: height.clamp(1, self.info.height),
        };
    }

    /// Set the region kept by [`JpegImage::trim`].
    ///
    /// The size is clamped like [`JpegImage::set_decode_size`] and negative
    /// origins move to zero. Ignored once pixels are decoded.
    pub fn set_decode_bounds(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if self.pixels.is_some() {
            return;
        }
        self.bounds = Bounds {
            x: x.max(0) as u32,
            y: y.max(0) as u32,
            width: width.clamp(1, self.info.width),
            height: height.clamp(1, self.info.height),
        };
    }

    /// Choose the layout of decoded pixels. Ignored once pixels are decoded.
    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        if self.pixels.is_some() {
            return;
        }
        self.color_space = color_space;
    }

    /// Encoder quality, clamped to 100.
    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality.min(100);
    }

    /// Comment written into the thumbnail; `None` writes no comment marker.
    pub fn set_comment(&mut self, comment: Option<&str>) {
        self.comment = comment.map(str::to_string);
    }

    /// Write a provenance record describing the source into the thumbnail.
    pub fn enable_provenance(&mut self, enabled: bool) {
        self.provenance = enabled;
    }

    pub fn set_file_output(&mut self, path: impl Into<PathBuf>) {
        self.destination = Some(Destination::File(path.into()));
        self.output = None;
    }

    pub fn set_memory_output(&mut self) {
        self.destination = Some(Destination::Memory);
        self.output = None;
    }

    /// Decode the source at the largest DCT scale that does not undershoot
    /// the configured size.
    ///
    /// Does nothing if pixels are already decoded.
    pub fn decode(&mut self) -> Result<(), ThumbError> {
        let request = self.thumbnail_request();
        decode_once(&mut self.pixels, &self.source, &request)?;
        Ok(())
    }

    fn thumbnail_request(&self) -> DecodeRequest {
        DecodeRequest {
            scale: plan_scale(
                self.info.width,
                self.info.height,
                self.bounds.width,
                self.bounds.height,
            ),
            color_space: self.color_space,
            method: IdctMethod::Fast,
        }
    }

    fn scale(&mut self) -> Result<&PixelBuffer, ThumbError> {
        let request = self.thumbnail_request();
        let (width, height) = (self.bounds.width, self.bounds.height);
        let pixels = decode_once(&mut self.pixels, &self.source, &request)?;

        if !self.scaled {
            if pixels.width() != width || pixels.height() != height {
                resample_nearest(pixels, width, height);
            }
            self.scaled = true;
        }
        Ok(pixels)
    }

    /// Extract a region of the thumbnail in the configured layout.
    ///
    /// Coordinates are relative to the thumbnail, not the source.
    pub fn pixels(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<PixelBlock, ThumbError> {
        let layout = self.color_space;
        let buffer = self.scale()?;
        Ok(convert::extract(
            buffer,
            Region::new(x, y, width, height),
            layout,
        )?)
    }

    /// Extract a region of the thumbnail as packed RGB.
    pub fn pixels_rgb(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<PixelBlock, ThumbError> {
        let buffer = self.scale()?;
        Ok(convert::extract_rgb(
            buffer,
            Region::new(x, y, width, height),
        )?)
    }

    /// Decode, resample and write the thumbnail to the destination.
    ///
    /// Only the first call writes; later calls return `Ok(())`. A failed
    /// encode leaves an existing destination file untouched.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::NoDestination` if no output was chosen.
    pub fn encode(&mut self) -> Result<(), ThumbError> {
        if self.encoded {
            return Ok(());
        }
        let Some(destination) = self.destination.clone() else {
            return Err(EncodeError::NoDestination.into());
        };
        let options = self.encode_options();

        let pixels = self.scale()?;
        let output = write_destination(&destination, pixels, &options)?;
        self.output = output;
        self.encoded = true;
        Ok(())
    }

    /// Cut the configured bounds out of the full resolution image and write
    /// them to the destination.
    ///
    /// Decodes with the accurate IDCT and no DCT scaling.
    ///
    /// # Errors
    ///
    /// Returns `ThumbError::AlreadyScaled` if pixels were already decoded at a
    /// reduced size or resampled.
    pub fn trim(&mut self) -> Result<(), ThumbError> {
        if self.encoded {
            return Ok(());
        }
        let Some(destination) = self.destination.clone() else {
            return Err(EncodeError::NoDestination.into());
        };
        let options = self.encode_options();
        let request = DecodeRequest {
            scale: 1,
            color_space: self.color_space,
            method: IdctMethod::Accurate,
        };

        let (width, height) = self.size();
        let bounds = self.bounds;
        let pixels = decode_once(&mut self.pixels, &self.source, &request)?;
        if self.scaled || pixels.width() != width || pixels.height() != height {
            return Err(ThumbError::AlreadyScaled);
        }

        if bounds.x > 0 || bounds.y > 0 || bounds.width < width || bounds.height < height {
            crop(pixels, bounds.x, bounds.y, bounds.width, bounds.height);
        }
        self.scaled = true;

        self.output = write_destination(&destination, pixels, &options)?;
        self.encoded = true;
        Ok(())
    }

    fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            quality: self.quality,
            comment: self.comment.clone(),
            provenance: self.provenance.then(|| self.provenance_record()),
        }
    }

    fn provenance_record(&self) -> ProvenanceRecord {
        let (width, height) = self.size();
        match self.source.path() {
            Some(path) => ProvenanceRecord::for_source(path, width, height),
            None => ProvenanceRecord {
                width: Some(width),
                height: Some(height),
                mimetype: Some(JPEG_MIMETYPE.to_string()),
                ..Default::default()
            },
        }
    }

    /// Thumbnail bytes written to a memory destination.
    pub fn encoded_bytes(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    /// Take ownership of the thumbnail bytes written to a memory destination.
    pub fn take_encoded_bytes(&mut self) -> Option<Vec<u8>> {
        self.output.take()
    }

    /// Release the handle and everything it owns.
    pub fn close(self) {
        debug!(path = ?self.source.path(), "closed jpeg");
    }
}

/// Decode into `slot` unless it already holds pixels.
fn decode_once<'a>(
    slot: &'a mut Option<PixelBuffer>,
    source: &Source,
    request: &DecodeRequest,
) -> Result<&'a mut PixelBuffer, ThumbError> {
    let pixels = match slot.take() {
        Some(pixels) => pixels,
        None => decode_scaled(source.bytes(), request)?,
    };
    Ok(slot.insert(pixels))
}

/// Encode `pixels` and deliver them to `destination`.
///
/// The JPEG is produced in memory first. File destinations are then replaced
/// through a temporary file in the same directory, so nothing is written
/// unless the encode succeeded. Returns the bytes for a memory destination.
fn write_destination(
    destination: &Destination,
    pixels: &PixelBuffer,
    options: &EncodeOptions,
) -> Result<Option<Vec<u8>>, ThumbError> {
    let bytes = encode_buffer(Vec::new(), pixels, options)?;

    match destination {
        Destination::File(path) => {
            persist_file(path, &bytes)
                .map_err(|e| EncodeError::IoError(format!("{}: {e}", path.display())))?;
            debug!(path = %path.display(), len = bytes.len(), "thumbnail written");
            Ok(None)
        }
        Destination::Memory => {
            debug!(len = bytes.len(), "thumbnail kept in memory");
            Ok(Some(bytes))
        }
    }
}

fn persist_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
