//! Comment and thumbnail provenance metadata.
//!
//! Thumbnails written by this crate can carry a record of the image they were
//! made from, stored in an APP7 marker as newline separated key/value lines:
//!
//! ```text
//! Thumb::URI
//! file:///home/user/photo.jpg
//! Thumb::MTime
//! 1700000000
//! Thumb::Image::Width
//! 4000
//! Thumb::Image::Height
//! 3000
//! Thumb::Mimetype
//! image/jpeg
//! ```

use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// APP marker number carrying the provenance record.
pub const PROVENANCE_APP_MARKER: u8 = 7;

/// Mime type recorded for thumbnails written by this crate.
pub const JPEG_MIMETYPE: &str = "image/jpeg";

const KEY_URI: &str = "Thumb::URI";
const KEY_MTIME: &str = "Thumb::MTime";
const KEY_WIDTH: &str = "Thumb::Image::Width";
const KEY_HEIGHT: &str = "Thumb::Image::Height";
const KEY_MIMETYPE: &str = "Thumb::Mimetype";

/// Description of the image a thumbnail was made from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// URI of the original image.
    pub uri: Option<String>,
    /// Modification time of the original, in seconds since the Unix epoch.
    pub mtime: Option<u64>,
    /// Width of the original in pixels.
    pub width: Option<u32>,
    /// Height of the original in pixels.
    pub height: Option<u32>,
    /// Mime type of the original.
    pub mimetype: Option<String>,
}

impl ProvenanceRecord {
    /// Build the record describing a JPEG file on disk.
    ///
    /// The URI uses the canonical path when it can be resolved. A missing or
    /// unreadable modification time leaves `mtime` unset.
    pub fn for_source(path: &Path, width: u32, height: u32) -> Self {
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mtime = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|since| since.as_secs());

        Self {
            uri: Some(format!("file://{}", absolute.display())),
            mtime,
            width: Some(width),
            height: Some(height),
            mimetype: Some(JPEG_MIMETYPE.to_string()),
        }
    }

    /// Parse the payload of an APP7 marker.
    ///
    /// Lines are read in key/value pairs; unknown keys and unparsable numbers
    /// are skipped. Returns `None` if no known key is present.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(data);
        let mut lines = text.split('\n').map(|line| line.trim_end_matches(['\r', '\0']));
        let mut record = Self::default();
        let mut found = false;

        while let Some(key) = lines.next() {
            if !matches!(key, KEY_URI | KEY_MTIME | KEY_WIDTH | KEY_HEIGHT | KEY_MIMETYPE) {
                continue;
            }
            let Some(value) = lines.next() else {
                break;
            };
            let value = value.trim();
            match key {
                KEY_URI => record.uri = Some(value.to_string()),
                KEY_MTIME => record.mtime = value.parse().ok(),
                KEY_WIDTH => record.width = value.parse().ok(),
                KEY_HEIGHT => record.height = value.parse().ok(),
                _ => record.mimetype = Some(value.to_string()),
            }
            found = true;
        }

        found.then_some(record)
    }

    /// Serialize the present fields into an APP7 marker payload.
    pub fn to_marker_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        let mut push = |key: &str, value: String| {
            out.push_str(key);
            out.push('\n');
            out.push_str(&value);
            out.push('\n');
        };

        if let Some(uri) = &self.uri {
            push(KEY_URI, uri.clone());
        }
        if let Some(mtime) = self.mtime {
            push(KEY_MTIME, mtime.to_string());
        }
        if let Some(width) = self.width {
            push(KEY_WIDTH, width.to_string());
        }
        if let Some(height) = self.height {
            push(KEY_HEIGHT, height.to_string());
        }
        if let Some(mimetype) = &self.mimetype {
            push(KEY_MIMETYPE, mimetype.clone());
        }

        out.into_bytes()
    }
}

/// Decode a COM marker payload as text.
///
/// Invalid UTF-8 is replaced rather than rejected and trailing NULs written by
/// C encoders are dropped.
pub fn decode_comment(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &[u8] = b"Thumb::URI\nfile:///tmp/photo.jpg\nThumb::MTime\n1700000000\n\
Thumb::Image::Width\n4000\nThumb::Image::Height\n3000\nThumb::Mimetype\nimage/jpeg\n";

    #[test]
    fn test_parse_full_record() {
        let record = ProvenanceRecord::parse(SAMPLE).unwrap();

        assert_eq!(record.uri.as_deref(), Some("file:///tmp/photo.jpg"));
        assert_eq!(record.mtime, Some(1_700_000_000));
        assert_eq!(record.width, Some(4000));
        assert_eq!(record.height, Some(3000));
        assert_eq!(record.mimetype.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_parse_partial_record() {
        let record = ProvenanceRecord::parse(b"Thumb::Image::Width\n640\n").unwrap();

        assert_eq!(record.width, Some(640));
        assert_eq!(record.uri, None);
        assert_eq!(record.height, None);
    }

    #[test]
    fn test_parse_skips_unknown_keys() {
        let record =
            ProvenanceRecord::parse(b"Software\nsomething\nThumb::Mimetype\nimage/jpeg\n")
                .unwrap();
        assert_eq!(record.mimetype.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_parse_rejects_foreign_payload() {
        assert_eq!(ProvenanceRecord::parse(b"Exif\0\0MM"), None);
        assert_eq!(ProvenanceRecord::parse(b""), None);
        // Key without a value line
        assert_eq!(ProvenanceRecord::parse(b"Thumb::URI"), None);
    }

    #[test]
    fn test_parse_bad_number() {
        let record = ProvenanceRecord::parse(b"Thumb::MTime\nyesterday\n").unwrap();
        assert_eq!(record.mtime, None);
    }

    #[test]
    fn test_marker_bytes_round_trip() {
        let record = ProvenanceRecord {
            uri: Some("file:///a/b.jpg".to_string()),
            mtime: Some(42),
            width: Some(10),
            height: Some(20),
            mimetype: Some(JPEG_MIMETYPE.to_string()),
        };

        let bytes = record.to_marker_bytes();
        assert_eq!(ProvenanceRecord::parse(&bytes), Some(record));
    }

    #[test]
    fn test_marker_bytes_skip_missing_fields() {
        let record = ProvenanceRecord {
            width: Some(10),
            ..Default::default()
        };
        assert_eq!(record.to_marker_bytes(), b"Thumb::Image::Width\n10\n".to_vec());
    }

    #[test]
    fn test_for_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not really a jpeg").unwrap();

        let record = ProvenanceRecord::for_source(file.path(), 800, 600);

        let uri = record.uri.unwrap();
        assert!(uri.starts_with("file:///"), "unexpected uri {uri}");
        assert!(record.mtime.unwrap() > 0);
        assert_eq!(record.width, Some(800));
        assert_eq!(record.height, Some(600));
        assert_eq!(record.mimetype.as_deref(), Some(JPEG_MIMETYPE));
    }

    #[test]
    fn test_decode_comment() {
        assert_eq!(decode_comment(b"hello\0\0"), "hello");
        assert_eq!(decode_comment(b"caf\xC3\xA9"), "café");
        assert_eq!(decode_comment(b"bad \xFF byte"), "bad \u{FFFD} byte");
    }
}
