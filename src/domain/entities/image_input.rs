//! Input images and image format definitions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Image formats the toolkit can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG.
    Jpeg,
    /// WebP.
    #[default]
    Webp,
    /// Graphics Interchange Format (source only, never produced).
    Gif,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Returns the canonical file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    /// Parses a MIME type such as `image/png`.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Parses a file extension, with or without the leading dot.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Returns true if this format can be produced by the codec.
    #[must_use]
    pub const fn is_encodable(self) -> bool {
        !matches!(self, Self::Gif)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Webp => write!(f, "webp"),
            Self::Gif => write!(f, "gif"),
        }
    }
}

/// A file-like image submitted for processing.
///
/// Inputs are expected to be validated by the caller (non-empty, within
/// size limits); nothing in this crate re-validates them.
#[derive(Debug, Clone)]
pub struct ImageInput {
    name: String,
    bytes: Bytes,
    last_modified: u64,
    mime_type: Option<String>,
}

impl ImageInput {
    /// Creates a new input. `last_modified` is milliseconds since the Unix epoch.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>, last_modified: u64) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            last_modified,
            mime_type: None,
        }
    }

    /// Sets the MIME type reported by the source.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// File name, including the extension.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw encoded content.
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Byte length of the content.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Last modification time in milliseconds since the epoch.
    #[must_use]
    pub const fn last_modified(&self) -> u64 {
        self.last_modified
    }

    /// MIME type reported by the source, if any.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Infers the format from the MIME type, falling back to the file extension.
    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime)
            .or_else(|| {
                self.name
                    .rsplit_once('.')
                    .and_then(|(_, ext)| ImageFormat::from_extension(ext))
            })
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates dimensions from width and height.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, or 0 for degenerate images.
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    /// Pixel count in millions.
    #[must_use]
    pub fn megapixels(self) -> f64 {
        f64::from(self.width) * f64::from(self.height) / 1_000_000.0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
