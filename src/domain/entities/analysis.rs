//! Analysis results and the decoded pixel buffer they are computed from.

use std::collections::HashMap;

use super::{Dimensions, ImageFormat};

/// Alpha values below this are ignored when extracting the dominant color.
const OPAQUE_THRESHOLD: u8 = 128;

/// Upper bound on the number of pixels sampled for color extraction.
const MAX_COLOR_SAMPLES: usize = 65_536;

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure black, the fallback when no color can be extracted.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Creates a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Formats the color as `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dimensions: Dimensions,
    rgba: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA8 data. Returns `None` if the length does not match
    /// `width * height * 4`.
    #[must_use]
    pub fn new(dimensions: Dimensions, rgba: Vec<u8>) -> Option<Self> {
        let expected = dimensions.width as usize * dimensions.height as usize * 4;
        (rgba.len() == expected).then_some(Self { dimensions, rgba })
    }

    /// Size of the buffer in pixels.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Iterates over `[r, g, b, a]` pixels.
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.rgba.chunks_exact(4)
    }

    /// Returns true if any pixel is not fully opaque.
    #[must_use]
    pub fn has_transparency(&self) -> bool {
        self.pixels().any(|px| px[3] < u8::MAX)
    }

    /// Returns the most common color, or black if every pixel is transparent.
    ///
    /// Pixels are bucketed by the top four bits of each channel and the mean
    /// of the most populated bucket is returned, so near-identical shades
    /// count towards the same color.
    #[must_use]
    pub fn dominant_color(&self) -> Rgb {
        let total = self.rgba.len() / 4;
        let stride = total.div_ceil(MAX_COLOR_SAMPLES).max(1);

        let mut buckets: HashMap<u16, [u64; 4]> = HashMap::new();
        for px in self.pixels().step_by(stride) {
            if px[3] < OPAQUE_THRESHOLD {
                continue;
            }
            let bin = (u16::from(px[0] >> 4) << 8)
                | (u16::from(px[1] >> 4) << 4)
                | u16::from(px[2] >> 4);
            let acc = buckets.entry(bin).or_default();
            acc[0] += u64::from(px[0]);
            acc[1] += u64::from(px[1]);
            acc[2] += u64::from(px[2]);
            acc[3] += 1;
        }

        // Ties are broken by bin value so the result does not depend on
        // hash iteration order.
        buckets
            .into_iter()
            .max_by_key(|(bin, acc)| (acc[3], std::cmp::Reverse(*bin)))
            .map_or(Rgb::BLACK, |(_, acc)| {
                let n = acc[3];
                #[allow(clippy::cast_possible_truncation)]
                Rgb::new((acc[0] / n) as u8, (acc[1] / n) as u8, (acc[2] / n) as u8)
            })
    }
}

/// Full metadata about an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Display name of the source.
    pub name: String,
    /// Size of the source in bytes.
    pub byte_size: u64,
    /// Last-modified timestamp of the source, ms since the Unix epoch.
    pub last_modified: u64,
    /// Pixel dimensions.
    pub dimensions: Dimensions,
    /// Inferred format, if recognized.
    pub format: Option<ImageFormat>,
    /// MIME type, from the source or the inferred format.
    pub mime_type: Option<String>,
    /// Width divided by height.
    pub aspect_ratio: f64,
    /// Pixel count in millions.
    pub megapixels: f64,
}
