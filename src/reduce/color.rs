//! Average color computation.
//!
//! The default reduction samples every fifth pixel of a tile's flattened RGBA
//! buffer, starting with the first pixel, and floors the per-channel mean.
//! Alpha is ignored. An empty buffer reduces to black.

use crate::error::ReductionError;

/// Bytes per RGBA sample.
pub const BYTES_PER_PIXEL: usize = 4;

/// Default pixel stride for sampled averaging.
pub const DEFAULT_SAMPLE_STRIDE: usize = 5;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`, lowercase and zero-padded.
    pub fn to_hex(self) -> String {
        rgb_to_hex(self.r, self.g, self.b)
    }
}

/// Encode a color as `#rrggbb`, lowercase and zero-padded per channel.
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{}", hex::encode([r, g, b]))
}

/// Strip the leading `#` from a color code and check it is 6 hex digits.
///
/// Returns the lowercase digits, suitable for use in a swatch lookup path.
pub fn hex_digits(color_hex: &str) -> Option<String> {
    let digits = color_hex.strip_prefix('#').unwrap_or(color_hex);
    match hex::decode(digits) {
        Ok(bytes) if bytes.len() == 3 => Some(hex::encode(bytes)),
        _ => None,
    }
}

/// Average the color of an RGBA buffer, visiting one pixel in every `stride`.
///
/// A buffer whose length is not a whole number of pixels is rejected. A
/// buffer with no pixels reduces to black.
pub fn average_color(pixels: &[u8], stride: usize) -> Result<Rgb, ReductionError> {
    if pixels.len() % BYTES_PER_PIXEL != 0 {
        return Err(ReductionError::MalformedBuffer { len: pixels.len() });
    }

    let (mut r, mut g, mut b, mut count) = (0u64, 0u64, 0u64, 0u64);

    for sample in pixels.chunks_exact(BYTES_PER_PIXEL).step_by(stride.max(1)) {
        r += sample[0] as u64;
        g += sample[1] as u64;
        b += sample[2] as u64;
        count += 1;
    }

    if count == 0 {
        return Ok(Rgb::BLACK);
    }

    Ok(Rgb {
        r: (r / count) as u8,
        g: (g / count) as u8,
        b: (b / count) as u8,
    })
}

// =============================================================================
// Reducer Trait
// =============================================================================

/// Reduction run by the pool's workers for each tile.
///
/// Implementations must be pure with respect to their input: workers share no
/// mutable state with the caller.
pub trait ColorReducer: Send + Sync + 'static {
    /// Reduce a tile's RGBA buffer to a single color.
    fn reduce(&self, pixels: &[u8]) -> Result<Rgb, ReductionError>;
}

/// Sampled mean over every `stride`-th pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledAverage {
    stride: usize,
}

impl SampledAverage {
    pub fn new(stride: usize) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Default for SampledAverage {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_STRIDE)
    }
}

impl ColorReducer for SampledAverage {
    fn reduce(&self, pixels: &[u8]) -> Result<Rgb, ReductionError> {
        average_color(pixels, self.stride)
    }
}

// =============================================================================
// Tests
// =============================================================================
