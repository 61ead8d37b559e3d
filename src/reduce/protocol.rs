//! Messages exchanged between the pool and its workers.
//!
//! Workers share no memory with the caller. A request carries ownership of
//! the tile's pixel buffer; the response echoes the correlation id and tile
//! index so the pool can route it to the waiting job.

use crate::error::ReductionError;

use super::color::Rgb;

/// Pool → worker.
#[derive(Debug)]
pub struct ReductionRequest {
    /// Unique id of this job within the pool's lifetime
    pub correlation_id: u64,

    /// Index of the tile the pixels belong to
    pub tile_index: usize,

    /// RGBA samples, moved out of the tile
    pub pixels: Vec<u8>,
}

/// Worker → pool.
#[derive(Debug)]
pub struct ReductionResponse {
    /// Echo of the request's correlation id
    pub correlation_id: u64,

    /// Echo of the request's tile index
    pub tile_index: usize,

    /// Worker that handled the job
    pub worker: usize,

    /// The reduced color, or the error the worker reported
    pub result: Result<ReducedColor, ReductionError>,
}

impl ReductionResponse {
    /// `#rrggbb` when the reduction succeeded.
    pub fn color_hex(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|c| c.hex.as_str())
    }

    /// The error indicator, if the worker failed.
    pub fn error(&self) -> Option<&ReductionError> {
        self.result.as_ref().err()
    }
}

/// A successfully reduced tile color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedColor {
    /// Average color
    pub rgb: Rgb,

    /// `#rrggbb` encoding of `rgb`
    pub hex: String,

    /// Worker that computed it
    pub worker: usize,
}

impl ReducedColor {
    pub fn new(rgb: Rgb, worker: usize) -> Self {
        Self {
            rgb,
            hex: rgb.to_hex(),
            worker,
        }
    }
}
