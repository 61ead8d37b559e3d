//! Color reduction.
//!
//! Each tile's pixels are reduced to one representative color off the
//! coordinating task, on a fixed pool of worker threads:
//!
//! - [`color`]: sampled average and `#rrggbb` encoding
//! - [`protocol`]: request/response messages between pool and workers
//! - [`pool`]: round-robin [`ReducerPool`] with correlation-id routing

pub mod color;
pub mod pool;
pub mod protocol;

pub use color::{
    average_color, hex_digits, rgb_to_hex, ColorReducer, Rgb, SampledAverage,
    DEFAULT_SAMPLE_STRIDE,
};
pub use pool::{PendingReduction, ReducerPool, DEFAULT_POOL_SIZE};
pub use protocol::{ReducedColor, ReductionRequest, ReductionResponse};
