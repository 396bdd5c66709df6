//! Software texture-sampling oracle.
//!
//! A CPU-side model of GPU texture fetches: texel formats, addressing, cube-map face wrapping,
//! nearest/linear filtering, mip selection and blending, comparison sampling and gathers. The
//! [`harness`] module runs the same calls on a [`harness::GpuDevice`] and reconciles both sides.

pub mod config;
pub mod error;
pub mod format;
pub mod harness;
pub mod math;
pub mod sampling;
pub mod texture;
pub mod util;

pub use config::*;
pub use error::*;
