//! Error types shared by the oracle and the harness.
//!
//! Contract violations (reading a texel outside a level, calls whose arguments do not fit the
//! bound view) are not represented here: they panic.

use crate::harness::ShaderStage;
use thiserror::Error;

/// Failures reported by a [`crate::harness::GpuDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("program compilation failed: {0}")]
    ProgramCompilationFailed(String),
    #[error("readback failed: {0}")]
    ReadbackFailed(String),
    #[error("feature not supported: {0}")]
    Unsupported(String),
    #[error("GPU device lost")]
    DeviceLost,
}

/// A device's mip blend curve could not be measured or failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("device error while calibrating {stage} mip weights: {source}")]
    Device {
        stage: ShaderStage,
        #[source]
        source: DeviceError,
    },
    #[error("{stage} {curve} mip weights are invalid: {reason}")]
    InvalidCurve { stage: ShaderStage, curve: &'static str, reason: String },
}

/// The oracle cannot produce a single expected value for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SampleError {
    /// An unfiltered load addressed a texel, layer, sample or level that does not exist.
    #[error("texel access is out of bounds")]
    OutOfBounds,
    /// The filter footprint spills over two cube face edges at once. GPUs disagree here.
    #[error("sample footprint touches a cube corner at mip level {mip_level}")]
    CubeCorner { mip_level: u32 },
}
