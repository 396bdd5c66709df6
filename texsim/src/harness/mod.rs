//! Runs texture calls on a GPU and checks them against the software sampler.

pub mod calibration;
pub mod compare;
pub mod context;
pub mod device;
pub mod diagnostics;
pub mod execute;
pub mod generate;
pub mod program;
pub mod upload;

pub use calibration::*;
pub use compare::*;
pub use context::*;
pub use device::*;
pub use diagnostics::*;
pub use execute::*;
pub use generate::*;
pub use program::*;
pub use upload::*;
