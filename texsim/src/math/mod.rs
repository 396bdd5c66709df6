pub mod scalar;
pub mod vec3;

pub use scalar::*;
pub use vec3::*;
