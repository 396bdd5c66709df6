pub mod address;
pub mod call;
pub mod cube;
pub mod filter;
pub mod lod;
pub mod sampler;

pub use address::*;
pub use call::*;
pub use cube::*;
pub use filter::*;
pub use lod::*;
pub use sampler::*;
