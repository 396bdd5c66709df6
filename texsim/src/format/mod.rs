pub mod codec;
pub mod info;

pub use codec::*;
pub use info::*;
