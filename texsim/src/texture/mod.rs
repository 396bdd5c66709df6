pub mod random;
pub mod software_texture;
pub mod texel;
pub mod texel_view;

pub use random::*;
pub use software_texture::*;
pub use texel::*;
pub use texel_view::*;
