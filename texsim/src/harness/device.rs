use super::program::ProgramSource;
use crate::error::DeviceError;
use crate::format::{SampleType, TextureFormat};
use crate::sampling::SamplerState;
use crate::texture::{TextureDescriptor, ViewDescriptor};
use std::fmt;
use std::future::Future;

/// Identifies a device for as long as it lives. Caches are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 3] = [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Compute];

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The texture a program reads and how it is viewed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureBinding {
    pub descriptor: TextureDescriptor,
    pub view: ViewDescriptor,
}

impl TextureBinding {
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn sample_type(&self) -> SampleType {
        self.descriptor.format.sample_type_for_aspect(self.view.aspect)
    }

    pub fn multisampled(&self) -> bool {
        self.descriptor.sample_count > 1
    }
}

/// Everything a program run reads besides the program itself.
pub struct ProgramBindings<'a, T> {
    pub texture: &'a T,
    pub binding: TextureBinding,
    pub sampler: Option<&'a SamplerState>,
    /// Packed call arguments, `words_per_call` words for each call.
    pub data: &'a [u32],
    pub call_count: usize,
}

/// The GPU the oracle is checked against.
///
/// Round trips are asynchronous; resources are released when their handles drop.
pub trait GpuDevice {
    type Texture;
    type Program;

    fn id(&self) -> DeviceId;

    /// Creates a texture and uploads `levels`, one byte vector per mip level in the layout
    /// [`TextureDescriptor::level_byte_size`] describes.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        levels: &[Vec<u8>],
    ) -> impl Future<Output = Result<Self::Texture, DeviceError>>;

    /// Reads every texel of one level back as RGBA floats, decoding through `view_format`.
    /// Texels come back in x, y, z order.
    fn read_texture_level(
        &self,
        texture: &Self::Texture,
        level: u32,
        view_format: TextureFormat,
    ) -> impl Future<Output = Result<Vec<[f32; 4]>, DeviceError>>;

    fn create_program(&self, source: &ProgramSource) -> impl Future<Output = Result<Self::Program, DeviceError>>;

    /// Runs `bindings.call_count` calls and returns each call's result as raw bits.
    fn run_program(
        &self,
        program: &Self::Program,
        bindings: ProgramBindings<'_, Self::Texture>,
    ) -> impl Future<Output = Result<Vec<[u32; 4]>, DeviceError>>;
}
