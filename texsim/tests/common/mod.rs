//! A `GpuDevice` that runs programs with the software sampler.
//!
//! It stands in for a GPU whose quirks are known: its mip blend curve is configurable, and
//! faults can be injected to check that mismatches are caught and diagnosed.
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Poll;
use texsim::format::{TextureFormat, decode_texel, srgb_to_linear};
use texsim::harness::{DeviceId, GpuDevice, ProgramBindings, ProgramSource, ProgramKey};
use texsim::sampling::{AddressMode, MipWeightCurve, SamplerState, software_texture_read, view_texel};
use texsim::texture::{
    ComponentTag, PerTexelComponents, SoftwareTexture, TexelView, TextureDescriptor, texel_views_from_bytes,
};
use texsim::DeviceError;

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Mip weights that snap the fraction to sixteenths, like many GPUs do.
pub fn stepped_curve() -> MipWeightCurve {
    let steps: Vec<f64> = (0..=64).map(|i| (i / 4) as f64 / 16.0).collect();
    MipWeightCurve { sample_level_weights: steps.clone(), gradient_weights: steps }
}

#[derive(Default)]
struct Counters {
    textures: Cell<usize>,
    programs: Cell<usize>,
    runs: Cell<usize>,
}

struct DeviceState {
    id: DeviceId,
    curve: MipWeightCurve,
    /// Ignores the sampler's address modes and uses this one.
    forced_address_mode: Cell<Option<AddressMode>>,
    lost: Cell<bool>,
    /// Suspends every program run once before it executes.
    yields: Cell<bool>,
    counters: Counters,
}

#[derive(Clone)]
pub struct SoftwareDevice {
    state: Rc<DeviceState>,
}

pub struct SoftwareGpuTexture {
    descriptor: TextureDescriptor,
    levels: Vec<Vec<u8>>,
}

pub struct SoftwareProgram {
    key: ProgramKey,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::with_curve(MipWeightCurve::linear())
    }

    pub fn with_curve(curve: MipWeightCurve) -> Self {
        let id = DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            state: Rc::new(DeviceState {
                id,
                curve,
                forced_address_mode: Cell::new(None),
                lost: Cell::new(false),
                yields: Cell::new(false),
                counters: Counters::default(),
            }),
        }
    }

    pub fn force_address_mode(&self, mode: AddressMode) {
        self.state.forced_address_mode.set(Some(mode));
    }

    pub fn lose(&self) {
        self.state.lost.set(true);
    }

    pub fn yield_before_runs(&self) {
        self.state.yields.set(true);
    }

    pub fn textures_created(&self) -> usize {
        self.state.counters.textures.get()
    }

    pub fn programs_created(&self) -> usize {
        self.state.counters.programs.get()
    }

    pub fn runs(&self) -> usize {
        self.state.counters.runs.get()
    }

    fn check_alive(&self) -> Result<(), DeviceError> {
        if self.state.lost.get() { Err(DeviceError::DeviceLost) } else { Ok(()) }
    }
}

/// Returns `Pending` once, waking itself, so other futures of a join get polled.
async fn yield_now() {
    let mut yielded = false;
    futures::future::poll_fn(|cx| {
        if yielded {
            return Poll::Ready(());
        }
        yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    })
    .await
}

/// Stand-in block decoder: every texel of a block takes its colour from the block's first bytes.
fn decode_compressed_level(descriptor: &TextureDescriptor, level: u32, bytes: &[u8]) -> Vec<[f32; 4]> {
    let format = descriptor.format;
    let [w, h, d] = descriptor.mip_level_size(level);
    let (bw, bh) = format.block_dimensions();
    let blocks_x = w.div_ceil(bw);
    let blocks_y = h.div_ceil(bh);
    let block_bytes = format.bytes_per_block() as usize;
    let mut texels = Vec::with_capacity((w * h * d) as usize);
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                let block = ((z * blocks_y + y / bh) * blocks_x + x / bw) as usize;
                let b = &bytes[block * block_bytes..];
                texels.push([b[0], b[1], b[2], b[3]].map(|v| v as f32 / 255.0));
            }
        }
    }
    texels
}

fn texel_to_rgba(format: TextureFormat, texel: &PerTexelComponents) -> [f32; 4] {
    if format.has_depth() {
        return [texel.get(ComponentTag::Depth).unwrap_or(0.0) as f32, 0.0, 0.0, 1.0];
    }
    if format.has_stencil() {
        return [texel.get(ComponentTag::Stencil).unwrap_or(0.0) as f32, 0.0, 0.0, 1.0];
    }
    let [r, g, b] = [ComponentTag::R, ComponentTag::G, ComponentTag::B].map(|t| texel.get(t).unwrap_or(0.0) as f32);
    [r, g, b, texel.get(ComponentTag::A).unwrap_or(1.0) as f32]
}

impl SoftwareGpuTexture {
    /// The texels as the device's samplers see them.
    fn texel_views(&self) -> Vec<TexelView> {
        let descriptor = &self.descriptor;
        let format = descriptor.format;
        if !format.is_compressed() {
            return texel_views_from_bytes(descriptor, &self.levels);
        }
        (0..descriptor.mip_level_count)
            .map(|level| {
                let texels = decode_compressed_level(descriptor, level, &self.levels[level as usize])
                    .into_iter()
                    .map(|rgba| {
                        let mut texel = PerTexelComponents::new();
                        for &tag in format.components() {
                            let v = rgba[tag.index()] as f64;
                            let srgb = format.is_srgb() && tag != ComponentTag::A;
                            texel.set(tag, if srgb { srgb_to_linear(v) } else { v });
                        }
                        texel
                    })
                    .collect();
                TexelView::from_components(format, descriptor.mip_level_size(level), 1, texels)
            })
            .collect()
    }
}

impl GpuDevice for SoftwareDevice {
    type Texture = SoftwareGpuTexture;
    type Program = SoftwareProgram;

    fn id(&self) -> DeviceId {
        self.state.id
    }

    async fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        levels: &[Vec<u8>],
    ) -> Result<SoftwareGpuTexture, DeviceError> {
        self.check_alive()?;
        if levels.len() != descriptor.mip_level_count as usize {
            return Err(DeviceError::ResourceCreationFailed(format!("{} levels uploaded", levels.len())));
        }
        for (level, bytes) in levels.iter().enumerate() {
            if bytes.len() != descriptor.level_byte_size(level as u32) {
                return Err(DeviceError::ResourceCreationFailed(format!("level {} has {} bytes", level, bytes.len())));
            }
        }
        self.state.counters.textures.set(self.textures_created() + 1);
        Ok(SoftwareGpuTexture { descriptor: *descriptor, levels: levels.to_vec() })
    }

    async fn read_texture_level(
        &self,
        texture: &SoftwareGpuTexture,
        level: u32,
        view_format: TextureFormat,
    ) -> Result<Vec<[f32; 4]>, DeviceError> {
        self.check_alive()?;
        let descriptor = &texture.descriptor;
        let bytes = &texture.levels[level as usize];
        if descriptor.format.is_compressed() {
            return Ok(decode_compressed_level(descriptor, level, bytes));
        }
        let size = view_format.bytes_per_block() as usize;
        Ok(bytes.chunks_exact(size).map(|texel| texel_to_rgba(view_format, &decode_texel(view_format, texel))).collect())
    }

    async fn create_program(&self, source: &ProgramSource) -> Result<SoftwareProgram, DeviceError> {
        self.check_alive()?;
        if source.wgsl.is_empty() {
            return Err(DeviceError::ProgramCompilationFailed("empty module".to_string()));
        }
        self.state.counters.programs.set(self.programs_created() + 1);
        Ok(SoftwareProgram { key: source.key.clone() })
    }

    async fn run_program(
        &self,
        program: &SoftwareProgram,
        bindings: ProgramBindings<'_, SoftwareGpuTexture>,
    ) -> Result<Vec<[u32; 4]>, DeviceError> {
        self.check_alive()?;
        if self.state.yields.get() {
            yield_now().await;
        }
        self.state.counters.runs.set(self.runs() + 1);
        let texture =
            SoftwareTexture::new(bindings.binding.descriptor, bindings.binding.view, bindings.texture.texel_views());
        let sampler: Option<SamplerState> = bindings.sampler.map(|s| match self.state.forced_address_mode.get() {
            Some(mode) => s.clone().with_address_mode(mode),
            None => s.clone(),
        });
        let shape = &program.key.shape;
        let result_kind = program.key.result_kind();
        let words = shape.words_per_call();
        Ok((0..bindings.call_count)
            .map(|i| {
                let call = shape.unpack(&bindings.data[i * words..(i + 1) * words]);
                let value = match software_texture_read(&call, &texture, sampler.as_ref(), Some(&self.state.curve)) {
                    Ok(read) => read.value,
                    Err(_) => view_texel(&texture, &PerTexelComponents::new()),
                };
                result_kind.encode(&value)
            })
            .collect())
    }
}
