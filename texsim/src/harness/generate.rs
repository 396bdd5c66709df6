//! Reproducible random inputs for texture builtins.

use crate::error::SampleError;
use crate::format::SampleType;
use crate::math::{Vec3, fract};
use crate::sampling::{
    Builtin, CubeFace, FilterMode, FloatArgs, IntArg, IntRepr, IntVector, LevelArg, Offset, SamplerState,
    TextureCall, call_level_selection, face_to_direction, software_texture_read,
};
use crate::texture::{SoftwareTexture, ViewDimension};
use crate::util::{HashInput, HashSequence};

/// Coordinates fall on this many subdivisions per texel, at subdivision centres, so they are
/// never on a texel edge or centre.
pub const SUBDIVISIONS_PER_TEXEL: u32 = 4;

/// Attempts at replacing a call that hits a cube corner or a nearest-mip rounding boundary.
const MAX_REGENERATE_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordMethod {
    /// Anywhere from one texture width before to two after.
    #[default]
    Random,
    /// Within a texel of the first and last texels of each axis.
    TextureEdges,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub count: usize,
    pub method: CoordMethod,
    /// Adds constant texel offsets where the builtin and view allow them.
    pub offset: bool,
    /// Representation of integer arguments.
    pub int_repr: IntRepr,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { count: 50, method: CoordMethod::Random, offset: false, int_repr: IntRepr::I32 }
    }
}

impl GenerationOptions {
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_method(mut self, method: CoordMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_offset(mut self, offset: bool) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_int_repr(mut self, int_repr: IntRepr) -> Self {
        self.int_repr = int_repr;
        self
    }
}

/// Builds `options.count` calls of `builtin` valid for `texture` and `sampler`.
///
/// The same seed inputs always produce the same calls. Every float argument is already rounded
/// to f32.
pub fn generate_texture_builtin_inputs(
    builtin: Builtin,
    texture: &SoftwareTexture,
    sampler: Option<&SamplerState>,
    options: &GenerationOptions,
    seed_inputs: &[HashInput],
) -> Vec<TextureCall> {
    let mut inputs = seed_inputs.to_vec();
    inputs.push(builtin.name().into());
    inputs.push(texture.format().name().into());
    inputs.push(texture.view_dimension().name().into());
    inputs.push(options.count.into());
    let mut seq = HashSequence::from_inputs(&inputs);
    let generator = CallGenerator { builtin, texture, options };

    (0..options.count)
        .map(|index| {
            let mut call = generator.call(&mut seq);
            for attempt in 1..MAX_REGENERATE_ATTEMPTS {
                match generator.untestable(&call, sampler) {
                    None => break,
                    Some(reason) => {
                        log::trace!("regenerating call {} (attempt {}): {}", index, attempt, reason);
                        call = generator.call(&mut seq);
                    }
                }
            }
            call
        })
        .collect()
}

struct CallGenerator<'a> {
    builtin: Builtin,
    texture: &'a SoftwareTexture,
    options: &'a GenerationOptions,
}

impl CallGenerator<'_> {
    fn int(&self, seq: &mut HashSequence, lo: i32, hi: i32) -> IntArg {
        match self.options.int_repr {
            IntRepr::I32 => IntArg::I32(seq.range_i32(lo, hi)),
            IntRepr::U32 => IntArg::U32(seq.range_i32(lo.max(0), hi) as u32),
        }
    }

    fn dims(&self) -> usize {
        self.texture.view_dimension().coord_components()
    }

    fn depth_view(&self) -> bool {
        let texture = self.texture;
        texture.format().sample_type_for_aspect(texture.view().aspect) == SampleType::Depth
    }

    /// A texel index along an axis of `size` texels.
    fn texel(&self, seq: &mut HashSequence, size: u32, wrap: bool) -> i64 {
        let size = size as i64;
        match (self.options.method, wrap) {
            (CoordMethod::Random, true) => seq.range_i32(-(size as i32), 2 * size as i32 - 1) as i64,
            (CoordMethod::Random, false) => seq.range_i32(0, size as i32 - 1) as i64,
            (CoordMethod::TextureEdges, true) => *seq.pick(&[-1, 0, size - 1, size]),
            (CoordMethod::TextureEdges, false) => *seq.pick(&[0, size - 1]),
        }
    }

    /// Normalized coordinate at a subdivision centre of a texel.
    fn grid_coord(&self, seq: &mut HashSequence, size: u32, wrap: bool) -> f64 {
        let texel = self.texel(seq, size, wrap) as f64;
        let sub = seq.range_i32(0, SUBDIVISIONS_PER_TEXEL as i32 - 1) as f64;
        (texel + (sub + 0.5) / SUBDIVISIONS_PER_TEXEL as f64) / size as f64
    }

    fn coords(&self, seq: &mut HashSequence) -> FloatArgs {
        let size = self.texture.level_size(0);
        if self.texture.view_dimension().is_cube() {
            let face = CubeFace::from_index(seq.range_i32(0, 5) as u32);
            let u = self.grid_coord(seq, size[0], false);
            let v = self.grid_coord(seq, size[0], false);
            let scale = *seq.pick(&[0.5, 1.0, 2.0]);
            let dir: Vec3 = face_to_direction(face, u, v) * scale;
            return dir.as_array().into_iter().collect();
        }
        (0..self.dims()).map(|axis| self.grid_coord(seq, size[axis], true)).collect()
    }

    fn array_index(&self, seq: &mut HashSequence) -> Option<IntArg> {
        if !self.texture.view_dimension().is_arrayed() {
            return None;
        }
        Some(self.int(seq, -1, self.texture.array_length() as i32))
    }

    fn offset(&self, seq: &mut HashSequence) -> Option<Offset> {
        let dimension = self.texture.view_dimension();
        if !self.options.offset || dimension == ViewDimension::D1 || dimension.is_cube() {
            return None;
        }
        Some((0..self.dims()).map(|_| seq.range_i32(-8, 7)).collect())
    }

    /// Target level for implicit and explicit derivatives, just past both ends of the view.
    fn target_level(&self, seq: &mut HashSequence) -> f64 {
        seq.range_f64(-1.5, self.texture.view_level_count() as f64 + 0.5)
    }

    /// Per-pixel coordinate steps whose derivatives select `level`. The first axis sets the
    /// level, the others step by up to as much.
    fn derivatives_for_level(&self, seq: &mut HashSequence, level: f64) -> (FloatArgs, FloatArgs) {
        let size = self.texture.level_size(0);
        let volume = self.texture.view_dimension() == ViewDimension::D3;
        let step = level.exp2();
        let mut ddx = FloatArgs::new();
        let mut ddy = FloatArgs::new();
        for axis in 0..self.dims() {
            // cube directions step across faces of the same size
            let texel = 1.0 / size[if volume { axis } else { axis.min(1) }] as f64;
            if axis == 0 {
                ddx.push(step * texel);
                ddy.push(0.0);
            } else {
                ddx.push(0.0);
                ddy.push(step * texel * seq.range_f64(0.25, 1.0));
            }
        }
        if seq.chance(0.5) { (ddy, ddx) } else { (ddx, ddy) }
    }

    fn derivative_mult(&self, seq: &mut HashSequence) -> FloatArgs {
        let level = self.target_level(seq);
        let (ddx, ddy) = self.derivatives_for_level(seq, level);
        // the multiplier is the x step on axis 0 and the y step on the others
        ddx.iter().zip(&ddy).map(|(x, y)| x.abs().max(y.abs())).collect()
    }

    fn depth_ref(&self, seq: &mut HashSequence) -> f64 {
        seq.range_f64(0.0, 1.0)
    }

    fn load(&self, seq: &mut HashSequence) -> TextureCall {
        let texture = self.texture;
        let level_count = texture.view_level_count() as i32;
        let level = if texture.sample_count() > 1 { None } else { Some(self.int(seq, -1, level_count)) };
        let size = texture.level_size(level.map_or(0, |l| l.value().clamp(0, level_count as i64 - 1) as u32));
        let values: Vec<i64> = (0..self.dims()).map(|axis| seq.range_i32(-1, size[axis] as i32) as i64).collect();
        let coords = match self.options.int_repr {
            IntRepr::I32 => IntVector::i32(&values.iter().map(|&v| v as i32).collect::<Vec<_>>()),
            IntRepr::U32 => IntVector::u32(&values.iter().map(|&v| v.max(0) as u32).collect::<Vec<_>>()),
        };
        let array_index = match texture.view_dimension() {
            ViewDimension::D2Array => Some(self.int(seq, -1, texture.view_layer_count() as i32)),
            _ => None,
        };
        let sample_index =
            if texture.sample_count() > 1 { Some(self.int(seq, -1, texture.sample_count() as i32)) } else { None };
        TextureCall::Load { coords, array_index, level, sample_index }
    }

    fn call(&self, seq: &mut HashSequence) -> TextureCall {
        let call = match self.builtin {
            Builtin::TextureLoad => self.load(seq),
            Builtin::TextureSample => TextureCall::Sample {
                coords: self.coords(seq),
                array_index: self.array_index(seq),
                offset: self.offset(seq),
                derivative_mult: Some(self.derivative_mult(seq)),
            },
            Builtin::TextureSampleBias => TextureCall::SampleBias {
                coords: self.coords(seq),
                array_index: self.array_index(seq),
                bias: seq.range_f64(-17.0, 17.0),
                offset: self.offset(seq),
                derivative_mult: Some(self.derivative_mult(seq)),
            },
            Builtin::TextureSampleLevel => {
                let coords = self.coords(seq);
                let array_index = self.array_index(seq);
                let level = if self.depth_view() {
                    LevelArg::Int(self.int(seq, 0, self.texture.view_level_count() as i32 - 1))
                } else {
                    LevelArg::Float(self.target_level(seq))
                };
                TextureCall::SampleLevel { coords, array_index, level, offset: self.offset(seq) }
            }
            Builtin::TextureSampleGrad => {
                let coords = self.coords(seq);
                let array_index = self.array_index(seq);
                let level = self.target_level(seq);
                let (ddx, ddy) = self.derivatives_for_level(seq, level);
                TextureCall::SampleGrad { coords, array_index, ddx, ddy, offset: self.offset(seq) }
            }
            Builtin::TextureSampleCompare => TextureCall::SampleCompare {
                coords: self.coords(seq),
                array_index: self.array_index(seq),
                depth_ref: self.depth_ref(seq),
                offset: self.offset(seq),
                derivative_mult: Some(self.derivative_mult(seq)),
            },
            Builtin::TextureSampleCompareLevel => TextureCall::SampleCompareLevel {
                coords: self.coords(seq),
                array_index: self.array_index(seq),
                depth_ref: self.depth_ref(seq),
                offset: self.offset(seq),
            },
            Builtin::TextureSampleBaseClampToEdge => TextureCall::SampleBaseClampToEdge { coords: self.coords(seq) },
            Builtin::TextureGather => {
                let component = if self.depth_view() { None } else { Some(seq.range_i32(0, 3) as u32) };
                TextureCall::Gather {
                    component,
                    coords: self.coords(seq),
                    array_index: self.array_index(seq),
                    offset: self.offset(seq),
                }
            }
            Builtin::TextureGatherCompare => TextureCall::GatherCompare {
                coords: self.coords(seq),
                array_index: self.array_index(seq),
                depth_ref: self.depth_ref(seq),
                offset: self.offset(seq),
            },
        };
        call.quantized()
    }

    /// Why the oracle cannot give a single answer for `call`, if it cannot.
    fn untestable(&self, call: &TextureCall, sampler: Option<&SamplerState>) -> Option<String> {
        let sampler = sampler?;
        if self.texture.view_dimension().is_cube() {
            if let Err(err @ SampleError::CubeCorner { .. }) = software_texture_read(call, self.texture, Some(sampler), None)
            {
                return Some(err.to_string());
            }
        }
        if sampler.mipmap_filter == FilterMode::Nearest && self.texture.view_level_count() > 1 {
            let selection = call_level_selection(call, self.texture, sampler, None)?;
            if (fract(selection.lod) - 0.5).abs() < 1.0 / 32.0 {
                return Some(format!("level {} rounds differently across GPUs", selection.lod));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TextureFormat;
    use crate::sampling::CompareFunction;
    use crate::texture::{PerTexelComponents, TexelView, TextureDescriptor, TextureDimension, ViewDescriptor};
    use rstest::rstest;

    fn texture(format: TextureFormat, size: [u32; 3], levels: u32, dimension: Option<ViewDimension>) -> SoftwareTexture {
        let descriptor = TextureDescriptor::new(format, TextureDimension::D2, size).with_mip_level_count(levels);
        let mut view = ViewDescriptor::whole(&descriptor);
        if let Some(dimension) = dimension {
            view = view.with_dimension(dimension);
        }
        let base = TexelView::from_generator(format, size, 1, move |c| {
            if format.has_depth() {
                PerTexelComponents::depth(c.x as f64 / size[0] as f64)
            } else {
                PerTexelComponents::rgba(c.x as f64 / size[0] as f64, 0.0, 0.0, 1.0)
            }
        });
        SoftwareTexture::with_generated_mips(descriptor, view, base)
    }

    #[test]
    fn same_inputs_same_calls() {
        let texture = texture(TextureFormat::Rgba8Unorm, [8, 8, 1], 3, None);
        let sampler = SamplerState::linear();
        let options = GenerationOptions::default().with_count(20).with_offset(true);
        let seed: [HashInput; 2] = ["same_inputs".into(), 7i32.into()];
        let a = generate_texture_builtin_inputs(Builtin::TextureSampleGrad, &texture, Some(&sampler), &options, &seed);
        let b = generate_texture_builtin_inputs(Builtin::TextureSampleGrad, &texture, Some(&sampler), &options, &seed);
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        let other: [HashInput; 2] = ["same_inputs".into(), 8i32.into()];
        let c = generate_texture_builtin_inputs(Builtin::TextureSampleGrad, &texture, Some(&sampler), &options, &other);
        assert_ne!(a, c);
    }

    #[rstest]
    #[case(CoordMethod::Random)]
    #[case(CoordMethod::TextureEdges)]
    fn coords_avoid_texel_edges_and_centres(#[case] method: CoordMethod) {
        let texture = texture(TextureFormat::Rgba8Unorm, [8, 4, 1], 1, None);
        let options = GenerationOptions::default().with_method(method);
        let calls = generate_texture_builtin_inputs(Builtin::TextureSampleBaseClampToEdge, &texture, None, &options, &[]);
        for call in &calls {
            let coords = call.float_coords().unwrap();
            for (axis, c) in coords.iter().enumerate() {
                let t = c * [8.0, 4.0][axis];
                let sub = fract(t) * SUBDIVISIONS_PER_TEXEL as f64;
                assert!((fract(sub) - 0.5).abs() < 1e-6, "{} on axis {}", c, axis);
                assert!((-8.0..16.0).contains(&t));
            }
        }
    }

    #[test]
    fn calls_are_valid_for_the_view() {
        let array = texture(TextureFormat::Rgba8Unorm, [8, 8, 3], 2, None);
        let sampler = SamplerState::linear();
        let options = GenerationOptions::default().with_offset(true).with_int_repr(IntRepr::U32);
        for builtin in [Builtin::TextureLoad, Builtin::TextureSampleLevel, Builtin::TextureGather, Builtin::TextureSample] {
            for call in generate_texture_builtin_inputs(builtin, &array, Some(&sampler), &options, &[]) {
                call.validate(&array);
                assert_eq!(call.builtin(), builtin);
                if let Some(index) = call.array_index() {
                    assert!((0..=3).contains(&index.value()));
                }
            }
        }
    }

    #[test]
    fn cube_calls_avoid_corners() {
        let cube = texture(TextureFormat::Rgba8Unorm, [2, 2, 6], 1, Some(ViewDimension::Cube));
        let sampler = SamplerState::linear();
        let options = GenerationOptions::default().with_count(100).with_method(CoordMethod::TextureEdges);
        let calls = generate_texture_builtin_inputs(Builtin::TextureSampleLevel, &cube, Some(&sampler), &options, &[]);
        for call in &calls {
            assert_eq!(call.coord_count(), 3);
            assert!(software_texture_read(call, &cube, Some(&sampler), None).is_ok(), "{}", call);
        }
    }

    #[test]
    fn nearest_mip_levels_avoid_rounding_boundary() {
        let texture = texture(TextureFormat::Rgba8Unorm, [16, 16, 1], 4, None);
        let sampler = SamplerState::nearest();
        let options = GenerationOptions::default().with_count(100);
        for call in generate_texture_builtin_inputs(Builtin::TextureSampleLevel, &texture, Some(&sampler), &options, &[]) {
            let selection = call_level_selection(&call, &texture, &sampler, None).unwrap();
            assert!((fract(selection.lod) - 0.5).abs() >= 1.0 / 32.0, "{}", call);
        }
    }

    #[test]
    fn depth_calls() {
        let depth = texture(TextureFormat::Depth32Float, [4, 4, 1], 2, None);
        let sampler = SamplerState::nearest().with_compare(CompareFunction::Less);
        let options = GenerationOptions::default();
        for call in generate_texture_builtin_inputs(Builtin::TextureGatherCompare, &depth, Some(&sampler), &options, &[]) {
            let depth_ref = call.depth_ref().unwrap();
            assert!((0.0..=1.0).contains(&depth_ref));
        }
        for call in generate_texture_builtin_inputs(Builtin::TextureSampleLevel, &depth, Some(&sampler), &options, &[]) {
            let TextureCall::SampleLevel { level, .. } = call else { unreachable!() };
            assert!(matches!(level, LevelArg::Int(IntArg::I32(0 | 1))));
        }
    }
}
