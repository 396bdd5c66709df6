//! The software sampler: expected results of texture builtins.

use super::address::apply_address_mode;
use super::call::{TextureCall, FloatArgs};
use super::cube::{CubeFace, direction_to_face, project_cube_gradient, wrap_cube_texel};
use super::lod::{
    LevelSelection, MipWeightCurve, MipWeightKind, implicit_derivatives, lod_from_gradients, select_levels,
};
use super::sampler::{CompareFunction, FilterMode, SamplerState};
use crate::error::SampleError;
use crate::math::{Vec3, quantize_to_f32};
use crate::texture::{ComponentTag, PerTexelComponents, SoftwareTexture, TexelCoord, ViewDimension};
use arrayvec::ArrayVec;

/// Two levels of a 3D linear footprint.
pub const MAX_SAMPLE_POINTS: usize = 16;

/// One texel contributing to a result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Level of the view.
    pub level: u32,
    /// Texel within the level. `z` is the 3D slice or the view-relative layer, which for cube
    /// views is `cube * 6 + face`.
    pub coord: TexelCoord,
    pub weight: f64,
}

pub type SamplePoints = ArrayVec<SamplePoint, MAX_SAMPLE_POINTS>;

#[derive(Debug, Clone, PartialEq)]
pub struct TextureReadResult {
    pub value: PerTexelComponents,
    pub sample_points: SamplePoints,
}

/// What a shader sees when it reads `texel` through the texture's view: the aspect's value in
/// R for depth and stencil, otherwise RGBA with absent channels filled with (0, 0, 1).
pub fn view_texel(texture: &SoftwareTexture, texel: &PerTexelComponents) -> PerTexelComponents {
    let format = texture.format();
    if let Some(tag) = format.aspect_component(texture.view().aspect) {
        return PerTexelComponents::new().with(ComponentTag::R, texel.get(tag).unwrap_or(0.0));
    }
    PerTexelComponents::rgba(
        texel.get(ComponentTag::R).unwrap_or(0.0),
        texel.get(ComponentTag::G).unwrap_or(0.0),
        texel.get(ComponentTag::B).unwrap_or(0.0),
        texel.get(ComponentTag::A).unwrap_or(1.0),
    )
}

/// Evaluates `call` against `texture`.
///
/// `sampler` must be present for every builtin but `textureLoad`. `mip_weights` is the device's
/// calibrated blend curve; without it mips blend linearly.
pub fn software_texture_read(
    call: &TextureCall,
    texture: &SoftwareTexture,
    sampler: Option<&SamplerState>,
    mip_weights: Option<&MipWeightCurve>,
) -> Result<TextureReadResult, SampleError> {
    call.validate(texture);
    if let TextureCall::Load { .. } = call {
        return load(call, texture);
    }
    let Some(sampler) = sampler else {
        panic!("{} needs a sampler", call.builtin());
    };
    let compare = match call.depth_ref() {
        Some(depth_ref) => match sampler.compare {
            Some(function) => Some(Comparison { function, depth_ref }),
            None => panic!("{} needs a comparison sampler", call.builtin()),
        },
        None => None,
    };
    let reader = LevelReader { texture, sampler, call, compare };
    if call.builtin().is_gather() {
        return reader.gather();
    }

    let Some(selection) = call_level_selection(call, texture, sampler, mip_weights) else {
        unreachable!()
    };
    log::trace!("{}: lod {} with {:?} filter", call, selection.lod, selection.filter);

    let mut value = PerTexelComponents::new();
    let mut sample_points = SamplePoints::new();
    for &(level, weight) in selection.levels() {
        let level_value = reader.filter_level(level, selection.filter, weight, &mut sample_points)?;
        value = value.add_weighted(&level_value, weight);
    }
    Ok(TextureReadResult { value, sample_points })
}

/// Levels a sampling call reads and how they blend. `None` for calls without level selection:
/// loads and gathers.
pub fn call_level_selection(
    call: &TextureCall,
    texture: &SoftwareTexture,
    sampler: &SamplerState,
    mip_weights: Option<&MipWeightCurve>,
) -> Option<LevelSelection> {
    let selection = match call {
        TextureCall::SampleLevel { level, .. } => select_levels(
            level.value(),
            0.0,
            sampler,
            texture.view_level_count(),
            MipWeightKind::SampleLevel,
            mip_weights,
        ),
        TextureCall::SampleCompareLevel { .. } | TextureCall::SampleBaseClampToEdge { .. } => LevelSelection {
            lod: 0.0,
            filter: sampler.mag_filter,
            levels: [(0, 1.0), (0, 0.0)],
            level_count: 1,
        },
        TextureCall::SampleGrad { ddx, ddy, .. } => {
            let lod = gradient_lod(texture, call, ddx, ddy);
            select_levels(lod, 0.0, sampler, texture.view_level_count(), MipWeightKind::Gradient, mip_weights)
        }
        TextureCall::Sample { derivative_mult, .. }
        | TextureCall::SampleBias { derivative_mult, .. }
        | TextureCall::SampleCompare { derivative_mult, .. } => {
            let (ddx, ddy) = implicit_derivatives(derivative_mult.as_ref().map(|m| m.as_slice()));
            let dims = call.coord_count();
            let lod = gradient_lod(texture, call, &ddx[..dims], &ddy[..dims]);
            let bias = match call {
                TextureCall::SampleBias { bias, .. } => *bias,
                _ => 0.0,
            };
            select_levels(lod, bias, sampler, texture.view_level_count(), MipWeightKind::Gradient, mip_weights)
        }
        TextureCall::Load { .. } | TextureCall::Gather { .. } | TextureCall::GatherCompare { .. } => return None,
    };
    Some(selection)
}

/// Level of detail from coordinate derivatives, in level 0 texel space.
fn gradient_lod(texture: &SoftwareTexture, call: &TextureCall, ddx: &[f64], ddy: &[f64]) -> f64 {
    let size = texture.level_size(0).map(|v| v as f64);
    if texture.view_dimension().is_cube() {
        let coords = call.float_coords().map(|c| Vec3::from_slice(c)).unwrap_or_default();
        let dx = project_cube_gradient(coords, Vec3::from_slice(ddx));
        let dy = project_cube_gradient(coords, Vec3::from_slice(ddy));
        lod_from_gradients(&dx, &dy, &size, 2)
    } else {
        lod_from_gradients(ddx, ddy, &size, ddx.len())
    }
}

#[derive(Debug, Clone, Copy)]
struct Comparison {
    function: CompareFunction,
    depth_ref: f64,
}

/// Where on a level a call samples.
struct LevelTarget {
    /// Normalized coordinate per filtered axis.
    coords: ArrayVec<f64, 3>,
    /// Texel offset per filtered axis.
    offset: ArrayVec<i32, 3>,
    size: [u32; 3],
    face: Option<CubeFace>,
    /// Layer of 2D arrays, first face of the cube in cube views.
    base_layer: u32,
}

struct LevelReader<'a> {
    texture: &'a SoftwareTexture,
    sampler: &'a SamplerState,
    call: &'a TextureCall,
    compare: Option<Comparison>,
}

impl LevelReader<'_> {
    fn target(&self, level: u32) -> LevelTarget {
        let texture = self.texture;
        let coords: &FloatArgs = match self.call.float_coords() {
            Some(coords) => coords,
            None => unreachable!(),
        };
        let size = texture.level_size(level);
        let layer = match self.call.array_index() {
            Some(index) => index.value().clamp(0, texture.array_length() as i64 - 1) as u32,
            None => 0,
        };
        let offset: ArrayVec<i32, 3> = match self.call.offset() {
            Some(offset) => offset.clone(),
            None => (0..coords.len()).map(|_| 0).collect(),
        };
        if texture.view_dimension().is_cube() {
            let face = direction_to_face(Vec3::from_slice(coords));
            return LevelTarget {
                coords: [face.u, face.v].into_iter().collect(),
                offset: [0, 0].into_iter().collect(),
                size,
                face: Some(face.face),
                base_layer: layer * 6,
            };
        }
        let mut coords = coords.clone();
        if let TextureCall::SampleBaseClampToEdge { .. } = self.call {
            for (axis, c) in coords.iter_mut().enumerate() {
                let half_texel = 0.5 / size[axis] as f64;
                *c = c.clamp(half_texel, 1.0 - half_texel);
            }
        }
        LevelTarget { coords, offset, size, face: None, base_layer: layer }
    }

    /// Texel an integer footprint position resolves to, or `None` at a cube corner.
    fn resolve(&self, target: &LevelTarget, position: &[i64]) -> Option<(u32, u32, u32)> {
        match target.face {
            Some(face) => {
                let (face, x, y) = wrap_cube_texel(face, position[0], position[1], target.size[0])?;
                Some((x, y, target.base_layer + face.index()))
            }
            None => {
                let address = |axis: usize| match position.get(axis) {
                    Some(&p) => apply_address_mode(self.sampler.address_mode(axis), p, target.size[axis]),
                    None => 0,
                };
                let z = match self.texture.view_dimension() {
                    ViewDimension::D3 => address(2),
                    _ => target.base_layer,
                };
                Some((address(0), address(1), z))
            }
        }
    }

    fn read(&self, level: u32, x: u32, y: u32, z: u32) -> PerTexelComponents {
        let texel = view_texel(self.texture, &self.texture.texel(level, x, y, z, 0));
        match self.compare {
            Some(Comparison { function, depth_ref }) => {
                let depth = texel.get(ComponentTag::R).unwrap_or(0.0);
                let pass = function.passes(depth_ref, depth);
                PerTexelComponents::new().with(ComponentTag::R, if pass { 1.0 } else { 0.0 })
            }
            None => texel,
        }
    }

    /// Integer positions and weights of the linear footprint, axis 0 varying fastest.
    fn linear_footprint(target: &LevelTarget) -> ArrayVec<(ArrayVec<i64, 3>, f64), 8> {
        let dims = target.coords.len();
        let mut base = ArrayVec::<i64, 3>::new();
        let mut fraction = ArrayVec::<f64, 3>::new();
        for axis in 0..dims {
            let c = target.coords[axis] * target.size[axis] as f64 + target.offset[axis] as f64 - 0.5;
            base.push(c.floor() as i64);
            fraction.push(c - c.floor());
        }
        (0..1usize << dims)
            .map(|corner| {
                let mut position = ArrayVec::new();
                let mut weight = 1.0;
                for axis in 0..dims {
                    let upper = corner >> axis & 1 == 1;
                    position.push(base[axis] + upper as i64);
                    weight *= if upper { fraction[axis] } else { 1.0 - fraction[axis] };
                }
                (position, weight)
            })
            .collect()
    }

    fn filter_level(
        &self,
        level: u32,
        filter: FilterMode,
        level_weight: f64,
        points: &mut SamplePoints,
    ) -> Result<PerTexelComponents, SampleError> {
        let target = self.target(level);
        let footprint: ArrayVec<(ArrayVec<i64, 3>, f64), 8> = match filter {
            FilterMode::Nearest => {
                let mut position = ArrayVec::new();
                for axis in 0..target.coords.len() {
                    let t = quantize_to_f32(target.coords[axis] * target.size[axis] as f64 + target.offset[axis] as f64);
                    let mut texel = t.floor() as i64;
                    if target.face.is_some() {
                        texel = texel.clamp(0, target.size[axis] as i64 - 1);
                    }
                    position.push(texel);
                }
                [(position, 1.0)].into_iter().collect()
            }
            FilterMode::Linear => Self::linear_footprint(&target),
        };

        let mut value = PerTexelComponents::new();
        for (position, weight) in footprint {
            let (x, y, z) = self.resolve(&target, &position).ok_or(SampleError::CubeCorner { mip_level: level })?;
            if weight == 0.0 {
                continue;
            }
            value = value.add_weighted(&self.read(level, x, y, z), weight);
            if level_weight > 0.0 {
                points.push(SamplePoint { level, coord: TexelCoord::new(x, y, z), weight: weight * level_weight });
            }
        }
        Ok(value)
    }

    /// The four texels of the level 0 linear footprint, one per output channel.
    fn gather(&self) -> Result<TextureReadResult, SampleError> {
        let target = self.target(0);
        let footprint = Self::linear_footprint(&target);
        let channel = match self.call {
            TextureCall::Gather { component: Some(c), .. } => ComponentTag::RGBA[*c as usize],
            _ => ComponentTag::R,
        };
        let mut texels = ArrayVec::<(f64, TexelCoord), 4>::new();
        for (position, _) in &footprint {
            let (x, y, z) = self.resolve(&target, position).ok_or(SampleError::CubeCorner { mip_level: 0 })?;
            let value = self.read(0, x, y, z).get(channel).unwrap_or(0.0);
            texels.push((value, TexelCoord::new(x, y, z)));
        }
        // footprint order is (u0,v0) (u1,v0) (u0,v1) (u1,v1); gather returns x=(u0,v1) y=(u1,v1) z=(u1,v0) w=(u0,v0)
        let order = [2, 3, 1, 0];
        let [x, y, z, w] = order.map(|i| texels[i].0);
        let sample_points =
            order.iter().map(|&i| SamplePoint { level: 0, coord: texels[i].1, weight: 1.0 }).collect();
        Ok(TextureReadResult { value: PerTexelComponents::rgba(x, y, z, w), sample_points })
    }
}

fn load(call: &TextureCall, texture: &SoftwareTexture) -> Result<TextureReadResult, SampleError> {
    let TextureCall::Load { coords, array_index, level, sample_index } = call else {
        unreachable!()
    };
    let level = level.map_or(0, |l| l.value());
    if level < 0 || level >= texture.view_level_count() as i64 {
        return Err(SampleError::OutOfBounds);
    }
    let level = level as u32;
    let size = texture.level_size(level);
    let mut position = [0u32; 3];
    for (axis, &c) in coords.values.iter().enumerate() {
        if c < 0 || c >= size[axis] as i64 {
            return Err(SampleError::OutOfBounds);
        }
        position[axis] = c as u32;
    }
    if let Some(index) = array_index {
        let index = index.value();
        if index < 0 || index >= texture.view_layer_count() as i64 {
            return Err(SampleError::OutOfBounds);
        }
        position[2] = index as u32;
    }
    let sample = sample_index.map_or(0, |s| s.value());
    if sample < 0 || sample >= texture.sample_count() as i64 {
        return Err(SampleError::OutOfBounds);
    }
    let [x, y, z] = position;
    let value = view_texel(texture, &texture.texel(level, x, y, z, sample as u32));
    let mut sample_points = SamplePoints::new();
    sample_points.push(SamplePoint { level, coord: TexelCoord::new(x, y, z).with_sample(sample as u32), weight: 1.0 });
    Ok(TextureReadResult { value, sample_points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{TextureAspect, TextureFormat};
    use crate::sampling::{AddressMode, IntArg, IntVector, LevelArg, float_args, offset};
    use crate::texture::{TexelView, TextureDescriptor, TextureDimension, ViewDescriptor};
    use rstest::rstest;

    const HALF: f64 = 128.0 / 255.0;

    /// Level `n` of an rgba8unorm texture is uniformly `values[n]`.
    fn uniform_levels(size: u32, values: &[f64]) -> SoftwareTexture {
        let descriptor = TextureDescriptor::new(TextureFormat::Rgba8Unorm, TextureDimension::D2, [size, size, 1])
            .with_mip_level_count(values.len() as u32);
        let levels = values
            .iter()
            .enumerate()
            .map(|(level, &v)| {
                TexelView::from_generator(TextureFormat::Rgba8Unorm, descriptor.mip_level_size(level as u32), 1, move |_| {
                    PerTexelComponents::rgba(v, v, v, 1.0)
                })
            })
            .collect();
        SoftwareTexture::new(descriptor, ViewDescriptor::whole(&descriptor), levels)
    }

    /// 2x2 texture holding 1, 2, 3, 4 in row order, or a quarter of that as depth.
    fn ramp_2x2(format: TextureFormat) -> SoftwareTexture {
        let descriptor = TextureDescriptor::new(format, TextureDimension::D2, [2, 2, 1]);
        let level = TexelView::from_generator(format, [2, 2, 1], 1, move |c| {
            let v = (c.y * 2 + c.x + 1) as f64;
            if format.has_depth() {
                PerTexelComponents::depth(v / 4.0)
            } else {
                PerTexelComponents::new().with(ComponentTag::R, v)
            }
        });
        SoftwareTexture::new(descriptor, ViewDescriptor::whole(&descriptor), vec![level])
    }

    fn sample_level(coords: &[f64], level: f64) -> TextureCall {
        TextureCall::SampleLevel { coords: float_args(coords), array_index: None, level: LevelArg::Float(level), offset: None }
    }

    fn red(result: &TextureReadResult) -> f64 {
        result.value.get(ComponentTag::R).unwrap_or(f64::NAN)
    }

    #[test]
    fn nearest_mip_selects_black_then_white() {
        let texture = uniform_levels(2, &[0.0, 1.0]);
        let sampler = SamplerState::nearest();
        let at = |level| red(&software_texture_read(&sample_level(&[0.5, 0.5], level), &texture, Some(&sampler), None).unwrap());
        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(1.0), 1.0);
        assert_eq!(at(0.25), 0.0);
        assert_eq!(at(0.75), 1.0);
    }

    #[rstest]
    #[case(AddressMode::ClampToEdge)]
    #[case(AddressMode::Repeat)]
    #[case(AddressMode::MirrorRepeat)]
    fn bilinear_of_uniform_texture_is_uniform(#[case] mode: AddressMode) {
        let texture = uniform_levels(2, &[0.4]);
        let sampler = SamplerState::linear().with_address_mode(mode);
        for coords in [[0.1, 0.2], [0.5, 0.5], [0.99, 0.01], [-3.3, 7.7]] {
            let result = software_texture_read(&sample_level(&coords, 0.0), &texture, Some(&sampler), None).unwrap();
            assert!((red(&result) - 102.0 / 255.0).abs() < 1e-12, "{:?} at {:?}", mode, coords);
            let total: f64 = result.sample_points.iter().map(|p| p.weight).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn bilinear_weights() {
        let texture = ramp_2x2(TextureFormat::R32Float);
        let sampler = SamplerState::linear();
        // centre of the texture: all four texels equally
        let result = software_texture_read(&sample_level(&[0.5, 0.5], 0.0), &texture, Some(&sampler), None).unwrap();
        assert_eq!(red(&result), 2.5);
        assert_eq!(result.sample_points.len(), 4);
        // centre of texel (1, 0)
        let result = software_texture_read(&sample_level(&[0.75, 0.25], 0.0), &texture, Some(&sampler), None).unwrap();
        assert_eq!(red(&result), 2.0);
        assert_eq!(result.sample_points.len(), 1);
        assert_eq!(result.value.get(ComponentTag::A), Some(1.0));
    }

    #[test]
    fn nearest_with_offset_and_repeat() {
        let texture = ramp_2x2(TextureFormat::R32Float);
        let sampler = SamplerState::nearest().with_address_mode(AddressMode::Repeat);
        let call = TextureCall::SampleLevel {
            coords: float_args(&[0.25, 0.25]),
            array_index: None,
            level: LevelArg::Float(0.0),
            offset: Some(offset(&[1, 3])),
        };
        let result = software_texture_read(&call, &texture, Some(&sampler), None).unwrap();
        assert_eq!(red(&result), 4.0);
    }

    #[test]
    fn trilinear_blend_uses_weights() {
        let texture = uniform_levels(4, &[0.0, 1.0, 0.0]);
        let sampler = SamplerState::linear();
        let mut curve = MipWeightCurve::linear();
        curve.sample_level_weights = (0..=64).map(|i| if i < 16 { 0.0 } else { (i as f64 - 16.0) / 48.0 }).collect();
        let call = sample_level(&[0.5, 0.5], 0.25);
        let result = software_texture_read(&call, &texture, Some(&sampler), Some(&curve)).unwrap();
        assert_eq!(red(&result), 0.0);
        let result = software_texture_read(&call, &texture, Some(&sampler), None).unwrap();
        assert_eq!(red(&result), 0.25);
    }

    #[test]
    fn whole_level_reads_only_that_level() {
        let descriptor =
            TextureDescriptor::new(TextureFormat::Rgba8Unorm, TextureDimension::D2, [8, 8, 1]).with_mip_level_count(3);
        let levels = (0..3)
            .map(|level| {
                TexelView::from_generator(TextureFormat::Rgba8Unorm, descriptor.mip_level_size(level), 1, move |c| {
                    let v = if level == 1 { (c.x + c.y * 4) as f64 / 16.0 } else { 1.0 };
                    PerTexelComponents::rgba(v, 1.0 - v, 0.0, 1.0)
                })
            })
            .collect();
        let texture = SoftwareTexture::new(descriptor, ViewDescriptor::whole(&descriptor), levels);
        let sampler = SamplerState::linear();
        let mut curve = MipWeightCurve::linear();
        curve.sample_level_weights = (0..=64).map(|i| (i as f64 / 64.0).powi(3)).collect();

        let result = software_texture_read(&sample_level(&[0.5, 0.5], 1.0), &texture, Some(&sampler), Some(&curve)).unwrap();
        assert_eq!(result.sample_points.len(), 4);
        assert!(result.sample_points.iter().all(|p| p.level == 1 && p.weight == 0.25));
        let mut expected = PerTexelComponents::new();
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            expected = expected.add_weighted(&texture.texel(1, x, y, 0, 0), 0.25);
        }
        for tag in [ComponentTag::R, ComponentTag::G, ComponentTag::B, ComponentTag::A] {
            let (got, want) = (result.value.get(tag).unwrap(), expected.get(tag).unwrap());
            assert!((got - want).abs() < 1e-12, "{:?}: {} vs {}", tag, got, want);
        }
    }

    #[test]
    fn level_selection_only_for_sampling_calls() {
        let texture = uniform_levels(4, &[0.0, 1.0, 0.0]);
        let sampler = SamplerState::linear();
        let selection = call_level_selection(&sample_level(&[0.5, 0.5], 1.5), &texture, &sampler, None).unwrap();
        assert_eq!(selection.lod, 1.5);
        assert_eq!(selection.levels(), &[(1u32, 0.5), (2u32, 0.5)][..]);
        let gather = TextureCall::Gather { component: Some(0), coords: float_args(&[0.5, 0.5]), array_index: None, offset: None };
        assert!(call_level_selection(&gather, &texture, &sampler, None).is_none());
    }

    #[test]
    fn gradients_pick_levels() {
        let texture = uniform_levels(8, &[0.0, 0.5, 1.0]);
        let sampler = SamplerState::nearest();
        let call = |d: f64| TextureCall::SampleGrad {
            coords: float_args(&[0.5, 0.5]),
            array_index: None,
            ddx: float_args(&[d, 0.0]),
            ddy: float_args(&[0.0, d]),
            offset: None,
        };
        let at = |d| red(&software_texture_read(&call(d), &texture, Some(&sampler), None).unwrap());
        assert_eq!(at(1.0 / 8.0), 0.0);
        assert_eq!(at(2.0 / 8.0), HALF);
        assert_eq!(at(4.0 / 8.0), 1.0);
        assert_eq!(at(100.0), 1.0);
    }

    #[test]
    fn implicit_derivatives_and_bias() {
        let texture = uniform_levels(8, &[0.0, 0.5, 1.0]);
        let sampler = SamplerState::nearest();
        let sample = TextureCall::Sample {
            coords: float_args(&[0.5, 0.5]),
            array_index: None,
            offset: None,
            derivative_mult: Some(float_args(&[2.0 / 8.0, 2.0 / 8.0])),
        };
        assert_eq!(red(&software_texture_read(&sample, &texture, Some(&sampler), None).unwrap()), HALF);
        let biased = TextureCall::SampleBias {
            coords: float_args(&[0.5, 0.5]),
            array_index: None,
            bias: 17.0,
            offset: None,
            derivative_mult: Some(float_args(&[1.0 / 8.0, 1.0 / 8.0])),
        };
        assert_eq!(red(&software_texture_read(&biased, &texture, Some(&sampler), None).unwrap()), 1.0);
    }

    #[test]
    fn load_out_of_bounds() {
        let texture = uniform_levels(4, &[0.25, 0.5]);
        let load = |coords: &[i32], level: i32| TextureCall::Load {
            coords: IntVector::i32(coords),
            array_index: None,
            level: Some(IntArg::I32(level)),
            sample_index: None,
        };
        assert_eq!(software_texture_read(&load(&[3, 3], 0), &texture, None, None).map(|r| red(&r)), Ok(64.0 / 255.0));
        assert_eq!(software_texture_read(&load(&[1, 1], 1), &texture, None, None).map(|r| red(&r)), Ok(HALF));
        assert_eq!(software_texture_read(&load(&[2, 0], 1), &texture, None, None), Err(SampleError::OutOfBounds));
        assert_eq!(software_texture_read(&load(&[-1, 0], 0), &texture, None, None), Err(SampleError::OutOfBounds));
        assert_eq!(software_texture_read(&load(&[0, 0], 2), &texture, None, None), Err(SampleError::OutOfBounds));
    }

    #[test]
    fn compare_always_and_never() {
        let texture = ramp_2x2(TextureFormat::Depth32Float);
        for (function, expected) in [(CompareFunction::Always, 1.0), (CompareFunction::Never, 0.0)] {
            let sampler = SamplerState::linear().with_compare(function);
            let call = TextureCall::SampleCompareLevel {
                coords: float_args(&[0.4, 0.6]),
                array_index: None,
                depth_ref: 0.5,
                offset: None,
            };
            assert_eq!(red(&software_texture_read(&call, &texture, Some(&sampler), None).unwrap()), expected);
        }
    }

    #[test]
    fn compare_is_filtered_after_the_test() {
        let texture = ramp_2x2(TextureFormat::Depth32Float);
        let sampler = SamplerState::linear().with_compare(CompareFunction::Less);
        // depths 0.25 0.5 0.75 1.0; 0.6 < depth for the bottom row only
        let call = TextureCall::SampleCompareLevel {
            coords: float_args(&[0.5, 0.5]),
            array_index: None,
            depth_ref: 0.6,
            offset: None,
        };
        assert_eq!(red(&software_texture_read(&call, &texture, Some(&sampler), None).unwrap()), 0.5);
    }

    #[test]
    fn gather_order() {
        let texture = ramp_2x2(TextureFormat::R32Float);
        let call = TextureCall::Gather { component: Some(0), coords: float_args(&[0.5, 0.5]), array_index: None, offset: None };
        let result = software_texture_read(&call, &texture, Some(&SamplerState::nearest()), None).unwrap();
        assert_eq!(result.value, PerTexelComponents::rgba(3.0, 4.0, 2.0, 1.0));
        let alpha = TextureCall::Gather { component: Some(3), coords: float_args(&[0.5, 0.5]), array_index: None, offset: None };
        let result = software_texture_read(&alpha, &texture, Some(&SamplerState::nearest()), None).unwrap();
        assert_eq!(result.value, PerTexelComponents::rgba(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn depth_reads_land_in_red() {
        let texture = ramp_2x2(TextureFormat::Depth32Float);
        let call = TextureCall::SampleLevel {
            coords: float_args(&[0.75, 0.75]),
            array_index: None,
            level: LevelArg::Int(IntArg::I32(0)),
            offset: None,
        };
        let result = software_texture_read(&call, &texture, Some(&SamplerState::nearest()), None).unwrap();
        assert_eq!(result.value, PerTexelComponents::new().with(ComponentTag::R, 1.0));
        assert_eq!(texture.view().aspect, TextureAspect::All);
    }

    #[test]
    fn base_clamp_to_edge_stays_inside() {
        let texture = ramp_2x2(TextureFormat::R16Float);
        let sampler = SamplerState::linear().with_address_mode(AddressMode::Repeat);
        let call = TextureCall::SampleBaseClampToEdge { coords: float_args(&[0.0, 0.0]) };
        let result = software_texture_read(&call, &texture, Some(&sampler), None).unwrap();
        assert_eq!(red(&result), 1.0);
    }

    fn cube(size: u32) -> SoftwareTexture {
        let descriptor = TextureDescriptor::new(TextureFormat::R32Float, TextureDimension::D2, [size, size, 6]);
        let level = TexelView::from_generator(TextureFormat::R32Float, [size, size, 6], 1, |c| {
            PerTexelComponents::new().with(ComponentTag::R, c.z as f64)
        });
        let view = ViewDescriptor::whole(&descriptor).with_dimension(ViewDimension::Cube);
        SoftwareTexture::new(descriptor, view, vec![level])
    }

    #[test]
    fn cube_faces() {
        let texture = cube(4);
        let sampler = SamplerState::nearest();
        let directions = [
            [1.0, 0.1, 0.2],
            [-1.0, 0.1, 0.2],
            [0.1, 1.0, 0.2],
            [0.1, -1.0, 0.2],
            [0.1, 0.2, 1.0],
            [0.1, 0.2, -1.0],
        ];
        for (face, dir) in directions.iter().enumerate() {
            let result = software_texture_read(&sample_level(dir, 0.0), &texture, Some(&sampler), None).unwrap();
            assert_eq!(red(&result), face as f64);
        }
    }

    #[test]
    fn cube_edges_blend_and_corners_fail() {
        let texture = cube(4);
        let sampler = SamplerState::linear();
        // middle of the +x/+z edge: half from each face
        let edge = software_texture_read(&sample_level(&[1.0, 0.1, 1.0], 0.0), &texture, Some(&sampler), None).unwrap();
        assert!((red(&edge) - 2.0).abs() < 1e-9);
        let corner = software_texture_read(&sample_level(&[1.0, 1.0, 1.0], 0.0), &texture, Some(&sampler), None);
        assert_eq!(corner, Err(SampleError::CubeCorner { mip_level: 0 }));
    }
}
