//! Texture builtin calls as data.

use crate::format::SampleType;
use crate::math::quantize_to_f32;
use crate::texture::{SoftwareTexture, ViewDimension};
use arrayvec::ArrayVec;
use std::fmt;

/// Float vector argument, 1 to 3 components.
pub type FloatArgs = ArrayVec<f64, 3>;
/// Constant texel offset, one component per coordinate axis.
pub type Offset = ArrayVec<i32, 3>;

pub fn float_args(values: &[f64]) -> FloatArgs {
    values.iter().copied().collect()
}

pub fn offset(values: &[i32]) -> Offset {
    values.iter().copied().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntRepr {
    I32,
    U32,
}

impl IntRepr {
    pub fn wgsl_scalar(self) -> &'static str {
        match self {
            IntRepr::I32 => "i32",
            IntRepr::U32 => "u32",
        }
    }
}

/// An integer argument in the representation the shader passes it as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntArg {
    I32(i32),
    U32(u32),
}

impl IntArg {
    pub fn value(self) -> i64 {
        match self {
            IntArg::I32(v) => v as i64,
            IntArg::U32(v) => v as i64,
        }
    }

    pub fn repr(self) -> IntRepr {
        match self {
            IntArg::I32(_) => IntRepr::I32,
            IntArg::U32(_) => IntRepr::U32,
        }
    }

    /// Raw bits as the shader sees them.
    pub fn bits(self) -> u32 {
        match self {
            IntArg::I32(v) => v as u32,
            IntArg::U32(v) => v,
        }
    }
}

impl fmt::Display for IntArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntArg::I32(v) => write!(f, "{}i", v),
            IntArg::U32(v) => write!(f, "{}u", v),
        }
    }
}

/// Integer coordinate vector sharing one representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntVector {
    pub values: ArrayVec<i64, 3>,
    pub repr: IntRepr,
}

impl IntVector {
    pub fn i32(values: &[i32]) -> Self {
        Self { values: values.iter().map(|&v| v as i64).collect(), repr: IntRepr::I32 }
    }

    pub fn u32(values: &[u32]) -> Self {
        Self { values: values.iter().map(|&v| v as i64).collect(), repr: IntRepr::U32 }
    }

    pub fn bits(&self) -> impl Iterator<Item = u32> + '_ {
        self.values.iter().map(|&v| v as u32)
    }
}

/// The level argument of `textureSampleLevel`: float for colour textures, integer for depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelArg {
    Float(f64),
    Int(IntArg),
}

impl LevelArg {
    pub fn value(self) -> f64 {
        match self {
            LevelArg::Float(v) => v,
            LevelArg::Int(v) => v.value() as f64,
        }
    }
}

impl fmt::Display for LevelArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelArg::Float(v) => write!(f, "{}", v),
            LevelArg::Int(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    TextureLoad,
    TextureSample,
    TextureSampleBias,
    TextureSampleLevel,
    TextureSampleGrad,
    TextureSampleCompare,
    TextureSampleCompareLevel,
    TextureSampleBaseClampToEdge,
    TextureGather,
    TextureGatherCompare,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::TextureLoad,
        Builtin::TextureSample,
        Builtin::TextureSampleBias,
        Builtin::TextureSampleLevel,
        Builtin::TextureSampleGrad,
        Builtin::TextureSampleCompare,
        Builtin::TextureSampleCompareLevel,
        Builtin::TextureSampleBaseClampToEdge,
        Builtin::TextureGather,
        Builtin::TextureGatherCompare,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::TextureLoad => "textureLoad",
            Builtin::TextureSample => "textureSample",
            Builtin::TextureSampleBias => "textureSampleBias",
            Builtin::TextureSampleLevel => "textureSampleLevel",
            Builtin::TextureSampleGrad => "textureSampleGrad",
            Builtin::TextureSampleCompare => "textureSampleCompare",
            Builtin::TextureSampleCompareLevel => "textureSampleCompareLevel",
            Builtin::TextureSampleBaseClampToEdge => "textureSampleBaseClampToEdge",
            Builtin::TextureGather => "textureGather",
            Builtin::TextureGatherCompare => "textureGatherCompare",
        }
    }

    pub fn uses_sampler(self) -> bool {
        self != Builtin::TextureLoad
    }

    pub fn is_compare(self) -> bool {
        matches!(
            self,
            Builtin::TextureSampleCompare | Builtin::TextureSampleCompareLevel | Builtin::TextureGatherCompare
        )
    }

    pub fn is_gather(self) -> bool {
        matches!(self, Builtin::TextureGather | Builtin::TextureGatherCompare)
    }

    /// Needs screen-space derivatives, so only runs in fragment shaders.
    pub fn uses_implicit_derivatives(self) -> bool {
        matches!(self, Builtin::TextureSample | Builtin::TextureSampleBias | Builtin::TextureSampleCompare)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One builtin invocation with exactly the arguments that builtin takes.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureCall {
    Load {
        coords: IntVector,
        array_index: Option<IntArg>,
        level: Option<IntArg>,
        sample_index: Option<IntArg>,
    },
    Sample {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        offset: Option<Offset>,
        derivative_mult: Option<FloatArgs>,
    },
    SampleBias {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        bias: f64,
        offset: Option<Offset>,
        derivative_mult: Option<FloatArgs>,
    },
    SampleLevel {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        level: LevelArg,
        offset: Option<Offset>,
    },
    SampleGrad {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        ddx: FloatArgs,
        ddy: FloatArgs,
        offset: Option<Offset>,
    },
    SampleCompare {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        depth_ref: f64,
        offset: Option<Offset>,
        derivative_mult: Option<FloatArgs>,
    },
    SampleCompareLevel {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        depth_ref: f64,
        offset: Option<Offset>,
    },
    SampleBaseClampToEdge {
        coords: FloatArgs,
    },
    Gather {
        component: Option<u32>,
        coords: FloatArgs,
        array_index: Option<IntArg>,
        offset: Option<Offset>,
    },
    GatherCompare {
        coords: FloatArgs,
        array_index: Option<IntArg>,
        depth_ref: f64,
        offset: Option<Offset>,
    },
}

impl TextureCall {
    pub fn builtin(&self) -> Builtin {
        match self {
            TextureCall::Load { .. } => Builtin::TextureLoad,
            TextureCall::Sample { .. } => Builtin::TextureSample,
            TextureCall::SampleBias { .. } => Builtin::TextureSampleBias,
            TextureCall::SampleLevel { .. } => Builtin::TextureSampleLevel,
            TextureCall::SampleGrad { .. } => Builtin::TextureSampleGrad,
            TextureCall::SampleCompare { .. } => Builtin::TextureSampleCompare,
            TextureCall::SampleCompareLevel { .. } => Builtin::TextureSampleCompareLevel,
            TextureCall::SampleBaseClampToEdge { .. } => Builtin::TextureSampleBaseClampToEdge,
            TextureCall::Gather { .. } => Builtin::TextureGather,
            TextureCall::GatherCompare { .. } => Builtin::TextureGatherCompare,
        }
    }

    /// Float coordinates of every builtin except `textureLoad`.
    pub fn float_coords(&self) -> Option<&FloatArgs> {
        match self {
            TextureCall::Load { .. } => None,
            TextureCall::Sample { coords, .. }
            | TextureCall::SampleBias { coords, .. }
            | TextureCall::SampleLevel { coords, .. }
            | TextureCall::SampleGrad { coords, .. }
            | TextureCall::SampleCompare { coords, .. }
            | TextureCall::SampleCompareLevel { coords, .. }
            | TextureCall::SampleBaseClampToEdge { coords }
            | TextureCall::Gather { coords, .. }
            | TextureCall::GatherCompare { coords, .. } => Some(coords),
        }
    }

    pub fn coord_count(&self) -> usize {
        match self {
            TextureCall::Load { coords, .. } => coords.values.len(),
            _ => self.float_coords().map_or(0, |c| c.len()),
        }
    }

    pub fn array_index(&self) -> Option<IntArg> {
        match *self {
            TextureCall::Load { array_index, .. }
            | TextureCall::Sample { array_index, .. }
            | TextureCall::SampleBias { array_index, .. }
            | TextureCall::SampleLevel { array_index, .. }
            | TextureCall::SampleGrad { array_index, .. }
            | TextureCall::SampleCompare { array_index, .. }
            | TextureCall::SampleCompareLevel { array_index, .. }
            | TextureCall::Gather { array_index, .. }
            | TextureCall::GatherCompare { array_index, .. } => array_index,
            TextureCall::SampleBaseClampToEdge { .. } => None,
        }
    }

    pub fn offset(&self) -> Option<&Offset> {
        match self {
            TextureCall::Sample { offset, .. }
            | TextureCall::SampleBias { offset, .. }
            | TextureCall::SampleLevel { offset, .. }
            | TextureCall::SampleGrad { offset, .. }
            | TextureCall::SampleCompare { offset, .. }
            | TextureCall::SampleCompareLevel { offset, .. }
            | TextureCall::Gather { offset, .. }
            | TextureCall::GatherCompare { offset, .. } => offset.as_ref(),
            TextureCall::Load { .. } | TextureCall::SampleBaseClampToEdge { .. } => None,
        }
    }

    pub fn depth_ref(&self) -> Option<f64> {
        match *self {
            TextureCall::SampleCompare { depth_ref, .. }
            | TextureCall::SampleCompareLevel { depth_ref, .. }
            | TextureCall::GatherCompare { depth_ref, .. } => Some(depth_ref),
            _ => None,
        }
    }

    pub fn derivative_mult(&self) -> Option<&FloatArgs> {
        match self {
            TextureCall::Sample { derivative_mult, .. }
            | TextureCall::SampleBias { derivative_mult, .. }
            | TextureCall::SampleCompare { derivative_mult, .. } => derivative_mult.as_ref(),
            _ => None,
        }
    }

    /// Rounds every float argument to f32, as the shader will see it.
    pub fn quantized(mut self) -> Self {
        fn quantize(args: &mut FloatArgs) {
            args.iter_mut().for_each(|v| *v = quantize_to_f32(*v));
        }
        match &mut self {
            TextureCall::Load { .. } => {}
            TextureCall::Sample { coords, derivative_mult, .. } => {
                quantize(coords);
                derivative_mult.iter_mut().for_each(quantize);
            }
            TextureCall::SampleBias { coords, bias, derivative_mult, .. } => {
                quantize(coords);
                *bias = quantize_to_f32(*bias);
                derivative_mult.iter_mut().for_each(quantize);
            }
            TextureCall::SampleLevel { coords, level, .. } => {
                quantize(coords);
                if let LevelArg::Float(v) = level {
                    *v = quantize_to_f32(*v);
                }
            }
            TextureCall::SampleGrad { coords, ddx, ddy, .. } => {
                quantize(coords);
                quantize(ddx);
                quantize(ddy);
            }
            TextureCall::SampleCompare { coords, depth_ref, derivative_mult, .. } => {
                quantize(coords);
                *depth_ref = quantize_to_f32(*depth_ref);
                derivative_mult.iter_mut().for_each(quantize);
            }
            TextureCall::SampleCompareLevel { coords, depth_ref, .. }
            | TextureCall::GatherCompare { coords, depth_ref, .. } => {
                quantize(coords);
                *depth_ref = quantize_to_f32(*depth_ref);
            }
            TextureCall::SampleBaseClampToEdge { coords } | TextureCall::Gather { coords, .. } => quantize(coords),
        }
        self
    }

    /// Panics when the arguments do not fit the texture's view.
    pub fn validate(&self, texture: &SoftwareTexture) {
        let builtin = self.builtin();
        let dimension = texture.view_dimension();
        let format = texture.format();
        let sample_type = format.sample_type_for_aspect(texture.view().aspect);
        let multisampled = texture.sample_count() > 1;
        let what = || format!("{} on a {} {} view", builtin, format, dimension.name());

        assert_eq!(self.coord_count(), dimension.coord_components(), "coordinate count of {}", what());
        assert_eq!(self.array_index().is_some(), dimension.is_arrayed(), "array index of {}", what());
        if let Some(offset) = self.offset() {
            assert!(
                !dimension.is_cube() && dimension != ViewDimension::D1,
                "offsets are not allowed for {}",
                what()
            );
            assert_eq!(offset.len(), self.coord_count(), "offset size of {}", what());
            assert!(offset.iter().all(|v| (-8..=7).contains(v)), "offset out of range for {}", what());
        }
        if let Some(mult) = self.derivative_mult() {
            assert_eq!(mult.len(), self.coord_count(), "derivative multiplier size of {}", what());
        }
        if builtin.uses_sampler() {
            assert!(!multisampled, "{} cannot sample a multisampled texture", builtin);
        }
        if builtin.is_compare() {
            assert_eq!(sample_type, SampleType::Depth, "{} needs a depth texture", what());
        }
        if builtin.is_gather() {
            assert!(matches!(dimension, ViewDimension::D2 | ViewDimension::D2Array | ViewDimension::Cube | ViewDimension::CubeArray), "{}", what());
        }
        match self {
            TextureCall::Load { level, sample_index, .. } => {
                assert!(!dimension.is_cube(), "{} is not allowed", what());
                assert_eq!(sample_index.is_some(), multisampled, "sample index of {}", what());
                assert_eq!(level.is_some(), !multisampled, "level of {}", what());
            }
            TextureCall::SampleLevel { level, .. } => {
                let int_level = matches!(level, LevelArg::Int(_));
                assert_eq!(int_level, sample_type == SampleType::Depth, "level type of {}", what());
            }
            TextureCall::SampleGrad { ddx, ddy, .. } => {
                assert_eq!(ddx.len(), self.coord_count(), "ddx size of {}", what());
                assert_eq!(ddy.len(), self.coord_count(), "ddy size of {}", what());
            }
            TextureCall::SampleBaseClampToEdge { .. } => {
                assert_eq!(dimension, ViewDimension::D2, "{}", what());
                assert_eq!(sample_type, SampleType::Float, "{}", what());
            }
            TextureCall::Gather { component, .. } => {
                let depth = sample_type == SampleType::Depth;
                assert_eq!(component.is_none(), depth, "gather component of {}", what());
                assert!(component.is_none_or(|c| c < 4), "gather component of {}", what());
            }
            _ => {}
        }
        if matches!(builtin, Builtin::TextureSample | Builtin::TextureSampleBias | Builtin::TextureSampleGrad) {
            assert!(
                sample_type == SampleType::Float || sample_type == SampleType::Depth,
                "{} needs a filterable texture",
                what()
            );
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: impl IntoIterator<Item = T>) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in values.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    write!(f, "]")
}

impl fmt::Display for TextureCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.builtin())?;
        if let TextureCall::Gather { component: Some(c), .. } = self {
            write!(f, "component: {}, ", c)?;
        }
        write!(f, "coords: ")?;
        match self {
            TextureCall::Load { coords, .. } => write_list(f, coords.values.iter())?,
            _ => write_list(f, self.float_coords().into_iter().flatten())?,
        }
        if let Some(index) = self.array_index() {
            write!(f, ", array_index: {}", index)?;
        }
        match self {
            TextureCall::Load { level, sample_index, .. } => {
                if let Some(level) = level {
                    write!(f, ", level: {}", level)?;
                }
                if let Some(sample) = sample_index {
                    write!(f, ", sample_index: {}", sample)?;
                }
            }
            TextureCall::SampleBias { bias, .. } => write!(f, ", bias: {}", bias)?,
            TextureCall::SampleLevel { level, .. } => write!(f, ", level: {}", level)?,
            TextureCall::SampleGrad { ddx, ddy, .. } => {
                write!(f, ", ddx: ")?;
                write_list(f, ddx.iter())?;
                write!(f, ", ddy: ")?;
                write_list(f, ddy.iter())?;
            }
            _ => {}
        }
        if let Some(depth_ref) = self.depth_ref() {
            write!(f, ", depth_ref: {}", depth_ref)?;
        }
        if let Some(offset) = self.offset() {
            write!(f, ", offset: ")?;
            write_list(f, offset.iter())?;
        }
        if let Some(mult) = self.derivative_mult() {
            write!(f, ", derivative_mult: ")?;
            write_list(f, mult.iter())?;
        }
        write!(f, ")")
    }
}
