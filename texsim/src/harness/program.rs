//! Call binning, argument packing and shader generation.
//!
//! Calls that differ only in argument values share a [`CallShape`] and therefore one program.
//! Each argument occupies one `vec4<u32>` of the data buffer.

use super::device::{DeviceId, GpuDevice, ShaderStage, TextureBinding};
use crate::error::DeviceError;
use crate::format::SampleType;
use crate::sampling::{Builtin, FloatArgs, IntArg, IntRepr, IntVector, LevelArg, Offset, TextureCall};
use crate::texture::{ComponentTag, PerTexelComponents, ViewDimension};
use arrayvec::ArrayVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

pub const WORDS_PER_SLOT: usize = 4;

/// Fragment programs shade one 2x2 quad per call, this many quads per row.
pub const FRAGMENT_QUAD_COLUMNS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    F32,
    I32,
    U32,
}

impl ScalarKind {
    fn of_int(repr: IntRepr) -> Self {
        match repr {
            IntRepr::I32 => ScalarKind::I32,
            IntRepr::U32 => ScalarKind::U32,
        }
    }

    fn wgsl(self) -> &'static str {
        match self {
            ScalarKind::F32 => "f32",
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
        }
    }
}

/// One argument slot of the data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgSlot {
    Coords { kind: ScalarKind, count: usize },
    ArrayIndex(IntRepr),
    Level(ScalarKind),
    SampleIndex(IntRepr),
    Bias,
    Ddx(usize),
    Ddy(usize),
    DepthRef,
    DerivativeMult(usize),
}

/// How a program returns one call's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    ScalarF32,
    Vec4(ScalarKind),
}

/// Everything about a call that has to be baked into the shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallShape {
    pub builtin: Builtin,
    pub slots: ArrayVec<ArgSlot, 8>,
    /// Offsets must be constant expressions.
    pub offset: Option<Offset>,
    /// So must gather components.
    pub component: Option<u32>,
}

impl CallShape {
    pub fn of(call: &TextureCall) -> Self {
        let mut slots = ArrayVec::new();
        match call {
            TextureCall::Load { coords, .. } => {
                slots.push(ArgSlot::Coords { kind: ScalarKind::of_int(coords.repr), count: coords.values.len() })
            }
            _ => slots.push(ArgSlot::Coords { kind: ScalarKind::F32, count: call.coord_count() }),
        }
        if let Some(index) = call.array_index() {
            slots.push(ArgSlot::ArrayIndex(index.repr()));
        }
        match call {
            TextureCall::Load { level, sample_index, .. } => {
                if let Some(level) = level {
                    slots.push(ArgSlot::Level(ScalarKind::of_int(level.repr())));
                }
                if let Some(sample) = sample_index {
                    slots.push(ArgSlot::SampleIndex(sample.repr()));
                }
            }
            TextureCall::SampleBias { .. } => slots.push(ArgSlot::Bias),
            TextureCall::SampleLevel { level, .. } => slots.push(ArgSlot::Level(match level {
                LevelArg::Float(_) => ScalarKind::F32,
                LevelArg::Int(v) => ScalarKind::of_int(v.repr()),
            })),
            TextureCall::SampleGrad { ddx, ddy, .. } => {
                slots.push(ArgSlot::Ddx(ddx.len()));
                slots.push(ArgSlot::Ddy(ddy.len()));
            }
            _ => {}
        }
        if call.depth_ref().is_some() {
            slots.push(ArgSlot::DepthRef);
        }
        if let Some(mult) = call.derivative_mult() {
            slots.push(ArgSlot::DerivativeMult(mult.len()));
        }
        let component = match call {
            TextureCall::Gather { component, .. } => *component,
            _ => None,
        };
        Self { builtin: call.builtin(), slots, offset: call.offset().cloned(), component }
    }

    pub fn words_per_call(&self) -> usize {
        self.slots.len() * WORDS_PER_SLOT
    }

    /// Appends the arguments of `call`, which must have this shape.
    pub fn pack(&self, call: &TextureCall, out: &mut Vec<u32>) {
        assert_eq!(&CallShape::of(call), self, "call {} does not have this shape", call);
        let floats = |values: &[f64]| -> [u32; 4] {
            let mut words = [0u32; 4];
            for (w, v) in words.iter_mut().zip(values) {
                *w = (*v as f32).to_bits();
            }
            words
        };
        let int = |arg: IntArg| [arg.bits(), 0, 0, 0];
        for slot in &self.slots {
            let words = match (slot, call) {
                (ArgSlot::Coords { .. }, TextureCall::Load { coords, .. }) => {
                    let mut words = [0u32; 4];
                    for (w, v) in words.iter_mut().zip(coords.bits()) {
                        *w = v;
                    }
                    words
                }
                (ArgSlot::Coords { .. }, _) => floats(call.float_coords().map_or(&[][..], |c| c.as_slice())),
                (ArgSlot::ArrayIndex(_), _) => int(call.array_index().unwrap_or(IntArg::I32(0))),
                (ArgSlot::Level(_), TextureCall::Load { level: Some(level), .. }) => int(*level),
                (ArgSlot::Level(_), TextureCall::SampleLevel { level: LevelArg::Int(level), .. }) => int(*level),
                (ArgSlot::Level(_), TextureCall::SampleLevel { level: LevelArg::Float(level), .. }) => floats(&[*level]),
                (ArgSlot::SampleIndex(_), TextureCall::Load { sample_index: Some(sample), .. }) => int(*sample),
                (ArgSlot::Bias, TextureCall::SampleBias { bias, .. }) => floats(&[*bias]),
                (ArgSlot::Ddx(_), TextureCall::SampleGrad { ddx, .. }) => floats(ddx),
                (ArgSlot::Ddy(_), TextureCall::SampleGrad { ddy, .. }) => floats(ddy),
                (ArgSlot::DepthRef, _) => floats(&[call.depth_ref().unwrap_or(0.0)]),
                (ArgSlot::DerivativeMult(_), _) => floats(call.derivative_mult().map_or(&[][..], |m| m.as_slice())),
                (slot, call) => panic!("slot {:?} does not apply to {}", slot, call),
            };
            out.extend_from_slice(&words);
        }
    }

    /// Rebuilds a call from the words [`CallShape::pack`] wrote.
    pub fn unpack(&self, words: &[u32]) -> TextureCall {
        assert_eq!(words.len(), self.words_per_call());
        let slot_words = |i: usize| &words[i * WORDS_PER_SLOT..(i + 1) * WORDS_PER_SLOT];
        let floats = |w: &[u32], count: usize| -> FloatArgs { w[..count].iter().map(|&b| f32::from_bits(b) as f64).collect() };
        let int = |w: &[u32], repr: IntRepr| match repr {
            IntRepr::I32 => IntArg::I32(w[0] as i32),
            IntRepr::U32 => IntArg::U32(w[0]),
        };

        let mut coords = FloatArgs::new();
        let mut int_coords = None;
        let mut array_index = None;
        let mut level = None;
        let mut sample_index = None;
        let mut bias = 0.0;
        let mut ddx = FloatArgs::new();
        let mut ddy = FloatArgs::new();
        let mut depth_ref = 0.0;
        let mut derivative_mult = None;
        for (i, slot) in self.slots.iter().enumerate() {
            let w = slot_words(i);
            match *slot {
                ArgSlot::Coords { kind: ScalarKind::F32, count } => coords = floats(w, count),
                ArgSlot::Coords { kind: ScalarKind::I32, count } => {
                    int_coords = Some(IntVector::i32(&w[..count].iter().map(|&b| b as i32).collect::<Vec<_>>()))
                }
                ArgSlot::Coords { kind: ScalarKind::U32, count } => int_coords = Some(IntVector::u32(&w[..count])),
                ArgSlot::ArrayIndex(repr) => array_index = Some(int(w, repr)),
                ArgSlot::Level(ScalarKind::F32) => level = Some(LevelArg::Float(floats(w, 1)[0])),
                ArgSlot::Level(ScalarKind::I32) => level = Some(LevelArg::Int(int(w, IntRepr::I32))),
                ArgSlot::Level(ScalarKind::U32) => level = Some(LevelArg::Int(int(w, IntRepr::U32))),
                ArgSlot::SampleIndex(repr) => sample_index = Some(int(w, repr)),
                ArgSlot::Bias => bias = floats(w, 1)[0],
                ArgSlot::Ddx(count) => ddx = floats(w, count),
                ArgSlot::Ddy(count) => ddy = floats(w, count),
                ArgSlot::DepthRef => depth_ref = floats(w, 1)[0],
                ArgSlot::DerivativeMult(count) => derivative_mult = Some(floats(w, count)),
            }
        }
        let offset = self.offset.clone();
        match self.builtin {
            Builtin::TextureLoad => TextureCall::Load {
                coords: int_coords.unwrap_or_else(|| IntVector::i32(&[])),
                array_index,
                level: match level {
                    Some(LevelArg::Int(level)) => Some(level),
                    _ => None,
                },
                sample_index,
            },
            Builtin::TextureSample => TextureCall::Sample { coords, array_index, offset, derivative_mult },
            Builtin::TextureSampleBias => TextureCall::SampleBias { coords, array_index, bias, offset, derivative_mult },
            Builtin::TextureSampleLevel => TextureCall::SampleLevel {
                coords,
                array_index,
                level: level.unwrap_or(LevelArg::Float(0.0)),
                offset,
            },
            Builtin::TextureSampleGrad => TextureCall::SampleGrad { coords, array_index, ddx, ddy, offset },
            Builtin::TextureSampleCompare => {
                TextureCall::SampleCompare { coords, array_index, depth_ref, offset, derivative_mult }
            }
            Builtin::TextureSampleCompareLevel => TextureCall::SampleCompareLevel { coords, array_index, depth_ref, offset },
            Builtin::TextureSampleBaseClampToEdge => TextureCall::SampleBaseClampToEdge { coords },
            Builtin::TextureGather => TextureCall::Gather { component: self.component, coords, array_index, offset },
            Builtin::TextureGatherCompare => TextureCall::GatherCompare { coords, array_index, depth_ref, offset },
        }
    }

    pub fn result_kind(&self, sample_type: SampleType) -> ResultKind {
        let scalar_depth = sample_type == SampleType::Depth && !self.builtin.is_gather();
        if scalar_depth || self.builtin.is_compare() && !self.builtin.is_gather() {
            return ResultKind::ScalarF32;
        }
        match sample_type {
            SampleType::Sint => ResultKind::Vec4(ScalarKind::I32),
            SampleType::Uint => ResultKind::Vec4(ScalarKind::U32),
            _ => ResultKind::Vec4(ScalarKind::F32),
        }
    }
}

impl ResultKind {
    pub fn decode(self, bits: [u32; 4]) -> PerTexelComponents {
        match self {
            ResultKind::ScalarF32 => PerTexelComponents::new().with(ComponentTag::R, f32::from_bits(bits[0]) as f64),
            ResultKind::Vec4(ScalarKind::F32) => {
                let [r, g, b, a] = bits.map(|b| f32::from_bits(b) as f64);
                PerTexelComponents::rgba(r, g, b, a)
            }
            ResultKind::Vec4(ScalarKind::I32) => {
                let [r, g, b, a] = bits.map(|b| b as i32 as f64);
                PerTexelComponents::rgba(r, g, b, a)
            }
            ResultKind::Vec4(ScalarKind::U32) => {
                let [r, g, b, a] = bits.map(|b| b as f64);
                PerTexelComponents::rgba(r, g, b, a)
            }
        }
    }

    /// Inverse of [`ResultKind::decode`] for values the result type can hold.
    pub fn encode(self, value: &PerTexelComponents) -> [u32; 4] {
        let get = |tag: ComponentTag| value.get(tag).unwrap_or(0.0);
        match self {
            ResultKind::ScalarF32 => [(get(ComponentTag::R) as f32).to_bits(), 0, 0, 0],
            ResultKind::Vec4(ScalarKind::F32) => ComponentTag::RGBA.map(|tag| (get(tag) as f32).to_bits()),
            ResultKind::Vec4(ScalarKind::I32) => ComponentTag::RGBA.map(|tag| get(tag) as i32 as u32),
            ResultKind::Vec4(ScalarKind::U32) => ComponentTag::RGBA.map(|tag| get(tag) as u32),
        }
    }
}

/// Shader-relevant properties of a bin, and the program cache key with the device id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub shape: CallShape,
    pub stage: ShaderStage,
    pub view_dimension: ViewDimension,
    pub sample_type: SampleType,
    pub multisampled: bool,
}

impl ProgramKey {
    pub fn new(shape: CallShape, stage: ShaderStage, binding: &TextureBinding) -> Self {
        assert!(
            stage == ShaderStage::Fragment || !shape.builtin.uses_implicit_derivatives(),
            "{} needs implicit derivatives and only runs in fragment shaders",
            shape.builtin
        );
        Self {
            shape,
            stage,
            view_dimension: binding.view.dimension,
            sample_type: binding.sample_type(),
            multisampled: binding.multisampled(),
        }
    }

    pub fn result_kind(&self) -> ResultKind {
        self.shape.result_kind(self.sample_type)
    }
}

/// A generated program, as handed to [`GpuDevice::create_program`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub key: ProgramKey,
    pub wgsl: String,
}

impl ProgramSource {
    pub fn new(key: ProgramKey) -> Self {
        let wgsl = generate_wgsl(&key);
        Self { key, wgsl }
    }
}

fn texture_type(key: &ProgramKey) -> String {
    let depth = key.sample_type == SampleType::Depth;
    let base = match (key.view_dimension, key.multisampled) {
        (ViewDimension::D2, true) => "multisampled_2d",
        (ViewDimension::D1, _) => "1d",
        (ViewDimension::D2, _) => "2d",
        (ViewDimension::D2Array, _) => "2d_array",
        (ViewDimension::Cube, _) => "cube",
        (ViewDimension::CubeArray, _) => "cube_array",
        (ViewDimension::D3, _) => "3d",
    };
    if depth {
        format!("texture_depth_{}", base)
    } else {
        let scalar = match key.sample_type {
            SampleType::Sint => "i32",
            SampleType::Uint => "u32",
            _ => "f32",
        };
        format!("texture_{}<{}>", base, scalar)
    }
}

fn vector_type(kind: ScalarKind, count: usize) -> String {
    match count {
        1 => kind.wgsl().to_string(),
        n => format!("vec{}<{}>", n, kind.wgsl()),
    }
}

fn slot_expr(slot_index: usize, kind: ScalarKind, count: usize) -> String {
    let swizzle = &"xyzw"[..count];
    let bits = format!("args[base + {}u].{}", slot_index, swizzle);
    match kind {
        ScalarKind::U32 => bits,
        _ => format!("bitcast<{}>({})", vector_type(kind, count), bits),
    }
}

/// WGSL for one bin: bindings, an argument decoder and the stage entry points.
pub fn generate_wgsl(key: &ProgramKey) -> String {
    let shape = &key.shape;
    let compare = shape.builtin.is_compare();
    let mut src = String::new();
    let _ = writeln!(src, "@group(0) @binding(0) var T: {};", texture_type(key));
    if shape.builtin.uses_sampler() {
        let sampler = if compare { "sampler_comparison" } else { "sampler" };
        let _ = writeln!(src, "@group(0) @binding(1) var S: {};", sampler);
    }
    let _ = writeln!(src, "@group(0) @binding(2) var<storage, read> args: array<vec4u>;");
    let _ = writeln!(src, "@group(0) @binding(3) var<storage, read_write> results: array<vec4u>;");
    let _ = writeln!(src);

    let _ = writeln!(src, "fn getResult(call: u32, quad: vec2f) -> vec4u {{");
    let _ = writeln!(src, "  let base = call * {}u;", shape.slots.len());
    let mut coords_expr = String::new();
    let mut rest = Vec::new();
    let mut coord_count = 0;
    for (i, slot) in shape.slots.iter().enumerate() {
        match *slot {
            ArgSlot::Coords { kind, count } => {
                coord_count = count;
                let _ = writeln!(src, "  var coords = {};", slot_expr(i, kind, count));
                coords_expr = "coords".to_string();
            }
            ArgSlot::ArrayIndex(repr) => rest.push(slot_expr(i, ScalarKind::of_int(repr), 1)),
            ArgSlot::Level(kind) => rest.push(slot_expr(i, kind, 1)),
            ArgSlot::SampleIndex(repr) => rest.push(slot_expr(i, ScalarKind::of_int(repr), 1)),
            ArgSlot::Bias | ArgSlot::DepthRef => rest.push(slot_expr(i, ScalarKind::F32, 1)),
            ArgSlot::Ddx(count) | ArgSlot::Ddy(count) => rest.push(slot_expr(i, ScalarKind::F32, count)),
            ArgSlot::DerivativeMult(count) => {
                // x moves along the first axis, y along the others
                let step = match count {
                    1 => "quad.x".to_string(),
                    2 => "vec2f(quad.x, quad.y)".to_string(),
                    _ => "vec3f(quad.x, quad.y, quad.y)".to_string(),
                };
                let _ = writeln!(src, "  coords += {} * {};", slot_expr(i, ScalarKind::F32, count), step);
            }
        }
    }

    let mut args = Vec::new();
    if let Some(component) = shape.component {
        args.push(format!("{}", component));
    }
    args.push("T".to_string());
    if shape.builtin.uses_sampler() {
        args.push("S".to_string());
    }
    args.push(coords_expr);
    args.extend(rest);
    if let Some(offset) = &shape.offset {
        let values: Vec<String> = offset.iter().map(|v| v.to_string()).collect();
        args.push(format!("vec{}i({})", coord_count, values.join(", ")));
    }
    let call = format!("{}({})", shape.builtin.name(), args.join(", "));
    let result = match key.result_kind() {
        ResultKind::ScalarF32 => format!("vec4u(bitcast<u32>({}), 0u, 0u, 0u)", call),
        ResultKind::Vec4(ScalarKind::U32) => call,
        ResultKind::Vec4(_) => format!("bitcast<vec4u>({})", call),
    };
    let _ = writeln!(src, "  return {};", result);
    let _ = writeln!(src, "}}");
    let _ = writeln!(src);

    match key.stage {
        ShaderStage::Compute => {
            let _ = writeln!(src, "@compute @workgroup_size(1) fn cs_main(@builtin(global_invocation_id) id: vec3u) {{");
            let _ = writeln!(src, "  results[id.x] = getResult(id.x, vec2f(0));");
            let _ = writeln!(src, "}}");
        }
        ShaderStage::Vertex => {
            let _ = writeln!(src, "struct VsOut {{");
            let _ = writeln!(src, "  @builtin(position) position: vec4f,");
            let _ = writeln!(src, "  @location(0) @interpolate(flat, either) call: u32,");
            let _ = writeln!(src, "  @location(1) @interpolate(flat, either) result: vec4u,");
            let _ = writeln!(src, "}};");
            let _ = writeln!(src, "@vertex fn vs_main(@builtin(vertex_index) call: u32) -> VsOut {{");
            let _ = writeln!(src, "  return VsOut(vec4f(0, 0, 0, 1), call, getResult(call, vec2f(0)));");
            let _ = writeln!(src, "}}");
            let _ = writeln!(src, "@fragment fn fs_main(v: VsOut) {{");
            let _ = writeln!(src, "  results[v.call] = v.result;");
            let _ = writeln!(src, "}}");
        }
        ShaderStage::Fragment => {
            let _ = writeln!(src, "@vertex fn vs_main(@builtin(vertex_index) v: u32) -> @builtin(position) vec4f {{");
            let _ = writeln!(src, "  let pos = array(vec2f(-1, 3), vec2f(3, -1), vec2f(-1, -1));");
            let _ = writeln!(src, "  return vec4f(pos[v], 0, 1);");
            let _ = writeln!(src, "}}");
            let _ = writeln!(src, "@fragment fn fs_main(@builtin(position) p: vec4f) {{");
            let _ = writeln!(src, "  let pixel = vec2u(p.xy);");
            let _ = writeln!(src, "  let quad = pixel / 2u;");
            let _ = writeln!(src, "  let call = quad.y * {}u + quad.x;", FRAGMENT_QUAD_COLUMNS);
            let _ = writeln!(src, "  let result = getResult(call, vec2f(pixel % 2u));");
            let _ = writeln!(src, "  if (all(pixel % 2u == vec2u(0)) && call < arrayLength(&results)) {{");
            let _ = writeln!(src, "    results[call] = result;");
            let _ = writeln!(src, "  }}");
            let _ = writeln!(src, "}}");
        }
    }
    src
}

/// Compiled programs per device and [`ProgramKey`].
pub struct ProgramCache<D: GpuDevice> {
    programs: RefCell<HashMap<(DeviceId, ProgramKey), Rc<D::Program>>>,
}

impl<D: GpuDevice> Default for ProgramCache<D> {
    fn default() -> Self {
        Self { programs: RefCell::new(HashMap::new()) }
    }
}

impl<D: GpuDevice> ProgramCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, device: &D, key: ProgramKey) -> Result<Rc<D::Program>, DeviceError> {
        let key = (device.id(), key);
        if let Some(program) = self.programs.borrow().get(&key) {
            return Ok(program.clone());
        }
        let source = ProgramSource::new(key.1.clone());
        log::debug!("compiling {} program for {} on {}", key.1.stage, key.1.shape.builtin, key.0);
        let program = Rc::new(device.create_program(&source).await?);
        self.programs.borrow_mut().insert(key, program.clone());
        Ok(program)
    }

    pub fn remove_device(&self, id: DeviceId) {
        self.programs.borrow_mut().retain(|(device, _), _| *device != id);
    }

    pub fn len(&self) -> usize {
        self.programs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
