//! Mismatch reports: which texels each side sampled, texel maps and texture dumps.

use super::compare::ComponentDiff;
use super::context::OracleContext;
use super::device::{GpuDevice, ShaderStage, TextureBinding};
use super::execute::run_texture_calls;
use super::program::ProgramCache;
use crate::error::DeviceError;
use crate::format::{SampleType, TextureAspect, TextureFormat, encode_texel};
use crate::sampling::{CompareFunction, SamplePoint, SamplerState, TextureCall, TextureReadResult, view_texel};
use crate::texture::{ComponentTag, PerTexelComponents, SoftwareTexture, TexelCoord};
use image::{ImageBuffer, Rgba};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Texel maps are drawn for levels up to this size; larger levels only get the legend.
const MAX_MAP_EXTENT: u32 = 64;

/// What the device-side sample point search found.
#[derive(Debug, Clone, PartialEq)]
pub enum DevicePoints {
    Found(Vec<SamplePoint>),
    Skipped { texel_count: usize, limit: usize },
    Failed(String),
}

/// Everything known about a call whose device result did not match.
#[derive(Debug, Clone)]
pub struct MismatchReport {
    pub index: usize,
    pub call: String,
    pub stage: ShaderStage,
    pub texture: String,
    pub sampler: Option<String>,
    /// `None` when the call reads out of bounds and no legal value matched.
    pub expected: Option<PerTexelComponents>,
    pub got: PerTexelComponents,
    pub diffs: Vec<ComponentDiff>,
    pub ulp_tolerance: u32,
    pub fractional_tolerance: f64,
    pub software_points: Vec<SamplePoint>,
    pub device_points: DevicePoints,
    pub texel_map: String,
    pub dumped_files: Vec<PathBuf>,
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} call {} failed: {}", self.stage, self.index, self.call)?;
        match &self.expected {
            Some(expected) => writeln!(f, "  expected: {}", expected)?,
            None => writeln!(f, "  expected: out of bounds (zero or any texel)")?,
        }
        writeln!(f, "  got:      {}", self.got)?;
        for diff in &self.diffs {
            writeln!(f, "    {}", diff)?;
        }
        writeln!(f, "  tolerance: {} ulp or {} absolute", self.ulp_tolerance, self.fractional_tolerance)?;
        writeln!(f, "  texture: {}", self.texture)?;
        if let Some(sampler) = &self.sampler {
            writeln!(f, "  sampler: {}", sampler)?;
        }
        match &self.device_points {
            DevicePoints::Found(_) => {}
            DevicePoints::Skipped { texel_count, limit } => {
                writeln!(f, "  device sample points not searched: {} texels, limit {}", texel_count, limit)?
            }
            DevicePoints::Failed(reason) => writeln!(f, "  device sample points unavailable: {}", reason)?,
        }
        write!(f, "{}", self.texel_map)?;
        for path in &self.dumped_files {
            writeln!(f, "  wrote {}", path.display())?;
        }
        Ok(())
    }
}

pub fn describe_texture(texture: &SoftwareTexture) -> String {
    let descriptor = texture.descriptor();
    let view = texture.view();
    let [w, h, d] = descriptor.size;
    let mut text = format!(
        "{} {} {}x{}x{}, {} levels, {} samples, view levels {}..{} layers {}..{}",
        descriptor.format,
        view.dimension.name(),
        w,
        h,
        d,
        descriptor.mip_level_count,
        descriptor.sample_count,
        view.base_mip_level,
        view.base_mip_level + view.mip_level_count,
        view.base_array_layer,
        view.base_array_layer + view.array_layer_count
    );
    if view.aspect != TextureAspect::All {
        let _ = write!(text, " {:?}", view.aspect);
    }
    text
}

/// Format that stands in for `texture`'s while probing which texels a call reads: one value is
/// exactly representable and the texture binds with the same sample type.
fn probe_format(texture: &SoftwareTexture) -> TextureFormat {
    match texture.format().sample_type_for_aspect(texture.view().aspect) {
        SampleType::Depth => TextureFormat::Depth32Float,
        SampleType::Uint => TextureFormat::Rgba8Uint,
        SampleType::Sint => TextureFormat::Rgba8Sint,
        SampleType::Float | SampleType::UnfilterableFloat => TextureFormat::Rgba8Unorm,
    }
}

/// Every texel of the view as a sample point of weight zero.
fn view_texels(texture: &SoftwareTexture) -> Vec<SamplePoint> {
    let mut texels = Vec::new();
    for level in 0..texture.view_level_count() {
        let [w, h, d] = texture.level_size(level);
        let layers = if d > 1 { d } else { texture.view_layer_count() };
        for z in 0..layers {
            for y in 0..h {
                for x in 0..w {
                    for sample in 0..texture.sample_count() {
                        let coord = TexelCoord::new(x, y, z).with_sample(sample);
                        texels.push(SamplePoint { level, coord, weight: 0.0 });
                    }
                }
            }
        }
    }
    texels
}

fn with_depth_ref(call: &TextureCall, value: f64) -> TextureCall {
    let mut call = call.clone();
    match &mut call {
        TextureCall::SampleCompare { depth_ref, .. }
        | TextureCall::SampleCompareLevel { depth_ref, .. }
        | TextureCall::GatherCompare { depth_ref, .. } => *depth_ref = value,
        _ => {}
    }
    call
}

/// Runs `call` on textures where only some texels are one, narrowing down the texels it reads.
struct PointProbe<'a, D: GpuDevice> {
    device: &'a D,
    programs: &'a ProgramCache<D>,
    texture: &'a SoftwareTexture,
    format: TextureFormat,
    call: TextureCall,
    sampler: Option<SamplerState>,
    stage: ShaderStage,
}

impl<D: GpuDevice> PointProbe<'_, D> {
    /// Sum of the result components when exactly `set` is one.
    async fn contribution(&self, set: &[SamplePoint]) -> Result<f64, DeviceError> {
        let mut descriptor = *self.texture.descriptor();
        descriptor.format = self.format;
        let view = self.texture.view().with_aspect(TextureAspect::All);
        let one = if self.format.has_depth() {
            PerTexelComponents::depth(1.0)
        } else {
            PerTexelComponents::rgba(1.0, 1.0, 1.0, 1.0)
        };
        let bytes_per_texel = self.format.bytes_per_block() as usize;
        let mut levels: Vec<Vec<u8>> =
            (0..descriptor.mip_level_count).map(|level| vec![0u8; descriptor.level_byte_size(level)]).collect();
        for point in set {
            let c = point.coord;
            let (level, physical) = self.texture.physical_coord(point.level, c.x, c.y, c.z, c.sample);
            let [w, h, _] = descriptor.mip_level_size(level);
            let index = (((physical.z * h + physical.y) * w + physical.x) * descriptor.sample_count + physical.sample)
                as usize
                * bytes_per_texel;
            encode_texel(self.format, &one, &mut levels[level as usize][index..index + bytes_per_texel]);
        }

        let texture = self.device.create_texture(&descriptor, &levels).await?;
        let binding = TextureBinding { descriptor, view };
        let calls = [self.call.clone()];
        let results =
            run_texture_calls(self.device, self.programs, &texture, binding, self.sampler.as_ref(), &calls, self.stage)
                .await?;
        let tags = if self.call.builtin().is_gather() { &ComponentTag::RGBA[..] } else { &ComponentTag::RGBA[..1] };
        Ok(tags.iter().map(|&tag| results[0].get(tag).unwrap_or(0.0)).sum())
    }

    /// Splits candidate sets in halves, dropping halves that contribute nothing.
    async fn search(&self, candidates: Vec<SamplePoint>) -> Result<Vec<SamplePoint>, DeviceError> {
        let mut found = Vec::new();
        let mut pending = vec![candidates];
        while let Some(set) = pending.pop() {
            let weight = self.contribution(&set).await?;
            if weight == 0.0 {
                continue;
            }
            if set.len() == 1 {
                found.push(SamplePoint { weight, ..set[0] });
                continue;
            }
            let mut lower = set;
            let upper = lower.split_off(lower.len() / 2);
            pending.push(upper);
            pending.push(lower);
        }
        found.sort_by_key(|p| (p.level, p.coord.z, p.coord.y, p.coord.x, p.coord.sample));
        Ok(found)
    }
}

/// Finds the texels the device reads for `call`, or `None` when the view has more texels than
/// `max_texels`.
#[allow(clippy::too_many_arguments)]
pub async fn identify_sample_points<D: GpuDevice>(
    device: &D,
    programs: &ProgramCache<D>,
    texture: &SoftwareTexture,
    sampler: Option<&SamplerState>,
    call: &TextureCall,
    stage: ShaderStage,
    max_texels: usize,
) -> Result<Option<Vec<SamplePoint>>, DeviceError> {
    let candidates = view_texels(texture);
    if candidates.len() > max_texels {
        return Ok(None);
    }
    let compare = call.builtin().is_compare();
    let probe = PointProbe {
        device,
        programs,
        texture,
        format: probe_format(texture),
        // 0.5 < 1 passes and 0.5 < 0 fails, so passing texels read as one
        call: if compare { with_depth_ref(call, 0.5) } else { call.clone() },
        sampler: sampler.map(|s| if compare { s.clone().with_compare(CompareFunction::Less) } else { s.clone() }),
        stage,
    };
    log::debug!("searching {} texels for the sample points of {}", candidates.len(), call);
    probe.search(candidates).await.map(Some)
}

/// ASCII maps of the levels and layers either side sampled, followed by a legend.
///
/// `S` marks texels only the software sampler read, `G` texels only the device read and `B`
/// texels both read.
pub fn texel_map(texture: &SoftwareTexture, software: &[SamplePoint], device: &[SamplePoint]) -> String {
    let key = |p: &SamplePoint| (p.level, p.coord.z);
    let planes: BTreeSet<(u32, u32)> = software.iter().chain(device).map(key).collect();
    let at = |points: &[SamplePoint], level: u32, x: u32, y: u32, z: u32| {
        points.iter().any(|p| p.level == level && p.coord.x == x && p.coord.y == y && p.coord.z == z)
    };

    let mut out = String::new();
    for (level, z) in planes {
        let [w, h, _] = texture.level_size(level);
        let _ = writeln!(out, "  level {} layer {} ({}x{}):", level, z, w, h);
        if w <= MAX_MAP_EXTENT && h <= MAX_MAP_EXTENT {
            for y in 0..h {
                let row: String = (0..w)
                    .map(|x| match (at(software, level, x, y, z), at(device, level, x, y, z)) {
                        (true, true) => 'B',
                        (true, false) => 'S',
                        (false, true) => 'G',
                        (false, false) => '.',
                    })
                    .collect();
                let _ = writeln!(out, "    {}", row);
            }
        }
        for (mark, points) in [('S', software), ('G', device)] {
            for p in points.iter().filter(|p| key(p) == (level, z)) {
                let c = p.coord;
                let value = view_texel(texture, &texture.texel(level, c.x, c.y, c.z, c.sample));
                let _ = writeln!(out, "    {} {}: weight {:.6}, texel {}", mark, c, p.weight, value);
            }
        }
    }
    out
}

fn to_rgba8(texel: [f64; 4]) -> [u8; 4] {
    texel.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn save_png(path: &Path, size: [u32; 2], raw: Vec<u8>) -> bool {
    let Some(image) = ImageBuffer::<Rgba<u8>, _>::from_raw(size[0], size[1], raw) else {
        return false;
    };
    match image.save(path) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("could not write {}: {}", path.display(), err);
            false
        }
    }
}

/// Writes every level and layer of the software texture, and of the device texture as read
/// back, as PNGs. Values are clamped to [0, 1].
pub async fn dump_textures<D: GpuDevice>(
    device: &D,
    gpu_texture: &D::Texture,
    texture: &SoftwareTexture,
    dir: &Path,
    prefix: &str,
) -> Vec<PathBuf> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        log::warn!("could not create {}: {}", dir.display(), err);
        return Vec::new();
    }
    let mut written = Vec::new();
    let descriptor = texture.descriptor();
    for view_level in 0..texture.view_level_count() {
        let [w, h, d] = texture.level_size(view_level);
        let layers = if d > 1 { d } else { texture.view_layer_count() };
        let physical_level = texture.view().base_mip_level + view_level;
        let readback = match device.read_texture_level(gpu_texture, physical_level, descriptor.format).await {
            Ok(texels) => Some(texels),
            Err(err) => {
                log::warn!("could not read back level {}: {}", physical_level, err);
                None
            }
        };
        for z in 0..layers {
            let mut software = Vec::with_capacity((w * h * 4) as usize);
            let mut gpu = Vec::with_capacity((w * h * 4) as usize);
            for y in 0..h {
                for x in 0..w {
                    let texel = view_texel(texture, &texture.texel(view_level, x, y, z, 0));
                    software.extend(to_rgba8(ComponentTag::RGBA.map(|t| texel.get(t).unwrap_or(0.0))));
                    if let Some(readback) = &readback {
                        let (_, physical) = texture.physical_coord(view_level, x, y, z, 0);
                        let index = ((physical.z * h + y) * w + x) * descriptor.sample_count;
                        let texel = readback.get(index as usize).copied().unwrap_or_default();
                        gpu.extend(to_rgba8(texel.map(|c| c as f64)));
                    }
                }
            }
            let name = format!("{}-level{}-layer{}", prefix, view_level, z);
            let path = dir.join(format!("{}-expected.png", name));
            if save_png(&path, [w, h], software) {
                written.push(path);
            }
            if readback.is_some() {
                let path = dir.join(format!("{}-device.png", name));
                if save_png(&path, [w, h], gpu) {
                    written.push(path);
                }
            }
        }
    }
    written
}

/// Collects the diagnostics for a failed call. Device failures while diagnosing are recorded in
/// the report rather than returned.
#[allow(clippy::too_many_arguments)]
pub async fn build_mismatch_report<D: GpuDevice + Clone + 'static>(
    context: &OracleContext<D>,
    device: &D,
    gpu_texture: &D::Texture,
    texture: &SoftwareTexture,
    sampler: Option<&SamplerState>,
    index: usize,
    call: &TextureCall,
    expected: Option<&TextureReadResult>,
    got: &PerTexelComponents,
    diffs: Vec<ComponentDiff>,
    stage: ShaderStage,
) -> MismatchReport {
    let config = context.config();
    let software_points: Vec<SamplePoint> = expected.map(|r| r.sample_points.to_vec()).unwrap_or_default();
    let limit = config.max_diagnostic_texels;
    let device_points =
        match identify_sample_points(device, context.programs(), texture, sampler, call, stage, limit).await {
            Ok(Some(points)) => DevicePoints::Found(points),
            Ok(None) => DevicePoints::Skipped { texel_count: view_texels(texture).len(), limit },
            Err(err) => DevicePoints::Failed(err.to_string()),
        };
    let found: &[SamplePoint] = match &device_points {
        DevicePoints::Found(points) => points,
        _ => &[],
    };
    let texel_map = texel_map(texture, &software_points, found);
    let dumped_files = match &config.dump_dir {
        Some(dir) => {
            let prefix = format!("{}-{}-call{}", texture.format().name(), stage, index);
            dump_textures(device, gpu_texture, texture, dir, &prefix).await
        }
        None => Vec::new(),
    };
    MismatchReport {
        index,
        call: call.to_string(),
        stage,
        texture: describe_texture(texture),
        sampler: sampler.map(|s| s.to_string()),
        expected: expected.map(|r| r.value),
        got: *got,
        diffs,
        ulp_tolerance: config.ulp_tolerance,
        fractional_tolerance: config.max_fractional_diff(texture.format()),
        software_points,
        device_points,
        texel_map,
        dumped_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{TexelView, TextureDescriptor, TextureDimension, ViewDescriptor};

    fn texture() -> SoftwareTexture {
        let descriptor = TextureDescriptor::new(TextureFormat::R8Unorm, TextureDimension::D2, [4, 2, 1]);
        let level = TexelView::from_generator(TextureFormat::R8Unorm, [4, 2, 1], 1, |c| {
            PerTexelComponents::new().with(ComponentTag::R, c.x as f64 / 4.0)
        });
        SoftwareTexture::new(descriptor, ViewDescriptor::whole(&descriptor), vec![level])
    }

    fn point(x: u32, y: u32, weight: f64) -> SamplePoint {
        SamplePoint { level: 0, coord: TexelCoord::new(x, y, 0), weight }
    }

    #[test]
    fn map_marks_both_sides() {
        let texture = texture();
        let map = texel_map(&texture, &[point(0, 0, 0.5), point(1, 0, 0.5)], &[point(1, 0, 0.75), point(3, 1, 0.25)]);
        let lines: Vec<&str> = map.lines().collect();
        assert_eq!(lines[0], "  level 0 layer 0 (4x2):");
        assert_eq!(lines[1], "    SB..");
        assert_eq!(lines[2], "    ...G");
        assert!(lines[3].starts_with("    S [0, 0, 0]: weight 0.500000"));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn probe_formats_keep_sample_type() {
        assert_eq!(probe_format(&texture()), TextureFormat::Rgba8Unorm);
        assert_eq!(view_texels(&texture()).len(), 8);
    }

    #[test]
    fn report_display() {
        let report = MismatchReport {
            index: 3,
            call: "textureLoad(coords: [1, 0], level: 0i)".to_string(),
            stage: ShaderStage::Compute,
            texture: describe_texture(&texture()),
            sampler: None,
            expected: Some(PerTexelComponents::rgba(0.25, 0.0, 0.0, 1.0)),
            got: PerTexelComponents::rgba(0.5, 0.0, 0.0, 1.0),
            diffs: Vec::new(),
            ulp_tolerance: 3,
            fractional_tolerance: 7.0 / 255.0,
            software_points: Vec::new(),
            device_points: DevicePoints::Skipped { texel_count: 8, limit: 4 },
            texel_map: String::new(),
            dumped_files: Vec::new(),
        };
        let text = report.to_string();
        assert!(text.starts_with("compute call 3 failed: textureLoad(coords: [1, 0], level: 0i)\n"), "{}", text);
        assert!(text.contains("r8unorm 2d 4x2x1, 1 levels, 1 samples, view levels 0..1 layers 0..1"), "{}", text);
        assert!(text.contains("device sample points not searched: 8 texels, limit 4"));
    }
}
