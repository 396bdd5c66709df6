//! Reconciles device results with the software sampler.

use super::context::OracleContext;
use super::device::{GpuDevice, ShaderStage};
use super::diagnostics::{MismatchReport, build_mismatch_report};
use crate::config::OracleConfig;
use crate::error::{CalibrationError, SampleError};
use crate::format::ulp_from_zero;
use crate::sampling::{
    Builtin, FilterMode, SamplerState, TextureCall, TextureReadResult, software_texture_read, view_texel,
};
use crate::texture::{ComponentTag, PerTexelComponents, SoftwareTexture};
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0}")]
    Mismatch(Box<MismatchReport>),
    #[error("call {index} cannot be checked: {call}: {reason}")]
    Untestable { index: usize, call: String, reason: SampleError },
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// One compared component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentDiff {
    pub tag: ComponentTag,
    pub expected: f64,
    pub got: f64,
    pub ulp_diff: u64,
    pub abs_diff: f64,
    pub pass: bool,
}

impl fmt::Display for ComponentDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}, {} ulp, abs {}{}",
            self.tag.name(),
            self.expected,
            self.got,
            self.ulp_diff,
            self.abs_diff,
            if self.pass { "" } else { " FAIL" }
        )
    }
}

/// Components a call's result carries. Depth, stencil and comparison results are scalars in R,
/// gathers always return four texels.
pub fn compared_tags(texture: &SoftwareTexture, builtin: Builtin) -> &'static [ComponentTag] {
    let scalar = builtin.is_compare() || texture.format().aspect_component(texture.view().aspect).is_some();
    if scalar && !builtin.is_gather() { &ComponentTag::RGBA[..1] } else { &ComponentTag::RGBA }
}

fn f32_ulp_from_zero(value: f64) -> i64 {
    let bits = (value as f32).to_bits();
    let magnitude = (bits & 0x7fff_ffff) as i64;
    if bits & 0x8000_0000 != 0 { -magnitude } else { magnitude }
}

/// Distance between two results in units of the texel format, or of f32 where the result has
/// no format counterpart.
fn ulp_diff(texture: &SoftwareTexture, builtin: Builtin, tag: ComponentTag, a: f64, b: f64) -> u64 {
    let format = texture.format();
    let format_tag = if builtin.is_compare() {
        None
    } else if let Some(aspect_tag) = format.aspect_component(texture.view().aspect) {
        Some(aspect_tag)
    } else if format.components().contains(&tag) {
        Some(tag)
    } else {
        None
    };
    let ulp = |v: f64| match format_tag {
        Some(format_tag) => ulp_from_zero(format, format_tag, v),
        None => f32_ulp_from_zero(v),
    };
    ulp(a).abs_diff(ulp(b))
}

/// Compares `got` against `expected` component by component.
///
/// A component fails only when it is off by more than the ULP tolerance and by more than the
/// format's fractional tolerance. NaN matches only NaN.
pub fn compare_components(
    texture: &SoftwareTexture,
    builtin: Builtin,
    expected: &PerTexelComponents,
    got: &PerTexelComponents,
    config: &OracleConfig,
) -> Vec<ComponentDiff> {
    let max_abs = config.max_fractional_diff(texture.format());
    compared_tags(texture, builtin)
        .iter()
        .map(|&tag| {
            let e = expected.get(tag).unwrap_or(0.0);
            let g = got.get(tag).unwrap_or(0.0);
            if e.is_nan() || g.is_nan() {
                let pass = e.is_nan() && g.is_nan();
                return ComponentDiff { tag, expected: e, got: g, ulp_diff: 0, abs_diff: f64::NAN, pass };
            }
            let ulp_diff = ulp_diff(texture, builtin, tag, e, g);
            let abs_diff = (e - g).abs();
            let pass = ulp_diff <= config.ulp_tolerance as u64 || abs_diff <= max_abs;
            ComponentDiff { tag, expected: e, got: g, ulp_diff, abs_diff, pass }
        })
        .collect()
}

/// Legal results of an out-of-bounds load: zero, transparent or opaque black, or any texel of
/// the view.
pub fn out_of_bounds_candidates(texture: &SoftwareTexture) -> Vec<PerTexelComponents> {
    let mut candidates = vec![PerTexelComponents::rgba(0.0, 0.0, 0.0, 0.0), PerTexelComponents::rgba(0.0, 0.0, 0.0, 1.0)];
    for level in 0..texture.view_level_count() {
        let [w, h, d] = texture.level_size(level);
        let layers = if d > 1 { d } else { texture.view_layer_count() };
        for z in 0..layers {
            for y in 0..h {
                for x in 0..w {
                    for sample in 0..texture.sample_count() {
                        candidates.push(view_texel(texture, &texture.texel(level, x, y, z, sample)));
                    }
                }
            }
        }
    }
    candidates
}

fn needs_mip_weights(texture: &SoftwareTexture, sampler: Option<&SamplerState>, calls: &[TextureCall]) -> bool {
    let Some(sampler) = sampler else {
        return false;
    };
    sampler.mipmap_filter == FilterMode::Linear
        && texture.view_level_count() > 1
        && calls.iter().any(|c| !matches!(c.builtin(), Builtin::TextureLoad) && !c.builtin().is_gather())
}

/// Checks every device result against the software sampler, stopping at the first call that
/// does not match.
///
/// The device's mip weight curve is measured first when linear mip blending can matter.
#[allow(clippy::too_many_arguments)]
pub async fn check_call_results<D: GpuDevice + Clone + 'static>(
    context: &OracleContext<D>,
    device: &D,
    gpu_texture: &D::Texture,
    texture: &SoftwareTexture,
    sampler: Option<&SamplerState>,
    calls: &[TextureCall],
    results: &[PerTexelComponents],
    stage: ShaderStage,
) -> Result<(), CheckError> {
    assert_eq!(calls.len(), results.len(), "one result per call");
    let curve = if needs_mip_weights(texture, sampler, calls) {
        Some(context.mip_weights(device, stage).await?)
    } else {
        None
    };
    let weights = curve.as_deref();
    let expected: Vec<Result<TextureReadResult, SampleError>> =
        calls.par_iter().map(|call| software_texture_read(call, texture, sampler, weights)).collect();

    let config = context.config();
    for (index, ((call, got), expected)) in calls.iter().zip(results).zip(&expected).enumerate() {
        let builtin = call.builtin();
        let failing = match expected {
            Ok(read) => {
                let diffs = compare_components(texture, builtin, &read.value, got, config);
                if diffs.iter().all(|d| d.pass) { None } else { Some((Some(read), diffs)) }
            }
            Err(SampleError::OutOfBounds) => {
                let candidates = out_of_bounds_candidates(texture);
                let accepted = candidates
                    .iter()
                    .any(|c| compare_components(texture, builtin, c, got, config).iter().all(|d| d.pass));
                if accepted { None } else { Some((None, compare_components(texture, builtin, &candidates[0], got, config))) }
            }
            Err(reason @ SampleError::CubeCorner { .. }) => {
                return Err(CheckError::Untestable { index, call: call.to_string(), reason: *reason });
            }
        };
        if let Some((expected, diffs)) = failing {
            log::warn!("{} call {} mismatched: {}", stage, index, call);
            let report =
                build_mismatch_report(context, device, gpu_texture, texture, sampler, index, call, expected, got, diffs, stage)
                    .await;
            return Err(CheckError::Mismatch(Box::new(report)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TextureFormat;
    use crate::texture::{TexelView, TextureDescriptor, TextureDimension, ViewDescriptor};
    use rstest::rstest;

    fn texture(format: TextureFormat) -> SoftwareTexture {
        let descriptor = TextureDescriptor::new(format, TextureDimension::D2, [2, 1, 1]);
        let level = TexelView::from_generator(format, [2, 1, 1], 1, move |c| {
            if format.has_depth() {
                PerTexelComponents::depth(0.25 + c.x as f64 * 0.5)
            } else {
                PerTexelComponents::rgba(c.x as f64, 0.5, 0.25, 1.0)
            }
        });
        SoftwareTexture::new(descriptor, ViewDescriptor::whole(&descriptor), vec![level])
    }

    #[rstest]
    #[case(TextureFormat::Rgba8Unorm, 0.5, 0.5 + 3.0 / 255.0, true)]
    #[case(TextureFormat::Rgba8Unorm, 0.5, 0.5 + 8.0 / 255.0, false)]
    #[case(TextureFormat::Rgba32Float, 0.5, 0.5 + 1e-7, true)]
    #[case(TextureFormat::Rgba32Float, 0.5, 100.0, false)]
    #[case(TextureFormat::Rgba32Float, 0.5, 40.0, true)]
    fn tolerance(#[case] format: TextureFormat, #[case] expected: f64, #[case] got: f64, #[case] pass: bool) {
        let texture = texture(format);
        let e = PerTexelComponents::rgba(expected, 0.0, 0.0, 1.0);
        let g = PerTexelComponents::rgba(got, 0.0, 0.0, 1.0);
        let diffs = compare_components(&texture, Builtin::TextureLoad, &e, &g, &OracleConfig::default());
        assert_eq!(diffs.len(), 4);
        assert_eq!(diffs[0].pass, pass, "{}", diffs[0]);
        assert!(diffs[1..].iter().all(|d| d.pass));
    }

    #[test]
    fn nan_matches_only_nan() {
        let texture = texture(TextureFormat::Rgba32Float);
        let config = OracleConfig::default();
        let nan = PerTexelComponents::rgba(f64::NAN, 0.0, 0.0, 1.0);
        let one = PerTexelComponents::rgba(1.0, 0.0, 0.0, 1.0);
        assert!(compare_components(&texture, Builtin::TextureLoad, &nan, &nan, &config)[0].pass);
        assert!(!compare_components(&texture, Builtin::TextureLoad, &nan, &one, &config)[0].pass);
        assert!(!compare_components(&texture, Builtin::TextureLoad, &one, &nan, &config)[0].pass);
    }

    #[test]
    fn depth_compares_red_only() {
        let texture = texture(TextureFormat::Depth32Float);
        assert_eq!(compared_tags(&texture, Builtin::TextureLoad), &[ComponentTag::R]);
        assert_eq!(compared_tags(&texture, Builtin::TextureGatherCompare).len(), 4);
        let color = self::texture(TextureFormat::Rgba8Unorm);
        assert_eq!(compared_tags(&color, Builtin::TextureSampleLevel).len(), 4);
    }

    #[test]
    fn out_of_bounds_accepts_zero_or_any_texel() {
        let texture = texture(TextureFormat::Rgba8Unorm);
        let config = OracleConfig::default();
        let accepts = |got: PerTexelComponents| {
            out_of_bounds_candidates(&texture)
                .iter()
                .any(|c| compare_components(&texture, Builtin::TextureLoad, c, &got, &config).iter().all(|d| d.pass))
        };
        assert!(accepts(PerTexelComponents::rgba(0.0, 0.0, 0.0, 0.0)));
        assert!(accepts(PerTexelComponents::rgba(0.0, 0.0, 0.0, 1.0)));
        assert!(accepts(view_texel(&texture, &texture.texel(0, 1, 0, 0, 0))));
        assert!(!accepts(PerTexelComponents::rgba(0.5, 0.5, 0.5, 0.5)));
    }
}
