//! Level-of-detail selection and mip blending.

use super::sampler::{FilterMode, SamplerState};
use crate::math::{fract, lerp};

pub const MIN_LOD_BIAS: f64 = -16.0;
pub const MAX_LOD_BIAS: f64 = 15.99;

/// Steps between the first and last calibration probe; curves have one more entry.
pub const MIP_WEIGHT_STEPS: usize = 64;

/// Which calibrated curve a builtin's mip blend follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipWeightKind {
    /// Explicit level arguments.
    SampleLevel,
    /// Levels derived from gradients, explicit or implicit.
    Gradient,
}

/// Observed weight of the upper level when blending two mips, per fractional level step.
#[derive(Debug, Clone, PartialEq)]
pub struct MipWeightCurve {
    pub sample_level_weights: Vec<f64>,
    pub gradient_weights: Vec<f64>,
}

impl MipWeightCurve {
    /// An ideal device that blends exactly by the fractional level.
    pub fn linear() -> Self {
        let weights: Vec<f64> = (0..=MIP_WEIGHT_STEPS).map(|i| i as f64 / MIP_WEIGHT_STEPS as f64).collect();
        Self { sample_level_weights: weights.clone(), gradient_weights: weights }
    }

    pub fn weights(&self, kind: MipWeightKind) -> &[f64] {
        match kind {
            MipWeightKind::SampleLevel => &self.sample_level_weights,
            MipWeightKind::Gradient => &self.gradient_weights,
        }
    }

    /// Weight for a fractional level in `[0, 1]`, interpolated between calibration steps.
    pub fn weight(&self, kind: MipWeightKind, fraction: f64) -> f64 {
        let weights = self.weights(kind);
        let steps = weights.len() - 1;
        let position = fraction.clamp(0.0, 1.0) * steps as f64;
        let index = position.floor() as usize;
        if index >= steps {
            return weights[steps];
        }
        lerp(weights[index], weights[index + 1], position - index as f64)
    }
}

/// Checks the invariants a measured curve must satisfy. The error names the first violation.
pub fn validate_mip_weights(weights: &[f64]) -> Result<(), String> {
    if weights.len() != MIP_WEIGHT_STEPS + 1 {
        return Err(format!("expected {} weights, got {}", MIP_WEIGHT_STEPS + 1, weights.len()));
    }
    if weights[0] != 0.0 {
        return Err(format!("first weight is {}", weights[0]));
    }
    if weights[MIP_WEIGHT_STEPS] != 1.0 {
        return Err(format!("last weight is {}", weights[MIP_WEIGHT_STEPS]));
    }
    if let Some(i) = weights.windows(2).position(|w| w[1] < w[0]) {
        return Err(format!("weight {} ({}) is below weight {} ({})", i + 1, weights[i + 1], i, weights[i]));
    }
    let mut unique = weights.to_vec();
    unique.dedup();
    let min_unique = (weights.len() as f64 * 0.25).ceil() as usize;
    if unique.len() < min_unique {
        return Err(format!("only {} unique weights, need at least {}", unique.len(), min_unique));
    }
    Ok(())
}

pub fn clamp_lod_bias(bias: f64) -> f64 {
    bias.clamp(MIN_LOD_BIAS, MAX_LOD_BIAS)
}

/// Implicit screen-space derivatives of a fragment whose coordinate changes by
/// `multiplier` per pixel: x moves along the first axis, y along the remaining ones.
pub fn implicit_derivatives(multiplier: Option<&[f64]>) -> ([f64; 3], [f64; 3]) {
    match multiplier {
        Some(m) => {
            let at = |i: usize| m.get(i).copied().unwrap_or(0.0);
            ([at(0), 0.0, 0.0], [0.0, at(1), at(2)])
        }
        None => ([0.0; 3], [0.0; 3]),
    }
}

/// `0.5 * log2(max(|ddx * size|^2, |ddy * size|^2))` over the first `dims` axes.
/// Zero gradients give negative infinity.
pub fn lod_from_gradients(ddx: &[f64], ddy: &[f64], size: &[f64], dims: usize) -> f64 {
    let length_sq = |d: &[f64]| (0..dims).map(|i| (d[i] * size[i]).powi(2)).sum::<f64>();
    0.5 * length_sq(ddx).max(length_sq(ddy)).log2()
}

/// Outcome of level selection for one sampling call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSelection {
    /// Level after bias and every clamp.
    pub lod: f64,
    /// Filter used within a level.
    pub filter: FilterMode,
    /// `(view level, weight)` of up to two levels to blend.
    pub levels: [(u32, f64); 2],
    pub level_count: usize,
}

impl LevelSelection {
    pub fn levels(&self) -> &[(u32, f64)] {
        &self.levels[..self.level_count]
    }
}

/// Applies bias, the sampler and view clamps and the mipmap filter to a computed level.
pub fn select_levels(
    lod: f64,
    bias: f64,
    sampler: &SamplerState,
    view_level_count: u32,
    kind: MipWeightKind,
    curve: Option<&MipWeightCurve>,
) -> LevelSelection {
    let biased = (lod + clamp_lod_bias(bias)).clamp(sampler.lod_min_clamp, sampler.lod_max_clamp);
    let filter = if biased <= 0.0 { sampler.mag_filter } else { sampler.min_filter };
    let max_level = (view_level_count - 1) as f64;
    let lod = biased.clamp(0.0, max_level);
    let single = |level: f64| LevelSelection { lod, filter, levels: [(level as u32, 1.0), (0, 0.0)], level_count: 1 };
    match sampler.mipmap_filter {
        FilterMode::Nearest => single(((lod + 0.5).ceil() - 1.0).clamp(0.0, max_level)),
        FilterMode::Linear => {
            let lower = lod.floor();
            let fraction = fract(lod);
            if fraction == 0.0 || lower >= max_level {
                return single(lower);
            }
            let weight = match curve {
                Some(curve) => curve.weight(kind, fraction),
                None => fraction,
            };
            LevelSelection {
                lod,
                filter,
                levels: [(lower as u32, 1.0 - weight), (lower as u32 + 1, weight)],
                level_count: 2,
            }
        }
    }
}
