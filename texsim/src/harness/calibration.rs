//! Measures how a device blends between mip levels.
//!
//! GPUs quantize the fractional level before blending, each in its own way. Sampling a texture
//! whose level 0 is black and level 1 is white at 65 evenly spaced levels reads the blend weight
//! back directly.

use super::device::{GpuDevice, ShaderStage, TextureBinding};
use super::execute::run_texture_calls;
use super::program::ProgramCache;
use crate::error::{CalibrationError, DeviceError};
use crate::format::TextureFormat;
use crate::sampling::{
    LevelArg, MIP_WEIGHT_STEPS, MipWeightCurve, SamplerState, TextureCall, float_args, validate_mip_weights,
};
use crate::texture::{ComponentTag, TextureDescriptor, TextureDimension, ViewDescriptor};

fn calibration_calls() -> (Vec<TextureCall>, Vec<TextureCall>) {
    let steps = MIP_WEIGHT_STEPS as f64;
    let level_calls = (0..=MIP_WEIGHT_STEPS)
        .map(|i| TextureCall::SampleLevel {
            coords: float_args(&[0.5, 0.5]),
            array_index: None,
            level: LevelArg::Float(i as f64 / steps),
            offset: None,
        })
        .collect();
    // level 0 is 2 texels wide, so a derivative of 2^lod / 2 selects lod
    let grad_calls = (0..=MIP_WEIGHT_STEPS)
        .map(|i| TextureCall::SampleGrad {
            coords: float_args(&[0.5, 0.5]),
            array_index: None,
            ddx: float_args(&[(i as f64 / steps).exp2() / 2.0, 0.0]),
            ddy: float_args(&[0.0, 0.0]),
            offset: None,
        })
        .collect();
    (level_calls, grad_calls)
}

/// Samples the black/white texture in `stage` and returns both measured curves.
pub async fn measure_mip_weights<D: GpuDevice>(
    device: &D,
    programs: &ProgramCache<D>,
    stage: ShaderStage,
) -> Result<MipWeightCurve, CalibrationError> {
    let device_error = |source: DeviceError| CalibrationError::Device { stage, source };

    let descriptor = TextureDescriptor::new(TextureFormat::Rgba8Unorm, TextureDimension::D2, [2, 2, 1])
        .with_mip_level_count(2);
    let levels = vec![vec![0u8; 2 * 2 * 4], vec![255u8; 4]];
    let texture = device.create_texture(&descriptor, &levels).await.map_err(device_error)?;
    let binding = TextureBinding { descriptor, view: ViewDescriptor::whole(&descriptor) };
    let sampler = SamplerState::linear();

    let (level_calls, grad_calls) = calibration_calls();
    let mut curves = Vec::with_capacity(2);
    for (name, calls) in [("sample level", level_calls), ("gradient", grad_calls)] {
        let results = run_texture_calls(device, programs, &texture, binding, Some(&sampler), &calls, stage)
            .await
            .map_err(device_error)?;
        let weights: Vec<f64> = results.iter().map(|r| r.get(ComponentTag::R).unwrap_or(f64::NAN)).collect();
        validate_mip_weights(&weights)
            .map_err(|reason| CalibrationError::InvalidCurve { stage, curve: name, reason })?;
        curves.push(weights);
    }
    let gradient_weights = curves.pop().unwrap_or_default();
    let sample_level_weights = curves.pop().unwrap_or_default();
    log::info!("measured {} mip weights on {}", stage, device.id());
    log::debug!(
        "{} mip weights at 0.25/0.5/0.75: sample level {:?}, gradient {:?}",
        stage,
        [16usize, 32, 48].map(|i| sample_level_weights[i]),
        [16usize, 32, 48].map(|i| gradient_weights[i]),
    );
    Ok(MipWeightCurve { sample_level_weights, gradient_weights })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::lod_from_gradients;

    #[test]
    fn probes_cover_one_level() {
        let (level_calls, grad_calls) = calibration_calls();
        assert_eq!(level_calls.len(), MIP_WEIGHT_STEPS + 1);
        for (i, call) in grad_calls.iter().enumerate() {
            let TextureCall::SampleGrad { ddx, ddy, .. } = call else { unreachable!() };
            let lod = lod_from_gradients(ddx, ddy, &[2.0, 2.0], 2);
            assert!((lod - i as f64 / 64.0).abs() < 1e-12);
        }
    }
}
