mod common;

use common::{SoftwareDevice, init_logging, stepped_curve};
use pollster::block_on;
use texsim::harness::{GpuDevice, OracleContext, ProgramCache, ShaderStage, measure_mip_weights};
use texsim::sampling::{MipWeightCurve, MipWeightKind};
use texsim::{CalibrationError, DeviceError, OracleConfig};

/// Gradient probes go through `log2` of f32 derivatives, so their levels are only close to the
/// probed fractions.
fn assert_curves_match(measured: &MipWeightCurve, device: &MipWeightCurve) {
    assert_eq!(measured.sample_level_weights, device.sample_level_weights);
    assert_eq!(measured.gradient_weights.len(), device.gradient_weights.len());
    for (i, (m, d)) in measured.gradient_weights.iter().zip(&device.gradient_weights).enumerate() {
        assert!((m - d).abs() < 1e-6, "gradient weight {}: {} vs {}", i, m, d);
    }
}

#[test]
fn measures_linear_curve() {
    init_logging();
    let device = SoftwareDevice::new();
    let programs = ProgramCache::new();
    let curve = block_on(measure_mip_weights(&device, &programs, ShaderStage::Compute)).unwrap();
    assert_curves_match(&curve, &MipWeightCurve::linear());
}

#[test]
fn measures_stepped_curve_in_every_stage() {
    init_logging();
    let device = SoftwareDevice::with_curve(stepped_curve());
    let programs = ProgramCache::new();
    for stage in ShaderStage::ALL {
        let curve = block_on(measure_mip_weights(&device, &programs, stage)).unwrap();
        assert_curves_match(&curve, &stepped_curve());
        assert!((curve.weight(MipWeightKind::Gradient, 0.25) - 0.25).abs() < 1e-6, "{}", stage);
        assert_eq!(curve.weight(MipWeightKind::SampleLevel, 0.28), 0.25);
    }
}

#[test]
fn rejects_curve_with_too_few_steps() {
    init_logging();
    let steps: Vec<f64> = (0..=64).map(|i| (i / 16) as f64 / 4.0).collect();
    let device = SoftwareDevice::with_curve(MipWeightCurve { sample_level_weights: steps.clone(), gradient_weights: steps });
    let programs = ProgramCache::new();
    let err = block_on(measure_mip_weights(&device, &programs, ShaderStage::Fragment)).unwrap_err();
    assert_eq!(
        err,
        CalibrationError::InvalidCurve {
            stage: ShaderStage::Fragment,
            curve: "sample level",
            reason: "only 5 unique weights, need at least 17".to_string(),
        }
    );
}

#[test]
fn lost_device_is_a_calibration_error() {
    let device = SoftwareDevice::new();
    device.lose();
    let programs = ProgramCache::new();
    let err = block_on(measure_mip_weights(&device, &programs, ShaderStage::Vertex)).unwrap_err();
    assert_eq!(err, CalibrationError::Device { stage: ShaderStage::Vertex, source: DeviceError::DeviceLost });
}

#[test]
fn context_measures_once_per_device_and_stage() {
    init_logging();
    let device = SoftwareDevice::with_curve(stepped_curve());
    let context = OracleContext::new(OracleConfig::default());

    let (a, b) = block_on(futures::future::join(
        context.mip_weights(&device, ShaderStage::Fragment),
        context.mip_weights(&device, ShaderStage::Fragment),
    ));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(device.textures_created(), 1);

    block_on(context.mip_weights(&device, ShaderStage::Fragment)).unwrap();
    assert_eq!(device.textures_created(), 1);
    assert!(context.cached_mip_weights(device.id(), ShaderStage::Fragment).is_some());
    assert!(context.cached_mip_weights(device.id(), ShaderStage::Compute).is_none());

    block_on(context.mip_weights(&device, ShaderStage::Compute)).unwrap();
    assert_eq!(device.textures_created(), 2);
}

#[test]
fn destroyed_device_is_forgotten() {
    let device = SoftwareDevice::new();
    let other = SoftwareDevice::new();
    let context = OracleContext::new(OracleConfig::default());
    block_on(context.mip_weights(&device, ShaderStage::Compute)).unwrap();
    block_on(context.mip_weights(&other, ShaderStage::Compute)).unwrap();
    assert_eq!(context.programs().len(), 4);

    context.device_destroyed(device.id());
    assert!(context.cached_mip_weights(device.id(), ShaderStage::Compute).is_none());
    assert!(context.cached_mip_weights(other.id(), ShaderStage::Compute).is_some());
    assert_eq!(context.programs().len(), 2);
}

#[test]
fn device_destroyed_during_measurement_stays_forgotten() {
    init_logging();
    let device = SoftwareDevice::new();
    device.yield_before_runs();
    let context = OracleContext::new(OracleConfig::default());
    let (curve, ()) = block_on(futures::future::join(
        context.mip_weights(&device, ShaderStage::Compute),
        async { context.device_destroyed(device.id()) },
    ));
    assert_curves_match(&curve.unwrap(), &MipWeightCurve::linear());
    assert!(device.runs() > 0);
    assert!(context.cached_mip_weights(device.id(), ShaderStage::Compute).is_none());
    assert_eq!(context.programs().len(), 0);
}
