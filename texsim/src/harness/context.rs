use super::calibration::measure_mip_weights;
use super::device::{DeviceId, GpuDevice, ShaderStage};
use super::program::ProgramCache;
use crate::config::OracleConfig;
use crate::error::CalibrationError;
use crate::sampling::MipWeightCurve;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type CurveKey = (DeviceId, ShaderStage);
type PendingCurve = Shared<LocalBoxFuture<'static, Result<Rc<MipWeightCurve>, CalibrationError>>>;

/// State shared by every check against the devices of one test run.
///
/// Mip weight curves are measured once per device and stage. Concurrent requests for the same
/// curve wait on one measurement.
pub struct OracleContext<D: GpuDevice + Clone + 'static> {
    config: OracleConfig,
    curves: RefCell<HashMap<CurveKey, Rc<MipWeightCurve>>>,
    pending: RefCell<HashMap<CurveKey, PendingCurve>>,
    programs: Rc<ProgramCache<D>>,
}

impl<D: GpuDevice + Clone + 'static> OracleContext<D> {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            config,
            curves: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashMap::new()),
            programs: Rc::new(ProgramCache::new()),
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn programs(&self) -> &ProgramCache<D> {
        &self.programs
    }

    pub fn cached_mip_weights(&self, device: DeviceId, stage: ShaderStage) -> Option<Rc<MipWeightCurve>> {
        self.curves.borrow().get(&(device, stage)).cloned()
    }

    /// The device's curve for `stage`, measured on first use.
    pub async fn mip_weights(&self, device: &D, stage: ShaderStage) -> Result<Rc<MipWeightCurve>, CalibrationError> {
        let key = (device.id(), stage);
        if let Some(curve) = self.cached_mip_weights(key.0, stage) {
            return Ok(curve);
        }
        let measurement = self
            .pending
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| {
                let device = device.clone();
                let programs = self.programs.clone();
                async move { measure_mip_weights(&device, &programs, stage).await.map(Rc::new) }
                    .boxed_local()
                    .shared()
            })
            .clone();
        let result = measurement.await;
        // Absent when another waiter got here first or the device was destroyed meanwhile.
        let was_pending = self.pending.borrow_mut().remove(&key).is_some();
        if was_pending {
            if let Ok(curve) = &result {
                self.curves.borrow_mut().insert(key, curve.clone());
            }
        } else if self.cached_mip_weights(key.0, stage).is_none() {
            // Programs the measurement compiled after the device went away.
            self.programs.remove_device(key.0);
        }
        result
    }

    /// Forgets everything cached for a device that is gone.
    pub fn device_destroyed(&self, device: DeviceId) {
        self.curves.borrow_mut().retain(|(id, _), _| *id != device);
        self.pending.borrow_mut().retain(|(id, _), _| *id != device);
        self.programs.remove_device(device);
        log::debug!("dropped cached state of {}", device);
    }
}

impl<D: GpuDevice + Clone + 'static> Default for OracleContext<D> {
    fn default() -> Self {
        Self::new(OracleConfig::default())
    }
}
