//! Tolerance policy and diagnostic settings.
//!
//! The tolerance constants were tuned against observed hardware divergence; they are policy,
//! not physics, so everything here can be overridden per run.

use crate::format::{TextureFormat, ToleranceFamily};
use std::path::PathBuf;

pub const ENV_ULP_TOLERANCE: &str = "TEXSIM_ULP_TOLERANCE";
pub const ENV_MAX_DIAGNOSTIC_TEXELS: &str = "TEXSIM_MAX_DIAGNOSTIC_TEXELS";
pub const ENV_DUMP_DIR: &str = "TEXSIM_DUMP_DIR";

/// Largest absolute difference accepted per format family.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatTolerances {
    pub unorm8: f64,
    pub snorm8: f64,
    pub float: f64,
    pub ufloat11_10: f64,
    pub integer: f64,
    pub depth: f64,
}

impl Default for FormatTolerances {
    fn default() -> Self {
        Self {
            unorm8: 7.0 / 255.0,
            snorm8: 7.9 / 128.0,
            float: 44.0,
            ufloat11_10: 156.0,
            integer: 0.0,
            depth: 3.0 / 100.0,
        }
    }
}

impl FormatTolerances {
    pub fn max_fractional_diff(&self, format: TextureFormat) -> f64 {
        match format.tolerance_family() {
            ToleranceFamily::Unorm8 => self.unorm8,
            ToleranceFamily::Snorm8 => self.snorm8,
            ToleranceFamily::Float => self.float,
            ToleranceFamily::Ufloat11_10 => self.ufloat11_10,
            ToleranceFamily::Integer => self.integer,
            ToleranceFamily::Depth => self.depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    /// Values within this many format-relative ULPs always match.
    pub ulp_tolerance: u32,
    pub tolerances: FormatTolerances,
    /// Textures with more texels than this skip device-side sample point narrowing.
    pub max_diagnostic_texels: usize,
    /// When set, mismatching textures are written here as PNGs.
    pub dump_dir: Option<PathBuf>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { ulp_tolerance: 3, tolerances: FormatTolerances::default(), max_diagnostic_texels: 4096, dump_dir: None }
    }
}

impl OracleConfig {
    /// Defaults, overridden by `TEXSIM_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = parse_var(&lookup, ENV_ULP_TOLERANCE) {
            self.ulp_tolerance = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_DIAGNOSTIC_TEXELS) {
            self.max_diagnostic_texels = value;
        }
        if let Some(dir) = lookup(ENV_DUMP_DIR).filter(|dir| !dir.is_empty()) {
            self.dump_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn with_ulp_tolerance(mut self, ulp_tolerance: u32) -> Self {
        self.ulp_tolerance = ulp_tolerance;
        self
    }

    pub fn with_tolerances(mut self, tolerances: FormatTolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn with_max_diagnostic_texels(mut self, max_diagnostic_texels: usize) -> Self {
        self.max_diagnostic_texels = max_diagnostic_texels;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn max_fractional_diff(&self, format: TextureFormat) -> f64 {
        self.tolerances.max_fractional_diff(format)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}
