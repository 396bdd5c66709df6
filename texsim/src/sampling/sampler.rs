use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Depth comparison, evaluated as `reference OP texel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    pub const ALL: [CompareFunction; 8] = [
        CompareFunction::Never,
        CompareFunction::Less,
        CompareFunction::Equal,
        CompareFunction::LessEqual,
        CompareFunction::Greater,
        CompareFunction::NotEqual,
        CompareFunction::GreaterEqual,
        CompareFunction::Always,
    ];

    pub fn passes(self, reference: f64, texel: f64) -> bool {
        match self {
            CompareFunction::Never => false,
            CompareFunction::Less => reference < texel,
            CompareFunction::Equal => reference == texel,
            CompareFunction::LessEqual => reference <= texel,
            CompareFunction::Greater => reference > texel,
            CompareFunction::NotEqual => reference != texel,
            CompareFunction::GreaterEqual => reference >= texel,
            CompareFunction::Always => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompareFunction::Never => "never",
            CompareFunction::Less => "less",
            CompareFunction::Equal => "equal",
            CompareFunction::LessEqual => "less-equal",
            CompareFunction::Greater => "greater",
            CompareFunction::NotEqual => "not-equal",
            CompareFunction::GreaterEqual => "greater-equal",
            CompareFunction::Always => "always",
        }
    }
}

/// Sampler configuration a call is evaluated with.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f64,
    pub lod_max_clamp: f64,
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
        }
    }
}

impl SamplerState {
    pub fn nearest() -> Self {
        Self::default()
    }

    pub fn linear() -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        }
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    pub fn with_address_modes(mut self, u: AddressMode, v: AddressMode, w: AddressMode) -> Self {
        self.address_mode_u = u;
        self.address_mode_v = v;
        self.address_mode_w = w;
        self
    }

    pub fn with_filters(mut self, mag: FilterMode, min: FilterMode, mipmap: FilterMode) -> Self {
        self.mag_filter = mag;
        self.min_filter = min;
        self.mipmap_filter = mipmap;
        self
    }

    pub fn with_lod_clamp(mut self, min: f64, max: f64) -> Self {
        assert!(min >= 0.0 && min <= max, "invalid lod clamp [{}, {}]", min, max);
        self.lod_min_clamp = min;
        self.lod_max_clamp = max;
        self
    }

    pub fn with_compare(mut self, compare: CompareFunction) -> Self {
        self.compare = Some(compare);
        self
    }

    /// Address mode of axis 0 (u), 1 (v) or 2 (w).
    pub fn address_mode(&self, axis: usize) -> AddressMode {
        match axis {
            0 => self.address_mode_u,
            1 => self.address_mode_v,
            2 => self.address_mode_w,
            _ => panic!("no address mode for axis {}", axis),
        }
    }
}

impl fmt::Display for SamplerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address {:?}/{:?}/{:?}, mag {:?}, min {:?}, mipmap {:?}, lod clamp [{}, {}]",
            self.address_mode_u,
            self.address_mode_v,
            self.address_mode_w,
            self.mag_filter,
            self.min_filter,
            self.mipmap_filter,
            self.lod_min_clamp,
            self.lod_max_clamp
        )?;
        if let Some(compare) = self.compare {
            write!(f, ", compare {}", compare.name())?;
        }
        Ok(())
    }
}
