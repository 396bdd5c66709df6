use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentTag {
    R,
    G,
    B,
    A,
    Depth,
    Stencil,
}

impl ComponentTag {
    pub const ALL: [ComponentTag; 6] =
        [ComponentTag::R, ComponentTag::G, ComponentTag::B, ComponentTag::A, ComponentTag::Depth, ComponentTag::Stencil];
    pub const RGBA: [ComponentTag; 4] = [ComponentTag::R, ComponentTag::G, ComponentTag::B, ComponentTag::A];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            ComponentTag::R => "R",
            ComponentTag::G => "G",
            ComponentTag::B => "B",
            ComponentTag::A => "A",
            ComponentTag::Depth => "Depth",
            ComponentTag::Stencil => "Stencil",
        }
    }
}

/// Texel coordinate inside one mip level. `z` is the slice of a 3D level or the array layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TexelCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub sample: u32,
}

impl TexelCoord {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z, sample: 0 }
    }

    pub const fn with_sample(self, sample: u32) -> Self {
        Self { sample, ..self }
    }
}

impl fmt::Display for TexelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)?;
        if self.sample != 0 {
            write!(f, " sample {}", self.sample)?;
        }
        Ok(())
    }
}

/// Format-independent texel value: every component a format has, as a plain number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerTexelComponents {
    values: [Option<f64>; 6],
}

impl PerTexelComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self::new().with(ComponentTag::R, r).with(ComponentTag::G, g).with(ComponentTag::B, b).with(ComponentTag::A, a)
    }

    pub fn depth(depth: f64) -> Self {
        Self::new().with(ComponentTag::Depth, depth)
    }

    pub fn stencil(stencil: f64) -> Self {
        Self::new().with(ComponentTag::Stencil, stencil)
    }

    /// Same value for every tag in `tags`.
    pub fn splat(tags: &[ComponentTag], value: f64) -> Self {
        let mut texel = Self::new();
        for &tag in tags {
            texel.set(tag, value);
        }
        texel
    }

    pub fn get(&self, tag: ComponentTag) -> Option<f64> {
        self.values[tag.index()]
    }

    pub fn set(&mut self, tag: ComponentTag, value: f64) {
        self.values[tag.index()] = Some(value);
    }

    pub fn with(mut self, tag: ComponentTag, value: f64) -> Self {
        self.set(tag, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn tags(&self) -> impl Iterator<Item = ComponentTag> + '_ {
        ComponentTag::ALL.into_iter().filter(|tag| self.get(*tag).is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentTag, f64)> + '_ {
        ComponentTag::ALL.into_iter().filter_map(|tag| self.get(tag).map(|v| (tag, v)))
    }

    pub fn map(&self, f: impl Fn(ComponentTag, f64) -> f64) -> Self {
        let mut out = Self::new();
        for (tag, value) in self.iter() {
            out.set(tag, f(tag, value));
        }
        out
    }

    /// `self + other * weight`, over the union of both component sets.
    pub fn add_weighted(&self, other: &PerTexelComponents, weight: f64) -> Self {
        let mut out = *self;
        for (tag, value) in other.iter() {
            out.set(tag, self.get(tag).unwrap_or(0.0) + value * weight);
        }
        out
    }
}

impl fmt::Display for PerTexelComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (tag, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", tag.name(), value)?;
            first = false;
        }
        Ok(())
    }
}
