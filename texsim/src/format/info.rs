use crate::texture::ComponentTag;
use ComponentTag::*;

/// How one component is stored in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentEncoding {
    Unorm(u32),
    Snorm(u32),
    Uint(u32),
    Sint(u32),
    Float16,
    Float32,
    /// Unsigned float with a 5-bit exponent and no sign bit.
    Ufloat { mantissa_bits: u32 },
    /// One component of rgb9e5. Shares its exponent with the other two.
    SharedExponent,
}

impl ComponentEncoding {
    pub fn bits(self) -> u32 {
        match self {
            ComponentEncoding::Unorm(bits)
            | ComponentEncoding::Snorm(bits)
            | ComponentEncoding::Uint(bits)
            | ComponentEncoding::Sint(bits) => bits,
            ComponentEncoding::Float16 => 16,
            ComponentEncoding::Float32 => 32,
            ComponentEncoding::Ufloat { mantissa_bits } => mantissa_bits + 5,
            ComponentEncoding::SharedExponent => 9,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ComponentEncoding::Uint(_) | ComponentEncoding::Sint(_))
    }
}

/// The WGSL texture type a format is read through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    Float,
    UnfilterableFloat,
    Depth,
    Sint,
    Uint,
}

impl SampleType {
    pub fn wgsl_scalar(self) -> &'static str {
        match self {
            SampleType::Float | SampleType::UnfilterableFloat | SampleType::Depth => "f32",
            SampleType::Sint => "i32",
            SampleType::Uint => "u32",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToleranceFamily {
    Unorm8,
    Snorm8,
    Float,
    Ufloat11_10,
    Integer,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAspect {
    #[default]
    All,
    DepthOnly,
    StencilOnly,
}

/// Byte layout of one texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TexelLayout {
    /// Whole-byte components, one after another in storage order.
    Planar,
    /// Bit fields of one little-endian u32, as (component, shift).
    Packed32(&'static [(ComponentTag, u32)]),
    SharedExponent,
    Depth32FloatStencil8,
    Compressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Uint,
    R16Sint,
    R16Float,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    R32Uint,
    R32Sint,
    R32Float,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb9e5Ufloat,
    Rgb10a2Uint,
    Rgb10a2Unorm,
    Rg11b10Ufloat,
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    Stencil8,
    Depth16Unorm,
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
    Depth32FloatStencil8,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2RgbaUnorm,
    Bc2RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    Bc4RUnorm,
    Bc4RSnorm,
    Bc5RgUnorm,
    Bc5RgSnorm,
    Bc6hRgbUfloat,
    Bc6hRgbFloat,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
    Etc2Rgb8Unorm,
    Etc2Rgb8UnormSrgb,
    Etc2Rgba8Unorm,
    Etc2Rgba8UnormSrgb,
    EacR11Unorm,
    EacR11Snorm,
    EacRg11Unorm,
    EacRg11Snorm,
    Astc4x4Unorm,
    Astc4x4UnormSrgb,
    Astc5x5Unorm,
    Astc5x5UnormSrgb,
    Astc8x8Unorm,
    Astc8x8UnormSrgb,
}

use TextureFormat::*;

const C_R: &[ComponentTag] = &[R];
const C_RG: &[ComponentTag] = &[R, G];
const C_RGB: &[ComponentTag] = &[R, G, B];
const C_RGBA: &[ComponentTag] = &[R, G, B, A];
const C_BGRA: &[ComponentTag] = &[B, G, R, A];
const C_DEPTH: &[ComponentTag] = &[Depth];
const C_STENCIL: &[ComponentTag] = &[Stencil];
const C_DEPTH_STENCIL: &[ComponentTag] = &[Depth, Stencil];

impl TextureFormat {
    pub const ALL: &'static [TextureFormat] = &[
        R8Unorm,
        R8Snorm,
        R8Uint,
        R8Sint,
        R16Uint,
        R16Sint,
        R16Float,
        Rg8Unorm,
        Rg8Snorm,
        Rg8Uint,
        Rg8Sint,
        R32Uint,
        R32Sint,
        R32Float,
        Rg16Uint,
        Rg16Sint,
        Rg16Float,
        Rgba8Unorm,
        Rgba8UnormSrgb,
        Rgba8Snorm,
        Rgba8Uint,
        Rgba8Sint,
        Bgra8Unorm,
        Bgra8UnormSrgb,
        Rgb9e5Ufloat,
        Rgb10a2Uint,
        Rgb10a2Unorm,
        Rg11b10Ufloat,
        Rg32Uint,
        Rg32Sint,
        Rg32Float,
        Rgba16Uint,
        Rgba16Sint,
        Rgba16Float,
        Rgba32Uint,
        Rgba32Sint,
        Rgba32Float,
        Stencil8,
        Depth16Unorm,
        Depth24Plus,
        Depth24PlusStencil8,
        Depth32Float,
        Depth32FloatStencil8,
        Bc1RgbaUnorm,
        Bc1RgbaUnormSrgb,
        Bc2RgbaUnorm,
        Bc2RgbaUnormSrgb,
        Bc3RgbaUnorm,
        Bc3RgbaUnormSrgb,
        Bc4RUnorm,
        Bc4RSnorm,
        Bc5RgUnorm,
        Bc5RgSnorm,
        Bc6hRgbUfloat,
        Bc6hRgbFloat,
        Bc7RgbaUnorm,
        Bc7RgbaUnormSrgb,
        Etc2Rgb8Unorm,
        Etc2Rgb8UnormSrgb,
        Etc2Rgba8Unorm,
        Etc2Rgba8UnormSrgb,
        EacR11Unorm,
        EacR11Snorm,
        EacRg11Unorm,
        EacRg11Snorm,
        Astc4x4Unorm,
        Astc4x4UnormSrgb,
        Astc5x5Unorm,
        Astc5x5UnormSrgb,
        Astc8x8Unorm,
        Astc8x8UnormSrgb,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            R8Unorm => "r8unorm",
            R8Snorm => "r8snorm",
            R8Uint => "r8uint",
            R8Sint => "r8sint",
            R16Uint => "r16uint",
            R16Sint => "r16sint",
            R16Float => "r16float",
            Rg8Unorm => "rg8unorm",
            Rg8Snorm => "rg8snorm",
            Rg8Uint => "rg8uint",
            Rg8Sint => "rg8sint",
            R32Uint => "r32uint",
            R32Sint => "r32sint",
            R32Float => "r32float",
            Rg16Uint => "rg16uint",
            Rg16Sint => "rg16sint",
            Rg16Float => "rg16float",
            Rgba8Unorm => "rgba8unorm",
            Rgba8UnormSrgb => "rgba8unorm-srgb",
            Rgba8Snorm => "rgba8snorm",
            Rgba8Uint => "rgba8uint",
            Rgba8Sint => "rgba8sint",
            Bgra8Unorm => "bgra8unorm",
            Bgra8UnormSrgb => "bgra8unorm-srgb",
            Rgb9e5Ufloat => "rgb9e5ufloat",
            Rgb10a2Uint => "rgb10a2uint",
            Rgb10a2Unorm => "rgb10a2unorm",
            Rg11b10Ufloat => "rg11b10ufloat",
            Rg32Uint => "rg32uint",
            Rg32Sint => "rg32sint",
            Rg32Float => "rg32float",
            Rgba16Uint => "rgba16uint",
            Rgba16Sint => "rgba16sint",
            Rgba16Float => "rgba16float",
            Rgba32Uint => "rgba32uint",
            Rgba32Sint => "rgba32sint",
            Rgba32Float => "rgba32float",
            Stencil8 => "stencil8",
            Depth16Unorm => "depth16unorm",
            Depth24Plus => "depth24plus",
            Depth24PlusStencil8 => "depth24plus-stencil8",
            Depth32Float => "depth32float",
            Depth32FloatStencil8 => "depth32float-stencil8",
            Bc1RgbaUnorm => "bc1-rgba-unorm",
            Bc1RgbaUnormSrgb => "bc1-rgba-unorm-srgb",
            Bc2RgbaUnorm => "bc2-rgba-unorm",
            Bc2RgbaUnormSrgb => "bc2-rgba-unorm-srgb",
            Bc3RgbaUnorm => "bc3-rgba-unorm",
            Bc3RgbaUnormSrgb => "bc3-rgba-unorm-srgb",
            Bc4RUnorm => "bc4-r-unorm",
            Bc4RSnorm => "bc4-r-snorm",
            Bc5RgUnorm => "bc5-rg-unorm",
            Bc5RgSnorm => "bc5-rg-snorm",
            Bc6hRgbUfloat => "bc6h-rgb-ufloat",
            Bc6hRgbFloat => "bc6h-rgb-float",
            Bc7RgbaUnorm => "bc7-rgba-unorm",
            Bc7RgbaUnormSrgb => "bc7-rgba-unorm-srgb",
            Etc2Rgb8Unorm => "etc2-rgb8unorm",
            Etc2Rgb8UnormSrgb => "etc2-rgb8unorm-srgb",
            Etc2Rgba8Unorm => "etc2-rgba8unorm",
            Etc2Rgba8UnormSrgb => "etc2-rgba8unorm-srgb",
            EacR11Unorm => "eac-r11unorm",
            EacR11Snorm => "eac-r11snorm",
            EacRg11Unorm => "eac-rg11unorm",
            EacRg11Snorm => "eac-rg11snorm",
            Astc4x4Unorm => "astc-4x4-unorm",
            Astc4x4UnormSrgb => "astc-4x4-unorm-srgb",
            Astc5x5Unorm => "astc-5x5-unorm",
            Astc5x5UnormSrgb => "astc-5x5-unorm-srgb",
            Astc8x8Unorm => "astc-8x8-unorm",
            Astc8x8UnormSrgb => "astc-8x8-unorm-srgb",
        }
    }

    /// Components in canonical R, G, B, A (or depth, stencil) order.
    pub fn components(self) -> &'static [ComponentTag] {
        match self {
            R8Unorm | R8Snorm | R8Uint | R8Sint | R16Uint | R16Sint | R16Float | R32Uint | R32Sint | R32Float => C_R,
            Bc4RUnorm | Bc4RSnorm | EacR11Unorm | EacR11Snorm => C_R,
            Rg8Unorm | Rg8Snorm | Rg8Uint | Rg8Sint | Rg16Uint | Rg16Sint | Rg16Float | Rg32Uint | Rg32Sint
            | Rg32Float => C_RG,
            Bc5RgUnorm | Bc5RgSnorm | EacRg11Unorm | EacRg11Snorm => C_RG,
            Rgb9e5Ufloat | Rg11b10Ufloat | Bc6hRgbUfloat | Bc6hRgbFloat | Etc2Rgb8Unorm | Etc2Rgb8UnormSrgb => C_RGB,
            Stencil8 => C_STENCIL,
            Depth16Unorm | Depth24Plus | Depth32Float => C_DEPTH,
            Depth24PlusStencil8 | Depth32FloatStencil8 => C_DEPTH_STENCIL,
            _ => C_RGBA,
        }
    }

    /// Components in the order their bytes appear.
    pub fn storage_order(self) -> &'static [ComponentTag] {
        match self {
            Bgra8Unorm | Bgra8UnormSrgb => C_BGRA,
            _ => self.components(),
        }
    }

    pub fn encoding(self, tag: ComponentTag) -> ComponentEncoding {
        use ComponentEncoding as E;
        match self {
            R8Unorm | Rg8Unorm | Rgba8Unorm | Rgba8UnormSrgb | Bgra8Unorm | Bgra8UnormSrgb => E::Unorm(8),
            R8Snorm | Rg8Snorm | Rgba8Snorm => E::Snorm(8),
            R8Uint | Rg8Uint | Rgba8Uint | Stencil8 => E::Uint(8),
            R8Sint | Rg8Sint | Rgba8Sint => E::Sint(8),
            R16Uint | Rg16Uint | Rgba16Uint => E::Uint(16),
            R16Sint | Rg16Sint | Rgba16Sint => E::Sint(16),
            R16Float | Rg16Float | Rgba16Float => E::Float16,
            R32Uint | Rg32Uint | Rgba32Uint => E::Uint(32),
            R32Sint | Rg32Sint | Rgba32Sint => E::Sint(32),
            R32Float | Rg32Float | Rgba32Float | Depth32Float => E::Float32,
            Rgb10a2Unorm => {
                if tag == A {
                    E::Unorm(2)
                } else {
                    E::Unorm(10)
                }
            }
            Rgb10a2Uint => {
                if tag == A {
                    E::Uint(2)
                } else {
                    E::Uint(10)
                }
            }
            Rg11b10Ufloat => {
                if tag == B {
                    E::Ufloat { mantissa_bits: 5 }
                } else {
                    E::Ufloat { mantissa_bits: 6 }
                }
            }
            Rgb9e5Ufloat => E::SharedExponent,
            Depth16Unorm => E::Unorm(16),
            Depth24Plus => E::Unorm(24),
            Depth24PlusStencil8 => {
                if tag == Stencil {
                    E::Uint(8)
                } else {
                    E::Unorm(24)
                }
            }
            Depth32FloatStencil8 => {
                if tag == Stencil {
                    E::Uint(8)
                } else {
                    E::Float32
                }
            }
            Bc4RSnorm | Bc5RgSnorm | EacR11Snorm | EacRg11Snorm => E::Snorm(8),
            Bc6hRgbUfloat | Bc6hRgbFloat => E::Float16,
            // Remaining compressed formats decode to 8-bit unorm precision.
            _ => E::Unorm(8),
        }
    }

    pub(crate) fn layout(self) -> TexelLayout {
        match self {
            Rgb10a2Unorm | Rgb10a2Uint => TexelLayout::Packed32(&[(R, 0), (G, 10), (B, 20), (A, 30)]),
            Rg11b10Ufloat => TexelLayout::Packed32(&[(R, 0), (G, 11), (B, 22)]),
            Depth24Plus => TexelLayout::Packed32(&[(Depth, 0)]),
            Depth24PlusStencil8 => TexelLayout::Packed32(&[(Depth, 0), (Stencil, 24)]),
            Rgb9e5Ufloat => TexelLayout::SharedExponent,
            Depth32FloatStencil8 => TexelLayout::Depth32FloatStencil8,
            _ if self.is_compressed() => TexelLayout::Compressed,
            _ => TexelLayout::Planar,
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Bc1RgbaUnorm
                | Bc1RgbaUnormSrgb
                | Bc2RgbaUnorm
                | Bc2RgbaUnormSrgb
                | Bc3RgbaUnorm
                | Bc3RgbaUnormSrgb
                | Bc4RUnorm
                | Bc4RSnorm
                | Bc5RgUnorm
                | Bc5RgSnorm
                | Bc6hRgbUfloat
                | Bc6hRgbFloat
                | Bc7RgbaUnorm
                | Bc7RgbaUnormSrgb
                | Etc2Rgb8Unorm
                | Etc2Rgb8UnormSrgb
                | Etc2Rgba8Unorm
                | Etc2Rgba8UnormSrgb
                | EacR11Unorm
                | EacR11Snorm
                | EacRg11Unorm
                | EacRg11Snorm
        ) || self.is_astc()
    }

    pub fn is_astc(self) -> bool {
        matches!(
            self,
            Astc4x4Unorm | Astc4x4UnormSrgb | Astc5x5Unorm | Astc5x5UnormSrgb | Astc8x8Unorm | Astc8x8UnormSrgb
        )
    }

    /// Texels covered by one block, (1, 1) for uncompressed formats.
    pub fn block_dimensions(self) -> (u32, u32) {
        match self {
            Astc5x5Unorm | Astc5x5UnormSrgb => (5, 5),
            Astc8x8Unorm | Astc8x8UnormSrgb => (8, 8),
            _ if self.is_compressed() => (4, 4),
            _ => (1, 1),
        }
    }

    /// Bytes per texel, or per block for compressed formats.
    pub fn bytes_per_block(self) -> u32 {
        match self.layout() {
            TexelLayout::Planar => self.storage_order().iter().map(|&tag| self.encoding(tag).bits() / 8).sum(),
            TexelLayout::Packed32(_) | TexelLayout::SharedExponent => 4,
            TexelLayout::Depth32FloatStencil8 => 8,
            TexelLayout::Compressed => match self {
                Bc1RgbaUnorm | Bc1RgbaUnormSrgb | Bc4RUnorm | Bc4RSnorm | Etc2Rgb8Unorm | Etc2Rgb8UnormSrgb
                | EacR11Unorm | EacR11Snorm => 8,
                _ => 16,
            },
        }
    }

    pub fn is_srgb(self) -> bool {
        self.to_non_srgb() != self
    }

    /// The same storage without sRGB decoding.
    pub fn to_non_srgb(self) -> TextureFormat {
        match self {
            Rgba8UnormSrgb => Rgba8Unorm,
            Bgra8UnormSrgb => Bgra8Unorm,
            Bc1RgbaUnormSrgb => Bc1RgbaUnorm,
            Bc2RgbaUnormSrgb => Bc2RgbaUnorm,
            Bc3RgbaUnormSrgb => Bc3RgbaUnorm,
            Bc7RgbaUnormSrgb => Bc7RgbaUnorm,
            Etc2Rgb8UnormSrgb => Etc2Rgb8Unorm,
            Etc2Rgba8UnormSrgb => Etc2Rgba8Unorm,
            Astc4x4UnormSrgb => Astc4x4Unorm,
            Astc5x5UnormSrgb => Astc5x5Unorm,
            Astc8x8UnormSrgb => Astc8x8Unorm,
            other => other,
        }
    }

    pub fn has_depth(self) -> bool {
        self.components().contains(&Depth)
    }

    pub fn has_stencil(self) -> bool {
        self.components().contains(&Stencil)
    }

    pub fn is_depth_or_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    pub fn sample_type(self) -> SampleType {
        if self.has_depth() {
            return SampleType::Depth;
        }
        match self.encoding(self.components()[0]) {
            ComponentEncoding::Uint(_) => SampleType::Uint,
            ComponentEncoding::Sint(_) => SampleType::Sint,
            ComponentEncoding::Float32 => SampleType::UnfilterableFloat,
            _ => SampleType::Float,
        }
    }

    pub fn sample_type_for_aspect(self, aspect: TextureAspect) -> SampleType {
        match aspect {
            TextureAspect::StencilOnly => SampleType::Uint,
            TextureAspect::DepthOnly => SampleType::Depth,
            TextureAspect::All => self.sample_type(),
        }
    }

    /// The component a view with `aspect` exposes, for depth/stencil formats.
    pub fn aspect_component(self, aspect: TextureAspect) -> Option<ComponentTag> {
        match aspect {
            TextureAspect::StencilOnly => Some(Stencil),
            TextureAspect::DepthOnly => Some(Depth),
            TextureAspect::All if self.has_depth() => Some(Depth),
            TextureAspect::All if self.has_stencil() => Some(Stencil),
            TextureAspect::All => None,
        }
    }

    pub fn is_filterable(self) -> bool {
        self.sample_type() == SampleType::Float
    }

    pub fn tolerance_family(self) -> ToleranceFamily {
        if self.has_depth() {
            return ToleranceFamily::Depth;
        }
        match self.encoding(self.components()[0]) {
            ComponentEncoding::Unorm(_) => ToleranceFamily::Unorm8,
            ComponentEncoding::Snorm(_) => ToleranceFamily::Snorm8,
            ComponentEncoding::Uint(_) | ComponentEncoding::Sint(_) => ToleranceFamily::Integer,
            ComponentEncoding::Ufloat { .. } => ToleranceFamily::Ufloat11_10,
            ComponentEncoding::Float16 | ComponentEncoding::Float32 | ComponentEncoding::SharedExponent => {
                ToleranceFamily::Float
            }
        }
    }
}

impl std::fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
