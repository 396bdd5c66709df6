//! Bit-level encode/decode of texels.
//!
//! Everything funnels through [`PerTexelComponents`]: `decode_texel(encode_texel(x))` is what a
//! GPU would hold after storing `x`, which is why generated data is quantized before use.

use super::info::{ComponentEncoding, TexelLayout, TextureFormat};
use crate::math::floor_log2;
use crate::texture::{ComponentTag, PerTexelComponents};
use half::f16;

const UFLOAT_EXPONENT_BIAS: i32 = 15;
const UFLOAT_MAX_EXPONENT: i32 = 30;

const RGB9E5_MANTISSA_BITS: i32 = 9;
const RGB9E5_EXPONENT_BIAS: i32 = 15;
const RGB9E5_MAX_VALUE: f64 = 511.0 / 512.0 * 65536.0;

pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

pub fn linear_to_srgb(l: f64) -> f64 {
    if l <= 0.0031308 { l * 12.92 } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 }
}

fn mask(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
}

fn sign_extend(bits: u32, width: u32) -> i64 {
    let shift = 64 - width;
    (((bits as u64) << shift) as i64) >> shift
}

/// Stores `value` into the low bits of the result.
pub fn encode_component(encoding: ComponentEncoding, value: f64) -> u32 {
    match encoding {
        ComponentEncoding::Unorm(bits) => {
            let max = mask(bits) as f64;
            if value.is_nan() { 0 } else { (value.clamp(0.0, 1.0) * max).round() as u32 }
        }
        ComponentEncoding::Snorm(bits) => {
            let max = ((1u64 << (bits - 1)) - 1) as f64;
            let n = if value.is_nan() { 0 } else { (value.clamp(-1.0, 1.0) * max).round() as i64 };
            (n as u32) & mask(bits)
        }
        ComponentEncoding::Uint(bits) => {
            if value.is_nan() { 0 } else { value.round().clamp(0.0, mask(bits) as f64) as u32 }
        }
        ComponentEncoding::Sint(bits) => {
            let max = ((1u64 << (bits - 1)) - 1) as f64;
            let n = if value.is_nan() { 0 } else { value.round().clamp(-max - 1.0, max) as i64 };
            (n as u32) & mask(bits)
        }
        ComponentEncoding::Float16 => f16::from_f64(value).to_bits() as u32,
        ComponentEncoding::Float32 => (value as f32).to_bits(),
        ComponentEncoding::Ufloat { mantissa_bits } => encode_ufloat(value, mantissa_bits),
        // Stand-alone view of a shared-exponent component: a 9-bit mantissa without implicit
        // one behaves like an 8-bit one with it.
        ComponentEncoding::SharedExponent => encode_ufloat(value, 8),
    }
}

pub fn decode_component(encoding: ComponentEncoding, bits: u32) -> f64 {
    match encoding {
        ComponentEncoding::Unorm(width) => (bits & mask(width)) as f64 / mask(width) as f64,
        ComponentEncoding::Snorm(width) => {
            let max = ((1u64 << (width - 1)) - 1) as f64;
            (sign_extend(bits & mask(width), width) as f64 / max).max(-1.0)
        }
        ComponentEncoding::Uint(width) => (bits & mask(width)) as f64,
        ComponentEncoding::Sint(width) => sign_extend(bits & mask(width), width) as f64,
        ComponentEncoding::Float16 => f16::from_bits(bits as u16).to_f64(),
        ComponentEncoding::Float32 => f32::from_bits(bits) as f64,
        ComponentEncoding::Ufloat { mantissa_bits } => decode_ufloat(bits, mantissa_bits),
        ComponentEncoding::SharedExponent => decode_ufloat(bits, 8),
    }
}

pub fn quantize_component(encoding: ComponentEncoding, value: f64) -> f64 {
    decode_component(encoding, encode_component(encoding, value))
}

/// Unsigned float with a 5-bit exponent, rounding to nearest. Negative and NaN inputs become
/// zero, overflow saturates to the largest finite value.
fn encode_ufloat(value: f64, mantissa_bits: u32) -> u32 {
    let m = mantissa_bits as i32;
    let implicit = 1u32 << m;
    if !(value > 0.0) {
        return 0;
    }
    let max_bits = ((UFLOAT_MAX_EXPONENT as u32) << m) | (implicit - 1);
    if value >= decode_ufloat(max_bits, mantissa_bits) {
        return max_bits;
    }
    let e = floor_log2(value).max(1 - UFLOAT_EXPONENT_BIAS);
    let mut mantissa = (value / 2f64.powi(e) * implicit as f64).round() as u32;
    let mut exponent = if mantissa >= implicit { e + UFLOAT_EXPONENT_BIAS } else { 0 };
    if mantissa >= implicit << 1 {
        mantissa >>= 1;
        exponent += 1;
    }
    if exponent > UFLOAT_MAX_EXPONENT {
        return max_bits;
    }
    ((exponent as u32) << m) | (mantissa & (implicit - 1))
}

fn decode_ufloat(bits: u32, mantissa_bits: u32) -> f64 {
    let m = mantissa_bits as i32;
    let mantissa = (bits & ((1u32 << m) - 1)) as f64;
    let exponent = ((bits >> m) & 0x1f) as i32;
    match exponent {
        0 => mantissa * 2f64.powi(1 - UFLOAT_EXPONENT_BIAS - m),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (1.0 + mantissa / (1u32 << m) as f64) * 2f64.powi(exponent - UFLOAT_EXPONENT_BIAS),
    }
}

fn encode_rgb9e5(r: f64, g: f64, b: f64) -> u32 {
    let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, RGB9E5_MAX_VALUE) };
    let (r, g, b) = (clamp(r), clamp(g), clamp(b));
    let max_component = r.max(g).max(b);
    let mut exponent = if max_component > 0.0 {
        floor_log2(max_component).max(-RGB9E5_EXPONENT_BIAS - 1) + 1 + RGB9E5_EXPONENT_BIAS
    } else {
        0
    };
    let mut scale = 2f64.powi(exponent - RGB9E5_EXPONENT_BIAS - RGB9E5_MANTISSA_BITS);
    if (max_component / scale + 0.5).floor() as u32 == 1 << RGB9E5_MANTISSA_BITS {
        exponent += 1;
        scale *= 2.0;
    }
    let quantize = |v: f64| ((v / scale + 0.5).floor() as u32).min(511);
    quantize(r) | (quantize(g) << 9) | (quantize(b) << 18) | ((exponent as u32) << 27)
}

fn decode_rgb9e5(bits: u32) -> [f64; 3] {
    let exponent = (bits >> 27) as i32;
    let scale = 2f64.powi(exponent - RGB9E5_EXPONENT_BIAS - RGB9E5_MANTISSA_BITS);
    [(bits & 0x1ff) as f64 * scale, ((bits >> 9) & 0x1ff) as f64 * scale, ((bits >> 18) & 0x1ff) as f64 * scale]
}

fn is_srgb_component(format: TextureFormat, tag: ComponentTag) -> bool {
    format.is_srgb() && matches!(tag, ComponentTag::R | ComponentTag::G | ComponentTag::B)
}

/// Bits a component of `format` holds for `value`, including the sRGB transfer.
pub fn encode_format_component(format: TextureFormat, tag: ComponentTag, value: f64) -> u32 {
    let stored = if is_srgb_component(format, tag) { linear_to_srgb(value.clamp(0.0, 1.0)) } else { value };
    encode_component(format.encoding(tag), stored)
}

pub fn decode_format_component(format: TextureFormat, tag: ComponentTag, bits: u32) -> f64 {
    let value = decode_component(format.encoding(tag), bits);
    if is_srgb_component(format, tag) { srgb_to_linear(value) } else { value }
}

/// Writes one texel. Components the texel lacks are stored as zero.
pub fn encode_texel(format: TextureFormat, texel: &PerTexelComponents, out: &mut [u8]) {
    assert!(!format.is_compressed(), "{} texels cannot be encoded in software", format);
    assert_eq!(out.len(), format.bytes_per_block() as usize, "wrong texel size for {}", format);
    let value = |tag: ComponentTag| texel.get(tag).unwrap_or(0.0);
    match format.layout() {
        TexelLayout::Planar => {
            let mut offset = 0;
            for &tag in format.storage_order() {
                let size = (format.encoding(tag).bits() / 8) as usize;
                let bits = encode_format_component(format, tag, value(tag));
                out[offset..offset + size].copy_from_slice(&bits.to_le_bytes()[..size]);
                offset += size;
            }
        }
        TexelLayout::Packed32(fields) => {
            let mut word = 0u32;
            for &(tag, shift) in fields {
                word |= encode_format_component(format, tag, value(tag)) << shift;
            }
            out.copy_from_slice(&word.to_le_bytes());
        }
        TexelLayout::SharedExponent => {
            let word = encode_rgb9e5(value(ComponentTag::R), value(ComponentTag::G), value(ComponentTag::B));
            out.copy_from_slice(&word.to_le_bytes());
        }
        TexelLayout::Depth32FloatStencil8 => {
            let depth = encode_format_component(format, ComponentTag::Depth, value(ComponentTag::Depth));
            out[..4].copy_from_slice(&depth.to_le_bytes());
            out[4] = encode_format_component(format, ComponentTag::Stencil, value(ComponentTag::Stencil)) as u8;
            out[5..].fill(0);
        }
        TexelLayout::Compressed => unreachable!(),
    }
}

pub fn decode_texel(format: TextureFormat, bytes: &[u8]) -> PerTexelComponents {
    assert!(!format.is_compressed(), "{} texels cannot be decoded in software", format);
    assert_eq!(bytes.len(), format.bytes_per_block() as usize, "wrong texel size for {}", format);
    let mut texel = PerTexelComponents::new();
    let word = |offset: usize| u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
    match format.layout() {
        TexelLayout::Planar => {
            let mut offset = 0;
            for &tag in format.storage_order() {
                let size = (format.encoding(tag).bits() / 8) as usize;
                let mut raw = [0u8; 4];
                raw[..size].copy_from_slice(&bytes[offset..offset + size]);
                texel.set(tag, decode_format_component(format, tag, u32::from_le_bytes(raw)));
                offset += size;
            }
        }
        TexelLayout::Packed32(fields) => {
            let word = word(0);
            for &(tag, shift) in fields {
                texel.set(tag, decode_format_component(format, tag, word >> shift));
            }
        }
        TexelLayout::SharedExponent => {
            let [r, g, b] = decode_rgb9e5(word(0));
            texel = PerTexelComponents::new().with(ComponentTag::R, r).with(ComponentTag::G, g).with(ComponentTag::B, b);
        }
        TexelLayout::Depth32FloatStencil8 => {
            texel.set(ComponentTag::Depth, decode_format_component(format, ComponentTag::Depth, word(0)));
            texel.set(ComponentTag::Stencil, bytes[4] as f64);
        }
        TexelLayout::Compressed => unreachable!(),
    }
    texel
}

/// The value `format` would actually store for `texel`.
pub fn quantize_texel(format: TextureFormat, texel: &PerTexelComponents) -> PerTexelComponents {
    if format.is_compressed() {
        // Decoded compressed data only gets read back from a device; keep its precision.
        return texel.map(|tag, v| quantize_component(format.encoding(tag), v));
    }
    let mut bytes = [0u8; 16];
    let size = format.bytes_per_block() as usize;
    encode_texel(format, texel, &mut bytes[..size]);
    decode_texel(format, &bytes[..size])
}

/// Signed distance from zero in units of the component's own least significant bit.
pub fn ulp_from_zero(format: TextureFormat, tag: ComponentTag, value: f64) -> i64 {
    let encoding = format.encoding(tag);
    let bits = encode_format_component(format, tag, value);
    match encoding {
        ComponentEncoding::Unorm(_) | ComponentEncoding::Uint(_) => bits as i64,
        ComponentEncoding::Snorm(width) | ComponentEncoding::Sint(width) => sign_extend(bits, width),
        ComponentEncoding::Float16 => {
            let magnitude = (bits & 0x7fff) as i64;
            if bits & 0x8000 != 0 { -magnitude } else { magnitude }
        }
        ComponentEncoding::Float32 => {
            let magnitude = (bits & 0x7fff_ffff) as i64;
            if bits & 0x8000_0000 != 0 { -magnitude } else { magnitude }
        }
        ComponentEncoding::Ufloat { .. } | ComponentEncoding::SharedExponent => bits as i64,
    }
}
