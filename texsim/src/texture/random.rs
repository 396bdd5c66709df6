//! Random texel data for test textures.

use super::software_texture::TextureDescriptor;
use super::texel::{ComponentTag, PerTexelComponents};
use super::texel_view::TexelView;
use crate::format::{ComponentEncoding, TextureFormat, encode_texel};
use crate::util::{HashSequence, hash_u32};
use rayon::prelude::*;

/// ASTC void-extent block header: LDR, no extent coordinates.
const ASTC_VOID_EXTENT_HEADER: u64 = 0xFFFF_FFFF_FFFF_FDFC;

/// Range random values of a component are drawn from.
pub fn random_component_range(format: TextureFormat, tag: ComponentTag) -> (f64, f64) {
    if tag == ComponentTag::Depth {
        return (0.0, 1.0);
    }
    match format.encoding(tag) {
        ComponentEncoding::Unorm(_) => (0.0, 1.0),
        ComponentEncoding::Snorm(_) => (-1.0, 1.0),
        ComponentEncoding::Uint(bits) => (0.0, ((1u64 << bits) - 1) as f64),
        ComponentEncoding::Sint(bits) => (-((1u64 << (bits - 1)) as f64), ((1u64 << (bits - 1)) - 1) as f64),
        ComponentEncoding::Float16 | ComponentEncoding::Float32 => (-1000.0, 1000.0),
        ComponentEncoding::Ufloat { .. } | ComponentEncoding::SharedExponent => (0.0, 1000.0),
    }
}

/// One random texel, not yet quantized.
pub fn random_texel(format: TextureFormat, seq: &mut HashSequence) -> PerTexelComponents {
    let mut texel = PerTexelComponents::new();
    for &tag in format.components() {
        let (lo, hi) = random_component_range(format, tag);
        let value = if format.encoding(tag).is_integer() {
            seq.range_f64(lo, hi + 1.0).floor().min(hi)
        } else {
            seq.range_f64(lo, hi)
        };
        texel.set(tag, value);
    }
    texel
}

/// A single-colour ASTC block of any footprint.
pub fn astc_void_extent_block(rgba: [u16; 4]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[..8].copy_from_slice(&ASTC_VOID_EXTENT_HEADER.to_le_bytes());
    for (i, c) in rgba.iter().enumerate() {
        block[8 + i * 2..10 + i * 2].copy_from_slice(&c.to_le_bytes());
    }
    block
}

/// Bytes of one level, laid out as the device expects them for upload.
pub fn random_level_bytes(descriptor: &TextureDescriptor, level: u32, seed: u32) -> Vec<u8> {
    let format = descriptor.format;
    let bpb = format.bytes_per_block() as usize;
    let mut bytes = vec![0u8; descriptor.level_byte_size(level)];
    let level_seed = hash_u32(seed, level as u64);
    bytes.par_chunks_mut(bpb).enumerate().for_each(|(index, block)| {
        let mut seq = HashSequence::new(hash_u32(level_seed, index as u64));
        if format.is_astc() {
            let rgba = [0; 4].map(|_| (seq.next_u32() & 0xffff) as u16);
            block.copy_from_slice(&astc_void_extent_block(rgba));
        } else if format.is_compressed() {
            for chunk in block.chunks_mut(4) {
                let word = seq.next_u32().to_le_bytes();
                chunk.copy_from_slice(&word[..chunk.len()]);
            }
        } else {
            encode_texel(format, &random_texel(format, &mut seq), block);
        }
    });
    bytes
}

/// Random bytes for every level of `descriptor`.
pub fn random_texture_data(descriptor: &TextureDescriptor, seed: u32) -> Vec<Vec<u8>> {
    log::debug!(
        "generating random {} data for {:?} with {} levels",
        descriptor.format,
        descriptor.size,
        descriptor.mip_level_count
    );
    (0..descriptor.mip_level_count).map(|level| random_level_bytes(descriptor, level, seed)).collect()
}

/// Texel views over uploaded bytes of an uncompressed texture.
pub fn texel_views_from_bytes(descriptor: &TextureDescriptor, levels: &[Vec<u8>]) -> Vec<TexelView> {
    assert!(!descriptor.format.is_compressed(), "compressed texels come from a device readback");
    levels
        .iter()
        .enumerate()
        .map(|(level, bytes)| {
            TexelView::from_bytes(
                descriptor.format,
                descriptor.mip_level_size(level as u32),
                descriptor.sample_count,
                bytes.clone(),
            )
        })
        .collect()
}
