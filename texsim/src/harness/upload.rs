use super::device::GpuDevice;
use crate::error::DeviceError;
use crate::format::{TextureFormat, srgb_to_linear};
use crate::texture::{
    ComponentTag, PerTexelComponents, SoftwareTexture, TexelView, TextureDescriptor, ViewDescriptor,
    random_texture_data, texel_views_from_bytes,
};

/// Creates a texture filled with random data and the software copy the oracle samples.
///
/// Uncompressed levels are decoded from the uploaded bytes. Compressed levels are decoded by the
/// device, read back through the non-sRGB variant of the format and linearized here.
pub async fn create_texture_with_random_data_and_get_texels<D: GpuDevice>(
    device: &D,
    descriptor: TextureDescriptor,
    view: ViewDescriptor,
    seed: u32,
) -> Result<(D::Texture, SoftwareTexture), DeviceError> {
    let data = random_texture_data(&descriptor, seed);
    let texture = device.create_texture(&descriptor, &data).await?;
    let levels = if descriptor.format.is_compressed() {
        let mut levels = Vec::with_capacity(data.len());
        for level in 0..descriptor.mip_level_count {
            levels.push(read_compressed_level(device, &texture, &descriptor, level).await?);
        }
        levels
    } else {
        texel_views_from_bytes(&descriptor, &data)
    };
    Ok((texture, SoftwareTexture::new(descriptor, view, levels)))
}

async fn read_compressed_level<D: GpuDevice>(
    device: &D,
    texture: &D::Texture,
    descriptor: &TextureDescriptor,
    level: u32,
) -> Result<TexelView, DeviceError> {
    let format = descriptor.format;
    let size = descriptor.mip_level_size(level);
    let rgba = device.read_texture_level(texture, level, format.to_non_srgb()).await?;
    let expected = (size[0] * size[1] * size[2] * descriptor.sample_count) as usize;
    if rgba.len() != expected {
        return Err(DeviceError::ReadbackFailed(format!(
            "level {} of {} has {} texels, read back {}",
            level,
            format,
            expected,
            rgba.len()
        )));
    }
    let texels = rgba.iter().map(|&texel| decoded_texel(format, texel)).collect();
    Ok(TexelView::from_components(format, size, descriptor.sample_count, texels))
}

fn decoded_texel(format: TextureFormat, rgba: [f32; 4]) -> PerTexelComponents {
    let mut texel = PerTexelComponents::new();
    for &tag in format.components() {
        let value = rgba[tag.index()] as f64;
        let linear = format.is_srgb() && tag != ComponentTag::A;
        texel.set(tag, if linear { srgb_to_linear(value) } else { value });
    }
    texel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_readback_is_linearized() {
        let texel = decoded_texel(TextureFormat::Bc1RgbaUnormSrgb, [1.0, 0.5, 0.0, 0.5]);
        assert_eq!(texel.get(ComponentTag::R), Some(1.0));
        assert!((texel.get(ComponentTag::G).unwrap() - 0.2140).abs() < 1e-4);
        assert_eq!(texel.get(ComponentTag::A), Some(0.5));

        let texel = decoded_texel(TextureFormat::Bc4RUnorm, [0.25, 0.0, 0.0, 1.0]);
        assert_eq!(texel.get(ComponentTag::R), Some(0.25));
        assert_eq!(texel.get(ComponentTag::G), None);
    }
}
