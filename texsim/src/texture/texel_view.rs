use super::texel::{PerTexelComponents, TexelCoord};
use crate::format::{TextureFormat, decode_texel, encode_texel, quantize_texel};
use std::fmt;
use std::sync::Arc;

pub type TexelGenerator = Arc<dyn Fn(TexelCoord) -> PerTexelComponents + Send + Sync>;

#[derive(Clone)]
enum TexelSource {
    Bytes(Arc<[u8]>),
    Components(Arc<[PerTexelComponents]>),
    Generator(TexelGenerator),
}

/// All texels of one mip level as a pure function of their coordinate.
///
/// Texels are ordered x fastest, then y, then z, with the samples of a texel adjacent.
#[derive(Clone)]
pub struct TexelView {
    format: TextureFormat,
    size: [u32; 3],
    sample_count: u32,
    source: TexelSource,
}

impl TexelView {
    /// Wraps tightly packed texel bytes in `format`.
    pub fn from_bytes(format: TextureFormat, size: [u32; 3], sample_count: u32, bytes: Vec<u8>) -> Self {
        assert!(!format.is_compressed(), "{} bytes must be decoded by a device", format);
        let expected = texel_count(size, sample_count) * format.bytes_per_block() as usize;
        assert_eq!(bytes.len(), expected, "{} level of size {:?} needs {} bytes", format, size, expected);
        Self { format, size, sample_count, source: TexelSource::Bytes(bytes.into()) }
    }

    /// Texels are stored as `format` would hold them. Compressed formats keep the decoded values.
    pub fn from_components(
        format: TextureFormat,
        size: [u32; 3],
        sample_count: u32,
        texels: Vec<PerTexelComponents>,
    ) -> Self {
        assert_eq!(texels.len(), texel_count(size, sample_count));
        let texels: Vec<PerTexelComponents> = if format.is_compressed() {
            texels
        } else {
            texels.iter().map(|texel| quantize_texel(format, texel)).collect()
        };
        Self { format, size, sample_count, source: TexelSource::Components(texels.into()) }
    }

    /// Generated values are quantized to `format` on every read, like [`Self::from_components`].
    pub fn from_generator(
        format: TextureFormat,
        size: [u32; 3],
        sample_count: u32,
        generator: impl Fn(TexelCoord) -> PerTexelComponents + Send + Sync + 'static,
    ) -> Self {
        Self { format, size, sample_count, source: TexelSource::Generator(Arc::new(generator)) }
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn size(&self) -> [u32; 3] {
        self.size
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn texel_count(&self) -> usize {
        texel_count(self.size, self.sample_count)
    }

    pub fn contains(&self, coord: TexelCoord) -> bool {
        coord.x < self.size[0] && coord.y < self.size[1] && coord.z < self.size[2] && coord.sample < self.sample_count
    }

    fn index(&self, coord: TexelCoord) -> usize {
        assert!(self.contains(coord), "texel {} is outside a level of size {:?}", coord, self.size);
        let [w, h, _] = self.size.map(|v| v as usize);
        ((coord.z as usize * h + coord.y as usize) * w + coord.x as usize) * self.sample_count as usize
            + coord.sample as usize
    }

    /// Panics when `coord` lies outside the level.
    pub fn color(&self, coord: TexelCoord) -> PerTexelComponents {
        let index = self.index(coord);
        match &self.source {
            TexelSource::Bytes(bytes) => {
                let bpb = self.format.bytes_per_block() as usize;
                decode_texel(self.format, &bytes[index * bpb..(index + 1) * bpb])
            }
            TexelSource::Components(texels) => texels[index],
            TexelSource::Generator(generator) => {
                let texel = generator(coord);
                if self.format.is_compressed() { texel } else { quantize_texel(self.format, &texel) }
            }
        }
    }

    /// Every coordinate of the level in storage order.
    pub fn coords(&self) -> impl Iterator<Item = TexelCoord> + '_ {
        let [w, h, d] = self.size;
        let samples = self.sample_count;
        (0..d).flat_map(move |z| {
            (0..h).flat_map(move |y| {
                (0..w).flat_map(move |x| (0..samples).map(move |s| TexelCoord::new(x, y, z).with_sample(s)))
            })
        })
    }

    /// Encodes the level in its own format, ready for upload.
    pub fn to_bytes(&self) -> Vec<u8> {
        if let TexelSource::Bytes(bytes) = &self.source {
            return bytes.to_vec();
        }
        let bpb = self.format.bytes_per_block() as usize;
        let mut out = vec![0u8; self.texel_count() * bpb];
        for (coord, chunk) in self.coords().zip(out.chunks_exact_mut(bpb)) {
            encode_texel(self.format, &self.color(coord), chunk);
        }
        out
    }
}

impl fmt::Debug for TexelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            TexelSource::Bytes(_) => "bytes",
            TexelSource::Components(_) => "components",
            TexelSource::Generator(_) => "generator",
        };
        f.debug_struct("TexelView")
            .field("format", &self.format)
            .field("size", &self.size)
            .field("sample_count", &self.sample_count)
            .field("source", &source)
            .finish()
    }
}

fn texel_count(size: [u32; 3], sample_count: u32) -> usize {
    size.iter().map(|&v| v as usize).product::<usize>() * sample_count as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::ComponentTag;

    #[test]
    fn bytes_view_reads_texels() {
        let bytes: Vec<u8> = (0u8..16).collect();
        let view = TexelView::from_bytes(TextureFormat::R8Uint, [4, 2, 2], 1, bytes);
        assert_eq!(view.color(TexelCoord::new(0, 0, 0)).get(ComponentTag::R), Some(0.0));
        assert_eq!(view.color(TexelCoord::new(3, 1, 0)).get(ComponentTag::R), Some(7.0));
        assert_eq!(view.color(TexelCoord::new(1, 0, 1)).get(ComponentTag::R), Some(9.0));
    }

    #[test]
    fn multisampled_texels_are_adjacent() {
        let bytes: Vec<u8> = (0u8..8).collect();
        let view = TexelView::from_bytes(TextureFormat::R8Uint, [2, 1, 1], 4, bytes);
        assert_eq!(view.color(TexelCoord::new(1, 0, 0).with_sample(2)).get(ComponentTag::R), Some(6.0));
    }

    #[test]
    fn generator_round_trips_through_bytes() {
        let view = TexelView::from_generator(TextureFormat::Rgba8Uint, [3, 3, 1], 1, |c| {
            PerTexelComponents::rgba(c.x as f64, c.y as f64, 0.0, 255.0)
        });
        let bytes = TexelView::from_bytes(TextureFormat::Rgba8Uint, [3, 3, 1], 1, view.to_bytes());
        for coord in view.coords() {
            assert_eq!(view.color(coord), bytes.color(coord));
        }
        assert_eq!(view.coords().count(), 9);
    }

    #[test]
    fn generated_texels_match_uploaded_bytes() {
        let view = TexelView::from_generator(TextureFormat::Rgba8Unorm, [1, 1, 1], 1, |_| {
            PerTexelComponents::rgba(0.5, 0.3, 0.0, 1.0)
        });
        let uploaded = TexelView::from_bytes(TextureFormat::Rgba8Unorm, [1, 1, 1], 1, view.to_bytes());
        let coord = TexelCoord::new(0, 0, 0);
        assert_eq!(view.color(coord), uploaded.color(coord));
        assert_eq!(view.color(coord).get(ComponentTag::R), Some(128.0 / 255.0));
    }

    #[test]
    fn components_are_stored_in_format() {
        let texels = vec![PerTexelComponents::rgba(0.3, 2.0, -1.0, 1.0), PerTexelComponents::rgba(300.0, 7.4, 0.0, 1.0)];
        let view = TexelView::from_components(TextureFormat::Rg8Uint, [2, 1, 1], 1, texels);
        let texel = view.color(TexelCoord::new(1, 0, 0));
        assert_eq!(texel, PerTexelComponents::new().with(ComponentTag::R, 255.0).with(ComponentTag::G, 7.0));
        let texels = vec![PerTexelComponents::rgba(0.3, 0.0, 0.0, 1.0)];
        let unorm = TexelView::from_components(TextureFormat::R8Unorm, [1, 1, 1], 1, texels);
        let bytes = TexelView::from_bytes(TextureFormat::R8Unorm, [1, 1, 1], 1, unorm.to_bytes());
        assert_eq!(unorm.color(TexelCoord::new(0, 0, 0)), bytes.color(TexelCoord::new(0, 0, 0)));
    }

    #[test]
    #[should_panic]
    fn read_outside_level_panics() {
        let view = TexelView::from_bytes(TextureFormat::R8Unorm, [2, 2, 1], 1, vec![0; 4]);
        view.color(TexelCoord::new(2, 0, 0));
    }
}
