use super::texel::{PerTexelComponents, TexelCoord};
use super::texel_view::TexelView;
use crate::format::{TextureAspect, TextureFormat, quantize_texel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewDimension {
    D1,
    #[default]
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

impl ViewDimension {
    pub fn is_arrayed(self) -> bool {
        matches!(self, ViewDimension::D2Array | ViewDimension::CubeArray)
    }

    pub fn is_cube(self) -> bool {
        matches!(self, ViewDimension::Cube | ViewDimension::CubeArray)
    }

    /// Components of the coordinate argument: cube maps take a 3D direction.
    pub fn coord_components(self) -> usize {
        match self {
            ViewDimension::D1 => 1,
            ViewDimension::D2 | ViewDimension::D2Array => 2,
            ViewDimension::Cube | ViewDimension::CubeArray | ViewDimension::D3 => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ViewDimension::D1 => "1d",
            ViewDimension::D2 => "2d",
            ViewDimension::D2Array => "2d-array",
            ViewDimension::Cube => "cube",
            ViewDimension::CubeArray => "cube-array",
            ViewDimension::D3 => "3d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub format: TextureFormat,
    pub dimension: TextureDimension,
    /// Width, height and depth of 3D textures or layer count of 2D textures.
    pub size: [u32; 3],
    pub mip_level_count: u32,
    pub sample_count: u32,
}

impl TextureDescriptor {
    pub fn new(format: TextureFormat, dimension: TextureDimension, size: [u32; 3]) -> Self {
        assert!(size.iter().all(|&v| v > 0), "empty texture {:?}", size);
        if dimension == TextureDimension::D1 {
            assert_eq!((size[1], size[2]), (1, 1), "1d textures have height and depth 1");
        }
        Self { format, dimension, size, mip_level_count: 1, sample_count: 1 }
    }

    pub fn with_mip_level_count(mut self, count: u32) -> Self {
        assert!(count >= 1 && count <= self.max_mip_level_count(), "{} levels for {:?}", count, self.size);
        self.mip_level_count = count;
        self
    }

    pub fn with_sample_count(mut self, count: u32) -> Self {
        assert!(count == 1 || count == 4, "sample count must be 1 or 4");
        self.sample_count = count;
        self
    }

    pub fn max_mip_level_count(&self) -> u32 {
        let extent = match self.dimension {
            TextureDimension::D1 => self.size[0],
            TextureDimension::D2 => self.size[0].max(self.size[1]),
            TextureDimension::D3 => self.size[0].max(self.size[1]).max(self.size[2]),
        };
        32 - extent.leading_zeros()
    }

    pub fn array_layer_count(&self) -> u32 {
        match self.dimension {
            TextureDimension::D2 => self.size[2],
            _ => 1,
        }
    }

    /// Texel size of a level. Layers do not shrink.
    pub fn mip_level_size(&self, level: u32) -> [u32; 3] {
        assert!(level < self.mip_level_count, "level {} of {}", level, self.mip_level_count);
        let shrink = |v: u32| (v >> level).max(1);
        match self.dimension {
            TextureDimension::D1 => [shrink(self.size[0]), 1, 1],
            TextureDimension::D2 => [shrink(self.size[0]), shrink(self.size[1]), self.size[2]],
            TextureDimension::D3 => self.size.map(shrink),
        }
    }

    /// Bytes needed to upload a level, whole blocks for compressed formats.
    pub fn level_byte_size(&self, level: u32) -> usize {
        let [w, h, d] = self.mip_level_size(level);
        let (bw, bh) = self.format.block_dimensions();
        w.div_ceil(bw) as usize
            * h.div_ceil(bh) as usize
            * d as usize
            * self.sample_count as usize
            * self.format.bytes_per_block() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewDescriptor {
    pub dimension: ViewDimension,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    pub aspect: TextureAspect,
}

impl ViewDescriptor {
    /// A view of every level and layer with the texture's natural dimension.
    pub fn whole(texture: &TextureDescriptor) -> Self {
        let dimension = match texture.dimension {
            TextureDimension::D1 => ViewDimension::D1,
            TextureDimension::D2 if texture.array_layer_count() > 1 => ViewDimension::D2Array,
            TextureDimension::D2 => ViewDimension::D2,
            TextureDimension::D3 => ViewDimension::D3,
        };
        Self {
            dimension,
            base_mip_level: 0,
            mip_level_count: texture.mip_level_count,
            base_array_layer: 0,
            array_layer_count: texture.array_layer_count(),
            aspect: TextureAspect::All,
        }
    }

    pub fn with_dimension(mut self, dimension: ViewDimension) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_mip_levels(mut self, base: u32, count: u32) -> Self {
        self.base_mip_level = base;
        self.mip_level_count = count;
        self
    }

    pub fn with_array_layers(mut self, base: u32, count: u32) -> Self {
        self.base_array_layer = base;
        self.array_layer_count = count;
        self
    }

    pub fn with_aspect(mut self, aspect: TextureAspect) -> Self {
        self.aspect = aspect;
        self
    }
}

/// CPU copy of a texture and the view calls are made through.
#[derive(Debug, Clone)]
pub struct SoftwareTexture {
    descriptor: TextureDescriptor,
    view: ViewDescriptor,
    levels: Vec<TexelView>,
}

impl SoftwareTexture {
    /// `levels` holds every physical mip level of the texture.
    pub fn new(descriptor: TextureDescriptor, view: ViewDescriptor, levels: Vec<TexelView>) -> Self {
        assert_eq!(levels.len(), descriptor.mip_level_count as usize, "one texel view per mip level");
        for (level, texels) in levels.iter().enumerate() {
            assert_eq!(texels.size(), descriptor.mip_level_size(level as u32), "size of level {}", level);
            assert_eq!(texels.sample_count(), descriptor.sample_count);
        }
        assert!(view.mip_level_count >= 1);
        assert!(view.base_mip_level + view.mip_level_count <= descriptor.mip_level_count, "view levels out of range");
        assert!(view.array_layer_count >= 1);
        assert!(
            view.base_array_layer + view.array_layer_count <= descriptor.array_layer_count(),
            "view layers out of range"
        );
        match view.dimension {
            ViewDimension::D1 => assert_eq!(descriptor.dimension, TextureDimension::D1),
            ViewDimension::D3 => assert_eq!(descriptor.dimension, TextureDimension::D3),
            ViewDimension::D2 => {
                assert_eq!(descriptor.dimension, TextureDimension::D2);
                assert_eq!(view.array_layer_count, 1);
            }
            ViewDimension::D2Array => assert_eq!(descriptor.dimension, TextureDimension::D2),
            ViewDimension::Cube | ViewDimension::CubeArray => {
                assert_eq!(descriptor.dimension, TextureDimension::D2);
                assert_eq!(descriptor.size[0], descriptor.size[1], "cube faces are square");
                assert_eq!(view.array_layer_count % 6, 0, "cube views take whole sets of 6 faces");
                if view.dimension == ViewDimension::Cube {
                    assert_eq!(view.array_layer_count, 6);
                }
            }
        }
        if descriptor.sample_count > 1 {
            assert_eq!(descriptor.mip_level_count, 1, "multisampled textures have one level");
            assert_eq!(view.dimension, ViewDimension::D2);
        }
        Self { descriptor, view, levels }
    }

    /// Builds the mip chain from `base` with a 2x2 (2x2x2 for 3D) box filter.
    pub fn with_generated_mips(descriptor: TextureDescriptor, view: ViewDescriptor, base: TexelView) -> Self {
        let mut levels = vec![base];
        for level in 1..descriptor.mip_level_count {
            let size = descriptor.mip_level_size(level);
            let next = downsample(&levels[level as usize - 1], size, descriptor.dimension);
            levels.push(next);
        }
        Self::new(descriptor, view, levels)
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn view(&self) -> &ViewDescriptor {
        &self.view
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn view_dimension(&self) -> ViewDimension {
        self.view.dimension
    }

    pub fn view_level_count(&self) -> u32 {
        self.view.mip_level_count
    }

    pub fn view_layer_count(&self) -> u32 {
        self.view.array_layer_count
    }

    /// Arrayed views count cubes, not faces.
    pub fn array_length(&self) -> u32 {
        if self.view.dimension.is_cube() { self.view.array_layer_count / 6 } else { self.view.array_layer_count }
    }

    pub fn sample_count(&self) -> u32 {
        self.descriptor.sample_count
    }

    /// Size of a level of the view, layers excluded.
    pub fn level_size(&self, view_level: u32) -> [u32; 3] {
        let [w, h, d] = self.descriptor.mip_level_size(self.view.base_mip_level + view_level);
        match self.descriptor.dimension {
            TextureDimension::D3 => [w, h, d],
            _ => [w, h, 1],
        }
    }

    pub fn level(&self, view_level: u32) -> &TexelView {
        assert!(view_level < self.view.mip_level_count, "view level {} out of range", view_level);
        &self.levels[(self.view.base_mip_level + view_level) as usize]
    }

    /// Reads a texel of a view level. `layer` is relative to the view's base layer.
    pub fn texel(&self, view_level: u32, x: u32, y: u32, layer_or_z: u32, sample: u32) -> PerTexelComponents {
        let z = match self.descriptor.dimension {
            TextureDimension::D3 => layer_or_z,
            _ => self.view.base_array_layer + layer_or_z,
        };
        self.level(view_level).color(TexelCoord::new(x, y, z).with_sample(sample))
    }

    /// The physical coordinate `texel` resolves to.
    pub fn physical_coord(&self, view_level: u32, x: u32, y: u32, layer_or_z: u32, sample: u32) -> (u32, TexelCoord) {
        let z = match self.descriptor.dimension {
            TextureDimension::D3 => layer_or_z,
            _ => self.view.base_array_layer + layer_or_z,
        };
        (self.view.base_mip_level + view_level, TexelCoord::new(x, y, z).with_sample(sample))
    }
}

fn downsample(src: &TexelView, size: [u32; 3], dimension: TextureDimension) -> TexelView {
    let format = src.format();
    let [sw, sh, sd] = src.size();
    let (dx, dy, dz) = match dimension {
        TextureDimension::D1 => (2, 1, 1),
        TextureDimension::D2 => (2, 2, 1),
        TextureDimension::D3 => (2, 2, 2),
    };
    let mut texels = Vec::with_capacity(size.iter().product::<u32>() as usize);
    for z in 0..size[2] {
        for y in 0..size[1] {
            for x in 0..size[0] {
                let mut sum = PerTexelComponents::new();
                let weight = 1.0 / (dx * dy * dz) as f64;
                for oz in 0..dz {
                    for oy in 0..dy {
                        for ox in 0..dx {
                            let src_x = (x * dx + ox).min(sw - 1);
                            let src_y = (y * dy + oy).min(sh - 1);
                            let src_z = if dz == 1 { z } else { (z * dz + oz).min(sd - 1) };
                            sum = sum.add_weighted(&src.color(TexelCoord::new(src_x, src_y, src_z)), weight);
                        }
                    }
                }
                texels.push(quantize_texel(format, &sum));
            }
        }
    }
    TexelView::from_components(format, size, 1, texels)
}
