//! 资源描述与内部资源记录
//!
//! 瞬态资源由 graph 持有并参与复用；外部资源由调用方持有，
//! graph 只借用其裸 handle，保证在帧结束前有效。

use ash::vk;
use silvis_gfx::resources::image::GfxImageDesc;

/// 瞬态 texture 的描述
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RdgTextureDesc {
    pub name: String,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub usage: vk::ImageUsageFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
}

impl Default for RdgTextureDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent3D {
                width: 0,
                height: 0,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::empty(),
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
        }
    }
}

impl RdgTextureDesc {
    /// 2D texture 描述
    pub fn new_2d(
        name: impl Into<String>,
        format: vk::Format,
        width: u32,
        height: u32,
        usage: vk::ImageUsageFlags,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.format != vk::Format::UNDEFINED
            && self.extent.width > 0
            && self.extent.height > 0
            && self.extent.depth > 0
    }

    /// 转换为 gfx 层的 image 描述，复用池按这个结构匹配
    pub(crate) fn as_gfx_desc(&self) -> GfxImageDesc {
        GfxImageDesc {
            format: self.format,
            extent: self.extent,
            usage: self.usage,
            mip_levels: self.mip_levels,
            array_layers: self.array_layers,
            samples: self.samples,
            tiling: self.tiling,
        }
    }
}

/// 瞬态 buffer 的描述
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RdgBufferDesc {
    pub name: String,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

impl RdgBufferDesc {
    pub fn new(name: impl Into<String>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            name: name.into(),
            size,
            usage,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.size > 0
    }
}

/// 资源的生命周期区间，以 pass index 计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RdgLifetime {
    pub first_pass: u32,
    pub last_pass: u32,
    pub used: bool,
}

impl RdgLifetime {
    /// 扩展区间使其覆盖 pass_index
    pub fn touch(&mut self, pass_index: u32) {
        if !self.used {
            self.first_pass = pass_index;
            self.last_pass = pass_index;
            self.used = true;
        } else {
            self.first_pass = self.first_pass.min(pass_index);
            self.last_pass = self.last_pass.max(pass_index);
        }
    }

    /// 两个区间是否重叠；未使用的区间不与任何区间重叠
    pub fn overlaps(&self, other: &RdgLifetime) -> bool {
        if !self.used || !other.used {
            return false;
        }
        !(self.last_pass < other.first_pass || other.last_pass < self.first_pass)
    }
}

/// texture 的物理绑定
#[derive(Clone, Copy, Debug)]
pub(crate) enum RdgTextureBinding {
    /// 尚未分配
    None,
    /// 瞬态：指向本帧 backing 列表的下标
    Transient { slot: usize },
    /// 外部导入：裸 handle，调用方保证比当前帧活得久
    External { image: vk::Image, view: vk::ImageView },
}

/// registry 中的 texture 记录
pub(crate) struct RdgTextureRecord {
    pub desc: RdgTextureDesc,
    /// true 表示瞬态（graph 拥有），false 表示外部导入
    pub transient: bool,
    pub binding: RdgTextureBinding,
    pub current_layout: vk::ImageLayout,
    pub lifetime: RdgLifetime,
    /// swapchain image 的下标；非 swapchain 资源为 None
    pub swapchain_image_index: Option<u32>,
}

impl RdgTextureRecord {
    pub fn new_transient(desc: RdgTextureDesc) -> Self {
        Self {
            desc,
            transient: true,
            binding: RdgTextureBinding::None,
            current_layout: vk::ImageLayout::UNDEFINED,
            lifetime: RdgLifetime::default(),
            swapchain_image_index: None,
        }
    }

    pub fn new_external(desc: RdgTextureDesc, image: vk::Image, view: vk::ImageView, layout: vk::ImageLayout) -> Self {
        Self {
            desc,
            transient: false,
            binding: RdgTextureBinding::External { image, view },
            current_layout: layout,
            lifetime: RdgLifetime::default(),
            swapchain_image_index: None,
        }
    }

    #[inline]
    pub fn is_swapchain_image(&self) -> bool {
        self.swapchain_image_index.is_some()
    }
}

/// buffer 的物理绑定
#[derive(Clone, Copy, Debug)]
pub(crate) enum RdgBufferBinding {
    None,
    Transient { slot: usize },
    External { buffer: vk::Buffer },
}

/// registry 中的 buffer 记录
pub(crate) struct RdgBufferRecord {
    pub desc: RdgBufferDesc,
    pub transient: bool,
    pub binding: RdgBufferBinding,
    pub lifetime: RdgLifetime,
}

impl RdgBufferRecord {
    pub fn new_transient(desc: RdgBufferDesc) -> Self {
        Self {
            desc,
            transient: true,
            binding: RdgBufferBinding::None,
            lifetime: RdgLifetime::default(),
        }
    }

    pub fn new_external(desc: RdgBufferDesc, buffer: vk::Buffer) -> Self {
        Self {
            desc,
            transient: false,
            binding: RdgBufferBinding::External { buffer },
            lifetime: RdgLifetime::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_desc_validation() {
        assert!(!RdgTextureDesc::default().is_valid());

        let desc = RdgTextureDesc::new_2d(
            "gbuffer",
            vk::Format::R8G8B8A8_UNORM,
            512,
            512,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        );
        assert!(desc.is_valid());

        let mut zero_extent = desc.clone();
        zero_extent.extent.height = 0;
        assert!(!zero_extent.is_valid());
    }

    #[test]
    fn test_buffer_desc_validation() {
        assert!(!RdgBufferDesc::new("empty", 0, vk::BufferUsageFlags::STORAGE_BUFFER).is_valid());
        assert!(RdgBufferDesc::new("ok", 256, vk::BufferUsageFlags::STORAGE_BUFFER).is_valid());
    }

    #[test]
    fn test_lifetime_touch_extends_interval() {
        let mut lifetime = RdgLifetime::default();
        assert!(!lifetime.used);

        lifetime.touch(3);
        assert_eq!((lifetime.first_pass, lifetime.last_pass), (3, 3));

        lifetime.touch(1);
        lifetime.touch(5);
        assert_eq!((lifetime.first_pass, lifetime.last_pass), (1, 5));
    }

    #[test]
    fn test_lifetime_overlap() {
        let mut a = RdgLifetime::default();
        a.touch(0);
        a.touch(2);

        let mut b = RdgLifetime::default();
        b.touch(3);
        b.touch(4);

        // [0,2] 与 [3,4] 不重叠
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));

        b.touch(2);
        assert!(a.overlaps(&b));

        // 未使用的区间不与任何区间重叠
        let unused = RdgLifetime::default();
        assert!(!a.overlaps(&unused));
        assert!(!unused.overlaps(&a));
    }
}
