use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::foundation::debug_messenger::GfxDebugType;
use crate::foundation::device::GfxDevice;
use crate::foundation::mem_allocator::GfxMemAllocator;

/// 创建 image 所需的全部信息
///
/// 保留在 `GfxImage2D` 上，资源池按这个结构做匹配
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfxImageDesc {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub usage: vk::ImageUsageFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
}

impl GfxImageDesc {
    #[inline]
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage,
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
        }
    }

    /// 从格式推断 aspect
    pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
        match format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    fn as_create_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(self.extent)
            .mip_levels(self.mip_levels)
            .array_layers(self.array_layers)
            .samples(self.samples)
            .tiling(self.tiling)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

/// VMA 分配的 2D image，连同默认的 image view
pub struct GfxImage2D {
    handle: vk::Image,
    view: vk::ImageView,
    allocation: vk_mem::Allocation,
    desc: GfxImageDesc,

    device: Rc<GfxDevice>,
    allocator: Rc<GfxMemAllocator>,
    name: String,
}

// 创建与销毁
impl GfxImage2D {
    /// 创建 GPU-only 的 image，分配失败时向上传递错误
    pub fn new(
        device: Rc<GfxDevice>,
        allocator: Rc<GfxMemAllocator>,
        desc: GfxImageDesc,
        debug_name: &str,
    ) -> Result<Self, vk::Result> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (handle, allocation) = unsafe { allocator.create_image(&desc.as_create_info(), &alloc_info)? };

        let aspect = GfxImageDesc::infer_aspect(desc.format);
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(handle)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: desc.mip_levels,
                base_array_layer: 0,
                layer_count: desc.array_layers,
            });
        let view = unsafe { device.create_image_view(&view_ci, None)? };

        let image = Self {
            handle,
            view,
            allocation,
            desc,
            device: device.clone(),
            allocator,
            name: debug_name.to_string(),
        };
        device.set_debug_name(&image, debug_name);
        device.set_object_debug_name(view, format!("{}-view", debug_name));
        Ok(image)
    }

    pub fn destroy(mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.allocator.destroy_image(self.handle, &mut self.allocation);
        }
    }
}

// getters
impl GfxImage2D {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageDesc {
        &self.desc
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.desc.extent
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl GfxDebugType for GfxImage2D {
    fn debug_type_name() -> &'static str {
        "GfxImage2D"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
