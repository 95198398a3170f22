use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::fence::GfxFence;
use crate::commands::queue::GfxQueue;
use crate::commands::semaphore::GfxSemaphore;
use crate::foundation::context::GfxContext;
use crate::foundation::device::GfxDevice;
use crate::swapchain::surface::GfxSurface;

/// swapchain 封装
///
/// image 由 present engine 创建，这里只为每张 image 建立 view。
/// out-of-date/suboptimal 由调用方处理：acquire 返回 suboptimal 标记，
/// present 返回 Result，调用方在下一帧之前重建 swapchain。
pub struct GfxSwapchain {
    surface: GfxSurface,
    handle: vk::SwapchainKHR,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    color_format: vk::Format,
    extent: vk::Extent2D,

    device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxSwapchain {
    pub fn new(
        ctx: &GfxContext,
        window: &winit::window::Window,
        present_mode: vk::PresentModeKHR,
        surface_format: vk::SurfaceFormatKHR,
    ) -> Self {
        let device = ctx.device();
        let surface = GfxSurface::new(ctx, window);
        let extent = surface.capabilities.current_extent;

        let handle = Self::create_swapchain(&device, &surface, surface_format, extent, present_mode);

        let images = unsafe { device.swapchain_pf().get_swapchain_images(handle).unwrap() };
        for (idx, image) in images.iter().enumerate() {
            device.set_object_debug_name(*image, format!("swapchain-image-{idx}"));
        }

        let image_views = images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                let view_ci = vk::ImageViewCreateInfo::default()
                    .image(*image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = unsafe { device.create_image_view(&view_ci, None).unwrap() };
                device.set_object_debug_name(view, format!("swapchain-view-{idx}"));
                view
            })
            .collect_vec();

        Self {
            surface,
            handle,
            images,
            image_views,
            color_format: surface_format.format,
            extent,
            device,
        }
    }

    fn create_swapchain(
        device: &GfxDevice,
        surface: &GfxSurface,
        surface_format: vk::SurfaceFormatKHR,
        extent: vk::Extent2D,
        present_mode: vk::PresentModeKHR,
    ) -> vk::SwapchainKHR {
        // max_image_count == 0 表示不限制 image 数量
        let image_count = if surface.capabilities.max_image_count == 0 {
            surface.capabilities.min_image_count + 1
        } else {
            u32::min(surface.capabilities.max_image_count, surface.capabilities.min_image_count + 1)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST 用于帧分析工具的回读
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        unsafe {
            let handle = device.swapchain_pf().create_swapchain(&create_info, None).unwrap();
            device.set_object_debug_name(handle, "main-swapchain");
            handle
        }
    }

    pub fn destroy(self) {
        unsafe {
            for view in &self.image_views {
                self.device.destroy_image_view(*view, None);
            }
            self.device.swapchain_pf().destroy_swapchain(self.handle, None);
        }
        self.surface.destroy();
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }

    #[inline]
    pub fn image_view(&self, index: u32) -> vk::ImageView {
        self.image_views[index as usize]
    }
}

// tools
impl GfxSwapchain {
    /// 获取下一张可用的 image
    ///
    /// # return
    /// (image index, suboptimal)；out-of-date 时返回 Err，调用方重建 swapchain
    pub fn acquire_next_image(
        &self,
        semaphore: Option<&GfxSemaphore>,
        fence: Option<&GfxFence>,
        timeout_ns: u64,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.device.swapchain_pf().acquire_next_image(
                self.handle,
                timeout_ns,
                semaphore.map_or(vk::Semaphore::null(), |s| s.handle()),
                fence.map_or(vk::Fence::null(), |f| f.handle()),
            )
        }
    }

    /// 呈现指定的 image
    ///
    /// # return
    /// suboptimal 标记；out-of-date 时返回 Err
    pub fn present(&self, queue: &GfxQueue, image_index: u32, wait_semaphores: &[vk::Semaphore]) -> Result<bool, vk::Result> {
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        unsafe { self.device.swapchain_pf().queue_present(queue.handle(), &present_info) }
    }
}
