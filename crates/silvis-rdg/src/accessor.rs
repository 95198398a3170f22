//! 资源访问器
//!
//! Pass 执行回调中把虚拟 handle 解析为物理资源。
//! 只在发起它的 Pass 执行期间有效，不拥有 graph，不应被缓存。

use std::cell::RefCell;

use ash::vk;
use silvis_gfx::foundation::device::GfxDevice;
use silvis_gfx::resources::buffer::GfxBuffer;
use silvis_gfx::resources::image::GfxImage2D;

use crate::handle::{RdgBufferHandle, RdgTextureHandle};
use crate::pool::RdgTransientPool;
use crate::registry::RdgResourceRegistry;
use crate::resource::{RdgBufferBinding, RdgTextureBinding};
use crate::sampler::RdgSamplerKind;

pub struct RdgResourceAccessor<'a> {
    pub(crate) device: &'a GfxDevice,
    pub(crate) registry: &'a RdgResourceRegistry,
    pub(crate) frame_images: &'a [GfxImage2D],
    pub(crate) frame_buffers: &'a [GfxBuffer],
    pub(crate) pool: &'a RefCell<RdgTransientPool>,
}

// texture 访问
impl RdgResourceAccessor<'_> {
    /// backing 的 image view，用于写 descriptor
    pub fn texture_view(&self, handle: RdgTextureHandle) -> vk::ImageView {
        match self.registry.texture(handle).binding {
            RdgTextureBinding::Transient { slot } => self.frame_images[slot].view(),
            RdgTextureBinding::External { view, .. } => view,
            RdgTextureBinding::None => panic!("Texture {:?} has no physical binding", handle),
        }
    }

    /// backing 的 image 本体，面向需要裸属性的高级用法
    pub fn texture(&self, handle: RdgTextureHandle) -> vk::Image {
        match self.registry.texture(handle).binding {
            RdgTextureBinding::Transient { slot } => self.frame_images[slot].handle(),
            RdgTextureBinding::External { image, .. } => image,
            RdgTextureBinding::None => panic!("Texture {:?} has no physical binding", handle),
        }
    }

    /// texture 的当前 layout
    pub fn texture_layout(&self, handle: RdgTextureHandle) -> vk::ImageLayout {
        self.registry.texture(handle).current_layout
    }
}

// buffer 访问
impl RdgResourceAccessor<'_> {
    pub fn buffer(&self, handle: RdgBufferHandle) -> vk::Buffer {
        match self.registry.buffer(handle).binding {
            RdgBufferBinding::Transient { slot } => self.frame_buffers[slot].handle(),
            RdgBufferBinding::External { buffer } => buffer,
            RdgBufferBinding::None => panic!("Buffer {:?} has no physical binding", handle),
        }
    }

    /// backing 的 buffer 对象；外部导入的 buffer 由调用方持有，返回 None
    pub fn buffer_object(&self, handle: RdgBufferHandle) -> Option<&GfxBuffer> {
        match self.registry.buffer(handle).binding {
            RdgBufferBinding::Transient { slot } => Some(&self.frame_buffers[slot]),
            RdgBufferBinding::External { .. } => None,
            RdgBufferBinding::None => panic!("Buffer {:?} has no physical binding", handle),
        }
    }

    /// buffer 的 GPU 地址，要求声明时带有 SHADER_DEVICE_ADDRESS usage
    pub fn buffer_device_address(&self, handle: RdgBufferHandle) -> vk::DeviceAddress {
        let record = self.registry.buffer(handle);
        assert!(
            record.desc.usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS),
            "Buffer '{}' was not declared with SHADER_DEVICE_ADDRESS usage",
            record.desc.name
        );

        match record.binding {
            RdgBufferBinding::Transient { slot } => self.frame_buffers[slot].device_address(),
            RdgBufferBinding::External { buffer } => unsafe {
                self.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer))
            },
            RdgBufferBinding::None => panic!("Buffer {:?} has no physical binding", handle),
        }
    }
}

// 采样器
impl RdgResourceAccessor<'_> {
    /// graph 自有的便利采样器，首次请求时创建
    ///
    /// 外部导入的纹理应当使用它们自己的采样器
    pub fn sampler(&self, kind: RdgSamplerKind) -> vk::Sampler {
        self.pool.borrow_mut().sampler(kind)
    }

    /// 最常用的 LinearClamp
    #[inline]
    pub fn default_sampler(&self) -> vk::Sampler {
        self.sampler(RdgSamplerKind::LinearClamp)
    }
}
