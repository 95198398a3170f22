use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::basic::color::LabelColor;
use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use crate::commands::command_pool::GfxCommandPool;
use crate::foundation::debug_messenger::GfxDebugType;
use crate::foundation::device::GfxDevice;

/// primary command buffer 封装
///
/// 持有 device 的引用，pass 回调里可以直接录制命令
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    command_pool_handle: vk::CommandPool,
    device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxCommandBuffer {
    pub fn new(device: Rc<GfxDevice>, command_pool: &GfxCommandPool, debug_name: &str) -> Self {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let vk_handle = unsafe { device.allocate_command_buffers(&info).unwrap()[0] };
        let cmd = Self {
            vk_handle,
            command_pool_handle: command_pool.handle(),
            device: device.clone(),
        };
        device.set_debug_name(&cmd, debug_name);
        cmd
    }

    /// 由 pool manager 回收已分配好的 vk handle 时使用
    pub(crate) fn from_raw(device: Rc<GfxDevice>, vk_handle: vk::CommandBuffer, pool: vk::CommandPool) -> Self {
        Self {
            vk_handle,
            command_pool_handle: pool,
            device,
        }
    }

    /// 释放 command buffer 在 command pool 中占用的内存
    ///
    /// 释放之后 command buffer 不可再使用
    #[inline]
    pub fn free(self) {
        unsafe {
            self.device.free_command_buffers(self.command_pool_handle, std::slice::from_ref(&self.vk_handle));
        }
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }
}

// basic 命令
impl GfxCommandBuffer {
    /// 开始录制，自动设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
                .unwrap();
        }
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
    }

    /// 结束录制，同时结束 debug label
    #[inline]
    pub fn end(&self) {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.vk_handle).unwrap() }
    }
}

// dynamic rendering
impl GfxCommandBuffer {
    #[inline]
    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo) {
        unsafe {
            self.device.cmd_begin_rendering(self.vk_handle, rendering_info);
        }
    }

    #[inline]
    pub fn end_rendering(&self) {
        unsafe {
            self.device.cmd_end_rendering(self.vk_handle);
        }
    }
}

// barrier
impl GfxCommandBuffer {
    /// 将一个 pass 的所有 image/buffer barrier 合并为一次 sync2 调用
    pub fn pipeline_barrier2(
        &self,
        dependency_flags: vk::DependencyFlags,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    ) {
        if image_barriers.is_empty() && buffer_barriers.is_empty() {
            return;
        }

        let image_barriers = image_barriers.iter().map(|b| *b.inner()).collect_vec();
        let buffer_barriers = buffer_barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .dependency_flags(dependency_flags)
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);

        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }
}

// debug label
impl GfxCommandBuffer {
    #[inline]
    pub fn begin_label(&self, label_name: impl AsRef<str>, label_color: glam::Vec4) {
        let name = std::ffi::CString::new(label_name.as_ref()).unwrap();
        unsafe {
            self.device.debug_utils_pf().cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe {
            self.device.debug_utils_pf().cmd_end_debug_utils_label(self.vk_handle);
        }
    }
}

impl GfxDebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
