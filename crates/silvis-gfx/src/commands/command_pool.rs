use std::rc::Rc;

use ash::vk;

use crate::foundation::debug_messenger::GfxDebugType;
use crate::foundation::device::GfxDevice;
use crate::foundation::physical_device::GfxQueueFamily;

/// command pool 和 queue family 绑定，而不是和 queue 绑定
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    device: Rc<GfxDevice>,

    _queue_family: GfxQueueFamily,
}

// 创建与销毁
impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family: GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> Self {
        let handle = unsafe {
            device
                .create_command_pool(
                    &vk::CommandPoolCreateInfo::default()
                        .queue_family_index(queue_family.queue_family_index)
                        .flags(flags),
                    None,
                )
                .unwrap()
        };

        let pool = Self {
            handle,
            device: device.clone(),
            _queue_family: queue_family,
        };
        device.set_debug_name(&pool, debug_name);
        pool
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}

// tools
impl GfxCommandPool {
    /// 并不释放内存，而是将 pool 内所有 command buffer 重置到初始状态
    pub fn reset_all_buffers(&self) {
        unsafe {
            self.device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::RELEASE_RESOURCES).unwrap();
        }
    }
}

impl GfxDebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
