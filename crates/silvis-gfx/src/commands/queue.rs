use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::submit_info::GfxSubmitInfo;
use crate::foundation::debug_messenger::GfxDebugType;
use crate::foundation::device::GfxDevice;
use crate::foundation::physical_device::GfxQueueFamily;

/// graphics queue 封装
///
/// queue 本身随 device 销毁，这里不需要 destroy
pub struct GfxQueue {
    vk_queue: vk::Queue,
    queue_family: GfxQueueFamily,
    device: Rc<GfxDevice>,
}

impl GfxQueue {
    pub fn new(device: Rc<GfxDevice>, vk_queue: vk::Queue, queue_family: GfxQueueFamily) -> Self {
        Self {
            vk_queue,
            queue_family,
            device,
        }
    }
}

// getters
impl GfxQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }
}

// tools
impl GfxQueue {
    /// 以 sync2 的方式提交一批 submit info
    ///
    /// batches 必须在提交完成前保持存活，submit_info() 返回的结构引用其内存。
    /// 不需要 fence 时传 `vk::Fence::null()`
    pub fn submit(&self, batches: Vec<GfxSubmitInfo>, fence: vk::Fence) -> Result<(), vk::Result> {
        let submit_infos = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe { self.device.queue_submit2(self.vk_queue, &submit_infos, fence) }
    }

    /// 根据 specification，vkQueueWaitIdle 与 Fence 等待效率相同
    #[inline]
    pub fn wait_idle(&self) {
        unsafe { self.device.queue_wait_idle(self.vk_queue).unwrap() }
    }
}

// debug 相关命令
impl GfxQueue {
    #[inline]
    pub fn begin_label(&self, label_name: impl AsRef<str>, label_color: glam::Vec4) {
        let name = std::ffi::CString::new(label_name.as_ref()).unwrap();
        unsafe {
            self.device.debug_utils_pf().queue_begin_debug_utils_label(
                self.vk_queue,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe {
            self.device.debug_utils_pf().queue_end_debug_utils_label(self.vk_queue);
        }
    }
}

impl GfxDebugType for GfxQueue {
    fn debug_type_name() -> &'static str {
        "GfxQueue"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}
