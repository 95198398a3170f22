use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;

use crate::commands::queue::GfxQueue;
use crate::foundation::debug_messenger::GfxDebugMessenger;
use crate::foundation::device::GfxDevice;
use crate::foundation::instance::GfxInstance;
use crate::foundation::mem_allocator::GfxMemAllocator;
use crate::foundation::physical_device::GfxPhysicalDevice;

/// foundation 各部分的聚合：instance、physical device、device、
/// graphics queue 以及 VMA allocator
///
/// 初始化顺序即字段声明顺序，销毁顺序相反
pub struct GfxContext {
    _entry: ash::Entry,
    instance: GfxInstance,
    debug_messenger: GfxDebugMessenger,
    physical_device: GfxPhysicalDevice,
    device: Rc<GfxDevice>,
    graphics_queue: Rc<GfxQueue>,
    allocator: Rc<GfxMemAllocator>,
}

// 创建与销毁
impl GfxContext {
    const ENGINE_NAME: &'static str = "Silvis";

    pub fn new(app_name: &str, extra_instance_exts: Vec<&'static CStr>) -> Self {
        let entry = unsafe { ash::Entry::load().unwrap() };
        let instance = GfxInstance::new(&entry, app_name, Self::ENGINE_NAME, extra_instance_exts);
        let debug_messenger = GfxDebugMessenger::new(&entry, instance.ash_instance());
        let physical_device = GfxPhysicalDevice::pick(instance.ash_instance());
        let device = Rc::new(GfxDevice::new(instance.ash_instance(), &physical_device));

        let queue_family = physical_device.graphics_queue_family();
        let vk_queue = unsafe { device.get_device_queue(queue_family.queue_family_index, 0) };
        let graphics_queue = Rc::new(GfxQueue::new(device.clone(), vk_queue, queue_family));

        let allocator = Rc::new(GfxMemAllocator::new(
            instance.ash_instance(),
            physical_device.vk_handle(),
            device.ash_device(),
        ));

        Self {
            _entry: entry,
            instance,
            debug_messenger,
            physical_device,
            device,
            graphics_queue,
            allocator,
        }
    }

    pub fn destroy(self) {
        drop(self.allocator);
        Rc::try_unwrap(self.device)
            .unwrap_or_else(|_| panic!("GfxDevice still referenced at GfxContext teardown"))
            .destroy();
        self.debug_messenger.destroy();
        self.instance.destroy();
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn entry(&self) -> &ash::Entry {
        &self._entry
    }

    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn device(&self) -> Rc<GfxDevice> {
        self.device.clone()
    }

    #[inline]
    pub fn graphics_queue(&self) -> Rc<GfxQueue> {
        self.graphics_queue.clone()
    }

    #[inline]
    pub fn allocator(&self) -> Rc<GfxMemAllocator> {
        self.allocator.clone()
    }

    /// swapchain image 的 layout 是 present engine 关心的，
    /// surface format 的选择则交给 swapchain 模块
    #[inline]
    pub fn vk_physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device.vk_handle()
    }
}
