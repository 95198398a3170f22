use std::{
    ffi::{CStr, CString},
    ops::Deref,
};

use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::GfxDebugType;
use crate::foundation::physical_device::GfxPhysicalDevice;

/// 逻辑设备以及常用扩展的函数指针
///
/// 整个 crate 通过 `Rc<GfxDevice>` 共享；dynamic rendering 和
/// synchronization2 属于 1.3 core，直接走 `ash::Device` 的函数。
pub struct GfxDevice {
    pub(crate) device: ash::Device,
    /// swapchain 扩展 API
    pub(crate) swapchain_pf: ash::khr::swapchain::Device,
    /// 调试工具扩展 API
    pub(crate) debug_utils_pf: ash::ext::debug_utils::Device,
}

// 创建与销毁
impl GfxDevice {
    pub fn new(instance: &ash::Instance, pdevice: &GfxPhysicalDevice) -> Self {
        let queue_priorities = [1.0_f32];
        let queue_ci = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(pdevice.graphics_queue_family.queue_family_index)
            .queue_priorities(&queue_priorities)];

        let device_exts = Self::basic_device_exts().iter().map(|e| e.as_ptr()).collect_vec();
        log::info!(
            "device extensions: {}",
            Self::basic_device_exts().iter().map(|e| format!("{:?}", e)).join(", ")
        );

        let basic_features = vk::PhysicalDeviceFeatures::default() //
            .sampler_anisotropy(true)
            .independent_blend(true);

        let mut dynamic_rendering = vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);
        let mut sync2 = vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true);
        let mut bda = vk::PhysicalDeviceBufferDeviceAddressFeatures::default().buffer_device_address(true);
        let mut timeline = vk::PhysicalDeviceTimelineSemaphoreFeatures::default().timeline_semaphore(true);

        let device_ci = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_ci)
            .enabled_extension_names(&device_exts)
            .enabled_features(&basic_features)
            .push_next(&mut dynamic_rendering)
            .push_next(&mut sync2)
            .push_next(&mut bda)
            .push_next(&mut timeline);

        let device = unsafe { instance.create_device(pdevice.vk_handle, &device_ci, None).unwrap() };

        let swapchain_pf = ash::khr::swapchain::Device::new(instance, &device);
        let debug_utils_pf = ash::ext::debug_utils::Device::new(instance, &device);

        Self {
            device,
            swapchain_pf,
            debug_utils_pf,
        }
    }

    pub fn destroy(self) {
        log::info!("Destroying GfxDevice");
        unsafe {
            self.device.destroy_device(None);
        }
    }

    /// 必要的 device extensions
    fn basic_device_exts() -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME]
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn swapchain_pf(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_pf
    }

    #[inline]
    pub fn debug_utils_pf(&self) -> &ash::ext::debug_utils::Device {
        &self.debug_utils_pf
    }
}

// debug name
impl GfxDevice {
    #[inline]
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) {
        let name = CString::new(name.as_ref()).unwrap();
        unsafe {
            self.debug_utils_pf
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
                )
                .unwrap();
        }
    }

    pub fn set_debug_name<T: GfxDebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        let debug_name = CString::new(debug_name.as_str()).unwrap();
        unsafe {
            self.debug_utils_pf
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default()
                        .object_name(debug_name.as_c_str())
                        .object_handle(handle.vk_handle()),
                )
                .unwrap();
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
