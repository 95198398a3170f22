use ash::vk;

/// queue family 的基本信息
#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// 物理设备的选择结果，以及后续会反复用到的属性
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,
    pub(crate) basic_props: vk::PhysicalDeviceProperties,
    pub(crate) graphics_queue_family: GfxQueueFamily,

    name: String,
}

// 创建
impl GfxPhysicalDevice {
    /// 选择一个物理设备，优先独显
    ///
    /// 要求设备至少有一个支持 GRAPHICS 的 queue family
    pub fn pick(instance: &ash::Instance) -> Self {
        let pdevices = unsafe { instance.enumerate_physical_devices().unwrap() };
        assert!(!pdevices.is_empty(), "No Vulkan physical device available");

        let pdevice = pdevices
            .iter()
            .copied()
            .find(|pdevice| {
                let props = unsafe { instance.get_physical_device_properties(*pdevice) };
                props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            })
            .unwrap_or(pdevices[0]);

        let basic_props = unsafe { instance.get_physical_device_properties(pdevice) };
        let name = basic_props
            .device_name_as_c_str()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        log::info!("physical device: {}", name);

        let graphics_queue_family = Self::find_graphics_queue_family(instance, pdevice)
            .unwrap_or_else(|| panic!("Physical device ({}) has no graphics queue family", name));

        Self {
            vk_handle: pdevice,
            basic_props,
            graphics_queue_family,
            name,
        }
    }

    fn find_graphics_queue_family(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> Option<GfxQueueFamily> {
        let family_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        family_props
            .iter()
            .enumerate()
            .filter(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(idx, props)| GfxQueueFamily {
                queue_family_index: idx as u32,
                queue_flags: props.queue_flags,
                queue_count: props.queue_count,
            })
            .next()
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn graphics_queue_family(&self) -> GfxQueueFamily {
        self.graphics_queue_family.clone()
    }

    #[inline]
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.basic_props.limits.max_sampler_anisotropy
    }

    /// uniform buffer 的 descriptor 更新时，offset 必须是这个值的整数倍
    #[inline]
    pub fn min_ubo_offset_align(&self) -> vk::DeviceSize {
        self.basic_props.limits.min_uniform_buffer_offset_alignment
    }
}
