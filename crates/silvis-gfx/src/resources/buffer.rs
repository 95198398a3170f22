use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::foundation::debug_messenger::GfxDebugType;
use crate::foundation::device::GfxDevice;
use crate::foundation::mem_allocator::GfxMemAllocator;

/// VMA 分配的 buffer
///
/// staging buffer 走 `new_staging`，创建时即持久映射
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    mapped_ptr: Option<*mut u8>,

    device: Rc<GfxDevice>,
    allocator: Rc<GfxMemAllocator>,
    name: String,
}

// 创建与销毁
impl GfxBuffer {
    /// 创建 GPU-only 的 buffer，分配失败时向上传递错误
    pub fn new(
        device: Rc<GfxDevice>,
        allocator: Rc<GfxMemAllocator>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        debug_name: &str,
    ) -> Result<Self, vk::Result> {
        let buffer_ci = vk::BufferCreateInfo::default() //
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (handle, allocation) = unsafe { allocator.create_buffer(&buffer_ci, &alloc_info)? };

        let buffer = Self {
            handle,
            allocation,
            size,
            usage,
            mapped_ptr: None,
            device: device.clone(),
            allocator,
            name: debug_name.to_string(),
        };
        device.set_debug_name(&buffer, debug_name);
        Ok(buffer)
    }

    /// 创建 CPU 可见的 staging buffer，持久映射
    pub fn new_staging(
        device: Rc<GfxDevice>,
        allocator: Rc<GfxMemAllocator>,
        size: vk::DeviceSize,
        debug_name: &str,
    ) -> Result<Self, vk::Result> {
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::MAPPED | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };
        let (handle, mut allocation) = unsafe { allocator.create_buffer(&buffer_ci, &alloc_info)? };
        let mapped_ptr = allocator.get_allocation_info(&allocation).mapped_data as *mut u8;
        let mapped_ptr = if mapped_ptr.is_null() {
            Some(unsafe { allocator.map_memory(&mut allocation)? })
        } else {
            Some(mapped_ptr)
        };

        let buffer = Self {
            handle,
            allocation,
            size,
            usage: vk::BufferUsageFlags::TRANSFER_SRC,
            mapped_ptr,
            device: device.clone(),
            allocator,
            name: debug_name.to_string(),
        };
        device.set_debug_name(&buffer, debug_name);
        Ok(buffer)
    }

    pub fn destroy(mut self) {
        unsafe {
            self.allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// buffer 的 GPU 地址，要求创建时带有 SHADER_DEVICE_ADDRESS usage
    pub fn device_address(&self) -> vk::DeviceAddress {
        assert!(
            self.usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS),
            "Buffer ({}) was not created with SHADER_DEVICE_ADDRESS usage",
            self.name
        );
        unsafe {
            self.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(self.handle))
        }
    }
}

// tools
impl GfxBuffer {
    /// 通过持久映射向 staging buffer 写入数据
    pub fn write_mapped(&mut self, data: &[u8]) {
        let ptr = self.mapped_ptr.expect("Buffer is not host mapped");
        assert!(data.len() as vk::DeviceSize <= self.size);
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        }
    }
}

impl GfxDebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
