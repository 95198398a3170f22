//! 资源注册表
//!
//! 当前帧所有虚拟资源的权威表：handle 到记录的映射。
//! handle 从 1 开始单调分配，texture 和 buffer 共用一个计数器。
//! 引用未注册的 handle 属于编程错误，立即 panic。

use std::collections::HashMap;

use crate::handle::{RdgBufferHandle, RdgTextureHandle};
use crate::resource::{RdgBufferRecord, RdgTextureRecord};

pub(crate) struct RdgResourceRegistry {
    next_handle: u32,
    textures: HashMap<u32, RdgTextureRecord>,
    buffers: HashMap<u32, RdgBufferRecord>,
}

// new
impl RdgResourceRegistry {
    pub fn new() -> Self {
        Self {
            // 0 保留为无效 handle
            next_handle: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    fn next_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

// 注册
impl RdgResourceRegistry {
    pub fn register_texture(&mut self, record: RdgTextureRecord) -> RdgTextureHandle {
        let id = self.next_handle();
        self.textures.insert(id, record);
        RdgTextureHandle::new(id)
    }

    pub fn register_buffer(&mut self, record: RdgBufferRecord) -> RdgBufferHandle {
        let id = self.next_handle();
        self.buffers.insert(id, record);
        RdgBufferHandle::new(id)
    }
}

// 查询
impl RdgResourceRegistry {
    #[inline]
    pub fn contains_texture(&self, handle: RdgTextureHandle) -> bool {
        handle.is_valid() && self.textures.contains_key(&handle.id)
    }

    #[inline]
    pub fn contains_buffer(&self, handle: RdgBufferHandle) -> bool {
        handle.is_valid() && self.buffers.contains_key(&handle.id)
    }

    #[inline]
    pub fn texture(&self, handle: RdgTextureHandle) -> &RdgTextureRecord {
        self.textures.get(&handle.id).unwrap_or_else(|| panic!("Unknown texture handle: {:?}", handle))
    }

    #[inline]
    pub fn texture_mut(&mut self, handle: RdgTextureHandle) -> &mut RdgTextureRecord {
        self.textures.get_mut(&handle.id).unwrap_or_else(|| panic!("Unknown texture handle: {:?}", handle))
    }

    #[inline]
    pub fn buffer(&self, handle: RdgBufferHandle) -> &RdgBufferRecord {
        self.buffers.get(&handle.id).unwrap_or_else(|| panic!("Unknown buffer handle: {:?}", handle))
    }

    #[inline]
    pub fn buffer_mut(&mut self, handle: RdgBufferHandle) -> &mut RdgBufferRecord {
        self.buffers.get_mut(&handle.id).unwrap_or_else(|| panic!("Unknown buffer handle: {:?}", handle))
    }

    pub fn iter_textures(&self) -> impl Iterator<Item = (RdgTextureHandle, &RdgTextureRecord)> {
        self.textures.iter().map(|(id, record)| (RdgTextureHandle::new(*id), record))
    }

    pub fn iter_buffers(&self) -> impl Iterator<Item = (RdgBufferHandle, &RdgBufferRecord)> {
        self.buffers.iter().map(|(id, record)| (RdgBufferHandle::new(*id), record))
    }

    /// 瞬态资源总数（texture + buffer）
    pub fn transient_count(&self) -> usize {
        self.textures.values().filter(|r| r.transient).count()
            + self.buffers.values().filter(|r| r.transient).count()
    }

    /// 瞬态 texture 的 handle 列表，按 id 排序保证确定性
    pub fn sorted_transient_textures(&self) -> Vec<RdgTextureHandle> {
        let mut ids: Vec<u32> = self.textures.iter().filter(|(_, r)| r.transient).map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.into_iter().map(RdgTextureHandle::new).collect()
    }

    /// 瞬态 buffer 的 handle 列表，按 id 排序保证确定性
    pub fn sorted_transient_buffers(&self) -> Vec<RdgBufferHandle> {
        let mut ids: Vec<u32> = self.buffers.iter().filter(|(_, r)| r.transient).map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.into_iter().map(RdgBufferHandle::new).collect()
    }

    /// 已经被使用过的 swapchain texture，按 id 排序
    pub fn sorted_swapchain_textures(&self) -> Vec<RdgTextureHandle> {
        let mut ids: Vec<u32> = self
            .textures
            .iter()
            .filter(|(_, r)| r.is_swapchain_image() && r.lifetime.used)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(RdgTextureHandle::new).collect()
    }
}

// 生命周期
impl RdgResourceRegistry {
    pub fn touch_texture(&mut self, handle: RdgTextureHandle, pass_index: u32) {
        self.texture_mut(handle).lifetime.touch(pass_index);
    }

    pub fn touch_buffer(&mut self, handle: RdgBufferHandle, pass_index: u32) {
        self.buffer_mut(handle).lifetime.touch(pass_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{RdgBufferDesc, RdgTextureDesc};
    use ash::vk;

    fn color_desc(name: &str) -> RdgTextureDesc {
        RdgTextureDesc::new_2d(name, vk::Format::R8G8B8A8_UNORM, 64, 64, vk::ImageUsageFlags::COLOR_ATTACHMENT)
    }

    #[test]
    fn test_handles_are_dense_and_shared_counter() {
        let mut registry = RdgResourceRegistry::new();
        let t0 = registry.register_texture(RdgTextureRecord::new_transient(color_desc("a")));
        let b0 = registry.register_buffer(RdgBufferRecord::new_transient(RdgBufferDesc::new(
            "b",
            64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )));
        let t1 = registry.register_texture(RdgTextureRecord::new_transient(color_desc("c")));

        assert_eq!(t0.id, 1);
        assert_eq!(b0.id, 2);
        assert_eq!(t1.id, 3);
        assert!(registry.contains_texture(t0));
        assert!(registry.contains_buffer(b0));
        assert!(!registry.contains_texture(RdgTextureHandle::INVALID));
    }

    #[test]
    #[should_panic(expected = "Unknown texture handle")]
    fn test_unknown_texture_handle_panics() {
        let registry = RdgResourceRegistry::new();
        registry.texture(RdgTextureHandle::new(42));
    }

    #[test]
    fn test_transient_count_ignores_externals() {
        let mut registry = RdgResourceRegistry::new();
        registry.register_texture(RdgTextureRecord::new_transient(color_desc("t")));
        registry.register_texture(RdgTextureRecord::new_external(
            color_desc("ext"),
            vk::Image::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ));
        assert_eq!(registry.transient_count(), 1);
    }
}
