//! 瞬态资源复用池
//!
//! graph 之外唯一跨帧存活的状态（帧同步管理器除外）。
//! 帧末归还的 backing 按 desc 精确匹配供下一帧复用；
//! graph 自有的采样器也在这里惰性创建、随池销毁。
//!
//! 匹配策略刻意保持简单：线性扫描加精确匹配。更聪明的装箱分配器
//! 是允许的优化，但必须保持生命周期不重叠的不变式。

use std::collections::HashMap;
use std::rc::Rc;

use ash::vk;
use silvis_gfx::foundation::device::GfxDevice;
use silvis_gfx::resources::buffer::GfxBuffer;
use silvis_gfx::resources::image::{GfxImage2D, GfxImageDesc};
use silvis_gfx::resources::sampler::create_sampler;

use crate::resource::RdgLifetime;
use crate::sampler::RdgSamplerKind;

pub struct RdgTransientPool {
    device: Rc<GfxDevice>,
    /// physical device 的各向异性上限
    max_anisotropy: f32,

    free_images: Vec<GfxImage2D>,
    free_buffers: Vec<GfxBuffer>,
    samplers: HashMap<RdgSamplerKind, vk::Sampler>,
}

// 创建与销毁
impl RdgTransientPool {
    pub fn new(device: Rc<GfxDevice>, max_anisotropy: f32) -> Self {
        Self {
            device,
            max_anisotropy,
            free_images: Vec::new(),
            free_buffers: Vec::new(),
            samplers: HashMap::new(),
        }
    }

    pub fn destroy(mut self) {
        log::info!(
            "Destroying RdgTransientPool ({} pooled images, {} pooled buffers)",
            self.free_images.len(),
            self.free_buffers.len()
        );
        for image in self.free_images.drain(..) {
            image.destroy();
        }
        for buffer in self.free_buffers.drain(..) {
            buffer.destroy();
        }
        for (_, sampler) in self.samplers.drain() {
            unsafe {
                self.device.destroy_sampler(sampler, None);
            }
        }
    }
}

// backing 的获取与归还
impl RdgTransientPool {
    /// 按 desc 精确匹配取出一个 image backing；没有匹配时返回 None
    pub(crate) fn acquire_image(&mut self, desc: &GfxImageDesc) -> Option<GfxImage2D> {
        let index = self.free_images.iter().position(|image| image.desc() == desc)?;
        Some(self.free_images.swap_remove(index))
    }

    /// usage 相同且容量足够的 buffer backing 即可复用
    pub(crate) fn acquire_buffer(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Option<GfxBuffer> {
        let index = self.free_buffers.iter().position(|buffer| buffer.usage() == usage && buffer.size() >= size)?;
        Some(self.free_buffers.swap_remove(index))
    }

    pub(crate) fn release_image(&mut self, image: GfxImage2D) {
        self.free_images.push(image);
    }

    pub(crate) fn release_buffer(&mut self, buffer: GfxBuffer) {
        self.free_buffers.push(buffer);
    }

    #[inline]
    pub fn pooled_image_count(&self) -> usize {
        self.free_images.len()
    }

    #[inline]
    pub fn pooled_buffer_count(&self) -> usize {
        self.free_buffers.len()
    }
}

// 采样器
impl RdgTransientPool {
    /// 惰性创建的图内采样器
    pub(crate) fn sampler(&mut self, kind: RdgSamplerKind) -> vk::Sampler {
        if let Some(sampler) = self.samplers.get(&kind) {
            return *sampler;
        }
        let sampler = create_sampler(&self.device, &kind.desc(), self.max_anisotropy);
        self.device.set_object_debug_name(sampler, format!("rdg-sampler-{:?}", kind));
        self.samplers.insert(kind, sampler);
        sampler
    }
}

/// 帧内复用的分配计划
///
/// 输入按 first_pass 排好序的 (desc, lifetime) 列表，
/// 输出每项对应的 slot 下标。desc 相同且生命周期与 slot 内所有已有
/// 用户都不重叠时复用同一个 slot，否则开新 slot。
pub(crate) fn plan_assignments<D: PartialEq + Clone>(items: &[(D, RdgLifetime)]) -> (Vec<usize>, usize) {
    let mut slots: Vec<(D, Vec<RdgLifetime>)> = Vec::new();
    let mut assignments = Vec::with_capacity(items.len());

    for (desc, lifetime) in items {
        let found = slots
            .iter()
            .position(|(slot_desc, users)| slot_desc == desc && users.iter().all(|user| !user.overlaps(lifetime)));

        let slot = match found {
            Some(slot) => slot,
            None => {
                slots.push((desc.clone(), Vec::new()));
                slots.len() - 1
            }
        };
        slots[slot].1.push(*lifetime);
        assignments.push(slot);
    }

    (assignments, slots.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifetime(first: u32, last: u32) -> RdgLifetime {
        let mut lifetime = RdgLifetime::default();
        lifetime.touch(first);
        lifetime.touch(last);
        lifetime
    }

    /// 生命周期不重叠且 desc 相同的两个瞬态共享一个 backing
    #[test]
    fn test_non_overlapping_lifetimes_share_slot() {
        let desc = "rgba8-512";
        let items = vec![(desc, lifetime(0, 1)), (desc, lifetime(2, 3))];

        let (assignments, slot_count) = plan_assignments(&items);
        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(slot_count, 1);
    }

    #[test]
    fn test_overlapping_lifetimes_get_separate_slots() {
        let desc = "rgba8-512";
        let items = vec![(desc, lifetime(0, 2)), (desc, lifetime(1, 3))];

        let (assignments, slot_count) = plan_assignments(&items);
        assert_ne!(assignments[0], assignments[1]);
        assert_eq!(slot_count, 2);
    }

    #[test]
    fn test_different_descs_never_alias() {
        let items = vec![("rgba8-512", lifetime(0, 1)), ("d32-1024", lifetime(2, 3))];

        let (assignments, slot_count) = plan_assignments(&items);
        assert_ne!(assignments[0], assignments[1]);
        assert_eq!(slot_count, 2);
    }

    /// 三个接续的区间折叠到同一个 slot
    #[test]
    fn test_chained_reuse() {
        let desc = "rgba8-512";
        let items = vec![(desc, lifetime(0, 1)), (desc, lifetime(2, 2)), (desc, lifetime(3, 5))];

        let (assignments, slot_count) = plan_assignments(&items);
        assert_eq!(slot_count, 1);
        assert!(assignments.iter().all(|slot| *slot == 0));
    }
}
