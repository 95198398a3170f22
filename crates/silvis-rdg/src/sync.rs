//! 帧同步
//!
//! [`RdgSyncBundle`] 把一次提交需要的 wait/signal semaphore 和 fence 打包；
//! [`RdgFrameSyncManager`] 管理 N 个 frames-in-flight 槽位的同步原语。
//! CPU 对 GPU 的领先量由 `advance` 的 fence 等待限制，
//! 这是整个核心里唯一的阻塞点。

use std::rc::Rc;

use ash::vk;
use silvis_gfx::commands::fence::GfxFence;
use silvis_gfx::commands::semaphore::GfxSemaphore;
use silvis_gfx::foundation::device::GfxDevice;

/// 一次 queue 提交的同步信息
#[derive(Default, Clone)]
pub struct RdgSyncBundle {
    /// 执行前等待的 semaphore 以及对应的 wait stage
    pub(crate) waits: Vec<(vk::Semaphore, vk::PipelineStageFlags2)>,
    /// 执行完成后触发的 semaphore
    pub(crate) signals: Vec<vk::Semaphore>,
    /// 执行完成后触发的 fence，供 CPU 端等待
    pub(crate) fence: Option<vk::Fence>,
}

impl RdgSyncBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加等待的 semaphore；默认 stage 为 COLOR_ATTACHMENT_OUTPUT，适用于 swapchain
    pub fn add_wait(&mut self, semaphore: vk::Semaphore) {
        self.waits.push((semaphore, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT));
    }

    pub fn add_wait_with_stage(&mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2) {
        self.waits.push((semaphore, stage));
    }

    pub fn add_signal(&mut self, semaphore: vk::Semaphore) {
        self.signals.push(semaphore);
    }

    pub fn set_fence(&mut self, fence: vk::Fence) {
        self.fence = Some(fence);
    }

    pub fn clear(&mut self) {
        self.waits.clear();
        self.signals.clear();
        self.fence = None;
    }

    pub fn has_sync_primitives(&self) -> bool {
        !self.waits.is_empty() || !self.signals.is_empty() || self.fence.is_some()
    }

    #[inline]
    pub fn fence(&self) -> Option<vk::Fence> {
        self.fence
    }
}

/// 单个 frames-in-flight 槽位
struct RdgFrameSlot {
    fence: GfxFence,
    image_available: GfxSemaphore,
    render_finished: GfxSemaphore,
    bundle: RdgSyncBundle,
}

/// 帧同步管理器
///
/// 为 N 个槽位各持有一个 in-flight fence 和一对
/// image-available / render-finished 二元 semaphore。
/// fence 创建时即 signaled，第一轮不会阻塞。
pub struct RdgFrameSyncManager {
    slots: Vec<RdgFrameSlot>,
    current: usize,
}

// 创建与销毁
impl RdgFrameSyncManager {
    pub fn new(device: Rc<GfxDevice>, frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be > 0");

        let slots = (0..frames_in_flight)
            .map(|i| {
                let fence = GfxFence::new(device.clone(), true, &format!("frame-fence-{i}"));
                let image_available = GfxSemaphore::new(device.clone(), &format!("image-available-{i}"));
                let render_finished = GfxSemaphore::new(device.clone(), &format!("render-finished-{i}"));

                let mut bundle = RdgSyncBundle::new();
                bundle.set_fence(fence.handle());

                RdgFrameSlot {
                    fence,
                    image_available,
                    render_finished,
                    bundle,
                }
            })
            .collect();

        Self { slots, current: 0 }
    }

    /// 等待全部槽位后销毁所有同步原语
    pub fn destroy(mut self) {
        self.wait_all();
        for slot in self.slots.drain(..) {
            slot.fence.destroy();
            slot.image_available.destroy();
            slot.render_finished.destroy();
        }
    }
}

// getters
impl RdgFrameSyncManager {
    #[inline]
    pub fn current(&self) -> &RdgSyncBundle {
        &self.slots[self.current].bundle
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut RdgSyncBundle {
        &mut self.slots[self.current].bundle
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn current_fence(&self) -> &GfxFence {
        &self.slots[self.current].fence
    }

    /// 指定槽位的 (image_available, render_finished) semaphore 对
    pub fn swapchain_semaphores(&self, slot_index: usize) -> (vk::Semaphore, vk::Semaphore) {
        let slot = &self.slots[slot_index];
        (slot.image_available.handle(), slot.render_finished.handle())
    }
}

// tools
impl RdgFrameSyncManager {
    /// 前进到下一帧
    ///
    /// 等待下一个槽位的 fence 并重置，保证该槽位的资源可以安全复用；
    /// 清空槽位上旧的 wait/signal 信息，fence 绑定保留
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();

        let slot = &mut self.slots[self.current];
        slot.fence.wait();
        slot.fence.reset();

        let fence = slot.fence.handle();
        slot.bundle.clear();
        slot.bundle.set_fence(fence);
    }

    /// 等待所有槽位的 fence，用于关闭前的清理
    pub fn wait_all(&self) {
        for slot in &self.slots {
            slot.fence.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_bookkeeping() {
        let mut bundle = RdgSyncBundle::new();
        assert!(!bundle.has_sync_primitives());

        bundle.add_wait(vk::Semaphore::null());
        assert_eq!(bundle.waits[0].1, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);

        bundle.add_wait_with_stage(vk::Semaphore::null(), vk::PipelineStageFlags2::COMPUTE_SHADER);
        bundle.add_signal(vk::Semaphore::null());
        bundle.set_fence(vk::Fence::null());
        assert!(bundle.has_sync_primitives());
        assert_eq!(bundle.waits.len(), 2);
        assert_eq!(bundle.signals.len(), 1);

        bundle.clear();
        assert!(!bundle.has_sync_primitives());
        assert!(bundle.fence().is_none());
    }
}
