use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Mutex;
use std::thread::ThreadId;

use ash::vk;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::commands::queue::GfxQueue;
use crate::commands::submit_info::GfxSubmitInfo;
use crate::foundation::device::GfxDevice;

/// 每个线程的 command pool 及其空闲缓冲池
struct GfxThreadCommandPool {
    pool: vk::CommandPool,
    free_primary: Vec<vk::CommandBuffer>,
    free_secondary: Vec<vk::CommandBuffer>,
    allocated_count: usize,
}

/// 跨线程的 command pool 管理器
///
/// 内部的 map 由 mutex 保护，但每个线程的 pool 只能被其所属线程使用：
/// 谁分配的 command buffer，谁负责录制和归还。
pub struct GfxCommandPoolManager {
    device: Rc<GfxDevice>,
    queue_family_index: u32,
    thread_pools: Mutex<HashMap<ThreadId, GfxThreadCommandPool>>,
}

// 创建与销毁
impl GfxCommandPoolManager {
    pub fn new(device: Rc<GfxDevice>, queue_family_index: u32) -> Self {
        Self {
            device,
            queue_family_index,
            thread_pools: Mutex::new(HashMap::new()),
        }
    }

    /// 销毁所有线程的 command pool
    ///
    /// 调用方需要保证此时没有 lease 存活，GPU 上也没有在执行的 command buffer
    pub fn destroy(self) {
        let mut pools = self.thread_pools.lock().unwrap();
        for (_, thread_pool) in pools.drain() {
            unsafe {
                self.device.destroy_command_pool(thread_pool.pool, None);
            }
        }
        log::info!("Destroying GfxCommandPoolManager");
    }
}

// 分配与回收
impl GfxCommandPoolManager {
    /// 分配一个 primary command buffer
    ///
    /// 返回 move-only 的 lease，drop 时自动回收到当前线程的缓冲池
    pub fn alloc(&self, debug_name: &str) -> GfxCommandBufferLease<'_> {
        self.alloc_level(vk::CommandBufferLevel::PRIMARY, debug_name)
    }

    pub fn alloc_level(&self, level: vk::CommandBufferLevel, debug_name: &str) -> GfxCommandBufferLease<'_> {
        let thread_id = std::thread::current().id();
        let (vk_handle, pool_handle) = {
            let mut pools = self.thread_pools.lock().unwrap();
            let thread_pool = pools.entry(thread_id).or_insert_with(|| self.create_thread_pool());

            let free_list = match level {
                vk::CommandBufferLevel::SECONDARY => &mut thread_pool.free_secondary,
                _ => &mut thread_pool.free_primary,
            };
            let handle = match free_list.pop() {
                Some(handle) => handle,
                None => {
                    let info = vk::CommandBufferAllocateInfo::default()
                        .command_pool(thread_pool.pool)
                        .level(level)
                        .command_buffer_count(1);
                    thread_pool.allocated_count += 1;
                    unsafe { self.device.allocate_command_buffers(&info).unwrap()[0] }
                }
            };
            (handle, thread_pool.pool)
        };

        self.device.set_object_debug_name(vk_handle, debug_name);

        GfxCommandBufferLease {
            cmd: GfxCommandBuffer::from_raw(self.device.clone(), vk_handle, pool_handle),
            level,
            thread_id,
            manager: self,
        }
    }

    fn create_thread_pool(&self) -> GfxThreadCommandPool {
        let pool = unsafe {
            self.device
                .create_command_pool(
                    &vk::CommandPoolCreateInfo::default()
                        .queue_family_index(self.queue_family_index)
                        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                    None,
                )
                .unwrap()
        };
        self.device.set_object_debug_name(pool, format!("thread-pool-{:?}", std::thread::current().id()));

        GfxThreadCommandPool {
            pool,
            free_primary: Vec::new(),
            free_secondary: Vec::new(),
            allocated_count: 0,
        }
    }

    /// lease drop 时回收，放回来源线程的空闲列表
    fn recycle(&self, thread_id: ThreadId, vk_handle: vk::CommandBuffer, level: vk::CommandBufferLevel) {
        let mut pools = self.thread_pools.lock().unwrap();
        if let Some(thread_pool) = pools.get_mut(&thread_id) {
            match level {
                vk::CommandBufferLevel::SECONDARY => thread_pool.free_secondary.push(vk_handle),
                _ => thread_pool.free_primary.push(vk_handle),
            }
        }
    }
}

// 提交
impl GfxCommandPoolManager {
    /// 一次 sync2 提交
    pub fn submit(
        &self,
        queue: &GfxQueue,
        cmds: &[GfxCommandBuffer],
        waits: &[(vk::Semaphore, vk::PipelineStageFlags2)],
        signals: &[vk::Semaphore],
        fence: vk::Fence,
    ) -> Result<(), vk::Result> {
        let mut submit_info = GfxSubmitInfo::new(cmds);
        for (semaphore, stage) in waits {
            submit_info = submit_info.wait(*semaphore, *stage, None);
        }
        for semaphore in signals {
            submit_info = submit_info.signal(*semaphore, vk::PipelineStageFlags2::ALL_COMMANDS, None);
        }

        queue.submit(vec![submit_info], fence)
    }

    /// 立即执行某个 command，并同步等待执行结果
    ///
    /// 用于上传等一次性操作，graph 的 execute 不走这里
    pub fn execute_onetime<F, R>(&self, queue: &GfxQueue, func: F, name: impl AsRef<str>) -> R
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let lease = self.alloc(&format!("one-time-{}", name.as_ref()));

        lease.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref());
        let result = func(&lease);
        lease.end();

        queue.submit(vec![GfxSubmitInfo::new(std::slice::from_ref(&lease.cmd))], vk::Fence::null()).unwrap();
        queue.wait_idle();

        result
    }
}

// 统计
impl GfxCommandPoolManager {
    /// (线程 pool 数量, 已分配的 command buffer 总数)
    pub fn stats(&self) -> (usize, usize) {
        let pools = self.thread_pools.lock().unwrap();
        let allocated = pools.values().map(|p| p.allocated_count).sum();
        (pools.len(), allocated)
    }
}

/// command buffer 的作用域租借
///
/// move-only；drop 时在所有退出路径上都会把 buffer 归还给所属线程的池
pub struct GfxCommandBufferLease<'a> {
    cmd: GfxCommandBuffer,
    level: vk::CommandBufferLevel,
    thread_id: ThreadId,
    manager: &'a GfxCommandPoolManager,
}

impl GfxCommandBufferLease<'_> {
    #[inline]
    pub fn cmd(&self) -> &GfxCommandBuffer {
        &self.cmd
    }
}

impl Deref for GfxCommandBufferLease<'_> {
    type Target = GfxCommandBuffer;
    fn deref(&self) -> &Self::Target {
        &self.cmd
    }
}

impl Drop for GfxCommandBufferLease<'_> {
    fn drop(&mut self) {
        self.manager.recycle(self.thread_id, self.cmd.vk_handle(), self.level);
    }
}
