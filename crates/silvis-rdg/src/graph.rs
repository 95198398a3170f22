//! RdgBuilder：render graph 的唯一拥有者
//!
//! 录制接口、编译入口和执行入口都在这一个类型上。
//! builder 是单帧对象：`execute` 消费 self，录制状态不会跨帧泄漏。

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use silvis_gfx::commands::command_buffer::GfxCommandBuffer;
use silvis_gfx::commands::pool_manager::GfxCommandPoolManager;
use silvis_gfx::commands::queue::GfxQueue;
use silvis_gfx::foundation::device::GfxDevice;
use silvis_gfx::foundation::mem_allocator::GfxMemAllocator;
use silvis_gfx::resources::buffer::GfxBuffer;
use silvis_gfx::resources::image::GfxImage2D;
use silvis_gfx::swapchain::swapchain::GfxSwapchain;

use crate::accessor::RdgResourceAccessor;
use crate::barrier::RdgBarrier;
use crate::compile::{
    analyze_resource_lifetimes, build_compiled_passes, compute_barriers, cull_unused_passes,
    validate_resource_states, RdgCompiledPass,
};
use crate::error::{RdgPassResult, RdgResult};
use crate::handle::{RdgBufferHandle, RdgTextureHandle};
use crate::pass::{RdgPass, RdgPassCallback, RdgPassRef};
use crate::pool::RdgTransientPool;
use crate::registry::RdgResourceRegistry;
use crate::resource::{RdgBufferDesc, RdgBufferRecord, RdgTextureDesc, RdgTextureRecord};

pub struct RdgBuilder {
    pub(crate) device: Rc<GfxDevice>,
    pub(crate) graphics_queue: Rc<GfxQueue>,
    pub(crate) cmd_manager: Rc<GfxCommandPoolManager>,
    pub(crate) allocator: Rc<GfxMemAllocator>,
    pub(crate) pool: Rc<RefCell<RdgTransientPool>>,

    pub(crate) registry: RdgResourceRegistry,
    pub(crate) passes: Vec<RdgPass>,
    pub(crate) compiled: Vec<RdgCompiledPass>,
    /// 最后一个 Pass 之后发射的 present 转换
    pub(crate) final_barriers: Vec<RdgBarrier>,
    /// 本帧瞬态 backing，binding 中的 slot 指向这里
    pub(crate) frame_images: Vec<GfxImage2D>,
    pub(crate) frame_buffers: Vec<GfxBuffer>,

    compiled_flag: bool,
}

// 创建
impl RdgBuilder {
    pub fn new(
        device: Rc<GfxDevice>,
        graphics_queue: Rc<GfxQueue>,
        cmd_manager: Rc<GfxCommandPoolManager>,
        allocator: Rc<GfxMemAllocator>,
        pool: Rc<RefCell<RdgTransientPool>>,
    ) -> Self {
        Self {
            device,
            graphics_queue,
            cmd_manager,
            allocator,
            pool,
            registry: RdgResourceRegistry::new(),
            passes: Vec::new(),
            compiled: Vec::new(),
            final_barriers: Vec::new(),
            frame_images: Vec::new(),
            frame_buffers: Vec::new(),
            compiled_flag: false,
        }
    }
}

// 瞬态资源声明
impl RdgBuilder {
    /// 声明一个瞬态 texture，非法的 desc 是编程错误
    pub fn create_transient_texture(&mut self, desc: RdgTextureDesc) -> RdgTextureHandle {
        assert!(desc.is_valid(), "Invalid transient texture desc: '{}'", desc.name);
        self.registry.register_texture(RdgTextureRecord::new_transient(desc))
    }

    /// 声明一个瞬态 buffer
    pub fn create_transient_buffer(&mut self, desc: RdgBufferDesc) -> RdgBufferHandle {
        assert!(desc.is_valid(), "Invalid transient buffer desc: '{}'", desc.name);
        self.registry.register_buffer(RdgBufferRecord::new_transient(desc))
    }

    /// 2D texture 的便利声明
    pub fn create_texture_2d(
        &mut self,
        name: impl Into<String>,
        format: vk::Format,
        width: u32,
        height: u32,
        usage: vk::ImageUsageFlags,
    ) -> RdgTextureHandle {
        self.create_transient_texture(RdgTextureDesc::new_2d(name, format, width, height, usage))
    }

    /// RGBA8 color buffer 的便利声明
    pub fn create_color_buffer(&mut self, name: impl Into<String>, width: u32, height: u32) -> RdgTextureHandle {
        self.create_texture_2d(
            name,
            vk::Format::R8G8B8A8_UNORM,
            width,
            height,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )
    }

    /// D32 depth buffer 的便利声明
    pub fn create_depth_buffer(&mut self, name: impl Into<String>, width: u32, height: u32) -> RdgTextureHandle {
        self.create_texture_2d(
            name,
            vk::Format::D32_SFLOAT,
            width,
            height,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )
    }
}

// 外部资源导入
impl RdgBuilder {
    /// 导入外部 texture
    ///
    /// graph 只拷贝裸 handle，调用方保证 backing 比当前帧活得久，
    /// graph 绝不释放它
    pub fn import_external_texture(
        &mut self,
        image: &GfxImage2D,
        name: impl Into<String>,
        current_layout: vk::ImageLayout,
    ) -> RdgTextureHandle {
        let gfx_desc = image.desc();
        let desc = RdgTextureDesc {
            name: name.into(),
            format: gfx_desc.format,
            extent: gfx_desc.extent,
            usage: gfx_desc.usage,
            mip_levels: gfx_desc.mip_levels,
            array_layers: gfx_desc.array_layers,
            samples: gfx_desc.samples,
            tiling: gfx_desc.tiling,
        };
        self.registry.register_texture(RdgTextureRecord::new_external(
            desc,
            image.handle(),
            image.view(),
            current_layout,
        ))
    }

    /// 导入外部 buffer
    pub fn import_external_buffer(&mut self, buffer: &GfxBuffer, name: impl Into<String>) -> RdgBufferHandle {
        let desc = RdgBufferDesc::new(name, buffer.size(), buffer.usage());
        self.registry.register_buffer(RdgBufferRecord::new_external(desc, buffer.handle()))
    }

    /// 导入 swapchain image
    ///
    /// layout 从 Undefined 开始；编译器会在首次使用前转换到
    /// COLOR_ATTACHMENT_OPTIMAL，在最后一次使用后转换到 PRESENT_SRC_KHR
    pub fn import_swapchain_image(&mut self, swapchain: &GfxSwapchain, image_index: u32) -> RdgTextureHandle {
        let extent = swapchain.extent();
        let desc = RdgTextureDesc::new_2d(
            format!("swapchain-image-{image_index}"),
            swapchain.format(),
            extent.width,
            extent.height,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        );

        let mut record = RdgTextureRecord::new_external(
            desc,
            swapchain.image(image_index),
            swapchain.image_view(image_index),
            vk::ImageLayout::UNDEFINED,
        );
        record.swapchain_image_index = Some(image_index);
        self.registry.register_texture(record)
    }
}

// Pass 录制
impl RdgBuilder {
    /// 添加一个 Pass（简单回调）
    ///
    /// 返回的 [`RdgPassRef`] 用于链式声明资源依赖
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl FnOnce(&GfxCommandBuffer) -> RdgPassResult + 'static,
    ) -> RdgPassRef<'_> {
        self.push_pass(RdgPass::new(name, Some(RdgPassCallback::Plain(Box::new(callback)))))
    }

    /// 添加一个 Pass（带资源访问器的回调）
    pub fn add_pass_with_accessor(
        &mut self,
        name: impl Into<String>,
        callback: impl FnOnce(&GfxCommandBuffer, &RdgResourceAccessor) -> RdgPassResult + 'static,
    ) -> RdgPassRef<'_> {
        self.push_pass(RdgPass::new(name, Some(RdgPassCallback::Accessor(Box::new(callback)))))
    }

    fn push_pass(&mut self, pass: RdgPass) -> RdgPassRef<'_> {
        assert!(!self.compiled_flag, "Cannot add passes after compile");
        self.passes.push(pass);

        let pass = self.passes.last_mut().unwrap();
        RdgPassRef {
            pass,
            registry: &self.registry,
        }
    }
}

// 查询与调试
impl RdgBuilder {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn transient_resource_count(&self) -> usize {
        self.registry.transient_count()
    }

    /// 输出编译后的执行计划，调试用
    pub fn print_execution_plan(&self) {
        log::info!("=== execution plan ===");
        for compiled_pass in &self.compiled {
            let pass = &self.passes[compiled_pass.pass_index];
            log::info!(
                "[{}] {} ({}) - {} barriers",
                compiled_pass.pass_index,
                pass.name,
                if compiled_pass.active { "active" } else { "culled" },
                compiled_pass.barriers.len()
            );
        }
        log::info!("{} trailing present transitions", self.final_barriers.len());
    }
}

// 编译与执行
impl RdgBuilder {
    /// 编译：五个阶段依次运行，之后录制接口不可再使用
    pub(crate) fn compile(&mut self) {
        assert!(!self.compiled_flag, "RdgBuilder::compile: already compiled");

        log::debug!(
            "compiling render graph: {} passes, {} transient resources",
            self.passes.len(),
            self.registry.transient_count()
        );

        self.compiled = build_compiled_passes(&self.passes);
        cull_unused_passes(&self.passes, &self.registry, &mut self.compiled);
        analyze_resource_lifetimes(&self.passes, &mut self.registry, &self.compiled);
        validate_resource_states(&self.passes, &self.registry, &self.compiled);
        self.final_barriers = compute_barriers(&self.passes, &mut self.registry, &mut self.compiled);

        self.compiled_flag = true;

        let active = self.compiled.iter().filter(|p| p.active).count();
        log::debug!("render graph compiled: {}/{} passes active", active, self.compiled.len());
    }

    /// 编译并提交当前帧
    ///
    /// 消费 self：builder 是单帧对象。
    /// 提交之后 CPU 不等待；需要同步的调用方自行等待 sync 里的 fence
    pub fn execute(mut self, sync: Option<&crate::sync::RdgSyncBundle>) -> RdgResult<()> {
        self.compile();
        self.allocate_transients()?;
        let result = self.record_and_submit(sync);
        // 帧末归还 backing；提交失败的帧没有进入 GPU，归还同样安全
        self.release_transients();
        result
    }
}
