//! 执行阶段
//!
//! 分配瞬态 backing、租借 command buffer、逐 Pass 发射 barrier、
//! 为图形 Pass 打开 dynamic rendering 作用域、调用回调，最后一次提交。
//! 回调失败只记日志不中断：坏掉的 Pass 不会毒化整帧。
//! 提交后 CPU 不做任何等待。

use ash::vk;
use itertools::Itertools;
use silvis_gfx::basic::color::LabelColor;
use silvis_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use silvis_gfx::commands::command_buffer::GfxCommandBuffer;
use silvis_gfx::commands::submit_info::GfxSubmitInfo;
use silvis_gfx::resources::buffer::GfxBuffer;
use silvis_gfx::resources::image::{GfxImage2D, GfxImageDesc};

use crate::barrier::RdgBarrier;
use crate::error::{RdgError, RdgResult};
use crate::graph::RdgBuilder;
use crate::pass::{RdgPass, RdgPassCallback, RdgPassKind};
use crate::pool::plan_assignments;
use crate::registry::RdgResourceRegistry;
use crate::resource::{RdgBufferBinding, RdgTextureBinding};
use crate::sync::RdgSyncBundle;

// 瞬态资源分配
impl RdgBuilder {
    /// 为所有被使用的瞬态资源分配 backing
    ///
    /// 帧内按生命周期区间复用，帧间通过 pool 复用；
    /// `lifetime.used == false` 的资源不分配
    pub(crate) fn allocate_transients(&mut self) -> RdgResult<()> {
        self.allocate_transient_textures()?;
        self.allocate_transient_buffers()
    }

    fn allocate_transient_textures(&mut self) -> RdgResult<()> {
        let mut items: Vec<_> = self
            .registry
            .sorted_transient_textures()
            .into_iter()
            .filter_map(|handle| {
                let record = self.registry.texture(handle);
                record.lifetime.used.then(|| (handle, record.desc.as_gfx_desc(), record.lifetime))
            })
            .collect_vec();
        items.sort_by_key(|(handle, _, lifetime)| (lifetime.first_pass, handle.id));

        let plan_input: Vec<(GfxImageDesc, _)> =
            items.iter().map(|(_, desc, lifetime)| (desc.clone(), *lifetime)).collect();
        let (assignments, slot_count) = plan_assignments(&plan_input);

        let mut slot_images: Vec<Option<GfxImage2D>> = Vec::new();
        slot_images.resize_with(slot_count, || None);

        let mut failure = None;
        {
            let mut pool = self.pool.borrow_mut();
            for (i, slot) in assignments.iter().enumerate() {
                let (handle, gfx_desc, _) = &items[i];

                if slot_images[*slot].is_none() {
                    let name = self.registry.texture(*handle).desc.name.clone();
                    let image = match pool.acquire_image(gfx_desc) {
                        Some(image) => {
                            log::debug!("transient texture '{}': pool hit", name);
                            image
                        }
                        None => {
                            match GfxImage2D::new(self.device.clone(), self.allocator.clone(), gfx_desc.clone(), &name)
                            {
                                Ok(image) => {
                                    log::debug!("transient texture '{}': new backing", name);
                                    image
                                }
                                Err(result) => {
                                    failure = Some(RdgError::AllocationFailed { name, result });
                                    break;
                                }
                            }
                        }
                    };
                    slot_images[*slot] = Some(image);
                }
                self.registry.texture_mut(*handle).binding = RdgTextureBinding::Transient { slot: *slot };
            }

            if let Some(error) = failure {
                // 半路失败：已拿到的 backing 放回 pool，让调用方丢帧后还能复用
                for image in slot_images.into_iter().flatten() {
                    pool.release_image(image);
                }
                return Err(error);
            }
        }

        self.frame_images = slot_images.into_iter().map(|image| image.unwrap()).collect();
        Ok(())
    }

    fn allocate_transient_buffers(&mut self) -> RdgResult<()> {
        let mut items: Vec<_> = self
            .registry
            .sorted_transient_buffers()
            .into_iter()
            .filter_map(|handle| {
                let record = self.registry.buffer(handle);
                record.lifetime.used.then(|| (handle, record.desc.size, record.desc.usage, record.lifetime))
            })
            .collect_vec();
        items.sort_by_key(|(handle, _, _, lifetime)| (lifetime.first_pass, handle.id));

        let plan_input: Vec<((vk::DeviceSize, vk::BufferUsageFlags), _)> =
            items.iter().map(|(_, size, usage, lifetime)| ((*size, *usage), *lifetime)).collect();
        let (assignments, slot_count) = plan_assignments(&plan_input);

        let mut slot_buffers: Vec<Option<GfxBuffer>> = Vec::new();
        slot_buffers.resize_with(slot_count, || None);

        let mut failure = None;
        {
            let mut pool = self.pool.borrow_mut();
            for (i, slot) in assignments.iter().enumerate() {
                let (handle, size, usage, _) = &items[i];

                if slot_buffers[*slot].is_none() {
                    let name = self.registry.buffer(*handle).desc.name.clone();
                    let buffer = match pool.acquire_buffer(*size, *usage) {
                        Some(buffer) => {
                            log::debug!("transient buffer '{}': pool hit", name);
                            buffer
                        }
                        None => match GfxBuffer::new(self.device.clone(), self.allocator.clone(), *size, *usage, &name)
                        {
                            Ok(buffer) => buffer,
                            Err(result) => {
                                failure = Some(RdgError::AllocationFailed { name, result });
                                break;
                            }
                        },
                    };
                    slot_buffers[*slot] = Some(buffer);
                }
                self.registry.buffer_mut(*handle).binding = RdgBufferBinding::Transient { slot: *slot };
            }

            if let Some(error) = failure {
                for buffer in slot_buffers.into_iter().flatten() {
                    pool.release_buffer(buffer);
                }
                return Err(error);
            }
        }

        self.frame_buffers = slot_buffers.into_iter().map(|buffer| buffer.unwrap()).collect();
        Ok(())
    }

    /// 帧末把瞬态 backing 归还 pool 供下一帧复用
    pub(crate) fn release_transients(&mut self) {
        let mut pool = self.pool.borrow_mut();
        for image in self.frame_images.drain(..) {
            pool.release_image(image);
        }
        for buffer in self.frame_buffers.drain(..) {
            pool.release_buffer(buffer);
        }
    }
}

// 录制与提交
impl RdgBuilder {
    pub(crate) fn record_and_submit(&mut self, sync: Option<&RdgSyncBundle>) -> RdgResult<()> {
        let cmd_manager = self.cmd_manager.clone();
        let lease = cmd_manager.alloc("rdg-frame");
        lease.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "rdg-frame");

        let RdgBuilder {
            device,
            registry,
            passes,
            compiled,
            final_barriers,
            frame_images,
            frame_buffers,
            pool,
            ..
        } = self;

        for compiled_pass in compiled.iter().filter(|p| p.active) {
            let pass_index = compiled_pass.pass_index;

            // (a) 本 Pass 的所有 barrier 折叠为一次调用
            let (image_barriers, buffer_barriers) =
                lower_barriers(registry, frame_images, frame_buffers, &compiled_pass.barriers);
            lease.pipeline_barrier2(vk::DependencyFlags::empty(), &image_barriers, &buffer_barriers);

            lease.begin_label(&passes[pass_index].name, LabelColor::COLOR_PASS);

            // (b) 图形 Pass 打开 dynamic rendering 作用域
            let is_graphics = passes[pass_index].kind() == RdgPassKind::Graphics;
            let rendering_opened =
                is_graphics && begin_graphics_pass(lease.cmd(), &passes[pass_index], registry, frame_images);

            // (c) 调用回调；失败只记日志，继续后续 Pass
            let callback = passes[pass_index].callback.take();
            let callback_result = match callback {
                Some(RdgPassCallback::Plain(callback)) => callback(lease.cmd()),
                Some(RdgPassCallback::Accessor(callback)) => {
                    let accessor = crate::accessor::RdgResourceAccessor {
                        device: &**device,
                        registry: &*registry,
                        frame_images: &*frame_images,
                        frame_buffers: &*frame_buffers,
                        pool: &**pool,
                    };
                    callback(lease.cmd(), &accessor)
                }
                None => Ok(()),
            };
            if let Err(error) = callback_result {
                log::error!("Pass '{}' failed: {}", passes[pass_index].name, error);
            }

            // (d) 出错与否都要关闭 rendering 作用域
            if rendering_opened {
                lease.end_rendering();
            }
            lease.end_label();
        }

        // swapchain image 的 present 转换
        let (image_barriers, buffer_barriers) = lower_barriers(registry, frame_images, frame_buffers, final_barriers);
        lease.pipeline_barrier2(vk::DependencyFlags::empty(), &image_barriers, &buffer_barriers);

        lease.end();

        // 单次 sync2 提交；之后不做任何 CPU 等待
        let mut submit_info = GfxSubmitInfo::new(std::slice::from_ref(lease.cmd()));
        let mut fence = vk::Fence::null();
        if let Some(sync) = sync {
            for (semaphore, stage) in &sync.waits {
                submit_info = submit_info.wait(*semaphore, *stage, None);
            }
            for semaphore in &sync.signals {
                submit_info = submit_info.signal(*semaphore, vk::PipelineStageFlags2::ALL_COMMANDS, None);
            }
            if let Some(sync_fence) = sync.fence {
                fence = sync_fence;
            }
        }

        self.graphics_queue
            .submit(vec![submit_info], fence)
            .map_err(|result| RdgError::SubmitFailed { result })?;

        Ok(())
    }
}

/// barrier 记录落到 vk 结构，顺带解析物理 handle
fn lower_barriers(
    registry: &RdgResourceRegistry,
    frame_images: &[GfxImage2D],
    frame_buffers: &[GfxBuffer],
    barriers: &[RdgBarrier],
) -> (Vec<GfxImageBarrier>, Vec<GfxBufferBarrier>) {
    let mut image_barriers = Vec::new();
    let mut buffer_barriers = Vec::new();

    for barrier in barriers {
        match barrier {
            RdgBarrier::Image(image_barrier) => {
                let image = match registry.texture(image_barrier.handle).binding {
                    RdgTextureBinding::Transient { slot } => frame_images[slot].handle(),
                    RdgTextureBinding::External { image, .. } => image,
                    RdgTextureBinding::None => continue,
                };
                image_barriers.push(
                    GfxImageBarrier::new()
                        .image(image)
                        .layout_transfer(image_barrier.old_layout, image_barrier.new_layout)
                        .src_mask(image_barrier.src_stages, image_barrier.src_access)
                        .dst_mask(image_barrier.dst_stages, image_barrier.dst_access)
                        .subresource_range(image_barrier.subresource_range),
                );
            }
            RdgBarrier::Buffer(buffer_barrier) => {
                let buffer = match registry.buffer(buffer_barrier.handle).binding {
                    RdgBufferBinding::Transient { slot } => frame_buffers[slot].handle(),
                    RdgBufferBinding::External { buffer } => buffer,
                    RdgBufferBinding::None => continue,
                };
                buffer_barriers.push(
                    GfxBufferBarrier::new()
                        .buffer(buffer, 0, vk::WHOLE_SIZE)
                        .src_mask(buffer_barrier.src_stages, buffer_barrier.src_access)
                        .dst_mask(buffer_barrier.dst_stages, buffer_barrier.dst_access),
                );
            }
        }
    }

    (image_barriers, buffer_barriers)
}

fn resolve_texture_view(
    registry: &RdgResourceRegistry,
    frame_images: &[GfxImage2D],
    handle: crate::handle::RdgTextureHandle,
) -> Option<vk::ImageView> {
    match registry.texture(handle).binding {
        RdgTextureBinding::Transient { slot } => Some(frame_images[slot].view()),
        RdgTextureBinding::External { view, .. } => Some(view),
        RdgTextureBinding::None => None,
    }
}

/// 打开 dynamic rendering 作用域
///
/// 渲染区域取第一个 color attachment 的尺寸，没有 color 时取 depth 的尺寸
///
/// # return
/// 是否真的打开了作用域（区域为空时不打开）
fn begin_graphics_pass(
    cmd: &GfxCommandBuffer,
    pass: &RdgPass,
    registry: &RdgResourceRegistry,
    frame_images: &[GfxImage2D],
) -> bool {
    let mut color_attachments = Vec::with_capacity(pass.color_attachments.len());
    for attachment in &pass.color_attachments {
        let Some(view) = resolve_texture_view(registry, frame_images, attachment.handle) else {
            log::warn!("Pass '{}': color attachment has no physical binding", pass.name);
            continue;
        };
        color_attachments.push(
            vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(attachment.load_op)
                .store_op(attachment.store_op)
                .clear_value(vk::ClearValue {
                    color: attachment.clear_value,
                }),
        );
    }

    let mut depth_attachment = None;
    let mut stencil_attachment = None;
    if let Some(depth) = &pass.depth_attachment {
        if let Some(view) = resolve_texture_view(registry, frame_images, depth.handle) {
            depth_attachment = Some(
                vk::RenderingAttachmentInfo::default()
                    .image_view(view)
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(depth.depth_load_op)
                    .store_op(depth.depth_store_op)
                    .clear_value(vk::ClearValue {
                        depth_stencil: depth.clear_value,
                    }),
            );

            let format = registry.texture(depth.handle).desc.format;
            let has_stencil = GfxImageDesc::infer_aspect(format).contains(vk::ImageAspectFlags::STENCIL);
            if has_stencil {
                stencil_attachment = Some(
                    vk::RenderingAttachmentInfo::default()
                        .image_view(view)
                        .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                        .load_op(depth.stencil_load_op)
                        .store_op(depth.stencil_store_op)
                        .clear_value(vk::ClearValue {
                            depth_stencil: depth.clear_value,
                        }),
                );
            }
        }
    }

    // 渲染区域
    let extent = pass
        .color_attachments
        .first()
        .map(|a| a.handle)
        .or_else(|| pass.depth_attachment.as_ref().map(|a| a.handle))
        .map(|handle| registry.texture(handle).desc.extent)
        .map(|extent| vk::Extent2D {
            width: extent.width,
            height: extent.height,
        })
        .unwrap_or_default();

    if extent.width == 0 || extent.height == 0 {
        log::warn!("Pass '{}': empty render area, skipping rendering scope", pass.name);
        return false;
    }

    let mut rendering_info = vk::RenderingInfo::default()
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
        .layer_count(1)
        .color_attachments(&color_attachments);
    if let Some(depth) = &depth_attachment {
        rendering_info = rendering_info.depth_attachment(depth);
    }
    if let Some(stencil) = &stencil_attachment {
        rendering_info = rendering_info.stencil_attachment(stencil);
    }

    cmd.begin_rendering(&rendering_info);
    true
}
