//! 编译阶段
//!
//! 五个有序阶段，对 graph 状态做单调修改：
//! 1. 把录制的 Pass 包装为 CompiledPass（声明顺序即拓扑基准）；
//! 2. 剔除对外部资源没有贡献的 Pass；
//! 3. 分析资源生命周期区间；
//! 4. 校验资源状态（读未写入的瞬态资源只警告）；
//! 5. 合成 barrier。
//!
//! 所有阶段只操作声明数据，不触碰 Vulkan 设备，物理分配在执行阶段进行。

use std::collections::{HashMap, HashSet};

use ash::vk;

use crate::barrier::{full_subresource_range, RdgBarrier, RdgBufferBarrier, RdgImageBarrier};
use crate::pass::RdgPass;
use crate::registry::RdgResourceRegistry;

/// 编译后的 Pass：原始 Pass 的下标、活跃标记和待发射的 barrier 列表
pub(crate) struct RdgCompiledPass {
    pub pass_index: usize,
    pub active: bool,
    pub barriers: Vec<RdgBarrier>,
}

/// 阶段 1：按声明顺序建立 CompiledPass
///
/// 读写声明本身就是依赖边，不物化显式的边表
pub(crate) fn build_compiled_passes(passes: &[RdgPass]) -> Vec<RdgCompiledPass> {
    passes
        .iter()
        .enumerate()
        .map(|(pass_index, _)| RdgCompiledPass {
            pass_index,
            active: true,
            barriers: Vec::new(),
        })
        .collect()
}

/// 阶段 2：剔除无用 Pass
///
/// 根集合是写入外部资源（含 swapchain image）的 Pass。
/// 从根集合反向传播可达性：可达 Pass 读取的资源，其更早的写入者也可达。
/// 剔除既省工作量，也避免为死掉的生产者合成多余的 barrier。
pub(crate) fn cull_unused_passes(
    passes: &[RdgPass],
    registry: &RdgResourceRegistry,
    compiled: &mut [RdgCompiledPass],
) {
    let mut reachable = vec![false; passes.len()];
    let mut work_list: Vec<usize> = Vec::new();

    // 根节点：写入任意外部资源的 Pass
    for (i, pass) in passes.iter().enumerate() {
        let writes_external = pass
            .color_attachments
            .iter()
            .map(|a| a.handle)
            .chain(pass.depth_attachment.iter().map(|a| a.handle))
            .chain(pass.texture_writes.iter().map(|a| a.handle))
            .any(|h| !registry.texture(h).transient)
            || pass.buffer_writes.iter().any(|a| !registry.buffer(a.handle).transient);

        if writes_external {
            reachable[i] = true;
            work_list.push(i);
            log::debug!("cull: root pass '{}'", pass.name);
        }
    }

    // 反向标记所有被根节点依赖的 Pass
    while let Some(current) = work_list.pop() {
        let current_pass = &passes[current];

        for i in 0..current {
            if reachable[i] {
                continue;
            }

            let produces_input = current_pass.texture_reads.iter().any(|r| passes[i].writes_texture(r.handle))
                || current_pass.buffer_reads.iter().any(|r| passes[i].writes_buffer(r.handle));

            if produces_input {
                reachable[i] = true;
                work_list.push(i);
            }
        }
    }

    let mut culled = 0;
    for (i, compiled_pass) in compiled.iter_mut().enumerate() {
        compiled_pass.active = reachable[i];
        if !reachable[i] {
            culled += 1;
            log::debug!("cull: pass '{}' is unreachable", passes[i].name);
        }
    }
    log::debug!("cull: {} active, {} culled", passes.len() - culled, culled);
}

/// 阶段 3：生命周期分析
///
/// 对每个活跃 Pass 触达它读写的所有资源。
/// 结束后 `lifetime.used == false` 的瞬态资源永远不会被分配。
pub(crate) fn analyze_resource_lifetimes(
    passes: &[RdgPass],
    registry: &mut RdgResourceRegistry,
    compiled: &[RdgCompiledPass],
) {
    for compiled_pass in compiled.iter().filter(|p| p.active) {
        let pass_index = compiled_pass.pass_index as u32;
        let pass = &passes[compiled_pass.pass_index];

        for access in pass.texture_reads.iter().chain(pass.texture_writes.iter()) {
            registry.touch_texture(access.handle, pass_index);
        }
        for attachment in &pass.color_attachments {
            registry.touch_texture(attachment.handle, pass_index);
        }
        if let Some(depth) = &pass.depth_attachment {
            registry.touch_texture(depth.handle, pass_index);
        }
        for access in pass.buffer_reads.iter().chain(pass.buffer_writes.iter()) {
            registry.touch_buffer(access.handle, pass_index);
        }
    }
}

/// 阶段 4：资源状态校验
///
/// 读取尚未写入的瞬态资源只发警告不报错：load-from-previous-frame
/// 这类用法之后可能被正式支持。外部资源不做校验。
///
/// # return
/// 警告数量
pub(crate) fn validate_resource_states(
    passes: &[RdgPass],
    registry: &RdgResourceRegistry,
    compiled: &[RdgCompiledPass],
) -> usize {
    let mut written_textures: HashSet<u32> = HashSet::new();
    let mut written_buffers: HashSet<u32> = HashSet::new();
    let mut warnings = 0;

    for compiled_pass in compiled.iter().filter(|p| p.active) {
        let pass = &passes[compiled_pass.pass_index];

        for read in &pass.texture_reads {
            let record = registry.texture(read.handle);
            if record.transient && !written_textures.contains(&read.handle.id) {
                log::warn!(
                    "Pass '{}' reads transient texture '{}' that was never written",
                    pass.name,
                    record.desc.name
                );
                warnings += 1;
            }
        }
        for read in &pass.buffer_reads {
            let record = registry.buffer(read.handle);
            if record.transient && !written_buffers.contains(&read.handle.id) {
                log::warn!(
                    "Pass '{}' reads transient buffer '{}' that was never written",
                    pass.name,
                    record.desc.name
                );
                warnings += 1;
            }
        }

        for attachment in &pass.color_attachments {
            written_textures.insert(attachment.handle.id);
        }
        if let Some(depth) = &pass.depth_attachment {
            written_textures.insert(depth.handle.id);
        }
        for write in &pass.texture_writes {
            written_textures.insert(write.handle.id);
        }
        for write in &pass.buffer_writes {
            written_buffers.insert(write.handle.id);
        }
    }

    warnings
}

/// 每个资源的最近一次访问
struct AccessRecord {
    last_stages: vk::PipelineStageFlags2,
    last_access: vk::AccessFlags2,
    was_write: bool,
}

impl Default for AccessRecord {
    fn default() -> Self {
        Self {
            last_stages: vk::PipelineStageFlags2::TOP_OF_PIPE,
            last_access: vk::AccessFlags2::NONE,
            was_write: false,
        }
    }
}

/// 阶段 5：barrier 合成
///
/// 按声明顺序走一遍活跃 Pass，为每次访问比对资源的访问记录和当前 layout，
/// 需要时在该 Pass 的 barrier 列表中追加 image/buffer barrier。
///
/// # return
/// 末尾的 present 转换：所有被使用过的 swapchain image 在最后一个 Pass
/// 之后统一转换到 PRESENT_SRC_KHR
pub(crate) fn compute_barriers(
    passes: &[RdgPass],
    registry: &mut RdgResourceRegistry,
    compiled: &mut [RdgCompiledPass],
) -> Vec<RdgBarrier> {
    let mut texture_records: HashMap<u32, AccessRecord> = HashMap::new();
    let mut buffer_records: HashMap<u32, AccessRecord> = HashMap::new();

    for compiled_pass in compiled.iter_mut().filter(|p| p.active) {
        let pass = &passes[compiled_pass.pass_index];

        // texture 读取
        for read in &pass.texture_reads {
            let current_layout = registry.texture(read.handle).current_layout;
            let format = registry.texture(read.handle).desc.format;
            let record = texture_records.entry(read.handle.id).or_default();

            if record.was_write {
                // 写后读
                compiled_pass.barriers.push(RdgBarrier::Image(RdgImageBarrier {
                    handle: read.handle,
                    src_stages: record.last_stages,
                    dst_stages: read.stages,
                    src_access: record.last_access,
                    dst_access: read.access,
                    old_layout: current_layout,
                    new_layout: read.layout,
                    subresource_range: full_subresource_range(format),
                }));
                registry.texture_mut(read.handle).current_layout = read.layout;
            } else if current_layout != read.layout {
                // 纯 layout 转换
                compiled_pass.barriers.push(RdgBarrier::Image(RdgImageBarrier {
                    handle: read.handle,
                    src_stages: vk::PipelineStageFlags2::TOP_OF_PIPE,
                    dst_stages: read.stages,
                    src_access: vk::AccessFlags2::NONE,
                    dst_access: read.access,
                    old_layout: current_layout,
                    new_layout: read.layout,
                    subresource_range: full_subresource_range(format),
                }));
                registry.texture_mut(read.handle).current_layout = read.layout;
            }

            *record = AccessRecord {
                last_stages: read.stages,
                last_access: read.access,
                was_write: false,
            };
        }

        // color attachment（写入）
        for attachment in &pass.color_attachments {
            let required_layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
            let current_layout = registry.texture(attachment.handle).current_layout;
            let format = registry.texture(attachment.handle).desc.format;
            let record = texture_records.entry(attachment.handle.id).or_default();

            let mut dst_access = vk::AccessFlags2::COLOR_ATTACHMENT_WRITE;
            if attachment.load_op == vk::AttachmentLoadOp::LOAD {
                dst_access |= vk::AccessFlags2::COLOR_ATTACHMENT_READ;
            }

            if record.last_access != vk::AccessFlags2::NONE || current_layout != required_layout {
                compiled_pass.barriers.push(RdgBarrier::Image(RdgImageBarrier {
                    handle: attachment.handle,
                    src_stages: record.last_stages,
                    dst_stages: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    src_access: record.last_access,
                    dst_access,
                    old_layout: current_layout,
                    new_layout: required_layout,
                    subresource_range: full_subresource_range(format),
                }));
                registry.texture_mut(attachment.handle).current_layout = required_layout;
            }

            *record = AccessRecord {
                last_stages: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                last_access: dst_access,
                was_write: true,
            };
        }

        // depth-stencil attachment（写入）
        if let Some(depth) = &pass.depth_attachment {
            let required_layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
            let current_layout = registry.texture(depth.handle).current_layout;
            let format = registry.texture(depth.handle).desc.format;
            let record = texture_records.entry(depth.handle.id).or_default();

            let dst_stages =
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
            let mut dst_access = vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE;
            if depth.depth_load_op == vk::AttachmentLoadOp::LOAD {
                dst_access |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;
            }

            if record.last_access != vk::AccessFlags2::NONE || current_layout != required_layout {
                compiled_pass.barriers.push(RdgBarrier::Image(RdgImageBarrier {
                    handle: depth.handle,
                    src_stages: record.last_stages,
                    dst_stages,
                    src_access: record.last_access,
                    dst_access,
                    old_layout: current_layout,
                    new_layout: required_layout,
                    subresource_range: full_subresource_range(format),
                }));
                registry.texture_mut(depth.handle).current_layout = required_layout;
            }

            *record = AccessRecord {
                last_stages: dst_stages,
                last_access: dst_access,
                was_write: true,
            };
        }

        // storage texture 写入
        for write in &pass.texture_writes {
            let current_layout = registry.texture(write.handle).current_layout;
            let format = registry.texture(write.handle).desc.format;
            let record = texture_records.entry(write.handle.id).or_default();

            if record.last_access != vk::AccessFlags2::NONE || current_layout != write.layout {
                compiled_pass.barriers.push(RdgBarrier::Image(RdgImageBarrier {
                    handle: write.handle,
                    src_stages: record.last_stages,
                    dst_stages: write.stages,
                    src_access: record.last_access,
                    dst_access: write.access,
                    old_layout: current_layout,
                    new_layout: write.layout,
                    subresource_range: full_subresource_range(format),
                }));
                registry.texture_mut(write.handle).current_layout = write.layout;
            }

            *record = AccessRecord {
                last_stages: write.stages,
                last_access: write.access,
                was_write: true,
            };
        }

        // buffer 读取：只有写后读需要 barrier
        for read in &pass.buffer_reads {
            let record = buffer_records.entry(read.handle.id).or_default();

            if record.was_write {
                compiled_pass.barriers.push(RdgBarrier::Buffer(RdgBufferBarrier {
                    handle: read.handle,
                    src_stages: record.last_stages,
                    dst_stages: read.stages,
                    src_access: record.last_access,
                    dst_access: read.access,
                }));
            }

            *record = AccessRecord {
                last_stages: read.stages,
                last_access: read.access,
                was_write: false,
            };
        }

        // buffer 写入：RAW / WAW 都需要 barrier
        for write in &pass.buffer_writes {
            let record = buffer_records.entry(write.handle.id).or_default();

            if record.last_access != vk::AccessFlags2::NONE {
                compiled_pass.barriers.push(RdgBarrier::Buffer(RdgBufferBarrier {
                    handle: write.handle,
                    src_stages: record.last_stages,
                    dst_stages: write.stages,
                    src_access: record.last_access,
                    dst_access: write.access,
                }));
            }

            *record = AccessRecord {
                last_stages: write.stages,
                last_access: write.access,
                was_write: true,
            };
        }
    }

    // 被使用过的 swapchain image 统一转换到 present layout
    let mut final_barriers = Vec::new();
    for handle in registry.sorted_swapchain_textures() {
        let current_layout = registry.texture(handle).current_layout;
        let format = registry.texture(handle).desc.format;
        let record = texture_records.entry(handle.id).or_default();

        final_barriers.push(RdgBarrier::Image(RdgImageBarrier {
            handle,
            src_stages: record.last_stages,
            dst_stages: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            src_access: record.last_access,
            dst_access: vk::AccessFlags2::NONE,
            old_layout: current_layout,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            subresource_range: full_subresource_range(format),
        }));
        registry.texture_mut(handle).current_layout = vk::ImageLayout::PRESENT_SRC_KHR;
    }

    final_barriers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::RdgTextureHandle;
    use crate::pass::{RdgBufferAccess, RdgColorAttachment, RdgDepthStencilAttachment, RdgTextureAccess};
    use crate::resource::{RdgBufferDesc, RdgBufferRecord, RdgTextureDesc, RdgTextureRecord};

    fn transient_color(registry: &mut RdgResourceRegistry, name: &str) -> RdgTextureHandle {
        registry.register_texture(RdgTextureRecord::new_transient(RdgTextureDesc::new_2d(
            name,
            vk::Format::R8G8B8A8_UNORM,
            512,
            512,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )))
    }

    fn transient_depth(registry: &mut RdgResourceRegistry, name: &str) -> RdgTextureHandle {
        registry.register_texture(RdgTextureRecord::new_transient(RdgTextureDesc::new_2d(
            name,
            vk::Format::D32_SFLOAT,
            1024,
            1024,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )))
    }

    fn swapchain_texture(registry: &mut RdgResourceRegistry) -> RdgTextureHandle {
        let mut record = RdgTextureRecord::new_external(
            RdgTextureDesc::new_2d(
                "swapchain-0",
                vk::Format::B8G8R8A8_UNORM,
                1920,
                1080,
                vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ),
            vk::Image::null(),
            vk::ImageView::null(),
            vk::ImageLayout::UNDEFINED,
        );
        record.swapchain_image_index = Some(0);
        registry.register_texture(record)
    }

    fn color_write(pass: &mut RdgPass, handle: RdgTextureHandle) {
        pass.color_attachments.push(RdgColorAttachment {
            handle,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearColorValue::default(),
        });
    }

    fn sampled_read(pass: &mut RdgPass, handle: RdgTextureHandle) {
        pass.texture_reads.push(RdgTextureAccess {
            handle,
            stages: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            access: vk::AccessFlags2::SHADER_READ,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        });
    }

    fn compile_all(
        passes: &[RdgPass],
        registry: &mut RdgResourceRegistry,
    ) -> (Vec<RdgCompiledPass>, Vec<RdgBarrier>) {
        let mut compiled = build_compiled_passes(passes);
        cull_unused_passes(passes, registry, &mut compiled);
        analyze_resource_lifetimes(passes, registry, &compiled);
        validate_resource_states(passes, registry, &compiled);
        let final_barriers = compute_barriers(passes, registry, &mut compiled);
        (compiled, final_barriers)
    }

    fn image_barriers(compiled_pass: &RdgCompiledPass) -> Vec<&RdgImageBarrier> {
        compiled_pass
            .barriers
            .iter()
            .filter_map(|b| match b {
                RdgBarrier::Image(image) => Some(image),
                RdgBarrier::Buffer(_) => None,
            })
            .collect()
    }

    /// 单 Pass 写 swapchain：一次 Undefined->Color 转换加一次 Color->Present
    #[test]
    fn test_single_pass_swapchain_transitions() {
        let mut registry = RdgResourceRegistry::new();
        let backbuffer = swapchain_texture(&mut registry);

        let mut draw = RdgPass::new("Draw", None);
        color_write(&mut draw, backbuffer);
        let passes = vec![draw];

        let (compiled, final_barriers) = compile_all(&passes, &mut registry);

        assert!(compiled[0].active);
        let barriers = image_barriers(&compiled[0]);
        assert_eq!(barriers.len(), 1);
        let barrier = barriers[0];
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(barrier.src_stages, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert_eq!(barrier.src_access, vk::AccessFlags2::NONE);
        assert_eq!(barrier.dst_stages, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barrier.dst_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);

        assert_eq!(final_barriers.len(), 1);
        let RdgBarrier::Image(present) = &final_barriers[0] else {
            panic!("expected image barrier");
        };
        assert_eq!(present.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(present.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(present.src_stages, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(registry.texture(backbuffer).current_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    /// shadow -> lighting：depth 写入后被采样读取
    #[test]
    fn test_shadow_then_lighting_barriers() {
        let mut registry = RdgResourceRegistry::new();
        let shadow_map = transient_depth(&mut registry, "shadow-map");
        let backbuffer = swapchain_texture(&mut registry);

        let mut shadow = RdgPass::new("Shadow", None);
        shadow.depth_attachment = Some(RdgDepthStencilAttachment {
            handle: shadow_map,
            depth_load_op: vk::AttachmentLoadOp::CLEAR,
            depth_store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        });

        let mut lighting = RdgPass::new("Lighting", None);
        sampled_read(&mut lighting, shadow_map);
        color_write(&mut lighting, backbuffer);

        let passes = vec![shadow, lighting];
        let (compiled, _) = compile_all(&passes, &mut registry);

        // Shadow：undefined -> depth attachment，aspect 为 DEPTH
        assert!(compiled[0].active && compiled[1].active);
        let shadow_barriers = image_barriers(&compiled[0]);
        assert_eq!(shadow_barriers.len(), 1);
        assert_eq!(shadow_barriers[0].new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(shadow_barriers[0].subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);

        // Lighting：depth attachment -> shader read，src 覆盖 late fragment tests
        let lighting_barriers = image_barriers(&compiled[1]);
        let depth_read = lighting_barriers.iter().find(|b| b.handle == shadow_map).unwrap();
        assert_eq!(depth_read.old_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(depth_read.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert!(depth_read.src_stages.contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
        assert!(depth_read.src_access.contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(depth_read.dst_stages, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert_eq!(depth_read.dst_access, vk::AccessFlags2::SHADER_READ);

        // swapchain barrier 也在 lighting 的列表中
        assert!(lighting_barriers.iter().any(|b| b.handle == backbuffer));
    }

    /// 死 Pass 剔除：只有写 swapchain 的 Pass 是根，其余全部剔除
    #[test]
    fn test_dead_pass_elimination() {
        let mut registry = RdgResourceRegistry::new();
        let t1 = transient_color(&mut registry, "t1");
        let t2 = transient_color(&mut registry, "t2");
        let backbuffer = swapchain_texture(&mut registry);

        let mut a = RdgPass::new("A", None);
        color_write(&mut a, t1);

        let mut b = RdgPass::new("B", None);
        sampled_read(&mut b, t1);
        color_write(&mut b, t2);

        let mut c = RdgPass::new("C", None);
        color_write(&mut c, backbuffer);

        let passes = vec![a, b, c];
        let (compiled, _) = compile_all(&passes, &mut registry);

        assert!(!compiled[0].active);
        assert!(!compiled[1].active);
        assert!(compiled[2].active);

        // 剔除的 Pass 不触达资源，t1/t2 不会被分配
        assert!(!registry.texture(t1).lifetime.used);
        assert!(!registry.texture(t2).lifetime.used);

        // 死掉的生产者不产生 barrier
        assert!(compiled[0].barriers.is_empty());
        assert!(compiled[1].barriers.is_empty());
    }

    /// 生产者链可达：A 写 T1，B 读 T1 写 swapchain，两者都活跃
    #[test]
    fn test_producer_chain_reachable() {
        let mut registry = RdgResourceRegistry::new();
        let t1 = transient_color(&mut registry, "t1");
        let backbuffer = swapchain_texture(&mut registry);

        let mut a = RdgPass::new("A", None);
        color_write(&mut a, t1);

        let mut b = RdgPass::new("B", None);
        sampled_read(&mut b, t1);
        color_write(&mut b, backbuffer);

        let passes = vec![a, b];
        let (compiled, _) = compile_all(&passes, &mut registry);

        assert!(compiled[0].active);
        assert!(compiled[1].active);
        assert_eq!((registry.texture(t1).lifetime.first_pass, registry.texture(t1).lifetime.last_pass), (0, 1));
    }

    /// buffer 的 RAW：写后读需要 buffer barrier
    #[test]
    fn test_buffer_raw_barrier() {
        let mut registry = RdgResourceRegistry::new();
        let buffer = registry.register_buffer(RdgBufferRecord::new_external(
            RdgBufferDesc::new("particles", 4096, vk::BufferUsageFlags::STORAGE_BUFFER),
            vk::Buffer::null(),
        ));
        let backbuffer = swapchain_texture(&mut registry);

        let mut simulate = RdgPass::new("Simulate", None);
        simulate.buffer_writes.push(RdgBufferAccess {
            handle: buffer,
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
        });

        let mut draw = RdgPass::new("Draw", None);
        draw.buffer_reads.push(RdgBufferAccess {
            handle: buffer,
            stages: vk::PipelineStageFlags2::VERTEX_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_READ,
        });
        color_write(&mut draw, backbuffer);

        let passes = vec![simulate, draw];
        let (compiled, _) = compile_all(&passes, &mut registry);

        // Simulate 是根（写外部 buffer），首次写入无前置访问，无 barrier
        assert!(compiled[0].active);
        assert!(compiled[0].barriers.is_empty());

        let raw = compiled[1]
            .barriers
            .iter()
            .find_map(|b| match b {
                RdgBarrier::Buffer(buffer_barrier) => Some(buffer_barrier),
                RdgBarrier::Image(_) => None,
            })
            .expect("expected a buffer barrier");
        assert_eq!(raw.src_stages, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(raw.src_access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(raw.dst_stages, vk::PipelineStageFlags2::VERTEX_SHADER);
        assert_eq!(raw.dst_access, vk::AccessFlags2::SHADER_STORAGE_READ);
    }

    /// 只读到只读不需要 barrier
    #[test]
    fn test_read_only_chain_emits_no_barrier() {
        let mut registry = RdgResourceRegistry::new();
        let albedo = registry.register_texture(RdgTextureRecord::new_external(
            RdgTextureDesc::new_2d("albedo", vk::Format::R8G8B8A8_UNORM, 256, 256, vk::ImageUsageFlags::SAMPLED),
            vk::Image::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ));
        let backbuffer = swapchain_texture(&mut registry);

        let mut first = RdgPass::new("First", None);
        sampled_read(&mut first, albedo);
        color_write(&mut first, backbuffer);

        let mut second = RdgPass::new("Second", None);
        sampled_read(&mut second, albedo);
        color_write(&mut second, backbuffer);

        let passes = vec![first, second];
        let (compiled, _) = compile_all(&passes, &mut registry);

        for compiled_pass in &compiled {
            assert!(image_barriers(compiled_pass).iter().all(|b| b.handle != albedo));
        }
    }

    /// 读取未写入的瞬态资源：警告但不报错；外部资源豁免
    #[test]
    fn test_unwritten_transient_read_warns() {
        let mut registry = RdgResourceRegistry::new();
        let history = transient_color(&mut registry, "history");
        let backbuffer = swapchain_texture(&mut registry);

        let mut taa = RdgPass::new("Taa", None);
        sampled_read(&mut taa, history);
        color_write(&mut taa, backbuffer);

        let passes = vec![taa];
        let mut compiled = build_compiled_passes(&passes);
        cull_unused_passes(&passes, &registry, &mut compiled);
        analyze_resource_lifetimes(&passes, &mut registry, &compiled);

        assert_eq!(validate_resource_states(&passes, &registry, &compiled), 1);
    }

    #[test]
    fn test_external_read_is_exempt_from_validation() {
        let mut registry = RdgResourceRegistry::new();
        let albedo = registry.register_texture(RdgTextureRecord::new_external(
            RdgTextureDesc::new_2d("albedo", vk::Format::R8G8B8A8_UNORM, 256, 256, vk::ImageUsageFlags::SAMPLED),
            vk::Image::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ));
        let backbuffer = swapchain_texture(&mut registry);

        let mut draw = RdgPass::new("Draw", None);
        sampled_read(&mut draw, albedo);
        color_write(&mut draw, backbuffer);

        let passes = vec![draw];
        let mut compiled = build_compiled_passes(&passes);
        cull_unused_passes(&passes, &registry, &mut compiled);
        analyze_resource_lifetimes(&passes, &mut registry, &compiled);

        assert_eq!(validate_resource_states(&passes, &registry, &compiled), 0);
    }

    /// 空 graph：没有 Pass，没有 barrier
    #[test]
    fn test_empty_graph_compiles() {
        let mut registry = RdgResourceRegistry::new();
        let passes: Vec<RdgPass> = Vec::new();
        let (compiled, final_barriers) = compile_all(&passes, &mut registry);
        assert!(compiled.is_empty());
        assert!(final_barriers.is_empty());
    }

    /// 同一个 graph 编译两次，barrier 列表一致
    #[test]
    fn test_identical_graphs_compile_identically() {
        fn build() -> (Vec<RdgPass>, RdgResourceRegistry) {
            let mut registry = RdgResourceRegistry::new();
            let depth = transient_depth(&mut registry, "depth");
            let backbuffer = swapchain_texture(&mut registry);

            let mut shadow = RdgPass::new("Shadow", None);
            shadow.depth_attachment = Some(RdgDepthStencilAttachment {
                handle: depth,
                depth_load_op: vk::AttachmentLoadOp::CLEAR,
                depth_store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                clear_value: vk::ClearDepthStencilValue::default(),
            });

            let mut lighting = RdgPass::new("Lighting", None);
            sampled_read(&mut lighting, depth);
            color_write(&mut lighting, backbuffer);

            (vec![shadow, lighting], registry)
        }

        let (passes_a, mut registry_a) = build();
        let (passes_b, mut registry_b) = build();

        let (compiled_a, final_a) = compile_all(&passes_a, &mut registry_a);
        let (compiled_b, final_b) = compile_all(&passes_b, &mut registry_b);

        let flatten = |compiled: &[RdgCompiledPass]| {
            compiled.iter().flat_map(|p| p.barriers.iter().copied().map(format_barrier)).collect::<Vec<_>>()
        };
        fn format_barrier(barrier: RdgBarrier) -> String {
            format!("{:?}", barrier)
        }

        assert_eq!(flatten(&compiled_a), flatten(&compiled_b));
        assert_eq!(
            final_a.iter().copied().map(format_barrier).collect::<Vec<_>>(),
            final_b.iter().copied().map(format_barrier).collect::<Vec<_>>()
        );
    }
}
