//! Pass 记录与声明接口
//!
//! Pass 按添加顺序累积，声明顺序决定编译时的拓扑基准。
//! 回调有两种形态：只拿 command buffer 的简单形态，
//! 以及附带资源访问器的扩展形态。

use ash::vk;
use silvis_gfx::commands::command_buffer::GfxCommandBuffer;

use crate::accessor::RdgResourceAccessor;
use crate::error::RdgPassResult;
use crate::handle::{RdgBufferHandle, RdgTextureHandle};
use crate::registry::RdgResourceRegistry;

/// texture 的读/写访问声明
#[derive(Clone, Copy, Debug)]
pub(crate) struct RdgTextureAccess {
    pub handle: RdgTextureHandle,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    /// 该访问要求的 layout
    pub layout: vk::ImageLayout,
}

/// buffer 的读/写访问声明
#[derive(Clone, Copy, Debug)]
pub(crate) struct RdgBufferAccess {
    pub handle: RdgBufferHandle,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

/// color attachment 声明
#[derive(Clone, Copy)]
pub struct RdgColorAttachment {
    pub handle: RdgTextureHandle,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: vk::ClearColorValue,
}

/// depth-stencil attachment 声明，每个 Pass 至多一个
#[derive(Clone, Copy)]
pub struct RdgDepthStencilAttachment {
    pub handle: RdgTextureHandle,
    pub depth_load_op: vk::AttachmentLoadOp,
    pub depth_store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    pub clear_value: vk::ClearDepthStencilValue,
}

/// Pass 的分类，决定执行器是否打开 dynamic rendering 作用域
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RdgPassKind {
    Graphics,
    Compute,
    Transfer,
}

pub(crate) enum RdgPassCallback {
    Plain(Box<dyn FnOnce(&GfxCommandBuffer) -> RdgPassResult>),
    Accessor(Box<dyn FnOnce(&GfxCommandBuffer, &RdgResourceAccessor) -> RdgPassResult>),
}

/// 一个已录制的 Pass
pub(crate) struct RdgPass {
    pub name: String,
    /// 执行时被取走，之后为 None
    pub callback: Option<RdgPassCallback>,

    pub texture_reads: Vec<RdgTextureAccess>,
    pub buffer_reads: Vec<RdgBufferAccess>,
    pub color_attachments: Vec<RdgColorAttachment>,
    pub depth_attachment: Option<RdgDepthStencilAttachment>,
    /// storage texture 写入，layout 固定为 GENERAL
    pub texture_writes: Vec<RdgTextureAccess>,
    pub buffer_writes: Vec<RdgBufferAccess>,
}

impl RdgPass {
    pub fn new(name: impl Into<String>, callback: Option<RdgPassCallback>) -> Self {
        Self {
            name: name.into(),
            callback,
            texture_reads: Vec::new(),
            buffer_reads: Vec::new(),
            color_attachments: Vec::new(),
            depth_attachment: None,
            texture_writes: Vec::new(),
            buffer_writes: Vec::new(),
        }
    }

    /// 有 attachment 即 Graphics，否则有 storage 写入即 Compute，其余为 Transfer
    pub fn kind(&self) -> RdgPassKind {
        if !self.color_attachments.is_empty() || self.depth_attachment.is_some() {
            RdgPassKind::Graphics
        } else if !self.texture_writes.is_empty() || !self.buffer_writes.is_empty() {
            RdgPassKind::Compute
        } else {
            RdgPassKind::Transfer
        }
    }

    pub fn writes_texture(&self, handle: RdgTextureHandle) -> bool {
        self.color_attachments.iter().any(|a| a.handle == handle)
            || self.depth_attachment.as_ref().is_some_and(|a| a.handle == handle)
            || self.texture_writes.iter().any(|a| a.handle == handle)
    }

    pub fn writes_buffer(&self, handle: RdgBufferHandle) -> bool {
        self.buffer_writes.iter().any(|a| a.handle == handle)
    }
}

/// 根据访问标记推断读取时的 image layout
pub(crate) fn infer_read_layout(access: vk::AccessFlags2) -> vk::ImageLayout {
    let shader_read = vk::AccessFlags2::SHADER_READ
        | vk::AccessFlags2::SHADER_SAMPLED_READ
        | vk::AccessFlags2::INPUT_ATTACHMENT_READ;
    if access.intersects(shader_read) {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    } else {
        vk::ImageLayout::GENERAL
    }
}

/// Pass 的声明接口
///
/// 由 [`crate::RdgBuilder::add_pass`] 返回，链式声明该 Pass 的资源依赖。
/// 声明未注册的 handle 立即 panic。
pub struct RdgPassRef<'a> {
    pub(crate) pass: &'a mut RdgPass,
    pub(crate) registry: &'a RdgResourceRegistry,
}

impl RdgPassRef<'_> {
    fn expect_texture(&self, handle: RdgTextureHandle) {
        assert!(
            self.registry.contains_texture(handle),
            "Pass '{}' references unknown texture handle: {:?}",
            self.pass.name,
            handle
        );
    }

    fn expect_buffer(&self, handle: RdgBufferHandle) {
        assert!(
            self.registry.contains_buffer(handle),
            "Pass '{}' references unknown buffer handle: {:?}",
            self.pass.name,
            handle
        );
    }

    /// 声明读取 texture（采样或 input attachment）
    ///
    /// layout 由 access 推断：shader read 对应 SHADER_READ_ONLY_OPTIMAL，
    /// 其余为 GENERAL
    pub fn read_texture(self, handle: RdgTextureHandle, stages: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.expect_texture(handle);
        self.pass.texture_reads.push(RdgTextureAccess {
            handle,
            stages,
            access,
            layout: infer_read_layout(access),
        });
        self
    }

    /// 声明读取 buffer
    pub fn read_buffer(self, handle: RdgBufferHandle, stages: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.expect_buffer(handle);
        self.pass.buffer_reads.push(RdgBufferAccess { handle, stages, access });
        self
    }

    /// 追加一个 color attachment
    pub fn write_color_attachment(
        self,
        handle: RdgTextureHandle,
        load_op: vk::AttachmentLoadOp,
        store_op: vk::AttachmentStoreOp,
        clear_value: vk::ClearColorValue,
    ) -> Self {
        self.expect_texture(handle);
        self.pass.color_attachments.push(RdgColorAttachment {
            handle,
            load_op,
            store_op,
            clear_value,
        });
        self
    }

    /// 设置 depth-stencil attachment，重复设置是编程错误
    pub fn write_depth_stencil_attachment(
        self,
        handle: RdgTextureHandle,
        depth_load_op: vk::AttachmentLoadOp,
        depth_store_op: vk::AttachmentStoreOp,
        stencil_load_op: vk::AttachmentLoadOp,
        stencil_store_op: vk::AttachmentStoreOp,
        clear_value: vk::ClearDepthStencilValue,
    ) -> Self {
        self.expect_texture(handle);
        assert!(
            self.pass.depth_attachment.is_none(),
            "Pass '{}' already has a depth-stencil attachment",
            self.pass.name
        );
        self.pass.depth_attachment = Some(RdgDepthStencilAttachment {
            handle,
            depth_load_op,
            depth_store_op,
            stencil_load_op,
            stencil_store_op,
            clear_value,
        });
        self
    }

    /// 声明 storage texture 写入，layout 为 GENERAL
    pub fn write_storage_texture(
        self,
        handle: RdgTextureHandle,
        stages: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
    ) -> Self {
        self.expect_texture(handle);
        self.pass.texture_writes.push(RdgTextureAccess {
            handle,
            stages,
            access,
            layout: vk::ImageLayout::GENERAL,
        });
        self
    }

    /// 声明 storage buffer 写入
    pub fn write_storage_buffer(
        self,
        handle: RdgBufferHandle,
        stages: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
    ) -> Self {
        self.expect_buffer(handle);
        self.pass.buffer_writes.push(RdgBufferAccess { handle, stages, access });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RdgResourceRegistry;
    use crate::resource::{RdgTextureDesc, RdgTextureRecord};

    fn registry_with_textures(count: usize) -> (RdgResourceRegistry, Vec<RdgTextureHandle>) {
        let mut registry = RdgResourceRegistry::new();
        let handles = (0..count)
            .map(|i| {
                registry.register_texture(RdgTextureRecord::new_transient(RdgTextureDesc::new_2d(
                    format!("tex-{i}"),
                    vk::Format::R8G8B8A8_UNORM,
                    64,
                    64,
                    vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                )))
            })
            .collect();
        (registry, handles)
    }

    #[test]
    fn test_fluent_declarations_accumulate() {
        let (registry, handles) = registry_with_textures(3);
        let mut pass = RdgPass::new("gbuffer", None);

        let pass_ref = RdgPassRef {
            pass: &mut pass,
            registry: &registry,
        };
        pass_ref
            .read_texture(handles[0], vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .write_color_attachment(
                handles[1],
                vk::AttachmentLoadOp::CLEAR,
                vk::AttachmentStoreOp::STORE,
                vk::ClearColorValue::default(),
            )
            .write_storage_texture(
                handles[2],
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
            );

        assert_eq!(pass.texture_reads.len(), 1);
        assert_eq!(pass.texture_reads[0].layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(pass.color_attachments.len(), 1);
        assert_eq!(pass.texture_writes.len(), 1);
        assert_eq!(pass.texture_writes[0].layout, vk::ImageLayout::GENERAL);
        assert!(pass.writes_texture(handles[1]));
        assert!(pass.writes_texture(handles[2]));
        assert!(!pass.writes_texture(handles[0]));
    }

    #[test]
    #[should_panic(expected = "already has a depth-stencil attachment")]
    fn test_double_depth_attachment_panics() {
        let (registry, handles) = registry_with_textures(2);
        let mut pass = RdgPass::new("depth", None);

        let pass_ref = RdgPassRef {
            pass: &mut pass,
            registry: &registry,
        };
        pass_ref
            .write_depth_stencil_attachment(
                handles[0],
                vk::AttachmentLoadOp::CLEAR,
                vk::AttachmentStoreOp::STORE,
                vk::AttachmentLoadOp::DONT_CARE,
                vk::AttachmentStoreOp::DONT_CARE,
                vk::ClearDepthStencilValue::default(),
            )
            .write_depth_stencil_attachment(
                handles[1],
                vk::AttachmentLoadOp::CLEAR,
                vk::AttachmentStoreOp::STORE,
                vk::AttachmentLoadOp::DONT_CARE,
                vk::AttachmentStoreOp::DONT_CARE,
                vk::ClearDepthStencilValue::default(),
            );
    }

    #[test]
    #[should_panic(expected = "references unknown texture handle")]
    fn test_unknown_handle_rejected_at_declaration() {
        let (registry, _) = registry_with_textures(1);
        let mut pass = RdgPass::new("bad", None);

        let pass_ref = RdgPassRef {
            pass: &mut pass,
            registry: &registry,
        };
        pass_ref.read_texture(
            RdgTextureHandle::new(99),
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_READ,
        );
    }

    #[test]
    fn test_pass_classification() {
        let mut pass = RdgPass::new("graphics", None);
        pass.color_attachments.push(RdgColorAttachment {
            handle: RdgTextureHandle::new(1),
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearColorValue::default(),
        });
        assert_eq!(pass.kind(), RdgPassKind::Graphics);

        let mut pass = RdgPass::new("depth-only", None);
        pass.depth_attachment = Some(RdgDepthStencilAttachment {
            handle: RdgTextureHandle::new(1),
            depth_load_op: vk::AttachmentLoadOp::CLEAR,
            depth_store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: vk::ClearDepthStencilValue::default(),
        });
        assert_eq!(pass.kind(), RdgPassKind::Graphics);

        let mut pass = RdgPass::new("compute", None);
        pass.texture_writes.push(RdgTextureAccess {
            handle: RdgTextureHandle::new(1),
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
            layout: vk::ImageLayout::GENERAL,
        });
        assert_eq!(pass.kind(), RdgPassKind::Compute);

        assert_eq!(RdgPass::new("empty", None).kind(), RdgPassKind::Transfer);
    }

    #[test]
    fn test_infer_read_layout() {
        assert_eq!(
            infer_read_layout(vk::AccessFlags2::SHADER_READ),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
        assert_eq!(
            infer_read_layout(vk::AccessFlags2::SHADER_SAMPLED_READ),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
        assert_eq!(
            infer_read_layout(vk::AccessFlags2::INPUT_ATTACHMENT_READ),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
        assert_eq!(infer_read_layout(vk::AccessFlags2::SHADER_STORAGE_READ), vk::ImageLayout::GENERAL);
    }
}
