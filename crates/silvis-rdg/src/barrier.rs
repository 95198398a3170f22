//! barrier 记录
//!
//! 编译阶段为每个 Pass 合成的同步原语。执行时同一个 Pass 的所有
//! barrier 折叠为一次 pipeline_barrier2 调用。

use ash::vk;
use silvis_gfx::resources::image::GfxImageDesc;

use crate::handle::{RdgBufferHandle, RdgTextureHandle};

/// image barrier：stage/access 依赖加上可选的 layout 转换
#[derive(Clone, Copy, Debug)]
pub(crate) struct RdgImageBarrier {
    pub handle: RdgTextureHandle,
    pub src_stages: vk::PipelineStageFlags2,
    pub dst_stages: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub subresource_range: vk::ImageSubresourceRange,
}

/// buffer barrier：只有 stage/access 依赖
#[derive(Clone, Copy, Debug)]
pub(crate) struct RdgBufferBarrier {
    pub handle: RdgBufferHandle,
    pub src_stages: vk::PipelineStageFlags2,
    pub dst_stages: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum RdgBarrier {
    Image(RdgImageBarrier),
    Buffer(RdgBufferBarrier),
}

/// 覆盖所有 mip 和 layer 的 subresource range，aspect 从格式推断
pub(crate) fn full_subresource_range(format: vk::Format) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: GfxImageDesc::infer_aspect(format),
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_inference() {
        assert_eq!(
            full_subresource_range(vk::Format::R8G8B8A8_UNORM).aspect_mask,
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(full_subresource_range(vk::Format::D32_SFLOAT).aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            full_subresource_range(vk::Format::D24_UNORM_S8_UINT).aspect_mask,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn test_full_range_covers_everything() {
        let range = full_subresource_range(vk::Format::R8G8B8A8_UNORM);
        assert_eq!(range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(range.layer_count, vk::REMAINING_ARRAY_LAYERS);
    }
}
