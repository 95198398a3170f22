//! graph 自有的采样器集合
//!
//! 一个封闭的枚举，面向瞬态纹理的便利采样器；
//! 外部导入的纹理应当使用它们自己的采样器。

use ash::vk;
use silvis_gfx::resources::sampler::GfxSamplerDesc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RdgSamplerKind {
    NearestClamp,
    NearestRepeat,
    LinearClamp,
    LinearRepeat,
    AnisotropicClamp,
    AnisotropicRepeat,
    ShadowPcf,
}

impl RdgSamplerKind {
    pub const ALL: [Self; 7] = [
        Self::NearestClamp,
        Self::NearestRepeat,
        Self::LinearClamp,
        Self::LinearRepeat,
        Self::AnisotropicClamp,
        Self::AnisotropicRepeat,
        Self::ShadowPcf,
    ];

    /// 对应的采样器描述
    pub fn desc(self) -> GfxSamplerDesc {
        match self {
            Self::NearestClamp => GfxSamplerDesc {
                mag_filter: vk::Filter::NEAREST,
                min_filter: vk::Filter::NEAREST,
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                ..Default::default()
            },
            Self::NearestRepeat => GfxSamplerDesc {
                mag_filter: vk::Filter::NEAREST,
                min_filter: vk::Filter::NEAREST,
                address_mode: vk::SamplerAddressMode::REPEAT,
                ..Default::default()
            },
            Self::LinearClamp => GfxSamplerDesc {
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                ..Default::default()
            },
            Self::LinearRepeat => GfxSamplerDesc {
                address_mode: vk::SamplerAddressMode::REPEAT,
                ..Default::default()
            },
            Self::AnisotropicClamp => GfxSamplerDesc {
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                max_anisotropy: 16,
                ..Default::default()
            },
            Self::AnisotropicRepeat => GfxSamplerDesc {
                address_mode: vk::SamplerAddressMode::REPEAT,
                max_anisotropy: 16,
                ..Default::default()
            },
            Self::ShadowPcf => GfxSamplerDesc {
                address_mode: vk::SamplerAddressMode::CLAMP_TO_BORDER,
                compare_op: Some(vk::CompareOp::LESS_OR_EQUAL),
                border_color: vk::BorderColor::FLOAT_OPAQUE_WHITE,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_table_is_complete() {
        // 每种采样器都有独立的描述
        let descs: Vec<_> = RdgSamplerKind::ALL.iter().map(|kind| kind.desc()).collect();
        for (i, a) in descs.iter().enumerate() {
            for b in descs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_shadow_sampler_has_compare_op() {
        let desc = RdgSamplerKind::ShadowPcf.desc();
        assert_eq!(desc.compare_op, Some(vk::CompareOp::LESS_OR_EQUAL));

        let desc = RdgSamplerKind::LinearClamp.desc();
        assert_eq!(desc.compare_op, None);
    }

    #[test]
    fn test_anisotropic_samplers_enable_anisotropy() {
        assert!(RdgSamplerKind::AnisotropicClamp.desc().max_anisotropy > 0);
        assert_eq!(RdgSamplerKind::LinearRepeat.desc().max_anisotropy, 0);
    }
}
