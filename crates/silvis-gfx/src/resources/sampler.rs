use ash::vk;

use crate::foundation::device::GfxDevice;

/// sampler 的描述，可以作为去重用的 key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GfxSamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode: vk::SamplerAddressMode,
    /// 0 表示关闭各向异性
    pub max_anisotropy: u32,
    pub compare_op: Option<vk::CompareOp>,
    pub border_color: vk::BorderColor,
}

impl Default for GfxSamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: 0,
            compare_op: None,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        }
    }
}

/// 创建 vk::Sampler
///
/// 各向异性会被 clamp 到 `max_device_anisotropy`
pub fn create_sampler(device: &GfxDevice, desc: &GfxSamplerDesc, max_device_anisotropy: f32) -> vk::Sampler {
    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(desc.mag_filter)
        .min_filter(desc.min_filter)
        .mipmap_mode(desc.mipmap_mode)
        .address_mode_u(desc.address_mode)
        .address_mode_v(desc.address_mode)
        .address_mode_w(desc.address_mode)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(desc.border_color);

    if desc.max_anisotropy > 0 {
        let anisotropy = (desc.max_anisotropy as f32).min(max_device_anisotropy);
        create_info = create_info.anisotropy_enable(true).max_anisotropy(anisotropy);
    } else {
        create_info = create_info.anisotropy_enable(false).max_anisotropy(1.0);
    }

    if let Some(compare_op) = desc.compare_op {
        create_info = create_info.compare_enable(true).compare_op(compare_op);
    } else {
        create_info = create_info.compare_enable(false);
    }

    unsafe { device.create_sampler(&create_info, None).expect("Failed to create sampler") }
}
