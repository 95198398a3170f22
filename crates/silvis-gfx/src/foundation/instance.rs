use std::{
    collections::HashSet,
    ffi::{c_char, CStr, CString},
};

use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::GfxDebugMessenger;

/// vk instance 封装
///
/// 只持有函数指针和裸 handle，生命周期手动控制
pub struct GfxInstance {
    pub(crate) ash_instance: ash::Instance,
}

// 创建与销毁
impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// `extra_exts` 通常来自 window system（surface 相关的 extension）
    pub fn new(vk_entry: &ash::Entry, app_name: &str, engine_name: &str, extra_exts: Vec<&'static CStr>) -> Self {
        let app_name = CString::new(app_name).unwrap();
        let engine_name = CString::new(engine_name).unwrap();
        let app_info = vk::ApplicationInfo::default()
            // 版本过低时，部分 1.3 的函数无法正确加载
            .api_version(vk::API_VERSION_1_3)
            .application_name(app_name.as_ref())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_ref())
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_exts = Self::collect_extensions(vk_entry, &extra_exts);
        log::info!(
            "instance extensions: {}",
            enabled_exts.iter().map(|e| format!("{:?}", unsafe { CStr::from_ptr(*e) })).join(", ")
        );

        let mut instance_ci = vk::InstanceCreateInfo::default() //
            .application_info(&app_info)
            .enabled_extension_names(&enabled_exts);

        // instance 创建期间的消息也通过 messenger ci 捕获
        let mut messenger_ci = GfxDebugMessenger::messenger_ci();
        instance_ci = instance_ci.push_next(&mut messenger_ci);

        let ash_instance = unsafe { vk_entry.create_instance(&instance_ci, None).unwrap() };

        Self { ash_instance }
    }

    pub fn destroy(self) {
        log::info!("Destroying GfxInstance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// 构造过程
impl GfxInstance {
    /// 校验并收集 instance extension，不支持的 extension 直接 panic
    fn collect_extensions(vk_entry: &ash::Entry, extra_exts: &[&'static CStr]) -> Vec<*const c_char> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None).unwrap() };

        let mut enabled: HashSet<&'static CStr> = HashSet::new();
        let mut enable_ext = |ext: &'static CStr| {
            let supported = all_ext_props
                .iter()
                .any(|prop| ext == unsafe { CStr::from_ptr(prop.extension_name.as_ptr()) });
            if supported {
                enabled.insert(ext);
            } else {
                panic!("Required instance extension ({:?}) is missing", ext);
            }
        };

        for ext in extra_exts {
            enable_ext(ext);
        }
        // debug utils 总是开启：object naming 和 cmd label 都依赖它
        enable_ext(vk::EXT_DEBUG_UTILS_NAME);

        enabled.iter().map(|ext| ext.as_ptr()).collect_vec()
    }
}
