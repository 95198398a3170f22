use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::foundation::context::GfxContext;

/// window surface 封装，连同查询到的 capabilities 和 formats
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) surface_pf: ash::khr::surface::Instance,

    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl GfxSurface {
    pub fn new(ctx: &GfxContext, window: &winit::window::Window) -> Self {
        let handle = unsafe {
            ash_window::create_surface(
                ctx.entry(),
                ctx.instance().ash_instance(),
                window.display_handle().unwrap().as_raw(),
                window.window_handle().unwrap().as_raw(),
                None,
            )
            .unwrap()
        };

        let surface_pf = ash::khr::surface::Instance::new(ctx.entry(), ctx.instance().ash_instance());
        let pdevice = ctx.vk_physical_device();

        let (capabilities, formats, present_modes) = unsafe {
            let family_index = ctx.physical_device().graphics_queue_family().queue_family_index;
            let supported =
                surface_pf.get_physical_device_surface_support(pdevice, family_index, handle).unwrap();
            assert!(supported, "Graphics queue family does not support presenting to this surface");

            (
                surface_pf.get_physical_device_surface_capabilities(pdevice, handle).unwrap(),
                surface_pf.get_physical_device_surface_formats(pdevice, handle).unwrap(),
                surface_pf.get_physical_device_surface_present_modes(pdevice, handle).unwrap(),
            )
        };

        Self {
            handle,
            surface_pf,
            capabilities,
            formats,
            present_modes,
        }
    }

    pub fn destroy(self) {
        unsafe {
            self.surface_pf.destroy_surface(self.handle, None);
        }
    }
}
