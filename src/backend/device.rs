// Vulkan bootstrap - instance, surface, device, queues
//
// Everything the presentation core consumes ready-made: a logical device,
// resolved graphics/present queue handles, and a surface bound to the
// window. Also owns the validation messenger when layers are enabled.

use std::ffi::CStr;
use std::sync::Arc;

use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use super::surface::SurfaceSupport;
use crate::error::{RenderError, RenderResult};

// Nul terminators included; the unchecked constructor is const-usable.
const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };
const ENGINE_NAME: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"No Engine\0") };

/// Queue families resolved for a physical device + surface pair.
/// Graphics and present are usually the same family but may differ,
/// and the swapchain sharing mode depends on which case we are in.
#[derive(Debug, Clone, Copy)]
struct QueueFamilies {
    graphics: u32,
    present: u32,
}

/// Owns the whole bootstrap chain. Wrappers downstream hold an Arc to it,
/// so the device outlives every resource created from it; Drop tears down
/// device, messenger, surface, instance in that order.
pub struct VulkanContext {
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::extensions::khr::Surface,
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    _entry: Entry,
}

impl VulkanContext {
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> RenderResult<Arc<Self>> {
        let entry = unsafe { Entry::load()? };

        let enable_validation = enable_validation && validation_layer_available(&entry);

        let display_handle = window.display_handle()?.as_raw();
        let window_handle = window.window_handle()?.as_raw();

        let instance = create_instance(&entry, app_name, display_handle, enable_validation)?;

        let debug_utils = if enable_validation {
            Some(setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
                .map_err(|e| RenderError::ResourceCreation {
                    what: "surface",
                    source: e,
                })?
        };
        let surface_loader = ash::extensions::khr::Surface::new(&entry, &instance);

        let (physical_device, families) =
            pick_physical_device(&instance, &surface_loader, surface)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {} (graphics family {}, present family {})",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
            families.graphics,
            families.present,
        );

        let device = create_logical_device(&instance, physical_device, families)?;
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };

        Ok(Arc::new(Self {
            graphics_queue,
            present_queue,
            graphics_family: families.graphics,
            present_family: families.present,
            device,
            physical_device,
            surface,
            surface_loader,
            debug_utils,
            instance,
            _entry: entry,
        }))
    }

    /// Drain all in-flight GPU work. Required before destroying anything
    /// the GPU might still be reading.
    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context");
        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

fn validation_layer_available(entry: &Entry) -> bool {
    let layers = match entry.enumerate_instance_layer_properties() {
        Ok(layers) => layers,
        Err(_) => return false,
    };

    let found = layers
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);
    if !found {
        log::warn!("Validation layers requested but not available, continuing without");
    }
    found
}

fn create_instance(
    entry: &Entry,
    app_name: &str,
    display_handle: raw_window_handle::RawDisplayHandle,
    enable_validation: bool,
) -> RenderResult<ash::Instance> {
    let app_name_cstr = std::ffi::CString::new(app_name).unwrap_or_default();

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_0);

    let mut extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| RenderError::ResourceCreation {
            what: "instance",
            source: e,
        })?
        .to_vec();

    let layer_names = if enable_validation {
        extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(|e| RenderError::ResourceCreation {
                what: "instance",
                source: e,
            })
    }
}

fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> RenderResult<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe {
        debug_utils
            .create_debug_utils_messenger(&create_info, None)
            .map_err(|e| RenderError::ResourceCreation {
                what: "debug messenger",
                source: e,
            })?
    };

    Ok((debug_utils, messenger))
}

/// Pick a device that can do graphics, present to our surface, carries the
/// swapchain extension, and reports a usable surface (at least one format
/// and one present mode). Discrete GPUs win ties.
fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
) -> RenderResult<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        return Err(RenderError::NoSuitableGpu);
    }

    let mut best: Option<(vk::PhysicalDevice, QueueFamilies)> = None;
    let mut best_score = 0;

    for device in devices {
        let Some(families) = find_queue_families(instance, surface_loader, surface, device)?
        else {
            continue;
        };

        if !supports_swapchain_extension(instance, device)? {
            continue;
        }

        // Suitability gate: negotiation must have something to pick from.
        let support = SurfaceSupport::query(surface_loader, device, surface)?;
        if !support.is_adequate() {
            continue;
        }

        let props = unsafe { instance.get_physical_device_properties(device) };
        let score = match props.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 1,
        };

        if score > best_score {
            best_score = score;
            best = Some((device, families));
        }
    }

    best.ok_or(RenderError::NoSuitableGpu)
}

fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> RenderResult<Option<QueueFamilies>> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics = None;
    let mut present = None;

    for (index, family) in queue_families.iter().enumerate() {
        let index = index as u32;

        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }

        let can_present = unsafe {
            surface_loader.get_physical_device_surface_support(device, index, surface)?
        };
        if present.is_none() && can_present {
            present = Some(index);
        }

        if graphics.is_some() && present.is_some() {
            break;
        }
    }

    Ok(match (graphics, present) {
        (Some(graphics), Some(present)) => Some(QueueFamilies { graphics, present }),
        _ => None,
    })
}

fn supports_swapchain_extension(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> RenderResult<bool> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    let wanted = ash::extensions::khr::Swapchain::name();
    Ok(extensions
        .iter()
        .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == wanted))
}

fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: QueueFamilies,
) -> RenderResult<ash::Device> {
    let queue_priorities = [1.0];

    // One queue per distinct family; graphics and present often coincide.
    let mut unique_families = vec![families.graphics];
    if families.present != families.graphics {
        unique_families.push(families.present);
    }

    let queue_create_infos: Vec<_> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    unsafe {
        instance
            .create_device(physical_device, &create_info, None)
            .map_err(|e| RenderError::ResourceCreation {
                what: "logical device",
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The unchecked constructors promise interior-nul-free, nul-terminated
    // bytes; keep that promise pinned down.
    #[test]
    fn c_string_constants_are_well_formed() {
        assert_eq!(
            VALIDATION_LAYER.to_str().unwrap(),
            "VK_LAYER_KHRONOS_validation"
        );
        assert_eq!(ENGINE_NAME.to_str().unwrap(), "No Engine");
    }
}

// Validation layer messages routed into our logger
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
