//! Device context
//!
//! Owns the instance, the optional presentation surface, the selected
//! physical device, the logical device with its queues, and a command pool
//! for single-use transfer work. Everything else borrows it explicitly.

use super::device::{DeviceRequirements, LogicalDevice, PhysicalDeviceInfo, QueueFamilies};
use super::instance::{InstanceDescriptor, VulkanInstance};
use crate::core::config::RendererConfig;
use crate::render::vulkan::rendering::commands::CommandPool;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::render::window::VulkanSurfaceSource;
use ash::extensions::khr::Surface;
use ash::{vk, Device, Instance};

/// Presentation surface and its extension loader
struct PresentationSurface {
    loader: Surface,
    handle: vk::SurfaceKHR,
}

/// Core Vulkan objects shared by every other component
///
/// Fields drop top to bottom after [`Drop::drop`] has released the surface:
/// transfer pool, then device, then instance.
pub struct DeviceContext {
    transfer_pool: CommandPool,
    device: LogicalDevice,
    physical: PhysicalDeviceInfo,
    surface: Option<PresentationSurface>,
    instance: VulkanInstance,
}

impl DeviceContext {
    /// Create a context that can present to `window`
    pub fn new(window: &mut dyn VulkanSurfaceSource, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(&InstanceDescriptor {
            application_name: &config.application_name,
            application_version: config.application_version,
            enable_validation: config.validation_enabled(),
            window_extensions: window.required_instance_extensions()?,
        })?;

        let loader = Surface::new(instance.entry(), instance.raw());
        let handle = window.create_surface(instance.raw().handle())?;
        let surface = PresentationSurface { loader, handle };

        let requirements = DeviceRequirements::for_presentation(config.require_discrete_gpu);
        let physical = match PhysicalDeviceInfo::select(instance.raw(), Some((&surface.loader, handle)), &requirements) {
            Ok(physical) => physical,
            Err(e) => {
                unsafe { surface.loader.destroy_surface(handle, None) };
                return Err(e);
            }
        };

        Self::finish(instance, Some(surface), physical)
    }

    /// Create a context without a surface, for uploads and tools
    pub fn headless(config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(&InstanceDescriptor {
            application_name: &config.application_name,
            application_version: config.application_version,
            enable_validation: config.validation_enabled(),
            window_extensions: Vec::new(),
        })?;

        let physical = PhysicalDeviceInfo::select(instance.raw(), None, &DeviceRequirements::headless())?;
        Self::finish(instance, None, physical)
    }

    fn finish(
        instance: VulkanInstance,
        surface: Option<PresentationSurface>,
        physical: PhysicalDeviceInfo,
    ) -> VulkanResult<Self> {
        let presentation = surface.is_some();
        let device = match LogicalDevice::new(instance.raw(), &physical, presentation) {
            Ok(device) => device,
            Err(e) => {
                if let Some(surface) = surface {
                    unsafe { surface.loader.destroy_surface(surface.handle, None) };
                }
                return Err(e);
            }
        };

        let transfer_pool = match CommandPool::new(
            device.device.clone(),
            physical.queue_families.graphics,
            vk::CommandPoolCreateFlags::TRANSIENT,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                drop(device);
                if let Some(surface) = surface {
                    unsafe { surface.loader.destroy_surface(surface.handle, None) };
                }
                return Err(e);
            }
        };

        log::info!("Device context ready on {}", physical.name());

        Ok(Self {
            transfer_pool,
            device,
            physical,
            surface,
            instance,
        })
    }

    /// Device function table
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Owned clone of the device function table, for RAII wrappers
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Instance function table
    pub fn instance(&self) -> &Instance {
        self.instance.raw()
    }

    /// Selected physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical.device
    }

    /// Cached memory heaps and types of the physical device
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical.memory_properties
    }

    /// Cached device limits
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.physical.properties.limits
    }

    /// Maximum sampler anisotropy, or `None` when the feature is not enabled
    pub fn max_sampler_anisotropy(&self) -> Option<f32> {
        self.physical
            .sampler_anisotropy
            .then_some(self.physical.properties.limits.max_sampler_anisotropy)
    }

    /// Graphics and present queue family indices
    pub fn queue_families(&self) -> QueueFamilies {
        self.physical.queue_families
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Surface handle and loader, absent for headless contexts
    pub fn surface(&self) -> Option<(&Surface, vk::SurfaceKHR)> {
        self.surface.as_ref().map(|surface| (&surface.loader, surface.handle))
    }

    /// Pool used for single-use transfer command buffers
    pub fn transfer_pool(&self) -> &CommandPool {
        &self.transfer_pool
    }

    /// Block until all submitted GPU work has completed
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle() }.map_err(VulkanError::api("vkDeviceWaitIdle"))
    }

    /// First format in `candidates` supporting `features` with `tiling`
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> VulkanResult<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let properties = unsafe {
                    self.instance
                        .raw()
                        .get_physical_device_format_properties(self.physical.device, format)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                    _ => properties.optimal_tiling_features.contains(features),
                }
            })
            .ok_or_else(|| VulkanError::invalid(format!("none of {candidates:?} supports {features:?}")))
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        let _ = self.wait_idle();
        if let Some(surface) = self.surface.take() {
            unsafe { surface.loader.destroy_surface(surface.handle, None) };
        }
    }
}
