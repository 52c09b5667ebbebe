//! Physical device selection and logical device creation
//!
//! Selection works on a [`DeviceCandidate`], a plain summary of what a
//! physical device offers, so the rules can be checked without a GPU.

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::extensions::khr::{Surface, Swapchain};
use ash::{vk, Device, Instance};
use std::ffi::{c_char, CStr};

/// Queue family indices as discovered, possibly incomplete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family supporting graphics
    pub graphics: Option<u32>,
    /// Family chosen for presentation
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both families, if both were found
    pub fn complete(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Resolved graphics and present queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics family index
    pub graphics: u32,
    /// Present family index; may equal `graphics`
    pub present: u32,
}

impl QueueFamilies {
    /// Sharing mode and family list for resources used by both queues
    pub fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.graphics == self.present {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, vec![self.graphics, self.present])
        }
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Pick graphics and present families
///
/// `present_support[i]` tells whether family `i` can present to the surface.
/// The graphics family is reused for presentation when it can present.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> QueueFamilyIndices {
    let graphics = families
        .iter()
        .position(|family| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS));

    let can_present = |index: usize| present_support.get(index).copied().unwrap_or(false);
    let present = match graphics {
        Some(index) if can_present(index) => Some(index),
        _ => (0..families.len()).find(|&index| can_present(index)),
    };

    QueueFamilyIndices {
        graphics: graphics.and_then(|index| u32::try_from(index).ok()),
        present: present.and_then(|index| u32::try_from(index).ok()),
    }
}

/// What a device must offer to be selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequirements {
    /// Only accept discrete GPUs
    pub discrete_only: bool,
    /// A presentation surface is in play
    pub presentation: bool,
    /// Sampler anisotropy must be supported
    pub sampler_anisotropy: bool,
    /// Device extensions that must be present
    pub extensions: Vec<String>,
}

impl DeviceRequirements {
    /// Requirements for rendering to a window surface
    pub fn for_presentation(discrete_only: bool) -> Self {
        Self {
            discrete_only,
            presentation: true,
            sampler_anisotropy: true,
            extensions: vec![Swapchain::name().to_string_lossy().into_owned()],
        }
    }

    /// Requirements for offscreen work: any device with a graphics queue
    pub fn headless() -> Self {
        Self {
            discrete_only: false,
            presentation: false,
            sampler_anisotropy: false,
            extensions: Vec::new(),
        }
    }
}

/// Why a device was passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsuitable {
    /// Not a discrete GPU
    NotDiscrete(vk::PhysicalDeviceType),
    /// No family supports graphics
    NoGraphicsQueue,
    /// No family can present to the surface
    NoPresentQueue,
    /// A required extension is missing
    MissingExtension(String),
    /// The surface reports no formats or no present modes
    NoSurfaceSupport,
    /// Sampler anisotropy is not supported
    NoAnisotropy,
}

impl std::fmt::Display for Unsuitable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDiscrete(kind) => write!(f, "not a discrete GPU ({kind:?})"),
            Self::NoGraphicsQueue => f.write_str("no graphics queue family"),
            Self::NoPresentQueue => f.write_str("no queue family can present"),
            Self::MissingExtension(name) => write!(f, "missing extension {name}"),
            Self::NoSurfaceSupport => f.write_str("no surface formats or present modes"),
            Self::NoAnisotropy => f.write_str("no sampler anisotropy"),
        }
    }
}

/// Everything selection looks at for one physical device
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Device name for logging
    pub name: String,
    /// Discrete, integrated, virtual, CPU...
    pub device_type: vk::PhysicalDeviceType,
    /// Queue family properties in family-index order
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Per-family presentation support; empty when headless
    pub present_support: Vec<bool>,
    /// Supported device extension names
    pub extensions: Vec<String>,
    /// Number of surface formats offered
    pub surface_format_count: usize,
    /// Number of present modes offered
    pub present_mode_count: usize,
    /// Whether sampler anisotropy is supported
    pub sampler_anisotropy: bool,
}

impl DeviceCandidate {
    /// Check the candidate against `requirements`, returning its queue families
    pub fn evaluate(&self, requirements: &DeviceRequirements) -> Result<QueueFamilies, Unsuitable> {
        if requirements.discrete_only && self.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
            return Err(Unsuitable::NotDiscrete(self.device_type));
        }

        let indices = find_queue_families(&self.queue_families, &self.present_support);
        let graphics = indices.graphics.ok_or(Unsuitable::NoGraphicsQueue)?;
        let present = if requirements.presentation {
            indices.present.ok_or(Unsuitable::NoPresentQueue)?
        } else {
            graphics
        };

        if let Some(missing) = requirements
            .extensions
            .iter()
            .find(|required| !self.extensions.iter().any(|available| available == *required))
        {
            return Err(Unsuitable::MissingExtension(missing.clone()));
        }

        if requirements.presentation && (self.surface_format_count == 0 || self.present_mode_count == 0) {
            return Err(Unsuitable::NoSurfaceSupport);
        }

        if requirements.sampler_anisotropy && !self.sampler_anisotropy {
            return Err(Unsuitable::NoAnisotropy);
        }

        Ok(QueueFamilies { graphics, present })
    }

    /// Gather the candidate summary from the driver
    pub fn query(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: Option<(&Surface, vk::SurfaceKHR)>,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(VulkanError::api("vkEnumerateDeviceExtensionProperties"))?
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_string_lossy().into_owned())
            .collect();

        let (present_support, surface_format_count, present_mode_count) = match surface {
            Some((loader, surface)) => {
                let mut support = Vec::with_capacity(queue_families.len());
                for index in 0..queue_families.len() {
                    let index = u32::try_from(index).map_err(|_| VulkanError::invalid("queue family index overflow"))?;
                    support.push(
                        unsafe { loader.get_physical_device_surface_support(device, index, surface) }
                            .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceSupportKHR"))?,
                    );
                }
                let formats = unsafe { loader.get_physical_device_surface_formats(device, surface) }
                    .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
                let modes = unsafe { loader.get_physical_device_surface_present_modes(device, surface) }
                    .map_err(VulkanError::api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;
                (support, formats.len(), modes.len())
            }
            None => (Vec::new(), 0, 0),
        };

        Ok(Self {
            name: device_name(&properties),
            device_type: properties.device_type,
            queue_families,
            present_support,
            extensions,
            surface_format_count,
            present_mode_count,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        })
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// The selected physical device and what was learned about it
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Resolved queue families
    pub queue_families: QueueFamilies,
    /// Whether sampler anisotropy will be enabled on the logical device
    pub sampler_anisotropy: bool,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device meeting `requirements`
    pub fn select(
        instance: &Instance,
        surface: Option<(&Surface, vk::SurfaceKHR)>,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(VulkanError::api("vkEnumeratePhysicalDevices"))?;

        if devices.is_empty() {
            return Err(VulkanError::NoSuitableDevice("no Vulkan devices present".into()));
        }

        let mut rejections = Vec::new();
        for device in devices {
            let candidate = DeviceCandidate::query(instance, device, surface)?;
            match candidate.evaluate(requirements) {
                Ok(queue_families) => {
                    let properties = unsafe { instance.get_physical_device_properties(device) };
                    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
                    log::info!(
                        "Selected GPU: {} ({:?}), graphics family {}, present family {}",
                        candidate.name,
                        candidate.device_type,
                        queue_families.graphics,
                        queue_families.present
                    );
                    return Ok(Self {
                        device,
                        properties,
                        memory_properties,
                        queue_families,
                        sampler_anisotropy: candidate.sampler_anisotropy,
                    });
                }
                Err(reason) => {
                    log::debug!("Skipping GPU {}: {reason}", candidate.name);
                    rejections.push(format!("{}: {reason}", candidate.name));
                }
            }
        }

        Err(VulkanError::NoSuitableDevice(rejections.join("; ")))
    }

    /// Device name as reported by the driver
    pub fn name(&self) -> String {
        device_name(&self.properties)
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Device function table
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Presentation queue; equals `graphics_queue` when the families match
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create the logical device with one queue per unique family
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo, presentation: bool) -> VulkanResult<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions: Vec<*const c_char> = if presentation {
            vec![Swapchain::name().as_ptr()]
        } else {
            Vec::new()
        };

        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical.sampler_anisotropy)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }
            .map_err(VulkanError::api("vkCreateDevice"))?;

        let graphics_queue = unsafe { device.get_device_queue(physical.queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.queue_families.present, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn candidate() -> DeviceCandidate {
        DeviceCandidate {
            name: "Test GPU".into(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families: vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)],
            present_support: vec![true],
            extensions: vec!["VK_KHR_swapchain".into()],
            surface_format_count: 2,
            present_mode_count: 1,
            sampler_anisotropy: true,
        }
    }

    #[test]
    fn prefers_graphics_family_for_presentation() {
        let families = [family(vk::QueueFlags::TRANSFER), family(vk::QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, &[true, true]);
        assert_eq!(indices, QueueFamilyIndices { graphics: Some(1), present: Some(1) });
    }

    #[test]
    fn falls_back_to_separate_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let indices = find_queue_families(&families, &[false, true]);
        assert_eq!(indices, QueueFamilyIndices { graphics: Some(0), present: Some(1) });
    }

    #[test]
    fn incomplete_families_do_not_resolve() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, &[true]);
        assert_eq!(indices.graphics, None);
        assert_eq!(indices.present, Some(0));
        assert!(indices.complete().is_none());
    }

    #[test]
    fn empty_queue_families_are_ignored() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let indices = find_queue_families(&[empty, family(vk::QueueFlags::GRAPHICS)], &[]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, None);
    }

    #[test]
    fn sharing_mode_follows_family_equality() {
        let same = QueueFamilies { graphics: 0, present: 0 };
        assert_eq!(same.sharing(), (vk::SharingMode::EXCLUSIVE, vec![]));
        assert_eq!(same.unique(), vec![0]);

        let split = QueueFamilies { graphics: 0, present: 2 };
        assert_eq!(split.sharing(), (vk::SharingMode::CONCURRENT, vec![0, 2]));
        assert_eq!(split.unique(), vec![0, 2]);
    }

    #[test]
    fn suitable_candidate_is_accepted() {
        let families = candidate().evaluate(&DeviceRequirements::for_presentation(true)).unwrap();
        assert_eq!(families, QueueFamilies { graphics: 0, present: 0 });
    }

    #[test]
    fn integrated_gpu_rejected_only_when_discrete_required() {
        let mut integrated = candidate();
        integrated.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;

        assert_eq!(
            integrated.evaluate(&DeviceRequirements::for_presentation(true)),
            Err(Unsuitable::NotDiscrete(vk::PhysicalDeviceType::INTEGRATED_GPU))
        );
        assert!(integrated.evaluate(&DeviceRequirements::for_presentation(false)).is_ok());
    }

    #[test]
    fn each_missing_capability_is_reported() {
        let requirements = DeviceRequirements::for_presentation(true);

        let mut no_swapchain = candidate();
        no_swapchain.extensions.clear();
        assert_eq!(
            no_swapchain.evaluate(&requirements),
            Err(Unsuitable::MissingExtension("VK_KHR_swapchain".into()))
        );

        let mut no_present = candidate();
        no_present.present_support = vec![false];
        assert_eq!(no_present.evaluate(&requirements), Err(Unsuitable::NoPresentQueue));

        let mut no_formats = candidate();
        no_formats.surface_format_count = 0;
        assert_eq!(no_formats.evaluate(&requirements), Err(Unsuitable::NoSurfaceSupport));

        let mut no_modes = candidate();
        no_modes.present_mode_count = 0;
        assert_eq!(no_modes.evaluate(&requirements), Err(Unsuitable::NoSurfaceSupport));

        let mut no_aniso = candidate();
        no_aniso.sampler_anisotropy = false;
        assert_eq!(no_aniso.evaluate(&requirements), Err(Unsuitable::NoAnisotropy));
    }

    #[test]
    fn headless_needs_only_a_graphics_queue() {
        let mut cpu = candidate();
        cpu.device_type = vk::PhysicalDeviceType::CPU;
        cpu.present_support.clear();
        cpu.extensions.clear();
        cpu.surface_format_count = 0;
        cpu.present_mode_count = 0;
        cpu.sampler_anisotropy = false;

        assert_eq!(
            cpu.evaluate(&DeviceRequirements::headless()),
            Ok(QueueFamilies { graphics: 0, present: 0 })
        );
    }
}
