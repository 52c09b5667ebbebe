//! Instance, physical device selection and the device context

pub mod context;
pub mod device;
pub mod instance;

pub use context::DeviceContext;
pub use device::{
    find_queue_families, DeviceCandidate, DeviceRequirements, LogicalDevice, PhysicalDeviceInfo,
    QueueFamilies, QueueFamilyIndices, Unsuitable,
};
pub use instance::{InstanceDescriptor, VulkanInstance};
