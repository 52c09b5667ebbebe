//! Vulkan backend errors
//!
//! Everything here is fatal for the caller: creation failures and invariant
//! violations. Stale swapchains are reported through
//! [`super::state::frame::AcquireOutcome`] and [`super::state::frame::PresentOutcome`]
//! instead.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Vulkan backend errors
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A Vulkan entry point returned a non-success code
    #[error("{call} failed: {result}")]
    Api {
        /// Name of the failing entry point
        call: &'static str,
        /// Code it returned
        result: vk::Result,
    },

    /// Loader, instance or surface setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device met the requirements
    #[error("No suitable GPU found: {0}")]
    NoSuitableDevice(String),

    /// No memory type matches the requested bits and properties
    #[error("No suitable memory type for type bits {type_bits:#034b} with {properties:?}")]
    NoSuitableMemoryType {
        /// Allowed memory types from the resource's requirements
        type_bits: u32,
        /// Required property flags
        properties: vk::MemoryPropertyFlags,
    },

    /// The layout pair is outside the supported set of transitions
    #[error("Unsupported layout transition: {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        /// Current layout
        from: vk::ImageLayout,
        /// Requested layout
        to: vk::ImageLayout,
    },

    /// A descriptor pool would exceed the number of sets it was sized for
    #[error("Descriptor pool exhausted: requested {requested} sets with {remaining} of {capacity} remaining")]
    DescriptorPoolExhausted {
        /// Sets asked for
        requested: u32,
        /// Sets still available
        remaining: u32,
        /// Sets the pool was created with
        capacity: u32,
    },

    /// A shader binary could not be read or parsed
    #[error("Failed to load shader {}: {source}", path.display())]
    ShaderLoad {
        /// Path that was requested
        path: PathBuf,
        /// Underlying IO or SPIR-V parsing error
        source: std::io::Error,
    },

    /// The call is not valid in the current state
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// What went wrong
        reason: String,
    },

    /// The window collaborator failed
    #[error("Window error: {0}")]
    Window(String),
}

impl VulkanError {
    /// Adapter for `map_err` on raw ash results
    ///
    /// ```ignore
    /// unsafe { device.create_buffer(&info, None) }.map_err(VulkanError::api("vkCreateBuffer"))?;
    /// ```
    pub fn api(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Api { call, result }
    }

    /// Shorthand for [`VulkanError::InvalidOperation`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation { reason: reason.into() }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_adapter_keeps_call_name_and_code() {
        let err = Err::<(), _>(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            .map_err(VulkanError::api("vkAllocateMemory"))
            .unwrap_err();

        assert!(matches!(
            err,
            VulkanError::Api { call: "vkAllocateMemory", result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY }
        ));
        assert!(err.to_string().starts_with("vkAllocateMemory failed"));
    }

    #[test]
    fn shader_load_message_names_the_path() {
        let err = VulkanError::ShaderLoad {
            path: PathBuf::from("shaders/missing.spv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("shaders/missing.spv"));
    }
}
