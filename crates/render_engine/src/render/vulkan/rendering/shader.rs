//! SPIR-V shader modules

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

/// Entry point every engine shader uses
pub const ENTRY_POINT: &CStr = c"main";

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V words
    pub fn from_words(device: &Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(VulkanError::api("vkCreateShaderModule"))?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load shader from a SPIR-V file
    ///
    /// Missing, unreadable or malformed files are reported as
    /// [`VulkanError::ShaderLoad`] with the offending path.
    pub fn from_file(device: &Device, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let shader_load = |source| VulkanError::ShaderLoad {
            path: path.to_path_buf(),
            source,
        };

        let bytes = std::fs::read(path).map_err(shader_load)?;
        let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(shader_load)?;

        log::debug!("Loaded shader {} ({} words)", path.display(), words.len());
        Self::from_words(device, &words)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage info using [`ENTRY_POINT`]
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}
