//! Vulkan backend
//!
//! Layered bottom-up: [`initialization`] creates the instance and device,
//! [`resources`] wraps buffers, images and descriptors, [`rendering`] builds
//! render passes and pipelines, [`state`] runs the swapchain and frame ring,
//! and [`renderer`] ties them into [`VulkanRenderer`].

pub mod error;
pub mod initialization;
pub mod renderer;
pub mod rendering;
pub mod resources;
pub mod state;

pub use error::{VulkanError, VulkanResult};
pub use initialization::DeviceContext;
pub use renderer::VulkanRenderer;
pub use rendering::{BlendMode, Pipeline, PipelineBuilder, ShaderModule, VertexLayout};
pub use resources::{
    ColorSpace, DefaultTextures, GpuBuffer, GpuImage, Material, MaterialBinder, Texture, TextureData, UniformBuffer,
};
pub use state::{ActiveFrame, FrameBackend, FrameScheduler, PendingRequests};
