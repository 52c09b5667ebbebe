//! GPU resources: buffers, images, textures and descriptors

pub mod binder;
pub mod buffer;
pub mod descriptor_set;
pub mod image;
pub mod texture;
pub mod uniform_buffer;

pub use binder::{Material, MaterialBinder};
pub use buffer::{find_memory_type, GpuBuffer};
pub use descriptor_set::{
    frame_bindings, material_bindings, DescriptorBudget, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, DescriptorSetWriter,
};
pub use image::{GpuImage, ImageDesc, LayoutTransition};
pub use texture::{ColorSpace, DefaultTextures, Texture, TextureData};
pub use uniform_buffer::{uniform_ring, UniformBuffer};
