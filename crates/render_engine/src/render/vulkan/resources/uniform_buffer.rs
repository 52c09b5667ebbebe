//! Typed host-visible uniform buffers

use super::buffer::GpuBuffer;
use crate::render::vulkan::initialization::DeviceContext;
use crate::render::vulkan::VulkanResult;
use ash::vk;
use bytemuck::Pod;
use std::marker::PhantomData;

/// Uniform buffer holding exactly one `T`, rewritten through a mapping
pub struct UniformBuffer<T: Pod> {
    buffer: GpuBuffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Allocate a buffer initialized with `initial`
    pub fn new(context: &DeviceContext, initial: &T) -> VulkanResult<Self> {
        let buffer = GpuBuffer::host_visible(
            context,
            std::mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;
        let uniform = Self {
            buffer,
            _marker: PhantomData,
        };
        uniform.update(initial)?;
        Ok(uniform)
    }

    /// Overwrite the contents
    pub fn update(&self, value: &T) -> VulkanResult<()> {
        self.buffer.write_bytes(0, bytemuck::bytes_of(value))
    }

    /// Descriptor info covering the whole value
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer.handle(),
            offset: 0,
            range: std::mem::size_of::<T>() as vk::DeviceSize,
        }
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// One uniform buffer per entry, all initialized with `initial`
pub fn uniform_ring<T: Pod>(context: &DeviceContext, count: usize, initial: &T) -> VulkanResult<Vec<UniformBuffer<T>>> {
    (0..count).map(|_| UniformBuffer::new(context, initial)).collect()
}
