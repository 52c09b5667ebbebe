//! GPU buffers
//!
//! A [`GpuBuffer`] owns a buffer handle and the memory bound to it; both are
//! released together on drop. Vertex and index data go through a staging
//! buffer into device-local memory, uniform data stays host-visible.

use crate::render::vulkan::initialization::DeviceContext;
use crate::render::vulkan::rendering::commands::SingleTimeCommands;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Index of the first memory type allowed by `type_bits` that has all of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    (0..count)
        .find(|&index| {
            type_bits & (1 << index) != 0
                && memory_properties.memory_types[index as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType { type_bits, properties })
}

/// Allocate memory satisfying `requirements` with `properties`
pub(crate) fn allocate_memory(
    context: &DeviceContext,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(context.memory_properties(), requirements.memory_type_bits, properties)?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe { context.device().allocate_memory(&alloc_info, None) }.map_err(VulkanError::api("vkAllocateMemory"))
}

/// Buffer handle plus its backing memory
pub struct GpuBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_properties: vk::MemoryPropertyFlags,
}

impl GpuBuffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        context: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::invalid("buffers must not be empty"));
        }

        let device = context.device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(VulkanError::api("vkCreateBuffer"))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = match allocate_memory(context, requirements, memory_properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(result) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::api("vkBindBufferMemory")(result));
        }

        log::debug!("Created {size} byte buffer ({usage:?}, {memory_properties:?})");

        Ok(Self {
            device: context.raw_device(),
            buffer,
            memory,
            size,
            usage,
            memory_properties,
        })
    }

    /// Host-visible, coherent buffer for data the CPU rewrites
    pub fn host_visible(context: &DeviceContext, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        Self::new(
            context,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Staging buffer pre-filled with `bytes`
    pub fn staging(context: &DeviceContext, bytes: &[u8]) -> VulkanResult<Self> {
        let staging = Self::host_visible(context, bytes.len() as vk::DeviceSize, vk::BufferUsageFlags::TRANSFER_SRC)?;
        staging.write_bytes(0, bytes)?;
        Ok(staging)
    }

    /// Device-local buffer filled with `bytes` through a staging copy
    ///
    /// `usage` gets `TRANSFER_DST` (and `TRANSFER_SRC` for readback) added.
    pub fn device_local_with_data(context: &DeviceContext, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        let staging = Self::staging(context, bytes)?;
        let buffer = Self::new(
            context,
            staging.size,
            usage | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        buffer.copy_from(context, &staging)?;
        Ok(buffer)
    }

    /// Copy the whole of `source` into this buffer with a single-use command buffer
    pub fn copy_from(&self, context: &DeviceContext, source: &GpuBuffer) -> VulkanResult<()> {
        if source.size > self.size {
            return Err(VulkanError::invalid(format!(
                "copy of {} bytes into a {} byte buffer",
                source.size, self.size
            )));
        }

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: source.size,
        };
        SingleTimeCommands::run(context, |device, command_buffer| {
            unsafe { device.cmd_copy_buffer(command_buffer, source.buffer, self.buffer, &[region]) };
            Ok(())
        })
    }

    /// Write `bytes` at `offset` through a temporary mapping
    pub fn write_bytes(&self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        self.require_host_visible()?;
        let length = bytes.len() as vk::DeviceSize;
        if offset + length > self.size {
            return Err(VulkanError::invalid(format!(
                "write of {length} bytes at offset {offset} overruns {} byte buffer",
                self.size
            )));
        }
        if bytes.is_empty() {
            return Ok(());
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, offset, length, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::api("vkMapMemory"))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Write a slice of plain-old-data values at the start of the buffer
    pub fn write<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(0, bytemuck::cast_slice(data))
    }

    /// Read the whole buffer through a temporary mapping
    pub fn read_bytes(&self) -> VulkanResult<Vec<u8>> {
        self.require_host_visible()?;
        let length = usize::try_from(self.size).map_err(|_| VulkanError::invalid("buffer too large to map"))?;

        let mut bytes = vec![0u8; length];
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::api("vkMapMemory"))?;
            std::ptr::copy_nonoverlapping(mapped.cast::<u8>(), bytes.as_mut_ptr(), length);
            self.device.unmap_memory(self.memory);
        }
        Ok(bytes)
    }

    /// Copy the contents back to the host, for debugging and tests
    pub fn read_back(&self, context: &DeviceContext) -> VulkanResult<Vec<u8>> {
        if self.memory_properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return self.read_bytes();
        }
        if !self.usage.contains(vk::BufferUsageFlags::TRANSFER_SRC) {
            return Err(VulkanError::invalid("readback needs a TRANSFER_SRC buffer"));
        }

        let readback = Self::host_visible(context, self.size, vk::BufferUsageFlags::TRANSFER_DST)?;
        readback.copy_from(context, self)?;
        readback.read_bytes()
    }

    fn require_host_visible(&self) -> VulkanResult<()> {
        if self.memory_properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            Ok(())
        } else {
            Err(VulkanError::invalid("buffer memory is not host visible"))
        }
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes as requested at creation
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Usage flags the buffer was created with
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        properties
    }

    #[test]
    fn picks_first_type_with_all_properties() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&properties, 0b111, wanted).unwrap(), 2);
        assert_eq!(find_memory_type(&properties, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(), 1);
    }

    #[test]
    fn respects_type_bits() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        assert_eq!(find_memory_type(&properties, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(), 1);
    }

    #[test]
    fn missing_memory_type_is_an_error() {
        let properties = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type(&properties, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(err, VulkanError::NoSuitableMemoryType { type_bits: 0b1, .. }));
    }

    #[test]
    fn types_beyond_the_reported_count_are_ignored() {
        let mut properties = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        assert!(find_memory_type(&properties, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE).is_err());
    }
}
