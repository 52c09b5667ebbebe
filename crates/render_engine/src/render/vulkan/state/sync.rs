//! Semaphores, fences and the per-slot synchronization bundle

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Binary semaphore for GPU-GPU ordering
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }
            .map_err(VulkanError::api("vkCreateSemaphore"))?;
        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.semaphore, None) };
    }
}

/// Fence for CPU-GPU synchronization
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None) }
            .map_err(VulkanError::api("vkCreateFence"))?;
        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout) }
            .map_err(VulkanError::api("vkWaitForFences"))
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(VulkanError::api("vkResetFences"))
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.fence, None) };
    }
}

/// Synchronization objects of one frame slot
///
/// The fence starts signaled so the first wait on a fresh slot returns at once.
pub struct FrameSync {
    /// Signaled when the acquired swapchain image can be rendered to
    pub image_available: Semaphore,
    /// Signaled when the slot's submission finished rendering
    pub render_finished: Semaphore,
    /// Signaled when the slot's submission completed on the GPU
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the semaphores and a signaled fence
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}

/// One entry of the frame ring: sync objects and a primary command buffer
pub struct FrameSlot {
    /// Slot synchronization
    pub sync: FrameSync,
    /// Command buffer re-recorded every time the slot is used
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSlot {
    /// One slot per command buffer
    pub fn create_ring(device: &Device, command_buffers: Vec<vk::CommandBuffer>) -> VulkanResult<Vec<Self>> {
        command_buffers
            .into_iter()
            .map(|command_buffer| {
                Ok(Self {
                    sync: FrameSync::new(device)?,
                    command_buffer,
                })
            })
            .collect()
    }
}
