//! Command pools and single-use command buffers

use crate::render::vulkan::initialization::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a command pool for `queue_family_index`
    pub fn new(device: Device, queue_family_index: u32, flags: vk::CommandPoolCreateFlags) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&create_info, None) }
            .map_err(VulkanError::api("vkCreateCommandPool"))?;

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::api("vkAllocateCommandBuffers"))
    }

    /// Return command buffers to the pool
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(self.command_pool, command_buffers) };
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Buffers from this pool may still be executing.
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// A one-shot command buffer on the graphics queue
///
/// Recording starts on [`SingleTimeCommands::begin`];
/// [`SingleTimeCommands::submit_and_wait`] submits, blocks until the queue is
/// idle and frees the buffer. Dropping without submitting frees it unsubmitted.
pub struct SingleTimeCommands<'a> {
    context: &'a DeviceContext,
    command_buffer: vk::CommandBuffer,
    submitted: bool,
}

impl<'a> SingleTimeCommands<'a> {
    /// Allocate a command buffer from the transfer pool and begin recording
    pub fn begin(context: &'a DeviceContext) -> VulkanResult<Self> {
        let command_buffer = context
            .transfer_pool()
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::invalid("driver returned no command buffer"))?;

        let commands = Self {
            context,
            command_buffer,
            submitted: false,
        };

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { context.device().begin_command_buffer(command_buffer, &begin_info) }
            .map_err(VulkanError::api("vkBeginCommandBuffer"))?;

        Ok(commands)
    }

    /// Run `record` inside a single-use command buffer and wait for it
    pub fn run<F>(context: &'a DeviceContext, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer) -> VulkanResult<()>,
    {
        let commands = Self::begin(context)?;
        record(context.device(), commands.command_buffer)?;
        commands.submit_and_wait()
    }

    /// The buffer being recorded
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// End recording, submit, and block until the graphics queue is idle
    pub fn submit_and_wait(mut self) -> VulkanResult<()> {
        let device = self.context.device();
        let queue = self.context.graphics_queue();

        unsafe { device.end_command_buffer(self.command_buffer) }.map_err(VulkanError::api("vkEndCommandBuffer"))?;

        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe { device.queue_submit(queue, &[submit_info.build()], vk::Fence::null()) }
            .map_err(VulkanError::api("vkQueueSubmit"))?;
        self.submitted = true;

        unsafe { device.queue_wait_idle(queue) }.map_err(VulkanError::api("vkQueueWaitIdle"))
    }
}

impl Drop for SingleTimeCommands<'_> {
    fn drop(&mut self) {
        if self.submitted {
            // A submitted buffer must finish executing before it is freed.
            unsafe {
                let _ = self.context.device().queue_wait_idle(self.context.graphics_queue());
            }
        }
        self.context.transfer_pool().free_command_buffers(&[self.command_buffer]);
    }
}
