//! Vulkan renderer
//!
//! [`VulkanRenderer`] pairs the [`FrameScheduler`] with [`RenderCore`], the
//! [`FrameBackend`] that owns every GPU object of the forward pass. Resources
//! sized by the swapchain (framebuffers, depth image, pipeline, render pass,
//! per-image camera buffers and their descriptor sets) are torn down and
//! rebuilt together; everything else lives as long as the renderer.

use super::initialization::DeviceContext;
use super::rendering::{CommandPool, Pipeline, PipelineBuilder, RenderPass, ShaderModule};
use super::resources::descriptor_set::{frame_bindings, material_set_count};
use super::resources::image::DEPTH_FORMAT_CANDIDATES;
use super::resources::{
    uniform_ring, ColorSpace, DefaultTextures, DescriptorPool, DescriptorSetLayout, DescriptorSetWriter, GpuImage,
    Material, MaterialBinder, Texture, TextureData, UniformBuffer,
};
use super::state::{
    AcquireOutcome, ActiveFrame, FrameBackend, FrameScheduler, FrameSlot, PendingRequests, PresentOutcome,
    SwapchainManager,
};
use super::{VulkanError, VulkanResult};
use crate::core::config::RendererConfig;
use crate::render::camera::Camera;
use crate::render::mesh::{Drawable, Mesh, MeshData, Vertex};
use crate::render::uniforms::{CameraUbo, LightingUbo};
use crate::render::window::{VulkanSurfaceSource, WindowSurface};
use ash::vk;
use std::sync::Arc;

/// Command buffer currently between begin and end
#[derive(Debug, Clone, Copy)]
struct Recording {
    slot: usize,
    command_buffer: vk::CommandBuffer,
}

/// GPU state of the forward renderer
///
/// Fields drop top to bottom once [`Drop::drop`] has released the swapchain
/// dependents, ending with the device context.
pub struct RenderCore {
    frame_sets: Vec<vk::DescriptorSet>,
    frame_pool: Option<DescriptorPool>,
    camera_buffers: Vec<UniformBuffer<CameraUbo>>,
    depth: Option<GpuImage>,
    pipeline: Option<Pipeline>,
    render_pass: Option<RenderPass>,
    swapchain: SwapchainManager,

    lighting_buffers: Vec<UniformBuffer<LightingUbo>>,
    material_pool: DescriptorPool,
    material_layout: DescriptorSetLayout,
    frame_layout: DescriptorSetLayout,
    default_textures: DefaultTextures,
    slots: Vec<FrameSlot>,
    command_pool: CommandPool,

    depth_format: vk::Format,
    camera: Camera,
    lighting: LightingUbo,
    config: RendererConfig,
    recording: Option<Recording>,

    context: DeviceContext,
}

impl RenderCore {
    fn slot(&self, slot: usize) -> VulkanResult<&FrameSlot> {
        self.slots
            .get(slot)
            .ok_or_else(|| VulkanError::invalid(format!("frame slot {slot} out of range")))
    }

    fn build_pipeline(&self, render_pass: &RenderPass) -> VulkanResult<Pipeline> {
        let device = self.context.device();
        let vertex = ShaderModule::from_file(device, &self.config.shaders.vertex_shader_path)?;
        let fragment = ShaderModule::from_file(device, &self.config.shaders.fragment_shader_path)?;

        PipelineBuilder::new()
            .viewport_extent(self.swapchain.extent())
            .dynamic_viewport(true)
            .cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
            .depth(true, true, vk::CompareOp::LESS)
            .descriptor_set_layouts(&[self.frame_layout.handle(), self.material_layout.handle()])
            .vertex_input::<Vertex>()
            .build_graphics(device, render_pass.handle(), &vertex, &fragment)
    }

    fn build_render_pass_and_pipeline(&mut self) -> VulkanResult<()> {
        let render_pass =
            RenderPass::new_forward_pass(self.context.device(), self.swapchain.format().format, self.depth_format)?;
        let pipeline = self.build_pipeline(&render_pass);
        self.render_pass = Some(render_pass);
        self.pipeline = Some(pipeline?);
        Ok(())
    }

    /// Create the swapchain and everything sized by it
    fn build_swapchain_dependents(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.swapchain.initialize(extent)?;
        self.build_render_pass_and_pipeline()?;

        let extent = self.swapchain.extent();
        let depth = self.depth.insert(GpuImage::depth(&self.context, extent, self.depth_format)?);
        let depth_view = depth.view();
        let render_pass = self
            .render_pass
            .as_ref()
            .map(RenderPass::handle)
            .ok_or_else(|| VulkanError::invalid("render pass missing after creation"))?;
        self.swapchain.create_framebuffers(depth_view, render_pass)?;

        self.camera.set_viewport(extent.width, extent.height);
        let image_count = self.swapchain.image_count();
        self.camera_buffers = uniform_ring(&self.context, image_count, &CameraUbo::from_camera(&self.camera))?;

        let device = self.context.device();
        let pool = self
            .frame_pool
            .insert(DescriptorPool::for_frame_sets(device, image_count as u32)?);
        self.frame_sets = pool.allocate(&vec![self.frame_layout.handle(); image_count])?;

        let mut writer = DescriptorSetWriter::new();
        for (&set, buffer) in self.frame_sets.iter().zip(&self.camera_buffers) {
            writer = writer.write_buffer(set, frame_bindings::CAMERA, buffer.descriptor_info());
        }
        writer.update(device);

        log::debug!("Swapchain dependents built for {} images", image_count);
        Ok(())
    }

    /// Release swapchain dependents in reverse creation order
    fn destroy_swapchain_dependents(&mut self) {
        self.swapchain.destroy_framebuffers();
        self.depth = None;
        self.pipeline = None;
        self.render_pass = None;
        self.camera_buffers.clear();
        self.frame_sets.clear();
        self.frame_pool = None;
        self.swapchain.cleanup();
    }

    fn record_draw(&self, drawable: &dyn Drawable) -> VulkanResult<()> {
        let recording = self
            .recording
            .ok_or_else(|| VulkanError::invalid("draw called outside of a frame"))?;
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| VulkanError::invalid("no pipeline bound"))?;
        let material_set = drawable.descriptor_set(recording.slot).ok_or_else(|| {
            VulkanError::invalid(format!("drawable has no descriptor set for frame slot {}", recording.slot))
        })?;

        let device = self.context.device();
        let command_buffer = recording.command_buffer;
        unsafe {
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout(),
                1,
                &[material_set],
                &[],
            );
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[drawable.vertex_buffer()], &[0]);
            device.cmd_bind_index_buffer(command_buffer, drawable.index_buffer(), 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(command_buffer, drawable.index_count(), 1, 0, 0, 0);
        }
        Ok(())
    }
}

impl FrameBackend for RenderCore {
    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.sync.in_flight.wait(u64::MAX)
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.sync.image_available.handle();
        self.swapchain.acquire_next_image(semaphore)
    }

    fn update_frame_uniforms(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let camera_buffer = self
            .camera_buffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::invalid(format!("no camera buffer for image {image_index}")))?;
        camera_buffer.update(&CameraUbo::from_camera(&self.camera))?;

        if let Some(lighting_buffer) = self.lighting_buffers.get(slot) {
            lighting_buffer.update(&self.lighting)?;
        }
        Ok(())
    }

    fn begin_recording(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let command_buffer = self.slot(slot)?.command_buffer;
        let framebuffer = self
            .swapchain
            .framebuffer(image_index as usize)
            .ok_or_else(|| VulkanError::invalid(format!("no framebuffer for image {image_index}")))?;
        let frame_set = self
            .frame_sets
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| VulkanError::invalid(format!("no frame descriptor set for image {image_index}")))?;
        let (render_pass, pipeline) = match (&self.render_pass, &self.pipeline) {
            (Some(render_pass), Some(pipeline)) => (render_pass, pipeline),
            _ => return Err(VulkanError::invalid("recording requires a render pass and pipeline")),
        };

        let device = self.context.device();
        let extent = self.swapchain.extent();

        unsafe { device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty()) }
            .map_err(VulkanError::api("vkResetCommandBuffer"))?;
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(VulkanError::api("vkBeginCommandBuffer"))?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[render_area]);
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout(),
                0,
                &[frame_set],
                &[],
            );
        }

        self.recording = Some(Recording { slot, command_buffer });
        Ok(())
    }

    fn end_recording(&mut self, slot: usize) -> VulkanResult<()> {
        let recording = self
            .recording
            .take()
            .filter(|recording| recording.slot == slot)
            .ok_or_else(|| VulkanError::invalid(format!("frame slot {slot} is not recording")))?;

        let device = self.context.device();
        unsafe {
            device.cmd_end_render_pass(recording.command_buffer);
            device.end_command_buffer(recording.command_buffer)
        }
        .map_err(VulkanError::api("vkEndCommandBuffer"))
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = self.slot(slot)?;
        frame.sync.in_flight.reset()?;

        let wait_semaphores = [frame.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], frame.sync.in_flight.handle())
        }
        .map_err(VulkanError::api("vkQueueSubmit"))
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let render_finished = self.slot(slot)?.sync.render_finished.handle();
        self.swapchain
            .queue_present(self.context.present_queue(), render_finished, image_index)
    }

    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.context.wait_idle()?;
        self.destroy_swapchain_dependents();
        self.build_swapchain_dependents(extent)
    }

    fn reload_shaders(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()?;
        self.pipeline = None;
        self.render_pass = None;
        // Same formats, so the new pass stays compatible with the framebuffers.
        self.build_render_pass_and_pipeline()
    }
}

impl Drop for RenderCore {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait before renderer teardown failed: {e}");
        }
        self.destroy_swapchain_dependents();
        log::debug!("Renderer resources released");
    }
}

/// Forward renderer driving a window's swapchain
///
/// Meshes created through the renderer hold descriptor sets from its pool and
/// must be dropped before it.
pub struct VulkanRenderer {
    scheduler: FrameScheduler,
    core: RenderCore,
}

impl VulkanRenderer {
    /// Set up the device, swapchain and forward pipeline for `window`
    pub fn new(window: &mut dyn VulkanSurfaceSource, config: &RendererConfig) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let extent = super::state::wait_for_nonzero_extent(window);
        let frames_in_flight = config.max_frames_in_flight;

        let context = DeviceContext::new(window, config)?;
        let device = context.raw_device();

        let command_pool = CommandPool::new(
            device.clone(),
            context.queue_families().graphics,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let slots = FrameSlot::create_ring(&device, command_pool.allocate_command_buffers(frames_in_flight as u32)?)?;

        let frame_layout = DescriptorSetLayout::frame(&device)?;
        let material_layout = DescriptorSetLayout::material(&device)?;
        let material_pool = DescriptorPool::for_material_sets(
            &device,
            material_set_count(config.max_drawables, frames_in_flight)?,
        )?;
        let default_textures = DefaultTextures::new(&context)?;
        let lighting = LightingUbo::default();
        let lighting_buffers = uniform_ring(&context, frames_in_flight, &lighting)?;
        let depth_format = context.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let swapchain = SwapchainManager::new(&context)?;

        let mut core = RenderCore {
            frame_sets: Vec::new(),
            frame_pool: None,
            camera_buffers: Vec::new(),
            depth: None,
            pipeline: None,
            render_pass: None,
            swapchain,
            lighting_buffers,
            material_pool,
            material_layout,
            frame_layout,
            default_textures,
            slots,
            command_pool,
            depth_format,
            camera: Camera::default(),
            lighting,
            config: config.clone(),
            recording: None,
            context,
        };
        core.build_swapchain_dependents(extent)?;

        let scheduler = FrameScheduler::new(frames_in_flight, core.swapchain.image_count())?;

        log::info!(
            "Vulkan renderer ready: {} frames in flight, {} swapchain images",
            frames_in_flight,
            core.swapchain.image_count()
        );
        Ok(Self { scheduler, core })
    }

    /// Start a frame; `None` means the swapchain was rebuilt and nothing should be drawn
    pub fn begin_frame(&mut self, window: &mut dyn WindowSurface) -> VulkanResult<Option<ActiveFrame>> {
        self.scheduler.begin_frame(&mut self.core, window)
    }

    /// Record an indexed draw of `drawable` into the active frame
    pub fn draw(&mut self, drawable: &dyn Drawable) -> VulkanResult<()> {
        self.core.record_draw(drawable)
    }

    /// Submit and present the active frame
    pub fn end_frame(&mut self, window: &mut dyn WindowSurface) -> VulkanResult<()> {
        self.scheduler.end_frame(&mut self.core, window)
    }

    /// Rebuild the pipeline from the shader files after the next present
    pub fn request_shader_reload(&mut self) {
        log::info!("Shader reload requested");
        self.scheduler.request(PendingRequests::RELOAD_SHADERS);
    }

    /// Rebuild the swapchain after the next present
    pub fn request_swapchain_recreation(&mut self) {
        self.scheduler.request(PendingRequests::RECREATE_SWAPCHAIN);
    }

    /// The frame currently being recorded
    pub fn active_frame(&self) -> Option<ActiveFrame> {
        self.scheduler.active()
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.scheduler.frames_in_flight()
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.core.swapchain.extent()
    }

    /// Camera used for the next frame's uniforms
    pub fn camera(&self) -> &Camera {
        &self.core.camera
    }

    /// Mutable camera; the aspect ratio is overwritten on swapchain rebuilds
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.core.camera
    }

    /// Lighting written into each slot's lighting buffer from the next frame on
    pub fn set_lighting(&mut self, lighting: LightingUbo) {
        self.core.lighting = lighting;
    }

    /// Device context for creating resources
    pub fn context(&self) -> &DeviceContext {
        &self.core.context
    }

    /// Upload decoded pixels as a sampled texture
    pub fn create_texture(&self, data: &TextureData, color_space: ColorSpace) -> VulkanResult<Arc<Texture>> {
        Texture::from_data(&self.core.context, data, color_space).map(Arc::new)
    }

    /// Borrow what drawables need to allocate their material sets
    pub fn material_binder(&mut self) -> MaterialBinder<'_> {
        let core = &mut self.core;
        MaterialBinder {
            context: &core.context,
            pool: &mut core.material_pool,
            layout: core.material_layout.handle(),
            lighting: &core.lighting_buffers,
            defaults: &core.default_textures,
        }
    }

    /// Upload `data` and bind `material` for every frame slot
    pub fn create_mesh(&mut self, data: &MeshData, material: Material) -> VulkanResult<Mesh> {
        Mesh::new(&mut self.material_binder(), data, material)
    }

    /// Block until the GPU is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.core.context.wait_idle()
    }
}
