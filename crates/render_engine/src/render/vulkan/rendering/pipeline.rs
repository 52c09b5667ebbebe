//! Pipeline construction
//!
//! [`PipelineBuilder`] collects fixed-function state, layouts and vertex
//! input, then produces a graphics or compute [`Pipeline`]. Pipelines are
//! immutable; shader reloads and swapchain rebuilds create new ones.

use super::shader::ShaderModule;
use super::vertex_layout::VertexLayout;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Color blending applied to the single color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Source replaces destination
    Opaque,
    /// Standard alpha blending
    Alpha,
    /// Source added to destination
    Additive,
}

impl BlendMode {
    /// Attachment state for this mode
    pub fn attachment_state(self) -> vk::PipelineColorBlendAttachmentState {
        let builder = vk::PipelineColorBlendAttachmentState::builder().color_write_mask(vk::ColorComponentFlags::RGBA);
        match self {
            Self::Opaque => builder.blend_enable(false),
            Self::Alpha => builder
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD),
            Self::Additive => builder
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE)
                .alpha_blend_op(vk::BlendOp::ADD),
        }
        .build()
    }
}

/// Accumulates pipeline state
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    topology: vk::PrimitiveTopology,
    extent: vk::Extent2D,
    dynamic_viewport: bool,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    samples: vk::SampleCountFlags,
    depth_test: bool,
    depth_write: bool,
    depth_compare: vk::CompareOp,
    blend: BlendMode,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constants: Vec<vk::PushConstantRange>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            extent: vk::Extent2D { width: 1, height: 1 },
            dynamic_viewport: false,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS,
            blend: BlendMode::Opaque,
            set_layouts: Vec::new(),
            push_constants: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    /// Triangle lists, back-face culling, depth test and write, opaque
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primitive topology
    #[must_use]
    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Fixed viewport and scissor covering `extent`
    #[must_use]
    pub fn viewport_extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    /// Leave viewport and scissor to be set while recording
    #[must_use]
    pub fn dynamic_viewport(mut self, dynamic: bool) -> Self {
        self.dynamic_viewport = dynamic;
        self
    }

    /// Fill, line or point rasterization
    #[must_use]
    pub fn polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    /// Which faces to cull and which winding is front-facing
    #[must_use]
    pub fn cull_mode(mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// Rasterization sample count
    #[must_use]
    pub fn multisampling(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// Depth test, depth write and compare operation
    #[must_use]
    pub fn depth(mut self, test: bool, write: bool, compare: vk::CompareOp) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self.depth_compare = compare;
        self
    }

    /// Color blending mode
    #[must_use]
    pub fn blend(mut self, mode: BlendMode) -> Self {
        self.blend = mode;
        self
    }

    /// Descriptor set layouts, in set order
    #[must_use]
    pub fn descriptor_set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }

    /// Add a push constant range
    #[must_use]
    pub fn push_constant_range(mut self, stages: vk::ShaderStageFlags, offset: u32, size: u32) -> Self {
        self.push_constants.push(vk::PushConstantRange {
            stage_flags: stages,
            offset,
            size,
        });
        self
    }

    /// Vertex input taken from a vertex type
    #[must_use]
    pub fn vertex_input<V: VertexLayout>(mut self) -> Self {
        self.vertex_bindings = vec![V::binding_description()];
        self.vertex_attributes = V::attribute_descriptions();
        self
    }

    /// Input assembly state
    pub fn input_assembly_info(&self) -> vk::PipelineInputAssemblyStateCreateInfo {
        vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(self.topology)
            .primitive_restart_enable(false)
            .build()
    }

    /// Rasterization state
    pub fn rasterization_info(&self) -> vk::PipelineRasterizationStateCreateInfo {
        vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false)
            .build()
    }

    /// Depth and stencil state
    pub fn depth_stencil_info(&self) -> vk::PipelineDepthStencilStateCreateInfo {
        vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .build()
    }

    /// Dynamic states the pipeline expects to be set while recording
    pub fn dynamic_states(&self) -> Vec<vk::DynamicState> {
        if self.dynamic_viewport {
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        } else {
            Vec::new()
        }
    }

    /// Viewport covering the configured extent
    pub fn viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    fn create_layout_and_cache(&self, device: &Device) -> VulkanResult<(vk::PipelineLayout, vk::PipelineCache)> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(&self.push_constants);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(VulkanError::api("vkCreatePipelineLayout"))?;

        let cache_info = vk::PipelineCacheCreateInfo::builder();
        match unsafe { device.create_pipeline_cache(&cache_info, None) } {
            Ok(cache) => Ok((layout, cache)),
            Err(result) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(VulkanError::api("vkCreatePipelineCache")(result))
            }
        }
    }

    /// Build a graphics pipeline for subpass 0 of `render_pass`
    pub fn build_graphics(
        &self,
        device: &Device,
        render_pass: vk::RenderPass,
        vertex: &ShaderModule,
        fragment: &ShaderModule,
    ) -> VulkanResult<Pipeline> {
        let stages = [
            vertex.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);
        let input_assembly = self.input_assembly_info();

        let viewports = [self.viewport()];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = self.rasterization_info();
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(self.samples);
        let depth_stencil = self.depth_stencil_info();

        let blend_attachments = [self.blend.attachment_state()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = self.dynamic_states();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let (layout, cache) = self.create_layout_and_cache(device)?;

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let created = unsafe { device.create_graphics_pipelines(cache, &[create_info], None) };
        let pipeline = Pipeline::finish(device, created, layout, cache, vk::PipelineBindPoint::GRAPHICS)?;
        log::debug!("Built graphics pipeline");
        Ok(pipeline)
    }

    /// Build a compute pipeline; only layouts and push constants are used
    pub fn build_compute(&self, device: &Device, compute: &ShaderModule) -> VulkanResult<Pipeline> {
        let (layout, cache) = self.create_layout_and_cache(device)?;

        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(compute.stage_info(vk::ShaderStageFlags::COMPUTE))
            .layout(layout)
            .build();

        let created = unsafe { device.create_compute_pipelines(cache, &[create_info], None) };
        let pipeline = Pipeline::finish(device, created, layout, cache, vk::PipelineBindPoint::COMPUTE)?;
        log::debug!("Built compute pipeline");
        Ok(pipeline)
    }
}

/// Pipeline, its layout and its cache, destroyed together
pub struct Pipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    cache: vk::PipelineCache,
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    fn finish(
        device: &Device,
        created: Result<Vec<vk::Pipeline>, (Vec<vk::Pipeline>, vk::Result)>,
        layout: vk::PipelineLayout,
        cache: vk::PipelineCache,
        bind_point: vk::PipelineBindPoint,
    ) -> VulkanResult<Self> {
        let release = || unsafe {
            device.destroy_pipeline_cache(cache, None);
            device.destroy_pipeline_layout(layout, None);
        };

        match created {
            Ok(pipelines) => match pipelines.into_iter().next() {
                Some(pipeline) => Ok(Self {
                    device: device.clone(),
                    pipeline,
                    layout,
                    cache,
                    bind_point,
                }),
                None => {
                    release();
                    Err(VulkanError::invalid("driver returned no pipeline"))
                }
            },
            Err((partial, result)) => {
                for pipeline in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    unsafe { device.destroy_pipeline(pipeline, None) };
                }
                release();
                Err(VulkanError::api("vkCreatePipelines")(result))
            }
        }
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Graphics or compute
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device.destroy_pipeline_cache(self.cache, None);
        }
    }
}
