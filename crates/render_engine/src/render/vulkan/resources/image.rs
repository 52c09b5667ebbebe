//! GPU images and layout transitions
//!
//! Only a closed set of layout transitions is supported; each maps to fixed
//! access masks and pipeline stages. Anything else is rejected before a
//! barrier is recorded.

use super::buffer::allocate_memory;
use crate::render::vulkan::initialization::DeviceContext;
use crate::render::vulkan::rendering::commands::SingleTimeCommands;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Layouts a sampled image passes through during upload
pub const SAMPLED_UPLOAD_SEQUENCE: [vk::ImageLayout; 3] = [
    vk::ImageLayout::UNDEFINED,
    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
];

/// Barrier parameters for one supported layout change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    /// Layout before the barrier
    pub old_layout: vk::ImageLayout,
    /// Layout after the barrier
    pub new_layout: vk::ImageLayout,
    /// Writes that must be available before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait on the transition
    pub dst_access: vk::AccessFlags,
    /// Stage producing `src_access`
    pub src_stage: vk::PipelineStageFlags,
    /// Stage consuming `dst_access`
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Barrier parameters for `old -> new`, or an error for unsupported pairs
    pub fn between(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<Self> {
        let (src_access, dst_access, src_stage, dst_stage) = match (old, new) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            ),
            _ => return Err(VulkanError::UnsupportedLayoutTransition { from: old, to: new }),
        };

        Ok(Self {
            old_layout: old,
            new_layout: new,
            src_access,
            dst_access,
            src_stage,
            dst_stage,
        })
    }

    /// Resolve every step of a layout sequence, failing on the first unsupported step
    pub fn sequence(layouts: &[vk::ImageLayout]) -> VulkanResult<Vec<Self>> {
        layouts.windows(2).map(|pair| Self::between(pair[0], pair[1])).collect()
    }
}

/// Whether `format` carries a stencil component
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(format, vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT)
}

/// Aspect mask covering every component of `format`
pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM => vk::ImageAspectFlags::DEPTH,
        f if has_stencil_component(f) => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Creation parameters for a 2D image
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: vk::Format,
    /// Tiling mode
    pub tiling: vk::ImageTiling,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
}

/// Image handle, its memory and a view over all of it
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    desc: ImageDesc,
    layout: vk::ImageLayout,
}

impl GpuImage {
    /// Create a device-local image in UNDEFINED layout with a full view
    pub fn new(context: &DeviceContext, desc: ImageDesc) -> VulkanResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(VulkanError::invalid(format!(
                "image extent {}x{} has no area",
                desc.width, desc.height
            )));
        }

        let device = context.device();
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.create_image(&image_info, None) }.map_err(VulkanError::api("vkCreateImage"))?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate_memory(context, requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let view = unsafe { device.bind_image_memory(image, memory, 0) }
            .map_err(VulkanError::api("vkBindImageMemory"))
            .and_then(|()| create_view(device, image, desc.format, aspect_mask(desc.format)));
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        log::debug!("Created {}x{} {:?} image", desc.width, desc.height, desc.format);

        Ok(Self {
            device: context.raw_device(),
            image,
            memory,
            view,
            desc,
            layout: vk::ImageLayout::UNDEFINED,
        })
    }

    /// Depth attachment of `format` matching `extent`, already in attachment layout
    ///
    /// `format` must be the one the render pass was created with.
    pub fn depth(context: &DeviceContext, extent: vk::Extent2D, format: vk::Format) -> VulkanResult<Self> {
        if !aspect_mask(format).contains(vk::ImageAspectFlags::DEPTH) {
            return Err(VulkanError::invalid(format!("{format:?} is not a depth format")));
        }

        let mut image = Self::new(
            context,
            ImageDesc {
                width: extent.width,
                height: extent.height,
                format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            },
        )?;
        image.transition_layout(context, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)?;
        Ok(image)
    }

    /// Record a layout barrier into `command_buffer` and track the new layout
    pub fn record_transition(
        &mut self,
        device: &Device,
        command_buffer: vk::CommandBuffer,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let transition = LayoutTransition::between(self.layout, new_layout)?;

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(transition.old_layout)
            .new_layout(transition.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(self.full_range())
            .src_access_mask(transition.src_access)
            .dst_access_mask(transition.dst_access)
            .build();

        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                transition.src_stage,
                transition.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }

        self.layout = new_layout;
        Ok(())
    }

    /// Transition with a single-use command buffer and wait for it
    pub fn transition_layout(&mut self, context: &DeviceContext, new_layout: vk::ImageLayout) -> VulkanResult<()> {
        LayoutTransition::between(self.layout, new_layout)?;
        let commands = SingleTimeCommands::begin(context)?;
        self.record_transition(context.device(), commands.command_buffer(), new_layout)?;
        commands.submit_and_wait()
    }

    /// Record a copy of tightly packed texels from `buffer` into the whole image
    pub fn record_copy_from_buffer(&self, device: &Device, command_buffer: vk::CommandBuffer, buffer: vk::Buffer) -> VulkanResult<()> {
        if self.layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL {
            return Err(VulkanError::invalid(format!(
                "buffer copy needs TRANSFER_DST_OPTIMAL, image is {:?}",
                self.layout
            )));
        }

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: aspect_mask(self.desc.format),
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: self.desc.width,
                height: self.desc.height,
                depth: 1,
            })
            .build();

        unsafe {
            device.cmd_copy_buffer_to_image(command_buffer, buffer, self.image, self.layout, &[region]);
        }
        Ok(())
    }

    fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_mask(self.desc.format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View covering the whole image
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Texel format
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    /// Size in texels
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.desc.width,
            height: self.desc.height,
        }
    }

    /// Layout as of the last recorded transition
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Create a 2D view over the first mip level and layer
pub fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> VulkanResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&view_info, None) }.map_err(VulkanError::api("vkCreateImageView"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUTS: [vk::ImageLayout; 10] = [
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::GENERAL,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::PREINITIALIZED,
        vk::ImageLayout::PRESENT_SRC_KHR,
    ];

    #[test]
    fn exactly_three_layout_pairs_are_supported() {
        let mut supported = Vec::new();
        for &from in &LAYOUTS {
            for &to in &LAYOUTS {
                match LayoutTransition::between(from, to) {
                    Ok(_) => supported.push((from, to)),
                    Err(VulkanError::UnsupportedLayoutTransition { from: f, to: t }) => {
                        assert_eq!((f, t), (from, to));
                    }
                    Err(other) => panic!("unexpected error {other}"),
                }
            }
        }

        assert_eq!(
            supported,
            vec![
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
                (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            ]
        );
    }

    #[test]
    fn upload_transitions_use_transfer_then_fragment_stages() {
        let to_transfer =
            LayoutTransition::between(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(to_transfer.src_access, vk::AccessFlags::empty());
        assert_eq!(to_transfer.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_transfer.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(to_transfer.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_sampled =
            LayoutTransition::between(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .unwrap();
        assert_eq!(to_sampled.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_sampled.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(to_sampled.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn depth_transition_targets_early_fragment_tests() {
        let depth =
            LayoutTransition::between(vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .unwrap();
        assert!(depth.dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn sampled_upload_sequence_is_valid() {
        let steps = LayoutTransition::sequence(&SAMPLED_UPLOAD_SEQUENCE).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn sequence_stops_at_first_unsupported_step() {
        let err = LayoutTransition::sequence(&[
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            VulkanError::UnsupportedLayoutTransition {
                from: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                to: vk::ImageLayout::PRESENT_SRC_KHR,
            }
        ));
    }

    #[test]
    fn aspect_masks_follow_format() {
        assert_eq!(aspect_mask(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_mask(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_mask(vk::Format::R8G8B8A8_SRGB), vk::ImageAspectFlags::COLOR);
    }
}
