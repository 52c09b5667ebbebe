//! Descriptor set layouts, budgeted pools and batched writes
//!
//! Two layouts are used by the forward pipeline:
//!
//! - set 0, per swapchain image: camera uniform buffer
//! - set 1, per drawable and frame slot: transform and lighting uniform
//!   buffers plus albedo, normal, metallic-roughness and ambient-occlusion
//!   samplers

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Binding indices of the per-frame set
pub mod frame_bindings {
    /// Camera uniform buffer
    pub const CAMERA: u32 = 0;
}

/// Binding indices of the per-drawable material set
pub mod material_bindings {
    /// Per-draw transform uniform buffer
    pub const OBJECT: u32 = 0;
    /// Lighting uniform buffer
    pub const LIGHTING: u32 = 1;
    /// Albedo map
    pub const ALBEDO: u32 = 2;
    /// Tangent-space normal map
    pub const NORMAL: u32 = 3;
    /// Metallic-roughness map
    pub const METALLIC_ROUGHNESS: u32 = 4;
    /// Ambient-occlusion map
    pub const AMBIENT_OCCLUSION: u32 = 5;

    /// Uniform buffers per material set
    pub const UNIFORM_BUFFER_COUNT: u32 = 2;
    /// Samplers per material set
    pub const SAMPLER_COUNT: u32 = 4;
}

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a uniform buffer binding
    #[must_use]
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    #[must_use]
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    /// Add a storage buffer binding
    #[must_use]
    pub fn add_storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::STORAGE_BUFFER, stage_flags)
    }

    /// Bindings accumulated so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::api("vkCreateDescriptorSetLayout"))?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Layout for set 0
    pub fn frame(device: &Device) -> VulkanResult<Self> {
        DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(
                frame_bindings::CAMERA,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )
            .build(device)
    }

    /// Layout for set 1
    pub fn material(device: &Device) -> VulkanResult<Self> {
        DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(material_bindings::OBJECT, vk::ShaderStageFlags::VERTEX)
            .add_uniform_buffer(material_bindings::LIGHTING, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(material_bindings::ALBEDO, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(material_bindings::NORMAL, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(material_bindings::METALLIC_ROUGHNESS, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(material_bindings::AMBIENT_OCCLUSION, vk::ShaderStageFlags::FRAGMENT)
            .build(device)
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_set_layout(self.layout, None) };
    }
}

/// Material sets needed for `max_drawables` drawables across `frames_in_flight` slots
pub fn material_set_count(max_drawables: u32, frames_in_flight: usize) -> VulkanResult<u32> {
    u32::try_from(frames_in_flight)
        .ok()
        .and_then(|frames| max_drawables.checked_mul(frames))
        .ok_or_else(|| {
            VulkanError::invalid(format!(
                "{max_drawables} drawables over {frames_in_flight} frames overflows the material pool size"
            ))
        })
}

/// Per-type descriptor counts for a pool of `count` material sets
pub fn material_pool_sizes(count: u32) -> VulkanResult<[vk::DescriptorPoolSize; 2]> {
    let scaled = |per_set: u32| {
        count
            .checked_mul(per_set)
            .ok_or_else(|| VulkanError::invalid(format!("{count} material sets overflow the descriptor count")))
    };
    Ok([
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: scaled(material_bindings::UNIFORM_BUFFER_COUNT)?,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: scaled(material_bindings::SAMPLER_COUNT)?,
        },
    ])
}

/// Number of sets a pool may still hand out
///
/// Pools are never grown; asking for more than the remaining budget is an
/// error rather than a partial allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBudget {
    capacity: u32,
    allocated: u32,
}

impl DescriptorBudget {
    /// Budget of `capacity` sets
    pub fn new(capacity: u32) -> Self {
        Self { capacity, allocated: 0 }
    }

    /// Claim `count` sets, or fail without claiming any
    pub fn reserve(&mut self, count: u32) -> VulkanResult<()> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(VulkanError::DescriptorPoolExhausted {
                requested: count,
                remaining,
                capacity: self.capacity,
            });
        }
        self.allocated += count;
        Ok(())
    }

    /// Sets still available
    pub fn remaining(&self) -> u32 {
        self.capacity - self.allocated
    }

    /// Sets the pool was created with
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Descriptor pool that refuses to allocate past its budget
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
    budget: DescriptorBudget,
}

impl DescriptorPool {
    /// Create a pool for `max_sets` sets with the given per-type descriptor counts
    pub fn new(device: &Device, max_sets: u32, pool_sizes: &[vk::DescriptorPoolSize]) -> VulkanResult<Self> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::api("vkCreateDescriptorPool"))?;

        log::debug!("Created descriptor pool for {max_sets} sets");

        Ok(Self {
            pool,
            device: device.clone(),
            budget: DescriptorBudget::new(max_sets),
        })
    }

    /// Pool for `count` per-frame sets
    pub fn for_frame_sets(device: &Device, count: u32) -> VulkanResult<Self> {
        let sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: count,
        }];
        Self::new(device, count, &sizes)
    }

    /// Pool for `count` material sets
    pub fn for_material_sets(device: &Device, count: u32) -> VulkanResult<Self> {
        Self::new(device, count, &material_pool_sizes(count)?)
    }

    /// Allocate one set per entry in `layouts`
    pub fn allocate(&mut self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let count = u32::try_from(layouts.len()).map_err(|_| VulkanError::invalid("too many descriptor sets"))?;
        self.budget.reserve(count)?;

        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::api("vkAllocateDescriptorSets"))
    }

    /// Remaining allocation budget
    pub fn budget(&self) -> DescriptorBudget {
        self.budget
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
    }
}

enum PendingWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        set: vk::DescriptorSet,
        binding: u32,
        info: vk::DescriptorImageInfo,
    },
}

/// Batches descriptor writes and applies them in one update call
///
/// Infos are stored by value and the `vk::WriteDescriptorSet` array is only
/// built in [`DescriptorSetWriter::update`], once no more entries can be
/// pushed, so the info pointers stay valid.
#[derive(Default)]
pub struct DescriptorSetWriter {
    pending: Vec<PendingWrite>,
}

impl DescriptorSetWriter {
    /// Create a new descriptor set writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a whole uniform buffer to `binding`
    #[must_use]
    pub fn write_buffer(mut self, set: vk::DescriptorSet, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        self.pending.push(PendingWrite::Buffer { set, binding, info });
        self
    }

    /// Write a combined image sampler to `binding`
    #[must_use]
    pub fn write_image(mut self, set: vk::DescriptorSet, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        self.pending.push(PendingWrite::Image { set, binding, info });
        self
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn writes(&self) -> Vec<vk::WriteDescriptorSet> {
        self.pending
            .iter()
            .map(|write| match write {
                PendingWrite::Buffer { set, binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(info))
                    .build(),
                PendingWrite::Image { set, binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
                    .build(),
            })
            .collect()
    }

    /// Execute all write operations
    pub fn update(self, device: &Device) {
        let writes = self.writes();
        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn budget_counts_down_to_zero() {
        let mut budget = DescriptorBudget::new(4);
        budget.reserve(3).unwrap();
        budget.reserve(1).unwrap();
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.capacity(), 4);
    }

    #[test]
    fn exhausted_budget_fails_without_partial_allocation() {
        let mut budget = DescriptorBudget::new(4);
        budget.reserve(3).unwrap();

        let err = budget.reserve(2).unwrap_err();
        assert!(matches!(
            err,
            VulkanError::DescriptorPoolExhausted { requested: 2, remaining: 1, capacity: 4 }
        ));
        assert_eq!(budget.remaining(), 1, "a failed reserve must not consume sets");
        budget.reserve(1).unwrap();
    }

    #[test]
    fn material_set_count_scales_by_frames() {
        assert_eq!(material_set_count(64, 2).unwrap(), 128);
        assert!(matches!(
            material_set_count(u32::MAX, 2),
            Err(VulkanError::InvalidOperation { .. })
        ));
        assert!(material_set_count(1, usize::MAX).is_err());
    }

    #[test]
    fn material_pool_sizes_cover_every_binding() {
        let sizes = material_pool_sizes(10).unwrap();
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 10 * material_bindings::UNIFORM_BUFFER_COUNT);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 10 * material_bindings::SAMPLER_COUNT);
    }

    #[test]
    fn oversized_material_pool_is_an_error_not_a_wrap() {
        assert!(material_pool_sizes(u32::MAX / 2).is_err());
        assert!(material_pool_sizes(u32::MAX / material_bindings::SAMPLER_COUNT).is_ok());
    }

    #[test]
    fn layout_builder_accumulates_bindings_in_order() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
            .add_storage_buffer(2, vk::ShaderStageFlags::COMPUTE);

        let types: Vec<_> = builder.bindings().iter().map(|b| (b.binding, b.descriptor_type)).collect();
        assert_eq!(
            types,
            vec![
                (0, vk::DescriptorType::UNIFORM_BUFFER),
                (1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
                (2, vk::DescriptorType::STORAGE_BUFFER),
            ]
        );
        assert!(builder.bindings().iter().all(|b| b.descriptor_count == 1));
    }

    #[test]
    fn writes_point_at_their_own_infos() {
        let set = vk::DescriptorSet::from_raw(0x10);
        let mut writer = DescriptorSetWriter::new();
        for i in 0..64u64 {
            let info = vk::DescriptorBufferInfo {
                buffer: vk::Buffer::from_raw(0x100 + i),
                offset: 0,
                range: vk::WHOLE_SIZE,
            };
            writer = writer.write_buffer(set, i as u32, info);
        }
        writer = writer.write_image(
            set,
            99,
            vk::DescriptorImageInfo {
                sampler: vk::Sampler::from_raw(0x5),
                image_view: vk::ImageView::from_raw(0x6),
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        );
        assert_eq!(writer.len(), 65);

        let writes = writer.writes();
        for (i, write) in writes.iter().take(64).enumerate() {
            assert_eq!(write.descriptor_count, 1);
            assert_eq!(write.dst_binding, i as u32);
            let info = unsafe { &*write.p_buffer_info };
            assert_eq!(info.buffer.as_raw(), 0x100 + i as u64);
        }

        let image = &writes[64];
        assert_eq!(image.descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(unsafe { &*image.p_image_info }.image_view.as_raw(), 0x6);
    }
}
