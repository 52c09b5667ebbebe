//! Mesh data and GPU meshes
//!
//! [`MeshData`] is plain CPU-side geometry. [`Mesh`] uploads it to
//! device-local buffers and owns one transform buffer and material set per
//! frame slot, so updating the transform for the current slot never touches
//! memory the GPU may still be reading for another frame.

use crate::foundation::math::Mat4;
use crate::render::uniforms::ObjectUbo;
use crate::render::vulkan::rendering::VertexLayout;
use crate::render::vulkan::resources::{uniform_ring, GpuBuffer, Material, MaterialBinder, UniformBuffer};
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Vertex with position, normal and texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space unit normal
    pub normal: [f32; 3],
    /// Texture coordinates, origin top-left
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }
}

impl VertexLayout for Vertex {
    fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
        ]
    }
}

/// Indexed triangle list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Triangle indices into `vertices`, counter-clockwise front faces
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Geometry from vertices and indices
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit cube centered on the origin with per-face normals and UVs
    pub fn cube() -> Self {
        // (normal, u axis, v axis) with u x v = normal, so corners wind CCW from outside.
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        const CORNERS: [(f32, f32, [f32; 2]); 4] = [
            (-0.5, -0.5, [0.0, 1.0]),
            (0.5, -0.5, [1.0, 1.0]),
            (0.5, 0.5, [1.0, 0.0]),
            (-0.5, 0.5, [0.0, 0.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in FACES {
            let base = vertices.len() as u32;
            for (su, sv, tex_coord) in CORNERS {
                let position = [0, 1, 2].map(|i| normal[i] * 0.5 + u[i] * su + v[i] * sv);
                vertices.push(Vertex::new(position, normal, tex_coord));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }

    /// Check that there is something to draw and every index is in range
    pub fn validate(&self) -> VulkanResult<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(VulkanError::invalid("mesh has no vertices or no indices"));
        }
        if self.indices.len() % 3 != 0 {
            return Err(VulkanError::invalid(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            return Err(VulkanError::invalid(format!(
                "index {index} out of range for {} vertices",
                self.vertices.len()
            )));
        }
        Ok(())
    }
}

/// Something the renderer can record an indexed draw for
pub trait Drawable {
    /// Vertex buffer bound at binding 0
    fn vertex_buffer(&self) -> vk::Buffer;

    /// 32-bit index buffer
    fn index_buffer(&self) -> vk::Buffer;

    /// Number of indices to draw
    fn index_count(&self) -> u32;

    /// Material set (set 1) for `frame_slot`
    fn descriptor_set(&self, frame_slot: usize) -> Option<vk::DescriptorSet>;
}

/// Mesh resident on the GPU with per-slot transforms and material sets
///
/// Must be dropped before the renderer whose pool its descriptor sets came from.
pub struct Mesh {
    descriptor_sets: Vec<vk::DescriptorSet>,
    transforms: Vec<UniformBuffer<ObjectUbo>>,
    index_buffer: GpuBuffer,
    vertex_buffer: GpuBuffer,
    index_count: u32,
    material: Material,
    device: ash::Device,
}

impl Mesh {
    /// Upload `data` and bind `material` for every frame slot
    pub fn new(binder: &mut MaterialBinder<'_>, data: &MeshData, material: Material) -> VulkanResult<Self> {
        data.validate()?;
        let context = binder.context();

        let vertex_buffer = GpuBuffer::device_local_with_data(
            context,
            bytemuck::cast_slice(&data.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = GpuBuffer::device_local_with_data(
            context,
            bytemuck::cast_slice(&data.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        let transforms = uniform_ring(context, binder.frames_in_flight(), &ObjectUbo::default())?;
        let descriptor_sets = binder.bind(&transforms, &material)?;

        log::debug!(
            "Created mesh: {} vertices, {} indices",
            data.vertices.len(),
            data.indices.len()
        );

        Ok(Self {
            descriptor_sets,
            transforms,
            index_buffer,
            vertex_buffer,
            index_count: data.indices.len() as u32,
            material,
            device: context.raw_device(),
        })
    }

    /// Write the model matrix used when drawing in `frame_slot`
    pub fn update_transform(&self, frame_slot: usize, model: &Mat4) -> VulkanResult<()> {
        self.transforms
            .get(frame_slot)
            .ok_or_else(|| VulkanError::invalid(format!("frame slot {frame_slot} out of range")))?
            .update(&ObjectUbo::from_model(model))
    }

    /// Material the sets were written with
    pub fn material(&self) -> &Material {
        &self.material
    }
}

impl Drawable for Mesh {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }

    fn descriptor_set(&self, frame_slot: usize) -> Option<vk::DescriptorSet> {
        self.descriptor_sets.get(frame_slot).copied()
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        // In-flight frames may still read the buffers.
        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            log::error!("Device wait before mesh release failed: {e}");
        }
    }
}
