//! Material descriptor binding
//!
//! Allocates a material set per frame slot for a drawable and writes its
//! transform buffer, the lighting buffer of that slot, and four texture maps
//! with fallbacks for the missing ones.

use super::descriptor_set::{material_bindings, DescriptorPool, DescriptorSetWriter};
use super::texture::{DefaultTextures, Texture};
use super::uniform_buffer::UniformBuffer;
use crate::render::uniforms::{LightingUbo, ObjectUbo};
use crate::render::vulkan::initialization::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use std::sync::Arc;

/// Texture maps of a surface; `None` binds the matching fallback
#[derive(Clone, Default)]
pub struct Material {
    /// Base color, sRGB
    pub albedo: Option<Arc<Texture>>,
    /// Tangent-space normal map, linear
    pub normal: Option<Arc<Texture>>,
    /// Metallic (B) and roughness (G), linear
    pub metallic_roughness: Option<Arc<Texture>>,
    /// Ambient occlusion (R), linear
    pub ambient_occlusion: Option<Arc<Texture>>,
}

impl Material {
    /// Material with only an albedo map
    pub fn with_albedo(albedo: Arc<Texture>) -> Self {
        Self {
            albedo: Some(albedo),
            ..Self::default()
        }
    }

    /// Texture per sampler binding, fallbacks substituted
    pub fn resolve<'a>(&'a self, defaults: &'a DefaultTextures) -> [(u32, &'a Texture); 4] {
        fn pick<'t>(texture: &'t Option<Arc<Texture>>, fallback: &'t Arc<Texture>) -> &'t Texture {
            texture.as_deref().unwrap_or_else(|| fallback.as_ref())
        }
        [
            (material_bindings::ALBEDO, pick(&self.albedo, &defaults.white)),
            (material_bindings::NORMAL, pick(&self.normal, &defaults.flat_normal)),
            (material_bindings::METALLIC_ROUGHNESS, pick(&self.metallic_roughness, &defaults.white)),
            (material_bindings::AMBIENT_OCCLUSION, pick(&self.ambient_occlusion, &defaults.white)),
        ]
    }
}

/// Borrowed view of the renderer state needed to set up material sets
pub struct MaterialBinder<'a> {
    pub(crate) context: &'a DeviceContext,
    pub(crate) pool: &'a mut DescriptorPool,
    pub(crate) layout: vk::DescriptorSetLayout,
    pub(crate) lighting: &'a [UniformBuffer<LightingUbo>],
    pub(crate) defaults: &'a DefaultTextures,
}

impl<'a> MaterialBinder<'a> {
    /// Device context for creating the drawable's buffers
    pub fn context(&self) -> &'a DeviceContext {
        self.context
    }

    /// Number of frame slots, and so of sets per drawable
    pub fn frames_in_flight(&self) -> usize {
        self.lighting.len()
    }

    /// Allocate and fill one material set per frame slot
    pub fn bind(
        &mut self,
        transforms: &[UniformBuffer<ObjectUbo>],
        material: &Material,
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        if transforms.len() != self.lighting.len() {
            return Err(VulkanError::invalid(format!(
                "{} transform buffers for {} frame slots",
                transforms.len(),
                self.lighting.len()
            )));
        }

        let layouts = vec![self.layout; transforms.len()];
        let sets = self.pool.allocate(&layouts)?;
        let textures = material.resolve(self.defaults);

        let mut writer = DescriptorSetWriter::new();
        for ((&set, transform), lighting) in sets.iter().zip(transforms).zip(self.lighting) {
            writer = writer
                .write_buffer(set, material_bindings::OBJECT, transform.descriptor_info())
                .write_buffer(set, material_bindings::LIGHTING, lighting.descriptor_info());
            for (binding, texture) in textures {
                writer = writer.write_image(set, binding, texture.descriptor_info());
            }
        }
        writer.update(self.context.device());

        log::debug!(
            "Bound material sets ({} remaining in pool)",
            self.pool.budget().remaining()
        );
        Ok(sets)
    }
}
