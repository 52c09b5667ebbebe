//! Vertex input descriptions

use ash::vk;

/// Vertex types that can feed the graphics pipeline
pub trait VertexLayout {
    /// Binding 0, advancing per vertex
    fn binding_description() -> vk::VertexInputBindingDescription;

    /// One attribute per shader input location
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;
}
