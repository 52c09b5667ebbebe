//! Rendering: camera, meshes, uniform layouts, windowing and the Vulkan backend

pub mod camera;
pub mod mesh;
pub mod uniforms;
pub mod vulkan;
pub mod window;

pub use camera::Camera;
pub use mesh::{Drawable, Mesh, MeshData, Vertex};
pub use uniforms::{CameraUbo, LightingUbo, ObjectUbo};
pub use vulkan::{Material, Texture, TextureData};
pub use window::{VulkanSurfaceSource, Window, WindowEvent, WindowSurface};
