//! Command recording helpers, render passes, shaders and pipelines

pub mod commands;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;

pub use commands::{CommandPool, SingleTimeCommands};
pub use pipeline::{BlendMode, Pipeline, PipelineBuilder};
pub use render_pass::RenderPass;
pub use shader::ShaderModule;
pub use vertex_layout::VertexLayout;
