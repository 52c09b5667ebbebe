//! # Render Engine
//!
//! A Vulkan rendering core: device setup, swapchain lifecycle, frame pacing
//! across multiple frames in flight, and GPU resource management.
//!
//! ## Features
//!
//! - **Device Context**: physical device selection, logical device and queues
//! - **GPU Resources**: buffer/image/memory triples released together on drop
//! - **Swapchain**: creation, framebuffers, and full rebuild on resize
//! - **Frame Orchestration**: fence/semaphore ring over N frames in flight
//! - **Pipelines**: builder-style graphics and compute pipeline construction
//! - **Descriptors**: per-drawable transform, lighting and texture bindings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn draw(&mut self, _renderer: &mut VulkanRenderer, _frame: &ActiveFrame) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, &mut app)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

mod application;
mod engine;

pub use application::{AppError, AppEvent, Application};
pub use engine::{Engine, EngineError, FrameStats, Subsystem, SubsystemRegistry};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        AppError, AppEvent, Application,
        Engine, EngineError, Subsystem,
        core::config::{ApplicationConfig, RendererConfig, ShaderConfig, WindowConfig},
        foundation::math::{Mat4, Vec3},
        render::{
            Camera, Drawable, Material, Mesh, MeshData, Vertex, Window, WindowSurface,
            vulkan::{ActiveFrame, VulkanError, VulkanRenderer, VulkanResult},
        },
    };
}
