//! Application trait and lifecycle management

use crate::config::ConfigError;
use crate::engine::Engine;
use crate::render::vulkan::{ActiveFrame, VulkanError, VulkanRenderer};
use crate::render::WindowEvent;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive the engine's main loop.
pub trait Application {
    /// Initialize the application
    ///
    /// Called once after the window and renderer exist. Create meshes and
    /// textures here through `engine.renderer_mut()`.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called every frame before drawing.
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// Record draws for `frame`
    ///
    /// Only called for frames that acquired a swapchain image. Per-slot
    /// uniforms (mesh transforms) should be written for `frame.slot`.
    fn draw(&mut self, renderer: &mut VulkanRenderer, frame: &ActiveFrame) -> Result<(), AppError>;

    /// Handle application events
    ///
    /// Close requests have already stopped the loop by the time this runs.
    fn handle_event(&mut self, _engine: &mut Engine, _event: &AppEvent) -> Result<(), AppError> {
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called after the GPU went idle and before the renderer is destroyed.
    /// Every mesh and texture created through the renderer must be released here.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Renderer error raised while the application used it
    #[error("Render error: {0}")]
    Render(#[from] VulkanError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Asset loading error
    #[error("Asset error: {0}")]
    Asset(String),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}

/// Application events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Framebuffer was resized
    WindowResized {
        /// New framebuffer width
        width: u32,
        /// New framebuffer height
        height: u32,
    },

    /// Window close requested
    WindowCloseRequested,

    /// Key was pressed
    KeyPressed(glfw::Key),
}

impl From<WindowEvent> for AppEvent {
    fn from(event: WindowEvent) -> Self {
        match event {
            WindowEvent::Resized(width, height) => Self::WindowResized { width, height },
            WindowEvent::CloseRequested => Self::WindowCloseRequested,
            WindowEvent::KeyPressed(key) => Self::KeyPressed(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_events_map_to_app_events() {
        assert_eq!(
            AppEvent::from(WindowEvent::Resized(800, 600)),
            AppEvent::WindowResized { width: 800, height: 600 }
        );
        assert_eq!(AppEvent::from(WindowEvent::CloseRequested), AppEvent::WindowCloseRequested);
        assert_eq!(
            AppEvent::from(WindowEvent::KeyPressed(glfw::Key::R)),
            AppEvent::KeyPressed(glfw::Key::R)
        );
    }

    #[test]
    fn renderer_errors_convert_into_app_errors() {
        let error: AppError = VulkanError::invalid("bad state").into();
        assert!(matches!(error, AppError::Render(_)));
        assert!(error.to_string().contains("bad state"));
    }
}
