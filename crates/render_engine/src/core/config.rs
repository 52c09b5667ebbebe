//! # Engine Configuration
//!
//! Configuration for the window, the Vulkan renderer and the application as a
//! whole. Every type is serde-serializable and can be persisted through the
//! [`Config`] trait as TOML or RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Upper bound on frames in flight; more only adds latency.
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Upper bound on `max_drawables`; the material pool holds this many sets per frame slot.
pub const MAX_DRAWABLES_LIMIT: u32 = 65_536;

/// # Shader Configuration
///
/// Paths to the compiled SPIR-V binaries used by the forward pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Looks in the usual build output and resource directories so the same
    /// config works from the workspace root and from a crate directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        const SHADER_DIRS: [&str; 5] = [
            "target/shaders/",
            "../target/shaders/",
            "../../target/shaders/",
            "shaders/",
            "./",
        ];

        let resolve = |file: &str| {
            SHADER_DIRS
                .iter()
                .map(|dir| format!("{dir}{file}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("target/shaders/{file}"))
        };

        Self {
            vertex_shader_path: resolve(base_vertex),
            fragment_shader_path: resolve(base_fragment),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("shader not found: {path}")));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("mesh.vert.spv", "mesh.frag.spv")
    }
}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl WindowConfig {
    /// Create a window configuration
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new("Render Engine", 1280, 720)
    }
}

/// # Vulkan Renderer Configuration
///
/// Application metadata handed to the Vulkan instance plus the knobs that
/// size the frame ring and descriptor pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Number of frame slots whose GPU work may overlap with the CPU
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Number of drawables the material descriptor pool is sized for
    pub max_drawables: u32,
    /// Reject integrated and software devices during selection
    pub require_discrete_gpu: bool,
    /// Color the swapchain image is cleared to each frame
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            shaders: ShaderConfig::default(),
            max_frames_in_flight: 2,
            enable_validation: None,
            max_drawables: 64,
            require_discrete_gpu: true,
            clear_color: [0.02, 0.02, 0.03, 1.0],
        }
    }

    /// Set application version
    #[must_use]
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set maximum frames in flight
    #[must_use]
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set how many drawables the descriptor pool must hold
    #[must_use]
    pub fn with_max_drawables(mut self, count: u32) -> Self {
        self.max_drawables = count;
        self
    }

    /// Allow or reject non-discrete GPUs
    #[must_use]
    pub fn with_discrete_gpu_required(mut self, required: bool) -> Self {
        self.require_discrete_gpu = required;
        self
    }

    /// Set the clear color
    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".into()));
        }

        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid("max frames in flight must be at least 1".into()));
        }

        if self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max frames in flight should not exceed {MAX_FRAMES_IN_FLIGHT_LIMIT}"
            )));
        }

        if self.max_drawables == 0 {
            return Err(ConfigError::Invalid("max drawables must be at least 1".into()));
        }

        if self.max_drawables > MAX_DRAWABLES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max drawables should not exceed {MAX_DRAWABLES_LIMIT}"
            )));
        }

        self.shaders.validate()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Render Engine Application")
    }
}

/// Top-level configuration consumed by [`crate::Engine::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            renderer: RendererConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ApplicationConfig {
    /// Validate window and renderer settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} has zero area",
                self.window.width, self.window.height
            )));
        }
        self.renderer.validate()
    }
}

impl Config for ApplicationConfig {}
impl Config for RendererConfig {}
impl Config for WindowConfig {}
