//! Cube viewer
//!
//! Renders a ring of rotating cubes with the render engine. Pass a config
//! file (TOML or RON) as the first argument and set `VIEWER_TEXTURE` to a PNG
//! to use it as the albedo map.
//!
//! Keys: `R` reloads shaders from disk, `Escape` quits.

use render_engine::config::Config;
use render_engine::foundation::logging;
use render_engine::foundation::math::{Transform, Vec3};
use render_engine::prelude::*;
use render_engine::render::uniforms::LightingUbo;
use render_engine::render::vulkan::{ColorSpace, Texture, TextureData};
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "viewer.toml";
const CUBE_COUNT: usize = 5;
const RING_RADIUS: f32 = 3.0;

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Failed to read texture {path}: {source}")]
    Texture {
        path: String,
        source: image::ImageError,
    },
}

impl From<ViewerError> for AppError {
    fn from(error: ViewerError) -> Self {
        AppError::Asset(error.to_string())
    }
}

fn load_texture_data(path: &str) -> Result<TextureData, ViewerError> {
    let image = image::open(path)
        .map_err(|source| ViewerError::Texture {
            path: path.to_string(),
            source,
        })?
        .to_rgba8();

    Ok(TextureData {
        width: image.width(),
        height: image.height(),
        channels: 4,
        pixels: image.into_raw(),
    })
}

struct CubeViewer {
    meshes: Vec<Mesh>,
    textures: Vec<Arc<Texture>>,
    elapsed: f32,
}

impl CubeViewer {
    fn new() -> Self {
        Self {
            meshes: Vec::new(),
            textures: Vec::new(),
            elapsed: 0.0,
        }
    }

    fn cube_transform(&self, index: usize) -> Mat4 {
        let angle = index as f32 / CUBE_COUNT as f32 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos() * RING_RADIUS, 0.0, angle.sin() * RING_RADIUS);
        let spin = self.elapsed * (0.5 + index as f32 * 0.25);

        Transform::from_position(position)
            .with_rotation(&Vec3::y_axis(), spin)
            .with_uniform_scale(0.75)
            .to_matrix()
    }
}

impl Application for CubeViewer {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        let renderer = engine.renderer_mut();

        {
            let camera = renderer.camera_mut();
            camera.set_position(Vec3::new(0.0, 4.0, 9.0));
            camera.look_at(Vec3::zeros());
        }
        renderer.set_lighting(LightingUbo::directional(
            Vec3::new(-0.4, -1.0, -0.3),
            Vec3::new(1.0, 0.95, 0.9),
            1.0,
            Vec3::new(0.4, 0.45, 0.55),
            0.25,
        ));

        let material = match std::env::var("VIEWER_TEXTURE") {
            Ok(path) => {
                let data = load_texture_data(&path)?;
                let texture = renderer.create_texture(&data, ColorSpace::Srgb)?;
                log::info!("Loaded albedo {path} ({}x{})", data.width, data.height);
                self.textures.push(Arc::clone(&texture));
                Material::with_albedo(texture)
            }
            Err(_) => Material::default(),
        };

        let cube = MeshData::cube();
        for _ in 0..CUBE_COUNT {
            self.meshes.push(renderer.create_mesh(&cube, material.clone())?);
        }

        log::info!("Viewer ready with {} cubes (R reloads shaders, Escape quits)", self.meshes.len());
        Ok(())
    }

    fn update(&mut self, _engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
        self.elapsed += delta_time;
        Ok(())
    }

    fn draw(&mut self, renderer: &mut VulkanRenderer, frame: &ActiveFrame) -> Result<(), AppError> {
        for (index, mesh) in self.meshes.iter().enumerate() {
            mesh.update_transform(frame.slot, &self.cube_transform(index))?;
            renderer.draw(mesh)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, engine: &mut Engine, event: &AppEvent) -> Result<(), AppError> {
        match event {
            AppEvent::KeyPressed(glfw::Key::Escape) => engine.quit(),
            AppEvent::KeyPressed(glfw::Key::R) => engine.renderer_mut().request_shader_reload(),
            AppEvent::WindowResized { width, height } => log::debug!("Window resized to {width}x{height}"),
            _ => {}
        }
        Ok(())
    }

    fn cleanup(&mut self, _engine: &mut Engine) {
        log::info!("Releasing {} meshes and {} textures", self.meshes.len(), self.textures.len());
        self.meshes.clear();
        self.textures.clear();
    }
}

/// Load the viewer config; on failure logging is brought up first so the error can be reported
fn load_config(path: &str) -> Result<ApplicationConfig, EngineError> {
    ApplicationConfig::load_or_default(path).map_err(|e| {
        logging::init(&ApplicationConfig::default().log_level);
        EngineError::from(e)
    })
}

fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let result = load_config(&config_path).and_then(|config| Engine::run(config, &mut CubeViewer::new()));

    if let Err(e) = result {
        log::error!("Viewer failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_config_initializes_logging_before_failing() {
        let dir = std::env::temp_dir().join(format!("viewer_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "window = [not toml").unwrap();

        let result = load_config(&path.to_string_lossy());

        assert!(matches!(result, Err(EngineError::Config(_))));
        assert!(log::max_level() >= log::LevelFilter::Error);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config("no/such/viewer.toml").unwrap();
        assert_eq!(config, ApplicationConfig::default());
    }
}
