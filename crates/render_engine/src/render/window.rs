//! Window management using GLFW
//!
//! The renderer only sees a window through [`WindowSurface`] (size, resize
//! notification, blocking event wait) and [`VulkanSurfaceSource`] (instance
//! extensions and surface creation). [`Window`] implements both on top of GLFW.

use crate::core::config::WindowConfig;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// What the frame loop needs from a window
pub trait WindowSurface {
    /// Current framebuffer size in pixels; `(0, 0)` while minimized
    fn framebuffer_size(&self) -> (u32, u32);

    /// Returns whether the framebuffer was resized since the last call, and clears the flag
    fn take_resized(&mut self) -> bool;

    /// Block until at least one window event arrives
    fn wait_events(&mut self);
}

/// What instance and surface creation need from a window
pub trait VulkanSurfaceSource: WindowSurface {
    /// Instance extensions the windowing system needs for presentation
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>>;

    /// Create a presentation surface for `instance`
    fn create_surface(&mut self, instance: vk::Instance) -> VulkanResult<vk::SurfaceKHR>;
}

/// Window events forwarded to applications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// A key was pressed
    KeyPressed(glfw::Key),
    /// The framebuffer changed size
    Resized(u32, u32),
    /// The user asked to close the window
    CloseRequested,
}

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    queued: Vec<WindowEvent>,
    resized: bool,
}

impl Window {
    /// Create a resizable window without a client API, ready for Vulkan
    pub fn new(config: &WindowConfig) -> VulkanResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| VulkanError::Window(format!("GLFW initialization failed: {e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(VulkanError::Window("GLFW reports no Vulkan support".into()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or_else(|| VulkanError::Window("window creation failed".into()))?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created window '{}' ({}x{})", config.title, config.width, config.height);

        Ok(Self {
            glfw,
            window,
            events,
            queued: Vec::new(),
            resized: false,
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Set or clear the close flag
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll pending events, record resizes, and return the ones applications care about
    pub fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.poll_events();
        self.drain_events();
        std::mem::take(&mut self.queued)
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    self.resized = true;
                    self.queued.push(WindowEvent::Resized(clamp_dimension(width), clamp_dimension(height)));
                }
                glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => {
                    self.queued.push(WindowEvent::KeyPressed(key));
                }
                glfw::WindowEvent::Close => self.queued.push(WindowEvent::CloseRequested),
                _ => {}
            }
        }
    }
}

fn clamp_dimension(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl WindowSurface for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (clamp_dimension(width), clamp_dimension(height))
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        // Queued for the next poll_events so key presses while minimized survive.
        self.drain_events();
    }
}

impl VulkanSurfaceSource for Window {
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| VulkanError::Window("GLFW could not report required instance extensions".into()))
    }

    fn create_surface(&mut self, instance: vk::Instance) -> VulkanResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(VulkanError::api("glfwCreateWindowSurface")(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::clamp_dimension;

    #[test]
    fn negative_sizes_clamp_to_zero() {
        assert_eq!(clamp_dimension(-4), 0);
        assert_eq!(clamp_dimension(0), 0);
        assert_eq!(clamp_dimension(1920), 1920);
    }
}
