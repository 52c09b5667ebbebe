//! Core engine implementation
//!
//! [`Engine`] owns the window, the renderer, frame timing and a
//! [`SubsystemRegistry`]. [`Engine::run`] drives an [`Application`] through
//! initialize, the poll/update/draw loop, and cleanup.

use crate::application::{AppError, AppEvent, Application};
use crate::config::ConfigError;
use crate::core::config::ApplicationConfig;
use crate::foundation::{logging, time::Timer};
use crate::render::vulkan::{VulkanError, VulkanRenderer};
use crate::render::Window;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use thiserror::Error;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Renderer or window error
    #[error("Rendering error: {0}")]
    Render(#[from] VulkanError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Application error
    #[error("Application error: {0}")]
    Application(#[from] AppError),

    /// A subsystem hook failed
    #[error("Subsystem '{name}' failed: {reason}")]
    Subsystem {
        /// Name reported by the subsystem
        name: &'static str,
        /// What went wrong
        reason: String,
    },
}

/// A unit of engine work ticked once per frame
///
/// Subsystems are stored by concrete type; [`SubsystemRegistry::get`] hands
/// them back typed through [`Subsystem::as_any`].
pub trait Subsystem: Any {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;

    /// Called once before the first tick
    fn on_initialize(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called once per frame with the frame time in seconds
    fn on_tick(&mut self, delta_time: f32) -> Result<(), EngineError>;

    /// Called once after the last tick
    fn on_shutdown(&mut self) {}

    /// Get as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Get as mutable Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Subsystems keyed by type, ticked in registration order
#[derive(Default)]
pub struct SubsystemRegistry {
    subsystems: HashMap<TypeId, Box<dyn Subsystem>>,
    order: Vec<TypeId>,
}

impl SubsystemRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subsystem; one of the same type is replaced in place
    pub fn register<S: Subsystem>(&mut self, subsystem: S) {
        let id = TypeId::of::<S>();
        let name = subsystem.name();
        if self.subsystems.insert(id, Box::new(subsystem)).is_some() {
            log::warn!("Subsystem '{name}' registered twice, replacing the previous instance");
        } else {
            self.order.push(id);
            log::debug!("Registered subsystem '{name}'");
        }
    }

    /// Subsystem of type `S`
    pub fn get<S: Subsystem>(&self) -> Option<&S> {
        self.subsystems
            .get(&TypeId::of::<S>())
            .and_then(|subsystem| subsystem.as_any().downcast_ref::<S>())
    }

    /// Mutable subsystem of type `S`
    pub fn get_mut<S: Subsystem>(&mut self) -> Option<&mut S> {
        self.subsystems
            .get_mut(&TypeId::of::<S>())
            .and_then(|subsystem| subsystem.as_any_mut().downcast_mut::<S>())
    }

    /// Whether a subsystem of type `S` is registered
    pub fn contains<S: Subsystem>(&self) -> bool {
        self.subsystems.contains_key(&TypeId::of::<S>())
    }

    /// Number of registered subsystems
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no subsystem is registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run every `on_initialize` in registration order
    pub fn initialize_all(&mut self) -> Result<(), EngineError> {
        for id in &self.order {
            if let Some(subsystem) = self.subsystems.get_mut(id) {
                subsystem.on_initialize()?;
            }
        }
        Ok(())
    }

    /// Run every `on_tick` in registration order
    pub fn tick_all(&mut self, delta_time: f32) -> Result<(), EngineError> {
        for id in &self.order {
            if let Some(subsystem) = self.subsystems.get_mut(id) {
                subsystem.on_tick(delta_time)?;
            }
        }
        Ok(())
    }

    /// Run every `on_shutdown` in reverse registration order
    pub fn shutdown_all(&mut self) {
        for id in self.order.iter().rev() {
            if let Some(subsystem) = self.subsystems.get_mut(id) {
                subsystem.on_shutdown();
                log::debug!("Shut down subsystem '{}'", subsystem.name());
            }
        }
    }
}

/// Logs frame rate at a fixed interval
#[derive(Debug, Clone)]
pub struct FrameStats {
    report_interval: f32,
    elapsed: f32,
    frames: u32,
    fps: f32,
}

impl FrameStats {
    /// Report every `report_interval` seconds
    pub fn new(report_interval: f32) -> Self {
        Self {
            report_interval,
            elapsed: 0.0,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Frame rate over the last completed interval
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl Subsystem for FrameStats {
    fn name(&self) -> &'static str {
        "frame_stats"
    }

    fn on_tick(&mut self, delta_time: f32) -> Result<(), EngineError> {
        self.elapsed += delta_time;
        self.frames += 1;

        if self.elapsed >= self.report_interval {
            self.fps = self.frames as f32 / self.elapsed;
            log::info!("{:.1} FPS ({:.2} ms/frame)", self.fps, 1000.0 / self.fps);
            self.elapsed = 0.0;
            self.frames = 0;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Main engine struct
///
/// The renderer is declared before the window so it drops first; its surface
/// must go before the window it was created from.
pub struct Engine {
    renderer: VulkanRenderer,
    window: Window,
    subsystems: SubsystemRegistry,
    timer: Timer,
    config: ApplicationConfig,
    running: bool,
}

impl Engine {
    /// Create the window and renderer
    pub fn new(config: ApplicationConfig) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");

        let mut window = Window::new(&config.window)?;
        let renderer = VulkanRenderer::new(&mut window, &config.renderer)?;

        Ok(Self {
            renderer,
            window,
            subsystems: SubsystemRegistry::new(),
            timer: Timer::new(),
            config,
            running: true,
        })
    }

    /// Run the engine main loop with the given application
    pub fn run<A: Application>(config: ApplicationConfig, app: &mut A) -> Result<(), EngineError> {
        logging::init(&config.log_level);
        config.validate()?;

        let mut engine = Self::new(config)?;
        engine.subsystems.register(FrameStats::default());

        let result = engine.main_loop(app);

        if let Err(e) = engine.renderer.wait_idle() {
            log::warn!("Device wait before cleanup failed: {e}");
        }
        app.cleanup(&mut engine);
        engine.subsystems.shutdown_all();

        log::info!("Engine shutdown complete");
        result
    }

    fn main_loop<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        app.initialize(self)?;
        self.subsystems.initialize_all()?;
        self.timer = Timer::new();

        log::info!("Starting main loop...");

        while self.running {
            for event in self.window.poll_events() {
                let event = AppEvent::from(event);
                if event == AppEvent::WindowCloseRequested {
                    self.running = false;
                }
                app.handle_event(self, &event)?;
            }
            if self.window.should_close() {
                self.running = false;
            }
            if !self.running {
                break;
            }

            self.timer.update();
            let delta_time = self.timer.delta_time();

            self.subsystems.tick_all(delta_time)?;
            app.update(self, delta_time)?;

            if let Some(frame) = self.renderer.begin_frame(&mut self.window)? {
                app.draw(&mut self.renderer, &frame)?;
                self.renderer.end_frame(&mut self.window)?;
            }
        }

        Ok(())
    }

    /// Request engine shutdown after the current frame
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Get the renderer
    pub fn renderer(&self) -> &VulkanRenderer {
        &self.renderer
    }

    /// Get mutable access to the renderer
    pub fn renderer_mut(&mut self) -> &mut VulkanRenderer {
        &mut self.renderer
    }

    /// Get the window
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Get mutable access to the window
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// Get the subsystem registry
    pub fn subsystems(&self) -> &SubsystemRegistry {
        &self.subsystems
    }

    /// Get mutable access to the subsystem registry
    pub fn subsystems_mut(&mut self) -> &mut SubsystemRegistry {
        &mut self.subsystems
    }

    /// Get the frame timer
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Get the configuration the engine was started with
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Recorder<const ID: u8> {
        journal: Journal,
        ticks: u32,
    }

    impl<const ID: u8> Recorder<ID> {
        fn new(journal: &Journal) -> Self {
            Self {
                journal: Rc::clone(journal),
                ticks: 0,
            }
        }
    }

    impl<const ID: u8> Subsystem for Recorder<ID> {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn on_initialize(&mut self) -> Result<(), EngineError> {
            self.journal.borrow_mut().push(format!("init {}", ID));
            Ok(())
        }

        fn on_tick(&mut self, _delta_time: f32) -> Result<(), EngineError> {
            self.ticks += 1;
            self.journal.borrow_mut().push(format!("tick {}", ID));
            Ok(())
        }

        fn on_shutdown(&mut self) {
            self.journal.borrow_mut().push(format!("shutdown {}", ID));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Failing;

    impl Subsystem for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn on_tick(&mut self, _delta_time: f32) -> Result<(), EngineError> {
            Err(EngineError::Subsystem {
                name: self.name(),
                reason: "tick refused".into(),
            })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn subsystems_tick_in_registration_order_and_shut_down_in_reverse() {
        let journal = Journal::default();
        let mut registry = SubsystemRegistry::new();
        registry.register(Recorder::<2>::new(&journal));
        registry.register(Recorder::<1>::new(&journal));
        registry.register(Recorder::<3>::new(&journal));

        registry.initialize_all().unwrap();
        registry.tick_all(0.016).unwrap();
        registry.shutdown_all();

        assert_eq!(
            *journal.borrow(),
            vec![
                "init 2", "init 1", "init 3", "tick 2", "tick 1", "tick 3", "shutdown 3", "shutdown 1", "shutdown 2",
            ]
        );
    }

    #[test]
    fn subsystems_are_retrieved_by_type() {
        let journal = Journal::default();
        let mut registry = SubsystemRegistry::new();
        registry.register(Recorder::<1>::new(&journal));
        registry.register(FrameStats::new(1.0));

        registry.tick_all(0.5).unwrap();
        registry.tick_all(0.5).unwrap();

        assert_eq!(registry.get::<Recorder<1>>().map(|r| r.ticks), Some(2));
        assert!(registry.get::<Recorder<2>>().is_none());
        assert!(registry.contains::<FrameStats>());

        registry.get_mut::<Recorder<1>>().unwrap().ticks = 10;
        assert_eq!(registry.get::<Recorder<1>>().unwrap().ticks, 10);
    }

    #[test]
    fn registering_same_type_replaces_in_place() {
        let journal = Journal::default();
        let mut registry = SubsystemRegistry::new();
        registry.register(Recorder::<1>::new(&journal));
        registry.register(Recorder::<2>::new(&journal));
        let mut replacement = Recorder::<1>::new(&journal);
        replacement.ticks = 7;
        registry.register(replacement);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get::<Recorder<1>>().unwrap().ticks, 7);

        registry.tick_all(0.1).unwrap();
        assert_eq!(*journal.borrow(), vec!["tick 1", "tick 2"]);
    }

    #[test]
    fn tick_errors_propagate() {
        let mut registry = SubsystemRegistry::new();
        registry.register(Failing);
        assert!(matches!(
            registry.tick_all(0.1),
            Err(EngineError::Subsystem { name: "failing", .. })
        ));
    }

    #[test]
    fn frame_stats_reports_rate_per_interval() {
        let mut stats = FrameStats::new(1.0);
        for _ in 0..4 {
            stats.on_tick(0.25).unwrap();
        }
        approx::assert_relative_eq!(stats.fps(), 4.0, epsilon = 1e-4);
    }
}
