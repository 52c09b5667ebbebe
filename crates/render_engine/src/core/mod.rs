//! # Core Engine Module
//!
//! Shared configuration types used by the engine, the renderer and the
//! applications built on top of them.

pub mod config;

pub use config::{ApplicationConfig, Config, ConfigError, RendererConfig, ShaderConfig, WindowConfig};
