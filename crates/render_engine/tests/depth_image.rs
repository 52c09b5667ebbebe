//! Depth attachments against a real device
//!
//! Skipped (with a log line) when no Vulkan device is available.

use ash::vk;
use render_engine::core::config::RendererConfig;
use render_engine::render::vulkan::resources::image::DEPTH_FORMAT_CANDIDATES;
use render_engine::render::vulkan::{DeviceContext, GpuImage};

fn headless_context() -> Option<DeviceContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RendererConfig {
        enable_validation: Some(false),
        ..RendererConfig::default()
    };
    match DeviceContext::headless(&config) {
        Ok(context) => Some(context),
        Err(e) => {
            log::warn!("Skipping GPU test, no Vulkan device: {e}");
            None
        }
    }
}

const EXTENT: vk::Extent2D = vk::Extent2D { width: 64, height: 32 };

#[test]
fn depth_image_uses_the_format_it_is_given() {
    let Some(context) = headless_context() else { return };
    let format = context
        .find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .expect("a depth format");

    let depth = GpuImage::depth(&context, EXTENT, format).expect("depth image");
    assert_eq!(depth.format(), format);
    assert_eq!(depth.extent(), EXTENT);
    assert_eq!(depth.layout(), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
}

#[test]
fn color_format_is_rejected_for_depth() {
    let Some(context) = headless_context() else { return };
    assert!(GpuImage::depth(&context, EXTENT, vk::Format::R8G8B8A8_UNORM).is_err());
}
