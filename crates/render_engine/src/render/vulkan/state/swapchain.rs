//! Swapchain lifecycle
//!
//! [`SwapchainManager`] is either initialized (swapchain, image views and
//! optionally framebuffers exist) or not. `initialize` and `cleanup` move
//! between the two; `cleanup` is idempotent. Surface parameters are chosen by
//! the free `choose_*` functions.

use super::frame::{AcquireOutcome, PresentOutcome};
use crate::render::vulkan::initialization::{DeviceContext, QueueFamilies};
use crate::render::vulkan::resources::image::create_view;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::extensions::khr::{Surface, Swapchain};
use ash::{vk, Device};

/// Prefer BGRA8 sRGB with a non-linear sRGB color space, else the first format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// Mailbox when available; FIFO is always supported
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the framebuffer size clamped to the limits
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: framebuffer
            .width
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: framebuffer
            .height
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// One more than the minimum, limited by the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// A handle released by [`SwapchainResources::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainObject {
    /// Framebuffer over one swapchain image
    Framebuffer(vk::Framebuffer),
    /// View of one swapchain image
    ImageView(vk::ImageView),
    /// The swapchain itself
    Swapchain(vk::SwapchainKHR),
}

/// Handles owned by an initialized swapchain
#[derive(Debug, Clone, Default)]
pub struct SwapchainResources {
    /// Swapchain handle; null when not initialized
    pub handle: vk::SwapchainKHR,
    /// Images owned by the swapchain
    pub images: Vec<vk::Image>,
    /// One view per image
    pub image_views: Vec<vk::ImageView>,
    /// One framebuffer per image once created
    pub framebuffers: Vec<vk::Framebuffer>,
    /// Chosen surface format
    pub format: vk::SurfaceFormatKHR,
    /// Chosen extent
    pub extent: vk::Extent2D,
    /// Chosen present mode
    pub present_mode: vk::PresentModeKHR,
}

impl SwapchainResources {
    /// Whether a swapchain handle is held
    pub fn is_initialized(&self) -> bool {
        self.handle != vk::SwapchainKHR::null()
    }

    /// Hand every framebuffer to `destroy` and forget them
    pub fn release_framebuffers(&mut self, mut destroy: impl FnMut(SwapchainObject)) {
        for framebuffer in self.framebuffers.drain(..) {
            destroy(SwapchainObject::Framebuffer(framebuffer));
        }
    }

    /// Hand framebuffers, views and the swapchain to `destroy`, in that order
    ///
    /// Returns `false` without calling `destroy` when nothing is held.
    pub fn release(&mut self, mut destroy: impl FnMut(SwapchainObject)) -> bool {
        if !self.is_initialized() {
            return false;
        }

        self.release_framebuffers(&mut destroy);
        for view in self.image_views.drain(..) {
            destroy(SwapchainObject::ImageView(view));
        }
        destroy(SwapchainObject::Swapchain(self.handle));

        self.images.clear();
        self.handle = vk::SwapchainKHR::null();
        self.extent = vk::Extent2D::default();
        true
    }
}

/// Swapchain, image views and framebuffers for one surface
pub struct SwapchainManager {
    device: Device,
    loader: Swapchain,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
    resources: SwapchainResources,
}

impl SwapchainManager {
    /// Create an uninitialized manager for the context's surface
    pub fn new(context: &DeviceContext) -> VulkanResult<Self> {
        let (surface_loader, surface) = context
            .surface()
            .ok_or_else(|| VulkanError::invalid("swapchain requires a context with a surface"))?;

        Ok(Self {
            device: context.raw_device(),
            loader: Swapchain::new(context.instance(), context.device()),
            surface_loader: surface_loader.clone(),
            surface,
            physical_device: context.physical_device(),
            queue_families: context.queue_families(),
            resources: SwapchainResources::default(),
        })
    }

    /// Create the swapchain and its image views
    pub fn initialize(&mut self, framebuffer: vk::Extent2D) -> VulkanResult<()> {
        if self.resources.is_initialized() {
            return Err(VulkanError::invalid("swapchain is already initialized"));
        }

        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
        }
        .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.physical_device, self.surface)
        }
        .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        let modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface)
        }
        .map_err(VulkanError::api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

        let format = choose_surface_format(&formats)
            .ok_or_else(|| VulkanError::InitializationFailed("surface reports no formats".into()))?;
        let present_mode = choose_present_mode(&modes);
        let extent = choose_extent(&capabilities, framebuffer);
        let image_count = choose_image_count(&capabilities);
        let (sharing_mode, family_indices) = self.queue_families.sharing();

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let handle = unsafe { self.loader.create_swapchain(&create_info, None) }
            .map_err(VulkanError::api("vkCreateSwapchainKHR"))?;

        self.resources = SwapchainResources {
            handle,
            format,
            extent,
            present_mode,
            ..SwapchainResources::default()
        };

        // From here on cleanup() releases whatever was created.
        self.resources.images = unsafe { self.loader.get_swapchain_images(handle) }
            .map_err(VulkanError::api("vkGetSwapchainImagesKHR"))?;
        for index in 0..self.resources.images.len() {
            let view = create_view(
                &self.device,
                self.resources.images[index],
                format.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            self.resources.image_views.push(view);
        }

        log::info!(
            "Created swapchain: {} images, {}x{}, {:?}, {:?}",
            self.resources.images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );
        Ok(())
    }

    /// Create one framebuffer per image, sharing `depth_view`
    pub fn create_framebuffers(&mut self, depth_view: vk::ImageView, render_pass: vk::RenderPass) -> VulkanResult<()> {
        if !self.resources.is_initialized() {
            return Err(VulkanError::invalid("framebuffers need an initialized swapchain"));
        }
        if !self.resources.framebuffers.is_empty() {
            return Err(VulkanError::invalid("framebuffers already exist"));
        }

        for index in 0..self.resources.image_views.len() {
            let attachments = [self.resources.image_views[index], depth_view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.resources.extent.width)
                .height(self.resources.extent.height)
                .layers(1);

            let framebuffer = unsafe { self.device.create_framebuffer(&create_info, None) }
                .map_err(VulkanError::api("vkCreateFramebuffer"))?;
            self.resources.framebuffers.push(framebuffer);
        }

        log::debug!("Created {} framebuffers", self.resources.framebuffers.len());
        Ok(())
    }

    /// Destroy the framebuffers only
    pub fn destroy_framebuffers(&mut self) {
        let device = &self.device;
        let loader = &self.loader;
        self.resources
            .release_framebuffers(|object| destroy_object(device, loader, object));
    }

    /// Destroy framebuffers, views and the swapchain; a no-op when not initialized
    pub fn cleanup(&mut self) {
        let device = &self.device;
        let loader = &self.loader;
        if self.resources.release(|object| destroy_object(device, loader, object)) {
            log::debug!("Swapchain destroyed");
        }
    }

    /// Acquire the next image, signaling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.resources.handle, u64::MAX, semaphore, vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date on acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(result) => Err(VulkanError::api("vkAcquireNextImageKHR")(result)),
        }
    }

    /// Present `image_index` on `queue` once `wait_semaphore` is signaled
    pub fn queue_present(
        &self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.resources.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date on present");
                Ok(PresentOutcome::OutOfDate)
            }
            Err(result) => Err(VulkanError::api("vkQueuePresentKHR")(result)),
        }
    }

    /// Whether the swapchain currently exists
    pub fn is_initialized(&self) -> bool {
        self.resources.is_initialized()
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.resources.images.len()
    }

    /// Current extent
    pub fn extent(&self) -> vk::Extent2D {
        self.resources.extent
    }

    /// Current surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.resources.format
    }

    /// Framebuffer for `image_index`
    pub fn framebuffer(&self, image_index: usize) -> Option<vk::Framebuffer> {
        self.resources.framebuffers.get(image_index).copied()
    }
}

fn destroy_object(device: &Device, loader: &Swapchain, object: SwapchainObject) {
    unsafe {
        match object {
            SwapchainObject::Framebuffer(framebuffer) => device.destroy_framebuffer(framebuffer, None),
            SwapchainObject::ImageView(view) => device.destroy_image_view(view, None),
            SwapchainObject::Swapchain(swapchain) => loader.destroy_swapchain(swapchain, None),
        }
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn initialized() -> SwapchainResources {
        SwapchainResources {
            handle: vk::SwapchainKHR::from_raw(1),
            images: vec![vk::Image::from_raw(10), vk::Image::from_raw(11)],
            image_views: vec![vk::ImageView::from_raw(20), vk::ImageView::from_raw(21)],
            framebuffers: vec![vk::Framebuffer::from_raw(30), vk::Framebuffer::from_raw(31)],
            extent: vk::Extent2D { width: 800, height: 600 },
            ..SwapchainResources::default()
        }
    }

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let fallback = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let format_of = |formats: &[vk::SurfaceFormatKHR]| choose_surface_format(formats).map(|f| f.format);
        assert_eq!(format_of(&[fallback, preferred]), Some(vk::Format::B8G8R8A8_SRGB));
        assert_eq!(format_of(&[fallback]), Some(vk::Format::R8G8B8A8_UNORM));
        assert_eq!(format_of(&[]), None);
    }

    #[test]
    fn present_mode_prefers_mailbox_then_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_when_defined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 1280, height: 720 },
            ..Default::default()
        };
        let chosen = choose_extent(&capabilities, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(chosen, vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn extent_clamps_framebuffer_when_undefined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 640, height: 480 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            ..Default::default()
        };

        let large = choose_extent(&capabilities, vk::Extent2D { width: 4000, height: 100 });
        assert_eq!(large, vk::Extent2D { width: 1920, height: 480 });

        let inside = choose_extent(&capabilities, vk::Extent2D { width: 1000, height: 700 });
        assert_eq!(inside, vk::Extent2D { width: 1000, height: 700 });
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&unbounded), 3);

        let bounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&bounded), 3);
    }

    #[test]
    fn release_destroys_in_dependency_order_then_nulls_handles() {
        let mut resources = initialized();
        let mut destroyed = Vec::new();

        assert!(resources.release(|object| destroyed.push(object)));
        assert_eq!(
            destroyed,
            vec![
                SwapchainObject::Framebuffer(vk::Framebuffer::from_raw(30)),
                SwapchainObject::Framebuffer(vk::Framebuffer::from_raw(31)),
                SwapchainObject::ImageView(vk::ImageView::from_raw(20)),
                SwapchainObject::ImageView(vk::ImageView::from_raw(21)),
                SwapchainObject::Swapchain(vk::SwapchainKHR::from_raw(1)),
            ]
        );
        assert!(!resources.is_initialized());
        assert!(resources.images.is_empty());
        assert!(resources.image_views.is_empty());
        assert!(resources.framebuffers.is_empty());
    }

    #[test]
    fn second_release_is_a_no_op() {
        let mut resources = initialized();
        let mut calls = 0;

        assert!(resources.release(|_| calls += 1));
        assert_eq!(calls, 5);

        assert!(!resources.release(|_| calls += 1));
        assert_eq!(calls, 5);
    }

    #[test]
    fn framebuffers_can_be_released_alone() {
        let mut resources = initialized();
        let mut destroyed = Vec::new();

        resources.release_framebuffers(|object| destroyed.push(object));

        assert_eq!(destroyed.len(), 2);
        assert!(resources.is_initialized());
        assert_eq!(resources.image_views.len(), 2);
    }
}
