//! Sampled textures
//!
//! Decoded pixels are expanded to RGBA8, staged, copied into a device-local
//! image and moved to the shader-read layout. Decoding itself happens in the
//! application (the viewer uses the `image` crate).

use super::buffer::GpuBuffer;
use super::image::{GpuImage, ImageDesc};
use crate::render::vulkan::initialization::DeviceContext;
use crate::render::vulkan::rendering::commands::SingleTimeCommands;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};
use std::sync::Arc;

/// Opaque white, used for missing color textures
pub const WHITE_TEXEL: [u8; 4] = [255, 255, 255, 255];

/// Tangent-space normal pointing straight out of the surface
pub const FLAT_NORMAL_TEXEL: [u8; 4] = [128, 128, 255, 255];

/// How texel values are interpreted by the sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Color data, decoded from sRGB on sampling
    Srgb,
    /// Non-color data such as normals or roughness
    Linear,
}

impl ColorSpace {
    fn format(self) -> vk::Format {
        match self {
            Self::Srgb => vk::Format::R8G8B8A8_SRGB,
            Self::Linear => vk::Format::R8G8B8A8_UNORM,
        }
    }
}

/// Decoded pixel data handed over by the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channels per pixel: 1 (gray), 3 (RGB) or 4 (RGBA)
    pub channels: u8,
    /// Tightly packed rows, top row first
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// A 1x1 texture of one RGBA texel
    pub fn solid(texel: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            channels: 4,
            pixels: texel.to_vec(),
        }
    }

    /// Pixels expanded to RGBA8
    pub fn to_rgba8(&self) -> VulkanResult<Vec<u8>> {
        let channels = usize::from(self.channels);
        let expected = self.width as usize * self.height as usize * channels;
        if self.width == 0 || self.height == 0 {
            return Err(VulkanError::invalid("texture has no pixels"));
        }
        if self.pixels.len() != expected {
            return Err(VulkanError::invalid(format!(
                "{}x{} texture with {} channels needs {expected} bytes, got {}",
                self.width,
                self.height,
                self.channels,
                self.pixels.len()
            )));
        }

        match self.channels {
            4 => Ok(self.pixels.clone()),
            3 => Ok(self
                .pixels
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect()),
            1 => Ok(self.pixels.iter().flat_map(|&gray| [gray, gray, gray, 255]).collect()),
            other => Err(VulkanError::invalid(format!("unsupported channel count {other}"))),
        }
    }
}

/// Image plus sampler, ready to bind as a combined image sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    image: GpuImage,
}

impl Texture {
    /// Upload `data` and create a sampler for it
    pub fn from_data(context: &DeviceContext, data: &TextureData, color_space: ColorSpace) -> VulkanResult<Self> {
        let rgba = data.to_rgba8()?;
        let staging = GpuBuffer::staging(context, &rgba)?;

        let mut image = GpuImage::new(
            context,
            ImageDesc {
                width: data.width,
                height: data.height,
                format: color_space.format(),
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            },
        )?;

        let commands = SingleTimeCommands::begin(context)?;
        let device = context.device();
        image.record_transition(device, commands.command_buffer(), vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        image.record_copy_from_buffer(device, commands.command_buffer(), staging.handle())?;
        image.record_transition(device, commands.command_buffer(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)?;
        commands.submit_and_wait()?;

        let sampler = create_sampler(context)?;
        log::debug!("Uploaded {}x{} texture", data.width, data.height);

        Ok(Self {
            device: context.raw_device(),
            sampler,
            image,
        })
    }

    /// 1x1 texture of a single texel
    pub fn solid(context: &DeviceContext, texel: [u8; 4], color_space: ColorSpace) -> VulkanResult<Self> {
        Self::from_data(context, &TextureData::solid(texel), color_space)
    }

    /// Descriptor info for a combined image sampler binding
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Underlying image
    pub fn image(&self) -> &GpuImage {
        &self.image
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}

fn create_sampler(context: &DeviceContext) -> VulkanResult<vk::Sampler> {
    let anisotropy = context.max_sampler_anisotropy();
    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(anisotropy.is_some())
        .max_anisotropy(anisotropy.unwrap_or(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

    unsafe { context.device().create_sampler(&sampler_info, None) }.map_err(VulkanError::api("vkCreateSampler"))
}

/// Fallback textures bound in place of missing material maps
pub struct DefaultTextures {
    /// Opaque white
    pub white: Arc<Texture>,
    /// Flat tangent-space normal
    pub flat_normal: Arc<Texture>,
}

impl DefaultTextures {
    /// Upload both fallbacks
    pub fn new(context: &DeviceContext) -> VulkanResult<Self> {
        Ok(Self {
            white: Arc::new(Texture::solid(context, WHITE_TEXEL, ColorSpace::Srgb)?),
            flat_normal: Arc::new(Texture::solid(context, FLAT_NORMAL_TEXEL, ColorSpace::Linear)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expands_with_opaque_alpha() {
        let data = TextureData {
            width: 2,
            height: 1,
            channels: 3,
            pixels: vec![1, 2, 3, 4, 5, 6],
        };
        assert_eq!(data.to_rgba8().unwrap(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn gray_replicates_into_rgb() {
        let data = TextureData {
            width: 1,
            height: 2,
            channels: 1,
            pixels: vec![7, 9],
        };
        assert_eq!(data.to_rgba8().unwrap(), vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }

    #[test]
    fn rgba_passes_through() {
        assert_eq!(TextureData::solid(FLAT_NORMAL_TEXEL).to_rgba8().unwrap(), FLAT_NORMAL_TEXEL.to_vec());
    }

    #[test]
    fn mismatched_pixel_count_is_rejected() {
        let data = TextureData {
            width: 2,
            height: 2,
            channels: 4,
            pixels: vec![0; 12],
        };
        assert!(data.to_rgba8().is_err());
    }

    #[test]
    fn unsupported_channel_count_is_rejected() {
        let data = TextureData {
            width: 1,
            height: 1,
            channels: 2,
            pixels: vec![0; 2],
        };
        assert!(data.to_rgba8().is_err());
    }

    #[test]
    fn empty_texture_is_rejected() {
        let data = TextureData {
            width: 0,
            height: 4,
            channels: 4,
            pixels: Vec::new(),
        };
        assert!(data.to_rgba8().is_err());
    }
}
