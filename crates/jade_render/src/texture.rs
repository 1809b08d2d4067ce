use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::gpu_context::{validation_scope, GpuContext};
use crate::uniform::{SAMPLER_BINDING, TEXTURE_BINDING};

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture could not read image '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("texture could not decode image '{label}': {source}")]
    Decode {
        label: String,
        #[source]
        source: image::ImageError,
    },
    #[error("texture image '{label}' has unsupported channel count {channels}")]
    UnsupportedChannels { label: String, channels: u8 },
    #[error("texture image '{label}' is {width}x{height}, larger than the device limit {max}")]
    TooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },
    #[error("texture '{label}' could not be created on the GPU: {log}")]
    Gpu { label: String, log: String },
}

/// Decoded pixels ready for upload. Always RGBA8; `channels` records what
/// the source image had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub rgba: Vec<u8>,
}

/// Decodes an image, accepting only 3- and 4-channel sources.
pub fn decode_image(bytes: &[u8], label: &str) -> Result<DecodedImage, TextureError> {
    let img = image::load_from_memory(bytes).map_err(|source| TextureError::Decode {
        label: label.to_string(),
        source,
    })?;
    let channels = img.color().channel_count();
    if channels != 3 && channels != 4 {
        return Err(TextureError::UnsupportedChannels {
            label: label.to_string(),
            channels,
        });
    }
    let rgba = img.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        channels,
        rgba: rgba.into_raw(),
    })
}

/// Rejects images the device cannot hold in a single 2D texture.
pub fn check_dimensions(image: &DecodedImage, label: &str, max: u32) -> Result<(), TextureError> {
    if image.width > max || image.height > max {
        return Err(TextureError::TooLarge {
            label: label.to_string(),
            width: image.width,
            height: image.height,
            max,
        });
    }
    Ok(())
}

pub struct Texture {
    pub label: String,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: (u32, u32),
    bind_group: wgpu::BindGroup,
    bound: bool,
}

impl Texture {
    /// Layout every texture bind group uses: view at binding 0, sampler at 1.
    pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    pub fn from_path(gpu: &GpuContext, path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TextureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&gpu.device, &gpu.queue, &bytes, &path.display().to_string())
    }

    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
    ) -> Result<Self, TextureError> {
        let image = decode_image(bytes, label)?;
        check_dimensions(&image, label, device.limits().max_texture_dimension_2d)?;
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };

        let ((texture, view, sampler, bind_group), error) = validation_scope(device, |device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &image.rgba,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * image.width),
                    rows_per_image: Some(image.height),
                },
                size,
            );

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            // Repeat in both directions, linear filtering when stretching or shrinking.
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                address_mode_w: wgpu::AddressMode::Repeat,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            });

            let layout = Self::bind_group_layout(device);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: SAMPLER_BINDING,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            });
            (texture, view, sampler, bind_group)
        });
        if let Some(err) = error {
            log::error!("Texture '{}' rejected by the device: {}", label, err);
            return Err(TextureError::Gpu {
                label: label.to_string(),
                log: err.to_string(),
            });
        }

        log::info!(
            "Texture loaded: '{}' {}x{} ({} channels)",
            label,
            image.width,
            image.height,
            image.channels
        );

        Ok(Self {
            label: label.to_string(),
            texture,
            view,
            sampler,
            size: (image.width, image.height),
            bind_group,
            bound: false,
        })
    }

    pub fn bind(&mut self, pass: &mut wgpu::RenderPass<'_>, group: u32) {
        pass.set_bind_group(group, &self.bind_group, &[]);
        self.bound = true;
    }

    /// A pass keeps its last bind group until replaced, so unbinding only
    /// ends this texture's use for the current draw sequence.
    pub fn unbind(&mut self) {
        self.bound = false;
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Frees the GPU storage now instead of waiting for drop.
    pub fn release(&self) {
        self.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
    use std::io::Cursor;

    fn encode_png(img: DynamicImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png)
            .expect("encode test png");
        bytes.into_inner()
    }

    #[test]
    fn decodes_rgba_image_unchanged() {
        let img = ImageBuffer::from_fn(2, 3, |x, y| Rgba([x as u8, y as u8, 7, 200]));
        let decoded = decode_image(&encode_png(DynamicImage::ImageRgba8(img)), "rgba").expect("rgba decodes");
        assert_eq!((decoded.width, decoded.height), (2, 3));
        assert_eq!(decoded.channels, 4);
        assert_eq!(&decoded.rgba[..4], &[0, 0, 7, 200]);
        assert_eq!(decoded.rgba.len(), 2 * 3 * 4);
    }

    #[test]
    fn expands_rgb_image_to_opaque_rgba() {
        let img = ImageBuffer::from_pixel(4, 4, Rgb([10u8, 20, 30]));
        let decoded = decode_image(&encode_png(DynamicImage::ImageRgb8(img)), "rgb").expect("rgb decodes");
        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.rgba.len(), 4 * 4 * 4);
        assert_eq!(&decoded.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn rejects_single_channel_image() {
        let img = ImageBuffer::from_pixel(2, 2, Luma([128u8]));
        let err = decode_image(&encode_png(DynamicImage::ImageLuma8(img)), "gray").expect_err("grayscale is unsupported");
        assert!(matches!(
            err,
            TextureError::UnsupportedChannels { channels: 1, .. }
        ));
    }

    #[test]
    fn rejects_image_beyond_device_texture_limit() {
        let max = wgpu::Limits::default().max_texture_dimension_2d;
        let wide = DecodedImage {
            width: max + 1,
            height: 10,
            channels: 4,
            rgba: Vec::new(),
        };
        let err = check_dimensions(&wide, "wide", max).expect_err("too wide for the device");
        assert!(matches!(
            err,
            TextureError::TooLarge { width, height: 10, .. } if width == max + 1
        ));

        let fits = DecodedImage {
            width: max,
            height: max,
            channels: 4,
            rgba: Vec::new(),
        };
        assert!(check_dimensions(&fits, "fits", max).is_ok());
    }

    #[test]
    fn rejects_bytes_that_are_not_an_image() {
        let err = decode_image(b"definitely not a png", "junk").expect_err("garbage input");
        assert!(matches!(err, TextureError::Decode { .. }));
    }
}
