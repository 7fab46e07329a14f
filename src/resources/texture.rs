//! Image decoding for skybox sources

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{SkyboxError, SkyboxResult};
use image::DynamicImage;
use std::path::Path;

/// Decoded image data ready for upload
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Decode an image file as 8-bit RGBA
    pub fn from_file<P: AsRef<Path>>(path: P) -> SkyboxResult<Self> {
        let path = path.as_ref();
        let img = open(path)?;
        Ok(Self::from_image_rgba8(img, &file_name(path)))
    }

    /// Decode a panorama, keeping floating-point sources (Radiance HDR, OpenEXR)
    /// in half-float so they stay filterable
    pub fn panorama_from_file<P: AsRef<Path>>(path: P) -> SkyboxResult<Self> {
        let path = path.as_ref();
        let img = open(path)?;
        let name = file_name(path);

        match img {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                Ok(Self::from_image_f16(img, &name))
            }
            _ => Ok(Self::from_image_rgba8(img, &name)),
        }
    }

    fn from_image_rgba8(img: DynamicImage, name: &str) -> Self {
        let rgba = img.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            format: TextureFormat::Rgba8Unorm,
            data: rgba.into_raw(),
            name: name.to_string(),
        }
    }

    fn from_image_f16(img: DynamicImage, name: &str) -> Self {
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let data = rgba
            .into_raw()
            .into_iter()
            .flat_map(|v| f32_to_f16_bits(v).to_le_bytes())
            .collect();
        Self {
            width,
            height,
            format: TextureFormat::Rgba16Float,
            data,
            name: name.to_string(),
        }
    }

    /// Upload as a 2D texture
    pub fn upload<B: GraphicsBackend>(&self, backend: &mut B) -> BackendResult<TextureHandle> {
        backend.create_texture(
            &TextureDescriptor {
                label: Some(self.name.clone()),
                width: self.width,
                height: self.height,
                mip_levels: 1,
                format: self.format,
            },
            &self.data,
        )
    }
}

fn open(path: &Path) -> SkyboxResult<DynamicImage> {
    image::open(path).map_err(|source| SkyboxError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Final path component, lossily converted
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Case-insensitive extension check against a list such as `["png", "hdr"]`
pub fn is_accepted_extension(path: &Path, accepted: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            accepted
                .iter()
                .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Convert f32 to IEEE 754 half-precision bits, rounding to nearest even
pub(crate) fn f32_to_f16_bits(val: f32) -> u16 {
    let bits = val.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exp = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x7FFFFF;

    if exp == 0xFF {
        // Infinity or NaN
        let nan_bit = if mantissa != 0 { 0x200 } else { 0 };
        return (sign | 0x7C00 | nan_bit) as u16;
    }

    let half_exp = exp - 127 + 15;
    if half_exp >= 31 {
        return (sign | 0x7C00) as u16;
    }

    if half_exp <= 0 {
        // Below half of the smallest subnormal everything rounds to zero
        if half_exp < -10 {
            return sign as u16;
        }
        let full = mantissa | 0x800000;
        let shift = (14 - half_exp) as u32;
        let half = round_shifted(full, shift);
        // A carry out of the subnormal range lands on the smallest normal
        return (sign | half) as u16;
    }

    let half = ((half_exp as u32) << 10) | (mantissa >> 13);
    let rounded = half + round_up(mantissa & 0x1FFF, 13, half);
    // A carry out of the largest exponent lands on infinity
    (sign | rounded) as u16
}

/// `value >> shift`, rounded to nearest even
fn round_shifted(value: u32, shift: u32) -> u32 {
    let kept = value >> shift;
    kept + round_up(value & ((1 << shift) - 1), shift, kept)
}

fn round_up(dropped: u32, shift: u32, kept: u32) -> u32 {
    let halfway = 1 << (shift - 1);
    u32::from(dropped > halfway || (dropped == halfway && kept & 1 == 1))
}
