//! Cubemap layouts packed into a single 2D image
//!
//! Face order is always +X, -X, +Y, -Y, +Z, -Z. Cross layouts:
//!
//! ```text
//!  3x4 cross      4x3 cross
//!   . +Y .        . +Y .  .
//!  +Z +X -Z      -X +Z +X -Z
//!   . -Y .        . -Y .  .
//!   . -X .
//! ```

use crate::backend::types::{CubemapFace, TextureFormat};
use crate::error::{SkyboxError, SkyboxResult};
use crate::resources::texture::TextureData;

/// Arrangement of the six faces inside the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubemapLayout {
    /// Six faces stacked top to bottom
    LineVertical,
    /// Six faces side by side
    LineHorizontal,
    /// Three faces wide, four tall
    CrossThreeByFour,
    /// Four faces wide, three tall
    CrossFourByThree,
}

impl CubemapLayout {
    /// Infer the layout and face size from image dimensions
    pub fn detect(width: u32, height: u32) -> Option<(Self, u32)> {
        let detected = if width > height {
            if width / 6 == height {
                Some((CubemapLayout::LineHorizontal, width / 6))
            } else if width / 4 == height / 3 {
                Some((CubemapLayout::CrossFourByThree, width / 4))
            } else {
                None
            }
        } else if height > width {
            if height / 6 == width {
                Some((CubemapLayout::LineVertical, height / 6))
            } else if width / 3 == height / 4 {
                Some((CubemapLayout::CrossThreeByFour, width / 3))
            } else {
                None
            }
        } else {
            None
        };

        detected.filter(|(_, size)| *size > 0)
    }

    /// Top-left corner of a face, in units of the face size
    pub fn face_origin(&self, face: CubemapFace) -> (u32, u32) {
        let i = face.index();
        match self {
            CubemapLayout::LineVertical => (0, i),
            CubemapLayout::LineHorizontal => (i, 0),
            CubemapLayout::CrossThreeByFour => match face {
                CubemapFace::PositiveX => (1, 1),
                CubemapFace::NegativeX => (1, 3),
                CubemapFace::PositiveY => (1, 0),
                CubemapFace::NegativeY => (1, 2),
                CubemapFace::PositiveZ => (0, 1),
                CubemapFace::NegativeZ => (2, 1),
            },
            CubemapLayout::CrossFourByThree => match face {
                CubemapFace::PositiveX => (2, 1),
                CubemapFace::NegativeX => (0, 1),
                CubemapFace::PositiveY => (1, 0),
                CubemapFace::NegativeY => (1, 2),
                CubemapFace::PositiveZ => (1, 1),
                CubemapFace::NegativeZ => (3, 1),
            },
        }
    }
}

/// Six square faces cut out of a layout image
#[derive(Debug, Clone)]
pub struct CubemapFaces {
    pub layout: CubemapLayout,
    pub size: u32,
    pub format: TextureFormat,
    /// Tightly packed pixels per face, in [`CubemapFace::ALL`] order
    pub faces: Vec<Vec<u8>>,
}

impl CubemapFaces {
    /// Auto-detect the layout of `image` and split it into faces
    pub fn extract(image: &TextureData) -> SkyboxResult<Self> {
        let (layout, size) = CubemapLayout::detect(image.width, image.height).ok_or(
            SkyboxError::LayoutNotDetected {
                width: image.width,
                height: image.height,
            },
        )?;

        let bpp = image.format.bytes_per_pixel() as usize;
        let src_stride = image.width as usize * bpp;
        let row_len = size as usize * bpp;

        let faces = CubemapFace::ALL
            .iter()
            .map(|face| {
                let (fx, fy) = layout.face_origin(*face);
                let x0 = (fx * size) as usize * bpp;
                let y0 = (fy * size) as usize;
                let mut pixels = Vec::with_capacity(row_len * size as usize);
                for row in y0..y0 + size as usize {
                    let start = row * src_stride + x0;
                    pixels.extend_from_slice(&image.data[start..start + row_len]);
                }
                pixels
            })
            .collect();

        log::debug!(
            "Detected {:?} cubemap layout in {} ({}x{}, face size {})",
            layout,
            image.name,
            image.width,
            image.height,
            size
        );

        Ok(Self {
            layout,
            size,
            format: image.format,
            faces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(600, 100, Some((CubemapLayout::LineHorizontal, 100)))]
    #[case(100, 600, Some((CubemapLayout::LineVertical, 100)))]
    #[case(400, 300, Some((CubemapLayout::CrossFourByThree, 100)))]
    #[case(300, 400, Some((CubemapLayout::CrossThreeByFour, 100)))]
    #[case(256, 256, None)]
    #[case(1000, 300, None)]
    #[case(7, 2, None)]
    fn test_detect(
        #[case] width: u32,
        #[case] height: u32,
        #[case] expected: Option<(CubemapLayout, u32)>,
    ) {
        assert_eq!(CubemapLayout::detect(width, height), expected);
    }

    /// Image whose every pixel stores the index of the face it belongs to, or 255
    fn tagged_image(layout: CubemapLayout, size: u32) -> TextureData {
        let (cols, rows) = match layout {
            CubemapLayout::LineVertical => (1, 6),
            CubemapLayout::LineHorizontal => (6, 1),
            CubemapLayout::CrossThreeByFour => (3, 4),
            CubemapLayout::CrossFourByThree => (4, 3),
        };
        let (width, height) = (cols * size, rows * size);
        let mut data = vec![255u8; (width * height * 4) as usize];
        for face in CubemapFace::ALL {
            let (fx, fy) = layout.face_origin(face);
            for y in fy * size..(fy + 1) * size {
                for x in fx * size..(fx + 1) * size {
                    let i = ((y * width + x) * 4) as usize;
                    data[i..i + 4].copy_from_slice(&[face.index() as u8; 4]);
                }
            }
        }
        TextureData {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            data,
            name: "tagged".into(),
        }
    }

    #[rstest]
    #[case(CubemapLayout::LineVertical)]
    #[case(CubemapLayout::LineHorizontal)]
    #[case(CubemapLayout::CrossThreeByFour)]
    #[case(CubemapLayout::CrossFourByThree)]
    fn test_extract_picks_each_face(#[case] layout: CubemapLayout) {
        let image = tagged_image(layout, 4);
        let faces = CubemapFaces::extract(&image).unwrap();

        assert_eq!(faces.layout, layout);
        assert_eq!(faces.size, 4);
        assert_eq!(faces.faces.len(), 6);
        for (i, face) in faces.faces.iter().enumerate() {
            assert_eq!(face.len(), 4 * 4 * 4);
            assert!(face.iter().all(|&b| b == i as u8), "face {} mixed", i);
        }
    }

    #[test]
    fn test_extract_rejects_square() {
        let image = TextureData {
            width: 8,
            height: 8,
            format: TextureFormat::Rgba8Unorm,
            data: vec![0; 8 * 8 * 4],
            name: "square".into(),
        };
        assert!(matches!(
            CubemapFaces::extract(&image),
            Err(SkyboxError::LayoutNotDetected {
                width: 8,
                height: 8
            })
        ));
    }
}
