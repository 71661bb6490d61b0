use super::AssetError;

/// Decoded image, always tightly packed RGBA8 with the top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes a PNG or JPEG image.
    pub fn decode(bytes: &[u8]) -> Result<Self, AssetError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: rgba.repeat(width as usize * height as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn png_decodes_to_rgba8() {
        let img = image::RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 { image::Rgb([255, 0, 0]) } else { image::Rgb([0, 0, 255]) }
        });
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let tex = TextureData::decode(png.get_ref()).unwrap();
        assert_eq!((tex.width, tex.height), (2, 1));
        assert_eq!(tex.pixels, vec![255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn garbage_is_an_image_error() {
        assert!(matches!(
            TextureData::decode(b"not an image"),
            Err(AssetError::Image(_))
        ));
    }

    #[test]
    fn solid_fills_every_texel() {
        let tex = TextureData::solid(3, 2, [1, 2, 3, 4]);
        assert_eq!(tex.pixels.len(), 24);
        assert!(tex.pixels.chunks_exact(4).all(|px| px == [1, 2, 3, 4]));
    }
}
