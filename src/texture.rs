//! Texture fetching and decoding

use image::{ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fetch::{read_file, Fetcher};
use crate::request::{LoadRequest, ResourceKind};

/// Error type for texture decoding
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Image decoding error: {0}")]
    DecodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded pixels of a texture
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: TextureFormat,
}

/// Supported texture formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

/// Decodes image bytes into RGBA8 textures
#[derive(Debug, Default, Clone, Copy)]
pub struct TextureDecoder;

impl TextureDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a texture from binary data
    ///
    /// A `flip_y` of `true` mirrors rows so the first row is the bottom of the image.
    pub fn decode(&self, data: &[u8], flip_y: bool) -> Result<Texture, TextureError> {
        let format =
            image::guess_format(data).map_err(|e| TextureError::DecodeError(e.to_string()))?;

        match format {
            ImageFormat::Jpeg | ImageFormat::Png => {}
            _ => {
                return Err(TextureError::UnsupportedFormat(format!(
                    "Only JPG/JPEG and PNG formats are supported, got {:?}",
                    format.extensions_str()
                )))
            }
        }

        let mut img = ImageReader::with_format(std::io::Cursor::new(data), format)
            .decode()
            .map_err(|e| TextureError::DecodeError(e.to_string()))?;

        if flip_y {
            img = img.flipv();
        }

        let rgba_img = img.into_rgba8();
        let (width, height) = rgba_img.dimensions();

        Ok(Texture {
            width,
            height,
            data: rgba_img.into_raw(),
            format: TextureFormat::Rgba8,
        })
    }
}

/// Loads textures from files below a base directory
///
/// Understands the `flip_y` variant parameter.
#[derive(Debug, Clone)]
pub struct TextureFetcher {
    base_dir: PathBuf,
    decoder: TextureDecoder,
}

impl TextureFetcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            decoder: TextureDecoder::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    async fn load_file(&self, path: &Path, flip_y: bool) -> Result<Texture, TextureError> {
        let data = read_file(path).await?;
        self.decoder.decode(&data, flip_y)
    }
}

#[async_trait::async_trait]
impl Fetcher for TextureFetcher {
    type Output = Texture;

    fn kinds(&self) -> &[ResourceKind] {
        &[ResourceKind::Texture]
    }

    async fn fetch(&self, request: &LoadRequest) -> anyhow::Result<Texture> {
        let path = self.base_dir.join(request.locator.trim_start_matches('/'));
        let flip_y = request.variant.get("flip_y") == Some("true");

        let texture = self
            .load_file(&path, flip_y)
            .await
            .map_err(|err| anyhow::Error::new(err).context(format!("loading {}", path.display())))?;

        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Rpc, Variant};

    fn encode_png(pixels: &[[u8; 4]]) -> Vec<u8> {
        let mut img = image::RgbaImage::new(1, pixels.len() as u32);
        for (y, pixel) in pixels.iter().enumerate() {
            img.put_pixel(0, y as u32, image::Rgba(*pixel));
        }

        let mut png_data = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut png_data),
            image::ImageFormat::Png,
        )
        .expect("Failed to encode test image");
        png_data
    }

    #[test]
    fn test_decode_png() {
        let decoder = TextureDecoder::new();
        let png = encode_png(&[[255, 0, 0, 255]]);

        let result = decoder.decode(&png, false);
        assert!(result.is_ok(), "Failed to load PNG: {:?}", result.err());

        let texture = result.unwrap();
        assert_eq!(texture.width, 1);
        assert_eq!(texture.height, 1);
        assert_eq!(texture.format, TextureFormat::Rgba8);
        assert_eq!(texture.data, vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_decode_flip_y() {
        let decoder = TextureDecoder::new();
        let png = encode_png(&[[1, 1, 1, 255], [2, 2, 2, 255]]);

        let texture = decoder.decode(&png, true).unwrap();
        assert_eq!(&texture.data[..4], &[2, 2, 2, 255]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let decoder = TextureDecoder::new();
        assert!(matches!(
            decoder.decode(b"not an image", false),
            Err(TextureError::DecodeError(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_texture_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wall.png"), encode_png(&[[9, 8, 7, 255]])).unwrap();

        let fetcher = TextureFetcher::new(dir.path());
        let request = LoadRequest::new(ResourceKind::Texture, "/wall.png", Rpc(1))
            .with_variant(Variant::new().with("flip_y", true));

        let texture = fetcher.fetch(&request).await.unwrap();
        assert_eq!(texture.data, vec![9, 8, 7, 255]);
    }
}
