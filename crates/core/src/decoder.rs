//! Image header probing.

use std::io::Cursor;

use image::ImageReader;

use crate::error::CoreError;
use crate::types::ImageFrame;

/// Reads the pixel dimensions of an uploaded image.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<ImageFrame, CoreError>;
}

/// [`ImageDecoder`] backed by the `image` crate (PNG, JPEG, WebP).
///
/// Only the header is read; pixel data is never decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderProbe;

impl ImageDecoder for HeaderProbe {
    fn decode(&self, bytes: &[u8]) -> Result<ImageFrame, CoreError> {
        if bytes.is_empty() {
            return Err(CoreError::Decode("empty upload".to_string()));
        }
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CoreError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(CoreError::Decode("unrecognized image format".to_string()));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| CoreError::Decode(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(CoreError::Decode(format!(
                "image has no pixels ({width}x{height})"
            )));
        }
        Ok(ImageFrame::new(width, height))
    }
}
