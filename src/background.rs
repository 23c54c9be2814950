use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;
use image::imageops::FilterType;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ComposeError, Result};

/// A decoded background, read-only for the duration of a preview or export.
///
/// The PNG encoding used to embed the image in a composition scene is
/// produced once at construction so a batch can reuse it for every item.
#[derive(Clone)]
pub struct BackgroundImage {
    image: Arc<DynamicImage>,
    png: Arc<Vec<u8>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for BackgroundImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("path", &self.path)
            .finish()
    }
}

impl BackgroundImage {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|err| {
            ComposeError::Resource(format!(
                "failed to read background {}: {}",
                path.display(),
                err
            ))
        })?;
        let image = image::load_from_memory(&data).map_err(|err| {
            ComposeError::Resource(format!(
                "failed to decode background {}: {}",
                path.display(),
                err
            ))
        })?;
        let mut background = Self::from_image(image)?;
        background.path = Some(path.to_path_buf());
        Ok(background)
    }

    pub fn from_image(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ComposeError::Resource("background image is empty".into()));
        }
        let png = encode_png(&image)?;
        Ok(Self {
            image: Arc::new(image),
            png: Arc::new(png),
            path: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub(crate) fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(self.png.as_slice()))
    }

    /// Scales the background to fit inside `max_w` × `max_h`, keeping its
    /// aspect ratio. Returns the fitted copy and the applied scale ratio
    /// (fitted height / original height).
    pub fn fit_within(&self, max_w: u32, max_h: u32) -> Result<(Self, f32)> {
        if max_w == 0 || max_h == 0 {
            return Err(ComposeError::Validation("viewport has zero size".into()));
        }
        let fitted = self.image.resize(max_w, max_h, FilterType::Triangle);
        let ratio = fitted.height() as f32 / self.height() as f32;
        let mut background = Self::from_image(fitted)?;
        background.path = self.path.clone();
        Ok((background, ratio))
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    DynamicImage::ImageRgba8(image.to_rgba8())
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|err| ComposeError::Resource(format!("failed to encode background: {}", err)))?;
    Ok(bytes)
}
