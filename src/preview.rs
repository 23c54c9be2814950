use std::path::Path;

use image::RgbaImage;
use tracing::{debug, error, warn};

use crate::background::BackgroundImage;
use crate::compositor::Compositor;
use crate::error::{ComposeError, Result};
use crate::layout::{LayoutResult, PREVIEW_COMPENSATION, RenderContext};
use crate::style::StyleConfig;

/// State changes the UI collaborator reports to the preview.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    BackgroundChanged(Option<BackgroundImage>),
    TextsChanged(Vec<String>),
    ActiveIndexChanged(usize),
    StyleChanged(StyleConfig),
    ViewportResized { width: u32, height: u32 },
}

/// Keeps one frame of the active text rendered at viewport resolution.
///
/// Every state change recomputes the frame from scratch. Missing input yields
/// a cleared frame rather than an error.
pub struct PreviewController {
    compositor: Compositor,
    background: Option<BackgroundImage>,
    texts: Vec<String>,
    active_index: Option<usize>,
    style: StyleConfig,
    viewport: (u32, u32),
    compensation: f32,
    frame: Option<RgbaImage>,
    layout: Option<LayoutResult>,
}

impl PreviewController {
    pub fn new(compositor: Compositor, style: StyleConfig, viewport: (u32, u32)) -> Self {
        Self {
            compositor,
            background: None,
            texts: Vec::new(),
            active_index: None,
            style,
            viewport,
            compensation: PREVIEW_COMPENSATION,
            frame: None,
            layout: None,
        }
    }

    pub fn with_compensation(mut self, compensation: f32) -> Self {
        self.compensation = compensation;
        self
    }

    pub fn handle(&mut self, event: PreviewEvent) -> Option<&RgbaImage> {
        match event {
            PreviewEvent::BackgroundChanged(background) => {
                self.background = background;
            }
            PreviewEvent::TextsChanged(texts) => {
                self.active_index = if texts.is_empty() { None } else { Some(0) };
                self.texts = texts;
            }
            PreviewEvent::ActiveIndexChanged(index) => {
                if index < self.texts.len() {
                    self.active_index = Some(index);
                } else {
                    debug!("ignoring out-of-range preview index {}", index);
                }
            }
            PreviewEvent::StyleChanged(style) => {
                self.style = style;
            }
            PreviewEvent::ViewportResized { width, height } => {
                self.viewport = (width, height);
            }
        }
        self.recompute();
        self.frame()
    }

    pub fn next(&mut self) -> Option<&RgbaImage> {
        match self.active_index {
            Some(index) if index + 1 < self.texts.len() => {
                self.handle(PreviewEvent::ActiveIndexChanged(index + 1))
            }
            _ => self.frame(),
        }
    }

    pub fn prev(&mut self) -> Option<&RgbaImage> {
        match self.active_index {
            Some(index) if index > 0 => self.handle(PreviewEvent::ActiveIndexChanged(index - 1)),
            _ => self.frame(),
        }
    }

    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    pub fn layout(&self) -> Option<LayoutResult> {
        self.layout
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn background(&self) -> Option<&BackgroundImage> {
        self.background.as_ref()
    }

    pub fn save_frame(&self, path: &Path) -> Result<()> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| ComposeError::Validation("no preview frame to save".into()))?;
        frame
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|err| match err {
                image::ImageError::IoError(source) => ComposeError::io(path, source),
                other => ComposeError::Composite(other.to_string()),
            })
    }

    fn recompute(&mut self) {
        self.frame = None;
        self.layout = None;
        let Some(background) = self.background.as_ref() else {
            return;
        };
        let Some(text) = self.active_index.and_then(|index| self.texts.get(index)) else {
            return;
        };
        let (fitted, ratio) = match background.fit_within(self.viewport.0, self.viewport.1) {
            Ok(fitted) => fitted,
            Err(err) => {
                debug!("preview cleared: {}", err);
                return;
            }
        };
        let context = RenderContext::preview(ratio).with_compensation(self.compensation);
        match self
            .compositor
            .compose(&fitted, text, &self.style, &context, 1.0)
        {
            Ok(frame) => {
                if frame.font.substituted {
                    warn!(
                        "font '{}' not available, preview uses {}",
                        frame.font.requested,
                        frame.font.family().unwrap_or("estimated metrics")
                    );
                }
                self.layout = Some(frame.layout);
                self.frame = Some(frame.image);
            }
            Err(err) => {
                error!("failed to update preview: {}", err);
            }
        }
    }
}
