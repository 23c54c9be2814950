use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::DEFAULT_SCALE_FACTOR;
use crate::layout::{EXPORT_COMPENSATION, PREVIEW_COMPENSATION};
use crate::paths;
use crate::style::{Rgb, StyleConfig};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub style: StyleConfig,
    pub preview_compensation: f32,
    pub export_compensation: f32,
    pub output_root: PathBuf,
    pub scale_factor: u32,
    pub preview_width: u32,
    pub preview_height: u32,
    pub fonts_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            style: StyleConfig::default(),
            preview_compensation: PREVIEW_COMPENSATION,
            export_compensation: EXPORT_COMPENSATION,
            output_root: paths::default_output_root(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            preview_width: 800,
            preview_height: 600,
            fonts_dir: paths::default_fonts_dir(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    style: Option<StyleSettings>,
    layout: Option<LayoutSettings>,
    export: Option<ExportSettings>,
    preview: Option<PreviewSettings>,
    fonts: Option<FontSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    font_family: Option<String>,
    font_size: Option<u32>,
    text_color: Option<String>,
    line_spacing: Option<f32>,
    margin_top: Option<u32>,
    margin_bottom: Option<u32>,
    margin_left: Option<u32>,
    margin_right: Option<u32>,
    center_horizontally: Option<bool>,
    center_vertically: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    preview_compensation: Option<f32>,
    export_compensation: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSettings {
    output_dir: Option<String>,
    scale_factor: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PreviewSettings {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dir: Option<String>,
}

/// Loads the built-in defaults, then merges every settings file that exists,
/// later files winning. An explicit `extra_path` must exist.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(dir) = paths::settings_dir() {
        ordered_paths.push(dir.join("settings.toml"));
        ordered_paths.push(dir.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }
    load_settings_from(&ordered_paths)
}

pub(crate) fn load_settings_from(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults)?;

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    settings
        .style
        .validate()
        .with_context(|| "settings produce an invalid style")?;
    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(style) = incoming.style {
            self.merge_style(style)?;
        }
        if let Some(layout) = incoming.layout {
            if let Some(value) = layout.preview_compensation {
                if value.is_finite() {
                    self.preview_compensation = value;
                }
            }
            if let Some(value) = layout.export_compensation {
                if value.is_finite() {
                    self.export_compensation = value;
                }
            }
        }
        if let Some(export) = incoming.export {
            if let Some(dir) = export.output_dir.as_deref().and_then(paths::resolve_configured_dir) {
                self.output_root = dir;
            }
            if let Some(scale) = export.scale_factor {
                if scale > 0 {
                    self.scale_factor = scale;
                }
            }
        }
        if let Some(preview) = incoming.preview {
            if let Some(width) = preview.width {
                if width > 0 {
                    self.preview_width = width;
                }
            }
            if let Some(height) = preview.height {
                if height > 0 {
                    self.preview_height = height;
                }
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(dir) = fonts.dir.as_deref().and_then(paths::resolve_configured_dir) {
                self.fonts_dir = dir;
            }
        }
        Ok(())
    }

    fn merge_style(&mut self, incoming: StyleSettings) -> Result<()> {
        let style = &mut self.style;
        if let Some(family) = incoming.font_family {
            if !family.trim().is_empty() {
                style.font_family = family.trim().to_string();
            }
        }
        if let Some(size) = incoming.font_size {
            style.font_size = size;
        }
        if let Some(color) = incoming.text_color {
            if !color.trim().is_empty() {
                style.text_color = Rgb::parse_hex(&color)?;
            }
        }
        if let Some(spacing) = incoming.line_spacing {
            style.line_spacing = spacing;
        }
        if let Some(margin) = incoming.margin_top {
            style.margin_top = margin;
        }
        if let Some(margin) = incoming.margin_bottom {
            style.margin_bottom = margin;
        }
        if let Some(margin) = incoming.margin_left {
            style.margin_left = margin;
        }
        if let Some(margin) = incoming.margin_right {
            style.margin_right = margin;
        }
        if let Some(center) = incoming.center_horizontally {
            style.center_horizontally = center;
        }
        if let Some(center) = incoming.center_vertically {
            style.center_vertically = center;
        }
        Ok(())
    }
}
