use image::RgbaImage;
use resvg::render;
use tiny_skia::{Color, Pixmap, Transform};
use usvg::{Options, Tree};

use crate::background::BackgroundImage;
use crate::error::{ComposeError, Result};
use crate::font::{FontLibrary, MeasuredBlock, ResolvedFont, measure, normalize_text};
use crate::layout::{LayoutResult, RenderContext, place};
use crate::style::StyleConfig;

/// A rendered canvas together with the layout that produced it.
pub struct Frame {
    pub image: RgbaImage,
    pub layout: LayoutResult,
    pub block: MeasuredBlock,
    pub font: ResolvedFont,
}

/// Draws a background and a positioned text block onto a raster canvas.
///
/// Holds only the read-only font library, so one compositor can serve any
/// number of renders; every call allocates its own canvas.
#[derive(Clone)]
pub struct Compositor {
    fonts: FontLibrary,
}

impl Compositor {
    pub fn new(fonts: FontLibrary) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontLibrary {
        &self.fonts
    }

    /// Measure, place and render `text` in one pass.
    pub fn compose(
        &self,
        background: &BackgroundImage,
        text: &str,
        style: &StyleConfig,
        context: &RenderContext,
        canvas_scale: f32,
    ) -> Result<Frame> {
        let font = self.fonts.resolve(&style.font_family);
        self.compose_with_font(background, text, style, font, context, canvas_scale)
    }

    /// Like [`Compositor::compose`] with a font resolved up front, so a batch
    /// looks the family up once.
    pub fn compose_with_font(
        &self,
        background: &BackgroundImage,
        text: &str,
        style: &StyleConfig,
        font: ResolvedFont,
        context: &RenderContext,
        canvas_scale: f32,
    ) -> Result<Frame> {
        let font_size = context.font_size(style);
        let block = measure(text, &font, font_size)?;
        let layout = place(
            &block,
            background.width() as f32,
            background.height() as f32,
            style,
            context,
        );
        let image = self.render(
            background,
            text,
            style,
            &font,
            &block,
            &layout,
            font_size,
            canvas_scale,
        )?;
        Ok(Frame {
            image,
            layout,
            block,
            font,
        })
    }

    /// Renders onto a canvas of `background × canvas_scale` pixels. Layout
    /// coordinates and `font_size` are in background pixels; the scale is
    /// applied uniformly to both.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        background: &BackgroundImage,
        text: &str,
        style: &StyleConfig,
        font: &ResolvedFont,
        block: &MeasuredBlock,
        layout: &LayoutResult,
        font_size: f32,
        canvas_scale: f32,
    ) -> Result<RgbaImage> {
        if !canvas_scale.is_finite() || canvas_scale <= 0.0 {
            return Err(ComposeError::Composite(format!(
                "invalid canvas scale {}",
                canvas_scale
            )));
        }
        let (width, height) = canvas_size(background, canvas_scale);
        let svg = scene_svg(background, text, style, font, block, layout, font_size);

        let options = Options {
            fontdb: self.fonts.database(),
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options)
            .map_err(|err| ComposeError::Composite(format!("failed to build scene: {}", err)))?;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            ComposeError::Composite(format!("cannot allocate {}x{} canvas", width, height))
        })?;
        pixmap.fill(Color::WHITE);
        let mut pixmap_mut = pixmap.as_mut();
        render(
            &tree,
            Transform::from_scale(canvas_scale, canvas_scale),
            &mut pixmap_mut,
        );
        // Opaque after the white fill, so premultiplied and straight alpha agree.
        RgbaImage::from_raw(width, height, pixmap.take())
            .ok_or_else(|| ComposeError::Composite("failed to build image buffer".into()))
    }
}

pub fn canvas_size(background: &BackgroundImage, canvas_scale: f32) -> (u32, u32) {
    (
        (background.width() as f32 * canvas_scale).round() as u32,
        (background.height() as f32 * canvas_scale).round() as u32,
    )
}

fn scene_svg(
    background: &BackgroundImage,
    text: &str,
    style: &StyleConfig,
    font: &ResolvedFont,
    block: &MeasuredBlock,
    layout: &LayoutResult,
    font_size: f32,
) -> String {
    let width = background.width();
    let height = background.height();
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    let uri = background.data_uri();
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = uri,
        w = width,
        h = height
    ));

    let color = style.text_color.to_hex();
    let family_attr = font
        .family()
        .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
        .unwrap_or_default();
    let advance = block.line_height * style.line_spacing;
    let baseline = layout.y + font.ascent(font_size);
    for (idx, line) in normalize_text(text).split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}"{family} xml:space="preserve">{text}</text>"#,
            x = layout.x,
            y = baseline + advance * idx as f32,
            size = font_size,
            color = color,
            family = family_attr,
            text = escape_xml(line)
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
