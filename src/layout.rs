//! Placement of a measured text block on a canvas.
//!
//! Horizontal centering adds a compensation of `font_size * k` to offset the
//! leading whitespace that some glyphs and punctuation carry. `k` is chosen
//! per rendering context and has no derivation beyond visual tuning, so the
//! preview and export values are kept as separate constants.

use crate::font::MeasuredBlock;
use crate::style::StyleConfig;

/// Compensation factor applied when centering in the interactive preview.
pub const PREVIEW_COMPENSATION: f32 = 0.2;
/// Compensation factor applied when centering in the batch export.
pub const EXPORT_COMPENSATION: f32 = 0.1;

/// How a style is projected onto a particular canvas.
///
/// `font_scale` multiplies both the font size and the margins. The export
/// works in original background pixels (`font_scale = 1`); the preview works
/// in viewport pixels and scales by the fitted-to-original ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub font_scale: f32,
    pub compensation: f32,
}

impl RenderContext {
    pub fn preview(font_scale: f32) -> Self {
        Self {
            font_scale,
            compensation: PREVIEW_COMPENSATION,
        }
    }

    pub fn export() -> Self {
        Self {
            font_scale: 1.0,
            compensation: EXPORT_COMPENSATION,
        }
    }

    pub fn with_compensation(self, compensation: f32) -> Self {
        Self {
            compensation,
            ..self
        }
    }

    pub fn font_size(&self, style: &StyleConfig) -> f32 {
        style.font_size as f32 * self.font_scale
    }

    pub fn margins(&self, style: &StyleConfig) -> Margins {
        Margins {
            top: style.margin_top as f32 * self.font_scale,
            bottom: style.margin_bottom as f32 * self.font_scale,
            left: style.margin_left as f32 * self.font_scale,
            right: style.margin_right as f32 * self.font_scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

/// Top-left corner of a text block on a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutResult {
    pub x: f32,
    pub y: f32,
}

/// Places `block` on a `canvas_w` × `canvas_h` canvas.
///
/// The result always lies in the margin box when the block, at its drawn
/// height, fits; when it does not, the top/left margin wins and the block
/// overflows right/bottom.
pub fn place(
    block: &MeasuredBlock,
    canvas_w: f32,
    canvas_h: f32,
    style: &StyleConfig,
    context: &RenderContext,
) -> LayoutResult {
    let margins = context.margins(style);

    let x = if style.center_horizontally {
        let compensation = context.font_size(style) * context.compensation;
        (canvas_w - block.max_line_width) / 2.0 + compensation
    } else {
        margins.left
    };

    let drawn_height = drawn_height(block, style);
    let y = if style.center_vertically {
        (canvas_h - drawn_height) / 2.0
    } else {
        margins.top
    };

    LayoutResult {
        x: clamp_low_wins(
            x,
            margins.left,
            canvas_w - margins.right - block.max_line_width,
        ),
        y: clamp_low_wins(y, margins.top, canvas_h - margins.bottom - drawn_height),
    }
}

/// Height of the block as the renderer draws it: `total_height` plus the
/// extra gap `line_spacing` adds between consecutive lines.
pub fn drawn_height(block: &MeasuredBlock, style: &StyleConfig) -> f32 {
    let gaps = block.line_count.saturating_sub(1) as f32;
    let extra_spacing = gaps * block.average_line_height() * (style.line_spacing - 1.0);
    block.total_height + extra_spacing
}

// `f32::clamp` panics when lo > hi; here the lower bound takes precedence.
fn clamp_low_wins(value: f32, lo: f32, hi: f32) -> f32 {
    let value = if value.is_nan() { lo } else { value };
    lo.max(value.min(hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(width: f32, line_height: f32, lines: usize) -> MeasuredBlock {
        MeasuredBlock {
            line_widths: vec![width; lines],
            max_line_width: width,
            total_height: line_height * lines as f32,
            line_count: lines,
            line_height,
        }
    }

    fn in_bounds(result: LayoutResult, b: &MeasuredBlock, w: f32, h: f32, s: &StyleConfig) {
        let lo_x = s.margin_left as f32;
        let hi_x = (w - s.margin_right as f32 - b.max_line_width).max(lo_x);
        let lo_y = s.margin_top as f32;
        let hi_y = (h - s.margin_bottom as f32 - drawn_height(b, s)).max(lo_y);
        assert!(result.x >= lo_x && result.x <= hi_x, "x {} not in [{}, {}]", result.x, lo_x, hi_x);
        assert!(result.y >= lo_y && result.y <= hi_y, "y {} not in [{}, {}]", result.y, lo_y, hi_y);
    }

    #[test]
    fn centers_single_line_on_900_by_1200() {
        let style = StyleConfig::default();
        let b = block(200.0, 30.0, 1);
        let result = place(&b, 900.0, 1200.0, &style, &RenderContext::export());
        // (900 - 200) / 2 + 24 * 0.1
        assert!((result.x - 352.4).abs() < 1e-3);
        assert!((result.y - 585.0).abs() < 1e-3);
        in_bounds(result, &b, 900.0, 1200.0, &style);
    }

    #[test]
    fn preview_and_export_compensation_differ() {
        let style = StyleConfig::default();
        let b = block(200.0, 30.0, 1);
        let export = place(&b, 900.0, 1200.0, &style, &RenderContext::export());
        let preview = place(&b, 900.0, 1200.0, &style, &RenderContext::preview(1.0));
        assert!((preview.x - export.x - 24.0 * 0.1).abs() < 1e-3);
        assert_eq!(preview.y, export.y);
    }

    #[test]
    fn vertical_centering_accounts_for_line_spacing() {
        let mut style = StyleConfig::default();
        style.line_spacing = 2.0;
        let b = block(100.0, 40.0, 3);
        let result = place(&b, 900.0, 1200.0, &style, &RenderContext::export());
        // extra = 2 gaps * 40 * (2 - 1) = 80
        assert!((result.y - (1200.0 - 120.0 - 80.0) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn spaced_block_stays_above_bottom_margin() {
        let mut style = StyleConfig::default();
        style.line_spacing = 2.0;
        style.margin_top = 20;
        style.margin_bottom = 120;
        let b = block(50.0, 20.0, 3);
        // drawn height 60 + 2 * 20 = 100; centred y 100 would end at 200 > 180
        assert_eq!(drawn_height(&b, &style), 100.0);
        let result = place(&b, 300.0, 300.0, &style, &RenderContext::export());
        assert!((result.y - 80.0).abs() < 1e-3);
        assert!(result.y + drawn_height(&b, &style) <= 300.0 - 120.0 + 1e-3);
    }

    #[test]
    fn single_line_ignores_spacing() {
        let mut style = StyleConfig::default();
        style.line_spacing = 3.0;
        let b = block(50.0, 20.0, 1);
        assert_eq!(drawn_height(&b, &style), 20.0);
    }

    #[test]
    fn uncentered_uses_margins() {
        let mut style = StyleConfig::default();
        style.center_horizontally = false;
        style.center_vertically = false;
        style.margin_left = 50;
        style.margin_top = 40;
        let result = place(&block(100.0, 20.0, 2), 900.0, 1200.0, &style, &RenderContext::export());
        insta::assert_debug_snapshot!(result, @r"
        LayoutResult {
            x: 50.0,
            y: 40.0,
        }
        ");
    }

    #[test]
    fn clamps_into_asymmetric_margin_box() {
        let mut style = StyleConfig::default();
        style.margin_left = 10;
        style.margin_right = 400;
        let b = block(300.0, 30.0, 1);
        let result = place(&b, 900.0, 1200.0, &style, &RenderContext::export());
        // centred x would be 302.4, the right bound is 900 - 400 - 300 = 200
        assert!((result.x - 200.0).abs() < 1e-3);
        in_bounds(result, &b, 900.0, 1200.0, &style);
    }

    #[test]
    fn oversized_block_falls_back_to_margin_corner() {
        let style = StyleConfig::default().with_margins(200);
        let b = block(2000.0, 500.0, 4);
        let result = place(&b, 300.0, 300.0, &style, &RenderContext::export());
        assert_eq!(result, LayoutResult { x: 200.0, y: 200.0 });
    }

    #[test]
    fn margins_larger_than_canvas_never_go_negative() {
        let style = StyleConfig::default().with_margins(5000);
        let result = place(&block(10.0, 10.0, 1), 100.0, 100.0, &style, &RenderContext::export());
        assert_eq!(result, LayoutResult { x: 5000.0, y: 5000.0 });
    }

    #[test]
    fn preview_scales_margins_and_font() {
        let mut style = StyleConfig::default();
        style.center_horizontally = false;
        style.center_vertically = false;
        let context = RenderContext::preview(0.5);
        assert_eq!(context.font_size(&style), 12.0);
        let result = place(&block(10.0, 10.0, 1), 450.0, 600.0, &style, &context);
        assert_eq!(result, LayoutResult { x: 25.0, y: 25.0 });
    }

    #[test]
    fn place_is_pure_and_clamped_across_grid() {
        let widths = [0.0, 50.0, 400.0, 1200.0];
        let heights = [0.0, 30.0, 700.0];
        let margins = [0, 50, 200, 700];
        for &w in &widths {
            for &h in &heights {
                for &m in &margins {
                    for (ch, cv) in [(true, true), (false, true), (true, false), (false, false)] {
                        let mut style = StyleConfig::default().with_margins(m);
                        style.margin_right = m / 2;
                        style.center_horizontally = ch;
                        style.center_vertically = cv;
                        style.line_spacing = 1.5;
                        let b = block(w, h / 3.0, 3);
                        let ctx = RenderContext::export();
                        let first = place(&b, 900.0, 1200.0, &style, &ctx);
                        let second = place(&b, 900.0, 1200.0, &style, &ctx);
                        assert_eq!(first, second);
                        in_bounds(first, &b, 900.0, 1200.0, &style);
                    }
                }
            }
        }
    }
}
