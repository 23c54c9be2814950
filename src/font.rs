use std::path::Path;
use std::sync::Arc;

use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::error::{ComposeError, Result};

const TAB_SIZE: usize = 4;
const ESTIMATED_LINE_HEIGHT: f32 = 1.2;
const ESTIMATED_ASCENT: f32 = 0.8;

#[cfg(target_os = "macos")]
fn fallback_families() -> &'static [&'static str] {
    &["Helvetica", "Hiragino Sans", "PingFang SC", "Arial Unicode MS"]
}

#[cfg(target_os = "windows")]
fn fallback_families() -> &'static [&'static str] {
    &["Arial", "Microsoft YaHei", "Segoe UI"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn fallback_families() -> &'static [&'static str] {
    &[
        "DejaVu Sans",
        "Liberation Sans",
        "Noto Sans",
        "Noto Sans CJK SC",
    ]
}

/// Dimensions of a multi-line text block, each line measured at its natural
/// (unwrapped) width.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredBlock {
    pub line_widths: Vec<f32>,
    pub max_line_width: f32,
    /// Height of the block at single spacing.
    pub total_height: f32,
    pub line_count: usize,
    pub line_height: f32,
}

impl MeasuredBlock {
    pub fn average_line_height(&self) -> f32 {
        if self.line_count == 0 {
            return self.total_height;
        }
        self.total_height / self.line_count as f32
    }
}

/// The set of faces available for measurement and rasterisation.
///
/// The same database backs the measurer and the renderer, so a block is
/// always drawn with the face it was measured with.
#[derive(Clone)]
pub struct FontLibrary {
    db: Arc<fontdb::Database>,
}

impl FontLibrary {
    /// System fonts plus every font file found under `fonts_dir`.
    pub fn load(fonts_dir: Option<&Path>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = fonts_dir {
            if dir.is_dir() {
                db.load_fonts_dir(dir);
            } else {
                tracing::debug!("custom fonts directory not found: {}", dir.display());
            }
        }
        tracing::debug!("font library loaded {} faces", db.len());
        Self { db: Arc::new(db) }
    }

    /// A library with no faces; every lookup falls back to width estimates.
    pub fn empty() -> Self {
        Self {
            db: Arc::new(fontdb::Database::new()),
        }
    }

    pub fn from_font_data(data: Vec<u8>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_font_data(data);
        Self { db: Arc::new(db) }
    }

    pub(crate) fn database(&self) -> Arc<fontdb::Database> {
        self.db.clone()
    }

    /// Every family name in the library, sorted and de-duplicated.
    pub fn families(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .db
            .faces()
            .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolves `family`, substituting a deterministic fallback when it is not
    /// installed. Never fails.
    pub fn resolve(&self, family: &str) -> ResolvedFont {
        let requested = family.trim().to_string();
        if let Some(face) = self.load_family(&requested) {
            return ResolvedFont {
                requested,
                face: Some(face),
                substituted: false,
                db: self.db.clone(),
            };
        }

        let fallback = fallback_families()
            .iter()
            .filter(|name| !name.eq_ignore_ascii_case(&requested))
            .find_map(|name| self.load_family(name))
            .or_else(|| self.query_face(fontdb::Family::SansSerif, None))
            .or_else(|| {
                self.families()
                    .iter()
                    .filter(|name| !name.eq_ignore_ascii_case(&requested))
                    .find_map(|name| self.load_family(name))
            });
        if let Some(face) = fallback {
            return ResolvedFont {
                requested,
                face: Some(face),
                substituted: true,
                db: self.db.clone(),
            };
        }

        ResolvedFont {
            requested,
            face: None,
            substituted: true,
            db: self.db.clone(),
        }
    }

    fn load_family(&self, family: &str) -> Option<FontFace> {
        if family.is_empty() {
            return None;
        }
        self.query_face(fontdb::Family::Name(family), Some(family))
    }

    fn query_face(&self, family: fontdb::Family<'_>, requested: Option<&str>) -> Option<FontFace> {
        let families = [family];
        let query = fontdb::Query {
            families: &families,
            ..Default::default()
        };
        let id = self.db.query(&query)?;
        let resolved_family = self
            .db
            .face(id)
            .and_then(|info| info.families.first().map(|(name, _)| name.clone()))
            .or_else(|| requested.map(str::to_string));
        self.db
            .with_face_data(id, |data, index| {
                FontFace::parse(data, index, id, resolved_family)
            })
            .flatten()
    }
}

/// Vertical metrics of one face. The font bytes stay in the database and are
/// borrowed through the face id whenever glyph advances are needed.
#[derive(Debug, Clone)]
pub struct FontFace {
    id: fontdb::ID,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    family: String,
}

impl FontFace {
    /// `family` is the name the database knows the face by; the renderer
    /// looks it up under that name, so the face's own name table is only a
    /// fallback.
    fn parse(data: &[u8], face_index: u32, id: fontdb::ID, family: Option<String>) -> Option<Self> {
        let face = Face::parse(data, face_index).ok()?;
        let family = family.or_else(|| extract_family_name(&face))?;
        Some(Self {
            id,
            units_per_em: face.units_per_em().max(1),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            family,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em as f32
    }
}

/// A font lookup result: the face actually used, or none when the library
/// had nothing to offer.
#[derive(Clone)]
pub struct ResolvedFont {
    pub requested: String,
    face: Option<FontFace>,
    pub substituted: bool,
    db: Arc<fontdb::Database>,
}

impl std::fmt::Debug for ResolvedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFont")
            .field("requested", &self.requested)
            .field("face", &self.face)
            .field("substituted", &self.substituted)
            .finish()
    }
}

impl ResolvedFont {
    /// Family name to hand to the rasteriser.
    pub fn family(&self) -> Option<&str> {
        self.face.as_ref().map(|face| face.family())
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    pub fn line_height(&self, font_size: f32) -> f32 {
        match &self.face {
            Some(face) => {
                let scaling = face.scale(font_size);
                let ascent = face.ascender as f32 * scaling;
                let descent = face.descender as f32 * scaling;
                let leading = face.line_gap as f32 * scaling;
                ascent - descent + leading
            }
            None => font_size * ESTIMATED_LINE_HEIGHT,
        }
    }

    /// Distance from the top of a line box to its baseline.
    pub fn ascent(&self, font_size: f32) -> f32 {
        match &self.face {
            Some(face) => {
                let scaling = face.scale(font_size);
                let leading = face.line_gap as f32 * scaling;
                face.ascender as f32 * scaling + leading / 2.0
            }
            None => font_size * ESTIMATED_ASCENT,
        }
    }

    pub fn measure(&self, text: &str, font_size: f32) -> Result<MeasuredBlock> {
        measure(text, self, font_size)
    }
}

/// Sums glyph advances the way the rasteriser picks glyphs: the primary face
/// first, then faces already used as fallbacks, then the first face in the
/// database that has the character, then the primary face's `.notdef`.
struct LineMeasurer<'a> {
    db: &'a fontdb::Database,
    primary: &'a FontFace,
    font_size: f32,
    fallbacks: Vec<fontdb::ID>,
}

impl<'a> LineMeasurer<'a> {
    fn new(db: &'a fontdb::Database, primary: &'a FontFace, font_size: f32) -> Self {
        Self {
            db,
            primary,
            font_size,
            fallbacks: Vec::new(),
        }
    }

    fn line_width(&mut self, line: &str) -> f32 {
        let mut missing = Vec::new();
        let primary_units = with_face(self.db, self.primary.id, |face| {
            let mut units = 0u32;
            for ch in line.chars() {
                match face
                    .glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                {
                    Some(advance) => units = units.saturating_add(advance as u32),
                    None => missing.push(ch),
                }
            }
            Some(units)
        });
        let Some(primary_units) = primary_units else {
            return estimate_text_width_units(line) * self.font_size;
        };
        let fallback_width: f32 = missing.into_iter().map(|ch| self.fallback_advance(ch)).sum();
        primary_units as f32 * self.primary.scale(self.font_size) + fallback_width
    }

    fn fallback_advance(&mut self, ch: char) -> f32 {
        let known = self
            .fallbacks
            .iter()
            .find_map(|&id| glyph_advance(self.db, id, ch, self.font_size));
        if let Some(advance) = known {
            return advance;
        }
        if let Some(id) = self.find_fallback(ch) {
            self.fallbacks.push(id);
            if let Some(advance) = glyph_advance(self.db, id, ch, self.font_size) {
                return advance;
            }
        }
        with_face(self.db, self.primary.id, |face| {
            face.glyph_hor_advance(ttf_parser::GlyphId(0))
        })
        .map(|units| units as f32 * self.primary.scale(self.font_size))
        .unwrap_or(0.0)
    }

    fn find_fallback(&self, ch: char) -> Option<fontdb::ID> {
        let base = self.db.face(self.primary.id)?;
        self.db
            .faces()
            .filter(|face| face.id != self.primary.id && !self.fallbacks.contains(&face.id))
            .filter(|face| {
                base.style == face.style || base.weight == face.weight || base.stretch == face.stretch
            })
            .find(|face| glyph_advance(self.db, face.id, ch, self.font_size).is_some())
            .map(|face| face.id)
    }
}

fn with_face<T>(
    db: &fontdb::Database,
    id: fontdb::ID,
    f: impl FnOnce(&Face<'_>) -> Option<T>,
) -> Option<T> {
    db.with_face_data(id, |data, index| {
        Face::parse(data, index).ok().and_then(|face| f(&face))
    })
    .flatten()
}

fn glyph_advance(db: &fontdb::Database, id: fontdb::ID, ch: char, font_size: f32) -> Option<f32> {
    with_face(db, id, |face| {
        let glyph = face.glyph_index(ch)?;
        let advance = face.glyph_hor_advance(glyph)?;
        Some(advance as f32 * font_size / face.units_per_em().max(1) as f32)
    })
}

/// Measures every line of `text` independently at its natural width.
pub fn measure(text: &str, font: &ResolvedFont, font_size: f32) -> Result<MeasuredBlock> {
    if !font_size.is_finite() || font_size <= 0.0 {
        return Err(ComposeError::Measurement(format!(
            "font size {} is not a positive number",
            font_size
        )));
    }
    let line_height = font.line_height(font_size);
    let text = normalize_text(text);
    if text.is_empty() {
        return Ok(MeasuredBlock {
            line_widths: vec![0.0],
            max_line_width: 0.0,
            total_height: 0.0,
            line_count: 1,
            line_height,
        });
    }

    let mut measurer = font
        .face
        .as_ref()
        .map(|face| LineMeasurer::new(&font.db, face, font_size));
    let line_widths: Vec<f32> = text
        .split('\n')
        .map(|line| match measurer.as_mut() {
            Some(measurer) => measurer.line_width(line),
            None => estimate_text_width_units(line) * font_size,
        })
        .collect();
    let line_count = line_widths.len();
    let max_line_width = line_widths.iter().copied().fold(0.0, f32::max);
    Ok(MeasuredBlock {
        line_widths,
        max_line_width,
        total_height: line_height * line_count as f32,
        line_count,
        line_height,
    })
}

pub(crate) fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', &" ".repeat(TAB_SIZE))
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3000..=0x303F | 0x3040..=0x30FF | 0xFF00..=0xFFEF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimated() -> ResolvedFont {
        FontLibrary::empty().resolve("Arial")
    }

    #[test]
    fn empty_library_substitutes_without_failing() {
        let font = estimated();
        assert!(font.substituted);
        assert!(!font.has_face());
        assert_eq!(font.family(), None);
        assert_eq!(font.requested, "Arial");
    }

    #[test]
    fn empty_text_is_zero_block_with_one_line() {
        let block = measure("", &estimated(), 24.0).unwrap();
        assert_eq!(block.line_count, 1);
        assert_eq!(block.max_line_width, 0.0);
        assert_eq!(block.total_height, 0.0);
        assert_eq!(block.line_widths, vec![0.0]);
    }

    #[test]
    fn lines_measured_independently() {
        let block = measure("ab\nabcd\n", &estimated(), 10.0).unwrap();
        assert_eq!(block.line_count, 3);
        assert!((block.line_widths[0] - 11.0).abs() < 1e-4);
        assert!((block.line_widths[1] - 22.0).abs() < 1e-4);
        assert_eq!(block.line_widths[2], 0.0);
        assert!((block.max_line_width - 22.0).abs() < 1e-4);
        assert!((block.total_height - 36.0).abs() < 1e-4);
        assert!((block.average_line_height() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn carriage_returns_and_tabs_are_normalized() {
        let font = estimated();
        let crlf = measure("a\r\nb", &font, 10.0).unwrap();
        assert_eq!(crlf.line_count, 2);
        let tab = measure("\t", &font, 10.0).unwrap();
        let spaces = measure("    ", &font, 10.0).unwrap();
        assert_eq!(tab.max_line_width, spaces.max_line_width);
    }

    #[test]
    fn width_scales_linearly_with_size() {
        let font = estimated();
        let small = measure("Quote 你好", &font, 12.0).unwrap();
        let large = measure("Quote 你好", &font, 120.0).unwrap();
        assert!((large.max_line_width - small.max_line_width * 10.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_non_positive_size() {
        let font = estimated();
        assert!(matches!(
            measure("x", &font, 0.0).unwrap_err(),
            ComposeError::Measurement(_)
        ));
        assert!(measure("x", &font, f32::NAN).is_err());
    }

    #[test]
    fn resolved_fonts_share_the_library_database() {
        let library = FontLibrary::load(None);
        let first = library.resolve("Arial");
        let second = library.resolve("Arial");
        assert!(Arc::ptr_eq(&first.db, &second.db));
        assert!(Arc::ptr_eq(&first.db, &library.db));
    }

    #[test]
    fn glyph_missing_from_primary_face_is_not_measured_as_space() {
        let font = FontLibrary::load(None).resolve("DejaVu Sans");
        if !font.has_face() {
            return;
        }
        let space = measure(" ", &font, 40.0).unwrap().max_line_width;
        let ideograph = measure("你", &font, 40.0).unwrap().max_line_width;
        assert!(ideograph > space * 1.5, "{} vs space {}", ideograph, space);
    }

    #[test]
    fn system_library_resolves_something_deterministically() {
        let library = FontLibrary::load(None);
        let first = library.resolve("No Such Family 12345");
        let second = library.resolve("No Such Family 12345");
        assert!(first.substituted);
        assert_eq!(first.family(), second.family());
        let a = first.measure("Hello", 24.0).unwrap();
        let b = second.measure("Hello", 24.0).unwrap();
        assert_eq!(a, b);
    }
}
