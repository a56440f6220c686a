//! Page fonts and text measurement.
//!
//! Without loaded font files, widths come from a Helvetica-like average
//! advance heuristic. Loading a TTF/OTF through [`FontManager::load_font`]
//! switches measurement for that face to real glyph advances via
//! `ttf-parser`.

use std::collections::HashMap;

/// Metrics of one loaded face.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (re-parsed on demand; ttf-parser is zero-copy).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
            italic,
        }
    }
}

/// Faces available to the page for measuring text.
#[derive(Clone, Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl std::fmt::Debug for FontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontManager")
            .field("faces", &self.fonts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FontManager {
    /// Register a TTF/OTF face.
    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        log::debug!("Loaded font {family} (bold={bold}, italic={italic})");
        self.fonts.insert(FontKey::new(family, bold, italic), data);
        Ok(())
    }

    pub fn has_face(&self, key: &FontKey) -> bool {
        self.fonts.contains_key(key)
    }

    /// The exact face, else the family's regular face. Asset fonts are
    /// registered without weight or slant, so bold text still measures
    /// with the family's advances.
    fn face_for(&self, family: &str, bold: bool, italic: bool) -> Option<&FontData> {
        self.fonts
            .get(&FontKey::new(family, bold, italic))
            .or_else(|| self.fonts.get(&FontKey::new(family, false, false)))
    }

    /// Width of `text` in px at `font_size` px.
    pub fn measure_text_width(
        &self,
        text: &str,
        font_size: f32,
        bold: bool,
        italic: bool,
        family: &str,
    ) -> f32 {
        let heuristic = || {
            let avg = if bold { 0.55 } else { 0.5 };
            text.chars().count() as f32 * font_size * avg
        };
        let Some(data) = self.face_for(family, bold, italic) else {
            return heuristic();
        };
        let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) else {
            return heuristic();
        };
        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| adv as f32 * scale)
                    .unwrap_or(font_size * 0.5)
            })
            .sum()
    }

    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }
}

/// Word-wrap text to fit within `max_width` px.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    italic: bool,
    family: &str,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if max_width <= 0.0 {
        return vec![words.join(" ")];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in words {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        let width = fonts.measure_text_width(&candidate, font_size, bold, italic, family);
        if width > max_width && !current.is_empty() {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, false, false, "Helvetica");
        // 5 chars × 16 × 0.5
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn wraps_at_width() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, false, false, "Helvetica", 60.0, &mgr);
        // "foo bar" is 7 × 8 = 56px and still fits.
        assert_eq!(lines, vec!["Hello", "world", "foo bar"]);
    }

    #[test]
    fn blank_text_has_no_lines() {
        let mgr = FontManager::default();
        assert!(wrap_text("  \n ", 16.0, false, false, "Helvetica", 100.0, &mgr).is_empty());
    }

    #[test]
    fn rejects_invalid_font_bytes() {
        let mut mgr = FontManager::default();
        assert!(mgr.load_font("Broken", false, false, vec![0, 1, 2, 3]).is_err());
        assert!(!mgr.has_face(&FontKey::new("Broken", false, false)));
    }
}
