//! Embedding of the target-language TrueType font into the output PDF.
//!
//! Translated text can contain any script, so the font goes in as a
//! composite CIDFontType2 with Identity-H encoding: text is written as
//! big-endian glyph indices, and a `/W` array carries the widths of every
//! glyph actually used. `ttf-parser` supplies the cmap and metrics.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::{Face, GlyphId};

use crate::error::{JobError, JobResult};

/// Resource name under which the overlay font is registered on each page.
pub const OVERLAY_FONT_NAME: &str = "Ftrans";

#[derive(Debug)]
pub struct LanguageFont {
    data: Vec<u8>,
    base_name: String,
}

/// Glyph-encoded text plus the per-glyph widths needed for the `/W` array.
pub struct EncodedText {
    pub bytes: Vec<u8>,
    pub glyph_widths: Vec<(u16, i64)>,
}

impl LanguageFont {
    pub fn load(path: &Path) -> JobResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            JobError::Font(format!("cannot read font file {}: {e}", path.display()))
        })?;
        Face::parse(&data, 0)
            .map_err(|e| JobError::Font(format!("cannot parse font {}: {e}", path.display())))?;

        let base_name: String = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "EmbeddedFont".to_string())
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let base_name = if base_name.is_empty() {
            "EmbeddedFont".to_string()
        } else {
            base_name
        };

        Ok(Self { data, base_name })
    }

    fn face(&self) -> JobResult<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| JobError::Font(format!("font reparse failed: {e}")))
    }

    /// Map text to Identity-H string bytes. Characters without a glyph map
    /// to .notdef rather than failing the run.
    pub fn encode_text(&self, text: &str) -> JobResult<EncodedText> {
        let face = self.face()?;
        let units_per_em = f32::from(face.units_per_em());
        let mut bytes = Vec::with_capacity(text.len() * 2);
        let mut glyph_widths = Vec::new();

        for ch in text.chars() {
            let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
            bytes.extend_from_slice(&glyph.0.to_be_bytes());
            let advance = face
                .glyph_hor_advance(glyph)
                .unwrap_or(face.units_per_em());
            let width = (f32::from(advance) * 1000.0 / units_per_em).round() as i64;
            glyph_widths.push((glyph.0, width));
        }

        Ok(EncodedText {
            bytes,
            glyph_widths,
        })
    }

    /// Write the Type0/CIDFontType2/FontDescriptor/FontFile2 object chain
    /// into `doc` and return the Type0 font's id. `widths` is the union of
    /// glyph widths across every encoded run in the document.
    pub fn build_font_object(
        &self,
        doc: &mut Document,
        widths: &BTreeMap<u16, i64>,
    ) -> JobResult<ObjectId> {
        let face = self.face()?;
        let units_per_em = f32::from(face.units_per_em());
        let scale = |v: i16| -> i64 { (f32::from(v) * 1000.0 / units_per_em).round() as i64 };

        let bbox = face.global_bounding_box();
        let ascent = scale(face.ascender());
        let descent = scale(face.descender());
        let cap_height = face.capital_height().map(scale).unwrap_or(ascent);

        let font_file_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! { "Length1" => self.data.len() as i64 },
            self.data.clone(),
        )));

        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => self.base_name.as_str(),
            "Flags" => 4i64,
            "FontBBox" => vec![
                Object::Integer(scale(bbox.x_min)),
                Object::Integer(scale(bbox.y_min)),
                Object::Integer(scale(bbox.x_max)),
                Object::Integer(scale(bbox.y_max)),
            ],
            "ItalicAngle" => 0i64,
            "Ascent" => ascent,
            "Descent" => descent,
            "CapHeight" => cap_height,
            "StemV" => 80i64,
            "FontFile2" => font_file_id,
        });

        let mut width_array: Vec<Object> = Vec::with_capacity(widths.len() * 2);
        for (glyph, width) in widths {
            width_array.push(Object::Integer(i64::from(*glyph)));
            width_array.push(Object::Array(vec![Object::Integer(*width)]));
        }

        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => self.base_name.as_str(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::String(b"Adobe".to_vec(), StringFormat::Literal),
                "Ordering" => Object::String(b"Identity".to_vec(), StringFormat::Literal),
                "Supplement" => 0i64,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000i64,
            "W" => Object::Array(width_array),
            "CIDToGIDMap" => "Identity",
        });

        Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => self.base_name.as_str(),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_is_a_font_error() {
        let err = LanguageFont::load(Path::new("no/such/font.ttf")).unwrap_err();
        assert!(matches!(err, JobError::Font(_)));
    }
}
