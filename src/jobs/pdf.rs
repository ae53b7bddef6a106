//! PDF composer: extract positioned text runs per page, translate each run,
//! and draw the translations as an overlay merged onto the original page so
//! images and vector graphics survive untouched. Translated text is drawn
//! at the original baseline with the original size; no reflow or fitting is
//! attempted when the translation is wider than the source run.
//!
//! Failure policy: continue-with-log. A run whose translation fails is
//! skipped and the page renders with the runs that succeeded.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use tracing::warn;

use crate::error::{JobError, JobResult};
use crate::jobs::pdf_font::{EncodedText, LanguageFont, OVERLAY_FONT_NAME};
use crate::jobs::JobContext;
use crate::storage::{artifact_filename, StoredUpload};

/// One text-showing operation with the state it was drawn under.
#[derive(Debug, Clone)]
struct TextRun {
    text: String,
    x: f32,
    y: f32,
    size: f32,
}

pub async fn run(ctx: &JobContext, upload: &StoredUpload, target_lang: &str) -> JobResult<String> {
    ctx.progress.progress(5, "Opening PDF document");
    let mut doc = Document::load(&upload.path)?;
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    if pages.is_empty() {
        return Err(JobError::MalformedDocument(
            "PDF contains no pages".to_string(),
        ));
    }

    let font = LanguageFont::load(&ctx.font_path)?;
    let total = pages.len();
    let mut overlays: Vec<(ObjectId, Vec<(TextRun, EncodedText)>)> = Vec::with_capacity(total);
    let mut used_widths: BTreeMap<u16, i64> = BTreeMap::new();

    for (index, (page_no, page_id)) in pages.iter().enumerate() {
        let runs = extract_page_runs(&doc, *page_id)?;
        let mut translated_runs = Vec::new();
        for run in runs {
            if run.text.trim().is_empty() {
                continue;
            }
            match ctx.translate(&run.text, target_lang).await {
                Ok(translated) => {
                    let encoded = font.encode_text(&translated)?;
                    for (glyph, width) in &encoded.glyph_widths {
                        used_widths.insert(*glyph, *width);
                    }
                    translated_runs.push((run, encoded));
                }
                Err(e) => {
                    warn!(page = page_no, error = %e, "skipping text run after translation failure");
                }
            }
        }
        overlays.push((*page_id, translated_runs));
        let pct = 10 + ((index + 1) * 80 / total) as u8;
        ctx.progress
            .progress(pct, format!("Translating page {}/{total}", index + 1));
    }

    ctx.progress.progress(92, "Compositing translated pages");
    let font_id = font.build_font_object(&mut doc, &used_widths)?;

    for (page_id, runs) in &overlays {
        if runs.is_empty() {
            continue;
        }
        let resources = resources_with_overlay_font(&doc, *page_id, font_id);
        let original = doc.get_page_content(*page_id)?;
        let overlay = overlay_content(runs)?;

        // Isolate the original graphics state, then draw the translations.
        let mut combined = Vec::with_capacity(original.len() + overlay.len() + 8);
        combined.extend_from_slice(b"q\n");
        combined.extend_from_slice(&original);
        combined.extend_from_slice(b"\nQ\n");
        combined.extend_from_slice(&overlay);
        doc.change_page_content(*page_id, combined)?;

        let page_dict = doc.get_object_mut(*page_id).and_then(Object::as_dict_mut)?;
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    let output_name = artifact_filename(&upload.display_name, &upload.id, target_lang);
    let output_path = ctx.processed_dir.join(&output_name);
    doc.save(&output_path)?;
    ctx.progress.progress(98, "Translated document written");

    Ok(output_name)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Walk the content stream's text operators, tracking position and font
/// state, and collect every text-showing operation as a run. Only the text
/// matrix translation is modeled; rotated or skewed text keeps its anchor
/// point but loses the transform, which is accepted for overlay purposes.
fn extract_page_runs(doc: &Document, page_id: ObjectId) -> JobResult<Vec<TextRun>> {
    let fonts = doc.get_page_fonts(page_id);
    let encodings: BTreeMap<Vec<u8>, &str> = fonts
        .iter()
        .map(|(name, dict)| (name.clone(), dict.get_font_encoding()))
        .collect();

    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut runs = Vec::new();
    let mut font_name: Vec<u8> = Vec::new();
    let mut size = 0.0f32;
    let mut leading = 0.0f32;
    let mut line_x = 0.0f32;
    let mut line_y = 0.0f32;

    let mut push_run = |text: String, x: f32, y: f32, size: f32| {
        if !text.is_empty() {
            runs.push(TextRun { text, x, y, size });
        }
    };

    for operation in &content.operations {
        let operands = &operation.operands;
        match operation.operator.as_ref() {
            "BT" => {
                line_x = 0.0;
                line_y = 0.0;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    font_name = name.to_vec();
                }
                if let Some(s) = operands.get(1).and_then(number) {
                    size = s;
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(number) {
                    leading = l;
                }
            }
            "Tm" => {
                if let (Some(e), Some(f)) = (
                    operands.get(4).and_then(number),
                    operands.get(5).and_then(number),
                ) {
                    line_x = e;
                    line_y = f;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    line_x += tx;
                    line_y += ty;
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    leading = -ty;
                    line_x += tx;
                    line_y += ty;
                }
            }
            "T*" => {
                line_y -= if leading != 0.0 { leading } else { size * 1.2 };
            }
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(|o| o.as_str().ok()) {
                    let text = decode_run(&encodings, &font_name, bytes);
                    push_run(text, line_x, line_y, size);
                }
            }
            "'" => {
                line_y -= if leading != 0.0 { leading } else { size * 1.2 };
                if let Some(bytes) = operands.first().and_then(|o| o.as_str().ok()) {
                    let text = decode_run(&encodings, &font_name, bytes);
                    push_run(text, line_x, line_y, size);
                }
            }
            "\"" => {
                line_y -= if leading != 0.0 { leading } else { size * 1.2 };
                if let Some(bytes) = operands.get(2).and_then(|o| o.as_str().ok()) {
                    let text = decode_run(&encodings, &font_name, bytes);
                    push_run(text, line_x, line_y, size);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = operands.first() {
                    let mut text = String::new();
                    for part in parts {
                        if let Ok(bytes) = part.as_str() {
                            text.push_str(&decode_run(&encodings, &font_name, bytes));
                        }
                    }
                    push_run(text, line_x, line_y, size);
                }
            }
            _ => {}
        }
    }

    Ok(runs)
}

fn decode_run(encodings: &BTreeMap<Vec<u8>, &str>, font_name: &[u8], bytes: &[u8]) -> String {
    Document::decode_text(encodings.get(font_name).copied(), bytes)
}

/// Build the overlay content stream: each translated run drawn in black at
/// its original baseline, in the embedded target-language font.
fn overlay_content(runs: &[(TextRun, EncodedText)]) -> JobResult<Vec<u8>> {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![Object::Real(0.0)]),
    ];
    for (run, encoded) in runs {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![
                Object::Name(OVERLAY_FONT_NAME.as_bytes().to_vec()),
                Object::Real(run.size),
            ],
        ));
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Real(1.0),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(1.0),
                Object::Real(run.x),
                Object::Real(run.y),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encoded.bytes.clone(),
                StringFormat::Hexadecimal,
            )],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));

    Content { operations }.encode().map_err(JobError::from)
}

/// The page's resolved resource dictionary with the overlay font added.
/// Written back directly onto the page so inherited resources keep working
/// for the original content.
fn resources_with_overlay_font(
    doc: &Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Dictionary {
    let (direct, referenced) = doc.get_page_resources(page_id);
    let mut resources = direct.cloned().unwrap_or_default();
    if direct.is_none() {
        for id in referenced {
            if let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) {
                resources = dict.clone();
                break;
            }
        }
    }

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(r)) => doc
            .get_object(*r)
            .and_then(Object::as_dict)
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    };
    fonts.set(OVERLAY_FONT_NAME, font_id);
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn content_with_text() -> Content {
        Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Real(12.0)],
                ),
                Operation::new(
                    "Tm",
                    vec![
                        Object::Real(1.0),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(1.0),
                        Object::Real(72.0),
                        Object::Real(700.0),
                    ],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(b"Hello".to_vec(), StringFormat::Literal)],
                ),
                Operation::new("Td", vec![Object::Real(0.0), Object::Real(-14.0)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(b"World".to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ],
        }
    }

    #[test]
    fn runs_are_extracted_with_positions() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = content_with_text();
        let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(
            lopdf::dictionary! {},
            content.encode().unwrap(),
        )));
        let resources = lopdf::dictionary! {
            "Font" => lopdf::dictionary! { "F1" => font_id },
        };
        let page_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        let pages = lopdf::dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let runs = extract_page_runs(&doc, page_id).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Hello");
        assert_eq!(runs[0].x, 72.0);
        assert_eq!(runs[0].y, 700.0);
        assert_eq!(runs[1].text, "World");
        assert_eq!(runs[1].y, 686.0);
        assert_eq!(runs[0].size, 12.0);
    }
}
