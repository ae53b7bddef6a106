//! Cell-by-cell CSV translation. The output table has exactly the shape of
//! the input: same header count, same row count, same column order.
//!
//! Failure policy: abort-on-error. A structured table with silently
//! untranslated or missing cells is worse than no table, so the first
//! provider failure fails the whole file.

use crate::error::JobResult;
use crate::jobs::JobContext;
use crate::storage::{artifact_filename, StoredUpload};

pub async fn run(ctx: &JobContext, upload: &StoredUpload, target_lang: &str) -> JobResult<String> {
    ctx.progress.progress(5, "Parsing table");

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&upload.path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<_, _>>()?;

    ctx.progress
        .progress(10, format!("Translating table of {} row(s)", rows.len()));

    let mut translated_headers = Vec::with_capacity(headers.len());
    for cell in &headers {
        translated_headers.push(translate_cell(ctx, cell, target_lang).await?);
    }
    ctx.progress.progress(20, "Header row translated");

    let total = rows.len().max(1);
    let mut translated_rows = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let mut translated_row = Vec::with_capacity(row.len());
        for cell in row {
            translated_row.push(translate_cell(ctx, cell, target_lang).await?);
        }
        translated_rows.push(translated_row);
        let pct = 40 + ((index + 1) * 50 / total) as u8;
        ctx.progress
            .progress(pct, format!("Translating row {}/{}", index + 1, rows.len()));
    }

    ctx.progress.progress(92, "Writing translated table");
    let output_name = artifact_filename(&upload.display_name, &upload.id, target_lang);
    let output_path = ctx.processed_dir.join(&output_name);
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&output_path)?;
    writer.write_record(&translated_headers)?;
    for row in &translated_rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    ctx.progress.progress(98, "Translated table written");

    Ok(output_name)
}

/// Empty cells pass through untouched; the provider has nothing to say
/// about them.
async fn translate_cell(ctx: &JobContext, cell: &str, target_lang: &str) -> JobResult<String> {
    if cell.trim().is_empty() {
        return Ok(cell.to_string());
    }
    ctx.translate(cell, target_lang).await
}
