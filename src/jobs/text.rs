//! Generic chunk pipeline for plain-text and subtitle files: split at
//! paragraph boundaries, write the chunks as intermediate part files,
//! translate each part in place, then reassemble in index order.

use crate::error::{JobError, JobResult};
use crate::jobs::JobContext;
use crate::splitter::split_paragraphs;
use crate::storage::{artifact_filename, StoredUpload};

pub async fn run(ctx: &JobContext, upload: &StoredUpload, target_lang: &str) -> JobResult<String> {
    ctx.progress.progress(5, "Reading document");
    let bytes = tokio::fs::read(&upload.path).await?;
    let text = decode_text(&bytes);

    let chunks = split_paragraphs(&text, ctx.max_chunk_chars);
    if chunks.is_empty() {
        return Err(JobError::MalformedDocument(
            "document contains no translatable text".to_string(),
        ));
    }
    let total = chunks.len();
    ctx.progress
        .progress(10, format!("Split into {total} part(s)"));

    // Chunks go to disk before translation so a partially translated job
    // leaves inspectable state, and so reassembly reads what was written
    // rather than what was computed.
    for (index, chunk) in chunks.iter().enumerate() {
        tokio::fs::write(ctx.part_path(&upload.id, index), chunk).await?;
        let pct = 10 + ((index + 1) * 30 / total) as u8;
        ctx.progress
            .progress(pct, format!("Preparing part {}/{total}", index + 1));
    }

    for index in 0..total {
        let part = ctx.part_path(&upload.id, index);
        let chunk = tokio::fs::read_to_string(&part).await?;
        let translated = ctx.translate(&chunk, target_lang).await?;
        tokio::fs::write(&part, translated).await?;
        let pct = 40 + ((index + 1) * 50 / total) as u8;
        ctx.progress
            .progress(pct, format!("Translating part {}/{total}", index + 1));
    }

    ctx.progress.progress(92, "Assembling translated document");
    let mut assembled = String::new();
    for index in 0..total {
        if index > 0 {
            assembled.push_str("\n\n");
        }
        assembled.push_str(&tokio::fs::read_to_string(ctx.part_path(&upload.id, index)).await?);
    }

    let output_name = artifact_filename(&upload.display_name, &upload.id, target_lang);
    tokio::fs::write(ctx.processed_dir.join(&output_name), assembled).await?;

    for index in 0..total {
        let _ = tokio::fs::remove_file(ctx.part_path(&upload.id, index)).await;
    }
    ctx.progress.progress(98, "Translated document written");

    Ok(output_name)
}

/// Uploads are usually UTF-8; the common non-UTF-8 case in practice is
/// EUC-KR subtitle files.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::EUC_KR.decode(bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        assert_eq!(decode_text("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn euc_kr_is_decoded() {
        // "한" in EUC-KR
        let bytes = [0xC7, 0xD1];
        assert_eq!(decode_text(&bytes), "한");
    }
}
