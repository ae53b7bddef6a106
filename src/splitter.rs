/// Split a document into translation-sized chunks at paragraph boundaries.
///
/// Paragraphs are separated by a blank line. Paragraphs accumulate into the
/// current chunk until appending the next one (plus separator) would reach
/// `max_chars`; the chunk is then closed and the paragraph starts a new one.
/// The bound is advisory: a single paragraph longer than `max_chars` is
/// emitted whole rather than truncated.
pub fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for paragraph in normalized.split("\n\n") {
        let paragraph = paragraph.trim_end();
        if paragraph.trim().is_empty() {
            continue;
        }

        let addition = if buffer.is_empty() {
            paragraph.len()
        } else {
            paragraph.len() + 2
        };

        if !buffer.is_empty() && buffer.len() + addition >= max_chars {
            chunks.push(std::mem::take(&mut buffer).trim().to_string());
        }

        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(paragraph);
    }

    let tail = buffer.trim();
    if !tail.is_empty() {
        chunks.push(tail.to_string());
    }

    chunks
}
