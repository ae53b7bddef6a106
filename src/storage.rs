use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

/// A stored upload, owned by the registry in `AppState`. The display name
/// lives here rather than only inside the stored filename, so downloads can
/// recover it without parsing (the positional encoding stays as fallback).
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub id: String,
    pub display_name: String,
    pub path: PathBuf,
    pub extension: String,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredUpload {
    pub fn new(id: String, display_name: String, path: PathBuf, extension: String) -> Self {
        Self {
            id,
            display_name,
            path,
            extension,
            uploaded_at: Utc::now(),
        }
    }
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w.\- ]+").unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Sanitize a client-supplied filename: drop any path components, strip
/// disallowed characters, collapse whitespace to underscores, and fall back
/// to a fixed name when nothing survives.
pub fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned = disallowed_chars().replace_all(name, "");
    let collapsed = whitespace_runs().replace_all(cleaned.trim(), "_");
    let result = collapsed.trim_start_matches(['.', '_']).to_string();
    if result.is_empty() {
        "upload".to_string()
    } else {
        result
    }
}

/// Lowercased extension if it is on the allow-list.
pub fn allowed_extension(filename: &str, allow_list: &[String]) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    if allow_list.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        Some(ext)
    } else {
        None
    }
}

pub fn generate_file_id() -> String {
    Uuid::new_v4().to_string()
}

/// Name under which an upload is stored: `{id}_{sanitized_name}`.
pub fn stored_filename(file_id: &str, sanitized_name: &str) -> String {
    format!("{file_id}_{sanitized_name}")
}

/// Name of the final artifact: `{stem}_{id}_{lang}.{ext}`.
pub fn artifact_filename(display_name: &str, file_id: &str, lang: &str) -> String {
    let (stem, ext) = display_name
        .rsplit_once('.')
        .unwrap_or((display_name, "txt"));
    format!("{stem}_{file_id}_{lang}.{ext}")
}

/// Recover a human-readable name from an artifact filename by removing the
/// embedded identifier segment. Used only when the registry no longer holds
/// the upload (e.g. after a restart).
pub fn display_name_from_artifact(stored: &str) -> String {
    let (stem, ext) = match stored.rsplit_once('.') {
        Some((s, e)) => (s, Some(e)),
        None => (stored, None),
    };
    let kept: Vec<&str> = stem
        .split('_')
        .filter(|segment| Uuid::parse_str(segment).is_err())
        .collect();
    if kept.is_empty() {
        return stored.to_string();
    }
    match ext {
        Some(ext) => format!("{}.{ext}", kept.join("_")),
        None => kept.join("_"),
    }
}

/// A download name is only ever a bare filename inside the processed dir.
pub fn is_safe_download_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.starts_with('.')
}

/// Remove every file in `dir` tagged with `file_id`, i.e. uploads stored as
/// `{id}_...`, intermediate parts, and artifacts named `..._{id}_{lang}.ext`.
pub fn remove_files_with_id(dir: &Path, file_id: &str) -> std::io::Result<usize> {
    let prefix = format!("{file_id}_");
    let embedded = format!("_{file_id}_");
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) || name.contains(&embedded) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\Users\x\notes.txt"), "notes.txt");
    }

    #[test]
    fn sanitize_collapses_whitespace_and_specials() {
        assert_eq!(sanitize_filename("my  report (final).txt"), "my_report_final.txt");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
    }

    #[test]
    fn sanitize_keeps_unicode_names() {
        assert_eq!(sanitize_filename("보고서 최종.txt"), "보고서_최종.txt");
    }

    #[test]
    fn sanitize_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_filename("???"), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let allow = vec!["txt".to_string(), "srt".to_string()];
        assert_eq!(allowed_extension("a.TXT", &allow), Some("txt".to_string()));
        assert_eq!(allowed_extension("a.pdf", &allow), None);
        assert_eq!(allowed_extension("no_extension", &allow), None);
    }

    #[test]
    fn artifact_name_embeds_id_and_language() {
        assert_eq!(
            artifact_filename("report.txt", "abc-123", "ko"),
            "report_abc-123_ko.txt"
        );
        assert_eq!(
            artifact_filename("noext", "abc", "en"),
            "noext_abc_en.txt"
        );
    }

    #[test]
    fn display_name_recovery_strips_the_uuid_segment() {
        let id = generate_file_id();
        let stored = artifact_filename("my_report.txt", &id, "ko");
        assert_eq!(display_name_from_artifact(&stored), "my_report_ko.txt");
    }

    #[test]
    fn traversal_names_are_rejected() {
        assert!(!is_safe_download_name("../../etc/passwd"));
        assert!(!is_safe_download_name("a/../b.txt"));
        assert!(!is_safe_download_name("nested/file.txt"));
        assert!(!is_safe_download_name(r"..\win.txt"));
        assert!(!is_safe_download_name(".hidden"));
        assert!(!is_safe_download_name(""));
        assert!(is_safe_download_name("report_abc_ko.txt"));
    }

    #[test]
    fn delete_by_id_removes_uploads_parts_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let id = "11111111-2222-3333-4444-555555555555";
        for name in [
            &format!("{id}_report.txt"),
            &format!("{id}_part0.txt"),
            &format!("report_{id}_ko.txt"),
            "unrelated.txt",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let removed = remove_files_with_id(dir.path(), id).unwrap();
        assert_eq!(removed, 3);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn delete_by_unknown_id_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();
        assert_eq!(remove_files_with_id(dir.path(), "nope").unwrap(), 0);
    }
}
