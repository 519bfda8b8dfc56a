//! Intake: getting resumes and job descriptions into the store.
//!
//! Uploaded files are kept on disk under the upload directory as
//! `{resume_id}_{name}`; only the extracted text and parsed structure go to
//! the store.

pub mod handlers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::models::resume::ParsedResume;
use crate::parser::{self, ResumeParser};

/// Reduces a client-supplied filename to a safe basename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "resume".to_string()
    } else {
        cleaned.to_string()
    }
}

pub async fn save_upload(dir: &Path, id: Uuid, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;
    let path = dir.join(format!("{id}_{filename}"));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write upload {}", path.display()))?;
    Ok(path)
}

/// Extracts text and parses it off the async runtime. A parse failure (or a
/// panicking parser) yields the lossy text with no parsed structure; the
/// worker fills the fallback later.
pub async fn parse_upload(
    bytes: Bytes,
    filename: String,
    parser: Arc<ResumeParser>,
) -> (String, Option<ParsedResume>) {
    let raw = bytes.clone();
    let joined = tokio::task::spawn_blocking(move || {
        parser.parse(&bytes, &filename)
    })
    .await;

    match joined {
        Ok(Ok(parsed)) => (parsed.text.clone(), Some(parsed)),
        Ok(Err(e)) => {
            warn!(error = %e, "Resume parse failed, storing raw text");
            (parser::decode_lossy(&raw), None)
        }
        Err(e) => {
            warn!(error = %e, "Resume parser task failed, storing raw text");
            (parser::decode_lossy(&raw), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SkillCatalog;

    fn resume_parser<const N: usize>(skills: [&str; N]) -> Arc<ResumeParser> {
        Arc::new(ResumeParser::new(SkillCatalog::new(skills).unwrap()).unwrap())
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\My CV.pdf"), "My_CV.pdf");
        assert_eq!(sanitize_filename(".."), "resume");
        assert_eq!(sanitize_filename(""), "resume");
    }

    #[tokio::test]
    async fn test_save_upload_prefixes_id() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let path = save_upload(&dir.path().join("nested"), id, "cv.txt", b"hello")
            .await
            .unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with(&id.to_string()));
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_parse_upload_text_file() {
        let parser = resume_parser(["Go", "Rust"]);
        let (text, parsed) = parse_upload(
            Bytes::from_static(b"Rust engineer, 4 years"),
            "cv.txt".to_string(),
            parser,
        )
        .await;
        assert_eq!(text, "Rust engineer, 4 years");
        let parsed = parsed.unwrap();
        assert_eq!(parsed.skills, vec!["Rust"]);
        assert_eq!(parsed.experience_years, Some(4));
    }

    #[tokio::test]
    async fn test_parse_upload_broken_pdf_falls_back_to_raw_text() {
        let parser = resume_parser(["Go"]);
        let (text, parsed) = parse_upload(
            Bytes::from_static(b"%PDF-1.4 garbage"),
            "cv.pdf".to_string(),
            parser,
        )
        .await;
        assert_eq!(text, "%PDF-1.4 garbage");
        assert!(parsed.is_none());
    }
}
