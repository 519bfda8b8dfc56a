use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A single education line picked out of the resume text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationLine {
    pub line: String,
    pub years: Vec<String>,
}

/// Structured view of a resume. Every field except `text` may be empty,
/// which is exactly the shape of the lazily-filled fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResume {
    pub text: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub education: Vec<EducationLine>,
    #[serde(default)]
    pub experience_years: Option<u32>,
}

impl ParsedResume {
    /// Minimal structure used when a resume reaches the pipeline unparsed.
    pub fn fallback(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub filename: String,
    pub raw_text: String,
    /// Written at most once. `None` until the upload parser or the worker fills it.
    pub parsed: Option<Json<ParsedResume>>,
    pub created_at: DateTime<Utc>,
}

impl ResumeRow {
    pub fn new(filename: String, raw_text: String, parsed: Option<ParsedResume>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            raw_text,
            parsed: parsed.map(Json),
            created_at: Utc::now(),
        }
    }

    pub fn parsed(&self) -> Option<&ParsedResume> {
        self.parsed.as_ref().map(|p| &p.0)
    }
}

/// Listing projection returned by `GET /api/v1/resumes`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeSummary {
    pub id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ResumeRow> for ResumeSummary {
    fn from(row: &ResumeRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename.clone(),
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_text_and_no_skills() {
        let parsed = ParsedResume::fallback("Rust engineer");
        assert_eq!(parsed.text, "Rust engineer");
        assert!(parsed.skills.is_empty());
        assert!(parsed.education.is_empty());
        assert_eq!(parsed.experience_years, None);
    }

    #[test]
    fn test_parsed_resume_tolerates_missing_fields() {
        let parsed: ParsedResume = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(parsed, ParsedResume::fallback("hello"));
    }

    #[test]
    fn test_new_row_keeps_parsed_structure() {
        let row = ResumeRow::new(
            "cv.txt".to_string(),
            "text".to_string(),
            Some(ParsedResume {
                text: "text".to_string(),
                skills: vec!["Rust".to_string()],
                ..ParsedResume::default()
            }),
        );
        assert_eq!(row.parsed().unwrap().skills, vec!["Rust".to_string()]);
        assert_eq!(ResumeSummary::from(&row).filename, "cv.txt");
    }
}
