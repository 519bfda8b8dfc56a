//! Resume parser: turns uploaded bytes into text plus a heuristic
//! `ParsedResume` (skills, education lines, years of experience).
//!
//! Pure Rust, no LLM call. PDF text comes from `pdf-extract`; everything else
//! is decoded as (lossy) UTF-8.

use std::path::Path;

use chrono::{Datelike, Utc};
use regex::Regex;
use thiserror::Error;

use crate::models::resume::{EducationLine, ParsedResume};

pub mod skills;

pub use skills::SkillCatalog;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
}

/// Sections a resume is split into. Anything before the first heading is `Body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Body,
    Experience,
    Education,
    Skills,
    Projects,
}

/// Longest headings first so "work experience" wins over "experience".
const HEADINGS: &[(&str, Section)] = &[
    ("professional experience", Section::Experience),
    ("employment history", Section::Experience),
    ("work experience", Section::Experience),
    ("technical skills", Section::Skills),
    ("core competencies", Section::Skills),
    ("experience", Section::Experience),
    ("employment", Section::Experience),
    ("education", Section::Education),
    ("projects", Section::Projects),
    ("skills", Section::Skills),
];

const DEGREE_KEYWORDS: &[&str] = &[
    "bachelor", "b.tech", "b.sc", "bsc", "b.s.", "b.a.", "master", "m.tech", "m.sc", "msc",
    "m.s.", "mba", "phd", "ph.d", "doctorate", "graduate", "degree", "diploma",
];

/// Text collected per section of interest. Body and project lines are not
/// kept; the full text is the fallback for every heuristic.
#[derive(Debug, Default)]
struct Sections {
    experience: String,
    education: String,
    skills: String,
}

impl Sections {
    fn push(&mut self, section: Section, line: &str) {
        let target = match section {
            Section::Body | Section::Projects => return,
            Section::Experience => &mut self.experience,
            Section::Education => &mut self.education,
            Section::Skills => &mut self.skills,
        };
        target.push_str(line);
        target.push('\n');
    }
}

const YEAR_PATTERN: &str = r"\b(?:19|20)\d{2}\b";
const RANGE_PATTERN: &str =
    r"(?i)\b((?:19|20)\d{2})\s*(?:-|–|—|to)\s*(present|now|current|(?:19|20)\d{2})\b";
const EXPLICIT_YEARS_PATTERN: &str = r"(?i)\b(\d{1,2})\+?\s*(?:years|yrs)\b";

/// Skill catalog plus the compiled patterns every heuristic needs. Built once
/// at startup and shared read-only.
pub struct ResumeParser {
    catalog: SkillCatalog,
    year: Regex,
    range: Regex,
    explicit_years: Regex,
}

impl ResumeParser {
    pub fn new(catalog: SkillCatalog) -> Result<Self, regex::Error> {
        Ok(Self {
            catalog,
            year: Regex::new(YEAR_PATTERN)?,
            range: Regex::new(RANGE_PATTERN)?,
            explicit_years: Regex::new(EXPLICIT_YEARS_PATTERN)?,
        })
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    /// Extracts text and runs every heuristic. Fails only when a PDF cannot be
    /// read; callers fall back to `decode_lossy` with no parsed structure.
    pub fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedResume, ParseError> {
        let text = extract_text(bytes, filename)?;
        Ok(self.parse_text(&text, Utc::now().year()))
    }

    /// Heuristic parse of already-extracted text.
    pub fn parse_text(&self, text: &str, current_year: i32) -> ParsedResume {
        let sections = split_sections(text);
        let pick = |section: &str| -> String {
            if section.trim().is_empty() {
                text.to_string()
            } else {
                section.to_string()
            }
        };

        ParsedResume {
            text: text.to_string(),
            skills: self.catalog.find_in(&pick(&sections.skills)),
            education: self.education(&pick(&sections.education)),
            experience_years: self.experience_years(&pick(&sections.experience), current_year),
        }
    }

    /// Lines naming a degree, with any four-digit years on them.
    pub fn education(&self, text: &str) -> Vec<EducationLine> {
        text.lines()
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                DEGREE_KEYWORDS.iter().any(|k| lower.contains(k))
            })
            .map(|line| EducationLine {
                line: line.to_string(),
                years: self
                    .year
                    .find_iter(line)
                    .map(|m| m.as_str().to_string())
                    .collect(),
            })
            .collect()
    }

    /// Span from the earliest range start to the latest range end ("present"
    /// counts as `current_year`), or else the first explicit "N years".
    pub fn experience_years(&self, text: &str, current_year: i32) -> Option<u32> {
        let mut earliest: Option<i32> = None;
        let mut latest: Option<i32> = None;

        for caps in self.range.captures_iter(text) {
            let Some(start) = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok()) else {
                continue;
            };
            let end = match caps.get(2).map(|m| m.as_str()) {
                Some(e) if e.chars().all(|c| c.is_ascii_digit()) => e.parse::<i32>().ok(),
                Some(_) => Some(current_year),
                None => None,
            };
            let Some(end) = end else { continue };
            if end < start {
                continue;
            }
            earliest = Some(earliest.map_or(start, |e| e.min(start)));
            latest = Some(latest.map_or(end, |l| l.max(end)));
        }

        if let (Some(start), Some(end)) = (earliest, latest) {
            return u32::try_from(end - start).ok();
        }

        self.explicit_years
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    }
}

pub fn is_pdf(bytes: &[u8], filename: &str) -> bool {
    bytes.starts_with(b"%PDF")
        || Path::new(filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ParseError> {
    if is_pdf(bytes, filename) {
        // pdf-extract panics on some malformed documents instead of erroring.
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ParseError::Pdf(format!("{e:?}"))),
            Err(_) => Err(ParseError::Pdf("extractor panicked".to_string())),
        }
    } else {
        Ok(decode_lossy(bytes))
    }
}

pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn split_sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current = Section::Body;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match match_heading(trimmed) {
            Some((section, rest)) => {
                current = section;
                if !rest.is_empty() {
                    sections.push(current, rest);
                }
            }
            None => sections.push(current, trimmed),
        }
    }
    sections
}

/// Recognises a heading line, returning its section and any inline content
/// ("Skills: Go, Rust" → `Skills`, "Go, Rust").
fn match_heading(line: &str) -> Option<(Section, &str)> {
    let lower = line.to_lowercase();
    for (heading, section) in HEADINGS {
        if !lower.starts_with(heading) {
            continue;
        }
        let rest = line.get(heading.len()..).unwrap_or("");
        let rest_trimmed = rest.trim_start();
        if rest_trimmed.is_empty() {
            return Some((*section, ""));
        }
        if rest_trimmed.starts_with([':', '-', '|', '–', '—']) {
            let content = rest_trimmed
                .trim_start_matches([':', '-', '|', '–', '—'])
                .trim();
            return Some((*section, content));
        }
    }
    None
}
