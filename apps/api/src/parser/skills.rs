use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

const BUILTIN_SKILLS: &str = include_str!("../../skills.txt");

/// Known skill names, each with a case-insensitive matcher that requires a
/// token boundary on both sides ("Go" matches "Go," but not "Google";
/// "C" does not match inside "C++").
pub struct SkillCatalog {
    skills: Vec<(String, Regex)>,
}

impl SkillCatalog {
    pub fn new<I, S>(names: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut skills: Vec<(String, Regex)> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || skills.iter().any(|(s, _)| s.eq_ignore_ascii_case(name)) {
                continue;
            }
            let pattern = format!(
                r"(?i)(?:^|[^\p{{Alphabetic}}\p{{Nd}}+#]){}(?:$|[^\p{{Alphabetic}}\p{{Nd}}+#])",
                regex::escape(name)
            );
            skills.push((name.to_string(), Regex::new(&pattern)?));
        }
        Ok(Self { skills })
    }

    pub fn builtin() -> Result<Self, regex::Error> {
        Self::new(BUILTIN_SKILLS.lines())
    }

    /// Reads one skill per line; blank lines are ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read skills file {}", path.display()))?;
        Self::new(contents.lines()).context("Invalid skill name in skills file")
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Skills present in `text`, in catalog order.
    pub fn find_in(&self, text: &str) -> Vec<String> {
        self.skills
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
