use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// Persona for the narrative assessment.
pub const ASSESSMENT_PERSONA: &str =
    "You are an experienced technical recruiter assessing candidate fit.";

/// Placeholder shown to the model when no skills were extracted.
pub const NO_SKILLS_PLACEHOLDER: &str = "None extracted.";

pub const ASSESSMENT_PROMPT_TEMPLATE: &str = r#"Compare the candidate resume with the job description below.

Return:
1. "score": an integer fit score from 1 (poor fit) to 10 (ideal fit).
2. "justification": 3 to 6 short bullet strings covering matched skills, missing skills,
   relevance of the candidate's years of experience, and any concerns.
3. "matched_skills": the resume skills that the job actually asks for, strongest first.

JOB DESCRIPTION:
{job_description}

RESUME TEXT:
{resume_text}

EXTRACTED SKILLS: {skills}

Output shape:
{"score": 7, "justification": ["..."], "matched_skills": ["..."]}"#;

/// Builds the system prompt: persona plus the JSON-only rule.
pub fn assessment_system() -> String {
    format!("{ASSESSMENT_PERSONA} {JSON_ONLY_SYSTEM}")
}

/// Fills the assessment template in a single pass over the template, so
/// placeholder-like text inside the resume, job or skills is never rewritten.
pub fn build_assessment_prompt(resume_text: &str, job_description: &str, skills: &[String]) -> String {
    let skills = if skills.is_empty() {
        NO_SKILLS_PLACEHOLDER.to_string()
    } else {
        skills.join(", ")
    };
    fill_template(
        ASSESSMENT_PROMPT_TEMPLATE,
        &[
            ("job_description", job_description),
            ("resume_text", resume_text),
            ("skills", &skills),
        ],
    )
}

/// Replaces `{name}` tokens of `template` with their values. Braces that do
/// not form a known token are copied through.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let token = values.iter().find(|(name, _)| {
            after
                .strip_prefix(name)
                .is_some_and(|tail| tail.starts_with('}'))
        });
        match token {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_all_inputs() {
        let prompt = build_assessment_prompt(
            "Built REST APIs in Go",
            "Backend engineer, Go",
            &["Go".to_string(), "Kubernetes".to_string()],
        );
        assert!(prompt.contains("Built REST APIs in Go"));
        assert!(prompt.contains("Backend engineer, Go"));
        assert!(prompt.contains("EXTRACTED SKILLS: Go, Kubernetes"));
        assert!(!prompt.contains("{resume_text}"));
        assert!(!prompt.contains("{job_description}"));
    }

    #[test]
    fn test_prompt_marks_missing_skills() {
        let prompt = build_assessment_prompt("resume", "job", &[]);
        assert!(prompt.contains(NO_SKILLS_PLACEHOLDER));
    }

    #[test]
    fn test_placeholder_text_inside_resume_is_left_alone() {
        let prompt = build_assessment_prompt("I wrote {skills} templates", "job", &[]);
        assert!(prompt.contains("I wrote {skills} templates"));
    }

    #[test]
    fn test_user_text_is_never_treated_as_a_placeholder() {
        let prompt = build_assessment_prompt(
            "Resume quoting {job_description} literally",
            "Job mentioning {resume_text}",
            &["{resume_text}".to_string()],
        );
        assert!(prompt.contains("RESUME TEXT:\nResume quoting {job_description} literally"));
        assert!(prompt.contains("JOB DESCRIPTION:\nJob mentioning {resume_text}"));
        assert!(prompt.contains("EXTRACTED SKILLS: {resume_text}"));
        assert_eq!(prompt.matches("Resume quoting").count(), 1);
    }

    #[test]
    fn test_fill_template_keeps_unknown_braces() {
        let filled = fill_template(r#"{"a": {x}} {y"#, &[("x", "1")]);
        assert_eq!(filled, r#"{"a": 1} {y"#);
    }

    #[test]
    fn test_system_prompt_requires_json() {
        assert!(assessment_system().contains("valid JSON"));
    }
}
