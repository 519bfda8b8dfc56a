use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a match: `queued → running → {done, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Queued,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Error)]
#[error("unknown match status '{0}'")]
pub struct UnknownStatus(pub String);

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Queued => "queued",
            MatchStatus::Running => "running",
            MatchStatus::Done => "done",
            MatchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Done | MatchStatus::Failed)
    }

    /// Whether the worker's state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Queued, MatchStatus::Running)
                | (MatchStatus::Running, MatchStatus::Done)
                | (MatchStatus::Running, MatchStatus::Failed)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(MatchStatus::Queued),
            "running" => Ok(MatchStatus::Running),
            "done" => Ok(MatchStatus::Done),
            "failed" => Ok(MatchStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for MatchStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: MatchStatus,
    pub lexical_score: Option<f64>,
    pub embedding_score: Option<f64>,
    /// Assessment text, the LLM error text, or an orchestration error.
    pub llm_result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRow {
    /// A freshly submitted match: `queued`, no scores.
    pub fn queued(resume_id: Uuid, job_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            resume_id,
            job_id,
            status: MatchStatus::Queued,
            lexical_score: None,
            embedding_score: None,
            llm_result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update in place. `updated_at` never moves backwards.
    pub fn apply(&mut self, update: &MatchUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(score) = update.lexical_score {
            self.lexical_score = score;
        }
        if let Some(score) = update.embedding_score {
            self.embedding_score = score;
        }
        if let Some(result) = &update.llm_result {
            self.llm_result = result.clone();
        }
        self.updated_at = self.updated_at.max(now);
    }
}

/// Partial update of a match row. The outer `Option` means "leave untouched";
/// the inner one is the nullable column value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchUpdate {
    pub status: Option<MatchStatus>,
    pub lexical_score: Option<Option<f64>>,
    pub embedding_score: Option<Option<f64>>,
    pub llm_result: Option<Option<String>>,
}

impl MatchUpdate {
    pub fn status(status: MatchStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Forces a match to `failed`, recording the error in the result channel.
    pub fn failed_with(error: impl Into<String>) -> Self {
        Self {
            status: Some(MatchStatus::Failed),
            llm_result: Some(Some(error.into())),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            MatchStatus::Queued,
            MatchStatus::Running,
            MatchStatus::Done,
            MatchStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert!("pending".parse::<MatchStatus>().is_err());
    }

    #[test]
    fn test_only_forward_transitions_are_allowed() {
        assert!(MatchStatus::Queued.can_transition_to(MatchStatus::Running));
        assert!(MatchStatus::Running.can_transition_to(MatchStatus::Done));
        assert!(MatchStatus::Running.can_transition_to(MatchStatus::Failed));
        assert!(!MatchStatus::Queued.can_transition_to(MatchStatus::Done));
        assert!(!MatchStatus::Done.can_transition_to(MatchStatus::Running));
        assert!(!MatchStatus::Failed.can_transition_to(MatchStatus::Queued));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(MatchStatus::Done.is_terminal());
        assert!(MatchStatus::Failed.is_terminal());
        assert!(!MatchStatus::Queued.is_terminal());
        assert!(!MatchStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MatchStatus::Running).unwrap(),
            r#""running""#
        );
    }

    #[test]
    fn test_apply_leaves_untouched_fields_alone() {
        let mut row = MatchRow::queued(Uuid::new_v4(), Uuid::new_v4());
        row.lexical_score = Some(0.4);
        let update = MatchUpdate {
            embedding_score: Some(None),
            llm_result: Some(Some("ok".to_string())),
            ..MatchUpdate::default()
        };
        row.apply(&update, Utc::now());
        assert_eq!(row.status, MatchStatus::Queued);
        assert_eq!(row.lexical_score, Some(0.4));
        assert_eq!(row.embedding_score, None);
        assert_eq!(row.llm_result.as_deref(), Some("ok"));
    }

    #[test]
    fn test_apply_never_moves_updated_at_backwards() {
        let mut row = MatchRow::queued(Uuid::new_v4(), Uuid::new_v4());
        let before = row.updated_at;
        row.apply(
            &MatchUpdate::status(MatchStatus::Running),
            before - Duration::seconds(30),
        );
        assert_eq!(row.updated_at, before);
    }

    #[test]
    fn test_failed_with_records_error_text() {
        let update = MatchUpdate::failed_with("disk full");
        assert_eq!(update.status, Some(MatchStatus::Failed));
        assert_eq!(update.llm_result, Some(Some("disk full".to_string())));
        assert_eq!(update.lexical_score, None);
    }
}
