use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("hidden state input `{name}` missing from landing page")]
    MissingStateToken { name: &'static str },
    #[error("server returned an error page instead of results")]
    ErrorPage,
    #[error("no results table found in response")]
    NoTableFound,
}

/// One row of the results listing. Column order follows the header row;
/// the postback target is internal and never exported.
#[derive(Debug, Clone)]
pub struct Record {
    pub fields: IndexMap<String, String>,
    pub postback_target: Option<String>,
}

impl Record {
    /// Course identifier used for detail file names and log lines.
    /// Falls back to the first column when the listing has no Course column.
    pub fn course_id(&self) -> &str {
        self.fields
            .get("Course")
            .or_else(|| self.fields.values().next())
            .map(String::as_str)
            .unwrap_or("item")
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success { saved_path: PathBuf, bytes: usize },
    Failure { error: String },
}

#[derive(Debug, Serialize)]
pub struct FetchResult {
    pub course: String,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<FetchResult>,
}

impl RunSummary {
    pub fn new(timestamp: DateTime<Utc>, results: Vec<FetchResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            timestamp,
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_partition_the_results() {
        let results = vec![
            FetchResult {
                course: "CSC124".into(),
                outcome: FetchOutcome::Success {
                    saved_path: "details/CSC124_x.html".into(),
                    bytes: 1024,
                },
            },
            FetchResult {
                course: "MTH240".into(),
                outcome: FetchOutcome::Failure {
                    error: "unexpected status 500".into(),
                },
            },
            FetchResult {
                course: "ENG111".into(),
                outcome: FetchOutcome::Success {
                    saved_path: "details/ENG111_x.html".into(),
                    bytes: 2048,
                },
            },
        ];
        let summary = RunSummary::new(Utc::now(), results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded + summary.failed, summary.total);
    }

    #[test]
    fn fetch_results_serialize_with_a_status_tag() {
        let result = FetchResult {
            course: "CSC124".into(),
            outcome: FetchOutcome::Failure {
                error: "connection refused".into(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["course"], "CSC124");
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"], "connection refused");
    }

    #[test]
    fn course_id_falls_back_to_the_first_column() {
        let mut fields = IndexMap::new();
        fields.insert("Column1".to_string(), "CSC124".to_string());
        let record = Record {
            fields,
            postback_target: None,
        };
        assert_eq!(record.course_id(), "CSC124");

        let empty = Record {
            fields: IndexMap::new(),
            postback_target: None,
        };
        assert_eq!(empty.course_id(), "item");
    }
}
