use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::{GitLabSettings, Settings, SourceKind},
    domain::{DateRange, IssueRecord, IssueState},
    fixture, gitlab,
};

/// Anything that can list issues for an optional query window.
pub trait IssueSource: Send + Sync {
    /// `None` returns the whole dataset.
    fn fetch_issues(&self, range: Option<DateRange>) -> Result<Vec<IssueRecord>, FetchError>;

    fn describe(&self) -> String;
}

pub fn from_settings(settings: &Settings) -> Arc<dyn IssueSource> {
    match settings.source {
        SourceKind::Fixture => Arc::new(FixtureSource),
        SourceKind::Gitlab => Arc::new(GitLabSource::new(settings.gitlab())),
    }
}

/// Serves the bundled sample dataset.
pub struct FixtureSource;

impl IssueSource for FixtureSource {
    fn fetch_issues(&self, range: Option<DateRange>) -> Result<Vec<IssueRecord>, FetchError> {
        let issues = fixture::sample_issues()?;
        Ok(restrict_to_window(issues, range))
    }

    fn describe(&self) -> String {
        "sample data".to_owned()
    }
}

/// Lists issues from a GitLab instance and applies the window locally.
pub struct GitLabSource {
    settings: GitLabSettings,
}

impl GitLabSource {
    pub fn new(settings: GitLabSettings) -> Self {
        Self { settings }
    }
}

impl IssueSource for GitLabSource {
    fn fetch_issues(&self, range: Option<DateRange>) -> Result<Vec<IssueRecord>, FetchError> {
        let client = gitlab::build_client()?;
        let issues = gitlab::fetch_issues(&client, &self.settings)?;
        Ok(restrict_to_window(issues, range))
    }

    fn describe(&self) -> String {
        match &self.settings.project {
            Some(project) => format!("{} ({project})", self.settings.api_url),
            None => self.settings.api_url.clone(),
        }
    }
}

pub fn restrict_to_window(
    issues: Vec<IssueRecord>,
    range: Option<DateRange>,
) -> Vec<IssueRecord> {
    match range {
        Some(range) => issues
            .into_iter()
            .filter(|issue| in_window(issue, &range))
            .collect(),
        None => issues,
    }
}

/// Open issues match on creation only. Closed issues match when created or
/// closed inside the window, or when they were open across all of it.
pub fn in_window(issue: &IssueRecord, range: &DateRange) -> bool {
    let created = issue.created();
    if created.is_none() {
        tracing::warn!(iid = issue.iid, raw = %issue.created_at, "unparseable created_at");
    }
    let created_in_range = created.is_some_and(|ts| range.contains(ts));

    match issue.state {
        IssueState::Opened => created_in_range,
        IssueState::Closed => {
            let Some(closed) = issue.closed() else {
                return false;
            };
            let closed_in_range = range.contains(closed);
            let spans_range = created.is_some_and(|ts| ts <= range.start_instant())
                && closed >= range.end_instant();
            created_in_range || closed_in_range || spans_range
        }
    }
}

pub type FetchOutcome = Result<Vec<IssueRecord>, FetchError>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GitLab API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitLab access token is missing")]
    MissingToken,
    #[error("Sample dataset is malformed: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error("Background worker disconnected before returning a result")]
    BackgroundWorkerGone,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    fn iids(issues: &[IssueRecord]) -> Vec<u64> {
        issues.iter().map(|issue| issue.iid).collect()
    }

    fn october() -> DateRange {
        DateRange::new(day("2023-10-01"), day("2023-10-31"))
    }

    fn sample(iid: u64) -> IssueRecord {
        fixture::sample_issues()
            .expect("fixture")
            .into_iter()
            .find(|issue| issue.iid == iid)
            .expect("sample issue")
    }

    #[test]
    fn october_window_matches_created_and_closed_rules() {
        let issues = FixtureSource.fetch_issues(Some(october())).expect("fetch");
        assert_eq!(iids(&issues), [101, 102, 103, 104]);
    }

    #[test]
    fn closed_before_window_end_does_not_span() {
        assert!(!in_window(&sample(106), &october()));
    }

    #[test]
    fn span_rule_covers_long_running_closed_issues() {
        let september = DateRange::new(day("2023-09-10"), day("2023-09-20"));
        // Created 2023-09-25, not yet open on the 10th.
        assert!(!in_window(&sample(102), &september));

        let late_august = DateRange::new(day("2023-08-20"), day("2023-08-31"));
        // Created 2023-08-15, closed 2023-09-05.
        assert!(in_window(&sample(106), &late_august));
    }

    #[test]
    fn open_issues_only_match_by_creation() {
        let december = DateRange::new(day("2023-12-01"), day("2023-12-31"));
        // 108 was still open in December but was created in November.
        assert!(!in_window(&sample(108), &december));
    }

    #[test]
    fn closed_issue_without_timestamp_is_out_of_range() {
        let mut issue = sample(102);
        issue.closed_at = None;
        assert!(!in_window(&issue, &october()));
    }

    #[test]
    fn no_window_returns_everything() {
        let issues = FixtureSource.fetch_issues(None).expect("fetch");
        assert_eq!(issues.len(), 8);
    }

    #[test]
    fn unparseable_created_at_is_skipped() {
        let mut issue = sample(101);
        issue.created_at = "soon".into();
        assert!(!in_window(&issue, &october()));
    }

    #[test]
    fn gitlab_source_without_token_fails_typed() {
        let source = GitLabSource::new(GitLabSettings {
            api_url: "https://gitlab.example.com/api/v4".into(),
            token: String::new(),
            project: None,
        });
        let result = source.fetch_issues(Some(october()));
        assert!(matches!(result, Err(FetchError::MissingToken)));
    }

    #[test]
    fn settings_select_the_source() {
        let source = from_settings(&Settings::default());
        assert_eq!(source.describe(), "sample data");
    }
}
