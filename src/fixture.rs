use crate::domain::IssueRecord;

const SAMPLE_ISSUES: &str = include_str!("fixture.json");

/// Bundled sample dataset used when no remote source is configured.
pub fn sample_issues() -> Result<Vec<IssueRecord>, serde_json::Error> {
    serde_json::from_str(SAMPLE_ISSUES)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::domain::IssueState;

    #[test]
    fn sample_dataset_parses_with_unique_ids() {
        let issues = sample_issues().expect("fixture");
        assert_eq!(issues.len(), 8);
        let ids: HashSet<_> = issues.iter().map(|issue| issue.id).collect();
        assert_eq!(ids.len(), issues.len());
    }

    #[test]
    fn open_issues_have_no_close_timestamp() {
        for issue in sample_issues().expect("fixture") {
            if issue.state == IssueState::Opened {
                assert!(issue.closed_at.is_none(), "iid {}", issue.iid);
            }
            if let (Some(created), Some(closed)) = (issue.created(), issue.closed()) {
                assert!(created <= closed, "iid {}", issue.iid);
            }
        }
    }
}
