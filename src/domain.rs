use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// Domain data structures shared across modules.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub state: IssueState,
    pub severity: Severity,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub closed_at: Option<String>,
    pub author: Author,
    pub project: Project,
    pub web_url: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
}

impl IssueRecord {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Close timestamp. `None` when absent or unparseable.
    pub fn closed(&self) -> Option<DateTime<Utc>> {
        self.closed_at.as_deref().and_then(parse_timestamp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Opened,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Opened => "opened",
            IssueState::Closed => "closed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IssueState::Opened => "Open",
            IssueState::Closed => "Closed",
        }
    }
}

/// Severity as reported upstream. Unknown values are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Other(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Other(raw) => raw,
        }
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        match raw.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Other(raw),
        }
    }
}

impl From<&str> for Severity {
    fn from(raw: &str) -> Self {
        Severity::from(raw.to_owned())
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

/// Inclusive calendar-day window used to query the data source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// First and last calendar day of the month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        let start = day.with_day0(0).unwrap_or(day);
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.checked_sub_days(Days::new(1)))
            .unwrap_or(day);
        Self { start, end }
    }

    /// Midnight UTC at the start of the first day.
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last representable instant of the final day.
    pub fn end_instant(&self) -> DateTime<Utc> {
        match self.end.checked_add_days(Days::new(1)) {
            Some(next) => {
                next.and_time(NaiveTime::MIN).and_utc() - chrono::Duration::milliseconds(1)
            }
            None => self.end.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_instant() && instant <= self.end_instant()
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn severity_keeps_unknown_values_verbatim() {
        assert_eq!(Severity::from("HIGH"), Severity::High);
        let other = Severity::from("Blocker");
        assert_eq!(other.as_str(), "Blocker");
        assert_eq!(other.label(), "Blocker");
    }

    #[test]
    fn severity_round_trips_through_json() {
        let parsed: Severity = serde_json::from_str("\"unknown\"").expect("parse");
        assert_eq!(parsed, Severity::Other("unknown".into()));
        assert_eq!(serde_json::to_string(&Severity::Low).expect("json"), "\"low\"");
    }

    #[test]
    fn month_of_covers_whole_month() {
        let range = DateRange::month_of(day("2024-02-14"));
        assert_eq!(range.start, day("2024-02-01"));
        assert_eq!(range.end, day("2024-02-29"));

        let december = DateRange::month_of(day("2023-12-31"));
        assert_eq!(december.end, day("2023-12-31"));
    }

    #[test]
    fn range_contains_the_entire_last_day() {
        let range = DateRange::new(day("2023-10-01"), day("2023-10-31"));
        let late = parse_timestamp("2023-10-31T23:59:00Z").expect("ts");
        let after = parse_timestamp("2023-11-01T00:00:00Z").expect("ts");
        assert!(range.contains(late));
        assert!(!range.contains(after));
    }

    #[test]
    fn unparseable_timestamp_is_absent() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2023-10-01T12:00:00+02:00").is_some());
    }
}
