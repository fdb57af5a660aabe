use chrono::{DateTime, Utc};

use crate::{
    domain::{IssueRecord, IssueState, Severity},
    filter::FilterKind,
    table::{CellValue, ColumnDescriptor},
};

pub const PROJECT: &str = "project.name";
pub const IID: &str = "iid";
pub const TITLE: &str = "title";
pub const LINK: &str = "web_url";
pub const STATE: &str = "state";
pub const SEVERITY: &str = "severity";
pub const CREATED_AT: &str = "created_at";
pub const CREATED_MONTH: &str = "month_created";
pub const CLOSED_AT: &str = "closed_at";
pub const CLOSED_MONTH: &str = "month_closed";
pub const AUTHOR: &str = "author.name";

const MISSING: &str = "-";

// Column set --------------------------------------------------------------

pub fn issue_columns() -> Vec<ColumnDescriptor<IssueRecord>> {
    vec![
        ColumnDescriptor {
            id: PROJECT,
            header: "Project",
            accessor: |issue| CellValue::Text(issue.project.name.clone()),
            formatter: plain,
            filter_kind: FilterKind::Substring,
            sortable: true,
        },
        ColumnDescriptor {
            id: IID,
            header: "ID",
            accessor: |issue| {
                CellValue::Number(i64::try_from(issue.iid).unwrap_or(i64::MAX))
            },
            formatter: issue_number,
            filter_kind: FilterKind::Substring,
            sortable: true,
        },
        ColumnDescriptor {
            id: TITLE,
            header: "Title",
            accessor: |issue| CellValue::Text(issue.title.clone()),
            formatter: plain,
            filter_kind: FilterKind::Substring,
            sortable: true,
        },
        ColumnDescriptor {
            id: LINK,
            header: "Link",
            accessor: |issue| CellValue::Text(issue.web_url.clone()),
            formatter: plain,
            filter_kind: FilterKind::None,
            sortable: false,
        },
        ColumnDescriptor {
            id: STATE,
            header: "Status",
            accessor: |issue| CellValue::Text(issue.state.as_str().to_owned()),
            formatter: state_label,
            filter_kind: FilterKind::Exact,
            sortable: true,
        },
        ColumnDescriptor {
            id: SEVERITY,
            header: "Severity",
            accessor: |issue| CellValue::Text(issue.severity.as_str().to_owned()),
            formatter: severity_label,
            filter_kind: FilterKind::Exact,
            sortable: true,
        },
        ColumnDescriptor {
            id: CREATED_AT,
            header: "Opened",
            accessor: |issue| date_cell(issue.created()),
            formatter: calendar_date,
            filter_kind: FilterKind::DateInterval,
            sortable: true,
        },
        ColumnDescriptor {
            id: CREATED_MONTH,
            header: "Opened month",
            accessor: |issue| month_cell(issue.created()),
            formatter: plain,
            filter_kind: FilterKind::Exact,
            sortable: true,
        },
        ColumnDescriptor {
            id: CLOSED_AT,
            header: "Closed",
            accessor: |issue| date_cell(issue.closed()),
            formatter: calendar_date,
            filter_kind: FilterKind::DateInterval,
            sortable: true,
        },
        ColumnDescriptor {
            id: CLOSED_MONTH,
            header: "Closed month",
            accessor: |issue| month_cell(issue.closed()),
            formatter: plain,
            filter_kind: FilterKind::Exact,
            sortable: true,
        },
        ColumnDescriptor {
            id: AUTHOR,
            header: "Author",
            accessor: |issue| CellValue::Text(issue.author.name.clone()),
            formatter: plain,
            filter_kind: FilterKind::Substring,
            sortable: true,
        },
    ]
}

fn date_cell(ts: Option<DateTime<Utc>>) -> CellValue {
    ts.map_or(CellValue::Missing, CellValue::Date)
}

fn month_cell(ts: Option<DateTime<Utc>>) -> CellValue {
    ts.map_or(CellValue::Missing, |ts| {
        CellValue::Text(ts.format("%B").to_string())
    })
}

// Formatters --------------------------------------------------------------

pub fn plain(value: &CellValue) -> String {
    match value {
        CellValue::Date(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        other => other
            .as_text()
            .map_or_else(|| MISSING.to_owned(), |text| text.into_owned()),
    }
}

pub fn issue_number(value: &CellValue) -> String {
    match value {
        CellValue::Number(iid) => format!("#{iid}"),
        other => plain(other),
    }
}

pub fn calendar_date(value: &CellValue) -> String {
    match value {
        CellValue::Date(ts) => ts.format("%d/%m/%Y").to_string(),
        other => plain(other),
    }
}

pub fn state_label(value: &CellValue) -> String {
    match value {
        CellValue::Text(raw) if raw == IssueState::Opened.as_str() => {
            IssueState::Opened.label().to_owned()
        }
        CellValue::Text(raw) if raw == IssueState::Closed.as_str() => {
            IssueState::Closed.label().to_owned()
        }
        other => plain(other),
    }
}

pub fn severity_label(value: &CellValue) -> String {
    match value {
        CellValue::Text(raw) => Severity::from(raw.as_str()).label().to_owned(),
        other => plain(other),
    }
}
