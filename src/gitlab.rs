use reqwest::{
    blocking::{Client, Response},
    header::{ACCEPT, USER_AGENT},
};
use serde::Deserialize;

use crate::{
    config::GitLabSettings,
    domain::{Author, IssueRecord, IssueState, Project, Severity},
    source::FetchError,
};

const USER_AGENT_HEADER: &str = "issue-dashboard/0.1";
const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const NEXT_PAGE_HEADER: &str = "x-next-page";
const PAGE_SIZE: &str = "100";
const MAX_PAGES: u32 = 20;

pub fn build_client() -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT_HEADER)
        .build()
        .map_err(FetchError::Http)
}

/// Lists every issue visible to the token, following pagination.
pub fn fetch_issues(
    client: &Client,
    settings: &GitLabSettings,
) -> Result<Vec<IssueRecord>, FetchError> {
    if settings.token.is_empty() {
        return Err(FetchError::MissingToken);
    }

    let url = issues_url(settings);
    let mut issues = Vec::new();
    let mut page = String::from("1");
    for _ in 0..MAX_PAGES {
        let response = client
            .get(&url)
            .query(&[
                ("scope", "all"),
                ("per_page", PAGE_SIZE),
                ("page", page.as_str()),
            ])
            .header(USER_AGENT, USER_AGENT_HEADER)
            .header(ACCEPT, "application/json")
            .header(PRIVATE_TOKEN_HEADER, &settings.token)
            .send()?
            .error_for_status()?;

        let next = next_page(&response);
        let batch: Vec<IssueResponse> = response.json()?;
        tracing::debug!(page = %page, count = batch.len(), "fetched issue page");
        issues.extend(batch.into_iter().map(IssueRecord::from));

        match next {
            Some(next) => page = next,
            None => return Ok(issues),
        }
    }

    tracing::warn!(pages = MAX_PAGES, "issue listing truncated at page limit");
    Ok(issues)
}

fn issues_url(settings: &GitLabSettings) -> String {
    match settings.project.as_deref().map(str::trim) {
        Some(project) if !project.is_empty() => format!(
            "{}/projects/{}/issues",
            settings.api_url,
            encode_project(project)
        ),
        _ => format!("{}/issues", settings.api_url),
    }
}

// Numeric ids pass through; paths need their slashes escaped.
fn encode_project(project: &str) -> String {
    project.replace('/', "%2F")
}

fn next_page(response: &Response) -> Option<String> {
    response
        .headers()
        .get(NEXT_PAGE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn project_name(references: Option<&IssueReferences>, project_id: u64) -> String {
    references
        .and_then(|refs| refs.full.rsplit_once('#'))
        .map(|(path, _)| path.to_owned())
        .filter(|path| !path.is_empty())
        .unwrap_or_else(|| format!("project {project_id}"))
}

impl From<IssueResponse> for IssueRecord {
    fn from(item: IssueResponse) -> Self {
        let project = Project {
            id: item.project_id,
            name: project_name(item.references.as_ref(), item.project_id),
        };
        IssueRecord {
            id: item.id,
            iid: item.iid,
            title: item.title,
            description: item.description.unwrap_or_default(),
            state: item.state,
            severity: item
                .severity
                .map_or_else(|| Severity::Other("unknown".to_owned()), Severity::from),
            created_at: item.created_at,
            updated_at: item.updated_at,
            closed_at: item.closed_at,
            author: Author {
                id: item.author.id,
                name: item.author.name,
            },
            project,
            web_url: item.web_url,
            labels: item.labels,
            milestone: item.milestone.map(|milestone| milestone.title),
            assignees: item
                .assignees
                .into_iter()
                .map(|assignee| assignee.name)
                .collect(),
        }
    }
}

// Response payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IssueResponse {
    id: u64,
    iid: u64,
    project_id: u64,
    title: String,
    description: Option<String>,
    state: IssueState,
    created_at: String,
    updated_at: Option<String>,
    closed_at: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    milestone: Option<MilestoneResponse>,
    #[serde(default)]
    assignees: Vec<UserResponse>,
    author: UserResponse,
    web_url: String,
    severity: Option<String>,
    references: Option<IssueReferences>,
}

#[derive(Debug, Deserialize)]
struct MilestoneResponse {
    title: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct IssueReferences {
    full: String,
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
