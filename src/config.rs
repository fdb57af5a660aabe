use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SETTINGS_DIR_NAME: &str = ".issue-dashboard";
const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com/api/v4";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Fixture,
    Gitlab,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceKind,
    pub gitlab_url: String,
    pub gitlab_token: Option<String>,
    pub gitlab_project: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: SourceKind::Fixture,
            gitlab_url: DEFAULT_GITLAB_URL.to_owned(),
            gitlab_token: None,
            gitlab_project: None,
        }
    }
}

/// Connection details for the remote source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitLabSettings {
    pub api_url: String,
    pub token: String,
    pub project: Option<String>,
}

impl Settings {
    pub fn gitlab(&self) -> GitLabSettings {
        GitLabSettings {
            api_url: self.gitlab_url.trim_end_matches('/').to_owned(),
            token: self.gitlab_token.clone().unwrap_or_default(),
            project: self.gitlab_project.clone(),
        }
    }

    /// Applies `ISSUE_DASHBOARD_SOURCE`, `GITLAB_URL`, `GITLAB_TOKEN` and
    /// `GITLAB_PROJECT` on top of the file values.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(source) = lookup("ISSUE_DASHBOARD_SOURCE") {
            match source.trim().to_lowercase().as_str() {
                "gitlab" => self.source = SourceKind::Gitlab,
                "fixture" => self.source = SourceKind::Fixture,
                other => {
                    tracing::warn!(value = other, "ignoring unknown ISSUE_DASHBOARD_SOURCE")
                }
            }
        }
        if let Some(url) = lookup("GITLAB_URL") {
            self.gitlab_url = url;
        }
        if let Some(token) = lookup("GITLAB_TOKEN") {
            self.gitlab_token = Some(token);
        }
        if let Some(project) = lookup("GITLAB_PROJECT") {
            self.gitlab_project = Some(project);
        }
        self
    }
}

pub struct SettingsStore {
    settings_path: PathBuf,
}

impl SettingsStore {
    pub fn initialize() -> Result<Self, ConfigError> {
        let home = env::var("HOME").map_err(|_| ConfigError::HomeDirMissing)?;
        Ok(Self::at(PathBuf::from(home).join(SETTINGS_DIR_NAME)))
    }

    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: dir.as_ref().join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// A missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        match fs::read_to_string(&self.settings_path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Resolves settings from `~/.issue-dashboard/settings.json` plus the
/// environment. Problems are reported as a warning and defaults are used.
pub fn load_settings() -> (Settings, Option<String>) {
    let loaded = SettingsStore::initialize().and_then(|store| {
        let settings = store.load()?;
        tracing::debug!(path = %store.path().display(), "settings loaded");
        Ok(settings)
    });
    let (settings, warning) = match loaded {
        Ok(settings) => (settings, None),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default settings");
            (
                Settings::default(),
                Some(format!("Settings could not be loaded; using defaults ({err})")),
            )
        }
    };
    (settings.with_overrides(|key| env::var(key).ok()), warning)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME environment variable is not set; cannot locate ~/.issue-dashboard")]
    HomeDirMissing,
    #[error("I/O error while reading settings: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = SettingsStore::at(dir.path()).load().expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.source, SourceKind::Fixture);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "source": "gitlab", "gitlab_token": "glpat-123" }"#,
        )
        .expect("write");
        let settings = SettingsStore::at(dir.path()).load().expect("load");
        assert_eq!(settings.source, SourceKind::Gitlab);
        assert_eq!(settings.gitlab_url, DEFAULT_GITLAB_URL);
        assert_eq!(settings.gitlab().token, "glpat-123");
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(SETTINGS_FILE), "{ not json").expect("write");
        let result = SettingsStore::at(dir.path()).load();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ISSUE_DASHBOARD_SOURCE", "GitLab"),
            ("GITLAB_URL", "https://gitlab.example.com/api/v4/"),
            ("GITLAB_PROJECT", "group/app"),
        ]);
        let settings = Settings::default()
            .with_overrides(|key| env.get(key).map(|value| (*value).to_owned()));
        assert_eq!(settings.source, SourceKind::Gitlab);
        let gitlab = settings.gitlab();
        assert_eq!(gitlab.api_url, "https://gitlab.example.com/api/v4");
        assert_eq!(gitlab.project.as_deref(), Some("group/app"));
        assert!(gitlab.token.is_empty());
    }
}
