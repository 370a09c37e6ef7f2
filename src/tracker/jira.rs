//! Jira REST tracker.
//!
//! Endpoints (under `<base>/rest/api/<version>`):
//! - `POST /issue` → 201 `{"key": ...}`
//! - `GET /issue/<key>` → 200 exists, 404 missing
//! - `POST /issue/<key>/comment` → 201
//! - `POST /issue/<key>/attachments` (multipart, `X-Atlassian-Token: no-check`)

use async_trait::async_trait;
use reqwest::{IntoUrl, StatusCode, Url};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::TrackerConfig;
use crate::error::{ConfigError, TrackerError};
use crate::sync::types::TicketKey;
use crate::tracker::{IssueLookup, PayloadTemplate, Tracker};

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    #[serde(default)]
    key: String,
}

/// Jira tracker over HTTP basic auth.
pub struct JiraTracker {
    api_base: String,
    username: String,
    password: SecretString,
    new_issue: PayloadTemplate,
    add_comment: PayloadTemplate,
    client: reqwest::Client,
}

impl JiraTracker {
    pub fn new(
        config: &TrackerConfig,
        new_issue: PayloadTemplate,
        add_comment: PayloadTemplate,
    ) -> Self {
        Self {
            api_base: format!(
                "{}/rest/api/{}",
                config.base_url.trim_end_matches('/'),
                config.api_version
            ),
            username: config.username.clone(),
            password: config.password.clone(),
            new_issue,
            add_comment,
            client: reqwest::Client::new(),
        }
    }

    /// Build the tracker, loading both payload templates from disk.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, ConfigError> {
        let new_issue = PayloadTemplate::load(&config.new_issue_template)?;
        let add_comment = PayloadTemplate::load(&config.add_comment_template)?;
        Ok(Self::new(config, new_issue, add_comment))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// `<api>/issue/<key>[/<action>]`. The key comes from mail subjects, so
    /// it is percent-encoded as exactly one path segment.
    fn issue_url(&self, key: &TicketKey, action: Option<&str>) -> Result<Url, TrackerError> {
        let mut url = Url::parse(&self.url("/issue"))
            .map_err(|e| TrackerError::InvalidUrl(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| TrackerError::InvalidUrl(format!("{} cannot be a base", self.api_base)))?;
            segments.push(key.as_str());
            segments.extend(action);
        }
        Ok(url)
    }

    async fn post_json(&self, url: impl IntoUrl, body: String) -> Result<reqwest::Response, TrackerError> {
        self.client
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TrackerError::Transport(e.to_string()))
    }
}

/// Turn a non-success response into `Rejected`, keeping the body for diagnostics.
async fn rejected(resp: reqwest::Response) -> TrackerError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    TrackerError::Rejected { status, body }
}

#[async_trait]
impl Tracker for JiraTracker {
    async fn create_issue(
        &self,
        summary: &str,
        description: &str,
    ) -> Result<TicketKey, TrackerError> {
        let body = self.new_issue.render(summary, description);
        let resp = self.post_json(self.url("/issue"), body).await?;

        if resp.status() != StatusCode::CREATED {
            return Err(rejected(resp).await);
        }

        let created: CreatedIssue = resp
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;
        let key = TicketKey::parse(&created.key)
            .ok_or_else(|| TrackerError::InvalidResponse("created issue has no key".into()))?;

        tracing::info!(ticket = %key, "Jira issue created");
        Ok(key)
    }

    async fn get_issue(&self, key: &TicketKey) -> Result<IssueLookup, TrackerError> {
        let resp = self
            .client
            .get(self.issue_url(key, None)?)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => Ok(IssueLookup::Exists),
            StatusCode::NOT_FOUND => Ok(IssueLookup::NotFound),
            _ => Err(rejected(resp).await),
        }
    }

    async fn add_comment(
        &self,
        key: &TicketKey,
        summary: &str,
        description: &str,
    ) -> Result<(), TrackerError> {
        let body = self.add_comment.render(summary, description);
        let url = self.issue_url(key, Some("comment"))?;
        let resp = self.post_json(url, body).await?;

        if resp.status() != StatusCode::CREATED {
            return Err(rejected(resp).await);
        }

        tracing::info!(ticket = %key, "Jira comment added");
        Ok(())
    }

    async fn add_attachment(
        &self,
        key: &TicketKey,
        filename: &str,
        content: &[u8],
    ) -> Result<(), TrackerError> {
        let part = Part::bytes(content.to_vec()).file_name(filename.to_string());
        let form = Form::new().part("file", part);
        let url = self.issue_url(key, Some("attachments"))?;

        let resp = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()
            .await
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> TrackerConfig {
        TrackerConfig {
            base_url: base_url.into(),
            username: "bot".into(),
            password: SecretString::from("pw"),
            api_version: "2".into(),
            new_issue_template: String::new(),
            add_comment_template: String::new(),
        }
    }

    fn tracker(base_url: &str) -> JiraTracker {
        let template = PayloadTemplate::new(r#"{"s":"%SUMMARY%","d":"%DESCRIPTION%"}"#).unwrap();
        JiraTracker::new(&config(base_url), template.clone(), template)
    }

    #[test]
    fn urls_are_versioned() {
        let jira = tracker("https://jira.example.com/");
        let key = TicketKey::parse("OPS-9").unwrap();
        assert_eq!(
            jira.issue_url(&key, None).unwrap().as_str(),
            "https://jira.example.com/rest/api/2/issue/OPS-9"
        );
        assert_eq!(
            jira.issue_url(&key, Some("comment")).unwrap().as_str(),
            "https://jira.example.com/rest/api/2/issue/OPS-9/comment"
        );
    }

    #[test]
    fn key_is_a_single_encoded_segment() {
        let jira = tracker("https://jira.example.com");
        let key = TicketKey::parse("../../admin?x=1#top/OPS-1").unwrap();
        let url = jira.issue_url(&key, Some("attachments")).unwrap();

        assert_eq!(url.path(), "/rest/api/2/issue/..%2F..%2Fadmin%3Fx=1%23top%2FOPS-1/attachments");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 6);
    }

    #[test]
    fn unusable_base_url_is_reported() {
        let jira = tracker("mailto:jira@example.com");
        let key = TicketKey::parse("OPS-9").unwrap();
        assert!(matches!(jira.issue_url(&key, None), Err(TrackerError::InvalidUrl(_))));
    }

    #[test]
    fn from_config_requires_templates() {
        assert!(JiraTracker::from_config(&config("https://jira.example.com")).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let jira = tracker("http://127.0.0.1:9");
        let err = jira.create_issue("s", "d").await.unwrap_err();
        assert!(matches!(err, TrackerError::Transport(_)));
    }
}
