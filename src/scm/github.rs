use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;

use crate::config::GithubConfig;

use super::{CommitFile, OpenedPullRequest, RepoHost, ScmError, TreeEntry};

const USER_AGENT: &str = "costops";
const ACCEPT: &str = "application/vnd.github+json";

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, serde_json::Value), ScmError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ScmError::Host(format!("request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        Ok((status, body))
    }

    fn check(status: reqwest::StatusCode, body: &serde_json::Value, what: &str) -> Result<(), ScmError> {
        if status.is_success() {
            return Ok(());
        }
        let message = body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("no message");
        match status.as_u16() {
            401 | 403 => Err(ScmError::Auth(format!("{what}: {status} {message}"))),
            404 => Err(ScmError::NotFound(format!("{what}: {message}"))),
            _ => Err(ScmError::Host(format!("{what}: {status} {message}"))),
        }
    }

    /// Sha of an existing file on a branch, if any. Used to update in place
    /// via the contents API.
    async fn file_sha(&self, repo: &str, path: &str, branch: &str) -> Result<Option<String>, ScmError> {
        let (status, body) = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/repos/{repo}/contents/{path}?ref={branch}"),
            ))
            .await?;

        if status.as_u16() == 404 {
            return Ok(None);
        }
        Self::check(status, &body, "get file sha")?;
        Ok(body.get("sha").and_then(|v| v.as_str()).map(str::to_string))
    }
}

#[async_trait]
impl RepoHost for GithubClient {
    async fn default_branch(&self, repo: &str) -> Result<String, ScmError> {
        let (status, body) = self
            .send(self.request(reqwest::Method::GET, &format!("/repos/{repo}")))
            .await?;
        Self::check(status, &body, "get repository")?;

        body.get("default_branch")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ScmError::Host("repository response missing default_branch".into()))
    }

    async fn get_tree(&self, repo: &str) -> Result<Vec<TreeEntry>, ScmError> {
        let (status, body) = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/repos/{repo}/git/trees/HEAD?recursive=1"),
            ))
            .await?;
        Self::check(status, &body, "get tree")?;

        let entries = body
            .get("tree")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ScmError::Host("tree response missing entries".into()))?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                Some(TreeEntry {
                    path: entry.get("path")?.as_str()?.to_string(),
                    kind: entry.get("type")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        ref_name: &str,
    ) -> Result<String, ScmError> {
        let (status, body) = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/repos/{repo}/contents/{path}?ref={ref_name}"),
            ))
            .await?;
        Self::check(status, &body, "get file content")?;

        let encoded = body
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScmError::Host("contents response missing content".into()))?
            .replace(['\n', '\r'], "");

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ScmError::Host(format!("content not valid base64: {e}")))?;
        String::from_utf8(bytes).map_err(|e| ScmError::Host(format!("content not utf-8: {e}")))
    }

    async fn create_branch(&self, repo: &str, base: &str, name: &str) -> Result<(), ScmError> {
        let (status, body) = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/repos/{repo}/git/ref/heads/{base}"),
            ))
            .await?;
        Self::check(status, &body, "get base ref")?;

        let base_sha = body
            .pointer("/object/sha")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScmError::Host("ref response missing object sha".into()))?;

        let (status, body) = self
            .send(
                self.request(reqwest::Method::POST, &format!("/repos/{repo}/git/refs"))
                    .json(&json!({ "ref": format!("refs/heads/{name}"), "sha": base_sha })),
            )
            .await?;

        // 422 "Reference already exists" is fine: a previous attempt created
        // the branch and the commit step will reuse it.
        if status.as_u16() == 422 {
            tracing::debug!(repo, branch = name, "Branch already exists, reusing");
            return Ok(());
        }
        Self::check(status, &body, "create branch")
    }

    async fn commit_files(
        &self,
        repo: &str,
        branch: &str,
        files: &[CommitFile],
        message: &str,
    ) -> Result<(), ScmError> {
        for file in files {
            let sha = self.file_sha(repo, &file.path, branch).await?;
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(file.content.as_bytes());

            let mut body = json!({
                "message": message,
                "content": encoded,
                "branch": branch,
            });
            if let Some(sha) = sha {
                body["sha"] = json!(sha);
            }

            let (status, response) = self
                .send(
                    self.request(
                        reqwest::Method::PUT,
                        &format!("/repos/{repo}/contents/{}", file.path),
                    )
                    .json(&body),
                )
                .await?;
            Self::check(status, &response, "commit file")?;
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<OpenedPullRequest, ScmError> {
        let (status, response) = self
            .send(
                self.request(reqwest::Method::POST, &format!("/repos/{repo}/pulls"))
                    .json(&json!({ "title": title, "head": head, "base": base, "body": body })),
            )
            .await?;
        Self::check(status, &response, "open pull request")?;

        let number = response
            .get("number")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ScmError::Host("pull request response missing number".into()))?;
        let url = response
            .get("html_url")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let head_ref = response
            .pointer("/head/ref")
            .and_then(|v| v.as_str())
            .unwrap_or(head)
            .to_string();

        if !labels.is_empty() {
            let (status, response) = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/repos/{repo}/issues/{number}/labels"),
                    )
                    .json(&json!({ "labels": labels })),
                )
                .await?;
            if let Err(err) = Self::check(status, &response, "add labels") {
                // Labels are decoration; the PR itself is already open.
                tracing::warn!(repo, number, error = %err, "Failed to add labels");
            }
        }

        Ok(OpenedPullRequest { number, url, head_ref })
    }
}
