mod github;

pub use github::GithubClient;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error("repository host authentication failed: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("repository host error: {0}")]
    Host(String),
}

#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub path: String,
    pub kind: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

#[derive(Debug, Clone)]
pub struct CommitFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct OpenedPullRequest {
    pub number: i64,
    pub url: String,
    pub head_ref: String,
}

/// Write access to the source-control host. `create_branch` is idempotent:
/// an already-existing branch is not an error.
#[async_trait]
pub trait RepoHost: Send + Sync {
    async fn default_branch(&self, repo: &str) -> Result<String, ScmError>;

    /// Full recursive file listing of the repository.
    async fn get_tree(&self, repo: &str) -> Result<Vec<TreeEntry>, ScmError>;

    async fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        ref_name: &str,
    ) -> Result<String, ScmError>;

    async fn create_branch(&self, repo: &str, base: &str, name: &str) -> Result<(), ScmError>;

    async fn commit_files(
        &self,
        repo: &str,
        branch: &str,
        files: &[CommitFile],
        message: &str,
    ) -> Result<(), ScmError>;

    async fn open_pull_request(
        &self,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<OpenedPullRequest, ScmError>;
}
