//! Locates the infrastructure-as-code file that declares a cloud resource.
//!
//! Resolution order, first match wins: an explicit IaC-path tag, a filename
//! containing the slugified resource name, then conventional path patterns.
//! The tag is authoritative and avoids fetching the repository tree at all.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::models::CloudResource;
use crate::rules::helpers;
use crate::scm::{RepoHost, ScmError, TreeEntry};

/// Accepted key-name variants for the IaC path tag.
pub const IAC_PATH_TAG_ALIASES: &[&str] = &["iac_path", "iacPath", "iac-path", "IacPath"];

/// Tag keys written back onto the resource once a mapping is found.
pub const MAPPED_PATH_TAG: &str = "costops_iac_path";
pub const MAPPED_FORMAT_TAG: &str = "costops_iac_format";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IacFormat {
    Terraform,
    Bicep,
    Arm,
}

impl IacFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::Bicep => "bicep",
            Self::Arm => "arm",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let extension = path.rsplit('.').next()?.to_ascii_lowercase();
        match extension.as_str() {
            "tf" => Some(Self::Terraform),
            "bicep" => Some(Self::Bicep),
            "json" | "arm" => Some(Self::Arm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IacFile {
    pub path: String,
    pub format: IacFormat,
}

/// Lowercase the name and collapse every non-alphanumeric run to a single
/// hyphen, so "My VM (west)" matches "my-vm-west.tf".
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

fn path_patterns() -> &'static [(Regex, IacFormat)] {
    static PATTERNS: OnceLock<Vec<(Regex, IacFormat)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(^|/)(infra|terraform|modules|tf)/.+\.tf$", IacFormat::Terraform),
            (r"(^|/)(infra|bicep)/.+\.bicep$", IacFormat::Bicep),
            (r"(^|/)(arm|templates|deployments)/.+\.json$", IacFormat::Arm),
            (r"(^|/)main\.tf$", IacFormat::Terraform),
        ]
        .into_iter()
        .map(|(pattern, format)| (Regex::new(pattern).expect("static pattern"), format))
        .collect()
    })
}

/// Resolve the IaC file declaring `resource` in `repo`, or None when no
/// candidate exists (the caller treats that as fatal for the PR attempt).
pub async fn find_file(
    host: &dyn RepoHost,
    repo: &str,
    resource: &CloudResource,
) -> Result<Option<IacFile>, ScmError> {
    if let Some(tagged) = helpers::tag_value(&resource.tags, IAC_PATH_TAG_ALIASES) {
        if let Some(format) = IacFormat::from_path(tagged) {
            return Ok(Some(IacFile { path: tagged.to_string(), format }));
        }
    }

    let tree = host.get_tree(repo).await?;
    let blobs: Vec<&TreeEntry> = tree.iter().filter(|e| e.is_blob()).collect();

    if let Some(found) = match_by_filename(&blobs, &slugify(&resource.name)) {
        return Ok(Some(found));
    }
    Ok(match_by_path_patterns(&blobs))
}

fn match_by_filename(blobs: &[&TreeEntry], slug: &str) -> Option<IacFile> {
    if slug.is_empty() {
        return None;
    }
    for entry in blobs {
        let Some(format) = IacFormat::from_path(&entry.path) else { continue };
        let basename = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        if basename.to_ascii_lowercase().contains(slug) {
            return Some(IacFile { path: entry.path.clone(), format });
        }
    }
    None
}

fn match_by_path_patterns(blobs: &[&TreeEntry]) -> Option<IacFile> {
    for (pattern, format) in path_patterns() {
        for entry in blobs {
            if pattern.is_match(&entry.path) {
                return Some(IacFile { path: entry.path.clone(), format: *format });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::{CommitFile, OpenedPullRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Fake host serving a fixed tree and recording whether it was fetched.
    struct FakeHost {
        tree: Vec<TreeEntry>,
        tree_fetched: AtomicBool,
    }

    impl FakeHost {
        fn with_paths(paths: &[&str]) -> Self {
            Self {
                tree: paths
                    .iter()
                    .map(|p| TreeEntry { path: p.to_string(), kind: "blob".into() })
                    .collect(),
                tree_fetched: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RepoHost for FakeHost {
        async fn default_branch(&self, _repo: &str) -> Result<String, ScmError> {
            Ok("main".into())
        }

        async fn get_tree(&self, _repo: &str) -> Result<Vec<TreeEntry>, ScmError> {
            self.tree_fetched.store(true, Ordering::SeqCst);
            Ok(self.tree.clone())
        }

        async fn get_file_content(
            &self,
            _repo: &str,
            _path: &str,
            _ref_name: &str,
        ) -> Result<String, ScmError> {
            unreachable!("mapper never reads file contents")
        }

        async fn create_branch(&self, _repo: &str, _base: &str, _name: &str) -> Result<(), ScmError> {
            unreachable!()
        }

        async fn commit_files(
            &self,
            _repo: &str,
            _branch: &str,
            _files: &[CommitFile],
            _message: &str,
        ) -> Result<(), ScmError> {
            unreachable!()
        }

        async fn open_pull_request(
            &self,
            _repo: &str,
            _head: &str,
            _base: &str,
            _title: &str,
            _body: &str,
            _labels: &[String],
        ) -> Result<OpenedPullRequest, ScmError> {
            unreachable!()
        }
    }

    fn resource(name: &str, tags: &[(&str, &str)]) -> CloudResource {
        crate::test_support::resource("res-1", "virtualMachines", tags, &[])
            .with_name(name)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My VM (west)"), "my-vm-west");
        assert_eq!(slugify("vm-1"), "vm-1");
        assert_eq!(slugify("--weird__name--"), "weird-name");
        assert_eq!(slugify("***"), "");
    }

    #[tokio::test]
    async fn test_tag_hint_wins_without_touching_tree() {
        let host = FakeHost::with_paths(&["vm-1.tf"]);
        let r = resource("vm-1", &[("iac_path", "foo.tf")]);

        let found = find_file(&host, "acme/infra", &r).await.unwrap().unwrap();
        assert_eq!(found.path, "foo.tf");
        assert_eq!(found.format, IacFormat::Terraform);
        assert!(!host.tree_fetched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tag_hint_with_unknown_extension_falls_through() {
        let host = FakeHost::with_paths(&["vm-1.tf"]);
        let r = resource("vm-1", &[("iacPath", "notes.txt")]);

        let found = find_file(&host, "acme/infra", &r).await.unwrap().unwrap();
        assert_eq!(found.path, "vm-1.tf");
        assert!(host.tree_fetched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_filename_match_is_case_insensitive_first_in_tree_order() {
        let host = FakeHost::with_paths(&[
            "README.md",
            "env/VM-1-prod.bicep",
            "env/vm-1.tf",
        ]);
        let r = resource("VM 1", &[]);

        let found = find_file(&host, "acme/infra", &r).await.unwrap().unwrap();
        assert_eq!(found.path, "env/VM-1-prod.bicep");
        assert_eq!(found.format, IacFormat::Bicep);
    }

    #[tokio::test]
    async fn test_path_pattern_fallback_honors_pattern_order() {
        let host = FakeHost::with_paths(&[
            "templates/deploy.json",
            "terraform/network.tf",
            "docs/guide.md",
        ]);
        let r = resource("unrelated-name", &[]);

        // Terraform patterns come before ARM patterns, regardless of file order.
        let found = find_file(&host, "acme/infra", &r).await.unwrap().unwrap();
        assert_eq!(found.path, "terraform/network.tf");
        assert_eq!(found.format, IacFormat::Terraform);
    }

    #[tokio::test]
    async fn test_bare_main_tf_is_last_resort() {
        let host = FakeHost::with_paths(&["main.tf", "src/app.rs"]);
        let r = resource("unrelated-name", &[]);

        let found = find_file(&host, "acme/infra", &r).await.unwrap().unwrap();
        assert_eq!(found.path, "main.tf");
    }

    #[tokio::test]
    async fn test_no_candidate_returns_none() {
        let host = FakeHost::with_paths(&["src/app.rs", "README.md"]);
        let r = resource("vm-1", &[]);
        assert!(find_file(&host, "acme/infra", &r).await.unwrap().is_none());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(IacFormat::from_path("a/b.tf"), Some(IacFormat::Terraform));
        assert_eq!(IacFormat::from_path("a/b.BICEP"), Some(IacFormat::Bicep));
        assert_eq!(IacFormat::from_path("deploy.arm"), Some(IacFormat::Arm));
        assert_eq!(IacFormat::from_path("x.yaml"), None);
    }
}
