//! Drives a recommendation from "open" to an opened pull request: resolve the
//! IaC file, compute the patched content, create the branch, commit, open the
//! PR, and record the outcome.

use anyhow::{bail, Context};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{PullRequestRepo, RecommendationRepo, ResourceRepo};
use crate::mapper::{self, MAPPED_FORMAT_TAG, MAPPED_PATH_TAG};
use crate::models::{rec_status, OpenPrRequest, PullRequestEvent, Recommendation, Tags};
use crate::patch;
use crate::scm::{CommitFile, RepoHost};

const FALLBACK_BRANCH: &str = "costops/fix";
const DEFAULT_LABELS: &[&str] = &["costops", "cost-optimization"];

/// Open a fix PR for one recommendation. Every precondition failure is fatal
/// for this recommendation only; the status is advanced to `in_pr` only after
/// the PR is confirmed open.
pub async fn open_fix_pr(
    pool: &PgPool,
    host: &dyn RepoHost,
    org_id: Uuid,
    recommendation_id: Uuid,
    request: &OpenPrRequest,
) -> anyhow::Result<PullRequestEvent> {
    let recommendation = RecommendationRepo::get_by_id(pool, org_id, recommendation_id)
        .await
        .context("recommendation not found")?;

    let resource = ResourceRepo::get_by_resource_id(pool, org_id, &recommendation.resource_id)
        .await?
        .context("resource for recommendation no longer exists")?;

    let Some(repo) = recommendation
        .details
        .get("repo")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    else {
        bail!("recommendation has no target repository");
    };

    let base = match recommendation.details.get("baseBranch").and_then(|v| v.as_str()) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => host
            .default_branch(repo)
            .await
            .context("failed to resolve default branch")?,
    };

    let branch = sanitize_branch(
        request
            .branch_name
            .as_deref()
            .unwrap_or(&format!("costops/{}-{}", recommendation.rule_id, resource.name)),
    );

    let Some(target) = mapper::find_file(host, repo, &resource).await? else {
        bail!("no infrastructure-as-code file found for resource '{}'", resource.resource_id);
    };

    // Annotate the resource so later runs and the dashboard know the mapping.
    let mapping_tags: Tags = [
        (MAPPED_PATH_TAG.to_string(), target.path.clone()),
        (MAPPED_FORMAT_TAG.to_string(), target.format.as_str().to_string()),
    ]
    .into_iter()
    .collect();
    if let Err(err) =
        ResourceRepo::merge_tags(pool, org_id, &resource.resource_id, &mapping_tags).await
    {
        warn!(resource_id = %resource.resource_id, error = %err, "Failed to record mapping tags");
    }

    let current = host
        .get_file_content(repo, &target.path, &base)
        .await
        .context("failed to fetch current file content")?;

    let updated = patch::apply(target.format, &current, &recommendation);
    if updated == current {
        bail!("patch produced no changes for '{}'", target.path);
    }

    host.create_branch(repo, &base, &branch)
        .await
        .context("failed to create branch")?;

    let message = request
        .commit_message
        .clone()
        .unwrap_or_else(|| format!("costops: {}", recommendation.title));
    host.commit_files(
        repo,
        &branch,
        &[CommitFile { path: target.path.clone(), content: updated }],
        &message,
    )
    .await
    .context("failed to commit changes")?;

    let title = request.pr_title.clone().unwrap_or_else(|| recommendation.title.clone());
    let body = request
        .pr_body
        .clone()
        .unwrap_or_else(|| default_pr_body(&recommendation));
    let labels: Vec<String> = if request.labels.is_empty() {
        DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
    } else {
        request.labels.clone()
    };

    let pr = host
        .open_pull_request(repo, &branch, &base, &title, &body, &labels)
        .await
        .context("failed to open pull request")?;

    let event = PullRequestRepo::create(
        pool,
        &PullRequestEvent {
            id: Uuid::new_v4(),
            organization_id: org_id,
            recommendation_id,
            provider: "github".into(),
            repo: repo.to_string(),
            pr_number: pr.number,
            branch: pr.head_ref.clone(),
            status: "opened".into(),
            url: pr.url.clone(),
            created_at: chrono::Utc::now(),
        },
    )
    .await?;

    RecommendationRepo::update_status(pool, org_id, recommendation_id, rec_status::IN_PR).await?;

    info!(
        org_id = %org_id,
        recommendation_id = %recommendation_id,
        repo,
        pr_number = pr.number,
        "Opened fix pull request"
    );
    Ok(event)
}

/// Lowercase the candidate and collapse anything outside [a-z0-9/] to single
/// hyphens. An empty result falls back to a generic branch name.
pub fn sanitize_branch(candidate: &str) -> String {
    let mut branch = String::with_capacity(candidate.len());
    let mut pending_hyphen = false;
    for ch in candidate.chars() {
        if ch.is_ascii_alphanumeric() || ch == '/' {
            if pending_hyphen && !branch.is_empty() && !branch.ends_with('/') {
                branch.push('-');
            }
            pending_hyphen = false;
            branch.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    let branch = branch.trim_matches(['-', '/']).to_string();
    if branch.is_empty() {
        FALLBACK_BRANCH.to_string()
    } else {
        branch
    }
}

fn default_pr_body(recommendation: &Recommendation) -> String {
    let impact: f64 = recommendation.impact_monthly.try_into().unwrap_or(0.0);
    let confidence: f64 = recommendation.confidence.try_into().unwrap_or(0.0);
    format!(
        "{}\n\n\
         - Resource: `{}`\n\
         - Estimated monthly impact: ${impact:.2}\n\
         - Confidence: {:.0}%\n\n\
         Opened automatically by costops. Review and merge to apply.",
        recommendation.description,
        recommendation.resource_id,
        confidence * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_branch_lowercases_and_collapses() {
        assert_eq!(
            sanitize_branch("costops/azure.vm.rightsize-VM 1 (west)"),
            "costops/azure-vm-rightsize-vm-1-west"
        );
        assert_eq!(sanitize_branch("Fix!!Now"), "fix-now");
    }

    #[test]
    fn test_sanitize_branch_trims_edges() {
        assert_eq!(sanitize_branch("--costops/fix--"), "costops/fix");
        assert_eq!(sanitize_branch("/leading/slash/"), "leading/slash");
    }

    #[test]
    fn test_sanitize_branch_empty_falls_back() {
        assert_eq!(sanitize_branch("!!!"), FALLBACK_BRANCH);
        assert_eq!(sanitize_branch(""), FALLBACK_BRANCH);
    }

    #[test]
    fn test_default_pr_body_mentions_impact_and_confidence() {
        let rec = crate::test_support::recommendation("Rightsize vm-1", 240.0);
        let body = default_pr_body(&rec);
        assert!(body.contains("$240.00"));
        assert!(body.contains("Confidence: 85%"));
        assert!(body.contains("`vm-1`"));
    }
}
