//! Per-organization daily cycle: ingest provider resources, snapshot spend,
//! run the rule engine. Each step is timed and its failure recorded without
//! aborting the remaining steps.

use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::azure::{AzureClient, ProviderClient};
use crate::db::{ProviderConnectionRepo, ResourceRepo};
use crate::models::AzureCredentials;
use crate::rules::{self, RuleRunStats};

/// Resource types refreshed on every sync cycle.
const SYNCED_TYPES: &[&str] = &[
    "virtualMachines",
    "disks",
    "storageAccounts",
    "sqlDatabases",
    "serverFarms",
];

#[derive(Debug, Serialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct CycleSummary {
    pub organization_id: Uuid,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_spend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_stats: Option<RuleRunStats>,
}

pub struct ResolvedProvider {
    pub connection_id: Uuid,
    pub subscription_id: String,
    pub client: AzureClient,
}

/// Build a provider client from the organization's enabled connection. No
/// qualifying connection is a configuration error, never retried here.
pub async fn resolve_provider(
    pool: &PgPool,
    encryption_key: &str,
    org_id: Uuid,
) -> anyhow::Result<ResolvedProvider> {
    let connection = ProviderConnectionRepo::find_enabled(pool, org_id, "azure")
        .await?
        .context("no enabled azure provider connection for organization")?;

    let sealed = connection
        .credentials
        .as_deref()
        .context("provider connection has no stored credentials")?;
    let plaintext = crate::crypto::unseal(sealed, encryption_key)
        .map_err(|e| anyhow::anyhow!("failed to unseal provider credentials: {e}"))?;
    let credentials: AzureCredentials =
        serde_json::from_slice(&plaintext).context("stored credentials are malformed")?;

    Ok(ResolvedProvider {
        connection_id: connection.id,
        subscription_id: credentials.subscription_id.clone(),
        client: AzureClient::new(credentials),
    })
}

/// Refresh the resource inventory: upsert everything the provider reports,
/// then drop rows it no longer mentions. Listings are gathered up front so a
/// partial failure never triggers the stale-delete pass.
pub async fn sync_resources(
    pool: &PgPool,
    org_id: Uuid,
    provider: &dyn ProviderClient,
) -> anyhow::Result<usize> {
    let mut discovered = Vec::new();
    for &resource_type in SYNCED_TYPES {
        let batch = provider
            .list_resources_of_type(resource_type)
            .await
            .with_context(|| format!("listing {resource_type} failed"))?;
        discovered.extend(batch);
    }

    for resource in &discovered {
        ResourceRepo::upsert(pool, org_id, resource).await?;
    }

    let keep: Vec<String> = discovered.iter().map(|r| r.resource_id.clone()).collect();
    let removed = ResourceRepo::delete_not_in(pool, org_id, &keep).await?;
    if removed > 0 {
        info!(org_id = %org_id, removed, "Removed resources no longer reported");
    }

    Ok(discovered.len())
}

/// Run the full cycle for one organization. Never fails for a single step;
/// the summary carries each step's outcome.
pub async fn run_daily_cycle(pool: &PgPool, encryption_key: &str, org_id: Uuid) -> CycleSummary {
    let mut summary = CycleSummary {
        organization_id: org_id,
        steps: Vec::new(),
        monthly_spend: None,
        rule_stats: None,
    };

    let started = Instant::now();
    let provider = match resolve_provider(pool, encryption_key, org_id).await {
        Ok(provider) => {
            summary.steps.push(StepResult {
                step: "resolve_provider".into(),
                success: true,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            });
            provider
        }
        Err(err) => {
            warn!(org_id = %org_id, error = %err, "Daily cycle has no provider client");
            let message = err.to_string();
            summary.steps.push(StepResult {
                step: "resolve_provider".into(),
                success: false,
                error: Some(message.clone()),
                duration_ms: started.elapsed().as_millis() as u64,
            });
            for step in ["resource_sync", "cost_snapshot", "rule_run"] {
                summary.steps.push(StepResult {
                    step: step.into(),
                    success: false,
                    error: Some(format!("skipped: {message}")),
                    duration_ms: 0,
                });
            }
            return summary;
        }
    };

    let started = Instant::now();
    match sync_resources(pool, org_id, &provider.client).await {
        Ok(count) => {
            info!(org_id = %org_id, count, "Resource sync complete");
            let _ = ProviderConnectionRepo::update_sync_time(pool, provider.connection_id).await;
            let _ = ProviderConnectionRepo::update_status(pool, provider.connection_id, "connected", None).await;
            summary.steps.push(StepResult {
                step: "resource_sync".into(),
                success: true,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        Err(err) => {
            warn!(org_id = %org_id, error = %err, "Resource sync failed");
            let _ = ProviderConnectionRepo::update_status(
                pool,
                provider.connection_id,
                "error",
                Some(&err.to_string()),
            )
            .await;
            summary.steps.push(StepResult {
                step: "resource_sync".into(),
                success: false,
                error: Some(err.to_string()),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    let started = Instant::now();
    let scope = format!("/subscriptions/{}", provider.subscription_id);
    match provider.client.get_monthly_spend(&scope).await {
        Ok(spend) => {
            summary.monthly_spend = Some(spend);
            summary.steps.push(StepResult {
                step: "cost_snapshot".into(),
                success: true,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        Err(err) => {
            warn!(org_id = %org_id, error = %err, "Cost snapshot failed");
            summary.steps.push(StepResult {
                step: "cost_snapshot".into(),
                success: false,
                error: Some(err.to_string()),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    let started = Instant::now();
    match rules::run_rules_for_org(pool, org_id, &provider.client).await {
        Ok(stats) => {
            summary.rule_stats = Some(stats);
            summary.steps.push(StepResult {
                step: "rule_run".into(),
                success: true,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        Err(err) => {
            warn!(org_id = %org_id, error = %err, "Rule run failed");
            summary.steps.push(StepResult {
                step: "rule_run".into(),
                success: false,
                error: Some(err.to_string()),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    summary
}
