use serde_json::json;

use crate::db::ResourceRepo;
use crate::models::{CloudResource, RecommendationPayload};
use crate::savings::{self, Dimension};

use super::helpers;
use super::{RuleContext, RuleFuture, RuleSettings};

const LIVE_METRIC: &str = "Transactions";
const CONFIDENCE: f64 = 0.7;

pub fn run<'a>(ctx: &'a RuleContext<'a>, settings: &'a RuleSettings) -> RuleFuture<'a> {
    Box::pin(execute(ctx, settings))
}

async fn execute(
    ctx: &RuleContext<'_>,
    settings: &RuleSettings,
) -> anyhow::Result<Vec<RecommendationPayload>> {
    let accounts = ResourceRepo::list_by_type(ctx.pool, ctx.org_id, "storageAccounts").await?;

    let mut payloads = Vec::new();
    for account in &accounts {
        // Daily transaction volume; one-day lookback keeps the average in
        // transactions-per-day units.
        let tx_per_day = helpers::metric_signal(
            ctx.provider,
            account,
            LIVE_METRIC,
            helpers::TX_CACHED_ALIASES,
            1,
        )
        .await;
        let Some(tx_per_day) = tx_per_day else { continue };

        if let Some(payload) = evaluate(account, tx_per_day, settings) {
            payloads.push(payload);
        }
    }
    Ok(payloads)
}

fn evaluate(
    account: &CloudResource,
    tx_per_day: f64,
    settings: &RuleSettings,
) -> Option<RecommendationPayload> {
    if tx_per_day >= settings.threshold("txPerDay") {
        return None;
    }

    let current = helpers::tag_value(&account.tags, helpers::ACCESS_TIER_ALIASES)?;
    let capacity_gb = helpers::metric_value(&account.metrics, helpers::CAPACITY_GB_ALIASES)?;
    if capacity_gb < settings.threshold("capacityGbMin") {
        return None;
    }

    let target = savings::recommended_tier_for(Dimension::StorageAccessTier, current)?;
    let impact =
        savings::estimate_savings(Dimension::StorageAccessTier, current, target, Some(capacity_gb));
    if impact < settings.threshold("minImpact") {
        return None;
    }

    let mut details = json!({
        "resourceId": account.resource_id,
        "subscriptionId": account.subscription_id,
        "action": "change_access_tier",
        "currentTier": current,
        "targetTier": target,
        "capacityGb": capacity_gb,
        "txPerDay": tx_per_day,
    });
    if let Some(repo) = helpers::tag_value(&account.tags, helpers::REPO_ALIASES) {
        details["repo"] = json!(repo);
    }

    Some(RecommendationPayload {
        title: format!("Move storage account {} to the {target} tier", account.name),
        description: format!(
            "{tx_per_day:.0} transactions/day is below the {:.0}/day threshold for \
             {capacity_gb:.0} GB of {current} storage. Switching to {target} saves an \
             estimated ${impact:.2}/month.",
            settings.threshold("txPerDay"),
        ),
        impact_monthly: impact,
        confidence: CONFIDENCE,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{catalog, resolve_active_rules};
    use std::collections::HashMap;

    fn storage_settings() -> RuleSettings {
        resolve_active_rules(catalog(), &HashMap::new())
            .into_iter()
            .find(|r| r.id == "azure.storage.cool_tier")
            .unwrap()
            .settings
    }

    fn hot_account(capacity_gb: f64) -> CloudResource {
        crate::test_support::resource(
            "st-1",
            "storageAccounts",
            &[("accessTier", "Hot")],
            &[("capacityGb", capacity_gb)],
        )
    }

    #[test]
    fn test_cold_account_emits_payload() {
        let payload = evaluate(&hot_account(1000.0), 12.0, &storage_settings()).unwrap();
        assert_eq!(payload.details["targetTier"].as_str(), Some("Cool"));
        assert!((payload.impact_monthly - 8.4).abs() < 1e-9);
    }

    #[test]
    fn test_busy_account_is_skipped() {
        assert!(evaluate(&hot_account(1000.0), 5000.0, &storage_settings()).is_none());
    }

    #[test]
    fn test_small_account_is_skipped() {
        assert!(evaluate(&hot_account(10.0), 12.0, &storage_settings()).is_none());
    }

    #[test]
    fn test_cool_account_has_no_target() {
        let account = crate::test_support::resource(
            "st-2",
            "storageAccounts",
            &[("accessTier", "Cool")],
            &[("capacityGb", 1000.0)],
        );
        assert!(evaluate(&account, 12.0, &storage_settings()).is_none());
    }
}
