use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::{DiscoveredResource, RecommendationPayload};
use crate::savings::{self, Dimension};

use super::helpers;
use super::{RuleContext, RuleFuture, RuleSettings};

const CONFIDENCE: f64 = 0.9;

pub fn run<'a>(ctx: &'a RuleContext<'a>, settings: &'a RuleSettings) -> RuleFuture<'a> {
    Box::pin(execute(ctx, settings))
}

async fn execute(
    ctx: &RuleContext<'_>,
    settings: &RuleSettings,
) -> anyhow::Result<Vec<RecommendationPayload>> {
    let disks = ctx.provider.list_unattached_disks().await?;
    let now = Utc::now();

    Ok(disks
        .iter()
        .filter_map(|disk| evaluate(disk, now, settings))
        .collect())
}

fn evaluate(
    disk: &DiscoveredResource,
    now: DateTime<Utc>,
    settings: &RuleSettings,
) -> Option<RecommendationPayload> {
    let created = helpers::tag_value(&disk.tags, helpers::CREATED_AT_ALIASES)?;
    let age = helpers::age_days(created, now)?;
    if (age as f64) < settings.threshold("minAgeDays") {
        return None;
    }

    let current = helpers::tag_value(&disk.tags, helpers::SKU_ALIASES)?;
    let size_gb = helpers::metric_value(&disk.metrics, helpers::SIZE_GB_ALIASES)?;
    let target = savings::recommended_tier_for(Dimension::DiskTier, current)?;
    let impact = savings::estimate_savings(Dimension::DiskTier, current, target, Some(size_gb));
    if impact < settings.threshold("minImpact") {
        return None;
    }

    let mut details = json!({
        "resourceId": disk.resource_id,
        "subscriptionId": disk.subscription_id,
        "action": "downgrade_disk_tier",
        "currentSku": current,
        "targetSku": target,
        "sizeGb": size_gb,
        "unattachedDays": age,
    });
    if let Some(repo) = helpers::tag_value(&disk.tags, helpers::REPO_ALIASES) {
        details["repo"] = json!(repo);
    }

    Some(RecommendationPayload {
        title: format!("Downgrade unattached disk {} to {target}", disk.name),
        description: format!(
            "Disk has been unattached for {age} days. Moving {size_gb:.0} GB from {current} \
             to {target} saves an estimated ${impact:.2}/month.",
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
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn disk_settings() -> RuleSettings {
        resolve_active_rules(catalog(), &HashMap::new())
            .into_iter()
            .find(|r| r.id == "azure.disk.unattached")
            .unwrap()
            .settings
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 11, 0, 0, 0).unwrap()
    }

    fn premium_disk(created: &str, size_gb: f64) -> DiscoveredResource {
        crate::test_support::discovered(
            "disk-1",
            "disks",
            &[("skuName", "Premium_LRS"), ("createdAt", created)],
            &[("sizeGb", size_gb)],
        )
    }

    #[test]
    fn test_old_unattached_disk_emits_payload() {
        let mut settings = disk_settings();
        settings.thresholds.insert("minImpact".into(), 1.0);

        let payload = evaluate(&premium_disk("2026-08-01T00:00:00Z", 100.0), now(), &settings).unwrap();
        assert!((payload.impact_monthly - 4.0).abs() < 1e-9);
        assert_eq!(payload.details["targetSku"].as_str(), Some("StandardSSD_LRS"));
        assert_eq!(payload.details["unattachedDays"].as_i64(), Some(10));
    }

    #[test]
    fn test_impact_below_minimum_is_suppressed() {
        // 100 GB Premium -> StandardSSD saves $4, under the default $10 floor.
        let payload = evaluate(&premium_disk("2026-08-01T00:00:00Z", 100.0), now(), &disk_settings());
        assert!(payload.is_none());
    }

    #[test]
    fn test_young_disk_is_skipped() {
        let mut settings = disk_settings();
        settings.thresholds.insert("minImpact".into(), 1.0);
        let payload = evaluate(&premium_disk("2026-08-08T00:00:00Z", 100.0), now(), &settings);
        assert!(payload.is_none());
    }

    #[test]
    fn test_missing_creation_timestamp_is_skipped() {
        let disk = crate::test_support::discovered(
            "disk-2",
            "disks",
            &[("skuName", "Premium_LRS")],
            &[("sizeGb", 100.0)],
        );
        assert!(evaluate(&disk, now(), &disk_settings()).is_none());
    }

    #[test]
    fn test_floor_sku_is_skipped() {
        let disk = crate::test_support::discovered(
            "disk-3",
            "disks",
            &[("skuName", "Standard_LRS"), ("createdAt", "2026-07-01T00:00:00Z")],
            &[("sizeGb", 500.0)],
        );
        assert!(evaluate(&disk, now(), &disk_settings()).is_none());
    }
}
