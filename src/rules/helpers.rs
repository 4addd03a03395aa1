//! Stateless helpers shared across rule bodies: alias-probing lookups over
//! provider tag/metric maps, the live-metric-with-cached-fallback signal, and
//! age computation.

use chrono::{DateTime, Utc};

use crate::azure::ProviderClient;
use crate::models::{CloudResource, Metrics, Tags};

/// Key-name variants for the same semantic field, probed in priority order.
/// Providers and older ingestion versions disagree on casing.
pub const VM_SIZE_ALIASES: &[&str] = &["vmSize", "vm_size", "size"];
pub const SKU_ALIASES: &[&str] = &["skuName", "sku_name", "sku"];
pub const ACCESS_TIER_ALIASES: &[&str] = &["accessTier", "access_tier", "tier"];
pub const SERVICE_TIER_ALIASES: &[&str] = &["serviceTier", "service_tier", "sku", "tier"];
pub const CREATED_AT_ALIASES: &[&str] = &["createdAt", "created_at", "timeCreated", "creationDate"];
pub const REPO_ALIASES: &[&str] = &["costopsRepo", "costops_repo", "repo", "repository"];

pub const SIZE_GB_ALIASES: &[&str] = &["sizeGb", "size_gb", "diskSizeGb"];
pub const CAPACITY_GB_ALIASES: &[&str] = &["capacityGb", "capacity_gb", "usedCapacityGb"];
pub const CPU_CACHED_ALIASES: &[&str] = &["cpuAvgPercent", "cpu_percent", "avgCpu"];
pub const TX_CACHED_ALIASES: &[&str] = &["txPerDay", "transactionsPerDay", "transactions_per_day"];

/// First tag present under any accepted key name. Falls back to a
/// case-insensitive scan so hand-entered tags still resolve.
pub fn tag_value<'a>(tags: &'a Tags, aliases: &[&str]) -> Option<&'a str> {
    for alias in aliases {
        if let Some(value) = tags.get(*alias) {
            return Some(value.as_str());
        }
    }
    for alias in aliases {
        if let Some((_, value)) = tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias))
        {
            return Some(value.as_str());
        }
    }
    None
}

pub fn metric_value(metrics: &Metrics, aliases: &[&str]) -> Option<f64> {
    for alias in aliases {
        if let Some(value) = metrics.get(*alias) {
            return Some(*value);
        }
    }
    for alias in aliases {
        if let Some((_, value)) = metrics
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias))
        {
            return Some(*value);
        }
    }
    None
}

/// Utilization signal for a resource: live metric query first, cached metric
/// from the last sync if the live call fails transiently. A resource with no
/// determinable signal returns None and is skipped, never treated as zero.
/// Auth and protocol errors are not papered over with stale data.
pub async fn metric_signal(
    provider: &dyn ProviderClient,
    resource: &CloudResource,
    live_metric: &str,
    cached_aliases: &[&str],
    lookback_days: u32,
) -> Option<f64> {
    match provider
        .get_metric_average(&resource.resource_id, live_metric, lookback_days)
        .await
    {
        Ok(value) => value,
        Err(err) if err.is_transient() => {
            tracing::warn!(
                resource_id = %resource.resource_id,
                metric = live_metric,
                error = %err,
                "Live metric query failed, falling back to cached value"
            );
            metric_value(&resource.metrics, cached_aliases)
        }
        Err(err) => {
            tracing::error!(
                resource_id = %resource.resource_id,
                metric = live_metric,
                error = %err,
                "Live metric query failed, skipping resource"
            );
            None
        }
    }
}

/// Whole days elapsed since the creation timestamp carried in a tag.
pub fn age_days(created_at: &str, now: DateTime<Utc>) -> Option<i64> {
    let created = DateTime::parse_from_rfc3339(created_at).ok()?;
    let age = now.signed_duration_since(created.with_timezone(&Utc));
    Some(age.num_days()).filter(|d| *d >= 0)
}
