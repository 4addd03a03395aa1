use serde_json::json;

use crate::db::ResourceRepo;
use crate::models::{CloudResource, RecommendationPayload};
use crate::savings::{self, Dimension};

use super::helpers;
use super::{RuleContext, RuleFuture, RuleSettings};

const LIVE_METRIC: &str = "cpu_percent";
const CONFIDENCE: f64 = 0.8;

pub fn run<'a>(ctx: &'a RuleContext<'a>, settings: &'a RuleSettings) -> RuleFuture<'a> {
    Box::pin(execute(ctx, settings))
}

async fn execute(
    ctx: &RuleContext<'_>,
    settings: &RuleSettings,
) -> anyhow::Result<Vec<RecommendationPayload>> {
    let databases = ResourceRepo::list_by_type(ctx.pool, ctx.org_id, "sqlDatabases").await?;
    let lookback = settings.threshold("lookbackDays") as u32;

    let mut payloads = Vec::new();
    for database in &databases {
        let cpu = helpers::metric_signal(
            ctx.provider,
            database,
            LIVE_METRIC,
            helpers::CPU_CACHED_ALIASES,
            lookback,
        )
        .await;
        let Some(cpu) = cpu else { continue };

        if let Some(payload) = evaluate(database, cpu, settings) {
            payloads.push(payload);
        }
    }
    Ok(payloads)
}

fn evaluate(
    database: &CloudResource,
    cpu_avg: f64,
    settings: &RuleSettings,
) -> Option<RecommendationPayload> {
    if cpu_avg >= settings.threshold("cpuPercent") {
        return None;
    }

    let current = helpers::tag_value(&database.tags, helpers::SERVICE_TIER_ALIASES)?;
    let target = savings::recommended_tier_for(Dimension::SqlServiceTier, current)?;
    let impact = savings::estimate_savings(Dimension::SqlServiceTier, current, target, None);
    if impact < settings.threshold("minImpact") {
        return None;
    }

    let mut details = json!({
        "resourceId": database.resource_id,
        "subscriptionId": database.subscription_id,
        "action": "rightsize",
        "currentTier": current,
        "targetTier": target,
        "cpuAvgPercent": cpu_avg,
        "lookbackDays": settings.threshold("lookbackDays"),
    });
    if let Some(repo) = helpers::tag_value(&database.tags, helpers::REPO_ALIASES) {
        details["repo"] = json!(repo);
    }

    Some(RecommendationPayload {
        title: format!("Rightsize database {} from {current} to {target}", database.name),
        description: format!(
            "Average DTU/CPU of {cpu_avg:.1}% over the last {} days is below the {}% \
             threshold. Moving from {current} to {target} saves an estimated ${impact:.2}/month.",
            settings.threshold("lookbackDays") as u32,
            settings.threshold("cpuPercent"),
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

    fn sql_settings() -> RuleSettings {
        resolve_active_rules(catalog(), &HashMap::new())
            .into_iter()
            .find(|r| r.id == "azure.sql.rightsize")
            .unwrap()
            .settings
    }

    #[test]
    fn test_idle_database_emits_payload() {
        let database = crate::test_support::resource(
            "sqldb-1",
            "sqlDatabases",
            &[("serviceTier", "S3")],
            &[],
        );
        let payload = evaluate(&database, 8.0, &sql_settings()).unwrap();
        assert_eq!(payload.details["targetTier"].as_str(), Some("S2"));
        assert_eq!(payload.impact_monthly, 75.0);
    }

    #[test]
    fn test_busy_database_is_skipped() {
        let database = crate::test_support::resource(
            "sqldb-1",
            "sqlDatabases",
            &[("serviceTier", "S3")],
            &[],
        );
        assert!(evaluate(&database, 60.0, &sql_settings()).is_none());
    }

    #[test]
    fn test_small_step_is_suppressed_by_min_impact() {
        // S1 -> S0 saves $15, equal to the default floor; S0 has no target.
        let database = crate::test_support::resource(
            "sqldb-2",
            "sqlDatabases",
            &[("serviceTier", "S0")],
            &[],
        );
        assert!(evaluate(&database, 2.0, &sql_settings()).is_none());
    }
}
