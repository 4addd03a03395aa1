use serde_json::json;

use crate::db::ResourceRepo;
use crate::models::{CloudResource, RecommendationPayload};
use crate::savings::{self, Dimension};

use super::helpers;
use super::{RuleContext, RuleFuture, RuleSettings};

const LIVE_METRIC: &str = "CpuPercentage";
const CONFIDENCE: f64 = 0.75;

pub fn run<'a>(ctx: &'a RuleContext<'a>, settings: &'a RuleSettings) -> RuleFuture<'a> {
    Box::pin(execute(ctx, settings))
}

async fn execute(
    ctx: &RuleContext<'_>,
    settings: &RuleSettings,
) -> anyhow::Result<Vec<RecommendationPayload>> {
    let plans = ResourceRepo::list_by_type(ctx.pool, ctx.org_id, "serverFarms").await?;
    let lookback = settings.threshold("lookbackDays") as u32;

    let mut payloads = Vec::new();
    for plan in &plans {
        let cpu = helpers::metric_signal(
            ctx.provider,
            plan,
            LIVE_METRIC,
            helpers::CPU_CACHED_ALIASES,
            lookback,
        )
        .await;
        let Some(cpu) = cpu else { continue };

        if let Some(payload) = evaluate(plan, cpu, settings) {
            payloads.push(payload);
        }
    }
    Ok(payloads)
}

fn evaluate(
    plan: &CloudResource,
    cpu_avg: f64,
    settings: &RuleSettings,
) -> Option<RecommendationPayload> {
    if cpu_avg >= settings.threshold("cpuPercent") {
        return None;
    }

    let current = helpers::tag_value(&plan.tags, helpers::SKU_ALIASES)?;
    let target = savings::recommended_tier_for(Dimension::AppServicePlan, current)?;
    let impact = savings::estimate_savings(Dimension::AppServicePlan, current, target, None);
    if impact < settings.threshold("minImpact") {
        return None;
    }

    let mut details = json!({
        "resourceId": plan.resource_id,
        "subscriptionId": plan.subscription_id,
        "action": "rightsize",
        "currentSku": current,
        "targetSku": target,
        "cpuAvgPercent": cpu_avg,
        "lookbackDays": settings.threshold("lookbackDays"),
    });
    if let Some(repo) = helpers::tag_value(&plan.tags, helpers::REPO_ALIASES) {
        details["repo"] = json!(repo);
    }

    Some(RecommendationPayload {
        title: format!("Rightsize App Service plan {} from {current} to {target}", plan.name),
        description: format!(
            "Average CPU of {cpu_avg:.1}% over the last {} days is below the {}% threshold. \
             Moving from {current} to {target} saves an estimated ${impact:.2}/month.",
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

    fn plan_settings() -> RuleSettings {
        resolve_active_rules(catalog(), &HashMap::new())
            .into_iter()
            .find(|r| r.id == "azure.appservice.rightsize")
            .unwrap()
            .settings
    }

    #[test]
    fn test_idle_plan_emits_payload() {
        let plan = crate::test_support::resource(
            "plan-1",
            "serverFarms",
            &[("skuName", "P2v3")],
            &[],
        );
        let payload = evaluate(&plan, 6.0, &plan_settings()).unwrap();
        assert_eq!(payload.details["targetSku"].as_str(), Some("P1v3"));
        assert_eq!(payload.impact_monthly, 125.0);
    }

    #[test]
    fn test_plan_above_threshold_is_skipped() {
        let plan = crate::test_support::resource(
            "plan-1",
            "serverFarms",
            &[("skuName", "P2v3")],
            &[],
        );
        assert!(evaluate(&plan, 45.0, &plan_settings()).is_none());
    }

    #[test]
    fn test_unknown_sku_is_skipped() {
        let plan = crate::test_support::resource(
            "plan-2",
            "serverFarms",
            &[("skuName", "Y1")],
            &[],
        );
        assert!(evaluate(&plan, 2.0, &plan_settings()).is_none());
    }
}
