use serde_json::json;

use crate::db::ResourceRepo;
use crate::models::{CloudResource, RecommendationPayload};
use crate::savings::{self, Dimension};

use super::helpers;
use super::{RuleContext, RuleFuture, RuleSettings};

const LIVE_METRIC: &str = "Percentage CPU";
const CONFIDENCE: f64 = 0.85;

pub fn run<'a>(ctx: &'a RuleContext<'a>, settings: &'a RuleSettings) -> RuleFuture<'a> {
    Box::pin(execute(ctx, settings))
}

async fn execute(
    ctx: &RuleContext<'_>,
    settings: &RuleSettings,
) -> anyhow::Result<Vec<RecommendationPayload>> {
    let resources = ResourceRepo::list_by_type(ctx.pool, ctx.org_id, "virtualMachines").await?;
    let lookback = settings.threshold("lookbackDays") as u32;

    let mut payloads = Vec::new();
    for resource in &resources {
        let cpu = helpers::metric_signal(
            ctx.provider,
            resource,
            LIVE_METRIC,
            helpers::CPU_CACHED_ALIASES,
            lookback,
        )
        .await;
        let Some(cpu) = cpu else { continue };

        if let Some(payload) = evaluate(resource, cpu, settings) {
            payloads.push(payload);
        }
    }
    Ok(payloads)
}

fn evaluate(
    resource: &CloudResource,
    cpu_avg: f64,
    settings: &RuleSettings,
) -> Option<RecommendationPayload> {
    if cpu_avg >= settings.threshold("cpuPercent") {
        return None;
    }

    let current = helpers::tag_value(&resource.tags, helpers::VM_SIZE_ALIASES)?;
    let target = savings::recommended_tier_for(Dimension::VmSize, current)?;
    let impact = savings::estimate_savings(Dimension::VmSize, current, target, None);
    if impact < settings.threshold("minImpact") {
        return None;
    }

    let mut details = json!({
        "resourceId": resource.resource_id,
        "subscriptionId": resource.subscription_id,
        "action": "rightsize",
        "currentSku": current,
        "targetSku": target,
        "cpuAvgPercent": cpu_avg,
        "lookbackDays": settings.threshold("lookbackDays"),
    });
    if let Some(repo) = helpers::tag_value(&resource.tags, helpers::REPO_ALIASES) {
        details["repo"] = json!(repo);
    }

    Some(RecommendationPayload {
        title: format!("Rightsize {} from {current} to {target}", resource.name),
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
