use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::azure::ProviderClient;
use crate::db::RuleConfigRepo;
use crate::reconcile::{self, PgRecommendationStore, RecommendationStore};

use super::{catalog, resolve_active_rules, ActiveRule, RuleContext};

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RuleRunStats {
    pub rules_executed: usize,
    pub rules_failed: usize,
    pub payloads_emitted: usize,
    pub payloads_persisted: usize,
    pub payloads_dropped: usize,
}

/// Run every active rule sequentially. One rule's failure never aborts the
/// run, and one payload's persistence failure never blocks the rest of that
/// rule's output.
pub async fn run_rules(
    ctx: &RuleContext<'_>,
    rules: &[ActiveRule],
    store: &dyn RecommendationStore,
) -> RuleRunStats {
    let mut stats = RuleRunStats::default();

    for rule in rules {
        stats.rules_executed += 1;

        let payloads = match (rule.executor)(ctx, &rule.settings).await {
            Ok(payloads) => payloads,
            Err(err) => {
                error!(rule_id = rule.id, error = %err, "Rule execution failed, skipping");
                stats.rules_failed += 1;
                continue;
            }
        };

        stats.payloads_emitted += payloads.len();
        for payload in &payloads {
            match reconcile::upsert(store, ctx.org_id, rule.id, payload).await {
                Ok(Some(_)) => stats.payloads_persisted += 1,
                Ok(None) => stats.payloads_dropped += 1,
                Err(err) => {
                    error!(
                        rule_id = rule.id,
                        title = %payload.title,
                        error = %err,
                        "Failed to persist payload, continuing"
                    );
                    stats.payloads_dropped += 1;
                }
            }
        }
    }

    stats
}

/// Entry point for one organization's rule cycle. The caller resolves the
/// provider client beforehand; a missing connection is its configuration
/// error to surface, not ours.
pub async fn run_rules_for_org(
    pool: &PgPool,
    org_id: Uuid,
    provider: &dyn ProviderClient,
) -> anyhow::Result<RuleRunStats> {
    let overrides = RuleConfigRepo::load_overrides(pool, org_id).await?;
    let active = resolve_active_rules(catalog(), &overrides);
    if active.is_empty() {
        info!(org_id = %org_id, "No active rules, nothing to do");
        return Ok(RuleRunStats::default());
    }

    let ctx = RuleContext { org_id, pool, provider };
    let store = PgRecommendationStore::new(pool.clone());
    let stats = run_rules(&ctx, &active, &store).await;

    info!(
        org_id = %org_id,
        executed = stats.rules_executed,
        failed = stats.rules_failed,
        persisted = stats.payloads_persisted,
        "Rule run complete"
    );
    Ok(stats)
}
