use sqlx::PgPool;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::config::JobsConfig;
use crate::db::OrgRepo;
use crate::sync;

pub fn spawn_background_jobs(pool: PgPool, config: JobsConfig, encryption_key: String) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.daily_cycle_interval_secs));
        loop {
            ticker.tick().await;
            info!("Running daily cycle job");
            if let Err(e) = run_all_cycles(&pool, &encryption_key).await {
                error!("Daily cycle job failed: {e}");
            }
        }
    });

    info!("Background jobs started");
}

/// One cycle per organization. Organizations are independent; a summary full
/// of failed steps is logged, not propagated.
async fn run_all_cycles(pool: &PgPool, encryption_key: &str) -> anyhow::Result<()> {
    let orgs = OrgRepo::list(pool).await?;

    for org in orgs {
        let summary = sync::run_daily_cycle(pool, encryption_key, org.id).await;
        let failed: Vec<&str> = summary
            .steps
            .iter()
            .filter(|s| !s.success)
            .map(|s| s.step.as_str())
            .collect();
        if failed.is_empty() {
            info!(org_id = %org.id, "Daily cycle complete");
        } else {
            error!(org_id = %org.id, failed_steps = ?failed, "Daily cycle completed with failures");
        }
    }

    Ok(())
}
