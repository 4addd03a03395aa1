mod app_service;
mod context;
mod disk;
mod engine;
pub mod helpers;
mod sql;
mod storage;
mod vm;

pub use context::RuleContext;
pub use engine::{run_rules, run_rules_for_org, RuleRunStats};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::models::{RecommendationPayload, RuleOverride};

pub type RuleFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Vec<RecommendationPayload>>> + Send + 'a>>;

/// Rule executors are plain functions; per-organization behavior comes from
/// the merged settings passed in, never from rule-local state.
pub type RuleExecutor = for<'a> fn(&'a RuleContext<'a>, &'a RuleSettings) -> RuleFuture<'a>;

#[derive(Debug, Clone)]
pub struct RuleSettings {
    pub enabled: bool,
    pub thresholds: HashMap<String, f64>,
}

impl RuleSettings {
    pub fn threshold(&self, name: &str) -> f64 {
        self.thresholds.get(name).copied().unwrap_or(0.0)
    }
}

pub struct RuleDef {
    pub id: &'static str,
    pub label: &'static str,
    pub defaults: RuleSettings,
    pub executor: RuleExecutor,
}

/// A catalog rule bound to its merged per-organization settings.
pub struct ActiveRule {
    pub id: &'static str,
    pub label: &'static str,
    pub settings: RuleSettings,
    pub executor: RuleExecutor,
}

fn thresholds(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The fixed rule catalog. Definitions are immutable; organizations tune
/// behavior through `RuleOverride` rows.
pub fn catalog() -> Vec<RuleDef> {
    vec![
        RuleDef {
            id: "azure.vm.rightsize",
            label: "Rightsize underutilized virtual machines",
            defaults: RuleSettings {
                enabled: true,
                thresholds: thresholds(&[
                    ("cpuPercent", 20.0),
                    ("lookbackDays", 30.0),
                    ("minImpact", 25.0),
                ]),
            },
            executor: vm::run,
        },
        RuleDef {
            id: "azure.disk.unattached",
            label: "Downgrade long-unattached managed disks",
            defaults: RuleSettings {
                enabled: true,
                thresholds: thresholds(&[("minAgeDays", 7.0), ("minImpact", 10.0)]),
            },
            executor: disk::run,
        },
        RuleDef {
            id: "azure.storage.cool_tier",
            label: "Move low-traffic storage accounts to the cool tier",
            defaults: RuleSettings {
                enabled: true,
                thresholds: thresholds(&[
                    ("txPerDay", 100.0),
                    ("capacityGbMin", 50.0),
                    ("minImpact", 5.0),
                ]),
            },
            executor: storage::run,
        },
        RuleDef {
            id: "azure.sql.rightsize",
            label: "Rightsize underutilized SQL databases",
            defaults: RuleSettings {
                enabled: true,
                thresholds: thresholds(&[
                    ("cpuPercent", 20.0),
                    ("lookbackDays", 30.0),
                    ("minImpact", 15.0),
                ]),
            },
            executor: sql::run,
        },
        RuleDef {
            id: "azure.appservice.rightsize",
            label: "Rightsize underutilized App Service plans",
            defaults: RuleSettings {
                enabled: true,
                thresholds: thresholds(&[
                    ("cpuPercent", 15.0),
                    ("lookbackDays", 30.0),
                    ("minImpact", 10.0),
                ]),
            },
            executor: app_service::run,
        },
    ]
}

/// Resolve the active rule set for an organization: overlay overrides onto
/// defaults and keep only enabled rules, bound to their merged settings.
pub fn resolve_active_rules(
    catalog: Vec<RuleDef>,
    overrides: &HashMap<String, RuleOverride>,
) -> Vec<ActiveRule> {
    catalog
        .into_iter()
        .filter_map(|def| {
            let over = overrides.get(def.id);

            let enabled = over
                .and_then(|o| o.enabled)
                .unwrap_or(def.defaults.enabled);
            if !enabled {
                return None;
            }

            let mut merged = def.defaults.thresholds.clone();
            if let Some(over) = over {
                for (key, value) in &over.thresholds {
                    merged.insert(key.clone(), *value);
                }
            }

            Some(ActiveRule {
                id: def.id,
                label: def.label,
                settings: RuleSettings {
                    enabled: true,
                    thresholds: merged,
                },
                executor: def.executor,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn override_map(entries: &[(&str, RuleOverride)]) -> HashMap<String, RuleOverride> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let active = resolve_active_rules(catalog(), &HashMap::new());
        assert_eq!(active.len(), catalog().len());

        let vm = active.iter().find(|r| r.id == "azure.vm.rightsize").unwrap();
        assert_eq!(vm.settings.threshold("cpuPercent"), 20.0);
        assert_eq!(vm.settings.threshold("minImpact"), 25.0);
    }

    #[test]
    fn test_override_merges_partial_thresholds() {
        let overrides = override_map(&[(
            "azure.vm.rightsize",
            RuleOverride {
                enabled: None,
                thresholds: [("cpuPercent".to_string(), 5.0)].into_iter().collect(),
            },
        )]);

        let active = resolve_active_rules(catalog(), &overrides);
        let vm = active.iter().find(|r| r.id == "azure.vm.rightsize").unwrap();
        // Overridden key replaced, untouched keys inherited.
        assert_eq!(vm.settings.threshold("cpuPercent"), 5.0);
        assert_eq!(vm.settings.threshold("lookbackDays"), 30.0);
        assert_eq!(vm.settings.threshold("minImpact"), 25.0);
    }

    #[test]
    fn test_disabled_rule_is_excluded() {
        let overrides = override_map(&[(
            "azure.disk.unattached",
            RuleOverride {
                enabled: Some(false),
                thresholds: HashMap::new(),
            },
        )]);

        let active = resolve_active_rules(catalog(), &overrides);
        assert!(active.iter().all(|r| r.id != "azure.disk.unattached"));
        assert_eq!(active.len(), catalog().len() - 1);
    }

    #[test]
    fn test_catalog_ids_are_unique_and_dotted() {
        let defs = catalog();
        let mut ids: Vec<_> = defs.iter().map(|d| d.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), defs.len());
        assert!(defs.iter().all(|d| d.id.split('.').count() == 3));
    }
}
