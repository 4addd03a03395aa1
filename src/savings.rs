//! Static tier pricing and one-step downgrade targets.
//!
//! Prices are representative fixed monthly unit prices (or per-GB-month for
//! size-dependent dimensions). Keeping the data declarative keeps the
//! recommendation direction (always one discrete step down) easy to test.

/// An optimizable pricing dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    VmSize,
    DiskTier,
    StorageAccessTier,
    SqlServiceTier,
    AppServicePlan,
}

impl Dimension {
    /// Per-GB-month dimensions need a capacity to turn unit price into a
    /// monthly amount.
    pub fn priced_per_gb(&self) -> bool {
        matches!(self, Self::DiskTier | Self::StorageAccessTier)
    }
}

/// Monthly USD per unit. Per-GB for disk and storage access tiers.
const VM_PRICES: &[(&str, f64)] = &[
    ("Standard_D16s_v3", 960.0),
    ("Standard_D8s_v3", 480.0),
    ("Standard_D4s_v3", 240.0),
    ("Standard_D2s_v3", 120.0),
    ("Standard_E16s_v3", 1210.0),
    ("Standard_E8s_v3", 605.0),
    ("Standard_E4s_v3", 302.0),
    ("Standard_E2s_v3", 151.0),
];

const DISK_PRICES: &[(&str, f64)] = &[
    ("UltraSSD_LRS", 0.30),
    ("Premium_LRS", 0.12),
    ("StandardSSD_LRS", 0.08),
    ("Standard_LRS", 0.05),
];

const STORAGE_PRICES: &[(&str, f64)] = &[("Hot", 0.0184), ("Cool", 0.01)];

const SQL_PRICES: &[(&str, f64)] = &[
    ("P2", 930.0),
    ("P1", 465.0),
    ("S3", 150.0),
    ("S2", 75.0),
    ("S1", 30.0),
    ("S0", 15.0),
];

const APP_PLAN_PRICES: &[(&str, f64)] = &[
    ("P3v3", 500.0),
    ("P2v3", 250.0),
    ("P1v3", 125.0),
    ("S1", 70.0),
    ("B1", 13.0),
];

/// One step down per tier. Tiers without an entry are at the floor.
const VM_DOWNGRADES: &[(&str, &str)] = &[
    ("Standard_D16s_v3", "Standard_D8s_v3"),
    ("Standard_D8s_v3", "Standard_D4s_v3"),
    ("Standard_D4s_v3", "Standard_D2s_v3"),
    ("Standard_E16s_v3", "Standard_E8s_v3"),
    ("Standard_E8s_v3", "Standard_E4s_v3"),
    ("Standard_E4s_v3", "Standard_E2s_v3"),
];

const DISK_DOWNGRADES: &[(&str, &str)] = &[
    ("UltraSSD_LRS", "Premium_LRS"),
    ("Premium_LRS", "StandardSSD_LRS"),
    ("StandardSSD_LRS", "Standard_LRS"),
];

const STORAGE_DOWNGRADES: &[(&str, &str)] = &[("Hot", "Cool")];

const SQL_DOWNGRADES: &[(&str, &str)] = &[
    ("P2", "P1"),
    ("P1", "S3"),
    ("S3", "S2"),
    ("S2", "S1"),
    ("S1", "S0"),
];

const APP_PLAN_DOWNGRADES: &[(&str, &str)] = &[
    ("P3v3", "P2v3"),
    ("P2v3", "P1v3"),
    ("P1v3", "S1"),
    ("S1", "B1"),
];

fn price_table(dimension: Dimension) -> &'static [(&'static str, f64)] {
    match dimension {
        Dimension::VmSize => VM_PRICES,
        Dimension::DiskTier => DISK_PRICES,
        Dimension::StorageAccessTier => STORAGE_PRICES,
        Dimension::SqlServiceTier => SQL_PRICES,
        Dimension::AppServicePlan => APP_PLAN_PRICES,
    }
}

fn downgrade_table(dimension: Dimension) -> &'static [(&'static str, &'static str)] {
    match dimension {
        Dimension::VmSize => VM_DOWNGRADES,
        Dimension::DiskTier => DISK_DOWNGRADES,
        Dimension::StorageAccessTier => STORAGE_DOWNGRADES,
        Dimension::SqlServiceTier => SQL_DOWNGRADES,
        Dimension::AppServicePlan => APP_PLAN_DOWNGRADES,
    }
}

pub fn unit_price(dimension: Dimension, tier: &str) -> Option<f64> {
    price_table(dimension)
        .iter()
        .find(|(name, _)| *name == tier)
        .map(|(_, price)| *price)
}

/// The next cheaper tier one step down, or None when the tier is unknown or
/// already at the floor.
pub fn recommended_tier_for(dimension: Dimension, current: &str) -> Option<&'static str> {
    downgrade_table(dimension)
        .iter()
        .find(|(from, _)| *from == current)
        .map(|(_, to)| *to)
}

/// Monthly savings of moving `current` -> `target`, never negative. Unknown
/// tiers estimate to zero, as does a missing or non-positive size on
/// per-GB-priced dimensions.
pub fn estimate_savings(
    dimension: Dimension,
    current: &str,
    target: &str,
    size_gb: Option<f64>,
) -> f64 {
    let (Some(current_price), Some(target_price)) = (
        unit_price(dimension, current),
        unit_price(dimension, target),
    ) else {
        return 0.0;
    };

    let scale = if dimension.priced_per_gb() {
        match size_gb {
            Some(gb) if gb > 0.0 => gb,
            _ => return 0.0,
        }
    } else {
        1.0
    };

    ((current_price - target_price) * scale).max(0.0)
}
