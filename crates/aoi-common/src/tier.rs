//! Data-maturity tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage in the data-maturity hierarchy.
///
/// Tiers are processed in the order of [`Tier::ALL`]; the enum is closed so
/// per-tier lookups stay exhaustive `match` expressions instead of
/// by-name field access.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Reference,
}

impl Tier {
    /// Fixed processing order.
    pub const ALL: [Tier; 5] = [
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Reference,
    ];

    /// Tier name as it appears in directives and output paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Reference => "reference",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_matches_names() {
        let names: Vec<&str> = Tier::ALL.iter().map(Tier::as_str).collect();
        assert_eq!(
            names,
            ["bronze", "silver", "gold", "platinum", "reference"]
        );
    }

    #[test]
    fn test_ord_follows_processing_order() {
        assert!(Tier::Bronze < Tier::Silver);
        assert!(Tier::Platinum < Tier::Reference);
    }
}
