//! Placement policies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strategy used to choose a node for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// First eligible node in creation order.
    #[default]
    FirstFit,
    /// Eligible node leaving the least free CPU behind.
    BestFit,
    /// Eligible node leaving the most free CPU behind.
    WorstFit,
}

impl Policy {
    /// Every policy, in declaration order.
    pub const ALL: [Self; 3] = [Self::FirstFit, Self::BestFit, Self::WorstFit];

    /// Parse a policy name, falling back to [`Policy::FirstFit`].
    ///
    /// Names are case-insensitive and accept `-` in place of `_`, so
    /// `best_fit`, `Best-Fit` and `BEST_FIT` are equivalent. Anything
    /// unrecognised, including the empty string, selects first-fit.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "best_fit" | "bestfit" => Self::BestFit,
            "worst_fit" | "worstfit" => Self::WorstFit,
            _ => Self::FirstFit,
        }
    }

    /// Canonical name of the policy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFit => "first_fit",
            Self::BestFit => "best_fit",
            Self::WorstFit => "worst_fit",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Policy {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}
