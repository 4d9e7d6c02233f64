use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateStrategy {
    #[serde(rename = "hot")]
    Hot,
    #[serde(rename = "fast-refresh")]
    FastRefresh,
    #[serde(rename = "reload")]
    FullReload,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStrategy::Hot => write!(f, "hot"),
            UpdateStrategy::FastRefresh => write!(f, "fast-refresh"),
            UpdateStrategy::FullReload => write!(f, "reload"),
        }
    }
}

/// Output of the update policy. Not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDecision {
    pub strategy: UpdateStrategy,
    pub reason: String,
}

impl UpdateDecision {
    pub fn hot(reason: impl Into<String>) -> Self {
        Self {
            strategy: UpdateStrategy::Hot,
            reason: reason.into(),
        }
    }

    pub fn fast_refresh(reason: impl Into<String>) -> Self {
        Self {
            strategy: UpdateStrategy::FastRefresh,
            reason: reason.into(),
        }
    }

    pub fn full_reload(reason: impl Into<String>) -> Self {
        Self {
            strategy: UpdateStrategy::FullReload,
            reason: reason.into(),
        }
    }
}
