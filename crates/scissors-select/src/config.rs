//! Configuration for a [`SelectionModel`](crate::SelectionModel).

use serde::{Deserialize, Serialize};

use crate::search::SearchWindow;
use crate::selection::StrategyKind;

/// Tunables for a selection session.
///
/// Missing fields take their defaults when deserialized, so a partial JSON
/// object such as `{"search_radius": 64}` is a valid config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// How anchors are connected.
    pub strategy: StrategyKind,

    /// Chebyshev radius of the region each scissors search explores around
    /// its seed. `None` searches the whole image.
    pub search_radius: Option<u32>,

    /// Minimum percentage increase between `progress` notifications.
    /// Zero is treated as one.
    pub progress_granularity: u8,
}

impl SelectorConfig {
    /// Default search radius in pixels.
    pub const DEFAULT_SEARCH_RADIUS: u32 = 256;

    /// Default progress notification step in percent.
    pub const DEFAULT_PROGRESS_GRANULARITY: u8 = 1;

    /// The search window implied by [`search_radius`](Self::search_radius).
    #[must_use]
    pub fn search_window(&self) -> Option<SearchWindow> {
        self.search_radius.map(SearchWindow::new)
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            search_radius: Some(Self::DEFAULT_SEARCH_RADIUS),
            progress_granularity: Self::DEFAULT_PROGRESS_GRANULARITY,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cost::CostKind;

    #[test]
    fn defaults() {
        let config = SelectorConfig::default();
        assert_eq!(config.strategy, StrategyKind::PointToPoint);
        assert_eq!(config.search_radius, Some(256));
        assert_eq!(config.search_window(), Some(SearchWindow::new(256)));
        assert_eq!(config.progress_granularity, 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SelectorConfig = serde_json::from_str(r#"{"search_radius": null}"#).unwrap();
        assert_eq!(config.search_radius, None);
        assert_eq!(config.search_window(), None);
        assert_eq!(config.strategy, StrategyKind::PointToPoint);
    }

    #[test]
    fn serde_round_trip() {
        let config = SelectorConfig {
            strategy: StrategyKind::Scissors(CostKind::ColorWeigher),
            search_radius: Some(40),
            progress_granularity: 5,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SelectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
