//! Tray configuration: defaults, validation, loading from JSON + environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutStrategy;
use crate::{Result, TrayError};

/// Default auto-dismiss duration in milliseconds.
pub const DEFAULT_DURATION_MS: u64 = 5000;

/// Default spacing between stacked items.
pub const DEFAULT_GAP: f64 = 10.0;

/// Default item extent for the indexed strategy.
pub const DEFAULT_ITEM_EXTENT: f64 = 64.0;

/// Configuration accepted when building a tray.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    /// Auto-dismiss duration used when a caller passes `Expiry::Default`.
    pub duration_ms: u64,
    /// Spacing between two stacked items.
    pub gap: f64,
    /// Extent of every item under [`LayoutStrategy::Indexed`].
    pub item_extent: f64,
    pub layout: LayoutStrategy,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_MS,
            gap: DEFAULT_GAP,
            item_extent: DEFAULT_ITEM_EXTENT,
            layout: LayoutStrategy::default(),
        }
    }
}

impl TrayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the default auto-dismiss duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Builder: set the gap between items.
    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    /// Builder: set the fixed item extent.
    pub fn with_item_extent(mut self, extent: f64) -> Self {
        self.item_extent = extent;
        self
    }

    /// Builder: set the layout strategy.
    pub fn with_layout(mut self, layout: LayoutStrategy) -> Self {
        self.layout = layout;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.duration_ms == 0 {
            return Err(TrayError::InvalidConfig(
                "duration_ms must be greater than 0".into(),
            ));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(TrayError::InvalidConfig(
                "gap must be a finite, non-negative number".into(),
            ));
        }
        if !self.item_extent.is_finite() || self.item_extent <= 0.0 {
            return Err(TrayError::InvalidConfig(
                "item_extent must be a finite, positive number".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TrayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `TRAY_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup on top of the defaults.
    ///
    /// Recognized keys: `TRAY_DURATION_MS`, `TRAY_GAP`, `TRAY_ITEM_EXTENT`,
    /// `TRAY_LAYOUT`. Empty values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let g = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = g("TRAY_DURATION_MS") {
            config.duration_ms = parse_value("TRAY_DURATION_MS", &v)?;
        }
        if let Some(v) = g("TRAY_GAP") {
            config.gap = parse_value("TRAY_GAP", &v)?;
        }
        if let Some(v) = g("TRAY_ITEM_EXTENT") {
            config.item_extent = parse_value("TRAY_ITEM_EXTENT", &v)?;
        }
        if let Some(v) = g("TRAY_LAYOUT") {
            config.layout = v
                .parse()
                .map_err(|e| TrayError::InvalidConfig(format!("TRAY_LAYOUT {e}")))?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TrayError::InvalidConfig(format!("{key} has invalid value '{value}'")))
}
