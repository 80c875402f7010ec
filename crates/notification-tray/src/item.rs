//! Notification item records and their public views.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::layout::Placement;

/// Unique, never reused identifier of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How long a notification stays before it removes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Use the tray's configured duration.
    #[default]
    Default,
    /// Remove after the given duration.
    After(Duration),
    /// Stay until removed explicitly.
    Never,
}

impl Expiry {
    /// Resolve against the tray default. `None` means no timer.
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            Self::Default => Some(default),
            Self::After(duration) => Some(duration),
            Self::Never => None,
        }
    }
}

impl From<Option<Duration>> for Expiry {
    fn from(value: Option<Duration>) -> Self {
        value.map_or(Self::Never, Self::After)
    }
}

/// Lifecycle state of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Entering,
    Live,
    Evicting,
    Destroyed,
}

impl ItemPhase {
    fn rank(self) -> u8 {
        match self {
            Self::Entering => 0,
            Self::Live => 1,
            Self::Evicting => 2,
            Self::Destroyed => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_advance_to(self, next: Self) -> bool {
        next.rank() == self.rank() + 1
    }
}

/// What the render surface needs to draw a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub content: String,
    pub dismissable: bool,
}

/// Point-in-time copy of a notification, handed to callers and observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub content: String,
    pub visible: bool,
    pub moving: bool,
    pub dismissable: bool,
    pub phase: ItemPhase,
    pub placement: Placement,
    #[serde(rename = "expiry_ms", serialize_with = "serialize_expiry")]
    pub expiry: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

fn serialize_expiry<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Internal record owned by the tray.
#[derive(Debug)]
pub(crate) struct ItemRecord {
    pub id: ItemId,
    pub content: String,
    pub dismissable: bool,
    pub visible: bool,
    pub moving: bool,
    pub phase: ItemPhase,
    pub placement: Placement,
    pub expiry: Option<Duration>,
    /// Cancels the auto-dismiss timer. Taken once removal is requested.
    pub timer: Option<CancellationToken>,
    pub removal_requested: bool,
    pub created_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn new(id: ItemId, content: String, dismissable: bool, placement: Placement) -> Self {
        Self {
            id,
            content,
            dismissable,
            visible: true,
            moving: false,
            phase: ItemPhase::Entering,
            placement,
            expiry: None,
            timer: None,
            removal_requested: false,
            created_at: Utc::now(),
        }
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id,
            content: self.content.clone(),
            dismissable: self.dismissable,
        }
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            content: self.content.clone(),
            visible: self.visible,
            moving: self.moving,
            dismissable: self.dismissable,
            phase: self.phase,
            placement: self.placement,
            expiry: self.expiry,
            created_at: self.created_at,
        }
    }

    pub fn advance(&mut self, next: ItemPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "item {} cannot go from {:?} to {:?}",
            self.id,
            self.phase,
            next
        );
        if next == ItemPhase::Evicting {
            self.visible = false;
        }
        self.phase = next;
    }

    /// Stop the auto-dismiss timer if one is armed.
    pub fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_resolution() {
        let default = Duration::from_millis(5000);
        assert_eq!(Expiry::Default.resolve(default), Some(default));
        assert_eq!(
            Expiry::After(Duration::from_millis(2000)).resolve(default),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(Expiry::Never.resolve(default), None);
        assert_eq!(Expiry::from(None), Expiry::Never);
    }

    #[test]
    fn test_phase_only_moves_forward() {
        assert!(ItemPhase::Entering.can_advance_to(ItemPhase::Live));
        assert!(ItemPhase::Live.can_advance_to(ItemPhase::Evicting));
        assert!(ItemPhase::Evicting.can_advance_to(ItemPhase::Destroyed));
        assert!(!ItemPhase::Evicting.can_advance_to(ItemPhase::Live));
        assert!(!ItemPhase::Destroyed.can_advance_to(ItemPhase::Entering));
        assert!(!ItemPhase::Live.can_advance_to(ItemPhase::Destroyed));
        assert!(!ItemPhase::Entering.can_advance_to(ItemPhase::Evicting));
    }

    #[test]
    fn test_eviction_hides_and_cancels() {
        let mut record = ItemRecord::new(ItemId(1), "hi".into(), true, Placement::default());
        let token = CancellationToken::new();
        record.timer = Some(token.clone());

        record.advance(ItemPhase::Live);
        record.cancel_timer();
        record.advance(ItemPhase::Evicting);

        assert!(token.is_cancelled());
        assert!(!record.visible);
        assert!(record.timer.is_none());
    }

    #[test]
    fn test_snapshot_serializes_expiry_in_millis() {
        let mut record = ItemRecord::new(ItemId(7), "x".into(), false, Placement::default());
        record.expiry = Some(Duration::from_millis(2000));
        let json = serde_json::to_value(record.snapshot()).expect("serialize");
        assert_eq!(json["id"], 7);
        assert_eq!(json["expiry_ms"], 2000);
        assert_eq!(json["phase"], "entering");
    }
}
