//! In-memory collaborators for running the tray without a real page.
//!
//! [`MemorySurface`] is the default container of a [`Tray`](crate::Tray).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::item::{ItemId, ItemView};
use crate::layout::Placement;
use crate::lock;
use crate::surface::{Animator, ExtentProvider, RenderSurface};

/// Something that happened on a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Attached { id: ItemId, initial: Placement },
    Detached(ItemId),
}

#[derive(Debug, Default)]
struct MemorySurfaceState {
    /// Most recent first.
    attached: Vec<ItemView>,
    events: Vec<SurfaceEvent>,
}

/// Render surface that only remembers what is attached.
#[derive(Debug, Default)]
pub struct MemorySurface {
    state: Mutex<MemorySurfaceState>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently attached, in stack order (most recent first).
    pub fn attached(&self) -> Vec<ItemId> {
        lock(&self.state).attached.iter().map(|v| v.id).collect()
    }

    pub fn is_attached(&self, id: ItemId) -> bool {
        lock(&self.state).attached.iter().any(|v| v.id == id)
    }

    /// The view an item was attached with.
    pub fn view(&self, id: ItemId) -> Option<ItemView> {
        lock(&self.state)
            .attached
            .iter()
            .find(|v| v.id == id)
            .cloned()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        lock(&self.state).events.clone()
    }
}

impl RenderSurface for MemorySurface {
    fn attach(&self, item: &ItemView, initial: Placement) {
        let mut state = lock(&self.state);
        state.attached.insert(0, item.clone());
        state.events.push(SurfaceEvent::Attached {
            id: item.id,
            initial,
        });
    }

    fn detach(&self, id: ItemId) {
        let mut state = lock(&self.state);
        state.attached.retain(|v| v.id != id);
        state.events.push(SurfaceEvent::Detached(id));
    }
}

/// Animator whose transitions complete immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantAnimator;

impl Animator for InstantAnimator {
    fn animate(&self, _id: ItemId, _target: Placement) -> BoxFuture<'static, ()> {
        futures::future::ready(()).boxed()
    }
}

/// One finished transition recorded by [`TimedAnimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub id: ItemId,
    pub target: Placement,
    pub started_at: Instant,
    pub finished_at: Instant,
}

/// Animator that takes a fixed time per transition and keeps a history.
#[derive(Debug, Clone)]
pub struct TimedAnimator {
    duration: Duration,
    history: Arc<Mutex<Vec<TransitionRecord>>>,
}

impl TimedAnimator {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Finished transitions, in completion order.
    pub fn history(&self) -> Vec<TransitionRecord> {
        lock(&self.history).clone()
    }

    /// Last target reached by an item.
    pub fn last_target(&self, id: ItemId) -> Option<Placement> {
        lock(&self.history)
            .iter()
            .rev()
            .find(|r| r.id == id)
            .map(|r| r.target)
    }
}

impl Animator for TimedAnimator {
    fn animate(&self, id: ItemId, target: Placement) -> BoxFuture<'static, ()> {
        let duration = self.duration;
        let history = Arc::clone(&self.history);
        let started_at = Instant::now();
        async move {
            tokio::time::sleep(duration).await;
            lock(&history).push(TransitionRecord {
                id,
                target,
                started_at,
                finished_at: Instant::now(),
            });
        }
        .boxed()
    }
}

/// Every item has the same extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedExtents(pub f64);

impl ExtentProvider for FixedExtents {
    fn extent(&self, _id: ItemId) -> f64 {
        self.0
    }
}

/// Per-item extents with a fallback, adjustable while the tray runs.
#[derive(Debug, Default)]
pub struct MapExtents {
    fallback: f64,
    extents: Mutex<HashMap<ItemId, f64>>,
}

impl MapExtents {
    pub fn new(fallback: f64) -> Self {
        Self {
            fallback,
            extents: Mutex::new(HashMap::new()),
        }
    }

    /// Builder: set one item's extent.
    pub fn with(self, id: ItemId, extent: f64) -> Self {
        self.set(id, extent);
        self
    }

    pub fn set(&self, id: ItemId, extent: f64) {
        lock(&self.extents).insert(id, extent);
    }
}

impl ExtentProvider for MapExtents {
    fn extent(&self, id: ItemId) -> f64 {
        lock(&self.extents)
            .get(&id)
            .copied()
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: u64) -> ItemView {
        ItemView {
            id: ItemId(id),
            content: format!("item {id}"),
            dismissable: true,
        }
    }

    #[test]
    fn test_memory_surface_tracks_attachment() {
        let surface = MemorySurface::new();
        surface.attach(&view(1), Placement::entering(10.0));
        surface.attach(&view(2), Placement::entering(10.0));
        surface.attach(&view(3), Placement::entering(10.0));
        assert_eq!(surface.attached(), vec![ItemId(3), ItemId(2), ItemId(1)]);

        surface.detach(ItemId(2));
        assert_eq!(surface.attached(), vec![ItemId(3), ItemId(1)]);
        assert!(!surface.is_attached(ItemId(2)));
        assert_eq!(surface.events().len(), 4);
        assert_eq!(surface.events()[3], SurfaceEvent::Detached(ItemId(2)));
    }

    #[test]
    fn test_map_extents_fallback() {
        let extents = MapExtents::new(12.0).with(ItemId(1), 30.0);
        assert_eq!(extents.extent(ItemId(1)), 30.0);
        assert_eq!(extents.extent(ItemId(2)), 12.0);
        extents.set(ItemId(2), 5.0);
        assert_eq!(extents.extent(ItemId(2)), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_animator_records_history() {
        let animator = TimedAnimator::new(Duration::from_millis(300));
        let start = Instant::now();
        animator.animate(ItemId(4), Placement::at(-20.0)).await;

        let history = animator.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].finished_at - start, Duration::from_millis(300));
        assert_eq!(animator.last_target(ItemId(4)), Some(Placement::at(-20.0)));
    }
}
