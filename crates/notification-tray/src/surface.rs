//! Seams to the page that hosts the tray.
//!
//! The tray never draws anything itself. It attaches and detaches items on a
//! [`RenderSurface`], asks an [`Animator`] to move them, and measures them
//! through an [`ExtentProvider`].

use futures::future::BoxFuture;

use crate::item::{ItemId, ItemView};
use crate::layout::Placement;

/// Container notifications are attached to.
pub trait RenderSurface: Send + Sync + 'static {
    /// Attach a new item at its initial placement.
    fn attach(&self, item: &ItemView, initial: Placement);

    /// Detach an item. Only called after its exit transition completed.
    fn detach(&self, id: ItemId);
}

/// Visual transition primitive.
pub trait Animator: Send + Sync + 'static {
    /// Start moving `id` to `target`. The returned future resolves once the
    /// transition has finished.
    fn animate(&self, id: ItemId, target: Placement) -> BoxFuture<'static, ()>;
}

/// Rendered size of an item along the stack axis.
pub trait ExtentProvider: Send + Sync + 'static {
    fn extent(&self, id: ItemId) -> f64;
}
