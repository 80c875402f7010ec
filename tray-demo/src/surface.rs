//! Render surface that writes to the log instead of a page.

use notification_tray::{ItemId, ItemView, Placement, RenderSurface};

#[derive(Debug, Default)]
pub struct ConsoleSurface;

impl RenderSurface for ConsoleSurface {
    fn attach(&self, item: &ItemView, initial: Placement) {
        tracing::info!(
            id = %item.id,
            dismissable = item.dismissable,
            offset = initial.offset,
            "[surface] attach: {}",
            item.content
        );
    }

    fn detach(&self, id: ItemId) {
        tracing::info!(id = %id, "[surface] detach");
    }
}
