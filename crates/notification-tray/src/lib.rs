//! Stacked notification tray with a serialized mutation engine.
//!
//! Notifications are pushed onto a stack anchored at one edge of a render
//! surface. Every `add`/`remove` runs one layout pass at a time behind a busy
//! lock; requests that arrive while a pass is in flight are queued and
//! replayed in FIFO order once the lock clears.

pub mod config;
pub mod headless;
pub mod item;
pub mod layout;
mod queue;
pub mod signals;
pub mod surface;
mod tray;

// Re-exports for convenience
pub use config::TrayConfig;
pub use item::{Expiry, ItemId, ItemPhase, ItemSnapshot, ItemView};
pub use layout::{LayoutStrategy, Placement, StackLayout};
pub use signals::{SignalBus, SignalName, Subscription, TraySignal};
pub use surface::{Animator, ExtentProvider, RenderSurface};
pub use tray::{Tray, TrayBuilder};

/// Errors reported by tray operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrayError {
    #[error("Notification content is empty")]
    EmptyContent,

    #[error("No live notification with id {0}")]
    UnknownItem(ItemId),

    #[error("Notification {0} has no close affordance")]
    NotDismissable(ItemId),

    #[error("Notification tray is closed")]
    Closed,

    #[error("Invalid tray configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for tray operations.
pub type Result<T> = std::result::Result<T, TrayError>;

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
