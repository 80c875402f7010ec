//! Tray handle: public operations, the busy-lock driver and expiry timers.
//!
//! Every mutation is submitted synchronously, so call order is admission
//! order. An admitted mutation runs on a spawned driver task; dropping the
//! future returned to the caller never cancels it. The driver keeps draining
//! deferred mutations until the queue is empty.

mod pass;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::TrayConfig;
use crate::headless::{FixedExtents, InstantAnimator, MemorySurface};
use crate::item::{Expiry, ItemId, ItemRecord, ItemSnapshot};
use crate::layout::{StackEntry, StackLayout};
use crate::queue::{MutationQueue, Release};
use crate::signals::{SignalBus, SignalName, Subscription, TraySignal};
use crate::surface::{Animator, ExtentProvider, RenderSurface};
use crate::{Result, TrayError, lock};

use pass::Settled;

type Reply<T> = oneshot::Sender<Result<T>>;

/// A deferred or running operation.
enum Mutation {
    Add {
        content: String,
        expiry: Expiry,
        dismissable: bool,
        reply: Reply<ItemSnapshot>,
    },
    Remove {
        id: ItemId,
        reply: Reply<ItemSnapshot>,
    },
    Relayout {
        reply: Reply<()>,
    },
}

impl Mutation {
    fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Relayout { .. } => "relayout",
        }
    }

    fn reject(self, error: TrayError) {
        match self {
            Self::Add { reply, .. } | Self::Remove { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Relayout { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

/// Why a removal was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemovalCause {
    Requested,
    Expired,
    Dismissed,
}

#[derive(Default)]
struct TrayState {
    /// Most recent first.
    items: Vec<ItemRecord>,
    next_id: u64,
    queue: MutationQueue<Mutation>,
    /// Callers that asked to remove an item whose removal was already queued.
    followers: HashMap<ItemId, Vec<Reply<ItemSnapshot>>>,
    closed: bool,
}

impl TrayState {
    fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut ItemRecord> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn entries(&self) -> Vec<StackEntry> {
        self.items
            .iter()
            .map(|item| StackEntry {
                id: item.id,
                visible: item.visible,
            })
            .collect()
    }

    fn any_moving(&self) -> bool {
        self.items.iter().any(|item| item.moving)
    }
}

struct TrayInner {
    config: TrayConfig,
    layout: StackLayout,
    surface: Arc<dyn RenderSurface>,
    animator: Arc<dyn Animator>,
    extents: Arc<dyn ExtentProvider>,
    signals: SignalBus,
    state: Mutex<TrayState>,
}

/// Notification tray handle. Clones share the same tray.
///
/// Operations spawn onto the current Tokio runtime and must be called from
/// within one.
#[derive(Clone)]
pub struct Tray {
    inner: Arc<TrayInner>,
}

impl fmt::Debug for Tray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Tray")
            .field("items", &state.items.len())
            .field("busy", &state.queue.is_busy())
            .field("pending", &state.queue.pending_len())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Tray`] from its collaborators.
#[derive(Default)]
pub struct TrayBuilder {
    config: TrayConfig,
    surface: Option<Arc<dyn RenderSurface>>,
    animator: Option<Arc<dyn Animator>>,
    extents: Option<Arc<dyn ExtentProvider>>,
}

impl TrayBuilder {
    pub fn config(mut self, config: TrayConfig) -> Self {
        self.config = config;
        self
    }

    /// Container the items are attached to. Defaults to a [`MemorySurface`].
    pub fn surface(mut self, surface: Arc<dyn RenderSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Transition primitive. Defaults to [`InstantAnimator`].
    pub fn animator(mut self, animator: Arc<dyn Animator>) -> Self {
        self.animator = Some(animator);
        self
    }

    /// Extent measurement. Defaults to the configured fixed item extent.
    pub fn extents(mut self, extents: Arc<dyn ExtentProvider>) -> Self {
        self.extents = Some(extents);
        self
    }

    pub fn build(self) -> Result<Tray> {
        self.config.validate()?;
        let layout = StackLayout::from_config(&self.config);
        let extents = self
            .extents
            .unwrap_or_else(|| Arc::new(FixedExtents(self.config.item_extent)));

        tracing::debug!(
            duration_ms = self.config.duration_ms,
            layout = ?self.config.layout,
            "Notification tray created"
        );

        Ok(Tray {
            inner: Arc::new(TrayInner {
                layout,
                surface: self
                    .surface
                    .unwrap_or_else(|| Arc::new(MemorySurface::new())),
                animator: self.animator.unwrap_or_else(|| Arc::new(InstantAnimator)),
                extents,
                signals: SignalBus::new(),
                state: Mutex::new(TrayState::default()),
                config: self.config,
            }),
        })
    }
}

impl Tray {
    pub fn builder() -> TrayBuilder {
        TrayBuilder::default()
    }

    /// Tray with in-memory collaborators.
    pub fn new(config: TrayConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Push a notification onto the stack.
    ///
    /// Resolves once its entry pass settled. Empty content is rejected
    /// without touching the lock.
    pub fn add(
        &self,
        content: impl Into<String>,
        expiry: Expiry,
        dismissable: bool,
    ) -> BoxFuture<'static, Result<ItemSnapshot>> {
        let content = content.into();
        if content.is_empty() {
            tracing::warn!("Rejected notification without content");
            return futures::future::ready(Err(TrayError::EmptyContent)).boxed();
        }

        let (reply, rx) = oneshot::channel();
        self.submit(Mutation::Add {
            content,
            expiry,
            dismissable,
            reply,
        });
        wait(rx)
    }

    /// [`add`](Self::add) with the default expiry and a close affordance.
    pub fn notify(&self, content: impl Into<String>) -> BoxFuture<'static, Result<ItemSnapshot>> {
        self.add(content, Expiry::Default, true)
    }

    /// Evict a notification. Resolves once it is detached.
    pub fn remove(&self, id: ItemId) -> BoxFuture<'static, Result<ItemSnapshot>> {
        self.request_removal(id, RemovalCause::Requested)
    }

    /// Evict a notification through its close affordance.
    ///
    /// Publishes `dismiss` right away unless a removal was already underway.
    pub fn dismiss(&self, id: ItemId) -> BoxFuture<'static, Result<ItemSnapshot>> {
        self.request_removal(id, RemovalCause::Dismissed)
    }

    /// Recompute every placement, e.g. after the surface was resized.
    pub fn relayout(&self) -> BoxFuture<'static, Result<()>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Mutation::Relayout { reply });
        wait(rx)
    }

    /// Stop accepting work: cancels every expiry timer and rejects deferred
    /// mutations. A pass already in flight still completes.
    pub fn close(&self) {
        let (pending, orphans) = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.closed {
                return;
            }
            state.closed = true;
            for item in &mut state.items {
                item.cancel_timer();
            }

            let pending = state.queue.drain();
            let mut orphans = Vec::new();
            for mutation in &pending {
                if let Mutation::Remove { id, .. } = mutation {
                    orphans.extend(state.followers.remove(id).unwrap_or_default());
                }
            }
            (pending, orphans)
        };

        let rejected = pending.len();
        for mutation in pending {
            mutation.reject(TrayError::Closed);
        }
        for reply in orphans {
            let _ = reply.send(Err(TrayError::Closed));
        }
        tracing::info!(rejected, "Notification tray closed");
    }

    // -- Observers --

    /// Snapshots of the live list, most recent first.
    pub fn items(&self) -> Vec<ItemSnapshot> {
        self.state().items.iter().map(ItemRecord::snapshot).collect()
    }

    pub fn get(&self, id: ItemId) -> Option<ItemSnapshot> {
        let state = self.state();
        state
            .index_of(id)
            .map(|index| state.items[index].snapshot())
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.state().queue.is_busy()
    }

    /// Mutations waiting for the lock.
    pub fn pending_len(&self) -> usize {
        self.state().queue.pending_len()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn config(&self) -> &TrayConfig {
        &self.inner.config
    }

    pub fn signals(&self) -> &SignalBus {
        &self.inner.signals
    }

    pub fn subscribe<F>(&self, name: SignalName, handler: F) -> Subscription
    where
        F: Fn(&TraySignal) + Send + Sync + 'static,
    {
        self.inner.signals.subscribe(name, handler)
    }

    pub fn events(&self) -> broadcast::Receiver<TraySignal> {
        self.inner.signals.events()
    }

    // -- Lock driver --

    fn state(&self) -> MutexGuard<'_, TrayState> {
        lock(&self.inner.state)
    }

    fn publish(&self, signal: TraySignal) {
        self.inner.signals.publish(&signal);
    }

    fn submit(&self, mutation: Mutation) {
        let granted = {
            let mut state = self.state();
            if state.closed {
                drop(state);
                mutation.reject(TrayError::Closed);
                return;
            }
            let label = mutation.label();
            let granted = state.queue.request(mutation);
            if granted.is_none() {
                tracing::debug!(
                    op = label,
                    pending = state.queue.pending_len(),
                    "Tray busy, mutation deferred"
                );
            }
            granted
        };

        if let Some(mutation) = granted {
            self.publish(TraySignal::BusyChange(true));
            self.spawn_driver(mutation);
        }
    }

    fn spawn_driver(&self, first: Mutation) {
        let tray = self.clone();
        tokio::spawn(async move { tray.drive(first).await });
    }

    async fn drive(self, first: Mutation) {
        let mut current = Some(first);
        while let Some(mutation) = current.take() {
            tracing::debug!(op = mutation.label(), "Layout pass started");
            let settled = self.execute(mutation).await;
            current = self.finish(settled);
        }
    }

    /// Release the lock after a pass and report its outcome. Returns the
    /// next mutation when one was waiting.
    ///
    /// A pass only returns once every transition it started has settled, so
    /// nothing is moving here.
    fn finish(&self, settled: Settled) -> Option<Mutation> {
        let release = {
            let mut state = self.state();
            debug_assert!(!state.any_moving(), "lock released while items move");
            state.queue.release()
        };

        match release {
            Release::Idle => {
                settled.deliver(self);
                None
            }
            Release::Released { next } => {
                self.publish(TraySignal::BusyChange(false));
                settled.deliver(self);
                if next.is_some() {
                    self.publish(TraySignal::BusyChange(true));
                }
                next
            }
        }
    }

    // -- Removal and expiry --

    fn request_removal(
        &self,
        id: ItemId,
        cause: RemovalCause,
    ) -> BoxFuture<'static, Result<ItemSnapshot>> {
        let (reply, rx) = oneshot::channel();
        let dismissed = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.closed {
                return futures::future::ready(Err(TrayError::Closed)).boxed();
            }
            let Some(item) = state.items.iter_mut().find(|item| item.id == id) else {
                tracing::warn!(id = %id, ?cause, "Removal of unknown notification");
                return futures::future::ready(Err(TrayError::UnknownItem(id))).boxed();
            };
            if cause == RemovalCause::Dismissed && !item.dismissable {
                return futures::future::ready(Err(TrayError::NotDismissable(id))).boxed();
            }
            if item.removal_requested {
                tracing::debug!(id = %id, ?cause, "Removal already underway, joining it");
                state.followers.entry(id).or_default().push(reply);
                return wait(rx);
            }

            item.removal_requested = true;
            item.cancel_timer();
            (cause == RemovalCause::Dismissed).then(|| item.snapshot())
        };

        if let Some(snapshot) = dismissed {
            self.publish(TraySignal::Dismiss(snapshot));
        }
        tracing::debug!(id = %id, ?cause, "Removal requested");
        self.submit(Mutation::Remove { id, reply });
        wait(rx)
    }

    /// Start the auto-dismiss timer of an item.
    fn arm_expiry(&self, id: ItemId, after: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tray = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let Some(inner) = tray.upgrade() else {
                        return;
                    };
                    let tray = Tray { inner };
                    tracing::debug!(id = %id, "Notification expired");
                    if let Err(e) = tray.request_removal(id, RemovalCause::Expired).await {
                        tracing::debug!(id = %id, error = %e, "Expiry removal skipped");
                    }
                }
            }
        });

        token
    }
}

fn wait<T: Send + 'static>(rx: oneshot::Receiver<Result<T>>) -> BoxFuture<'static, Result<T>> {
    async move { rx.await.unwrap_or(Err(TrayError::Closed)) }.boxed()
}
