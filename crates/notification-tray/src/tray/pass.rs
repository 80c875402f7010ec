//! Layout passes: one per admitted mutation.
//!
//! A pass marks every item whose placement changes as moving, starts all
//! transitions at once and resolves when the slowest one settles.

use crate::TrayError;
use crate::item::{Expiry, ItemId, ItemPhase, ItemRecord, ItemSnapshot};
use crate::layout::Placement;
use crate::signals::TraySignal;

use super::{Mutation, Reply, Tray, TrayState};

type Followers = Vec<Reply<ItemSnapshot>>;

/// One transition started by a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Move {
    id: ItemId,
    target: Placement,
    /// Detach from the surface once the transition settles.
    evicting: bool,
}

/// Outcome of a finished pass, delivered after the lock is released.
pub(super) enum Settled {
    Added {
        item: ItemSnapshot,
        reply: Reply<ItemSnapshot>,
    },
    Removed {
        item: ItemSnapshot,
        replies: Followers,
    },
    Relaid {
        reply: Reply<()>,
    },
    Failed {
        error: TrayError,
        replies: Followers,
    },
}

impl Settled {
    pub(super) fn deliver(self, tray: &Tray) {
        match self {
            Self::Added { item, reply } => {
                tray.publish(TraySignal::Add(item.clone()));
                let _ = reply.send(Ok(item));
            }
            Self::Removed { item, replies } => {
                tray.publish(TraySignal::Remove(item.clone()));
                for reply in replies {
                    let _ = reply.send(Ok(item.clone()));
                }
            }
            Self::Relaid { reply } => {
                let _ = reply.send(Ok(()));
            }
            Self::Failed { error, replies } => {
                for reply in replies {
                    let _ = reply.send(Err(error.clone()));
                }
            }
        }
    }
}

impl TrayState {
    /// Point items at their new targets and flag the ones that move.
    /// Items already at their target are left alone.
    fn begin_moves(
        &mut self,
        targets: Vec<(ItemId, Placement)>,
        evicted: Option<ItemId>,
    ) -> Vec<Move> {
        let mut moves = Vec::with_capacity(targets.len());
        for (id, target) in targets {
            let Some(item) = self.item_mut(id) else {
                continue;
            };
            if item.placement == target {
                continue;
            }
            item.placement = target;
            item.moving = true;
            moves.push(Move {
                id,
                target,
                evicting: evicted == Some(id),
            });
        }
        moves
    }
}

impl Tray {
    pub(super) async fn execute(&self, mutation: Mutation) -> Settled {
        match mutation {
            Mutation::Add {
                content,
                expiry,
                dismissable,
                reply,
            } => {
                let item = self.run_add(content, expiry, dismissable).await;
                Settled::Added { item, reply }
            }
            Mutation::Remove { id, reply } => match self.run_remove(id).await {
                Ok((item, followers)) => Settled::Removed {
                    item,
                    replies: std::iter::once(reply).chain(followers).collect(),
                },
                Err((error, followers)) => Settled::Failed {
                    error,
                    replies: std::iter::once(reply).chain(followers).collect(),
                },
            },
            Mutation::Relayout { reply } => {
                self.run_relayout().await;
                Settled::Relaid { reply }
            }
        }
    }

    async fn run_add(&self, content: String, expiry: Expiry, dismissable: bool) -> ItemSnapshot {
        let inner = &self.inner;
        let (view, initial, mut fallback) = {
            let mut state = self.state();
            state.next_id += 1;
            let id = ItemId(state.next_id);
            let initial = Placement::entering(inner.layout.extent_of(id, inner.extents.as_ref()));

            let mut record = ItemRecord::new(id, content, dismissable, initial);
            record.expiry = expiry.resolve(inner.config.duration());
            if let Some(after) = record.expiry.filter(|_| !state.closed) {
                record.timer = Some(self.arm_expiry(id, after));
            }
            let view = record.view();
            let fallback = record.snapshot();
            state.items.insert(0, record);
            (view, initial, fallback)
        };
        let id = view.id;

        inner.surface.attach(&view, initial);
        tracing::info!(id = %id, dismissable, "Notification added");

        let moves = {
            let mut state = self.state();
            let targets = inner
                .layout
                .place_stack(&state.entries(), inner.extents.as_ref());
            state.begin_moves(targets, None)
        };
        self.run_moves(moves).await;

        let mut state = self.state();
        match state.item_mut(id) {
            Some(item) => {
                item.advance(ItemPhase::Live);
                item.snapshot()
            }
            None => {
                // Only a removal pass splices items out, and it cannot overlap.
                tracing::error!(id = %id, "Notification vanished during its entry pass");
                fallback.phase = ItemPhase::Live;
                fallback
            }
        }
    }

    async fn run_remove(
        &self,
        id: ItemId,
    ) -> Result<(ItemSnapshot, Followers), (TrayError, Followers)> {
        let inner = &self.inner;
        let moves = {
            let mut state = self.state();
            let Some(index) = state.index_of(id) else {
                let followers = state.followers.remove(&id).unwrap_or_default();
                return Err((TrayError::UnknownItem(id), followers));
            };

            let item = &mut state.items[index];
            item.cancel_timer();
            item.advance(ItemPhase::Evicting);

            let targets = inner
                .layout
                .place_after_removal(&state.entries(), index, inner.extents.as_ref());
            tracing::debug!(id = %id, index, "Evicting notification");
            state.begin_moves(targets, Some(id))
        };
        self.run_moves(moves).await;

        let (item, followers) = {
            let mut state = self.state();
            let Some(index) = state.index_of(id) else {
                let followers = state.followers.remove(&id).unwrap_or_default();
                return Err((TrayError::UnknownItem(id), followers));
            };
            let mut record = state.items.remove(index);
            record.advance(ItemPhase::Destroyed);
            let followers = state.followers.remove(&id).unwrap_or_default();
            (record.snapshot(), followers)
        };

        tracing::info!(id = %id, remaining = self.len(), "Notification removed");
        Ok((item, followers))
    }

    async fn run_relayout(&self) {
        let inner = &self.inner;
        let moves = {
            let mut state = self.state();
            let targets = inner
                .layout
                .place_stack(&state.entries(), inner.extents.as_ref());
            state.begin_moves(targets, None)
        };
        tracing::debug!(moved = moves.len(), "Relayout");
        self.run_moves(moves).await;
    }

    /// Start every transition and wait for all of them.
    async fn run_moves(&self, moves: Vec<Move>) {
        let transitions = moves.into_iter().map(|mv| {
            let tray = self.clone();
            let animation = self.inner.animator.animate(mv.id, mv.target);
            async move {
                animation.await;
                tray.settle(mv.id);
                if mv.evicting {
                    tray.inner.surface.detach(mv.id);
                }
            }
        });
        futures::future::join_all(transitions).await;
    }

    /// One transition finished.
    fn settle(&self, id: ItemId) {
        if let Some(item) = self.state().item_mut(id) {
            item.moving = false;
        }
    }
}
