//! Stack layout: where each notification sits along the stack axis.
//!
//! Offsets are measured from the anchor edge. `0.0` is the slot touching the
//! anchor; negative values move away from it (up the stack), positive values
//! move past the anchor, off stage.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::TrayConfig;
use crate::item::ItemId;
use crate::surface::ExtentProvider;

/// Smallest extent a measured item takes, so reported zero or invalid sizes
/// still leave every item its own offset.
pub const MIN_MEASURED_EXTENT: f64 = 1.0;

/// Target state of one item's transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub offset: f64,
    pub opacity: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self::at(0.0)
    }
}

impl Placement {
    /// Fully opaque at the given offset.
    pub fn at(offset: f64) -> Self {
        Self {
            offset,
            opacity: 1.0,
        }
    }

    /// Where a freshly attached item starts: one extent past the anchor,
    /// transparent.
    pub fn entering(extent: f64) -> Self {
        Self {
            offset: extent,
            opacity: 0.0,
        }
    }
}

/// How item extents are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStrategy {
    /// Every item occupies `item_extent`.
    #[default]
    Indexed,
    /// Extents come from the injected [`ExtentProvider`].
    Measured,
}

impl FromStr for LayoutStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "indexed" => Ok(Self::Indexed),
            "measured" => Ok(Self::Measured),
            other => Err(format!("must be 'indexed' or 'measured', got '{other}'")),
        }
    }
}

/// One slot of the live list, in display order (most recent first).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackEntry {
    pub id: ItemId,
    /// `false` once eviction began; such entries take no space.
    pub visible: bool,
}

/// Computes target placements for the stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackLayout {
    strategy: LayoutStrategy,
    item_extent: f64,
    gap: f64,
}

impl StackLayout {
    pub fn new(strategy: LayoutStrategy, item_extent: f64, gap: f64) -> Self {
        Self {
            strategy,
            item_extent,
            gap,
        }
    }

    pub fn from_config(config: &TrayConfig) -> Self {
        Self::new(config.layout, config.item_extent, config.gap)
    }

    pub fn strategy(&self) -> LayoutStrategy {
        self.strategy
    }

    /// Extent of one item under the active strategy.
    ///
    /// Measured extents that are not finite or fall below
    /// [`MIN_MEASURED_EXTENT`] are raised to it.
    pub fn extent_of(&self, id: ItemId, extents: &dyn ExtentProvider) -> f64 {
        match self.strategy {
            LayoutStrategy::Indexed => self.item_extent,
            LayoutStrategy::Measured => {
                let extent = extents.extent(id);
                if extent.is_finite() && extent >= MIN_MEASURED_EXTENT {
                    extent
                } else {
                    MIN_MEASURED_EXTENT
                }
            }
        }
    }

    /// Placement for every visible entry. Evicting entries are skipped and
    /// do not count toward the offsets of the entries after them.
    pub fn place_stack(
        &self,
        entries: &[StackEntry],
        extents: &dyn ExtentProvider,
    ) -> Vec<(ItemId, Placement)> {
        let mut cursor = 0.0;
        let mut placements = Vec::with_capacity(entries.len());
        for entry in entries.iter().filter(|e| e.visible) {
            placements.push((entry.id, Placement::at(0.0 - cursor)));
            cursor += self.extent_of(entry.id, extents) + self.gap;
        }
        placements
    }

    /// Placements for a removal pass.
    ///
    /// The entry at `evicted` must already be marked invisible. It slides one
    /// of its own extents toward the anchor while fading out; the entries
    /// after it close the gap. Entries before it keep their placement.
    pub fn place_after_removal(
        &self,
        entries: &[StackEntry],
        evicted: usize,
        extents: &dyn ExtentProvider,
    ) -> Vec<(ItemId, Placement)> {
        let mut placements = self.place_stack(entries, extents);
        let Some(target) = entries.get(evicted) else {
            return placements;
        };

        let slot: f64 = entries[..evicted]
            .iter()
            .filter(|e| e.visible)
            .map(|e| self.extent_of(e.id, extents) + self.gap)
            .sum();
        placements.push((
            target.id,
            Placement {
                offset: 0.0 - slot + self.extent_of(target.id, extents),
                opacity: 0.0,
            },
        ));
        placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{FixedExtents, MapExtents};

    fn entries(ids: &[u64]) -> Vec<StackEntry> {
        ids.iter()
            .map(|&id| StackEntry {
                id: ItemId(id),
                visible: true,
            })
            .collect()
    }

    fn offsets(placements: &[(ItemId, Placement)]) -> Vec<(u64, f64)> {
        placements.iter().map(|(id, p)| (id.0, p.offset)).collect()
    }

    #[test]
    fn test_indexed_offsets() {
        let layout = StackLayout::new(LayoutStrategy::Indexed, 50.0, 10.0);
        let placed = layout.place_stack(&entries(&[3, 2, 1]), &FixedExtents(999.0));
        assert_eq!(offsets(&placed), vec![(3, 0.0), (2, -60.0), (1, -120.0)]);
        assert!(placed.iter().all(|(_, p)| p.opacity == 1.0));
    }

    #[test]
    fn test_measured_offsets_use_provider() {
        let layout = StackLayout::new(LayoutStrategy::Measured, 50.0, 10.0);
        let extents = MapExtents::new(40.0)
            .with(ItemId(3), 20.0)
            .with(ItemId(2), 80.0);
        let placed = layout.place_stack(&entries(&[3, 2, 1]), &extents);
        assert_eq!(offsets(&placed), vec![(3, 0.0), (2, -30.0), (1, -120.0)]);
    }

    #[test]
    fn test_evicting_entries_are_skipped() {
        let layout = StackLayout::new(LayoutStrategy::Indexed, 50.0, 10.0);
        let mut list = entries(&[4, 3, 2]);
        list[0].visible = false;
        let placed = layout.place_stack(&list, &FixedExtents(0.0));
        assert_eq!(offsets(&placed), vec![(3, 0.0), (2, -60.0)]);
    }

    #[test]
    fn test_removal_closes_gap_and_fades_evicted() {
        let layout = StackLayout::new(LayoutStrategy::Indexed, 50.0, 10.0);
        let mut list = entries(&[3, 2, 1]);
        list[1].visible = false;

        let placed = layout.place_after_removal(&list, 1, &FixedExtents(0.0));
        assert_eq!(offsets(&placed), vec![(3, 0.0), (1, -60.0), (2, -10.0)]);
        let (_, evicted) = placed.last().expect("evicted placement");
        assert_eq!(evicted.opacity, 0.0);
    }

    #[test]
    fn test_removing_head_slides_past_anchor() {
        let layout = StackLayout::new(LayoutStrategy::Indexed, 50.0, 10.0);
        let mut list = entries(&[1]);
        list[0].visible = false;

        let placed = layout.place_after_removal(&list, 0, &FixedExtents(0.0));
        assert_eq!(placed, vec![(ItemId(1), Placement::entering(50.0))]);
    }

    #[test]
    fn test_offsets_strictly_move_away_from_anchor() {
        let layout = StackLayout::new(LayoutStrategy::Measured, 50.0, 0.0);
        let extents = MapExtents::new(1.0).with(ItemId(2), 0.5);
        let placed = layout.place_stack(&entries(&[5, 4, 3, 2, 1]), &extents);
        for pair in placed.windows(2) {
            assert!(pair[0].1.offset > pair[1].1.offset, "{pair:?}");
        }
    }

    #[test]
    fn test_degenerate_measured_extents_keep_items_apart() {
        let layout = StackLayout::new(LayoutStrategy::Measured, 50.0, 0.0);
        let extents = MapExtents::new(0.0)
            .with(ItemId(3), f64::NAN)
            .with(ItemId(2), -20.0)
            .with(ItemId(1), f64::INFINITY);
        let placed = layout.place_stack(&entries(&[4, 3, 2, 1]), &extents);

        assert_eq!(
            offsets(&placed),
            vec![(4, 0.0), (3, -1.0), (2, -2.0), (1, -3.0)]
        );
        assert_eq!(layout.extent_of(ItemId(3), &extents), MIN_MEASURED_EXTENT);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("Measured".parse(), Ok(LayoutStrategy::Measured));
        assert_eq!(" indexed ".parse(), Ok(LayoutStrategy::Indexed));
        assert!("grid".parse::<LayoutStrategy>().is_err());
    }
}
