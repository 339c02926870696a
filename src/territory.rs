//! Territory directory: which tiles each nation controls.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GameError, GameResult};
use crate::tiles::TileId;

/// Nation tag. `0` means unowned (for tiles) or observer (for players).
pub type NationId = u8;

pub const UNOWNED: NationId = 0;

/// Nation tags playable in the reference balancing.
pub const MAX_NATIONS: NationId = 7;

/// Bidirectional tile <-> nation index. A tile belongs to at most one nation.
#[derive(Debug, Clone, Default)]
pub struct TerritoryDirectory {
    owners: BTreeMap<TileId, NationId>,
    cells: BTreeMap<NationId, BTreeSet<TileId>>,
}

impl TerritoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiles controlled by `nation`, in ascending order.
    pub fn cells_of(&self, nation: NationId) -> impl Iterator<Item = TileId> + '_ {
        self.cells
            .get(&nation)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn count(&self, nation: NationId) -> usize {
        self.cells.get(&nation).map_or(0, BTreeSet::len)
    }

    pub fn owner_of(&self, tile: TileId) -> NationId {
        self.owners.get(&tile).copied().unwrap_or(UNOWNED)
    }

    pub fn nations(&self) -> impl Iterator<Item = NationId> + '_ {
        self.cells
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(nation, _)| *nation)
    }

    /// Moves `tile` from `from` to `to`. Fails without touching anything if
    /// `from` is not the tile's current owner.
    pub fn reassign(&mut self, tile: TileId, from: NationId, to: NationId) -> GameResult<()> {
        let actual = self.owner_of(tile);
        if actual != from {
            return Err(GameError::StaleOwner {
                tile,
                expected: from,
                actual,
            });
        }
        if from == to {
            return Ok(());
        }

        if from != UNOWNED {
            if let Some(set) = self.cells.get_mut(&from) {
                set.remove(&tile);
            }
        }
        if to == UNOWNED {
            self.owners.remove(&tile);
        } else {
            self.owners.insert(tile, to);
            self.cells.entry(to).or_default().insert(tile);
        }
        Ok(())
    }

    /// Unconditionally records `nation` as the owner of `tile`, dropping any
    /// previous owner. Used when populating from a map.
    pub(crate) fn claim(&mut self, tile: TileId, nation: NationId) {
        let current = self.owner_of(tile);
        if let Err(err) = self.reassign(tile, current, nation) {
            debug_assert!(false, "claim from the current owner failed: {err}");
        }
    }

    pub fn clear(&mut self) {
        self.owners.clear();
        self.cells.clear();
    }

    /// Checks that both directions of the index agree.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .owners
            .iter()
            .all(|(tile, nation)| self.cells.get(nation).is_some_and(|s| s.contains(tile)));
        let backward = self.cells.iter().all(|(nation, set)| {
            set.iter()
                .all(|tile| self.owners.get(tile) == Some(nation))
        });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassign_moves_tile_between_nations() {
        let mut dir = TerritoryDirectory::new();
        dir.reassign(4, UNOWNED, 2).unwrap();
        dir.reassign(5, UNOWNED, 2).unwrap();
        dir.reassign(4, 2, 3).unwrap();

        assert_eq!(dir.cells_of(2).collect::<Vec<_>>(), vec![5]);
        assert_eq!(dir.cells_of(3).collect::<Vec<_>>(), vec![4]);
        assert_eq!(dir.owner_of(4), 3);
        assert!(dir.is_consistent());
    }

    #[test]
    fn stale_source_is_rejected_without_change() {
        let mut dir = TerritoryDirectory::new();
        dir.reassign(1, UNOWNED, 1).unwrap();
        let err = dir.reassign(1, 2, 3).unwrap_err();
        assert_eq!(
            err,
            GameError::StaleOwner {
                tile: 1,
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(dir.owner_of(1), 1);
        assert_eq!(dir.count(3), 0);
    }

    #[test]
    fn releasing_to_unowned_drops_the_tile() {
        let mut dir = TerritoryDirectory::new();
        dir.reassign(9, UNOWNED, 6).unwrap();
        dir.reassign(9, 6, UNOWNED).unwrap();
        assert_eq!(dir.owner_of(9), UNOWNED);
        assert_eq!(dir.count(6), 0);
        assert_eq!(dir.nations().count(), 0);
    }
}
