//! Client-side mirror of one nation's tiles.
//!
//! A peer holds no authority over water levels, so it never calls the
//! registry's flood path. It applies sea-level broadcasts to its own copy
//! instead and clears the content of tiles that end up underwater.

use std::collections::BTreeMap;

use crate::hex::TerrainType;
use crate::session::SessionEvent;
use crate::territory::NationId;
use crate::tiles::{TileChange, TileField, TileId, TileRegistry, TileState};

#[derive(Debug, Clone)]
pub struct NationReplica {
    nation: NationId,
    tiles: BTreeMap<TileId, TileState>,
    sea_level: u8,
}

impl NationReplica {
    pub fn from_registry(nation: NationId, registry: &TileRegistry) -> Self {
        let tiles = registry
            .territory()
            .cells_of(nation)
            .filter_map(|id| registry.get(id).ok().map(|state| (id, state)))
            .collect();
        Self {
            nation,
            tiles,
            sea_level: 0,
        }
    }

    pub fn nation(&self) -> NationId {
        self.nation
    }

    pub fn sea_level(&self) -> u8 {
        self.sea_level
    }

    pub fn tile(&self, tile: TileId) -> Option<&TileState> {
        self.tiles.get(&tile)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &TileState)> {
        self.tiles.iter().map(|(id, state)| (*id, state))
    }

    /// Applies one broadcast. Returns the tiles whose content was cleared.
    pub fn apply(&mut self, event: &SessionEvent) -> Vec<TileId> {
        match event {
            SessionEvent::SeaLevelChanged { sea_level } => self.apply_sea_level(*sea_level),
            SessionEvent::TileChanged { change } => {
                self.apply_change(change);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn apply_sea_level(&mut self, sea_level: u8) -> Vec<TileId> {
        self.sea_level = self.sea_level.max(sea_level);
        let mut cleared = Vec::new();
        for (id, state) in &mut self.tiles {
            let was_underwater = state.is_underwater();
            state.water_level = state.water_level.max(self.sea_level);
            if !was_underwater && state.is_underwater() {
                state.urban = 0;
                state.plant = 0;
                state.special = 0;
                cleared.push(*id);
            }
        }
        cleared
    }

    fn apply_change(&mut self, change: &TileChange) {
        match *change {
            TileChange::Owner { tile, from, to } if from == self.nation && to != self.nation => {
                self.tiles.remove(&tile);
            }
            TileChange::Field { tile, field, value } => {
                if let Some(state) = self.tiles.get_mut(&tile) {
                    match field {
                        TileField::Elevation => state.elevation = value,
                        TileField::WaterLevel => state.water_level = value,
                        TileField::Urban => state.urban = value,
                        TileField::Plant => state.plant = value,
                        TileField::Special => state.special = value,
                        TileField::Terrain => {
                            if let Some(terrain) = TerrainType::from_index(value) {
                                state.terrain = terrain;
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_broadcast_clears_sunk_tiles() {
        let mut states = vec![
            TileState::land(TerrainType::Grassland, 1),
            TileState::land(TerrainType::Hills, 5),
            TileState::land(TerrainType::Grassland, 0),
        ];
        for state in &mut states[..2] {
            state.nation = 2;
            state.urban = 3;
        }
        let registry = TileRegistry::new(3, 1, states);
        let mut replica = NationReplica::from_registry(2, &registry);
        assert_eq!(replica.tiles().count(), 2);

        let cleared = replica.apply(&SessionEvent::SeaLevelChanged { sea_level: 2 });
        assert_eq!(cleared, vec![0]);
        assert_eq!(replica.tile(0).unwrap().urban, 0);
        assert_eq!(replica.tile(0).unwrap().water_level, 2);
        assert_eq!(replica.tile(1).unwrap().urban, 3);

        assert!(replica
            .apply(&SessionEvent::SeaLevelChanged { sea_level: 1 })
            .is_empty());
        assert_eq!(replica.sea_level(), 2);
    }

    #[test]
    fn lost_tiles_leave_the_replica() {
        let states = vec![TileState {
            nation: 4,
            ..TileState::land(TerrainType::Desert, 2)
        }];
        let registry = TileRegistry::new(1, 1, states);
        let mut replica = NationReplica::from_registry(4, &registry);
        replica.apply(&SessionEvent::TileChanged {
            change: TileChange::Owner {
                tile: 0,
                from: 4,
                to: 1,
            },
        });
        assert!(replica.tile(0).is_none());
    }
}
