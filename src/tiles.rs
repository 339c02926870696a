//! Tile registry: per-tile economic state and who may write it.
//!
//! Terrain and elevation are server-only. Water, urban, plant and special
//! levels belong to the owning nation while that nation has a controller and
//! fall back to the server otherwise. Ownership itself is server-only and is
//! kept in lockstep with the [`TerritoryDirectory`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::authority::{Actor, Replicated};
use crate::catalog::{self, Improvement, MAX_PLANT, MAX_SPECIAL, MAX_URBAN};
use crate::error::{GameError, GameResult};
use crate::hex::{HexDirection, RoadMask, TerrainType, UNDERWATER_SLOT};
use crate::territory::{NationId, TerritoryDirectory, UNOWNED};

/// Row-major index of a tile in the grid.
pub type TileId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileField {
    Terrain,
    Elevation,
    WaterLevel,
    Urban,
    Plant,
    Special,
}

impl TileField {
    fn validate(self, value: u8) -> GameResult<()> {
        let ok = match self {
            TileField::Terrain => TerrainType::from_index(value).is_some(),
            TileField::Urban => value <= MAX_URBAN,
            TileField::Plant => value <= MAX_PLANT,
            TileField::Special => value <= MAX_SPECIAL,
            TileField::Elevation | TileField::WaterLevel => true,
        };
        if ok {
            Ok(())
        } else {
            Err(GameError::InvalidFieldValue { field: self, value })
        }
    }
}

/// Plain copy of one tile's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileState {
    pub terrain: TerrainType,
    pub elevation: u8,
    pub water_level: u8,
    pub urban: u8,
    pub plant: u8,
    pub special: u8,
    pub nation: NationId,
    pub incoming_river: Option<HexDirection>,
    pub outgoing_river: Option<HexDirection>,
    pub roads: RoadMask,
}

impl TileState {
    pub fn land(terrain: TerrainType, elevation: u8) -> Self {
        Self {
            terrain,
            elevation,
            water_level: 0,
            urban: 0,
            plant: 0,
            special: 0,
            nation: UNOWNED,
            incoming_river: None,
            outgoing_river: None,
            roads: RoadMask::EMPTY,
        }
    }

    pub fn is_underwater(&self) -> bool {
        self.water_level > self.elevation
    }

    pub fn has_river(&self) -> bool {
        self.incoming_river.is_some() || self.outgoing_river.is_some()
    }

    pub fn improvement(&self) -> Improvement {
        catalog::resolve_improvement(self.special, self.urban, self.plant)
    }

    /// Slot into an improvement's terrain-effectiveness table.
    pub fn effectiveness_index(&self) -> usize {
        if self.is_underwater() {
            UNDERWATER_SLOT
        } else {
            self.terrain.index()
        }
    }
}

/// Emitted to subscribers after every successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TileChange {
    Field {
        tile: TileId,
        field: TileField,
        value: u8,
    },
    Owner {
        tile: TileId,
        from: NationId,
        to: NationId,
    },
    Flooded {
        tile: TileId,
        water_level: u8,
        cleared: bool,
    },
    Reloaded {
        tiles: usize,
    },
}

type Subscriber = Box<dyn FnMut(&TileChange) + Send>;

#[derive(Debug, Clone, Copy)]
struct Tile {
    terrain: Replicated<TerrainType>,
    elevation: Replicated<u8>,
    water_level: Replicated<u8>,
    urban: Replicated<u8>,
    plant: Replicated<u8>,
    special: Replicated<u8>,
    nation: NationId,
    incoming_river: Option<HexDirection>,
    outgoing_river: Option<HexDirection>,
    roads: RoadMask,
}

impl Tile {
    fn from_state(state: TileState, owner_writer: Actor) -> Self {
        Self {
            terrain: Replicated::new(state.terrain, Actor::Server),
            elevation: Replicated::new(state.elevation, Actor::Server),
            water_level: Replicated::new(state.water_level, owner_writer),
            urban: Replicated::new(state.urban, owner_writer),
            plant: Replicated::new(state.plant, owner_writer),
            special: Replicated::new(state.special, owner_writer),
            nation: state.nation,
            incoming_river: state.incoming_river,
            outgoing_river: state.outgoing_river,
            roads: state.roads,
        }
    }

    fn state(&self) -> TileState {
        TileState {
            terrain: self.terrain.get(),
            elevation: self.elevation.get(),
            water_level: self.water_level.get(),
            urban: self.urban.get(),
            plant: self.plant.get(),
            special: self.special.get(),
            nation: self.nation,
            incoming_river: self.incoming_river,
            outgoing_river: self.outgoing_river,
            roads: self.roads,
        }
    }

    fn owner_fields(&mut self) -> [&mut Replicated<u8>; 4] {
        [
            &mut self.water_level,
            &mut self.urban,
            &mut self.plant,
            &mut self.special,
        ]
    }

    fn writer(&self, field: TileField) -> Actor {
        match field {
            TileField::Terrain => self.terrain.writer(),
            TileField::Elevation => self.elevation.writer(),
            TileField::WaterLevel => self.water_level.writer(),
            TileField::Urban => self.urban.writer(),
            TileField::Plant => self.plant.writer(),
            TileField::Special => self.special.writer(),
        }
    }

    fn set(&mut self, field: TileField, value: u8, actor: Actor) -> Result<bool, Actor> {
        let result = match field {
            TileField::Terrain => {
                let terrain = TerrainType::from_index(value).unwrap_or(TerrainType::Grassland);
                self.terrain.set(terrain, actor)
            }
            TileField::Elevation => self.elevation.set(value, actor),
            TileField::WaterLevel => self.water_level.set(value, actor),
            TileField::Urban => self.urban.set(value, actor),
            TileField::Plant => self.plant.set(value, actor),
            TileField::Special => self.special.set(value, actor),
        };
        result.map_err(|denied| denied.writer)
    }
}

pub struct TileRegistry {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    territory: TerritoryDirectory,
    controlled: BTreeSet<NationId>,
    subscribers: Vec<Subscriber>,
}

impl fmt::Debug for TileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileRegistry")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("tiles", &self.tiles.len())
            .field("controlled", &self.controlled)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl TileRegistry {
    /// Builds a registry from row-major tile states. The territory directory
    /// is populated from each tile's nation field.
    pub fn new(width: u32, height: u32, states: Vec<TileState>) -> Self {
        let mut registry = Self {
            width,
            height,
            tiles: Vec::new(),
            territory: TerritoryDirectory::new(),
            controlled: BTreeSet::new(),
            subscribers: Vec::new(),
        };
        registry.install(states);
        registry
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn territory(&self) -> &TerritoryDirectory {
        &self.territory
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&TileChange) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn get(&self, tile: TileId) -> GameResult<TileState> {
        self.tiles
            .get(tile as usize)
            .map(Tile::state)
            .ok_or(GameError::UnknownTile(tile))
    }

    pub fn states(&self) -> impl Iterator<Item = TileState> + '_ {
        self.tiles.iter().map(Tile::state)
    }

    pub fn writer_of(&self, tile: TileId, field: TileField) -> GameResult<Actor> {
        self.tile(tile).map(|t| t.writer(field))
    }

    /// Writes one field if `actor` holds authority over it.
    pub fn set_field(
        &mut self,
        tile: TileId,
        field: TileField,
        value: u8,
        actor: Actor,
    ) -> GameResult<bool> {
        field.validate(value)?;
        let changed = self
            .tile_mut(tile)?
            .set(field, value, actor)
            .map_err(|_| GameError::NotAuthorized { actor, tile, field })?;
        if changed {
            self.notify(&TileChange::Field { tile, field, value });
        }
        Ok(changed)
    }

    /// Moves a tile to `to`, updating the directory and the tile's owner
    /// field together.
    pub fn transfer_ownership(&mut self, tile: TileId, to: NationId, actor: Actor) -> GameResult<()> {
        if !actor.is_server() {
            return Err(GameError::NotAuthorized {
                actor,
                tile,
                field: TileField::Special,
            });
        }
        let from = self.tile(tile)?.nation;
        if from == to {
            return Ok(());
        }
        self.territory.reassign(tile, from, to)?;
        let writer = self.owner_writer(to);
        let cell = self.tile_mut(tile)?;
        cell.nation = to;
        for field in cell.owner_fields() {
            field.hand_over(writer);
        }
        debug!(tile, from, to, "tile.ownership_transferred");
        self.notify(&TileChange::Owner { tile, from, to });
        Ok(())
    }

    /// Marks whether `nation` has a connected controller. Owner-writable
    /// fields of its tiles follow the controller.
    pub fn set_controlled(&mut self, nation: NationId, controlled: bool, actor: Actor) -> GameResult<()> {
        if !actor.is_server() {
            return Err(GameError::NotController { actor, nation });
        }
        if nation == UNOWNED {
            return Ok(());
        }
        if controlled {
            self.controlled.insert(nation);
        } else {
            self.controlled.remove(&nation);
        }
        let writer = self.owner_writer(nation);
        let cells: Vec<TileId> = self.territory.cells_of(nation).collect();
        for tile in cells {
            if let Some(cell) = self.tiles.get_mut(tile as usize) {
                for field in cell.owner_fields() {
                    field.hand_over(writer);
                }
            }
        }
        Ok(())
    }

    pub fn is_controlled(&self, nation: NationId) -> bool {
        self.controlled.contains(&nation)
    }

    /// Raises a tile's water level. The first time the tile goes under, its
    /// urban, plant and special content is cleared. Returns whether that
    /// happened on this call.
    pub fn flood_tile(&mut self, tile: TileId, water_level: u8, actor: Actor) -> GameResult<bool> {
        if !actor.is_server() {
            return Err(GameError::NotAuthorized {
                actor,
                tile,
                field: TileField::WaterLevel,
            });
        }
        let cell = self.tile_mut(tile)?;
        let was_underwater = cell.state().is_underwater();
        if !cell.water_level.replace(water_level) {
            return Ok(false);
        }
        let cleared = !was_underwater && cell.state().is_underwater();
        if cleared {
            cell.urban.replace(0);
            cell.plant.replace(0);
            cell.special.replace(0);
        }
        self.notify(&TileChange::Flooded {
            tile,
            water_level,
            cleared,
        });
        Ok(cleared)
    }

    /// Replaces every tile at once. Used by map loading, which has already
    /// validated the whole file.
    pub fn restore(&mut self, states: Vec<TileState>, actor: Actor) -> GameResult<()> {
        if !actor.is_server() {
            return Err(GameError::NotController {
                actor,
                nation: UNOWNED,
            });
        }
        self.install(states);
        self.notify(&TileChange::Reloaded {
            tiles: self.tiles.len(),
        });
        Ok(())
    }

    fn install(&mut self, states: Vec<TileState>) {
        self.territory.clear();
        let mut tiles = Vec::with_capacity(states.len());
        for (index, state) in states.into_iter().enumerate() {
            self.territory.claim(index as TileId, state.nation);
            tiles.push(Tile::from_state(state, self.owner_writer(state.nation)));
        }
        self.tiles = tiles;
    }

    fn owner_writer(&self, nation: NationId) -> Actor {
        if nation != UNOWNED && self.controlled.contains(&nation) {
            Actor::Nation(nation)
        } else {
            Actor::Server
        }
    }

    fn tile(&self, tile: TileId) -> GameResult<&Tile> {
        self.tiles
            .get(tile as usize)
            .ok_or(GameError::UnknownTile(tile))
    }

    fn tile_mut(&mut self, tile: TileId) -> GameResult<&mut Tile> {
        self.tiles
            .get_mut(tile as usize)
            .ok_or(GameError::UnknownTile(tile))
    }

    fn notify(&mut self, change: &TileChange) {
        for subscriber in &mut self.subscribers {
            subscriber(change);
        }
    }
}
