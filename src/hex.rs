//! Hex-cell vocabulary shared by the tile registry and the map codec.

use serde::{Deserialize, Serialize};

/// Terrain types, in the order used by terrain-effectiveness tables and the
/// persisted map format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainType {
    Desert = 0,
    Grassland = 1,
    Ocean = 2,
    Hills = 3,
    Forest = 4,
}

/// Effectiveness slot used for any tile whose water level exceeds its
/// elevation, regardless of terrain.
pub const UNDERWATER_SLOT: usize = 5;

impl TerrainType {
    pub const ALL: [TerrainType; 5] = [
        TerrainType::Desert,
        TerrainType::Grassland,
        TerrainType::Ocean,
        TerrainType::Hills,
        TerrainType::Forest,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HexDirection {
    NorthEast = 0,
    East = 1,
    SouthEast = 2,
    SouthWest = 3,
    West = 4,
    NorthWest = 5,
}

impl HexDirection {
    pub const ALL: [HexDirection; 6] = [
        HexDirection::NorthEast,
        HexDirection::East,
        HexDirection::SouthEast,
        HexDirection::SouthWest,
        HexDirection::West,
        HexDirection::NorthWest,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn opposite(self) -> Self {
        Self::ALL[(self.index() as usize + 3) % 6]
    }
}

const RIVER_FLAG: u8 = 128;

/// Encodes a river direction as `0` for none or `128 + direction`.
pub fn encode_river(direction: Option<HexDirection>) -> u8 {
    direction.map_or(0, |d| RIVER_FLAG + d.index())
}

/// Inverse of [`encode_river`]; `None` for bytes outside the encoding.
pub fn decode_river(byte: u8) -> Option<Option<HexDirection>> {
    match byte {
        0 => Some(None),
        b if b >= RIVER_FLAG => HexDirection::from_index(b - RIVER_FLAG).map(Some),
        _ => None,
    }
}

/// Bit `i` set means a road crosses edge direction `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadMask(u8);

impl RoadMask {
    pub const EMPTY: RoadMask = RoadMask(0);

    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !0b0011_1111 == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has(self, direction: HexDirection) -> bool {
        self.0 & (1 << direction.index()) != 0
    }

    pub fn with(self, direction: HexDirection) -> Self {
        Self(self.0 | (1 << direction.index()))
    }
}
