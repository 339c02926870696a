//! Binary map format.
//!
//! A little-endian `i32` version header (only `0` is known) followed by ten
//! bytes per tile in row-major order: terrain, elevation, water level, urban,
//! plant, special, owning nation, incoming river, outgoing river, roads.

use bytes::{Buf, BufMut, BytesMut};
use tracing::{info, warn};

use crate::catalog::{MAX_PLANT, MAX_SPECIAL, MAX_URBAN};
use crate::error::{GameError, GameResult};
use crate::hex::{decode_river, encode_river, RoadMask, TerrainType};
use crate::tiles::{TileId, TileRegistry, TileState};

pub const FORMAT_VERSION: i32 = 0;
pub const HEADER_BYTES: usize = 4;
pub const TILE_BYTES: usize = 10;

pub fn save(tiles: &TileRegistry) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_BYTES + tiles.len() * TILE_BYTES);
    buf.put_i32_le(FORMAT_VERSION);
    for state in tiles.states() {
        encode_tile(&mut buf, &state);
    }
    buf.to_vec()
}

fn encode_tile(buf: &mut BytesMut, state: &TileState) {
    buf.put_u8(state.terrain.index() as u8);
    buf.put_u8(state.elevation);
    buf.put_u8(state.water_level);
    buf.put_u8(state.urban);
    buf.put_u8(state.plant);
    buf.put_u8(state.special);
    buf.put_u8(state.nation);
    buf.put_u8(encode_river(state.incoming_river));
    buf.put_u8(encode_river(state.outgoing_river));
    buf.put_u8(state.roads.bits());
}

/// Parses a whole map file. Nothing is returned unless every tile decodes,
/// so a failed load never leaves a registry half-written.
pub fn load(data: &[u8], expected_tiles: usize) -> GameResult<Vec<TileState>> {
    let mut buf = data;
    if buf.remaining() < HEADER_BYTES {
        return Err(GameError::TruncatedMap {
            expected: HEADER_BYTES,
            found: buf.remaining(),
        });
    }
    let version = buf.get_i32_le();
    if version != FORMAT_VERSION {
        warn!(version, "map.unknown_version");
        return Err(GameError::UnknownFormatVersion(version));
    }
    let expected = expected_tiles * TILE_BYTES;
    if buf.remaining() < expected {
        return Err(GameError::TruncatedMap {
            expected: HEADER_BYTES + expected,
            found: data.len(),
        });
    }

    let mut states = Vec::with_capacity(expected_tiles);
    for index in 0..expected_tiles {
        states.push(decode_tile(&mut buf, index as TileId)?);
    }
    info!(tiles = states.len(), "map.decoded");
    Ok(states)
}

fn decode_tile(buf: &mut &[u8], tile: TileId) -> GameResult<TileState> {
    let invalid = |what: &'static str, value: u8| GameError::InvalidMapByte { tile, what, value };
    let bounded = |what: &'static str, value: u8, max: u8| {
        if value <= max {
            Ok(value)
        } else {
            Err(invalid(what, value))
        }
    };

    let terrain = buf.get_u8();
    let terrain = TerrainType::from_index(terrain).ok_or_else(|| invalid("terrain", terrain))?;
    let elevation = buf.get_u8();
    let water_level = buf.get_u8();
    let urban = bounded("urban", buf.get_u8(), MAX_URBAN)?;
    let plant = bounded("plant", buf.get_u8(), MAX_PLANT)?;
    let special = bounded("special", buf.get_u8(), MAX_SPECIAL)?;
    let nation = buf.get_u8();
    let incoming = buf.get_u8();
    let incoming_river = decode_river(incoming).ok_or_else(|| invalid("incoming river", incoming))?;
    let outgoing = buf.get_u8();
    let outgoing_river = decode_river(outgoing).ok_or_else(|| invalid("outgoing river", outgoing))?;
    let roads = buf.get_u8();
    let roads = RoadMask::from_bits(roads).ok_or_else(|| invalid("roads", roads))?;

    Ok(TileState {
        terrain,
        elevation,
        water_level,
        urban,
        plant,
        special,
        nation,
        incoming_river,
        outgoing_river,
        roads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::HexDirection;

    fn sample() -> TileState {
        TileState {
            terrain: TerrainType::Ocean,
            elevation: 5,
            water_level: 1,
            urban: 3,
            plant: 0,
            special: 0,
            nation: 4,
            incoming_river: None,
            outgoing_river: Some(HexDirection::SouthEast),
            roads: RoadMask::EMPTY
                .with(HexDirection::NorthEast)
                .with(HexDirection::SouthWest),
        }
    }

    #[test]
    fn tile_encodes_to_the_exact_bytes() {
        let tiles = TileRegistry::new(1, 1, vec![sample()]);
        let bytes = save(&tiles);
        assert_eq!(bytes, vec![0, 0, 0, 0, 2, 5, 1, 3, 0, 0, 4, 0, 130, 0b1001]);

        let loaded = load(&bytes, 1).unwrap();
        assert_eq!(loaded, vec![sample()]);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = save(&TileRegistry::new(1, 1, vec![sample()]));
        bytes[0] = 1;
        assert_eq!(load(&bytes, 1), Err(GameError::UnknownFormatVersion(1)));
    }

    #[test]
    fn short_files_are_rejected() {
        let bytes = save(&TileRegistry::new(1, 1, vec![sample()]));
        assert!(matches!(load(&bytes, 2), Err(GameError::TruncatedMap { .. })));
        assert!(matches!(load(&bytes[..2], 1), Err(GameError::TruncatedMap { .. })));
    }

    #[test]
    fn bad_bytes_name_the_tile() {
        let mut bytes = save(&TileRegistry::new(2, 1, vec![sample(), sample()]));
        bytes[HEADER_BYTES + TILE_BYTES + 7] = 12;
        assert_eq!(
            load(&bytes, 2),
            Err(GameError::InvalidMapByte {
                tile: 1,
                what: "incoming river",
                value: 12
            })
        );
    }
}
