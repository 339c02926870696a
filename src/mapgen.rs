//! Seeded procedural maps for sessions that start without a saved file.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::hex::{HexDirection, TerrainType};
use crate::scenario::MapSettings;
use crate::territory::UNOWNED;
use crate::tiles::TileState;

const MAX_ELEVATION: u8 = 6;

/// Row-major neighbour in an odd-row offset hex grid.
pub fn neighbor(width: u32, height: u32, index: usize, direction: HexDirection) -> Option<usize> {
    let x = (index % width as usize) as i64;
    let y = (index / width as usize) as i64;
    let odd = y % 2 == 1;
    let (dx, dy) = match direction {
        HexDirection::East => (1, 0),
        HexDirection::West => (-1, 0),
        HexDirection::NorthEast => (if odd { 1 } else { 0 }, 1),
        HexDirection::NorthWest => (if odd { 0 } else { -1 }, 1),
        HexDirection::SouthEast => (if odd { 1 } else { 0 }, -1),
        HexDirection::SouthWest => (if odd { 0 } else { -1 }, -1),
    };
    let (nx, ny) = (x + dx, y + dy);
    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
        return None;
    }
    Some((ny * width as i64 + nx) as usize)
}

pub fn generate(settings: &MapSettings, seed: u64) -> Vec<TileState> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (width, height) = (settings.width, settings.height);
    let count = (width * height) as usize;

    let raw: Vec<u8> = (0..count)
        .map(|_| rng.gen_range(0..=MAX_ELEVATION))
        .collect();
    let elevation: Vec<u8> = (0..count)
        .map(|index| {
            let mut sum = raw[index] as u32 * 2;
            let mut weight = 2;
            for direction in HexDirection::ALL {
                if let Some(n) = neighbor(width, height, index, direction) {
                    sum += raw[n] as u32;
                    weight += 1;
                }
            }
            (sum / weight) as u8
        })
        .collect();

    let mut sorted = elevation.clone();
    sorted.sort_unstable();
    let water_tiles = (count as f64 * settings.water_ratio).round() as usize;
    let waterline = if water_tiles == 0 {
        0
    } else {
        sorted[water_tiles.min(count) - 1] + 1
    };

    let mut states: Vec<TileState> = elevation
        .iter()
        .map(|&elev| {
            if elev < waterline {
                TileState {
                    water_level: waterline,
                    ..TileState::land(TerrainType::Ocean, elev)
                }
            } else {
                let terrain = match (elev, rng.gen_range(0..10)) {
                    (e, _) if e >= 4 => TerrainType::Hills,
                    (_, roll) if roll < 3 => TerrainType::Forest,
                    (_, roll) if roll < 4 => TerrainType::Desert,
                    _ => TerrainType::Grassland,
                };
                TileState::land(terrain, elev)
            }
        })
        .collect();

    carve_rivers(&mut states, width, height, &mut rng);
    claim_bands(&mut states, width, settings.nations);
    debug!(width, height, waterline, seed, "mapgen.generated");
    states
}

/// Sends a river downhill from a few high tiles.
fn carve_rivers(states: &mut [TileState], width: u32, height: u32, rng: &mut ChaCha8Rng) {
    let sources = (states.len() / 40).max(1);
    for _ in 0..sources {
        let mut current = rng.gen_range(0..states.len());
        if states[current].is_underwater() || states[current].elevation < 3 {
            continue;
        }
        for _ in 0..states.len() {
            if states[current].outgoing_river.is_some() {
                break;
            }
            let here = states[current].elevation;
            let downhill = HexDirection::ALL
                .into_iter()
                .filter_map(|d| neighbor(width, height, current, d).map(|n| (d, n)))
                .filter(|&(_, n)| states[n].elevation <= here && states[n].incoming_river.is_none())
                .min_by_key(|&(_, n)| states[n].elevation);
            let Some((direction, next)) = downhill else {
                break;
            };
            states[current].outgoing_river = Some(direction);
            states[next].incoming_river = Some(direction.opposite());
            if states[next].is_underwater() {
                break;
            }
            current = next;
        }
    }
}

/// Splits dry land into vertical bands, one per nation, and seeds a village
/// on the first tile of each band.
fn claim_bands(states: &mut [TileState], width: u32, nations: u8) {
    if nations == 0 {
        return;
    }
    let mut seeded = vec![false; nations as usize];
    for (index, state) in states.iter_mut().enumerate() {
        if state.is_underwater() {
            state.nation = UNOWNED;
            continue;
        }
        let column = (index % width as usize) as u32;
        let band = (column * nations as u32 / width) as usize;
        state.nation = band as u8 + 1;
        if !seeded[band] {
            state.urban = 1;
            seeded[band] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MapSettings {
        MapSettings {
            width: 12,
            height: 8,
            water_ratio: 0.25,
            nations: 3,
        }
    }

    #[test]
    fn same_seed_same_map() {
        assert_eq!(generate(&settings(), 9), generate(&settings(), 9));
        assert_ne!(generate(&settings(), 9), generate(&settings(), 10));
    }

    #[test]
    fn water_tiles_are_unowned_and_land_is_banded() {
        let states = generate(&settings(), 4);
        assert_eq!(states.len(), 96);
        for (index, state) in states.iter().enumerate() {
            if state.is_underwater() {
                assert_eq!(state.nation, UNOWNED);
            } else {
                let column = index % 12;
                assert_eq!(state.nation as usize, column * 3 / 12 + 1);
            }
        }
        assert!(states.iter().any(|s| s.is_underwater()));
    }

    #[test]
    fn neighbors_respect_edges() {
        assert_eq!(neighbor(4, 4, 0, HexDirection::West), None);
        assert_eq!(neighbor(4, 4, 0, HexDirection::East), Some(1));
        assert_eq!(neighbor(4, 4, 0, HexDirection::NorthEast), Some(4));
        assert_eq!(neighbor(4, 4, 4, HexDirection::NorthEast), Some(9));
        assert_eq!(neighbor(4, 4, 0, HexDirection::SouthEast), None);
    }
}
