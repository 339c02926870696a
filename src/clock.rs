//! World clock: global round mirror and the CO2-driven sea level.

use serde::Serialize;
use tracing::info;

use crate::authority::Actor;
use crate::error::GameResult;
use crate::tiles::{TileId, TileRegistry};

#[derive(Debug, Clone)]
pub struct WorldClock {
    thresholds: Vec<f64>,
    divisor: f64,
    bucket: Option<usize>,
    sea_level: u8,
    global_round: u64,
}

/// Serializable view; an exhausted clock reports bucket `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockStatus {
    pub sea_level: u8,
    pub bucket: i64,
    pub global_round: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FloodReport {
    pub raised: usize,
    pub cleared: usize,
}

impl WorldClock {
    pub fn new(thresholds: Vec<f64>, divisor: f64) -> Self {
        let bucket = (!thresholds.is_empty()).then_some(0);
        Self {
            thresholds,
            divisor: if divisor > 0.0 { divisor } else { 1.0 },
            bucket,
            sea_level: 0,
            global_round: 0,
        }
    }

    pub fn sea_level(&self) -> u8 {
        self.sea_level
    }

    pub fn global_round(&self) -> u64 {
        self.global_round
    }

    pub fn is_exhausted(&self) -> bool {
        self.bucket.is_none()
    }

    pub fn status(&self) -> ClockStatus {
        ClockStatus {
            sea_level: self.sea_level,
            bucket: self.bucket.map_or(-1, |b| b as i64),
            global_round: self.global_round,
        }
    }

    /// Compares the summed CO2 against the current threshold. Crossing it
    /// raises the sea level by exactly one step and moves to the next
    /// threshold; returns the new level when that happens.
    pub fn check(&mut self, total_co2: f64) -> Option<u8> {
        let bucket = self.bucket?;
        let threshold = self.thresholds[bucket] / self.divisor;
        if total_co2 <= threshold {
            return None;
        }
        self.sea_level = self.sea_level.saturating_add(1);
        self.bucket = (bucket + 1 < self.thresholds.len()).then_some(bucket + 1);
        info!(
            sea_level = self.sea_level,
            total_co2,
            threshold,
            exhausted = self.bucket.is_none(),
            "clock.sea_level_raised"
        );
        Some(self.sea_level)
    }

    /// Mirrors the round counter of the nation acting as round source.
    pub fn sync_round(&mut self, round: u64) {
        self.global_round = self.global_round.max(round);
    }
}

/// Raises every tile lying below `sea_level` to that water level, clearing
/// content on tiles that go under for the first time.
pub fn flood_to(tiles: &mut TileRegistry, sea_level: u8) -> GameResult<FloodReport> {
    let targets: Vec<TileId> = tiles
        .states()
        .enumerate()
        .filter(|(_, state)| sea_level > state.elevation && sea_level > state.water_level)
        .map(|(index, _)| index as TileId)
        .collect();
    let mut report = FloodReport::default();
    for tile in targets {
        report.raised += 1;
        if tiles.flood_tile(tile, sea_level, Actor::Server)? {
            report.cleared += 1;
        }
    }
    info!(sea_level, raised = report.raised, cleared = report.cleared, "clock.flooded");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::TerrainType;
    use crate::tiles::TileState;

    #[test]
    fn steps_once_per_check_and_exhausts() {
        let mut clock = WorldClock::new(vec![100.0, 200.0], 2.0);
        assert_eq!(clock.check(50.0), None);
        assert_eq!(clock.check(1_000.0), Some(1));
        assert_eq!(clock.status().bucket, 1);
        assert_eq!(clock.check(1_000.0), Some(2));
        assert!(clock.is_exhausted());
        assert_eq!(clock.status().bucket, -1);
        assert_eq!(clock.check(1e9), None);
        assert_eq!(clock.sea_level(), 2);
    }

    #[test]
    fn falling_co2_never_lowers_the_sea() {
        let mut clock = WorldClock::new(vec![10.0, 20.0, 30.0], 1.0);
        clock.check(15.0);
        clock.check(0.0);
        assert_eq!(clock.sea_level(), 1);
    }

    #[test]
    fn round_mirror_never_goes_back() {
        let mut clock = WorldClock::new(Vec::new(), 1.0);
        clock.sync_round(4);
        clock.sync_round(2);
        assert_eq!(clock.global_round(), 4);
        assert!(clock.is_exhausted());
    }

    #[test]
    fn flooding_only_touches_low_tiles() {
        let mut states = vec![
            TileState::land(TerrainType::Grassland, 1),
            TileState::land(TerrainType::Hills, 4),
            TileState {
                water_level: 3,
                ..TileState::land(TerrainType::Ocean, 0)
            },
        ];
        states[0].urban = 3;
        let mut tiles = TileRegistry::new(3, 1, states);

        let report = flood_to(&mut tiles, 2).unwrap();
        assert_eq!(report, FloodReport { raised: 1, cleared: 1 });
        let low = tiles.get(0).unwrap();
        assert_eq!((low.water_level, low.urban), (2, 0));
        assert_eq!(tiles.get(1).unwrap().water_level, 0);
        assert_eq!(tiles.get(2).unwrap().water_level, 3);
    }
}
