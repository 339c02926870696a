//! Build gate: validates and applies a nation's improvement placement.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::authority::Actor;
use crate::catalog::{self, Improvement, Stats, MAX_PLANT, MAX_SPECIAL, MAX_URBAN};
use crate::error::{GameError, GameResult, PlacementError};
use crate::ledger::NationLedger;
use crate::research::{Research, ResearchItem};
use crate::tiles::{TileField, TileId, TileRegistry, TileState};

/// Target levels for one tile. The improvement placed is whatever these
/// resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub tile: TileId,
    #[serde(default)]
    pub urban: u8,
    #[serde(default)]
    pub plant: u8,
    #[serde(default)]
    pub special: u8,
}

impl BuildRequest {
    pub fn improvement(&self) -> Improvement {
        catalog::resolve_improvement(self.special, self.urban, self.plant)
    }
}

/// Runs the gate steps in order and stops at the first failure.
pub fn validate(
    ledger: &NationLedger,
    tile: &TileState,
    target: Improvement,
) -> Result<Stats, PlacementError> {
    if ledger.nation() == 0 {
        return Err(PlacementError::NoNation);
    }
    if tile.improvement() == target {
        return Err(PlacementError::SameImprovement(target));
    }
    let (stats, _) = catalog::stats_for(target);
    if stats.effectiveness[tile.effectiveness_index()] == 0.0 {
        return Err(PlacementError::ZeroEffectiveness(target));
    }
    if ledger.gold() < -stats.build_cost {
        return Err(PlacementError::InsufficientGold {
            cost: -stats.build_cost,
            available: ledger.gold(),
        });
    }
    check_prerequisites(ledger.research(), tile, target)?;
    Ok(stats)
}

fn check_prerequisites(
    research: &Research,
    tile: &TileState,
    target: Improvement,
) -> Result<(), PlacementError> {
    let require = |item: ResearchItem, requirement: &'static str| {
        if research.has(item) {
            Ok(())
        } else {
            Err(PlacementError::Prerequisite {
                improvement: target,
                requirement,
            })
        }
    };
    match target {
        Improvement::WindPark | Improvement::OffshoreWindPark => {
            if !tile.is_underwater() {
                return Ok(());
            }
            if tile.water_level - tile.elevation != 1 {
                return Err(PlacementError::Prerequisite {
                    improvement: target,
                    requirement: "land or water exactly one level deep",
                });
            }
            require(ResearchItem::Offshore, "offshore research")
        }
        Improvement::HydroPlant => {
            if !tile.has_river() {
                return Err(PlacementError::Prerequisite {
                    improvement: target,
                    requirement: "a river",
                });
            }
            require(ResearchItem::Water, "water research")
        }
        Improvement::NuclearPlant => require(ResearchItem::Nuclear, "nuclear research"),
        Improvement::GasPlant => require(ResearchItem::Gas, "gas research"),
        Improvement::GreenCity => require(ResearchItem::GreenCity, "green city research"),
        Improvement::SolarPark => require(ResearchItem::Solar, "solar research"),
        _ => Ok(()),
    }
}

/// Validates and applies a placement for `ledger`'s nation. On any failure
/// neither the tile nor the nation's gold changes.
pub fn build(
    tiles: &mut TileRegistry,
    ledger: &mut NationLedger,
    request: BuildRequest,
) -> GameResult<Improvement> {
    let actor = Actor::Nation(ledger.nation());
    let tile = tiles.get(request.tile)?;
    for field in [TileField::Urban, TileField::Plant, TileField::Special] {
        if tiles.writer_of(request.tile, field)? != actor {
            return Err(GameError::NotAuthorized {
                actor,
                tile: request.tile,
                field,
            });
        }
    }

    check_levels(request)?;
    let target = request.improvement();
    let stats = validate(ledger, &tile, target)?;
    write_levels(tiles, request, actor)?;
    ledger.adjust_gold(stats.build_cost);
    debug!(
        nation = ledger.nation(),
        tile = request.tile,
        improvement = ?target,
        cost = -stats.build_cost,
        "placement.built"
    );
    Ok(target)
}

/// Applies the levels without running the gate. Only the server may do
/// this, and only in open mode.
pub fn edit(tiles: &mut TileRegistry, request: BuildRequest) -> GameResult<Improvement> {
    write_levels(tiles, request, Actor::Server)?;
    Ok(request.improvement())
}

fn write_levels(tiles: &mut TileRegistry, request: BuildRequest, actor: Actor) -> GameResult<()> {
    check_levels(request)?;
    tiles.set_field(request.tile, TileField::Special, request.special, actor)?;
    tiles.set_field(request.tile, TileField::Urban, request.urban, actor)?;
    tiles.set_field(request.tile, TileField::Plant, request.plant, actor)?;
    Ok(())
}

fn check_levels(request: BuildRequest) -> GameResult<()> {
    for (field, value, max) in [
        (TileField::Urban, request.urban, MAX_URBAN),
        (TileField::Plant, request.plant, MAX_PLANT),
        (TileField::Special, request.special, MAX_SPECIAL),
    ] {
        if value > max {
            return Err(GameError::InvalidFieldValue { field, value });
        }
    }
    Ok(())
}
