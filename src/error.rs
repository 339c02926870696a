use thiserror::Error;

use crate::authority::Actor;
use crate::catalog::Improvement;
use crate::research::ResearchItem;
use crate::session::PlayerId;
use crate::territory::NationId;
use crate::tiles::{TileField, TileId};
use crate::trade::DealId;

/// Reasons the build gate rejects a placement. Variants follow the order in
/// which the gate evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlacementError {
    #[error("acting nation is unassigned")]
    NoNation,
    #[error("tile already hosts {0:?}")]
    SameImprovement(Improvement),
    #[error("{0:?} has zero effectiveness on this tile")]
    ZeroEffectiveness(Improvement),
    #[error("placement costs {cost} gold but only {available} is available")]
    InsufficientGold { cost: f64, available: f64 },
    #[error("{improvement:?} requires {requirement}")]
    Prerequisite {
        improvement: Improvement,
        requirement: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("{actor} may not write {field:?} on tile {tile}")]
    NotAuthorized {
        actor: Actor,
        tile: TileId,
        field: TileField,
    },
    #[error("{field:?} on tile {tile} changes only through a build")]
    BuildRequired { tile: TileId, field: TileField },
    #[error("water on tile {tile} cannot drop from {current} to {requested}")]
    WaterRecession {
        tile: TileId,
        current: u8,
        requested: u8,
    },
    #[error("{0} may only replace the map as the server in open mode")]
    OpenModeRequired(Actor),
    #[error("{actor} may not act for nation {nation}")]
    NotController { actor: Actor, nation: NationId },
    #[error("invalid placement: {0}")]
    InvalidPlacement(#[from] PlacementError),
    #[error("unknown map format version {0}")]
    UnknownFormatVersion(i32),
    #[error("map data truncated: expected {expected} bytes, found {found}")]
    TruncatedMap { expected: usize, found: usize },
    #[error("invalid map byte {value} for {what} at tile {tile}")]
    InvalidMapByte {
        tile: TileId,
        what: &'static str,
        value: u8,
    },
    #[error("nation {0} has no connected controller")]
    TargetUnavailable(NationId),
    #[error("previous offer from player {0} has not been processed yet")]
    DuplicateSubmission(PlayerId),
    #[error("nation {0} cannot trade with itself")]
    SelfTrade(NationId),
    #[error("tile {tile} belongs to nation {actual}, not {expected}")]
    StaleOwner {
        tile: TileId,
        expected: NationId,
        actual: NationId,
    },
    #[error("unknown tile {0}")]
    UnknownTile(TileId),
    #[error("unknown nation {0}")]
    UnknownNation(NationId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("unknown deal {0}")]
    UnknownDeal(DealId),
    #[error("nation {0} is already taken")]
    NationTaken(NationId),
    #[error("value {value} is out of range for {field:?}")]
    InvalidFieldValue { field: TileField, value: u8 },
    #[error("research {0:?} is locked behind its prerequisites")]
    ResearchLocked(ResearchItem),
    #[error("{0:?} needs {1} gold")]
    InsufficientGold(ResearchItem, f64),
}

pub type GameResult<T> = Result<T, GameError>;
