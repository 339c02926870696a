pub mod authority;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod hex;
pub mod ledger;
pub mod map_file;
pub mod mapgen;
pub mod placement;
pub mod replica;
pub mod research;
pub mod scenario;
pub mod session;
pub mod snapshot;
pub mod systems;
pub mod territory;
pub mod tiles;
pub mod trade;
pub mod web;

pub use engine::{Engine, EngineBuilder, EngineSettings, TickReport};
pub use error::{GameError, GameResult};
pub use scenario::{Scenario, ScenarioLoader};
pub use session::{Session, SessionEvent};
