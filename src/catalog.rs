//! Improvement catalog: resolution rule and balancing table.

use serde::{Deserialize, Serialize};

/// The single building or feature a tile resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Improvement {
    None,
    Village,
    City,
    GreenCity,
    Farm,
    Forest,
    ForestVillage,
    WindPark,
    OffshoreWindPark,
    SolarPark,
    CoalPlant,
    GasPlant,
    NuclearPlant,
    HydroPlant,
    Mine,
    Port,
}

/// Highest special-feature index with a catalog entry.
pub const MAX_SPECIAL: u8 = 11;
pub const MAX_URBAN: u8 = 3;
pub const MAX_PLANT: u8 = 5;

/// Resolves a tile's improvement. A non-zero special index always wins; only
/// then does the urban level pick between nothing, a village or a city.
pub fn resolve_improvement(special: u8, urban: u8, plant: u8) -> Improvement {
    match special {
        0 => match urban {
            0 => Improvement::None,
            1 | 2 => Improvement::Village,
            _ if plant == 3 => Improvement::GreenCity,
            _ => Improvement::City,
        },
        1 => Improvement::Farm,
        2 if urban == 1 => Improvement::ForestVillage,
        2 => Improvement::Forest,
        3 => Improvement::WindPark,
        4 => Improvement::OffshoreWindPark,
        5 => Improvement::SolarPark,
        6 => Improvement::CoalPlant,
        7 => Improvement::GasPlant,
        8 => Improvement::NuclearPlant,
        9 => Improvement::HydroPlant,
        10 => Improvement::Mine,
        11 => Improvement::Port,
        _ => Improvement::None,
    }
}

/// Per-output slots of an effectiveness mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Gold = 0,
    Food = 1,
    Energy = 2,
    Co2 = 3,
}

/// Balancing numbers for one improvement. Positive outputs are production,
/// negative outputs are consumption; `build_cost` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub build_cost: f64,
    pub food: f64,
    pub energy: f64,
    pub gold: f64,
    pub co2: f64,
    /// Indexed `[Desert, Grassland, Ocean, Hills, Forest, Underwater]`.
    pub effectiveness: [f64; 6],
}

/// `[Gold, Food, Energy, CO2]`; 1 means that output is scaled by the tile's
/// terrain effectiveness.
pub type EffectivenessMask = [u8; 4];

struct CatalogEntry {
    improvement: Improvement,
    stats: Stats,
    mask: EffectivenessMask,
}

const URBAN_LAND: [f64; 6] = [0.6, 1.0, 0.0, 0.8, 0.7, 0.0];

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        improvement: Improvement::None,
        stats: Stats {
            build_cost: 0.0,
            food: 0.0,
            energy: 0.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [1.0; 6],
        },
        mask: [0, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::Village,
        stats: Stats {
            build_cost: -50.0,
            food: -2.0,
            energy: -1.0,
            gold: 5.0,
            co2: 0.5,
            effectiveness: URBAN_LAND,
        },
        mask: [1, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::City,
        stats: Stats {
            build_cost: -200.0,
            food: -8.0,
            energy: -6.0,
            gold: 25.0,
            co2: 3.0,
            effectiveness: [0.7, 1.0, 0.0, 0.9, 0.6, 0.0],
        },
        mask: [1, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::GreenCity,
        stats: Stats {
            build_cost: -350.0,
            food: -6.0,
            energy: -3.0,
            gold: 22.0,
            co2: 1.0,
            effectiveness: [0.7, 1.0, 0.0, 0.9, 0.6, 0.0],
        },
        mask: [1, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::Farm,
        stats: Stats {
            build_cost: -40.0,
            food: 10.0,
            energy: -1.0,
            gold: 0.0,
            co2: 0.5,
            effectiveness: [0.2, 1.0, 0.0, 0.6, 0.3, 0.0],
        },
        mask: [0, 1, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::Forest,
        stats: Stats {
            build_cost: -20.0,
            food: 1.0,
            energy: 0.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [0.2, 1.0, 0.0, 0.8, 1.0, 0.0],
        },
        mask: [0, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::ForestVillage,
        stats: Stats {
            build_cost: -60.0,
            food: -1.0,
            energy: -1.0,
            gold: 4.0,
            co2: 0.3,
            effectiveness: [0.2, 0.9, 0.0, 0.7, 1.0, 0.0],
        },
        mask: [1, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::WindPark,
        stats: Stats {
            build_cost: -120.0,
            food: 0.0,
            energy: 8.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [0.8, 0.9, 0.0, 1.0, 0.5, 0.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::OffshoreWindPark,
        stats: Stats {
            build_cost: -180.0,
            food: 0.0,
            energy: 11.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [0.6, 0.6, 0.0, 0.7, 0.4, 1.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::SolarPark,
        stats: Stats {
            build_cost: -150.0,
            food: 0.0,
            energy: 6.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [1.0, 0.7, 0.0, 0.8, 0.3, 0.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::CoalPlant,
        stats: Stats {
            build_cost: -100.0,
            food: 0.0,
            energy: 15.0,
            gold: 0.0,
            co2: 6.0,
            effectiveness: [1.0, 1.0, 0.0, 1.0, 1.0, 0.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::GasPlant,
        stats: Stats {
            build_cost: -140.0,
            food: 0.0,
            energy: 12.0,
            gold: 0.0,
            co2: 4.0,
            effectiveness: [1.0, 1.0, 0.0, 1.0, 1.0, 0.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::NuclearPlant,
        stats: Stats {
            build_cost: -400.0,
            food: 0.0,
            energy: 30.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [1.0, 1.0, 0.0, 1.0, 1.0, 0.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::HydroPlant,
        stats: Stats {
            build_cost: -250.0,
            food: 0.0,
            energy: 18.0,
            gold: 0.0,
            co2: 0.0,
            effectiveness: [0.3, 1.0, 0.0, 1.0, 0.8, 0.0],
        },
        mask: [0, 0, 1, 0],
    },
    CatalogEntry {
        improvement: Improvement::Mine,
        stats: Stats {
            build_cost: -80.0,
            food: 0.0,
            energy: -2.0,
            gold: 12.0,
            co2: 1.0,
            effectiveness: [0.8, 0.5, 0.0, 1.0, 0.4, 0.0],
        },
        mask: [0, 0, 0, 0],
    },
    CatalogEntry {
        improvement: Improvement::Port,
        stats: Stats {
            build_cost: -90.0,
            food: 3.0,
            energy: -1.0,
            gold: 6.0,
            co2: 0.5,
            effectiveness: [0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        },
        mask: [1, 1, 0, 0],
    },
];

/// Looks up the balancing stats and effectiveness mask for `improvement`.
pub fn stats_for(improvement: Improvement) -> (Stats, EffectivenessMask) {
    CATALOG
        .iter()
        .find(|entry| entry.improvement == improvement)
        .map(|entry| (entry.stats, entry.mask))
        .unwrap_or((CATALOG[0].stats, CATALOG[0].mask))
}

/// Builds the per-output multiplier for a tile with the given terrain
/// effectiveness: unmasked outputs are applied at 1.0.
pub fn output_multipliers(mask: EffectivenessMask, tile_effectiveness: f64) -> [f64; 4] {
    mask.map(|bit| if bit == 0 { 1.0 } else { tile_effectiveness })
}
