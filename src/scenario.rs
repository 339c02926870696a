use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    mapgen,
    research::ResearchItem,
    session::{PlayerId, Session},
    territory::{NationId, MAX_NATIONS},
};

fn default_water_ratio() -> f64 {
    0.3
}

fn default_nations() -> u8 {
    4
}

fn default_round_seconds() -> f64 {
    5.0
}

fn default_co2_thresholds() -> Vec<f64> {
    vec![60.0, 150.0, 300.0, 600.0]
}

fn default_difficulty_divisor() -> f64 {
    1.0
}

fn default_starting_gold() -> f64 {
    500.0
}

fn default_deal_retention_ticks() -> u64 {
    3
}

fn default_deal_timeout_ticks() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    pub map: MapSettings,
    #[serde(default)]
    pub rules: Rules,
    /// Research flags each nation starts with.
    #[serde(default)]
    pub research: BTreeMap<NationId, Vec<ResearchItem>>,
    /// Seat a placeholder player on every nation for headless runs.
    #[serde(default)]
    pub auto_seat: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapSettings {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_water_ratio")]
    pub water_ratio: f64,
    #[serde(default = "default_nations")]
    pub nations: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default = "default_round_seconds")]
    pub round_seconds: f64,
    #[serde(default = "default_co2_thresholds")]
    pub co2_thresholds: Vec<f64>,
    #[serde(default = "default_difficulty_divisor")]
    pub difficulty_divisor: f64,
    #[serde(default = "default_starting_gold")]
    pub starting_gold: f64,
    #[serde(default = "default_deal_retention_ticks")]
    pub deal_retention_ticks: u64,
    /// Ticks a deal may stay unanswered before it expires.
    #[serde(default = "default_deal_timeout_ticks")]
    pub deal_timeout_ticks: u64,
    #[serde(default)]
    pub open_mode: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            round_seconds: default_round_seconds(),
            co2_thresholds: default_co2_thresholds(),
            difficulty_divisor: default_difficulty_divisor(),
            starting_gold: default_starting_gold(),
            deal_retention_ticks: default_deal_retention_ticks(),
            deal_timeout_ticks: default_deal_timeout_ticks(),
            open_mode: false,
        }
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario
            .validate()
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.map.width > 0 && self.map.height > 0,
            "map must have at least one tile"
        );
        ensure!(
            (0.0..1.0).contains(&self.map.water_ratio),
            "water_ratio must be in [0, 1)"
        );
        ensure!(
            self.map.nations <= MAX_NATIONS,
            "at most {MAX_NATIONS} nations are supported"
        );
        ensure!(self.rules.round_seconds > 0.0, "round_seconds must be positive");
        ensure!(
            self.rules.difficulty_divisor > 0.0,
            "difficulty_divisor must be positive"
        );
        ensure!(
            self.rules.deal_timeout_ticks > 0,
            "deal_timeout_ticks must be at least 1"
        );
        Ok(())
    }

    /// Generates the map from the seed and wraps it in a fresh session.
    pub fn build_session(&self) -> Session {
        let states = mapgen::generate(&self.map, self.seed);
        Session::new(
            &self.name,
            self.map.width,
            self.map.height,
            states,
            self.rules.clone(),
            self.research.clone(),
        )
    }

    /// Joins one placeholder player per nation and grants it that nation,
    /// so every ledger advances without peers connected.
    pub fn seat_nations(&self, session: &mut Session) -> Result<Vec<PlayerId>> {
        let mut seated = Vec::with_capacity(self.map.nations as usize);
        for nation in 1..=self.map.nations {
            let player = session.join(&format!("seat-{nation}"));
            session
                .select_nation(player, nation)
                .with_context(|| format!("Failed to seat nation {nation}"))?;
            seated.push(player);
        }
        Ok(seated)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(120)
    }
}
