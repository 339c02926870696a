use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchItem {
    Offshore,
    Water,
    Nuclear,
    Gas,
    GreenCity,
    Solar,
}

#[derive(Debug)]
pub struct ResearchDefinition {
    pub item: ResearchItem,
    pub display: &'static str,
    pub cost: f64,
    pub prerequisites: &'static [ResearchItem],
}

pub const RESEARCH_TREE: &[ResearchDefinition] = &[
    ResearchDefinition {
        item: ResearchItem::Gas,
        display: "Gas Turbines",
        cost: 150.0,
        prerequisites: &[],
    },
    ResearchDefinition {
        item: ResearchItem::Solar,
        display: "Photovoltaics",
        cost: 200.0,
        prerequisites: &[],
    },
    ResearchDefinition {
        item: ResearchItem::Water,
        display: "Hydropower",
        cost: 220.0,
        prerequisites: &[],
    },
    ResearchDefinition {
        item: ResearchItem::Offshore,
        display: "Offshore Foundations",
        cost: 300.0,
        prerequisites: &[ResearchItem::Water],
    },
    ResearchDefinition {
        item: ResearchItem::GreenCity,
        display: "Green Urbanism",
        cost: 350.0,
        prerequisites: &[ResearchItem::Solar],
    },
    ResearchDefinition {
        item: ResearchItem::Nuclear,
        display: "Fission Reactors",
        cost: 500.0,
        prerequisites: &[ResearchItem::Gas],
    },
];

pub fn definition(item: ResearchItem) -> &'static ResearchDefinition {
    RESEARCH_TREE
        .iter()
        .find(|def| def.item == item)
        .unwrap_or(&RESEARCH_TREE[0])
}

/// A nation's unlocked research flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Research {
    unlocked: BTreeSet<ResearchItem>,
}

impl Research {
    pub fn has(&self, item: ResearchItem) -> bool {
        self.unlocked.contains(&item)
    }

    pub fn grant(&mut self, item: ResearchItem) -> bool {
        self.unlocked.insert(item)
    }

    pub fn prerequisites_met(&self, item: ResearchItem) -> bool {
        definition(item)
            .prerequisites
            .iter()
            .all(|dep| self.unlocked.contains(dep))
    }

    /// Items not yet unlocked whose prerequisites are all met.
    pub fn available(&self) -> impl Iterator<Item = &'static ResearchDefinition> + '_ {
        RESEARCH_TREE
            .iter()
            .filter(|def| !self.has(def.item) && self.prerequisites_met(def.item))
    }

    pub fn items(&self) -> impl Iterator<Item = ResearchItem> + '_ {
        self.unlocked.iter().copied()
    }
}
