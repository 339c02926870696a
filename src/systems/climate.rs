use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    session::Session,
};

/// Raises the sea when the summed CO2 crosses the next threshold.
pub struct ClimateSystem;

impl ClimateSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClimateSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ClimateSystem {
    fn name(&self) -> &str {
        "climate"
    }

    fn run(&mut self, _ctx: &SystemContext, session: &mut Session) -> Result<()> {
        session.update_climate()?;
        Ok(())
    }
}
