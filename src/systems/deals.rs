use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    session::Session,
};

/// Peer-side deal handling and expiry of processed deals.
pub struct DealSystem;

impl DealSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DealSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DealSystem {
    fn name(&self) -> &str {
        "deals"
    }

    fn run(&mut self, _ctx: &SystemContext, session: &mut Session) -> Result<()> {
        session.resolve_deals()?;
        Ok(())
    }
}
