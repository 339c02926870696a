use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    session::Session,
};

pub struct OfferSystem;

impl OfferSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OfferSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for OfferSystem {
    fn name(&self) -> &str {
        "offers"
    }

    fn run(&mut self, _ctx: &SystemContext, session: &mut Session) -> Result<()> {
        session.promote_offers()?;
        Ok(())
    }
}
