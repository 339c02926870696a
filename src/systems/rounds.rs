use anyhow::Result;
use tracing::trace;

use crate::{
    engine::{System, SystemContext},
    session::Session,
};

/// Advances every controlled nation's ledger by the tick's elapsed time.
pub struct RoundSystem;

impl RoundSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RoundSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RoundSystem {
    fn name(&self) -> &str {
        "rounds"
    }

    fn run(&mut self, ctx: &SystemContext, session: &mut Session) -> Result<()> {
        let applied = session.advance_rounds(ctx.dt_seconds)?;
        trace!(tick = ctx.tick, rounds = applied.len(), "rounds.applied");
        Ok(())
    }
}
