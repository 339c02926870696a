use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    session::{Session, SessionEvent},
    snapshot::SnapshotWriter,
    systems::{ClimateSystem, DealSystem, OfferSystem, RoundSystem},
};

pub struct EngineSettings {
    pub scenario_name: String,
    /// Simulated seconds that pass per tick.
    pub tick_seconds: f64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Rounds, then climate, then the offer scan, then deal resolution.
    pub fn with_standard_systems(self) -> Self {
        self.with_system(RoundSystem::new())
            .with_system(ClimateSystem::new())
            .with_system(OfferSystem::new())
            .with_system(DealSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
            tick: 0,
        }
    }
}

/// What one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<SessionEvent>,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
    tick: u64,
}

impl Engine {
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tick(&mut self, session: &mut Session) -> Result<TickReport> {
        self.tick += 1;
        session.begin_tick(self.tick);
        let ctx = SystemContext {
            tick: self.tick,
            dt_seconds: self.settings.tick_seconds,
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            system
                .run(&ctx, session)
                .with_context(|| format!("system {} failed at tick {}", system.name(), ctx.tick))?;
        }
        let snapshot_path = self
            .snapshot_writer
            .maybe_write(session, &self.settings.scenario_name)?;
        let events = session.drain_events();
        debug!(tick = self.tick, events = events.len(), "engine.tick");
        Ok(TickReport {
            tick: self.tick,
            events,
            snapshot_path,
        })
    }

    pub fn run(&mut self, session: &mut Session, ticks: u64) -> Result<()> {
        self.run_with_hook(session, ticks, |_| {})
    }

    pub fn run_with_hook(
        &mut self,
        session: &mut Session,
        ticks: u64,
        mut hook: impl FnMut(TickReport),
    ) -> Result<()> {
        for _ in 0..ticks {
            let report = self.tick(session)?;
            hook(report);
        }
        Ok(())
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub dt_seconds: f64,
    pub scenario_name: &'a str,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, session: &mut Session) -> Result<()>;
}
