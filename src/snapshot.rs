use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::session::{Session, SessionSnapshot};

#[derive(Debug, Serialize)]
struct SnapshotFile<'a> {
    tick: u64,
    written_at: DateTime<Utc>,
    scenario: &'a str,
    state: SessionSnapshot,
}

/// Writes `<dir>/<scenario>/tick_NNNNNN.json` every `interval_ticks`.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_ticks: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_ticks: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_ticks,
        }
    }

    pub fn should_write(&self, tick: u64) -> bool {
        self.interval_ticks != 0 && tick != 0 && tick % self.interval_ticks == 0
    }

    pub fn maybe_write(&self, session: &Session, scenario_name: &str) -> Result<Option<PathBuf>> {
        let tick = session.tick();
        if !self.should_write(tick) {
            return Ok(None);
        }
        self.write(session, scenario_name).map(Some)
    }

    pub fn write(&self, session: &Session, scenario_name: &str) -> Result<PathBuf> {
        let tick = session.tick();
        let dir = self.output_dir.join(scenario_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{tick:06}.json"));
        let file = SnapshotFile {
            tick,
            written_at: Utc::now(),
            scenario: scenario_name,
            state: session.snapshot(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        debug!(tick, path = %path.display(), "snapshot.written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_zero_disables_snapshots() {
        let writer = SnapshotWriter::new("unused", 0);
        assert!(!writer.should_write(10));
        let writer = SnapshotWriter::new("unused", 5);
        assert!(!writer.should_write(0));
        assert!(!writer.should_write(4));
        assert!(writer.should_write(10));
    }
}
