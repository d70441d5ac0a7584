use std::error::Error;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use cairn_mesh::MesherFlags;
use serde::Deserialize;

/// Pipeline configuration, sampled once at manager construction (no live
/// reload).
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct MeshgenConfig {
    /// Worker pool size; 0 derives it from the machine, leaving one core
    /// for the main thread.
    pub workers: usize,
    /// Upper bound on how long an idle worker waits before re-checking the
    /// queue.
    pub pacing_ms: u64,
    pub smooth_lighting: bool,
    pub water_reflections: bool,
}

impl Default for MeshgenConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            pacing_ms: 50,
            smooth_lighting: true,
            water_reflections: false,
        }
    }
}

impl MeshgenConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    #[inline]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    #[inline]
    pub fn mesher_flags(&self) -> MesherFlags {
        MesherFlags {
            smooth_lighting: self.smooth_lighting,
            water_reflections: self.water_reflections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = MeshgenConfig::default();
        assert!(cfg.effective_workers() >= 1);
        assert!(cfg.smooth_lighting);
        assert!(!cfg.water_reflections);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: MeshgenConfig = toml::from_str("workers = 3\nwater_reflections = true").unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.effective_workers(), 3);
        assert!(cfg.water_reflections);
        assert_eq!(cfg.pacing_ms, 50);
    }
}
