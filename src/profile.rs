use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::difficulty::ComplexityLevel;

// ─────────────────────────────────────────────────────────────────────────
// Session profile store: the resume level is the only value that outlives a
// session. Reads never fail — anything missing or malformed becomes the
// baseline level.
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedProfile {
    resume_level: ComplexityLevel,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: Option<PathBuf>,
    cached: ComplexityLevel,
}

impl ProfileStore {
    /// Store backed by a JSON file at `path` (conventionally
    /// `<data_dir>/fluxgate/profile.json`).
    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            cached: ComplexityLevel::Baseline,
        }
    }

    /// Volatile store for tests and embedded hosts.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cached: ComplexityLevel::Baseline,
        }
    }

    pub fn load(&self) -> ComplexityLevel {
        let Some(path) = &self.path else {
            return self.cached;
        };
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<PersistedProfile>(&s).ok())
            .map(|p| p.resume_level)
            .unwrap_or(ComplexityLevel::Baseline)
    }

    pub fn save(&mut self, level: ComplexityLevel) -> io::Result<()> {
        self.cached = level;
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let profile = PersistedProfile {
            resume_level: level,
        };
        let json = serde_json::to_vec_pretty(&profile).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("fluxgate-test-{nonce}-{name}.json"))
    }

    #[test]
    fn missing_file_defaults_to_baseline() {
        let store = ProfileStore::at(scratch_path("missing"));
        assert_eq!(store.load(), ComplexityLevel::Baseline);
    }

    #[test]
    fn malformed_file_defaults_to_baseline() {
        let path = scratch_path("garbled");
        fs::write(&path, b"not json at all").unwrap();
        let store = ProfileStore::at(path.clone());
        assert_eq!(store.load(), ComplexityLevel::Baseline);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn round_trips_the_resume_level() {
        let path = scratch_path("roundtrip");
        let mut store = ProfileStore::at(path.clone());
        store.save(ComplexityLevel::JitterIntro).unwrap();
        assert_eq!(store.load(), ComplexityLevel::JitterIntro);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn in_memory_round_trip() {
        let mut store = ProfileStore::in_memory();
        assert_eq!(store.load(), ComplexityLevel::Baseline);
        store.save(ComplexityLevel::SpeedUp).unwrap();
        assert_eq!(store.load(), ComplexityLevel::SpeedUp);
    }
}
