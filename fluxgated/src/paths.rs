//! Cross-platform application paths

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("could not determine data directory")]
    NoDataDir,
    #[error("failed to create data directory: {0}")]
    Create(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, PathsError> {
        let base = dirs::data_dir().ok_or(PathsError::NoDataDir)?;
        let data_dir = base.join("fluxgate");

        // Ensure directory exists
        fs::create_dir_all(&data_dir)?;

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn profile_file(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }
}
