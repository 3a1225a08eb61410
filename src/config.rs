use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AcquireError, Result};

// ---------------------------------------------------------------------------
// Depth sampling grid
// ---------------------------------------------------------------------------

/// Canonical depth sampling: multiples of `step`, no deeper than `max_depth`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthGrid {
    pub step: f64,
    pub max_depth: f64,
}

impl Default for DepthGrid {
    fn default() -> Self {
        Self {
            step: 0.5,
            max_depth: 70.0,
        }
    }
}

impl DepthGrid {
    /// Whether `depth` lies on the grid.
    pub fn contains(&self, depth: f64) -> bool {
        depth % self.step == 0.0 && depth <= self.max_depth
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) {
            return Err(AcquireError::Config(format!(
                "grid step must be positive, got {}",
                self.step
            )));
        }
        if !(self.max_depth > 0.0) {
            return Err(AcquireError::Config(format!(
                "grid max_depth must be positive, got {}",
                self.max_depth
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FTP login
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpLogin {
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl Default for FtpLogin {
    fn default() -> Self {
        Self {
            user: "anonymous".to_string(),
            password: "anonymous@".to_string(),
            port: 21,
        }
    }
}

// ---------------------------------------------------------------------------
// AcquireConfig
// ---------------------------------------------------------------------------

/// Settings shared by every acquisition.
///
/// Relative local paths resolve against `base_dir`; the process working
/// directory is never changed.
///
/// ```json
/// {
///   "base_dir": "/data/tutorials",
///   "grid": { "step": 0.5, "max_depth": 70.0 },
///   "ftp": { "user": "anonymous", "password": "anonymous@", "port": 21 },
///   "http_timeout_secs": 60
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub base_dir: PathBuf,
    pub grid: DepthGrid,
    pub ftp: FtpLogin,
    /// No timeout when absent.
    pub http_timeout_secs: Option<u64>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            grid: DepthGrid::default(),
            ftp: FtpLogin::default(),
            http_timeout_secs: None,
        }
    }
}

impl AcquireConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AcquireConfig = serde_json::from_str(&text)
            .map_err(|e| AcquireError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()
    }

    /// Resolve a local path against `base_dir` unless it is already absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_membership() {
        let grid = DepthGrid::default();
        assert!(grid.contains(0.0));
        assert!(grid.contains(0.5));
        assert!(grid.contains(70.0));
        assert!(!grid.contains(1.3));
        assert!(!grid.contains(70.5));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: AcquireConfig =
            serde_json::from_str(r#"{ "base_dir": "/tmp/work", "http_timeout_secs": 5 }"#)
                .unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/tmp/work"));
        assert_eq!(config.grid, DepthGrid::default());
        assert_eq!(config.ftp.user, "anonymous");
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn rejects_non_positive_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "grid": { "step": 0.0, "max_depth": 70.0 } }"#).unwrap();

        let err = AcquireConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, AcquireError::Config(_)));
    }

    #[test]
    fn resolves_relative_paths_against_base_dir() {
        let config = AcquireConfig::default().with_base_dir("/srv/ocean");
        assert_eq!(
            config.resolve(Path::new("data/raw/x.parquet")),
            PathBuf::from("/srv/ocean/data/raw/x.parquet")
        );
        assert_eq!(
            config.resolve(Path::new("/abs/x.csv")),
            PathBuf::from("/abs/x.csv")
        );
    }
}
