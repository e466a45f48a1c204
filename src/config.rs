use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::RenderParams;

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_PREFETCH_RADIUS: usize = 10;
pub const DEFAULT_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_SCALE: f32 = 0.9;
pub const DEFAULT_WIDTH: u32 = 800;

const MIN_SCALE: f32 = 0.1;
const CONFIG_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagecache";

/// Tuning knobs for a cache session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_prefetch_radius")]
    pub prefetch_radius: usize,

    /// LRU capacity in pages, 0 disables eviction
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Width used until the first viewport measurement arrives
    #[serde(default = "default_width")]
    pub initial_width: u32,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_prefetch_radius() -> usize {
    DEFAULT_PREFETCH_RADIUS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_scale() -> f32 {
    DEFAULT_SCALE
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            prefetch_radius: DEFAULT_PREFETCH_RADIUS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            scale: DEFAULT_SCALE,
            initial_width: DEFAULT_WIDTH,
        }
    }
}

impl CacheConfig {
    /// `$XDG_CONFIG_HOME/pagecache/config.yaml` or the platform equivalent
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config| config.join(APP_NAME).join(CONFIG_FILENAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded cache config from {path:?}");
        Ok(config.normalized())
    }

    /// Load from `path` (or the default location), falling back to defaults
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}, using default cache config");
                Self::default()
            }
        }
    }

    /// Clamp values into their working ranges. A bounded cache is raised
    /// to hold the whole prefetch window around the displayed page.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.scale = self.scale.max(MIN_SCALE);

        let window = self.prefetch_window();
        if self.cache_capacity > 0 && self.cache_capacity < window {
            warn!(
                "cache_capacity {} cannot hold a prefetch radius of {}, raising it to {window}",
                self.cache_capacity, self.prefetch_radius
            );
            self.cache_capacity = window;
        }
        self
    }

    /// Displayed page plus `prefetch_radius` pages on each side
    #[must_use]
    pub fn prefetch_window(&self) -> usize {
        self.prefetch_radius.saturating_mul(2).saturating_add(1)
    }

    /// `None` when eviction is disabled
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        (self.cache_capacity > 0).then_some(self.cache_capacity)
    }

    #[must_use]
    pub fn initial_params(&self) -> RenderParams {
        RenderParams::new(self.initial_width, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let config: CacheConfig = serde_yaml::from_str("workers: 2\n").unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.prefetch_radius, DEFAULT_PREFETCH_RADIUS);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.initial_width, DEFAULT_WIDTH);
    }

    #[test]
    fn load_normalizes_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: 0\nscale: 0.0\ncache_capacity: 0").unwrap();

        let config = CacheConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 1);
        assert!((config.scale - MIN_SCALE).abs() < f32::EPSILON);
        assert_eq!(config.capacity(), None);
    }

    #[test]
    fn small_capacity_is_raised_to_prefetch_window() {
        let config = CacheConfig {
            prefetch_radius: 2,
            cache_capacity: 2,
            ..CacheConfig::default()
        }
        .normalized();
        assert_eq!(config.capacity(), Some(5));

        let unbounded = CacheConfig {
            prefetch_radius: 2,
            cache_capacity: 0,
            ..CacheConfig::default()
        }
        .normalized();
        assert_eq!(unbounded.capacity(), None);

        let roomy = CacheConfig::default().normalized();
        assert_eq!(roomy.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: [not, a, number]").unwrap();

        let err = CacheConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig::load_or_default(Some(dir.path().join("nope.yaml").as_path()));
        assert_eq!(config, CacheConfig::default());
    }
}
