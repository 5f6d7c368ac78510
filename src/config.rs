use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::pipeline::dispatch::DEFAULT_QUEUE_CAPACITY;
use crate::system::gpu::{ESTIMATE_DAMPING, GpuSettings, QUERY_TIMEOUT};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gpu: GpuConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub discrete: bool,
    pub estimate_damping: f32,
    pub query_timeout_ms: u64,
}

impl Default for GpuConfig {
    fn default() -> Self {
        GpuConfig {
            discrete: true,
            estimate_damping: ESTIMATE_DAMPING,
            query_timeout_ms: QUERY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl GpuConfig {
    /// Out-of-range values fall back to the defaults instead of failing.
    pub fn settings(&self) -> GpuSettings {
        let estimate_damping = if self.estimate_damping.is_finite() && self.estimate_damping >= 0.0 {
            self.estimate_damping
        } else {
            ESTIMATE_DAMPING
        };
        let query_timeout = if self.query_timeout_ms == 0 {
            QUERY_TIMEOUT
        } else {
            Duration::from_millis(self.query_timeout_ms)
        };
        GpuSettings {
            estimate_damping,
            query_timeout,
            allow_discrete: self.discrete,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("statwidget").join("config.toml"))
}

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("statwidget").join("statwidget.log"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert!(config.gpu.discrete);
        assert!((config.gpu.estimate_damping - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.gpu.query_timeout_ms, 2000);
        assert_eq!(config.dispatch.queue_capacity, 4);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[gpu]
estimate_damping = 0.5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!((config.gpu.estimate_damping - 0.5).abs() < f32::EPSILON);
        // Other fields should be defaults
        assert!(config.gpu.discrete);
        assert_eq!(config.dispatch.queue_capacity, 4);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[gpu]
discrete = false
estimate_damping = 0.6
query_timeout_ms = 1500

[dispatch]
queue_capacity = 8

[logging]
level = "debug"
file = "/tmp/statwidget.log"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(!config.gpu.discrete);
        assert_eq!(config.gpu.query_timeout_ms, 1500);
        assert_eq!(config.dispatch.queue_capacity, 8);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/tmp/statwidget.log"))
        );

        let settings = config.gpu.settings();
        assert!(!settings.allow_discrete);
        assert_eq!(settings.query_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn nonsense_gpu_values_fall_back_to_defaults() {
        let config = GpuConfig {
            discrete: true,
            estimate_damping: -1.0,
            query_timeout_ms: 0,
        };
        let settings = config.settings();
        assert!((settings.estimate_damping - ESTIMATE_DAMPING).abs() < f32::EPSILON);
        assert_eq!(settings.query_timeout, QUERY_TIMEOUT);
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.dispatch.queue_capacity, 4);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("statwidget_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.dispatch.queue_capacity, 4);
        let _ = std::fs::remove_file(&temp);
    }
}
