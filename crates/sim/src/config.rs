use crate::computation::DEFAULT_MAX_DELTA;
use crate::flow::FlowFieldParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading or validating a [`SimConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Simulation setup. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Particle count N; the grid side is ceil(sqrt(N)).
    pub particles: u32,
    /// Seed for the per-particle scalar channel and size attribute.
    pub rng_seed: u64,
    /// Upper bound on a tick's delta, in seconds.
    pub max_delta: f32,
    /// Largest permitted grid side.
    pub max_texture_dimension: u32,
    pub flow: FlowFieldParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            particles: 4096,
            rng_seed: 42,
            max_delta: DEFAULT_MAX_DELTA,
            max_texture_dimension: 8192,
            flow: FlowFieldParams::default(),
        }
    }
}

impl SimConfig {
    /// Load from a `.json` file, or YAML for any other extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&text)?
        } else {
            serde_yaml::from_str(&text)?
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), particles = config.particles, "config loaded");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particles == 0 {
            return Err(ConfigError::Invalid("particles must be at least 1".into()));
        }
        if !(self.max_delta.is_finite() && self.max_delta > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_delta must be positive, got {}",
                self.max_delta
            )));
        }
        if self.max_texture_dimension == 0 {
            return Err(ConfigError::Invalid(
                "max_texture_dimension must be non-zero".into(),
            ));
        }
        if !self.flow.is_finite() {
            return Err(ConfigError::Invalid(
                "flow parameters must be finite".into(),
            ));
        }
        Ok(())
    }
}
