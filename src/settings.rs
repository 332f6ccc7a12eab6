use crate::error::SettingsError;
use crate::occupancy::query::DEFAULT_BATCH_SIZE;
use crate::request::{DEFAULT_RESOLUTION, MAX_PROMPT_LEN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL_VERSION: &str = "cube3d-v0.5";

/// Tuning of the analytic shape backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProceduralSettings {
    pub blob_count: usize,
    /// Logit units per unit of signed distance
    pub sharpness: f32,
    /// Smooth-union width between primitives
    pub blend_radius: f32,
}

impl Default for ProceduralSettings {
    fn default() -> Self {
        Self {
            blob_count: 6,
            sharpness: 20.0,
            blend_radius: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub model_version: String,
    pub batch_size: usize,
    /// None = wait for the worker as long as it takes
    pub request_timeout_ms: Option<u64>,
    pub default_resolution: u32,
    pub max_prompt_len: usize,
    pub procedural: ProceduralSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_ms: None,
            default_resolution: DEFAULT_RESOLUTION,
            max_prompt_len: MAX_PROMPT_LEN,
            procedural: ProceduralSettings::default(),
        }
    }
}

/// `~/.occupancy-grid/settings.json`
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    let home = dirs::home_dir().ok_or(SettingsError::NoHomeDir)?;
    Ok(home.join(".occupancy-grid").join("settings.json"))
}

impl ServiceSettings {
    /// Reads settings from `path`, or from [`default_settings_path`] when no
    /// path is given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_settings_path()?,
        };

        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: ServiceSettings = serde_json::from_str(&content)?;
        settings.validate()?;

        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    /// Applies `OCCUPANCY_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("OCCUPANCY_BATCH_SIZE") {
            self.batch_size = value.trim().parse().map_err(|_| SettingsError::InvalidOverride {
                key: "OCCUPANCY_BATCH_SIZE",
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup("OCCUPANCY_MODEL_VERSION") {
            self.model_version = value;
        }

        if let Some(value) = lookup("OCCUPANCY_TIMEOUT_MS") {
            let timeout: u64 = value.trim().parse().map_err(|_| SettingsError::InvalidOverride {
                key: "OCCUPANCY_TIMEOUT_MS",
                value: value.clone(),
            })?;
            // 0 disables the timeout
            self.request_timeout_ms = (timeout > 0).then_some(timeout);
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid("batch_size must be at least 1".to_string()));
        }
        if self.model_version.trim().is_empty() {
            return Err(SettingsError::Invalid("model_version cannot be empty".to_string()));
        }
        if self.max_prompt_len == 0 {
            return Err(SettingsError::Invalid("max_prompt_len must be at least 1".to_string()));
        }
        if !self.procedural.sharpness.is_finite() || self.procedural.sharpness <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "procedural.sharpness must be positive, got {}",
                self.procedural.sharpness
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("occupancy-grid-settings-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults() {
        let settings = ServiceSettings::default();

        assert_eq!(settings.model_version, "cube3d-v0.5");
        assert_eq!(settings.batch_size, 100_000);
        assert_eq!(settings.default_resolution, 64);
        assert!(settings.request_timeout().is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: ServiceSettings =
            serde_json::from_str(r#"{"batch_size": 4096, "procedural": {"blob_count": 2}}"#).unwrap();

        assert_eq!(settings.batch_size, 4096);
        assert_eq!(settings.model_version, DEFAULT_MODEL_VERSION);
        assert_eq!(settings.procedural.blob_count, 2);
        assert_eq!(settings.procedural.sharpness, 20.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("settings.json");
        let settings = ServiceSettings {
            batch_size: 512,
            request_timeout_ms: Some(30_000),
            ..Default::default()
        };

        settings.save(&path).unwrap();
        let loaded = ServiceSettings::load(Some(&path)).unwrap();

        assert_eq!(loaded, settings);
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(30)));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = temp_path("missing.json");
        assert_eq!(ServiceSettings::load(Some(&path)).unwrap(), ServiceSettings::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = temp_path("bad.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"batch_size": 0}"#).unwrap();

        assert!(matches!(
            ServiceSettings::load(Some(&path)),
            Err(SettingsError::Invalid(_))
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ServiceSettings::load(Some(&path)),
            Err(SettingsError::Parse(_))
        ));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("OCCUPANCY_BATCH_SIZE", "2048"),
            ("OCCUPANCY_MODEL_VERSION", "cube3d-v0.6"),
            ("OCCUPANCY_TIMEOUT_MS", "1500"),
        ]
        .into_iter()
        .collect();

        let mut settings = ServiceSettings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.batch_size, 2048);
        assert_eq!(settings.model_version, "cube3d-v0.6");
        assert_eq!(settings.request_timeout(), Some(Duration::from_millis(1500)));

        let mut settings = ServiceSettings::default();
        let err = settings
            .apply_overrides(|key| (key == "OCCUPANCY_BATCH_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::InvalidOverride {
                key: "OCCUPANCY_BATCH_SIZE",
                ..
            }
        ));

        let mut settings = ServiceSettings::default();
        assert!(settings
            .apply_overrides(|key| (key == "OCCUPANCY_BATCH_SIZE").then(|| "0".to_string()))
            .is_err());
    }
}
