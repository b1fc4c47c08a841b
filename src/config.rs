//! Layered configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML config file,
//! `DISKERASE_*` environment variables (nested keys separated by `__`, e.g.
//! `DISKERASE_ERASE__PASSES=1`), then command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "diskerase.toml";
pub const DEFAULT_LOG_FILE: &str = "diskerase.log";
pub const ENV_PREFIX: &str = "DISKERASE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Use in-memory sample devices and a fake erase backend.
    pub simulation: bool,
    pub verbose: bool,
    pub json_logs: bool,
    /// Write logs here instead of stderr. The TUI falls back to
    /// `DEFAULT_LOG_FILE` when unset.
    pub log_file: Option<PathBuf>,
    /// How long a simulated erase takes.
    pub simulation_delay_ms: u64,
    pub erase: EraseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            simulation: false,
            verbose: false,
            json_logs: false,
            log_file: None,
            simulation_delay_ms: 2000,
            erase: EraseConfig::default(),
        }
    }
}

/// Parameters for the Linux erase backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EraseConfig {
    /// Overwrite passes for rotating media.
    pub passes: u32,
    /// `dd` block size in MiB.
    pub block_size_mib: u64,
    /// Temporary ATA security password set before a secure erase.
    pub ata_password: String,
}

impl Default for EraseConfig {
    fn default() -> Self {
        Self {
            passes: 3,
            block_size_mib: 4,
            ata_password: "0000".to_string(),
        }
    }
}

impl AppConfig {
    /// Build the effective configuration.
    ///
    /// `file` must exist when given explicitly; the default config file is
    /// optional.
    pub fn new<T: Serialize>(file: Option<&Path>, overrides: Option<&T>) -> Result<Self> {
        let path = match file {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                path
            }
            None => Path::new(DEFAULT_CONFIG_FILE),
        };

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration ({})", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.erase.passes == 0 {
            bail!("erase.passes must be at least 1");
        }
        if self.erase.block_size_mib == 0 {
            bail!("erase.block_size_mib must be at least 1");
        }
        if self.erase.ata_password.is_empty() {
            bail!("erase.ata_password must not be empty");
        }
        Ok(())
    }

    /// Render as TOML, in the format accepted by the config file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        simulation: Option<bool>,
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.erase.passes, 3);
        assert!(!config.simulation);
    }

    #[test]
    fn file_values_override_defaults() {
        let file = config_file(
            r#"
            simulation = true

            [erase]
            passes = 1
            "#,
        );

        let config = AppConfig::new::<Overrides>(Some(file.path()), None).unwrap();

        assert!(config.simulation);
        assert_eq!(config.erase.passes, 1);
        assert_eq!(config.erase.block_size_mib, 4);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let file = config_file("simulation = true\n");
        let overrides = Overrides {
            simulation: Some(false),
        };

        let config = AppConfig::new(Some(file.path()), Some(&overrides)).unwrap();

        assert!(!config.simulation);
    }

    #[test]
    fn unset_overrides_leave_file_values() {
        let file = config_file("simulation = true\n");
        let overrides = Overrides { simulation: None };

        let config = AppConfig::new(Some(file.path()), Some(&overrides)).unwrap();

        assert!(config.simulation);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = AppConfig::new::<Overrides>(Some(Path::new("/nonexistent/diskerase.toml")), None)
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn zero_passes_rejected() {
        let file = config_file("[erase]\npasses = 0\n");
        assert!(AppConfig::new::<Overrides>(Some(file.path()), None).is_err());
    }

    #[test]
    fn toml_rendering_round_trips_through_loader() {
        let mut config = AppConfig::default();
        config.erase.passes = 7;
        let file = config_file(&config.to_toml().unwrap());

        let loaded = AppConfig::new::<Overrides>(Some(file.path()), None).unwrap();

        assert_eq!(loaded.erase.passes, 7);
    }
}
