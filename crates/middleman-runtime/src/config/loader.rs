//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `middleman.toml`
//! - `yaml-config`: enables `middleman.yaml` / `middleman.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`middleman.{profile}.toml`)
//! 4. Main config file (`middleman.toml`)
//! 5. Environment variables (`MIDDLEMAN_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `MIDDLEMAN_` prefix with `__` as separator:
//!
//! - `MIDDLEMAN_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `MIDDLEMAN_DISPATCH__DEFAULT_HANDLER_ORDER=0` → `dispatch.default_handler_order = 0`
//!
//! `MIDDLEMAN_PROFILE` selects the profile and is not a configuration key.
//!
//! # Example
//!
//! ```rust,ignore
//! use middleman_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/middleman.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, MiddlemanConfig};

const ENV_PREFIX: &str = "MIDDLEMAN_";
const PROFILE_VAR: &str = "MIDDLEMAN_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as aliases.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `MIDDLEMAN_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Overrides the search when set.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Without any, the current directory and the user config directory
    /// are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("middleman")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, above the built-in defaults.
    pub fn merge(mut self, config: MiddlemanConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<MiddlemanConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: MiddlemanConfig = figment.extract()?;
        validate(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            default_handler_order = ?config.dispatch.default_handler_order,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(MiddlemanConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with MIDDLEMAN_ prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        Ok(figment)
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("middleman"));
        }
        paths
    }

    /// Searches `search_paths × base_names`, merging a profile-specific
    /// variant before the base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["middleman.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["middleman.yaml", "middleman.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            debug!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Checks settings that deserialize fine but cannot be honored.
pub fn validate(config: &MiddlemanConfig) -> ConfigResult<()> {
    let logging = &config.logging;
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output is `file` but logging.file_path is not set",
        ));
    }

    for module in logging.filters.keys() {
        if module.trim().is_empty() {
            warn!("Ignoring logging filter with an empty module name");
        }
    }

    Ok(())
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<MiddlemanConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<MiddlemanConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use figment::Jail;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::new()
                .search_path(".")
                .without_env()
                .load()
                .expect("defaults load");

            assert_eq!(config.dispatch.default_handler_order, None);
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.logging.output, LogOutput::Stdout);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("MIDDLEMAN_DISPATCH__DEFAULT_HANDLER_ORDER", "250");
            jail.set_env("MIDDLEMAN_LOGGING__LEVEL", "debug");
            jail.set_env("MIDDLEMAN_PROFILE", "production");

            let config = ConfigLoader::new().search_path(".").load().expect("env loads");
            assert_eq!(config.dispatch.default_handler_order, Some(250));
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn profile_file_is_overridden_by_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "middleman.production.toml",
                r#"
                [dispatch]
                default_handler_order = 10

                [logging]
                level = "warn"
                "#,
            )?;
            jail.create_file(
                "middleman.toml",
                r#"
                [dispatch]
                default_handler_order = 20
                "#,
            )?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(".")
                .without_env()
                .load()
                .expect("files load");

            assert_eq!(config.dispatch.default_handler_order, Some(20));
            assert_eq!(config.logging.level, LogLevel::Warn);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn explicit_file_is_loaded() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [logging]
                output = "stderr"
                filters = { middleman_core = "trace" }
                "#,
            )?;

            let config = load_config_from_file("custom.toml").expect("file loads");
            assert_eq!(config.logging.output, LogOutput::Stderr);
            assert_eq!(config.logging.filters["middleman_core"], LogLevel::Trace);
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_fails() {
        Jail::expect_with(|_jail| {
            let err = ConfigLoader::new().file("absent.toml").load().unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn unsupported_extension_fails() {
        Jail::expect_with(|jail| {
            jail.create_file("middleman.ini", "level = debug")?;
            let err = ConfigLoader::new().file("middleman.ini").load().unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[test]
    fn file_output_requires_a_path() {
        let mut config = MiddlemanConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("middleman.log"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn invalid_value_is_an_extract_error() {
        Jail::expect_with(|jail| {
            jail.set_env("MIDDLEMAN_LOGGING__LEVEL", "loud");
            let err = ConfigLoader::new().search_path(".").load().unwrap_err();
            assert!(matches!(err, ConfigError::Extract(_)));
            Ok(())
        });
    }

    #[test]
    fn profile_parsing() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
