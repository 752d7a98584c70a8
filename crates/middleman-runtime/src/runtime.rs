//! Wiring of configuration, logging and services into a router.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use middleman_runtime::MiddlemanRuntime;
//!
//! // Loads middleman.toml from the current directory, installs logging
//! let runtime = MiddlemanRuntime::new();
//! let middleman = runtime.build(services);
//!
//! // Explicit file and profile
//! let runtime = MiddlemanRuntime::builder()
//!     .config_file("config/middleman.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use middleman_core::Middleman;
use middleman_services::{ServiceCollection, ServiceProvider};
use tracing::info;

use crate::config::{ConfigLoader, ConfigResult, MiddlemanConfig};
use crate::logging;

/// Holds the loaded configuration and turns service collections into routers.
#[derive(Debug, Clone)]
pub struct MiddlemanRuntime {
    config: MiddlemanConfig,
}

impl Default for MiddlemanRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlemanRuntime {
    /// Loads configuration from the current directory and installs logging.
    ///
    /// Falls back to defaults if the configuration cannot be loaded.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                MiddlemanConfig::default()
            });

        Self::from_config(config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from `config` and installs logging from it.
    ///
    /// Logging is left alone if a global subscriber is already installed.
    pub fn from_config(config: MiddlemanConfig) -> Self {
        logging::init_from_config(&config.logging);
        Self::without_logging(config)
    }

    /// Creates a runtime from `config` without touching the global subscriber.
    pub fn without_logging(config: MiddlemanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MiddlemanConfig {
        &self.config
    }

    /// Builds a provider from `services` with the configured dispatch settings.
    ///
    /// A configured default handler order replaces the collection's own; when
    /// none is configured the collection's is kept.
    pub fn build_provider(&self, mut services: ServiceCollection) -> Arc<ServiceProvider> {
        if let Some(order) = self.config.dispatch.default_handler_order {
            services.default_handler_order(order);
        }

        let provider = Arc::new(services.build());
        info!(
            services = provider.len(),
            default_handler_order = provider.default_handler_order(),
            "Middleman ready"
        );
        provider
    }

    /// Builds a router over `services`.
    pub fn build(&self, services: ServiceCollection) -> Middleman {
        self.build_provider(services).middleman()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a runtime with a custom configuration source.
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config_file: Option<PathBuf>,
    profile: Option<String>,
    load_env: bool,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            load_env: true,
            init_logging: true,
            ..Default::default()
        }
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Skips installing the global subscriber.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> ConfigResult<MiddlemanRuntime> {
        let mut loader = ConfigLoader::new().with_current_dir();
        if let Some(path) = self.config_file {
            loader = loader.file(path);
        }
        if let Some(profile) = self.profile {
            loader = loader.profile(profile);
        }
        if !self.load_env {
            loader = loader.without_env();
        }

        let config = loader.load()?;
        Ok(if self.init_logging {
            MiddlemanRuntime::from_config(config)
        } else {
            MiddlemanRuntime::without_logging(config)
        })
    }
}
