// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration.
//!
//! Loaded from a TOML file or assembled from command-line flags.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use switchboard::HubConfig;
use thiserror::Error;

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Routing strategy for the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    /// Send / Broadcast / FetchIDs envelopes.
    #[default]
    Envelope,
    /// Forward every frame verbatim to everyone.
    Relay,
}

impl fmt::Display for RouterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterKind::Envelope => write!(f, "envelope"),
            RouterKind::Relay => write!(f, "relay"),
        }
    }
}

/// A static file served at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    /// URL path, e.g. `/chat`.
    pub path: String,

    /// File on disk.
    pub file: PathBuf,
}

impl StaticRoute {
    pub fn new(path: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: file.into(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket endpoint path.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Routing strategy.
    #[serde(default)]
    pub router: RouterKind,

    /// Maximum concurrent WebSocket clients (0 = unlimited).
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hub tuning.
    #[serde(default)]
    pub hub: HubConfig,

    /// Static file routes.
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_clients() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            ws_path: default_ws_path(),
            router: RouterKind::default(),
            max_clients: default_max_clients(),
            log_level: default_log_level(),
            hub: HubConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// `bind:port`, ready for a listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// True if `/` is taken by the WebSocket endpoint or a static route.
    pub fn serves_root(&self) -> bool {
        self.ws_path == "/" || self.routes.iter().any(|r| r.path == "/")
    }

    /// Register a static file route.
    pub fn add_route(&mut self, route: StaticRoute) {
        self.routes.push(route);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".into()));
        }
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "ws_path '{}' must start with '/'",
                self.ws_path
            )));
        }
        check_literal_path(&self.ws_path)?;
        if self.ws_path == HEALTH_PATH {
            return Err(ConfigError::Invalid(format!(
                "ws_path '{}' is reserved",
                self.ws_path
            )));
        }
        self.hub.validate().map_err(ConfigError::Invalid)?;

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !route.path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "route path '{}' must start with '/'",
                    route.path
                )));
            }
            check_literal_path(&route.path)?;
            if route.path == self.ws_path || route.path == HEALTH_PATH {
                return Err(ConfigError::Invalid(format!(
                    "route path '{}' is reserved",
                    route.path
                )));
            }
            if !seen.insert(route.path.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate route path '{}'",
                    route.path
                )));
            }
        }

        Ok(())
    }
}

/// Paths are matched literally; `:` and `*` would turn them into patterns.
fn check_literal_path(path: &str) -> Result<(), ConfigError> {
    if path.contains([':', '*']) {
        return Err(ConfigError::Invalid(format!(
            "path '{}' must not contain ':' or '*'",
            path
        )));
    }
    Ok(())
}
