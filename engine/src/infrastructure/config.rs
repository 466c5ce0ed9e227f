//! Service configuration loading from YAML
//!
//! A single file declares the RAM thresholds and every service, managed or external.

use crate::constants::{paths, probe, thresholds};
use crate::domain::{
    DomainError, HealthProbe, PriorityTier, RamThresholds, ServiceDescriptor, ServiceRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServicesFile {
    #[serde(default)]
    pub thresholds: Option<ThresholdsConfig>,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// RAM threshold overrides (GB)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_critical_gb")]
    pub critical_gb: f64,

    #[serde(default = "default_low_gb")]
    pub low_gb: f64,

    #[serde(default = "default_medium_gb")]
    pub medium_gb: f64,

    #[serde(default = "default_ok_gb")]
    pub ok_gb: f64,

    #[serde(default = "default_external_margin_gb")]
    pub external_margin_gb: f64,
}

/// Priority accepted either by name or by rank (1-4)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriorityConfig {
    Rank(u8),
    Name(String),
}

/// Service configuration from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub priority: Option<PriorityConfig>,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub stop_command: Option<Vec<String>>,

    #[serde(default)]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,

    #[serde(default)]
    pub min_ram_gb: Option<f64>,

    #[serde(default)]
    pub pid_file: Option<String>,

    #[serde(default)]
    pub auto_restart: Option<bool>,

    #[serde(default)]
    pub autostart: Option<bool>,

    #[serde(default)]
    pub external: bool,

    #[serde(default)]
    pub memory_hungry: bool,

    #[serde(default)]
    pub launch_signature: Option<Vec<String>>,

    // Process name of the leaf worker
    #[serde(default)]
    pub worker_name: Option<String>,

    #[serde(default)]
    pub stop_timeout_sec: Option<u64>,
}

/// Health check configuration from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(rename = "type")]
    pub check_type: String, // exec, tcp, http

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    // Exec-specific
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    // TCP-specific
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    // HTTP-specific
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub expected_status: Option<u16>,
}

fn default_critical_gb() -> f64 {
    thresholds::DEFAULT_CRITICAL_GB
}

fn default_low_gb() -> f64 {
    thresholds::DEFAULT_LOW_GB
}

fn default_medium_gb() -> f64 {
    thresholds::DEFAULT_MEDIUM_GB
}

fn default_ok_gb() -> f64 {
    thresholds::DEFAULT_OK_GB
}

fn default_external_margin_gb() -> f64 {
    thresholds::DEFAULT_EXTERNAL_MARGIN_GB
}

fn default_timeout() -> u64 {
    probe::DEFAULT_HEALTH_TIMEOUT_SEC
}

/// Everything the daemon needs from the services file
#[derive(Debug)]
pub struct LoadedConfig {
    pub registry: ServiceRegistry,
    pub thresholds: RamThresholds,
    pub external_margin_gb: f64,
}

impl ServicesFile {
    /// Parse YAML content
    pub fn parse(contents: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(contents)
            .map_err(|e| DomainError::InvalidConfiguration(format!("Failed to parse YAML: {}", e)))
    }

    /// Load and parse a YAML file
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DomainError::InvalidConfiguration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    /// Validate and convert into domain objects
    pub fn into_domain(self) -> Result<LoadedConfig, DomainError> {
        let (thresholds, external_margin_gb) = match self.thresholds {
            Some(t) => (
                RamThresholds {
                    critical_gb: t.critical_gb,
                    low_gb: t.low_gb,
                    medium_gb: t.medium_gb,
                    ok_gb: t.ok_gb,
                },
                t.external_margin_gb,
            ),
            None => (
                RamThresholds::default(),
                thresholds::DEFAULT_EXTERNAL_MARGIN_GB,
            ),
        };
        thresholds
            .validate()
            .map_err(DomainError::InvalidConfiguration)?;
        if !external_margin_gb.is_finite() || external_margin_gb < 0.0 {
            return Err(DomainError::InvalidConfiguration(
                "external_margin_gb must be a non-negative number".to_string(),
            ));
        }

        // Catch duplicates with a clearer message than the registry's
        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(DomainError::InvalidConfiguration(format!(
                    "Duplicate service name '{}' in configuration",
                    service.name
                )));
            }
        }

        let descriptors = self
            .services
            .into_iter()
            .map(ServiceConfig::into_descriptor)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoadedConfig {
            registry: ServiceRegistry::new(descriptors)?,
            thresholds,
            external_margin_gb,
        })
    }
}

impl ServiceConfig {
    fn into_descriptor(self) -> Result<ServiceDescriptor, DomainError> {
        let mut builder = ServiceDescriptor::builder(&self.name)
            .command(self.command)
            .external(self.external)
            .memory_hungry(self.memory_hungry);

        if let Some(display_name) = self.display_name {
            builder = builder.display_name(display_name);
        }
        if let Some(priority) = self.priority {
            builder = builder.priority(priority.resolve(&self.name)?);
        }
        if let Some(stop_command) = self.stop_command {
            builder = builder.stop_command(stop_command);
        }
        if let Some(dir) = self.working_dir {
            builder = builder.working_dir(expand_home(&dir));
        }
        for (key, value) in self.env {
            builder = builder.env(key, value);
        }
        if let Some(check) = self.health_check {
            builder = builder.health_probe(check.into_probe(&self.name)?);
        }
        if let Some(gb) = self.min_ram_gb {
            builder = builder.min_ram_gb(gb);
        }
        if let Some(path) = self.pid_file {
            builder = builder.pid_file(expand_home(&path));
        }
        if let Some(enabled) = self.auto_restart {
            builder = builder.auto_restart(enabled);
        }
        if let Some(enabled) = self.autostart {
            builder = builder.autostart(enabled);
        }
        if let Some(patterns) = self.launch_signature {
            builder = builder.launch_signature(patterns);
        }
        if let Some(worker) = self.worker_name {
            builder = builder.worker_hint(worker);
        }
        if let Some(secs) = self.stop_timeout_sec {
            builder = builder.stop_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}

impl PriorityConfig {
    fn resolve(&self, service: &str) -> Result<PriorityTier, DomainError> {
        let raw = match self {
            PriorityConfig::Rank(rank) => rank.to_string(),
            PriorityConfig::Name(name) => name.clone(),
        };
        raw.parse()
            .map_err(|e: String| DomainError::InvalidConfiguration(format!("{}: {}", service, e)))
    }
}

impl HealthCheckConfig {
    fn into_probe(self, service: &str) -> Result<HealthProbe, DomainError> {
        let probe = match self.check_type.to_lowercase().as_str() {
            "exec" => {
                let command = self.command.ok_or_else(|| {
                    DomainError::InvalidConfiguration(format!(
                        "{}: exec health check requires 'command'",
                        service
                    ))
                })?;
                HealthProbe::exec(command, self.args)
            }
            "tcp" => {
                let (host, port) = self.host.zip(self.port).ok_or_else(|| {
                    DomainError::InvalidConfiguration(format!(
                        "{}: tcp health check requires 'host' and 'port'",
                        service
                    ))
                })?;
                HealthProbe::tcp(host, port)
            }
            "http" => {
                let endpoint = self.endpoint.ok_or_else(|| {
                    DomainError::InvalidConfiguration(format!(
                        "{}: http health check requires 'endpoint'",
                        service
                    ))
                })?;
                let mut probe = HealthProbe::http(endpoint);
                if let Some(status) = self.expected_status {
                    probe = probe.with_expected_status(status);
                }
                probe
            }
            other => {
                return Err(DomainError::InvalidConfiguration(format!(
                    "{}: unknown health check type '{}'",
                    service, other
                )))
            }
        };
        Ok(probe.with_timeout(self.timeout))
    }
}

/// Load, validate and convert a services file
pub fn load_services_file(path: &Path) -> Result<LoadedConfig, DomainError> {
    ServicesFile::load(path)?.into_domain()
}

/// `~/.orchestrator`, or the current directory when HOME is unset
pub fn default_state_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(paths::STATE_DIR_NAME)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~/`
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
