//! ServiceDescriptor entity
//! Immutable description of a manageable or observed service, created once at startup

use crate::constants::memory::gb_to_bytes;
use crate::constants::process::{DEFAULT_MIN_RAM_GB, DEFAULT_STOP_TIMEOUT_SEC};
use crate::domain::value_objects::{HealthProbe, PriorityTier};
use crate::domain::DomainError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    name: String,
    display_name: String,
    priority: PriorityTier,
    start_command: Vec<String>,
    stop_command: Option<Vec<String>>,
    health_probe: Option<HealthProbe>,
    min_ram_bytes: u64,
    pid_file: Option<PathBuf>,
    auto_restart: bool,
    autostart: bool,
    external: bool,
    memory_hungry: bool,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    launch_signature: Vec<String>,
    worker_hint: Option<String>,
    stop_timeout: Duration,
}

impl ServiceDescriptor {
    /// Create a builder for constructing a ServiceDescriptor with a fluent interface
    ///
    /// # Example
    /// ```
    /// use orchestrator_engine::domain::{PriorityTier, ServiceDescriptor};
    ///
    /// let tts = ServiceDescriptor::builder("tts")
    ///     .priority(PriorityTier::Medium)
    ///     .command(vec!["python3".to_string(), "-m".to_string(), "tts.server".to_string()])
    ///     .min_ram_gb(1.0)
    ///     .build()?;
    /// # Ok::<(), orchestrator_engine::domain::DomainError>(())
    /// ```
    pub fn builder(name: impl Into<String>) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder::new(name)
    }

    // ===== Getters =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn priority(&self) -> PriorityTier {
        self.priority
    }

    pub fn start_command(&self) -> &[String] {
        &self.start_command
    }

    pub fn stop_command(&self) -> Option<&[String]> {
        self.stop_command.as_deref()
    }

    pub fn health_probe(&self) -> Option<&HealthProbe> {
        self.health_probe.as_ref()
    }

    pub fn min_ram_bytes(&self) -> u64 {
        self.min_ram_bytes
    }

    pub fn pid_file(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn autostart(&self) -> bool {
        self.autostart
    }

    /// Observed only, never controlled
    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn is_memory_hungry(&self) -> bool {
        self.memory_hungry
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Command-line fragments identifying a leftover worker of this service
    pub fn launch_signature(&self) -> &[String] {
        &self.launch_signature
    }

    /// Process name of the real worker, when the start command is a launcher
    pub fn worker_hint(&self) -> Option<&str> {
        self.worker_hint.as_deref()
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn is_top_tier(&self) -> bool {
        self.priority.is_top()
    }
}

/// Builder for ServiceDescriptor
pub struct ServiceDescriptorBuilder {
    name: String,
    display_name: Option<String>,
    priority: PriorityTier,
    start_command: Vec<String>,
    stop_command: Option<Vec<String>>,
    health_probe: Option<HealthProbe>,
    min_ram_gb: f64,
    pid_file: Option<PathBuf>,
    auto_restart: bool,
    autostart: Option<bool>,
    external: bool,
    memory_hungry: bool,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    launch_signature: Vec<String>,
    worker_hint: Option<String>,
    stop_timeout: Duration,
}

impl ServiceDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            priority: PriorityTier::default(),
            start_command: Vec::new(),
            stop_command: None,
            health_probe: None,
            min_ram_gb: DEFAULT_MIN_RAM_GB,
            pid_file: None,
            auto_restart: true,
            autostart: None,
            external: false,
            memory_hungry: false,
            working_dir: None,
            env: BTreeMap::new(),
            launch_signature: Vec::new(),
            worker_hint: None,
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SEC),
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn priority(mut self, priority: PriorityTier) -> Self {
        self.priority = priority;
        self
    }

    pub fn command(mut self, argv: Vec<String>) -> Self {
        self.start_command = argv;
        self
    }

    pub fn stop_command(mut self, argv: Vec<String>) -> Self {
        self.stop_command = Some(argv);
        self
    }

    pub fn health_probe(mut self, probe: HealthProbe) -> Self {
        self.health_probe = Some(probe);
        self
    }

    pub fn min_ram_gb(mut self, gb: f64) -> Self {
        self.min_ram_gb = gb;
        self
    }

    pub fn pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    pub fn auto_restart(mut self, enabled: bool) -> Self {
        self.auto_restart = enabled;
        self
    }

    pub fn autostart(mut self, enabled: bool) -> Self {
        self.autostart = Some(enabled);
        self
    }

    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }

    pub fn memory_hungry(mut self, hungry: bool) -> Self {
        self.memory_hungry = hungry;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn launch_signature(mut self, patterns: Vec<String>) -> Self {
        self.launch_signature = patterns;
        self
    }

    pub fn worker_hint(mut self, process_name: impl Into<String>) -> Self {
        self.worker_hint = Some(process_name.into());
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ServiceDescriptor, DomainError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidName(
                "Service name cannot be empty".to_string(),
            ));
        }
        if name.contains(char::is_whitespace) {
            return Err(DomainError::InvalidName(format!(
                "Service name '{}' cannot contain whitespace",
                name
            )));
        }

        if let Some(probe) = &self.health_probe {
            probe.validate().map_err(|e| {
                DomainError::InvalidConfiguration(format!("{}: {}", name, e))
            })?;
        }

        if self.external {
            if self.health_probe.is_none() {
                return Err(DomainError::InvalidConfiguration(format!(
                    "External service '{}' requires a health check",
                    name
                )));
            }
        } else {
            let empty = self
                .start_command
                .first()
                .map_or(true, |program| program.trim().is_empty());
            if empty {
                return Err(DomainError::InvalidCommand(format!(
                    "Service '{}' has no start command",
                    name
                )));
            }
        }

        if !self.min_ram_gb.is_finite() || self.min_ram_gb < 0.0 {
            return Err(DomainError::InvalidConfiguration(format!(
                "{}: min_ram_gb must be a non-negative number",
                name
            )));
        }

        if matches!(&self.stop_command, Some(argv) if argv.is_empty()) {
            return Err(DomainError::InvalidCommand(format!(
                "Service '{}' has an empty stop command",
                name
            )));
        }

        let launch_signature = if self.launch_signature.is_empty() && !self.external {
            vec![default_signature(&self.start_command)]
        } else {
            self.launch_signature
        };

        Ok(ServiceDescriptor {
            display_name: self.display_name.unwrap_or_else(|| name.clone()),
            autostart: self.autostart.unwrap_or(self.priority.is_top()),
            name,
            priority: self.priority,
            start_command: self.start_command,
            stop_command: self.stop_command,
            health_probe: self.health_probe,
            min_ram_bytes: gb_to_bytes(self.min_ram_gb),
            pid_file: self.pid_file,
            auto_restart: self.auto_restart && !self.external,
            external: self.external,
            memory_hungry: self.memory_hungry,
            working_dir: self.working_dir,
            env: self.env,
            launch_signature,
            worker_hint: self.worker_hint,
            stop_timeout: self.stop_timeout,
        })
    }
}

/// The script of a `<shell> -c <script>` launcher, else the joined command.
/// A shell running a single command usually execs it, so only the script
/// shows up on the live command line.
fn default_signature(argv: &[String]) -> String {
    if let [program, flag, script, ..] = argv {
        let shell = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if SHELLS.contains(&shell) && flag == "-c" && !script.trim().is_empty() {
            return script.trim().to_string();
        }
    }
    argv.join(" ")
}

const SHELLS: &[&str] = &["sh", "bash", "dash", "zsh", "ksh"];
