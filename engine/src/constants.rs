//! Application-wide constants and default values
//!
//! Centralizes magic numbers and default configurations for better maintainability

/// Memory unit constants
pub mod memory {
    pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

    /// Convert a byte count to gigabytes (binary)
    pub fn bytes_to_gb(bytes: u64) -> f64 {
        bytes as f64 / BYTES_PER_GB as f64
    }

    /// Convert gigabytes (binary) to a byte count
    pub fn gb_to_bytes(gb: f64) -> u64 {
        if gb <= 0.0 {
            return 0;
        }
        (gb * BYTES_PER_GB as f64) as u64
    }
}

/// Available-RAM thresholds (GB) driving the pause cascade
pub mod thresholds {
    /// Below this, pause everything except the top tier
    pub const DEFAULT_CRITICAL_GB: f64 = 1.0;

    /// Below this, pause the medium and low tiers
    pub const DEFAULT_LOW_GB: f64 = 1.5;

    /// Below this, pause the low tier
    pub const DEFAULT_MEDIUM_GB: f64 = 2.0;

    /// At or above this, resume resource-paused services
    pub const DEFAULT_OK_GB: f64 = 2.5;

    /// Flat margin added to every threshold while a memory-hungry external
    /// service is alive
    pub const DEFAULT_EXTERNAL_MARGIN_GB: f64 = 0.5;
}

/// Control loop cadences
pub mod cadence {
    /// Seconds between resource checks
    pub const RESOURCE_CHECK_INTERVAL_SEC: u64 = 30;

    /// Seconds between health checks
    pub const HEALTH_CHECK_INTERVAL_SEC: u64 = 60;

    /// Granularity of the control loop wake-ups
    pub const LOOP_POLL_INTERVAL_SEC: u64 = 5;

    /// Fixed sleep after a failed pass
    pub const ERROR_BACKOFF_SEC: u64 = 30;

    /// Consecutive failed passes before the operator is notified
    pub const REPEATED_ERROR_THRESHOLD: u32 = 3;
}

/// Process lifecycle defaults
pub mod process {
    /// Wait after spawning before resolving the worker pid
    pub const START_SETTLE_MS: u64 = 1000;

    /// Delay between consecutive top-tier starts at daemon startup
    pub const STARTUP_SETTLE_SEC: u64 = 2;

    /// Delay between stop and start of a health-triggered restart
    pub const RESTART_SETTLE_SEC: u64 = 2;

    /// Default grace period between SIGTERM and SIGKILL
    pub const DEFAULT_STOP_TIMEOUT_SEC: u64 = 3;

    /// Grace period granted to orphans before they are force-killed
    pub const ORPHAN_GRACE_SEC: u64 = 3;

    /// Poll interval while waiting for processes to exit
    pub const EXIT_POLL_MS: u64 = 100;

    /// Default admission requirement when a service declares none
    pub const DEFAULT_MIN_RAM_GB: f64 = 0.5;
}

/// Probe and notification timeouts
pub mod probe {
    /// Timeout for external-service liveness probes (seconds)
    pub const EXTERNAL_PROBE_TIMEOUT_SEC: u64 = 5;

    /// Default timeout for health probes (seconds)
    pub const DEFAULT_HEALTH_TIMEOUT_SEC: u64 = 10;

    /// Timeout for the operator notification command (seconds)
    pub const NOTIFY_TIMEOUT_SEC: u64 = 5;

    /// Default expected HTTP status code
    pub const DEFAULT_HTTP_STATUS: u16 = 200;
}

/// On-disk layout under the state directory
pub mod paths {
    pub const STATE_DIR_NAME: &str = ".orchestrator";
    pub const PID_FILE: &str = "orchestratord.pid";
    pub const STATE_FILE: &str = "state.json";
    pub const LOG_FILE: &str = "daemon.log";
    pub const CONFIG_FILE: &str = "services.yaml";
}
