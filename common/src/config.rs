//! Configuration types for runtime and output settings

/// Default bound on filesystem and SSH commands
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Connection establishment bound for SSH, separate from the command timeout
pub const SSH_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Default cap on the number of entries returned by a listing
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Runtime configuration for tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}

impl OutputConfig {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
