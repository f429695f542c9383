//! Launch configuration for the worker and timing for the supervisor

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKER_PORT: u16 = 8000;
pub const DEFAULT_MAX_RESTARTS: u32 = 3;
pub const DEFAULT_SCRIPT_PATH: &str = "worker/main.py";

/// Declarative launch parameters, immutable for the lifetime of one launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Explicit interpreter; wins over every other resolution step
    pub python_path: Option<PathBuf>,
    pub venv_path: Option<PathBuf>,
    pub script_path: PathBuf,
    pub port: u16,
    /// Defaults to the script's parent directory
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub args: Vec<String>,
    pub auto_restart: bool,
    pub max_restarts: u32,
    /// Exit codes the worker uses to say "do not restart me"
    pub no_restart_exit_codes: Vec<i32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            venv_path: None,
            script_path: PathBuf::from(DEFAULT_SCRIPT_PATH),
            port: DEFAULT_WORKER_PORT,
            working_dir: None,
            env: HashMap::new(),
            args: Vec::new(),
            auto_restart: true,
            max_restarts: DEFAULT_MAX_RESTARTS,
            no_restart_exit_codes: Vec::new(),
        }
    }
}

impl ServiceConfig {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            ..Self::default()
        }
    }

    /// Configure explicit interpreter (fluent API)
    pub fn with_python_path(mut self, python_path: impl Into<PathBuf>) -> Self {
        self.python_path = Some(python_path.into());
        self
    }

    /// Configure virtualenv (fluent API)
    pub fn with_venv(mut self, venv_path: impl Into<PathBuf>) -> Self {
        self.venv_path = Some(venv_path.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_restart_policy(mut self, auto_restart: bool, max_restarts: u32) -> Self {
        self.auto_restart = auto_restart;
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_no_restart_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.no_restart_exit_codes = codes;
        self
    }

    /// Directory the worker is launched from
    pub fn effective_working_dir(&self) -> Option<PathBuf> {
        self.working_dir.clone().or_else(|| {
            self.script_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
        })
    }
}

/// Timing and capacity knobs of the supervisor itself
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// How long a graceful stop may take before the worker is killed
    pub stop_grace: Duration,
    /// Pause before an automatic restart after a crash
    pub crash_restart_delay: Duration,
    /// Pause between stop and start in an explicit `restart()`
    pub manual_restart_delay: Duration,
    /// Period of the OS process-table probe
    pub liveness_interval: Duration,
    pub log_capacity: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            crash_restart_delay: Duration::from_secs(2),
            manual_restart_delay: Duration::from_secs(1),
            liveness_interval: Duration::from_secs(5),
            log_capacity: 100,
        }
    }
}
