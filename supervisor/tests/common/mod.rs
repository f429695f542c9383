//! Common helpers for supervisor lifecycle tests
//!
//! Workers are small `/bin/sh` scripts launched through the explicit
//! interpreter path, so the tests need no Python installation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use shared::ServiceProcessInfo;
use supervisor::{ProcessSupervisor, ServiceConfig, SupervisorSettings};

pub const SHELL: &str = "/bin/sh";
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Worker that stays up until signalled
pub const LONG_RUNNING: &str = "exec sleep 30\n";

/// Write a worker script into `dir` and return its path
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Launch config running `script` under the shell
pub fn shell_config(script: &Path) -> ServiceConfig {
    ServiceConfig::new(script)
        .with_python_path(SHELL)
        .with_port(8765)
}

/// Timings short enough for tests
pub fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        stop_grace: Duration::from_secs(2),
        crash_restart_delay: Duration::from_millis(50),
        manual_restart_delay: Duration::from_millis(20),
        liveness_interval: Duration::from_secs(30),
        log_capacity: 100,
    }
}

/// Poll `get_info` until `condition` holds or the limit passes
pub async fn wait_for_info<F>(supervisor: &ProcessSupervisor, condition: F) -> ServiceProcessInfo
where
    F: Fn(&ServiceProcessInfo) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        let info = supervisor.get_info().await;
        if condition(&info) {
            return info;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {:?}; last info: {:?}", WAIT_LIMIT, info);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Whether any captured line contains `needle`
pub fn has_log(info: &ServiceProcessInfo, needle: &str) -> bool {
    info.logs.iter().any(|entry| entry.message.contains(needle))
}
