//! Command line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use bus::BusConfig;
use clap::Parser;
use shared::HttpClientConfig;
use supervisor::ServiceConfig;

/// Desktop host: supervises the worker and runs the local message bus
#[derive(Parser, Debug, Clone)]
#[command(name = "host")]
#[command(about = "Supervises the companion worker process and bridges it to the UI over a local WebSocket bus")]
pub struct Args {
    /// Worker entry script
    #[arg(long, env = "WORKER_SCRIPT", default_value = "worker/main.py")]
    pub script: PathBuf,

    /// Explicit interpreter (skips venv and PATH lookup)
    #[arg(long, env = "WORKER_PYTHON")]
    pub python: Option<PathBuf>,

    /// Virtualenv to take the interpreter from
    #[arg(long, env = "WORKER_VENV")]
    pub venv: Option<PathBuf>,

    /// Port the worker's HTTP API listens on
    #[arg(long, env = "WORKER_PORT", default_value = "8000")]
    pub worker_port: u16,

    /// Do not restart the worker after a crash
    #[arg(long, env = "WORKER_NO_AUTO_RESTART")]
    pub no_auto_restart: bool,

    /// Automatic restarts allowed before giving up
    #[arg(long, env = "WORKER_MAX_RESTARTS", default_value = "3")]
    pub max_restarts: u32,

    /// Message bus bind host
    #[arg(long, env = "BUS_HOST", default_value = "127.0.0.1")]
    pub bus_host: String,

    /// Message bus port (0 picks a free port)
    #[arg(long, env = "BUS_PORT", default_value = "0")]
    pub bus_port: u16,

    /// Seconds between heartbeat pings
    #[arg(long, env = "BUS_HEARTBEAT_SECS", default_value = "30")]
    pub heartbeat_secs: u64,

    /// Seconds to wait for the worker's health check after launch
    #[arg(long, env = "WORKER_READY_TIMEOUT_SECS", default_value = "30")]
    pub ready_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new(&self.script)
            .with_port(self.worker_port)
            .with_restart_policy(!self.no_auto_restart, self.max_restarts);

        if let Some(python) = &self.python {
            config = config.with_python_path(python);
        }
        if let Some(venv) = &self.venv {
            config = config.with_venv(venv);
        }
        config
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            host: self.bus_host.clone(),
            port: self.bus_port,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
        }
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig::for_port(self.worker_port)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["host"]);

        assert_eq!(args.script, PathBuf::from("worker/main.py"));
        assert_eq!(args.worker_port, 8000);
        assert_eq!(args.bus_port, 0);

        let service = args.service_config();
        assert!(service.auto_restart);
        assert_eq!(service.max_restarts, 3);
        assert!(service.python_path.is_none());

        assert_eq!(args.bus_config().heartbeat_interval, Duration::from_secs(30));
        assert_eq!(args.http_config().base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_flags_flow_into_configs() {
        let args = Args::parse_from([
            "host",
            "--script",
            "/opt/worker/app.py",
            "--python",
            "/usr/bin/python3.12",
            "--worker-port",
            "9100",
            "--no-auto-restart",
            "--max-restarts",
            "1",
            "--heartbeat-secs",
            "5",
        ]);

        let service = args.service_config();
        assert_eq!(service.script_path, PathBuf::from("/opt/worker/app.py"));
        assert_eq!(service.python_path, Some(PathBuf::from("/usr/bin/python3.12")));
        assert_eq!(service.port, 9100);
        assert!(!service.auto_restart);
        assert_eq!(service.max_restarts, 1);

        assert_eq!(args.bus_config().heartbeat_interval, Duration::from_secs(5));
        assert_eq!(args.http_config().base_url, "http://127.0.0.1:9100");
    }
}
