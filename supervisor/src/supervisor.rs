//! Worker process supervisor
//!
//! State machine: `stopped → starting → running → stopping → stopped`, with
//! `running → error` on an unexpected exit and an automatic
//! `error → starting` while the restart budget lasts.
//!
//! All state lives behind one lock and is only mutated by the supervisor's own
//! tasks: the per-launch monitor (owns the `Child`), the output readers, the
//! liveness poll and the delayed restart. Every task is tagged with the launch
//! generation it belongs to, so events from a previous launch are ignored.

use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep, timeout};

use shared::{
    Component, LogEntry, LogLevel, LogSource, ServiceProcessInfo, ServiceStatus, component_debug,
    component_error, component_info, component_warn,
};

use crate::config::{ServiceConfig, SupervisorSettings};
use crate::error::{SupervisorError, SupervisorResult};
use crate::interpreter::{build_environment, ensure_script, resolve_interpreter};
use crate::log_buffer::{LogBuffer, classify_line};
use crate::services::SysinfoProbe;
use crate::traits::ProcessProbe;

/// Extra time `stop()` waits beyond the grace window for the kill to land
const STOP_MARGIN: Duration = Duration::from_secs(2);
const EVENT_CAPACITY: usize = 256;

/// Notifications for the host (forwarded to UI peers)
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Status(ServiceProcessInfo),
    Log(LogEntry),
}

/// Result of a successful `start()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartedProcess {
    pub pid: u32,
    pub port: u16,
}

enum StopRequest {
    /// Terminate gracefully, then signal completion
    Graceful(oneshot::Sender<()>),
    /// The process is considered gone; just make sure the handle is reaped
    Abandon,
}

struct ProcessControl {
    pid: u32,
    stop_tx: oneshot::Sender<StopRequest>,
}

struct SupervisorState {
    status: ServiceStatus,
    pid: Option<u32>,
    port: Option<u16>,
    started_at: Option<DateTime<Utc>>,
    restart_count: u32,
    last_error: Option<String>,
    logs: LogBuffer,
    config: Option<ServiceConfig>,
    generation: u64,
    control: Option<ProcessControl>,
    liveness_task: Option<JoinHandle<()>>,
    restart_task: Option<JoinHandle<()>>,
}

impl SupervisorState {
    fn new(log_capacity: usize) -> Self {
        Self {
            status: ServiceStatus::Stopped,
            pid: None,
            port: None,
            started_at: None,
            restart_count: 0,
            last_error: None,
            logs: LogBuffer::new(log_capacity),
            config: None,
            generation: 0,
            control: None,
            liveness_task: None,
            restart_task: None,
        }
    }

    fn snapshot(&self, include_logs: bool) -> ServiceProcessInfo {
        let uptime_secs = match (self.status, self.started_at) {
            (ServiceStatus::Running, Some(started)) => Some((Utc::now() - started).num_seconds().max(0) as u64),
            _ => None,
        };

        ServiceProcessInfo {
            status: self.status,
            pid: self.pid,
            port: self.port,
            started_at: self.started_at,
            uptime_secs,
            restart_count: self.restart_count,
            last_error: self.last_error.clone(),
            logs: if include_logs { self.logs.snapshot() } else { Vec::new() },
        }
    }

    fn clear_process(&mut self) {
        self.pid = None;
        self.started_at = None;
        self.control = None;
    }
}

struct Inner {
    settings: SupervisorSettings,
    probe: Arc<dyn ProcessProbe>,
    state: Mutex<SupervisorState>,
    events: broadcast::Sender<SupervisorEvent>,
}

/// Supervises a single worker process
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    /// Create a supervisor probing the real OS process table
    pub fn new(settings: SupervisorSettings) -> Self {
        Self::with_probe(settings, Arc::new(SysinfoProbe::new()))
    }

    pub fn with_probe(settings: SupervisorSettings, probe: Arc<dyn ProcessProbe>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SupervisorState::new(settings.log_capacity);

        Self {
            inner: Arc::new(Inner {
                settings,
                probe,
                state: Mutex::new(state),
                events,
            }),
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    /// Subscribe to status changes and captured log lines
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    /// Launch the worker; rejected while a process is already held
    pub async fn start(&self, config: ServiceConfig) -> SupervisorResult<StartedProcess> {
        let mut state = self.inner.state.lock().await;

        if state.status.is_active() {
            return Err(SupervisorError::AlreadyRunning { status: state.status });
        }

        // An explicit start replaces any pending automatic restart
        if let Some(task) = state.restart_task.take() {
            task.abort();
        }
        state.restart_count = 0;
        state.last_error = None;

        self.launch(&mut state, config).await
    }

    /// Stop the worker: graceful signal, then kill after the grace window
    pub async fn stop(&self) -> SupervisorResult<()> {
        let done_rx = {
            let mut state = self.inner.state.lock().await;

            if let Some(task) = state.restart_task.take() {
                task.abort();
            }
            if let Some(task) = state.liveness_task.take() {
                task.abort();
            }

            let Some(control) = state.control.take() else {
                if state.status != ServiceStatus::Stopped {
                    state.status = ServiceStatus::Stopped;
                    state.clear_process();
                    self.record(&mut state, LogLevel::Info, LogSource::Supervisor, "Worker stopped");
                    self.emit_status(&state);
                }
                return Ok(());
            };

            state.status = ServiceStatus::Stopping;
            let message = format!("Stopping worker (pid {})", control.pid);
            self.record(&mut state, LogLevel::Info, LogSource::Supervisor, message);
            self.emit_status(&state);

            let (done_tx, done_rx) = oneshot::channel();
            if control.stop_tx.send(StopRequest::Graceful(done_tx)).is_err() {
                state.status = ServiceStatus::Stopped;
                state.clear_process();
                self.emit_status(&state);
                return Ok(());
            }
            done_rx
        };

        let wait = self.inner.settings.stop_grace + STOP_MARGIN;
        if timeout(wait, done_rx).await.is_err() {
            component_warn!(Component::Supervisor, "⚠️ Timed out after {:?} waiting for worker to stop", wait);
        }

        Ok(())
    }

    /// Stop, settle, then start with the given or the previous configuration
    pub async fn restart(&self, config: Option<ServiceConfig>) -> SupervisorResult<StartedProcess> {
        let config = match config {
            Some(config) => config,
            None => self
                .inner
                .state
                .lock()
                .await
                .config
                .clone()
                .ok_or(SupervisorError::MissingConfig)?,
        };

        self.stop().await?;
        sleep(self.inner.settings.manual_restart_delay).await;
        self.start(config).await
    }

    /// Snapshot of the supervised process including the log tail
    pub async fn get_info(&self) -> ServiceProcessInfo {
        self.inner.state.lock().await.snapshot(true)
    }

    pub async fn status(&self) -> ServiceStatus {
        self.inner.state.lock().await.status
    }

    pub async fn is_running(&self) -> bool {
        self.status().await == ServiceStatus::Running
    }

    async fn launch(&self, state: &mut SupervisorState, config: ServiceConfig) -> SupervisorResult<StartedProcess> {
        state.status = ServiceStatus::Starting;
        state.port = Some(config.port);
        state.config = Some(config.clone());
        self.emit_status(state);

        let interpreter = resolve_interpreter(&config);
        component_debug!(
            Component::Supervisor,
            "Resolved interpreter {} ({:?})",
            interpreter.path.display(),
            interpreter.source
        );

        let provisioned = match ensure_script(&config.script_path).await {
            Ok(provisioned) => provisioned,
            Err(e) => return Err(self.fail_launch(state, e)),
        };
        if provisioned {
            let message = format!("Provisioned placeholder worker at {}", config.script_path.display());
            self.record(state, LogLevel::Warn, LogSource::Supervisor, message);
        }

        // The child runs from its own working dir, so hand it an absolute path
        let script = match tokio::fs::canonicalize(&config.script_path).await {
            Ok(script) => script,
            Err(e) => return Err(self.fail_launch(state, SupervisorError::IoError(e))),
        };

        let mut cmd = Command::new(&interpreter.path);
        cmd.arg(&script)
            .args(&config.args)
            .env_clear()
            .envs(build_environment(&config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = config.effective_working_dir() {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let error = SupervisorError::SpawnFailed {
                    interpreter: interpreter.path.clone(),
                    source,
                };
                return Err(self.fail_launch(state, error));
            }
        };

        let pid = child.id().unwrap_or(0);
        state.generation += 1;
        let generation = state.generation;

        state.status = ServiceStatus::Running;
        state.pid = Some(pid);
        state.started_at = Some(Utc::now());

        if let Some(stdout) = child.stdout.take() {
            self.spawn_output_reader(stdout, LogSource::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_output_reader(stderr, LogSource::Stderr);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        state.control = Some(ProcessControl { pid, stop_tx });
        tokio::spawn(self.clone().monitor(generation, child, stop_rx));
        state.liveness_task = Some(self.spawn_liveness(generation, pid));

        let message = format!("Worker running (pid {pid}, port {})", config.port);
        self.record(state, LogLevel::Info, LogSource::Supervisor, message);
        self.emit_status(state);
        component_info!(Component::Supervisor, "🐍 Spawned worker (PID: {}) on port {}", pid, config.port);

        Ok(StartedProcess { pid, port: config.port })
    }

    fn fail_launch(&self, state: &mut SupervisorState, error: SupervisorError) -> SupervisorError {
        state.status = ServiceStatus::Error;
        state.clear_process();
        state.last_error = Some(error.to_string());
        self.record(state, LogLevel::Error, LogSource::Supervisor, error.to_string());
        self.emit_status(state);
        component_error!(Component::Supervisor, "❌ Worker launch failed: {}", error);
        error
    }

    /// Owns the child for one launch until it exits or is told to stop
    async fn monitor(self, generation: u64, mut child: Child, mut stop_rx: oneshot::Receiver<StopRequest>) {
        tokio::select! {
            result = child.wait() => {
                self.on_exit(generation, result).await;
                // A stop that raced the exit still expects its completion signal
                if let Ok(StopRequest::Graceful(done)) = stop_rx.try_recv() {
                    let _ = done.send(());
                }
            }
            request = &mut stop_rx => match request {
                Ok(StopRequest::Graceful(done)) => {
                    self.terminate(&mut child).await;
                    self.on_stopped(generation).await;
                    let _ = done.send(());
                }
                Ok(StopRequest::Abandon) | Err(_) => {
                    if let Err(e) = child.kill().await {
                        component_warn!(Component::Supervisor, "⚠️ Failed to kill abandoned worker: {}", e);
                    }
                }
            }
        }
    }

    async fn terminate(&self, child: &mut Child) {
        let grace = self.inner.settings.stop_grace;
        send_graceful_signal(child);

        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                component_debug!(Component::Supervisor, "Worker exited after graceful signal: {}", status);
            }
            Ok(Err(e)) => {
                component_warn!(Component::Supervisor, "⚠️ Waiting for worker failed: {}", e);
            }
            Err(_) => {
                {
                    let mut state = self.inner.state.lock().await;
                    let message = format!("Worker did not exit within {grace:?}, killing");
                    self.record(&mut state, LogLevel::Warn, LogSource::Supervisor, message);
                }
                if let Err(e) = child.kill().await {
                    component_error!(Component::Supervisor, "❌ Failed to kill worker: {}", e);
                }
            }
        }
    }

    async fn on_stopped(&self, generation: u64) {
        let mut state = self.inner.state.lock().await;
        if state.generation != generation {
            return;
        }

        state.status = ServiceStatus::Stopped;
        state.clear_process();
        self.record(&mut state, LogLevel::Info, LogSource::Supervisor, "Worker stopped");
        self.emit_status(&state);
        component_info!(Component::Supervisor, "🛑 Worker stopped");
    }

    async fn on_exit(&self, generation: u64, result: std::io::Result<ExitStatus>) {
        let mut state = self.inner.state.lock().await;
        if state.generation != generation {
            return;
        }

        let previous = state.status;
        if !matches!(previous, ServiceStatus::Running | ServiceStatus::Stopping) {
            return;
        }

        state.control = None;
        if let Some(task) = state.liveness_task.take() {
            task.abort();
        }

        if previous == ServiceStatus::Stopping {
            state.status = ServiceStatus::Stopped;
            state.clear_process();
            self.record(&mut state, LogLevel::Info, LogSource::Supervisor, "Worker exited during shutdown");
            self.emit_status(&state);
            return;
        }

        let exit = describe_exit(&result);
        if !exit.unexpected {
            state.status = ServiceStatus::Stopped;
            state.clear_process();
            let message = format!("Worker exited ({})", exit.description);
            self.record(&mut state, LogLevel::Info, LogSource::Supervisor, message);
            self.emit_status(&state);
            return;
        }

        state.clear_process();
        self.handle_crash(&mut state, exit.description, exit.code);
    }

    async fn on_liveness_lost(&self, generation: u64, pid: u32) {
        let mut state = self.inner.state.lock().await;
        if state.generation != generation || state.status != ServiceStatus::Running {
            return;
        }

        // This runs on the liveness task itself; drop its handle without aborting
        state.liveness_task = None;
        if let Some(control) = state.control.take() {
            let _ = control.stop_tx.send(StopRequest::Abandon);
        }
        state.clear_process();

        let reason = format!("pid {pid} no longer present in the process table");
        self.handle_crash(&mut state, reason, None);
    }

    fn handle_crash(&self, state: &mut SupervisorState, reason: String, exit_code: Option<i32>) {
        let message = format!("Worker exited unexpectedly ({reason})");
        state.status = ServiceStatus::Error;
        state.last_error = Some(message.clone());
        self.record(state, LogLevel::Error, LogSource::Supervisor, message.clone());
        self.emit_status(state);
        component_error!(Component::Supervisor, "💥 {}", message);

        self.schedule_restart(state, exit_code);
    }

    fn schedule_restart(&self, state: &mut SupervisorState, exit_code: Option<i32>) {
        let Some(config) = state.config.clone() else {
            return;
        };

        if !config.auto_restart {
            self.record(state, LogLevel::Info, LogSource::Supervisor, "Auto-restart disabled");
            return;
        }

        if let Some(code) = exit_code.filter(|code| config.no_restart_exit_codes.contains(code)) {
            state.status = ServiceStatus::Stopped;
            let message = format!("Exit code {code} requests no restart");
            self.record(state, LogLevel::Info, LogSource::Supervisor, message);
            self.emit_status(state);
            return;
        }

        if state.restart_count >= config.max_restarts {
            state.status = ServiceStatus::Stopped;
            let message = format!(
                "Restart budget exhausted ({}/{}), explicit start required",
                state.restart_count, config.max_restarts
            );
            self.record(state, LogLevel::Error, LogSource::Supervisor, message.clone());
            self.emit_status(state);
            component_error!(Component::Supervisor, "🚫 {}", message);
            return;
        }

        state.restart_count += 1;
        let delay = self.inner.settings.crash_restart_delay;
        let message = format!(
            "Restarting worker in {:?} (attempt {}/{})",
            delay, state.restart_count, config.max_restarts
        );
        self.record(state, LogLevel::Warn, LogSource::Supervisor, message);
        self.emit_status(state);

        let generation = state.generation;
        let supervisor = self.clone();
        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            sleep(delay).await;
            supervisor.restart_after_crash(generation, config).await;
        });
        state.restart_task = Some(tokio::spawn(task));
    }

    async fn restart_after_crash(&self, generation: u64, config: ServiceConfig) {
        let mut state = self.inner.state.lock().await;

        // An explicit start or stop in the meantime wins
        if state.generation != generation || state.status != ServiceStatus::Error {
            return;
        }
        state.restart_task = None;

        if let Err(e) = self.launch(&mut state, config).await {
            component_error!(Component::Supervisor, "❌ Automatic restart failed: {}", e);
        }
    }

    fn spawn_liveness(&self, generation: u64, pid: u32) -> JoinHandle<()> {
        let supervisor = self.clone();
        let period = self.inner.settings.liveness_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if !supervisor.inner.probe.is_alive(pid) {
                    supervisor.on_liveness_lost(generation, pid).await;
                    break;
                }
            }
        })
    }

    fn spawn_output_reader<R>(&self, reader: R, source: LogSource)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        // Lossy decode; the pipe stays open until EOF
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']).to_string();
                        supervisor.capture_line(source, line).await;
                    }
                    Err(e) => {
                        component_debug!(Component::Supervisor, "Worker {:?} stream closed: {}", source, e);
                        break;
                    }
                }
            }
        });
    }

    async fn capture_line(&self, source: LogSource, line: String) {
        let level = classify_line(source, &line);
        component_debug!(Component::Supervisor, "[worker {:?}] {}", source, line);

        let mut state = self.inner.state.lock().await;
        self.record(&mut state, level, source, line);
    }

    fn record(&self, state: &mut SupervisorState, level: LogLevel, source: LogSource, message: impl Into<String>) {
        let entry = LogEntry::new(level, source, message);
        state.logs.push(entry.clone());
        let _ = self.inner.events.send(SupervisorEvent::Log(entry));
    }

    fn emit_status(&self, state: &SupervisorState) {
        let _ = self.inner.events.send(SupervisorEvent::Status(state.snapshot(false)));
    }
}

struct ExitDescription {
    description: String,
    unexpected: bool,
    code: Option<i32>,
}

fn describe_exit(result: &std::io::Result<ExitStatus>) -> ExitDescription {
    match result {
        Ok(status) if status.success() => ExitDescription {
            description: "exit code 0".to_string(),
            unexpected: false,
            code: Some(0),
        },
        Ok(status) => match status.code() {
            Some(code) => ExitDescription {
                description: format!("exit code {code}"),
                unexpected: true,
                code: Some(code),
            },
            None => ExitDescription {
                description: signal_description(status),
                unexpected: true,
                code: None,
            },
        },
        Err(e) => ExitDescription {
            description: format!("wait failed: {e}"),
            unexpected: true,
            code: None,
        },
    }
}

#[cfg(unix)]
fn signal_description(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => format!("signal {signal}"),
        None => "unknown termination".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_description(_status: &ExitStatus) -> String {
    "terminated without exit code".to_string()
}

#[cfg(unix)]
fn send_graceful_signal(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            component_warn!(Component::Supervisor, "⚠️ Failed to send SIGTERM to {}: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        component_warn!(Component::Supervisor, "⚠️ Failed to terminate worker: {}", e);
    }
}
