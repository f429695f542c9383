//! Launch preparation: interpreter resolution, entry script, environment

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use shared::{Component, component_debug, component_warn};

use crate::config::ServiceConfig;
use crate::error::{SupervisorError, SupervisorResult};

/// Variables forced into the worker environment after every override
pub const FORCED_ENV: &[(&str, &str)] = &[("PYTHONUNBUFFERED", "1"), ("PYTHONIOENCODING", "utf-8")];
pub const PORT_ENV: &str = "SERVICE_PORT";

#[cfg(windows)]
const PLATFORM_DEFAULT: &str = "python";
#[cfg(not(windows))]
const PLATFORM_DEFAULT: &str = "python3";

/// Minimal worker written when the configured script does not exist yet
pub const PLACEHOLDER_SCRIPT: &str = r#"# Placeholder worker provisioned by the host supervisor.
# Replace with the real worker; it only answers the health check.
import json
import os
from http.server import BaseHTTPRequestHandler, HTTPServer

PORT = int(os.environ.get("SERVICE_PORT", "8000"))


class Handler(BaseHTTPRequestHandler):
    def _send(self, code, payload):
        body = json.dumps(payload).encode("utf-8")
        self.send_response(code)
        self.send_header("Content-Type", "application/json")
        self.send_header("Content-Length", str(len(body)))
        self.end_headers()
        self.wfile.write(body)

    def do_GET(self):
        if self.path == "/health":
            self._send(200, {"success": True, "data": {"status": "healthy"}})
        else:
            self._send(404, {"success": False, "error": "placeholder worker"})

    def log_message(self, fmt, *args):
        print(fmt % args, flush=True)


if __name__ == "__main__":
    print(f"placeholder worker listening on 127.0.0.1:{PORT}", flush=True)
    HTTPServer(("127.0.0.1", PORT), Handler).serve_forever()
"#;

/// Which resolution step produced the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterSource {
    Explicit,
    Venv,
    SystemPath,
    PlatformDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterpreter {
    pub path: PathBuf,
    pub source: InterpreterSource,
}

/// Resolve the interpreter: explicit path, venv, PATH lookup, platform default
pub fn resolve_interpreter(config: &ServiceConfig) -> ResolvedInterpreter {
    if let Some(explicit) = &config.python_path {
        return ResolvedInterpreter {
            path: explicit.clone(),
            source: InterpreterSource::Explicit,
        };
    }

    if let Some(venv) = &config.venv_path {
        if let Some(path) = venv_interpreter(venv) {
            return ResolvedInterpreter {
                path,
                source: InterpreterSource::Venv,
            };
        }
        component_warn!(Component::Supervisor, "⚠️ No interpreter found in venv {}", venv.display());
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which::which(candidate) {
            return ResolvedInterpreter {
                path,
                source: InterpreterSource::SystemPath,
            };
        }
    }

    ResolvedInterpreter {
        path: PathBuf::from(PLATFORM_DEFAULT),
        source: InterpreterSource::PlatformDefault,
    }
}

fn venv_interpreter(venv: &Path) -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(windows) {
        &["Scripts/python.exe"]
    } else {
        &["bin/python3", "bin/python"]
    };

    candidates
        .iter()
        .map(|relative| venv.join(relative))
        .find(|path| path.is_file())
}

/// Make sure the entry script exists, writing the placeholder if it does not
///
/// Returns `true` when the placeholder was provisioned.
pub async fn ensure_script(path: &Path) -> SupervisorResult<bool> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }

    let provision_err = |source| SupervisorError::ScriptProvisionFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(provision_err)?;
    }
    tokio::fs::write(path, PLACEHOLDER_SCRIPT).await.map_err(provision_err)?;

    component_warn!(
        Component::Supervisor,
        "📝 Worker script missing, provisioned placeholder at {}",
        path.display()
    );
    Ok(true)
}

/// Inherited env, then caller overrides, then the forced launch contract
pub fn build_environment(config: &ServiceConfig) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.extend(config.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    for (key, value) in FORCED_ENV {
        env.insert((*key).to_string(), (*value).to_string());
    }
    env.insert(PORT_ENV.to_string(), config.port.to_string());

    component_debug!(Component::Supervisor, "Worker environment has {} variables", env.len());
    env
}
