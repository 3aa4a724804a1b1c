//! Sandboxed execution of model-written scripts
//!
//! Generated code is untrusted. When execution is enabled it runs as a child
//! process with:
//! - a fresh temporary working directory, removed afterwards
//! - an empty environment apart from `PATH` (no API keys leak in)
//! - stdin closed and a wall-clock timeout (the child is killed on expiry)
//! - CPU-time and address-space rlimits on Unix
//! - stdout/stderr capped at `max_output_bytes`

use super::CodeRunner;
use crate::config::ExecutionConfig;
use async_trait::async_trait;
use sdk::errors::EngineError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

const SCRIPT_NAME: &str = "task.py";

#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: String,
    timeout: Duration,
    max_output_bytes: usize,
    cpu_seconds: u64,
    memory_mb: u64,
}

impl ProcessSandbox {
    /// Build a sandbox from config, or `None` when execution is disabled.
    pub fn from_config(config: &ExecutionConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        warn!(
            interpreter = %config.interpreter,
            timeout_secs = config.timeout_secs,
            "Code execution is ENABLED: model-generated scripts will run on this host"
        );
        Some(Self {
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
            cpu_seconds: config.cpu_seconds,
            memory_mb: config.memory_mb,
        })
    }

    fn build_command(&self, workdir: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(SCRIPT_NAME)
            .current_dir(workdir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }

        #[cfg(unix)]
        {
            let cpu = self.cpu_seconds;
            let memory_bytes = self.memory_mb.saturating_mul(1024 * 1024);
            // SAFETY: the closure only calls setrlimit, which is async-signal-safe.
            unsafe {
                cmd.pre_exec(move || apply_limits(cpu, memory_bytes));
            }
        }

        cmd
    }
}

#[cfg(unix)]
fn apply_limits(cpu_seconds: u64, memory_bytes: u64) -> std::io::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};

    if cpu_seconds > 0 {
        setrlimit(Resource::RLIMIT_CPU, cpu_seconds, cpu_seconds)?;
    }
    #[cfg(target_os = "linux")]
    {
        if memory_bytes > 0 {
            setrlimit(Resource::RLIMIT_AS, memory_bytes, memory_bytes)?;
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = memory_bytes;
    Ok(())
}

/// Read up to `cap` bytes, then drain the rest so the child never blocks on a
/// full pipe. Returns the kept bytes and whether anything was dropped.
async fn read_capped<R>(reader: Option<R>, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut kept = Vec::new();
    (&mut reader).take(cap as u64).read_to_end(&mut kept).await?;
    let dropped = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok((kept, dropped > 0))
}

fn render(bytes: &[u8], truncated: bool) -> String {
    let mut text = String::from_utf8_lossy(bytes).trim_end().to_string();
    if truncated {
        text.push_str("\n[output truncated]");
    }
    text
}

#[async_trait]
impl CodeRunner for ProcessSandbox {
    async fn run(&self, code: &str) -> Result<String, EngineError> {
        let workdir = tempfile::tempdir()?;
        tokio::fs::write(workdir.path().join(SCRIPT_NAME), code).await?;

        info!(
            interpreter = %self.interpreter,
            bytes = code.len(),
            "Executing generated script"
        );

        let mut child = self.build_command(workdir.path()).spawn().map_err(|e| {
            EngineError::CodeExecution(format!("failed to start '{}': {}", self.interpreter, e))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cap = self.max_output_bytes;

        let run = async {
            let (out, err, status) = tokio::join!(
                read_capped(stdout, cap),
                read_capped(stderr, cap),
                child.wait()
            );
            Ok::<_, std::io::Error>((out?, err?, status?))
        };

        let ((out, out_truncated), (err, err_truncated), status) =
            match tokio::time::timeout(self.timeout, run).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout_secs = self.timeout.as_secs(), "Generated script timed out");
                    return Err(EngineError::CodeTimeout(self.timeout.as_secs()));
                }
            };

        let stdout = render(&out, out_truncated);
        let stderr = render(&err, err_truncated);
        debug!(status = ?status.code(), stdout = stdout.len(), stderr = stderr.len(), "Script finished");

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(EngineError::CodeExecution(format!(
                "exit status {}: {}",
                code,
                if stderr.is_empty() { &stdout } else { &stderr }
            )));
        }

        if stdout.is_empty() && !stderr.is_empty() {
            Ok(stderr)
        } else {
            Ok(stdout)
        }
    }
}
