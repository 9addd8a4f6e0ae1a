//! Sandbox runner
//!
//! Runs a [`SandboxJob`] in a separate `flow-sandbox-worker` process and
//! watches it. Every poll interval the runner checks whether the worker has
//! exited, how long it has been running and how much resident memory it
//! holds. Crossing either ceiling kills the worker.
//!
//! # Example
//!
//! ```ignore
//! let runner = SandboxRunner::from_config(&config)?;
//! let output = runner.run(&job, &SandboxLimits::from_config(&config)).await?;
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flow_engine::{FlowConfig, FlowError, ResourceLimit, Result, ValueMap};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::interpreter::{SandboxJob, WorkerReply};

/// File name of the worker binary
pub const WORKER_BINARY: &str = "flow-sandbox-worker";

/// Ceilings for one worker
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxLimits {
    pub max_memory_mb: u64,
    pub time_limit: Duration,
    pub poll_interval: Duration,
}

impl SandboxLimits {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            max_memory_mb: config.custom_code_max_memory_mb,
            time_limit: config.custom_code_time_limit(),
            poll_interval: config.custom_code_poll_interval(),
        }
    }
}

/// Spawns and supervises sandbox workers.
///
/// Clones share the spawn counter.
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    worker_path: PathBuf,
    spawn_count: Arc<AtomicUsize>,
}

impl SandboxRunner {
    pub fn new(worker_path: impl Into<PathBuf>) -> Self {
        Self {
            worker_path: worker_path.into(),
            spawn_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runner for the configured worker path, or the worker installed next
    /// to the current executable.
    pub fn from_config(config: &FlowConfig) -> Result<Self> {
        match &config.custom_code_worker_path {
            Some(path) => Ok(Self::new(path)),
            None => locate_worker().map(Self::new),
        }
    }

    pub fn worker_path(&self) -> &Path {
        &self.worker_path
    }

    /// Number of workers started so far
    pub fn spawn_count(&self) -> usize {
        self.spawn_count.load(Ordering::SeqCst)
    }

    /// Run a job and return the script's `output` object.
    pub async fn run(&self, job: &SandboxJob, limits: &SandboxLimits) -> Result<ValueMap> {
        let mut child = Command::new(&self.worker_path)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                FlowError::failed(format!(
                    "Failed to start sandbox worker {}: {}",
                    self.worker_path.display(),
                    e
                ))
            })?;
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        log::debug!("Started sandbox worker pid {:?}", child.id());

        let stdout = child.stdout.take().map(read_all);
        let stderr = child.stderr.take().map(read_all);

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(job)?;
            if let Err(e) = stdin.write_all(&payload).await {
                log::warn!("Failed to send job to sandbox worker: {}", e);
            }
        }

        supervise(&mut child, limits).await?;

        if let Some(stderr) = stderr {
            let text = stderr.await.unwrap_or_default();
            if !text.trim().is_empty() {
                log::debug!("Sandbox worker stderr: {}", text.trim());
            }
        }

        let text = match stdout {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        match parse_reply(&text) {
            Some(WorkerReply::Success { output }) => Ok(output),
            Some(WorkerReply::Error { message }) => {
                Err(FlowError::failed(format!("Custom code raised: {}", message)))
            }
            None => Err(FlowError::failed("Process terminated without result")),
        }
    }
}

/// Find the worker beside the current executable, or one directory up (test
/// binaries live in `deps/`).
fn locate_worker() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let name = format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX);
    let found = exe
        .parent()
        .into_iter()
        .flat_map(|dir| [Some(dir), dir.parent()])
        .flatten()
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file());
    found.ok_or_else(|| {
        FlowError::config(format!(
            "Sandbox worker '{}' not found next to {}",
            name,
            exe.display()
        ))
    })
}

fn read_all<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = String::new();
        if let Err(e) = reader.read_to_string(&mut buf).await {
            log::warn!("Failed to read sandbox worker output: {}", e);
        }
        buf
    })
}

/// The last line that parses as a worker reply
fn parse_reply(stdout: &str) -> Option<WorkerReply> {
    stdout
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str(line).ok())
}

/// Poll the worker until it exits or crosses a ceiling.
async fn supervise(child: &mut Child, limits: &SandboxLimits) -> Result<()> {
    let started = Instant::now();
    let pid = child.id().map(Pid::from_u32);
    let mut system = System::new();

    loop {
        if let Some(status) = child.try_wait()? {
            log::debug!("Sandbox worker exited with {}", status);
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= limits.time_limit {
            terminate(child).await;
            return Err(FlowError::ResourceLimit(ResourceLimit::TimeExceeded {
                limit_secs: limits.time_limit.as_secs_f64(),
            }));
        }

        if let Some(used_mb) = pid.and_then(|pid| resident_mb(&mut system, pid)) {
            if used_mb > limits.max_memory_mb as f64 {
                terminate(child).await;
                return Err(FlowError::ResourceLimit(ResourceLimit::MemoryExceeded {
                    used_mb,
                    limit_mb: limits.max_memory_mb,
                }));
            }
        }

        let remaining = limits.time_limit.saturating_sub(elapsed);
        tokio::time::sleep(limits.poll_interval.min(remaining)).await;
    }
}

fn resident_mb(system: &mut System, pid: Pid) -> Option<f64> {
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new().with_memory(),
    );
    system
        .process(pid)
        .map(|process| process.memory() as f64 / (1024.0 * 1024.0))
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::warn!("Failed to kill sandbox worker: {}", e);
        return;
    }
    if let Err(e) = child.wait().await {
        log::warn!("Failed to reap sandbox worker: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reply_takes_last_reply_line() {
        let text = "noise\n{\"status\":\"success\",\"output\":{\"x\":1}}\n\n";
        match parse_reply(text) {
            Some(WorkerReply::Success { output }) => assert_eq!(output["x"], json!(1)),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(parse_reply("").is_none());
        assert!(parse_reply("Segmentation fault").is_none());
    }

    #[test]
    fn test_limits_from_config() {
        let config = FlowConfig {
            custom_code_max_memory_mb: 64,
            custom_code_max_cpu_seconds: 2.0,
            ..Default::default()
        };
        let limits = SandboxLimits::from_config(&config);
        assert_eq!(limits.max_memory_mb, 64);
        assert_eq!(limits.time_limit, Duration::from_secs(2));
        assert_eq!(limits.poll_interval, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_missing_worker_fails_without_counting() {
        let runner = SandboxRunner::new("/nonexistent/flow-sandbox-worker");
        let limits = SandboxLimits::from_config(&FlowConfig::default());
        let err = runner.run(&SandboxJob::default(), &limits).await.unwrap_err();
        assert_eq!(err.kind(), "execution_error");
        assert_eq!(runner.spawn_count(), 0);
    }

    #[test]
    fn test_default_lookup_finds_worker_or_reports_config_error() {
        match SandboxRunner::from_config(&FlowConfig::default()) {
            Ok(runner) => {
                let file = runner.worker_path().file_name().unwrap().to_string_lossy();
                assert!(file.starts_with(WORKER_BINARY));
                assert!(runner.worker_path().is_file());
            }
            Err(err) => {
                assert_eq!(err.kind(), "configuration_error");
                assert!(err.to_string().contains(WORKER_BINARY));
            }
        }
    }

    #[test]
    fn test_configured_worker_path_wins() {
        let config = FlowConfig {
            custom_code_worker_path: Some(PathBuf::from("/opt/worker")),
            ..Default::default()
        };
        let runner = SandboxRunner::from_config(&config).unwrap();
        assert_eq!(runner.worker_path(), Path::new("/opt/worker"));
    }
}
