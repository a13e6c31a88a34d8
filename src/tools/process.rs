//! Background shell processes started by `run_command`.
//!
//! Each process owns one output buffer behind a single lock. Reader tasks
//! drain stdout and stderr into it as raw bytes, decoded lossily; tools only
//! ever read or clear it. The buffer holds at most `max_output_bytes` between
//! reads, and the pipes keep draining once it is full.

use crate::config::ToolsConfig;
use dashmap::DashMap;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};

const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exit code, or `None` when killed by a signal.
    Exited(Option<i32>),
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Exited(Some(code)) => write!(f, "exited ({code})"),
            Self::Exited(None) => f.write_str("exited (signal)"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Process '{0}' not found")]
    NotFound(String),
    #[error("Process '{0}' has already exited")]
    AlreadyExited(String),
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
}

struct OutputBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &str) {
        if self.truncated {
            return;
        }
        let room = self.limit.saturating_sub(self.text.len());
        if chunk.len() <= room {
            self.text.push_str(chunk);
            return;
        }
        self.text.push_str(&chunk[..chunk.floor_char_boundary(room)]);
        self.text.push_str(&format!(
            "\n... [output truncated at {} bytes]",
            self.limit
        ));
        self.truncated = true;
    }

    fn take(&mut self) -> String {
        self.truncated = false;
        std::mem::take(&mut self.text)
    }
}

struct BackgroundProcess {
    child: tokio::sync::Mutex<Child>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    output: Arc<Mutex<OutputBuffer>>,
}

impl BackgroundProcess {
    async fn status(&self) -> ProcessStatus {
        let mut child = self.child.lock().await;
        match child.try_wait() {
            Ok(Some(status)) => ProcessStatus::Exited(status.code()),
            Ok(None) => ProcessStatus::Running,
            Err(e) => {
                tracing::warn!("failed to poll background process: {e}");
                ProcessStatus::Exited(None)
            }
        }
    }

    async fn kill(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            tracing::debug!("kill on finished process: {e}");
        }
        if tokio::time::timeout(TERMINATE_GRACE, child.wait())
            .await
            .is_err()
        {
            tracing::warn!("background process did not exit after kill");
        }
    }
}

/// Table of live background processes, keyed by `proc_<n>`.
pub struct ProcessTable {
    entries: DashMap<String, Arc<BackgroundProcess>>,
    counter: AtomicU64,
    max_output_bytes: usize,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            counter: AtomicU64::new(0),
            max_output_bytes: ToolsConfig::default().max_output_bytes,
        }
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each process's unread output to `max_output_bytes`.
    pub fn with_output_limit(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Start `command` under `sh -c` in `cwd` and return its id.
    pub fn spawn(&self, command: &str, cwd: &Path) -> Result<String, ProcessError> {
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = Arc::new(Mutex::new(OutputBuffer::new(self.max_output_bytes)));
        if let Some(stdout) = child.stdout.take() {
            drain_into(stdout, Arc::clone(&output));
        }
        if let Some(stderr) = child.stderr.take() {
            drain_into(stderr, Arc::clone(&output));
        }
        let stdin = child.stdin.take();

        let id = format!("proc_{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.entries.insert(
            id.clone(),
            Arc::new(BackgroundProcess {
                child: tokio::sync::Mutex::new(child),
                stdin: tokio::sync::Mutex::new(stdin),
                output,
            }),
        );
        tracing::info!(process_id = %id, command, "background process started");
        Ok(id)
    }

    fn entry(&self, id: &str) -> Result<Arc<BackgroundProcess>, ProcessError> {
        self.entries
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProcessError::NotFound(id.to_string()))
    }

    /// Current status and buffered output, optionally clearing the buffer.
    pub async fn read_output(
        &self,
        id: &str,
        clear: bool,
    ) -> Result<(ProcessStatus, String), ProcessError> {
        let process = self.entry(id)?;
        let status = process.status().await;
        let mut buffer = process
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let output = if clear {
            buffer.take()
        } else {
            buffer.text.clone()
        };
        Ok((status, output))
    }

    /// Write `input` to the process's stdin.
    pub async fn send_input(&self, id: &str, input: &str) -> anyhow::Result<()> {
        let process = self.entry(id)?;
        if matches!(process.status().await, ProcessStatus::Exited(_)) {
            return Err(ProcessError::AlreadyExited(id.to_string()).into());
        }
        let mut stdin = process.stdin.lock().await;
        let pipe = stdin
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("stdin of '{id}' is closed"))?;
        pipe.write_all(input.as_bytes()).await?;
        pipe.flush().await?;
        Ok(())
    }

    /// Kill the process and forget it.
    pub async fn terminate(&self, id: &str) -> Result<(), ProcessError> {
        let (_, process) = self
            .entries
            .remove(id)
            .ok_or_else(|| ProcessError::NotFound(id.to_string()))?;
        process.kill().await;
        tracing::info!(process_id = id, "background process terminated");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kill every remaining process.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, process)) = self.entries.remove(&id) {
                process.kill().await;
            }
        }
    }
}

fn drain_into<R>(reader: R, output: Arc<Mutex<OutputBuffer>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let chunk = String::from_utf8_lossy(&line);
                    output
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(&chunk);
                }
                Err(e) => {
                    tracing::debug!("background output reader stopped: {e}");
                    break;
                }
            }
        }
    });
}
