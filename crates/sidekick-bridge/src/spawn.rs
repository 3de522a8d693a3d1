//! Fire-and-forget submission of passes.
//!
//! A fired trigger must never wait for the pass. Hook deployments start a
//! detached `sidekick pass` process per fire; long-running hosts (and tests)
//! feed an in-process worker queue instead.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::pass::{PassRequest, PassRunner};

pub trait PassSpawner {
    /// Hand `req` off for background execution. Never blocks; a request that
    /// cannot be scheduled is dropped and logged.
    fn submit(&self, req: PassRequest);
}

/// Runs each pass in its own detached `sidekick pass` process.
#[derive(Debug, Clone)]
pub struct DetachedProcess {
    exe: PathBuf,
}

impl DetachedProcess {
    pub fn new(exe: PathBuf) -> Self {
        Self { exe }
    }

    /// Re-invoke the running executable.
    pub fn current_exe() -> anyhow::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn command(&self, req: &PassRequest) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("pass").arg("--cwd").arg(&req.cwd);
        if let Some(t) = &req.transcript {
            cmd.arg("--transcript").arg(t);
        }
        cmd.current_dir(&req.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group: the host's signals to the hook do not reach the pass.
            cmd.process_group(0);
        }
        cmd
    }
}

impl PassSpawner for DetachedProcess {
    fn submit(&self, req: PassRequest) {
        match self.command(&req).spawn() {
            Ok(child) => tracing::debug!(pid = child.id(), cwd = %req.cwd.display(), "pass process started"),
            Err(e) => tracing::warn!(exe = %self.exe.display(), error = %e, "cannot start pass process"),
        }
    }
}

/// Bounded in-process queue drained by a fixed set of worker tasks.
pub struct PassQueue {
    tx: mpsc::Sender<PassRequest>,
    workers: Vec<JoinHandle<()>>,
}

impl PassQueue {
    /// Start `workers` tasks on the current runtime.
    pub fn start(runner: PassRunner, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let runner = Arc::new(runner);
        let workers = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let runner = Arc::clone(&runner);
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(req) = next else { break };
                        // Outcome and errors are logged by the runner.
                        let _ = runner.run(&req).await;
                    }
                    tracing::debug!(worker, "pass worker stopped");
                })
            })
            .collect();
        Self { tx, workers }
    }

    /// Stop accepting requests and wait for queued passes to finish.
    pub async fn close(self) {
        drop(self.tx);
        for w in self.workers {
            let _ = w.await;
        }
    }
}

impl PassSpawner for PassQueue {
    fn submit(&self, req: PassRequest) {
        if let Err(e) = self.tx.try_send(req) {
            tracing::warn!(error = %e, "pass queue full, dropping request");
        }
    }
}
