//! Process supervisor: owns the scheduler process and optional UI peers,
//! restarts a crashed peer within a bounded sliding-window budget, and
//! stops the whole group on operator interrupt.
//!
//! Peer lifecycle is an explicit state machine
//! (Starting → Running → Restarting → … → PermanentlyDown | Stopped) driven
//! through the `ProcessLauncher`/`ProcessHandle` seam, so tests inject fake
//! process handles instead of spawning anything real.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::RestartPolicy;

/// One supervised peer: a name for the activity log and an argv-style
/// command line.
#[derive(Debug, Clone)]
pub struct PeerSpec {
    pub name: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerExit {
    Clean,
    Error(Option<i32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    Starting,
    Running,
    Restarting,
    PermanentlyDown,
    Stopped,
}

/// A live peer process, abstracted for testability.
#[async_trait]
pub trait ProcessHandle: Send {
    async fn wait(&mut self) -> PeerExit;

    /// Stop the process: give it `grace` to exit on its own (the
    /// operator's interrupt reaches the whole process group), then kill
    /// it. True when it went down within the grace period.
    async fn stop(&mut self, grace: Duration) -> bool;
}

pub trait ProcessLauncher: Send + Sync + 'static {
    fn spawn(&self, spec: &PeerSpec) -> anyhow::Result<Box<dyn ProcessHandle>>;
}

/// Real launcher backed by `tokio::process`.
pub struct TokioLauncher;

struct ChildHandle(Child);

#[async_trait]
impl ProcessHandle for ChildHandle {
    async fn wait(&mut self) -> PeerExit {
        match self.0.wait().await {
            Ok(status) if status.success() => PeerExit::Clean,
            Ok(status) => PeerExit::Error(status.code()),
            Err(e) => {
                warn!(error = %e, "waiting on peer failed");
                PeerExit::Error(None)
            }
        }
    }

    async fn stop(&mut self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.0.wait()).await {
            Ok(_) => true,
            Err(_) => {
                let _ = self.0.start_kill();
                let _ = self.0.wait().await;
                false
            }
        }
    }
}

impl ProcessLauncher for TokioLauncher {
    fn spawn(&self, spec: &PeerSpec) -> anyhow::Result<Box<dyn ProcessHandle>> {
        let (program, args) = spec
            .command
            .split_first()
            .with_context(|| format!("peer {} has an empty command", spec.name))?;
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning peer {}", spec.name))?;
        Ok(Box::new(ChildHandle(child)))
    }
}

/// Sliding-window restart budget: at most `max_restarts` recorded attempts
/// within the trailing window.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    max_restarts: u32,
    window_secs: u64,
    attempts: VecDeque<u64>,
}

impl RestartBudget {
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts,
            window_secs: window.as_secs(),
            attempts: VecDeque::new(),
        }
    }

    /// Whether another restart is allowed at `now`; records it when so.
    pub fn try_restart(&mut self, now_secs: u64) -> bool {
        let cutoff = now_secs.saturating_sub(self.window_secs);
        while self.attempts.front().is_some_and(|t| *t < cutoff) {
            self.attempts.pop_front();
        }
        if (self.attempts.len() as u32) < self.max_restarts {
            self.attempts.push_back(now_secs);
            true
        } else {
            false
        }
    }
}

/// Final word on one peer when its monitor ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReport {
    pub name: String,
    pub phase: PeerPhase,
    /// False only when the peer had to be force-killed on shutdown.
    pub stopped_clean: bool,
}

/// Monitor one peer: launch, restart on exit within budget, stop on
/// shutdown signal.
pub async fn supervise_peer<L: ProcessLauncher>(
    launcher: Arc<L>,
    spec: PeerSpec,
    policy: RestartPolicy,
    grace: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> PeerReport {
    let mut budget = RestartBudget::new(policy.max_restarts, policy.window());
    info!(peer = %spec.name, "starting peer");

    loop {
        let mut handle = match launcher.spawn(&spec) {
            Ok(h) => h,
            Err(e) => {
                error!(peer = %spec.name, error = %e, "failed to spawn peer");
                if budget.try_restart(unix_now()) {
                    warn!(peer = %spec.name, "retrying spawn");
                    continue;
                }
                error!(peer = %spec.name, "restart budget exhausted, peer is permanently down");
                return PeerReport {
                    name: spec.name,
                    phase: PeerPhase::PermanentlyDown,
                    stopped_clean: true,
                };
            }
        };
        info!(peer = %spec.name, "peer running");

        tokio::select! {
            exit = handle.wait() => {
                match exit {
                    PeerExit::Clean => info!(peer = %spec.name, "peer exited"),
                    PeerExit::Error(code) => {
                        warn!(peer = %spec.name, code = ?code, "peer exited unexpectedly")
                    }
                }
                if budget.try_restart(unix_now()) {
                    warn!(peer = %spec.name, "restarting peer");
                    continue;
                }
                error!(peer = %spec.name, "restart budget exhausted, peer is permanently down");
                return PeerReport {
                    name: spec.name,
                    phase: PeerPhase::PermanentlyDown,
                    stopped_clean: true,
                };
            }
            _ = wait_for_shutdown(&mut shutdown) => {
                let clean = handle.stop(grace).await;
                if clean {
                    info!(peer = %spec.name, "peer stopped");
                } else {
                    warn!(peer = %spec.name, "peer did not stop in time and was killed");
                }
                return PeerReport {
                    name: spec.name,
                    phase: PeerPhase::Stopped,
                    stopped_clean: clean,
                };
            }
        }
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    // an already-set flag or a closed channel both mean "stop"
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

pub struct Supervisor<L: ProcessLauncher> {
    launcher: Arc<L>,
    peers: Vec<PeerSpec>,
    policy: RestartPolicy,
    grace: Duration,
}

impl<L: ProcessLauncher> Supervisor<L> {
    pub fn new(launcher: L, peers: Vec<PeerSpec>, policy: RestartPolicy, grace: Duration) -> Self {
        Self {
            launcher: Arc::new(launcher),
            peers,
            policy,
            grace,
        }
    }

    /// Run until `interrupt` resolves (the operator's ctrl-c) or every
    /// peer has gone permanently down. Returns the process exit code:
    /// 0 when every peer stopped cleanly, non-zero otherwise.
    pub async fn run<F>(self, interrupt: F) -> i32
    where
        F: Future<Output = ()> + Send,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut monitors = JoinSet::new();
        for spec in &self.peers {
            monitors.spawn(supervise_peer(
                Arc::clone(&self.launcher),
                spec.clone(),
                self.policy,
                self.grace,
                shutdown_rx.clone(),
            ));
        }
        drop(shutdown_rx);

        let mut reports: Vec<PeerReport> = Vec::new();
        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("shutdown requested, stopping all peers");
                    let _ = shutdown_tx.send(true);
                    break;
                }
                joined = monitors.join_next() => {
                    match joined {
                        Some(Ok(report)) => reports.push(report),
                        Some(Err(e)) => error!(error = %e, "peer monitor died"),
                        None => break, // every peer settled on its own
                    }
                }
            }
        }

        while let Some(joined) = monitors.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "peer monitor died"),
            }
        }

        let force_killed = reports.iter().filter(|r| !r.stopped_clean).count();
        let down = reports
            .iter()
            .filter(|r| r.phase == PeerPhase::PermanentlyDown)
            .count();
        info!(peers = reports.len(), force_killed, down, "supervisor exiting");

        if force_killed > 0 || down > 0 {
            1
        } else {
            0
        }
    }
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
