// tests/supervisor_restart.rs
//
// Supervision invariants with injected fake process handles: bounded
// crash-loop restarts, clean group shutdown, and the force-kill exit code.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forex_news_analyzer::config::RestartPolicy;
use forex_news_analyzer::supervisor::{
    supervise_peer, PeerExit, PeerPhase, PeerSpec, ProcessHandle, ProcessLauncher, Supervisor,
};
use tokio::sync::watch;

#[derive(Clone, Copy)]
enum Behavior {
    /// Exits with an error shortly after each (re)start.
    CrashLoop,
    /// Runs until asked to stop, then stops within the grace period.
    WellBehaved,
    /// Runs until asked to stop, then ignores the request.
    Stubborn,
}

struct FakeHandle {
    behavior: Behavior,
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    async fn wait(&mut self) -> PeerExit {
        match self.behavior {
            Behavior::CrashLoop => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                PeerExit::Error(Some(1))
            }
            _ => std::future::pending().await,
        }
    }

    async fn stop(&mut self, _grace: Duration) -> bool {
        !matches!(self.behavior, Behavior::Stubborn)
    }
}

struct FakeLauncher {
    behavior: Behavior,
    spawns: Arc<AtomicUsize>,
}

impl FakeLauncher {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            spawns: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ProcessLauncher for FakeLauncher {
    fn spawn(&self, _spec: &PeerSpec) -> anyhow::Result<Box<dyn ProcessHandle>> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            behavior: self.behavior,
        }))
    }
}

fn spec(name: &str) -> PeerSpec {
    PeerSpec {
        name: name.into(),
        command: vec!["unused".into()],
    }
}

#[tokio::test]
async fn crash_looping_peer_goes_permanently_down_after_the_budget() {
    let launcher = Arc::new(FakeLauncher::new(Behavior::CrashLoop));
    let spawns = Arc::clone(&launcher.spawns);
    let (_tx, rx) = watch::channel(false);

    let policy = RestartPolicy {
        max_restarts: 3,
        window_secs: 60,
    };
    let report = supervise_peer(
        launcher,
        spec("dashboard"),
        policy,
        Duration::from_secs(1),
        rx,
    )
    .await;

    assert_eq!(report.phase, PeerPhase::PermanentlyDown);
    // initial start + exactly 3 restarts, never a 4th
    assert_eq!(spawns.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn interrupt_stops_all_peers_and_exits_zero() {
    let supervisor = Supervisor::new(
        FakeLauncher::new(Behavior::WellBehaved),
        vec![spec("scheduler"), spec("dashboard")],
        RestartPolicy::default(),
        Duration::from_secs(1),
    );

    let code = supervisor
        .run(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        })
        .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn a_peer_that_cannot_be_stopped_makes_the_exit_nonzero() {
    let supervisor = Supervisor::new(
        FakeLauncher::new(Behavior::Stubborn),
        vec![spec("scheduler")],
        RestartPolicy::default(),
        Duration::from_millis(50),
    );

    let code = supervisor
        .run(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        })
        .await;
    assert_ne!(code, 0);
}
