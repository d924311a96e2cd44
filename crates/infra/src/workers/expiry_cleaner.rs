use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::sessions::SessionRepository;
use crate::tokens::TokenRepository;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);
pub const PASS_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request shutdown and wait for the worker task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.join.await {
            warn!(error = %err, "background worker ended abnormally");
        }
    }
}

/// One unit of periodic cleanup.
#[async_trait::async_trait]
pub trait Sweeper: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns how many rows were removed.
    async fn sweep(&self) -> anyhow::Result<u64>;
}

/// Purges expired registration and verification tokens.
pub struct TokenSweeper(pub Arc<dyn TokenRepository>);

#[async_trait::async_trait]
impl Sweeper for TokenSweeper {
    fn name(&self) -> &'static str {
        "tokens"
    }

    async fn sweep(&self) -> anyhow::Result<u64> {
        Ok(self.0.delete_expired().await?.total())
    }
}

/// Purges expired session rows.
pub struct SessionSweeper(pub Arc<dyn SessionRepository>);

#[async_trait::async_trait]
impl Sweeper for SessionSweeper {
    fn name(&self) -> &'static str {
        "sessions"
    }

    async fn sweep(&self) -> anyhow::Result<u64> {
        Ok(self.0.delete_expired().await?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CleanerConfig {
    pub interval: Duration,
    pub pass_timeout: Duration,
}

impl CleanerConfig {
    /// Intervals under [`MIN_INTERVAL`] fall back to [`DEFAULT_INTERVAL`].
    pub fn with_interval(interval: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            DEFAULT_INTERVAL
        } else {
            interval
        };
        Self {
            interval,
            pass_timeout: PASS_TIMEOUT,
        }
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self::with_interval(DEFAULT_INTERVAL)
    }
}

/// Periodic cleanup of expired rows.
///
/// - Runs one pass immediately, then once per interval
/// - Every sweeper gets its own timeout per pass
/// - Sweeper failures are logged; the loop keeps going
#[derive(Debug)]
pub struct ExpiryCleaner;

impl ExpiryCleaner {
    pub fn spawn(config: CleanerConfig, sweepers: Vec<Arc<dyn Sweeper>>) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(cleaner_loop(config, sweepers, shutdown_rx));
        WorkerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

async fn cleaner_loop(
    config: CleanerConfig,
    sweepers: Vec<Arc<dyn Sweeper>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!(
        interval_secs = config.interval.as_secs(),
        sweepers = sweepers.len(),
        "expiry cleaner started"
    );

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => run_pass(&sweepers, config.pass_timeout).await,
        }
    }

    info!("expiry cleaner stopped");
}

async fn run_pass(sweepers: &[Arc<dyn Sweeper>], pass_timeout: Duration) {
    for sweeper in sweepers {
        match tokio::time::timeout(pass_timeout, sweeper.sweep()).await {
            Ok(Ok(0)) => debug!(sweeper = sweeper.name(), "nothing to clean"),
            Ok(Ok(removed)) => info!(sweeper = sweeper.name(), removed, "expired rows removed"),
            Ok(Err(err)) => error!(sweeper = sweeper.name(), error = %err, "cleanup failed"),
            Err(_) => error!(
                sweeper = sweeper.name(),
                timeout_secs = pass_timeout.as_secs(),
                "cleanup timed out"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Sweeper for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn sweep(&self) -> anyhow::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("backend down");
            }
            Ok(1)
        }
    }

    fn fast() -> CleanerConfig {
        CleanerConfig {
            interval: Duration::from_millis(20),
            pass_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn short_intervals_fall_back_to_default() {
        assert_eq!(CleanerConfig::with_interval(Duration::from_secs(5)).interval, DEFAULT_INTERVAL);
        assert_eq!(
            CleanerConfig::with_interval(Duration::from_secs(120)).interval,
            Duration::from_secs(120)
        );
        assert_eq!(CleanerConfig::default().pass_timeout, PASS_TIMEOUT);
    }

    #[tokio::test]
    async fn initial_pass_runs_before_first_interval() {
        let sweeper = Counting::new(false);
        let config = CleanerConfig {
            interval: Duration::from_secs(3600),
            pass_timeout: Duration::from_secs(1),
        };
        let handle = ExpiryCleaner::spawn(config, vec![sweeper.clone() as Arc<dyn Sweeper>]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sweeper.calls(), 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn keeps_ticking_through_failures_and_stops_on_shutdown() {
        let ok = Counting::new(false);
        let failing = Counting::new(true);
        let handle = ExpiryCleaner::spawn(fast(), vec![failing.clone() as Arc<dyn Sweeper>, ok.clone()]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(failing.calls() >= 3);
        assert!(ok.calls() >= 3);

        handle.shutdown().await;
        let stopped_at = ok.calls();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(ok.calls(), stopped_at);
    }

    #[tokio::test]
    async fn slow_sweeper_is_cut_off_by_pass_timeout() {
        struct Stuck;

        #[async_trait::async_trait]
        impl Sweeper for Stuck {
            fn name(&self) -> &'static str {
                "stuck"
            }

            async fn sweep(&self) -> anyhow::Result<u64> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0)
            }
        }

        let after = Counting::new(false);
        let config = CleanerConfig {
            interval: Duration::from_secs(3600),
            pass_timeout: Duration::from_millis(20),
        };
        let handle = ExpiryCleaner::spawn(config, vec![Arc::new(Stuck) as Arc<dyn Sweeper>, after.clone()]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(after.calls(), 1);
        handle.shutdown().await;
    }
}
