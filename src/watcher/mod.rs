//! Connection lifecycle management
//!
//! One watcher per account, running as a single task that owns the IMAP
//! session exclusively. The loop is the state machine: connect, resolve
//! the quarantine folder, hand the initial count announcement to the
//! backfill coordinator, then sit in IDLE interpreting notifications
//! until the transport fails (reconnect with backoff) or a stop signal
//! arrives. All suspension points are awaited inline, so event handling
//! for an account is strictly serialized.

pub mod backfill;
pub mod events;
pub mod reconnect;

use std::sync::Arc;
use std::time::Duration;

use async_imap::extensions::idle::IdleResponse;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::config::AccountConfig;
use crate::error::{Result, WatchError};
use crate::imap::{self, messages, ImapSession};
use crate::pipeline;
use crate::watermark::WatermarkStore;

use backfill::BackfillCoordinator;
use events::Notification;
use reconnect::ReconnectState;

/// Period of the idle-prevention reopen. Some providers drop sessions
/// idle for around 29 minutes; one minute keeps well clear of that.
const KEEPALIVE_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Disconnected,
    Connecting,
    Watching,
    Reconnecting,
    Stopped,
}

/// Handle to a spawned watcher. Dropping it does not stop the watcher;
/// call [`WatcherHandle::stop`].
pub struct WatcherHandle {
    label: String,
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Signal the watcher to stop and wait for its task to finish.
    /// Idempotent at the protocol level: signalling an already-stopped
    /// watcher is a no-op.
    pub async fn stop(self) {
        self.stop_tx.send(()).await.ok();
        self.task.await.ok();
    }
}

/// Spawn the watcher task for one account.
pub fn start_watching(
    account: AccountConfig,
    classifier: Arc<Classifier>,
    watermarks: Arc<WatermarkStore>,
) -> WatcherHandle {
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let label = account.label.clone();

    watermarks.seed(&account.label, account.watermark);

    let watcher = Watcher {
        account,
        classifier,
        watermarks,
        state: WatchState::Disconnected,
        reconnect: ReconnectState::new(),
        backfill: BackfillCoordinator::new(),
        stop_rx,
    };

    let task = tokio::spawn(watcher.run());

    WatcherHandle {
        label,
        stop_tx,
        task,
    }
}

struct Watcher {
    account: AccountConfig,
    classifier: Arc<Classifier>,
    watermarks: Arc<WatermarkStore>,
    state: WatchState,
    reconnect: ReconnectState,
    backfill: BackfillCoordinator,
    stop_rx: mpsc::Receiver<()>,
}

impl Watcher {
    fn set_state(&mut self, next: WatchState) {
        if self.state != next {
            debug!(account = %self.account.label, from = ?self.state, to = ?next, "State transition");
            self.state = next;
        }
    }

    async fn run(mut self) {
        loop {
            if self.stop_rx.try_recv().is_ok() {
                self.set_state(WatchState::Stopped);
                break;
            }

            self.set_state(WatchState::Connecting);
            match imap::connect(&self.account).await {
                Ok((session, mailbox)) => {
                    // Backoff growth only reflects consecutive failures.
                    self.reconnect.reset();
                    self.set_state(WatchState::Watching);
                    info!(
                        account = %self.account.label,
                        mailbox = %self.account.mailbox,
                        "Watching mailbox"
                    );

                    match self.watch(session, mailbox.exists).await {
                        Ok(()) => {
                            self.set_state(WatchState::Stopped);
                            break;
                        }
                        Err(e) => {
                            warn!(account = %self.account.label, "Connection lost: {}", e);
                        }
                    }
                }
                Err(e) if e.is_fatal() => {
                    // Credentials will not self-heal by retrying.
                    error!(account = %self.account.label, "{}; not retrying", e);
                    self.set_state(WatchState::Stopped);
                    break;
                }
                Err(e) => {
                    warn!(account = %self.account.label, "Connect failed: {}", e);
                }
            }

            self.set_state(WatchState::Reconnecting);
            let delay = match self.reconnect.next_delay() {
                Some(delay) => delay,
                None => {
                    error!(
                        account = %self.account.label,
                        attempts = self.reconnect.attempts(),
                        "Reconnect attempts exhausted, giving up"
                    );
                    self.set_state(WatchState::Disconnected);
                    break;
                }
            };

            info!(
                account = %self.account.label,
                attempt = self.reconnect.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );
            tokio::select! {
                _ = self.stop_rx.recv() => {
                    self.set_state(WatchState::Stopped);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(account = %self.account.label, "Watcher stopped");
    }

    /// Drive one authenticated connection until it fails or a stop
    /// arrives. Returns `Ok(())` only on stop; every transport failure
    /// is an `Err` that sends the caller into the backoff path.
    async fn watch(&mut self, mut session: ImapSession, initial_total: u32) -> Result<()> {
        let quarantine = imap::folders::ensure_quarantine(&mut session).await?;

        // The provider announces the mailbox total once on open; the
        // event processor routes it to backfill.
        let mut last_total = initial_total;
        self.on_notification(&mut session, last_total, last_total, &quarantine)
            .await?;

        loop {
            let mut idle = session.idle();
            idle.init()
                .await
                .map_err(|e| WatchError::Transport(format!("IDLE failed: {}", e)))?;
            let (idle_wait, _interrupt) = idle.wait_with_timeout(KEEPALIVE_PERIOD);

            let response = tokio::select! {
                _ = self.stop_rx.recv() => {
                    // Tear-down: dropping the handle closes the transport.
                    info!(account = %self.account.label, "Stop requested");
                    return Ok(());
                }
                result = idle_wait => {
                    result.map_err(|e| WatchError::Transport(format!("IDLE failed: {}", e)))?
                }
            };

            session = idle
                .done()
                .await
                .map_err(|e| WatchError::Transport(format!("IDLE DONE failed: {}", e)))?;

            match response {
                // Keepalive: leaving IDLE and reopening the mailbox on a
                // fixed period defeats provider-side idle timeouts. A
                // failure here is a transport failure like any other.
                IdleResponse::Timeout | IdleResponse::ManualInterrupt => {
                    debug!(account = %self.account.label, "Keepalive reopen");
                }
                IdleResponse::NewData(_) => {
                    debug!(account = %self.account.label, "Server notification");
                }
            }

            // Re-query the total at notification time, never cached.
            let mailbox = imap::reopen(&mut session, &self.account.mailbox).await?;
            let total = mailbox.exists;
            if total > last_total {
                let count = total - last_total;
                self.on_notification(&mut session, count, total, &quarantine)
                    .await?;
            }
            last_total = total;
        }
    }

    /// Dispatch one notification. Per-message failures are tolerated
    /// inside the pipeline; only transport-level errors propagate.
    async fn on_notification(
        &mut self,
        session: &mut ImapSession,
        count: u32,
        total: u32,
        quarantine: &str,
    ) -> Result<()> {
        match events::interpret(count, total) {
            Notification::InitialAnnouncement => {
                self.backfill
                    .scan(
                        session,
                        &self.classifier,
                        &self.account,
                        quarantine,
                        &self.watermarks,
                    )
                    .await?;
            }
            Notification::NewMail { first, last } => {
                debug!(
                    account = %self.account.label,
                    count,
                    first,
                    last,
                    "Fetching new mail batch"
                );
                let batch = messages::fetch_range(session, first, last).await?;
                let quarantined = pipeline::process_batch(
                    session,
                    &batch,
                    &self.classifier,
                    &self.account,
                    quarantine,
                )
                .await;

                if let Err(e) = self.watermarks.advance(&self.account.label, Utc::now()) {
                    warn!(account = %self.account.label, "{}", e);
                }
                info!(
                    account = %self.account.label,
                    batch = batch.len(),
                    quarantined,
                    "New mail batch processed"
                );
            }
        }
        Ok(())
    }
}
