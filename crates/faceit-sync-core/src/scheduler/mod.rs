//! Periodic rank synchronization
//!
//! The SyncScheduler is responsible for:
//! - Reading every link from the LinkStore once per pass
//! - Fetching each linked profile and resolving its tier to a group
//! - Reconciling the live user's managed groups
//! - Reporting one outcome per link
//!
//! ## Architecture
//!
//! ```text
//!   interval tick (300s)
//!          │
//!          ▼
//! ┌──────────────────┐   get_all    ┌─────────────┐
//! │  SyncScheduler   │─────────────▶│  LinkStore  │
//! └──────────────────┘              └─────────────┘
//!          │ one task per link (bounded by user timeout)
//!          ▼
//! ┌───────────────┐   ┌────────────┐   ┌───────────────┐   ┌───────────┐
//! │ ProfileClient │──▶│ TierTable  │──▶│ UserDirectory │──▶│ reconcile │
//! │ (fetch_by_id) │   │ (resolve)  │   │ (find)        │   │ + apply   │
//! └───────────────┘   └────────────┘   └───────────────┘   └───────────┘
//! ```
//!
//! ## Isolation
//!
//! Each link is reconciled in its own task under a timeout. A failing,
//! panicking or hung user becomes a `Failed` outcome for that user only;
//! the pass and the next tick are never blocked by it.

pub mod outcome;

pub use outcome::{ReconciliationOutcome, SkipReason, SyncReport, SyncSummary, UserOutcome};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::link::{self, Link};
use crate::rank::TierTable;
use crate::reconcile;
use crate::traits::{LinkStore, ProfileClient, UserDirectory};

/// Fixed period between sync passes
pub const SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Events emitted by the SyncScheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Scheduler started
    Started {
        interval: Duration,
    },

    /// A pass began
    PassStarted {
        links: usize,
    },

    /// One link finished reconciling
    UserReconciled {
        local_user_id: String,
        outcome: ReconciliationOutcome,
    },

    /// A pass finished
    PassCompleted {
        summary: SyncSummary,
    },

    /// A pass could not start (link store unreadable)
    PassFailed {
        error: String,
    },

    /// Scheduler stopped
    Stopped {
        reason: String,
    },
}

/// Read-only state shared by every per-user task
struct SyncContext {
    profiles: Arc<dyn ProfileClient>,
    directory: Arc<dyn UserDirectory>,
    tiers: TierTable,
    game: String,
}

impl SyncContext {
    async fn sync_user(&self, link: &Link) -> ReconciliationOutcome {
        match self.try_sync_user(link).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let outcome = ReconciliationOutcome::from_error(&e);
                if e.is_skip() {
                    debug!("Skipping {}: {}", link.local_user_id, e);
                } else {
                    warn!(
                        "Failed to sync {} ({}): {}",
                        link.local_user_id,
                        self.profiles.client_name(),
                        e
                    );
                }
                outcome
            }
        }
    }

    async fn try_sync_user(&self, link: &Link) -> Result<ReconciliationOutcome> {
        let profile = self.profiles.fetch_by_id(&link.profile_id).await?;

        let tier = profile
            .tier_for(&self.game)
            .ok_or_else(|| Error::NotGameLinked {
                profile_id: profile.id.clone(),
                game: self.game.clone(),
            })?;

        let target = self.tiers.resolve(tier)?.clone();

        let user = self
            .directory
            .find_by_local_id(&link.local_user_id)
            .await?
            .ok_or_else(|| Error::UserAbsent(link.local_user_id.clone()))?;

        let current = user.current_groups().await?;
        let delta = reconcile::reconcile(&current, &target, self.tiers.managed_groups());

        if delta.is_empty() {
            debug!("{} already in {}", link.local_user_id, target);
            return Ok(ReconciliationOutcome::NoChange { group: target });
        }

        reconcile::apply(user.as_ref(), &delta).await?;

        // Highest-ranked managed group held before the change, other than
        // the target; a user already in the target is compared to its strays
        let previous = current
            .iter()
            .filter(|group| self.tiers.is_managed(group) && **group != target)
            .max_by_key(|group| self.tiers.rank_of(group));

        let outcome = match previous {
            Some(from) if self.tiers.rank_of(from) > self.tiers.rank_of(&target) => {
                ReconciliationOutcome::Demoted {
                    from: from.clone(),
                    to: target,
                }
            }
            from => ReconciliationOutcome::Promoted {
                from: from.cloned(),
                to: target,
            },
        };

        info!(
            "Updated {} ({}, tier {}): {}",
            user.nickname(),
            link.local_user_id,
            tier,
            outcome
        );
        Ok(outcome)
    }
}

/// Per-user tasks of one pass; aborted if the pass is dropped mid-flight
struct PassTasks(Vec<(Link, JoinHandle<ReconciliationOutcome>)>);

impl Drop for PassTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

/// Periodic rank synchronizer
///
/// ## Lifecycle
///
/// 1. Create with [`SyncScheduler::new()`] (refuses invalid configuration)
/// 2. Start with [`SyncScheduler::spawn()`] or [`SyncScheduler::run_with_shutdown()`]
/// 3. Stop via [`SyncHandle::shutdown()`] or the shutdown channel
///
/// The first pass runs immediately, then every [`SYNC_INTERVAL`].
pub struct SyncScheduler {
    context: Arc<SyncContext>,

    /// Link store, read once per pass
    links: Arc<dyn LinkStore>,

    /// Period between passes
    interval: Duration,

    /// Upper bound on one user's reconciliation
    user_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncScheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver), or `Error::Config` if the
    /// configuration (in particular the tier table) is invalid.
    pub fn new(
        profiles: Arc<dyn ProfileClient>,
        directory: Arc<dyn UserDirectory>,
        links: Arc<dyn LinkStore>,
        config: &SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;
        let tiers = TierTable::new(config.tier_table.clone())?;

        let (tx, rx) = mpsc::channel(config.scheduler.event_channel_capacity);

        let scheduler = Self {
            context: Arc::new(SyncContext {
                profiles,
                directory,
                tiers,
                game: config.game.clone(),
            }),
            links,
            interval: SYNC_INTERVAL,
            user_timeout: Duration::from_secs(config.scheduler.user_timeout_secs),
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Override the pass interval (embedding and tests)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the per-user timeout
    pub fn with_user_timeout(mut self, user_timeout: Duration) -> Self {
        self.user_timeout = user_timeout;
        self
    }

    /// The validated tier table
    pub fn tier_table(&self) -> &TierTable {
        &self.context.tiers
    }

    /// Run one reconciliation pass over every link
    ///
    /// Fails only if the link store cannot be read; per-user problems are
    /// reported as outcomes.
    pub async fn run_pass(&self) -> Result<SyncReport> {
        let started_at = chrono::Utc::now();
        let entries = self.links.get_all().await?;

        // At most one attempt per local user per pass
        let mut by_user: BTreeMap<String, Link> = BTreeMap::new();
        for link in link::links_from_entries(&entries) {
            if let Some(existing) = by_user.get(&link.local_user_id) {
                warn!(
                    "User {} has links to both {} and {}; syncing {} only",
                    link.local_user_id, existing.profile_id, link.profile_id, existing.profile_id
                );
                continue;
            }
            by_user.insert(link.local_user_id.clone(), link);
        }

        self.emit_event(SyncEvent::PassStarted {
            links: by_user.len(),
        });
        debug!("Sync pass started for {} link(s)", by_user.len());

        let mut tasks = PassTasks(Vec::with_capacity(by_user.len()));
        for link in by_user.into_values() {
            let context = Arc::clone(&self.context);
            let timeout = self.user_timeout;
            let task_link = link.clone();
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(timeout, context.sync_user(&task_link)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("Sync of {} timed out after {:?}", task_link.local_user_id, timeout);
                        ReconciliationOutcome::from_error(&Error::Timeout(format!(
                            "no result within {timeout:?}"
                        )))
                    }
                }
            });
            tasks.0.push((link, handle));
        }

        let mut outcomes = Vec::with_capacity(tasks.0.len());
        for (link, handle) in tasks.0.iter_mut() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Sync task for {} aborted: {}", link.local_user_id, e);
                    ReconciliationOutcome::Failed(format!("task aborted: {e}"))
                }
            };

            self.emit_event(SyncEvent::UserReconciled {
                local_user_id: link.local_user_id.clone(),
                outcome: outcome.clone(),
            });
            outcomes.push(UserOutcome {
                link: link.clone(),
                outcome,
            });
        }

        let report = SyncReport {
            started_at,
            finished_at: chrono::Utc::now(),
            outcomes,
        };

        let summary = report.summary();
        info!("Sync pass finished: {}", summary);
        self.emit_event(SyncEvent::PassCompleted { summary });

        Ok(report)
    }

    /// Run passes on the interval until `shutdown_rx` fires
    ///
    /// A pass in flight when shutdown arrives is cancelled (its per-user
    /// tasks are aborted) and the link store is flushed before returning.
    pub async fn run_with_shutdown(&self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.emit_event(SyncEvent::Started {
            interval: self.interval,
        });
        info!("Sync scheduler started (interval {:?})", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => break "Shutdown signal",

                Some(_) = ticks.next() => {
                    tokio::select! {
                        biased;

                        _ = &mut shutdown_rx => break "Shutdown signal during pass",

                        result = self.run_pass() => {
                            if let Err(e) = result {
                                error!("Sync pass failed: {}", e);
                                self.emit_event(SyncEvent::PassFailed { error: e.to_string() });
                            }
                        }
                    }
                }
            }
        };

        info!("{}, stopping sync scheduler", reason);
        self.emit_event(SyncEvent::Stopped {
            reason: reason.to_string(),
        });

        self.links.flush().await?;
        info!("Link store flushed, scheduler stopped");

        Ok(())
    }

    /// Spawn the scheduler as a background task with a shutdown hook
    pub fn spawn(self) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move { self.run_with_shutdown(shutdown_rx).await });

        SyncHandle { shutdown_tx, task }
    }

    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Sync event channel full, dropping event");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Handle to a spawned scheduler
pub struct SyncHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl SyncHandle {
    /// Signal shutdown and wait for the scheduler to stop
    pub async fn shutdown(self) -> Result<()> {
        // Err means the task already exited; its result is still collected below
        let _ = self.shutdown_tx.send(());

        self.task
            .await
            .map_err(|e| Error::Other(format!("Sync scheduler task failed: {e}")))?
    }

    /// Whether the scheduler task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
