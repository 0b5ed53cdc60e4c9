//! The succession event loop.
//!
//! One task owns the controller and the auditor. Events, operator commands
//! and audit ticks are processed one at a time in arrival order, so no two
//! transitions ever interleave. Lineage and progeny queries only read the
//! ledger and are answered by [`ServiceHandle`] without entering the loop.

use crate::activity::ActivityTracker;
use crate::auditor::{AuditOutcome, ReconciliationAuditor};
use crate::config::SuccessionConfig;
use crate::controller::{Resolution, SkipOutcome, SuccessionController};
use crate::error::{Error, Result};
use crate::platform::{MembershipPlatform, NotificationSink};
use crate::queries::{self, Lineage, Progeny, StatsDetail, StatsReport};
use rhizone_ledger::{now_secs, Ledger, MemberId, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const COMMAND_QUEUE: usize = 64;

type Reply<T> = oneshot::Sender<Result<T>>;

/// A request to the event loop.
#[derive(Debug)]
pub enum Command {
    Activity {
        member: MemberId,
        at: Timestamp,
        reply: Reply<bool>,
    },
    MemberJoined {
        member: MemberId,
        at: Timestamp,
        reply: Reply<Option<Resolution>>,
    },
    Skip {
        requester: MemberId,
        at: Timestamp,
        reply: Reply<SkipOutcome>,
    },
    Stats {
        detail: StatsDetail,
        reply: Reply<StatsReport>,
    },
    ClearSuspension {
        reply: Reply<bool>,
    },
    /// Run an audit pass now
    Tick {
        at: Timestamp,
        reply: Reply<AuditOutcome>,
    },
}

/// Serialized owner of all succession state.
pub struct SuccessionService {
    controller: SuccessionController,
    auditor: ReconciliationAuditor,
    rx: mpsc::Receiver<Command>,
    audit_interval: Duration,
}

impl SuccessionService {
    /// Wire up the controller and auditor over one ledger and platform.
    pub fn start(
        ledger: Arc<Ledger>,
        platform: Arc<dyn MembershipPlatform>,
        notifier: Arc<dyn NotificationSink>,
        config: SuccessionConfig,
    ) -> Result<(Self, ServiceHandle)> {
        let tracker = ActivityTracker::new(
            Arc::clone(&ledger),
            Arc::clone(&platform),
            config.inactivity_window,
        );
        let auditor = ReconciliationAuditor::new(tracker, &config);
        let audit_interval = config.audit_interval;
        let controller = SuccessionController::load(
            Arc::clone(&ledger),
            Arc::clone(&platform),
            notifier,
            config,
        )?;

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let service = Self {
            controller,
            auditor,
            rx,
            audit_interval,
        };
        let handle = ServiceHandle {
            tx,
            ledger,
            platform,
        };
        Ok((service, handle))
    }

    /// Use a deterministic random source for draws.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.controller = self.controller.with_seed(seed);
        self
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands and audit ticks until every handle is dropped.
    ///
    /// An audit pass runs first so drift from before a restart is repaired
    /// before any event is handled.
    pub async fn run(self) {
        let Self {
            mut controller,
            auditor,
            mut rx,
            audit_interval,
        } = self;

        info!(
            "Succession service started in state {} (audit every {:?})",
            controller.state(),
            audit_interval
        );
        audit(&auditor, &mut controller, now_secs()).await;

        let mut ticker = interval_at(Instant::now() + audit_interval, audit_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => handle(&auditor, &mut controller, command).await,
                    None => {
                        info!("All handles dropped; succession service stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    audit(&auditor, &mut controller, now_secs()).await;
                }
            }
        }
    }
}

async fn audit(
    auditor: &ReconciliationAuditor,
    controller: &mut SuccessionController,
    now: Timestamp,
) {
    match auditor.tick(controller, now).await {
        Ok(outcome) => debug!("Audit tick: {:?}", outcome.action),
        Err(e) if e.is_storage() => error!("Audit tick failed: {}", e),
        Err(e) => warn!("Audit tick incomplete: {}", e),
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T>) {
    if reply.send(result).is_err() {
        warn!("Caller went away before the reply was sent");
    }
}

async fn handle(
    auditor: &ReconciliationAuditor,
    controller: &mut SuccessionController,
    command: Command,
) {
    match command {
        Command::Activity { member, at, reply } => {
            respond(reply, auditor.tracker().record(member, at).await);
        }
        Command::MemberJoined { member, at, reply } => {
            respond(reply, controller.on_member_joined(member, at).await);
        }
        Command::Skip {
            requester,
            at,
            reply,
        } => {
            respond(reply, controller.skip(requester, at).await);
        }
        Command::Stats { detail, reply } => {
            respond(reply, controller.stats(detail).await);
        }
        Command::ClearSuspension { reply } => {
            respond(reply, controller.clear_suspension().await);
        }
        Command::Tick { at, reply } => {
            respond(reply, auditor.tick(controller, at).await);
        }
    }
}

/// Cloneable entry point to a running [`SuccessionService`].
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Command>,
    ledger: Arc<Ledger>,
    platform: Arc<dyn MembershipPlatform>,
}

impl ServiceHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| Error::ServiceStopped)?;
        rx.await.map_err(|_| Error::ServiceStopped)?
    }

    /// Qualifying activity by `member`.
    pub async fn activity(&self, member: MemberId, at: Timestamp) -> Result<bool> {
        self.request(|reply| Command::Activity { member, at, reply })
            .await
    }

    /// `member` joined the community.
    pub async fn member_joined(
        &self,
        member: MemberId,
        at: Timestamp,
    ) -> Result<Option<Resolution>> {
        self.request(|reply| Command::MemberJoined { member, at, reply })
            .await
    }

    pub async fn skip(&self, requester: MemberId, at: Timestamp) -> Result<SkipOutcome> {
        self.request(|reply| Command::Skip {
            requester,
            at,
            reply,
        })
        .await
    }

    pub async fn stats(&self, detail: StatsDetail) -> Result<StatsReport> {
        self.request(|reply| Command::Stats { detail, reply }).await
    }

    pub async fn clear_suspension(&self) -> Result<bool> {
        self.request(|reply| Command::ClearSuspension { reply })
            .await
    }

    pub async fn tick(&self, at: Timestamp) -> Result<AuditOutcome> {
        self.request(|reply| Command::Tick { at, reply }).await
    }

    pub async fn lineage(&self, member: MemberId) -> Result<Lineage> {
        Ok(queries::lineage(&self.ledger.snapshot()?, member))
    }

    pub async fn progeny(&self, member: MemberId, include_inactive: bool) -> Result<Progeny> {
        let members = self.platform.list_members().await?;
        let snapshot = self.ledger.snapshot()?;
        Ok(queries::progeny(
            &snapshot,
            &members,
            member,
            include_inactive,
        ))
    }

    /// Shared ledger, for read-only use.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}
