use crate::media::MediaStream;
use crate::peer::{PeerConnectionManager, PeerUpdate};
use crate::retry::{RetryPolicy, RetryState};
use duet_core::{IceState, PeerId, PeerState};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    /// The disconnect grace ran out.
    GraceExpired,
    /// The post-teardown delay ran out; time to offer again.
    Reoffer,
}

/// Timer expiry delivered back to the owner of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTick {
    pub token: u64,
    pub phase: RecoveryPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorOutcome {
    Idle,
    /// Disconnect grace started.
    Armed,
    /// Connection torn down, re-offer pending.
    Scheduled { attempt: u32 },
    Reoffered { attempt: u32 },
    /// Nothing to recover with: no remote peer or no live local stream.
    Skipped,
    GaveUp { attempts: u32 },
}

struct Timer {
    token: u64,
    task: JoinHandle<()>,
}

impl Timer {
    fn cancel(self) {
        self.task.abort();
    }
}

/// Turns peer failures into at most one recovery at a time.
///
/// Timers do not touch the connection. They post a [`RecoveryTick`] to the owner, which
/// passes it back together with the peer manager, so recovery only ever runs on the
/// owning task. Ticks whose token does not match a pending timer are ignored.
pub struct ReconnectionSupervisor {
    grace: Duration,
    retry: RetryState,
    ticks: mpsc::UnboundedSender<RecoveryTick>,
    next_token: u64,
    grace_timer: Option<Timer>,
    reoffer_timer: Option<Timer>,
}

impl ReconnectionSupervisor {
    pub fn new(
        grace: Duration,
        policy: RetryPolicy,
        ticks: mpsc::UnboundedSender<RecoveryTick>,
    ) -> Self {
        Self {
            grace,
            retry: policy.start(),
            ticks,
            next_token: 0,
            grace_timer: None,
            reoffer_timer: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.grace_timer.is_some()
    }

    pub fn is_recovering(&self) -> bool {
        self.reoffer_timer.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.retry.attempts()
    }

    pub async fn on_peer_update(
        &mut self,
        update: &PeerUpdate,
        peers: &mut PeerConnectionManager,
    ) -> SupervisorOutcome {
        match update {
            PeerUpdate::State(PeerState::Connected)
            | PeerUpdate::Ice(IceState::Connected | IceState::Completed) => {
                if let Some(timer) = self.grace_timer.take() {
                    timer.cancel();
                    info!("Connection recovered on its own");
                }
                if self.retry.attempts() > 0 {
                    info!(attempts = self.retry.attempts(), "Connection restored");
                    self.retry.reset();
                }
                SupervisorOutcome::Idle
            }
            PeerUpdate::State(PeerState::Disconnected)
            | PeerUpdate::Ice(IceState::Disconnected) => {
                if self.grace_timer.is_some() || self.reoffer_timer.is_some() {
                    return SupervisorOutcome::Idle;
                }
                debug!(grace = ?self.grace, "Connection disconnected, waiting for self-heal");
                self.grace_timer = Some(self.schedule(self.grace, RecoveryPhase::GraceExpired));
                SupervisorOutcome::Armed
            }
            PeerUpdate::State(PeerState::Failed) | PeerUpdate::Ice(IceState::Failed) => {
                self.cancel_grace();
                self.begin_recovery(peers).await
            }
            _ => SupervisorOutcome::Idle,
        }
    }

    /// Recovery requested from outside the state callbacks, e.g. after a negotiation error.
    pub async fn request_recovery(&mut self, peers: &mut PeerConnectionManager) -> SupervisorOutcome {
        self.cancel_grace();
        self.begin_recovery(peers).await
    }

    pub async fn on_tick(
        &mut self,
        tick: RecoveryTick,
        peers: &mut PeerConnectionManager,
        remote: Option<&PeerId>,
        stream: Option<&MediaStream>,
    ) -> SupervisorOutcome {
        match tick.phase {
            RecoveryPhase::GraceExpired => {
                if self.grace_timer.as_ref().map(|t| t.token) != Some(tick.token) {
                    return SupervisorOutcome::Idle;
                }
                self.grace_timer = None;
                if peers.state().is_some_and(|s| s.is_healthy()) {
                    return SupervisorOutcome::Idle;
                }
                warn!("Connection did not self-heal within {:?}", self.grace);
                self.begin_recovery(peers).await
            }
            RecoveryPhase::Reoffer => {
                if self.reoffer_timer.as_ref().map(|t| t.token) != Some(tick.token) {
                    return SupervisorOutcome::Idle;
                }
                self.reoffer_timer = None;

                let (Some(remote), Some(stream)) = (remote, stream.filter(|s| s.is_live())) else {
                    info!("No remote peer or live local stream, skipping recovery");
                    return SupervisorOutcome::Skipped;
                };

                let attempt = self.retry.attempts();
                info!(remote = %remote, attempt, "Re-offering to recover the connection");
                match peers.create_offer(remote.clone(), stream).await {
                    Ok(()) => SupervisorOutcome::Reoffered { attempt },
                    Err(e) => {
                        warn!(attempt, "Recovery offer failed: {}", e);
                        self.begin_recovery(peers).await
                    }
                }
            }
        }
    }

    /// Cancels pending timers and forgets previous attempts.
    pub fn cancel(&mut self) {
        self.cancel_pending();
        self.retry.reset();
    }

    /// Drops pending timers once a newer negotiation took over. Attempts are kept until the
    /// new connection comes up.
    pub fn cancel_pending(&mut self) {
        self.cancel_grace();
        if let Some(timer) = self.reoffer_timer.take() {
            debug!("Newer negotiation started, dropping pending re-offer");
            timer.cancel();
        }
    }

    async fn begin_recovery(&mut self, peers: &mut PeerConnectionManager) -> SupervisorOutcome {
        if self.reoffer_timer.is_some() {
            return SupervisorOutcome::Idle;
        }
        let Some(delay) = self.retry.next_delay() else {
            warn!(attempts = self.retry.attempts(), "Giving up on connection recovery");
            return SupervisorOutcome::GaveUp {
                attempts: self.retry.attempts(),
            };
        };

        peers.close().await;
        let attempt = self.retry.attempts();
        debug!(attempt, ?delay, "Recovery scheduled");
        self.reoffer_timer = Some(self.schedule(delay, RecoveryPhase::Reoffer));
        SupervisorOutcome::Scheduled { attempt }
    }

    fn cancel_grace(&mut self) {
        if let Some(timer) = self.grace_timer.take() {
            timer.cancel();
        }
    }

    fn schedule(&mut self, delay: Duration, phase: RecoveryPhase) -> Timer {
        self.next_token += 1;
        let token = self.next_token;
        let ticks = self.ticks.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = ticks.send(RecoveryTick { token, phase });
        });
        Timer { token, task }
    }
}

impl Drop for ReconnectionSupervisor {
    fn drop(&mut self) {
        self.cancel();
    }
}
