use duet_client::reconnect::SupervisorOutcome;
use duet_core::PeerState;
use tokio::time::Instant;

use super::{GRACE, RETRY_DELAY, RecoveryHarness};
use crate::integration::init_tracing;

#[tokio::test(start_paused = true)]
async fn test_repeated_disconnects_trigger_one_recovery() {
    init_tracing();

    let mut h = RecoveryHarness::connected(5).await;
    let start = Instant::now();

    assert_eq!(h.state(PeerState::Disconnected).await, SupervisorOutcome::Armed);
    assert_eq!(h.state(PeerState::Disconnected).await, SupervisorOutcome::Idle);
    assert_eq!(h.state(PeerState::Disconnected).await, SupervisorOutcome::Idle);

    let first = h.connection();
    assert_eq!(h.next_tick().await, SupervisorOutcome::Scheduled { attempt: 1 });
    assert!(start.elapsed() >= GRACE && start.elapsed() < GRACE + RETRY_DELAY);
    assert!(first.is_closed());
    assert!(!h.peer.manager.has_active());

    assert_eq!(h.next_tick().await, SupervisorOutcome::Reoffered { attempt: 1 });
    assert!(start.elapsed() >= GRACE + RETRY_DELAY);

    assert_eq!(h.peer.connector.connections().len(), 2);
    assert_eq!(h.peer.connector.open_count(), 1);
    assert_eq!(h.peer.output.offers().len(), 2);
    assert!(!h.has_pending_tick().await, "exactly one recovery");
}

#[tokio::test(start_paused = true)]
async fn test_self_heal_within_grace_cancels_recovery() {
    init_tracing();

    let mut h = RecoveryHarness::connected(5).await;

    assert_eq!(h.state(PeerState::Disconnected).await, SupervisorOutcome::Armed);
    assert!(h.supervisor.is_armed());
    tokio::time::sleep(GRACE / 2).await;
    assert_eq!(h.state(PeerState::Connected).await, SupervisorOutcome::Idle);

    assert!(!h.supervisor.is_armed());
    assert!(!h.has_pending_tick().await);
    assert_eq!(h.peer.connector.connections().len(), 1);
    assert!(!h.connection().is_closed());
}
