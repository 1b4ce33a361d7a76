use duet_client::reconnect::SupervisorOutcome;
use duet_core::PeerState;
use tokio::time::Instant;

use super::{RETRY_DELAY, RecoveryHarness};
use crate::integration::init_tracing;

#[tokio::test(start_paused = true)]
async fn test_failure_recovers_without_grace() {
    init_tracing();

    let mut h = RecoveryHarness::connected(5).await;
    let start = Instant::now();
    let first = h.connection();

    assert_eq!(
        h.state(PeerState::Failed).await,
        SupervisorOutcome::Scheduled { attempt: 1 }
    );
    assert!(first.is_closed(), "failed connection is torn down at once");
    assert!(h.supervisor.is_recovering());

    assert_eq!(h.next_tick().await, SupervisorOutcome::Reoffered { attempt: 1 });
    assert!(start.elapsed() >= RETRY_DELAY);
    assert_eq!(h.peer.output.offers().len(), 2);
    assert!(!h.supervisor.is_recovering());
}

#[tokio::test(start_paused = true)]
async fn test_recovery_skipped_without_live_media() {
    init_tracing();

    let mut h = RecoveryHarness::connected(5).await;

    assert_eq!(
        h.state(PeerState::Failed).await,
        SupervisorOutcome::Scheduled { attempt: 1 }
    );
    h.media.stop_all();
    assert!(!h.stream.is_live());

    assert_eq!(h.next_tick().await, SupervisorOutcome::Skipped);
    assert_eq!(h.peer.connector.connections().len(), 1);
    assert_eq!(h.backend.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_skipped_without_remote_peer() {
    init_tracing();

    let mut h = RecoveryHarness::connected(5).await;
    assert_eq!(
        h.state(PeerState::Failed).await,
        SupervisorOutcome::Scheduled { attempt: 1 }
    );

    let tick = h.ticks.recv().await.unwrap();
    let outcome = h
        .supervisor
        .on_tick(tick, &mut h.peer.manager, None, Some(&h.stream))
        .await;

    assert_eq!(outcome, SupervisorOutcome::Skipped);
    assert_eq!(h.peer.output.offers().len(), 1);
}
