use duet_client::reconnect::SupervisorOutcome;
use duet_core::PeerState;

use super::RecoveryHarness;
use crate::integration::init_tracing;

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    init_tracing();

    let mut h = RecoveryHarness::connected(2).await;

    for attempt in 1..=2 {
        assert_eq!(
            h.state(PeerState::Failed).await,
            SupervisorOutcome::Scheduled { attempt }
        );
        assert_eq!(h.next_tick().await, SupervisorOutcome::Reoffered { attempt });
    }

    assert_eq!(
        h.state(PeerState::Failed).await,
        SupervisorOutcome::GaveUp { attempts: 2 }
    );
    assert!(!h.has_pending_tick().await);
    assert_eq!(h.peer.connector.connections().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_successful_recovery_restores_budget() {
    init_tracing();

    let mut h = RecoveryHarness::connected(1).await;

    assert_eq!(
        h.state(PeerState::Failed).await,
        SupervisorOutcome::Scheduled { attempt: 1 }
    );
    assert_eq!(h.next_tick().await, SupervisorOutcome::Reoffered { attempt: 1 });
    assert_eq!(h.supervisor.attempts(), 1);

    assert_eq!(h.state(PeerState::Connected).await, SupervisorOutcome::Idle);
    assert_eq!(h.supervisor.attempts(), 0);

    assert_eq!(
        h.state(PeerState::Failed).await,
        SupervisorOutcome::Scheduled { attempt: 1 }
    );
}
