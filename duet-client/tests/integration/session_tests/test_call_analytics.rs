use duet_client::analytics::{AnalysisTarget, JsonFileRecordStore, StreamAnalyzer};
use duet_client::SessionEvent;
use duet_core::utils::now_millis;
use duet_core::{CallAnalyticsRecord, EmotionEvent, RoomId, StreamSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ROOM, SessionFixture, test_config};
use crate::integration::init_tracing;

/// Reports one fixed emotion for every stream it is given.
struct FixedEmotion;

impl StreamAnalyzer for FixedEmotion {
    fn attach(&self, target: AnalysisTarget, events: mpsc::Sender<EmotionEvent>) {
        let (source, emotion) = match target {
            AnalysisTarget::Local(_) => (StreamSource::Local, "neutral"),
            AnalysisTarget::Remote(_) => (StreamSource::Remote, "happy"),
        };
        tokio::spawn(async move {
            let _ = events
                .send(EmotionEvent {
                    source,
                    emotion: emotion.to_owned(),
                    confidence: 0.9,
                    timestamp: now_millis(),
                    transcript: None,
                })
                .await;
        });
    }
}

#[tokio::test]
async fn test_emotions_are_forwarded_and_persisted() {
    init_tracing();

    let dir = std::env::temp_dir().join(format!("duet-session-records-{}", Uuid::new_v4()));
    let store = Arc::new(JsonFileRecordStore::new(&dir));
    let mut fx = SessionFixture::start_with(test_config(), move |deps| {
        deps.with_analyzer(Arc::new(FixedEmotion))
            .with_record_store(store)
    })
    .await;
    fx.connect_remote().await;

    let mut seen = Vec::new();
    while seen.len() < 2 {
        if let SessionEvent::Emotion(event) = fx
            .next_event(|e| matches!(e, SessionEvent::Emotion(_)))
            .await
        {
            seen.push(event.source);
        }
    }
    assert!(seen.contains(&StreamSource::Local));
    assert!(seen.contains(&StreamSource::Remote));

    fx.handle.end().await;

    let path = dir.join(format!("{}.json", fx.handle.session_id()));
    let record: CallAnalyticsRecord =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(record.session_id, fx.handle.session_id());
    assert_eq!(record.room_id, RoomId::from(ROOM));
    assert_eq!(record.events.len(), 2);
    assert!(record.ended_at >= record.started_at);

    let _ = std::fs::remove_dir_all(&dir);
}
