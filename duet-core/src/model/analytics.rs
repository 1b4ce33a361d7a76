use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Local,
    Remote,
}

/// Event emitted by an external analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionEvent {
    pub source: StreamSource,
    pub emotion: String,
    pub confidence: f32,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

/// Aggregated analytics of a finished call, handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnalyticsRecord {
    pub session_id: Uuid,
    pub room_id: RoomId,
    pub started_at: u64,
    pub ended_at: u64,
    pub events: Vec<EmotionEvent>,
    /// Number of events per emotion label.
    pub emotion_counts: BTreeMap<String, u32>,
}

impl CallAnalyticsRecord {
    pub fn new(session_id: Uuid, room_id: RoomId, started_at: u64) -> Self {
        Self {
            session_id,
            room_id,
            started_at,
            ended_at: started_at,
            events: Vec::new(),
            emotion_counts: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, event: EmotionEvent) {
        *self.emotion_counts.entry(event.emotion.clone()).or_default() += 1;
        self.events.push(event);
    }

    /// Most frequent emotion; ties resolve to the alphabetically first label.
    pub fn dominant_emotion(&self) -> Option<&str> {
        self.emotion_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| label.as_str())
    }
}
