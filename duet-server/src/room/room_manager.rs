use crate::room::Room;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_core::{PeerId, RoomId};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New member; `others` were already inside.
    Joined { others: Vec<PeerId> },
    /// Already a member; membership is announced again.
    Rejoined { others: Vec<PeerId> },
    Full,
}

/// A peer that left a room, and who is still inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub remaining: Vec<PeerId>,
}

/// Room membership with capacity enforcement. A peer is in at most one room.
#[derive(Default)]
pub struct RoomManager {
    rooms: DashMap<RoomId, Room>,
    membership: DashMap<PeerId, RoomId>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_of(&self, peer_id: &PeerId) -> Option<RoomId> {
        self.membership.get(peer_id).map(|r| r.value().clone())
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room_id)
            .map(|r| r.members().to_vec())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn share_room(&self, a: &PeerId, b: &PeerId) -> bool {
        match (self.room_of(a), self.room_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Joins `room_id`. The caller leaves any other room first.
    pub fn join(&self, peer_id: &PeerId, room_id: &RoomId) -> JoinOutcome {
        let outcome = match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(mut entry) => {
                let room = entry.get_mut();
                let others = room.others(peer_id);
                if room.contains(peer_id) {
                    JoinOutcome::Rejoined { others }
                } else if room.add(peer_id.clone()) {
                    JoinOutcome::Joined { others }
                } else {
                    JoinOutcome::Full
                }
            }
            Entry::Vacant(entry) => {
                info!("Creating room: {}", room_id);
                let mut room = Room::new(room_id.clone());
                room.add(peer_id.clone());
                entry.insert(room);
                JoinOutcome::Joined { others: Vec::new() }
            }
        };

        if matches!(outcome, JoinOutcome::Joined { .. }) {
            self.membership.insert(peer_id.clone(), room_id.clone());
        }
        outcome
    }

    /// Removes the peer from its room, dropping the room once empty.
    pub fn leave(&self, peer_id: &PeerId) -> Option<Departure> {
        let (_, room_id) = self.membership.remove(peer_id)?;

        let mut remaining = Vec::new();
        if let Some(mut room) = self.rooms.get_mut(&room_id) {
            room.remove(peer_id);
            remaining = room.members().to_vec();
        }
        if let Some((_, room)) = self.rooms.remove_if(&room_id, |_, room| room.is_empty()) {
            info!("Removing empty room: {}", room.id());
        }

        Some(Departure { room_id, remaining })
    }
}
