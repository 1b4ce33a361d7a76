use duet_core::{PeerId, ROOM_CAPACITY, RoomId};

/// Membership of one room, in join order.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    members: Vec<PeerId>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::with_capacity(ROOM_CAPACITY),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn members(&self) -> &[PeerId] {
        &self.members
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.contains(peer_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Everyone except `peer_id`.
    pub fn others(&self, peer_id: &PeerId) -> Vec<PeerId> {
        self.members
            .iter()
            .filter(|m| *m != peer_id)
            .cloned()
            .collect()
    }

    /// Adds a member. Returns `false` when the room is already full.
    pub fn add(&mut self, peer_id: PeerId) -> bool {
        if self.contains(&peer_id) {
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.members.push(peer_id);
        true
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != peer_id);
        self.members.len() != before
    }
}
