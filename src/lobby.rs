// Auction lobby: the list of rooms the backend announces.
//
// Pure mirror of the server's `list` pushes; every push is a full replace.
// Creating or entering a room is just a `join` intent for one of the user's
// tournaments, and deletion is available to the room's host or an admin
// (the server re-checks both).

use crate::protocol::RoomSummary;
use crate::session::UserProfile;

#[derive(Debug, Default)]
pub struct Lobby {
    rooms: Vec<RoomSummary>,
}

impl Lobby {
    pub fn new() -> Self {
        Lobby::default()
    }

    pub fn rooms(&self) -> &[RoomSummary] {
        &self.rooms
    }

    pub fn find(&self, tournament_id: &str) -> Option<&RoomSummary> {
        self.rooms.iter().find(|r| r.tournament_id == tournament_id)
    }

    /// Replace the list with a server push, newest rooms first.
    pub fn apply_list(&mut self, mut rooms: Vec<RoomSummary>) {
        rooms.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        self.rooms = rooms;
    }

    /// Whether `user` may request deletion of `room`. This is a UI
    /// affordance only; the server independently authorizes the intent.
    pub fn can_delete(room: &RoomSummary, user: &UserProfile) -> bool {
        user.is_admin() || room.host_id.as_deref() == Some(user.id.as_str())
    }
}
