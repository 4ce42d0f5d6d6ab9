// Client state machine for a live auction room.
//
// The backend owns the auction: every client intent results in a fresh
// snapshot broadcast to all room members, and the client never computes
// `current_bid`, the leading team, or budgets on its own. This module only
// mirrors the last snapshot, tracks the connection and role, and builds
// outbound intents. All inbound handling is replace/merge, no business
// logic.

use tracing::{info, warn};

use crate::channel::ChannelEvent;
use crate::protocol::{
    BidPayload, HostPayload, Intent, JoinPayload, PlayerCard, RoomPayload, RoomSummary,
    SelectPlayerPayload, ServerEvent, SnapshotPayload, TeamSummary,
};

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// How the next player is chosen. `None` on the snapshot means the
/// auctioneer has not picked a mode yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionMode {
    Category,
    Manual,
}

impl AuctionMode {
    /// Normalize the wire string. Unknown values are logged and treated as
    /// unset rather than misinterpreted.
    pub fn from_wire(raw: Option<&str>) -> Option<Self> {
        match raw {
            None => None,
            Some("category") => Some(AuctionMode::Category),
            Some("manual") => Some(AuctionMode::Manual),
            Some(other) => {
                warn!("unknown auction mode {other:?}, treating as unset");
                None
            }
        }
    }
}

/// Per-connection role, assigned by the server in response to a join or
/// start. A client may lose auctioneer status on disconnect and regain it
/// by starting (resuming hosting) again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    Auctioneer,
    #[default]
    Viewer,
}

impl Role {
    /// `Auctioneer` iff the payload was exactly `"auctioneer"`; anything
    /// else demotes to viewer (unexpected strings are logged).
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "auctioneer" => Role::Auctioneer,
            "viewer" => Role::Viewer,
            other => {
                warn!("unknown role {other:?}, treating as viewer");
                Role::Viewer
            }
        }
    }
}

/// The last authoritative snapshot, with the mode string normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionSnapshot {
    pub tournament_id: String,
    pub is_active: bool,
    pub auction_mode: Option<AuctionMode>,
    pub selected_category: Option<String>,
    pub current_player: Option<PlayerCard>,
    pub current_bid: u64,
    pub leading_team: Option<String>,
    pub team_bids: HashMap<String, u64>,
    pub teams: Vec<TeamSummary>,
    pub player_number: u32,
    pub bid_price: u64,
    pub has_auctioneer: bool,
    pub viewer_count: u32,
}

impl AuctionSnapshot {
    pub fn from_payload(payload: SnapshotPayload) -> Self {
        AuctionSnapshot {
            auction_mode: AuctionMode::from_wire(payload.auction_mode.as_deref()),
            tournament_id: payload.tournament_id,
            is_active: payload.is_active,
            selected_category: payload.selected_category,
            current_player: payload.current_player,
            current_bid: payload.current_bid,
            leading_team: payload.leading_team,
            team_bids: payload.team_bids,
            teams: payload.teams,
            player_number: payload.player_number,
            bid_price: payload.bid_price,
            has_auctioneer: payload.has_auctioneer,
            viewer_count: payload.viewer_count,
        }
    }

    pub fn team(&self, team_id: &str) -> Option<&TeamSummary> {
        self.teams.iter().find(|t| t.id == team_id)
    }
}

/// Top-level screen, derived purely from connection + snapshot. There is no
/// client-held auction phase beyond this derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// No snapshot received yet; the room has nothing to render.
    Connecting,
    /// Session not started or mode not chosen, and no player up for bid.
    Setup,
    /// Full bidding view.
    Live,
}

// ---------------------------------------------------------------------------
// One-shot notices
// ---------------------------------------------------------------------------

/// Discrete events surfaced to the room controller for ephemeral effects.
/// None of these mutate the snapshot; the authoritative change arrives via
/// the next `state` frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Connected,
    Disconnected,
    /// The snapshot (or its viewer count) was replaced; re-render.
    StateChanged,
    RoleChanged(Role),
    ServerError(String),
    PlayerSelected(PlayerCard),
    BidPlaced { team_name: String, amount: u64 },
    Sold { player: PlayerCard, team: TeamSummary, amount: u64 },
    /// The `unsold` frame carries no payload; the player is captured from
    /// the snapshot at receipt time (it may be gone from the next one).
    Unsold { player: Option<PlayerCard> },
    RoomList(Vec<RoomSummary>),
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Local view of one auction room connection.
///
/// Intent builders return `None` until the room id (and, where the wire
/// requires it, the user id) is known, so premature UI gestures degrade to
/// no-ops instead of malformed frames.
#[derive(Debug, Default)]
pub struct AuctionClient {
    is_connected: bool,
    role: Role,
    snapshot: Option<AuctionSnapshot>,
    tournament_id: Option<String>,
    user_id: Option<String>,
}

impl AuctionClient {
    pub fn new(user_id: Option<String>) -> Self {
        AuctionClient {
            user_id,
            ..Default::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_auctioneer(&self) -> bool {
        self.role == Role::Auctioneer
    }

    pub fn snapshot(&self) -> Option<&AuctionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn tournament_id(&self) -> Option<&str> {
        self.tournament_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Target a room. The previous snapshot is dropped; the server evicts
    /// this connection from any prior room context when the join lands.
    pub fn set_room(&mut self, tournament_id: impl Into<String>) {
        let tournament_id = tournament_id.into();
        if self.tournament_id.as_deref() != Some(&tournament_id) {
            self.snapshot = None;
            self.role = Role::Viewer;
        }
        self.tournament_id = Some(tournament_id);
    }

    /// Derive the top-level screen from the last snapshot.
    pub fn screen(&self) -> Screen {
        match &self.snapshot {
            None => Screen::Connecting,
            Some(snap) => {
                let setup = !snap.is_active || snap.auction_mode.is_none();
                if setup && snap.current_player.is_none() {
                    Screen::Setup
                } else {
                    Screen::Live
                }
            }
        }
    }

    // -- inbound ------------------------------------------------------------

    /// Apply one channel event in arrival order. Full-snapshot replacement
    /// makes a stale frame self-healing: it is simply overwritten by the
    /// next one.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) -> Vec<Notice> {
        match event {
            ChannelEvent::Connected => {
                info!("channel connected");
                self.is_connected = true;
                vec![Notice::Connected]
            }
            ChannelEvent::Disconnected => {
                info!("channel disconnected");
                self.is_connected = false;
                vec![Notice::Disconnected]
            }
            ChannelEvent::Event(event) => self.handle_server_event(event),
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) -> Vec<Notice> {
        match event {
            ServerEvent::State(payload) => {
                self.snapshot = Some(AuctionSnapshot::from_payload(payload));
                vec![Notice::StateChanged]
            }
            ServerEvent::ViewerCount(count) => match &mut self.snapshot {
                Some(snap) => {
                    snap.viewer_count = count;
                    vec![Notice::StateChanged]
                }
                None => Vec::new(),
            },
            ServerEvent::Role(raw) => {
                let role = Role::from_wire(&raw);
                if role != self.role {
                    info!(?role, "role assigned");
                }
                self.role = role;
                vec![Notice::RoleChanged(role)]
            }
            ServerEvent::Error(message) => {
                warn!("server rejected intent: {message}");
                vec![Notice::ServerError(message)]
            }
            ServerEvent::PlayerSelected(player) => vec![Notice::PlayerSelected(player)],
            ServerEvent::BidPlaced(notice) => vec![Notice::BidPlaced {
                team_name: notice.team_name,
                amount: notice.amount,
            }],
            ServerEvent::Sold(notice) => vec![Notice::Sold {
                player: notice.player,
                team: notice.team,
                amount: notice.amount,
            }],
            ServerEvent::Unsold => {
                let player = self
                    .snapshot
                    .as_ref()
                    .and_then(|s| s.current_player.clone());
                vec![Notice::Unsold { player }]
            }
            ServerEvent::List(rooms) => vec![Notice::RoomList(rooms)],
        }
    }

    // -- outbound intents ---------------------------------------------------

    pub fn join_intent(&self) -> Option<Intent> {
        Some(Intent::Join(JoinPayload {
            tournament_id: self.tournament_id.clone()?,
            user_id: self.user_id.clone(),
        }))
    }

    /// Claim or resume the auctioneer role. Anonymous viewers cannot host.
    pub fn start_intent(&self) -> Option<Intent> {
        Some(Intent::Start(self.host_payload()?))
    }

    pub fn select_player_intent(
        &self,
        player_id: Option<String>,
        category: Option<String>,
    ) -> Option<Intent> {
        Some(Intent::SelectPlayer(SelectPlayerPayload {
            tournament_id: self.tournament_id.clone()?,
            player_id,
            category,
        }))
    }

    pub fn bid_intent(&self, team_id: &str) -> Option<Intent> {
        Some(Intent::Bid(BidPayload {
            tournament_id: self.tournament_id.clone()?,
            team_id: team_id.to_owned(),
        }))
    }

    pub fn undo_bid_intent(&self) -> Option<Intent> {
        Some(Intent::UndoBid(self.room_payload()?))
    }

    pub fn sold_intent(&self) -> Option<Intent> {
        Some(Intent::Sold(self.host_payload()?))
    }

    pub fn unsold_intent(&self) -> Option<Intent> {
        Some(Intent::Unsold(self.host_payload()?))
    }

    /// Clear mode and category, returning the room to mode selection.
    pub fn reset_mode_intent(&self) -> Option<Intent> {
        Some(Intent::ResetMode(self.room_payload()?))
    }

    /// Lobby deletion targets an arbitrary room, not the joined one.
    pub fn delete_room_intent(&self, tournament_id: &str) -> Option<Intent> {
        Some(Intent::Delete(HostPayload {
            tournament_id: tournament_id.to_owned(),
            user_id: self.user_id.clone()?,
        }))
    }

    fn room_payload(&self) -> Option<RoomPayload> {
        Some(RoomPayload {
            tournament_id: self.tournament_id.clone()?,
        })
    }

    fn host_payload(&self) -> Option<HostPayload> {
        Some(HostPayload {
            tournament_id: self.tournament_id.clone()?,
            user_id: self.user_id.clone()?,
        })
    }
}
