// Auction room controller and the application event loop.
//
// The controller is the only place client-side judgment runs before an
// intent goes out: the slot/budget/max-bid guard in front of `bid`. Every
// local computation here is provisional and is overwritten by the next
// authoritative snapshot. Everything else is ephemeral UI state: inline
// auto-expiring bid rejection labels, the sold/unsold celebration overlays
// (which capture their payload at event receipt so a newer snapshot cannot
// change them mid-animation), the staged bid-slab editor, and the manual
// player search dialog.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::api::TournamentApi;
use crate::auction::slabs::SlabEditor;
use crate::auction::state::{AuctionClient, AuctionSnapshot, Notice, Role};
use crate::channel::{ChannelEvent, ChannelHandle};
use crate::config::UiConfig;
use crate::console::{self, Command};
use crate::lobby::Lobby;
use crate::protocol::{PlayerCard, TeamSummary};
use crate::session::SessionStore;

/// How long an inline bid rejection label stays up.
pub const REJECTION_WINDOW: Duration = Duration::from_secs(3);

/// Fixed celebration overlay window, independent of snapshot changes.
pub const OVERLAY_WINDOW: Duration = Duration::from_secs(4);

// ---------------------------------------------------------------------------
// Outputs to the frontend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Connection(bool),
    /// Snapshot, role, or ephemeral room state changed; re-render.
    Render,
    /// Transient notification line.
    Toast(String),
    Sound(SoundCue),
    RoomsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Sold,
    Unsold,
}

// ---------------------------------------------------------------------------
// Pre-send bid validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BidRejection {
    #[error("No remaining slots")]
    NoRemainingSlots,
    #[error("Insufficient budget")]
    InsufficientBudget,
    #[error("Exceeds max biddable amount")]
    ExceedsMaxBiddable,
}

/// The amount the server would put on the board if this bid is accepted:
/// the opening `current_bid` when nobody leads yet, otherwise the current
/// bid plus the server-derived increment step.
pub fn next_bid_amount(snapshot: &AuctionSnapshot) -> u64 {
    if snapshot.leading_team.is_none() {
        snapshot.current_bid
    } else {
        snapshot.current_bid + snapshot.bid_price
    }
}

/// Evaluate the slot/budget/max-bid guard for one team against the last
/// snapshot. Never cached: callers re-evaluate from the snapshot each time.
pub fn validate_bid(team: &TeamSummary, next_bid: u64) -> Result<(), BidRejection> {
    if team.max_players_per_team.saturating_sub(team.players_count) == 0 {
        return Err(BidRejection::NoRemainingSlots);
    }
    if team.remaining_budget < next_bid {
        return Err(BidRejection::InsufficientBudget);
    }
    if next_bid > team.max_biddable_amount {
        return Err(BidRejection::ExceedsMaxBiddable);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct ActiveRejection {
    reason: BidRejection,
    until: Instant,
}

// ---------------------------------------------------------------------------
// Celebration overlays
// ---------------------------------------------------------------------------

/// Payload for the sold overlay, captured at event receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct SoldCapture {
    pub player_name: String,
    pub team_name: String,
    pub amount: u64,
}

/// Payload for the unsold overlay; the player comes from the snapshot at
/// the moment the event landed (it may already be gone from the next one).
#[derive(Debug, Clone, PartialEq)]
pub struct UnsoldCapture {
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum OverlayState<T> {
    Idle,
    /// Event received but animations are off; payload retained until the
    /// window elapses so a late enable check stays consistent.
    Armed { payload: T, until: Instant },
    Visible { payload: T, until: Instant },
}

/// Timer-driven overlay state machine: idle → armed/visible on event, back
/// to idle after a fixed window regardless of what the live snapshot does
/// in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Celebration<T> {
    state: OverlayState<T>,
}

impl<T> Celebration<T> {
    pub fn new() -> Self {
        Celebration {
            state: OverlayState::Idle,
        }
    }

    pub fn trigger(&mut self, payload: T, animate: bool, now: Instant) {
        let until = now + OVERLAY_WINDOW;
        self.state = if animate {
            OverlayState::Visible { payload, until }
        } else {
            OverlayState::Armed { payload, until }
        };
    }

    pub fn tick(&mut self, now: Instant) {
        let expired = match &self.state {
            OverlayState::Idle => false,
            OverlayState::Armed { until, .. } | OverlayState::Visible { until, .. } => {
                now >= *until
            }
        };
        if expired {
            self.state = OverlayState::Idle;
        }
    }

    pub fn visible(&self) -> Option<&T> {
        match &self.state {
            OverlayState::Visible { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, OverlayState::Idle)
    }
}

impl<T> Default for Celebration<T> {
    fn default() -> Self {
        Celebration::new()
    }
}

// ---------------------------------------------------------------------------
// Manual player search
// ---------------------------------------------------------------------------

/// Search dialog state. The player list is fetched once when the dialog
/// opens and filtered locally; selecting a result sends `selectPlayer`,
/// never a local mutation.
#[derive(Debug, Clone)]
pub struct PlayerSearch {
    players: Vec<PlayerCard>,
    pub query: String,
    pub category: Option<String>,
}

impl PlayerSearch {
    pub fn new(players: Vec<PlayerCard>) -> Self {
        PlayerSearch {
            players,
            query: String::new(),
            category: None,
        }
    }

    /// Case-insensitive substring match on name, exact match on category.
    pub fn results(&self) -> Vec<&PlayerCard> {
        let needle = self.query.to_lowercase();
        self.players
            .iter()
            .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
            .filter(|p| match &self.category {
                Some(category) => p.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// RoomController
// ---------------------------------------------------------------------------

pub struct RoomController {
    pub client: AuctionClient,
    pub lobby: Lobby,
    handle: ChannelHandle,
    api: Arc<dyn TournamentApi>,
    session: SessionStore,
    pub sound_enabled: bool,
    pub animation_enabled: bool,
    rejections: HashMap<String, ActiveRejection>,
    pub sold_overlay: Celebration<SoldCapture>,
    pub unsold_overlay: Celebration<UnsoldCapture>,
    pub slab_editor: Option<SlabEditor>,
    pub search: Option<PlayerSearch>,
}

impl RoomController {
    pub fn new(
        handle: ChannelHandle,
        api: Arc<dyn TournamentApi>,
        session: SessionStore,
        ui: &UiConfig,
    ) -> Self {
        let user_id = match session.user() {
            Ok(profile) => profile.map(|p| p.id),
            Err(e) => {
                warn!("ignoring corrupt stored session: {e}");
                None
            }
        };
        RoomController {
            client: AuctionClient::new(user_id),
            lobby: Lobby::new(),
            handle,
            api,
            session,
            sound_enabled: ui.sound_enabled,
            animation_enabled: ui.animation_enabled,
            rejections: HashMap::new(),
            sold_overlay: Celebration::new(),
            unsold_overlay: Celebration::new(),
            slab_editor: None,
            search: None,
        }
    }

    /// The inline rejection label for a team, if one is still live.
    pub fn rejection(&self, team_id: &str) -> Option<BidRejection> {
        self.rejections.get(team_id).map(|r| r.reason)
    }

    /// The guard verdict a render pass uses to mark teams biddable,
    /// computed fresh from the last snapshot.
    pub fn team_verdict(&self, team: &TeamSummary) -> Result<(), BidRejection> {
        match self.client.snapshot() {
            Some(snapshot) => validate_bid(team, next_bid_amount(snapshot)),
            None => Ok(()),
        }
    }

    /// Expire rejection labels and overlay windows. Driven by the loop's
    /// coarse tick; these are the only client-side timers in the system.
    pub fn expire_timers(&mut self, now: Instant) {
        self.rejections.retain(|_, r| now < r.until);
        self.sold_overlay.tick(now);
        self.unsold_overlay.tick(now);
    }

    /// Validate and, if the guard passes, emit the bid intent. A rejected
    /// click posts an inline label for ~3 s and sends nothing.
    pub async fn try_bid(&mut self, team_id: &str, now: Instant) -> Vec<UiEvent> {
        let Some(snapshot) = self.client.snapshot() else {
            return vec![UiEvent::Toast("No auction in progress".into())];
        };
        let Some(team) = snapshot.team(team_id) else {
            return vec![UiEvent::Toast(format!("Unknown team: {team_id}"))];
        };

        match validate_bid(team, next_bid_amount(snapshot)) {
            Err(reason) => {
                self.rejections.insert(
                    team_id.to_owned(),
                    ActiveRejection {
                        reason,
                        until: now + REJECTION_WINDOW,
                    },
                );
                vec![UiEvent::Render]
            }
            Ok(()) => {
                if let Some(intent) = self.client.bid_intent(team_id) {
                    self.handle.send(intent).await;
                }
                Vec::new()
            }
        }
    }

    // -- inbound ------------------------------------------------------------

    pub async fn handle_channel_event(
        &mut self,
        event: ChannelEvent,
        now: Instant,
    ) -> Vec<UiEvent> {
        let notices = self.client.handle_channel_event(event);
        let mut updates = Vec::new();
        for notice in notices {
            self.apply_notice(notice, now, &mut updates).await;
        }
        updates
    }

    async fn apply_notice(&mut self, notice: Notice, now: Instant, updates: &mut Vec<UiEvent>) {
        match notice {
            Notice::Connected => {
                updates.push(UiEvent::Connection(true));
                // Re-join after a drop; the server evicts any stale room
                // context for this connection.
                if let Some(join) = self.client.join_intent() {
                    info!("re-joining room after (re)connect");
                    self.handle.send(join).await;
                }
            }
            Notice::Disconnected => updates.push(UiEvent::Connection(false)),
            Notice::StateChanged => updates.push(UiEvent::Render),
            Notice::RoleChanged(role) => {
                let label = match role {
                    Role::Auctioneer => "auctioneer",
                    Role::Viewer => "viewer",
                };
                updates.push(UiEvent::Toast(format!("Role assigned: {label}")));
                updates.push(UiEvent::Render);
            }
            Notice::ServerError(message) => updates.push(UiEvent::Toast(message)),
            Notice::PlayerSelected(player) => {
                updates.push(UiEvent::Toast(format!("Up for bidding: {}", player.name)));
            }
            Notice::BidPlaced { team_name, amount } => {
                updates.push(UiEvent::Toast(format!("{team_name} bid {amount}")));
            }
            Notice::Sold {
                player,
                team,
                amount,
            } => {
                self.sold_overlay.trigger(
                    SoldCapture {
                        player_name: player.name,
                        team_name: team.name,
                        amount,
                    },
                    self.animation_enabled,
                    now,
                );
                if self.sound_enabled {
                    updates.push(UiEvent::Sound(SoundCue::Sold));
                }
                updates.push(UiEvent::Render);
            }
            Notice::Unsold { player } => {
                self.unsold_overlay.trigger(
                    UnsoldCapture {
                        player_name: player.map(|p| p.name),
                    },
                    self.animation_enabled,
                    now,
                );
                if self.sound_enabled {
                    updates.push(UiEvent::Sound(SoundCue::Unsold));
                }
                updates.push(UiEvent::Render);
            }
            Notice::RoomList(rooms) => {
                self.lobby.apply_list(rooms);
                updates.push(UiEvent::RoomsChanged);
            }
        }
    }

    // -- commands -----------------------------------------------------------

    pub async fn handle_command(&mut self, command: Command, now: Instant) -> Vec<UiEvent> {
        match command {
            Command::Join(tournament_id) => self.join_room(tournament_id).await,
            Command::Rooms => {
                self.handle.send(crate::protocol::Intent::List).await;
                Vec::new()
            }
            Command::DeleteRoom(tournament_id) => self.delete_room(&tournament_id).await,
            Command::Start => match self.client.start_intent() {
                Some(intent) => {
                    self.handle.send(intent).await;
                    Vec::new()
                }
                None => vec![UiEvent::Toast(
                    "Join a room and sign in before hosting".into(),
                )],
            },
            Command::Next { category } => {
                match self.client.select_player_intent(None, category) {
                    Some(intent) => {
                        self.handle.send(intent).await;
                        Vec::new()
                    }
                    None => vec![UiEvent::Toast("Join a room first".into())],
                }
            }
            Command::Pick(player_id) => {
                match self.client.select_player_intent(Some(player_id), None) {
                    Some(intent) => {
                        self.search = None;
                        self.handle.send(intent).await;
                        Vec::new()
                    }
                    None => vec![UiEvent::Toast("Join a room first".into())],
                }
            }
            Command::Search { query, category } => self.update_search(query, category).await,
            Command::Bid(team_id) => self.try_bid(&team_id, now).await,
            Command::Undo => {
                if let Some(intent) = self.client.undo_bid_intent() {
                    self.handle.send(intent).await;
                }
                Vec::new()
            }
            Command::Sold => match self.client.sold_intent() {
                Some(intent) => {
                    self.handle.send(intent).await;
                    Vec::new()
                }
                None => vec![UiEvent::Toast("Only a signed-in host can mark sold".into())],
            },
            Command::Unsold => match self.client.unsold_intent() {
                Some(intent) => {
                    self.handle.send(intent).await;
                    Vec::new()
                }
                None => vec![UiEvent::Toast(
                    "Only a signed-in host can mark unsold".into(),
                )],
            },
            Command::ResetMode => {
                if let Some(intent) = self.client.reset_mode_intent() {
                    self.handle.send(intent).await;
                }
                Vec::new()
            }
            Command::Settings => self.open_settings().await,
            Command::SlabAdd { min_bid, increment } => {
                self.edit_slabs(|editor| editor.add(min_bid, increment))
            }
            Command::SlabRemove(index) => self.edit_slabs(|editor| editor.remove(index)),
            Command::SlabIncrement { index, increment } => {
                self.edit_slabs(|editor| editor.set_increment(index, increment))
            }
            Command::SlabSave => self.save_slabs().await,
            Command::SlabCancel => {
                self.slab_editor = None;
                vec![UiEvent::Render]
            }
            Command::Sound(enabled) => {
                self.sound_enabled = enabled;
                vec![UiEvent::Toast(format!(
                    "Sound {}",
                    if enabled { "on" } else { "off" }
                ))]
            }
            Command::Animation(enabled) => {
                self.animation_enabled = enabled;
                vec![UiEvent::Toast(format!(
                    "Animations {}",
                    if enabled { "on" } else { "off" }
                ))]
            }
            Command::Status => vec![UiEvent::Render],
            // Quit is handled by the event loop.
            Command::Quit => Vec::new(),
        }
    }

    async fn join_room(&mut self, tournament_id: String) -> Vec<UiEvent> {
        if let Err(e) = self.session.set_selected_tournament(&tournament_id) {
            warn!("failed to persist selected tournament: {e}");
        }
        self.client.set_room(tournament_id);
        self.rejections.clear();
        self.slab_editor = None;
        self.search = None;
        if self.client.is_connected() {
            if let Some(join) = self.client.join_intent() {
                self.handle.send(join).await;
            }
        }
        vec![UiEvent::Render]
    }

    async fn delete_room(&mut self, tournament_id: &str) -> Vec<UiEvent> {
        let user = match self.session.user() {
            Ok(Some(user)) => user,
            _ => return vec![UiEvent::Toast("Sign in to delete rooms".into())],
        };
        let allowed = self
            .lobby
            .find(tournament_id)
            .is_some_and(|room| Lobby::can_delete(room, &user));
        if !allowed {
            return vec![UiEvent::Toast("You cannot delete this room".into())];
        }
        if let Some(intent) = self.client.delete_room_intent(tournament_id) {
            self.handle.send(intent).await;
        }
        Vec::new()
    }

    async fn update_search(&mut self, query: String, category: Option<String>) -> Vec<UiEvent> {
        if self.search.is_none() {
            // Fetched on dialog open only, not kept live.
            let Some(tournament_id) = self.client.tournament_id().map(String::from) else {
                return vec![UiEvent::Toast("Join a room first".into())];
            };
            match self.api.players(&tournament_id).await {
                Ok(players) => self.search = Some(PlayerSearch::new(players)),
                Err(e) => {
                    warn!("player list fetch failed: {e}");
                    return vec![UiEvent::Toast(format!("Could not load players: {e}"))];
                }
            }
        }
        let search = self.search.as_mut().expect("search dialog just opened");
        search.query = query;
        search.category = category;
        vec![UiEvent::Render]
    }

    async fn open_settings(&mut self) -> Vec<UiEvent> {
        let Some(tournament_id) = self.client.tournament_id().map(String::from) else {
            return vec![UiEvent::Toast("Join a room first".into())];
        };
        match self.api.tournament(&tournament_id).await {
            Ok(tournament) => {
                self.slab_editor = Some(SlabEditor::new(tournament.bid_increments));
                vec![UiEvent::Render]
            }
            Err(e) => {
                warn!("tournament fetch failed: {e}");
                vec![UiEvent::Toast(format!("Could not load settings: {e}"))]
            }
        }
    }

    fn edit_slabs(
        &mut self,
        edit: impl FnOnce(&mut SlabEditor) -> Result<(), crate::auction::slabs::SlabError>,
    ) -> Vec<UiEvent> {
        match &mut self.slab_editor {
            Some(editor) => match edit(editor) {
                Ok(()) => vec![UiEvent::Render],
                Err(e) => vec![UiEvent::Toast(e.to_string())],
            },
            None => vec![UiEvent::Toast("Open settings first".into())],
        }
    }

    /// Commit the staged slabs through the tournament REST update; the
    /// socket channel is never used for settings. A failed save keeps the
    /// staged edits so the user can retry.
    async fn save_slabs(&mut self) -> Vec<UiEvent> {
        let Some(editor) = &self.slab_editor else {
            return vec![UiEvent::Toast("Open settings first".into())];
        };
        let Some(tournament_id) = self.client.tournament_id().map(String::from) else {
            return vec![UiEvent::Toast("Join a room first".into())];
        };
        match self
            .api
            .update_bid_increments(&tournament_id, editor.slabs())
            .await
        {
            Ok(()) => {
                self.slab_editor = None;
                vec![UiEvent::Toast("Bid increments saved".into()), UiEvent::Render]
            }
            Err(e) => {
                warn!("bid increment update failed: {e}");
                vec![UiEvent::Toast(format!("Save failed: {e}"))]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the room event loop: channel events, console commands, and the
/// timer tick, all processed one at a time in arrival order.
pub async fn run(
    mut controller: RoomController,
    mut events: mpsc::Receiver<ChannelEvent>,
    mut commands: mpsc::Receiver<Command>,
) -> anyhow::Result<()> {
    info!("room event loop started");
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let updates = controller
                            .handle_channel_event(event, Instant::now())
                            .await;
                        console::render_updates(&controller, &updates);
                    }
                    None => {
                        info!("channel task ended, shutting down");
                        break;
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Quit) | None => {
                        info!("quit requested");
                        break;
                    }
                    Some(command) => {
                        let updates = controller.handle_command(command, Instant::now()).await;
                        console::render_updates(&controller, &updates);
                    }
                }
            }
            _ = tick.tick() => {
                controller.expire_timers(Instant::now());
            }
        }
    }

    info!("room event loop exiting");
    Ok(())
}
