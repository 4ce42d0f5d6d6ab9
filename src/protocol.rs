// Wire protocol for the auction socket namespace and the REST envelope.
//
// Every socket frame is a JSON text message of the shape
// `{"event": "<name>", "data": <payload>}` with camelCase payload keys.
// The backend is the sole owner of auction state: inbound `state` frames
// carry the full snapshot (never deltas), and every outbound frame is an
// intent the server may reject with an `error` frame.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Outbound intents
// ---------------------------------------------------------------------------

/// A client intent, serialized as `{"event": ..., "data": ...}`.
///
/// Intents are fire-and-forget: there is no client-side retry, timeout, or
/// idempotency key. The server validates every intent and either broadcasts
/// a fresh snapshot or answers with an `error` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Intent {
    Join(JoinPayload),
    Start(HostPayload),
    SelectPlayer(SelectPlayerPayload),
    Bid(BidPayload),
    UndoBid(RoomPayload),
    Sold(HostPayload),
    Unsold(HostPayload),
    ResetMode(RoomPayload),
    /// Lobby: request the current room list.
    List,
    /// Lobby: delete a room (owner or admin only, enforced server-side).
    Delete(HostPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub tournament_id: String,
    /// Absent user id means the client joins as an anonymous viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPayload {
    pub tournament_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub tournament_id: String,
}

/// Exactly one of `player_id` / `category` is meaningful per call: explicit
/// manual selection or next-by-category. The server validates the pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectPlayerPayload {
    pub tournament_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPayload {
    pub tournament_id: String,
    pub team_id: String,
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// A server-pushed event, deserialized from `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full authoritative snapshot; replaces all local auction state.
    State(SnapshotPayload),
    /// Live viewer count; merged into the snapshot's single field.
    ViewerCount(u32),
    /// A rejected intent or other server-side failure, as a display string.
    Error(String),
    /// Role assignment for this connection (`"auctioneer"` or other).
    Role(String),
    /// Notification only; the snapshot carrying the player arrives separately.
    PlayerSelected(PlayerCard),
    /// Notification only.
    BidPlaced(BidNotice),
    /// Round finalized: the player went to a team.
    Sold(SoldNotice),
    /// Round finalized without a buyer; current player implied.
    Unsold,
    /// Lobby room list; full replace.
    List(Vec<RoomSummary>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidNotice {
    pub team_name: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldNotice {
    pub player: PlayerCard,
    pub team: TeamSummary,
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// Snapshot payload
// ---------------------------------------------------------------------------

/// The full auction snapshot as it appears on the wire.
///
/// `auction_mode` stays a raw string here; normalization into the closed
/// [`crate::auction::state::AuctionMode`] enum happens in the state machine
/// so unknown values are logged instead of failing the whole frame. All
/// other fields default so a sparse snapshot from an older backend still
/// parses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub tournament_id: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub auction_mode: Option<String>,
    #[serde(default)]
    pub selected_category: Option<String>,
    #[serde(default)]
    pub current_player: Option<PlayerCard>,
    #[serde(default)]
    pub current_bid: u64,
    #[serde(default)]
    pub leading_team: Option<String>,
    /// Last bid per team for the current player; cleared server-side on
    /// player change.
    #[serde(default)]
    pub team_bids: HashMap<String, u64>,
    #[serde(default)]
    pub teams: Vec<TeamSummary>,
    #[serde(default)]
    pub player_number: u32,
    /// The current increment step, derived server-side from the configured
    /// slabs and `current_bid`.
    #[serde(default)]
    pub bid_price: u64,
    #[serde(default)]
    pub has_auctioneer: bool,
    #[serde(default)]
    pub viewer_count: u32,
}

/// Team summary as synced from the backend. Budget arithmetic on these
/// fields is display-only; the server recomputes everything on each intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub remaining_budget: u64,
    #[serde(default)]
    pub players_count: u32,
    #[serde(default)]
    pub max_players_per_team: u32,
    #[serde(default)]
    pub max_biddable_amount: u64,
}

/// A player record, shared by the snapshot, notifications, and the REST
/// player listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "basePrice")]
    pub base_price: u64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// One active room as announced by the backend's lobby list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub tournament_id: String,
    pub tournament_name: String,
    #[serde(default)]
    pub viewer_count: u32,
    #[serde(default)]
    pub has_auctioneer: bool,
    #[serde(deserialize_with = "de_creation_time")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub host_id: Option<String>,
}

/// The backend has emitted room creation times both as RFC 3339 strings and
/// as epoch milliseconds; accept either.
fn de_creation_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
        Raw::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Frame codec
// ---------------------------------------------------------------------------

/// Decode an inbound text frame. Unknown event names and malformed payloads
/// return `None` (logged by the caller); a bad frame must never take down
/// the connection.
pub fn decode_frame(text: &str) -> Option<ServerEvent> {
    serde_json::from_str(text).ok()
}

/// Encode an intent into a text frame.
pub fn encode_intent(intent: &Intent) -> String {
    serde_json::to_string(intent).expect("intent serialization is infallible")
}

// ---------------------------------------------------------------------------
// REST envelope
// ---------------------------------------------------------------------------

/// The `{success, data}` response envelope every REST endpoint uses.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_intent_serializes_with_event_tag() {
        let intent = Intent::Join(JoinPayload {
            tournament_id: "T1".into(),
            user_id: Some("u42".into()),
        });
        let json: serde_json::Value =
            serde_json::from_str(&encode_intent(&intent)).unwrap();
        assert_eq!(json["event"], "join");
        assert_eq!(json["data"]["tournamentId"], "T1");
        assert_eq!(json["data"]["userId"], "u42");
    }

    #[test]
    fn anonymous_join_omits_user_id() {
        let intent = Intent::Join(JoinPayload {
            tournament_id: "T1".into(),
            user_id: None,
        });
        let encoded = encode_intent(&intent);
        assert!(!encoded.contains("userId"));
    }

    #[test]
    fn list_intent_has_no_data() {
        let json: serde_json::Value =
            serde_json::from_str(&encode_intent(&Intent::List)).unwrap();
        assert_eq!(json["event"], "list");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn undo_bid_uses_camel_case_event_name() {
        let intent = Intent::UndoBid(RoomPayload {
            tournament_id: "T1".into(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&encode_intent(&intent)).unwrap();
        assert_eq!(json["event"], "undoBid");
    }

    #[test]
    fn state_frame_decodes_to_snapshot() {
        let frame = r#"{
            "event": "state",
            "data": {
                "tournamentId": "T1",
                "isActive": true,
                "auctionMode": "category",
                "selectedCategory": "Batsman",
                "currentPlayer": {"_id": "p1", "name": "V. Sharma", "basePrice": 100},
                "currentBid": 500,
                "leadingTeam": "team-a",
                "teamBids": {"team-a": 500},
                "teams": [],
                "playerNumber": 7,
                "bidPrice": 100,
                "hasAuctioneer": true,
                "viewerCount": 12
            }
        }"#;
        let event = decode_frame(frame).unwrap();
        let ServerEvent::State(snap) = event else {
            panic!("expected state event");
        };
        assert_eq!(snap.tournament_id, "T1");
        assert_eq!(snap.current_bid, 500);
        assert_eq!(snap.leading_team.as_deref(), Some("team-a"));
        assert_eq!(snap.current_player.unwrap().name, "V. Sharma");
    }

    #[test]
    fn sparse_state_frame_still_parses() {
        let frame = r#"{"event": "state", "data": {"tournamentId": "T1"}}"#;
        let ServerEvent::State(snap) = decode_frame(frame).unwrap() else {
            panic!("expected state event");
        };
        assert!(!snap.is_active);
        assert_eq!(snap.current_bid, 0);
        assert!(snap.teams.is_empty());
    }

    #[test]
    fn unsold_frame_has_no_payload() {
        assert_eq!(
            decode_frame(r#"{"event": "unsold"}"#),
            Some(ServerEvent::Unsold)
        );
        assert_eq!(
            decode_frame(r#"{"event": "unsold", "data": null}"#),
            Some(ServerEvent::Unsold)
        );
    }

    #[test]
    fn viewer_count_frame_decodes() {
        assert_eq!(
            decode_frame(r#"{"event": "viewerCount", "data": 34}"#),
            Some(ServerEvent::ViewerCount(34))
        );
    }

    #[test]
    fn unknown_event_is_dropped_not_fatal() {
        assert_eq!(decode_frame(r#"{"event": "confetti", "data": 1}"#), None);
        assert_eq!(decode_frame("not even json"), None);
    }

    #[test]
    fn room_summary_accepts_both_time_formats() {
        let rfc = r#"{
            "tournamentId": "T1", "tournamentName": "Premier Cup",
            "viewerCount": 3, "hasAuctioneer": true,
            "creationTime": "2026-03-01T10:30:00Z", "hostId": "u1"
        }"#;
        let room: RoomSummary = serde_json::from_str(rfc).unwrap();
        assert_eq!(room.creation_time.timestamp(), 1_772_361_000);

        let millis = r#"{
            "tournamentId": "T2", "tournamentName": "League Two",
            "creationTime": 1772361000000
        }"#;
        let room: RoomSummary = serde_json::from_str(millis).unwrap();
        assert_eq!(room.creation_time.timestamp(), 1_772_361_000);
        assert!(room.host_id.is_none());
    }

    #[test]
    fn sold_frame_decodes_notice() {
        let frame = r#"{
            "event": "sold",
            "data": {
                "player": {"_id": "p1", "name": "A"},
                "team": {"_id": "t1", "name": "B", "remainingBudget": 300},
                "amount": 700
            }
        }"#;
        let ServerEvent::Sold(notice) = decode_frame(frame).unwrap() else {
            panic!("expected sold event");
        };
        assert_eq!(notice.player.name, "A");
        assert_eq!(notice.team.name, "B");
        assert_eq!(notice.amount, 700);
    }
}
