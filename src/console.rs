// Line-based console frontend: command parsing and room rendering.
//
// The controller stays frontend-agnostic; this module turns input lines
// into [`Command`]s and [`UiEvent`]s into terminal output. Sound playback
// has no audio device here, so an enabled cue renders as a marker line.

use crate::auction::state::Screen;
use crate::room::{RoomController, SoundCue, UiEvent};

/// A user gesture, parsed from one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join(String),
    Rooms,
    DeleteRoom(String),
    Start,
    /// Next player by category (`None` lets the server pick from the
    /// active category).
    Next { category: Option<String> },
    /// Manual selection of a specific player.
    Pick(String),
    Search {
        query: String,
        category: Option<String>,
    },
    Bid(String),
    Undo,
    Sold,
    Unsold,
    ResetMode,
    Settings,
    SlabAdd { min_bid: u64, increment: u64 },
    SlabRemove(usize),
    SlabIncrement { index: usize, increment: u64 },
    SlabSave,
    SlabCancel,
    Sound(bool),
    Animation(bool),
    Status,
    Quit,
}

pub fn usage() -> &'static str {
    "commands:
  rooms | join <id> | delete <id>
  start | next [category] | pick <player-id> | search <text> [@category]
  bid <team-id> | undo | sold | unsold | reset
  settings | slab add <min> <increment> | slab rm <n> | slab inc <n> <value>
  slab save | slab cancel
  sound on|off | anim on|off | status | quit"
}

/// Parse one input line. Errors are short usage hints, printed verbatim.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut tokens = line.split_whitespace();
    let head = tokens.next().ok_or("empty command")?;
    let rest: Vec<&str> = tokens.collect();

    let arg = |name: &str| -> Result<String, String> {
        rest.first()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("usage: {head} <{name}>"))
    };

    match head {
        "join" => Ok(Command::Join(arg("tournament-id")?)),
        "rooms" => Ok(Command::Rooms),
        "delete" => Ok(Command::DeleteRoom(arg("tournament-id")?)),
        "start" => Ok(Command::Start),
        "next" => Ok(Command::Next {
            category: if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            },
        }),
        "pick" => Ok(Command::Pick(arg("player-id")?)),
        "search" => {
            let (category, words): (Option<String>, &[&str]) = match rest.split_last() {
                Some((last, front)) if last.starts_with('@') => {
                    (Some(last.trim_start_matches('@').to_string()), front)
                }
                _ => (None, &rest[..]),
            };
            Ok(Command::Search {
                query: words.join(" "),
                category,
            })
        }
        "bid" => Ok(Command::Bid(arg("team-id")?)),
        "undo" => Ok(Command::Undo),
        "sold" => Ok(Command::Sold),
        "unsold" => Ok(Command::Unsold),
        "reset" => Ok(Command::ResetMode),
        "settings" => Ok(Command::Settings),
        "slab" => parse_slab(&rest),
        "sound" => parse_toggle(&rest).map(Command::Sound),
        "anim" => parse_toggle(&rest).map(Command::Animation),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {other} (try `help`)")),
    }
}

fn parse_slab(rest: &[&str]) -> Result<Command, String> {
    match rest {
        ["add", min, inc] => Ok(Command::SlabAdd {
            min_bid: parse_num(min)?,
            increment: parse_num(inc)?,
        }),
        ["rm", index] => Ok(Command::SlabRemove(parse_num(index)? as usize)),
        ["inc", index, value] => Ok(Command::SlabIncrement {
            index: parse_num(index)? as usize,
            increment: parse_num(value)?,
        }),
        ["save"] => Ok(Command::SlabSave),
        ["cancel"] => Ok(Command::SlabCancel),
        _ => Err("usage: slab add <min> <increment> | rm <n> | inc <n> <value> | save | cancel"
            .to_string()),
    }
}

fn parse_toggle(rest: &[&str]) -> Result<bool, String> {
    match rest {
        ["on"] => Ok(true),
        ["off"] => Ok(false),
        _ => Err("expected `on` or `off`".to_string()),
    }
}

fn parse_num(raw: &str) -> Result<u64, String> {
    raw.parse().map_err(|_| format!("not a number: {raw}"))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Print the effects of one controller step.
pub fn render_updates(controller: &RoomController, updates: &[UiEvent]) {
    for update in updates {
        match update {
            UiEvent::Connection(true) => println!("── connected ──"),
            UiEvent::Connection(false) => println!("── disconnected, retrying ──"),
            UiEvent::Toast(message) => println!("• {message}"),
            UiEvent::Sound(SoundCue::Sold) => println!("♪ sold"),
            UiEvent::Sound(SoundCue::Unsold) => println!("♪ unsold"),
            UiEvent::Render => render_room(controller),
            UiEvent::RoomsChanged => render_rooms(controller),
        }
    }
}

fn render_room(controller: &RoomController) {
    if let Some(capture) = controller.sold_overlay.visible() {
        println!(
            "*** SOLD: {} to {} for {} ***",
            capture.player_name, capture.team_name, capture.amount
        );
    }
    if let Some(capture) = controller.unsold_overlay.visible() {
        match &capture.player_name {
            Some(name) => println!("*** UNSOLD: {name} ***"),
            None => println!("*** UNSOLD ***"),
        }
    }

    match controller.client.screen() {
        Screen::Connecting => println!("Connecting…"),
        Screen::Setup => {
            if controller.client.is_auctioneer() {
                println!("Room idle. `next [category]` or `pick <player-id>` to begin.");
            } else {
                println!("Waiting for the auctioneer to start the auction…");
            }
        }
        Screen::Live => render_live(controller),
    }

    if let Some(editor) = &controller.slab_editor {
        println!("bid increments (staged{}):", if editor.is_dirty() { ", unsaved" } else { "" });
        for (i, slab) in editor.slabs().iter().enumerate() {
            match slab.max_bid {
                Some(max) => println!("  [{i}] {}..={} step {}", slab.min_bid, max, slab.increment),
                None => println!("  [{i}] {}.. step {}", slab.min_bid, slab.increment),
            }
        }
    }

    if let Some(search) = &controller.search {
        println!("search \"{}\":", search.query);
        for player in search.results() {
            println!(
                "  {} {} ({})",
                player.id,
                player.name,
                player.category.as_deref().unwrap_or("-")
            );
        }
    }
}

fn render_live(controller: &RoomController) {
    let Some(snapshot) = controller.client.snapshot() else {
        return;
    };

    if let Some(category) = &snapshot.selected_category {
        println!("category round: {category}");
    }
    match &snapshot.current_player {
        Some(player) => {
            println!(
                "#{} {} ({}), bid {} step {}",
                snapshot.player_number,
                player.name,
                player.category.as_deref().unwrap_or("-"),
                snapshot.current_bid,
                snapshot.bid_price
            );
            match snapshot.leading_team.as_deref().and_then(|id| snapshot.team(id)) {
                Some(team) => println!("leading: {}", team.name),
                None => println!("leading: —"),
            }
        }
        None => println!("No player up; waiting for the next round."),
    }

    for team in &snapshot.teams {
        let marker = if snapshot.leading_team.as_deref() == Some(team.id.as_str()) {
            ">"
        } else {
            " "
        };
        let label = match controller.rejection(&team.id) {
            Some(rejection) => format!("  ! {rejection}"),
            None => match controller.team_verdict(team) {
                Ok(()) => String::new(),
                Err(_) => "  (cannot bid)".to_string(),
            },
        };
        let last_bid = snapshot
            .team_bids
            .get(&team.id)
            .map(|b| format!("  last {b}"))
            .unwrap_or_default();
        println!(
            "{marker} {:<12} budget {:<8} players {}/{}{last_bid}{label}",
            team.name, team.remaining_budget, team.players_count, team.max_players_per_team
        );
    }
    println!(
        "viewers: {}  auctioneer: {}  you: {}",
        snapshot.viewer_count,
        if snapshot.has_auctioneer { "yes" } else { "no" },
        if controller.client.is_auctioneer() {
            "auctioneer"
        } else {
            "viewer"
        }
    );
}

fn render_rooms(controller: &RoomController) {
    let rooms = controller.lobby.rooms();
    if rooms.is_empty() {
        println!("no active rooms");
        return;
    }
    println!("active rooms:");
    for room in rooms {
        println!(
            "  {}  {}  viewers {}  host {}  since {}",
            room.tournament_id,
            room.tournament_name,
            room.viewer_count,
            if room.has_auctioneer { "live" } else { "absent" },
            room.creation_time.format("%Y-%m-%d %H:%M")
        );
    }
}
