// SQLite-backed session store.
//
// Holds the client-side session the browser front-end kept in local
// storage: the signed-in user's profile, the authentication flag, and the
// last selected tournament id. Plain key/value rows, no encryption. The
// stored profile is a client-asserted hint only; nothing at this layer
// verifies it, and it must never be treated as an authorization boundary
// (the backend enforces permissions on every intent and request).

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

const KEY_USER: &str = "user";
const KEY_IS_AUTHENTICATED: &str = "is_authenticated";
const KEY_SELECTED_TOURNAMENT: &str = "selected_tournament_id";

/// The stored user profile, as handed out by the backend at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (or create) the session database at `path`. Pass `":memory:"`
    /// for an ephemeral store in tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open session store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;

             CREATE TABLE IF NOT EXISTS session (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .context("failed to create session schema")?;

        Ok(SessionStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("session store lock poisoned")
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM session WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read session key {key}"))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO session (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write session key {key}"))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM session WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete session key {key}"))?;
        Ok(())
    }

    // -- user ---------------------------------------------------------------

    pub fn user(&self) -> Result<Option<UserProfile>> {
        match self.get(KEY_USER)? {
            Some(raw) => {
                let profile =
                    serde_json::from_str(&raw).context("stored user profile is corrupt")?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    pub fn set_user(&self, profile: &UserProfile) -> Result<()> {
        let raw = serde_json::to_string(profile).context("failed to encode user profile")?;
        self.set(KEY_USER, &raw)?;
        self.set(KEY_IS_AUTHENTICATED, "true")
    }

    pub fn clear_user(&self) -> Result<()> {
        self.delete(KEY_USER)?;
        self.set(KEY_IS_AUTHENTICATED, "false")
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.get(KEY_IS_AUTHENTICATED)?.as_deref() == Some("true"))
    }

    // -- selected tournament ------------------------------------------------

    pub fn selected_tournament(&self) -> Result<Option<String>> {
        self.get(KEY_SELECTED_TOURNAMENT)
    }

    pub fn set_selected_tournament(&self, tournament_id: &str) -> Result<()> {
        self.set(KEY_SELECTED_TOURNAMENT, tournament_id)
    }
}
