use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use roster_core::config::DEFAULT_TEAM_LIMIT;
use roster_core::registration::Registration;
use roster_core::types::{name_key, Address, Event, EventId, EventStatus, Player, Teams};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::rules::{check_new_event, check_registration};
use crate::types::{EventSummary, NewEvent, Registered, Unregistered};

/// Persistent event rosters.
///
/// Every mutation runs in a `BEGIN IMMEDIATE` transaction: the write lock is
/// taken before the snapshot is read, so the rule checks and the write see
/// the same roster. Insert triggers and the unique name index reject
/// anything a stale writer sharing the file could still slip through.
pub struct RosterStore {
    db: Mutex<Connection>,
    default_team_limit: usize,
}

impl RosterStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            default_team_limit: DEFAULT_TEAM_LIMIT,
        }
    }

    /// Fresh in-memory store with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        crate::db::init_db(&conn)?;
        Ok(Self::new(conn))
    }

    /// Team limit for events created without one.
    pub fn with_default_team_limit(mut self, limit: usize) -> Self {
        self.default_team_limit = limit;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Load an event with its full roster. Malformed ids resolve to `None`.
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: &str) -> Result<Option<Event>> {
        let Some(id) = EventId::parse(id) else {
            debug!("malformed event id");
            return Ok(None);
        };
        let db = self.lock()?;
        load_event(&db, id.as_str())
    }

    /// All events, most recent date first.
    #[instrument(skip(self))]
    pub fn list_events(&self) -> Result<Vec<EventSummary>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(
            "SELECT e.id, e.date, e.description, e.status, e.version,
                    (SELECT COUNT(*) FROM players p WHERE p.event_id = e.id)
             FROM events e
             ORDER BY e.date DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, date, description, status, version, players) = row?;
            out.push(EventSummary {
                id: EventId(id),
                date: parse_date(&date)?,
                description,
                status: parse_status(&status)?,
                players: players as usize,
                version: version as u64,
            });
        }
        Ok(out)
    }

    /// Persist a new, empty event.
    #[instrument(skip(self, new), fields(description = %new.description))]
    pub fn create_event(&self, new: NewEvent) -> Result<Event> {
        let team_limit = new.team_limit.unwrap_or(self.default_team_limit);
        check_new_event(&new, team_limit)?;

        let id = new.id.clone().unwrap_or_default();
        if EventId::parse(id.as_str()).is_none() {
            return Err(StoreError::InvalidEvent(format!("malformed event id: {}", id)));
        }
        let now = Utc::now().to_rfc3339();

        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM events WHERE id = ?1",
                params![id.as_str()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(StoreError::InvalidEvent(format!("event {} already exists", id)));
        }

        tx.execute(
            "INSERT INTO events
             (id, date, description, address_text, address_url, extra_team,
              status, team_limit, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, 0, ?8, ?8)",
            params![
                id.as_str(),
                new.date.to_rfc3339(),
                new.description,
                new.address.text,
                new.address.url,
                new.extra_team,
                team_limit as i64,
                now
            ],
        )?;
        for (position, team) in new.teams.iter().enumerate() {
            tx.execute(
                "INSERT INTO teams (event_id, name, position) VALUES (?1, ?2, ?3)",
                params![id.as_str(), team, position as i64],
            )?;
        }

        let event = require_event(&tx, id.as_str())?;
        tx.commit()?;
        info!(event_id = %event.id, teams = event.teams.len(), "event created");
        Ok(event)
    }

    /// Stop accepting roster changes. Closing twice is harmless.
    #[instrument(skip(self))]
    pub fn close_event(&self, id: &str) -> Result<Event> {
        let not_found = || StoreError::NotFound { id: id.to_string() };
        let id = EventId::parse(id).ok_or_else(not_found)?;

        let db = self.lock()?;
        let changed = db.execute(
            "UPDATE events SET status = 'closed', updated_at = ?2 WHERE id = ?1",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(not_found());
        }
        info!(event_id = %id, "event closed");
        require_event(&db, id.as_str())
    }

    /// Add a player to a team of an open event.
    ///
    /// Checked in order: event exists, event open, team exists, keeper slot
    /// free and team below capacity (playable teams only), name unused in
    /// every team of the event.
    #[instrument(skip(self, reg), fields(team = %reg.team, player = %reg.player_name))]
    pub fn register(&self, id: &str, reg: &Registration, register_by: &str) -> Result<Registered> {
        let event_id = EventId::parse(id).ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let event = require_event(&tx, event_id.as_str())?;
        check_registration(&event, reg)?;

        let player = Player::new(reg.player_name.clone(), register_by, reg.is_keeper);
        let inserted = tx.execute(
            "INSERT INTO players
             (event_id, team, name, name_key, register_by, is_keeper, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event_id.as_str(),
                reg.team,
                player.name,
                name_key(&player.name),
                player.register_by,
                player.is_keeper,
                Utc::now().to_rfc3339()
            ],
        );
        if let Err(e) = inserted {
            let err = classify_write_error(&tx, &event, reg, e);
            warn!(error = %err, "insert rejected at write time");
            return Err(err);
        }

        bump_version(&tx, event_id.as_str())?;
        let event = require_event(&tx, event_id.as_str())?;
        tx.commit()?;

        info!(event_id = %event.id, version = event.version, "player registered");
        Ok(Registered { event, player })
    }

    /// Remove a player from a team. The name matches case-insensitively.
    ///
    /// A player that is not in the team is a successful no-op: nothing is
    /// written, the version is unchanged and `removed` is `None`. Only the
    /// account that registered the player may remove it.
    #[instrument(skip(self))]
    pub fn unregister(
        &self,
        id: &str,
        team: &str,
        player_name: &str,
        requested_by: &str,
    ) -> Result<Unregistered> {
        let event_id = EventId::parse(id).ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let event = require_event(&tx, event_id.as_str())?;
        if event.is_closed() {
            return Err(StoreError::EventClosed {
                id: event_id.to_string(),
            });
        }
        if !event.teams.contains(team) {
            return Err(StoreError::UnknownTeam {
                team: team.to_string(),
            });
        }

        let found = tx
            .query_row(
                "SELECT id, name, register_by, is_keeper FROM players
                 WHERE event_id = ?1 AND team = ?2 AND name_key = ?3",
                params![event_id.as_str(), team, name_key(player_name)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        Player::new(
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, bool>(3)?,
                        ),
                    ))
                },
            )
            .optional()?;

        let Some((row_id, player)) = found else {
            debug!("player not in team, nothing to remove");
            return Ok(Unregistered {
                event,
                removed: None,
            });
        };

        if player.register_by != requested_by {
            return Err(StoreError::NotOwner { name: player.name });
        }

        tx.execute("DELETE FROM players WHERE id = ?1", params![row_id])?;
        bump_version(&tx, event_id.as_str())?;
        let event = require_event(&tx, event_id.as_str())?;
        tx.commit()?;

        info!(event_id = %event.id, version = event.version, "player removed");
        Ok(Unregistered {
            event,
            removed: Some(player),
        })
    }
}

fn bump_version(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE events SET version = version + 1, updated_at = ?2 WHERE id = ?1",
        params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn require_event(conn: &Connection, id: &str) -> Result<Event> {
    load_event(conn, id)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

struct EventRow {
    id: String,
    date: String,
    description: String,
    address_text: String,
    address_url: String,
    extra_team: String,
    status: String,
    team_limit: i64,
    version: i64,
}

fn load_event(conn: &Connection, id: &str) -> Result<Option<Event>> {
    let row = conn
        .query_row(
            "SELECT id, date, description, address_text, address_url,
                    extra_team, status, team_limit, version
             FROM events WHERE id = ?1",
            params![id],
            |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    description: row.get(2)?,
                    address_text: row.get(3)?,
                    address_url: row.get(4)?,
                    extra_team: row.get(5)?,
                    status: row.get(6)?,
                    team_limit: row.get(7)?,
                    version: row.get(8)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let mut teams = Teams::new();
    let mut stmt =
        conn.prepare("SELECT name FROM teams WHERE event_id = ?1 ORDER BY position")?;
    for name in stmt.query_map(params![id], |r| r.get::<_, String>(0))? {
        teams.insert_team(name?);
    }

    let mut stmt = conn.prepare(
        "SELECT team, name, register_by, is_keeper FROM players
         WHERE event_id = ?1 ORDER BY id",
    )?;
    let players = stmt.query_map(params![id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            Player::new(
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, bool>(3)?,
            ),
        ))
    })?;
    for entry in players {
        let (team, player) = entry?;
        teams
            .get_mut(&team)
            .ok_or_else(|| StoreError::Corrupt(format!("player {} in unknown team {}", player.name, team)))?
            .players
            .push(player);
    }

    Ok(Some(Event {
        id: EventId(row.id),
        date: parse_date(&row.date)?,
        description: row.description,
        address: Address {
            text: row.address_text,
            url: row.address_url,
        },
        teams,
        extra_team: row.extra_team,
        status: parse_status(&row.status)?,
        team_limit: row.team_limit as usize,
        version: row.version as u64,
    }))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("events.date {:?}: {}", raw, e)))
}

fn parse_status(raw: &str) -> Result<EventStatus> {
    raw.parse().map_err(StoreError::Corrupt)
}

/// Map a failed player insert to the rule it broke.
///
/// Trigger RAISE messages and the unique name index are the write-time
/// twins of the checks in `rules`.
fn classify_write_error(
    conn: &Connection,
    event: &Event,
    reg: &Registration,
    err: rusqlite::Error,
) -> StoreError {
    let message = match &err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) if e.code == ErrorCode::ConstraintViolation => {
            msg.clone()
        }
        _ => return StoreError::Database(err),
    };
    let id = event.id.as_str();

    match message.as_str() {
        "event_closed" => StoreError::EventClosed { id: id.to_string() },
        "unknown_team" => StoreError::UnknownTeam {
            team: reg.team.clone(),
        },
        "team_full" => StoreError::TeamFull {
            team: reg.team.clone(),
            limit: event.team_limit,
        },
        "keeper_taken" => StoreError::KeeperTaken {
            team: reg.team.clone(),
            keeper: conn
                .query_row(
                    "SELECT name FROM players
                     WHERE event_id = ?1 AND team = ?2 AND is_keeper = 1",
                    params![id, reg.team],
                    |r| r.get(0),
                )
                .unwrap_or_default(),
        },
        m if m.starts_with("UNIQUE") => StoreError::DuplicatePlayer {
            name: reg.player_name.clone(),
            team: conn
                .query_row(
                    "SELECT team FROM players WHERE event_id = ?1 AND name_key = ?2",
                    params![id, name_key(&reg.player_name)],
                    |r| r.get(0),
                )
                .unwrap_or_else(|_| reg.team.clone()),
        },
        _ => StoreError::Database(err),
    }
}
