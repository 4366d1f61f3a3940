use rusqlite::{Connection, Result};

/// Bumped whenever the table layout changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialise roster tables and write guards. Safe to call on every startup
/// (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_events_table(conn)?;
    create_teams_table(conn)?;
    create_players_table(conn)?;
    create_player_guards(conn)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn create_events_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id            TEXT PRIMARY KEY NOT NULL,
            date          TEXT NOT NULL,
            description   TEXT NOT NULL,
            address_text  TEXT NOT NULL,
            address_url   TEXT NOT NULL,
            extra_team    TEXT NOT NULL,
            status        TEXT NOT NULL DEFAULT 'open',
            team_limit    INTEGER NOT NULL,
            version       INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );",
    )
}

/// Team keys of an event. `position` keeps the display order.
fn create_teams_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS teams (
            event_id  TEXT NOT NULL REFERENCES events(id),
            name      TEXT NOT NULL,
            position  INTEGER NOT NULL,
            PRIMARY KEY (event_id, name)
        );",
    )
}

/// Players in insertion order (`id`). `name_key` is the lowercased trimmed
/// name; UNIQUE(event_id, name_key) makes duplicate names across teams
/// impossible at write time.
fn create_players_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS players (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id     TEXT NOT NULL,
            team         TEXT NOT NULL,
            name         TEXT NOT NULL,
            name_key     TEXT NOT NULL,
            register_by  TEXT NOT NULL,
            is_keeper    INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL,
            FOREIGN KEY (event_id, team) REFERENCES teams(event_id, name),
            UNIQUE (event_id, name_key)
        );
        CREATE INDEX IF NOT EXISTS idx_players_team
            ON players(event_id, team);",
    )
}

/// Write-time business rules. The store checks the same rules against its
/// snapshot first; these triggers reject any write that slipped past a stale
/// check (e.g. a second process sharing the database file).
///
/// RAISE messages are matched by `manager::classify_write_error`.
fn create_player_guards(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TRIGGER IF NOT EXISTS players_guard_insert
         BEFORE INSERT ON players
         BEGIN
            SELECT RAISE(ABORT, 'event_closed')
             WHERE (SELECT status FROM events WHERE id = NEW.event_id) = 'closed';
            SELECT RAISE(ABORT, 'unknown_team')
             WHERE NOT EXISTS (
                SELECT 1 FROM teams WHERE event_id = NEW.event_id AND name = NEW.team);
            SELECT RAISE(ABORT, 'keeper_taken')
             WHERE NEW.is_keeper = 1
               AND NEW.team <> (SELECT extra_team FROM events WHERE id = NEW.event_id)
               AND EXISTS (
                SELECT 1 FROM players
                 WHERE event_id = NEW.event_id AND team = NEW.team AND is_keeper = 1);
            SELECT RAISE(ABORT, 'team_full')
             WHERE NEW.team <> (SELECT extra_team FROM events WHERE id = NEW.event_id)
               AND (SELECT COUNT(*) FROM players
                     WHERE event_id = NEW.event_id AND team = NEW.team)
                   >= (SELECT team_limit FROM events WHERE id = NEW.event_id);
         END;
         CREATE TRIGGER IF NOT EXISTS players_guard_delete
         BEFORE DELETE ON players
         BEGIN
            SELECT RAISE(ABORT, 'event_closed')
             WHERE (SELECT status FROM events WHERE id = OLD.event_id) = 'closed';
         END;",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
