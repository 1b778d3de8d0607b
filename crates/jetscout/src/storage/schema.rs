//! `SQLite` schema definitions for jetscout.
//!
//! This module contains the SQL statements for creating the scouting table,
//! its lookup indexes, and the schema version bookkeeping.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

/// The schema version this build reads and writes.
pub const SCHEMA_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// SQL statement to create the scouting records table.
///
/// Every column is `NOT NULL`: the form always supplies every field. Label
/// columns accept only the labels the record enums decode, counters are
/// non-negative and flags are 0 or 1, so another process sharing the file
/// cannot store a row this build fails to read.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS scouting_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scouter_id TEXT NOT NULL,
    created_at TEXT NOT NULL,

    scouter_initials TEXT NOT NULL,
    match_number INTEGER NOT NULL CHECK (match_number > 0),
    robot TEXT NOT NULL
        CHECK (robot IN ('Red 1', 'Red 2', 'Red 3', 'Blue 1', 'Blue 2', 'Blue 3')),
    team_number INTEGER NOT NULL CHECK (team_number > 0),
    starting_position TEXT NOT NULL
        CHECK (starting_position IN ('Left', 'Center', 'Right')),
    no_show INTEGER NOT NULL CHECK (no_show IN (0, 1)),
    cage_position TEXT NOT NULL CHECK (cage_position IN ('Left', 'Center', 'Right')),

    auto_moved INTEGER NOT NULL CHECK (auto_moved IN (0, 1)),
    auto_timer REAL NOT NULL CHECK (auto_timer >= 0),
    auto_coral_l1 INTEGER NOT NULL CHECK (auto_coral_l1 >= 0),
    auto_coral_l2 INTEGER NOT NULL CHECK (auto_coral_l2 >= 0),
    auto_coral_l3 INTEGER NOT NULL CHECK (auto_coral_l3 >= 0),
    auto_coral_l4 INTEGER NOT NULL CHECK (auto_coral_l4 >= 0),
    auto_barge_algae INTEGER NOT NULL CHECK (auto_barge_algae >= 0),
    auto_processor_algae INTEGER NOT NULL CHECK (auto_processor_algae >= 0),
    auto_intentionally_removed_algae INTEGER NOT NULL
        CHECK (auto_intentionally_removed_algae IN (0, 1)),
    auto_foul INTEGER NOT NULL CHECK (auto_foul >= 0),

    teleop_intentionally_removed_algae INTEGER NOT NULL
        CHECK (teleop_intentionally_removed_algae IN (0, 1)),
    teleop_pickup_location TEXT NOT NULL
        CHECK (teleop_pickup_location IN ('Ground', 'Station', 'Barge')),
    teleop_coral_l1 INTEGER NOT NULL CHECK (teleop_coral_l1 >= 0),
    teleop_coral_l2 INTEGER NOT NULL CHECK (teleop_coral_l2 >= 0),
    teleop_coral_l3 INTEGER NOT NULL CHECK (teleop_coral_l3 >= 0),
    teleop_coral_l4 INTEGER NOT NULL CHECK (teleop_coral_l4 >= 0),
    teleop_barge_algae INTEGER NOT NULL CHECK (teleop_barge_algae >= 0),
    teleop_processor_algae INTEGER NOT NULL CHECK (teleop_processor_algae >= 0),
    teleop_crossed_field INTEGER NOT NULL CHECK (teleop_crossed_field IN (0, 1)),
    teleop_was_defended INTEGER NOT NULL CHECK (teleop_was_defended IN (0, 1)),
    teleop_touched_opposing_cage INTEGER NOT NULL
        CHECK (teleop_touched_opposing_cage IN (0, 1)),

    end_position TEXT NOT NULL CHECK (end_position IN ('Not Parked', 'Parked', 'Climbed')),
    died INTEGER NOT NULL CHECK (died IN (0, 1)),
    tipped_over INTEGER NOT NULL CHECK (tipped_over IN (0, 1)),

    offense_skill INTEGER NOT NULL CHECK (offense_skill BETWEEN 0 AND 5),
    defensive_skill INTEGER NOT NULL CHECK (defensive_skill BETWEEN 0 AND 5),
    yellow_card TEXT NOT NULL CHECK (yellow_card IN ('No Card', 'Yellow Card')),
    comments TEXT NOT NULL
)
";

/// Lookup by match number.
pub const CREATE_MATCH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_scouting_by_match ON scouting_records(match_number)
";

/// Lookup by team number.
pub const CREATE_TEAM_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_scouting_by_team ON scouting_records(team_number)
";

/// Lookup by submitter, newest first.
pub const CREATE_SCOUTER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_scouting_by_scouter ON scouting_records(scouter_id, id DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RECORDS_TABLE,
    CREATE_MATCH_INDEX,
    CREATE_TEAM_INDEX,
    CREATE_SCOUTER_INDEX,
    CREATE_METADATA_TABLE,
];

/// Create every table and index that does not exist yet, and stamp the
/// schema version.
///
/// # Errors
///
/// Returns an error if a statement fails, or if the database was written by
/// a newer schema version than this build understands.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    match stored_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
                (VERSION_KEY, SCHEMA_VERSION.to_string()),
            )?;
        }
        Some(version) if version > SCHEMA_VERSION => {
            return Err(Error::DatabaseMigration {
                message: format!(
                    "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
                ),
            });
        }
        Some(_) => {}
    }

    Ok(())
}

/// Read the schema version stamped in the metadata table, if any.
fn stored_version(conn: &Connection) -> Result<Option<i32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse().map_err(|_| Error::DatabaseMigration {
                message: format!("invalid schema version: {v}"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_initialize_creates_table_and_indexes() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        let indexes: Vec<String> = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='scouting_records'",
            )
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.iter().any(|n| n.contains("by_match")));
        assert!(indexes.iter().any(|n| n.contains("by_team")));
        assert!(indexes.iter().any(|n| n.contains("by_scouter")));
    }

    #[test]
    fn test_initialize_stamps_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        assert_eq!(stored_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("first init failed");
        initialize_schema(&conn).expect("second init failed");
        assert_eq!(stored_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = ?1 WHERE key = ?2",
            ((SCHEMA_VERSION + 1).to_string(), VERSION_KEY),
        )
        .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_garbage_version_is_rejected() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = 'abc' WHERE key = ?1",
            [VERSION_KEY],
        )
        .unwrap();

        assert!(matches!(
            initialize_schema(&conn),
            Err(Error::DatabaseMigration { .. })
        ));
    }

    /// A valid row as `(column, SQL literal)` pairs.
    fn valid_row() -> Vec<(&'static str, String)> {
        let mut row: Vec<(&'static str, String)> = vec![
            ("scouter_id", "'alice'".into()),
            ("created_at", "'2025-03-14T12:00:00Z'".into()),
            ("scouter_initials", "'AB'".into()),
            ("match_number", "12".into()),
            ("robot", "'Red 1'".into()),
            ("team_number", "1234".into()),
            ("starting_position", "'Left'".into()),
            ("cage_position", "'Center'".into()),
            ("auto_timer", "0.0".into()),
            ("teleop_pickup_location", "'Ground'".into()),
            ("end_position", "'Not Parked'".into()),
            ("offense_skill", "3".into()),
            ("defensive_skill", "3".into()),
            ("yellow_card", "'No Card'".into()),
            ("comments", "''".into()),
        ];
        for column in [
            "auto_coral_l1",
            "auto_coral_l2",
            "auto_coral_l3",
            "auto_coral_l4",
            "auto_barge_algae",
            "auto_processor_algae",
            "auto_foul",
            "teleop_coral_l1",
            "teleop_coral_l2",
            "teleop_coral_l3",
            "teleop_coral_l4",
            "teleop_barge_algae",
            "teleop_processor_algae",
            "no_show",
            "auto_moved",
            "auto_intentionally_removed_algae",
            "teleop_intentionally_removed_algae",
            "teleop_crossed_field",
            "teleop_was_defended",
            "teleop_touched_opposing_cage",
            "died",
            "tipped_over",
        ] {
            row.push((column, "0".into()));
        }
        row
    }

    /// Insert `valid_row` with one column replaced by a raw SQL literal.
    fn insert_with(conn: &Connection, column: &str, literal: &str) -> rusqlite::Result<usize> {
        let row: Vec<_> = valid_row()
            .into_iter()
            .map(|(c, v)| if c == column { (c, literal.to_string()) } else { (c, v) })
            .collect();
        let columns: Vec<&str> = row.iter().map(|(c, _)| *c).collect();
        let values: Vec<&str> = row.iter().map(|(_, v)| v.as_str()).collect();
        conn.execute(
            &format!(
                "INSERT INTO scouting_records ({}) VALUES ({})",
                columns.join(", "),
                values.join(", ")
            ),
            [],
        )
    }

    #[test]
    fn test_table_accepts_valid_row() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        assert_eq!(insert_with(&conn, "robot", "'Blue 3'").unwrap(), 1);
        assert_eq!(insert_with(&conn, "died", "1").unwrap(), 1);
    }

    #[test]
    fn test_table_rejects_unknown_label() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        assert!(insert_with(&conn, "robot", "'Green 9'").is_err());
        assert!(insert_with(&conn, "starting_position", "'Middle'").is_err());
        assert!(insert_with(&conn, "cage_position", "'left'").is_err());
        assert!(insert_with(&conn, "teleop_pickup_location", "'Floor'").is_err());
        assert!(insert_with(&conn, "end_position", "'Docked'").is_err());
        assert!(insert_with(&conn, "yellow_card", "'Red Card'").is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM scouting_records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_table_rejects_negative_counters_and_bad_flags() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        assert!(insert_with(&conn, "auto_coral_l1", "-1").is_err());
        assert!(insert_with(&conn, "teleop_processor_algae", "-3").is_err());
        assert!(insert_with(&conn, "no_show", "2").is_err());
        assert!(insert_with(&conn, "tipped_over", "-1").is_err());
        assert!(insert_with(&conn, "offense_skill", "6").is_err());
        assert!(insert_with(&conn, "team_number", "0").is_err());
    }
}
