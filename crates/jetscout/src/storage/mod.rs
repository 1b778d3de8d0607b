//! Storage layer for jetscout.
//!
//! This module provides `SQLite`-based persistent storage for scouting
//! records. Records are append-only: there is no update or delete.

pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::record::{RecordId, ScoutingRecord, StoredRecord};

/// Columns selected for every record read, in the order `row_to_record` expects.
const SELECT_COLUMNS: &str = r"
    id, scouter_id, created_at,
    scouter_initials, match_number, robot, team_number, starting_position, no_show,
    cage_position,
    auto_moved, auto_timer, auto_coral_l1, auto_coral_l2, auto_coral_l3, auto_coral_l4,
    auto_barge_algae, auto_processor_algae, auto_intentionally_removed_algae, auto_foul,
    teleop_intentionally_removed_algae, teleop_pickup_location,
    teleop_coral_l1, teleop_coral_l2, teleop_coral_l3, teleop_coral_l4,
    teleop_barge_algae, teleop_processor_algae,
    teleop_crossed_field, teleop_was_defended, teleop_touched_opposing_cage,
    end_position, died, tipped_over,
    offense_skill, defensive_skill, yellow_card, comments
";

/// Storage engine for scouting records.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Schema-checked, append-only insertion
/// - Lookup by match number, team number, and submitter
/// - Newest-first listing of every record
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the review view read while a scouter writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        schema::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record on behalf of `scouter`.
    ///
    /// The creation timestamp is assigned here. Returns the record as stored.
    ///
    /// # Errors
    ///
    /// Returns a schema violation if the record's shape is invalid, or a
    /// database error if the insert fails. Nothing is written on error.
    pub fn insert(&self, scouter: &UserId, record: &ScoutingRecord) -> Result<StoredRecord> {
        record.check_shape()?;

        let created_at = Utc::now();
        let r = record;

        self.conn.execute(
            r"
            INSERT INTO scouting_records (
                scouter_id, created_at,
                scouter_initials, match_number, robot, team_number, starting_position,
                no_show, cage_position,
                auto_moved, auto_timer, auto_coral_l1, auto_coral_l2, auto_coral_l3,
                auto_coral_l4, auto_barge_algae, auto_processor_algae,
                auto_intentionally_removed_algae, auto_foul,
                teleop_intentionally_removed_algae, teleop_pickup_location,
                teleop_coral_l1, teleop_coral_l2, teleop_coral_l3, teleop_coral_l4,
                teleop_barge_algae, teleop_processor_algae,
                teleop_crossed_field, teleop_was_defended, teleop_touched_opposing_cage,
                end_position, died, tipped_over,
                offense_skill, defensive_skill, yellow_card, comments
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                ?31, ?32, ?33, ?34, ?35, ?36, ?37
            )
            ",
            params![
                scouter.as_str(),
                created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                r.scouter_initials,
                r.match_number,
                r.robot.as_str(),
                r.team_number,
                r.starting_position.as_str(),
                r.no_show,
                r.cage_position.as_str(),
                r.auto_moved,
                r.auto_timer,
                r.auto_coral_l1,
                r.auto_coral_l2,
                r.auto_coral_l3,
                r.auto_coral_l4,
                r.auto_barge_algae,
                r.auto_processor_algae,
                r.auto_intentionally_removed_algae,
                r.auto_foul,
                r.teleop_intentionally_removed_algae,
                r.teleop_pickup_location.as_str(),
                r.teleop_coral_l1,
                r.teleop_coral_l2,
                r.teleop_coral_l3,
                r.teleop_coral_l4,
                r.teleop_barge_algae,
                r.teleop_processor_algae,
                r.teleop_crossed_field,
                r.teleop_was_defended,
                r.teleop_touched_opposing_cage,
                r.end_position.as_str(),
                r.died,
                r.tipped_over,
                r.offense_skill,
                r.defensive_skill,
                r.yellow_card.as_str(),
                r.comments,
            ],
        )?;

        let id = RecordId(self.conn.last_insert_rowid());
        debug!(
            "Inserted record {} (match {}, team {}) for {}",
            id, record.match_number, record.team_number, scouter
        );

        Ok(StoredRecord {
            id,
            scouter_id: scouter.clone(),
            created_at,
            record: record.clone(),
        })
    }

    /// Get a record by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: RecordId) -> Result<Option<StoredRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM scouting_records WHERE id = ?1");
        let result = self
            .conn
            .query_row(&sql, [id.0], Self::row_to_record)
            .optional()?;
        Ok(result)
    }

    /// Every record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_newest_first(&self) -> Result<Vec<StoredRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM scouting_records ORDER BY id DESC");
        self.query_records(&sql, [])
    }

    /// Records submitted by `scouter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_scouter(&self, scouter: &UserId) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM scouting_records WHERE scouter_id = ?1 ORDER BY id DESC"
        );
        self.query_records(&sql, [scouter.as_str()])
    }

    /// Records for one match, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_match(&self, match_number: u32) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM scouting_records WHERE match_number = ?1 ORDER BY id"
        );
        self.query_records(&sql, [match_number])
    }

    /// Records for one team, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_team(&self, team_number: u32) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM scouting_records WHERE team_number = ?1 ORDER BY id"
        );
        self.query_records(&sql, [team_number])
    }

    /// Count total records in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM scouting_records", [], |row| row.get(0))?;
        Ok(count)
    }

    /// The ID of the most recently inserted record, from any connection.
    ///
    /// Records are append-only, so a change in this value means new records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_id(&self) -> Result<Option<RecordId>> {
        let id: Option<i64> =
            self.conn
                .query_row("SELECT MAX(id) FROM scouting_records", [], |row| row.get(0))?;
        Ok(id.map(RecordId))
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_records = self.count()?;

        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            r"
            SELECT
                (SELECT created_at FROM scouting_records ORDER BY id ASC LIMIT 1),
                (SELECT created_at FROM scouting_records ORDER BY id DESC LIMIT 1)
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let parse = |s: String| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_records,
            oldest_record: oldest.and_then(parse),
            newest_record: newest.and_then(parse),
            db_size_bytes,
        })
    }

    fn query_records<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Convert a database row to a `StoredRecord`.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<StoredRecord> {
        let created_at_str: String = row.get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
            })?;

        let record = ScoutingRecord {
            scouter_initials: row.get("scouter_initials")?,
            match_number: row.get("match_number")?,
            robot: label(row, "robot")?,
            team_number: row.get("team_number")?,
            starting_position: label(row, "starting_position")?,
            no_show: row.get("no_show")?,
            cage_position: label(row, "cage_position")?,

            auto_moved: row.get("auto_moved")?,
            auto_timer: row.get("auto_timer")?,
            auto_coral_l1: row.get("auto_coral_l1")?,
            auto_coral_l2: row.get("auto_coral_l2")?,
            auto_coral_l3: row.get("auto_coral_l3")?,
            auto_coral_l4: row.get("auto_coral_l4")?,
            auto_barge_algae: row.get("auto_barge_algae")?,
            auto_processor_algae: row.get("auto_processor_algae")?,
            auto_intentionally_removed_algae: row.get("auto_intentionally_removed_algae")?,
            auto_foul: row.get("auto_foul")?,

            teleop_intentionally_removed_algae: row.get("teleop_intentionally_removed_algae")?,
            teleop_pickup_location: label(row, "teleop_pickup_location")?,
            teleop_coral_l1: row.get("teleop_coral_l1")?,
            teleop_coral_l2: row.get("teleop_coral_l2")?,
            teleop_coral_l3: row.get("teleop_coral_l3")?,
            teleop_coral_l4: row.get("teleop_coral_l4")?,
            teleop_barge_algae: row.get("teleop_barge_algae")?,
            teleop_processor_algae: row.get("teleop_processor_algae")?,
            teleop_crossed_field: row.get("teleop_crossed_field")?,
            teleop_was_defended: row.get("teleop_was_defended")?,
            teleop_touched_opposing_cage: row.get("teleop_touched_opposing_cage")?,

            end_position: label(row, "end_position")?,
            died: row.get("died")?,
            tipped_over: row.get("tipped_over")?,

            offense_skill: row.get("offense_skill")?,
            defensive_skill: row.get("defensive_skill")?,
            yellow_card: label(row, "yellow_card")?,
            comments: row.get("comments")?,
        };

        Ok(StoredRecord {
            id: RecordId(row.get("id")?),
            scouter_id: UserId::new(row.get::<_, String>("scouter_id")?),
            created_at,
            record,
        })
    }
}

/// Read a text column holding one of an enumeration's labels.
fn label<T>(row: &rusqlite::Row, column: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    let text: String = row.get(column)?;
    text.parse().map_err(|e: Error| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of records stored.
    pub total_records: i64,
    /// Creation time of the oldest record.
    pub oldest_record: Option<DateTime<Utc>>,
    /// Creation time of the newest record.
    pub newest_record: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
