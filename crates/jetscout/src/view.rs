//! Live, filterable list of submitted records.
//!
//! A [`LiveView`] holds the latest snapshot of every record plus a text
//! filter, and keeps the filtered subset current whenever either changes.
//! It can export the filtered subset as CSV.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gateway::{Snapshot, Subscription};
use crate::record::StoredRecord;

/// Column labels of the CSV export, in order.
pub const EXPORT_HEADERS: [&str; 16] = [
    "Match Number",
    "Team Number",
    "Alliance",
    "Auto Coral L1",
    "Auto Coral L2",
    "Auto Coral L3",
    "Auto Coral L4",
    "Teleop Coral L1",
    "Teleop Coral L2",
    "Teleop Coral L3",
    "Teleop Coral L4",
    "End Position",
    "Offense Skill",
    "Comments",
    "Scouter",
    "Timestamp",
];

/// Default prefix of export file names.
pub const DEFAULT_EXPORT_PREFIX: &str = "jetscout-data";

/// The record list as the review screen sees it.
#[derive(Debug, Clone, Default)]
pub struct LiveView {
    records: Snapshot,
    filter: String,
    /// Indexes into `records` that pass the filter.
    visible: Vec<usize>,
}

impl LiveView {
    /// An empty view with no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A view over a fixed set of records.
    #[must_use]
    pub fn from_records(records: Vec<StoredRecord>) -> Self {
        let mut view = Self::new();
        view.apply_snapshot(Arc::new(records));
        view
    }

    /// Replace the held records with a newer snapshot.
    pub fn apply_snapshot(&mut self, records: Snapshot) {
        self.records = records;
        self.recompute();
    }

    /// Change the filter text.
    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter = text.into();
        self.recompute();
    }

    /// The current filter text.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Records passing the filter, in snapshot order.
    pub fn rows(&self) -> impl Iterator<Item = &StoredRecord> + '_ {
        self.visible.iter().map(move |&i| &self.records[i])
    }

    /// Number of records passing the filter.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.visible.len()
    }

    /// Number of records held, ignoring the filter.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.records.len()
    }

    /// Wait for the next snapshot from `subscription` and apply it.
    ///
    /// # Errors
    ///
    /// Returns whatever error the subscription reports.
    pub async fn follow(&mut self, subscription: &mut Subscription) -> Result<()> {
        let snapshot = subscription.changed().await?;
        debug!("View received snapshot of {} records", snapshot.len());
        self.apply_snapshot(snapshot);
        Ok(())
    }

    fn recompute(&mut self) {
        let needle = self.filter.to_lowercase();
        self.visible = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| matches_filter(r, &needle))
            .map(|(i, _)| i)
            .collect();
    }

    /// Serialize the filtered records as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyExport`] when no records pass the filter.
    pub fn export_csv(&self) -> Result<String> {
        if self.visible.is_empty() {
            return Err(Error::EmptyExport);
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(EXPORT_HEADERS)?;
        for record in self.rows() {
            writer.write_record(export_row(record))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::internal(format!("flushing CSV buffer: {e}")))?;
        String::from_utf8(bytes).map_err(|e| Error::internal(e.to_string()))
    }

    /// Write the CSV export into `dir`, named for `date`. Returns the path.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to export or the file cannot be
    /// written.
    pub fn write_export(&self, dir: &Path, prefix: &str, date: NaiveDate) -> Result<PathBuf> {
        let csv = self.export_csv()?;

        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let path = dir.join(export_file_name(prefix, date));
        std::fs::write(&path, csv)?;
        info!(
            "Exported {} records to {}",
            self.entry_count(),
            path.display()
        );
        Ok(path)
    }

    /// Render the filtered records as a fixed-width text table, showing at
    /// most `limit` rows. Records newer than `recent` are starred.
    #[must_use]
    pub fn render_table(
        &self,
        now: DateTime<Utc>,
        recent: chrono::Duration,
        limit: usize,
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>5}  {:>5}  {:<6}  {:^11}  {:^11}  {:<10}  {:>3}  {:<9}  {}",
            "Match", "Team", "Robot", "Auto L1-4", "Tele L1-4", "End", "Off", "Time", "Comments"
        );
        for record in self.rows().take(limit) {
            let r = &record.record;
            let marker = if is_recent(record, now, recent) {
                "*"
            } else {
                " "
            };
            let _ = writeln!(
                out,
                "{:>5}  {:>5}  {:<6}  {:^11}  {:^11}  {:<10}  {:>1}/5  {:<9}{} {}",
                r.match_number,
                r.team_number,
                r.robot.as_str(),
                format!(
                    "{}/{}/{}/{}",
                    r.auto_coral_l1, r.auto_coral_l2, r.auto_coral_l3, r.auto_coral_l4
                ),
                format!(
                    "{}/{}/{}/{}",
                    r.teleop_coral_l1, r.teleop_coral_l2, r.teleop_coral_l3, r.teleop_coral_l4
                ),
                r.end_position.as_str(),
                r.offense_skill,
                relative_age(record.created_at, now),
                marker,
                if r.comments.is_empty() {
                    "-"
                } else {
                    r.comments.as_str()
                },
            );
        }
        let hidden = self.entry_count().saturating_sub(limit);
        if hidden > 0 {
            let _ = writeln!(out, "... and {hidden} more");
        }
        out
    }
}

/// Whether a record's team or match number, as text, contains `needle`.
///
/// `needle` is expected lower-cased. Whitespace is kept as typed, so a
/// padded needle never matches. Empty matches everything.
#[must_use]
pub fn matches_filter(record: &StoredRecord, needle: &str) -> bool {
    needle.is_empty()
        || record.record.team_number.to_string().contains(needle)
        || record.record.match_number.to_string().contains(needle)
}

/// One CSV row for a record, in [`EXPORT_HEADERS`] order.
fn export_row(record: &StoredRecord) -> [String; 16] {
    let r = &record.record;
    [
        r.match_number.to_string(),
        r.team_number.to_string(),
        r.robot.to_string(),
        r.auto_coral_l1.to_string(),
        r.auto_coral_l2.to_string(),
        r.auto_coral_l3.to_string(),
        r.auto_coral_l4.to_string(),
        r.teleop_coral_l1.to_string(),
        r.teleop_coral_l2.to_string(),
        r.teleop_coral_l3.to_string(),
        r.teleop_coral_l4.to_string(),
        r.end_position.to_string(),
        r.offense_skill.to_string(),
        r.comments.clone(),
        r.scouter_initials.clone(),
        format_timestamp(record.created_at),
    ]
}

/// Creation time in the exporting machine's local time zone.
#[must_use]
pub fn format_timestamp(created_at: DateTime<Utc>) -> String {
    created_at
        .with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

/// File name for an export made on `date`.
#[must_use]
pub fn export_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}.csv", date.format("%Y-%m-%d"))
}

/// Whether a record was created less than `window` before `now`.
#[must_use]
pub fn is_recent(record: &StoredRecord, now: DateTime<Utc>, window: chrono::Duration) -> bool {
    record.age(now) < window
}

/// Age label as the review table shows it.
#[must_use]
pub fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        created_at
            .with_timezone(&Local)
            .format("%-m/%-d/%Y")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserId;
    use crate::record::{RecordId, ScoutingRecord};
    use chrono::Duration;

    fn stored(id: i64, match_number: u32, team_number: u32) -> StoredRecord {
        StoredRecord {
            id: RecordId(id),
            scouter_id: UserId::new("alice"),
            created_at: Utc::now(),
            record: ScoutingRecord {
                scouter_initials: "AB".to_string(),
                match_number,
                team_number,
                ..ScoutingRecord::default()
            },
        }
    }

    fn sample() -> Vec<StoredRecord> {
        vec![
            stored(5, 3, 1180),
            stored(4, 118, 254),
            stored(3, 7, 9118),
            stored(2, 11, 8),
            stored(1, 2, 1678),
        ]
    }

    fn ids(view: &LiveView) -> Vec<i64> {
        view.rows().map(|r| r.id.0).collect()
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let view = LiveView::from_records(sample());
        assert_eq!(view.entry_count(), 5);
        assert_eq!(ids(&view), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_filter_matches_team_or_match_substring() {
        let mut view = LiveView::from_records(sample());
        view.set_filter("118");
        assert_eq!(ids(&view), vec![5, 4, 3]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut view = LiveView::from_records(sample());
        view.set_filter("118");
        let first = ids(&view);
        view.set_filter("118");
        assert_eq!(ids(&view), first);
    }

    #[test]
    fn test_whitespace_in_filter_is_literal() {
        let mut view = LiveView::from_records(sample());
        view.set_filter("254");
        assert_eq!(ids(&view), vec![4]);
        view.set_filter("254 ");
        assert_eq!(view.entry_count(), 0);
        view.set_filter("   ");
        assert_eq!(view.entry_count(), 0);
        assert_eq!(view.total_count(), 5);
    }

    #[test]
    fn test_filter_no_match() {
        let mut view = LiveView::from_records(sample());
        view.set_filter("abc");
        assert_eq!(view.entry_count(), 0);
        assert_eq!(view.total_count(), 5);
    }

    #[test]
    fn test_new_snapshot_reapplies_filter() {
        let mut view = LiveView::new();
        view.set_filter("254");
        assert_eq!(view.entry_count(), 0);

        view.apply_snapshot(Arc::new(sample()));
        assert_eq!(ids(&view), vec![4]);
    }

    #[test]
    fn test_export_has_header_plus_one_line_per_record() {
        let mut view = LiveView::from_records(sample());
        view.set_filter("118");
        let csv = view.export_csv().unwrap();

        assert_eq!(csv.lines().count(), 4);
        assert!(csv.starts_with("\"Match Number\",\"Team Number\",\"Alliance\""));
    }

    #[test]
    fn test_export_escapes_quotes() {
        let mut record = stored(1, 12, 1234);
        record.record.comments = "said \"nice\", then tipped".to_string();
        let view = LiveView::from_records(vec![record]);

        let csv = view.export_csv().unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("12,1234,\"Red 1\",0,0,0,0,0,0,0,0,\"Not Parked\",3,"));
        assert!(row.contains("\"said \"\"nice\"\", then tipped\""));
        assert!(row.contains(",\"AB\","));

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let parsed = reader.records().next().unwrap().unwrap();
        assert_eq!(&parsed[13], "said \"nice\", then tipped");
    }

    #[test]
    fn test_export_empty_is_refused() {
        let view = LiveView::new();
        assert!(matches!(view.export_csv(), Err(Error::EmptyExport)));
    }

    #[test]
    fn test_write_export() {
        let dir = std::env::temp_dir().join(format!("jetscout_export_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let view = LiveView::from_records(sample());
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let path = view.write_export(&dir, DEFAULT_EXPORT_PREFIX, date).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "jetscout-data-2025-03-14.csv"
        );
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 6);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_is_recent() {
        let record = stored(1, 1, 1);
        let window = Duration::minutes(5);
        assert!(is_recent(&record, record.created_at + Duration::minutes(4), window));
        assert!(!is_recent(&record, record.created_at + Duration::minutes(5), window));
    }

    #[test]
    fn test_relative_age() {
        let t = Utc::now();
        assert_eq!(relative_age(t, t + Duration::seconds(30)), "Just now");
        assert_eq!(relative_age(t, t + Duration::minutes(12)), "12m ago");
        assert_eq!(relative_age(t, t + Duration::minutes(150)), "2h ago");
        assert!(relative_age(t, t + Duration::days(3)).contains('/'));
    }

    #[test]
    fn test_render_table_limits_rows() {
        let view = LiveView::from_records(sample());
        let table = view.render_table(Utc::now(), Duration::minutes(5), 2);
        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("... and 3 more"));
    }
}
