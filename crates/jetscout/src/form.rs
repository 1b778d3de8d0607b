//! The in-progress scouting form.
//!
//! [`FormController`] owns one editable record. Edits replace one field at a
//! time. Submitting validates locally, hands the record to a
//! [`SubmissionGateway`], and resets the form only if the store accepted it.
//! A failed submit leaves every edit in place so the scouter can retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gateway::SubmissionGateway;
use crate::identity::UserId;
use crate::record::{RecordId, ScoutingRecord};
use crate::timer::AutoTimer;

/// Where the form is in its submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormPhase {
    /// Accepting edits.
    #[default]
    Editing,
    /// Waiting for the store to accept the record.
    Submitting,
}

/// Owns the in-progress record and drives submission.
#[derive(Debug)]
pub struct FormController<G> {
    gateway: G,
    draft: Arc<Mutex<ScoutingRecord>>,
    phase: FormPhase,
    timer: AutoTimer,
}

impl<G: SubmissionGateway> FormController<G> {
    /// Create a form holding the default record.
    #[must_use]
    pub fn new(gateway: G, timer_tick: Duration) -> Self {
        Self {
            gateway,
            draft: Arc::new(Mutex::new(ScoutingRecord::default())),
            phase: FormPhase::Editing,
            timer: AutoTimer::new(timer_tick),
        }
    }

    fn draft(&self) -> MutexGuard<'_, ScoutingRecord> {
        // Writers only assign whole fields, so a poisoned lock still holds a
        // complete record.
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the in-progress record.
    #[must_use]
    pub fn record(&self) -> ScoutingRecord {
        self.draft().clone()
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    /// Replace one named field.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown field or an ill-typed value;
    /// the record is unchanged in that case.
    pub fn update(&mut self, field: &str, value: Value) -> Result<()> {
        self.draft().set_field(field, value)
    }

    /// Replace one named field from text, as typed on the command line.
    ///
    /// # Errors
    ///
    /// See [`ScoutingRecord::set_field_text`].
    pub fn update_text(&mut self, field: &str, raw: &str) -> Result<()> {
        self.draft().set_field_text(field, raw)
    }

    /// Apply a typed edit to the in-progress record.
    pub fn edit(&mut self, f: impl FnOnce(&mut ScoutingRecord)) {
        f(&mut *self.draft());
    }

    /// Check the fields that must be filled in before submitting.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<()> {
        validate(&self.draft())
    }

    /// Validate and submit the in-progress record on behalf of `caller`.
    ///
    /// On success the form is reset to the default record. On any failure
    /// the in-progress record is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns a validation error without contacting the store, or whatever
    /// error the gateway reported.
    pub async fn submit(&mut self, caller: Option<&UserId>) -> Result<RecordId> {
        let record = self.record();
        if let Err(e) = validate(&record) {
            debug!("Form validation failed: {e}");
            return Err(e);
        }

        self.phase = FormPhase::Submitting;
        let outcome = self.gateway.submit(caller, &record).await;
        self.phase = FormPhase::Editing;

        match outcome {
            Ok(id) => {
                info!("Scouting data submitted as record {id}");
                self.reset();
                Ok(id)
            }
            Err(e) => {
                warn!("Failed to submit scouting data: {e}");
                Err(e)
            }
        }
    }

    /// Discard all edits and stop the timer.
    pub fn reset(&mut self) {
        self.timer.reset();
        *self.draft() = ScoutingRecord::default();
    }

    /// Start the auto timer from the record's current reading.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start_timer(&mut self) {
        let from = self.draft().auto_timer;
        let draft = Arc::clone(&self.draft);
        self.timer.start(from, move |elapsed| {
            draft.lock().unwrap_or_else(PoisonError::into_inner).auto_timer = elapsed;
        });
    }

    /// Stop the auto timer, keeping its reading in the record.
    pub fn stop_timer(&mut self) {
        self.timer.stop();
    }

    /// Stop the auto timer and zero its reading.
    pub fn reset_timer(&mut self) {
        self.timer.reset();
        self.draft().auto_timer = 0.0;
    }

    /// Whether the auto timer is running.
    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }
}

/// Check the fields a scouter must fill in.
///
/// # Errors
///
/// Returns a validation error naming the first missing field.
pub fn validate(record: &ScoutingRecord) -> Result<()> {
    if record.scouter_initials.trim().is_empty() {
        return Err(Error::validation(
            "scouter_initials",
            "please enter scouter initials",
        ));
    }
    if record.team_number == 0 {
        return Err(Error::validation(
            "team_number",
            "please enter a valid team number",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway double that counts calls and answers with a fixed outcome.
    #[derive(Debug, Default)]
    struct FakeGateway {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SubmissionGateway for FakeGateway {
        async fn submit(
            &self,
            caller: Option<&UserId>,
            _record: &ScoutingRecord,
        ) -> Result<RecordId> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if caller.is_none() {
                return Err(Error::Unauthorized);
            }
            if self.fail {
                return Err(Error::store_unavailable("backend offline"));
            }
            Ok(RecordId(i64::try_from(n).unwrap() + 1))
        }
    }

    fn form(fail: bool) -> FormController<FakeGateway> {
        FormController::new(
            FakeGateway {
                calls: AtomicUsize::new(0),
                fail,
            },
            Duration::from_millis(5),
        )
    }

    fn fill(form: &mut FormController<FakeGateway>) {
        form.update("scouter_initials", json!("JS")).unwrap();
        form.update("team_number", json!(1234)).unwrap();
        form.update("match_number", json!(12)).unwrap();
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[test]
    fn test_starts_with_default_record() {
        let form = form(false);
        assert_eq!(form.record(), ScoutingRecord::default());
        assert_eq!(form.phase(), FormPhase::Editing);
    }

    #[test]
    fn test_update_is_shallow() {
        let mut form = form(false);
        form.update("auto_coral_l3", json!(2)).unwrap();
        form.update("robot", json!("Blue 1")).unwrap();

        let mut expected = ScoutingRecord::default();
        expected.auto_coral_l3 = 2;
        expected.robot = crate::record::AllianceSlot::Blue1;
        assert_eq!(form.record(), expected);
    }

    #[test]
    fn test_edit_closure() {
        let mut form = form(false);
        form.edit(|r| r.comments = "fast cycler".to_string());
        assert_eq!(form.record().comments, "fast cycler");
    }

    #[tokio::test]
    async fn test_blank_initials_rejected_before_store() {
        let mut form = form(false);
        form.update("team_number", json!(1234)).unwrap();
        form.update("scouter_initials", json!("   ")).unwrap();

        let err = form.submit(Some(&alice())).await.unwrap_err();
        assert!(matches!(&err, Error::Validation { field, .. } if field == "scouter_initials"));
        assert_eq!(form.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_team_rejected_before_store() {
        let mut form = form(false);
        form.update("scouter_initials", json!("JS")).unwrap();

        let err = form.submit(Some(&alice())).await.unwrap_err();
        assert!(matches!(&err, Error::Validation { field, .. } if field == "team_number"));
        assert_eq!(form.gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(form.record().scouter_initials, "JS");
    }

    #[tokio::test]
    async fn test_successful_submit_resets() {
        let mut form = form(false);
        fill(&mut form);

        let id = form.submit(Some(&alice())).await.unwrap();
        assert_eq!(id, RecordId(1));
        assert_eq!(form.record(), ScoutingRecord::default());
        assert_eq!(form.phase(), FormPhase::Editing);
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_edits() {
        let mut form = form(true);
        fill(&mut form);
        let before = form.record();

        let err = form.submit(Some(&alice())).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(form.record(), before);
        assert_eq!(form.phase(), FormPhase::Editing);
    }

    #[tokio::test]
    async fn test_unauthorized_submit_keeps_edits() {
        let mut form = form(false);
        fill(&mut form);
        let before = form.record();

        let err = form.submit(None).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(form.record(), before);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut form = form(false);
        fill(&mut form);
        form.update("died", json!(true)).unwrap();

        form.reset();
        assert_eq!(form.record(), ScoutingRecord::default());
    }

    #[tokio::test]
    async fn test_timer_writes_into_record() {
        let mut form = form(false);
        form.start_timer();
        assert!(form.timer_running());
        tokio::time::sleep(Duration::from_millis(40)).await;
        form.stop_timer();

        let reading = form.record().auto_timer;
        assert!(reading >= 0.04);
        assert!(!form.timer_running());

        form.reset_timer();
        assert!(form.record().auto_timer.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_timer_resumes_from_current_value() {
        let mut form = form(false);
        form.update("auto_timer", json!(5.0)).unwrap();
        form.start_timer();
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.stop_timer();

        assert!(form.record().auto_timer >= 5.0);
    }

    #[tokio::test]
    async fn test_reset_stops_timer() {
        let mut form = form(false);
        form.start_timer();
        form.reset();

        assert!(!form.timer_running());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(form.record(), ScoutingRecord::default());
    }

    #[test]
    fn test_validate_free_function() {
        let mut record = ScoutingRecord::default();
        assert!(validate(&record).is_err());
        record.scouter_initials = "A".to_string();
        record.team_number = 1;
        assert!(validate(&record).is_ok());
    }
}
