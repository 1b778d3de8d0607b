//! Core scouting record types for jetscout.
//!
//! A [`ScoutingRecord`] is one scouter's observation of one robot in one
//! match. Fields are grouped by match phase in documentation only; the record
//! itself is flat so that it maps one-to-one onto a storage row.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identity::UserId;

/// Highest value a skill rating may take.
pub const MAX_SKILL_RATING: u8 = 5;

/// Declares a closed set of options that serialize as their on-screen labels.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant ),+
        }

        impl $name {
            /// Every option, in the order the form presents them.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The label shown to scouters and written to storage.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(Error::schema_violation(format!(
                        "unknown {} '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

labeled_enum! {
    /// Which robot position on which alliance a record describes.
    pub enum AllianceSlot {
        #[default]
        Red1 => "Red 1",
        Red2 => "Red 2",
        Red3 => "Red 3",
        Blue1 => "Blue 1",
        Blue2 => "Blue 2",
        Blue3 => "Blue 3",
    }
}

labeled_enum! {
    /// A left/center/right position on the field, used for both the starting
    /// line and the cage.
    pub enum FieldPosition {
        #[default]
        Left => "Left",
        Center => "Center",
        Right => "Right",
    }
}

labeled_enum! {
    /// Where the robot picked up game pieces during teleop.
    pub enum PickupLocation {
        #[default]
        Ground => "Ground",
        Station => "Station",
        Barge => "Barge",
    }
}

labeled_enum! {
    /// Where the robot finished the match.
    pub enum EndPosition {
        #[default]
        NotParked => "Not Parked",
        Parked => "Parked",
        Climbed => "Climbed",
    }
}

labeled_enum! {
    /// Penalty card shown to the robot's team.
    pub enum PenaltyCard {
        #[default]
        NoCard => "No Card",
        YellowCard => "Yellow Card",
    }
}

impl AllianceSlot {
    /// Whether this slot is on the red alliance.
    #[must_use]
    pub fn is_red(self) -> bool {
        matches!(self, Self::Red1 | Self::Red2 | Self::Red3)
    }
}

/// Identifier assigned to a record by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observation of one robot in one match, as entered on the form.
///
/// Every field is required. Fields that only matter when another flag is set
/// (the algae-removal flags, the pickup location) are still always recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoutingRecord {
    // Prematch
    /// Initials of the person scouting.
    pub scouter_initials: String,
    /// Qualification match number.
    pub match_number: u32,
    /// Alliance slot of the observed robot.
    pub robot: AllianceSlot,
    /// Team number of the observed robot.
    pub team_number: u32,
    /// Position on the starting line.
    pub starting_position: FieldPosition,
    /// Robot never showed up for the match.
    pub no_show: bool,
    /// Cage the robot was assigned.
    pub cage_position: FieldPosition,

    // Autonomous
    /// Left the starting line during auto.
    pub auto_moved: bool,
    /// Stopwatch reading for the auto routine, in seconds.
    pub auto_timer: f64,
    pub auto_coral_l1: u32,
    pub auto_coral_l2: u32,
    pub auto_coral_l3: u32,
    pub auto_coral_l4: u32,
    pub auto_barge_algae: u32,
    pub auto_processor_algae: u32,
    pub auto_intentionally_removed_algae: bool,
    pub auto_foul: u32,

    // Teleop
    pub teleop_intentionally_removed_algae: bool,
    pub teleop_pickup_location: PickupLocation,
    pub teleop_coral_l1: u32,
    pub teleop_coral_l2: u32,
    pub teleop_coral_l3: u32,
    pub teleop_coral_l4: u32,
    pub teleop_barge_algae: u32,
    pub teleop_processor_algae: u32,
    /// Crossed the field or played defense.
    pub teleop_crossed_field: bool,
    pub teleop_was_defended: bool,
    pub teleop_touched_opposing_cage: bool,

    // Endgame
    pub end_position: EndPosition,
    pub died: bool,
    /// Tipped or fell over.
    pub tipped_over: bool,

    // Postmatch
    /// Offensive skill, 0 through 5.
    pub offense_skill: u8,
    /// Defensive skill, 0 through 5.
    pub defensive_skill: u8,
    pub yellow_card: PenaltyCard,
    pub comments: String,
}

impl Default for ScoutingRecord {
    fn default() -> Self {
        Self {
            scouter_initials: String::new(),
            match_number: 1,
            robot: AllianceSlot::default(),
            team_number: 0,
            starting_position: FieldPosition::default(),
            no_show: false,
            cage_position: FieldPosition::default(),

            auto_moved: false,
            auto_timer: 0.0,
            auto_coral_l1: 0,
            auto_coral_l2: 0,
            auto_coral_l3: 0,
            auto_coral_l4: 0,
            auto_barge_algae: 0,
            auto_processor_algae: 0,
            auto_intentionally_removed_algae: false,
            auto_foul: 0,

            teleop_intentionally_removed_algae: false,
            teleop_pickup_location: PickupLocation::default(),
            teleop_coral_l1: 0,
            teleop_coral_l2: 0,
            teleop_coral_l3: 0,
            teleop_coral_l4: 0,
            teleop_barge_algae: 0,
            teleop_processor_algae: 0,
            teleop_crossed_field: false,
            teleop_was_defended: false,
            teleop_touched_opposing_cage: false,

            end_position: EndPosition::default(),
            died: false,
            tipped_over: false,

            offense_skill: 3,
            defensive_skill: 3,
            yellow_card: PenaltyCard::default(),
            comments: String::new(),
        }
    }
}

impl ScoutingRecord {
    /// Names of every field, sorted alphabetically.
    #[must_use]
    pub fn field_names() -> Vec<String> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Replace a single named field, leaving every other field untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the field does not exist or the value
    /// has the wrong type. The record is unchanged in that case.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let mut doc = serde_json::to_value(&*self)?;
        let Value::Object(map) = &mut doc else {
            return Err(Error::internal("record did not serialize to an object"));
        };

        match map.get_mut(name) {
            Some(slot) => *slot = value,
            None => return Err(Error::validation(name, "no such field")),
        }

        let updated: Self =
            serde_json::from_value(doc).map_err(|e| Error::validation(name, e.to_string()))?;
        *self = updated;
        Ok(())
    }

    /// Replace a single named field from its textual form.
    ///
    /// The text is read as JSON when it parses as JSON and fits the field,
    /// otherwise as a plain string (so `robot=Red 1` and `comments=fast`
    /// need no quoting).
    ///
    /// # Errors
    ///
    /// Returns a validation error if neither reading fits the field.
    pub fn set_field_text(&mut self, name: &str, raw: &str) -> Result<()> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) if !value.is_string() => match self.set_field(name, value) {
                Ok(()) => Ok(()),
                Err(err) => self
                    .set_field(name, Value::String(raw.to_string()))
                    .map_err(|_| err),
            },
            Ok(value) => self.set_field(name, value),
            Err(_) => self.set_field(name, Value::String(raw.to_string())),
        }
    }

    /// Check the record against the storage schema.
    ///
    /// # Errors
    ///
    /// Returns a schema violation describing the first mismatch found.
    pub fn check_shape(&self) -> Result<()> {
        if self.match_number == 0 {
            return Err(Error::schema_violation("match_number must be positive"));
        }
        if self.team_number == 0 {
            return Err(Error::schema_violation("team_number must be positive"));
        }
        if !self.auto_timer.is_finite() || self.auto_timer < 0.0 {
            return Err(Error::schema_violation(format!(
                "auto_timer must be a non-negative number of seconds, got {}",
                self.auto_timer
            )));
        }
        for (name, rating) in [
            ("offense_skill", self.offense_skill),
            ("defensive_skill", self.defensive_skill),
        ] {
            if rating > MAX_SKILL_RATING {
                return Err(Error::schema_violation(format!(
                    "{name} must be between 0 and {MAX_SKILL_RATING}, got {rating}"
                )));
            }
        }
        Ok(())
    }
}

/// A record as held by the store, with the metadata the store attaches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    /// Identifier assigned at insert.
    pub id: RecordId,
    /// Authenticated caller that submitted the record.
    pub scouter_id: UserId,
    /// When the store accepted the record.
    pub created_at: DateTime<Utc>,
    /// The submitted observation.
    #[serde(flatten)]
    pub record: ScoutingRecord,
}

impl StoredRecord {
    /// Time elapsed between creation and `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}
