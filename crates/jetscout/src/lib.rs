//! `jetscout` - robotics match scouting
//!
//! Scouters fill in one record per robot per match. Records are appended to a
//! shared store, attributed to the signed-in caller, and can be read back by
//! submitter, match, or team, followed live, filtered, and exported to CSV.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod record;
pub mod storage;
pub mod timer;
pub mod view;

pub use config::Config;
pub use error::{Error, Result};
pub use form::{FormController, FormPhase};
pub use gateway::{Gateway, Snapshot, SubmissionGateway, Subscription};
pub use identity::{IdentityProvider, StaticIdentity, UserId};
pub use logging::init_logging;
pub use record::{RecordId, ScoutingRecord, StoredRecord};
pub use storage::{Storage, StorageStats};
pub use timer::AutoTimer;
pub use view::LiveView;
