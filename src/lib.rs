pub mod calendar;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod gaps;
pub mod materialize;
pub mod model;
pub mod parser;
pub mod settings;
pub mod sync;

pub use config::Config;
pub use document::DocumentText;
pub use error::{Error, SyncResult};
pub use model::{BeneficiaryInfo, ParseOutcome, ParseWarning, ScheduleEntry, Snapshot};
