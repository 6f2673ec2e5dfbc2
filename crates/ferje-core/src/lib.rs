//! Signal cleaning for AIS ferry position reports: geofencing, vessel metadata
//! joins, MMSI pseudonymisation and UTC timestamp normalisation, plus the
//! bucket/queue plumbing that feeds uploaded files through the cleaner.

pub mod anonymizer;
pub mod bucket;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod geofence;
pub mod importer;
pub mod publisher;
pub mod timestamp;
pub mod vessel_directory;

pub use cleaner::{
    CleanResult, CleanerConfig, PositionSignal, SignalCleaner, SignalMetadata, SkippedRow,
    SkippedRowReason,
};
pub use error::{PipelineError, Result};
pub use geofence::Geofence;
