use chrono_tz::Tz;
use ferje_parser::{parse_table, Column, ColumnIndex, HeaderSplit, ParserError, RowRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anonymizer::anonymize_mmsi;
use crate::error::{PipelineError, Result};
use crate::geofence::Geofence;
use crate::timestamp::TimestampNormalizer;
use crate::vessel_directory::VesselDirectory;

pub const POSITION_TABLE: &str = "positions";
pub const DEFAULT_SOURCE_TAG: &str = "ais";
pub const DEFAULT_DELIMITER: char = ';';

#[derive(Debug, Clone, PartialEq)]
pub struct CleanerConfig {
    pub geofence: Geofence,
    pub timezone: Tz,
    pub source_tag: String,
    pub delimiter: char,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            geofence: Geofence::TRONDHEIM_HARBOUR,
            timezone: chrono_tz::Europe::Oslo,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSignal {
    pub timestamp: String,
    pub ferry_id: String,
    pub lat: f64,
    pub lon: f64,
    pub source: String,
    pub metadata: SignalMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub width: f64,
    pub length: f64,
    #[serde(rename = "type")]
    pub vessel_type: String,
    pub heading: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based line in the position text.
    pub line_number: usize,
    pub mmsi: Option<String>,
    pub reason: SkippedRowReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkippedRowReason {
    RowLengthMismatch { expected: usize, found: usize },
    OrphanSignal,
}

impl SkippedRowReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkippedRowReason::RowLengthMismatch { .. } => "row_length_mismatch",
            SkippedRowReason::OrphanSignal => "orphan_signal",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanResult {
    /// Retained signals, in input order.
    pub signals: Vec<PositionSignal>,
    pub skipped: Vec<SkippedRow>,
    /// Rows dropped for lying outside the geofence.
    pub excluded: usize,
}

struct PositionColumns {
    mmsi: Column,
    lat: Column,
    lon: Column,
    timestamp: Column,
    heading: Column,
}

impl PositionColumns {
    fn resolve(index: &ColumnIndex) -> std::result::Result<Self, ParserError> {
        Ok(Self {
            mmsi: index.require("mmsi")?,
            lat: index.require("lat")?,
            lon: index.require("lon")?,
            timestamp: index.require("date_time_utc")?,
            heading: index.require("true_heading")?,
        })
    }
}

/// Filters, joins and normalises one position table against one vessel table.
#[derive(Debug, Clone)]
pub struct SignalCleaner {
    config: CleanerConfig,
    normalizer: TimestampNormalizer,
}

impl SignalCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        let normalizer = TimestampNormalizer::new(config.timezone);
        Self { config, normalizer }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Runs one pass over the position table.
    ///
    /// Rows shorter than the header and rows with no vessel metadata are
    /// reported in [`CleanResult::skipped`]; rows outside the geofence are only
    /// counted. Unparseable coordinates, headings or timestamps, a missing
    /// header column, or a bad vessel table abort the run with no output.
    pub fn clean(&self, positions: &str, vessels: &str) -> Result<CleanResult> {
        let position_rows = parse_table(positions, self.config.delimiter);
        let vessel_rows = parse_table(vessels, self.config.delimiter);

        let split = HeaderSplit::locate(POSITION_TABLE, &position_rows)?;
        let index = split.index();
        let columns = PositionColumns::resolve(&index)?;
        let directory = VesselDirectory::from_rows(&vessel_rows)?;
        debug!(vessels = directory.len(), "built vessel directory");

        let expected = index.width();
        let mut result = CleanResult::default();

        for (offset, row) in split.body.iter().enumerate() {
            let line_number = split.line_number(offset);
            if row.len() < expected {
                warn!(
                    line_number,
                    expected,
                    found = row.len(),
                    "position row shorter than header, skipping"
                );
                result.skipped.push(SkippedRow {
                    line_number,
                    mmsi: None,
                    reason: SkippedRowReason::RowLengthMismatch {
                        expected,
                        found: row.len(),
                    },
                });
                continue;
            }

            let row = RowRef::new(POSITION_TABLE, line_number, row);
            let lat = row.number(&columns.lat)?;
            let lon = row.number(&columns.lon)?;
            if !self.config.geofence.contains(lat, lon) {
                debug!(line_number, lat, lon, "position outside operating area");
                result.excluded += 1;
                continue;
            }

            let mmsi = row.text(&columns.mmsi)?;
            let Some(vessel) = directory.get(mmsi) else {
                warn!(
                    line_number,
                    mmsi, "signal inside operating area has no vessel metadata, skipping"
                );
                result.skipped.push(SkippedRow {
                    line_number,
                    mmsi: Some(mmsi.to_string()),
                    reason: SkippedRowReason::OrphanSignal,
                });
                continue;
            };

            let timestamp = self
                .normalizer
                .normalize(row.text(&columns.timestamp)?)
                .map_err(|source| PipelineError::Timestamp {
                    line_number,
                    source,
                })?;
            let heading = row.number(&columns.heading)?;

            result.signals.push(PositionSignal {
                timestamp,
                ferry_id: anonymize_mmsi(mmsi),
                lat,
                lon,
                source: self.config.source_tag.clone(),
                metadata: SignalMetadata {
                    width: vessel.width,
                    length: vessel.length,
                    vessel_type: vessel.vessel_type.clone(),
                    heading,
                },
            });
        }

        info!(
            kept = result.signals.len(),
            skipped = result.skipped.len(),
            excluded = result.excluded,
            "cleaned position table"
        );
        Ok(result)
    }
}

impl Default for SignalCleaner {
    fn default() -> Self {
        Self::new(CleanerConfig::default())
    }
}
