use std::collections::HashMap;

use ferje_parser::{Column, ColumnIndex, HeaderSplit, ParserError, RowRef, TabularRow};
use serde::Serialize;

pub const VESSEL_TABLE: &str = "vessels";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselMetadataRecord {
    pub imo: String,
    pub name: String,
    pub callsign: String,
    /// Metres, rounded to a whole number (ties to even).
    pub length: f64,
    /// Metres, rounded to a whole number (ties to even).
    pub width: f64,
    #[serde(rename = "type")]
    pub vessel_type: String,
}

struct VesselColumns {
    mmsi: Column,
    imo: Column,
    name: Column,
    callsign: Column,
    length: Column,
    width: Column,
    vessel_type: Column,
}

impl VesselColumns {
    fn resolve(index: &ColumnIndex) -> Result<Self, ParserError> {
        Ok(Self {
            mmsi: index.require("mmsi")?,
            imo: index.require("imo")?,
            name: index.require("name")?,
            callsign: index.require("callsign")?,
            length: index.require("length")?,
            width: index.require("width")?,
            vessel_type: index.require("type")?,
        })
    }
}

/// Vessel metadata keyed by MMSI. The first row for an MMSI wins.
#[derive(Debug, Clone, Default)]
pub struct VesselDirectory {
    vessels: HashMap<String, VesselMetadataRecord>,
}

impl VesselDirectory {
    /// Builds the directory from a parsed vessel table. Rows with an empty first
    /// cell are skipped; a non-numeric length or width fails the whole table.
    pub fn from_rows(rows: &[TabularRow]) -> Result<Self, ParserError> {
        let split = HeaderSplit::locate(VESSEL_TABLE, rows)?;
        let columns = VesselColumns::resolve(&split.index())?;

        let mut vessels = HashMap::new();
        for (offset, row) in split.body.iter().enumerate() {
            if row.first_cell_is_empty() {
                continue;
            }
            let row = RowRef::new(VESSEL_TABLE, split.line_number(offset), row);
            let mmsi = row.text(&columns.mmsi)?;
            if vessels.contains_key(mmsi) {
                continue;
            }

            let record = VesselMetadataRecord {
                imo: row.text(&columns.imo)?.to_string(),
                name: row.text(&columns.name)?.to_string(),
                callsign: row.text(&columns.callsign)?.to_string(),
                length: row.number(&columns.length)?.round_ties_even(),
                width: row.number(&columns.width)?.round_ties_even(),
                vessel_type: row.text(&columns.vessel_type)?.to_string(),
            };
            vessels.insert(mmsi.to_string(), record);
        }

        Ok(Self { vessels })
    }

    pub fn get(&self, mmsi: &str) -> Option<&VesselMetadataRecord> {
        self.vessels.get(mmsi)
    }

    pub fn contains(&self, mmsi: &str) -> bool {
        self.vessels.contains_key(mmsi)
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }
}
