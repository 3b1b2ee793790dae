// 🗂️ Working Dataset - the one normalized table a session compares
//
// Replaced as a whole on every load, never mutated in place. Also owns the
// CSV export/import shape:
//
//   index,end,label,entity,value,year
//   0,2019-06-30,Assets,Apple Inc.,100.0,2019
//
// Importing that shape skips the normalization pipeline entirely: the frame
// column no longer exists and dates are already canonical.

use crate::error::{FactError, FactResult};
use crate::facts::{parse_end_date, NormalizedFact};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

/// Column names of the exported table, after the leading index column
pub const EXPORT_COLUMNS: [&str; 5] = ["end", "label", "entity", "value", "year"];

// ============================================================================
// YEAR RANGE
// ============================================================================

/// Inclusive range of fiscal years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub low: i32,
    pub high: i32,
}

impl YearRange {
    /// Bounds are reordered if given backwards
    pub fn new(a: i32, b: i32) -> Self {
        YearRange {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn single(year: i32) -> Self {
        YearRange { low: year, high: year }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.low <= year && year <= self.high
    }

    /// True when `low > high`, i.e. no year matches
    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    /// Range from optional user bounds, filling a missing side from `bounds`.
    ///
    /// Two explicit bounds are reordered. A single bound is taken as given:
    /// `from` past the last loaded year yields an empty range, not a swapped one.
    /// No bounds at all gives None (callers default to the full span).
    pub fn from_bounds(low: Option<i32>, high: Option<i32>, bounds: Option<YearRange>) -> Option<Self> {
        match (low, high, bounds) {
            (Some(low), Some(high), _) => Some(YearRange::new(low, high)),
            (Some(low), None, Some(bounds)) => Some(YearRange { low, high: bounds.high }),
            (None, Some(high), Some(bounds)) => Some(YearRange { low: bounds.low, high }),
            (Some(year), None, None) | (None, Some(year), None) => Some(YearRange::single(year)),
            (None, None, _) => None,
        }
    }
}

// ============================================================================
// WORKING DATASET
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingDataset {
    /// Fresh for every load; derived state is tied to it
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    facts: Vec<NormalizedFact>,
}

impl WorkingDataset {
    pub fn new(facts: Vec<NormalizedFact>) -> Self {
        WorkingDataset {
            id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            facts,
        }
    }

    pub fn facts(&self) -> &[NormalizedFact] {
        &self.facts
    }

    pub fn into_facts(self) -> Vec<NormalizedFact> {
        self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Distinct entities, in order of first appearance
    pub fn entities(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.facts
            .iter()
            .map(|f| f.entity.as_str())
            .filter(|entity| seen.insert(*entity))
            .collect()
    }

    pub fn has_entity(&self, entity: &str) -> bool {
        self.facts.iter().any(|f| f.entity == entity)
    }

    pub fn labels(&self) -> BTreeSet<&str> {
        self.facts.iter().map(|f| f.label.as_str()).collect()
    }

    /// Earliest and latest year present; None for an empty dataset.
    /// This is the default comparison window.
    pub fn year_bounds(&self) -> Option<YearRange> {
        let low = self.facts.iter().map(|f| f.year).min()?;
        let high = self.facts.iter().map(|f| f.year).max()?;
        Some(YearRange { low, high })
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Write the dataset in the export shape (leading index column + 5 columns)
    pub fn write_csv<W: Write>(&self, writer: W) -> FactResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["index"];
        header.extend(EXPORT_COLUMNS);
        wtr.write_record(&header)?;

        for (index, fact) in self.facts.iter().enumerate() {
            wtr.write_record([
                index.to_string(),
                fact.end.format("%Y-%m-%d").to_string(),
                fact.label.clone(),
                fact.entity.clone(),
                fact.value.to_string(),
                fact.year.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> FactResult<()> {
        let file = File::create(path)?;
        self.write_csv(file)?;
        debug!(rows = self.len(), path = %path.display(), "dataset exported");
        Ok(())
    }
}

/// Download filename: `<prefix><timestamp>.csv`
pub fn export_filename<Tz: TimeZone>(prefix: &str, timestamp_format: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}.csv", prefix, now.format(timestamp_format))
}

// ============================================================================
// IMPORT (pre-normalized)
// ============================================================================

/// Rows recovered from an exported CSV
#[derive(Debug, Default)]
pub struct ImportReport {
    pub facts: Vec<NormalizedFact>,
    pub rejected: Vec<FactError>,
}

/// Positions of the canonical columns inside an import header
struct ImportColumns {
    end: usize,
    label: usize,
    entity: usize,
    value: usize,
    year: usize,
}

impl ImportColumns {
    fn from_header(header: &csv::StringRecord) -> FactResult<Self> {
        let find = |name: &'static str| -> FactResult<usize> {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| FactError::malformed(1, name, "column missing from header"))
        };

        Ok(ImportColumns {
            end: find("end")?,
            label: find("label")?,
            entity: find("entity")?,
            value: find("value")?,
            year: find("year")?,
        })
    }

    fn parse(&self, line: usize, record: &csv::StringRecord) -> FactResult<NormalizedFact> {
        let field = |idx: usize, name: &'static str| required_field(record, idx, line, name);

        let raw_end = field(self.end, "end")?;
        let end = parse_end_date(raw_end).ok_or_else(|| {
            FactError::malformed(line, "end", format!("is not a YYYY-MM-DD date: `{}`", raw_end))
        })?;

        let label = field(self.label, "label")?;
        let entity = field(self.entity, "entity")?;

        let raw_value = field(self.value, "value")?;
        let value: f64 = raw_value
            .parse()
            .map_err(|_| FactError::malformed(line, "value", format!("is not numeric: `{}`", raw_value)))?;

        let raw_year = field(self.year, "year")?;
        let year: i32 = raw_year
            .parse()
            .map_err(|_| FactError::malformed(line, "year", format!("is not an integer: `{}`", raw_year)))?;

        if year != end.year() {
            return Err(FactError::malformed(
                line,
                "year",
                format!("{} does not match period end {}", year, end),
            ));
        }

        Ok(NormalizedFact::new(end, label, entity, value))
    }
}

fn required_field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    line: usize,
    name: &'static str,
) -> FactResult<&'r str> {
    match record.get(idx).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FactError::malformed(line, name, "is missing")),
    }
}

/// Read an exported dataset back. Bad rows are rejected one by one; a missing
/// canonical column fails the whole import.
pub fn import_csv<R: Read>(reader: R) -> FactResult<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = ImportColumns::from_header(rdr.headers()?)?;
    let mut report = ImportReport::default();

    for (row, result) in rdr.records().enumerate() {
        // +2 because: 1-indexed + header row
        let line = row + 2;
        let record = match result {
            Ok(record) => record,
            // The reader cannot move past a failing input stream
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                let err = FactError::malformed(line, "record", format!("is unreadable: {}", e));
                warn!(error = %err, "rejecting imported row");
                report.rejected.push(err);
                continue;
            }
        };

        match columns.parse(line, &record) {
            Ok(fact) => report.facts.push(fact),
            Err(err) => {
                warn!(error = %err, "rejecting imported row");
                report.rejected.push(err);
            }
        }
    }

    debug!(
        kept = report.facts.len(),
        rejected = report.rejected.len(),
        "import finished"
    );
    Ok(report)
}

pub fn import_csv_file(path: &Path) -> FactResult<ImportReport> {
    let file = File::open(path)?;
    import_csv(file)
}

// ============================================================================
// TESTS
// ============================================================================
