// 🧾 Fact Types - RawFact (as reported) and NormalizedFact (as compared)
//
// RawFact is transient: produced by a FactsSource, consumed by the
// normalization pipeline. NormalizedFact is the only shape that lives in a
// WorkingDataset.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// RAW FACT
// ============================================================================

/// RawFact - one reported value, exactly as the filings source hands it over
///
/// Column aliases match the flattened company-facts CSV layout
/// (`cik`, `Entity`, `Label`, `val`, `end`, `frame`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFact {
    // Core fields
    #[serde(alias = "cik", alias = "cik_str")]
    pub entity_id: String,

    /// Display name of the reporting entity (company title)
    #[serde(alias = "Entity", default)]
    pub entity: String,

    #[serde(alias = "Label")]
    pub label: String,

    #[serde(alias = "val", alias = "Value", default)]
    pub value: Option<f64>,

    /// Period end, still a string (`YYYY-MM-DD` when well-formed)
    pub end: String,

    /// Reporting frame tag (`CY2019Q2I`, `CY2019`, ...). Absent on restated
    /// comparative figures.
    #[serde(default)]
    pub frame: Option<String>,

    // Source metadata (carried, never compared)
    #[serde(default)]
    pub form: Option<String>,

    #[serde(alias = "fy", default)]
    pub fiscal_year: Option<String>,

    #[serde(alias = "fp", default)]
    pub fiscal_period: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(alias = "accn", default)]
    pub accession: Option<String>,
}

impl RawFact {
    /// Create a RawFact with the fields every source must provide
    pub fn new(
        entity_id: impl Into<String>,
        entity: impl Into<String>,
        label: impl Into<String>,
        value: f64,
        end: impl Into<String>,
    ) -> Self {
        RawFact {
            entity_id: entity_id.into(),
            entity: entity.into(),
            label: label.into(),
            value: Some(value),
            end: end.into(),
            frame: None,
            form: None,
            fiscal_year: None,
            fiscal_period: None,
            unit: None,
            accession: None,
        }
    }

    /// Builder pattern: add frame tag
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    /// Builder pattern: add filing form (10-Q, 10-K, ...)
    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Name the entity is shown under; falls back to the id when the source
    /// gave no title.
    pub fn display_name(&self) -> &str {
        let name = self.entity.trim();
        if name.is_empty() {
            self.entity_id.trim()
        } else {
            name
        }
    }
}

// ============================================================================
// NORMALIZED FACT
// ============================================================================

/// NormalizedFact - canonical row of the working dataset
///
/// Invariant: `year == end.year()`. Build it through `NormalizedFact::new`,
/// which derives the year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFact {
    pub end: NaiveDate,
    pub label: String,
    pub entity: String,
    pub value: f64,
    pub year: i32,
}

impl NormalizedFact {
    pub fn new(
        end: NaiveDate,
        label: impl Into<String>,
        entity: impl Into<String>,
        value: f64,
    ) -> Self {
        NormalizedFact {
            end,
            label: label.into(),
            entity: entity.into(),
            value,
            year: end.year(),
        }
    }

    /// Fingerprint of the reporting period this row describes.
    /// Two rows with the same key report the same (entity, label, end);
    /// used to measure overlap between merged sources, never to drop rows.
    pub fn period_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}|{}", self.entity, self.label, self.end));
        format!("{:x}", hasher.finalize())
    }
}

/// Parse a period-end date. Accepts `YYYY-MM-DD`, optionally followed by a
/// time part (`2019-06-30 00:00:00`, `2019-06-30T00:00:00`).
pub fn parse_end_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or("");

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

// ============================================================================
// TESTS
// ============================================================================
