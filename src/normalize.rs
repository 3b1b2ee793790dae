// 📥 Normalization Pipeline - RawFact → quarterly NormalizedFact rows
//
// Per record, in order:
// 1. value        → must be present and finite
// 2. end          → parsed as a date (bad dates reject the record)
// 3. year         → derived from end
// 4. frame absent → dropped (restated prior-period comparative)
// 5. frame not Q1/Q2/Q3 → dropped (Q4 frames carry full-year figures)
// 6. project to (end, label, entity, value, year)
//
// Rejected records never abort the batch; they are collected in the report.

use crate::error::{FactError, FactResult};
use crate::facts::{parse_end_date, NormalizedFact, RawFact};
use serde::Serialize;
use tracing::{debug, warn};

// ============================================================================
// REPORT
// ============================================================================

/// Outcome of one normalization run
#[derive(Debug, Default)]
pub struct NormalizationReport {
    /// Rows that survived every step, in input order
    pub facts: Vec<NormalizedFact>,

    /// Malformed records (one MalformedInput each)
    pub rejected: Vec<FactError>,

    /// Records with no frame tag
    pub dropped_without_frame: usize,

    /// Records whose frame is not a Q1-Q3 quarter
    pub dropped_non_quarterly: usize,
}

/// Counts only, for load summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub kept: usize,
    pub rejected: usize,
    pub dropped_without_frame: usize,
    pub dropped_non_quarterly: usize,
}

impl NormalizationReport {
    pub fn stats(&self) -> NormalizationStats {
        NormalizationStats {
            kept: self.facts.len(),
            rejected: self.rejected.len(),
            dropped_without_frame: self.dropped_without_frame,
            dropped_non_quarterly: self.dropped_non_quarterly,
        }
    }

    pub fn input_count(&self) -> usize {
        self.facts.len()
            + self.rejected.len()
            + self.dropped_without_frame
            + self.dropped_non_quarterly
    }

    pub fn summary(&self) -> String {
        format!(
            "{} kept, {} rejected, {} without frame, {} non-quarterly",
            self.facts.len(),
            self.rejected.len(),
            self.dropped_without_frame,
            self.dropped_non_quarterly
        )
    }

    /// Abort-on-first-error view of the same run, for callers that would
    /// rather refuse a batch than load part of it.
    pub fn into_strict(self) -> FactResult<Vec<NormalizedFact>> {
        match self.rejected.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.facts),
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// What happened to a single record
#[derive(Debug)]
enum Disposition {
    Keep(NormalizedFact),
    NoFrame,
    NotQuarterly,
}

pub struct NormalizationPipeline {
    /// Frame markers that identify a true quarterly figure
    pub quarterly_markers: Vec<String>,
}

impl NormalizationPipeline {
    pub fn new() -> Self {
        NormalizationPipeline {
            quarterly_markers: vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()],
        }
    }

    /// Run every record through the pipeline. Empty input gives an empty report.
    pub fn normalize(&self, raw: &[RawFact]) -> NormalizationReport {
        let mut report = NormalizationReport::default();

        for (index, fact) in raw.iter().enumerate() {
            match self.normalize_one(index + 1, fact) {
                Ok(Disposition::Keep(normalized)) => report.facts.push(normalized),
                Ok(Disposition::NoFrame) => report.dropped_without_frame += 1,
                Ok(Disposition::NotQuarterly) => report.dropped_non_quarterly += 1,
                Err(err) => {
                    warn!(error = %err, "rejecting raw fact");
                    report.rejected.push(err);
                }
            }
        }

        debug!(summary = %report.summary(), "normalization finished");
        report
    }

    /// Does this frame tag describe a Q1-Q3 quarter?
    pub fn is_quarterly_frame(&self, frame: &str) -> bool {
        self.quarterly_markers
            .iter()
            .any(|marker| frame.contains(marker.as_str()))
    }

    fn normalize_one(&self, line: usize, fact: &RawFact) -> FactResult<Disposition> {
        let value = match fact.value {
            Some(v) if v.is_finite() => v,
            Some(v) => return Err(FactError::malformed(line, "value", format!("is not finite: {}", v))),
            None => return Err(FactError::malformed(line, "value", "is missing")),
        };

        let label = fact.label.trim();
        if label.is_empty() {
            return Err(FactError::malformed(line, "label", "is missing"));
        }

        let entity = fact.display_name();
        if entity.is_empty() {
            return Err(FactError::malformed(line, "entity", "is missing"));
        }

        let end = parse_end_date(&fact.end).ok_or_else(|| {
            FactError::malformed(line, "end", format!("is not a YYYY-MM-DD date: `{}`", fact.end))
        })?;

        let frame = match fact.frame.as_deref().map(str::trim) {
            Some(frame) if !frame.is_empty() => frame,
            _ => return Ok(Disposition::NoFrame),
        };

        if !self.is_quarterly_frame(frame) {
            return Ok(Disposition::NotQuarterly);
        }

        Ok(Disposition::Keep(NormalizedFact::new(end, label, entity, value)))
    }
}

impl Default for NormalizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn create_test_fact(end: &str, frame: Option<&str>) -> RawFact {
        let fact = RawFact::new("0000000001", "A", "Assets", 100.0, end);
        match frame {
            Some(f) => fact.with_frame(f),
            None => fact,
        }
    }

    #[test]
    fn test_q2_frame_is_kept_with_year() {
        let pipeline = NormalizationPipeline::new();
        let report = pipeline.normalize(&[create_test_fact("2019-06-30", Some("CY2019Q2"))]);

        assert_eq!(report.facts.len(), 1);
        let fact = &report.facts[0];
        assert_eq!(fact.year, 2019);
        assert_eq!(fact.end, NaiveDate::from_ymd_opt(2019, 6, 30).unwrap());
        assert_eq!(fact.label, "Assets");
        assert_eq!(fact.entity, "A");
        assert_eq!(fact.value, 100.0);
    }

    #[test]
    fn test_q4_frame_is_excluded() {
        let pipeline = NormalizationPipeline::new();
        let report = pipeline.normalize(&[create_test_fact("2019-12-31", Some("CY2019Q4"))]);

        assert!(report.facts.is_empty());
        assert_eq!(report.dropped_non_quarterly, 1);
    }

    #[test]
    fn test_annual_frame_is_excluded() {
        let pipeline = NormalizationPipeline::new();
        let report = pipeline.normalize(&[create_test_fact("2019-12-31", Some("CY2019"))]);

        assert!(report.facts.is_empty());
        assert_eq!(report.dropped_non_quarterly, 1);
    }

    #[test]
    fn test_instant_quarter_frames_are_kept() {
        let pipeline = NormalizationPipeline::new();
        let raw = vec![
            create_test_fact("2019-03-31", Some("CY2019Q1I")),
            create_test_fact("2019-09-30", Some("CY2019Q3I")),
        ];
        let report = pipeline.normalize(&raw);

        assert_eq!(report.facts.len(), 2);
    }

    #[test]
    fn test_absent_frame_is_always_excluded() {
        let pipeline = NormalizationPipeline::new();
        let raw = vec![
            create_test_fact("2019-06-30", None),
            create_test_fact("2019-06-30", Some("")),
            create_test_fact("2018-03-31", None),
        ];
        let report = pipeline.normalize(&raw);

        assert!(report.facts.is_empty());
        assert_eq!(report.dropped_without_frame, 3);
    }

    #[test]
    fn test_malformed_date_rejects_only_that_record() {
        let pipeline = NormalizationPipeline::new();
        let raw = vec![
            create_test_fact("2019/06/30", Some("CY2019Q2I")),
            create_test_fact("2019-06-30", Some("CY2019Q2I")),
        ];
        let report = pipeline.normalize(&raw);

        assert_eq!(report.facts.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        match &report.rejected[0] {
            FactError::MalformedInput { line, field, .. } => {
                assert_eq!(*line, 1);
                assert_eq!(*field, "end");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let pipeline = NormalizationPipeline::new();
        let mut fact = create_test_fact("2019-06-30", Some("CY2019Q2I"));
        fact.value = None;

        let report = pipeline.normalize(&[fact]);

        assert!(report.facts.is_empty());
        assert!(matches!(
            report.rejected[0],
            FactError::MalformedInput { field: "value", .. }
        ));
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let pipeline = NormalizationPipeline::new();
        let report = pipeline.normalize(&[]);

        assert!(report.facts.is_empty());
        assert_eq!(report.input_count(), 0);
    }

    #[test]
    fn test_input_count_accounts_for_every_record() {
        let pipeline = NormalizationPipeline::new();
        let raw = vec![
            create_test_fact("2019-06-30", Some("CY2019Q2I")),
            create_test_fact("2019-12-31", Some("CY2019Q4I")),
            create_test_fact("2019-06-30", None),
            create_test_fact("bad", Some("CY2019Q2I")),
        ];
        let report = pipeline.normalize(&raw);

        assert_eq!(report.input_count(), raw.len());
    }

    #[test]
    fn test_into_strict_surfaces_first_rejection() {
        let pipeline = NormalizationPipeline::new();
        let raw = vec![
            create_test_fact("2019-06-30", Some("CY2019Q2I")),
            create_test_fact("not a date", Some("CY2019Q2I")),
        ];

        let strict = pipeline.normalize(&raw).into_strict();
        assert!(strict.is_err());

        let clean = pipeline
            .normalize(&raw[..1])
            .into_strict()
            .expect("clean batch should pass");
        assert_eq!(clean.len(), 1);
    }
}
