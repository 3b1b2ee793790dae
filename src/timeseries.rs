// 📈 Time Series Slices - full history of one label for one or two entities
//
// The comparison year range does NOT apply here: the slice always spans every
// year in the working dataset.

use crate::error::{FactError, FactResult};
use crate::facts::NormalizedFact;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub entity: String,
    pub end: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesSlice {
    pub title: String,
    pub label: String,

    /// Entities shown, focal first; one entry when both selections coincide
    pub entities: Vec<String>,

    /// Sorted by period end, then entity
    pub points: Vec<SeriesPoint>,
}

impl TimeSeriesSlice {
    /// Points of a single entity, in date order
    pub fn points_for<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a SeriesPoint> + 'a {
        self.points.iter().filter(move |p| p.entity == entity)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// `A — Assets`, or `A vs B — Assets` when a different second entity is selected
pub fn slice_title(focal: &str, second: Option<&str>, label: &str) -> String {
    match second {
        Some(other) if other != focal => format!("{} vs {} — {}", focal, other, label),
        _ => format!("{} — {}", focal, label),
    }
}

pub struct TimeSeriesSliceExtractor;

impl TimeSeriesSliceExtractor {
    /// Extract the slice for `label`, restricted to `focal` (and `second`).
    ///
    /// Both entities must exist in the dataset; a selection without backing
    /// data is UnknownEntity rather than an empty chart.
    pub fn extract(
        facts: &[NormalizedFact],
        focal: &str,
        second: Option<&str>,
        label: &str,
    ) -> FactResult<TimeSeriesSlice> {
        let second = second.filter(|other| *other != focal);

        for entity in std::iter::once(focal).chain(second) {
            if !facts.iter().any(|f| f.entity == entity) {
                return Err(FactError::UnknownEntity(entity.to_string()));
            }
        }

        let mut points: Vec<SeriesPoint> = facts
            .iter()
            .filter(|f| f.label == label)
            .filter(|f| f.entity == focal || Some(f.entity.as_str()) == second)
            .map(|f| SeriesPoint {
                entity: f.entity.clone(),
                end: f.end,
                value: f.value,
            })
            .collect();

        points.sort_by(|a, b| a.end.cmp(&b.end).then_with(|| a.entity.cmp(&b.entity)));

        let mut entities = vec![focal.to_string()];
        entities.extend(second.map(str::to_string));

        Ok(TimeSeriesSlice {
            title: slice_title(focal, second, label),
            label: label.to_string(),
            entities,
            points,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
