// 📊 Comparison Builder - per-entity X/Y means and their ratio
//
// For a label pair (X, Y) and an inclusive year range:
// 1. keep rows in range whose label is X or Y
// 2. mean value per (entity, label)
// 3. pivot to one row per entity; entities missing X or Y drop out
// 4. ratio = x / y, Undefined when the Y mean is zero
// 5. attach the entity's color
//
// The mean over the whole range is the comparison, not a point-in-time value.

use crate::colors::{EntityColorMap, PaletteColor};
use crate::dataset::YearRange;
use crate::error::{FactError, FactResult};
use crate::facts::NormalizedFact;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

// ============================================================================
// RATIO
// ============================================================================

/// X / Y, or Undefined when Y is zero. Serializes as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    pub fn of(x: f64, y: f64) -> Self {
        if y == 0.0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(x / y)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined => None,
        }
    }

    /// Plotting-friendly view: Undefined becomes NaN
    pub fn as_f64(&self) -> f64 {
        self.value().unwrap_or(f64::NAN)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Ratio::Undefined)
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Defined(v) => serializer.serialize_f64(*v),
            Ratio::Undefined => serializer.serialize_none(),
        }
    }
}

/// Four decimals, blank when undefined
impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Defined(v) => f.pad(&format!("{:.4}", v)),
            Ratio::Undefined => f.pad(""),
        }
    }
}

// ============================================================================
// REQUEST / ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub x_label: String,
    pub y_label: String,
    pub years: YearRange,
}

impl ComparisonRequest {
    pub fn new(x_label: impl Into<String>, y_label: impl Into<String>, years: YearRange) -> Self {
        ComparisonRequest {
            x_label: x_label.into(),
            y_label: y_label.into(),
            years,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub entity: String,
    pub color: PaletteColor,
    pub x_value: f64,
    pub y_value: f64,
    pub ratio: Ratio,
}

// ============================================================================
// BUILDER
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

pub struct ComparisonDatasetBuilder;

impl ComparisonDatasetBuilder {
    /// One row per entity that has both labels within the range, sorted by entity
    pub fn build(
        facts: &[NormalizedFact],
        request: &ComparisonRequest,
        colors: &EntityColorMap,
    ) -> FactResult<Vec<ComparisonRow>> {
        let mut means: BTreeMap<&str, (Mean, Mean)> = BTreeMap::new();

        for fact in facts.iter().filter(|f| request.years.contains(f.year)) {
            let is_x = fact.label == request.x_label;
            let is_y = fact.label == request.y_label;
            if !is_x && !is_y {
                continue;
            }

            let entry = means.entry(fact.entity.as_str()).or_default();
            // X == Y is allowed: the same row feeds both sides
            if is_x {
                entry.0.add(fact.value);
            }
            if is_y {
                entry.1.add(fact.value);
            }
        }

        let mut rows = Vec::with_capacity(means.len());
        for (entity, (x, y)) in means {
            let (Some(x_value), Some(y_value)) = (x.get(), y.get()) else {
                continue;
            };

            let color = colors
                .get(entity)
                .ok_or_else(|| FactError::MissingColor(entity.to_string()))?;

            rows.push(ComparisonRow {
                entity: entity.to_string(),
                color,
                x_value,
                y_value,
                ratio: Ratio::of(x_value, y_value),
            });
        }

        debug!(
            x = %request.x_label,
            y = %request.y_label,
            low = request.years.low,
            high = request.years.high,
            rows = rows.len(),
            "comparison built"
        );
        Ok(rows)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::EntityColorAssigner;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn create_test_fact(entity: &str, label: &str, year: i32, month: u32, value: f64) -> NormalizedFact {
        let end = NaiveDate::from_ymd_opt(year, month, 30).unwrap();
        NormalizedFact::new(end, label, entity, value)
    }

    fn create_test_colors(entities: &[&str]) -> EntityColorMap {
        EntityColorAssigner::new()
            .assign(entities.iter().copied(), &mut StdRng::seed_from_u64(11))
            .unwrap()
    }

    #[test]
    fn test_ratio_of_means() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 4, 80.0),
            create_test_fact("A", "Assets", 2019, 6, 120.0),
            create_test_fact("A", "Liabilities", 2019, 6, 50.0),
        ];
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::single(2019));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &create_test_colors(&["A"])).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].x_value, 100.0);
        assert_eq!(rows[0].y_value, 50.0);
        assert_eq!(rows[0].ratio, Ratio::Defined(2.0));
    }

    #[test]
    fn test_entity_missing_a_label_is_excluded() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 6, 100.0),
            create_test_fact("A", "Liabilities", 2019, 6, 50.0),
            create_test_fact("B", "Assets", 2019, 6, 70.0),
        ];
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::single(2019));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &create_test_colors(&["A", "B"])).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity, "A");
    }

    #[test]
    fn test_label_outside_range_excludes_entity() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 6, 100.0),
            create_test_fact("A", "Liabilities", 2017, 6, 50.0),
        ];
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::new(2018, 2020));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &create_test_colors(&["A"])).unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn test_zero_y_mean_gives_undefined_ratio() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 6, 100.0),
            create_test_fact("A", "Liabilities", 2019, 4, 10.0),
            create_test_fact("A", "Liabilities", 2019, 6, -10.0),
        ];
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::single(2019));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &create_test_colors(&["A"])).unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].ratio.is_undefined());
        assert!(rows[0].ratio.as_f64().is_nan());
        assert_eq!(rows[0].ratio.to_string(), "");
    }

    #[test]
    fn test_same_label_on_both_axes() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 6, 10.0),
            create_test_fact("A", "Assets", 2020, 6, 30.0),
        ];
        let request = ComparisonRequest::new("Assets", "Assets", YearRange::new(2019, 2020));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &create_test_colors(&["A"])).unwrap();

        assert_eq!(rows[0].x_value, 20.0);
        assert_eq!(rows[0].y_value, 20.0);
        assert_eq!(rows[0].ratio, Ratio::Defined(1.0));
    }

    #[test]
    fn test_one_row_per_entity_sorted() {
        let facts = vec![
            create_test_fact("B", "Assets", 2019, 6, 1.0),
            create_test_fact("B", "Liabilities", 2019, 6, 1.0),
            create_test_fact("A", "Assets", 2019, 4, 1.0),
            create_test_fact("A", "Assets", 2019, 6, 3.0),
            create_test_fact("A", "Liabilities", 2019, 6, 4.0),
        ];
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::single(2019));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &create_test_colors(&["A", "B"])).unwrap();

        let entities: Vec<&str> = rows.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(entities, vec!["A", "B"]);
        assert_eq!(rows[0].ratio, Ratio::Defined(0.5));
    }

    #[test]
    fn test_rows_carry_assigned_color() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 6, 1.0),
            create_test_fact("A", "Liabilities", 2019, 6, 1.0),
        ];
        let colors = create_test_colors(&["A"]);
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::single(2019));

        let rows = ComparisonDatasetBuilder::build(&facts, &request, &colors).unwrap();

        assert_eq!(Some(rows[0].color), colors.get("A"));
    }

    #[test]
    fn test_missing_color_is_an_error() {
        let facts = vec![
            create_test_fact("A", "Assets", 2019, 6, 1.0),
            create_test_fact("A", "Liabilities", 2019, 6, 1.0),
        ];
        let request = ComparisonRequest::new("Assets", "Liabilities", YearRange::single(2019));

        let result = ComparisonDatasetBuilder::build(&facts, &request, &EntityColorMap::default());

        assert!(matches!(result, Err(FactError::MissingColor(ref e)) if e == "A"));
    }

    #[test]
    fn test_ratio_serializes_undefined_as_null() {
        assert_eq!(serde_json::to_string(&Ratio::Undefined).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Ratio::Defined(2.5)).unwrap(), "2.5");
        assert_eq!(Ratio::Defined(2.0).to_string(), "2.0000");
    }
}
