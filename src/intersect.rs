// 🔗 Dimension Intersection - values shared by every group of a table
//
// Given rows, a group-by key and a value-of-interest key, return the values
// that appear in EVERY group. With group = entity and value = label this is
// the set of labels safe to compare across all loaded companies. The same
// primitive answers "periods common to all entities", "frames common to all
// forms", and so on.

use crate::facts::NormalizedFact;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Intersection of the per-group value sets.
///
/// Zero groups (empty table) gives the empty set. The result does not depend
/// on the order in which groups or rows are visited.
pub fn intersect_by_group<'a, R, G, V>(
    rows: &'a [R],
    group_by: impl Fn(&'a R) -> G,
    value_of: impl Fn(&'a R) -> V,
) -> HashSet<V>
where
    G: Eq + Hash,
    V: Eq + Hash,
{
    let mut groups: HashMap<G, HashSet<V>> = HashMap::new();
    for row in rows {
        groups.entry(group_by(row)).or_default().insert(value_of(row));
    }

    let mut sets = groups.into_values();
    let Some(mut common) = sets.next() else {
        return HashSet::new();
    };

    for set in sets {
        common.retain(|value| set.contains(value));
        if common.is_empty() {
            break;
        }
    }

    common
}

// ============================================================================
// COMPARABLE DIMENSIONS
// ============================================================================

/// Labels reported by every entity of the working dataset
///
/// Stored sorted so dropdowns and CLI output are stable; consumers must not
/// rely on the order for anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparableDimensionSet {
    labels: BTreeSet<String>,
}

impl ComparableDimensionSet {
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ComparableDimensionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ComparableDimensionSet {
            labels: iter.into_iter().collect(),
        }
    }
}

pub fn comparable_labels(facts: &[NormalizedFact]) -> ComparableDimensionSet {
    intersect_by_group(facts, |f| f.entity.as_str(), |f| f.label.as_str())
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Period ends reported (under any label) by every entity
pub fn common_periods(facts: &[NormalizedFact]) -> BTreeSet<NaiveDate> {
    intersect_by_group(facts, |f| f.entity.as_str(), |f| f.end)
        .into_iter()
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_fact(entity: &str, label: &str, end: (i32, u32, u32)) -> NormalizedFact {
        let end = NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap();
        NormalizedFact::new(end, label, entity, 1.0)
    }

    #[test]
    fn test_label_shared_by_all_entities() {
        let facts = vec![
            create_test_fact("A", "Assets", (2019, 6, 30)),
            create_test_fact("A", "Liabilities", (2019, 6, 30)),
            create_test_fact("B", "Assets", (2019, 6, 30)),
        ];

        let labels = comparable_labels(&facts);

        assert_eq!(labels.len(), 1);
        assert!(labels.contains("Assets"));
        assert!(!labels.contains("Liabilities"));
    }

    #[test]
    fn test_empty_table_gives_empty_set() {
        let facts: Vec<NormalizedFact> = Vec::new();
        assert!(comparable_labels(&facts).is_empty());

        let none: HashSet<&str> = intersect_by_group(&facts, |f| f.entity.as_str(), |f| f.label.as_str());
        assert!(none.is_empty());
    }

    #[test]
    fn test_single_group_returns_its_own_values() {
        let facts = vec![
            create_test_fact("A", "Assets", (2019, 6, 30)),
            create_test_fact("A", "Liabilities", (2019, 6, 30)),
            create_test_fact("A", "Assets", (2019, 9, 30)),
        ];

        let set = comparable_labels(&facts);
        let labels: Vec<&str> = set.iter().collect();
        assert_eq!(labels, vec!["Assets", "Liabilities"]);
    }

    #[test]
    fn test_disjoint_groups_give_empty_set() {
        let facts = vec![
            create_test_fact("A", "Assets", (2019, 6, 30)),
            create_test_fact("B", "Revenues", (2019, 6, 30)),
        ];

        assert!(comparable_labels(&facts).is_empty());
    }

    #[test]
    fn test_generic_over_tuples() {
        let rows = vec![("10-Q", "CY2019Q1I"), ("10-Q", "CY2019Q2I"), ("10-K", "CY2019Q2I")];

        let common = intersect_by_group(&rows, |r| r.0, |r| r.1);

        assert_eq!(common, HashSet::from(["CY2019Q2I"]));
    }

    #[test]
    fn test_common_periods() {
        let facts = vec![
            create_test_fact("A", "Assets", (2019, 3, 31)),
            create_test_fact("A", "Assets", (2019, 6, 30)),
            create_test_fact("B", "Liabilities", (2019, 6, 30)),
        ];

        let periods = common_periods(&facts);

        assert_eq!(periods.len(), 1);
        assert!(periods.contains(&NaiveDate::from_ymd_opt(2019, 6, 30).unwrap()));
    }
}
