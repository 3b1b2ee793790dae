// 🔀 Dataset Merger - fetched rows + imported rows → one working dataset
//
// Policy:
// - both present  → concatenation, fetched rows first, NO deduplication
// - one present   → that one
// - none present  → nothing to apply; the current dataset stays as it is
//
// Duplicate (entity, label, end) rows across the two sources are counted and
// reported, never removed: dropping them would change the aggregate means.

use crate::dataset::WorkingDataset;
use crate::facts::NormalizedFact;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub fetched_rows: usize,
    pub imported_rows: usize,

    /// Imported rows whose period key also appears among the fetched rows
    pub overlapping_rows: usize,
}

impl MergeReport {
    pub fn total_rows(&self) -> usize {
        self.fetched_rows + self.imported_rows
    }
}

#[derive(Debug)]
pub enum MergeOutcome {
    /// A new working dataset to install in place of the current one
    Replace(WorkingDataset, MergeReport),

    /// Neither source produced data
    NothingToApply,
}

impl MergeOutcome {
    pub fn is_nothing_to_apply(&self) -> bool {
        matches!(self, MergeOutcome::NothingToApply)
    }
}

pub struct DatasetMerger;

impl DatasetMerger {
    pub fn merge(
        fetched: Option<Vec<NormalizedFact>>,
        imported: Option<Vec<NormalizedFact>>,
    ) -> MergeOutcome {
        match (fetched, imported) {
            (Some(mut fetched), Some(imported)) => {
                let overlapping_rows = Self::count_overlap(&fetched, &imported);
                let report = MergeReport {
                    fetched_rows: fetched.len(),
                    imported_rows: imported.len(),
                    overlapping_rows,
                };

                if overlapping_rows > 0 {
                    warn!(
                        overlapping_rows,
                        "fetched and imported data report the same periods; rows are kept twice"
                    );
                }
                info!(rows = report.total_rows(), "appending imported rows to fetched rows");

                fetched.extend(imported);
                MergeOutcome::Replace(WorkingDataset::new(fetched), report)
            }
            (Some(fetched), None) => {
                info!(rows = fetched.len(), "only fetched data found");
                let report = MergeReport {
                    fetched_rows: fetched.len(),
                    ..MergeReport::default()
                };
                MergeOutcome::Replace(WorkingDataset::new(fetched), report)
            }
            (None, Some(imported)) => {
                info!(rows = imported.len(), "only imported data found");
                let report = MergeReport {
                    imported_rows: imported.len(),
                    ..MergeReport::default()
                };
                MergeOutcome::Replace(WorkingDataset::new(imported), report)
            }
            (None, None) => {
                info!("no fetched or imported data; keeping current dataset");
                MergeOutcome::NothingToApply
            }
        }
    }

    fn count_overlap(fetched: &[NormalizedFact], imported: &[NormalizedFact]) -> usize {
        let fetched_keys: HashSet<String> = fetched.iter().map(NormalizedFact::period_key).collect();
        imported
            .iter()
            .filter(|fact| fetched_keys.contains(&fact.period_key()))
            .count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
