// 🧭 Session - one working dataset and everything derived from it
//
// Dataflow (acyclic, recomputed synchronously):
//
//   load ──► WorkingDataset ──► { ComparableDimensionSet, EntityColorMap, year bounds }
//                                        │
//                                        └──► comparison rows / time-series slices
//
// A load replaces dataset and derived state together. If deriving fails
// (palette exhausted) nothing is replaced.

use crate::colors::{EntityColorAssigner, EntityColorMap};
use crate::comparison::{ComparisonDatasetBuilder, ComparisonRequest, ComparisonRow};
use crate::dataset::{WorkingDataset, YearRange};
use crate::error::{FactError, FactResult};
use crate::facts::NormalizedFact;
use crate::intersect::{comparable_labels, ComparableDimensionSet};
use crate::merge::{DatasetMerger, MergeOutcome, MergeReport};
use crate::normalize::{NormalizationPipeline, NormalizationStats};
use crate::source::{resolve_entity_ids, FactsSource};
use crate::timeseries::{TimeSeriesSlice, TimeSeriesSliceExtractor};
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

// ============================================================================
// DERIVED STATE
// ============================================================================

/// Everything recomputed when the working dataset changes
#[derive(Debug, Clone, Default, Serialize)]
pub struct DerivedState {
    pub comparable_labels: ComparableDimensionSet,
    pub colors: EntityColorMap,
    pub year_bounds: Option<YearRange>,
}

impl DerivedState {
    pub fn compute<R: Rng + ?Sized>(
        dataset: &WorkingDataset,
        assigner: &EntityColorAssigner,
        rng: &mut R,
    ) -> FactResult<Self> {
        Ok(DerivedState {
            colors: assigner.assign(dataset.entities(), rng)?,
            comparable_labels: comparable_labels(dataset.facts()),
            year_bounds: dataset.year_bounds(),
        })
    }
}

// ============================================================================
// LOAD OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub dataset_id: Uuid,
    pub rows: usize,
    pub entities: usize,
    pub merge: MergeReport,

    /// Present when raw facts went through the normalization pipeline
    pub normalization: Option<NormalizationStats>,

    /// Rows of the imported CSV that were rejected before the merge
    pub import_rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Replaced(LoadSummary),
    NothingToApply,
}

impl LoadOutcome {
    /// Record how many import rows were rejected. Import happens before the
    /// session sees the rows, so the caller supplies the count.
    pub fn with_import_rejections(mut self, rejected: usize) -> Self {
        if let LoadOutcome::Replaced(summary) = &mut self {
            summary.import_rejected = rejected;
        }
        self
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    pub id: Uuid,
    dataset: Option<WorkingDataset>,
    derived: DerivedState,
    assigner: EntityColorAssigner,
    pipeline: NormalizationPipeline,
}

impl Session {
    pub fn new() -> Self {
        Self::with_assigner(EntityColorAssigner::new())
    }

    pub fn with_assigner(assigner: EntityColorAssigner) -> Self {
        Session {
            id: Uuid::new_v4(),
            dataset: None,
            derived: DerivedState::default(),
            assigner,
            pipeline: NormalizationPipeline::new(),
        }
    }

    pub fn dataset(&self) -> Option<&WorkingDataset> {
        self.dataset.as_ref()
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    pub fn comparable_labels(&self) -> &ComparableDimensionSet {
        &self.derived.comparable_labels
    }

    pub fn colors(&self) -> &EntityColorMap {
        &self.derived.colors
    }

    pub fn year_bounds(&self) -> Option<YearRange> {
        self.derived.year_bounds
    }

    fn facts(&self) -> &[NormalizedFact] {
        self.dataset.as_ref().map(WorkingDataset::facts).unwrap_or(&[])
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Merge already-normalized inputs and, if there is anything to apply,
    /// replace the working dataset and its derived state in one step.
    pub fn load<R: Rng + ?Sized>(
        &mut self,
        fetched: Option<Vec<NormalizedFact>>,
        imported: Option<Vec<NormalizedFact>>,
        rng: &mut R,
    ) -> FactResult<LoadOutcome> {
        self.apply(fetched, imported, None, rng)
    }

    /// Fetch the named companies from `source`, normalize, merge with the
    /// optional imported rows and replace the working dataset.
    ///
    /// An empty company selection means "fetch nothing".
    pub fn load_from_source<R: Rng + ?Sized>(
        &mut self,
        source: &dyn FactsSource,
        companies: &[String],
        imported: Option<Vec<NormalizedFact>>,
        rng: &mut R,
    ) -> FactResult<LoadOutcome> {
        if companies.is_empty() {
            return self.apply(None, imported, None, rng);
        }

        let ids = resolve_entity_ids(source, companies)?;
        info!(source = source.name(), companies = ids.len(), "fetching facts");
        let raw = source.fetch_facts(&ids)?;

        let report = self.pipeline.normalize(&raw);
        let stats = report.stats();
        info!(summary = %report.summary(), "raw facts normalized");

        self.apply(Some(report.facts), imported, Some(stats), rng)
    }

    fn apply<R: Rng + ?Sized>(
        &mut self,
        fetched: Option<Vec<NormalizedFact>>,
        imported: Option<Vec<NormalizedFact>>,
        normalization: Option<NormalizationStats>,
        rng: &mut R,
    ) -> FactResult<LoadOutcome> {
        let (dataset, merge) = match DatasetMerger::merge(fetched, imported) {
            MergeOutcome::Replace(dataset, report) => (dataset, report),
            MergeOutcome::NothingToApply => return Ok(LoadOutcome::NothingToApply),
        };

        // Derive before touching self: a failure leaves the old state intact
        let derived = DerivedState::compute(&dataset, &self.assigner, rng)?;

        let summary = LoadSummary {
            dataset_id: dataset.id,
            rows: dataset.len(),
            entities: derived.colors.len(),
            merge,
            normalization,
            import_rejected: 0,
        };

        info!(
            session = %self.id,
            dataset = %dataset.id,
            rows = summary.rows,
            entities = summary.entities,
            comparable_labels = derived.comparable_labels.len(),
            "working dataset replaced"
        );

        self.dataset = Some(dataset);
        self.derived = derived;
        Ok(LoadOutcome::Replaced(summary))
    }

    // ========================================================================
    // DERIVED VIEWS
    // ========================================================================

    /// Comparison rows for X vs Y. `years` defaults to the dataset's full span.
    pub fn compare(
        &self,
        x_label: &str,
        y_label: &str,
        years: Option<YearRange>,
    ) -> FactResult<Vec<ComparisonRow>> {
        let Some(years) = years.or(self.derived.year_bounds) else {
            return Ok(Vec::new());
        };

        let request = ComparisonRequest::new(x_label, y_label, years);
        ComparisonDatasetBuilder::build(self.facts(), &request, &self.derived.colors)
    }

    pub fn time_series(
        &self,
        focal: &str,
        second: Option<&str>,
        label: &str,
    ) -> FactResult<TimeSeriesSlice> {
        if self.dataset.is_none() {
            return Err(FactError::UnknownEntity(focal.to_string()));
        }
        TimeSeriesSliceExtractor::extract(self.facts(), focal, second, label)
    }

    /// X-label and Y-label slices for one hover (focal) / click (second) event
    pub fn time_series_pair(
        &self,
        focal: &str,
        second: Option<&str>,
        x_label: &str,
        y_label: &str,
    ) -> FactResult<(TimeSeriesSlice, TimeSeriesSlice)> {
        Ok((
            self.time_series(focal, second, x_label)?,
            self.time_series(focal, second, y_label)?,
        ))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
