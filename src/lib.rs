// SEComPair - Core Library
// Normalizes reported filing facts and builds cross-entity comparisons.
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod facts;
pub mod normalize;      // Raw facts → quarterly NormalizedFact rows
pub mod intersect;      // Labels/periods common to every entity
pub mod dataset;        // Working dataset + CSV export/import
pub mod merge;          // Fetched + imported → one dataset
pub mod colors;         // Entity → palette color
pub mod comparison;     // X/Y means per entity + ratio
pub mod timeseries;     // Full-history slices for hover/click
pub mod source;         // FactsSource seam
pub mod session;        // Owner of the dataset and its derived state
pub mod config;

// Re-export commonly used types
pub use error::{FactError, FactResult};
pub use facts::{RawFact, NormalizedFact, parse_end_date};
pub use normalize::{NormalizationPipeline, NormalizationReport, NormalizationStats};
pub use intersect::{
    intersect_by_group, comparable_labels, common_periods, ComparableDimensionSet,
};
pub use dataset::{
    WorkingDataset, YearRange, ImportReport,
    import_csv, import_csv_file, export_filename,
};
pub use merge::{DatasetMerger, MergeOutcome, MergeReport};
pub use colors::{EntityColorAssigner, EntityColorMap, PaletteColor, DEFAULT_PALETTE};
pub use comparison::{ComparisonDatasetBuilder, ComparisonRequest, ComparisonRow, Ratio};
pub use timeseries::{TimeSeriesSlice, TimeSeriesSliceExtractor, SeriesPoint, slice_title};
pub use source::{
    FactsSource, EntityInfo, InMemoryFactsSource, CsvFactsSource, resolve_entity_ids,
};
pub use session::{Session, DerivedState, LoadOutcome, LoadSummary};
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by both binaries.
/// `RUST_LOG` wins; otherwise `default_filter` applies.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
