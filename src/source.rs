// 🌐 Facts Sources - where raw facts come from
//
// The remote filings API (rate limits, HTTP, entity-list caching) lives
// behind the FactsSource trait. This crate ships two local sources:
// - InMemoryFactsSource: tests and embedding
// - CsvFactsSource: a flattened company-facts CSV on disk

use crate::facts::RawFact;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A reporting entity as listed by the source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: String,
    pub display_name: String,
}

impl EntityInfo {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        EntityInfo {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// FactsSource - the only interface the core needs from a filings provider
///
/// Both calls may be slow. `fetch_facts` returning an empty collection is
/// valid and must be tolerated by callers.
pub trait FactsSource: Send + Sync {
    fn list_entities(&self) -> Result<Vec<EntityInfo>>;

    fn fetch_facts(&self, entity_ids: &[String]) -> Result<Vec<RawFact>>;

    /// Short name for logs
    fn name(&self) -> &str {
        "facts-source"
    }
}

/// Map selected display names to source ids, keeping selection order and
/// dropping repeats. Names the source does not know are skipped with a warning.
pub fn resolve_entity_ids(source: &dyn FactsSource, names: &[String]) -> Result<Vec<String>> {
    let entities = source
        .list_entities()
        .with_context(|| format!("Failed to list entities from {}", source.name()))?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for name in names {
        let matches: Vec<&EntityInfo> = entities.iter().filter(|e| &e.display_name == name).collect();
        if matches.is_empty() {
            warn!(entity = %name, "entity not listed by source");
        }
        for entity in matches {
            if seen.insert(entity.id.clone()) {
                ids.push(entity.id.clone());
            }
        }
    }

    Ok(ids)
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryFactsSource {
    facts: Vec<RawFact>,
}

impl InMemoryFactsSource {
    pub fn new(facts: Vec<RawFact>) -> Self {
        InMemoryFactsSource { facts }
    }
}

impl FactsSource for InMemoryFactsSource {
    fn list_entities(&self) -> Result<Vec<EntityInfo>> {
        Ok(distinct_entities(&self.facts))
    }

    fn fetch_facts(&self, entity_ids: &[String]) -> Result<Vec<RawFact>> {
        Ok(filter_by_ids(&self.facts, entity_ids))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ============================================================================
// CSV SOURCE
// ============================================================================

/// Raw facts from a flattened company-facts CSV
///
/// Expected columns (aliases in RawFact): cik, Entity, Label, val, end,
/// frame, and optionally form, fy, fp, unit, accn.
pub struct CsvFactsSource {
    path: PathBuf,
}

impl CsvFactsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvFactsSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<RawFact>> {
        use csv::ReaderBuilder;

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open file: {}", self.path.display()))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut facts = Vec::new();
        let mut skipped = 0usize;

        for (line_num, result) in reader.deserialize::<RawFact>().enumerate() {
            match result {
                Ok(fact) => facts.push(fact),
                Err(e) => {
                    // +2 because: 1-indexed + header row
                    warn!(line = line_num + 2, error = %e, "skipping undecodable raw fact");
                    skipped += 1;
                }
            }
        }

        debug!(rows = facts.len(), skipped, path = %self.path.display(), "raw facts read");
        Ok(facts)
    }
}

impl FactsSource for CsvFactsSource {
    fn list_entities(&self) -> Result<Vec<EntityInfo>> {
        Ok(distinct_entities(&self.read_all()?))
    }

    fn fetch_facts(&self, entity_ids: &[String]) -> Result<Vec<RawFact>> {
        Ok(filter_by_ids(&self.read_all()?, entity_ids))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn distinct_entities(facts: &[RawFact]) -> Vec<EntityInfo> {
    let mut seen = HashSet::new();
    facts
        .iter()
        .map(|f| EntityInfo::new(f.entity_id.clone(), f.display_name()))
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

fn filter_by_ids(facts: &[RawFact], entity_ids: &[String]) -> Vec<RawFact> {
    let wanted: HashSet<&str> = entity_ids.iter().map(String::as_str).collect();
    facts
        .iter()
        .filter(|f| wanted.contains(f.entity_id.as_str()))
        .cloned()
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_source() -> InMemoryFactsSource {
        InMemoryFactsSource::new(vec![
            RawFact::new("1", "Alpha Corp", "Assets", 10.0, "2019-06-30").with_frame("CY2019Q2I"),
            RawFact::new("2", "Beta Inc", "Assets", 20.0, "2019-06-30").with_frame("CY2019Q2I"),
            RawFact::new("1", "Alpha Corp", "Liabilities", 5.0, "2019-06-30").with_frame("CY2019Q2I"),
        ])
    }

    #[test]
    fn test_list_entities_is_distinct() {
        let entities = create_test_source().list_entities().unwrap();

        assert_eq!(
            entities,
            vec![EntityInfo::new("1", "Alpha Corp"), EntityInfo::new("2", "Beta Inc")]
        );
    }

    #[test]
    fn test_fetch_facts_filters_by_id() {
        let facts = create_test_source().fetch_facts(&["1".to_string()]).unwrap();

        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|f| f.entity_id == "1"));
    }

    #[test]
    fn test_fetch_unknown_id_is_empty_not_error() {
        let facts = create_test_source().fetch_facts(&["999".to_string()]).unwrap();
        assert!(facts.is_empty());
    }

    #[test]
    fn test_resolve_entity_ids() {
        let source = create_test_source();
        let names = vec![
            "Beta Inc".to_string(),
            "Alpha Corp".to_string(),
            "Beta Inc".to_string(),
            "Nobody".to_string(),
        ];

        let ids = resolve_entity_ids(&source, &names).unwrap();

        assert_eq!(ids, vec!["2".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_csv_source_reads_flattened_facts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cik,Entity,Label,val,end,frame,form,fy,fp").unwrap();
        writeln!(file, "320193,Apple Inc.,Assets,100,2019-06-29,CY2019Q2I,10-Q,2019,Q3").unwrap();
        writeln!(file, "320193,Apple Inc.,Assets,90,2018-06-30,,10-Q,2019,Q3").unwrap();
        writeln!(file, "789019,Microsoft Corp,Assets,not-a-number,2019-06-30,CY2019Q2I,10-K,2019,FY").unwrap();
        file.flush().unwrap();

        let source = CsvFactsSource::new(file.path());
        let facts = source.fetch_facts(&["320193".to_string()]).unwrap();

        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].entity, "Apple Inc.");
        assert_eq!(facts[0].value, Some(100.0));
        assert_eq!(facts[0].frame.as_deref(), Some("CY2019Q2I"));
        assert_eq!(facts[1].frame, None);

        // The undecodable Microsoft row is skipped entirely
        let entities = source.list_entities().unwrap();
        assert_eq!(entities, vec![EntityInfo::new("320193", "Apple Inc.")]);
    }

    #[test]
    fn test_csv_source_missing_file_is_error() {
        let source = CsvFactsSource::new("/definitely/not/here.csv");
        assert!(source.fetch_facts(&[]).is_err());
    }
}
