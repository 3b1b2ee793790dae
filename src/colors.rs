// 🎨 Entity Colors - one stable palette color per loaded entity
//
// Drawn without replacement from a fixed 10-color palette with an explicit
// random source. Different loads may give different colors; within one load
// no two entities share a color, and every chart reuses the same map.

use crate::error::{FactError, FactResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PaletteColor {
    pub name: &'static str,
    pub hex: &'static str,
}

/// Default qualitative palette (10 colors)
pub const DEFAULT_PALETTE: [PaletteColor; 10] = [
    PaletteColor { name: "muted blue", hex: "#1f77b4" },
    PaletteColor { name: "safety orange", hex: "#ff7f0e" },
    PaletteColor { name: "cooked asparagus green", hex: "#2ca02c" },
    PaletteColor { name: "brick red", hex: "#d62728" },
    PaletteColor { name: "muted purple", hex: "#9467bd" },
    PaletteColor { name: "chestnut brown", hex: "#8c564b" },
    PaletteColor { name: "raspberry yogurt pink", hex: "#e377c2" },
    PaletteColor { name: "middle gray", hex: "#7f7f7f" },
    PaletteColor { name: "curry yellow-green", hex: "#bcbd22" },
    PaletteColor { name: "blue-teal", hex: "#17becf" },
];

// ============================================================================
// COLOR MAP
// ============================================================================

/// Entity → color, injective within one assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityColorMap {
    colors: BTreeMap<String, PaletteColor>,
}

impl EntityColorMap {
    pub fn get(&self, entity: &str) -> Option<PaletteColor> {
        self.colors.get(entity).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PaletteColor)> {
        self.colors.iter().map(|(entity, color)| (entity.as_str(), *color))
    }
}

// ============================================================================
// ASSIGNER
// ============================================================================

pub struct EntityColorAssigner {
    palette: Vec<PaletteColor>,
}

impl EntityColorAssigner {
    pub fn new() -> Self {
        EntityColorAssigner {
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }

    pub fn with_palette(palette: Vec<PaletteColor>) -> Self {
        EntityColorAssigner { palette }
    }

    pub fn palette_size(&self) -> usize {
        self.palette.len()
    }

    /// Give each distinct entity its own color.
    ///
    /// Fails with PaletteExhausted instead of reusing or dropping colors.
    pub fn assign<'e, R: Rng + ?Sized>(
        &self,
        entities: impl IntoIterator<Item = &'e str>,
        rng: &mut R,
    ) -> FactResult<EntityColorMap> {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = entities.into_iter().filter(|e| seen.insert(*e)).collect();

        if distinct.len() > self.palette.len() {
            return Err(FactError::PaletteExhausted {
                entities: distinct.len(),
                palette: self.palette.len(),
            });
        }

        let mut shuffled = self.palette.clone();
        shuffled.shuffle(rng);

        let colors = distinct
            .into_iter()
            .zip(shuffled)
            .map(|(entity, color)| (entity.to_string(), color))
            .collect::<BTreeMap<_, _>>();

        debug!(entities = colors.len(), "entity colors assigned");
        Ok(EntityColorMap { colors })
    }
}

impl Default for EntityColorAssigner {
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
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entity_names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("Entity {}", i)).collect()
    }

    #[test]
    fn test_ten_entities_get_distinct_colors() {
        let assigner = EntityColorAssigner::new();
        let names = entity_names(10);
        let mut rng = StdRng::seed_from_u64(7);

        let map = assigner.assign(names.iter().map(String::as_str), &mut rng).unwrap();

        assert_eq!(map.len(), 10);
        let distinct: HashSet<PaletteColor> = map.iter().map(|(_, c)| c).collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn test_eleven_entities_exhaust_palette() {
        let assigner = EntityColorAssigner::new();
        let names = entity_names(11);
        let mut rng = StdRng::seed_from_u64(7);

        let result = assigner.assign(names.iter().map(String::as_str), &mut rng);

        assert!(matches!(
            result,
            Err(FactError::PaletteExhausted { entities: 11, palette: 10 })
        ));
    }

    #[test]
    fn test_repeated_entities_count_once() {
        let assigner = EntityColorAssigner::new();
        let mut rng = StdRng::seed_from_u64(1);
        let entities = ["A", "B", "A", "A", "B"];

        let map = assigner.assign(entities, &mut rng).unwrap();

        assert_eq!(map.len(), 2);
        assert_ne!(map.get("A"), map.get("B"));
    }

    #[test]
    fn test_same_seed_same_colors() {
        let assigner = EntityColorAssigner::new();
        let entities = ["A", "B", "C"];

        let first = assigner.assign(entities, &mut StdRng::seed_from_u64(42)).unwrap();
        let second = assigner.assign(entities, &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_colors_come_from_palette() {
        let assigner = EntityColorAssigner::new();
        let map = assigner.assign(["A"], &mut StdRng::seed_from_u64(3)).unwrap();

        let color = map.get("A").unwrap();
        assert!(DEFAULT_PALETTE.contains(&color));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn test_custom_palette_size() {
        let assigner = EntityColorAssigner::with_palette(DEFAULT_PALETTE[..2].to_vec());
        let result = assigner.assign(["A", "B", "C"], &mut StdRng::seed_from_u64(3));

        assert!(matches!(result, Err(FactError::PaletteExhausted { palette: 2, .. })));
    }
}
