use crate::plants::{Genotype, SeedLot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Filtered seed lots of the crossings made so far, keyed by parent genotypes.
///
/// The order of the parents does not matter on lookup.
#[derive(Debug, Default)]
pub struct SeedLotCache {
    entries: RwLock<HashMap<Genotype, HashMap<Genotype, Arc<SeedLot>>>>,
}

impl SeedLotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, g1: &Genotype, g2: &Genotype) -> Option<Arc<SeedLot>> {
        let entries = self.entries.read();
        entries
            .get(g1)
            .and_then(|m| m.get(g2))
            .or_else(|| entries.get(g2).and_then(|m| m.get(g1)))
            .cloned()
    }

    pub fn insert(&self, g1: &Genotype, g2: &Genotype, lot: Arc<SeedLot>) {
        self.entries
            .write()
            .entry(g1.clone())
            .or_default()
            .insert(g2.clone(), lot);
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;

    #[test]
    fn lookups_ignore_parent_order() {
        let cache = SeedLotCache::new();
        let a = parse_genotype("11/00").unwrap();
        let b = parse_genotype("10/10").unwrap();
        assert!(cache.get(&a, &b).is_none());
        cache.insert(&a, &b, Arc::new(SeedLot::uniform_of(a.clone())));
        assert!(cache.get(&b, &a).is_some());
        assert!(cache.get(&a, &a).is_none());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
