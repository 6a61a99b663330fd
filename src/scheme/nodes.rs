use crate::plants::{Genotype, SeedLot};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlantIx(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedLotIx(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrossingIx(pub(crate) usize);

/// Identity of a plant or seed lot node: its id and duplication counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub id: u64,
    pub duplication: usize,
}

impl NodeKey {
    pub fn new(id: u64, duplication: usize) -> Self {
        Self { id, duplication }
    }
}

/// Id of the seed lot produced by a merge until the merged scheme is accepted.
pub const PLACEHOLDER_ID: u64 = u64::MAX;

/// Monotonic id counters of one search run.
#[derive(Debug, Default)]
pub struct NodeIds {
    plants: AtomicU64,
    seed_lots: AtomicU64,
    crossings: AtomicU64,
    alternatives: AtomicU64,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_plant(&self) -> u64 {
        self.plants.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_seed_lot(&self) -> u64 {
        self.seed_lots.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_crossing(&self) -> u64 {
        self.crossings.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_alternatives(&self) -> u64 {
        self.alternatives.fetch_add(1, Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.plants.store(0, Ordering::Relaxed);
        self.seed_lots.store(0, Ordering::Relaxed);
        self.crossings.store(0, Ordering::Relaxed);
        self.alternatives.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct PlantNode {
    pub(crate) id: u64,
    pub(crate) duplication: usize,
    pub(crate) genotype: Arc<Genotype>,
    pub(crate) generation: usize,
    pub(crate) parent: Option<SeedLotIx>,
    pub(crate) crossings: Vec<CrossingIx>,
    pub(crate) selfings: Vec<CrossingIx>,
    pub(crate) dummy: bool,
}

impl PlantNode {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn duplication(&self) -> usize {
        self.duplication
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.id, self.duplication)
    }

    pub fn unique_id(&self) -> String {
        format!("p{}x{}", self.id, self.duplication)
    }

    pub fn genotype(&self) -> &Arc<Genotype> {
        &self.genotype
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn parent(&self) -> Option<SeedLotIx> {
        self.parent
    }

    /// Plant without parent seed lot, only present while schemes are merged.
    pub fn is_dangling(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    pub fn crossings(&self) -> &[CrossingIx] {
        &self.crossings
    }

    pub fn selfings(&self) -> &[CrossingIx] {
        &self.selfings
    }

    /// A selfing uses the plant twice.
    pub fn times_crossed(&self) -> usize {
        2 * self.selfings.len() + self.crossings.len()
    }
}

impl fmt::Display for PlantNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dummy {
            true => write!(f, "{} (dummy)", self.unique_id()),
            false => write!(f, "{} [{}]", self.unique_id(), self.genotype),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeedLotNode {
    pub(crate) id: u64,
    pub(crate) duplication: usize,
    pub(crate) seed_lot: Arc<SeedLot>,
    pub(crate) generation: usize,
    pub(crate) parent_crossings: Vec<CrossingIx>,
    pub(crate) children: BTreeMap<usize, Vec<PlantIx>>,
    pub(crate) seeds_taken: BTreeMap<usize, u64>,
}

impl SeedLotNode {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn duplication(&self) -> usize {
        self.duplication
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.id, self.duplication)
    }

    pub fn unique_id(&self) -> String {
        format!("s{}x{}", self.id, self.duplication)
    }

    pub fn seed_lot(&self) -> &Arc<SeedLot> {
        &self.seed_lot
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn parent_crossings(&self) -> &[CrossingIx] {
        &self.parent_crossings
    }

    /// Initial seed lots come from the input plants and have no parent crossings.
    pub fn is_initial(&self) -> bool {
        self.parent_crossings.is_empty()
    }

    pub fn children(&self) -> &BTreeMap<usize, Vec<PlantIx>> {
        &self.children
    }

    pub fn n_children(&self) -> usize {
        self.children.values().map(|c| c.len()).sum()
    }

    pub fn seeds_taken(&self) -> &BTreeMap<usize, u64> {
        &self.seeds_taken
    }

    pub fn seeds_taken_from_generation(&self, generation: usize) -> u64 {
        self.seeds_taken.get(&generation).copied().unwrap_or(0)
    }

    pub fn total_seeds_taken(&self) -> u64 {
        self.seeds_taken
            .values()
            .fold(0u64, |acc, &s| acc.saturating_add(s))
    }
}

#[derive(Debug, Clone)]
pub struct CrossingNode {
    pub(crate) id: u64,
    pub(crate) generation: usize,
    pub(crate) parent1: PlantIx,
    pub(crate) parent2: PlantIx,
    pub(crate) child: Option<SeedLotIx>,
    pub(crate) selfing: bool,
}

impl CrossingNode {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unique_id(&self) -> String {
        format!("c{}", self.id)
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn parents(&self) -> (PlantIx, PlantIx) {
        (self.parent1, self.parent2)
    }

    pub fn child(&self) -> Option<SeedLotIx> {
        self.child
    }

    pub fn is_selfing(&self) -> bool {
        self.selfing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn ids_are_unique_across_threads() {
        let ids = Arc::new(NodeIds::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                thread::spawn(move || (0..100).map(|_| ids.next_plant()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
        ids.reset();
        assert_eq!(ids.next_plant(), 0);
        assert_eq!(ids.next_seed_lot(), 0);
    }

    #[test]
    fn unique_ids_combine_id_and_duplication() {
        let lot = SeedLotNode {
            id: 3,
            duplication: 1,
            seed_lot: Arc::new(SeedLot::new(false, BTreeMap::new())),
            generation: 2,
            parent_crossings: vec![],
            children: BTreeMap::new(),
            seeds_taken: BTreeMap::from([(2, 5), (3, 4)]),
        };
        assert_eq!(lot.unique_id(), "s3x1");
        assert!(lot.is_initial());
        assert_eq!(lot.total_seeds_taken(), 9);
        assert_eq!(lot.seeds_taken_from_generation(4), 0);
        assert_eq!(NodeKey::new(3, 1), lot.key());
    }
}
