use crate::error::SchemeError;
use crate::plants::{Genotype, SeedLot};
use crate::scheme::nodes::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Arena holding the plant, seed lot and crossing nodes of one crossing scheme.
///
/// Nodes refer to each other through indices into the arena. Parent links are kept for the
/// upward traversals the search needs, child links only where a node has to enumerate them:
/// seed lots know the plants grown from them and plants know the crossings they take part in.
#[derive(Debug, Clone, Default)]
pub struct SchemeGraph {
    pub(crate) plants: Vec<PlantNode>,
    pub(crate) seed_lots: Vec<SeedLotNode>,
    pub(crate) crossings: Vec<CrossingNode>,
}

impl SchemeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plant(&self, ix: PlantIx) -> &PlantNode {
        &self.plants[ix.0]
    }

    pub fn seed_lot(&self, ix: SeedLotIx) -> &SeedLotNode {
        &self.seed_lots[ix.0]
    }

    pub fn crossing(&self, ix: CrossingIx) -> &CrossingNode {
        &self.crossings[ix.0]
    }

    pub fn n_plants(&self) -> usize {
        self.plants.len()
    }

    pub fn n_seed_lots(&self) -> usize {
        self.seed_lots.len()
    }

    pub fn n_crossings(&self) -> usize {
        self.crossings.len()
    }

    pub fn add_seed_lot(
        &mut self,
        seed_lot: Arc<SeedLot>,
        generation: usize,
        id: u64,
        duplication: usize,
    ) -> SeedLotIx {
        self.seed_lots.push(SeedLotNode {
            id,
            duplication,
            seed_lot,
            generation,
            parent_crossings: Vec::new(),
            children: Default::default(),
            seeds_taken: Default::default(),
        });
        SeedLotIx(self.seed_lots.len() - 1)
    }

    /// Adds a plant node and registers it as child of `parent`. Without parent the plant is
    /// dangling until [`SchemeGraph::set_parent`] attaches it.
    pub fn add_plant(
        &mut self,
        genotype: Arc<Genotype>,
        generation: usize,
        parent: Option<SeedLotIx>,
        id: u64,
        duplication: usize,
    ) -> PlantIx {
        self.push_plant(PlantNode {
            id,
            duplication,
            genotype,
            generation,
            parent,
            crossings: Vec::new(),
            selfings: Vec::new(),
            dummy: false,
        })
    }

    /// Placeholder child of `parent`, standing in for the plants a merge will eventually grow
    /// from it.
    pub fn add_dummy(&mut self, parent: SeedLotIx) -> PlantIx {
        let generation = self.seed_lots[parent.0].generation;
        self.push_plant(PlantNode {
            id: PLACEHOLDER_ID,
            duplication: 0,
            genotype: Arc::new(Genotype::placeholder()),
            generation,
            parent: Some(parent),
            crossings: Vec::new(),
            selfings: Vec::new(),
            dummy: true,
        })
    }

    fn push_plant(&mut self, node: PlantNode) -> PlantIx {
        let parent = node.parent;
        self.plants.push(node);
        let ix = PlantIx(self.plants.len() - 1);
        if let Some(lot) = parent {
            self.register_child(lot, ix);
        }
        ix
    }

    fn register_child(&mut self, lot: SeedLotIx, plant: PlantIx) {
        let generation = self.plants[plant.0].generation;
        let children = self.seed_lots[lot.0].children.entry(generation).or_default();
        if !children.contains(&plant) {
            children.push(plant);
        }
    }

    /// Crosses two distinct plant nodes of the same generation.
    pub fn add_crossing(
        &mut self,
        id: u64,
        parent1: PlantIx,
        parent2: PlantIx,
    ) -> Result<CrossingIx, SchemeError> {
        let g1 = self.plants[parent1.0].generation;
        let g2 = self.plants[parent2.0].generation;
        if g1 != g2 {
            return Err(SchemeError::ImpossibleCrossing(g1, g2));
        }
        self.crossings.push(CrossingNode {
            id,
            generation: g1,
            parent1,
            parent2,
            child: None,
            selfing: false,
        });
        let ix = CrossingIx(self.crossings.len() - 1);
        self.plants[parent1.0].crossings.push(ix);
        self.plants[parent2.0].crossings.push(ix);
        Ok(ix)
    }

    pub fn add_selfing(&mut self, id: u64, parent: PlantIx) -> CrossingIx {
        self.crossings.push(CrossingNode {
            id,
            generation: self.plants[parent.0].generation,
            parent1: parent,
            parent2: parent,
            child: None,
            selfing: true,
        });
        let ix = CrossingIx(self.crossings.len() - 1);
        self.plants[parent.0].selfings.push(ix);
        ix
    }

    /// Makes `crossing` one of the crossings producing the seeds of `lot`.
    pub fn attach_crossing(&mut self, lot: SeedLotIx, crossing: CrossingIx) {
        self.seed_lots[lot.0].parent_crossings.push(crossing);
        self.crossings[crossing.0].child = Some(lot);
    }

    /// Attaches a dangling plant to the seed lot it is grown from.
    pub fn set_parent(&mut self, plant: PlantIx, lot: SeedLotIx) {
        self.plants[plant.0].parent = Some(lot);
        self.register_child(lot, plant);
    }

    /// Turns the dummy plant into a real plant with the given genotype and id.
    pub fn replace_dummy(
        &mut self,
        dummy: PlantIx,
        genotype: Arc<Genotype>,
        id: u64,
    ) -> Result<(), SchemeError> {
        let node = &mut self.plants[dummy.0];
        if !node.dummy {
            return Err(SchemeError::Invariant(format!(
                "{} is not a dummy plant",
                node.unique_id()
            )));
        }
        node.dummy = false;
        node.genotype = genotype;
        node.id = id;
        node.duplication = 0;
        Ok(())
    }

    pub fn set_seed_lot_id(&mut self, lot: SeedLotIx, id: u64) {
        self.seed_lots[lot.0].id = id;
    }

    /// Number of plant nodes carrying `id`, which is the duplication counter of the next one.
    pub fn count_plants_with_id(&self, id: u64) -> usize {
        self.plants.iter().filter(|p| p.id == id).count()
    }

    pub fn count_seed_lots_with_id(&self, id: u64) -> usize {
        self.seed_lots.iter().filter(|s| s.id == id).count()
    }

    /// Copies every node reachable upwards from `from` into a fresh arena, keeping ids and
    /// sharing ancestors that are reached more than once. With `shift` set every generation
    /// is moved one further.
    pub fn upward_copy(&self, from: PlantIx, shift: bool) -> (SchemeGraph, PlantIx) {
        let mut copy = UpwardCopy {
            source: self,
            target: SchemeGraph::new(),
            shift: usize::from(shift),
            plants: HashMap::new(),
            seed_lots: HashMap::new(),
        };
        let root = copy.plant(from);
        (copy.target, root)
    }
}

struct UpwardCopy<'a> {
    source: &'a SchemeGraph,
    target: SchemeGraph,
    shift: usize,
    plants: HashMap<PlantIx, PlantIx>,
    seed_lots: HashMap<SeedLotIx, SeedLotIx>,
}

impl UpwardCopy<'_> {
    fn plant(&mut self, ix: PlantIx) -> PlantIx {
        if let Some(&copied) = self.plants.get(&ix) {
            return copied;
        }
        let source = self.source;
        let node = source.plant(ix);
        let parent = node.parent.map(|lot| self.seed_lot(lot));
        let copied = self.target.push_plant(PlantNode {
            id: node.id,
            duplication: node.duplication,
            genotype: node.genotype.clone(),
            generation: node.generation + self.shift,
            parent,
            crossings: Vec::new(),
            selfings: Vec::new(),
            dummy: node.dummy,
        });
        self.plants.insert(ix, copied);
        copied
    }

    fn seed_lot(&mut self, ix: SeedLotIx) -> SeedLotIx {
        if let Some(&copied) = self.seed_lots.get(&ix) {
            return copied;
        }
        let source = self.source;
        let node = source.seed_lot(ix);
        let parents: Vec<CrossingIx> = node
            .parent_crossings
            .iter()
            .map(|&c| self.crossing(c))
            .collect();
        let copied = self.target.add_seed_lot(
            node.seed_lot.clone(),
            node.generation + self.shift,
            node.id,
            node.duplication,
        );
        for c in parents {
            self.target.attach_crossing(copied, c);
        }
        self.seed_lots.insert(ix, copied);
        copied
    }

    fn crossing(&mut self, ix: CrossingIx) -> CrossingIx {
        let source = self.source;
        let node = source.crossing(ix);
        let parent1 = self.plant(node.parent1);
        let generation = node.generation + self.shift;
        if node.selfing {
            let copied = self.target.add_selfing(node.id, parent1);
            self.target.crossings[copied.0].generation = generation;
            return copied;
        }
        let parent2 = self.plant(node.parent2);
        self.target.crossings.push(CrossingNode {
            id: node.id,
            generation,
            parent1,
            parent2,
            child: None,
            selfing: false,
        });
        let copied = CrossingIx(self.target.crossings.len() - 1);
        self.target.plants[parent1.0].crossings.push(copied);
        self.target.plants[parent2.0].crossings.push(copied);
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;

    fn genotype(s: &str) -> Arc<Genotype> {
        Arc::new(parse_genotype(s).unwrap())
    }

    /// p0 (from s0) selfed into s1, from which p1 is grown.
    fn selfing_graph() -> (SchemeGraph, PlantIx) {
        let mut g = SchemeGraph::new();
        let parent = genotype("1/0");
        let s0 = g.add_seed_lot(Arc::new(SeedLot::uniform_of((*parent).clone())), 0, 0, 0);
        let p0 = g.add_plant(parent, 0, Some(s0), 0, 0);
        let c0 = g.add_selfing(0, p0);
        let s1 = g.add_seed_lot(Arc::new(SeedLot::uniform_of(parse_genotype("1/1").unwrap())), 1, 1, 0);
        g.attach_crossing(s1, c0);
        let p1 = g.add_plant(genotype("1/1"), 1, Some(s1), 1, 0);
        (g, p1)
    }

    #[test]
    fn crossings_need_equal_generations() {
        let (mut g, p1) = selfing_graph();
        let p0 = PlantIx(0);
        assert_eq!(
            g.add_crossing(5, p0, p1).unwrap_err(),
            SchemeError::ImpossibleCrossing(0, 1)
        );
        let other = g.add_plant(genotype("0/0"), 0, None, 7, 0);
        assert!(g.plant(other).is_dangling());
        let c = g.add_crossing(5, p0, other).unwrap();
        assert_eq!(g.plant(p0).times_crossed(), 3);
        assert_eq!(g.crossing(c).generation(), 0);
    }

    #[test]
    fn selfings_count_twice() {
        let (g, _) = selfing_graph();
        let p0 = g.plant(PlantIx(0));
        assert_eq!(p0.selfings().len(), 1);
        assert!(p0.crossings().is_empty());
        assert_eq!(p0.times_crossed(), 2);
    }

    #[test]
    fn upward_copy_keeps_ids_and_topology() {
        let (g, p1) = selfing_graph();
        let (copy, root) = g.upward_copy(p1, false);
        assert_eq!(copy.n_plants(), 2);
        assert_eq!(copy.n_seed_lots(), 2);
        assert_eq!(copy.n_crossings(), 1);
        let root_node = copy.plant(root);
        assert_eq!(root_node.key(), g.plant(p1).key());
        let lot = copy.seed_lot(root_node.parent().unwrap());
        assert_eq!(lot.children()[&1], vec![root]);
        let selfing = copy.crossing(lot.parent_crossings()[0]);
        assert!(selfing.is_selfing());
        let (a, b) = selfing.parents();
        assert_eq!(a, b);
        assert_eq!(copy.plant(a).selfings().len(), 1);
    }

    #[test]
    fn shifted_copy_moves_every_generation() {
        let (g, p1) = selfing_graph();
        let (copy, root) = g.upward_copy(p1, true);
        assert_eq!(copy.plant(root).generation(), 2);
        assert!(copy.seed_lots.iter().all(|s| s.generation() >= 1));
        assert_eq!(copy.crossings[0].generation(), 1);
    }

    #[test]
    fn shared_ancestors_are_copied_once() {
        let mut g = SchemeGraph::new();
        let x = genotype("1/1");
        let s0 = g.add_seed_lot(Arc::new(SeedLot::uniform_of((*x).clone())), 0, 0, 0);
        let a = g.add_plant(x.clone(), 0, Some(s0), 0, 0);
        let b = g.add_plant(x.clone(), 0, Some(s0), 0, 1);
        let c = g.add_crossing(0, a, b).unwrap();
        let s1 = g.add_seed_lot(Arc::new(SeedLot::uniform_of((*x).clone())), 1, 1, 0);
        g.attach_crossing(s1, c);
        let top = g.add_plant(x, 1, Some(s1), 1, 0);
        let (copy, _) = g.upward_copy(top, false);
        assert_eq!(copy.n_seed_lots(), 2);
        assert_eq!(copy.n_plants(), 3);
        assert_eq!(copy.count_plants_with_id(0), 2);
        let initial = copy.seed_lots.iter().find(|s| s.is_initial()).unwrap();
        assert_eq!(initial.n_children(), 2);
    }

    #[test]
    fn dummies_are_replaced_in_place() {
        let mut g = SchemeGraph::new();
        let lot = g.add_seed_lot(Arc::new(SeedLot::uniform_of(parse_genotype("1/0").unwrap())), 1, 3, 0);
        let dummy = g.add_dummy(lot);
        assert!(g.plant(dummy).is_dummy());
        assert_eq!(g.seed_lot(lot).n_children(), 1);
        g.replace_dummy(dummy, genotype("1/0"), 9).unwrap();
        assert!(!g.plant(dummy).is_dummy());
        assert_eq!(g.plant(dummy).unique_id(), "p9x0");
        assert!(g.replace_dummy(dummy, genotype("1/0"), 9).is_err());
    }
}
