use crate::error::{Result, SchemeError};
use crate::plants::Genotype;
use crate::scheme::descriptor::{CrossingSchemeDescriptor, PlantDescriptor};
use crate::scheme::graph::SchemeGraph;
use crate::scheme::nodes::*;
use crate::solvers::population_size::{PopulationSizeTools, TargetPlant};
use crate::solvers::solution_manager::SolutionManager;
use log::trace;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A crossing scheme rooted at its final plant.
///
/// Every node of the scheme is reachable upwards from the final plant. The aggregates
/// (population sizes, linkage phase ambiguity, generation indices) are recomputed by
/// [`CrossingScheme::reinit`] whenever the graph changes.
#[derive(Debug, Clone)]
pub struct CrossingScheme {
    graph: SchemeGraph,
    final_plant: PlantIx,
    tools: Arc<dyn PopulationSizeTools>,
    num_generations: usize,
    linkage_phase_ambiguity: f64,
    num_targets_from_non_uniform: usize,
    total_pop_size: u64,
    pop_per_generation: Vec<u64>,
    max_crossings_with_plant: usize,
    plants_per_generation: Vec<Vec<PlantIx>>,
    seed_lots_per_generation: Vec<Vec<SeedLotIx>>,
    crossings_per_generation: Vec<Vec<CrossingIx>>,
    plant_index: BTreeMap<NodeKey, PlantIx>,
    seed_lot_index: BTreeMap<NodeKey, SeedLotIx>,
    crossing_index: BTreeMap<u64, CrossingIx>,
}

impl CrossingScheme {
    pub fn new(
        graph: SchemeGraph,
        final_plant: PlantIx,
        tools: Arc<dyn PopulationSizeTools>,
    ) -> Result<Self, SchemeError> {
        let mut scheme = Self {
            graph,
            final_plant,
            tools,
            num_generations: 0,
            linkage_phase_ambiguity: 0.0,
            num_targets_from_non_uniform: 0,
            total_pop_size: 0,
            pop_per_generation: Vec::new(),
            max_crossings_with_plant: 0,
            plants_per_generation: Vec::new(),
            seed_lots_per_generation: Vec::new(),
            crossings_per_generation: Vec::new(),
            plant_index: BTreeMap::new(),
            seed_lot_index: BTreeMap::new(),
            crossing_index: BTreeMap::new(),
        };
        scheme.reinit()?;
        Ok(scheme)
    }

    /// Recomputes the generation indices and aggregates by walking the graph upwards from the
    /// final plant, one generation at a time. A seed lot is visited once all plants grown from
    /// it have been.
    pub fn reinit(&mut self) -> Result<(), SchemeError> {
        let n = self.graph.plant(self.final_plant).generation;
        self.num_generations = n;
        self.plants_per_generation = vec![Vec::new(); n + 1];
        self.seed_lots_per_generation = vec![Vec::new(); n + 1];
        self.crossings_per_generation = vec![Vec::new(); n + 1];
        self.plant_index.clear();
        self.seed_lot_index.clear();
        self.crossing_index.clear();

        let mut lpa = 0.0;
        let mut non_uniform = 0;
        let mut plant_queues: Vec<Vec<PlantIx>> = vec![Vec::new(); n + 1];
        let mut lot_queues: Vec<Vec<SeedLotIx>> = vec![Vec::new(); n + 1];
        let mut children_seen: HashMap<SeedLotIx, usize> = HashMap::new();

        let mut considered = HashSet::from([self.final_plant]);
        plant_queues[n].push(self.final_plant);
        self.index_plant(self.final_plant)?;

        for gen in (0..=n).rev() {
            for plant in std::mem::take(&mut plant_queues[gen]) {
                let Some(lot) = self.graph.plant(plant).parent else {
                    continue;
                };
                if !self.graph.seed_lot(lot).seed_lot.is_uniform() {
                    non_uniform += 1;
                }
                lpa = 1.0 - (1.0 - lpa) * (1.0 - self.plant_lpa(plant));
                let seen = children_seen.entry(lot).or_insert(0);
                *seen += 1;
                let lot_node = self.graph.seed_lot(lot);
                if *seen == lot_node.n_children() {
                    if lot_node.generation > gen {
                        return Err(SchemeError::Invariant(format!(
                            "seed lot {} of generation {} grows plants in generation {}",
                            lot_node.unique_id(),
                            lot_node.generation,
                            gen
                        )));
                    }
                    let (lot_gen, initial) = (lot_node.generation, lot_node.is_initial());
                    self.index_seed_lot(lot)?;
                    if !initial {
                        lot_queues[lot_gen].push(lot);
                    }
                }
            }

            for lot in std::mem::take(&mut lot_queues[gen]) {
                let parents = self.graph.seed_lot(lot).parent_crossings.clone();
                for crossing in parents {
                    self.index_crossing(crossing)?;
                    let (p1, p2) = self.graph.crossing(crossing).parents();
                    for parent in [p1, p2] {
                        if !considered.insert(parent) {
                            continue;
                        }
                        let parent_gen = self.graph.plant(parent).generation;
                        if parent_gen >= gen {
                            return Err(SchemeError::Invariant(format!(
                                "plant {} of generation {} is a parent of seed lot {} in generation {}",
                                self.graph.plant(parent).unique_id(),
                                parent_gen,
                                self.graph.seed_lot(lot).unique_id(),
                                gen
                            )));
                        }
                        plant_queues[parent_gen].push(parent);
                        self.index_plant(parent)?;
                    }
                }
            }
        }
        self.linkage_phase_ambiguity = lpa;
        self.num_targets_from_non_uniform = non_uniform;

        self.total_pop_size = 0;
        self.pop_per_generation = vec![0; n + 1];
        let lots: Vec<SeedLotIx> = self.seed_lot_index.values().copied().collect();
        for lot in lots {
            let seeds = {
                let node = self.graph.seed_lot(lot);
                let targets: BTreeMap<usize, Vec<TargetPlant<'_>>> = node
                    .children
                    .iter()
                    .map(|(&g, plants)| {
                        let targets = plants
                            .iter()
                            .map(|&p| TargetPlant {
                                genotype: self.graph.plant(p).genotype.as_ref(),
                                probability: self.plant_probability(p),
                            })
                            .collect();
                        (g, targets)
                    })
                    .collect();
                self.tools.seeds_taken_per_generation(&targets, non_uniform)
            };
            for (&g, &s) in &seeds {
                self.total_pop_size = self.total_pop_size.saturating_add(s);
                if let Some(pop) = self.pop_per_generation.get_mut(g) {
                    *pop = pop.saturating_add(s);
                }
            }
            self.graph.seed_lots[lot.0].seeds_taken = seeds;
        }

        self.max_crossings_with_plant = self
            .plant_index
            .values()
            .map(|&p| self.graph.plant(p).times_crossed())
            .max()
            .unwrap_or(0);
        trace!("reinitialised crossing scheme {}", self);
        Ok(())
    }

    fn index_plant(&mut self, plant: PlantIx) -> Result<(), SchemeError> {
        let node = self.graph.plant(plant);
        if let Some(&other) = self.plant_index.get(&node.key()) {
            if other != plant {
                return Err(SchemeError::Invariant(format!(
                    "plant id {} used by two nodes",
                    node.unique_id()
                )));
            }
            return Ok(());
        }
        self.plant_index.insert(node.key(), plant);
        self.plants_per_generation[node.generation].push(plant);
        Ok(())
    }

    fn index_seed_lot(&mut self, lot: SeedLotIx) -> Result<(), SchemeError> {
        let node = self.graph.seed_lot(lot);
        if let Some(&other) = self.seed_lot_index.get(&node.key()) {
            if other != lot {
                return Err(SchemeError::Invariant(format!(
                    "seed lot id {} used by two nodes",
                    node.unique_id()
                )));
            }
            return Ok(());
        }
        self.seed_lot_index.insert(node.key(), lot);
        self.seed_lots_per_generation[node.generation].push(lot);
        Ok(())
    }

    fn index_crossing(&mut self, crossing: CrossingIx) -> Result<(), SchemeError> {
        let node = self.graph.crossing(crossing);
        if self.crossing_index.insert(node.id, crossing).is_none() {
            self.crossings_per_generation
                .get_mut(node.generation)
                .ok_or_else(|| {
                    SchemeError::Invariant(format!(
                        "crossing {} beyond the final generation",
                        node.unique_id()
                    ))
                })?
                .push(crossing);
        }
        Ok(())
    }

    /// Copy of every node reachable from the final plant, ready to be extended.
    pub fn upward_copy(&self) -> Result<Self, SchemeError> {
        let (graph, root) = self.graph.upward_copy(self.final_plant, false);
        Self::new(graph, root, self.tools.clone())
    }

    /// Like [`CrossingScheme::upward_copy`] but every node moves one generation down.
    pub fn shifted_copy(&self) -> Result<Self, SchemeError> {
        let (graph, root) = self.graph.upward_copy(self.final_plant, true);
        Self::new(graph, root, self.tools.clone())
    }

    pub fn graph(&self) -> &SchemeGraph {
        &self.graph
    }

    /// Mutable access for structural edits; call [`CrossingScheme::reinit`] afterwards.
    pub(crate) fn graph_mut(&mut self) -> &mut SchemeGraph {
        &mut self.graph
    }

    pub fn tools(&self) -> &Arc<dyn PopulationSizeTools> {
        &self.tools
    }

    pub fn final_plant(&self) -> PlantIx {
        self.final_plant
    }

    pub fn final_plant_node(&self) -> &PlantNode {
        self.graph.plant(self.final_plant)
    }

    pub fn final_genotype(&self) -> &Arc<Genotype> {
        &self.final_plant_node().genotype
    }

    pub fn num_generations(&self) -> usize {
        self.num_generations
    }

    pub fn linkage_phase_ambiguity(&self) -> f64 {
        self.linkage_phase_ambiguity
    }

    pub fn num_targets_from_non_uniform(&self) -> usize {
        self.num_targets_from_non_uniform
    }

    pub fn total_pop_size(&self) -> u64 {
        self.total_pop_size
    }

    pub fn pop_per_generation(&self) -> &[u64] {
        &self.pop_per_generation
    }

    pub fn max_pop_per_generation(&self) -> u64 {
        self.pop_per_generation.iter().copied().max().unwrap_or(0)
    }

    pub fn num_crossings(&self) -> usize {
        self.crossing_index.len()
    }

    pub fn max_crossings_with_plant(&self) -> usize {
        self.max_crossings_with_plant
    }

    pub fn num_nodes(&self) -> usize {
        self.plant_index.len() + self.seed_lot_index.len() + self.crossing_index.len()
    }

    pub fn plants(&self) -> impl Iterator<Item = PlantIx> + '_ {
        self.plant_index.values().copied()
    }

    pub fn seed_lots(&self) -> impl Iterator<Item = SeedLotIx> + '_ {
        self.seed_lot_index.values().copied()
    }

    pub fn crossings(&self) -> impl Iterator<Item = CrossingIx> + '_ {
        self.crossing_index.values().copied()
    }

    pub fn plants_in_generation(&self, generation: usize) -> &[PlantIx] {
        self.plants_per_generation
            .get(generation)
            .map_or(&[], |v| v.as_slice())
    }

    pub fn seed_lots_in_generation(&self, generation: usize) -> &[SeedLotIx] {
        self.seed_lots_per_generation
            .get(generation)
            .map_or(&[], |v| v.as_slice())
    }

    pub fn crossings_in_generation(&self, generation: usize) -> &[CrossingIx] {
        self.crossings_per_generation
            .get(generation)
            .map_or(&[], |v| v.as_slice())
    }

    pub fn plant_with_key(&self, key: NodeKey) -> Option<PlantIx> {
        self.plant_index.get(&key).copied()
    }

    pub fn seed_lot_with_key(&self, key: NodeKey) -> Option<SeedLotIx> {
        self.seed_lot_index.get(&key).copied()
    }

    pub fn plants_with_id(&self, id: u64) -> impl Iterator<Item = PlantIx> + '_ {
        self.plant_index
            .range(NodeKey::new(id, 0)..=NodeKey::new(id, usize::MAX))
            .map(|(_, &p)| p)
    }

    pub fn contains_plants_with_id(&self, id: u64) -> bool {
        self.plants_with_id(id).next().is_some()
    }

    pub fn contains_seed_lots_with_id(&self, id: u64) -> bool {
        self.seed_lot_index
            .range(NodeKey::new(id, 0)..=NodeKey::new(id, usize::MAX))
            .next()
            .is_some()
    }

    pub fn plants_in_generation_with_id(&self, generation: usize, id: u64) -> Vec<PlantIx> {
        self.plants_in_generation(generation)
            .iter()
            .copied()
            .filter(|&p| self.graph.plant(p).id == id)
            .collect()
    }

    pub fn seed_lot_in_generation_with_id(&self, generation: usize, id: u64) -> Option<SeedLotIx> {
        self.seed_lots_in_generation(generation)
            .iter()
            .copied()
            .find(|&s| self.graph.seed_lot(s).id == id)
    }

    pub fn initial_seed_lot_ids(&self) -> BTreeSet<u64> {
        self.seed_lots_in_generation(0)
            .iter()
            .map(|&s| self.graph.seed_lot(s).id)
            .collect()
    }

    /// Linkage phase ambiguity of a plant; dangling and dummy plants contribute nothing.
    pub fn plant_lpa(&self, plant: PlantIx) -> f64 {
        let node = self.graph.plant(plant);
        match node.parent {
            Some(lot) if !node.dummy => self
                .graph
                .seed_lot(lot)
                .seed_lot
                .linkage_phase_ambiguity(&node.genotype),
            _ => 0.0,
        }
    }

    /// Probability of obtaining the plant's phase-known genotype from one seed of its lot.
    pub fn plant_probability(&self, plant: PlantIx) -> f64 {
        let node = self.graph.plant(plant);
        match node.parent {
            Some(_) if node.dummy => 1.0,
            Some(lot) => self
                .graph
                .seed_lot(lot)
                .seed_lot
                .probability_of_phase_known(&node.genotype),
            None => 0.0,
        }
    }

    pub fn grown_from_uniform_lot(&self, plant: PlantIx) -> bool {
        self.graph
            .plant(plant)
            .parent
            .is_some_and(|lot| self.graph.seed_lot(lot).seed_lot.is_uniform())
    }

    pub fn plant_descriptor(&self, plant: PlantIx) -> PlantDescriptor {
        PlantDescriptor {
            genotype: self.graph.plant(plant).genotype.clone(),
            probability: self.plant_probability(plant),
            linkage_phase_ambiguity: self.plant_lpa(plant),
            uniform_parent: self.grown_from_uniform_lot(plant),
        }
    }

    /// Descriptors of every real plant of the scheme.
    pub fn plant_descriptors(&self) -> Vec<PlantDescriptor> {
        self.plants()
            .filter(|&p| {
                let node = self.graph.plant(p);
                !node.dummy && !node.is_dangling()
            })
            .map(|p| self.plant_descriptor(p))
            .collect()
    }

    pub fn descriptor(&self) -> CrossingSchemeDescriptor {
        CrossingSchemeDescriptor {
            num_generations: self.num_generations,
            num_crossings: self.num_crossings(),
            max_crossings_with_plant: self.max_crossings_with_plant,
            max_pop_per_generation: self.max_pop_per_generation(),
            total_pop_size: self.total_pop_size,
            linkage_phase_ambiguity: self.linkage_phase_ambiguity,
            num_targets_from_non_uniform: self.num_targets_from_non_uniform,
        }
    }

    /// Adds parent crossings to every seed lot that has to deliver more seeds than its crossings
    /// produce, reusing parent plants where the crossing cap allows. Returns `false` when the
    /// extended scheme is bounded by `manager`, in which case it should be discarded.
    pub fn resolve_depleted_seed_lots(&mut self, manager: &SolutionManager) -> Result<bool> {
        let mut depleted = manager.depleted_seed_lots(self);
        let mut bounded = false;
        while !bounded && !depleted.is_empty() {
            for lot in depleted {
                if bounded {
                    break;
                }
                if self.graph.seed_lot(lot).total_seeds_taken() == u64::MAX {
                    return Ok(false);
                }
                let crossing = self.graph.seed_lot(lot).parent_crossings[0];
                let original = self.graph.crossing(crossing).clone();
                let new_crossing = if original.selfing {
                    let parent = self.parent_for_extra_crossing(manager, original.parent1, None, true);
                    self.graph.add_selfing(manager.ids().next_crossing(), parent)
                } else {
                    let p1 = self.parent_for_extra_crossing(manager, original.parent1, None, false);
                    let p2 =
                        self.parent_for_extra_crossing(manager, original.parent2, Some(p1), false);
                    self.graph
                        .add_crossing(manager.ids().next_crossing(), p1, p2)?
                };
                self.graph.attach_crossing(lot, new_crossing);
                self.reinit()?;
                bounded = manager.bound_current_scheme(self);
            }
            depleted = manager.depleted_seed_lots(self);
        }
        Ok(!bounded)
    }

    /// A plant with the identity of `original` that may take part in one more crossing: an
    /// existing one if the crossing cap allows it, otherwise a new duplicate grown from the
    /// same seed lot.
    fn parent_for_extra_crossing(
        &mut self,
        manager: &SolutionManager,
        original: PlantIx,
        taken: Option<PlantIx>,
        selfing: bool,
    ) -> PlantIx {
        let node = self.graph.plant(original);
        let (id, generation) = (node.id, node.generation);
        match manager.reusable_plant(id, generation, self, selfing) {
            Some(p) if Some(p) != taken => p,
            _ => {
                let node = self.graph.plant(original);
                let (genotype, parent) = (node.genotype.clone(), node.parent);
                let duplication = self.graph.count_plants_with_id(id);
                self.graph
                    .add_plant(genotype, generation, parent, id, duplication)
            }
        }
    }

    /// Genotypes grown from a seed lot per generation, with multiplicities.
    fn child_genotypes(&self, lot: SeedLotIx) -> BTreeMap<usize, BTreeMap<&Genotype, usize>> {
        self.graph
            .seed_lot(lot)
            .children
            .iter()
            .map(|(&g, plants)| {
                let mut counts = BTreeMap::new();
                for &p in plants {
                    *counts.entry(self.graph.plant(p).genotype.as_ref()).or_insert(0) += 1;
                }
                (g, counts)
            })
            .collect()
    }

    fn parent_genotypes(&self, lot: SeedLotIx) -> Option<(&Genotype, &Genotype)> {
        let node = self.graph.seed_lot(lot);
        node.parent_crossings.first().map(|&c| {
            let (p1, p2) = self.graph.crossing(c).parents();
            (
                self.graph.plant(p1).genotype.as_ref(),
                self.graph.plant(p2).genotype.as_ref(),
            )
        })
    }
}

impl PartialEq for CrossingScheme {
    /// Schemes are equivalent when their seed lots can be matched generation by generation,
    /// each pair grown from the same parent genotypes and growing the same child genotypes.
    fn eq(&self, other: &Self) -> bool {
        if self.num_generations != other.num_generations
            || self.total_pop_size != other.total_pop_size
            || self.num_targets_from_non_uniform != other.num_targets_from_non_uniform
            || self.pop_per_generation != other.pop_per_generation
            || self.final_genotype() != other.final_genotype()
        {
            return false;
        }
        (0..=self.num_generations).all(|gen| {
            let mine = self.seed_lots_in_generation(gen);
            let theirs = other.seed_lots_in_generation(gen);
            if mine.len() != theirs.len() {
                return false;
            }
            let mut matched = vec![false; theirs.len()];
            mine.iter().all(|&lot| {
                let parents = self.parent_genotypes(lot);
                let children = self.child_genotypes(lot);
                let found = theirs.iter().enumerate().position(|(j, &o)| {
                    !matched[j]
                        && same_parents(parents, other.parent_genotypes(o))
                        && children == other.child_genotypes(o)
                });
                match found {
                    Some(j) => {
                        matched[j] = true;
                        true
                    }
                    None => false,
                }
            })
        })
    }
}

fn same_parents(x: Option<(&Genotype, &Genotype)>, y: Option<(&Genotype, &Genotype)>) -> bool {
    match (x, y) {
        (None, None) => true,
        (Some((a1, a2)), Some((b1, b2))) => (a1 == b1 && a2 == b2) || (a1 == b2 && a2 == b1),
        _ => false,
    }
}

impl Eq for CrossingScheme {}

impl Hash for CrossingScheme {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn single<T: Hash + ?Sized>(x: &T) -> u64 {
            let mut h = DefaultHasher::new();
            x.hash(&mut h);
            h.finish()
        }
        let mut sum: u64 = 7;
        for lot in self.seed_lots() {
            if let Some((p1, p2)) = self.parent_genotypes(lot) {
                sum = sum.wrapping_add(single(p1)).wrapping_add(single(p2));
            }
            sum = sum.wrapping_add(single(&self.child_genotypes(lot)));
        }
        sum.hash(state);
    }
}

impl fmt::Display for CrossingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{gen: {}, pop: {}, lpa: {:.2}}}",
            self.num_generations, self.total_pop_size, self.linkage_phase_ambiguity
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;
    use crate::plants::{GeneticMap, SeedLot};
    use crate::solvers::population_size::DefaultPopulationSizeTools;
    use crate::solvers::seed_lot_constructor::{DefaultSeedLotConstructor, SeedLotConstructor};

    pub(crate) fn tools() -> Arc<dyn PopulationSizeTools> {
        Arc::new(DefaultPopulationSizeTools::new(0.9))
    }

    /// `1/1` crossed with `0/0`, the heterozygote selfed into the homozygote `1/1`.
    pub(crate) fn single_locus_scheme() -> CrossingScheme {
        let map = Arc::new(GeneticMap::unlinked(&[1]));
        let constructor = DefaultSeedLotConstructor::new(map);
        let a = parse_genotype("1/1").unwrap();
        let b = parse_genotype("0/0").unwrap();
        let het = parse_genotype("1/0").unwrap();

        let mut g = SchemeGraph::new();
        let sa = g.add_seed_lot(Arc::new(SeedLot::uniform_of(a.clone())), 0, 0, 0);
        let sb = g.add_seed_lot(Arc::new(SeedLot::uniform_of(b.clone())), 0, 1, 0);
        let pa = g.add_plant(Arc::new(a.clone()), 0, Some(sa), 0, 0);
        let pb = g.add_plant(Arc::new(b.clone()), 0, Some(sb), 1, 0);
        let c0 = g.add_crossing(0, pa, pb).unwrap();
        let s1 = g.add_seed_lot(Arc::new(constructor.cross(&a, &b).unwrap()), 1, 2, 0);
        g.attach_crossing(s1, c0);
        let ph = g.add_plant(Arc::new(het.clone()), 1, Some(s1), 2, 0);
        let c1 = g.add_selfing(1, ph);
        let s2 = g.add_seed_lot(Arc::new(constructor.self_cross(&het).unwrap()), 2, 3, 0);
        g.attach_crossing(s2, c1);
        let top = g.add_plant(Arc::new(a), 2, Some(s2), 3, 0);
        CrossingScheme::new(g, top, tools()).unwrap()
    }

    #[test]
    fn aggregates_of_single_locus_scheme() {
        let s = single_locus_scheme();
        assert_eq!(s.num_generations(), 2);
        assert_eq!(s.num_targets_from_non_uniform(), 1);
        assert_eq!(s.linkage_phase_ambiguity(), 0.0);
        assert_eq!(s.pop_per_generation(), &[2, 1, 9]);
        assert_eq!(s.total_pop_size(), 12);
        assert_eq!(s.max_pop_per_generation(), 9);
        assert_eq!(s.num_crossings(), 2);
        assert_eq!(s.max_crossings_with_plant(), 2);
        assert_eq!(s.plants_in_generation(0).len(), 2);
        assert_eq!(s.seed_lots_in_generation(0).len(), 2);
        assert_eq!(s.crossings_in_generation(1).len(), 1);
        assert_eq!(s.initial_seed_lot_ids(), BTreeSet::from([0, 1]));
        assert_eq!(s.num_nodes(), 4 + 4 + 2);
        let total: u64 = s
            .seed_lots()
            .map(|l| s.graph().seed_lot(l).total_seeds_taken())
            .sum();
        assert_eq!(total, s.total_pop_size());
        assert_eq!(s.to_string(), "{gen: 2, pop: 12, lpa: 0.00}");
    }

    #[test]
    fn copy_then_reinit_is_equal() {
        let s = single_locus_scheme();
        let copy = s.upward_copy().unwrap();
        assert_eq!(copy, s);
        assert_eq!(copy.descriptor(), s.descriptor());
        let keys = |x: &CrossingScheme| {
            x.plants()
                .map(|p| x.graph().plant(p).key())
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&copy), keys(&s));
        let hash = |x: &CrossingScheme| {
            let mut h = DefaultHasher::new();
            x.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&copy), hash(&s));
    }

    #[test]
    fn shifted_copy_adds_a_generation() {
        let s = single_locus_scheme();
        let shifted = s.shifted_copy().unwrap();
        assert_eq!(shifted.num_generations(), 3);
        assert!(shifted.seed_lots_in_generation(0).is_empty());
        assert_eq!(shifted.seed_lots_in_generation(1).len(), 2);
        assert_eq!(shifted.total_pop_size(), s.total_pop_size());
    }

    #[test]
    fn parent_order_does_not_matter() {
        let s = single_locus_scheme();
        let mut swapped = s.upward_copy().unwrap();
        let f1 = swapped.seed_lots_in_generation(1)[0];
        let c = swapped.graph().seed_lot(f1).parent_crossings()[0];
        let node = &mut swapped.graph_mut().crossings[c.0];
        std::mem::swap(&mut node.parent1, &mut node.parent2);
        swapped.reinit().unwrap();
        assert_eq!(swapped, s);
    }

    #[test]
    fn different_final_genotypes_differ() {
        let s = single_locus_scheme();
        let mut other = s.upward_copy().unwrap();
        let top = other.final_plant();
        other.graph_mut().plants[top.0].genotype = Arc::new(parse_genotype("0/0").unwrap());
        other.reinit().unwrap();
        assert_ne!(other, s);
    }

    #[test]
    fn lookups_by_id() {
        let s = single_locus_scheme();
        assert!(s.contains_plants_with_id(2));
        assert!(!s.contains_plants_with_id(42));
        assert!(s.contains_seed_lots_with_id(3));
        assert_eq!(s.plants_in_generation_with_id(1, 2).len(), 1);
        assert!(s.plants_in_generation_with_id(0, 2).is_empty());
        assert!(s.seed_lot_in_generation_with_id(0, 1).is_some());
        assert!(s.plant_with_key(NodeKey::new(3, 0)).is_some());
        let descriptors = s.plant_descriptors();
        assert_eq!(descriptors.len(), 4);
        let top = s.plant_descriptor(s.final_plant());
        assert_eq!(top.probability, 0.25);
        assert!(!top.uniform_parent);
    }
}
