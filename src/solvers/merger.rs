use crate::error::{Result, SchemeError};
use crate::plants::{Genotype, SeedLot};
use crate::scheme::{
    CrossingScheme, CrossingSchemeAlternatives, NodeKey, PlantDescriptor, PlantIx, SchemeGraph,
    SeedLotIx, PLACEHOLDER_ID,
};
use crate::solvers::pareto::ParetoFrontier;
use crate::solvers::runtime_limit::RuntimeLimit;
use crate::solvers::solution_manager::SolutionManager;
use log::trace;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Merges two bundles of partial schemes whose final plants are crossed into `seed_lot`.
///
/// For every admissible pair of alternatives the histories of both parents are aligned
/// generation by generation. A dummy plant grown from the new seed lot stands in for the
/// offspring while the alignments are enumerated; afterwards every retained genotype of the
/// seed lot replaces the dummy on every Pareto optimal alignment.
pub struct SchemeMerger<'a> {
    scheme1: &'a CrossingSchemeAlternatives,
    scheme2: &'a CrossingSchemeAlternatives,
    manager: &'a SolutionManager,
    seed_lot: Arc<SeedLot>,
    /// `bound_cross[i][j]` is set when alternative `i` of the first bundle may not be crossed
    /// with alternative `j` of the second.
    bound_cross: Vec<Vec<bool>>,
    bounded_genotypes: HashSet<Genotype>,
    limit: &'a RuntimeLimit,
}

/// One parent scheme during a merge: the plants still waiting for a parent seed lot in the
/// merged scheme, and the generation of the parent scheme that is attached next.
#[derive(Clone)]
struct Branch<'s> {
    origin: &'s CrossingScheme,
    /// Dangling plant in the merged scheme mapped to the plant it copies in `origin`.
    dangling: BTreeMap<NodeKey, PlantIx>,
    next_gen: usize,
}

impl<'s> Branch<'s> {
    fn new(origin: &'s CrossingScheme, final_plant: NodeKey) -> Self {
        Self {
            origin,
            dangling: BTreeMap::from([(final_plant, origin.final_plant())]),
            next_gen: origin.num_generations(),
        }
    }

    /// Optimistic ambiguity and population still to be added by the part of the origin that
    /// is not merged yet.
    fn remaining_bounds(&self) -> (f64, u64) {
        let mut plants: HashSet<PlantIx> = self.dangling.values().copied().collect();
        for gen in 0..self.next_gen {
            plants.extend(self.origin.plants_in_generation(gen).iter().copied());
        }
        let lpa = plants.iter().fold(0.0, |acc, &p| {
            1.0 - (1.0 - acc) * (1.0 - self.origin.plant_lpa(p))
        });
        let seeds = (0..=self.next_gen)
            .flat_map(|gen| self.origin.seed_lots_in_generation(gen).iter())
            .map(|&lot| self.origin.graph().seed_lot(lot).total_seeds_taken())
            .fold(0u64, u64::saturating_add);
        (lpa, seeds)
    }
}

impl<'a> SchemeMerger<'a> {
    pub fn new(
        scheme1: &'a CrossingSchemeAlternatives,
        scheme2: &'a CrossingSchemeAlternatives,
        manager: &'a SolutionManager,
        seed_lot: Arc<SeedLot>,
        bound_cross: Vec<Vec<bool>>,
        bounded_genotypes: HashSet<Genotype>,
        limit: &'a RuntimeLimit,
    ) -> Self {
        Self {
            scheme1,
            scheme2,
            manager,
            seed_lot,
            bound_cross,
            bounded_genotypes,
            limit,
        }
    }

    fn bounded_pair(&self, i: usize, j: usize) -> bool {
        self.bound_cross
            .get(i)
            .and_then(|row| row.get(j))
            .copied()
            .unwrap_or(true)
    }

    /// Whether every pair of alternatives is bounded for every offspring genotype, in which
    /// case no alignment needs to be built.
    fn skip(&self) -> bool {
        self.seed_lot
            .genotypes()
            .filter(|g| !self.bounded_genotypes.contains(*g))
            .all(|g| {
                let target = PlantDescriptor::grown_from(g, &self.seed_lot);
                self.scheme1.alternatives().iter().enumerate().all(|(i, a1)| {
                    self.scheme2.alternatives().iter().enumerate().all(|(j, a2)| {
                        self.bounded_pair(i, j)
                            || self
                                .manager
                                .bound_cross_with_specific_other_with_target(a1, a2, &target)
                    })
                })
            })
    }

    /// Runs the merge and returns one bundle of alternatives per offspring genotype for which
    /// at least one alignment survives.
    pub fn combine(&self) -> Result<Vec<CrossingSchemeAlternatives>> {
        if self.limit.exceeded() || self.skip() {
            return Ok(Vec::new());
        }
        let merged = ParetoFrontier::new(self.manager.frontier().dominance().clone());
        for (i, alt1) in self.scheme1.alternatives().iter().enumerate() {
            for (j, alt2) in self.scheme2.alternatives().iter().enumerate() {
                if self.bounded_pair(i, j) {
                    continue;
                }
                let (start, key1, key2) = self.cross_final_plants(alt1, alt2)?;
                self.merge_history(
                    &merged,
                    start,
                    Branch::new(alt1, key1),
                    Branch::new(alt2, key2),
                )?;
            }
        }

        let ids = self.manager.ids();
        let mut backbones = Vec::with_capacity(merged.len());
        for scheme in merged.into_members() {
            let mut scheme = Arc::try_unwrap(scheme).unwrap_or_else(|shared| (*shared).clone());
            let lot = scheme
                .final_plant_node()
                .parent()
                .ok_or_else(|| SchemeError::Invariant("dummy plant without seed lot".to_owned()))?;
            scheme.graph_mut().set_seed_lot_id(lot, ids.next_seed_lot());
            scheme.reinit()?;
            backbones.push(scheme);
        }
        trace!(
            "merging #{} with #{} gave {} alignments",
            self.scheme1.id(),
            self.scheme2.id(),
            backbones.len()
        );

        let mut combined = Vec::new();
        for genotype in self.seed_lot.genotypes() {
            if self.limit.exceeded() {
                break;
            }
            if self.bounded_genotypes.contains(genotype) {
                continue;
            }
            let genotype = Arc::new(genotype.clone());
            let mut alternatives = Vec::new();
            for backbone in &backbones {
                if self.limit.exceeded() {
                    break;
                }
                if self
                    .manager
                    .bound_grow_plant_in_generation(&genotype, backbone.num_generations())
                {
                    continue;
                }
                let mut scheme = backbone.upward_copy()?;
                let dummy = scheme.final_plant();
                scheme
                    .graph_mut()
                    .replace_dummy(dummy, genotype.clone(), ids.next_plant())?;
                scheme.reinit()?;
                if !self.manager.bound_current_scheme(&scheme)
                    && scheme.resolve_depleted_seed_lots(self.manager)?
                {
                    alternatives.push(Arc::new(scheme));
                }
            }
            if !alternatives.is_empty() {
                combined.push(CrossingSchemeAlternatives::new(
                    ids.next_alternatives(),
                    alternatives,
                ));
            }
        }
        Ok(combined)
    }

    /// Partial scheme in which dangling copies of both final plants are crossed into the new
    /// seed lot, which grows the dummy.
    fn cross_final_plants(
        &self,
        alt1: &CrossingScheme,
        alt2: &CrossingScheme,
    ) -> Result<(CrossingScheme, NodeKey, NodeKey)> {
        let mut graph = SchemeGraph::new();
        let f1 = alt1.final_plant_node();
        let f2 = alt2.final_plant_node();
        let p1 = graph.add_plant(f1.genotype().clone(), 0, None, f1.id(), 0);
        let dup2 = graph.count_plants_with_id(f2.id());
        let p2 = graph.add_plant(f2.genotype().clone(), 0, None, f2.id(), dup2);
        let crossing = graph.add_crossing(self.manager.ids().next_crossing(), p1, p2)?;
        let lot = graph.add_seed_lot(self.seed_lot.clone(), 1, PLACEHOLDER_ID, 0);
        graph.attach_crossing(lot, crossing);
        let dummy = graph.add_dummy(lot);
        let (key1, key2) = (graph.plant(p1).key(), graph.plant(p2).key());
        let scheme = CrossingScheme::new(graph, dummy, alt1.tools().clone())?;
        Ok((scheme, key1, key2))
    }

    /// Explores the alignment states reachable from `(b1.next_gen, b2.next_gen)`, registering
    /// completed alignments in `merged`.
    fn merge_history(
        &self,
        merged: &ParetoFrontier<CrossingScheme>,
        current: CrossingScheme,
        b1: Branch<'_>,
        b2: Branch<'_>,
    ) -> Result<()> {
        if self.limit.exceeded() {
            return Ok(());
        }
        if b1.next_gen == 0 && b2.next_gen == 0 {
            return self.complete(merged, current, &b1, &b2);
        }
        let options = [
            (b1.next_gen > 0 && b2.next_gen > 0, true, true),
            (b1.next_gen > 0, true, false),
            (b2.next_gen > 0, false, true),
        ];
        for (possible, first, second) in options {
            if !possible {
                continue;
            }
            let mut extended = current.shifted_copy()?;
            let (mut n1, mut n2) = (b1.clone(), b2.clone());
            if first {
                self.merge_generation(&mut extended, &mut n1)?;
            }
            if second {
                self.merge_generation(&mut extended, &mut n2)?;
            }
            if !self.manager.bound_current_scheme(&extended)
                && !bound_alignment(merged, &extended, &n1, &n2)
            {
                self.merge_history(merged, extended, n1, n2)?;
            }
        }
        Ok(())
    }

    /// Grafts the plants still dangling at depth zero onto initial seed lots and registers the
    /// alignment unless it is bounded.
    fn complete(
        &self,
        merged: &ParetoFrontier<CrossingScheme>,
        mut current: CrossingScheme,
        b1: &Branch<'_>,
        b2: &Branch<'_>,
    ) -> Result<()> {
        let remaining: Vec<(NodeKey, &CrossingScheme, PlantIx)> = b2
            .dangling
            .iter()
            .map(|(&k, &p)| (k, b2.origin, p))
            .chain(b1.dangling.iter().map(|(&k, &p)| (k, b1.origin, p)))
            .collect();
        for (key, origin, original) in remaining {
            let plant = dangling_plant(&current, key)?;
            let origin_lot = origin_parent_lot(origin, original)?;
            let node = origin.graph().seed_lot(origin_lot);
            let lot = match current.seed_lot_in_generation_with_id(0, node.id()) {
                Some(lot) => lot,
                None => current
                    .graph_mut()
                    .add_seed_lot(node.seed_lot().clone(), 0, node.id(), 0),
            };
            current.graph_mut().set_parent(plant, lot);
            current.reinit()?;
        }
        if !self.manager.bound_current_scheme(&current)
            && !self.manager.bound_grow_plant_in_generation(
                current.final_genotype(),
                current.num_generations(),
            )
            && current.resolve_depleted_seed_lots(self.manager)?
        {
            merged.register(Arc::new(current));
        }
        Ok(())
    }

    /// Attaches the dangling plants of `branch` whose parent seed lot in the origin belongs to
    /// generation `branch.next_gen`. Their seed lots land in generation 1 of `scheme`, produced
    /// by crossings of plants in generation 0; parents that cannot be reused become dangling.
    fn merge_generation(&self, scheme: &mut CrossingScheme, branch: &mut Branch<'_>) -> Result<()> {
        let merged_gen = branch.next_gen;
        let origin = branch.origin;
        let ids = self.manager.ids();
        let mut new_dangling = BTreeMap::new();
        let pending: Vec<(NodeKey, PlantIx)> =
            branch.dangling.iter().map(|(&k, &p)| (k, p)).collect();
        for (key, original) in pending {
            if self.limit.exceeded() {
                break;
            }
            let origin_lot = origin_parent_lot(origin, original)?;
            let lot_node = origin.graph().seed_lot(origin_lot);
            if lot_node.generation() != merged_gen {
                continue;
            }
            branch.dangling.remove(&key);
            let plant = dangling_plant(scheme, key)?;

            let lot = match scheme.seed_lot_in_generation_with_id(1, lot_node.id()) {
                Some(lot) => lot,
                None => {
                    let &first = lot_node.parent_crossings().first().ok_or_else(|| {
                        SchemeError::Invariant(format!(
                            "seed lot {} of generation {} has no parent crossing",
                            lot_node.unique_id(),
                            merged_gen
                        ))
                    })?;
                    let crossing = origin.graph().crossing(first);
                    let (o1, o2) = crossing.parents();
                    let new_crossing = if crossing.is_selfing() {
                        let parent = self.parent_in_new_generation(
                            scheme,
                            origin,
                            o1,
                            None,
                            true,
                            &mut new_dangling,
                        );
                        scheme.graph_mut().add_selfing(ids.next_crossing(), parent)
                    } else {
                        let p1 = self.parent_in_new_generation(
                            scheme,
                            origin,
                            o1,
                            None,
                            false,
                            &mut new_dangling,
                        );
                        let p2 = self.parent_in_new_generation(
                            scheme,
                            origin,
                            o2,
                            Some(p1),
                            false,
                            &mut new_dangling,
                        );
                        scheme
                            .graph_mut()
                            .add_crossing(ids.next_crossing(), p1, p2)?
                    };
                    let duplication = scheme.graph().count_seed_lots_with_id(lot_node.id());
                    let graph = scheme.graph_mut();
                    let lot = graph.add_seed_lot(
                        lot_node.seed_lot().clone(),
                        1,
                        lot_node.id(),
                        duplication,
                    );
                    graph.attach_crossing(lot, new_crossing);
                    lot
                }
            };
            scheme.graph_mut().set_parent(plant, lot);
            scheme.reinit()?;
        }
        branch.dangling.extend(new_dangling);
        branch.next_gen = merged_gen.saturating_sub(1);
        Ok(())
    }

    /// A plant in generation 0 of `scheme` standing for `original`: a reusable one when the
    /// crossing cap allows, otherwise a new dangling copy recorded in `new_dangling`.
    fn parent_in_new_generation(
        &self,
        scheme: &mut CrossingScheme,
        origin: &CrossingScheme,
        original: PlantIx,
        taken: Option<PlantIx>,
        selfing: bool,
        new_dangling: &mut BTreeMap<NodeKey, PlantIx>,
    ) -> PlantIx {
        let node = origin.graph().plant(original);
        match self.manager.reusable_plant(node.id(), 0, scheme, selfing) {
            Some(p) if Some(p) != taken => p,
            _ => {
                let duplication = scheme.graph().count_plants_with_id(node.id());
                let plant = scheme.graph_mut().add_plant(
                    node.genotype().clone(),
                    0,
                    None,
                    node.id(),
                    duplication,
                );
                new_dangling.insert(NodeKey::new(node.id(), duplication), original);
                plant
            }
        }
    }
}

/// Whether an alignment in progress is dominated by a completed one, even when the rest of
/// both branches is merged as favourably as possible.
fn bound_alignment(
    merged: &ParetoFrontier<CrossingScheme>,
    scheme: &CrossingScheme,
    b1: &Branch<'_>,
    b2: &Branch<'_>,
) -> bool {
    let mut d = scheme.descriptor();
    d.num_generations += b1.next_gen.max(b2.next_gen);
    let (lpa1, pop1) = b1.remaining_bounds();
    let (lpa2, pop2) = b2.remaining_bounds();
    d.total_pop_size = d.total_pop_size.saturating_add(pop1.max(pop2));
    d.linkage_phase_ambiguity = 1.0 - (1.0 - d.linkage_phase_ambiguity) * (1.0 - lpa1.max(lpa2));
    merged.dominated_by_registered(&d)
}

fn dangling_plant(scheme: &CrossingScheme, key: NodeKey) -> Result<PlantIx, SchemeError> {
    scheme.plant_with_key(key).ok_or_else(|| {
        SchemeError::Invariant(format!(
            "dangling plant p{}x{} is missing",
            key.id, key.duplication
        ))
    })
}

fn origin_parent_lot(origin: &CrossingScheme, plant: PlantIx) -> Result<SeedLotIx, SchemeError> {
    let node = origin.graph().plant(plant);
    node.parent().ok_or_else(|| {
        SchemeError::Invariant(format!("plant {} has no parent seed lot", node.unique_id()))
    })
}
