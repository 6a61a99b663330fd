use crate::abstract_plants::Dominance;
use crate::plants::{DiploidChromosome, Genotype, Haplotype, SeedLot, TargetState};
use crate::scheme::{
    CrossingScheme, CrossingSchemeDescriptor, NodeIds, PlantDescriptor, PlantIx, SeedLotIx,
};
use crate::solvers::constraints::Constraints;
use crate::solvers::heuristics::{Heuristic, Heuristics, SeedLotFilter};
use crate::solvers::pareto::ParetoFrontier;
use crate::solvers::population_size::PopulationSizeTools;
use std::collections::HashSet;
use std::sync::Arc;

/// Owns the Pareto frontier of solutions and decides which partial schemes can be bounded.
///
/// Every bound compares an optimistic descriptor of the completions of a partial scheme with
/// the constraints and the current frontier. The heuristics are consulted first and may add
/// their own bounds and bound extensions.
#[derive(Debug)]
pub struct SolutionManager {
    ideotype: Arc<Genotype>,
    tools: Arc<dyn PopulationSizeTools>,
    constraints: Constraints,
    heuristics: Heuristics,
    seed_lot_filters: Vec<Arc<dyn SeedLotFilter>>,
    seeds_per_crossing: Option<u64>,
    homozygous_ideotype_parents: bool,
    frontier: ParetoFrontier<CrossingScheme>,
    ids: Arc<NodeIds>,
}

/// Optimistic linkage phase ambiguity and number of targets from non-uniform lots after two
/// schemes are merged.
struct MergedPlantBounds {
    lpa: f64,
    non_uniform: usize,
}

impl SolutionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ideotype: Arc<Genotype>,
        tools: Arc<dyn PopulationSizeTools>,
        constraints: Constraints,
        heuristics: Heuristics,
        seed_lot_filters: Vec<Arc<dyn SeedLotFilter>>,
        seeds_per_crossing: Option<u64>,
        homozygous_ideotype_parents: bool,
        dominance: Arc<dyn Dominance<CrossingSchemeDescriptor>>,
        ids: Arc<NodeIds>,
    ) -> Self {
        Self {
            ideotype,
            tools,
            constraints,
            heuristics,
            seed_lot_filters,
            seeds_per_crossing,
            homozygous_ideotype_parents,
            frontier: ParetoFrontier::new(dominance),
            ids,
        }
    }

    pub fn ideotype(&self) -> &Arc<Genotype> {
        &self.ideotype
    }

    pub fn tools(&self) -> &Arc<dyn PopulationSizeTools> {
        &self.tools
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn frontier(&self) -> &ParetoFrontier<CrossingScheme> {
        &self.frontier
    }

    pub fn into_frontier(self) -> ParetoFrontier<CrossingScheme> {
        self.frontier
    }

    pub fn ids(&self) -> &NodeIds {
        &self.ids
    }

    pub fn is_solution(&self, scheme: &CrossingScheme) -> bool {
        scheme.final_genotype().as_ref() == self.ideotype.as_ref()
    }

    fn homozygous_parents(&self, scheme: &CrossingScheme) -> bool {
        let Some(penultimate) = scheme.num_generations().checked_sub(1) else {
            return true;
        };
        scheme
            .plants_in_generation(penultimate)
            .iter()
            .all(|&p| scheme.graph().plant(p).genotype().is_homozygous_at_all_target_loci())
    }

    /// Offers a solution to the frontier. Returns whether the frontier changed.
    pub fn register_solution(&self, scheme: Arc<CrossingScheme>) -> bool {
        self.is_solution(&scheme)
            && self.constraints.all_satisfied(&scheme.descriptor())
            && (!self.homozygous_ideotype_parents || self.homozygous_parents(&scheme))
            && self.frontier.register(scheme)
    }

    /// Non-initial seed lots that have to deliver more seeds than their crossings produce.
    pub fn depleted_seed_lots(&self, scheme: &CrossingScheme) -> Vec<SeedLotIx> {
        let Some(limit) = self.seeds_per_crossing else {
            return Vec::new();
        };
        scheme
            .seed_lots()
            .filter(|&lot| {
                let node = scheme.graph().seed_lot(lot);
                !node.is_initial()
                    && node.total_seeds_taken()
                        > limit.saturating_mul(node.parent_crossings().len() as u64)
            })
            .collect()
    }

    pub fn reusable_plant(
        &self,
        id: u64,
        generation: usize,
        scheme: &CrossingScheme,
        selfing: bool,
    ) -> Option<PlantIx> {
        self.constraints
            .reusable_plant(id, generation, scheme, selfing)
    }

    /// Drops genotypes that can never be part of an admissible scheme, then applies the
    /// configured seed lot filters.
    pub fn filter_seed_lot(&self, lot: &mut SeedLot) {
        let max_lpa = self.constraints.max_linkage_phase_ambiguity();
        let min_prob = self
            .constraints
            .max_pop_per_generation()
            .map(|max| self.tools.target_prob_lower_bound(max));
        lot.retain(|g, lot| {
            max_lpa.map_or(true, |max| lot.linkage_phase_ambiguity(g) <= max)
                && min_prob.map_or(true, |min| lot.probability_of_phase_known(g) >= min)
        });
        for filter in &self.seed_lot_filters {
            filter.filter(lot);
        }
    }

    fn admissible(&self, d: &CrossingSchemeDescriptor) -> bool {
        self.constraints.all_satisfied(d) && !self.frontier.dominated_by_registered(d)
    }

    pub fn bound_cross_current(&self, scheme: &CrossingScheme) -> bool {
        if self.heuristics.bound_cross_current(scheme) {
            return true;
        }
        let mut d = scheme.descriptor();
        d.num_generations += 1;
        d.num_crossings += 1;
        let d = self.heuristics.extend_bounds_upon_crossing(d, scheme);
        !self.admissible(&d)
    }

    pub fn bound_cross_with_specific_other(
        &self,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
    ) -> bool {
        let generations = scheme.num_generations().max(other.num_generations());
        if self.penultimate_generation_reached(generations)
            && !self.ideotype_obtainable_from_pair(scheme.final_genotype(), other.final_genotype())
        {
            return true;
        }
        if self.heuristics.bound_cross_with_specific_other(scheme, other) {
            return true;
        }
        let mut d = scheme.descriptor();
        d.num_generations = generations + 1;
        d.num_crossings = scheme.num_crossings().max(other.num_crossings()) + 1;
        d.linkage_phase_ambiguity = merged_plant_bounds(scheme, other).lpa;
        d.total_pop_size = merged_pop_bound(scheme, other);
        d.max_pop_per_generation = scheme
            .max_pop_per_generation()
            .max(other.max_pop_per_generation());
        let d = self
            .heuristics
            .extend_bounds_upon_crossing_with_specific_other(d, scheme, other);
        !self.admissible(&d)
    }

    pub fn bound_cross_with_specific_other_with_target(
        &self,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> bool {
        let generations = scheme.num_generations().max(other.num_generations());
        if self.bound_grow_plant_in_generation(&target.genotype, generations + 1)
            || self
                .heuristics
                .bound_cross_with_specific_other_with_target(scheme, other, target)
        {
            return true;
        }
        let plants = merged_plant_bounds(scheme, other);
        let non_uniform = plants.non_uniform + usize::from(!target.uniform_parent);
        let seeds = self
            .tools
            .required_seeds_for_target(target.probability, non_uniform);
        let mut d = scheme.descriptor();
        d.num_generations = generations + 1;
        d.num_crossings = scheme.num_crossings().max(other.num_crossings()) + 1;
        d.linkage_phase_ambiguity =
            1.0 - (1.0 - plants.lpa) * (1.0 - target.linkage_phase_ambiguity);
        d.num_targets_from_non_uniform = non_uniform;
        d.total_pop_size = merged_pop_bound(scheme, other).saturating_add(seeds);
        d.max_pop_per_generation = scheme
            .max_pop_per_generation()
            .max(other.max_pop_per_generation())
            .max(seeds);
        let d = self
            .heuristics
            .extend_bounds_upon_crossing_with_target(d, scheme, other, target);
        !self.admissible(&d)
    }

    fn selfing_homozygous_initial_plant(&self, scheme: &CrossingScheme) -> bool {
        scheme.num_generations() == 0
            && scheme.final_genotype().is_homozygous_at_all_target_loci()
    }

    pub fn bound_self_current(&self, scheme: &CrossingScheme) -> bool {
        let g = scheme.final_genotype();
        if self.selfing_homozygous_initial_plant(scheme)
            || self.penultimate_generation_reached(scheme.num_generations())
                && !self.ideotype_obtainable_from_pair(g, g)
            || self.heuristics.bound_self_current(scheme)
        {
            return true;
        }
        let mut d = scheme.descriptor();
        d.num_generations += 1;
        d.num_crossings += 1;
        let d = self.heuristics.extend_bounds_upon_selfing(d, scheme);
        !self.admissible(&d)
    }

    pub fn bound_self_with_target(&self, scheme: &CrossingScheme, target: &PlantDescriptor) -> bool {
        if self.selfing_homozygous_initial_plant(scheme)
            || self.bound_grow_plant_in_generation(&target.genotype, scheme.num_generations() + 1)
            || self.heuristics.bound_self_with_target(scheme, target)
        {
            return true;
        }
        let non_uniform =
            scheme.num_targets_from_non_uniform() + usize::from(!target.uniform_parent);
        let seeds = self
            .tools
            .required_seeds_for_target(target.probability, non_uniform);
        let mut d = scheme.descriptor();
        d.num_generations += 1;
        d.num_crossings += 1;
        d.num_targets_from_non_uniform = non_uniform;
        d.total_pop_size = d.total_pop_size.saturating_add(seeds);
        d.max_pop_per_generation = d.max_pop_per_generation.max(seeds);
        d.linkage_phase_ambiguity =
            1.0 - (1.0 - d.linkage_phase_ambiguity) * (1.0 - target.linkage_phase_ambiguity);
        let d = self
            .heuristics
            .extend_bounds_upon_selfing_with_target(d, scheme, target);
        !self.admissible(&d)
    }

    pub fn bound_current_scheme(&self, scheme: &CrossingScheme) -> bool {
        if self.heuristics.bound_current(scheme) {
            return true;
        }
        let d = self
            .heuristics
            .extend_bounds_for_current(scheme.descriptor(), scheme);
        !self.admissible(&d)
    }

    pub fn bound_queue(&self, scheme: &Arc<CrossingScheme>) -> bool {
        self.heuristics.bound_queue(scheme)
    }

    pub fn bound_dequeue(&self, scheme: &CrossingScheme) -> bool {
        self.heuristics.bound_dequeue(scheme)
    }

    pub fn bound_grow_plant_from_ancestors(
        &self,
        ancestors: &HashSet<PlantDescriptor>,
        plant: &PlantDescriptor,
    ) -> bool {
        self.heuristics
            .bound_grow_plant_from_ancestors(ancestors, plant)
    }

    /// Whether a plant with `genotype` is useless when grown in `generation`. Dummy plants,
    /// which carry the placeholder genotype, are never bounded.
    pub fn bound_grow_plant_in_generation(&self, genotype: &Genotype, generation: usize) -> bool {
        if genotype.n_chromosomes() == 0 {
            return false;
        }
        if self
            .heuristics
            .bound_grow_plant_in_generation(genotype, generation)
        {
            return true;
        }
        let is_ideotype = genotype == self.ideotype.as_ref();
        let penultimate = self.penultimate_generation_reached(generation);
        self.final_generation_reached(generation) && !is_ideotype
            || penultimate && !self.ideotype_obtainable_from(genotype)
            || self.homozygous_ideotype_parents
                && penultimate
                && !is_ideotype
                && !genotype.is_homozygous_at_all_target_loci()
    }

    /// Whether one gamete of `parent` can carry an ideotype haplotype on every chromosome.
    fn ideotype_obtainable_from(&self, parent: &Genotype) -> bool {
        parent
            .chromosomes()
            .iter()
            .zip(self.ideotype.chromosomes())
            .all(|(chrom, ideal)| {
                haplotype_obtainable(ideal.haplotype(0), chrom)
                    || haplotype_obtainable(ideal.haplotype(1), chrom)
            })
    }

    /// Whether crossing `p1` with `p2` can yield the ideotype in one generation.
    fn ideotype_obtainable_from_pair(&self, p1: &Genotype, p2: &Genotype) -> bool {
        itertools::izip!(p1.chromosomes(), p2.chromosomes(), self.ideotype.chromosomes()).all(
            |(c1, c2, ideal)| {
                let (h0, h1) = (ideal.haplotype(0), ideal.haplotype(1));
                haplotype_obtainable(h0, c1) && haplotype_obtainable(h1, c2)
                    || haplotype_obtainable(h1, c1) && haplotype_obtainable(h0, c2)
            },
        )
    }

    pub fn final_generation_reached(&self, generation: usize) -> bool {
        self.constraints
            .max_generations()
            .is_some_and(|max| generation >= max)
    }

    pub fn penultimate_generation_reached(&self, generation: usize) -> bool {
        self.constraints
            .max_generations()
            .is_some_and(|max| generation + 1 >= max)
    }
}

/// Whether some gamete of `chrom` can be `hap`, judged on the observable state only.
fn haplotype_obtainable(hap: &Haplotype, chrom: &DiploidChromosome) -> bool {
    (0..chrom.n_loci()).all(|l| match (hap.target(l), chrom.target_state(l)) {
        (true, state) => state != TargetState::Zero,
        (false, state) => state != TargetState::Twice,
    })
}

fn merged_plant_bounds_one_way(full: &CrossingScheme, other: &CrossingScheme) -> MergedPlantBounds {
    let last = other.final_plant();
    let mut lpa = 1.0 - (1.0 - full.linkage_phase_ambiguity()) * (1.0 - other.plant_lpa(last));
    let mut non_uniform =
        full.num_targets_from_non_uniform() + usize::from(!other.grown_from_uniform_lot(last));
    for p in other.plants() {
        if p != last && !full.contains_plants_with_id(other.graph().plant(p).id()) {
            lpa = 1.0 - (1.0 - lpa) * (1.0 - other.plant_lpa(p));
            if !other.grown_from_uniform_lot(p) {
                non_uniform += 1;
            }
        }
    }
    MergedPlantBounds { lpa, non_uniform }
}

fn merged_plant_bounds(s1: &CrossingScheme, s2: &CrossingScheme) -> MergedPlantBounds {
    let b1 = merged_plant_bounds_one_way(s1, s2);
    let b2 = merged_plant_bounds_one_way(s2, s1);
    MergedPlantBounds {
        lpa: b1.lpa.max(b2.lpa),
        non_uniform: b1.non_uniform.max(b2.non_uniform),
    }
}

fn merged_pop_bound_one_way(full: &CrossingScheme, other: &CrossingScheme) -> u64 {
    other
        .seed_lots()
        .map(|lot| other.graph().seed_lot(lot))
        .filter(|node| !full.contains_seed_lots_with_id(node.id()))
        .fold(full.total_pop_size(), |pop, node| {
            pop.saturating_add(node.total_seeds_taken())
        })
}

fn merged_pop_bound(s1: &CrossingScheme, s2: &CrossingScheme) -> u64 {
    merged_pop_bound_one_way(s1, s2).max(merged_pop_bound_one_way(s2, s1))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;
    use crate::scheme::crossing_scheme::tests::{single_locus_scheme, tools};
    use crate::solvers::constraints::Constraint;
    use crate::scheme::NodeKey;
    use crate::solvers::pareto::DefaultDominance;

    pub(crate) fn manager(
        ideotype: &str,
        constraints: Vec<Constraint>,
        seeds_per_crossing: Option<u64>,
    ) -> SolutionManager {
        SolutionManager::new(
            Arc::new(parse_genotype(ideotype).unwrap()),
            tools(),
            Constraints::new(constraints).unwrap(),
            Heuristics::default(),
            Vec::new(),
            seeds_per_crossing,
            false,
            Arc::new(DefaultDominance),
            Arc::new(NodeIds::new()),
        )
    }

    #[test]
    fn solutions_enter_the_frontier_once() {
        let m = manager("1/1", vec![], None);
        let s = Arc::new(single_locus_scheme());
        assert!(m.is_solution(&s));
        assert!(m.register_solution(s.clone()));
        assert!(!m.register_solution(Arc::new(s.upward_copy().unwrap())));
        assert_eq!(m.frontier().len(), 1);
        assert!(!m.bound_current_scheme(&s));
        assert!(m.bound_cross_current(&s));
        assert!(m.bound_self_current(&s));
    }

    #[test]
    fn constraints_reject_solutions() {
        let m = manager("1/1", vec![Constraint::MaxTotalPopSize(5)], None);
        let s = Arc::new(single_locus_scheme());
        assert!(!m.register_solution(s.clone()));
        assert!(m.bound_current_scheme(&s));
        let m = manager("1/1", vec![Constraint::MaxGenerations(2)], None);
        assert!(m.register_solution(s));
    }

    #[test]
    fn homozygous_parents_rule() {
        let mut m = manager("1/1", vec![], None);
        m.homozygous_ideotype_parents = true;
        // the selfed parent is heterozygous
        assert!(!m.register_solution(Arc::new(single_locus_scheme())));
    }

    #[test]
    fn ideotype_obtainability() {
        let m = manager("11/11", vec![Constraint::MaxGenerations(2)], None);
        let g = |s: &str| parse_genotype(s).unwrap();
        assert!(m.ideotype_obtainable_from_pair(&g("11/10"), &g("11/01")));
        assert!(!m.ideotype_obtainable_from_pair(&g("10/10"), &g("11/01")));
        assert!(m.ideotype_obtainable_from(&g("10/01")));
        assert!(!m.ideotype_obtainable_from(&g("00/01")));
        assert!(!m.penultimate_generation_reached(0));
        assert!(m.penultimate_generation_reached(1));
        assert!(m.final_generation_reached(2));
        assert!(m.bound_grow_plant_in_generation(&g("11/10"), 2));
        assert!(!m.bound_grow_plant_in_generation(&g("11/11"), 2));
        assert!(m.bound_grow_plant_in_generation(&g("00/01"), 1));
        assert!(!m.bound_grow_plant_in_generation(&Genotype::placeholder(), 2));
    }

    #[test]
    fn homozygous_initial_plants_are_not_selfed() {
        let m = manager("1/1", vec![], None);
        let s = single_locus_scheme();
        let (g, root) = s.graph().upward_copy(s.plants_in_generation(0)[0], false);
        let initial = CrossingScheme::new(g, root, tools()).unwrap();
        assert!(m.bound_self_current(&initial));
        assert!(!m.bound_cross_current(&initial));
    }

    #[test]
    fn filters_respect_constraints() {
        use crate::plants::GeneticMap;
        use crate::solvers::seed_lot_constructor::{DefaultSeedLotConstructor, SeedLotConstructor};
        let c = DefaultSeedLotConstructor::new(Arc::new(GeneticMap::unlinked(&[1])));
        let mut lot = c.self_cross(&parse_genotype("1/0").unwrap()).unwrap();
        // 5 seeds give 0.9 only for probabilities above 0.36
        let m = manager("1/1", vec![Constraint::MaxPopSizePerGeneration(5)], None);
        m.filter_seed_lot(&mut lot);
        assert_eq!(lot.n_genotypes(), 1);
        assert!(lot.can_produce(&parse_genotype("1/0").unwrap()));
    }

    #[test]
    fn no_depleted_lots_without_limit() {
        let s = single_locus_scheme();
        assert!(manager("1/1", vec![], None).depleted_seed_lots(&s).is_empty());
        // the selfing lot yields 9 seeds from one crossing
        let depleted = manager("1/1", vec![], Some(5)).depleted_seed_lots(&s);
        assert_eq!(depleted.len(), 1);
        assert_eq!(s.graph().seed_lot(depleted[0]).id(), 3);
    }

    /// Burns the ids already used by hand-built test schemes.
    fn skip_ids(m: &SolutionManager, n: usize) {
        for _ in 0..n {
            m.ids().next_crossing();
            m.ids().next_plant();
        }
    }

    #[test]
    fn depleted_lot_gets_extra_selfings() {
        let m = manager("1/1", vec![], Some(3));
        skip_ids(&m, 10);
        let mut s = single_locus_scheme();
        assert!(s.resolve_depleted_seed_lots(&m).unwrap());
        let lot = s.seed_lot_with_key(NodeKey::new(3, 0)).unwrap();
        // 9 seeds at 3 per crossing
        assert_eq!(s.graph().seed_lot(lot).parent_crossings().len(), 3);
        assert_eq!(s.num_crossings(), 4);
        assert_eq!(s.total_pop_size(), 12);
        let het = s.plants_in_generation(1)[0];
        assert_eq!(s.graph().plant(het).times_crossed(), 6);
        assert!(m.depleted_seed_lots(&s).is_empty());

        let before = s.num_crossings();
        assert!(s.resolve_depleted_seed_lots(&m).unwrap());
        assert_eq!(s.num_crossings(), before);
    }

    #[test]
    fn crossing_cap_forces_duplicate_parents() {
        use crate::scheme::SchemeGraph;
        let g = |x: &str| Arc::new(parse_genotype(x).unwrap());
        let hom = g("1/1");
        let mut graph = SchemeGraph::new();
        let sa = graph.add_seed_lot(Arc::new(SeedLot::uniform_of((*hom).clone())), 0, 0, 0);
        let sb = graph.add_seed_lot(Arc::new(SeedLot::uniform_of((*hom).clone())), 0, 1, 0);
        let pa = graph.add_plant(hom.clone(), 0, Some(sa), 0, 0);
        let pb = graph.add_plant(hom.clone(), 0, Some(sb), 1, 0);
        let c0 = graph.add_crossing(0, pa, pb).unwrap();
        let s1 = graph.add_seed_lot(Arc::new(SeedLot::uniform_of((*hom).clone())), 1, 2, 0);
        graph.attach_crossing(s1, c0);
        let q1 = graph.add_plant(hom.clone(), 1, Some(s1), 2, 0);
        let q2 = graph.add_plant(hom.clone(), 1, Some(s1), 3, 0);
        let c1 = graph.add_crossing(1, q1, q2).unwrap();
        let s2 = graph.add_seed_lot(Arc::new(SeedLot::uniform_of((*hom).clone())), 2, 3, 0);
        graph.attach_crossing(s2, c1);
        let top = graph.add_plant(hom, 2, Some(s2), 4, 0);
        let mut s = CrossingScheme::new(graph, top, tools()).unwrap();
        assert_eq!(s.graph().seed_lot(s1).total_seeds_taken(), 2);

        let m = manager("1/1", vec![Constraint::MaxCrossingsWithPlant(1)], Some(1));
        skip_ids(&m, 10);
        assert_eq!(m.depleted_seed_lots(&s), vec![s1]);
        assert!(s.resolve_depleted_seed_lots(&m).unwrap());
        assert_eq!(s.max_crossings_with_plant(), 1);
        assert_eq!(s.graph().seed_lot(s1).parent_crossings().len(), 2);
        let gen0 = s.plants_in_generation(0);
        assert_eq!(gen0.len(), 4);
        let duplicates: Vec<_> = gen0
            .iter()
            .map(|&p| s.graph().plant(p))
            .filter(|p| p.duplication() == 1)
            .map(|p| p.id())
            .collect();
        assert_eq!(duplicates.len(), 2);
        assert!(duplicates.contains(&0) && duplicates.contains(&1));
        assert!(m.depleted_seed_lots(&s).is_empty());
    }
}
