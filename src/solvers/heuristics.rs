use crate::abstract_plants::Dominance;
use crate::plants::{DiploidChromosome, Genotype, Haplotype, SeedLot};
use crate::scheme::{CrossingScheme, CrossingSchemeDescriptor, PlantDescriptor};
use crate::solvers::pareto::ParetoFrontier;
use itertools::Itertools;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

/// Optional bounding rules on top of the exact bounds of the solution manager.
///
/// Every query answers "do not bound" and every extension leaves the bounds untouched unless
/// an implementation overrides it.
#[allow(unused_variables)]
pub trait Heuristic: Send + Sync + Debug {
    fn bound_cross_current(&self, scheme: &CrossingScheme) -> bool {
        false
    }

    fn extend_bounds_upon_crossing(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        bounds
    }

    fn bound_cross_with_specific_other(
        &self,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
    ) -> bool {
        false
    }

    fn extend_bounds_upon_crossing_with_specific_other(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        bounds
    }

    fn bound_cross_with_specific_other_with_target(
        &self,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> bool {
        false
    }

    fn extend_bounds_upon_crossing_with_target(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> CrossingSchemeDescriptor {
        bounds
    }

    fn bound_self_current(&self, scheme: &CrossingScheme) -> bool {
        false
    }

    fn extend_bounds_upon_selfing(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        bounds
    }

    fn bound_self_with_target(&self, scheme: &CrossingScheme, target: &PlantDescriptor) -> bool {
        false
    }

    fn extend_bounds_upon_selfing_with_target(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> CrossingSchemeDescriptor {
        bounds
    }

    fn bound_current(&self, scheme: &CrossingScheme) -> bool {
        false
    }

    fn extend_bounds_for_current(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        bounds
    }

    fn bound_grow_plant_from_ancestors(
        &self,
        ancestors: &HashSet<PlantDescriptor>,
        plant: &PlantDescriptor,
    ) -> bool {
        false
    }

    fn bound_grow_plant_in_generation(&self, genotype: &Genotype, generation: usize) -> bool {
        false
    }

    fn bound_queue(&self, scheme: &Arc<CrossingScheme>) -> bool {
        false
    }

    fn bound_dequeue(&self, scheme: &CrossingScheme) -> bool {
        false
    }
}

/// A list of heuristics: the first one that bounds wins, bound extensions are applied in turn.
#[derive(Debug, Clone, Default)]
pub struct Heuristics(Vec<Arc<dyn Heuristic>>);

impl Heuristics {
    pub fn new(heuristics: Vec<Arc<dyn Heuristic>>) -> Self {
        Self(heuristics)
    }

    pub fn push(&mut self, heuristic: Arc<dyn Heuristic>) {
        self.0.push(heuristic);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn any(&self, f: impl Fn(&dyn Heuristic) -> bool) -> bool {
        self.0.iter().any(|h| f(h.as_ref()))
    }

    fn fold(
        &self,
        bounds: CrossingSchemeDescriptor,
        f: impl Fn(&dyn Heuristic, CrossingSchemeDescriptor) -> CrossingSchemeDescriptor,
    ) -> CrossingSchemeDescriptor {
        self.0.iter().fold(bounds, |b, h| f(h.as_ref(), b))
    }
}

impl Heuristic for Heuristics {
    fn bound_cross_current(&self, scheme: &CrossingScheme) -> bool {
        self.any(|h| h.bound_cross_current(scheme))
    }

    fn extend_bounds_upon_crossing(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        self.fold(bounds, |h, b| h.extend_bounds_upon_crossing(b, scheme))
    }

    fn bound_cross_with_specific_other(
        &self,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
    ) -> bool {
        self.any(|h| h.bound_cross_with_specific_other(scheme, other))
    }

    fn extend_bounds_upon_crossing_with_specific_other(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        self.fold(bounds, |h, b| {
            h.extend_bounds_upon_crossing_with_specific_other(b, scheme, other)
        })
    }

    fn bound_cross_with_specific_other_with_target(
        &self,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> bool {
        self.any(|h| h.bound_cross_with_specific_other_with_target(scheme, other, target))
    }

    fn extend_bounds_upon_crossing_with_target(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
        other: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> CrossingSchemeDescriptor {
        self.fold(bounds, |h, b| {
            h.extend_bounds_upon_crossing_with_target(b, scheme, other, target)
        })
    }

    fn bound_self_current(&self, scheme: &CrossingScheme) -> bool {
        self.any(|h| h.bound_self_current(scheme))
    }

    fn extend_bounds_upon_selfing(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        self.fold(bounds, |h, b| h.extend_bounds_upon_selfing(b, scheme))
    }

    fn bound_self_with_target(&self, scheme: &CrossingScheme, target: &PlantDescriptor) -> bool {
        self.any(|h| h.bound_self_with_target(scheme, target))
    }

    fn extend_bounds_upon_selfing_with_target(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
        target: &PlantDescriptor,
    ) -> CrossingSchemeDescriptor {
        self.fold(bounds, |h, b| {
            h.extend_bounds_upon_selfing_with_target(b, scheme, target)
        })
    }

    fn bound_current(&self, scheme: &CrossingScheme) -> bool {
        self.any(|h| h.bound_current(scheme))
    }

    fn extend_bounds_for_current(
        &self,
        bounds: CrossingSchemeDescriptor,
        scheme: &CrossingScheme,
    ) -> CrossingSchemeDescriptor {
        self.fold(bounds, |h, b| h.extend_bounds_for_current(b, scheme))
    }

    fn bound_grow_plant_from_ancestors(
        &self,
        ancestors: &HashSet<PlantDescriptor>,
        plant: &PlantDescriptor,
    ) -> bool {
        self.any(|h| h.bound_grow_plant_from_ancestors(ancestors, plant))
    }

    fn bound_grow_plant_in_generation(&self, genotype: &Genotype, generation: usize) -> bool {
        self.any(|h| h.bound_grow_plant_in_generation(genotype, generation))
    }

    fn bound_queue(&self, scheme: &Arc<CrossingScheme>) -> bool {
        self.any(|h| h.bound_queue(scheme))
    }

    fn bound_dequeue(&self, scheme: &CrossingScheme) -> bool {
        self.any(|h| h.bound_dequeue(scheme))
    }
}

/// Keeps one Pareto frontier per final-plant genotype. A scheme is only queued when it enters
/// the frontier of its genotype, and dropped on dequeue once it has been evicted from it.
pub struct OptimalSubschemeHeuristic {
    dominance: Arc<dyn Dominance<CrossingSchemeDescriptor>>,
    frontiers: Mutex<HashMap<Arc<Genotype>, Arc<ParetoFrontier<CrossingScheme>>>>,
}

impl Debug for OptimalSubschemeHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimalSubschemeHeuristic")
            .field("genotypes", &self.frontiers.lock().len())
            .finish()
    }
}

impl OptimalSubschemeHeuristic {
    pub fn new(dominance: Arc<dyn Dominance<CrossingSchemeDescriptor>>) -> Self {
        Self {
            dominance,
            frontiers: Mutex::new(HashMap::new()),
        }
    }

    fn frontier(&self, genotype: &Arc<Genotype>) -> Arc<ParetoFrontier<CrossingScheme>> {
        self.frontiers
            .lock()
            .entry(genotype.clone())
            .or_insert_with(|| Arc::new(ParetoFrontier::new(self.dominance.clone())))
            .clone()
    }
}

impl Heuristic for OptimalSubschemeHeuristic {
    fn bound_queue(&self, scheme: &Arc<CrossingScheme>) -> bool {
        !self.frontier(scheme.final_genotype()).register(scheme.clone())
    }

    fn bound_dequeue(&self, scheme: &CrossingScheme) -> bool {
        !self.frontier(scheme.final_genotype()).contains(scheme)
    }
}

/// Only grows plants that improve on every ancestor towards the ideotype.
#[derive(Debug, Clone)]
pub struct ImprovementOverAncestorsHeuristic {
    ideotype: Arc<Genotype>,
}

impl ImprovementOverAncestorsHeuristic {
    pub fn new(ideotype: Arc<Genotype>) -> Self {
        Self { ideotype }
    }

    /// `genotype` improves on `other` when one of its chromosomes carries a haplotype agreeing
    /// with an ideotype haplotype on a set of loci that no haplotype of `other` covers.
    pub fn improves_on(&self, genotype: &Genotype, other: &Genotype) -> bool {
        itertools::izip!(
            genotype.chromosomes(),
            other.chromosomes(),
            self.ideotype.chromosomes()
        )
        .any(|(chrom, other_chrom, ideal)| {
            ideal
                .haplotypes()
                .iter()
                .any(|target| improves_in_chromosome(chrom, other_chrom, target))
        })
    }
}

fn agreement(h: &Haplotype, target: &Haplotype) -> Vec<bool> {
    h.iter().zip(target.iter()).map(|(a, b)| a == b).collect()
}

fn improves_in_chromosome(
    chrom: &DiploidChromosome,
    other: &DiploidChromosome,
    target: &Haplotype,
) -> bool {
    chrom.haplotypes().iter().any(|h| {
        let mine = agreement(h, target);
        other.haplotypes().iter().all(|o| {
            let theirs = agreement(o, target);
            mine.iter().zip(&theirs).any(|(&m, &t)| m && !t)
        })
    })
}

impl Heuristic for ImprovementOverAncestorsHeuristic {
    fn bound_grow_plant_from_ancestors(
        &self,
        ancestors: &HashSet<PlantDescriptor>,
        plant: &PlantDescriptor,
    ) -> bool {
        ancestors
            .iter()
            .any(|a| !self.improves_on(&plant.genotype, &a.genotype))
    }
}

/// Removes genotypes from a freshly constructed seed lot before the search considers them.
pub trait SeedLotFilter: Send + Sync + Debug {
    fn filter(&self, lot: &mut SeedLot);
}

/// Drops genotypes whose phase-known probability is below `min_probability`.
#[derive(Debug, Clone, Copy)]
pub struct MinProbabilityFilter {
    pub min_probability: f64,
}

impl SeedLotFilter for MinProbabilityFilter {
    fn filter(&self, lot: &mut SeedLot) {
        let min = self.min_probability;
        lot.retain(|g, lot| lot.probability_of_phase_known(g) >= min);
    }
}

/// Filters the initial plants of a search.
pub trait PlantCollectionFilter: Send + Sync + Debug {
    fn filter(&self, plants: Vec<Genotype>) -> Vec<Genotype>;
}

/// Keeps the first occurrence of every genotype.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicatePlantFilter;

impl PlantCollectionFilter for DuplicatePlantFilter {
    fn filter(&self, plants: Vec<Genotype>) -> Vec<Genotype> {
        plants.into_iter().unique().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;
    use crate::plants::GeneticMap;
    use crate::scheme::crossing_scheme::tests::single_locus_scheme;
    use crate::solvers::pareto::DefaultDominance;
    use crate::solvers::seed_lot_constructor::{DefaultSeedLotConstructor, SeedLotConstructor};

    fn descriptor(s: &str) -> PlantDescriptor {
        PlantDescriptor {
            genotype: Arc::new(parse_genotype(s).unwrap()),
            probability: 1.0,
            linkage_phase_ambiguity: 0.0,
            uniform_parent: true,
        }
    }

    #[test]
    fn improvement_needs_uncovered_agreement() {
        let h = ImprovementOverAncestorsHeuristic::new(Arc::new(parse_genotype("11/11").unwrap()));
        let g = |s: &str| parse_genotype(s).unwrap();
        assert!(h.improves_on(&g("11/00"), &g("10/01")));
        assert!(!h.improves_on(&g("10/00"), &g("10/01")));
        assert!(!h.improves_on(&g("10/01"), &g("10/01")));
        let ancestors: HashSet<_> = [descriptor("10/10"), descriptor("01/01")].into();
        assert!(!h.bound_grow_plant_from_ancestors(&ancestors, &descriptor("11/00")));
        assert!(h.bound_grow_plant_from_ancestors(&ancestors, &descriptor("10/00")));
    }

    #[test]
    fn heuristics_compose() {
        let ideotype = Arc::new(parse_genotype("11/11").unwrap());
        let mut hs = Heuristics::default();
        assert!(!hs.bound_grow_plant_from_ancestors(&HashSet::new(), &descriptor("00/00")));
        hs.push(Arc::new(ImprovementOverAncestorsHeuristic::new(ideotype)));
        let ancestors: HashSet<_> = [descriptor("11/00")].into();
        assert!(hs.bound_grow_plant_from_ancestors(&ancestors, &descriptor("10/00")));
        assert_eq!(hs.len(), 1);
    }

    #[test]
    fn optimal_subschemes_reject_equal_and_evicted_schemes() {
        let h = OptimalSubschemeHeuristic::new(Arc::new(DefaultDominance));
        let s = Arc::new(single_locus_scheme());
        assert!(!h.bound_queue(&s));
        assert!(!h.bound_dequeue(&s));
        let copy = Arc::new(s.upward_copy().unwrap());
        assert!(h.bound_queue(&copy));
    }

    #[test]
    fn min_probability_filter_drops_rare_genotypes() {
        let constructor = DefaultSeedLotConstructor::new(Arc::new(GeneticMap::unlinked(&[1])));
        let mut lot = constructor
            .self_cross(&parse_genotype("1/0").unwrap())
            .unwrap();
        assert_eq!(lot.n_genotypes(), 3);
        MinProbabilityFilter {
            min_probability: 0.3,
        }
        .filter(&mut lot);
        assert!(!lot.can_produce(&parse_genotype("1/1").unwrap()));
        assert!(!lot.can_produce(&parse_genotype("0/0").unwrap()));
        assert!(lot.can_produce(&parse_genotype("1/0").unwrap()));
    }

    #[test]
    fn duplicate_plants_keep_first_occurrence() {
        let plants = vec![
            parse_genotype("10/10").unwrap(),
            parse_genotype("01/01").unwrap(),
            parse_genotype("10/10").unwrap(),
        ];
        let filtered = DuplicatePlantFilter.filter(plants);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0], parse_genotype("10/10").unwrap());
    }
}
