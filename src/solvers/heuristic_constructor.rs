use crate::abstract_plants::BioSize;
use crate::error::Result;
use crate::plants::*;
use crate::solvers::seed_lot_constructor::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Seed lot constructor that only keeps gametes improving towards the ideotype.
///
/// A gamete is split into stretches by its crossovers. Each stretch must carry at least one
/// locus where the picked haplotype agrees with one of the ideotype's haplotypes while the
/// other parental haplotype does not. With `consistent` set, all stretches have to improve
/// towards the same ideotype haplotype. `max_crossovers` caps the crossovers per chromosome.
/// Group probabilities of the retained genotypes are recomputed exactly afterwards.
#[derive(Debug)]
pub struct HeuristicSeedLotConstructor {
    map: Arc<GeneticMap>,
    ideotype: Arc<Genotype>,
    max_crossovers: Option<usize>,
    consistent: bool,
    cache: GameteCache,
    exact: DefaultSeedLotConstructor,
}

#[derive(Debug, Clone, Copy)]
struct Improvement {
    current_upper: bool,
    consistent_upper: bool,
    current_lower: bool,
    consistent_lower: bool,
    crossovers: usize,
}

struct HeuristicWalk<'a> {
    map: &'a GeneticMap,
    chrom: &'a DiploidChromosome,
    ideotype: &'a DiploidChromosome,
    chrom_index: usize,
    desired: Option<DesiredObservation<'a>>,
    max_crossovers: Option<usize>,
    consistent: bool,
    targets: Vec<bool>,
    gametes: GameteDistribution,
}

impl HeuristicWalk<'_> {
    fn improvement(&self, target: usize, locus: usize, picked: usize) -> bool {
        let wanted = self.ideotype.haplotype(target).target(locus);
        self.chrom.haplotype(picked).target(locus) == wanted
            && self.chrom.haplotype(1 - picked).target(locus) != wanted
    }

    fn walk(
        &mut self,
        locus: usize,
        p: f64,
        previous_heterozygous: Option<usize>,
        previous_picked: Option<usize>,
        state: Improvement,
    ) -> Result<()> {
        if locus >= self.chrom.n_loci() {
            let upper = state.consistent_upper && state.current_upper;
            let lower = state.consistent_lower && state.current_lower;
            let store = match self.consistent {
                true => upper || lower,
                false => state.current_upper || state.current_lower,
            };
            if store {
                self.gametes.insert(Haplotype::from_bools(&self.targets)?, p);
            }
            return Ok(());
        }
        if self.chrom.is_homozygous_at(locus) {
            let allele = self.chrom.haplotype(0).target(locus);
            if self.desired.is_some_and(|d| !d.allows(locus, allele)) {
                return Ok(());
            }
            self.targets.push(allele);
            self.walk(locus + 1, p, previous_heterozygous, previous_picked, state)?;
            self.targets.pop();
            return Ok(());
        }
        for picked in 0..2 {
            let allele = self.chrom.haplotype(picked).target(locus);
            if self.desired.is_some_and(|d| !d.allows(locus, allele)) {
                continue;
            }
            let factor = recombination_factor(
                self.map,
                self.chrom_index,
                previous_heterozygous,
                locus,
                previous_picked,
                picked,
            );
            // the first heterozygous locus opens a stretch without a crossover
            let (next, bound) = if previous_picked == Some(picked) {
                let next = Improvement {
                    current_upper: state.current_upper || self.improvement(0, locus, picked),
                    current_lower: state.current_lower || self.improvement(1, locus, picked),
                    ..state
                };
                (next, false)
            } else {
                let consistent_upper = state.consistent_upper && state.current_upper;
                let consistent_lower = state.consistent_lower && state.current_lower;
                let crossover = previous_picked.is_some();
                let crossovers = state.crossovers + usize::from(crossover);
                let bound = crossover
                    && (self.max_crossovers.is_some_and(|max| crossovers > max)
                        || match self.consistent {
                            true => !(consistent_upper || consistent_lower),
                            false => !(state.current_upper || state.current_lower),
                        });
                let next = Improvement {
                    current_upper: self.improvement(0, locus, picked),
                    consistent_upper,
                    current_lower: self.improvement(1, locus, picked),
                    consistent_lower,
                    crossovers,
                };
                (next, bound)
            };
            if !bound {
                self.targets.push(allele);
                self.walk(locus + 1, p * factor, Some(locus), Some(picked), next)?;
                self.targets.pop();
            }
        }
        Ok(())
    }
}

impl HeuristicSeedLotConstructor {
    pub fn new(
        map: Arc<GeneticMap>,
        ideotype: Arc<Genotype>,
        max_crossovers: Option<usize>,
        consistent: bool,
    ) -> Self {
        Self {
            exact: DefaultSeedLotConstructor::new(map.clone()),
            map,
            ideotype,
            max_crossovers,
            consistent,
            cache: GameteCache::default(),
        }
    }

    fn chromosome_gametes(
        &self,
        parent: &Genotype,
        chrom: usize,
        desired: Option<DesiredObservation<'_>>,
    ) -> Result<GameteDistribution> {
        let mut walk = HeuristicWalk {
            map: &self.map,
            chrom: parent.chromosome(chrom),
            ideotype: self.ideotype.chromosome(chrom),
            chrom_index: chrom,
            desired,
            max_crossovers: self.max_crossovers,
            consistent: self.consistent,
            targets: Vec::with_capacity(parent.chromosome(chrom).n_loci()),
            gametes: BTreeMap::new(),
        };
        let start = Improvement {
            current_upper: true,
            consistent_upper: true,
            current_lower: true,
            consistent_lower: true,
            crossovers: 0,
        };
        walk.walk(0, 1.0, None, None, start)?;
        Ok(walk.gametes)
    }

    /// Recomputes the groups of the retained genotypes exactly, then drops the others again.
    fn finalise(
        &self,
        g1: &Genotype,
        g2: &Genotype,
        retained: BTreeMap<Genotype, f64>,
    ) -> Result<SeedLot> {
        let desired: Vec<&Genotype> = retained.keys().collect();
        let mut lot = self.exact.partial_cross(g1, g2, &desired)?;
        lot.retain(|g, _| retained.contains_key(g));
        Ok(lot)
    }
}

impl SeedLotConstructor for HeuristicSeedLotConstructor {
    fn cross(&self, g1: &Genotype, g2: &Genotype) -> Result<SeedLot> {
        check_compatibility(&self.map, g1, g2)?;
        self.map.check_shape(self.ideotype.as_ref())?;
        let gametes = |g: &Genotype| {
            self.cache.get_or_insert_with(g, || {
                (0..g.get_n_chrom())
                    .map(|c| self.chromosome_gametes(g, c, None))
                    .collect()
            })
        };
        let gametes1 = gametes(g1)?;
        let gametes2 = gametes(g2)?;
        let options = gametes1
            .iter()
            .zip(gametes2.iter())
            .map(|(x, y)| diploid_options(x, y))
            .collect::<Result<Vec<_>>>()?;
        let mut offspring = BTreeMap::new();
        combine_chromosomes(&options, &mut offspring)?;
        self.finalise(g1, g2, offspring)
    }

    fn partial_cross(&self, g1: &Genotype, g2: &Genotype, desired: &[&Genotype]) -> Result<SeedLot> {
        check_compatibility(&self.map, g1, g2)?;
        self.map.check_shape(self.ideotype.as_ref())?;
        let mut offspring = BTreeMap::new();
        for obs in desired_observations(desired) {
            let gametes1 = (0..g1.get_n_chrom())
                .map(|c| {
                    let d = DesiredObservation {
                        desired: obs.chromosome(c),
                        other: g2.observable_state().chromosome(c),
                    };
                    self.chromosome_gametes(g1, c, Some(d))
                })
                .collect::<Result<Vec<_>>>()?;
            partial_offspring(&self.map, g2, obs, &gametes1, &mut offspring)?;
        }
        self.finalise(g1, g2, offspring)
    }

    fn clear_cache(&self) {
        self.cache.clear();
        self.exact.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;

    fn constructor(max_crossovers: Option<usize>, consistent: bool) -> HeuristicSeedLotConstructor {
        let map = Arc::new(GeneticMap::haldane(vec![vec![10.0, 10.0, 10.0]]).unwrap());
        let ideotype = Arc::new(parse_genotype("1111/1111").unwrap());
        HeuristicSeedLotConstructor::new(map, ideotype, max_crossovers, consistent)
    }

    #[test]
    fn heuristic_lot_is_a_subset_with_exact_ambiguity() {
        let g1 = parse_genotype("1010/0101").unwrap();
        let g2 = parse_genotype("1100/0011").unwrap();
        let exact = DefaultSeedLotConstructor::new(Arc::new(
            GeneticMap::haldane(vec![vec![10.0, 10.0, 10.0]]).unwrap(),
        ))
        .cross(&g1, &g2)
        .unwrap();
        let lot = constructor(None, false).cross(&g1, &g2).unwrap();
        assert!(lot.n_genotypes() > 0);
        assert!(lot.n_genotypes() < exact.n_genotypes());
        for g in lot.genotypes() {
            assert!(exact.can_produce(g));
            let state = g.observable_state();
            assert!((lot.group(state).unwrap().probability() - exact.group(state).unwrap().probability()).abs() < 1e-12);
            assert!((lot.linkage_phase_ambiguity(g) - exact.linkage_phase_ambiguity(g)).abs() < 1e-12);
        }
    }

    #[test]
    fn crossovers_are_capped() {
        let g = parse_genotype("1010/0101").unwrap();
        let c = constructor(Some(1), false);
        let gametes = c.chromosome_gametes(&g, 0, None).unwrap();
        let unlimited = constructor(None, false).chromosome_gametes(&g, 0, None).unwrap();
        assert!(gametes.len() < unlimited.len());
        // alternating haplotypes need three crossovers
        assert!(!gametes.contains_key(&Haplotype::parse("1111").unwrap()));
        assert!(unlimited.contains_key(&Haplotype::parse("1111").unwrap()));
    }

    #[test]
    fn homozygous_parents_keep_their_only_gamete() {
        let c = constructor(Some(0), true);
        let g = parse_genotype("1100/1100").unwrap();
        let gametes = c.chromosome_gametes(&g, 0, None).unwrap();
        assert_eq!(gametes.len(), 1);
        let lot = c
            .cross(&g, &parse_genotype("0011/0011").unwrap())
            .unwrap();
        assert!(lot.is_uniform());
        assert_eq!(lot.n_genotypes(), 1);
    }

    #[test]
    fn first_stretch_must_improve() {
        let ideotype = Arc::new(parse_genotype("1/1").unwrap());
        let c = HeuristicSeedLotConstructor::new(
            Arc::new(GeneticMap::unlinked(&[1])),
            ideotype,
            None,
            false,
        );
        let gametes = c
            .chromosome_gametes(&parse_genotype("1/0").unwrap(), 0, None)
            .unwrap();
        assert_eq!(gametes.len(), 1);
        assert!(gametes.contains_key(&Haplotype::parse("1").unwrap()));

        let ideotype = Arc::new(parse_genotype("11/11").unwrap());
        for consistent in [false, true] {
            let c = HeuristicSeedLotConstructor::new(
                Arc::new(GeneticMap::unlinked(&[2])),
                ideotype.clone(),
                None,
                consistent,
            );
            let gametes = c
                .chromosome_gametes(&parse_genotype("10/01").unwrap(), 0, None)
                .unwrap();
            assert_eq!(gametes.len(), 3);
            assert!(!gametes.contains_key(&Haplotype::parse("00").unwrap()));
        }
    }

    #[test]
    fn partial_cross_towards_ideotype() {
        let c = constructor(None, true);
        let ideotype = parse_genotype("1111/1111").unwrap();
        let g = parse_genotype("1111/0011").unwrap();
        let lot = c.partial_self(&g, &[&ideotype]).unwrap();
        assert!(lot.can_produce(&ideotype));
        assert_eq!(lot.linkage_phase_ambiguity(&ideotype), 0.0);
    }
}
