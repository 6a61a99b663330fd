use crate::abstract_plants::BioSize;
use crate::error::Result;
use crate::plants::*;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

/// Haplotypes a parent can transmit for one chromosome, with their probabilities.
pub type GameteDistribution = BTreeMap<Haplotype, f64>;

/// Computes the seed lot obtained by crossing two genotypes.
pub trait SeedLotConstructor: Send + Sync + Debug {
    fn cross(&self, g1: &Genotype, g2: &Genotype) -> Result<SeedLot>;

    /// Seed lot restricted to the observable states of `desired`; never cached.
    fn partial_cross(&self, g1: &Genotype, g2: &Genotype, desired: &[&Genotype]) -> Result<SeedLot>;

    fn self_cross(&self, g: &Genotype) -> Result<SeedLot> {
        self.cross(g, g)
    }

    fn partial_self(&self, g: &Genotype, desired: &[&Genotype]) -> Result<SeedLot> {
        self.partial_cross(g, g, desired)
    }

    fn clear_cache(&self);
}

/// Observable state a gamete has to help produce, together with the state of the other
/// parent's chromosome.
#[derive(Debug, Clone, Copy)]
pub struct DesiredObservation<'a> {
    pub desired: &'a ChromosomeState,
    pub other: &'a ChromosomeState,
}

impl DesiredObservation<'_> {
    pub fn allows(&self, locus: usize, allele: bool) -> bool {
        self.desired
            .target(locus)
            .allows(allele, self.other.target(locus))
    }
}

/// Per-genotype cache of gamete distributions, one per chromosome.
#[derive(Debug, Default)]
pub struct GameteCache {
    entries: RwLock<HashMap<Genotype, Arc<Vec<GameteDistribution>>>>,
}

impl GameteCache {
    pub fn get_or_insert_with(
        &self,
        g: &Genotype,
        compute: impl FnOnce() -> Result<Vec<GameteDistribution>>,
    ) -> Result<Arc<Vec<GameteDistribution>>> {
        if let Some(gametes) = self.entries.read().get(g) {
            return Ok(gametes.clone());
        }
        // computed outside the lock, concurrent duplicates are identical
        let gametes = Arc::new(compute()?);
        self.entries.write().insert(g.clone(), gametes.clone());
        Ok(gametes)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

pub fn check_compatibility(map: &GeneticMap, g1: &Genotype, g2: &Genotype) -> Result<()> {
    g1.check_compatible(g2)?;
    map.check_shape(g1)?;
    Ok(())
}

/// Recombination factor when moving from the previous heterozygous locus to `locus`.
pub(crate) fn recombination_factor(
    map: &GeneticMap,
    chrom: usize,
    previous_heterozygous: Option<usize>,
    locus: usize,
    previous_picked: Option<usize>,
    picked: usize,
) -> f64 {
    let r = previous_heterozygous.map_or(0.5, |p| map.r(chrom, p, locus));
    match previous_picked == Some(picked) {
        true => 1.0 - r,
        false => r,
    }
}

struct GameteWalk<'a> {
    map: &'a GeneticMap,
    chrom: &'a DiploidChromosome,
    chrom_index: usize,
    desired: Option<DesiredObservation<'a>>,
    targets: Vec<bool>,
    gametes: GameteDistribution,
}

impl GameteWalk<'_> {
    fn walk(
        &mut self,
        locus: usize,
        p: f64,
        previous_heterozygous: Option<usize>,
        previous_picked: Option<usize>,
    ) -> Result<()> {
        if locus >= self.chrom.n_loci() {
            let h = Haplotype::from_bools(&self.targets)?;
            self.gametes.insert(h, p);
            return Ok(());
        }
        if self.chrom.is_homozygous_at(locus) {
            let allele = self.chrom.haplotype(0).target(locus);
            if self.desired.is_some_and(|d| !d.allows(locus, allele)) {
                return Ok(());
            }
            self.targets.push(allele);
            self.walk(locus + 1, p, previous_heterozygous, previous_picked)?;
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
            self.targets.push(allele);
            self.walk(locus + 1, p * factor, Some(locus), Some(picked))?;
            self.targets.pop();
        }
        Ok(())
    }
}

/// Every gamete `parent` can transmit for chromosome `chrom`, optionally restricted to those
/// that can still produce a desired observation.
pub fn chromosome_gametes(
    map: &GeneticMap,
    parent: &Genotype,
    chrom: usize,
    desired: Option<DesiredObservation<'_>>,
) -> Result<GameteDistribution> {
    let mut walk = GameteWalk {
        map,
        chrom: parent.chromosome(chrom),
        chrom_index: chrom,
        desired,
        targets: Vec::with_capacity(parent.chromosome(chrom).n_loci()),
        gametes: BTreeMap::new(),
    };
    walk.walk(0, 1.0, None, None)?;
    Ok(walk.gametes)
}

/// The unique haplotype of `parent` completing `hap` into the desired chromosome state, and
/// the probability that `parent` transmits it.
pub fn complementary_haplotype(
    map: &GeneticMap,
    parent: &Genotype,
    chrom: usize,
    hap: &Haplotype,
    desired: &ChromosomeState,
) -> Result<(Haplotype, f64)> {
    let c = parent.chromosome(chrom);
    let mut p = 1.0;
    let mut previous_heterozygous = None;
    let mut previous_picked = None;
    let mut targets = Vec::with_capacity(c.n_loci());
    for l in 0..c.n_loci() {
        if c.is_homozygous_at(l) {
            targets.push(c.haplotype(0).target(l));
            continue;
        }
        let comp = (!hap.target(l) && desired.target(l) == TargetState::Once)
            || (hap.target(l) && desired.target(l) == TargetState::Twice);
        let picked = if c.haplotype(0).target(l) == comp { 0 } else { 1 };
        p *= recombination_factor(map, chrom, previous_heterozygous, l, previous_picked, picked);
        previous_picked = Some(picked);
        previous_heterozygous = Some(l);
        targets.push(comp);
    }
    Ok((Haplotype::from_bools(&targets)?, p))
}

/// Pairs the gametes of both parents into diploid chromosomes.
pub fn diploid_options(
    gametes1: &GameteDistribution,
    gametes2: &GameteDistribution,
) -> Result<BTreeMap<DiploidChromosome, f64>> {
    let mut options = BTreeMap::new();
    for (h1, p1) in gametes1 {
        for (h2, p2) in gametes2 {
            let c = DiploidChromosome::new(h1.clone(), h2.clone())?;
            *options.entry(c).or_insert(0.0) += p1 * p2;
        }
    }
    Ok(options)
}

/// Cartesian product of the chromosome options, accumulated into `offspring`.
pub fn combine_chromosomes(
    options: &[BTreeMap<DiploidChromosome, f64>],
    offspring: &mut BTreeMap<Genotype, f64>,
) -> Result<()> {
    let mut partial: Vec<(Vec<DiploidChromosome>, f64)> = vec![(vec![], 1.0)];
    for chrom_options in options {
        partial = partial
            .iter()
            .flat_map(|(chroms, p)| {
                chrom_options.iter().map(move |(c, pc)| {
                    let mut next = chroms.clone();
                    next.push(c.clone());
                    (next, p * pc)
                })
            })
            .collect();
    }
    for (chroms, p) in partial {
        *offspring.entry(Genotype::new(chroms)?).or_insert(0.0) += p;
    }
    Ok(())
}

pub fn is_uniform_cross(g1: &Genotype, g2: &Genotype) -> bool {
    g1.is_homozygous_at_all_target_loci() && g2.is_homozygous_at_all_target_loci()
}

/// Distinct observable states of the desired genotypes.
pub fn desired_observations<'a>(desired: &[&'a Genotype]) -> BTreeSet<&'a ObservableState> {
    desired.iter().map(|g| g.observable_state()).collect()
}

/// Offspring with observable state `obs`, from gametes of `g1` already restricted to `obs`.
pub fn partial_offspring(
    map: &GeneticMap,
    g2: &Genotype,
    obs: &ObservableState,
    gametes1: &[GameteDistribution],
    offspring: &mut BTreeMap<Genotype, f64>,
) -> Result<()> {
    let mut options = Vec::with_capacity(gametes1.len());
    for (c, gametes) in gametes1.iter().enumerate() {
        let mut chrom_options = BTreeMap::new();
        for (h1, p1) in gametes {
            let (h2, p2) = complementary_haplotype(map, g2, c, h1, obs.chromosome(c))?;
            let dc = DiploidChromosome::new(h1.clone(), h2)?;
            *chrom_options.entry(dc).or_insert(0.0) += p1 * p2;
        }
        options.push(chrom_options);
    }
    combine_chromosomes(&options, offspring)
}

/// Exact enumeration of all gametes under the genetic map.
#[derive(Debug)]
pub struct DefaultSeedLotConstructor {
    map: Arc<GeneticMap>,
    cache: GameteCache,
}

impl DefaultSeedLotConstructor {
    pub fn new(map: Arc<GeneticMap>) -> Self {
        Self {
            map,
            cache: GameteCache::default(),
        }
    }

    pub fn map(&self) -> &GeneticMap {
        &self.map
    }

    pub fn gametes_per_chromosome(&self, g: &Genotype) -> Result<Arc<Vec<GameteDistribution>>> {
        self.cache.get_or_insert_with(g, || {
            (0..g.get_n_chrom())
                .map(|c| chromosome_gametes(&self.map, g, c, None))
                .collect()
        })
    }

    pub fn cached_genotypes(&self) -> usize {
        self.cache.len()
    }
}

impl SeedLotConstructor for DefaultSeedLotConstructor {
    fn cross(&self, g1: &Genotype, g2: &Genotype) -> Result<SeedLot> {
        check_compatibility(&self.map, g1, g2)?;
        let gametes1 = self.gametes_per_chromosome(g1)?;
        let gametes2 = self.gametes_per_chromosome(g2)?;
        let options = gametes1
            .iter()
            .zip(gametes2.iter())
            .map(|(x, y)| diploid_options(x, y))
            .collect::<Result<Vec<_>>>()?;
        let mut offspring = BTreeMap::new();
        combine_chromosomes(&options, &mut offspring)?;
        Ok(SeedLot::from_offspring(is_uniform_cross(g1, g2), offspring))
    }

    fn partial_cross(&self, g1: &Genotype, g2: &Genotype, desired: &[&Genotype]) -> Result<SeedLot> {
        check_compatibility(&self.map, g1, g2)?;
        let mut offspring = BTreeMap::new();
        for obs in desired_observations(desired) {
            let gametes1 = (0..g1.get_n_chrom())
                .map(|c| {
                    let d = DesiredObservation {
                        desired: obs.chromosome(c),
                        other: g2.observable_state().chromosome(c),
                    };
                    chromosome_gametes(&self.map, g1, c, Some(d))
                })
                .collect::<Result<Vec<_>>>()?;
            partial_offspring(&self.map, g2, obs, &gametes1, &mut offspring)?;
        }
        Ok(SeedLot::from_offspring(is_uniform_cross(g1, g2), offspring))
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
