use crate::plants::genotype::{Genotype, ObservableState};
use std::collections::BTreeMap;

/// Child genotypes sharing one observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeGroup {
    probability: f64,
    genotypes: BTreeMap<Genotype, f64>,
}

impl GenotypeGroup {
    pub fn new(probability: f64, genotypes: BTreeMap<Genotype, f64>) -> Self {
        Self {
            probability,
            genotypes,
        }
    }

    /// Probability of observing this state among the seeds.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Probability of the phase-known genotype `g`; 0 when absent.
    pub fn probability_of_phase_known(&self, g: &Genotype) -> f64 {
        self.genotypes.get(g).copied().unwrap_or(0.0)
    }

    /// Probability that a seed of this state does not have the phase of `g`.
    pub fn linkage_phase_ambiguity(&self, g: &Genotype) -> f64 {
        if self.probability <= 0.0 {
            return 1.0;
        }
        1.0 - self.probability_of_phase_known(g) / self.probability
    }

    pub fn genotypes(&self) -> impl Iterator<Item = &Genotype> {
        self.genotypes.keys()
    }

    pub fn phase_known(&self) -> &BTreeMap<Genotype, f64> {
        &self.genotypes
    }

    pub fn contains(&self, g: &Genotype) -> bool {
        self.genotypes.contains_key(g)
    }

    pub fn n_genotypes(&self) -> usize {
        self.genotypes.len()
    }

    fn remove(&mut self, g: &Genotype) -> bool {
        self.genotypes.remove(g).is_some()
    }
}

/// Possible offspring of one crossing, grouped by observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedLot {
    uniform: bool,
    groups: BTreeMap<ObservableState, GenotypeGroup>,
}

impl SeedLot {
    pub fn new(uniform: bool, groups: BTreeMap<ObservableState, GenotypeGroup>) -> Self {
        Self { uniform, groups }
    }

    /// Seed lot of a fully homozygous plant: a single genotype with probability 1.
    pub fn uniform_of(genotype: Genotype) -> Self {
        let state = genotype.observable_state().clone();
        let genotypes = BTreeMap::from([(genotype, 1.0)]);
        Self {
            uniform: true,
            groups: BTreeMap::from([(state, GenotypeGroup::new(1.0, genotypes))]),
        }
    }

    /// Groups phase-known offspring by observable state.
    pub fn from_offspring(uniform: bool, offspring: impl IntoIterator<Item = (Genotype, f64)>) -> Self {
        let mut groups: BTreeMap<ObservableState, GenotypeGroup> = BTreeMap::new();
        for (g, p) in offspring {
            let group = groups
                .entry(g.observable_state().clone())
                .or_insert_with(|| GenotypeGroup::new(0.0, BTreeMap::new()));
            group.probability += p;
            *group.genotypes.entry(g).or_insert(0.0) += p;
        }
        Self { uniform, groups }
    }

    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    pub fn groups(&self) -> &BTreeMap<ObservableState, GenotypeGroup> {
        &self.groups
    }

    pub fn group(&self, state: &ObservableState) -> Option<&GenotypeGroup> {
        self.groups.get(state)
    }

    pub fn genotypes(&self) -> impl Iterator<Item = &Genotype> {
        self.groups.values().flat_map(|gr| gr.genotypes())
    }

    pub fn n_genotypes(&self) -> usize {
        self.groups.values().map(|gr| gr.n_genotypes()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn can_produce(&self, g: &Genotype) -> bool {
        self.group(g.observable_state())
            .is_some_and(|gr| gr.contains(g))
    }

    pub fn probability_of_phase_known(&self, g: &Genotype) -> f64 {
        self.group(g.observable_state())
            .map_or(0.0, |gr| gr.probability_of_phase_known(g))
    }

    pub fn linkage_phase_ambiguity(&self, g: &Genotype) -> f64 {
        self.group(g.observable_state())
            .map_or(1.0, |gr| gr.linkage_phase_ambiguity(g))
    }

    /// Removes `g`, dropping its group when it becomes empty. Returns whether `g` was present.
    pub fn filter_genotype(&mut self, g: &Genotype) -> bool {
        let state = g.observable_state();
        let Some(group) = self.groups.get_mut(state) else {
            return false;
        };
        let removed = group.remove(g);
        if group.n_genotypes() == 0 {
            self.groups.remove(state);
        }
        removed
    }

    /// Keeps only the genotypes for which `keep` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&Genotype, &Self) -> bool) {
        let dropped: Vec<Genotype> = self
            .genotypes()
            .filter(|g| !keep(g, self))
            .cloned()
            .collect();
        for g in dropped {
            self.filter_genotype(&g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;

    fn lot() -> SeedLot {
        SeedLot::from_offspring(
            false,
            vec![
                (parse_genotype("11/00").unwrap(), 0.2),
                (parse_genotype("10/01").unwrap(), 0.05),
                (parse_genotype("11/11").unwrap(), 0.25),
                (parse_genotype("00/00").unwrap(), 0.5),
            ],
        )
    }

    #[test]
    fn linkage_phase_ambiguity_of_groups() {
        let lot = lot();
        assert_eq!(lot.groups().len(), 3);
        let x = parse_genotype("11/00").unwrap();
        let group = lot.group(x.observable_state()).unwrap();
        assert!((group.probability() - 0.25).abs() < 1e-12);
        assert!((lot.linkage_phase_ambiguity(&x) - 0.2).abs() < 1e-12);
        assert_eq!(lot.linkage_phase_ambiguity(&parse_genotype("11/11").unwrap()), 0.0);
        assert_eq!(lot.probability_of_phase_known(&parse_genotype("01/01").unwrap()), 0.0);
        assert!(!lot.is_uniform());
    }

    #[test]
    fn filtering_genotypes() {
        let mut lot = lot();
        assert!(!lot.filter_genotype(&parse_genotype("01/01").unwrap()));
        assert_eq!(lot.n_genotypes(), 4);
        assert!(lot.filter_genotype(&parse_genotype("11/11").unwrap()));
        assert_eq!(lot.n_genotypes(), 3);
        assert_eq!(lot.groups().len(), 2);
        // the group probability is kept so the ambiguity stays exact
        let x = parse_genotype("11/00").unwrap();
        lot.filter_genotype(&parse_genotype("10/01").unwrap());
        assert!((lot.linkage_phase_ambiguity(&x) - 0.2).abs() < 1e-12);
        lot.retain(|g, lot| lot.probability_of_phase_known(g) > 0.3);
        assert_eq!(lot.n_genotypes(), 1);
        assert!(lot.can_produce(&parse_genotype("00/00").unwrap()));
    }

    #[test]
    fn uniform_lot_has_one_certain_genotype() {
        let g = parse_genotype("11/11 0/0").unwrap();
        let lot = SeedLot::uniform_of(g.clone());
        assert!(lot.is_uniform());
        assert_eq!(lot.probability_of_phase_known(&g), 1.0);
        assert_eq!(lot.linkage_phase_ambiguity(&g), 0.0);
    }
}
