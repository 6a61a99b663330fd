use crate::plants::Genotype;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// A plant that has to be found among the seeds of a lot: its genotype and the probability
/// of obtaining it from one seed.
#[derive(Debug, Clone, Copy)]
pub struct TargetPlant<'a> {
    pub genotype: &'a Genotype,
    pub probability: f64,
}

/// Turns per-plant success probabilities into seed counts.
pub trait PopulationSizeTools: Send + Sync + Debug {
    /// Overall probability that every target of a scheme is obtained.
    fn success_probability(&self) -> f64;

    /// Success probability imposed on each of `num_targets` plants grown from non-uniform lots.
    fn desired_success_prob_per_target(&self, num_targets: usize) -> f64;

    /// Seeds needed to obtain one plant of probability `probability`.
    fn required_seeds_for_target(&self, probability: f64, num_targets: usize) -> u64;

    /// Seeds needed to obtain all `targets` from one seed lot.
    fn required_seeds_for_targets(&self, targets: &[TargetPlant<'_>], num_targets: usize) -> u64;

    /// Smallest probability a genotype can have and still fit in `max_pop_per_generation`
    /// seeds.
    fn target_prob_lower_bound(&self, max_pop_per_generation: u64) -> f64;

    fn seeds_taken_per_generation(
        &self,
        targets: &BTreeMap<usize, Vec<TargetPlant<'_>>>,
        num_targets: usize,
    ) -> BTreeMap<usize, u64> {
        targets
            .iter()
            .map(|(&gen, ts)| (gen, self.required_seeds_for_targets(ts, num_targets)))
            .collect()
    }
}

/// Splits the success probability equally over the targets: `γ' = γ^(1/k)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultPopulationSizeTools {
    success_probability: f64,
}

impl DefaultPopulationSizeTools {
    pub fn new(success_probability: f64) -> Self {
        Self {
            success_probability,
        }
    }
}

impl PopulationSizeTools for DefaultPopulationSizeTools {
    fn success_probability(&self) -> f64 {
        self.success_probability
    }

    fn desired_success_prob_per_target(&self, num_targets: usize) -> f64 {
        self.success_probability.powf(1.0 / num_targets as f64)
    }

    fn required_seeds_for_target(&self, probability: f64, num_targets: usize) -> u64 {
        let t = (1.0 - self.desired_success_prob_per_target(num_targets)).ln();
        let n = (1.0 - probability).ln();
        if n > -1e-15 {
            return u64::MAX;
        }
        let seeds = (t / n).ceil();
        if seeds.is_nan() {
            return 1;
        }
        // float to int casts saturate
        (seeds as u64).max(1)
    }

    fn required_seeds_for_targets(&self, targets: &[TargetPlant<'_>], num_targets: usize) -> u64 {
        match targets {
            [] => 0,
            [t] => self.required_seeds_for_target(t.probability, num_targets),
            _ => {
                let mut max_seeds = 0;
                let mut sum_seeds: u64 = 0;
                let mut occurrences: BTreeMap<&Genotype, (f64, usize)> = BTreeMap::new();
                for t in targets {
                    let seeds = self.required_seeds_for_target(t.probability, num_targets);
                    max_seeds = max_seeds.max(seeds);
                    sum_seeds = sum_seeds.saturating_add(seeds);
                    occurrences.entry(t.genotype).or_insert((t.probability, 0)).1 += 1;
                }
                let probs: Vec<f64> = occurrences.values().map(|o| o.0).collect();
                let freqs: Vec<usize> = occurrences.values().map(|o| o.1).collect();
                let desired = self
                    .desired_success_prob_per_target(num_targets)
                    .powi(targets.len() as i32);

                let req = max_seeds.max(targets.len() as u64);
                if prob_min_occurrences(&probs, &freqs, req) >= desired {
                    return req;
                }
                let mut lb = req;
                let mut ub = sum_seeds.max(req);
                while ub - lb > 1 {
                    let mid = lb + (ub - lb) / 2;
                    if prob_min_occurrences(&probs, &freqs, mid) >= desired {
                        ub = mid;
                    } else {
                        lb = mid;
                    }
                }
                ub
            }
        }
    }

    fn target_prob_lower_bound(&self, max_pop_per_generation: u64) -> f64 {
        1.0 - (1.0 - self.success_probability).powf(1.0 / max_pop_per_generation as f64)
    }
}

/// Probability that among `n` independent seeds every genotype `i` (drawn with probability
/// `probs[i]`) occurs at least `freqs[i]` times. Computed by inclusion-exclusion over the
/// genotypes that fall short.
pub fn prob_min_occurrences(probs: &[f64], freqs: &[usize], n: u64) -> f64 {
    let d = probs.len();
    let mut total = 0.0;
    for subset in 0..(1u64 << d) {
        let members: Vec<usize> = (0..d).filter(|i| subset & (1 << i) != 0).collect();
        let p_short = prob_all_below(
            &members.iter().map(|&i| probs[i]).collect::<Vec<_>>(),
            &members.iter().map(|&i| freqs[i]).collect::<Vec<_>>(),
            n,
        );
        if members.len() % 2 == 0 {
            total += p_short;
        } else {
            total -= p_short;
        }
    }
    total.clamp(0.0, 1.0)
}

/// Probability that every genotype `i` occurs fewer than `freqs[i]` times among `n` seeds.
fn prob_all_below(probs: &[f64], freqs: &[usize], n: u64) -> f64 {
    let rest = 1.0 - probs.iter().sum::<f64>();
    EventOccurrences::new(freqs.iter().map(|f| f.saturating_sub(1)).collect())
        .map(|ks| multinomial_term(probs, &ks, rest, n))
        .sum()
}

/// Probability of drawing exactly `ks[i]` seeds of each genotype and `n - Σk` of the rest.
fn multinomial_term(probs: &[f64], ks: &[usize], rest: f64, n: u64) -> f64 {
    let k: u64 = ks.iter().map(|&k| k as u64).sum();
    if k > n {
        return 0.0;
    }
    let mut ln_p = 0.0;
    for i in 0..k {
        ln_p += ((n - i) as f64).ln();
    }
    for (&p, &ki) in probs.iter().zip(ks) {
        if ki == 0 {
            continue;
        }
        if p <= 0.0 {
            return 0.0;
        }
        ln_p += ki as f64 * p.ln() - ln_factorial(ki);
    }
    let remaining = n - k;
    if remaining > 0 {
        if rest <= 0.0 {
            return 0.0;
        }
        ln_p += remaining as f64 * rest.ln();
    }
    ln_p.exp()
}

fn ln_factorial(k: usize) -> f64 {
    (2..=k).map(|i| (i as f64).ln()).sum()
}

/// Odometer over every vector `v` with `0 <= v[i] <= bounds[i]`.
#[derive(Debug, Clone)]
pub struct EventOccurrences {
    bounds: Vec<usize>,
    current: Option<Vec<usize>>,
}

impl EventOccurrences {
    pub fn new(bounds: Vec<usize>) -> Self {
        let current = Some(vec![0; bounds.len()]);
        Self { bounds, current }
    }
}

impl Iterator for EventOccurrences {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current.take()?;
        let mut succ = out.clone();
        let mut i = succ.len();
        while i > 0 {
            i -= 1;
            if succ[i] < self.bounds[i] {
                succ[i] += 1;
                for x in succ.iter_mut().skip(i + 1) {
                    *x = 0;
                }
                self.current = Some(succ);
                break;
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;

    #[test]
    fn single_target_seeds() {
        let tools = DefaultPopulationSizeTools::new(0.9);
        assert_eq!(tools.required_seeds_for_target(0.25, 1), 9);
        assert_eq!(tools.required_seeds_for_target(1.0, 1), 1);
        assert_eq!(tools.required_seeds_for_target(0.5, 1), 4);
        // more targets make each one harder to miss
        assert!(tools.required_seeds_for_target(0.25, 3) > 9);
    }

    #[test]
    fn vanishing_probability_saturates() {
        let tools = DefaultPopulationSizeTools::new(0.9);
        assert_eq!(tools.required_seeds_for_target(0.0, 1), u64::MAX);
        assert_eq!(tools.required_seeds_for_target(1e-18, 1), u64::MAX);
        let g = parse_genotype("1/1").unwrap();
        let targets = [
            TargetPlant {
                genotype: &g,
                probability: 0.0,
            },
            TargetPlant {
                genotype: &g,
                probability: 0.0,
            },
        ];
        assert_eq!(tools.required_seeds_for_targets(&targets, 2), u64::MAX);
    }

    #[test]
    fn min_occurrences_of_one_genotype() {
        let p = prob_min_occurrences(&[0.25], &[1], 9);
        assert!((p - (1.0 - 0.75f64.powi(9))).abs() < 1e-12);
        // at least twice: 1 - P(0) - P(1)
        let p = prob_min_occurrences(&[0.5], &[2], 4);
        assert!((p - (1.0 - 0.0625 - 4.0 * 0.0625)).abs() < 1e-12);
        assert!(prob_min_occurrences(&[0.5], &[3], 2) < 1e-12);
    }

    #[test]
    fn min_occurrences_of_two_genotypes() {
        // both outcomes of a fair coin in 3 throws: 1 - 2 * 1/8
        let p = prob_min_occurrences(&[0.5, 0.5], &[1, 1], 3);
        assert!((p - 0.75).abs() < 1e-12);
    }

    #[test]
    fn several_targets_need_at_least_as_many_seeds() {
        let tools = DefaultPopulationSizeTools::new(0.9);
        let x = parse_genotype("11/11").unwrap();
        let y = parse_genotype("00/00").unwrap();
        let one = tools.required_seeds_for_target(0.25, 2);
        let targets = [
            TargetPlant {
                genotype: &x,
                probability: 0.25,
            },
            TargetPlant {
                genotype: &y,
                probability: 0.25,
            },
        ];
        let both = tools.required_seeds_for_targets(&targets, 2);
        assert!(both >= one);
        assert!(both <= 2 * one);
        let desired = tools.desired_success_prob_per_target(2).powi(2);
        assert!(prob_min_occurrences(&[0.25, 0.25], &[1, 1], both) >= desired);
        assert!(prob_min_occurrences(&[0.25, 0.25], &[1, 1], both - 1) < desired || both == one);
    }

    #[test]
    fn duplicate_targets_of_a_uniform_lot() {
        let tools = DefaultPopulationSizeTools::new(0.9);
        let x = parse_genotype("11/11").unwrap();
        let t = TargetPlant {
            genotype: &x,
            probability: 1.0,
        };
        assert_eq!(tools.required_seeds_for_targets(&[t, t, t], 1), 3);
    }

    #[test]
    fn lower_bound_fits_population() {
        let tools = DefaultPopulationSizeTools::new(0.9);
        let p = tools.target_prob_lower_bound(9);
        assert!(tools.required_seeds_for_target(p + 1e-9, 1) <= 9);
        assert!(tools.required_seeds_for_target(p * 0.9, 1) > 9);
    }

    #[test]
    fn odometer_enumerates_all_vectors() {
        let all: Vec<Vec<usize>> = EventOccurrences::new(vec![1, 2]).collect();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], vec![0, 0]);
        assert_eq!(all[1], vec![0, 1]);
        assert_eq!(all[3], vec![1, 0]);
        assert_eq!(all[5], vec![1, 2]);
        assert_eq!(EventOccurrences::new(vec![]).count(), 1);
    }
}
