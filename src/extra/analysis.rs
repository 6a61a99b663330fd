use crate::scheme::{CrossingScheme, SeedLotIx};
use crate::solvers::pareto::ParetoFrontier;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

/// Formats a duration as `1h 02m 03.456s`, leaving out leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let (h, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (m, rest) = (rest / 60_000, rest % 60_000);
    let (s, ms) = (rest / 1000, rest % 1000);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}.{ms:03}s")
    } else if m > 0 {
        format!("{m}m {s:02}.{ms:03}s")
    } else {
        format!("{s}.{ms:03}s")
    }
}

/// Formats a probability as a percentage with at most two decimals, rounded up. Values that
/// would round up to 100% but are below 1 are shown as `> 99.99%`.
pub fn format_percentage(p: f64) -> String {
    let hundredths = (p * 10_000.0).ceil();
    if hundredths >= 10_000.0 && p < 1.0 {
        return "> 99.99%".to_owned();
    }
    let s = format!("{:.2}", hundredths / 100.0);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{s}%")
}

/// Human readable account of a scheme, generation by generation.
pub fn scheme_report(scheme: &CrossingScheme) -> String {
    let graph = scheme.graph();
    let mut lot_names = BTreeMap::new();
    for generation in 0..=scheme.num_generations() {
        for &lot in scheme.seed_lots_in_generation(generation) {
            let n = lot_names.len() + 1;
            lot_names.entry(lot).or_insert(format!("S{n}"));
        }
    }
    let lot_name = |lot: SeedLotIx| lot_names.get(&lot).map_or("?", String::as_str);

    let mut out = String::new();
    // writing to a String cannot fail
    let _ = writeln!(
        out,
        "generations: {}, crossings: {}, plants: {}, max plants per generation: {}, LPA: {}",
        scheme.num_generations(),
        scheme.num_crossings(),
        scheme.total_pop_size(),
        scheme.max_pop_per_generation(),
        format_percentage(scheme.linkage_phase_ambiguity())
    );
    for generation in 0..=scheme.num_generations() {
        let pop = scheme
            .pop_per_generation()
            .get(generation)
            .copied()
            .unwrap_or(0);
        let _ = writeln!(out, "generation {generation} ({pop} plants)");
        for &lot in scheme.seed_lots_in_generation(generation) {
            let node = graph.seed_lot(lot);
            let origin = if node.is_initial() {
                "initial".to_owned()
            } else {
                node.parent_crossings()
                    .iter()
                    .map(|&c| graph.crossing(c).unique_id())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(
                out,
                "  {} <- {} ({} genotypes)",
                lot_name(lot),
                origin,
                node.seed_lot().n_genotypes()
            );
        }
        for &plant in scheme.plants_in_generation(generation) {
            let node = graph.plant(plant);
            let _ = write!(out, "  {} [{}]", node.unique_id(), node.genotype());
            if let Some(lot) = node.parent() {
                let _ = write!(
                    out,
                    " from {}, {} seeds",
                    lot_name(lot),
                    graph.seed_lot(lot).seeds_taken_from_generation(generation)
                );
            }
            let lpa = scheme.plant_lpa(plant);
            if lpa > 0.0 {
                let _ = write!(out, ", LPA {}", format_percentage(lpa));
            }
            out.push('\n');
        }
        for &crossing in scheme.crossings_in_generation(generation) {
            let node = graph.crossing(crossing);
            let (p1, p2) = node.parents();
            let child = node.child().map_or("-", lot_name);
            let op = if node.is_selfing() { "selfed" } else { "x" };
            if node.is_selfing() {
                let _ = writeln!(
                    out,
                    "  {}: {} {op} -> {child}",
                    node.unique_id(),
                    graph.plant(p1).unique_id()
                );
            } else {
                let _ = writeln!(
                    out,
                    "  {}: {} {op} {} -> {child}",
                    node.unique_id(),
                    graph.plant(p1).unique_id(),
                    graph.plant(p2).unique_id()
                );
            }
        }
    }
    out
}

/// One line per solution, grouped by number of generations.
pub fn frontier_report(frontier: &ParetoFrontier<CrossingScheme>) -> String {
    let mut out = String::new();
    for (generations, schemes) in frontier.grouped_by_generations() {
        let _ = writeln!(out, "{generations} generation(s): {} scheme(s)", schemes.len());
        for s in schemes {
            let _ = writeln!(
                out,
                "  plants: {}, max per generation: {}, crossings: {}, LPA: {}",
                s.total_pop_size(),
                s.max_pop_per_generation(),
                s.num_crossings(),
                format_percentage(s.linkage_phase_ambiguity())
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::crossing_scheme::tests::single_locus_scheme;
    use crate::solvers::pareto::DefaultDominance;
    use std::sync::Arc;

    #[test]
    fn elapsed_units() {
        assert_eq!(format_elapsed(Duration::from_millis(1234)), "1.234s");
        assert_eq!(format_elapsed(Duration::from_millis(61_005)), "1m 01.005s");
        assert_eq!(
            format_elapsed(Duration::from_secs(3600 + 120 + 3)),
            "1h 02m 03.000s"
        );
    }

    #[test]
    fn percentages_round_up() {
        assert_eq!(format_percentage(0.0), "0%");
        assert_eq!(format_percentage(0.5), "50%");
        assert_eq!(format_percentage(0.12341), "12.35%");
        assert_eq!(format_percentage(0.999999), "> 99.99%");
        assert_eq!(format_percentage(1.0), "100%");
    }

    #[test]
    fn report_lists_every_generation() {
        let scheme = single_locus_scheme();
        let report = scheme_report(&scheme);
        let header = report.lines().next().unwrap();
        assert!(header.starts_with("generations: 2"));
        for g in 0..=2 {
            assert!(report.contains(&format!("generation {g} (")));
        }
        assert!(report.contains("initial"));
        assert!(report.contains("selfed"));
    }

    #[test]
    fn frontier_summary_groups_by_generations() {
        let frontier: ParetoFrontier<CrossingScheme> =
            ParetoFrontier::new(Arc::new(DefaultDominance));
        frontier.register(Arc::new(single_locus_scheme()));
        let report = frontier_report(&frontier);
        assert!(report.starts_with("2 generation(s): 1 scheme(s)"));
    }
}
