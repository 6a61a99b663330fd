use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use svg::node::element::Group;
use svg::node::element::Rectangle;
use svg::Document;

use crate::abstract_plants::*;
use crate::config::Settings;
use crate::error::{Result, SearchError};
use crate::extra::analysis::{format_percentage, scheme_report};
use crate::plants::{DiploidChromosome, Genotype, Haplotype};
use crate::scheme::{CrossingScheme, CrossingSchemeDescriptor, PlantIx, SeedLotIx};

fn allele_colour(allele: Allele) -> &'static str {
    match allele {
        Allele::O => "yellow",
        Allele::Z => "blue",
    }
}

pub fn draw_gen_base<A, B>(x: &A, offset: (i32, i32)) -> Group
where
    A: Diploid<B>,
    B: BioSize + Haploid,
{
    Group::new()
        .add(draw_gam_base::<B>(x.upper(), (offset.0, offset.1)))
        .add(draw_gam_base::<B>(x.lower(), (offset.0, offset.1 + BLOCKSIZE as i32)))
}

pub fn draw_gam_base<B>(x: &B, offset: (i32, i32)) -> Group
where
    B: BioSize + Haploid,
{
    let size = BLOCKSIZE as i32;
    x.alleles()
        .iter()
        .enumerate()
        .map(|(i, a)| {
            Rectangle::new()
                .set("width", size)
                .set("height", size)
                .set("x", (i as i32) * size + offset.0)
                .set("y", offset.1)
                .set("stroke", "black")
                .set("fill", allele_colour(*a))
        })
        .fold(Group::new(), |d, square| d.add(square))
}

pub const BLOCKSIZE: usize = 10;
/// Horizontal space between the chromosomes of a drawn genotype.
pub const CHROMOSOME_GAP: usize = BLOCKSIZE;

pub trait Draw {
    /// Returns (width, height) of the viewBox needed to contain self.
    fn view_box_size(&self) -> Option<(usize, usize)>;

    fn draw(&self) -> Group;

    fn draw_to_file(&self, path: &Path) -> io::Result<()> {
        let out = match self.view_box_size() {
            None => Document::new().add(self.draw()),
            Some((w, h)) => Document::new()
                .set("viewBox", (0, 0, w, h))
                .add(self.draw()),
        };
        svg::save(path, &out)
    }
}

impl Draw for Haplotype {
    fn view_box_size(&self) -> Option<(usize, usize)> {
        Some((self.n_targets() * BLOCKSIZE, BLOCKSIZE))
    }

    fn draw(&self) -> Group {
        draw_gam_base(self, (0, 0))
    }
}

impl Draw for DiploidChromosome {
    fn view_box_size(&self) -> Option<(usize, usize)> {
        Some((self.n_loci() * BLOCKSIZE, 2 * BLOCKSIZE))
    }

    fn draw(&self) -> Group {
        draw_gen_base(self, (0, 0))
    }
}

/// Chromosomes side by side, upper haplotypes on top.
impl Draw for Genotype {
    fn view_box_size(&self) -> Option<(usize, usize)> {
        let loci: usize = self.chromosomes().iter().map(|c| c.n_loci()).sum();
        let gaps = self.n_chromosomes().saturating_sub(1);
        Some((loci * BLOCKSIZE + gaps * CHROMOSOME_GAP, 2 * BLOCKSIZE))
    }

    fn draw(&self) -> Group {
        let mut x = 0;
        let mut g = Group::new();
        for c in self.chromosomes() {
            g = g.add(draw_gen_base(c, (x as i32, 0)));
            x += c.n_loci() * BLOCKSIZE + CHROMOSOME_GAP;
        }
        g
    }
}

/// Graphviz source of a scheme.
///
/// Seed lots are circles, plants are boxes clustered per parent seed lot and generation with
/// the number of seeds taken as cluster label, and crossings are small diamonds. Plants with a
/// non-zero linkage phase ambiguity are labelled with it in red.
pub fn dot_source(scheme: &CrossingScheme) -> String {
    let graph = scheme.graph();
    let mut dot = String::from("digraph G{\nranksep=0.4;\n");
    let mut clusters = 0;
    let mut lots = 0;
    for generation in 0..=scheme.num_generations() {
        for &lot in scheme.seed_lots_in_generation(generation) {
            lots += 1;
            let node = graph.seed_lot(lot);
            let _ = writeln!(
                dot,
                "{} [shape=circle, width=0.4, fixedsize=true, fontsize=12.0, label=\"S{lots}\"];",
                node.unique_id()
            );
            for &c in node.parent_crossings() {
                let _ = writeln!(
                    dot,
                    "{} -> {};",
                    graph.crossing(c).unique_id(),
                    node.unique_id()
                );
            }
        }

        let mut groups: BTreeMap<Option<SeedLotIx>, Vec<PlantIx>> = BTreeMap::new();
        for &plant in scheme.plants_in_generation(generation) {
            groups
                .entry(graph.plant(plant).parent())
                .or_default()
                .push(plant);
        }
        for (parent, plants) in groups {
            let mut cluster = format!("subgraph cluster{clusters}{{\n");
            let mut edges = String::new();
            let mut rank = String::from("{rank=same; ");
            for &plant in &plants {
                let node = graph.plant(plant);
                let _ = write!(rank, "{} ", node.unique_id());
                let lpa = scheme.plant_lpa(plant);
                let (label, colour) = if lpa > 0.0 {
                    (
                        format!("{}\\nLPA: {}", node.genotype(), format_percentage(lpa)),
                        "red",
                    )
                } else {
                    (node.genotype().to_string(), "black")
                };
                let _ = writeln!(
                    cluster,
                    "{} [shape=box, label=\"{label}\", fontcolor={colour}];",
                    node.unique_id()
                );
                if let Some(lot) = parent {
                    let lot_node = graph.seed_lot(lot);
                    let minlen = 3 * (node.generation() - lot_node.generation()) + 1;
                    let _ = writeln!(
                        edges,
                        "{} -> {} [style=dashed, minlen={minlen}];",
                        lot_node.unique_id(),
                        node.unique_id()
                    );
                }
            }
            rank.push_str("};");
            let _ = writeln!(cluster, "{rank}\nstyle = rounded;");
            if plants.len() == 1 {
                cluster.push_str("color = invis;\n");
            }
            let seeds = parent.map_or(0, |lot| {
                graph.seed_lot(lot).seeds_taken_from_generation(generation)
            });
            let _ = writeln!(cluster, "label = \"{seeds}\";\nlabeljust = \"r\";\n}}");
            dot.push_str(&cluster);
            dot.push_str(&edges);
            clusters += 1;
        }

        for &crossing in scheme.crossings_in_generation(generation) {
            let node = graph.crossing(crossing);
            let (p1, p2) = node.parents();
            let _ = writeln!(
                dot,
                "{} [shape=diamond, label=\"\", fixedsize=true, width=0.15, height=0.15, style=filled];",
                node.unique_id()
            );
            let _ = writeln!(dot, "{} -> {};", graph.plant(p1).unique_id(), node.unique_id());
            let _ = writeln!(dot, "{} -> {};", graph.plant(p2).unique_id(), node.unique_id());
        }
    }
    let _ = writeln!(
        dot,
        "label=\"\\nOverall LPA: {}\\n# Plants: {}\"\nlabelloc=b\nbgcolor=transparent\n}}",
        format_percentage(scheme.linkage_phase_ambiguity()),
        scheme.total_pop_size()
    );
    dot
}

/// Renders `scheme` to `output` in the given Graphviz `format` (`svg`, `png`, `pdf`, ...).
///
/// Returns `false` and logs a warning when the `dot` executable cannot be run or fails. Only
/// errors while talking to a running `dot` are reported as errors.
pub fn render(
    scheme: &CrossingScheme,
    output: &Path,
    format: &str,
    settings: &Settings,
) -> Result<bool> {
    let dot = settings.dot_executable();
    let child = Command::new(&dot)
        .arg(format!("-T{format}"))
        .arg("-o")
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(
                "could not run graphviz ({}): {e}; skipping graph creation",
                dot.display()
            );
            return Ok(false);
        }
    };
    let io_error = |source| SearchError::Io {
        path: dot.clone(),
        source,
    };
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dot_source(scheme).as_bytes())
            .map_err(io_error)?;
    }
    let result = child.wait_with_output().map_err(io_error)?;
    if !result.status.success() {
        warn!(
            "graphviz exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr).trim()
        );
        return Ok(false);
    }
    debug!("rendered scheme to {}", output.display());
    Ok(true)
}

#[derive(Serialize)]
struct SchemeOutput {
    descriptor: CrossingSchemeDescriptor,
    final_genotype: String,
    pop_per_generation: Vec<u64>,
    report: String,
    dot: String,
}

#[derive(Serialize)]
struct FrontierOutput {
    schemes: Vec<SchemeOutput>,
}

/// Writes the current solutions as one JSON document with, per scheme, its objectives, a text
/// report and its Graphviz source.
pub fn write_intermediate_output(schemes: &[Arc<CrossingScheme>], path: &Path) -> Result<()> {
    let output = FrontierOutput {
        schemes: schemes
            .iter()
            .map(|s| SchemeOutput {
                descriptor: s.descriptor(),
                final_genotype: s.final_genotype().to_string(),
                pop_per_generation: s.pop_per_generation().to_vec(),
                report: scheme_report(s),
                dot: dot_source(s),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&output)?;
    fs::write(path, json).map_err(|source| SearchError::Io {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;
    use crate::scheme::crossing_scheme::tests::single_locus_scheme;

    #[test]
    fn dot_source_has_every_node() {
        let scheme = single_locus_scheme();
        let dot = dot_source(&scheme);
        assert!(dot.starts_with("digraph G{"));
        assert!(dot.trim_end().ends_with('}'));
        let count = |needle: &str| dot.matches(needle).count();
        assert_eq!(count("shape=circle"), 4);
        assert_eq!(count("shape=box"), 4);
        assert_eq!(count("shape=diamond"), 2);
        // one seed lot edge per plant
        assert_eq!(count("[style=dashed"), 4);
        assert!(dot.contains("# Plants: 12"));
        assert_eq!(dot.matches('{').count(), dot.matches('}').count());
    }

    #[test]
    fn genotype_drawing_spans_all_chromosomes() {
        let g = parse_genotype("101/010 11/00").unwrap();
        assert_eq!(
            g.view_box_size(),
            Some((5 * BLOCKSIZE + CHROMOSOME_GAP, 2 * BLOCKSIZE))
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genotype.svg");
        g.draw_to_file(&path).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert_eq!(svg.matches("<rect").count(), 10);
        assert_eq!(svg.matches("yellow").count(), 5);
    }

    #[test]
    fn missing_graphviz_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            dot_path: Some("/nonexistent/graphviz/dot".to_owned()),
        };
        let rendered = render(
            &single_locus_scheme(),
            &dir.path().join("scheme.svg"),
            "svg",
            &settings,
        )
        .unwrap();
        assert!(!rendered);
    }

    #[test]
    fn intermediate_output_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.json");
        write_intermediate_output(&[Arc::new(single_locus_scheme())], &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let scheme = &value["schemes"][0];
        assert_eq!(scheme["descriptor"]["num_generations"], 2);
        assert_eq!(scheme["final_genotype"], "1/1");
        assert!(scheme["dot"].as_str().unwrap().starts_with("digraph"));

        let err = write_intermediate_output(&[], &dir.path().join("missing/frontier.json"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Search);
    }
}
