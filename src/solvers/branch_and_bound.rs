use crate::abstract_plants::Dominance;
use crate::error::{ConstraintError, Result, SearchError};
use crate::extra::analysis::format_elapsed;
use crate::extra::visualisation::write_intermediate_output;
use crate::plants::{GeneticMap, Genotype, SeedLot};
use crate::scheme::{
    CrossingScheme, CrossingSchemeAlternatives, CrossingSchemeDescriptor, NodeIds,
    PlantDescriptor, SchemeGraph,
};
use crate::solvers::constraints::Constraints;
use crate::solvers::heuristics::{Heuristics, PlantCollectionFilter, SeedLotFilter};
use crate::solvers::listener::{Listeners, MessageLevel, SearchListener};
use crate::solvers::merger::SchemeMerger;
use crate::solvers::pareto::{DefaultDominance, ParetoFrontier};
use crate::solvers::population_size::{DefaultPopulationSizeTools, PopulationSizeTools};
use crate::solvers::runtime_limit::RuntimeLimit;
use crate::solvers::seed_lot_cache::SeedLotCache;
use crate::solvers::seed_lot_constructor::{
    check_compatibility, DefaultSeedLotConstructor, SeedLotConstructor,
};
use crate::solvers::solution_manager::SolutionManager;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Success probability used when none is configured.
pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.95;

/// Pluggable parts and switches of a branch and bound search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub tools: Arc<dyn PopulationSizeTools>,
    pub constraints: Constraints,
    pub seeds_per_crossing: Option<u64>,
    pub heuristics: Heuristics,
    pub seed_lot_filters: Vec<Arc<dyn SeedLotFilter>>,
    pub initial_plant_filter: Option<Arc<dyn PlantCollectionFilter>>,
    pub initial_frontier: Vec<Arc<CrossingScheme>>,
    pub dominance: Arc<dyn Dominance<CrossingSchemeDescriptor>>,
    pub homozygous_ideotype_parents: bool,
    pub intermediate_output: Option<PathBuf>,
    /// Defaults to the exact constructor for the genetic map of the search.
    pub seed_lot_constructor: Option<Arc<dyn SeedLotConstructor>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            tools: Arc::new(DefaultPopulationSizeTools::new(DEFAULT_SUCCESS_PROBABILITY)),
            constraints: Constraints::default(),
            seeds_per_crossing: None,
            heuristics: Heuristics::default(),
            seed_lot_filters: Vec::new(),
            initial_plant_filter: None,
            initial_frontier: Vec::new(),
            dominance: Arc::new(DefaultDominance),
            homozygous_ideotype_parents: false,
            intermediate_output: None,
            seed_lot_constructor: None,
        }
    }
}

impl SearchOptions {
    pub fn with_success_probability(mut self, success_probability: f64) -> Self {
        self.tools = Arc::new(DefaultPopulationSizeTools::new(success_probability));
        self
    }

    pub fn with_population_size_tools(mut self, tools: Arc<dyn PopulationSizeTools>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_seeds_per_crossing(mut self, seeds: Option<u64>) -> Self {
        self.seeds_per_crossing = seeds;
        self
    }

    pub fn with_heuristics(mut self, heuristics: Heuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn with_seed_lot_filter(mut self, filter: Arc<dyn SeedLotFilter>) -> Self {
        self.seed_lot_filters.push(filter);
        self
    }

    pub fn with_initial_plant_filter(mut self, filter: Arc<dyn PlantCollectionFilter>) -> Self {
        self.initial_plant_filter = Some(filter);
        self
    }

    pub fn with_initial_frontier(mut self, frontier: Vec<Arc<CrossingScheme>>) -> Self {
        self.initial_frontier = frontier;
        self
    }

    pub fn with_dominance(mut self, dominance: Arc<dyn Dominance<CrossingSchemeDescriptor>>) -> Self {
        self.dominance = dominance;
        self
    }

    pub fn with_homozygous_ideotype_parents(mut self, required: bool) -> Self {
        self.homozygous_ideotype_parents = required;
        self
    }

    pub fn with_intermediate_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.intermediate_output = Some(path.into());
        self
    }

    pub fn with_seed_lot_constructor(mut self, constructor: Arc<dyn SeedLotConstructor>) -> Self {
        self.seed_lot_constructor = Some(constructor);
        self
    }
}

/// Outcome of a search run.
#[derive(Debug)]
pub struct SearchReport {
    /// Pareto optimal solutions found before the search ended.
    pub frontier: ParetoFrontier<CrossingScheme>,
    pub elapsed: Duration,
    pub runtime_limit_exceeded: bool,
    /// Error that ended the search early; the frontier is still the one built so far.
    pub failure: Option<SearchError>,
}

impl SearchReport {
    pub fn solutions(&self) -> Vec<Arc<CrossingScheme>> {
        self.frontier.members()
    }
}

/// Runs a branch and bound search for schemes growing `ideotype` from `initial_plants`.
pub fn search(
    initial_plants: Vec<Genotype>,
    ideotype: Genotype,
    map: GeneticMap,
    runtime_limit: Option<Duration>,
    workers: usize,
    options: SearchOptions,
) -> Result<SearchReport> {
    let engine = BranchAndBound::new(initial_plants, ideotype, map, options)?;
    Ok(engine.search(runtime_limit, workers))
}

/// Branch and bound search over crossing schemes.
///
/// Partial schemes are taken from a FIFO queue and extended by selfing their final plant and
/// by crossing it with every partial scheme dequeued before. Extensions that cannot lead to a
/// new Pareto optimal solution within the constraints are bounded.
#[derive(Debug)]
pub struct BranchAndBound {
    initial_plants: Vec<Genotype>,
    ideotype: Arc<Genotype>,
    options: SearchOptions,
    constructor: Arc<dyn SeedLotConstructor>,
    cache: SeedLotCache,
    listeners: Listeners,
    ids: Arc<NodeIds>,
}

impl BranchAndBound {
    /// Validates the input: every initial plant must fit the ideotype and the genetic map.
    pub fn new(
        initial_plants: Vec<Genotype>,
        ideotype: Genotype,
        map: GeneticMap,
        options: SearchOptions,
    ) -> Result<Self> {
        check_compatibility(&map, &ideotype, &ideotype)?;
        for plant in &initial_plants {
            check_compatibility(&map, plant, &ideotype)?;
        }
        let gamma = options.tools.success_probability();
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(ConstraintError::SuccessProbability(gamma).into());
        }
        let constructor = match &options.seed_lot_constructor {
            Some(c) => c.clone(),
            None => Arc::new(DefaultSeedLotConstructor::new(Arc::new(map))),
        };
        Ok(Self {
            initial_plants,
            ideotype: Arc::new(ideotype),
            options,
            constructor,
            cache: SeedLotCache::new(),
            listeners: Listeners::new(),
            ids: Arc::new(NodeIds::new()),
        })
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn set_constraints(&mut self, constraints: Constraints) {
        self.options.constraints = constraints;
        self.cache.clear();
    }

    pub fn set_seed_lot_filters(&mut self, filters: Vec<Arc<dyn SeedLotFilter>>) {
        self.options.seed_lot_filters = filters;
        self.cache.clear();
    }

    pub fn set_population_size_tools(&mut self, tools: Arc<dyn PopulationSizeTools>) {
        self.options.tools = tools;
        self.cache.clear();
    }

    pub fn set_heuristics(&mut self, heuristics: Heuristics) {
        self.options.heuristics = heuristics;
    }

    pub fn set_initial_frontier(&mut self, frontier: Vec<Arc<CrossingScheme>>) {
        self.options.initial_frontier = frontier;
    }

    pub fn enable_intermediate_output(&mut self, path: impl Into<PathBuf>) {
        self.options.intermediate_output = Some(path.into());
    }

    pub fn disable_intermediate_output(&mut self) {
        self.options.intermediate_output = None;
    }

    pub fn add_listener(&self, listener: Arc<dyn SearchListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SearchListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Number of seed lots kept for reuse across searches.
    pub fn cached_seed_lots(&self) -> usize {
        self.cache.len()
    }

    /// Searches until the queue runs dry or `runtime_limit` is spent, using `workers` threads
    /// to cross schemes. Listeners see exactly one start and one stop event per call.
    pub fn search(&self, runtime_limit: Option<Duration>, workers: usize) -> SearchReport {
        let limit = RuntimeLimit::new(runtime_limit);
        self.listeners.started();
        self.ids.reset();
        let manager = SolutionManager::new(
            self.ideotype.clone(),
            self.options.tools.clone(),
            self.options.constraints.clone(),
            self.options.heuristics.clone(),
            self.options.seed_lot_filters.clone(),
            self.options.seeds_per_crossing,
            self.options.homozygous_ideotype_parents,
            self.options.dominance.clone(),
            self.ids.clone(),
        );
        if !self.options.initial_frontier.is_empty() {
            manager
                .frontier()
                .register_all(self.options.initial_frontier.iter().cloned());
        }
        let mut run = Run {
            engine: self,
            manager,
            limit: &limit,
            queue: VecDeque::new(),
            previous: Vec::new(),
            seen: HashSet::new(),
        };
        let failure = run.run(workers.max(1)).err();
        if let Some(e) = &failure {
            self.listeners
                .message(MessageLevel::Info, &format!("search failed: {e}"));
        }
        let runtime_limit_exceeded = failure.is_none() && limit.exceeded();
        if runtime_limit_exceeded {
            self.listeners
                .message(MessageLevel::Info, "runtime limit exceeded");
        }
        let frontier = run.manager.into_frontier();
        let elapsed = limit.elapsed();
        self.listeners.stopped(elapsed);
        SearchReport {
            frontier,
            elapsed,
            runtime_limit_exceeded,
            failure,
        }
    }

    fn construct_seed_lot(
        &self,
        manager: &SolutionManager,
        generation: usize,
        g1: &Genotype,
        g2: &Genotype,
    ) -> Result<Arc<SeedLot>> {
        if manager.final_generation_reached(generation) {
            let lot = self
                .constructor
                .partial_cross(g1, g2, &[self.ideotype.as_ref()])?;
            trace!("constructed partial seed lot with {} genotypes", lot.n_genotypes());
            return Ok(Arc::new(lot));
        }
        if let Some(lot) = self.cache.get(g1, g2) {
            trace!("cached seed lot with {} genotypes", lot.n_genotypes());
            return Ok(lot);
        }
        let mut lot = self.constructor.cross(g1, g2)?;
        let unfiltered = lot.n_genotypes();
        manager.filter_seed_lot(&mut lot);
        debug!(
            "constructed seed lot of {} x {}: {} genotypes, {} after filtering",
            g1,
            g2,
            unfiltered,
            lot.n_genotypes()
        );
        let lot = Arc::new(lot);
        self.cache.insert(g1, g2, lot.clone());
        Ok(lot)
    }
}

/// State of one search run.
struct Run<'e> {
    engine: &'e BranchAndBound,
    manager: SolutionManager,
    limit: &'e RuntimeLimit,
    queue: VecDeque<CrossingSchemeAlternatives>,
    previous: Vec<CrossingSchemeAlternatives>,
    seen: HashSet<Arc<CrossingScheme>>,
}

impl Run<'_> {
    fn run(&mut self, workers: usize) -> Result<()> {
        let engine = self.engine;
        let listeners = &engine.listeners;
        listeners.message(
            MessageLevel::Verbose,
            &format!("number of threads used for extending partial schemes: {workers}"),
        );
        let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;

        let initial = self.initial_schemes()?;
        self.register(initial);

        while !self.limit.exceeded() {
            let Some(mut current) = self.queue.pop_front() else {
                break;
            };
            listeners.message(
                MessageLevel::Progress,
                &format!(
                    "num solutions: {} ### prog: {} ({}) ### cur scheme: {} - T = {}",
                    self.manager.frontier().len(),
                    self.previous.len(),
                    self.queue.len(),
                    current,
                    format_elapsed(self.limit.elapsed())
                ),
            );

            let (mut for_crossing, mut for_selfing) = (0, 0);
            let (manager, seen) = (&self.manager, &self.seen);
            current.retain(|alt| {
                if seen.contains(alt) || manager.bound_dequeue(alt) {
                    return false;
                }
                let bound_cross = manager.bound_cross_current(alt);
                let bound_self = manager.bound_self_current(alt);
                for_crossing += usize::from(!bound_cross);
                for_selfing += usize::from(!bound_self);
                !(bound_cross && bound_self)
            });
            if current.is_empty() {
                continue;
            }
            if for_selfing > 0 {
                let selfed = self.self_scheme(&current)?;
                self.register(selfed);
            }
            if for_crossing > 0 {
                self.cross_with_previous(&current, &pool, workers)?;
            }
            self.seen.extend(current.alternatives().iter().cloned());
            self.previous.push(current);
        }
        Ok(())
    }

    /// One bundle per retained initial plant, grown from its own uniform seed lot.
    fn initial_schemes(&self) -> Result<Vec<CrossingSchemeAlternatives>> {
        let engine = self.engine;
        let mut plants = engine.initial_plants.clone();
        if let Some(filter) = &engine.options.initial_plant_filter {
            engine
                .listeners
                .message(MessageLevel::Verbose, "filtering initial plants ...");
            plants = filter.filter(plants);
            engine.listeners.message(
                MessageLevel::Verbose,
                &format!("retained {} initial plants", plants.len()),
            );
            for p in &plants {
                engine
                    .listeners
                    .message(MessageLevel::Verbose, &p.to_string());
            }
        }
        let ids = self.manager.ids();
        plants
            .into_iter()
            .map(|genotype| {
                let mut graph = SchemeGraph::new();
                let lot = graph.add_seed_lot(
                    Arc::new(SeedLot::uniform_of(genotype.clone())),
                    0,
                    ids.next_seed_lot(),
                    0,
                );
                let plant = graph.add_plant(Arc::new(genotype), 0, Some(lot), ids.next_plant(), 0);
                let scheme = CrossingScheme::new(graph, plant, engine.options.tools.clone())?;
                Ok(CrossingSchemeAlternatives::new(
                    ids.next_alternatives(),
                    vec![Arc::new(scheme)],
                ))
            })
            .collect()
    }

    fn register(&mut self, bundles: Vec<CrossingSchemeAlternatives>) {
        register_new_schemes(self.engine, &self.manager, self.limit, &mut self.queue, bundles);
    }

    /// Selfs the final plant of every alternative of `bundle`.
    fn self_scheme(
        &self,
        bundle: &CrossingSchemeAlternatives,
    ) -> Result<Vec<CrossingSchemeAlternatives>> {
        let Some(genotype) = bundle.final_genotype() else {
            return Ok(Vec::new());
        };
        let manager = &self.manager;
        let ids = manager.ids();
        let lot = self.engine.construct_seed_lot(
            manager,
            bundle.min_num_generations() + 1,
            genotype,
            genotype,
        )?;
        let lot_ids: Vec<u64> = bundle
            .alternatives()
            .iter()
            .map(|_| ids.next_seed_lot())
            .collect();
        let ancestors = bundle.ancestor_descriptors();

        let mut selfed = Vec::new();
        for child in lot.genotypes() {
            let target = PlantDescriptor::grown_from(child, &lot);
            if manager.bound_grow_plant_from_ancestors(&ancestors, &target) {
                continue;
            }
            let mut alternatives = Vec::new();
            for (alt, &lot_id) in bundle.alternatives().iter().zip(&lot_ids) {
                if self.limit.exceeded() {
                    break;
                }
                if manager.bound_self_with_target(alt, &target) {
                    continue;
                }
                let (mut graph, parent) = alt.graph().upward_copy(alt.final_plant(), false);
                let generation = alt.num_generations() + 1;
                let selfing = graph.add_selfing(ids.next_crossing(), parent);
                let new_lot = graph.add_seed_lot(lot.clone(), generation, lot_id, 0);
                graph.attach_crossing(new_lot, selfing);
                let plant = graph.add_plant(
                    target.genotype.clone(),
                    generation,
                    Some(new_lot),
                    ids.next_plant(),
                    0,
                );
                let mut scheme = CrossingScheme::new(graph, plant, alt.tools().clone())?;
                if !manager.bound_current_scheme(&scheme)
                    && scheme.resolve_depleted_seed_lots(manager)?
                {
                    alternatives.push(Arc::new(scheme));
                }
            }
            if !alternatives.is_empty() {
                selfed.push(CrossingSchemeAlternatives::new(
                    ids.next_alternatives(),
                    alternatives,
                ));
            }
        }
        Ok(selfed)
    }

    /// Crosses `current` with every previously dequeued bundle on `workers` threads. The
    /// bundles each worker produces are registered in the order the workers were started.
    fn cross_with_previous(
        &mut self,
        current: &CrossingSchemeAlternatives,
        pool: &rayon::ThreadPool,
        workers: usize,
    ) -> Result<()> {
        let Run {
            engine,
            manager,
            limit,
            queue,
            previous,
            ..
        } = self;
        let (engine, manager, limit) = (*engine, &*manager, *limit);
        let previous = Mutex::new(previous.iter());
        let (tx, rx) = mpsc::channel();
        let mut failure = None;

        pool.in_place_scope(|scope| {
            for w in 0..workers {
                let tx = tx.clone();
                let previous = &previous;
                scope.spawn(move |_| {
                    let result = cross_worker(engine, manager, limit, current, previous);
                    if result.is_err() {
                        limit.cancel();
                    }
                    // the receiver outlives the scope
                    let _ = tx.send((w, result));
                });
                trace!("launched cross worker {} of {}", w + 1, workers);
            }
            drop(tx);

            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (w, result) in rx.iter() {
                pending.insert(w, result);
                while let Some(result) = pending.remove(&next) {
                    match result {
                        Ok(bundles) => {
                            register_new_schemes(engine, manager, limit, queue, bundles)
                        }
                        Err(e) => {
                            failure.get_or_insert(e);
                        }
                    }
                    trace!("{}/{} cross workers finished", next + 1, workers);
                    next += 1;
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Work loop of one cross worker: takes previous bundles from the shared iterator until it is
/// exhausted and merges each with `current` unless every pair of alternatives is bounded.
fn cross_worker<'p>(
    engine: &BranchAndBound,
    manager: &SolutionManager,
    limit: &RuntimeLimit,
    current: &CrossingSchemeAlternatives,
    previous: &Mutex<std::slice::Iter<'p, CrossingSchemeAlternatives>>,
) -> Result<Vec<CrossingSchemeAlternatives>> {
    let mut combined = Vec::new();
    while !limit.exceeded() {
        let Some(other) = previous.lock().next() else {
            break;
        };
        let bounded = current.alternatives().iter().all(|a1| {
            other
                .alternatives()
                .iter()
                .all(|a2| manager.bound_cross_with_specific_other(a1, a2))
        });
        if !bounded {
            combined.extend(combine_schemes(engine, manager, limit, current, other)?);
        }
    }
    Ok(combined)
}

/// Crosses the final plants of two bundles and merges their histories.
fn combine_schemes(
    engine: &BranchAndBound,
    manager: &SolutionManager,
    limit: &RuntimeLimit,
    scheme1: &CrossingSchemeAlternatives,
    scheme2: &CrossingSchemeAlternatives,
) -> Result<Vec<CrossingSchemeAlternatives>> {
    let (Some(g1), Some(g2)) = (scheme1.final_genotype(), scheme2.final_genotype()) else {
        return Ok(Vec::new());
    };
    let generation = scheme1
        .min_num_generations()
        .max(scheme2.min_num_generations())
        + 1;
    let lot = engine.construct_seed_lot(manager, generation, g1, g2)?;

    let mut ancestors = scheme1.ancestor_descriptors();
    ancestors.extend(scheme2.ancestor_descriptors());
    let bounded_genotypes: HashSet<Genotype> = lot
        .genotypes()
        .filter(|g| {
            manager.bound_grow_plant_from_ancestors(&ancestors, &PlantDescriptor::grown_from(g, &lot))
        })
        .cloned()
        .collect();
    let bound_cross = scheme1
        .alternatives()
        .iter()
        .map(|a1| {
            scheme2
                .alternatives()
                .iter()
                .map(|a2| manager.bound_cross_with_specific_other(a1, a2))
                .collect()
        })
        .collect();
    SchemeMerger::new(
        scheme1,
        scheme2,
        manager,
        lot,
        bound_cross,
        bounded_genotypes,
        limit,
    )
    .combine()
}

/// Offers the solutions among `bundles` to the frontier and queues the alternatives that can
/// still be extended.
fn register_new_schemes(
    engine: &BranchAndBound,
    manager: &SolutionManager,
    limit: &RuntimeLimit,
    queue: &mut VecDeque<CrossingSchemeAlternatives>,
    bundles: Vec<CrossingSchemeAlternatives>,
) {
    for mut bundle in bundles {
        for alt in bundle.alternatives() {
            if !manager.is_solution(alt) || !manager.register_solution(alt.clone()) {
                continue;
            }
            engine.listeners.message(
                MessageLevel::Info,
                &format!(
                    "Pareto frontier updated ({} solution(s)) - T = {}",
                    manager.frontier().len(),
                    format_elapsed(limit.elapsed())
                ),
            );
            if let Some(path) = &engine.options.intermediate_output {
                match write_intermediate_output(&manager.frontier().members(), path) {
                    Ok(()) => info!("updated intermediate output file {}", path.display()),
                    Err(e) => warn!("failed to write intermediate output: {e}"),
                }
            }
        }
        bundle.retain(|alt| {
            !(manager.bound_cross_current(alt) && manager.bound_self_current(alt))
                && !manager.bound_queue(alt)
        });
        if !bundle.is_empty() {
            queue.push_back(bundle);
        }
    }
}
