//! Hybrid genetic optimizer over mixed ground and satellite networks.
//!
//! A chromosome is a fixed list of gene slots. Ground slots hold an optional
//! position, satellite slots an optional index into the candidate pass list.
//! Fitness rewards coverage and penalizes cost and cardinality overruns
//! softly, so infeasible individuals still breed; only feasible individuals
//! are ever reported. Population evaluation runs in parallel while every
//! random draw happens on the calling thread.

use crate::constraints::ResourceConstraints;
use crate::coverage::{CoverageCounts, CoverageEvaluator, CoverageSet};
use crate::error::{ensure_non_negative, ensure_positive, ensure_probability, PlannerError, Result};
use crate::geometry::{BoundingBox, Point};
use crate::grid::Grid;
use crate::region::Region;
use crate::relationship::RelationshipAnalyzer;
use crate::sensor::{validate_satellites, validate_sensors, Covering, GroundSensor, SatelliteSensor, Sensor};
use crate::solution::{Provenance, Solution, SolutionStatus};
use crate::{CoverageStrategy, PlanningProblem};
use rand::{Rng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// One gene slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gene {
    /// Ground sensor at a position, or an empty slot.
    Ground(Option<Point>),
    /// Index into the satellite candidate list, or unselected.
    Satellite(Option<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    pub genes: Vec<Gene>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverKind {
    SinglePoint,
    Uniform,
}

/// Weights of the fitness function.
///
/// With ratio `c`, cost `k` and penalty `p`:
/// target met gives `coverage + c * target_bonus - k * cost - p`,
/// otherwise `c * coverage - p`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    pub coverage: f64,
    pub target_bonus: f64,
    pub cost: f64,
    /// Per unit of cost above `max_total_cost`.
    pub cost_overrun: f64,
    /// Per ground sensor above the maximum.
    pub ground_excess: f64,
    /// Per satellite above the maximum.
    pub satellite_excess: f64,
    /// Multiplier on the summed pairwise composite relationship score.
    pub coordination: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            coverage: 1000.0,
            target_bonus: 500.0,
            cost: 0.1,
            cost_overrun: 2.0,
            ground_excess: 10.0,
            satellite_excess: 50.0,
            coordination: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Generations without a better best fitness before converging.
    pub patience: usize,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub crossover: CrossoverKind,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Ground jitter bound as a fraction of the region's larger side.
    pub position_jitter: f64,
    /// Chance that a slot starts active in a fresh individual.
    pub activation_probability: f64,
    pub elite_count: usize,
    pub fitness: FitnessWeights,
    /// Add the relationship-analyzer coordination term to fitness.
    pub use_coordination: bool,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            generations: 50,
            patience: 15,
            tournament_size: 3,
            crossover_rate: 0.8,
            crossover: CrossoverKind::SinglePoint,
            mutation_rate: 0.1,
            position_jitter: 0.1,
            activation_probability: 0.5,
            elite_count: 3,
            fitness: FitnessWeights::default(),
            use_coordination: false,
        }
    }
}

impl GeneticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(PlannerError::InvalidParameter(
                "population_size must be at least 2".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(PlannerError::InvalidParameter(
                "tournament_size must be at least 1".to_string(),
            ));
        }
        if self.elite_count >= self.population_size {
            return Err(PlannerError::InvalidParameter(format!(
                "elite_count {} must be below population_size {}",
                self.elite_count, self.population_size
            )));
        }
        ensure_probability("crossover_rate", self.crossover_rate)?;
        ensure_probability("mutation_rate", self.mutation_rate)?;
        ensure_probability("activation_probability", self.activation_probability)?;
        ensure_non_negative("position_jitter", self.position_jitter)
    }
}

/// Optimizer lifecycle. `Converged` and `BudgetExhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneticState {
    Initialized,
    Evaluating { generation: usize },
    /// Best fitness stalled for the patience window.
    Converged,
    /// Generation budget used up.
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_coverage: f64,
    pub feasible: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticOutcome {
    /// Best feasible network seen in any generation.
    pub solution: Solution,
    pub state: GeneticState,
    pub generations: usize,
    pub best_fitness: f64,
    pub history: Vec<GenerationStats>,
    /// Feasible members of the final population, best first.
    pub feasible_population: Vec<Solution>,
}

/// Fixed properties of one gene slot.
#[derive(Debug, Clone)]
enum Slot {
    Ground {
        id: String,
        radius: f64,
        cost: f64,
        modality: Option<String>,
    },
    Satellite,
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    fitness: f64,
    coverage: f64,
    feasible: bool,
}

/// Shared read-only data for one run.
struct Context<'a> {
    grid: &'a Grid,
    bounds: BoundingBox,
    slots: Vec<Slot>,
    satellites: Vec<SatelliteSensor>,
    satellite_covers: Vec<Vec<usize>>,
    constraints: ResourceConstraints,
}

impl Context<'_> {
    fn decode(&self, chromosome: &Chromosome) -> Vec<Sensor> {
        let mut picked = HashSet::new();
        let mut sensors = Vec::new();
        for (slot, gene) in self.slots.iter().zip(&chromosome.genes) {
            match (slot, gene) {
                (
                    Slot::Ground {
                        id,
                        radius,
                        cost,
                        modality,
                    },
                    Gene::Ground(Some((x, y))),
                ) => {
                    let mut g = GroundSensor::new(id.clone(), *x, *y, *radius).with_cost(*cost);
                    g.modality = modality.clone();
                    sensors.push(Sensor::Ground(g));
                }
                (Slot::Satellite, Gene::Satellite(Some(i))) => {
                    if picked.insert(*i) {
                        sensors.push(Sensor::Satellite(self.satellites[*i].clone()));
                    }
                }
                _ => {}
            }
        }
        sensors
    }

    /// Coverage ratio using precomputed satellite cover lists.
    fn coverage(&self, chromosome: &Chromosome) -> f64 {
        let mut set = CoverageSet::new(self.grid);
        let mut picked = HashSet::new();
        for (slot, gene) in self.slots.iter().zip(&chromosome.genes) {
            match (slot, gene) {
                (Slot::Ground { radius, .. }, Gene::Ground(Some(p))) => {
                    set.add(&self.grid.inside_within(*p, *radius));
                }
                (Slot::Satellite, Gene::Satellite(Some(i))) => {
                    if picked.insert(*i) {
                        set.add(&self.satellite_covers[*i]);
                    }
                }
                _ => {}
            }
        }
        set.ratio()
    }

    fn random_inside_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let k = rng.gen_range(0..self.grid.inside_count());
        self.grid.inside_point(k).position()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HybridGeneticOptimizer {
    pub config: GeneticConfig,
    pub constraints: ResourceConstraints,
    /// Radius of ground sensors created from scratch.
    pub ground_radius: f64,
    pub ground_cost: f64,
    /// Pre-computed satellite passes available for selection.
    pub satellite_candidates: Vec<SatelliteSensor>,
    pub relationship: RelationshipAnalyzer,
}

impl HybridGeneticOptimizer {
    pub fn new(constraints: ResourceConstraints, ground_radius: f64, ground_cost: f64) -> Result<Self> {
        ensure_positive("ground_radius", ground_radius)?;
        ensure_non_negative("ground_cost", ground_cost)?;
        Ok(Self {
            config: GeneticConfig::default(),
            constraints,
            ground_radius,
            ground_cost,
            satellite_candidates: Vec::new(),
            relationship: RelationshipAnalyzer::default(),
        })
    }

    pub fn with_config(mut self, config: GeneticConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_satellite_candidates(mut self, satellites: Vec<SatelliteSensor>) -> Self {
        self.satellite_candidates = satellites;
        self
    }

    /// Build a mixed network from scratch.
    pub fn optimize<R: Rng + ?Sized>(&self, region: &Region, grid: &Grid, rng: &mut R) -> Result<GeneticOutcome> {
        self.config.validate()?;
        validate_satellites(&self.satellite_candidates)?;
        let slots = (0..self.constraints.max_ground_sensors())
            .map(|i| Slot::Ground {
                id: format!("hg-{}", i + 1),
                radius: self.ground_radius,
                cost: self.ground_cost,
                modality: None,
            })
            .chain((0..self.constraints.max_satellites()).map(|_| Slot::Satellite))
            .collect();
        let ctx = self.context(region, grid, slots, self.satellite_candidates.clone());
        self.run(&ctx, None, rng)
    }

    /// Refine an existing mixed network. Ground sensors keep their ids, radii
    /// and costs; they may move or be dropped. Existing satellites may be
    /// dropped or swapped for candidates.
    pub fn refine<R: Rng + ?Sized>(
        &self,
        region: &Region,
        grid: &Grid,
        existing: &[Sensor],
        rng: &mut R,
    ) -> Result<GeneticOutcome> {
        self.config.validate()?;
        validate_sensors(existing)?;
        validate_satellites(&self.satellite_candidates)?;

        let mut satellites: Vec<SatelliteSensor> =
            existing.iter().filter_map(|s| s.as_satellite().cloned()).collect();
        let known: HashSet<String> = satellites.iter().map(|s| s.id.clone()).collect();
        satellites.extend(
            self.satellite_candidates
                .iter()
                .filter(|s| !known.contains(&s.id))
                .cloned(),
        );

        let mut slots = Vec::new();
        let mut genes = Vec::new();
        let mut sat_index = 0;
        for sensor in existing {
            match sensor {
                Sensor::Ground(g) => {
                    slots.push(Slot::Ground {
                        id: g.id.clone(),
                        radius: g.radius,
                        cost: g.cost,
                        modality: g.modality.clone(),
                    });
                    genes.push(Gene::Ground(Some(g.position())));
                }
                Sensor::Satellite(_) => {
                    slots.push(Slot::Satellite);
                    genes.push(Gene::Satellite(Some(sat_index)));
                    sat_index += 1;
                }
            }
        }

        let ctx = self.context(region, grid, slots, satellites);
        self.run(&ctx, Some(Chromosome { genes }), rng)
    }

    fn context<'a>(
        &self,
        region: &Region,
        grid: &'a Grid,
        slots: Vec<Slot>,
        satellites: Vec<SatelliteSensor>,
    ) -> Context<'a> {
        let evaluator = CoverageEvaluator::new();
        let satellite_covers = satellites
            .par_iter()
            .map(|s| evaluator.covered_by(&Sensor::Satellite(s.clone()), grid))
            .collect();
        Context {
            grid,
            bounds: region.bounds(),
            slots,
            satellites,
            satellite_covers,
            constraints: self.constraints,
        }
    }

    fn evaluate(&self, ctx: &Context<'_>, chromosome: &Chromosome) -> Evaluation {
        let coverage = ctx.coverage(chromosome);
        let sensors = ctx.decode(chromosome);
        let ground = sensors.iter().filter(|s| s.is_ground()).count();
        let satellites = sensors.len() - ground;
        let cost: f64 = sensors.iter().map(|s| s.cost()).sum();

        let c = &ctx.constraints;
        let w = &self.config.fitness;
        let penalty = w.ground_excess * ground.saturating_sub(c.max_ground_sensors()) as f64
            + w.satellite_excess * satellites.saturating_sub(c.max_satellites()) as f64
            + w.cost_overrun * (cost - c.max_total_cost()).max(0.0);

        let mut fitness = if coverage >= c.target_coverage() {
            w.coverage + coverage * w.target_bonus - cost * w.cost - penalty
        } else {
            coverage * w.coverage - penalty
        };

        if self.config.use_coordination {
            let mut coordination = 0.0;
            for i in 0..sensors.len() {
                for j in (i + 1)..sensors.len() {
                    coordination += self.relationship.analyze(&sensors[i], &sensors[j]).composite;
                }
            }
            fitness += w.coordination * coordination;
        }

        Evaluation {
            fitness,
            coverage,
            feasible: c.is_feasible(ground, satellites, cost),
        }
    }

    fn evaluate_all(&self, ctx: &Context<'_>, population: &[Chromosome]) -> Vec<Evaluation> {
        population
            .par_iter()
            .map(|chromosome| self.evaluate(ctx, chromosome))
            .collect()
    }

    fn random_chromosome<R: Rng + ?Sized>(&self, ctx: &Context<'_>, rng: &mut R) -> Chromosome {
        let p = self.config.activation_probability;
        let genes = ctx
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Ground { .. } => {
                    if rng.gen::<f64>() < p {
                        Gene::Ground(Some(ctx.random_inside_point(rng)))
                    } else {
                        Gene::Ground(None)
                    }
                }
                Slot::Satellite => {
                    if !ctx.satellites.is_empty() && rng.gen::<f64>() < p {
                        Gene::Satellite(Some(rng.gen_range(0..ctx.satellites.len())))
                    } else {
                        Gene::Satellite(None)
                    }
                }
            })
            .collect();
        Chromosome { genes }
    }

    fn initial_population<R: Rng + ?Sized>(
        &self,
        ctx: &Context<'_>,
        seed: Option<Chromosome>,
        rng: &mut R,
    ) -> Vec<Chromosome> {
        let size = self.config.population_size;
        match seed {
            None => (0..size).map(|_| self.random_chromosome(ctx, rng)).collect(),
            Some(seed) => {
                let mut population = Vec::with_capacity(size);
                population.push(seed.clone());
                while population.len() < size {
                    let mut variant = seed.clone();
                    self.jitter_all(ctx, &mut variant, rng);
                    self.mutate(ctx, &mut variant, rng);
                    population.push(variant);
                }
                population
            }
        }
    }

    fn tournament<R: Rng + ?Sized>(&self, evaluations: &[Evaluation], rng: &mut R) -> usize {
        let mut best = rng.gen_range(0..evaluations.len());
        for _ in 1..self.config.tournament_size {
            let challenger = rng.gen_range(0..evaluations.len());
            if evaluations[challenger].fitness > evaluations[best].fitness
                || (evaluations[challenger].fitness == evaluations[best].fitness && challenger < best)
            {
                best = challenger;
            }
        }
        best
    }

    fn crossover<R: Rng + ?Sized>(
        &self,
        a: &Chromosome,
        b: &Chromosome,
        rng: &mut R,
    ) -> (Chromosome, Chromosome) {
        let mut left = a.clone();
        let mut right = b.clone();
        let len = a.genes.len();
        if len < 2 {
            return (left, right);
        }
        match self.config.crossover {
            CrossoverKind::SinglePoint => {
                let point = rng.gen_range(1..len);
                for i in point..len {
                    std::mem::swap(&mut left.genes[i], &mut right.genes[i]);
                }
            }
            CrossoverKind::Uniform => {
                for i in 0..len {
                    if rng.gen_bool(0.5) {
                        std::mem::swap(&mut left.genes[i], &mut right.genes[i]);
                    }
                }
            }
        }
        (left, right)
    }

    fn jitter<R: Rng + ?Sized>(&self, ctx: &Context<'_>, p: Point, rng: &mut R) -> Point {
        let bound = self.config.position_jitter * ctx.bounds.extent();
        if bound <= 0.0 {
            return p;
        }
        ctx.bounds.clamp((
            p.0 + rng.gen_range(-bound..=bound),
            p.1 + rng.gen_range(-bound..=bound),
        ))
    }

    fn jitter_all<R: Rng + ?Sized>(&self, ctx: &Context<'_>, chromosome: &mut Chromosome, rng: &mut R) {
        for gene in chromosome.genes.iter_mut() {
            if let Gene::Ground(Some(p)) = gene {
                *p = self.jitter(ctx, *p, rng);
            }
        }
    }

    fn mutate<R: Rng + ?Sized>(&self, ctx: &Context<'_>, chromosome: &mut Chromosome, rng: &mut R) {
        let sat_count = ctx.satellites.len();
        for gene in chromosome.genes.iter_mut() {
            if rng.gen::<f64>() >= self.config.mutation_rate {
                continue;
            }
            *gene = match *gene {
                Gene::Ground(Some(p)) => {
                    if rng.gen_bool(0.8) {
                        Gene::Ground(Some(self.jitter(ctx, p, rng)))
                    } else {
                        Gene::Ground(None)
                    }
                }
                Gene::Ground(None) => Gene::Ground(Some(ctx.random_inside_point(rng))),
                Gene::Satellite(Some(_)) if sat_count > 1 && rng.gen_bool(0.5) => {
                    Gene::Satellite(Some(rng.gen_range(0..sat_count)))
                }
                Gene::Satellite(Some(_)) => Gene::Satellite(None),
                Gene::Satellite(None) if sat_count > 0 => Gene::Satellite(Some(rng.gen_range(0..sat_count))),
                Gene::Satellite(None) => Gene::Satellite(None),
            };
        }
    }

    fn run<R: Rng + ?Sized>(
        &self,
        ctx: &Context<'_>,
        seed: Option<Chromosome>,
        rng: &mut R,
    ) -> Result<GeneticOutcome> {
        let target = ctx.constraints.target_coverage();
        let mut state = GeneticState::Initialized;
        info!(
            slots = ctx.slots.len(),
            satellites = ctx.satellites.len(),
            population = self.config.population_size,
            generations = self.config.generations,
            target,
            ?state,
            "hybrid genetic optimization started"
        );

        if ctx.grid.is_empty() {
            warn!("region has no inside grid points; nothing to optimize");
            let sensors = seed.map(|s| ctx.decode(&s)).unwrap_or_default();
            let solution = Solution::new(sensors, 0.0, Provenance::HybridGenetic, SolutionStatus::EmptyRegion);
            return Ok(GeneticOutcome {
                solution,
                state: GeneticState::Converged,
                generations: 0,
                best_fitness: 0.0,
                history: Vec::new(),
                feasible_population: Vec::new(),
            });
        }

        let mut population = self.initial_population(ctx, seed, rng);
        let mut evaluations = self.evaluate_all(ctx, &population);

        let mut best: (Chromosome, Evaluation) = (population[0].clone(), evaluations[0]);
        let mut best_feasible: Option<(Chromosome, Evaluation)> = None;
        let mut history = Vec::new();
        let mut stall = 0;
        let mut generation = 0;

        loop {
            state = GeneticState::Evaluating { generation };
            let improved = self.track(&population, &evaluations, &mut best, &mut best_feasible);
            history.push(stats(generation, &evaluations));
            debug!(
                ?state,
                best_fitness = best.1.fitness,
                best_coverage = best.1.coverage,
                "generation evaluated"
            );

            stall = if improved || generation == 0 { 0 } else { stall + 1 };
            if stall >= self.config.patience {
                state = GeneticState::Converged;
                break;
            }
            if generation >= self.config.generations {
                state = GeneticState::BudgetExhausted;
                break;
            }

            population = self.next_generation(ctx, &population, &evaluations, rng);
            evaluations = self.evaluate_all(ctx, &population);
            generation += 1;
        }

        let solution = match &best_feasible {
            Some((chromosome, eval)) => {
                let status = if eval.coverage >= target {
                    SolutionStatus::TargetMet
                } else if state == GeneticState::Converged {
                    SolutionStatus::Converged
                } else {
                    SolutionStatus::BudgetExhausted
                };
                Solution::new(ctx.decode(chromosome), eval.coverage, Provenance::HybridGenetic, status)
            }
            None => {
                warn!("no feasible individual found; repairing the best one");
                self.repair(ctx, ctx.decode(&best.0))
            }
        };

        let mut ranked: Vec<usize> = (0..population.len()).filter(|&i| evaluations[i].feasible).collect();
        ranked.sort_by(|&a, &b| evaluations[b].fitness.total_cmp(&evaluations[a].fitness).then(a.cmp(&b)));
        let feasible_population = ranked
            .into_iter()
            .map(|i| {
                let eval = evaluations[i];
                let status = if eval.coverage >= target {
                    SolutionStatus::TargetMet
                } else {
                    SolutionStatus::CoverageTargetUnreachable
                };
                Solution::new(ctx.decode(&population[i]), eval.coverage, Provenance::HybridGenetic, status)
            })
            .collect();

        let best_fitness = best_feasible.as_ref().map_or(best.1.fitness, |b| b.1.fitness);
        info!(
            ?state,
            generations = generation,
            best_fitness,
            ratio = solution.coverage_ratio(),
            sensors = solution.len(),
            cost = solution.total_cost(),
            "hybrid genetic optimization finished"
        );

        Ok(GeneticOutcome {
            solution,
            state,
            generations: generation,
            best_fitness,
            history,
            feasible_population,
        })
    }

    /// Update the all-time bests; true when the overall best improved.
    fn track(
        &self,
        population: &[Chromosome],
        evaluations: &[Evaluation],
        best: &mut (Chromosome, Evaluation),
        best_feasible: &mut Option<(Chromosome, Evaluation)>,
    ) -> bool {
        let mut improved = false;
        for (chromosome, eval) in population.iter().zip(evaluations) {
            if eval.fitness > best.1.fitness {
                *best = (chromosome.clone(), *eval);
                improved = true;
            }
            if eval.feasible && best_feasible.as_ref().map_or(true, |b| eval.fitness > b.1.fitness) {
                *best_feasible = Some((chromosome.clone(), *eval));
            }
        }
        improved
    }

    fn next_generation<R: Rng + ?Sized>(
        &self,
        ctx: &Context<'_>,
        population: &[Chromosome],
        evaluations: &[Evaluation],
        rng: &mut R,
    ) -> Vec<Chromosome> {
        let size = self.config.population_size;
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&a, &b| evaluations[b].fitness.total_cmp(&evaluations[a].fitness).then(a.cmp(&b)));

        let mut next: Vec<Chromosome> = order
            .iter()
            .take(self.config.elite_count)
            .map(|&i| population[i].clone())
            .collect();

        while next.len() < size {
            let a = &population[self.tournament(evaluations, rng)];
            let b = &population[self.tournament(evaluations, rng)];
            let (mut left, mut right) = if rng.gen::<f64>() < self.config.crossover_rate {
                self.crossover(a, b, rng)
            } else {
                (a.clone(), b.clone())
            };
            self.mutate(ctx, &mut left, rng);
            self.mutate(ctx, &mut right, rng);
            next.push(left);
            if next.len() < size {
                next.push(right);
            }
        }
        next
    }

    /// Drop sensors until the network satisfies every constraint, each time
    /// removing the eligible sensor whose loss costs the least coverage
    /// (ties: the more expensive, then the later one).
    fn repair(&self, ctx: &Context<'_>, mut sensors: Vec<Sensor>) -> Solution {
        let c = &ctx.constraints;
        let evaluator = CoverageEvaluator::new();
        let mut covers: Vec<Vec<usize>> = sensors.iter().map(|s| evaluator.covered_by(s, ctx.grid)).collect();
        let mut counts = CoverageCounts::new(ctx.grid);
        for cover in &covers {
            counts.add(cover);
        }

        loop {
            let ground = sensors.iter().filter(|s| s.is_ground()).count();
            let satellites = sensors.len() - ground;
            let cost: f64 = sensors.iter().map(|s| s.cost()).sum();
            if c.is_feasible(ground, satellites, cost) {
                break;
            }
            let ground_over = ground > c.max_ground_sensors();
            let sat_over = satellites > c.max_satellites();

            let mut victim: Option<(usize, f64, f64)> = None;
            for (i, sensor) in sensors.iter().enumerate() {
                let eligible = if ground_over || sat_over {
                    (ground_over && sensor.is_ground()) || (sat_over && !sensor.is_ground())
                } else {
                    true
                };
                if !eligible {
                    continue;
                }
                let before = counts.covered_weight();
                counts.remove(&covers[i]);
                let loss = before - counts.covered_weight();
                counts.add(&covers[i]);

                let better = match victim {
                    None => true,
                    Some((_, best_loss, best_cost)) => {
                        loss < best_loss || (loss == best_loss && sensor.cost() >= best_cost)
                    }
                };
                if better {
                    victim = Some((i, loss, sensor.cost()));
                }
            }

            let Some((i, _, _)) = victim else { break };
            counts.remove(&covers[i]);
            covers.remove(i);
            let dropped = sensors.remove(i);
            debug!(id = dropped.id(), "dropped sensor during repair");
        }

        let ratio = counts.ratio();
        let status = if ratio >= c.target_coverage() {
            SolutionStatus::TargetMet
        } else {
            SolutionStatus::BudgetExhausted
        };
        Solution::new(sensors, ratio, Provenance::HybridGenetic, status)
    }
}

fn stats(generation: usize, evaluations: &[Evaluation]) -> GenerationStats {
    let best = evaluations
        .iter()
        .copied()
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness));
    let mean = evaluations.iter().map(|e| e.fitness).sum::<f64>() / evaluations.len().max(1) as f64;
    GenerationStats {
        generation,
        best_fitness: best.map_or(0.0, |e| e.fitness),
        mean_fitness: mean,
        best_coverage: best.map_or(0.0, |e| e.coverage),
        feasible: evaluations.iter().filter(|e| e.feasible).count(),
    }
}

impl CoverageStrategy for HybridGeneticOptimizer {
    fn name(&self) -> &'static str {
        "hybrid_genetic"
    }

    fn optimize(&self, problem: &PlanningProblem<'_>, rng: &mut dyn RngCore) -> Result<Solution> {
        let tuned = Self {
            constraints: self.constraints.with_target_coverage(problem.target_coverage)?,
            ..self.clone()
        };
        let outcome = if problem.existing.is_empty() {
            HybridGeneticOptimizer::optimize(&tuned, problem.region, problem.grid, rng)?
        } else {
            tuned.refine(problem.region, problem.grid, problem.existing, rng)?
        };
        Ok(outcome.solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::build_grid;
    use crate::sensor::TimeWindow;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Region, Grid) {
        let region = Region::rectangle((0.0, 0.0), (10.0, 10.0)).unwrap();
        let grid = build_grid(&region, 0.5).unwrap();
        (region, grid)
    }

    fn passes() -> Vec<SatelliteSensor> {
        (0..3)
            .map(|i| {
                let y = 1.5 + i as f64 * 3.5;
                SatelliteSensor::swath(
                    format!("pass-{i}"),
                    (0.0, y),
                    (10.0, y),
                    3.0,
                    TimeWindow::new(i as f64, i as f64 + 1.0).unwrap(),
                    40.0,
                )
            })
            .collect()
    }

    fn small_config() -> GeneticConfig {
        GeneticConfig {
            population_size: 20,
            generations: 25,
            patience: 10,
            elite_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_scratch_is_feasible() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(4, 1, 150.0, 0.8).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 3.0, 20.0)
            .unwrap()
            .with_config(small_config())
            .with_satellite_candidates(passes());
        let outcome = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();

        let sol = &outcome.solution;
        assert!(sol.ground_count() <= 4);
        assert!(sol.satellite_count() <= 1);
        assert!(sol.total_cost() <= 150.0);
        assert!(sol.coverage_ratio() > 0.3);
        assert!(matches!(outcome.state, GeneticState::Converged | GeneticState::BudgetExhausted));
        assert!(outcome.feasible_population.iter().all(|s| s.total_cost() <= 150.0));
        assert_eq!(outcome.history.len(), outcome.generations + 1);
    }

    #[test]
    fn test_seeded_runs_match() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(3, 1, 1000.0, 0.9).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 3.0, 10.0)
            .unwrap()
            .with_config(small_config())
            .with_satellite_candidates(passes());
        let a = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_best_fitness_never_regresses() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(4, 0, 1000.0, 0.95).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 2.5, 1.0)
            .unwrap()
            .with_config(small_config());
        let outcome = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let bests: Vec<f64> = outcome.history.iter().map(|h| h.best_fitness).collect();
        // elitism keeps the leader in every generation
        assert!(bests.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_refine_repairs_over_budget_network() {
        let (region, grid) = setup();
        let existing: Vec<Sensor> = (0..5)
            .map(|i| Sensor::from(GroundSensor::new(format!("g{i}"), 1.0 + 2.0 * i as f64, 5.0, 2.0).with_cost(10.0)))
            .collect();
        let constraints = ResourceConstraints::new(3, 0, 30.0, 0.9).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 2.0, 10.0)
            .unwrap()
            .with_config(GeneticConfig {
                mutation_rate: 0.0,
                position_jitter: 0.0,
                ..small_config()
            });
        let outcome = opt
            .refine(&region, &grid, &existing, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();
        let sol = &outcome.solution;
        assert!(sol.ground_count() <= 3);
        assert!(sol.total_cost() <= 30.0);
        assert!(sol.sensors().iter().all(|s| s.id().starts_with('g')));
    }

    #[test]
    fn test_repair_drops_least_useful_sensor() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(1, 0, 100.0, 0.5).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 3.0, 1.0).unwrap();
        let ctx = opt.context(&region, &grid, Vec::new(), Vec::new());
        let sensors = vec![
            Sensor::from(GroundSensor::new("big", 5.0, 5.0, 4.0)),
            Sensor::from(GroundSensor::new("small", 5.0, 5.0, 1.0)),
        ];
        let sol = opt.repair(&ctx, sensors);
        assert_eq!(sol.len(), 1);
        assert_eq!(sol.sensors()[0].id(), "big");
    }

    #[test]
    fn test_coordination_penalizes_redundant_pair() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(2, 0, 100.0, 0.9).unwrap();
        let station = |id: &str| Slot::Ground {
            id: id.into(),
            radius: 3.0,
            cost: 1.0,
            modality: None,
        };
        let stacked = Chromosome {
            genes: vec![Gene::Ground(Some((5.0, 5.0))), Gene::Ground(Some((5.0, 5.0)))],
        };

        let plain = HybridGeneticOptimizer::new(constraints, 3.0, 1.0).unwrap();
        let coordinated = plain.clone().with_config(GeneticConfig {
            use_coordination: true,
            ..Default::default()
        });
        let ctx = plain.context(&region, &grid, vec![station("a"), station("b")], Vec::new());

        let off = plain.evaluate(&ctx, &stacked);
        let on = coordinated.evaluate(&ctx, &stacked);
        assert_eq!(off.coverage, on.coverage);
        assert!(on.fitness < off.fitness);
    }

    #[test]
    fn test_uniform_crossover_is_feasible_and_reproducible() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(3, 1, 150.0, 0.8).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 3.0, 20.0)
            .unwrap()
            .with_config(GeneticConfig {
                crossover: CrossoverKind::Uniform,
                ..small_config()
            })
            .with_satellite_candidates(passes());

        let a = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(21)).unwrap();
        let b = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(21)).unwrap();
        assert_eq!(a, b);

        let sol = &a.solution;
        assert!(constraints.is_feasible(sol.ground_count(), sol.satellite_count(), sol.total_cost()));
        assert!(outcome_is_feasible(&a, &constraints));
    }

    fn outcome_is_feasible(outcome: &GeneticOutcome, constraints: &ResourceConstraints) -> bool {
        outcome
            .feasible_population
            .iter()
            .all(|s| constraints.is_feasible(s.ground_count(), s.satellite_count(), s.total_cost()))
    }

    #[test]
    fn test_invalid_sensors_are_rejected() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(3, 1, 150.0, 0.8).unwrap();
        let window = TimeWindow::new(0.0, 1.0).unwrap();
        let cheap = SatelliteSensor::swath("cheap", (0.0, 5.0), (10.0, 5.0), 4.0, window, -1000.0);
        let opt = HybridGeneticOptimizer::new(constraints, 3.0, 20.0)
            .unwrap()
            .with_config(small_config())
            .with_satellite_candidates(vec![cheap]);
        let err = opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));

        let existing = vec![Sensor::from(GroundSensor::new("neg", 5.0, 5.0, -2.0))];
        let err = HybridGeneticOptimizer::new(constraints, 3.0, 20.0)
            .unwrap()
            .refine(&region, &grid, &existing, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));
    }

    #[test]
    fn test_invalid_config() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(2, 0, 10.0, 0.5).unwrap();
        let opt = HybridGeneticOptimizer::new(constraints, 1.0, 1.0)
            .unwrap()
            .with_config(GeneticConfig {
                elite_count: 40,
                ..Default::default()
            });
        assert!(opt.optimize(&region, &grid, &mut ChaCha8Rng::seed_from_u64(0)).is_err());
    }
}
