//! Population lifecycle: init → evaluate → select → recombine → replace.
//!
//! One [`EvolutionLoop`] owns a population of `(Genome, fitness)` pairs and
//! advances it a generation at a time. Evaluation routes every genome
//! through an [`Agent`] to the external generator, scores the text on the
//! evaluator axes, gates on hard constraints, and keeps the Pareto front as
//! elites while tournament winners produce offspring.
//!
//! Everything stochastic flows from the run seed through [`RngKey`]
//! splitting, so a run replays exactly. Every structural event (init,
//! crossover, mutate, generation) lands in the audit log.

use std::collections::BTreeMap;

use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde_json::json;

use qube_core::{AuditLog, Generator};

use crate::agent::Agent;
use crate::evaluator::{AxisWeights, Evaluator};
use crate::fitness::{
    check_hard_constraints, compute_fitness, default_floors, pareto_front_indices, tournament_select,
    FitnessWeights,
};
use crate::genome::{Genome, GenomeMeta};
use crate::mutation::{adapter_noise_mutation, crossover, mutate};
use crate::rng::RngKey;

/// Fitness assigned to genomes that fail a hard constraint; excludes them
/// from parenthood without removing them from the record.
const FAILED_FITNESS: f32 = f32::MIN;

/// Parameters of one evolutionary run.
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub pop_size: usize,
    pub adapter_dim: usize,
    pub concept_dim: usize,
    pub hypercube_n: usize,
    /// Tournament size for parent selection.
    pub tournament_k: usize,
    /// L2 cap on per-generation adapter drift.
    pub mutation_cap: f32,
    /// Hard selection floors (axis name → minimum).
    pub fitness_floors: BTreeMap<String, f32>,
    pub fitness_weights: FitnessWeights,
    /// Objectives for the elite Pareto front.
    pub pareto_objectives: Vec<String>,
    /// Prompt all genomes are evaluated on.
    pub prompt: String,
    pub temperature: f32,
    pub seed: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            pop_size: 16,
            adapter_dim: 32,
            concept_dim: 16,
            hypercube_n: 8,
            tournament_k: 3,
            mutation_cap: 0.2,
            fitness_floors: default_floors(),
            fitness_weights: FitnessWeights::default(),
            pareto_objectives: vec![
                "coherence".to_string(),
                "factuality".to_string(),
                "novelty".to_string(),
            ],
            prompt: "Describe the concept.".to_string(),
            temperature: 1.0,
            seed: 42,
        }
    }
}

impl EvolutionConfig {
    /// Builder: set population size.
    pub fn with_pop_size(mut self, pop_size: usize) -> Self {
        self.pop_size = pop_size;
        self
    }

    /// Builder: set genome dimensions.
    pub fn with_dims(mut self, adapter_dim: usize, concept_dim: usize, hypercube_n: usize) -> Self {
        self.adapter_dim = adapter_dim;
        self.concept_dim = concept_dim;
        self.hypercube_n = hypercube_n;
        self
    }

    /// Builder: set the run seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: set the evaluation prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

/// Deterministic population init: small-scale zero-mean Gaussian adapters
/// and bias, uniform random mask bits, PIP with probability 0.1. Appends an
/// `init_population` audit record.
pub fn init_population(
    config: &EvolutionConfig,
    key: RngKey,
    audit: &AuditLog,
) -> Result<Vec<Genome>> {
    let mut rng = key.to_rng();
    let mut pop = Vec::with_capacity(config.pop_size);
    for _ in 0..config.pop_size {
        let adapters = (0..config.adapter_dim)
            .map(|_| {
                let x: f32 = StandardNormal.sample(&mut rng);
                x * 0.02
            })
            .collect();
        let concept_bias = (0..config.concept_dim)
            .map(|_| {
                let x: f32 = StandardNormal.sample(&mut rng);
                x * 0.01
            })
            .collect();
        let hypercube_mask = (0..config.hypercube_n)
            .map(|_| rng.gen_range(0..2u8))
            .collect();
        let meta = GenomeMeta {
            lambda_con: rng.gen::<f32>(),
            mutation_rate: 0.1,
            pip: rng.gen::<f64>() < 0.1,
        };
        pop.push(Genome::new(adapters, concept_bias, hypercube_mask, meta, &mut rng));
    }
    audit.record(
        "init_population",
        json!({"pop_size": config.pop_size, "adapter_dim": config.adapter_dim}),
    )?;
    Ok(pop)
}

/// Outcome of one generational step.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    pub generation: usize,
    /// Best scalar fitness among constraint-passing members (0 when none pass).
    pub best_fitness: f32,
    pub mean_fitness: f32,
    /// Size of the elite Pareto front.
    pub front_size: usize,
    /// Members that cleared the hard constraints.
    pub survivors: usize,
}

impl std::fmt::Display for GenerationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gen {}: best={:.3} mean={:.3} front={} survivors={}",
            self.generation, self.best_fitness, self.mean_fitness, self.front_size, self.survivors
        )
    }
}

/// The evolutionary loop over one population.
///
/// Stochastic state is a root key plus the generation counter: generation
/// `g` always runs on `root_key.derive(g + 1)` (index 0 is population
/// init), so any generation replays from the seed alone.
pub struct EvolutionLoop<'a> {
    config: EvolutionConfig,
    evaluator: Evaluator,
    audit: &'a AuditLog,
    population: Vec<(Genome, f32)>,
    root_key: RngKey,
    generation: usize,
}

impl<'a> EvolutionLoop<'a> {
    /// Initialize the population from the config seed.
    pub fn new(config: EvolutionConfig, audit: &'a AuditLog) -> Result<Self> {
        let root_key = RngKey::new(config.seed);
        let genomes = init_population(&config, root_key.derive(0), audit)?;
        let population = genomes.into_iter().map(|g| (g, 0.0)).collect();
        Ok(EvolutionLoop {
            config,
            evaluator: Evaluator::new(),
            audit,
            population,
            root_key,
            generation: 0,
        })
    }

    pub fn population(&self) -> &[(Genome, f32)] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Run one generation: evaluate, gate, keep the Pareto front as elites,
    /// fill the rest with mutated crossover offspring of tournament winners.
    pub fn step(&mut self, generator: Option<&dyn Generator>) -> Result<GenerationSummary> {
        let step_key = self.root_key.derive(self.generation as u64 + 1);
        let mut rng = step_key.to_rng();

        // Evaluate every member through Agent -> Evaluator -> fitness.
        let mut metrics: Vec<BTreeMap<String, f32>> = Vec::with_capacity(self.population.len());
        for (genome, fitness) in self.population.iter_mut() {
            let agent = Agent::new(genome, generator);
            let output = agent.generate(&self.config.prompt, self.config.temperature);
            let scores = self.evaluator.score(&output, "").as_map();
            let (pass, _failed) = check_hard_constraints(&scores, &self.config.fitness_floors);
            *fitness = if pass {
                compute_fitness(&scores, &self.config.fitness_weights)
            } else {
                FAILED_FITNESS
            };
            metrics.push(scores);
        }

        let passing: Vec<(Genome, f32)> = self
            .population
            .iter()
            .filter(|(_, f)| *f > FAILED_FITNESS)
            .cloned()
            .collect();
        let survivors = passing.len();

        // Elite Pareto front over the passing members only.
        let objectives: Vec<&str> = self
            .config
            .pareto_objectives
            .iter()
            .map(String::as_str)
            .collect();
        let passing_metrics: Vec<BTreeMap<String, f32>> = self
            .population
            .iter()
            .zip(metrics.iter())
            .filter(|((_, f), _)| *f > FAILED_FITNESS)
            .map(|(_, m)| m.clone())
            .collect();
        let front = pareto_front_indices(&passing_metrics, &objectives);
        let front_size = front.len();

        let mut next: Vec<(Genome, f32)> = front
            .iter()
            .take(self.config.pop_size / 2)
            .map(|&i| passing[i].clone())
            .collect();

        // Parent pool: constraint-passing members, else the whole population
        // (a degenerate generation still has to produce offspring).
        let pool: &[(Genome, f32)] = if passing.is_empty() {
            &self.population
        } else {
            &passing
        };

        while next.len() < self.config.pop_size {
            let parent_a = tournament_select(pool, self.config.tournament_k, &mut rng);
            let parent_b = tournament_select(pool, self.config.tournament_k, &mut rng);
            let mut child = crossover(&parent_a, &parent_b, &mut rng, self.audit)?;
            mutate(&mut child, &mut rng, self.config.mutation_cap, self.audit)?;
            next.push((child, 0.0));
        }

        self.population = next;
        self.generation += 1;

        let (best, mean) = if survivors == 0 {
            (0.0, 0.0)
        } else {
            let fits: Vec<f32> = passing.iter().map(|(_, f)| *f).collect();
            let best = fits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            (best, fits.iter().sum::<f32>() / fits.len() as f32)
        };
        let summary = GenerationSummary {
            generation: self.generation,
            best_fitness: best,
            mean_fitness: mean,
            front_size,
            survivors,
        };
        self.audit.record(
            "generation",
            json!({
                "generation": summary.generation,
                "best": summary.best_fitness,
                "mean": summary.mean_fitness,
                "front_size": summary.front_size,
                "survivors": summary.survivors,
            }),
        )?;
        Ok(summary)
    }
}

/// Greedy hill-climb refinement of one genome: up to `budget` small adapter
/// perturbations, keeping a candidate only when its aggregate score is
/// strictly greater than the incumbent's. Ties keep the incumbent; `best`
/// starts from the unperturbed genome's own score.
pub fn memetic_local_search(
    genome: &Genome,
    generator: Option<&dyn Generator>,
    evaluator: &Evaluator,
    prompt: &str,
    budget: usize,
    rng: &mut impl Rng,
) -> (Genome, f32) {
    let weights = AxisWeights::default();
    let score_of = |g: &Genome| {
        let out = Agent::new(g, generator).generate(prompt, 1.0);
        evaluator.aggregate(&evaluator.score(&out, ""), &weights)
    };

    let mut best = genome.clone();
    let mut best_score = score_of(&best);
    for _ in 0..budget {
        let mut candidate = best.clone();
        candidate.adapters = adapter_noise_mutation(&best.adapters, rng, 0.01, 0.05);
        let score = score_of(&candidate);
        if score > best_score {
            best = candidate;
            best_score = score;
        }
    }
    (best, best_score)
}
