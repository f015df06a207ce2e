//! Genetic algorithm for the balanced multi-salesman problem.
//!
//! An individual is a list of `m` routes (depot implicit). Each generation:
//! - stable sort by fitness, keep the best half as breeding pool
//! - for every slot, pick two distinct parents from the pool
//! - crossover: pool the parents' movable nodes, shuffle, re-split evenly
//! - mutation: swap one movable node between two random salesmen
//!
//! The population is replaced wholesale (no elitism); the best individual
//! ever seen, initial population included, is what `run` returns.

use crate::cluster::{ClusterAssigner, ClusterPolicy};
use crate::context::SolveContext;
use crate::instance::Instance;
use crate::solution::{Solution, SolveStatus};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use std::collections::HashSet;

/// Smallest population that still yields a breeding pool of two.
pub const MIN_POPULATION: usize = 4;

/// Individual in the genetic algorithm population
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    /// One interior sequence per salesman
    pub routes: Vec<Vec<usize>>,
    /// Sum of the closed route costs (lower is better)
    pub fitness: f64,
}

impl Individual {
    pub fn new(routes: Vec<Vec<usize>>, instance: &Instance) -> Self {
        let fitness = routes.iter().map(|r| instance.route_cost(r)).sum();
        Individual { routes, fitness }
    }

    pub fn cost(&self) -> f64 {
        self.fitness
    }
}

/// Genetic Algorithm configuration
#[derive(Debug, Clone)]
pub struct GAConfig {
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Time limit in seconds, checked between generations
    pub time_limit: f64,
    /// Probability of applying the swap mutation to a child
    pub mutation_prob: f64,
    /// Random seed
    pub seed: u64,
    pub cluster_policy: ClusterPolicy,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            population_size: 100,
            max_generations: 1000,
            time_limit: 600.0,
            mutation_prob: 0.2,
            seed: 42,
            cluster_policy: ClusterPolicy::Ignore,
        }
    }
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm<'a> {
    config: GAConfig,
    instance: &'a Instance,
    assigner: ClusterAssigner<'a>,
    population: Vec<Individual>,
    best_individual: Option<Individual>,
    generation: usize,
    history: Vec<f64>,
}

impl<'a> GeneticAlgorithm<'a> {
    pub fn new(instance: &'a Instance, config: GAConfig) -> Result<Self, String> {
        if config.population_size < MIN_POPULATION {
            return Err(format!(
                "Population size must be at least {} (got {})",
                MIN_POPULATION, config.population_size
            ));
        }
        if instance.salesmen == 0 || instance.num_customers() == 0 {
            return Err("Instance needs at least one salesman and one customer".to_string());
        }
        if !(0.0..=1.0).contains(&config.mutation_prob) {
            return Err(format!("Mutation probability must lie in [0, 1] (got {})", config.mutation_prob));
        }

        Ok(GeneticAlgorithm {
            assigner: ClusterAssigner::new(instance, config.cluster_policy),
            config,
            instance,
            population: Vec::new(),
            best_individual: None,
            generation: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &GAConfig {
        &self.config
    }

    /// Fill the population with random even splits.
    fn initialize_population<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.population = (0..self.config.population_size)
            .map(|_| {
                let routes = self.assigner.even_split(rng).into_groups();
                Individual::new(routes, self.instance)
            })
            .collect();
        self.population.sort_by_key(|ind| OrderedFloat(ind.fitness));
        self.best_individual = self.population.first().cloned();
        if let Some(best) = &self.best_individual {
            self.history.push(best.fitness);
        }
    }

    /// Pool both parents' movable nodes (deduplicated, first-seen order) and
    /// split them evenly again.
    fn crossover<R: Rng + ?Sized>(&self, parent1: &Individual, parent2: &Individual, rng: &mut R) -> Vec<Vec<usize>> {
        let mut seen = HashSet::new();
        let pool: Vec<usize> = parent1
            .routes
            .iter()
            .chain(parent2.routes.iter())
            .flatten()
            .copied()
            .filter(|&id| self.assigner.is_free(id) && seen.insert(id))
            .collect();
        self.assigner.resplit(&pool, rng).into_groups()
    }

    /// Exchange one movable node between two distinct salesmen.
    fn mutate_swap<R: Rng + ?Sized>(&self, routes: &mut [Vec<usize>], rng: &mut R) {
        let m = routes.len();
        if m < 2 {
            return;
        }
        let a = rng.gen_range(0..m);
        let mut b = rng.gen_range(0..m - 1);
        if b >= a {
            b += 1;
        }

        let movable = |route: &[usize]| -> Vec<usize> {
            (0..route.len()).filter(|&i| self.assigner.is_free(route[i])).collect()
        };
        let (free_a, free_b) = (movable(&routes[a]), movable(&routes[b]));
        if let (Some(&i), Some(&j)) = (free_a.choose(rng), free_b.choose(rng)) {
            let tmp = routes[a][i];
            routes[a][i] = routes[b][j];
            routes[b][j] = tmp;
        }
    }

    /// Create new generation
    fn evolve<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.population.sort_by_key(|ind| OrderedFloat(ind.fitness));
        let pool_size = self.config.population_size / 2;
        let pool = &self.population[..pool_size.min(self.population.len())];

        let mut new_population = Vec::with_capacity(self.config.population_size);
        while new_population.len() < self.config.population_size {
            let parents: Vec<&Individual> = pool.choose_multiple(rng, 2).collect();
            let (p1, p2) = match parents.as_slice() {
                [p1, p2] => (*p1, *p2),
                _ => break,
            };
            let mut routes = self.crossover(p1, p2, rng);
            if rng.gen::<f64>() < self.config.mutation_prob {
                self.mutate_swap(&mut routes, rng);
            }
            new_population.push(Individual::new(routes, self.instance));
        }

        new_population.sort_by_key(|ind| OrderedFloat(ind.fitness));
        if let Some(best) = new_population.first() {
            let improved = self
                .best_individual
                .as_ref()
                .map_or(true, |current| best.fitness < current.fitness);
            if improved {
                self.best_individual = Some(best.clone());
            }
        }
        if let Some(best) = &self.best_individual {
            self.history.push(best.fitness);
        }

        self.population = new_population;
        self.generation += 1;
    }

    /// Run with a context built from the configured seed and time limit.
    pub fn run(&mut self) -> Solution {
        let mut ctx = SolveContext::seeded(self.config.seed, self.config.time_limit);
        self.run_with(&mut ctx)
    }

    /// Run the genetic algorithm
    pub fn run_with(&mut self, ctx: &mut SolveContext) -> Solution {
        self.population.clear();
        self.best_individual = None;
        self.generation = 0;
        self.history.clear();

        log::info!(
            "GA on {}: population {}, {} generations max, {:.1}s limit",
            self.instance.name,
            self.config.population_size,
            self.config.max_generations,
            self.config.time_limit
        );
        self.initialize_population(&mut ctx.rng);

        while self.generation < self.config.max_generations && !ctx.budget.expired() {
            self.evolve(&mut ctx.rng);

            if let Some(ref best) = self.best_individual {
                log::debug!(
                    "[GA] Gen {}  Best cost {:.3}  Elapsed {:.2}s",
                    self.generation,
                    best.cost(),
                    ctx.budget.elapsed_secs()
                );
            }
        }

        let routes = self
            .best_individual
            .as_ref()
            .map(|b| b.routes.clone())
            .unwrap_or_default();
        let mut solution = Solution::from_routes(self.instance, &routes, SolveStatus::Heuristic, "GeneticAlgorithm");
        solution.computation_time = ctx.budget.elapsed_secs();
        solution.iterations = Some(self.generation);
        solution.objective = self.best_individual.as_ref().map(|b| b.fitness);

        log::info!(
            "GA finished after {} generations: cost {:.2} in {:.2}s",
            self.generation,
            solution.total_cost,
            solution.computation_time
        );
        solution
    }

    pub fn best_individual(&self) -> Option<&Individual> {
        self.best_individual.as_ref()
    }

    /// Best-so-far fitness, one entry for the initial population and one per
    /// generation.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Get current generation
    pub fn current_generation(&self) -> usize {
        self.generation
    }
}
