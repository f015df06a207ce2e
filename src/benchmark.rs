//! Benchmarking and experimentation module.
//!
//! Runs the genetic algorithm over several seeds (in parallel) and optionally
//! the exact solver on a set of instances, collects one [`RunResult`] per run
//! and summarizes them per algorithm.

use crate::cluster::ClusterPolicy;
use crate::distance::Metric;
use crate::exact::model::MipBackend;
use crate::exact::{ExactConfig, ExactResult, ExactSolver};
use crate::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use crate::instance::Instance;
use crate::solution::Solution;

use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Result of running a single algorithm on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Algorithm name
    pub algorithm: String,
    /// Instance name
    pub instance: String,
    /// Instance dimension
    pub dimension: usize,
    pub salesmen: usize,
    /// Seed of stochastic runs
    pub seed: Option<u64>,
    /// Sum of tour costs
    pub total_cost: f64,
    /// Largest tour cost
    pub max_cost: f64,
    /// Edge-count difference between longest and shortest tour
    pub workload_spread: usize,
    pub tours: usize,
    pub status: String,
    /// Whether every customer is visited exactly once
    pub complete: bool,
    /// Computation time in seconds
    pub time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
    /// RFC 3339 wall-clock time of the run
    pub timestamp: String,
}

impl RunResult {
    pub fn from_solution(instance: &Instance, solution: &Solution, seed: Option<u64>) -> Self {
        RunResult {
            algorithm: solution.algorithm.clone(),
            instance: instance.name.clone(),
            dimension: instance.dimension,
            salesmen: instance.salesmen,
            seed,
            total_cost: solution.total_cost,
            max_cost: solution.max_cost,
            workload_spread: solution.workload_spread(),
            tours: solution.num_tours(),
            status: solution.status.to_string(),
            complete: solution.is_complete(instance),
            time: solution.computation_time,
            iterations: solution.iterations,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    /// Algorithm name
    pub algorithm: String,
    pub num_runs: usize,
    /// Runs whose tours cover every customer
    pub num_complete: usize,
    /// Average cost
    pub avg_cost: f64,
    /// Best cost
    pub best_cost: f64,
    /// Worst cost
    pub worst_cost: f64,
    /// Sample standard deviation of cost (0 for a single run)
    pub std_cost: f64,
    pub avg_max_cost: f64,
    /// Average time
    pub avg_time: f64,
    /// Total time
    pub total_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of GA runs (seeds `0..num_runs`) per instance
    pub num_runs: usize,
    /// Time limit per GA run in seconds
    pub time_limit: f64,
    pub population_size: usize,
    pub max_generations: usize,
    pub mutation_prob: f64,
    pub cluster_policy: ClusterPolicy,
    /// Run exact solver
    pub run_exact: bool,
    /// Exact solver time limit
    pub exact_time_limit: f64,
    pub max_imbalance: f64,
    /// Run GA seeds in parallel
    pub parallel: bool,
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            time_limit: 60.0,
            population_size: 100,
            max_generations: 1000,
            mutation_prob: 0.2,
            cluster_policy: ClusterPolicy::Ignore,
            run_exact: false,
            exact_time_limit: 300.0,
            max_imbalance: 1.0,
            parallel: true,
            show_progress: true,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    fn ga_config(&self, seed: u64) -> GAConfig {
        GAConfig {
            population_size: self.config.population_size,
            max_generations: self.config.max_generations,
            time_limit: self.config.time_limit,
            mutation_prob: self.config.mutation_prob,
            seed,
            cluster_policy: self.config.cluster_policy,
        }
    }

    fn progress_bar(&self, len: u64, message: String) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::with_template("{msg:<24} [{bar:30}] {pos}/{len} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(message);
        pb
    }

    /// Run the GA once per seed and record every run.
    pub fn run_ga(&mut self, instance: &Instance) -> Result<(), String> {
        // Validate once before spawning runs.
        GeneticAlgorithm::new(instance, self.ga_config(0))?;

        let seeds: Vec<u64> = (0..self.config.num_runs as u64).collect();
        let pb = self.progress_bar(seeds.len() as u64, format!("GA {}", instance.name));

        let run = |seed: u64| -> Option<RunResult> {
            let mut ga = GeneticAlgorithm::new(instance, self.ga_config(seed)).ok()?;
            let solution = ga.run();
            pb.inc(1);
            Some(RunResult::from_solution(instance, &solution, Some(seed)))
        };

        let runs: Vec<RunResult> = if self.config.parallel {
            seeds.par_iter().filter_map(|&s| run(s)).collect()
        } else {
            seeds.iter().filter_map(|&s| run(s)).collect()
        };
        pb.finish_and_clear();

        self.results.extend(runs);
        Ok(())
    }

    /// Run exact solver on instance, warm-started from the best GA run so far.
    pub fn run_exact(&mut self, instance: &Instance, backend: &dyn MipBackend) -> Option<ExactResult> {
        if !self.config.run_exact {
            return None;
        }

        let warm_start = GeneticAlgorithm::new(instance, self.ga_config(0))
            .ok()
            .and_then(|mut ga| {
                ga.run();
                ga.best_individual().map(|b| b.routes.clone())
            });

        let solver = ExactSolver::new(ExactConfig {
            time_limit: self.config.exact_time_limit,
            max_imbalance: self.config.max_imbalance,
            warm_start,
            cluster_policy: self.config.cluster_policy,
            ..Default::default()
        });

        match solver.solve(instance, backend) {
            Ok(result) => {
                self.results
                    .push(RunResult::from_solution(instance, &result.solution, None));
                Some(result)
            }
            Err(e) => {
                log::error!("Exact solver failed on {}: {}", instance.name, e);
                None
            }
        }
    }

    /// Run full benchmark on an instance
    pub fn run_instance(&mut self, instance: &Instance, backend: Option<&dyn MipBackend>) {
        log::info!("Running benchmark on instance: {}", instance.name);
        if let Err(e) = self.run_ga(instance) {
            log::error!("GA skipped on {}: {}", instance.name, e);
        }
        if let Some(backend) = backend {
            self.run_exact(instance, backend);
        }
    }

    /// Run benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[Instance], backend: Option<&dyn MipBackend>) {
        for instance in instances {
            self.run_instance(instance, backend);
        }
    }

    /// Compute statistics for each algorithm
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut by_algorithm: BTreeMap<&str, Vec<&RunResult>> = BTreeMap::new();
        for result in &self.results {
            by_algorithm.entry(result.algorithm.as_str()).or_default().push(result);
        }

        let mut statistics: Vec<AlgorithmStatistics> = by_algorithm
            .into_iter()
            .filter_map(|(algo, runs)| {
                let solved: Vec<&&RunResult> = runs.iter().filter(|r| r.tours > 0).collect();
                if solved.is_empty() {
                    return None;
                }
                let costs: Vec<f64> = solved.iter().map(|r| r.total_cost).collect();
                let max_costs: Vec<f64> = solved.iter().map(|r| r.max_cost).collect();
                let times: Vec<f64> = solved.iter().map(|r| r.time).collect();

                let std_cost = if costs.len() > 1 { costs.iter().std_dev() } else { 0.0 };
                Some(AlgorithmStatistics {
                    algorithm: algo.to_string(),
                    num_runs: runs.len(),
                    num_complete: runs.iter().filter(|r| r.complete).count(),
                    avg_cost: costs.iter().mean(),
                    best_cost: costs.iter().cloned().fold(f64::INFINITY, f64::min),
                    worst_cost: costs.iter().cloned().fold(0.0, f64::max),
                    std_cost,
                    avg_max_cost: max_costs.iter().mean(),
                    avg_time: times.iter().mean(),
                    total_time: times.iter().sum(),
                })
            })
            .collect();

        statistics.sort_by_key(|s| OrderedFloat(s.avg_cost));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("        CBTSP Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str("Algorithm Performance Summary:\n");
        report.push_str("-".repeat(88).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>10} {:>12} {:>12} {:>10} {:>12} {:>10}\n",
            "Algorithm", "Complete", "Avg Cost", "Best Cost", "Std", "Avg Max", "Avg Time"
        ));
        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        for stat in &self.compute_statistics() {
            report.push_str(&format!(
                "{:<20} {:>10} {:>12.2} {:>12.2} {:>10.2} {:>12.2} {:>10.4}\n",
                stat.algorithm,
                format!("{}/{}", stat.num_complete, stat.num_runs),
                stat.avg_cost,
                stat.best_cost,
                stat.std_cost,
                stat.avg_max_cost,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");
        let mut instance_best: BTreeMap<&str, &RunResult> = BTreeMap::new();
        for result in self.results.iter().filter(|r| r.complete) {
            let entry = instance_best.entry(result.instance.as_str()).or_insert(result);
            if result.total_cost < entry.total_cost {
                *entry = result;
            }
        }
        for (instance, best) in &instance_best {
            report.push_str(&format!(
                "  {}: {:.2} (max tour {:.2}, {})\n",
                instance, best.total_cost, best.max_cost, best.algorithm
            ));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }
}

/// Load every `.cbtsp` instance of a directory, sorted by dimension.
/// Files that fail to parse are logged and skipped.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P, metric: Option<Metric>) -> Vec<Instance> {
    let mut instances = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "cbtsp").unwrap_or(false) {
                match Instance::from_file(&path, metric) {
                    Ok(instance) => instances.push(instance),
                    Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }
    }

    instances.sort_by(|a, b| a.dimension.cmp(&b.dimension).then_with(|| a.name.cmp(&b.name)));

    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::line_instance;

    fn quick_config() -> BenchmarkConfig {
        BenchmarkConfig {
            num_runs: 3,
            time_limit: 5.0,
            population_size: 8,
            max_generations: 10,
            show_progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.num_runs, 5);
        assert!(!config.run_exact);
    }

    #[test]
    fn test_ga_runs_are_recorded() {
        let instance = line_instance(8, 2);
        let mut bench = Benchmark::new(quick_config());
        bench.run_instance(&instance, None);

        assert_eq!(bench.results().len(), 3);
        let mut seeds: Vec<u64> = bench.results().iter().filter_map(|r| r.seed).collect();
        seeds.sort_unstable();
        assert_eq!(seeds, vec![0, 1, 2]);
        assert!(bench.results().iter().all(|r| r.complete && r.tours == 2));

        let stats = bench.compute_statistics();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].num_runs, 3);
        assert!(stats[0].best_cost <= stats[0].avg_cost + 1e-9);
        assert!(stats[0].avg_cost <= stats[0].worst_cost + 1e-9);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let instance = line_instance(10, 3);
        let mut par = Benchmark::new(quick_config());
        par.run_ga(&instance).unwrap();
        let mut seq = Benchmark::new(BenchmarkConfig {
            parallel: false,
            ..quick_config()
        });
        seq.run_ga(&instance).unwrap();

        let costs = |b: &Benchmark| {
            let mut v: Vec<(u64, f64)> = b.results().iter().map(|r| (r.seed.unwrap_or(0), r.total_cost)).collect();
            v.sort_by_key(|&(s, _)| s);
            v
        };
        assert_eq!(costs(&par), costs(&seq));
    }

    #[test]
    fn test_report_and_csv() {
        let instance = line_instance(6, 2);
        let mut bench = Benchmark::new(quick_config());
        bench.run_instance(&instance, None);

        let report = bench.generate_report();
        assert!(report.contains("GeneticAlgorithm"));
        assert!(report.contains("line:"));

        let path = std::env::temp_dir().join(format!("cbtsp-bench-{}.csv", std::process::id()));
        bench.export_to_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("algorithm,instance,dimension,salesmen"));
        assert_eq!(text.lines().count(), 4);
        let _ = std::fs::remove_file(&path);
    }
}
