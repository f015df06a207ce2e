//! CBTSP Solver - Command Line Interface
//!
//! Balanced, clustered multiple Traveling Salesman Problem solver.

use cbtsp_solver::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use cbtsp_solver::cluster::{ClusterAssigner, ClusterPolicy};
use cbtsp_solver::distance::Metric;
use cbtsp_solver::exact::model::MipBackend;
use cbtsp_solver::exact::{ExactConfig, ExactSolver, GurobiBackend, HighsBackend};
use cbtsp_solver::export::convert_directory;
use cbtsp_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use cbtsp_solver::instance::Instance;
use cbtsp_solver::solution::{Solution, SolveStatus};
use cbtsp_solver::visualization::Visualizer;
use clap::{Args, Parser, Subcommand, ValueEnum};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cbtsp-solver")]
#[command(version = "1.0")]
#[command(about = "Balanced, clustered multi-salesman routing solver")]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single instance
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// Algorithm to use
        #[arg(short, long, value_enum, default_value = "ga")]
        algorithm: Algorithm,

        /// Time limit in seconds
        #[arg(short, long, default_value = "600")]
        time_limit: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[command(flatten)]
        ga: GaArgs,

        /// Largest workload difference allowed between two salesmen (exact)
        #[arg(long, default_value = "1")]
        max_imbalance: f64,

        /// Warm-start the exact solver from a GA run
        #[arg(long)]
        warm_start: bool,

        /// Fall back to the GA when the exact solver fails or finds nothing
        #[arg(long)]
        fallback: bool,

        /// MIP solver used by the exact algorithm
        #[arg(long, value_enum, default_value = "highs")]
        backend: Backend,

        /// Output solution to file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate PNG (or SVG) visualization next to the instance
        #[arg(long)]
        visualize: bool,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing .cbtsp files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of GA runs per instance
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per GA run
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        #[command(flatten)]
        ga: GaArgs,

        /// Also run the exact solver
        #[arg(long)]
        exact: bool,

        /// MIP solver used by the exact runs
        #[arg(long, value_enum, default_value = "highs")]
        backend: Backend,

        /// Exact solver time limit
        #[arg(long, default_value = "300")]
        exact_time_limit: f64,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(long, value_enum)]
        metric: Option<MetricArg>,
    },

    /// Convert .cbtsp instances to AMPL .dat files
    Convert {
        /// Directory containing .cbtsp files
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for .dat files
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum)]
        metric: Option<MetricArg>,
    },
}

/// Options shared by every command that runs the GA.
#[derive(Args, Clone)]
struct GaArgs {
    /// GA population size
    #[arg(long, default_value = "100")]
    population: usize,

    /// GA generation cap
    #[arg(long, default_value = "1000")]
    generations: usize,

    /// GA swap-mutation probability
    #[arg(long, default_value = "0.2")]
    mutation_prob: f64,

    /// Override the metric given by EDGE_WEIGHT_TYPE
    #[arg(long, value_enum)]
    metric: Option<MetricArg>,

    /// Treat exclusivity sets as ignored or enforced
    #[arg(long, value_enum, default_value = "ignore")]
    cluster_policy: PolicyArg,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Algorithm {
    /// Genetic Algorithm
    Ga,
    /// Exact MILP solver
    Exact,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Backend {
    /// HiGHS (open source)
    Highs,
    /// Gurobi (requires the `gurobi` feature and a license)
    Gurobi,
}

impl Backend {
    fn solver(self) -> Box<dyn MipBackend> {
        match self {
            Backend::Highs => Box::new(HighsBackend::new()),
            Backend::Gurobi => Box::new(GurobiBackend::new()),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum MetricArg {
    /// Great-circle distance in km on (lat, lon)
    Haversine,
    /// Planar Euclidean distance
    Euclidean,
}

impl From<MetricArg> for Metric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Haversine => Metric::Haversine,
            MetricArg::Euclidean => Metric::Euclidean,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum PolicyArg {
    Ignore,
    Enforce,
}

impl From<PolicyArg> for ClusterPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Ignore => ClusterPolicy::Ignore,
            PolicyArg::Enforce => ClusterPolicy::Enforce,
        }
    }
}

impl GaArgs {
    fn config(&self, seed: u64, time_limit: f64) -> GAConfig {
        GAConfig {
            population_size: self.population,
            max_generations: self.generations,
            time_limit,
            mutation_prob: self.mutation_prob,
            seed,
            cluster_policy: self.cluster_policy.into(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match cli.command {
        Commands::Solve { instance, algorithm, time_limit, seed, ga, max_imbalance, warm_start, fallback, backend, output, visualize } => {
            solve_instance(&instance, algorithm, time_limit, seed, &ga, max_imbalance, warm_start, fallback, backend, output, visualize, cli.verbose);
        }

        Commands::Benchmark { dir, output, runs, time_limit, ga, exact, backend, exact_time_limit, max_size } => {
            run_benchmark(&dir, &output, runs, time_limit, &ga, exact, backend, exact_time_limit, max_size);
        }

        Commands::Analyze { instance, metric } => {
            analyze_instance(&instance, metric.map(Metric::from));
        }

        Commands::Convert { input, output, metric } => {
            match convert_directory(&input, &output, metric.map(Metric::from)) {
                Ok(n) => println!("Converted {} instance(s) into {:?}", n, output),
                Err(e) => {
                    eprintln!("Conversion failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn load_or_exit(path: &Path, metric: Option<Metric>) -> Instance {
    match Instance::from_file(path, metric) {
        Ok(inst) => inst,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_ga(instance: &Instance, config: GAConfig) -> (Solution, Option<Vec<Vec<usize>>>) {
    let mut ga = match GeneticAlgorithm::new(instance, config) {
        Ok(ga) => ga,
        Err(e) => {
            eprintln!("Invalid GA configuration: {}", e);
            std::process::exit(1);
        }
    };
    let solution = ga.run();
    let routes = ga.best_individual().map(|b| b.routes.clone());
    (solution, routes)
}

#[allow(clippy::too_many_arguments)]
fn solve_instance(
    path: &Path,
    algorithm: Algorithm,
    time_limit: f64,
    seed: u64,
    ga: &GaArgs,
    max_imbalance: f64,
    warm_start: bool,
    fallback: bool,
    backend: Backend,
    output: Option<PathBuf>,
    visualize: bool,
    verbose: bool,
) {
    println!("Loading instance from {:?}...", path);
    let instance = load_or_exit(path, ga.metric.map(Metric::from));

    if verbose {
        println!("{}", instance.statistics());
    }

    println!("Solving with {:?} algorithm...", algorithm);

    let solution = match algorithm {
        Algorithm::Ga => run_ga(&instance, ga.config(seed, time_limit)).0,

        Algorithm::Exact => {
            let warm = if warm_start {
                run_ga(&instance, ga.config(seed, (time_limit / 10.0).max(1.0))).1
            } else {
                None
            };

            let config = ExactConfig {
                time_limit,
                max_imbalance,
                verbose,
                warm_start: warm,
                cluster_policy: ga.cluster_policy.into(),
                ..Default::default()
            };
            let backend = backend.solver();
            let result = ExactSolver::new(config).solve(&instance, backend.as_ref());

            match result {
                Ok(result) if result.solution.status != SolveStatus::Infeasible || !fallback => {
                    println!("MIP status: {:?}", result.status);
                    println!("Lower bound: {:.2}", result.lower_bound);
                    println!("Gap: {:.4}%", result.gap * 100.0);
                    println!("Nodes explored: {}", result.nodes_explored);
                    result.solution
                }
                Ok(_) => {
                    println!("No feasible MIP solution; falling back to the genetic algorithm");
                    run_ga(&instance, ga.config(seed, time_limit)).0
                }
                Err(e) if fallback => {
                    eprintln!("Exact solver error: {}; falling back to the genetic algorithm", e);
                    run_ga(&instance, ga.config(seed, time_limit)).0
                }
                Err(e) => {
                    eprintln!("Exact solver error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    println!("\n========== Results ==========");
    print!("{}", solution);
    if solution.num_tours() < instance.salesmen {
        println!(
            "Warning: only {} of {} salesmen received a tour",
            solution.num_tours(),
            instance.salesmen
        );
    }

    if let Some(out_path) = output {
        match serde_json::to_string_pretty(&solution) {
            Ok(json) => match std::fs::write(&out_path, json) {
                Ok(()) => println!("\nSolution saved to {:?}", out_path),
                Err(e) => eprintln!("Failed to write {:?}: {}", out_path, e),
            },
            Err(e) => eprintln!("Failed to serialize solution: {}", e),
        }
    }

    if visualize {
        let viz = Visualizer::new();
        let svg = viz.generate_svg(&instance, &solution);
        match viz.save_image(&svg, &path.with_extension("png")) {
            Ok(written) => println!("Visualization saved to {:?}", written),
            Err(e) => eprintln!("Failed to save visualization: {}", e),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_benchmark(
    dir: &Path,
    output: &Path,
    runs: usize,
    time_limit: f64,
    ga: &GaArgs,
    exact: bool,
    backend: Backend,
    exact_time_limit: f64,
    max_size: Option<usize>,
) {
    println!("Loading instances from {:?}...", dir);

    let mut instances = load_instances_from_dir(dir, ga.metric.map(Metric::from));

    if let Some(max) = max_size {
        instances.retain(|i| i.dimension <= max);
    }

    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        eprintln!("No instances found!");
        return;
    }

    if let Err(e) = std::fs::create_dir_all(output) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    let config = BenchmarkConfig {
        num_runs: runs,
        time_limit,
        population_size: ga.population,
        max_generations: ga.generations,
        mutation_prob: ga.mutation_prob,
        cluster_policy: ga.cluster_policy.into(),
        run_exact: exact,
        exact_time_limit,
        ..Default::default()
    };

    let mut benchmark = Benchmark::new(config);
    let backend = backend.solver();

    for (i, instance) in instances.iter().enumerate() {
        println!("\n[{}/{}] Processing {} (n={}, m={})...",
            i + 1, instances.len(), instance.name, instance.dimension, instance.salesmen);

        let backend: Option<&dyn MipBackend> = if exact { Some(backend.as_ref()) } else { None };
        benchmark.run_instance(instance, backend);
    }

    let results_path = output.join("results.csv");
    match benchmark.export_to_csv(&results_path) {
        Ok(()) => println!("\nResults exported to {:?}", results_path),
        Err(e) => eprintln!("Failed to export results: {}", e),
    }

    let stats_path = output.join("statistics.csv");
    match benchmark.export_statistics_csv(&stats_path) {
        Ok(()) => println!("Statistics exported to {:?}", stats_path),
        Err(e) => eprintln!("Failed to export statistics: {}", e),
    }

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    match std::fs::write(&report_path, &report) {
        Ok(()) => println!("Report saved to {:?}", report_path),
        Err(e) => eprintln!("Failed to save report: {}", e),
    }
}

fn analyze_instance(path: &Path, metric: Option<Metric>) {
    let instance = load_or_exit(path, metric);

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    println!("\nQuick Solution Estimates:");
    for policy in [ClusterPolicy::Ignore, ClusterPolicy::Enforce] {
        let routes = ClusterAssigner::new(&instance, policy).round_robin().into_groups();
        let rr = Solution::from_routes(&instance, &routes, SolveStatus::Heuristic, "RoundRobin");
        println!(
            "  Round-robin ({:?}): sum {:.2}, max {:.2}",
            policy, rr.total_cost, rr.max_cost
        );
    }

    let config = GAConfig {
        population_size: 20,
        max_generations: 100,
        time_limit: 10.0,
        ..Default::default()
    };
    let (ga_sol, _) = run_ga(&instance, config);
    println!(
        "  GA (20 x 100): sum {:.2}, max {:.2}",
        ga_sol.total_cost, ga_sol.max_cost
    );
}
