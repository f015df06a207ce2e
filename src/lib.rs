//! CBTSP Solver Library
//!
//! A solver for the balanced, clustered multiple Traveling Salesman Problem:
//! `m` salesmen leave a shared depot, every customer is visited exactly once,
//! some customers may only be served by one given salesman, and workloads are
//! kept balanced.
//!
//! # Features
//!
//! - `.cbtsp` instance parsing with Euclidean or haversine distances
//! - Exact MILP model (MTZ subtour elimination, balance and exclusivity
//!   constraints) behind a pluggable [`exact::model::MipBackend`], with a
//!   Gurobi backend under the `gurobi` feature
//! - Tour reconstruction from solver edges with degradation reporting
//! - Genetic algorithm minimizing the sum of tour costs
//! - AMPL export, benchmarking and SVG/PNG visualization
//!
//! # Example
//!
//! ```no_run
//! use cbtsp_solver::instance::Instance;
//! use cbtsp_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
//!
//! // Load instance
//! let instance = Instance::from_file("instance.cbtsp", None).unwrap();
//!
//! // Evolve a solution
//! let mut ga = GeneticAlgorithm::new(&instance, GAConfig::default()).unwrap();
//! let solution = ga.run();
//!
//! println!("Sum of costs: {:.2}", solution.total_cost);
//! ```

pub mod distance;
pub mod instance;
pub mod context;
pub mod cluster;
pub mod reconstruct;
pub mod solution;
pub mod heuristics;
pub mod exact;
pub mod export;
pub mod benchmark;
pub mod visualization;

pub use cluster::ClusterPolicy;
pub use context::SolveContext;
pub use distance::{DistanceOracle, Metric};
pub use instance::Instance;
pub use solution::{Solution, SolveStatus};
