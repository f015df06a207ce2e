//! Solution representation and reporting.
//!
//! A solution is a set of closed depot tours, one per salesman, together with
//! the aggregate costs and the way it was obtained.

use crate::instance::Instance;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// How trustworthy a solution is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal by the MIP solver
    Optimal,
    /// Best incumbent when the MIP time limit was hit
    TimeLimitFeasible,
    /// No incumbent; the solution holds no tours
    Infeasible,
    /// The solver's edge set could not be fully decoded into tours
    ReconstructionDegraded,
    /// Produced by a heuristic, no optimality claim
    Heuristic,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::TimeLimitFeasible => "TimeLimitFeasible",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::ReconstructionDegraded => "ReconstructionDegraded",
            SolveStatus::Heuristic => "Heuristic",
        };
        write!(f, "{}", s)
    }
}

/// One salesman's closed tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    /// `[depot, .., depot]`
    pub nodes: Vec<usize>,
    pub cost: f64,
}

impl Tour {
    pub fn new(instance: &Instance, nodes: Vec<usize>) -> Self {
        let cost = instance.tour_cost(&nodes);
        Tour { nodes, cost }
    }

    /// Close an interior sequence at both ends with the depot.
    pub fn from_route(instance: &Instance, route: &[usize]) -> Self {
        let mut nodes = Vec::with_capacity(route.len() + 2);
        nodes.push(instance.depot);
        nodes.extend_from_slice(route);
        nodes.push(instance.depot);
        Tour::new(instance, nodes)
    }

    /// Nodes strictly between the two depot visits.
    pub fn interior(&self) -> &[usize] {
        if self.nodes.len() < 2 {
            return &[];
        }
        &self.nodes[1..self.nodes.len() - 1]
    }

    /// Number of edges travelled.
    pub fn workload(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Result of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub tours: Vec<Tour>,
    /// Sum of the individual tour costs
    pub total_cost: f64,
    /// Largest individual tour cost
    pub max_cost: f64,
    pub status: SolveStatus,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Generations (GA) or reconstruction walks (exact)
    pub iterations: Option<usize>,
    /// Objective value reported by the solver, if any
    pub objective: Option<f64>,
}

impl Solution {
    /// Solution without tours, used for infeasible outcomes.
    pub fn empty(status: SolveStatus, algorithm: &str) -> Self {
        Solution {
            tours: Vec::new(),
            total_cost: 0.0,
            max_cost: 0.0,
            status,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
            objective: None,
        }
    }

    /// Build from closed tours `[depot, .., depot]`.
    pub fn from_tours(instance: &Instance, tours: Vec<Vec<usize>>, status: SolveStatus, algorithm: &str) -> Self {
        let tours = tours.into_iter().map(|t| Tour::new(instance, t)).collect();
        Self::with_tours(tours, status, algorithm)
    }

    /// Build from per-salesman interior sequences (depot implicit). Empty
    /// routes become `[depot, depot]` tours of cost 0.
    pub fn from_routes(instance: &Instance, routes: &[Vec<usize>], status: SolveStatus, algorithm: &str) -> Self {
        let tours = routes.iter().map(|r| Tour::from_route(instance, r)).collect();
        Self::with_tours(tours, status, algorithm)
    }

    fn with_tours(tours: Vec<Tour>, status: SolveStatus, algorithm: &str) -> Self {
        let mut solution = Solution::empty(status, algorithm);
        solution.tours = tours;
        solution.recompute_costs();
        solution
    }

    pub fn recompute_costs(&mut self) {
        self.total_cost = self.tours.iter().map(|t| t.cost).sum();
        self.max_cost = self.tours.iter().map(|t| t.cost).fold(0.0, f64::max);
    }

    pub fn num_tours(&self) -> usize {
        self.tours.len()
    }

    /// Every non-depot node appears in exactly one tour, and only there.
    pub fn is_complete(&self, instance: &Instance) -> bool {
        let mut seen = HashSet::new();
        for tour in &self.tours {
            if tour.nodes.first() != Some(&instance.depot) || tour.nodes.last() != Some(&instance.depot) {
                return false;
            }
            for &id in tour.interior() {
                if id == instance.depot || !instance.contains(id) || !seen.insert(id) {
                    return false;
                }
            }
        }
        seen.len() == instance.num_customers()
    }

    /// Each tour serves at most one exclusivity set and no set is split over
    /// several tours.
    pub fn respects_clusters(&self, instance: &Instance) -> bool {
        let mut served = HashSet::new();
        for tour in &self.tours {
            let owners: HashSet<usize> = tour
                .interior()
                .iter()
                .filter_map(|&id| instance.exclusive_owner(id))
                .collect();
            if owners.len() > 1 {
                return false;
            }
            if owners.into_iter().any(|k| !served.insert(k)) {
                return false;
            }
        }
        true
    }

    /// Difference between the longest and shortest tour, in edges.
    pub fn workload_spread(&self) -> usize {
        let max = self.tours.iter().map(Tour::workload).max().unwrap_or(0);
        let min = self.tours.iter().map(Tour::workload).min().unwrap_or(0);
        max - min
    }

    pub fn is_feasible(&self) -> bool {
        self.status != SolveStatus::Infeasible
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Status: {}", self.status)?;
        if let Some(obj) = self.objective {
            writeln!(f, "  Objective: {:.2}", obj)?;
        }
        for (k, tour) in self.tours.iter().enumerate() {
            let route: Vec<String> = tour.nodes.iter().map(|n| n.to_string()).collect();
            writeln!(f, "  Salesman {}: cost {:.2}", k + 1, tour.cost)?;
            writeln!(f, "    {}", route.join(" → "))?;
        }
        writeln!(f, "  Sum of costs: {:.2}", self.total_cost)?;
        writeln!(f, "  Max cost: {:.2}", self.max_cost)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        Ok(())
    }
}
