//! End-to-end scenarios through the public API.

use cbtsp_solver::exact::formulation::Formulation;
use cbtsp_solver::exact::model::{LinearModel, MipBackend, MipOutcome, MipStatus, SolverParams};
use cbtsp_solver::exact::{ExactConfig, ExactSolver};
use cbtsp_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use cbtsp_solver::{ClusterPolicy, Instance, Metric, SolveStatus};

const SQUARE: &str = "\
NAME : square
COMMENT : unit square, depot in a corner
TYPE : CBTSP
DIMENSION : 4
SALESMEN : 2
EDGE_WEIGHT_TYPE : EUC_2D
NODE_COORD_SECTION
1 0 0
2 1 0
3 1 1
4 0 1
DEPOT_SECTION
1
-1
EOF
";

const CLUSTERED: &str = "\
NAME : clustered
DIMENSION : 6
SALESMEN : 2
NODE_COORD_SECTION
1 0 0
2 1 0
3 2 0
4 -1 0
5 -2 0
6 0 1
CTSP_SET_SECTION
1 4 5 -1
2 2 3 -1
DEPOT_SECTION
1
-1
EOF
";

fn square() -> Instance {
    Instance::parse(SQUARE.as_bytes(), "square", Some(Metric::Euclidean)).unwrap()
}

/// Backend answering with a fixed edge set.
struct FixedEdges {
    formulation: Formulation,
    edges: Vec<(usize, usize)>,
}

impl MipBackend for FixedEdges {
    fn name(&self) -> &str {
        "fixed"
    }

    fn solve(&self, model: &LinearModel, _params: &SolverParams) -> Result<MipOutcome, String> {
        let mut values = vec![0.0; model.num_variables()];
        for &(i, j) in &self.edges {
            let v = self.formulation.route_var(i, j).ok_or("unknown edge")?;
            values[v.index()] = 1.0;
        }
        Ok(MipOutcome {
            status: MipStatus::Optimal,
            objective: Some(model.objective_value(&values)),
            values,
            bound: 0.0,
            gap: 0.0,
            nodes_explored: 0,
        })
    }
}

#[test]
fn ga_solves_unit_square() {
    let inst = square();
    assert_eq!(inst.dimension, 4);
    assert_eq!(inst.depot, 1);

    let mut ga = GeneticAlgorithm::new(
        &inst,
        GAConfig {
            population_size: 10,
            max_generations: 30,
            time_limit: 10.0,
            ..Default::default()
        },
    )
    .unwrap();
    let sol = ga.run();

    assert_eq!(sol.num_tours(), 2);
    assert!(sol.is_complete(&inst));
    assert!((sol.total_cost - (4.0 + 2f64.sqrt())).abs() < 1e-9);
    assert_eq!(sol.status, SolveStatus::Heuristic);
}

#[test]
fn ga_with_zero_time_limit_still_answers() {
    let inst = square();
    let mut ga = GeneticAlgorithm::new(
        &inst,
        GAConfig {
            time_limit: 0.0,
            ..Default::default()
        },
    )
    .unwrap();
    let sol = ga.run();
    assert_eq!(sol.iterations, Some(0));
    assert!(sol.is_complete(&inst));
}

#[test]
fn exact_decodes_solver_edges() {
    let inst = square();
    let solver = ExactSolver::new(ExactConfig::default());
    let backend = FixedEdges {
        formulation: solver.formulate(&inst),
        edges: vec![(1, 2), (2, 3), (3, 1), (1, 4), (4, 1)],
    };

    let result = solver.solve(&inst, &backend).unwrap();
    assert_eq!(result.status, MipStatus::Optimal);
    assert_eq!(result.solution.status, SolveStatus::Optimal);
    let tours: Vec<Vec<usize>> = result.solution.tours.iter().map(|t| t.nodes.clone()).collect();
    assert_eq!(tours, vec![vec![1, 2, 3, 1], vec![1, 4, 1]]);
    assert!((result.solution.total_cost - (4.0 + 2f64.sqrt())).abs() < 1e-9);
    assert_eq!(result.solution.algorithm, "Exact-fixed");
}

#[test]
fn exact_flags_disconnected_edges() {
    let nodes = "NAME : five\nDIMENSION : 5\nSALESMEN : 1\nNODE_COORD_SECTION\n\
                 1 0 0\n2 1 0\n3 1 1\n4 5 5\n5 6 5\nEOF\n";
    let inst = Instance::parse(nodes.as_bytes(), "five", Some(Metric::Euclidean)).unwrap();
    let solver = ExactSolver::new(ExactConfig::default());
    let backend = FixedEdges {
        formulation: solver.formulate(&inst),
        edges: vec![(1, 2), (2, 3), (3, 1), (4, 5), (5, 4)],
    };

    let result = solver.solve(&inst, &backend).unwrap();
    assert_eq!(result.solution.status, SolveStatus::ReconstructionDegraded);
    assert_eq!(result.solution.num_tours(), 1);
    assert_eq!(result.solution.tours[0].nodes, vec![1, 2, 3, 1]);
    assert!(!result.solution.is_complete(&inst));
}

#[test]
fn enforced_clusters_are_respected() {
    let inst = Instance::parse(CLUSTERED.as_bytes(), "clustered", None).unwrap();
    assert_eq!(inst.exclusive_owner(4), Some(1));
    assert_eq!(inst.exclusive_owner(3), Some(2));
    assert_eq!(inst.unassigned, vec![6]);

    let mut ga = GeneticAlgorithm::new(
        &inst,
        GAConfig {
            population_size: 8,
            max_generations: 20,
            cluster_policy: ClusterPolicy::Enforce,
            ..Default::default()
        },
    )
    .unwrap();
    let sol = ga.run();

    assert!(sol.is_complete(&inst));
    assert!(sol.respects_clusters(&inst));
    for (k, tour) in sol.tours.iter().enumerate() {
        for id in tour.interior() {
            if let Some(owner) = inst.exclusive_owner(*id) {
                assert_eq!(owner, k + 1, "node {} served by salesman {}", id, k + 1);
            }
        }
    }
}

#[test]
fn enforced_model_rejects_tour_bridging_clusters() {
    let inst = Instance::parse(CLUSTERED.as_bytes(), "clustered", None).unwrap();
    let solver = ExactSolver::new(ExactConfig {
        cluster_policy: ClusterPolicy::Enforce,
        ..Default::default()
    });
    let formulation = solver.formulate(&inst);

    let bridged = formulation.values_for_routes(&[vec![4, 6, 2, 3], vec![5]]);
    assert!(!formulation.model.violated_constraints(&bridged, 1e-9).is_empty());
    let clean = formulation.values_for_routes(&[vec![4, 5], vec![6, 2, 3]]);
    assert!(formulation.model.violated_constraints(&clean, 1e-9).is_empty());

    // a backend that ignores the model anyway is caught after decoding
    let backend = FixedEdges {
        formulation,
        edges: vec![(1, 4), (4, 6), (6, 2), (2, 3), (3, 1), (1, 5), (5, 1)],
    };
    let result = solver.solve(&inst, &backend).unwrap();
    assert!(result.solution.is_complete(&inst));
    assert!(!result.solution.respects_clusters(&inst));
    assert_eq!(result.solution.status, SolveStatus::ReconstructionDegraded);
}
