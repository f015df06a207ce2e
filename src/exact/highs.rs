//! HiGHS backend.
//!
//! Translates a [`LinearModel`] into a `good_lp` problem solved by the
//! open-source HiGHS solver. No license is needed, so this is the default
//! backend.

use super::model::{LinearExpr, LinearModel, MipBackend, MipOutcome, MipStatus, Sense, SolverParams, VarKind};
use good_lp::solvers::highs::highs;
use good_lp::{constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};
use std::time::Instant;

/// Tolerance used to check the point HiGHS hands back.
const FEASIBILITY_TOL: f64 = 1e-5;

/// HiGHS-based MIP backend
#[derive(Debug, Clone, Default)]
pub struct HighsBackend;

impl HighsBackend {
    pub fn new() -> Self {
        HighsBackend
    }
}

fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    expr.terms
        .iter()
        .map(|&(v, coef)| coef * vars[v.index()])
        .fold(Expression::from(expr.constant), |acc, term| acc + term)
}

impl MipBackend for HighsBackend {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, lm: &LinearModel, params: &SolverParams) -> Result<MipOutcome, String> {
        let start = Instant::now();

        let mut problem_vars = ProblemVariables::new();
        let vars: Vec<Variable> = lm
            .variables()
            .iter()
            .map(|v| {
                let def = match v.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Continuous => {
                        let mut def = variable();
                        if v.lower.is_finite() {
                            def = def.min(v.lower);
                        }
                        if v.upper.is_finite() {
                            def = def.max(v.upper);
                        }
                        def
                    }
                };
                problem_vars.add(def.name(v.name.clone()))
            })
            .collect();

        if lm.has_start() {
            log::debug!("HiGHS backend ignores the MIP start");
        }

        let objective = to_expression(lm.objective(), &vars);
        let mut problem = problem_vars
            .minimise(objective)
            .using(highs)
            .set_verbose(params.verbose)
            .set_time_limit(params.time_limit)
            .set_option("mip_rel_gap", params.mip_gap);
        if params.threads > 0 {
            problem = problem.set_option("threads", params.threads);
        }

        for c in lm.constraints() {
            let lhs = to_expression(&c.expr, &vars);
            let rhs = c.rhs;
            problem = problem.with(match c.sense {
                Sense::Le => constraint!(lhs <= rhs),
                Sense::Ge => constraint!(lhs >= rhs),
                Sense::Eq => constraint!(lhs == rhs),
            });
        }

        log::info!(
            "HiGHS: {} variables, {} constraints, time limit {:.1}s",
            lm.num_variables(),
            lm.num_constraints(),
            params.time_limit
        );

        let solution = match problem.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => {
                log::info!("HiGHS reported an infeasible model");
                return Ok(MipOutcome::infeasible());
            }
            Err(e) => return Err(format!("HiGHS failed: {:?}", e)),
        };

        let values: Vec<f64> = vars.iter().map(|&v| solution.value(v)).collect();

        // A time limit without incumbent still yields a point; reject it.
        let violated = lm.violated_constraints(&values, FEASIBILITY_TOL);
        if !violated.is_empty() {
            log::warn!(
                "HiGHS stopped without a feasible point ({} violated constraint(s), first {})",
                violated.len(),
                violated[0]
            );
            return Ok(MipOutcome::infeasible());
        }

        let objective = lm.objective_value(&values);
        let elapsed = start.elapsed().as_secs_f64();
        let status = if elapsed >= params.time_limit {
            MipStatus::TimeLimitFeasible
        } else {
            MipStatus::Optimal
        };

        let (bound, gap) = match status {
            MipStatus::Optimal => (objective, 0.0),
            _ => (0.0, 1.0),
        };

        Ok(MipOutcome {
            status,
            objective: Some(objective),
            values,
            bound,
            gap,
            nodes_explored: 0,
        })
    }
}
