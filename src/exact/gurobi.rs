//! Gurobi backend.
//!
//! Translates a [`LinearModel`] into a Gurobi model through the `grb` crate,
//! optimizes it and maps the result back onto [`MipOutcome`].

use super::model::{LinearModel, MipBackend, MipOutcome, MipStatus, Sense, VarKind, SolverParams};
use grb::prelude::*;

/// Gurobi's notion of an unbounded value.
const GRB_INFINITY: f64 = 1e100;

/// Gurobi-based MIP backend
#[derive(Debug, Clone, Default)]
pub struct GurobiBackend {
    /// Write an IIS to this path when the model is infeasible
    pub iis_path: Option<String>,
}

impl GurobiBackend {
    pub fn new() -> Self {
        GurobiBackend { iis_path: None }
    }
}

impl MipBackend for GurobiBackend {
    fn name(&self) -> &str {
        "gurobi"
    }

    fn solve(&self, lm: &LinearModel, params: &SolverParams) -> Result<MipOutcome, String> {
        let env = Env::new("")
            .map_err(|e| format!("Failed to create Gurobi environment: {}", e))?;

        let mut model = Model::with_env(&lm.name, env)
            .map_err(|e| format!("Failed to create model: {}", e))?;

        model.set_param(param::TimeLimit, params.time_limit)
            .map_err(|e| format!("Failed to set time limit: {}", e))?;
        model.set_param(param::MIPGap, params.mip_gap)
            .map_err(|e| format!("Failed to set MIP gap: {}", e))?;
        model.set_param(param::Threads, params.threads)
            .map_err(|e| format!("Failed to set threads: {}", e))?;

        if !params.verbose {
            model.set_param(param::OutputFlag, 0)
                .map_err(|e| format!("Failed to set output flag: {}", e))?;
        }

        let mut obj = vec![0.0; lm.num_variables()];
        for &(v, coef) in &lm.objective().terms {
            obj[v.index()] += coef;
        }

        let mut vars: Vec<Var> = Vec::with_capacity(lm.num_variables());
        for (i, v) in lm.variables().iter().enumerate() {
            let var = match v.kind {
                VarKind::Binary => add_binvar!(model, name: &v.name, obj: obj[i]),
                VarKind::Continuous => add_ctsvar!(model,
                    name: &v.name,
                    bounds: v.lower.max(-GRB_INFINITY)..v.upper.min(GRB_INFINITY),
                    obj: obj[i]
                ),
            }
            .map_err(|e| format!("Failed to add variable {}: {}", v.name, e))?;
            vars.push(var);
        }

        model.update()
            .map_err(|e| format!("Failed to update model: {}", e))?;

        for c in lm.constraints() {
            let lhs: Expr = c.expr.terms.iter().map(|&(v, coef)| coef * vars[v.index()]).grb_sum();
            let rhs = c.rhs - c.expr.constant;
            let constr = match c.sense {
                Sense::Le => c!(lhs <= rhs),
                Sense::Ge => c!(lhs >= rhs),
                Sense::Eq => c!(lhs == rhs),
            };
            model.add_constr(&c.name, constr)
                .map_err(|e| format!("Failed to add constraint {}: {}", c.name, e))?;
        }

        // Warm start
        for (v, var) in lm.variables().iter().zip(vars.iter()) {
            if let Some(start) = v.start {
                model.set_obj_attr(attr::Start, var, start)
                    .map_err(|e| format!("Failed to set warm start for {}: {}", v.name, e))?;
            }
        }

        model.update()
            .map_err(|e| format!("Failed to update model before optimization: {}", e))?;

        model.optimize()
            .map_err(|e| format!("Optimization failed: {}", e))?;

        let status = model.status()
            .map_err(|e| format!("Failed to get status: {}", e))?;
        let sol_count = model.get_attr(attr::SolCount).unwrap_or(0);

        let mip_status = match status {
            Status::Optimal => MipStatus::Optimal,
            Status::TimeLimit | Status::NodeLimit | Status::SolutionLimit | Status::Interrupted
                if sol_count > 0 =>
            {
                MipStatus::TimeLimitFeasible
            }
            _ => MipStatus::Infeasible,
        };

        if status == Status::Infeasible {
            if let Some(ref path) = self.iis_path {
                let _ = model.compute_iis();
                let _ = model.write(path);
                log::warn!("Gurobi reported infeasible model; IIS written to {}", path);
            }
        }

        if mip_status == MipStatus::Infeasible {
            log::info!("Gurobi status {:?} with {} solution(s)", status, sol_count);
            return Ok(MipOutcome::infeasible());
        }

        let mut values = Vec::with_capacity(vars.len());
        for var in &vars {
            let x = model.get_obj_attr(attr::X, var)
                .map_err(|e| format!("Failed to read variable value: {}", e))?;
            values.push(x);
        }

        let objective = model.get_attr(attr::ObjVal)
            .map_err(|e| format!("Failed to get objective: {}", e))?
            + lm.objective().constant;

        Ok(MipOutcome {
            status: mip_status,
            objective: Some(objective),
            values,
            bound: model.get_attr(attr::ObjBound).unwrap_or(0.0) + lm.objective().constant,
            gap: model.get_attr(attr::MIPGap).unwrap_or(1.0),
            nodes_explored: model.get_attr(attr::NodeCount).unwrap_or(0.0) as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::{ExactConfig, ExactSolver};
    use crate::instance::tests::unit_square;
    use crate::solution::SolveStatus;

    #[test]
    #[ignore]
    fn test_gurobi_unit_square() {
        let inst = unit_square(2);
        let result = ExactSolver::new(ExactConfig {
            time_limit: 30.0,
            ..Default::default()
        })
        .solve(&inst, &GurobiBackend::new())
        .unwrap();
        assert_eq!(result.solution.status, SolveStatus::Optimal);
        assert!((result.solution.total_cost - (4.0 + 2f64.sqrt())).abs() < 1e-6);
    }
}
