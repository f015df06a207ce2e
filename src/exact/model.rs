//! Declarative mixed-integer linear model.
//!
//! The exact formulation is written against these types instead of a concrete
//! solver API; a [`MipBackend`] translates a [`LinearModel`] into whatever its
//! solver understands. The objective is always minimized.

use std::fmt;

/// Index of a variable inside its [`LinearModel`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
    /// MIP start value, if any
    pub start: Option<f64>,
}

/// `Σ coef·var + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        LinearExpr::default()
    }

    /// Builder-style term addition.
    pub fn term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) {
        self.terms.push((var, coef));
    }

    pub fn plus_constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    /// Sum of `vars`, each with coefficient 1.
    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        LinearExpr {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    /// Append every term of `other` scaled by `factor`.
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(v, c)| (v, c * factor)));
        self.constant += other.constant * factor;
    }

    /// Value of the expression under the assignment `values[var.0]`.
    /// Variables beyond the end of `values` count as zero.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::new().term(var, 1.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Le => write!(f, "<="),
            Sense::Ge => write!(f, ">="),
            Sense::Eq => write!(f, "="),
        }
    }
}

/// `expr (sense) rhs`
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinearModel {
    pub name: String,
    variables: Vec<Variable>,
    objective: LinearExpr,
    constraints: Vec<Constraint>,
}

impl LinearModel {
    pub fn new(name: &str) -> Self {
        LinearModel {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_binary(&mut self, name: String) -> VarId {
        self.push_variable(name, VarKind::Binary, 0.0, 1.0)
    }

    pub fn add_continuous(&mut self, name: String, lower: f64, upper: f64) -> VarId {
        self.push_variable(name, VarKind::Continuous, lower, upper)
    }

    fn push_variable(&mut self, name: String, kind: VarKind, lower: f64, upper: f64) -> VarId {
        self.variables.push(Variable {
            name,
            kind,
            lower,
            upper,
            start: None,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn add_constraint(&mut self, name: String, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            name,
            expr,
            sense,
            rhs,
        });
    }

    pub fn set_start(&mut self, var: VarId, value: f64) {
        if let Some(v) = self.variables.get_mut(var.0) {
            v.start = Some(value);
        }
    }

    pub fn clear_start(&mut self) {
        for v in &mut self.variables {
            v.start = None;
        }
    }

    pub fn has_start(&self) -> bool {
        self.variables.iter().any(|v| v.start.is_some())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }

    /// Names of the constraints and variable bounds that `values` violates.
    pub fn violated_constraints(&self, values: &[f64], tolerance: f64) -> Vec<String> {
        let mut violated: Vec<String> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(i, v)| {
                let x = values.get(*i).copied().unwrap_or(0.0);
                let integral = v.kind == VarKind::Continuous || (x - x.round()).abs() <= tolerance;
                x < v.lower - tolerance || x > v.upper + tolerance || !integral
            })
            .map(|(_, v)| format!("bounds({})", v.name))
            .collect();
        violated.extend(
            self.constraints
                .iter()
                .filter(|c| !c.is_satisfied(values, tolerance))
                .map(|c| c.name.clone()),
        );
        violated
    }
}

/// Parameters forwarded to the MIP solver.
#[derive(Debug, Clone)]
pub struct SolverParams {
    /// Wall-clock limit in seconds
    pub time_limit: f64,
    pub mip_gap: f64,
    /// Number of threads (0 = automatic)
    pub threads: i32,
    pub verbose: bool,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            time_limit: 600.0,
            mip_gap: 1e-6,
            threads: 0,
            verbose: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MipStatus {
    Optimal,
    /// Time limit reached with at least one incumbent
    TimeLimitFeasible,
    /// Proven infeasible, or no incumbent found within the limit
    Infeasible,
}

#[derive(Debug, Clone)]
pub struct MipOutcome {
    pub status: MipStatus,
    /// Objective of the incumbent (None when infeasible)
    pub objective: Option<f64>,
    /// Variable values indexed by [`VarId`]; empty when infeasible
    pub values: Vec<f64>,
    pub bound: f64,
    pub gap: f64,
    pub nodes_explored: i64,
}

impl MipOutcome {
    pub fn infeasible() -> Self {
        MipOutcome {
            status: MipStatus::Infeasible,
            objective: None,
            values: Vec::new(),
            bound: 0.0,
            gap: 1.0,
            nodes_explored: 0,
        }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }
}

/// A MIP solver able to handle binary and continuous variables under a
/// wall-clock limit.
pub trait MipBackend {
    fn name(&self) -> &str;

    fn solve(&self, model: &LinearModel, params: &SolverParams) -> Result<MipOutcome, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_model() -> (LinearModel, VarId, VarId) {
        let mut model = LinearModel::new("small");
        let x = model.add_binary("x".to_string());
        let y = model.add_continuous("y".to_string(), 0.0, 5.0);
        model.set_objective(LinearExpr::new().term(x, 3.0).term(y, 1.0));
        model.add_constraint("cover".to_string(), LinearExpr::sum([x, y]), Sense::Ge, 2.0);
        model.add_constraint("fix".to_string(), LinearExpr::from(x), Sense::Eq, 1.0);
        (model, x, y)
    }

    #[test]
    fn test_expression_evaluation() {
        let (model, _, _) = small_model();
        assert_eq!(model.objective_value(&[1.0, 2.5]), 5.5);
        let e = LinearExpr::new().term(VarId(4), 2.0).plus_constant(1.0);
        assert_eq!(e.evaluate(&[1.0]), 1.0);
    }

    #[test]
    fn test_violations() {
        let (model, _, _) = small_model();
        assert!(model.violated_constraints(&[1.0, 1.0], 1e-9).is_empty());
        assert_eq!(model.violated_constraints(&[0.0, 1.0], 1e-9), vec!["cover", "fix"]);
        assert_eq!(model.violated_constraints(&[0.5, 6.0], 1e-9), vec!["bounds(x)", "bounds(y)", "fix"]);
    }

    #[test]
    fn test_start_values() {
        let (mut model, x, _) = small_model();
        assert!(!model.has_start());
        model.set_start(x, 1.0);
        assert_eq!(model.variable(x).start, Some(1.0));
        model.clear_start();
        assert!(!model.has_start());
    }

    #[test]
    fn test_add_scaled() {
        let mut a = LinearExpr::sum([VarId(0)]);
        let b = LinearExpr::sum([VarId(1)]).plus_constant(2.0);
        a.add_scaled(&b, -1.0);
        assert_eq!(a.evaluate(&[4.0, 1.0]), 1.0);
    }
}
