//! MILP formulation of the balanced multi-salesman problem.
//!
//! Variables:
//! - binary `route[i][j]` for every ordered pair of distinct nodes
//! - continuous `u[i]` in `[0, N-1]` for each non-depot node (MTZ order)
//! - continuous `balance_diff[c1,c2] >= 0` for each pair of groups `c1 < c2`
//!
//! Constraints: unit in/out degree on customers, `m` in/out on the depot,
//! MTZ subtour elimination and pairwise workload balance bounded by `Δ`.
//!
//! Under [`ClusterPolicy::Enforce`] each customer also gets a salesman label
//! (binary `assign[i][k]`, fixed to `k` on `Vk`). Labels are equal along every
//! selected customer arc and each label leaves the depot at most once, so a
//! tour serves exactly one salesman's set plus shared nodes.

use super::model::{LinearExpr, LinearModel, Sense, VarId};
use super::ExactConfig;
use crate::cluster::{ClusterAssignment, ClusterPolicy};
use crate::instance::Instance;
use std::collections::HashMap;

/// Threshold above which a binary value counts as selected.
const SELECTED: f64 = 0.5;

/// A built model plus the index needed to read solutions back.
#[derive(Debug, Clone)]
pub struct Formulation {
    pub model: LinearModel,
    depot: usize,
    /// position -> node id
    ids: Vec<usize>,
    positions: HashMap<usize, usize>,
    /// route[p][q] by node positions; None on the diagonal
    route: Vec<Vec<Option<VarId>>>,
    order: HashMap<usize, VarId>,
    balance: Vec<(usize, usize, VarId)>,
    /// customer -> assign[k - 1], only under `Enforce`
    assign: HashMap<usize, Vec<VarId>>,
    /// customer -> start[k - 1], only under `Enforce`
    start: HashMap<usize, Vec<VarId>>,
    groups: ClusterAssignment,
}

impl Formulation {
    /// Build the model for `instance`. `groups` drives the balance constraints;
    /// `config` supplies `Δ` and the cluster policy.
    pub fn build(instance: &Instance, groups: &ClusterAssignment, config: &ExactConfig) -> Self {
        let ids = instance.node_ids();
        let n = ids.len();
        let depot = instance.depot;
        let positions: HashMap<usize, usize> = ids.iter().enumerate().map(|(p, &id)| (id, p)).collect();
        let mut model = LinearModel::new(&format!("CBTSP_{}", instance.name));

        // route[i][j]
        let mut route = vec![vec![None; n]; n];
        let mut objective = LinearExpr::new();
        for (p, &i) in ids.iter().enumerate() {
            for (q, &j) in ids.iter().enumerate() {
                if p != q {
                    let var = model.add_binary(format!("route_{}_{}", i, j));
                    objective.add_term(var, instance.distance(i, j));
                    route[p][q] = Some(var);
                }
            }
        }
        model.set_objective(objective);

        // u[i]
        let upper = n.saturating_sub(1) as f64;
        let mut order = HashMap::new();
        for &i in ids.iter().filter(|&&id| id != depot) {
            order.insert(i, model.add_continuous(format!("u_{}", i), 0.0, upper));
        }

        let mut f = Formulation {
            model,
            depot,
            ids,
            positions,
            route,
            order,
            balance: Vec::new(),
            assign: HashMap::new(),
            start: HashMap::new(),
            groups: groups.clone(),
        };

        f.add_degree_constraints(instance.salesmen);
        f.add_mtz_constraints();
        f.add_balance_constraints(config.max_imbalance);
        if config.cluster_policy == ClusterPolicy::Enforce {
            f.add_exclusivity_constraints(instance);
            f.add_label_constraints(instance);
        }

        log::info!(
            "Built model {}: {} variables, {} constraints",
            f.model.name,
            f.model.num_variables(),
            f.model.num_constraints()
        );
        f
    }

    fn add_degree_constraints(&mut self, salesmen: usize) {
        for p in 0..self.ids.len() {
            let id = self.ids[p];
            let rhs = if id == self.depot { salesmen as f64 } else { 1.0 };
            let out = LinearExpr::sum(self.route[p].iter().flatten().copied());
            let inc = LinearExpr::sum(self.route.iter().filter_map(|row| row[p]));
            self.model.add_constraint(format!("out_{}", id), out, Sense::Eq, rhs);
            self.model.add_constraint(format!("in_{}", id), inc, Sense::Eq, rhs);
        }
    }

    fn add_mtz_constraints(&mut self) {
        let big_n = self.ids.len() as f64;
        let customers: Vec<usize> = self.ids.iter().copied().filter(|&id| id != self.depot).collect();
        for &i in &customers {
            for &j in &customers {
                if i == j {
                    continue;
                }
                if let Some(x) = self.route_var(i, j) {
                    let expr = LinearExpr::new()
                        .term(self.order[&i], 1.0)
                        .term(self.order[&j], -1.0)
                        .term(x, big_n);
                    self.model
                        .add_constraint(format!("mtz_{}_{}", i, j), expr, Sense::Le, big_n - 1.0);
                }
            }
        }
    }

    /// Outgoing route variables of every tail in group `c`.
    fn flow(&self, group: &[usize]) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for &i in group {
            if let Some(&p) = self.positions.get(&i) {
                for &var in self.route[p].iter().flatten() {
                    expr.add_term(var, 1.0);
                }
            }
        }
        expr
    }

    fn add_balance_constraints(&mut self, max_imbalance: f64) {
        let m = self.groups.salesmen();
        for c1 in 1..=m {
            for c2 in c1 + 1..=m {
                let bd = self
                    .model
                    .add_continuous(format!("balance_diff_{}_{}", c1, c2), 0.0, f64::INFINITY);
                let f1 = self.flow(self.groups.group(c1));
                let f2 = self.flow(self.groups.group(c2));

                let mut forward = f1.clone();
                forward.add_scaled(&f2, -1.0);
                forward.add_term(bd, -1.0);
                let mut backward = f2;
                backward.add_scaled(&f1, -1.0);
                backward.add_term(bd, -1.0);

                self.model
                    .add_constraint(format!("balance_{}_{}", c1, c2), forward, Sense::Le, 0.0);
                self.model
                    .add_constraint(format!("balance_{}_{}", c2, c1), backward, Sense::Le, 0.0);
                self.model.add_constraint(
                    format!("balance_limit_{}_{}", c1, c2),
                    LinearExpr::from(bd),
                    Sense::Le,
                    max_imbalance,
                );
                self.balance.push((c1, c2, bd));
            }
        }
    }

    fn add_exclusivity_constraints(&mut self, instance: &Instance) {
        let clustered: Vec<(usize, usize)> = self
            .ids
            .iter()
            .filter_map(|&id| instance.exclusive_owner(id).map(|k| (id, k)))
            .collect();
        for &(i, ki) in &clustered {
            for &(j, kj) in &clustered {
                if ki == kj {
                    continue;
                }
                if let Some(x) = self.route_var(i, j) {
                    self.model
                        .add_constraint(format!("exclusive_{}_{}", i, j), LinearExpr::from(x), Sense::Eq, 0.0);
                }
            }
        }
    }

    /// One label per customer, constant along tours, one tour per label.
    fn add_label_constraints(&mut self, instance: &Instance) {
        let m = instance.salesmen;
        let customers: Vec<usize> = self.ids.iter().copied().filter(|&id| id != self.depot).collect();

        for &i in &customers {
            let labels: Vec<VarId> = (1..=m)
                .map(|k| self.model.add_binary(format!("assign_{}_{}", i, k)))
                .collect();
            self.model.add_constraint(
                format!("assign_{}", i),
                LinearExpr::sum(labels.iter().copied()),
                Sense::Eq,
                1.0,
            );
            if let Some(owner) = instance.exclusive_owner(i) {
                self.model.add_constraint(
                    format!("owner_{}", i),
                    LinearExpr::from(labels[owner - 1]),
                    Sense::Eq,
                    1.0,
                );
            }
            self.assign.insert(i, labels);
        }

        // x[i][j] = 1 => assign[j][k] <= assign[i][k]; both sum to 1 so they match
        for &i in &customers {
            for &j in &customers {
                let Some(x) = self.route_var(i, j) else { continue };
                for k in 0..m {
                    let expr = LinearExpr::new()
                        .term(self.assign[&j][k], 1.0)
                        .term(self.assign[&i][k], -1.0)
                        .term(x, 1.0);
                    self.model
                        .add_constraint(format!("follow_{}_{}_{}", i, j, k + 1), expr, Sense::Le, 1.0);
                }
            }
        }

        // start[j][k] >= x[depot][j] + assign[j][k] - 1
        let mut per_label: Vec<LinearExpr> = vec![LinearExpr::new(); m];
        for &j in &customers {
            let Some(x) = self.route_var(self.depot, j) else { continue };
            let mut starts = Vec::with_capacity(m);
            for (k, tours) in per_label.iter_mut().enumerate() {
                let s = self
                    .model
                    .add_continuous(format!("start_{}_{}", j, k + 1), 0.0, 1.0);
                let expr = LinearExpr::new()
                    .term(x, 1.0)
                    .term(self.assign[&j][k], 1.0)
                    .term(s, -1.0);
                self.model
                    .add_constraint(format!("depart_{}_{}", j, k + 1), expr, Sense::Le, 1.0);
                tours.add_term(s, 1.0);
                starts.push(s);
            }
            self.start.insert(j, starts);
        }
        for (k, tours) in per_label.into_iter().enumerate() {
            self.model
                .add_constraint(format!("one_tour_{}", k + 1), tours, Sense::Le, 1.0);
        }
    }

    pub fn route_var(&self, i: usize, j: usize) -> Option<VarId> {
        let p = *self.positions.get(&i)?;
        let q = *self.positions.get(&j)?;
        self.route[p][q]
    }

    pub fn order_var(&self, i: usize) -> Option<VarId> {
        self.order.get(&i).copied()
    }

    pub fn groups(&self) -> &ClusterAssignment {
        &self.groups
    }

    /// Selected directed edges in node order (depot edges in head order).
    pub fn edges_from_values(&self, values: &[f64]) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (p, row) in self.route.iter().enumerate() {
            for (q, var) in row.iter().enumerate() {
                if let Some(var) = var {
                    if values.get(var.0).copied().unwrap_or(0.0) > SELECTED {
                        edges.push((self.ids[p], self.ids[q]));
                    }
                }
            }
        }
        edges
    }

    /// Full variable assignment encoding the given route interiors.
    ///
    /// Routes must only mention node ids of the instance; unknown ids are
    /// skipped. `u` takes each node's 1-based position in its route, and the
    /// `k`-th route is labelled with salesman `k + 1`.
    pub fn values_for_routes(&self, routes: &[Vec<usize>]) -> Vec<f64> {
        let mut values = vec![0.0; self.model.num_variables()];
        for (k, route) in routes.iter().enumerate().filter(|(_, r)| !r.is_empty()) {
            let mut prev = self.depot;
            for (pos, &id) in route.iter().enumerate() {
                if let Some(x) = self.route_var(prev, id) {
                    values[x.0] = 1.0;
                }
                if let Some(u) = self.order_var(id) {
                    values[u.0] = (pos + 1) as f64;
                }
                if let Some(label) = self.assign.get(&id).and_then(|labels| labels.get(k)) {
                    values[label.0] = 1.0;
                }
                prev = id;
            }
            if let Some(s) = route.first().and_then(|first| self.start.get(first)).and_then(|s| s.get(k)) {
                values[s.0] = 1.0;
            }
            if let Some(x) = self.route_var(prev, self.depot) {
                values[x.0] = 1.0;
            }
        }
        for &(c1, c2, bd) in &self.balance {
            let f1 = self.flow(self.groups.group(c1)).evaluate(&values);
            let f2 = self.flow(self.groups.group(c2)).evaluate(&values);
            values[bd.0] = (f1 - f2).abs();
        }
        values
    }

    /// Install `routes` as the MIP start.
    pub fn warm_start(&mut self, routes: &[Vec<usize>]) {
        let values = self.values_for_routes(routes);
        for (i, v) in values.into_iter().enumerate() {
            self.model.set_start(VarId(i), v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::round_robin;
    use crate::distance::Metric;
    use crate::instance::tests::unit_square;
    use crate::instance::Node;
    use std::collections::BTreeMap;

    fn enforce() -> ExactConfig {
        ExactConfig {
            cluster_policy: ClusterPolicy::Enforce,
            ..Default::default()
        }
    }

    /// V1 = {4, 5}, V2 = {2, 3}, U = {6}
    fn clustered() -> Instance {
        let coords = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (-1.0, 0.0), (-2.0, 0.0), (0.0, 1.0)];
        let nodes = coords.iter().enumerate().map(|(p, &(x, y))| Node::new(p + 1, x, y)).collect();
        let clusters: BTreeMap<usize, Vec<usize>> = [(1, vec![4, 5]), (2, vec![2, 3])].into_iter().collect();
        Instance::new("clustered", nodes, 1, 2, clusters, &Metric::Euclidean).unwrap()
    }

    fn square_formulation() -> (Instance, Formulation) {
        let inst = unit_square(2);
        let groups = round_robin(&inst.customers(), 2);
        let f = Formulation::build(&inst, &groups, &ExactConfig::default());
        (inst, f)
    }

    #[test]
    fn test_model_size() {
        let (_, f) = square_formulation();
        // 12 route, 3 u, 1 balance_diff
        assert_eq!(f.model.num_variables(), 16);
        // 8 degree, 6 mtz, 3 balance
        assert_eq!(f.model.num_constraints(), 17);
    }

    #[test]
    fn test_known_solution_is_feasible() {
        let (inst, f) = square_formulation();
        let values = f.values_for_routes(&[vec![2, 3], vec![4]]);
        assert!(f.model.violated_constraints(&values, 1e-9).is_empty());
        assert!((f.model.objective_value(&values) - (4.0 + 2f64.sqrt())).abs() < 1e-9);

        let edges = f.edges_from_values(&values);
        assert_eq!(edges, vec![(1, 2), (1, 4), (2, 3), (3, 1), (4, 1)]);
        let cost: f64 = edges.iter().map(|&(i, j)| inst.distance(i, j)).sum();
        assert!((cost - f.model.objective_value(&values)).abs() < 1e-9);
    }

    #[test]
    fn test_subtour_violates_mtz() {
        let (_, f) = square_formulation();
        // 1 -> 2 -> 1 plus the disconnected cycle 3 <-> 4
        let mut values = f.values_for_routes(&[vec![2]]);
        values[f.route_var(3, 4).unwrap().0] = 1.0;
        values[f.route_var(4, 3).unwrap().0] = 1.0;
        let violated = f.model.violated_constraints(&values, 1e-9);
        assert!(violated.iter().any(|c| c == "mtz_3_4" || c == "mtz_4_3"));
    }

    #[test]
    fn test_zero_imbalance_rejects_uneven_groups() {
        let inst = unit_square(2);
        let groups = round_robin(&inst.customers(), 2);
        let config = ExactConfig {
            max_imbalance: 0.0,
            ..Default::default()
        };
        let f = Formulation::build(&inst, &groups, &config);
        let values = f.values_for_routes(&[vec![2, 3], vec![4]]);
        let violated = f.model.violated_constraints(&values, 1e-9);
        assert_eq!(violated, vec!["balance_limit_1_2"]);
    }

    #[test]
    fn test_exclusivity_constraints() {
        let nodes = (1..=5).map(|i| Node::new(i, i as f64, 0.0)).collect();
        let clusters: BTreeMap<usize, Vec<usize>> = [(1, vec![2]), (2, vec![3])].into_iter().collect();
        let inst = Instance::new("c", nodes, 1, 2, clusters, &Metric::Euclidean).unwrap();
        let groups = round_robin(&inst.customers(), 2);
        let f = Formulation::build(&inst, &groups, &enforce());

        let mixed = f.values_for_routes(&[vec![2, 3], vec![4, 5]]);
        let violated = f.model.violated_constraints(&mixed, 1e-9);
        assert!(violated.contains(&"exclusive_2_3".to_string()));

        let separated = f.values_for_routes(&[vec![2, 4], vec![3, 5]]);
        assert!(f.model.violated_constraints(&separated, 1e-9).is_empty());
    }

    #[test]
    fn test_tour_cannot_bridge_clusters_through_shared_node() {
        let inst = clustered();
        let groups = round_robin(&inst.customers(), 2);
        let f = Formulation::build(&inst, &groups, &enforce());

        // 4 -> 6 -> 2 never links two sets directly
        let bridged = f.values_for_routes(&[vec![4, 6, 2, 3], vec![5]]);
        let violated = f.model.violated_constraints(&bridged, 1e-9);
        assert!(violated.iter().all(|c| !c.starts_with("exclusive_")));
        assert!(violated.contains(&"owner_2".to_string()));
        assert!(violated.contains(&"owner_5".to_string()));

        // labelling every node by its owner breaks the arc 6 -> 2 instead
        let mut relabelled = bridged.clone();
        for id in [2, 3] {
            let labels = &f.assign[&id];
            relabelled[labels[0].0] = 0.0;
            relabelled[labels[1].0] = 1.0;
        }
        let violated = f.model.violated_constraints(&relabelled, 1e-9);
        assert!(!violated.iter().any(|c| c.starts_with("owner_2") || c.starts_with("owner_3")));
        assert!(violated.contains(&"follow_6_2_2".to_string()));

        let clean = f.values_for_routes(&[vec![4, 5], vec![6, 2, 3]]);
        assert!(f.model.violated_constraints(&clean, 1e-9).is_empty());
    }

    #[test]
    fn test_cluster_cannot_span_two_tours() {
        let inst = clustered();
        let groups = round_robin(&inst.customers(), 2);
        let f = Formulation::build(&inst, &groups, &enforce());

        // V1 split over both tours, both labelled 1
        let mut values = f.values_for_routes(&[vec![4, 6], vec![5, 2, 3]]);
        for id in [5, 2, 3] {
            let labels = &f.assign[&id];
            values[labels[0].0] = 1.0;
            values[labels[1].0] = 0.0;
        }
        let start = &f.start[&5];
        values[start[0].0] = 1.0;
        values[start[1].0] = 0.0;
        let violated = f.model.violated_constraints(&values, 1e-9);
        assert!(violated.contains(&"one_tour_1".to_string()));
    }

    #[test]
    fn test_labels_only_under_enforce() {
        let inst = clustered();
        let groups = round_robin(&inst.customers(), 2);
        let ignore = Formulation::build(&inst, &groups, &ExactConfig::default());
        assert!(ignore.model.variables().iter().all(|v| !v.name.starts_with("assign_")));
        let mixed = ignore.values_for_routes(&[vec![4, 6, 2], vec![5, 3]]);
        assert!(ignore.model.violated_constraints(&mixed, 1e-9).is_empty());
    }

    #[test]
    fn test_warm_start_sets_every_variable() {
        let (_, mut f) = square_formulation();
        f.warm_start(&[vec![2, 3], vec![4]]);
        assert!(f.model.variables().iter().all(|v| v.start.is_some()));
        let x = f.route_var(2, 3).unwrap();
        assert_eq!(f.model.variable(x).start, Some(1.0));
    }
}
