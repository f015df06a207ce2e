//! Module for parsing and representing clustered mTSP instances.
//!
//! This module handles the `.cbtsp` text format (TSPLIB-like with a salesman
//! count, exclusivity sets and a depot section). It validates the instance
//! before any optimization runs and precomputes the distance matrix from the
//! chosen distance oracle.

use crate::distance::{DistanceOracle, Metric};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Represents a node of the instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier as given in the instance file (positive)
    pub id: usize,
    /// First coordinate (latitude for the haversine metric)
    pub x: f64,
    /// Second coordinate (longitude for the haversine metric)
    pub y: f64,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Node { id, x, y }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Precondition violations detected while loading or validating an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceError {
    Io(String),
    Parse { line: usize, message: String },
    NoSalesmen,
    NoCustomers,
    ZeroNodeId,
    DuplicateNode(usize),
    UnknownDepot(usize),
    UnknownSalesman { salesman: usize, salesmen: usize },
    UnknownClusterNode { salesman: usize, node: usize },
    DepotInCluster { salesman: usize },
    OverlappingClusters { node: usize, first: usize, second: usize },
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::Io(e) => write!(f, "cannot read instance: {}", e),
            InstanceError::Parse { line, message } => write!(f, "line {}: {}", line, message),
            InstanceError::NoSalesmen => write!(f, "salesmen count must be at least 1"),
            InstanceError::NoCustomers => write!(f, "instance has no node besides the depot"),
            InstanceError::ZeroNodeId => write!(f, "node ids must be positive"),
            InstanceError::DuplicateNode(id) => write!(f, "node {} is declared twice", id),
            InstanceError::UnknownDepot(id) => write!(f, "depot {} is not a declared node", id),
            InstanceError::UnknownSalesman { salesman, salesmen } => write!(
                f,
                "exclusivity set for salesman {} but only {} salesmen",
                salesman, salesmen
            ),
            InstanceError::UnknownClusterNode { salesman, node } => write!(
                f,
                "exclusivity set of salesman {} references unknown node {}",
                salesman, node
            ),
            InstanceError::DepotInCluster { salesman } => write!(
                f,
                "exclusivity set of salesman {} contains the depot",
                salesman
            ),
            InstanceError::OverlappingClusters { node, first, second } => write!(
                f,
                "node {} is claimed by salesmen {} and {}",
                node, first, second
            ),
        }
    }
}

impl std::error::Error for InstanceError {}

/// A validated clustered mTSP instance
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Number of nodes (including depot)
    pub dimension: usize,
    /// Number of salesmen
    pub salesmen: usize,
    /// Depot node id
    pub depot: usize,
    /// Nodes in file order
    pub nodes: Vec<Node>,
    /// Exclusivity sets: salesman index (1-based) -> node ids it must serve
    pub clusters: BTreeMap<usize, Vec<usize>>,
    /// Non-depot nodes not claimed by any exclusivity set
    pub unassigned: Vec<usize>,
    /// Name of the distance oracle the matrix was built with
    pub metric: String,
    distance_matrix: Vec<Vec<f64>>,
    positions: HashMap<usize, usize>,
    cluster_of: HashMap<usize, usize>,
}

impl Instance {
    /// Build and validate an instance.
    pub fn new<D: DistanceOracle + ?Sized>(
        name: &str,
        nodes: Vec<Node>,
        depot: usize,
        salesmen: usize,
        clusters: BTreeMap<usize, Vec<usize>>,
        oracle: &D,
    ) -> Result<Self, InstanceError> {
        if salesmen == 0 {
            return Err(InstanceError::NoSalesmen);
        }

        let mut positions = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            if node.id == 0 {
                return Err(InstanceError::ZeroNodeId);
            }
            if positions.insert(node.id, pos).is_some() {
                return Err(InstanceError::DuplicateNode(node.id));
            }
        }

        if !positions.contains_key(&depot) {
            return Err(InstanceError::UnknownDepot(depot));
        }
        if nodes.len() < 2 {
            return Err(InstanceError::NoCustomers);
        }

        let mut cluster_of: HashMap<usize, usize> = HashMap::new();
        for (&salesman, members) in &clusters {
            if salesman == 0 || salesman > salesmen {
                return Err(InstanceError::UnknownSalesman { salesman, salesmen });
            }
            for &node in members {
                if node == depot {
                    return Err(InstanceError::DepotInCluster { salesman });
                }
                if !positions.contains_key(&node) {
                    return Err(InstanceError::UnknownClusterNode { salesman, node });
                }
                if let Some(first) = cluster_of.insert(node, salesman) {
                    return Err(InstanceError::OverlappingClusters {
                        node,
                        first,
                        second: salesman,
                    });
                }
            }
        }

        let unassigned = nodes
            .iter()
            .map(|n| n.id)
            .filter(|&id| id != depot && !cluster_of.contains_key(&id))
            .collect();

        let distance_matrix = Self::compute_distance_matrix(&nodes, oracle);

        Ok(Instance {
            name: name.to_string(),
            comment: String::new(),
            dimension: nodes.len(),
            salesmen,
            depot,
            nodes,
            clusters,
            unassigned,
            metric: oracle.name().to_string(),
            distance_matrix,
            positions,
            cluster_of,
        })
    }

    /// Parse a `.cbtsp` instance file.
    ///
    /// The metric follows `EDGE_WEIGHT_TYPE` unless `metric` overrides it.
    pub fn from_file<P: AsRef<Path>>(path: P, metric: Option<Metric>) -> Result<Self, InstanceError> {
        let file = File::open(&path).map_err(|e| InstanceError::Io(e.to_string()))?;
        let fallback_name = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(BufReader::new(file), &fallback_name, metric)
    }

    /// Parse a `.cbtsp` instance from any buffered reader.
    pub fn parse<R: BufRead>(reader: R, fallback_name: &str, metric: Option<Metric>) -> Result<Self, InstanceError> {
        let mut name = fallback_name.to_string();
        let mut comment = String::new();
        let mut dimension: Option<usize> = None;
        let mut salesmen = 0usize;
        let mut edge_weight_type = String::new();
        let mut nodes: Vec<Node> = Vec::new();
        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut depot: Option<usize> = None;

        let mut section = "";

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| InstanceError::Io(e.to_string()))?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }

            let parse_err = |message: &str| InstanceError::Parse {
                line: line_no,
                message: message.to_string(),
            };

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "NAME" => name = value.to_string(),
                    "COMMENT" => comment = value.to_string(),
                    "TYPE" => {}
                    "DIMENSION" => dimension = Some(value.parse().map_err(|_| parse_err("invalid dimension"))?),
                    "SALESMEN" => salesmen = value.parse().map_err(|_| parse_err("invalid salesmen count"))?,
                    "EDGE_WEIGHT_TYPE" => edge_weight_type = value.to_string(),
                    _ => {}
                }
                continue;
            }

            match line {
                "NODE_COORD_SECTION" => {
                    section = "coords";
                    continue;
                }
                "CTSP_SET_SECTION" => {
                    section = "sets";
                    continue;
                }
                "DEPOT_SECTION" => {
                    section = "depot";
                    continue;
                }
                _ => {}
            }

            match section {
                "coords" => {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() < 3 {
                        return Err(parse_err("expected `id x y`"));
                    }
                    let id: usize = parts[0].parse().map_err(|_| parse_err("invalid node id"))?;
                    let x: f64 = parts[1].parse().map_err(|_| parse_err("invalid x coordinate"))?;
                    let y: f64 = parts[2].parse().map_err(|_| parse_err("invalid y coordinate"))?;
                    nodes.push(Node::new(id, x, y));
                }
                "sets" => {
                    let values: Vec<i64> = line
                        .split_whitespace()
                        .map(|p| p.parse::<i64>())
                        .collect::<Result<_, _>>()
                        .map_err(|_| parse_err("invalid exclusivity set entry"))?;
                    let (&k, members) = values
                        .split_first()
                        .ok_or_else(|| parse_err("empty exclusivity set line"))?;
                    if k <= 0 {
                        return Err(parse_err("invalid salesman index"));
                    }
                    let set = clusters.entry(k as usize).or_default();
                    // the list is terminated by -1
                    set.extend(members.iter().take_while(|&&v| v != -1).map(|&v| v as usize));
                }
                "depot" => {
                    let value: i64 = line.parse().map_err(|_| parse_err("invalid depot id"))?;
                    if value > 0 && depot.is_none() {
                        depot = Some(value as usize);
                    }
                }
                _ => {}
            }
        }

        if let Some(dim) = dimension {
            if dim != nodes.len() {
                log::warn!(
                    "instance {}: DIMENSION is {} but {} coordinates were read",
                    name,
                    dim,
                    nodes.len()
                );
            }
        }

        let metric = metric.unwrap_or_else(|| Metric::from_edge_weight_type(&edge_weight_type));
        let mut instance = Self::new(&name, nodes, depot.unwrap_or(1), salesmen, clusters, &metric)?;
        instance.comment = comment;
        Ok(instance)
    }

    /// Compute the dense distance matrix in node order
    fn compute_distance_matrix<D: DistanceOracle + ?Sized>(nodes: &[Node], oracle: &D) -> Vec<Vec<f64>> {
        let n = nodes.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix[i][j] = oracle.distance(nodes[i].coords(), nodes[j].coords());
                }
            }
        }

        matrix
    }

    /// Position of a node id in `nodes`.
    #[inline]
    pub fn position(&self, id: usize) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.position(id).map(|p| &self.nodes[p])
    }

    /// Distance between two node ids.
    ///
    /// # Panics
    ///
    /// Panics if either id is not part of the instance.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[self.positions[&i]][self.positions[&j]]
    }

    /// All node ids in file order
    pub fn node_ids(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Non-depot node ids in file order
    pub fn customers(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|&id| id != self.depot)
            .collect()
    }

    pub fn num_customers(&self) -> usize {
        self.dimension - 1
    }

    /// Salesman whose exclusivity set contains `id`, if any
    pub fn exclusive_owner(&self, id: usize) -> Option<usize> {
        self.cluster_of.get(&id).copied()
    }

    /// Exclusivity set of a salesman (empty when none is declared)
    pub fn cluster(&self, salesman: usize) -> &[usize] {
        self.clusters.get(&salesman).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_clusters(&self) -> bool {
        self.clusters.values().any(|c| !c.is_empty())
    }

    /// Cost of a closed tour given as `[depot, .., depot]`
    pub fn tour_cost(&self, tour: &[usize]) -> f64 {
        tour.windows(2).map(|w| self.distance(w[0], w[1])).sum()
    }

    /// Cost of a route interior with the depot legs added implicitly.
    /// An empty route costs nothing.
    pub fn route_cost(&self, route: &[usize]) -> f64 {
        match (route.first(), route.last()) {
            (Some(&first), Some(&last)) => {
                self.distance(self.depot, first)
                    + route.windows(2).map(|w| self.distance(w[0], w[1])).sum::<f64>()
                    + self.distance(last, self.depot)
            }
            _ => 0.0,
        }
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.dimension {
            for j in i + 1..self.dimension {
                distances.push(self.distance_matrix[i][j]);
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            salesmen: self.salesmen,
            depot: self.depot,
            metric: self.metric.clone(),
            cluster_sizes: self.clusters.iter().map(|(&k, v)| (k, v.len())).collect(),
            shared_pool: self.unassigned.len(),
            avg_distance,
            max_distance,
        }
    }
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub salesmen: usize,
    pub depot: usize,
    pub metric: String,
    pub cluster_sizes: Vec<(usize, usize)>,
    pub shared_pool: usize,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {} (depot {} + {} customers)", self.dimension, self.depot, self.dimension - 1)?;
        writeln!(f, "  Salesmen: {}", self.salesmen)?;
        writeln!(f, "  Metric: {}", self.metric)?;
        for (k, size) in &self.cluster_sizes {
            writeln!(f, "  Exclusive set V{}: {} nodes", k, size)?;
        }
        writeln!(f, "  Shared pool U: {} nodes", self.shared_pool)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        write!(f, "  Max distance: {:.2}", self.max_distance)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Depot 1 at the origin, nodes 2, 3, 4 on the remaining unit square corners.
    pub(crate) fn unit_square(salesmen: usize) -> Instance {
        let nodes = vec![
            Node::new(1, 0.0, 0.0),
            Node::new(2, 1.0, 0.0),
            Node::new(3, 1.0, 1.0),
            Node::new(4, 0.0, 1.0),
        ];
        Instance::new("square", nodes, 1, salesmen, BTreeMap::new(), &Metric::Euclidean).unwrap()
    }

    /// Depot plus `n` customers on a line at x = 1..=n.
    pub(crate) fn line_instance(n: usize, salesmen: usize) -> Instance {
        let nodes = (0..=n).map(|i| Node::new(i + 1, i as f64, 0.0)).collect();
        Instance::new("line", nodes, 1, salesmen, BTreeMap::new(), &Metric::Euclidean).unwrap()
    }

    const SAMPLE: &str = "NAME : sample-2
TYPE : CBTSP
COMMENT : toy
DIMENSION : 5
SALESMEN : 2
EDGE_WEIGHT_TYPE : EUC_2D
NODE_COORD_SECTION
1 0 0
2 3 4
3 6 8
4 -3 4
5 0 10
CTSP_SET_SECTION
1 2 -1
2 4 5 -1
DEPOT_SECTION
1
-1
EOF
";

    #[test]
    fn test_parse_sample() {
        let inst = Instance::parse(SAMPLE.as_bytes(), "fallback", None).unwrap();
        assert_eq!(inst.name, "sample-2");
        assert_eq!(inst.comment, "toy");
        assert_eq!(inst.dimension, 5);
        assert_eq!(inst.salesmen, 2);
        assert_eq!(inst.depot, 1);
        assert_eq!(inst.metric, "euclidean");
        assert_eq!(inst.cluster(1), &[2]);
        assert_eq!(inst.cluster(2), &[4, 5]);
        assert_eq!(inst.unassigned, vec![3]);
        assert_eq!(inst.exclusive_owner(5), Some(2));
        assert_eq!(inst.exclusive_owner(3), None);
        assert!((inst.distance(1, 2) - 5.0).abs() < 1e-12);
        assert!((inst.distance(2, 3) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_metric_override() {
        let inst = Instance::parse(SAMPLE.as_bytes(), "x", Some(Metric::Haversine)).unwrap();
        assert_eq!(inst.metric, "haversine");
    }

    #[test]
    fn test_parse_rejects_bad_coordinates() {
        let bad = "SALESMEN : 1\nNODE_COORD_SECTION\n1 0 zero\n2 1 1\n";
        match Instance::parse(bad.as_bytes(), "bad", None) {
            Err(InstanceError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors() {
        let nodes = vec![Node::new(1, 0.0, 0.0), Node::new(2, 1.0, 0.0), Node::new(3, 2.0, 0.0)];
        let metric = Metric::Euclidean;

        assert_eq!(
            Instance::new("t", nodes.clone(), 1, 0, BTreeMap::new(), &metric).unwrap_err(),
            InstanceError::NoSalesmen
        );
        assert_eq!(
            Instance::new("t", nodes.clone(), 9, 1, BTreeMap::new(), &metric).unwrap_err(),
            InstanceError::UnknownDepot(9)
        );

        let overlapping: BTreeMap<usize, Vec<usize>> = [(1, vec![2]), (2, vec![2, 3])].into_iter().collect();
        assert_eq!(
            Instance::new("t", nodes.clone(), 1, 2, overlapping, &metric).unwrap_err(),
            InstanceError::OverlappingClusters { node: 2, first: 1, second: 2 }
        );

        let with_depot: BTreeMap<usize, Vec<usize>> = [(1, vec![1])].into_iter().collect();
        assert_eq!(
            Instance::new("t", nodes.clone(), 1, 1, with_depot, &metric).unwrap_err(),
            InstanceError::DepotInCluster { salesman: 1 }
        );

        let unknown: BTreeMap<usize, Vec<usize>> = [(3, vec![2])].into_iter().collect();
        assert_eq!(
            Instance::new("t", nodes.clone(), 1, 2, unknown, &metric).unwrap_err(),
            InstanceError::UnknownSalesman { salesman: 3, salesmen: 2 }
        );

        let mut dup = nodes.clone();
        dup.push(Node::new(2, 5.0, 5.0));
        assert_eq!(
            Instance::new("t", dup, 1, 1, BTreeMap::new(), &metric).unwrap_err(),
            InstanceError::DuplicateNode(2)
        );

        assert_eq!(
            Instance::new("t", vec![Node::new(1, 0.0, 0.0)], 1, 1, BTreeMap::new(), &metric).unwrap_err(),
            InstanceError::NoCustomers
        );
    }

    #[test]
    fn test_route_and_tour_cost() {
        let inst = unit_square(2);
        let closed = inst.tour_cost(&[1, 2, 3, 1]);
        let open = inst.route_cost(&[2, 3]);
        assert!((closed - (2.0 + 2f64.sqrt())).abs() < 1e-12);
        assert!((closed - open).abs() < 1e-12);
        assert_eq!(inst.route_cost(&[]), 0.0);
        assert!((inst.route_cost(&[4]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_customers_keep_file_order() {
        let nodes = vec![Node::new(7, 0.0, 0.0), Node::new(3, 1.0, 0.0), Node::new(5, 2.0, 0.0)];
        let inst = Instance::new("t", nodes, 7, 1, BTreeMap::new(), &Metric::Euclidean).unwrap();
        assert_eq!(inst.customers(), vec![3, 5]);
        assert_eq!(inst.position(5), Some(2));
    }

    #[test]
    fn test_statistics_display() {
        let inst = unit_square(2);
        let text = inst.statistics().to_string();
        assert!(text.contains("Salesmen: 2"));
        assert!(text.contains("Shared pool U: 3 nodes"));
    }
}
