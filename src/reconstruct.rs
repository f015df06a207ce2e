//! Decoding of a directed edge set into depot-rooted tours.
//!
//! Every non-depot tail owns at most one successor; the depot keeps a queue of
//! its outgoing edges, one per salesman. Tours are walked from the depot until
//! they return to it. A walk that dead-ends or runs into an already consumed
//! node is closed early and the result is flagged as degraded, as are edges
//! left over once the depot queue is exhausted (subtours not touching the
//! depot).

use std::collections::{BTreeMap, HashSet, VecDeque};

/// Tours decoded from an edge set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// Closed tours `[depot, .., depot]`, each with at least one interior node
    pub tours: Vec<Vec<usize>>,
    /// Whether any part of the edge set could not be decoded cleanly
    pub degraded: bool,
    /// Number of walks started
    pub iterations: usize,
    /// Successor entries that were never consumed
    pub leftover: Vec<(usize, usize)>,
}

/// Decode `edges` into tours rooted at `depot`.
///
/// One walk is started per depot edge and every step consumes a node, so
/// the number of walks never exceeds `edges.len()`. Never panics.
pub fn reconstruct(edges: &[(usize, usize)], depot: usize) -> Reconstruction {
    let mut depot_out: VecDeque<usize> = VecDeque::new();
    let mut successor: BTreeMap<usize, usize> = BTreeMap::new();
    let mut degraded = false;

    for &(tail, head) in edges {
        if tail == depot {
            depot_out.push_back(head);
        } else if let Some(&kept) = successor.get(&tail) {
            log::warn!(
                "Node {} has several successors ({} and {}); keeping {}",
                tail, kept, head, kept
            );
            degraded = true;
        } else {
            successor.insert(tail, head);
        }
    }

    let mut iterations = 0;
    let mut tours = Vec::new();
    let mut consumed: HashSet<usize> = HashSet::new();

    while let Some(first) = depot_out.pop_front() {
        iterations += 1;

        let mut tour = vec![depot];
        let mut current = first;
        loop {
            if current == depot {
                break;
            }
            if !consumed.insert(current) {
                log::warn!("Walk from depot revisits node {}; closing tour early", current);
                degraded = true;
                break;
            }
            tour.push(current);
            match successor.remove(&current) {
                Some(next) => current = next,
                None => {
                    log::warn!("Node {} has no successor; closing tour early", current);
                    degraded = true;
                    break;
                }
            }
        }
        tour.push(depot);

        if tour.len() > 2 {
            tours.push(tour);
        }
    }

    let leftover: Vec<(usize, usize)> = successor.into_iter().collect();
    if !leftover.is_empty() {
        log::warn!(
            "{} edge(s) not reachable from the depot were dropped: {:?}",
            leftover.len(),
            leftover
        );
        degraded = true;
    }

    Reconstruction {
        tours,
        degraded,
        iterations,
        leftover,
    }
}
