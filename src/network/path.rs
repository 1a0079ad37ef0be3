//! All-shortest-paths kernel over an undirected integer-node graph.
//!
//! The graph itself is not retained by [`all_shortest_paths`]; callers pass adjacency as a plain
//! `Vec<BTreeSet<usize>>` so the kernel stays a pure function with no graph-ownership concerns.

use std::collections::{BTreeSet, HashMap, VecDeque};

/// One shortest path, as a sequence of node indices from source to destination (inclusive).
pub type Path = Vec<usize>;

/// Compute every shortest path from `source` to every other reachable node.
///
/// - `adjacency[u]` is the set of neighbors of `u`. Iteration order is deterministic (`BTreeSet`)
///   so results are reproducible across runs.
/// - `ignored` nodes are never visited (skipped as neighbors), including as the source's own
///   neighbors.
/// - `endpoints` other than `source` are never expanded once dequeued: they may terminate a path
///   but are never used as a transit node.
///
/// Returns a map from reachable node to the list of all shortest paths to it. The entry for
/// `source` is always `[[source]]`. Nodes present in `endpoints` but unreachable are simply absent
/// from the result (callers that need an explicit empty entry should insert one).
pub fn all_shortest_paths(
    adjacency: &[BTreeSet<usize>],
    source: usize,
    endpoints: &BTreeSet<usize>,
    ignored: &BTreeSet<usize>,
) -> HashMap<usize, Vec<Path>> {
    let mut dist: HashMap<usize, usize> = HashMap::new();
    dist.insert(source, 0);
    let mut queue = VecDeque::from([source]);

    while let Some(u) = queue.pop_front() {
        if u != source && endpoints.contains(&u) {
            continue;
        }
        for &v in &adjacency[u] {
            if ignored.contains(&v) {
                continue;
            }
            if !dist.contains_key(&v) {
                dist.insert(v, dist[&u] + 1);
                queue.push_back(v);
            }
        }
    }

    let mut result: HashMap<usize, Vec<Path>> = HashMap::new();
    result.insert(source, vec![vec![source]]);

    let mut nodes: Vec<usize> = dist.keys().copied().collect();
    nodes.sort_by_key(|n| dist[n]);

    for u in nodes {
        if u != source && endpoints.contains(&u) {
            continue;
        }
        for &v in &adjacency[u] {
            if ignored.contains(&v) {
                continue;
            }
            if dist.get(&v) == Some(&(dist[&u] + 1)) {
                let extensions: Vec<Path> = result
                    .get(&u)
                    .into_iter()
                    .flatten()
                    .map(|path| {
                        let mut path = path.clone();
                        path.push(v);
                        path
                    })
                    .collect();
                result.entry(v).or_default().extend(extensions);
            }
        }
    }

    result
}
