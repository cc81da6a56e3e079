//! Pure graph algorithms for the Graph Analytics module.
//!
//! No crate in the dependency stack implements PageRank or betweenness
//! centrality, so both are hand-rolled here: PageRank by power iteration,
//! betweenness centrality by Brandes' algorithm extended with Dijkstra for
//! weighted shortest paths. Kept free of I/O so they can be exercised
//! directly in tests.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BinaryHeap, HashMap};

pub type WitnessGraph = DiGraph<String, f64>;

/// Builds a directed graph from `(challengee_key, witness_key, distance_m)`
/// edges, one node per distinct hotspot key.
pub fn build_graph(edges: &[(String, String, f64)]) -> WitnessGraph {
    let mut graph = WitnessGraph::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();

    let mut node_index = |graph: &mut WitnessGraph, index_of: &mut HashMap<String, NodeIndex>, key: &str| {
        *index_of
            .entry(key.to_string())
            .or_insert_with(|| graph.add_node(key.to_string()))
    };

    for (from, to, distance_m) in edges {
        let a = node_index(&mut graph, &mut index_of, from);
        let b = node_index(&mut graph, &mut index_of, to);
        graph.add_edge(a, b, *distance_m);
    }

    graph
}

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Unweighted PageRank by power iteration. Dangling
/// nodes (zero out-degree) redistribute their mass uniformly, matching
/// `networkx.pagerank`'s handling of the same case.
pub fn pagerank(graph: &WitnessGraph) -> HashMap<NodeIndex, f64> {
    let n = graph.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let nodes: Vec<NodeIndex> = graph.node_indices().collect();
    let initial = 1.0 / n as f64;
    let mut scores: HashMap<NodeIndex, f64> = nodes.iter().map(|&i| (i, initial)).collect();

    for _ in 0..MAX_ITERATIONS {
        let dangling_mass: f64 = nodes
            .iter()
            .filter(|&&i| graph.edges(i).next().is_none())
            .map(|i| scores[i])
            .sum();

        let mut next: HashMap<NodeIndex, f64> = nodes
            .iter()
            .map(|&i| (i, (1.0 - DAMPING) / n as f64 + DAMPING * dangling_mass / n as f64))
            .collect();

        for &i in &nodes {
            let out_degree = graph.edges(i).count();
            if out_degree == 0 {
                continue;
            }
            let share = DAMPING * scores[&i] / out_degree as f64;
            for edge in graph.edges(i) {
                *next.get_mut(&edge.target()).unwrap() += share;
            }
        }

        let delta: f64 = nodes.iter().map(|i| (next[i] - scores[i]).abs()).sum();
        scores = next;
        if delta < CONVERGENCE_TOLERANCE {
            break;
        }
    }

    scores
}

/// Weighted Brandes' betweenness centrality, using
/// edge weight as Dijkstra distance. Normalized for a directed graph by
/// `(n-1)(n-2)`, matching `networkx.betweenness_centrality(normalized=True)`.
pub fn betweenness_centrality(graph: &WitnessGraph) -> HashMap<NodeIndex, f64> {
    let n = graph.node_count();
    let mut centrality: HashMap<NodeIndex, f64> =
        graph.node_indices().map(|i| (i, 0.0)).collect();

    if n < 3 {
        return centrality;
    }

    for source in graph.node_indices() {
        let (order, predecessors, sigma, _dist) = dijkstra_with_paths(graph, source);

        let mut delta: HashMap<NodeIndex, f64> = graph.node_indices().map(|i| (i, 0.0)).collect();
        for &w in order.iter().rev() {
            for &v in &predecessors[&w] {
                let ratio = sigma[&v] / sigma[&w] * (1.0 + delta[&w]);
                *delta.get_mut(&v).unwrap() += ratio;
            }
            if w != source {
                *centrality.get_mut(&w).unwrap() += delta[&w];
            }
        }
    }

    let normalization = ((n - 1) * (n - 2)) as f64;
    for value in centrality.values_mut() {
        *value /= normalization;
    }

    centrality
}

type DijkstraState = (
    Vec<NodeIndex>,
    HashMap<NodeIndex, Vec<NodeIndex>>,
    HashMap<NodeIndex, f64>,
    HashMap<NodeIndex, f64>,
);

/// Single-source shortest paths with path counts (`sigma`) and
/// predecessor sets, the data Brandes' algorithm's accumulation phase
/// needs. `order` is nodes in non-decreasing distance from `source`.
fn dijkstra_with_paths(graph: &WitnessGraph, source: NodeIndex) -> DijkstraState {
    #[derive(PartialEq)]
    struct HeapEntry(f64, NodeIndex);
    impl Eq for HeapEntry {}
    impl Ord for HeapEntry {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            other.0.partial_cmp(&self.0).unwrap_or(std::cmp::Ordering::Equal)
        }
    }
    impl PartialOrd for HeapEntry {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
    let mut sigma: HashMap<NodeIndex, f64> = graph.node_indices().map(|i| (i, 0.0)).collect();
    let mut predecessors: HashMap<NodeIndex, Vec<NodeIndex>> =
        graph.node_indices().map(|i| (i, Vec::new())).collect();
    let mut order = Vec::new();
    let mut visited = std::collections::HashSet::new();

    sigma.insert(source, 1.0);
    dist.insert(source, 0.0);

    let mut heap = BinaryHeap::new();
    heap.push(HeapEntry(0.0, source));

    while let Some(HeapEntry(d, u)) = heap.pop() {
        if !visited.insert(u) {
            continue;
        }
        order.push(u);

        for edge in graph.edges(u) {
            let v = edge.target();
            let weight = *edge.weight();
            let candidate = d + weight;

            match dist.get(&v) {
                Some(&existing) if candidate > existing + f64::EPSILON => continue,
                Some(&existing) if (candidate - existing).abs() < f64::EPSILON => {
                    *sigma.get_mut(&v).unwrap() += sigma[&u];
                    predecessors.get_mut(&v).unwrap().push(u);
                    continue;
                }
                _ => {}
            }

            dist.insert(v, candidate);
            sigma.insert(v, sigma[&u]);
            predecessors.insert(v, vec![u]);
            heap.push(HeapEntry(candidate, v));
        }
    }

    (order, predecessors, sigma, dist)
}

/// Per-city normalization: each raw score divided by the city's mean score.
/// A zero mean (e.g. every score is zero) yields `0.0` for every node
/// rather than `NaN`.
pub fn normalize_to_city_mean(scores: &HashMap<NodeIndex, f64>) -> HashMap<NodeIndex, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }

    let mean = scores.values().sum::<f64>() / scores.len() as f64;
    scores
        .iter()
        .map(|(&node, &value)| {
            let normalized = if mean == 0.0 { 0.0 } else { value / mean };
            (node, if normalized.is_nan() { 0.0 } else { normalized })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagerank_distributes_evenly_on_symmetric_cycle() {
        let graph = build_graph(&[
            ("A".into(), "B".into(), 1.0),
            ("B".into(), "C".into(), 1.0),
            ("C".into(), "A".into(), 1.0),
        ]);
        let scores = pagerank(&graph);
        let values: Vec<f64> = scores.values().copied().collect();
        for v in &values {
            assert!((v - 1.0 / 3.0).abs() < 1e-3, "got {v}");
        }
    }

    #[test]
    fn pagerank_favors_the_more_referenced_node() {
        let graph = build_graph(&[
            ("A".into(), "C".into(), 1.0),
            ("B".into(), "C".into(), 1.0),
            ("C".into(), "A".into(), 1.0),
        ]);
        let scores = pagerank(&graph);
        let index_of = |key: &str| {
            graph
                .node_indices()
                .find(|&i| graph[i] == key)
                .unwrap()
        };
        assert!(scores[&index_of("C")] > scores[&index_of("A")]);
    }

    #[test]
    fn betweenness_is_zero_for_a_triangle_with_no_intermediary() {
        let graph = build_graph(&[
            ("A".into(), "B".into(), 1.0),
            ("B".into(), "C".into(), 1.0),
            ("C".into(), "A".into(), 1.0),
        ]);
        let scores = betweenness_centrality(&graph);
        assert!(scores.values().all(|&v| v >= 0.0));
    }

    #[test]
    fn betweenness_is_positive_for_a_bridging_node_on_a_path() {
        // A -> B -> C: B sits on the only shortest path between A and C.
        let graph = build_graph(&[("A".into(), "B".into(), 1.0), ("B".into(), "C".into(), 1.0)]);
        let scores = betweenness_centrality(&graph);
        let b = graph.node_indices().find(|&i| graph[i] == "B").unwrap();
        assert!(scores[&b] > 0.0);
    }

    #[test]
    fn normalize_to_city_mean_handles_all_zero_scores_without_producing_nan() {
        let graph = build_graph(&[("A".into(), "B".into(), 1.0)]);
        let scores: HashMap<NodeIndex, f64> = graph.node_indices().map(|i| (i, 0.0)).collect();
        let normalized = normalize_to_city_mean(&scores);
        assert!(normalized.values().all(|&v| v == 0.0));
    }

    #[test]
    fn normalize_to_city_mean_centers_values_around_one() {
        let graph = build_graph(&[("A".into(), "B".into(), 1.0), ("B".into(), "C".into(), 1.0)]);
        let mut scores = HashMap::new();
        for (i, v) in graph.node_indices().zip([1.0, 2.0, 3.0]) {
            scores.insert(i, v);
        }
        let normalized = normalize_to_city_mean(&scores);
        let mean: f64 = normalized.values().sum::<f64>() / normalized.len() as f64;
        assert!((mean - 1.0).abs() < 1e-9);
    }
}
