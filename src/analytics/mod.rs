//! Graph Analytics.
//!
//! Partitions hotspots by city, builds a weighted witness subgraph per
//! city, scores it with [`graph::pagerank`] and
//! [`graph::betweenness_centrality`], normalizes each city's scores to its
//! own mean, and upserts the result back onto the hotspot documents. Cities
//! run concurrently through one bounded `buffer_unordered` pool.

pub mod graph;

use crate::error::Result;
use crate::geo::haversine_distance_m;
use crate::model::{CentralityFeatures, HotspotDoc};
use crate::observability::Metrics;
use crate::sink::ArangoSink;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

const CONCURRENT_CITIES: usize = 8;

/// Runs analytics for every city with at least `min_city_size` hotspots.
pub async fn run_all_cities(
    sink: &ArangoSink,
    metrics: &Metrics,
    city_keys: &[String],
    min_city_size: usize,
) -> Result<()> {
    let results: Vec<Result<()>> = stream::iter(city_keys.iter().cloned())
        .map(|city_key| {
            let sink = sink.clone();
            let metrics = metrics.clone();
            async move { run_one_city(&sink, &metrics, &city_key, min_city_size).await }
        })
        .buffer_unordered(CONCURRENT_CITIES)
        .collect()
        .await;

    for result in results {
        if let Err(e) = result {
            warn!(error = %e, "city analytics run failed");
        }
    }

    Ok(())
}

async fn run_one_city(sink: &ArangoSink, metrics: &Metrics, city_key: &str, min_city_size: usize) -> Result<()> {
    let hotspots = sink.hotspots_for_city(city_key).await?;
    if hotspots.len() < min_city_size {
        info!(city_key, count = hotspots.len(), "skipping undersized city");
        return Ok(());
    }

    let keys: Vec<String> = hotspots.iter().map(|h| h.key.clone()).collect();
    let edges = sink.witness_edges_among(&keys).await?;

    let features = score_city(&hotspots, &edges);
    if !features.is_empty() {
        sink.set_centrality_features(&features).await?;
    }

    metrics.record_city_scored(hotspots.len() as u64);
    info!(city_key, hotspots = hotspots.len(), "scored city");
    Ok(())
}

/// Pure scoring step: builds the weighted witness subgraph, runs both
/// centrality measures, and normalizes each to the city's own mean.
/// Separated from `run_one_city` so it can be exercised without a sink.
fn score_city(
    hotspots: &[HotspotDoc],
    witness_edges: &[crate::model::WitnessEdge],
) -> Vec<CentralityFeatures> {
    let by_key: std::collections::HashMap<&str, &HotspotDoc> =
        hotspots.iter().map(|h| (h.key.as_str(), h)).collect();

    let weighted_edges: Vec<(String, String, f64)> = witness_edges
        .iter()
        .filter_map(|edge| {
            let from_key = edge.from.strip_prefix("hotspots/")?;
            let to_key = edge.to.strip_prefix("hotspots/")?;
            let from_hotspot = by_key.get(from_key)?;
            let to_hotspot = by_key.get(to_key)?;
            let distance_m = haversine_distance_m(&from_hotspot.geo_location, &to_hotspot.geo_location)
                .unwrap_or(0.0);
            Some((from_key.to_string(), to_key.to_string(), distance_m))
        })
        .collect();

    let mut witness_graph = graph::build_graph(&weighted_edges);
    // Hotspots with no witness edges still get a (zero) score.
    for hotspot in hotspots {
        if !witness_graph.node_indices().any(|i| witness_graph[i] == hotspot.key) {
            witness_graph.add_node(hotspot.key.clone());
        }
    }

    let pagerank_scores = graph::pagerank(&witness_graph);
    let betweenness_scores = graph::betweenness_centrality(&witness_graph);
    let pagerank_normalized = graph::normalize_to_city_mean(&pagerank_scores);
    let betweenness_normalized = graph::normalize_to_city_mean(&betweenness_scores);

    witness_graph
        .node_indices()
        .map(|i| {
            let key = witness_graph[i].clone();
            CentralityFeatures {
                key,
                pagerank: pagerank_scores.get(&i).copied().unwrap_or(0.0),
                pagerank_n: pagerank_normalized.get(&i).copied().unwrap_or(0.0),
                betweenness_centrality: betweenness_scores.get(&i).copied().unwrap_or(0.0),
                betweenness_centrality_n: betweenness_normalized.get(&i).copied().unwrap_or(0.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, WitnessEdge};

    fn hotspot(key: &str, lon: f64, lat: f64) -> HotspotDoc {
        HotspotDoc {
            key: key.to_string(),
            address: key.to_string(),
            owner: None,
            location: None,
            location_hex: None,
            city_key: None,
            geo_location: GeoPoint::new(lon, lat),
            elevation: None,
            gain: None,
            mode: None,
            reward_scale: None,
            online: None,
            rewards_5d: None,
            pagerank: None,
            pagerank_n: None,
            betweenness_centrality: None,
            betweenness_centrality_n: None,
        }
    }

    fn witness_edge(from: &str, to: &str) -> WitnessEdge {
        WitnessEdge {
            key: format!("{from}-{to}"),
            from: format!("hotspots/{from}"),
            to: format!("hotspots/{to}"),
            time: 0,
            signal: None,
            snr: None,
            frequency: None,
            datarate: None,
            is_valid: true,
        }
    }

    #[test]
    fn isolated_hotspots_with_no_edges_still_score_with_zeroes() {
        let hotspots = vec![hotspot("A", 0.0, 0.0), hotspot("B", 1.0, 1.0)];
        let features = score_city(&hotspots, &[]);
        assert_eq!(features.len(), 2);
        for f in &features {
            assert_eq!(f.pagerank_n, 0.0);
            assert_eq!(f.betweenness_centrality_n, 0.0);
        }
    }

    #[test]
    fn connected_city_produces_one_feature_row_per_hotspot() {
        let hotspots = vec![
            hotspot("A", 0.0, 0.0),
            hotspot("B", 0.01, 0.01),
            hotspot("C", 0.02, 0.02),
        ];
        let edges = vec![witness_edge("A", "B"), witness_edge("B", "C")];
        let features = score_city(&hotspots, &edges);
        assert_eq!(features.len(), 3);
    }
}
