//! Witness Canonicaliser.
//!
//! Transforms raw `poc_receipts_v1` rows into a deduplicated edge set keyed
//! by `hash(challengee ∥ witness)`, retaining only the most recent
//! occurrence of each key. Correctness depends on the caller having
//! already ordered rows by `time` descending — see
//! [`crate::source::cursor::WitnessesCursor`], which issues that ordered
//! query.

use super::models::PocReceiptFields;
use crate::model::WitnessEdge;
use std::collections::HashSet;

/// `md5(challengee ∥ witness_gateway)`, hex-encoded — the canonical key
/// for one witness edge.
pub fn witness_edge_key(challengee: &str, witness_gateway: &str) -> String {
    let mut input = String::with_capacity(challengee.len() + witness_gateway.len());
    input.push_str(challengee);
    input.push_str(witness_gateway);
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Canonicalises one batch of `(time, fields)` rows, assumed already sorted
/// by `time` descending. Walks rows in that order, keeping only the first
/// (i.e. most recent) occurrence of each `(challengee, witness)` key.
pub fn canonicalize_witness_batch(rows: &[(i64, serde_json::Value)]) -> Vec<WitnessEdge> {
    let mut seen_keys = HashSet::new();
    let mut edges = Vec::new();

    for (time, fields) in rows {
        let parsed: PocReceiptFields = match serde_json::from_value(fields.clone()) {
            Ok(p) => p,
            Err(_) => continue, // ValidationError: skip the row, batch continues
        };

        let Some(path) = parsed.path.first() else {
            continue;
        };

        for witness in &path.witnesses {
            let key = witness_edge_key(&path.challengee, &witness.gateway);
            if !seen_keys.insert(key.clone()) {
                continue;
            }

            edges.push(WitnessEdge {
                key,
                from: format!("hotspots/{}", path.challengee),
                to: format!("hotspots/{}", witness.gateway),
                time: *time,
                signal: witness.signal,
                snr: witness.snr,
                frequency: witness.frequency,
                datarate: witness.datarate.clone(),
                is_valid: witness.is_valid,
            });
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn receipt(challengee: &str, witness: &str) -> serde_json::Value {
        json!({
            "path": [{
                "challengee": challengee,
                "witnesses": [{
                    "gateway": witness,
                    "signal": -80,
                    "snr": 5.0,
                    "frequency": 915.0,
                    "datarate": "SF7BW125",
                    "is_valid": true
                }]
            }]
        })
    }

    #[test]
    fn duplicate_witness_keeps_newest_time() {
        // Scenario 3: times 5000 and 6000 for the same (X, Y) pair; input
        // is already sorted descending, as the Witnesses cursor's query
        // guarantees.
        let rows = vec![
            (6000_i64, receipt("X", "Y")),
            (5000_i64, receipt("X", "Y")),
        ];

        let edges = canonicalize_witness_batch(&rows);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].time, 6000);
        assert_eq!(edges[0].key, witness_edge_key("X", "Y"));
    }

    #[test]
    fn distinct_pairs_each_produce_an_edge() {
        let rows = vec![(100_i64, receipt("X", "Y")), (90_i64, receipt("X", "Z"))];
        let edges = canonicalize_witness_batch(&rows);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn malformed_row_is_skipped_without_failing_the_batch() {
        let rows = vec![
            (100_i64, json!({"not": "a receipt"})),
            (90_i64, receipt("X", "Y")),
        ];
        let edges = canonicalize_witness_batch(&rows);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn empty_batch_yields_no_edges() {
        assert!(canonicalize_witness_batch(&[]).is_empty());
    }

    #[test]
    fn key_is_a_pure_function_of_challengee_and_witness() {
        assert_eq!(witness_edge_key("X", "Y"), witness_edge_key("X", "Y"));
        assert_ne!(witness_edge_key("X", "Y"), witness_edge_key("Y", "X"));
    }
}
