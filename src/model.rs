//! Target-store document shapes.
//!
//! These are what the Sink Adapter bulk-upserts; they are independent of
//! the upstream row shapes in [`crate::source`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Option<[f64; 2]>,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: Some([lon, lat]),
        }
    }

    pub fn null() -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDoc {
    #[serde(rename = "_key")]
    pub key: String,
    pub address: String,
    pub balance: i64,
    pub dc_balance: i64,
    pub staked_balance: i64,
    pub nonce: i64,
    pub first_block: Option<i64>,
    pub last_block: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotDoc {
    #[serde(rename = "_key")]
    pub key: String,
    pub address: String,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub location_hex: Option<String>,
    pub city_key: Option<String>,
    pub geo_location: GeoPoint,
    pub elevation: Option<i32>,
    pub gain: Option<i32>,
    pub mode: Option<String>,
    pub reward_scale: Option<f64>,
    pub online: Option<String>,
    pub rewards_5d: Option<i64>,
    pub pagerank: Option<f64>,
    pub pagerank_n: Option<f64>,
    pub betweenness_centrality: Option<f64>,
    pub betweenness_centrality_n: Option<f64>,
}

impl HotspotDoc {
    /// Clears the analytics fields so a freshly-mapped hotspot document
    /// starts with no stale scores from a previous run.
    pub fn with_null_analytics_fields(mut self) -> Self {
        self.rewards_5d = None;
        self.pagerank = None;
        self.pagerank_n = None;
        self.betweenness_centrality = None;
        self.betweenness_centrality_n = None;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEdge {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_from")]
    pub from: String,
    #[serde(rename = "_to")]
    pub to: String,
    pub amount: i64,
    pub time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessEdge {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_from")]
    pub from: String,
    #[serde(rename = "_to")]
    pub to: String,
    pub time: i64,
    pub signal: Option<i32>,
    pub snr: Option<f64>,
    pub frequency: Option<f64>,
    pub datarate: Option<String>,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityDoc {
    #[serde(rename = "_key")]
    pub key: String,
    pub city_id: String,
    pub long_city: Option<String>,
    pub long_state: Option<String>,
    pub long_country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBalance {
    pub date: chrono::NaiveDate,
    pub balance: i64,
    pub dc_balance: i64,
    pub staked_balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBalanceDoc {
    #[serde(rename = "_key")]
    pub key: String,
    pub daily_balances: Vec<DailyBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardUpdate {
    pub address: String,
    pub rewards: i64,
}

/// One row of the graph-analytics output, upserted onto the matching
/// hotspot document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralityFeatures {
    #[serde(rename = "_key")]
    pub key: String,
    pub pagerank: f64,
    pub pagerank_n: f64,
    pub betweenness_centrality: f64,
    pub betweenness_centrality_n: f64,
}
