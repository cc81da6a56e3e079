//! Sink Adapter.
//!
//! No async ArangoDB driver exists in the ecosystem, so this wraps
//! `reqwest` directly against Arango's HTTP API the same way
//! `arch_rpc::ArchRpcClient` wraps a JSON-RPC node: one `Client`, one base
//! URL, basic auth, typed request/response bodies.

use crate::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    Update,
    Ignore,
    Replace,
}

impl OnDuplicate {
    fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ImportResponse {
    created: u64,
    #[serde(default)]
    errors: u64,
    #[serde(default)]
    ignored: u64,
    updated: u64,
}

/// Outcome of one `bulk_upsert` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub created: u64,
    pub updated: u64,
}

impl std::ops::AddAssign for UpsertStats {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
    }
}

#[derive(Debug, Clone)]
pub struct ArangoSink {
    client: Client,
    base_url: String,
    database_name: String,
    username: String,
    password: String,
}

impl ArangoSink {
    pub fn new(base_url: String, database_name: String, username: String, password: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            database_name,
            username,
            password,
        }
    }

    fn db_url(&self, path: &str) -> String {
        format!("{}/_db/{}{}", self.base_url, self.database_name, path)
    }

    /// Bulk-imports documents into `collection`, honoring the given
    /// conflict policy.
    pub async fn bulk_upsert<T: Serialize>(
        &self,
        collection: &str,
        docs: &[T],
        on_duplicate: OnDuplicate,
    ) -> Result<UpsertStats> {
        if docs.is_empty() {
            return Ok(UpsertStats::default());
        }

        let url = self.db_url("/_api/import");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("collection", collection),
                ("onDuplicate", on_duplicate.as_str()),
                ("type", "array"),
                ("complete", "true"),
                ("waitForSync", "true"),
            ])
            .json(docs)
            .send()
            .await
            .map_err(EtlError::Http)?;

        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::OK {
            return Err(EtlError::Upsert(format!(
                "arango import into {collection} returned {status}"
            )));
        }

        let parsed: ImportResponse = response.json().await.map_err(EtlError::Http)?;
        if parsed.errors > 0 {
            return Err(EtlError::Upsert(format!(
                "arango import into {collection} reported {} document errors",
                parsed.errors
            )));
        }

        Ok(UpsertStats {
            created: parsed.created,
            updated: parsed.updated + parsed.ignored,
        })
    }

    /// Appends `daily_balances` entries onto each document's existing array
    /// rather than overwriting it. Arango's bulk import has no
    /// append conflict policy, so this runs a small AQL upsert per
    /// document.
    pub async fn append_daily_balances(
        &self,
        docs: &[crate::model::DailyBalanceDoc],
    ) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();
        for doc in docs {
            let aql = "UPSERT { _key: @key } \
                       INSERT { _key: @key, daily_balances: @entries } \
                       UPDATE { daily_balances: APPEND(OLD.daily_balances, @entries) } \
                       IN balances \
                       RETURN OLD ? 'updated' : 'created'";
            let outcome: Vec<String> = self
                .run_aql(
                    aql,
                    json!({ "key": doc.key, "entries": doc.daily_balances }),
                )
                .await?;
            match outcome.first().map(String::as_str) {
                Some("created") => stats.created += 1,
                _ => stats.updated += 1,
            }
        }
        Ok(stats)
    }

    /// Overwrites the `rewards_5d` field on each hotspot document.
    pub async fn set_rewards(&self, updates: &[crate::model::RewardUpdate]) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();
        for update in updates {
            let aql = "UPDATE { _key: @key } WITH { rewards_5d: @rewards } IN hotspots \
                       OPTIONS { ignoreErrors: true } RETURN NEW";
            let outcome: Vec<serde_json::Value> = self
                .run_aql(
                    aql,
                    json!({ "key": update.address, "rewards": update.rewards }),
                )
                .await?;
            if !outcome.is_empty() {
                stats.updated += 1;
            }
        }
        Ok(stats)
    }

    /// Upserts `CentralityFeatures` rows onto existing hotspot documents.
    pub async fn set_centrality_features(
        &self,
        features: &[crate::model::CentralityFeatures],
    ) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();
        for f in features {
            let aql = "UPDATE { _key: @key } WITH { \
                           pagerank: @pagerank, pagerank_n: @pagerank_n, \
                           betweenness_centrality: @bc, betweenness_centrality_n: @bc_n \
                       } IN hotspots OPTIONS { ignoreErrors: true } RETURN NEW";
            let outcome: Vec<serde_json::Value> = self
                .run_aql(
                    aql,
                    json!({
                        "key": f.key,
                        "pagerank": f.pagerank,
                        "pagerank_n": f.pagerank_n,
                        "bc": f.betweenness_centrality,
                        "bc_n": f.betweenness_centrality_n,
                    }),
                )
                .await?;
            if !outcome.is_empty() {
                stats.updated += 1;
            }
        }
        Ok(stats)
    }

    /// Fetches every hotspot with a non-null city assignment, for the Graph
    /// Analytics module's city partitioning.
    pub async fn hotspots_for_city(&self, city_key: &str) -> Result<Vec<crate::model::HotspotDoc>> {
        let aql = "FOR h IN hotspots FILTER h.city_key == @city_key RETURN h";
        self.run_aql(aql, json!({ "city_key": city_key })).await
    }

    /// Fetches the witness edges whose endpoints are both in `hotspot_keys`.
    pub async fn witness_edges_among(
        &self,
        hotspot_keys: &[String],
    ) -> Result<Vec<crate::model::WitnessEdge>> {
        let aql = "FOR e IN witnesses \
                   FILTER PARSE_IDENTIFIER(e._from).key IN @keys \
                   FILTER PARSE_IDENTIFIER(e._to).key IN @keys \
                   FILTER e.is_valid \
                   RETURN e";
        self.run_aql(aql, json!({ "keys": hotspot_keys })).await
    }

    /// All known city keys, for sharding graph analytics across workers.
    pub async fn all_city_keys(&self) -> Result<Vec<String>> {
        let aql = "FOR c IN cities RETURN c._key";
        self.run_aql(aql, json!({})).await
    }

    /// Prunes edges in `collection` older than `cutoff_time`.
    pub async fn delete_where_older_than(&self, collection: &str, cutoff_time: i64) -> Result<u64> {
        let aql = format!(
            "FOR doc IN {collection} FILTER doc.time < @cutoff \
             REMOVE doc IN {collection} OPTIONS {{ waitForSync: true }} RETURN 1"
        );
        let removed: Vec<i32> = self.run_aql(&aql, json!({ "cutoff": cutoff_time })).await?;
        Ok(removed.len() as u64)
    }

    async fn run_aql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        bind_vars: serde_json::Value,
    ) -> Result<Vec<T>> {
        let url = self.db_url("/_api/cursor");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "query": query, "bindVars": bind_vars }))
            .send()
            .await
            .map_err(EtlError::Http)?;

        if !response.status().is_success() {
            return Err(EtlError::Query(format!(
                "arango AQL cursor returned {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct CursorResponse<T> {
            result: Vec<T>,
            error: bool,
            #[serde(default)]
            #[allow(dead_code)]
            code: u16,
        }

        let parsed: CursorResponse<T> = response.json().await.map_err(EtlError::Http)?;
        if parsed.error {
            return Err(EtlError::Query("arango AQL cursor reported an error".into()));
        }
        Ok(parsed.result)
    }

    /// Creates a geospatial index on `collection.field`, idempotently.
    pub async fn ensure_geo_index(&self, collection: &str, field: &str) -> Result<()> {
        let url = self.db_url("/_api/index");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("collection", collection)])
            .json(&json!({ "type": "geo", "fields": [field], "geoJson": true }))
            .send()
            .await
            .map_err(EtlError::Http)?;

        if !response.status().is_success() {
            return Err(EtlError::Query(format!(
                "failed to create geo index on {collection}.{field}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Creates `collection` if it doesn't already exist.
    pub async fn ensure_collection(&self, name: &str, edge: bool) -> Result<()> {
        let url = self.db_url("/_api/collection");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "name": name, "type": if edge { 3 } else { 2 } }))
            .send()
            .await
            .map_err(EtlError::Http)?;

        // Arango returns 409 if the collection already exists; that's success here.
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(EtlError::Query(format!(
                "failed to create collection {name}: {}",
                response.status()
            )))
        }
    }
}
