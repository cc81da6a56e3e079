//! Batched Query.
//!
//! Every concrete cursor is a single-consumer, stateful iterator over
//! `(slice_start, slice_end, batch_size, complete)`: each call slices the
//! next page out of the source query, widening the slice after a non-empty
//! result and marking itself `complete` after the first empty one. This is
//! the "iterator-producing factory" the design notes call for,
//! rather than a bare cursor struct with public mutable pagination fields.

use super::models::{
    AccountInventoryRow, CityRow, DailyBalanceRow, GatewayInventoryRow, PaymentV1Fields,
    PaymentV2Fields, RewardAggregateRow, TransactionFieldsRow,
};
use super::witness::canonicalize_witness_batch;
use crate::error::{EtlError, Result};
use crate::geo::h3_hex_to_point;
use crate::model::{AccountDoc, CityDoc, DailyBalance, DailyBalanceDoc, HotspotDoc, PaymentEdge, RewardUpdate, WitnessEdge};
use sqlx::PgPool;
use std::collections::BTreeMap;

/// A stateful cursor with one operation: `next_batch`. An empty return
/// signals exhaustion; subsequent calls continue to return empty.
pub trait BatchCursor {
    type Item;

    async fn next_batch(&mut self) -> Result<Vec<Self::Item>>;

    fn is_complete(&self) -> bool;
}

/// Pagination state shared by every concrete cursor below.
struct Slice {
    start: i64,
    end: i64,
    batch_size: i64,
    complete: bool,
}

impl Slice {
    fn new(batch_size: i64) -> Self {
        Self {
            start: 0,
            end: batch_size,
            batch_size,
            complete: false,
        }
    }

    fn advance(&mut self) {
        self.start = self.end;
        self.end += self.batch_size;
    }

    fn limit(&self) -> i64 {
        self.batch_size
    }

    fn offset(&self) -> i64 {
        self.start
    }
}

pub struct AccountsCursor {
    pool: PgPool,
    slice: Slice,
}

impl AccountsCursor {
    pub fn new(pool: PgPool, batch_size: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
        }
    }
}

impl BatchCursor for AccountsCursor {
    type Item = AccountDoc;

    async fn next_batch(&mut self) -> Result<Vec<AccountDoc>> {
        let rows: Vec<AccountInventoryRow> = sqlx::query_as(
            "SELECT address, balance, dc_balance, staked_balance, nonce, first_block, last_block \
             FROM account_inventory ORDER BY address LIMIT $1 OFFSET $2",
        )
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        Ok(rows
            .into_iter()
            .map(|row| AccountDoc {
                key: row.address.clone(),
                address: row.address,
                balance: row.balance,
                dc_balance: row.dc_balance,
                staked_balance: row.staked_balance,
                nonce: row.nonce,
                first_block: row.first_block,
                last_block: row.last_block,
            })
            .collect())
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

pub struct HotspotsCursor {
    pool: PgPool,
    slice: Slice,
}

impl HotspotsCursor {
    pub fn new(pool: PgPool, batch_size: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
        }
    }
}

impl BatchCursor for HotspotsCursor {
    type Item = HotspotDoc;

    async fn next_batch(&mut self) -> Result<Vec<HotspotDoc>> {
        let rows: Vec<GatewayInventoryRow> = sqlx::query_as(
            "SELECT gi.address, gi.owner, gi.location, gi.location_hex, loc.city_id, gi.elevation, gi.gain, \
                    gi.mode, gi.reward_scale, gs.online \
             FROM gateway_inventory gi \
             LEFT JOIN gateway_status gs ON gi.address = gs.address \
             LEFT JOIN locations loc ON gi.location = loc.location \
             ORDER BY gi.address LIMIT $1 OFFSET $2",
        )
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        Ok(rows
            .into_iter()
            .map(|row| {
                let geo_location = match &row.location_hex {
                    Some(hex) => h3_hex_to_point(hex),
                    None => crate::model::GeoPoint::null(),
                };
                let city_key = row.city_id.as_ref().map(|id| format!("{:x}", md5::compute(id.as_bytes())));
                HotspotDoc {
                    key: row.address.clone(),
                    address: row.address,
                    owner: row.owner,
                    location: row.location,
                    location_hex: row.location_hex,
                    city_key,
                    geo_location,
                    elevation: row.elevation,
                    gain: row.gain,
                    mode: row.mode,
                    reward_scale: row.reward_scale,
                    online: row.online,
                    rewards_5d: None,
                    pagerank: None,
                    pagerank_n: None,
                    betweenness_centrality: None,
                    betweenness_centrality_n: None,
                }
            })
            .collect())
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

pub struct RewardsCursor {
    pool: PgPool,
    slice: Slice,
    min_time: i64,
    max_time: i64,
}

impl RewardsCursor {
    pub fn new(pool: PgPool, batch_size: i64, min_time: i64, max_time: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
            min_time,
            max_time,
        }
    }
}

impl BatchCursor for RewardsCursor {
    type Item = RewardUpdate;

    async fn next_batch(&mut self) -> Result<Vec<RewardUpdate>> {
        let rows: Vec<RewardAggregateRow> = sqlx::query_as(
            "SELECT gateway, SUM(amount) as total FROM rewards \
             WHERE time > $1 AND time < $2 \
             GROUP BY gateway ORDER BY gateway LIMIT $3 OFFSET $4",
        )
        .bind(self.min_time)
        .bind(self.max_time)
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        Ok(rows
            .into_iter()
            .map(|row| RewardUpdate {
                address: row.gateway,
                rewards: row.total,
            })
            .collect())
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

pub struct PaymentsCursor {
    pool: PgPool,
    slice: Slice,
    min_time: i64,
    max_time: i64,
}

impl PaymentsCursor {
    pub fn new(pool: PgPool, batch_size: i64, min_time: i64, max_time: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
            min_time,
            max_time,
        }
    }
}

/// `_key = md5(canonical-json(fields))`. `fields` is a
/// `serde_json::Value`; with the `preserve_order` feature off,
/// `serde_json` serialises object keys in sorted order, which is what
/// makes this hash stable across platforms regardless of the order
/// Postgres happened to store the JSONB keys in.
pub fn payment_key(fields: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(fields).unwrap_or_default();
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

fn payment_doc(row: TransactionFieldsRow) -> Option<PaymentEdge> {
    let key = payment_key(&row.fields);

    if let Ok(v1) = serde_json::from_value::<PaymentV1Fields>(row.fields.clone()) {
        return Some(PaymentEdge {
            key,
            from: format!("accounts/{}", v1.payer),
            to: format!("accounts/{}", v1.payee),
            amount: v1.amount,
            time: row.time,
        });
    }

    if let Ok(v2) = serde_json::from_value::<PaymentV2Fields>(row.fields.clone()) {
        let first = v2.payments.first()?;
        return Some(PaymentEdge {
            key,
            from: format!("accounts/{}", v2.payer),
            to: format!("accounts/{}", first.payee),
            amount: first.amount,
            time: row.time,
        });
    }

    None
}

impl BatchCursor for PaymentsCursor {
    type Item = PaymentEdge;

    async fn next_batch(&mut self) -> Result<Vec<PaymentEdge>> {
        let rows: Vec<TransactionFieldsRow> = sqlx::query_as(
            "SELECT fields, time FROM transactions \
             WHERE time > $1 AND time < $2 AND type IN ('payment_v1', 'payment_v2') \
             ORDER BY hash LIMIT $3 OFFSET $4",
        )
        .bind(self.min_time)
        .bind(self.max_time)
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        Ok(rows.into_iter().filter_map(payment_doc).collect())
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

pub struct WitnessesCursor {
    pool: PgPool,
    slice: Slice,
    min_time: i64,
    max_time: i64,
}

impl WitnessesCursor {
    pub fn new(pool: PgPool, batch_size: i64, min_time: i64, max_time: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
            min_time,
            max_time,
        }
    }
}

impl BatchCursor for WitnessesCursor {
    type Item = WitnessEdge;

    async fn next_batch(&mut self) -> Result<Vec<WitnessEdge>> {
        // Ordered by time descending: canonicalize_witness_batch relies on
        // this to keep only the most recent occurrence of each edge.
        let rows: Vec<TransactionFieldsRow> = sqlx::query_as(
            "SELECT fields, time FROM transactions \
             WHERE time > $1 AND time < $2 AND type = 'poc_receipts_v1' \
             ORDER BY time DESC LIMIT $3 OFFSET $4",
        )
        .bind(self.min_time)
        .bind(self.max_time)
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        let pairs: Vec<(i64, serde_json::Value)> = rows.into_iter().map(|r| (r.time, r.fields)).collect();
        Ok(canonicalize_witness_batch(&pairs))
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

pub struct CitiesCursor {
    pool: PgPool,
    slice: Slice,
}

impl CitiesCursor {
    pub fn new(pool: PgPool, batch_size: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
        }
    }
}

impl BatchCursor for CitiesCursor {
    type Item = CityDoc;

    async fn next_batch(&mut self) -> Result<Vec<CityDoc>> {
        let rows: Vec<CityRow> = sqlx::query_as(
            "SELECT DISTINCT city_id, long_city, long_state, long_country FROM locations \
             WHERE city_id IS NOT NULL ORDER BY city_id LIMIT $1 OFFSET $2",
        )
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        Ok(rows
            .into_iter()
            .map(|row| CityDoc {
                key: format!("{:x}", md5::compute(row.city_id.as_bytes())),
                city_id: row.city_id,
                long_city: row.long_city,
                long_state: row.long_state,
                long_country: row.long_country,
            })
            .collect())
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

pub struct DailyBalancesCursor {
    pool: PgPool,
    slice: Slice,
    min_time: i64,
    max_time: i64,
}

impl DailyBalancesCursor {
    pub fn new(pool: PgPool, batch_size: i64, min_time: i64, max_time: i64) -> Self {
        Self {
            pool,
            slice: Slice::new(batch_size),
            min_time,
            max_time,
        }
    }
}

/// Groups already-deduplicated-per-day rows (one row per account per
/// calendar day, guaranteed by the SQL's `MAX(time)`-per-day join) into one
/// document per account, sorted by date ascending.
fn group_daily_balances(rows: Vec<DailyBalanceRow>) -> Vec<DailyBalanceDoc> {
    let mut by_address: BTreeMap<String, Vec<DailyBalance>> = BTreeMap::new();
    for row in rows {
        by_address.entry(row.address).or_default().push(DailyBalance {
            date: row.balance_date,
            balance: row.balance,
            dc_balance: row.dc_balance,
            staked_balance: row.staked_balance,
        });
    }

    by_address
        .into_iter()
        .map(|(address, mut daily_balances)| {
            daily_balances.sort_by_key(|b| b.date);
            DailyBalanceDoc {
                key: address,
                daily_balances,
            }
        })
        .collect()
}

impl BatchCursor for DailyBalancesCursor {
    type Item = DailyBalanceDoc;

    async fn next_batch(&mut self) -> Result<Vec<DailyBalanceDoc>> {
        let rows: Vec<DailyBalanceRow> = sqlx::query_as(
            "WITH relevant_blocks AS ( \
                 SELECT accounts.address, accounts.balance, accounts.dc_balance, \
                        accounts.staked_balance, blocks.time, blocks.timestamp \
                 FROM accounts JOIN blocks ON accounts.block = blocks.height \
             ) \
             SELECT address, DATE(timestamp) as balance_date, balance, dc_balance, staked_balance \
             FROM relevant_blocks \
             INNER JOIN ( \
                 SELECT MAX(relevant_blocks.time) AS max_updated_at FROM relevant_blocks \
                 GROUP BY DATE(relevant_blocks.timestamp) \
             ) lookup ON lookup.max_updated_at = relevant_blocks.time \
             WHERE relevant_blocks.time > $1 AND relevant_blocks.time < $2 \
             ORDER BY address, balance_date LIMIT $3 OFFSET $4",
        )
        .bind(self.min_time)
        .bind(self.max_time)
        .bind(self.slice.limit())
        .bind(self.slice.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::Query(e.to_string()))?;

        if rows.is_empty() {
            self.slice.complete = true;
            return Ok(Vec::new());
        }
        self.slice.advance();

        Ok(group_daily_balances(rows))
    }

    fn is_complete(&self) -> bool {
        self.slice.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn payment_key_depends_only_on_fields_json() {
        // The derived `_key` depends only on the transaction's `fields`
        // JSON, not on `time` or anything else.
        let fields = serde_json::json!({"payer": "A", "payee": "B", "amount": 10});
        assert_eq!(payment_key(&fields), payment_key(&fields.clone()));
    }

    #[test]
    fn payment_key_ignores_object_key_order() {
        let a = serde_json::json!({"payer": "A", "payee": "B", "amount": 10});
        let b = serde_json::json!({"amount": 10, "payee": "B", "payer": "A"});
        assert_eq!(payment_key(&a), payment_key(&b));
    }

    #[test]
    fn payment_v1_maps_from_payer_to_payee() {
        let row = TransactionFieldsRow {
            fields: serde_json::json!({"payer": "A", "payee": "B", "amount": 10}),
            time: 1000,
        };
        let doc = payment_doc(row).unwrap();
        assert_eq!(doc.from, "accounts/A");
        assert_eq!(doc.to, "accounts/B");
        assert_eq!(doc.amount, 10);
        assert_eq!(doc.time, 1000);
    }

    #[test]
    fn payment_v2_uses_first_payment_entry() {
        let row = TransactionFieldsRow {
            fields: serde_json::json!({"payer": "A", "payments": [{"payee": "B", "amount": 42}]}),
            time: 2000,
        };
        let doc = payment_doc(row).unwrap();
        assert_eq!(doc.from, "accounts/A");
        assert_eq!(doc.to, "accounts/B");
        assert_eq!(doc.amount, 42);
    }

    #[test]
    fn daily_balances_are_grouped_sorted_and_deduped_per_account() {
        let rows = vec![
            DailyBalanceRow {
                address: "A".into(),
                balance_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                balance: 200,
                dc_balance: 0,
                staked_balance: 0,
            },
            DailyBalanceRow {
                address: "A".into(),
                balance_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                balance: 100,
                dc_balance: 0,
                staked_balance: 0,
            },
        ];

        let docs = group_daily_balances(rows);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key, "A");
        assert_eq!(docs[0].daily_balances.len(), 2);
        assert!(docs[0].daily_balances[0].date < docs[0].daily_balances[1].date);
    }
}
