//! Upstream relational row shapes.

use serde::Deserialize;
use sqlx::FromRow;

/// The enumerated blockchain transaction types. Only
/// `payment_v1`, `payment_v2`, and `poc_receipts_v1` are queried by any
/// cursor here, but the source's `transactions.type` column is drawn from
/// this full, closed vocabulary — modeling it keeps filters like
/// `type IN (...)` checked against real variants instead of bare strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    CoinbaseV1,
    SecurityCoinbaseV1,
    OuiV1,
    GenGatewayV1,
    RoutingV1,
    PaymentV1,
    SecurityExchangeV1,
    ConsensusGroupV1,
    AddGatewayV1,
    AssertLocationV1,
    CreateHtlcV1,
    RedeemHtlcV1,
    PocRequestV1,
    PocReceiptsV1,
    VarsV1,
    RewardsV1,
    TokenBurnV1,
    DcCoinbaseV1,
    TokenBurnExchangeRateV1,
    PaymentV2,
    StateChannelOpenV1,
    StateChannelCloseV1,
    PriceOracleV1,
    TransferHotspotV1,
    RewardsV2,
    AssertLocationV2,
    GenValidatorV1,
    StakeValidatorV1,
    UnstakeValidatorV1,
    ValidatorHeartbeatV1,
    TransferValidatorStakeV1,
    GenPriceOracleV1,
    ConsensusGroupFailureV1,
    TransferHotspotV2,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoinbaseV1 => "coinbase_v1",
            Self::SecurityCoinbaseV1 => "security_coinbase_v1",
            Self::OuiV1 => "oui_v1",
            Self::GenGatewayV1 => "gen_gateway_v1",
            Self::RoutingV1 => "routing_v1",
            Self::PaymentV1 => "payment_v1",
            Self::SecurityExchangeV1 => "security_exchange_v1",
            Self::ConsensusGroupV1 => "consensus_group_v1",
            Self::AddGatewayV1 => "add_gateway_v1",
            Self::AssertLocationV1 => "assert_location_v1",
            Self::CreateHtlcV1 => "create_htlc_v1",
            Self::RedeemHtlcV1 => "redeem_htlc_v1",
            Self::PocRequestV1 => "poc_request_v1",
            Self::PocReceiptsV1 => "poc_receipts_v1",
            Self::VarsV1 => "vars_v1",
            Self::RewardsV1 => "rewards_v1",
            Self::TokenBurnV1 => "token_burn_v1",
            Self::DcCoinbaseV1 => "dc_coinbase_v1",
            Self::TokenBurnExchangeRateV1 => "token_burn_exchange_rate_v1",
            Self::PaymentV2 => "payment_v2",
            Self::StateChannelOpenV1 => "state_channel_open_v1",
            Self::StateChannelCloseV1 => "state_channel_close_v1",
            Self::PriceOracleV1 => "price_oracle_v1",
            Self::TransferHotspotV1 => "transfer_hotspot_v1",
            Self::RewardsV2 => "rewards_v2",
            Self::AssertLocationV2 => "assert_location_v2",
            Self::GenValidatorV1 => "gen_validator_v1",
            Self::StakeValidatorV1 => "stake_validator_v1",
            Self::UnstakeValidatorV1 => "unstake_validator_v1",
            Self::ValidatorHeartbeatV1 => "validator_heartbeat_v1",
            Self::TransferValidatorStakeV1 => "transfer_validator_stake_v1",
            Self::GenPriceOracleV1 => "gen_price_oracle_v1",
            Self::ConsensusGroupFailureV1 => "consensus_group_failure_v1",
            Self::TransferHotspotV2 => "transfer_hotspot_v2",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AccountInventoryRow {
    pub address: String,
    pub balance: i64,
    pub dc_balance: i64,
    pub staked_balance: i64,
    pub nonce: i64,
    pub first_block: Option<i64>,
    pub last_block: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GatewayInventoryRow {
    pub address: String,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub location_hex: Option<String>,
    pub city_id: Option<String>,
    pub elevation: Option<i32>,
    pub gain: Option<i32>,
    pub mode: Option<String>,
    pub reward_scale: Option<f64>,
    pub online: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RewardAggregateRow {
    pub gateway: String,
    pub total: i64,
}

/// `fields` carries the raw JSON transaction payload — one of the
/// `payment_v1`/`payment_v2`/`poc_receipts_v1` shapes, parsed downstream
/// by the cursor that queried for that specific type.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionFieldsRow {
    pub fields: serde_json::Value,
    pub time: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CityRow {
    pub city_id: String,
    pub long_city: Option<String>,
    pub long_state: Option<String>,
    pub long_country: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyBalanceRow {
    pub address: String,
    pub balance_date: chrono::NaiveDate,
    pub balance: i64,
    pub dc_balance: i64,
    pub staked_balance: i64,
}

/// `fields.path[0].witnesses[i]` payload of a `poc_receipts_v1` transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct WitnessFields {
    pub gateway: String,
    pub signal: Option<i32>,
    pub snr: Option<f64>,
    pub frequency: Option<f64>,
    pub datarate: Option<String>,
    #[serde(default)]
    pub is_valid: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PocPathElement {
    pub challengee: String,
    pub witnesses: Vec<WitnessFields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PocReceiptFields {
    pub path: Vec<PocPathElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentV1Fields {
    pub payer: String,
    pub payee: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentV2Payee {
    pub payee: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentV2Fields {
    pub payer: String,
    pub payments: Vec<PaymentV2Payee>,
}
