use crate::core::errors::ExchangeError;
use crate::core::pagination::{Paged, Paginated, QueryParams};
use crate::exchanges::coinbase::time::Time;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub type ProductId = String;
pub type CurrencyName = String;

/// Result types that never carry a header page
macro_rules! unpaged {
    ($($ty:ty),* $(,)?) => {
        $(impl Paginated for $ty {})*
    };
}

fn invalid(message: impl Into<String>) -> ExchangeError {
    ExchangeError::InvalidParameters(message.into())
}

// Accounts

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    pub currency: CurrencyName,
    pub balance: Decimal,
    pub available: Decimal, // balance minus holds
    pub hold: Decimal,
    pub profile_id: String,
    #[serde(default)]
    pub trading_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Transfer,
    Match,
    Fee,
    Rebate,
    Conversion,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub amount: Decimal,
    pub balance: Decimal,
    pub created_at: Time,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    #[serde(default)]
    pub details: LedgerDetails,
}

pub type Ledger = Paged<LedgerEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldType {
    Order,
    Transfer,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Hold {
    pub id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub created_at: Time,
    #[serde(default)]
    pub updated_at: Option<Time>,
    #[serde(rename = "type")]
    pub hold_type: HoldType,
    #[serde(rename = "ref")]
    pub reference: String, // order or transfer id that created the hold
}

pub type Holds = Paged<Hold>;

// Orders

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Limit,
    Market,
    Stop,
}

/// Stop orders trigger when the last trade price crosses `stop_price`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stop {
    Loss,  // triggers at or below the stop price
    Entry, // triggers at or above the stop price
}

impl Stop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loss => "loss",
            Self::Entry => "entry",
        }
    }
}

/// Stop and stop price must be set together
pub fn validate_stop(stop: Option<Stop>, stop_price: Option<Decimal>) -> Result<(), ExchangeError> {
    match (stop, stop_price) {
        (Some(stop), None) => Err(invalid(format!("stop {} requires a stop_price", stop.as_str()))),
        (None, Some(_)) => Err(invalid("stop_price requires a stop")),
        (Some(_), Some(price)) if price <= Decimal::ZERO => Err(invalid("stop_price must be positive")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum SelfTrade {
    #[default]
    #[serde(rename = "dc", alias = "")]
    DecrementAndCancel,
    #[serde(rename = "co")]
    CancelOldest,
    #[serde(rename = "cn")]
    CancelNewest,
    #[serde(rename = "cb")]
    CancelBoth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    GoodTillCanceled,
    #[serde(rename = "GTT")]
    GoodTillTime,
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    #[serde(rename = "FOK")]
    FillOrKill,
}

impl TimeInForce {
    /// Good-till-time orders need a `cancel_after` window
    pub fn validate_cancel_after(&self, cancel_after: Option<&str>) -> Result<(), ExchangeError> {
        match (self, cancel_after) {
            (Self::GoodTillTime, None | Some("")) => {
                Err(invalid("time_in_force GTT requires cancel_after"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitOrder {
    #[serde(rename = "client_oid", default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    pub product_id: ProductId,
    #[serde(rename = "stp", default, skip_serializing_if = "Option::is_none")]
    pub self_trade_prevention: Option<SelfTrade>,
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(rename = "type", default)]
    pub order_type: OrderType,
    pub price: Decimal,
    pub size: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_after: Option<String>, // min, hour or day
    #[serde(default)]
    pub post_only: bool,
}

impl LimitOrder {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.order_type != OrderType::Limit {
            return Err(invalid("limit order type must be limit"));
        }
        if self.product_id.is_empty() {
            return Err(invalid("product_id is required"));
        }
        if self.side.is_none() {
            return Err(invalid("side is required"));
        }
        if self.price <= Decimal::ZERO || self.size <= Decimal::ZERO {
            return Err(invalid("limit order requires a positive price and size"));
        }
        validate_stop(self.stop, self.stop_price)?;
        if let Some(time_in_force) = self.time_in_force {
            time_in_force.validate_cancel_after(self.cancel_after.as_deref())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarketOrder {
    #[serde(rename = "client_oid", default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    pub product_id: ProductId,
    #[serde(rename = "stp", default, skip_serializing_if = "Option::is_none")]
    pub self_trade_prevention: Option<SelfTrade>,
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funds: Option<Decimal>, // amount of quote currency to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
}

impl Default for MarketOrder {
    fn default() -> Self {
        Self {
            client_order_id: None,
            product_id: String::new(),
            self_trade_prevention: None,
            side: None,
            stop: None,
            stop_price: None,
            order_type: OrderType::Market,
            funds: None,
            size: None,
        }
    }
}

impl MarketOrder {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.order_type != OrderType::Market {
            return Err(invalid("market order type must be market"));
        }
        if self.product_id.is_empty() {
            return Err(invalid("product_id is required"));
        }
        if self.side.is_none() {
            return Err(invalid("side is required"));
        }
        validate_stop(self.stop, self.stop_price)?;
        if self.funds.is_none() && self.size.is_none() {
            return Err(invalid("without funds, size is required"));
        }
        Ok(())
    }
}

/// Identifies one order by exchange id or by client id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelOrderSpec {
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub product_id: Option<ProductId>, // optional, speeds up the cancel
}

impl CancelOrderSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        match (&self.order_id, &self.client_order_id) {
            (Some(_), Some(_)) => Err(invalid("only one of order_id or client_oid may be set")),
            (None, None) => Err(invalid("one of order_id or client_oid is required")),
            _ => Ok(()),
        }
    }

    /// Path segment after `/orders/`
    pub fn path(&self) -> String {
        match (&self.order_id, &self.client_order_id) {
            (Some(order_id), _) => order_id.clone(),
            (None, Some(client_order_id)) => format!("client:{}", client_order_id),
            (None, None) => String::new(),
        }
    }
}

impl QueryParams for CancelOrderSpec {
    fn params(&self) -> Vec<String> {
        self.product_id
            .iter()
            .map(|product_id| format!("product_id={}", product_id))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Received,
    Open,
    Pending,
    Active,
    Done,
    Settled,
    Rejected,
    #[serde(other)]
    Unknown,
}

/// Status values accepted by the order list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusParam {
    All,
    Open,
    Pending,
    Active,
    Done,
    Received,
    Settled,
}

impl fmt::Display for OrderStatusParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::All => "all",
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Done => "done",
            Self::Received => "received",
            Self::Settled => "settled",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub product_id: Option<ProductId>,
    pub status: Vec<OrderStatusParam>,
}

impl QueryParams for OrderFilter {
    fn params(&self) -> Vec<String> {
        let mut params = Vec::new();
        if let Some(product_id) = &self.product_id {
            params.push(format!("product_id={}", product_id));
        }
        params.extend(self.status.iter().map(|status| format!("status={}", status)));
        params
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: String,
    pub product_id: ProductId,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub created_at: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funds: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified_funds: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<Time>,
    #[serde(default)]
    pub post_only: bool,
    #[serde(rename = "stp", default, skip_serializing_if = "Option::is_none")]
    pub self_trade_prevention: Option<SelfTrade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_fees: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_value: Option<Decimal>,
    #[serde(default)]
    pub settled: bool,
}

pub type Orders = Paged<Order>;

// Fills

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Liquidity {
    #[serde(rename = "M")]
    Maker,
    #[serde(rename = "T")]
    Taker,
    #[serde(rename = "O")]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fill {
    pub trade_id: i64,
    pub product_id: ProductId,
    pub order_id: String,
    pub created_at: Time,
    pub liquidity: Liquidity,
    pub price: Decimal,
    pub size: Decimal,
    pub fee: Decimal,
    pub side: Side,
    #[serde(default)]
    pub settled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_volume: Option<Decimal>,
}

pub type Fills = Paged<Fill>;

/// The exchange requires at least one of the two
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillFilter {
    pub order_id: Option<String>,
    pub product_id: Option<ProductId>,
}

impl FillFilter {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.order_id.is_none() && self.product_id.is_none() {
            return Err(invalid("fills require an order_id or product_id"));
        }
        Ok(())
    }
}

impl QueryParams for FillFilter {
    fn params(&self) -> Vec<String> {
        let mut params = Vec::new();
        if let Some(order_id) = &self.order_id {
            params.push(format!("order_id={}", order_id));
        }
        if let Some(product_id) = &self.product_id {
            params.push(format!("product_id={}", product_id));
        }
        params
    }
}

// Limits and fees

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Limit {
    pub max: Decimal,
    pub remaining: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_in_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Limits {
    pub limit_currency: CurrencyName,
    /// Payment method type -> currency -> limit
    #[serde(default)]
    pub transfer_limits: HashMap<String, HashMap<CurrencyName, Limit>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fees {
    pub maker_fee_rate: Decimal,
    pub taker_fee_rate: Decimal,
    #[serde(default)]
    pub usd_volume: Option<Decimal>, // trailing 30 day volume
}

// Transfers

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    Deposit,
    InternalDeposit,
    Withdraw,
    InternalWithdraw,
    #[serde(other)]
    Unknown,
}

impl TransferType {
    pub fn is_deposit(&self) -> bool {
        matches!(self, Self::Deposit | Self::InternalDeposit)
    }

    pub fn is_withdrawal(&self) -> bool {
        matches!(self, Self::Withdraw | Self::InternalWithdraw)
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Deposit => "deposit",
            Self::InternalDeposit => "internal_deposit",
            Self::Withdraw => "withdraw",
            Self::InternalWithdraw => "internal_withdraw",
            Self::Unknown => "unknown",
        };
        f.write_str(value)
    }
}

/// Deposits and withdrawals share the `/transfers` resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Transfer {
    pub id: String,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    pub created_at: Time,
    #[serde(default)]
    pub completed_at: Option<Time>,
    #[serde(default)]
    pub canceled_at: Option<Time>,
    #[serde(default)]
    pub processed_at: Option<Time>,
    pub account_id: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<CurrencyName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_nonce: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

pub type Deposit = Transfer;
pub type Deposits = Paged<Deposit>;
pub type Withdrawal = Transfer;
pub type Withdrawals = Paged<Withdrawal>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositFilter {
    pub profile_id: Option<String>,
    pub deposit_type: Option<TransferType>,
}

impl DepositFilter {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        match self.deposit_type {
            Some(kind) if !kind.is_deposit() => Err(invalid(format!("deposit_type {} is invalid", kind))),
            _ => Ok(()),
        }
    }
}

impl QueryParams for DepositFilter {
    fn params(&self) -> Vec<String> {
        transfer_params(self.profile_id.as_deref(), self.deposit_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalFilter {
    pub profile_id: Option<String>,
    pub withdrawal_type: Option<TransferType>,
}

impl WithdrawalFilter {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        match self.withdrawal_type {
            Some(kind) if !kind.is_withdrawal() => {
                Err(invalid(format!("withdrawal_type {} is invalid", kind)))
            }
            _ => Ok(()),
        }
    }
}

impl QueryParams for WithdrawalFilter {
    fn params(&self) -> Vec<String> {
        transfer_params(self.profile_id.as_deref(), self.withdrawal_type)
    }
}

fn transfer_params(profile_id: Option<&str>, kind: Option<TransferType>) -> Vec<String> {
    let mut params = Vec::new();
    if let Some(profile_id) = profile_id {
        params.push(format!("profile_id={}", profile_id));
    }
    if let Some(kind) = kind {
        params.push(format!("type={}", kind));
    }
    params
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CryptoAddressWithdrawalSpec {
    pub amount: Decimal,
    pub currency: CurrencyName,
    pub crypto_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<String>,
    #[serde(default)]
    pub no_destination_tag: bool, // confirms the address needs no tag
    #[serde(default)]
    pub add_network_fee_to_total: bool,
}

impl CryptoAddressWithdrawalSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.amount <= Decimal::ZERO {
            return Err(invalid("amount must be positive"));
        }
        if self.currency.is_empty() || self.crypto_address.is_empty() {
            return Err(invalid("currency and crypto_address are required"));
        }
        if self.destination_tag.is_some() && self.no_destination_tag {
            return Err(invalid("destination_tag conflicts with no_destination_tag"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CryptoAddress {
    pub currency: CurrencyName,
    pub crypto_address: String,
}

impl QueryParams for CryptoAddress {
    fn params(&self) -> Vec<String> {
        let mut params = Vec::new();
        if !self.currency.is_empty() {
            params.push(format!("currency={}", self.currency));
        }
        if !self.crypto_address.is_empty() {
            params.push(format!("crypto_address={}", self.crypto_address));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WithdrawalFeeEstimate {
    pub fee: Decimal,
}

/// Partial body returned by create endpoints; the full resource is fetched after
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Created {
    pub id: String,
}

/// Amount and currency shared by every funding request
fn validate_amount(amount: Decimal, currency: &str) -> Result<(), ExchangeError> {
    if amount <= Decimal::ZERO {
        return Err(invalid("amount must be positive"));
    }
    if currency.is_empty() {
        return Err(invalid("currency is required"));
    }
    Ok(())
}

// Funding

/// Deposit from, or withdrawal to, a linked payment method
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentMethodTransferSpec {
    pub amount: Decimal,
    pub currency: CurrencyName,
    pub payment_method_id: String,
}

impl PaymentMethodTransferSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        validate_amount(self.amount, &self.currency)?;
        if self.payment_method_id.is_empty() {
            return Err(invalid("payment_method_id is required"));
        }
        Ok(())
    }
}

pub type PaymentMethodDepositSpec = PaymentMethodTransferSpec;
pub type PaymentMethodWithdrawalSpec = PaymentMethodTransferSpec;

/// Move funds between a Coinbase account and its trading account
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoinbaseAccountTransferSpec {
    pub amount: Decimal,
    pub currency: CurrencyName,
    pub coinbase_account_id: String,
}

impl CoinbaseAccountTransferSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        validate_amount(self.amount, &self.currency)?;
        if self.coinbase_account_id.is_empty() {
            return Err(invalid("coinbase_account_id is required"));
        }
        Ok(())
    }
}

pub type CoinbaseAccountDepositSpec = CoinbaseAccountTransferSpec;
pub type CoinbaseAccountWithdrawalSpec = CoinbaseAccountTransferSpec;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AmountOfCurrency {
    pub amount: Decimal,
    pub currency: CurrencyName,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentMethodLimit {
    pub period_in_days: u32,
    pub total: AmountOfCurrency,
    pub remaining: AmountOfCurrency,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PaymentMethodLimits {
    #[serde(default)]
    pub buy: Vec<PaymentMethodLimit>,
    #[serde(default)]
    pub deposit: Vec<PaymentMethodLimit>,
    #[serde(default)]
    pub instant_buy: Vec<PaymentMethodLimit>,
    #[serde(default)]
    pub sell: Vec<PaymentMethodLimit>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String, // ach_bank_account, fiat_account, ...
    pub name: String,
    pub currency: CurrencyName,
    #[serde(default)]
    pub primary_buy: bool,
    #[serde(default)]
    pub primary_sell: bool,
    #[serde(default)]
    pub allow_buy: bool,
    #[serde(default)]
    pub allow_sell: bool,
    #[serde(default)]
    pub allow_deposit: bool,
    #[serde(default)]
    pub limits: PaymentMethodLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinbaseAccountType {
    Fiat,
    Wallet,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WireDepositInformation {
    pub account_number: String,
    pub routing_number: String,
    pub bank_name: String,
    pub bank_address: String,
    pub bank_country: Country,
    pub account_name: String,
    pub account_address: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SepaDepositInformation {
    pub iban: String,
    pub swift: String,
    pub bank_name: String,
    pub bank_address: String,
    pub bank_country_name: String,
    pub account_name: String,
    pub account_address: String,
    pub reference: String,
}

/// Wallet or fiat account on the retail side, a source and target for funding
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoinbaseAccount {
    pub id: String,
    pub name: String,
    pub balance: Decimal,
    pub currency: CurrencyName,
    #[serde(rename = "type")]
    pub account_type: CoinbaseAccountType,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub active: bool,
    // Only fiat accounts carry deposit instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_deposit_information: Option<WireDepositInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sepa_deposit_information: Option<SepaDepositInformation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressInfo {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CryptoDepositAddress {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub address_info: AddressInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub exchange_deposit_address: bool,
    pub created_at: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Time>,
}

// Conversions

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StablecoinConversionSpec {
    pub from: CurrencyName,
    pub to: CurrencyName,
    pub amount: Decimal,
}

impl StablecoinConversionSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        validate_amount(self.amount, &self.from)?;
        if self.to.is_empty() {
            return Err(invalid("conversion target currency is required"));
        }
        if self.from == self.to {
            return Err(invalid("conversion currencies must differ"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StablecoinConversion {
    pub id: String,
    pub amount: Decimal,
    pub from_account_id: String,
    pub to_account_id: String,
    pub from: CurrencyName,
    pub to: CurrencyName,
}

// Reports

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Account,
    Fills,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReportSpec {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub start_date: Option<Time>,
    pub end_date: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>, // fills reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>, // account reports
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ReportSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        let missing = |value: &Option<String>| value.as_deref().map_or(true, str::is_empty);
        match self.report_type {
            ReportType::Fills if missing(&self.product_id) => {
                return Err(invalid("product_id is required for fills reports"));
            }
            ReportType::Account if missing(&self.account_id) => {
                return Err(invalid("account_id is required for account reports"));
            }
            _ => {}
        }
        let (Some(start), Some(end)) = (&self.start_date, &self.end_date) else {
            return Err(invalid("start_date and end_date are required"));
        };
        if start > end {
            return Err(invalid("start_date must not be after end_date"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Creating,
    Pending,
    Ready, // file_url is available
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReportDateRange {
    pub start_date: Time,
    pub end_date: Time,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Report {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub status: ReportStatus,
    #[serde(default)]
    pub created_at: Option<Time>,
    #[serde(default)]
    pub completed_at: Option<Time>,
    #[serde(default)]
    pub expires_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ReportDateRange>,
}

// Profiles

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub active: bool,
    pub is_default: bool,
    pub created_at: Time,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileFilter {
    pub active: bool,
}

impl QueryParams for ProfileFilter {
    fn params(&self) -> Vec<String> {
        if self.active {
            vec!["active".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileTransferSpec {
    pub from: String, // profile id
    pub to: String,
    pub currency: CurrencyName,
    pub amount: Decimal,
}

impl ProfileTransferSpec {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        validate_amount(self.amount, &self.currency)?;
        if self.from.is_empty() || self.to.is_empty() {
            return Err(invalid("from and to profiles are required"));
        }
        if self.from == self.to {
            return Err(invalid("cannot transfer to the same profile"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileTransfer {
    pub from: String,
    pub to: String,
    pub currency: CurrencyName,
    pub amount: Decimal,
}

// Products

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub display_name: String,
    pub base_currency: CurrencyName,
    pub quote_currency: CurrencyName,
    pub base_increment: Decimal,
    pub quote_increment: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_min_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_max_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_market_funds: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_market_funds: Option<Decimal>,
    pub status: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub cancel_only: bool,
    #[serde(default)]
    pub limit_only: bool,
    #[serde(default)]
    pub post_only: bool,
    #[serde(default)]
    pub trading_disabled: bool,
}

/// Order book granularity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookLevel {
    #[default]
    Best = 1,
    Top50 = 2,
    Full = 3, // non-aggregated
}

impl QueryParams for BookLevel {
    fn params(&self) -> Vec<String> {
        vec![format!("level={}", *self as u8)]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "(Decimal, Decimal, u64)", into = "(Decimal, Decimal, u64)")]
pub struct AggregatedBookEntry {
    pub price: Decimal,
    pub size: Decimal,
    pub num_orders: u64,
}

impl From<(Decimal, Decimal, u64)> for AggregatedBookEntry {
    fn from((price, size, num_orders): (Decimal, Decimal, u64)) -> Self {
        Self {
            price,
            size,
            num_orders,
        }
    }
}

impl From<AggregatedBookEntry> for (Decimal, Decimal, u64) {
    fn from(entry: AggregatedBookEntry) -> Self {
        (entry.price, entry.size, entry.num_orders)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregatedOrderBook {
    pub sequence: u64,
    pub bids: Vec<AggregatedBookEntry>,
    pub asks: Vec<AggregatedBookEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "(Decimal, Decimal, String)", into = "(Decimal, Decimal, String)")]
pub struct BookEntry {
    pub price: Decimal,
    pub size: Decimal,
    pub order_id: String,
}

impl From<(Decimal, Decimal, String)> for BookEntry {
    fn from((price, size, order_id): (Decimal, Decimal, String)) -> Self {
        Self {
            price,
            size,
            order_id,
        }
    }
}

impl From<BookEntry> for (Decimal, Decimal, String) {
    fn from(entry: BookEntry) -> Self {
        (entry.price, entry.size, entry.order_id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderBook {
    pub sequence: u64,
    pub bids: Vec<BookEntry>,
    pub asks: Vec<BookEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductTicker {
    pub trade_id: i64,
    pub price: Decimal,
    pub size: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: Decimal,
    pub time: Time,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductTrade {
    pub trade_id: i64,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side, // maker side
    pub time: Time,
}

pub type ProductTrades = Paged<ProductTrade>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductStats {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_30day: Option<Decimal>,
}

/// Supported candle widths in seconds
pub const TIMESLICES: [u32; 6] = [60, 300, 900, 3600, 21600, 86400];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricRateFilter {
    pub granularity: u32,
    pub start: Option<Time>,
    pub end: Option<Time>, // ignored by the exchange unless start is also set
}

impl Default for HistoricRateFilter {
    fn default() -> Self {
        Self {
            granularity: 60,
            start: None,
            end: None,
        }
    }
}

impl HistoricRateFilter {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if !TIMESLICES.contains(&self.granularity) {
            return Err(invalid(format!("timeslice({}s) is invalid", self.granularity)));
        }
        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            if start > end {
                return Err(invalid("start must not be after end"));
            }
        }
        Ok(())
    }
}

impl QueryParams for HistoricRateFilter {
    fn params(&self) -> Vec<String> {
        let mut params = vec![format!("granularity={}", self.granularity)];
        if let Some(end) = &self.end {
            params.push(format!("end={}", end.to_query()));
        }
        if let Some(start) = &self.start {
            params.push(format!("start={}", start.to_query()));
        }
        params
    }
}

type CandleRow = (i64, Decimal, Decimal, Decimal, Decimal, Decimal);

/// `[time, low, high, open, close, volume]` on the wire
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "CandleRow", into = "CandleRow")]
pub struct Candle {
    pub time: Time,
    pub low: Decimal,
    pub high: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl TryFrom<CandleRow> for Candle {
    type Error = ExchangeError;

    fn try_from((time, low, high, open, close, volume): CandleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            time: Time::from_unix(time)?,
            low,
            high,
            open,
            close,
            volume,
        })
    }
}

impl From<Candle> for CandleRow {
    fn from(candle: Candle) -> Self {
        (
            candle.time.0.timestamp(),
            candle.low,
            candle.high,
            candle.open,
            candle.close,
            candle.volume,
        )
    }
}

// Currencies and time

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Currency {
    pub id: CurrencyName,
    pub name: String,
    pub min_size: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_precision: Option<Decimal>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub convertible_to: Vec<CurrencyName>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerTime {
    pub iso: Time,
    pub epoch: Decimal,
}

unpaged!(
    Account,
    LedgerEntry,
    Hold,
    Order,
    Fill,
    Limits,
    Fees,
    Transfer,
    WithdrawalFeeEstimate,
    Created,
    PaymentMethod,
    CoinbaseAccount,
    CryptoDepositAddress,
    StablecoinConversion,
    Report,
    Profile,
    ProfileTransfer,
    Product,
    AggregatedOrderBook,
    OrderBook,
    ProductTicker,
    ProductTrade,
    ProductStats,
    Candle,
    Currency,
    ServerTime,
);
