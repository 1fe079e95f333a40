use crate::core::errors::ExchangeError;
use crate::core::kernel::feed::{self, relay, Feed, FeedConfig, FeedPublisher};
use crate::core::kernel::{RestClient, TransportObserver, TungsteniteWs, WsConfig, WsSession};
use crate::core::pagination::{query, PaginationParams, QueryParams};
use crate::exchanges::coinbase::codec::{CoinbaseCodec, SubscriptionRequest};
use crate::exchanges::coinbase::types::{
    Account, AggregatedOrderBook, BookLevel, CancelOrderSpec, Candle, CoinbaseAccount,
    CoinbaseAccountDepositSpec, CoinbaseAccountWithdrawalSpec, Created, CryptoAddress,
    CryptoAddressWithdrawalSpec, CryptoDepositAddress, Currency, Deposit, DepositFilter, Deposits,
    Fees, FillFilter, Fills, HistoricRateFilter, Holds, Ledger, LimitOrder, Limits, MarketOrder, Order,
    OrderBook, OrderFilter, Orders, PaymentMethod, PaymentMethodDepositSpec,
    PaymentMethodWithdrawalSpec, Product, ProductStats, ProductTicker, ProductTrades, Profile,
    ProfileFilter, ProfileTransfer, ProfileTransferSpec, Report, ReportSpec, ServerTime,
    StablecoinConversion, StablecoinConversionSpec, Withdrawal, WithdrawalFeeEstimate,
    WithdrawalFilter, Withdrawals,
};
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Path query from any number of parameter sources, order irrelevant
fn path_query(parts: &[&dyn QueryParams]) -> String {
    let params: Vec<String> = parts.iter().flat_map(|part| part.params()).collect();
    query(&params)
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value, ExchangeError> {
    Ok(serde_json::to_value(value)?)
}

/// One method per endpoint over a [`RestClient`], plus the streaming feed.
///
/// Methods validate their arguments before touching the network and return
/// the exchange's own types unchanged.
pub struct CoinbaseClient<R: RestClient> {
    rest: R,
    feed_url: String,
    feed_config: FeedConfig,
    ws_config: WsConfig,
    observer: Arc<dyn TransportObserver>,
}

impl<R: RestClient> std::fmt::Debug for CoinbaseClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseClient")
            .field("feed_url", &self.feed_url)
            .field("feed_config", &self.feed_config)
            .finish_non_exhaustive()
    }
}

impl<R: RestClient> CoinbaseClient<R> {
    pub fn new(
        rest: R,
        feed_url: String,
        feed_config: FeedConfig,
        ws_config: WsConfig,
        observer: Arc<dyn TransportObserver>,
    ) -> Self {
        Self {
            rest,
            feed_url,
            feed_config,
            ws_config,
            observer,
        }
    }

    /// The underlying request pipeline
    pub fn rest(&self) -> &R {
        &self.rest
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Release the pipeline. In development mode this persists the shape store.
    pub async fn close(&self) -> Result<(), ExchangeError> {
        self.rest.close().await
    }

    // Accounts

    #[instrument(skip(self))]
    pub async fn get_accounts(&self) -> Result<Vec<Account>, ExchangeError> {
        self.rest.get("/accounts/").await
    }

    #[instrument(skip(self))]
    pub async fn get_account(&self, account_id: &str) -> Result<Account, ExchangeError> {
        self.rest.get(&format!("/accounts/{}", account_id)).await
    }

    #[instrument(skip(self))]
    pub async fn get_account_ledger(
        &self,
        account_id: &str,
        pagination: &PaginationParams,
    ) -> Result<Ledger, ExchangeError> {
        pagination.validate()?;
        let path = format!("/accounts/{}/ledger/{}", account_id, path_query(&[pagination]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_holds(
        &self,
        account_id: &str,
        pagination: &PaginationParams,
    ) -> Result<Holds, ExchangeError> {
        pagination.validate()?;
        let path = format!("/accounts/{}/holds/{}", account_id, path_query(&[pagination]));
        self.rest.get(&path).await
    }

    // Orders

    /// Place a limit order. The exchange answers with the full order, so
    /// nothing is fetched afterwards; an IOC or FOK order may already be gone.
    #[instrument(skip(self, order), fields(product_id = %order.product_id))]
    pub async fn create_limit_order(&self, order: &LimitOrder) -> Result<Order, ExchangeError> {
        order.validate()?;
        self.rest.post("/orders/", Some(&to_body(order)?)).await
    }

    /// Place a market order. The exchange answers with the full order, so
    /// nothing is fetched afterwards; an IOC or FOK order may already be gone.
    #[instrument(skip(self, order), fields(product_id = %order.product_id))]
    pub async fn create_market_order(&self, order: &MarketOrder) -> Result<Order, ExchangeError> {
        order.validate()?;
        self.rest.post("/orders/", Some(&to_body(order)?)).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, spec: &CancelOrderSpec) -> Result<(), ExchangeError> {
        spec.validate()?;
        let path = format!("/orders/{}{}", spec.path(), path_query(&[spec]));
        self.rest.send(Method::DELETE, &path, None).await
    }

    /// Cancel every open order, optionally for one product. Returns the cancelled ids.
    #[instrument(skip(self))]
    pub async fn cancel_all_orders(&self, product_id: Option<&str>) -> Result<Vec<String>, ExchangeError> {
        let params: Vec<String> = product_id
            .map(|product_id| format!("product_id={}", product_id))
            .into_iter()
            .collect();
        self.rest.delete(&format!("/orders/{}", query(&params))).await
    }

    #[instrument(skip(self))]
    pub async fn get_orders(
        &self,
        filter: &OrderFilter,
        pagination: &PaginationParams,
    ) -> Result<Orders, ExchangeError> {
        pagination.validate()?;
        let path = format!("/orders/{}", path_query(&[filter, pagination]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        self.rest.get(&format!("/orders/{}", order_id)).await
    }

    #[instrument(skip(self))]
    pub async fn get_client_order(&self, client_order_id: &str) -> Result<Order, ExchangeError> {
        self.rest.get(&format!("/orders/client:{}", client_order_id)).await
    }

    #[instrument(skip(self))]
    pub async fn get_fills(
        &self,
        filter: &FillFilter,
        pagination: &PaginationParams,
    ) -> Result<Fills, ExchangeError> {
        filter.validate()?;
        pagination.validate()?;
        let path = format!("/fills/{}", path_query(&[filter, pagination]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_limits(&self) -> Result<Limits, ExchangeError> {
        self.rest.get("/users/self/exchange-limits/").await
    }

    // Transfers

    /// Deposits share `/transfers` with withdrawals and are filtered locally.
    /// The returned page keeps the server cursors even when nothing matched,
    /// so callers can keep paging past a page of withdrawals.
    #[instrument(skip(self))]
    pub async fn get_deposits(
        &self,
        filter: &DepositFilter,
        pagination: &PaginationParams,
    ) -> Result<Deposits, ExchangeError> {
        filter.validate()?;
        pagination.validate()?;
        let path = format!("/transfers/{}", path_query(&[filter, pagination]));
        let mut transfers: Deposits = self.rest.get(&path).await?;

        let total = transfers.len();
        transfers.items.retain(|t| t.transfer_type.is_deposit());
        debug!(total, kept = transfers.len(), "filtered transfers to deposits");
        Ok(transfers)
    }

    #[instrument(skip(self))]
    pub async fn get_deposit(&self, deposit_id: &str) -> Result<Deposit, ExchangeError> {
        self.rest.get(&format!("/transfers/{}", deposit_id)).await
    }

    /// Deposit from a linked payment method, see [`Self::list_payment_methods`]
    #[instrument(skip(self, spec), fields(currency = %spec.currency))]
    pub async fn create_payment_method_deposit(
        &self,
        spec: &PaymentMethodDepositSpec,
    ) -> Result<Deposit, ExchangeError> {
        spec.validate()?;
        let created: Created = self
            .rest
            .post("/deposits/payment-method/", Some(&to_body(spec)?))
            .await?;
        self.get_deposit(&created.id).await
    }

    /// Deposit from a Coinbase account, see [`Self::list_coinbase_accounts`]
    #[instrument(skip(self, spec), fields(currency = %spec.currency))]
    pub async fn create_coinbase_account_deposit(
        &self,
        spec: &CoinbaseAccountDepositSpec,
    ) -> Result<Deposit, ExchangeError> {
        spec.validate()?;
        let created: Created = self
            .rest
            .post("/deposits/coinbase-account/", Some(&to_body(spec)?))
            .await?;
        self.get_deposit(&created.id).await
    }

    #[instrument(skip(self))]
    pub async fn create_crypto_deposit_address(
        &self,
        coinbase_account_id: &str,
    ) -> Result<CryptoDepositAddress, ExchangeError> {
        if coinbase_account_id.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "coinbase_account_id is required".to_string(),
            ));
        }
        let path = format!("/coinbase-accounts/{}/addresses/", coinbase_account_id);
        self.rest.post(&path, None).await
    }

    /// Withdrawals counterpart of [`Self::get_deposits`]
    #[instrument(skip(self))]
    pub async fn get_withdrawals(
        &self,
        filter: &WithdrawalFilter,
        pagination: &PaginationParams,
    ) -> Result<Withdrawals, ExchangeError> {
        filter.validate()?;
        pagination.validate()?;
        let path = format!("/transfers/{}", path_query(&[filter, pagination]));
        let mut transfers: Withdrawals = self.rest.get(&path).await?;

        let total = transfers.len();
        transfers.items.retain(|t| t.transfer_type.is_withdrawal());
        debug!(total, kept = transfers.len(), "filtered transfers to withdrawals");
        Ok(transfers)
    }

    #[instrument(skip(self))]
    pub async fn get_withdrawal(&self, withdrawal_id: &str) -> Result<Withdrawal, ExchangeError> {
        self.rest.get(&format!("/transfers/{}", withdrawal_id)).await
    }

    #[instrument(skip(self, spec), fields(currency = %spec.currency))]
    pub async fn create_payment_method_withdrawal(
        &self,
        spec: &PaymentMethodWithdrawalSpec,
    ) -> Result<Withdrawal, ExchangeError> {
        spec.validate()?;
        let created: Created = self
            .rest
            .post("/withdrawals/payment-method/", Some(&to_body(spec)?))
            .await?;
        self.get_withdrawal(&created.id).await
    }

    #[instrument(skip(self, spec), fields(currency = %spec.currency))]
    pub async fn create_coinbase_account_withdrawal(
        &self,
        spec: &CoinbaseAccountWithdrawalSpec,
    ) -> Result<Withdrawal, ExchangeError> {
        spec.validate()?;
        let created: Created = self
            .rest
            .post("/withdrawals/coinbase-account/", Some(&to_body(spec)?))
            .await?;
        self.get_withdrawal(&created.id).await
    }

    /// Withdraw to a crypto address and return the resulting transfer
    #[instrument(skip(self, spec), fields(currency = %spec.currency))]
    pub async fn create_crypto_withdrawal(
        &self,
        spec: &CryptoAddressWithdrawalSpec,
    ) -> Result<Withdrawal, ExchangeError> {
        spec.validate()?;
        let created: Created = self
            .rest
            .post("/withdrawals/crypto/", Some(&to_body(spec)?))
            .await?;
        self.get_withdrawal(&created.id).await
    }

    #[instrument(skip(self))]
    pub async fn get_withdrawal_fee_estimate(
        &self,
        address: &CryptoAddress,
    ) -> Result<WithdrawalFeeEstimate, ExchangeError> {
        let path = format!("/withdrawals/fee-estimate/{}", path_query(&[address]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self, spec), fields(from = %spec.from, to = %spec.to))]
    pub async fn create_stablecoin_conversion(
        &self,
        spec: &StablecoinConversionSpec,
    ) -> Result<StablecoinConversion, ExchangeError> {
        spec.validate()?;
        self.rest.post("/conversions/", Some(&to_body(spec)?)).await
    }

    #[instrument(skip(self))]
    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, ExchangeError> {
        self.rest.get("/payment-methods/").await
    }

    #[instrument(skip(self))]
    pub async fn list_coinbase_accounts(&self) -> Result<Vec<CoinbaseAccount>, ExchangeError> {
        self.rest.get("/coinbase-accounts/").await
    }

    #[instrument(skip(self))]
    pub async fn get_fees(&self) -> Result<Fees, ExchangeError> {
        self.rest.get("/fees/").await
    }

    // Reports

    /// Request a report. Poll [`Self::get_report`] until its status is ready.
    #[instrument(skip(self, spec), fields(report_type = ?spec.report_type))]
    pub async fn create_report(&self, spec: &ReportSpec) -> Result<Report, ExchangeError> {
        spec.validate()?;
        let created: Created = self.rest.post("/reports/", Some(&to_body(spec)?)).await?;
        self.get_report(&created.id).await
    }

    #[instrument(skip(self))]
    pub async fn get_report(&self, report_id: &str) -> Result<Report, ExchangeError> {
        self.rest.get(&format!("/reports/{}", report_id)).await
    }

    // Profiles

    #[instrument(skip(self))]
    pub async fn get_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, ExchangeError> {
        self.rest.get(&format!("/profiles/{}", path_query(&[filter]))).await
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, profile_id: &str) -> Result<Profile, ExchangeError> {
        self.rest.get(&format!("/profiles/{}", profile_id)).await
    }

    /// Move funds between two of the user's profiles
    #[instrument(skip(self, spec), fields(currency = %spec.currency))]
    pub async fn create_profile_transfer(
        &self,
        spec: &ProfileTransferSpec,
    ) -> Result<ProfileTransfer, ExchangeError> {
        spec.validate()?;
        self.rest.post("/profiles/transfer", Some(&to_body(spec)?)).await
    }

    // Products

    #[instrument(skip(self))]
    pub async fn get_products(&self) -> Result<Vec<Product>, ExchangeError> {
        self.rest.get("/products/").await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: &str) -> Result<Product, ExchangeError> {
        self.rest.get(&format!("/products/{}", product_id)).await
    }

    /// Level 1 or 2 book. Level 3 has a different row format, see [`Self::get_order_book`].
    #[instrument(skip(self))]
    pub async fn get_aggregated_order_book(
        &self,
        product_id: &str,
        level: BookLevel,
    ) -> Result<AggregatedOrderBook, ExchangeError> {
        if level == BookLevel::Full {
            return Err(ExchangeError::InvalidParameters(
                "aggregated book level must be best or top50".to_string(),
            ));
        }
        let path = format!("/products/{}/book/{}", product_id, path_query(&[&level]));
        self.rest.get(&path).await
    }

    /// Full, non-aggregated book
    #[instrument(skip(self))]
    pub async fn get_order_book(&self, product_id: &str) -> Result<OrderBook, ExchangeError> {
        let path = format!("/products/{}/book/{}", product_id, path_query(&[&BookLevel::Full]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_product_ticker(&self, product_id: &str) -> Result<ProductTicker, ExchangeError> {
        self.rest.get(&format!("/products/{}/ticker", product_id)).await
    }

    #[instrument(skip(self))]
    pub async fn get_product_trades(
        &self,
        product_id: &str,
        pagination: &PaginationParams,
    ) -> Result<ProductTrades, ExchangeError> {
        pagination.validate()?;
        let path = format!("/products/{}/trades/{}", product_id, path_query(&[pagination]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_historic_rates(
        &self,
        product_id: &str,
        filter: &HistoricRateFilter,
    ) -> Result<Vec<Candle>, ExchangeError> {
        filter.validate()?;
        let path = format!("/products/{}/candles/{}", product_id, path_query(&[filter]));
        self.rest.get(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_product_stats(&self, product_id: &str) -> Result<ProductStats, ExchangeError> {
        self.rest.get(&format!("/products/{}/stats", product_id)).await
    }

    // Currencies and time

    #[instrument(skip(self))]
    pub async fn get_currencies(&self) -> Result<Vec<Currency>, ExchangeError> {
        self.rest.get("/currencies/").await
    }

    #[instrument(skip(self))]
    pub async fn get_currency(&self, currency: &str) -> Result<Currency, ExchangeError> {
        self.rest.get(&format!("/currencies/{}", currency)).await
    }

    #[instrument(skip(self))]
    pub async fn get_server_time(&self) -> Result<ServerTime, ExchangeError> {
        self.rest.get("/time").await
    }

    // Feed

    /// Consumer and publisher halves for [`Self::watch`]
    pub fn feed(&self) -> (FeedPublisher<SubscriptionRequest>, Feed<SubscriptionRequest>) {
        feed::channel(self.feed_config.clone())
    }

    /// Stream the feed until the server closes it, the consumer hangs up or
    /// `cancel` fires. Each call opens a fresh connection.
    #[instrument(skip_all, fields(url = %self.feed_url))]
    pub async fn watch(
        &self,
        subscription: &SubscriptionRequest,
        publisher: FeedPublisher<SubscriptionRequest>,
        cancel: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        let mut session = TungsteniteWs::new(self.feed_url.clone()).with_config(self.ws_config.clone());
        self.watch_on(&mut session, subscription, publisher, cancel).await
    }

    /// [`Self::watch`] over a caller-supplied session
    pub async fn watch_on<W: WsSession>(
        &self,
        session: &mut W,
        subscription: &SubscriptionRequest,
        publisher: FeedPublisher<SubscriptionRequest>,
        cancel: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        subscription.validate()?;
        relay(
            session,
            &CoinbaseCodec,
            subscription,
            publisher,
            self.observer.as_ref(),
            cancel,
        )
        .await
    }
}
