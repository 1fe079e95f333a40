use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::rest::Clock;
use crate::core::kernel::{
    FeedConfig, HmacSigner, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig,
    TracingObserver, TransportObserver, WsConfig,
};
use crate::exchanges::coinbase::client::CoinbaseClient;
use crate::exchanges::coinbase::dev::DevelopmentRest;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Builder for [`CoinbaseClient`]
///
/// Requests are signed only when the configuration carries a full set of
/// credentials; without them only public endpoints work.
pub struct CoinbaseBuilder {
    config: ExchangeConfig,
    observer: Arc<dyn TransportObserver>,
    feed_config: FeedConfig,
    ws_config: WsConfig,
    timeout_seconds: Option<u64>,
    user_agent: Option<String>,
    clock: Option<Clock>,
}

impl CoinbaseBuilder {
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
            feed_config: FeedConfig::default(),
            ws_config: WsConfig::default(),
            timeout_seconds: None,
            user_agent: None,
            clock: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransportObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_feed_config(mut self, feed_config: FeedConfig) -> Self {
        self.feed_config = feed_config;
        self
    }

    pub fn with_ws_config(mut self, ws_config: WsConfig) -> Self {
        self.ws_config = ws_config;
        self
    }

    /// Request timeout in seconds
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Override the signing timestamp source
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn build_rest(&self) -> Result<ReqwestRest, ExchangeError> {
        let mut rest_config = RestClientConfig::new(self.config.rest_url());
        if let Some(timeout_seconds) = self.timeout_seconds {
            rest_config = rest_config.with_timeout(timeout_seconds);
        }
        if let Some(user_agent) = &self.user_agent {
            rest_config = rest_config.with_user_agent(user_agent.clone());
        }

        let mut builder = RestClientBuilder::new(rest_config).with_observer(self.observer.clone());
        if self.config.has_credentials() {
            builder = builder.with_signer(Arc::new(HmacSigner::new(self.config.credentials())));
        } else {
            debug!("no credentials configured, requests are unsigned");
        }
        if let Some(clock) = &self.clock {
            builder = builder.with_clock(clock.clone());
        }
        builder.build()
    }

    fn assemble<R: RestClient>(self, rest: R) -> CoinbaseClient<R> {
        CoinbaseClient::new(
            rest,
            self.config.websocket_url(),
            self.feed_config,
            self.ws_config,
            self.observer,
        )
    }

    pub fn build(self) -> Result<CoinbaseClient<ReqwestRest>, ExchangeError> {
        let rest = self.build_rest()?;
        Ok(self.assemble(rest))
    }

    /// Client whose responses are recorded in the shape store at `store_path`
    pub fn build_development(
        self,
        store_path: impl AsRef<Path>,
    ) -> Result<CoinbaseClient<DevelopmentRest<ReqwestRest>>, ExchangeError> {
        let rest = DevelopmentRest::open(self.build_rest()?, store_path)?;
        Ok(self.assemble(rest))
    }
}

/// Production client with default settings
pub fn build_connector(config: ExchangeConfig) -> Result<CoinbaseClient<ReqwestRest>, ExchangeError> {
    CoinbaseBuilder::new(config).build()
}

/// Development-mode client with default settings
pub fn build_development_connector(
    config: ExchangeConfig,
    store_path: impl AsRef<Path>,
) -> Result<CoinbaseClient<DevelopmentRest<ReqwestRest>>, ExchangeError> {
    CoinbaseBuilder::new(config).build_development(store_path)
}
