/// Transport kernel shared by every exchange module
///
/// The kernel holds only transport logic and generic interfaces; nothing in
/// here knows about a particular exchange's endpoints or payloads.
///
/// # Architecture
///
/// ## Transport Layer
/// - `RestClient`: signed HTTP request pipeline with pagination merge
/// - `WsSession`: WebSocket connection management
/// - `feed::relay`: reader/writer task group streaming frames to a consumer
///
/// ## Authentication
/// - `Signer`: pluggable authentication interface
/// - `HmacSigner`: HMAC-SHA256 over `timestamp + method + path + body`
///
/// ## Message Handling
/// - `WsCodec`: exchange-specific subscription encoding and frame decoding
///
/// ## Observability
/// - `TransportObserver`: hooks invoked before send, after receive, on error
///   and for each feed frame
///
/// # Example
/// ```rust,no_run
/// use coinbase_relay::core::config::ExchangeConfig;
/// use coinbase_relay::core::kernel::*;
/// use serde_json::Value;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExchangeConfig::from_env("COINBASE")?;
/// let rest = RestClientBuilder::new(RestClientConfig::new(config.rest_url()))
///     .with_signer(Arc::new(HmacSigner::new(config.credentials())))
///     .build()?;
///
/// let time: Value = rest.get("/time").await?;
/// println!("{}", time);
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod feed;
pub mod observer;
pub mod rest;
pub mod signer;
pub mod ws;

pub use codec::WsCodec;
pub use feed::{Feed, FeedConfig, FeedPublisher, OverflowPolicy};
pub use observer::{TracingObserver, TransportObserver};
pub use rest::{
    ApiResponse, RawResponse, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig,
};
pub use signer::{HmacSigner, SignatureResult, Signer};
pub use ws::{TungsteniteWs, WsConfig, WsSession};
