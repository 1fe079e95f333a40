//! Shared fixtures for the integration tests

use coinbase_relay::core::config::ExchangeConfig;
use coinbase_relay::core::kernel::ReqwestRest;
use coinbase_relay::exchanges::coinbase::{CoinbaseBuilder, CoinbaseClient};
use std::sync::Arc;
use wiremock::MockServer;

/// Base64 secret whose signatures are pinned in the tests
pub const TEST_SECRET: &str = "zZ==";

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

#[allow(dead_code)]
pub fn test_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::new("key".to_string(), "passphrase".to_string(), TEST_SECRET.to_string())
        .base_url(server.uri())
}

/// Signed client against the mock server with the clock pinned to 1
pub fn test_client(server: &MockServer) -> CoinbaseClient<ReqwestRest> {
    CoinbaseBuilder::new(test_config(server))
        .with_clock(Arc::new(|| 1))
        .build()
        .expect("client should build")
}

#[allow(dead_code)]
pub fn order_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "price": "0.10000000",
        "size": "0.01000000",
        "product_id": "BTC-USD",
        "side": "buy",
        "stp": "dc",
        "type": "limit",
        "time_in_force": "GTC",
        "post_only": false,
        "created_at": "2016-12-08T20:02:28.53864Z",
        "fill_fees": "0.0000000000000000",
        "filled_size": "0.00000000",
        "executed_value": "0.0000000000000000",
        "status": "pending",
        "settled": false
    })
}

#[allow(dead_code)]
pub fn transfer_json(id: &str, kind: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": kind,
        "created_at": "2021-04-09 19:04:58.964459+00",
        "completed_at": null,
        "canceled_at": null,
        "processed_at": null,
        "account_id": "account",
        "user_id": "user",
        "user_nonce": null,
        "amount": "1.00000000",
        "details": {
            "crypto_address": "address",
            "coinbase_account_id": "cb-account"
        }
    })
}
