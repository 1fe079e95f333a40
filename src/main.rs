use anyhow::Context;
use coinbase_relay::core::config::ExchangeConfig;
use coinbase_relay::exchanges::coinbase::{ChannelName, CoinbaseBuilder, SubscriptionRequest};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetch a few public endpoints, then stream the ticker for a few seconds.
///
/// Set `COINBASE_SHAPES` to a file path to record response shapes there.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = load_config();
    let builder = CoinbaseBuilder::new(config);

    if let Ok(store_path) = std::env::var("COINBASE_SHAPES") {
        let client = builder
            .build_development(&store_path)
            .context("failed to build development client")?;
        let products = client.get_products().await?;
        println!("Found {} products", products.len());
        client.close().await?;
        println!("{}", client.rest().store().dump());
        return Ok(());
    }

    let client = builder.build().context("failed to build client")?;

    let time = client.get_server_time().await?;
    println!("Server time: {}", time.iso);

    let products = client.get_products().await?;
    println!("Found {} products", products.len());
    for product in products.iter().take(5) {
        println!(
            "Product: {} ({}->{}), Status: {}",
            product.id, product.base_currency, product.quote_currency, product.status
        );
    }

    let (publisher, mut feed) = client.feed();
    let subscription = SubscriptionRequest::new(["BTC-USD"], [ChannelName::Ticker]);
    let cancel = CancellationToken::new();

    let stop = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        stop.cancel();
    });

    let printer = tokio::spawn(async move {
        while let Some(message) = feed.messages.recv().await {
            println!("{}", message);
        }
    });

    match client.watch(&subscription, publisher, &cancel).await {
        Ok(()) => println!("Feed closed"),
        Err(e) if e.is_cancelled() => println!("Feed stopped"),
        Err(e) => return Err(e.into()),
    }
    printer.await?;

    client.close().await?;
    Ok(())
}

fn load_config() -> ExchangeConfig {
    #[cfg(feature = "env-file")]
    let loaded = ExchangeConfig::from_env_file("COINBASE");
    #[cfg(not(feature = "env-file"))]
    let loaded = ExchangeConfig::from_env("COINBASE");

    loaded.unwrap_or_else(|e| {
        tracing::info!("{}, using public endpoints only", e);
        ExchangeConfig::read_only()
    })
}
