pub mod builder;
pub mod client;
pub mod codec;
pub mod dev;
pub mod time;
pub mod types;

// Re-export main components
pub use builder::{build_connector, build_development_connector, CoinbaseBuilder};
pub use client::CoinbaseClient;
pub use codec::{Channel, ChannelName, ChannelSpec, CoinbaseCodec, MessageType, SubscriptionRequest};
pub use dev::DevelopmentRest;
pub use time::Time;
pub use types::*;
