use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::exchanges::coinbase::types::ProductId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Subscribe,
    Unsubscribe,
}

/// Feed channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelName {
    Heartbeat,
    Status,
    Ticker,
    Level2,
    Full,
    User, // authenticated
    Matches,
}

/// A channel bound to its own product list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Channel {
    pub name: ChannelName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_ids: Vec<ProductId>,
}

/// Channels are either a bare name, applying the request's products, or a
/// name with its own products
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChannelSpec {
    Name(ChannelName),
    Channel(Channel),
}

impl From<ChannelName> for ChannelSpec {
    fn from(name: ChannelName) -> Self {
        Self::Name(name)
    }
}

impl From<Channel> for ChannelSpec {
    fn from(channel: Channel) -> Self {
        Self::Channel(channel)
    }
}

/// First frame written after connecting, and any update sent while relaying
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    pub channels: Vec<ChannelSpec>,
}

impl SubscriptionRequest {
    pub fn new<P, C>(product_ids: P, channels: C) -> Self
    where
        P: IntoIterator,
        P::Item: Into<ProductId>,
        C: IntoIterator,
        C::Item: Into<ChannelSpec>,
    {
        Self {
            message_type: MessageType::Subscribe,
            product_ids: product_ids.into_iter().map(Into::into).collect(),
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    /// Same products and channels, as an unsubscribe
    pub fn unsubscribe(mut self) -> Self {
        self.message_type = MessageType::Unsubscribe;
        self
    }

    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.channels.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "subscription requires at least one channel".to_string(),
            ));
        }
        Ok(())
    }
}

/// Feed codec: subscriptions go out as JSON text, every data frame comes back
/// as an untyped JSON value
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinbaseCodec;

impl CoinbaseCodec {
    pub fn new() -> Self {
        Self
    }
}

impl WsCodec for CoinbaseCodec {
    type Subscription = SubscriptionRequest;
    type Message = Value;

    fn encode_subscription(&self, subscription: &SubscriptionRequest) -> Result<Message, ExchangeError> {
        subscription.validate()?;
        let text = serde_json::to_string(subscription)?;
        trace!(%text, "encoded subscription");
        Ok(Message::Text(text))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Value>, ExchangeError> {
        match message {
            Message::Text(text) => Ok(Some(serde_json::from_str(&text)?)),
            Message::Binary(data) => Ok(Some(serde_json::from_slice(&data)?)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_wire_format() {
        let request = SubscriptionRequest::new(
            ["BTC-USD", "ETH-USD"],
            [
                ChannelSpec::from(ChannelName::Heartbeat),
                ChannelSpec::from(Channel {
                    name: ChannelName::Ticker,
                    product_ids: vec!["ETH-BTC".into()],
                }),
            ],
        );

        let message = CoinbaseCodec.encode_subscription(&request).unwrap();
        let Message::Text(text) = message else {
            panic!("expected a text frame");
        };
        let encoded: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": "subscribe",
                "product_ids": ["BTC-USD", "ETH-USD"],
                "channels": ["heartbeat", {"name": "ticker", "product_ids": ["ETH-BTC"]}],
            })
        );

        let decoded: SubscriptionRequest = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_unsubscribe_and_validation() {
        let request = SubscriptionRequest::new(["BTC-USD"], [ChannelName::Level2]).unsubscribe();
        assert_eq!(request.message_type, MessageType::Unsubscribe);
        assert!(request.validate().is_ok());

        let empty = SubscriptionRequest::new(["BTC-USD"], Vec::<ChannelName>::new());
        assert!(CoinbaseCodec.encode_subscription(&empty).is_err());
    }

    #[test]
    fn test_decode_frames() {
        let codec = CoinbaseCodec::new();
        let text = codec
            .decode_message(Message::Text(r#"{"key":"k","value":"v"}"#.to_string()))
            .unwrap();
        assert_eq!(text, Some(json!({"key": "k", "value": "v"})));

        let binary = codec.decode_message(Message::Binary(b"[1,2]".to_vec())).unwrap();
        assert_eq!(binary, Some(json!([1, 2])));

        assert!(codec.decode_message(Message::Ping(vec![])).unwrap().is_none());
        assert!(codec.decode_message(Message::Text("not json".into())).is_err());
    }
}
