use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for exchange-specific WebSocket message encoding/decoding
///
/// Converts between raw WebSocket frames and the exchange's subscription and
/// message types. Control frames (ping, pong, close) never reach a codec; the
/// session handles them at the transport level.
pub trait WsCodec: Send + Sync + 'static {
    /// Request written to the socket to select channels and products
    type Subscription: Send + Sync;

    /// The type representing parsed messages from this exchange
    type Message: Send + Sync;

    /// Encode a subscription request into a WebSocket message
    fn encode_subscription(&self, subscription: &Self::Subscription) -> Result<Message, ExchangeError>;

    /// Decode a raw WebSocket message into a typed message
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Message was ignored/filtered by codec
    /// - `Err(error)` - Failed to decode message
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
