use crate::core::errors::ExchangeError;
use reqwest::{Method, StatusCode};
use tracing::{debug, trace, warn};

/// Extension points invoked by the REST pipeline and the feed relay.
///
/// Every hook has a no-op default so implementations only override what they
/// care about. Credentials and signatures are never passed to an observer.
pub trait TransportObserver: Send + Sync {
    /// Called once the request is signed, right before it is sent
    fn pre_send(&self, _method: &Method, _path: &str) {}

    /// Called when a response arrives, before its body is decoded
    fn post_receive(&self, _method: &Method, _path: &str, _status: StatusCode) {}

    /// Called for any failure of a request, including exchange rejections
    fn on_error(&self, _method: &Method, _path: &str, _error: &ExchangeError) {}

    /// Called for each frame the feed reader decoded
    fn on_frame(&self, _frame: &serde_json::Value) {}

    /// Called when the feed writer discards a frame because the consumer is not ready
    fn on_drop(&self, _frame: &serde_json::Value) {}
}

/// Forwards every hook to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransportObserver for TracingObserver {
    fn pre_send(&self, method: &Method, path: &str) {
        debug!(%method, path, "sending request");
    }

    fn post_receive(&self, method: &Method, path: &str, status: StatusCode) {
        debug!(%method, path, status = status.as_u16(), "received response");
    }

    fn on_error(&self, method: &Method, path: &str, error: &ExchangeError) {
        warn!(%method, path, %error, "request failed");
    }

    fn on_frame(&self, frame: &serde_json::Value) {
        trace!(frame_type = frame.get("type").and_then(|t| t.as_str()), "feed frame received");
    }

    fn on_drop(&self, frame: &serde_json::Value) {
        warn!(frame_type = frame.get("type").and_then(|t| t.as_str()), "feed frame dropped, consumer not ready");
    }
}
