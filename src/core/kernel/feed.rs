//! Relay of a streaming feed from a WebSocket session to a consumer channel.
//!
//! The relay runs two tasks joined as a group. The reader pulls frames off the
//! socket and writes subscription updates back to it; the writer hands decoded
//! frames to the consumer according to the configured [`OverflowPolicy`]. The
//! first task to fail ends the group, and the caller's cancellation token stops
//! both.

use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::observer::TransportObserver;
use crate::core::kernel::ws::WsSession;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// What the writer does when the consumer is not ready for the next frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for the consumer. Backpressure reaches the socket reader.
    #[default]
    Block,
    /// Discard the frame and report it through [`TransportObserver::on_drop`]
    DropNewest,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Capacity of the consumer channel, at least 1
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: 1,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl FeedConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

/// Consumer half of a feed
#[derive(Debug)]
pub struct Feed<S> {
    /// Decoded frames in socket order. Closes when the relay ends.
    pub messages: mpsc::Receiver<Value>,
    /// Further subscription requests to write while relaying
    pub subscriptions: mpsc::Sender<S>,
}

/// Relay half of a feed, consumed by [`relay`]
#[derive(Debug)]
pub struct FeedPublisher<S> {
    messages: mpsc::Sender<Value>,
    subscriptions: mpsc::Receiver<S>,
    overflow: OverflowPolicy,
}

/// Create a connected publisher/consumer pair
pub fn channel<S>(config: FeedConfig) -> (FeedPublisher<S>, Feed<S>) {
    let (messages_tx, messages_rx) = mpsc::channel(config.capacity.max(1));
    let (subscriptions_tx, subscriptions_rx) = mpsc::channel(1);

    (
        FeedPublisher {
            messages: messages_tx,
            subscriptions: subscriptions_rx,
            overflow: config.overflow,
        },
        Feed {
            messages: messages_rx,
            subscriptions: subscriptions_tx,
        },
    )
}

/// Connect, subscribe, then relay frames until the server closes, a task fails
/// or `cancel` fires.
///
/// Returns `Ok(())` when the server or the consumer ends the stream and
/// [`ExchangeError::Cancelled`] when cancelled. The session is closed on every
/// exit path and is not reused.
#[instrument(skip_all)]
pub async fn relay<W, C>(
    session: &mut W,
    codec: &C,
    subscription: &C::Subscription,
    publisher: FeedPublisher<C::Subscription>,
    observer: &dyn TransportObserver,
    cancel: &CancellationToken,
) -> Result<(), ExchangeError>
where
    W: WsSession,
    C: WsCodec<Message = Value>,
{
    // Encoded before connecting so a bad request never opens a socket
    let first = codec.encode_subscription(subscription)?;
    session.connect().await?;

    // The server drops connections that do not subscribe promptly
    if let Err(e) = session.send_raw(first).await {
        let _ = session.close().await;
        return Err(e);
    }
    debug!("subscribed");

    let FeedPublisher {
        messages,
        mut subscriptions,
        overflow,
    } = publisher;
    let (frames_tx, frames_rx) = mpsc::channel(1);

    let result = tokio::try_join!(
        read_frames(session, codec, &mut subscriptions, frames_tx, observer, cancel),
        write_frames(frames_rx, messages, overflow, observer, cancel),
    )
    .map(|_| ());

    if let Err(e) = session.close().await {
        warn!("Failed to close feed session: {}", e);
    }
    result
}

async fn read_frames<W, C>(
    session: &mut W,
    codec: &C,
    subscriptions: &mut mpsc::Receiver<C::Subscription>,
    frames: mpsc::Sender<Value>,
    observer: &dyn TransportObserver,
    cancel: &CancellationToken,
) -> Result<(), ExchangeError>
where
    W: WsSession,
    C: WsCodec<Message = Value>,
{
    let mut subscriptions_open = true;

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Err(ExchangeError::Cancelled),
            request = subscriptions.recv(), if subscriptions_open => match request {
                Some(request) => session.send_raw(codec.encode_subscription(&request)?).await?,
                None => subscriptions_open = false,
            },
            frame = session.next_raw() => {
                let message = match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("feed closed by server");
                        return Ok(());
                    }
                    Some(Ok(message)) => message,
                    Some(Err(e)) => return Err(e),
                };

                let Some(value) = codec.decode_message(message)? else {
                    continue;
                };
                observer.on_frame(&value);

                tokio::select! {
                    () = cancel.cancelled() => return Err(ExchangeError::Cancelled),
                    sent = frames.send(value) => {
                        if sent.is_err() {
                            // Writer is gone because the consumer hung up
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

async fn write_frames(
    mut frames: mpsc::Receiver<Value>,
    messages: mpsc::Sender<Value>,
    overflow: OverflowPolicy,
    observer: &dyn TransportObserver,
    cancel: &CancellationToken,
) -> Result<(), ExchangeError> {
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return Err(ExchangeError::Cancelled),
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => return Ok(()),
            },
        };

        match overflow {
            OverflowPolicy::Block => tokio::select! {
                () = cancel.cancelled() => return Err(ExchangeError::Cancelled),
                sent = messages.send(frame) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            },
            OverflowPolicy::DropNewest => match messages.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => observer.on_drop(&frame),
                Err(TrySendError::Closed(_)) => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Serialize;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Serialize)]
    struct Subscribe {
        channels: Vec<String>,
    }

    struct JsonCodec;

    impl WsCodec for JsonCodec {
        type Subscription = Subscribe;
        type Message = Value;

        fn encode_subscription(&self, subscription: &Subscribe) -> Result<Message, ExchangeError> {
            Ok(Message::Text(serde_json::to_string(subscription)?))
        }

        fn decode_message(&self, message: Message) -> Result<Option<Value>, ExchangeError> {
            match message {
                Message::Text(text) => Ok(Some(serde_json::from_str(&text)?)),
                _ => Ok(None),
            }
        }
    }

    /// Refuses every subscription
    struct RejectingCodec;

    impl WsCodec for RejectingCodec {
        type Subscription = Subscribe;
        type Message = Value;

        fn encode_subscription(&self, _subscription: &Subscribe) -> Result<Message, ExchangeError> {
            Err(ExchangeError::InvalidParameters("no channels".to_string()))
        }

        fn decode_message(&self, _message: Message) -> Result<Option<Value>, ExchangeError> {
            Ok(None)
        }
    }

    /// Yields the scripted frames, then either pends forever or reports a close
    struct MockSession {
        frames: VecDeque<Message>,
        sent: Arc<parking_lot::Mutex<Vec<Message>>>,
        close_when_drained: bool,
        connected: bool,
    }

    impl MockSession {
        fn new(frames: Vec<&str>, close_when_drained: bool) -> Self {
            Self {
                frames: frames.into_iter().map(|f| Message::Text(f.to_string())).collect(),
                sent: Arc::default(),
                close_when_drained,
                connected: false,
            }
        }
    }

    #[async_trait]
    impl WsSession for MockSession {
        async fn connect(&mut self) -> Result<(), ExchangeError> {
            self.connected = true;
            Ok(())
        }

        async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
            self.sent.lock().push(msg);
            Ok(())
        }

        async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
            match self.frames.pop_front() {
                Some(frame) => Some(Ok(frame)),
                None if self.close_when_drained => None,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), ExchangeError> {
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        frames: AtomicUsize,
        drops: AtomicUsize,
    }

    impl TransportObserver for CountingObserver {
        fn on_frame(&self, _frame: &Value) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }

        fn on_drop(&self, _frame: &Value) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn subscribe() -> Subscribe {
        Subscribe {
            channels: vec!["ticker".to_string()],
        }
    }

    #[tokio::test]
    async fn test_cancel_after_one_message() {
        let mut session = MockSession::new(vec![r#"{"key":"k","value":"v"}"#], false);
        let sent = session.sent.clone();
        let (publisher, mut feed) = channel::<Subscribe>(FeedConfig::default());
        let cancel = CancellationToken::new();
        let observer = CountingObserver::default();

        let consumer = {
            let cancel = cancel.clone();
            async move {
                let first = feed.messages.recv().await;
                cancel.cancel();
                let mut rest = Vec::new();
                while let Some(message) = feed.messages.recv().await {
                    rest.push(message);
                }
                (first, rest)
            }
        };

        let subscription = subscribe();
        let (result, (first, rest)) = tokio::join!(
            relay(&mut session, &JsonCodec, &subscription, publisher, &observer, &cancel),
            consumer,
        );

        assert!(matches!(result, Err(ExchangeError::Cancelled)));
        assert_eq!(first, Some(serde_json::json!({"key": "k", "value": "v"})));
        assert!(rest.is_empty());
        assert_eq!(observer.frames.load(Ordering::SeqCst), 1);
        assert!(!session.is_connected());

        let sent = sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], Message::Text(r#"{"channels":["ticker"]}"#.to_string()));
    }

    #[tokio::test]
    async fn test_unencodable_subscription_leaves_no_open_session() {
        let mut session = MockSession::new(vec![r#"{"n":1}"#], false);
        let sent = session.sent.clone();
        let (publisher, _feed) = channel::<Subscribe>(FeedConfig::default());
        let cancel = CancellationToken::new();
        let observer = CountingObserver::default();

        let result = relay(&mut session, &RejectingCodec, &subscribe(), publisher, &observer, &cancel).await;

        assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
        assert!(!session.is_connected());
        assert!(sent.lock().is_empty());
        assert_eq!(observer.frames.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_server_close_ends_relay() {
        let mut session = MockSession::new(vec![r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#], true);
        let (publisher, mut feed) = channel::<Subscribe>(FeedConfig::default().with_capacity(8));
        let cancel = CancellationToken::new();
        let observer = CountingObserver::default();

        relay(&mut session, &JsonCodec, &subscribe(), publisher, &observer, &cancel)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(message) = feed.messages.recv().await {
            seen.push(message["n"].as_i64().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drop_newest_reports_drops() {
        let mut session = MockSession::new(vec![r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#], true);
        let config = FeedConfig::default().with_overflow(OverflowPolicy::DropNewest);
        let (publisher, mut feed) = channel::<Subscribe>(config);
        let cancel = CancellationToken::new();
        let observer = CountingObserver::default();

        // Nobody reads until the relay is done, so only the first frame fits
        relay(&mut session, &JsonCodec, &subscribe(), publisher, &observer, &cancel)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(message) = feed.messages.recv().await {
            seen.push(message);
        }
        assert_eq!(seen.len(), 1);
        assert_eq!(observer.drops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscription_updates_are_written() {
        let mut session = MockSession::new(vec![], false);
        let sent = session.sent.clone();
        let (publisher, feed) = channel::<Subscribe>(FeedConfig::default());
        let cancel = CancellationToken::new();
        let observer = CountingObserver::default();

        let update = {
            let cancel = cancel.clone();
            let sent = sent.clone();
            async move {
                feed.subscriptions
                    .send(Subscribe {
                        channels: vec!["level2".to_string()],
                    })
                    .await
                    .unwrap();
                while sent.lock().len() < 2 {
                    tokio::task::yield_now().await;
                }
                cancel.cancel();
            }
        };

        let subscription = subscribe();
        let (result, ()) = tokio::join!(
            relay(&mut session, &JsonCodec, &subscription, publisher, &observer, &cancel),
            update,
        );

        assert!(matches!(result, Err(ExchangeError::Cancelled)));
        let sent = sent.lock();
        assert_eq!(sent[1], Message::Text(r#"{"channels":["level2"]}"#.to_string()));
    }
}
