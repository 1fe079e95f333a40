use crate::core::config::ConfigError;
use crate::core::errors::{ApiError, ExchangeError};
use crate::core::kernel::observer::{TracingObserver, TransportObserver};
use crate::core::kernel::signer::Signer;
use crate::core::pagination::{Page, Paginated};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, trace};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("coinbase-relay/", env!("CARGO_PKG_VERSION"));

/// Anything the pipeline can decode a successful body into.
///
/// `Serialize` is required so the development pipeline can re-encode the typed
/// result and compare its shape with the wire payload.
pub trait ApiResponse: DeserializeOwned + Serialize + Paginated + Send + 'static {}

impl<T> ApiResponse for T where T: DeserializeOwned + Serialize + Paginated + Send + 'static {}

/// Undecoded successful response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// Present only when both cursor headers were returned
    pub page: Option<Page>,
}

impl RawResponse {
    /// Decode the body and attach the header page, if any
    pub fn decode<T: DeserializeOwned + Paginated>(&self) -> Result<T, ExchangeError> {
        let mut out: T = serde_json::from_slice(&self.body)?;
        if let Some(page) = &self.page {
            out.set_page(page.clone());
        }
        Ok(out)
    }
}

/// REST client trait for making signed HTTP requests
///
/// Implementations only provide [`RestClient::execute`]; typed decoding and the
/// verb helpers are layered on top of it. Every error is terminal, nothing is
/// retried here. Dropping a returned future aborts the in-flight request.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Issue a request and return the raw body of a successful response
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - Path relative to the base URL, query string included
    /// * `body` - JSON body, if any
    ///
    /// Responses with status >= 300 are returned as [`ExchangeError::Api`].
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, ExchangeError>;

    /// Issue a request and decode the response into `T`, merging pagination cursors
    async fn request<T: ApiResponse>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ExchangeError> {
        self.execute(method, path, body).await?.decode()
    }

    async fn get<T: ApiResponse>(&self, path: &str) -> Result<T, ExchangeError> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: ApiResponse>(&self, path: &str, body: Option<&Value>) -> Result<T, ExchangeError> {
        self.request(Method::POST, path, body).await
    }

    async fn delete<T: ApiResponse>(&self, path: &str) -> Result<T, ExchangeError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Issue a request whose response body is irrelevant to the caller
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(), ExchangeError> {
        self.execute(method, path, body).await.map(|_| ())
    }

    /// Release resources held by the client
    async fn close(&self) -> Result<(), ExchangeError> {
        Ok(())
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            timeout_seconds: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Source of the request timestamp, in Unix epoch seconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    observer: Arc<dyn TransportObserver>,
    clock: Clock,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(system_clock),
        }
    }

    /// Sign every request with the given signer
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransportObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the timestamp source used for signing
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let base_url = Url::parse(&self.config.base_url).map_err(|e| {
            ConfigError::InvalidConfiguration(format!(
                "Invalid base URL '{}': {}",
                self.config.base_url, e
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()?;

        Ok(ReqwestRest {
            client,
            base_url,
            config: self.config,
            signer: self.signer,
            observer: self.observer,
            clock: self.clock,
        })
    }
}

/// Implementation of `RestClient` using reqwest
///
/// The underlying `reqwest::Client` is pooled and safe to share, so a single
/// instance may serve concurrent callers.
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    base_url: Url,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    observer: Arc<dyn TransportObserver>,
    clock: Clock,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Resolve a relative path against the base URL
    fn build_url(&self, path: &str) -> Result<Url, ExchangeError> {
        self.base_url
            .join(path)
            .map_err(|e| ExchangeError::InvalidParameters(format!("Invalid path '{}': {}", path, e)))
    }

    async fn make_request(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, ExchangeError> {
        let url = self.build_url(path)?;
        let body_bytes = body.map(serde_json::to_vec).transpose()?.unwrap_or_default();

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");

        if let Some(signer) = &self.signer {
            let timestamp = (self.clock)();
            for (name, value) in signer.sign_request(method.as_str(), path, &body_bytes, timestamp)? {
                request = request.header(name, value);
            }
        }

        if !body_bytes.is_empty() {
            request = request.body(body_bytes);
        }

        self.observer.pre_send(method, path);
        let response = request.send().await?;

        let status = response.status();
        self.observer.post_receive(method, path, status);

        let page = Page::from_headers(response.headers());
        let body = response.bytes().await?.to_vec();
        trace!("Response body: {}", String::from_utf8_lossy(&body));

        if status.as_u16() >= 300 {
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }

        Ok(RawResponse { status, body, page })
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, body), fields(method = %method, path = %path))]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, ExchangeError> {
        let result = self.make_request(&method, path, body).await;
        if let Err(e) = &result {
            self.observer.on_error(&method, path, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn client(base_url: &str) -> ReqwestRest {
        RestClientBuilder::new(RestClientConfig::new(base_url.to_string()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_url_resolves_against_base() {
        let rest = client("https://api.example.com");
        assert_eq!(
            rest.build_url("/accounts/?limit=2").unwrap().as_str(),
            "https://api.example.com/accounts/?limit=2"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = RestClientBuilder::new(RestClientConfig::new("not a url".to_string())).build();
        assert!(matches!(result, Err(ExchangeError::ConfigError(_))));
    }

    #[derive(Debug, Deserialize, Serialize)]
    struct Wrapped {
        id: String,
    }

    impl Paginated for Wrapped {}

    #[test]
    fn test_decode_ignores_page_for_unpaged_types() {
        let raw = RawResponse {
            status: StatusCode::OK,
            body: br#"{"id":"a"}"#.to_vec(),
            page: Some(Page {
                before: "b".into(),
                after: "a".into(),
            }),
        };
        let wrapped: Wrapped = raw.decode().unwrap();
        assert_eq!(wrapped.id, "a");
    }

    #[test]
    fn test_decode_failure_is_json_error() {
        let raw = RawResponse {
            status: StatusCode::OK,
            body: b"[1,2]".to_vec(),
            page: None,
        };
        assert!(matches!(raw.decode::<Wrapped>(), Err(ExchangeError::JsonError(_))));
    }
}
