//! Development-mode request pipeline.
//!
//! [`DevelopmentRest`] records two shapes per call: the payload as the wire
//! sent it, under the request's base path, and the typed result re-encoded to
//! JSON, under `"{base} ({type})"`. Keys present in the first and missing from
//! the second point at fields the typed model does not map.
//!
//! Malformed payloads panic here instead of returning an error. This pipeline
//! is a development aid and a decode failure is a bug in the model.

use crate::core::errors::ExchangeError;
use crate::core::kernel::rest::{ApiResponse, RawResponse, RestClient};
use crate::core::shape::{Shape, ShapeStore};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Directory part of a request path, query string excluded
///
/// `/accounts/abc` is `/accounts`, `/time` is `/`, a path with no slash is `.`.
pub fn base_path(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or_default();
    match path.rfind('/') {
        None => ".",
        Some(0) => "/",
        Some(index) => {
            let dir = path[..index].trim_end_matches('/');
            if dir.is_empty() {
                "/"
            } else {
                dir
            }
        }
    }
}

/// Name of the capture for a typed result
pub fn typed_name<T: ?Sized>(base: &str) -> String {
    format!("{} ({})", base, std::any::type_name::<T>())
}

/// Shape-capturing wrapper around any [`RestClient`]
pub struct DevelopmentRest<R: RestClient> {
    inner: R,
    store: Arc<ShapeStore>,
    path: PathBuf,
}

impl<R: RestClient> std::fmt::Debug for DevelopmentRest<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevelopmentRest")
            .field("path", &self.path)
            .field("shapes", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl<R: RestClient> DevelopmentRest<R> {
    /// Wrap `inner`, loading previously recorded shapes from `path`
    pub fn open(inner: R, path: impl AsRef<Path>) -> Result<Self, ExchangeError> {
        let path = path.as_ref().to_path_buf();
        let store = ShapeStore::open(&path)?;
        info!(path = %path.display(), shapes = store.len(), "development mode enabled");
        Ok(Self {
            inner,
            store: Arc::new(store),
            path,
        })
    }

    pub fn store(&self) -> &Arc<ShapeStore> {
        &self.store
    }

    pub fn store_path(&self) -> &Path {
        &self.path
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn capture_wire(
        &self,
        method: &Method,
        path: &str,
        raw: &RawResponse,
    ) -> Result<Option<Value>, ExchangeError> {
        if raw.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&raw.body).unwrap_or_else(|e| {
            panic!("{} {}: response is not JSON: {}", method, path, e)
        });
        self.store.add_shape(base_path(path), &value)?;
        Ok(Some(value))
    }
}

/// Warn about keys the wire sent that the typed value lost
fn report_missing(name: &str, wire: &Value, typed: &Value) {
    let (Value::Object(wire), Value::Object(typed)) = (first_object(wire), first_object(typed)) else {
        return;
    };
    let wire = Shape::of(name, wire);
    let typed = Shape::of(name, typed);
    let missing = wire.missing_from(&typed);
    if !missing.is_empty() {
        warn!(name, ?missing, "typed result drops fields present on the wire");
    }
}

fn first_object(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().map_or(value, first_object),
        other => other,
    }
}

#[async_trait]
impl<R: RestClient> RestClient for DevelopmentRest<R> {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, ExchangeError> {
        let raw = self.inner.execute(method.clone(), path, body).await?;
        self.capture_wire(&method, path, &raw)?;
        Ok(raw)
    }

    async fn request<T: ApiResponse>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ExchangeError> {
        let raw = self.inner.execute(method.clone(), path, body).await?;
        let wire = self.capture_wire(&method, path, &raw)?;

        let typed: T = raw.decode().unwrap_or_else(|e| {
            panic!(
                "{} {}: cannot decode into {}: {}",
                method,
                path,
                std::any::type_name::<T>(),
                e
            )
        });
        let reencoded = serde_json::to_value(&typed).unwrap_or_else(|e| {
            panic!("{} {}: cannot re-encode {}: {}", method, path, std::any::type_name::<T>(), e)
        });

        let name = typed_name::<T>(base_path(path));
        self.store.add_shape(&name, &reencoded)?;
        if let Some(wire) = &wire {
            report_missing(&name, wire, &reencoded);
        }
        Ok(typed)
    }

    /// Close the inner pipeline, then persist the store
    async fn close(&self) -> Result<(), ExchangeError> {
        self.inner.close().await?;
        self.store.save(&self.path)?;
        info!(path = %self.path.display(), shapes = self.store.len(), "shape store saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pagination::{Page, Paged, Paginated};
    use reqwest::StatusCode;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    /// Replies to every request with a fixed body and optional page
    struct CannedRest {
        body: &'static str,
        page: Option<Page>,
    }

    #[async_trait]
    impl RestClient for CannedRest {
        async fn execute(
            &self,
            _method: Method,
            _path: &str,
            _body: Option<&Value>,
        ) -> Result<RawResponse, ExchangeError> {
            Ok(RawResponse {
                status: StatusCode::OK,
                body: self.body.as_bytes().to_vec(),
                page: self.page.clone(),
            })
        }
    }

    #[derive(Debug, Deserialize, Serialize)]
    struct Entry {
        key: String,
    }

    impl Paginated for Entry {}

    fn dev(body: &'static str, page: Option<Page>) -> (DevelopmentRest<CannedRest>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let rest = DevelopmentRest::open(CannedRest { body, page }, dir.path().join("store.json")).unwrap();
        (rest, dir)
    }

    #[test]
    fn test_base_path() {
        assert_eq!(base_path("/accounts/abc"), "/accounts");
        assert_eq!(base_path("/accounts/abc/ledger/?limit=2"), "/accounts/abc/ledger");
        assert_eq!(base_path("/accounts/"), "/accounts");
        assert_eq!(base_path("/time"), "/");
        assert_eq!(base_path("/"), "/");
        assert_eq!(base_path("time"), ".");
    }

    #[tokio::test]
    async fn test_request_captures_wire_and_typed_shapes() {
        let (rest, _dir) = dev(
            r#"[{"key":"a","extra":1},{"key":"b","extra":2}]"#,
            Some(Page {
                before: "b".into(),
                after: "a".into(),
            }),
        );

        let entries: Paged<Entry> = rest.get("/entries/").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.page.as_ref().unwrap().after, "a");

        let snapshot = rest.store().snapshot();
        assert_eq!(snapshot.len(), 2);

        let wire = Shape::new("/entries", ["extra", "key"].iter().map(|k| k.to_string()).collect());
        let wire = &snapshot[&wire.id()];
        assert_eq!(wire.count, 2);
        assert_eq!(wire.shape.name, "/entries");

        let typed = Shape::new("", ["key".to_string()].into_iter().collect());
        let typed = &snapshot[&typed.id()];
        assert_eq!(typed.shape.name, typed_name::<Paged<Entry>>("/entries"));
        assert!(typed.shape.name.starts_with("/entries ("));
    }

    #[tokio::test]
    async fn test_execute_captures_wire_only() {
        let (rest, _dir) = dev(r#"{"key":"k","value":"v"}"#, None);
        rest.send(Method::DELETE, "/orders/abc", None).await.unwrap();

        let snapshot = rest.store().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.values().next().unwrap().shape.name, "/orders");
    }

    #[tokio::test]
    async fn test_empty_body_is_not_captured() {
        let (rest, _dir) = dev("", None);
        rest.send(Method::DELETE, "/orders/abc", None).await.unwrap();
        assert!(rest.store().is_empty());
    }

    #[tokio::test]
    #[should_panic(expected = "cannot decode")]
    async fn test_decode_failure_panics() {
        let (rest, _dir) = dev(r#"{"other":"x"}"#, None);
        let _: Result<Entry, _> = rest.get("/entries/x").await;
    }

    #[tokio::test]
    async fn test_close_persists_store() {
        let (rest, dir) = dev(r#"{"iso":"2015-01-07T23:47:25.201Z","epoch":1420674445.201}"#, None);
        let _: Value = rest.get("/time").await.unwrap();
        rest.close().await.unwrap();

        let reopened = ShapeStore::open(dir.path().join("store.json")).unwrap();
        assert_eq!(reopened.snapshot(), rest.store().snapshot());
        assert_eq!(reopened.len(), 1);

        let written: Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("store.json")).unwrap()).unwrap();
        let (_, occurrence) = written.as_object().unwrap().iter().next().unwrap();
        assert_eq!(occurrence["Count"], json!(2));
    }
}
