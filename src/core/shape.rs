//! Structural fingerprints of JSON payloads.
//!
//! A [`Shape`] is the set of dotted field paths present in a JSON object. The
//! [`ShapeStore`] counts how often each distinct shape was seen and persists the
//! counts so they accumulate across runs, which makes drift in an upstream API
//! visible without keeping any payload values.

use crate::core::errors::ExchangeError;
use parking_lot::Mutex;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Keys", deserialize_with = "key_list_or_set")]
    pub keys: BTreeSet<String>,
}

/// Keys are written as a sorted list. Stores that wrote them as an object of
/// `{"key": {}}` members, or as `null` for no keys, load as well.
fn key_list_or_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keys {
        List(BTreeSet<String>),
        Set(Option<BTreeMap<String, IgnoredAny>>),
    }

    Ok(match Keys::deserialize(deserializer)? {
        Keys::List(keys) => keys,
        Keys::Set(keys) => keys.unwrap_or_default().into_keys().collect(),
    })
}

impl Shape {
    pub fn new(name: impl Into<String>, keys: BTreeSet<String>) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }

    /// Shape of a single JSON object
    pub fn of(name: impl Into<String>, object: &Map<String, Value>) -> Self {
        let mut keys = BTreeSet::new();
        flatten("", object, &mut keys);
        Self::new(name, keys)
    }

    /// Hex SHA-256 of the sorted keys joined with `,`. The name is not part of it.
    pub fn id(&self) -> String {
        let joined = self.keys.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        hex::encode(Sha256::digest(joined.as_bytes()))
    }

    /// Keys present in `self` but absent from `other`
    pub fn missing_from<'a>(&'a self, other: &'a Self) -> Vec<&'a str> {
        self.keys.difference(&other.keys).map(String::as_str).collect()
    }
}

/// Arrays, empty objects and scalars are leaves; non-empty objects nest with `.`
fn flatten(prefix: &str, object: &Map<String, Value>, keys: &mut BTreeSet<String>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(inner) if !inner.is_empty() => flatten(&path, inner, keys),
            _ => {
                keys.insert(path);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    #[serde(rename = "Shape")]
    pub shape: Shape,
    #[serde(rename = "Count")]
    pub count: u64,
}

/// Fingerprint to occurrence map, safe to share between concurrent requests
#[derive(Debug, Default)]
pub struct ShapeStore {
    occurrences: Mutex<BTreeMap<String, Occurrence>>,
}

impl ShapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a persisted store; a missing or empty file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExchangeError> {
        let store = Self::new();
        match File::open(path.as_ref()) {
            Ok(file) => store.read(BufReader::new(file))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.as_ref().display(), "no shape store on disk, starting empty");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(store)
    }

    /// Persist the store, replacing the file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ExchangeError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Record one observation of `shape` and return its fingerprint
    pub fn add(&self, shape: Shape) -> String {
        let id = shape.id();
        self.occurrences
            .lock()
            .entry(id.clone())
            .and_modify(|o| o.count += 1)
            .or_insert(Occurrence { shape, count: 1 });
        id
    }

    /// Record the shape of every object in `value`
    ///
    /// Arrays contribute one observation per element under the same name.
    /// Scalars at the top level have no shape; they are logged and skipped
    /// without failing the capture.
    pub fn add_shape(&self, name: &str, value: &Value) -> Result<(), ExchangeError> {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.add_shape(name, item)?;
                }
            }
            Value::Object(object) => {
                self.add(Shape::of(name, object));
            }
            other => error!(name, value = %other, "unhandled value for shape capture"),
        }
        Ok(())
    }

    pub fn occurrence(&self, id: &str) -> Option<Occurrence> {
        self.occurrences.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.occurrences.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.lock().is_empty()
    }

    /// Copy of the current map
    pub fn snapshot(&self) -> BTreeMap<String, Occurrence> {
        self.occurrences.lock().clone()
    }

    /// One line per occurrence, ordered by fingerprint
    pub fn dump(&self) -> String {
        self.occurrences
            .lock()
            .iter()
            .map(|(id, o)| {
                let keys = o.shape.keys.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
                format!("{} shape {} {} [{}]", o.count, id, o.shape.name, keys)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace the whole map. Entries whose fingerprint does not match their keys are rejected.
    pub fn load(&self, occurrences: BTreeMap<String, Occurrence>) -> Result<(), ExchangeError> {
        if let Some((id, _)) = occurrences.iter().find(|(id, o)| o.shape.id() != **id) {
            return Err(ExchangeError::EncodingError(format!(
                "shape store entry {} does not match its keys",
                id
            )));
        }

        debug!(count = occurrences.len(), "loaded shapes");
        *self.occurrences.lock() = occurrences;
        Ok(())
    }

    /// Load from a JSON source; an empty source loads an empty map
    pub fn read<R: Read>(&self, mut source: R) -> Result<(), ExchangeError> {
        let mut buf = String::new();
        source.read_to_string(&mut buf)?;
        if buf.trim().is_empty() {
            return self.load(BTreeMap::new());
        }
        self.load(serde_json::from_str(&buf)?)
    }

    pub fn write<W: Write>(&self, sink: W) -> Result<(), ExchangeError> {
        serde_json::to_writer_pretty(sink, &*self.occurrences.lock())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_flatten_nested_objects() {
        let value = json!({
            "id": "1",
            "details": {"source": "x", "inner": {"deep": true}},
            "empty": {},
            "list": [{"ignored": 1}],
        });
        let shape = Shape::of("/orders", value.as_object().unwrap());
        assert_eq!(
            shape.keys,
            keys(&["details.inner.deep", "details.source", "empty", "id", "list"])
        );
    }

    #[test]
    fn test_id_ignores_order_values_and_name() {
        let a = json!({"a": 1, "b": {"c": "x"}});
        let b = json!({"b": {"c": "y"}, "a": 2});
        let first = Shape::of("one", a.as_object().unwrap());
        let second = Shape::of("two", b.as_object().unwrap());
        assert_eq!(first.id(), second.id());

        let expected = hex::encode(Sha256::digest(b"a,b.c"));
        assert_eq!(first.id(), expected);
    }

    #[test]
    fn test_add_counts_equal_shapes_once() {
        let store = ShapeStore::new();
        let a: Value = serde_json::from_str(r#"{"key":"k","value":"v"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"value":"w","key":"j"}"#).unwrap();
        store.add_shape("/test", &a).unwrap();
        store.add_shape("/test", &b).unwrap();

        assert_eq!(store.len(), 1);
        let id = Shape::new("/test", keys(&["key", "value"])).id();
        let occurrence = store.occurrence(&id).unwrap();
        assert_eq!(occurrence.count, 2);
        assert_eq!(occurrence.shape.name, "/test");
    }

    #[test]
    fn test_arrays_recurse_and_scalars_skip() {
        let store = ShapeStore::new();
        store.add_shape("/list", &json!([{"a": 1}, {"a": 2}, {"b": 3}, 4])).unwrap();
        assert!(store.add_shape("/scalar", &json!("text")).is_ok());

        assert_eq!(store.len(), 2);
        let a = store.occurrence(&Shape::new("", keys(&["a"])).id()).unwrap();
        assert_eq!(a.count, 2);
    }

    #[test]
    fn test_dump_format() {
        let store = ShapeStore::new();
        let id = store.add(Shape::new("/time", keys(&["epoch", "iso"])));
        assert_eq!(store.dump(), format!("1 shape {} /time [epoch iso]", id));
    }

    #[test]
    fn test_write_read_round_trip() {
        let store = ShapeStore::new();
        store
            .add_shape("/accounts", &json!([{"id": "a", "balance": "1"}, {"id": "b", "balance": "2"}]))
            .unwrap();
        store.add_shape("/time", &json!({"iso": "x"})).unwrap();

        let mut buf = Vec::new();
        store.write(&mut buf).unwrap();

        let written: Value = serde_json::from_slice(&buf).unwrap();
        let id = Shape::new("", keys(&["balance", "id"])).id();
        assert_eq!(written[&id]["Count"], 2);
        assert_eq!(written[&id]["Shape"]["Keys"], json!(["balance", "id"]));

        let loaded = ShapeStore::new();
        loaded.add(Shape::new("/stale", keys(&["stale"])));
        loaded.read(buf.as_slice()).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_read_accepts_keys_written_as_object() {
        let id = Shape::new("", keys(&["epoch", "iso"])).id();
        let empty = Shape::new("", BTreeSet::new()).id();
        let raw = json!({
            id.clone(): {"Shape": {"Name": "/time", "Keys": {"iso": {}, "epoch": {}}}, "Count": 3},
            empty.clone(): {"Shape": {"Name": "/empty", "Keys": null}, "Count": 1},
        });

        let store = ShapeStore::new();
        store.read(raw.to_string().as_bytes()).unwrap();
        assert_eq!(store.len(), 2);

        let time = store.occurrence(&id).unwrap();
        assert_eq!(time.count, 3);
        assert_eq!(time.shape.keys, keys(&["epoch", "iso"]));
        assert!(store.occurrence(&empty).unwrap().shape.keys.is_empty());

        store.add_shape("/time", &json!({"iso": "x", "epoch": 1})).unwrap();
        assert_eq!(store.occurrence(&id).unwrap().count, 4);
    }

    #[test]
    fn test_load_rejects_mismatched_fingerprint() {
        let mut occurrences = BTreeMap::new();
        occurrences.insert(
            "not-a-fingerprint".to_string(),
            Occurrence {
                shape: Shape::new("/x", keys(&["a"])),
                count: 1,
            },
        );
        let store = ShapeStore::new();
        assert!(store.load(occurrences).is_err());
    }

    #[test]
    fn test_empty_source_is_empty_store() {
        let store = ShapeStore::new();
        store.add(Shape::new("/x", keys(&["a"])));
        store.read(&b"  \n"[..]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_from() {
        let wire = Shape::new("/x", keys(&["a", "b", "c"]));
        let typed = Shape::new("/x (T)", keys(&["a", "c"]));
        assert_eq!(wire.missing_from(&typed), vec!["b"]);
        assert!(typed.missing_from(&wire).is_empty());
    }
}
