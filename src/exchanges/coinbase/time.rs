use crate::core::errors::ExchangeError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Timestamp as returned by the exchange.
///
/// Endpoints disagree on the format, so parsing tries each flavour seen in the
/// wild. Serialises back as RFC3339 with microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub DateTime<Utc>);

impl Time {
    pub fn parse(value: &str) -> Result<Self, ExchangeError> {
        let value = value.trim_matches('"');

        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        // 2021-04-09 19:04:58+00, 2021-04-09 19:04:58.964459+00
        if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        // 2021-04-09 19:04:58.964459, implicitly UTC
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(Self(Utc.from_utc_datetime(&parsed)));
        }

        Err(ExchangeError::InvalidParameters(format!(
            "time {} in unhandled format",
            value
        )))
    }

    pub fn from_unix(seconds: i64) -> Result<Self, ExchangeError> {
        Utc.timestamp_opt(seconds, 0)
            .single()
            .map(Self)
            .ok_or_else(|| ExchangeError::InvalidParameters(format!("timestamp {} out of range", seconds)))
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// RFC3339 with as many fractional digits as needed, used in query strings
    pub fn to_query(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl Serialize for Time {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeVisitor;

        impl<'de> Visitor<'de> for TimeVisitor {
            type Value = Time;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a timestamp string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Time, E> {
                Time::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TimeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_layouts() {
        let expected = Utc.with_ymd_and_hms(2021, 4, 9, 19, 4, 58).unwrap();
        let with_micros = expected.with_nanosecond(964_459_000).unwrap();

        assert_eq!(Time::parse("2021-04-09T19:04:58.964459Z").unwrap().0, with_micros);
        assert_eq!(Time::parse("2021-04-09T19:04:58Z").unwrap().0, expected);
        assert_eq!(Time::parse("2021-04-09 19:04:58+00").unwrap().0, expected);
        assert_eq!(Time::parse("2021-04-09 19:04:58.964459").unwrap().0, with_micros);
        assert_eq!(Time::parse("2021-04-09 19:04:58.964459+00").unwrap().0, with_micros);
        assert_eq!(
            Time::parse("2015-02-18T16:54:00-08:00").unwrap().0,
            Utc.with_ymd_and_hms(2015, 2, 19, 0, 54, 0).unwrap()
        );
    }

    #[test]
    fn test_unhandled_format() {
        let err = Time::parse("yesterday").unwrap_err();
        assert!(err.to_string().contains("unhandled format"));
    }

    #[test]
    fn test_null_is_none() {
        let parsed: Option<Time> = serde_json::from_str("null").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_serialize_and_query_format() {
        let time = Time::parse("2021-04-09T19:04:58.964459Z").unwrap();
        assert_eq!(serde_json::to_string(&time).unwrap(), r#""2021-04-09T19:04:58.964459Z""#);
        assert_eq!(time.to_query(), "2021-04-09T19:04:58.964459Z");

        let whole = Time::from_unix(1_617_994_800).unwrap();
        assert_eq!(whole.to_query(), "2021-04-09T19:00:00Z");
        assert_eq!(whole.to_string(), "2021-04-09T19:00:00.000000Z");
    }
}
