//! Metrics Types

use crate::error::AnalyticsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-form diagnostic data attached to a metric
pub type Context = Map<String, Value>;

/// Grouping/filtering labels attached to a metric
pub type Tags = BTreeMap<String, String>;

/// Kind of measurement a metric carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricType {
    Duration,
    Latency,
    ResponseTime,
    Count,
    ErrorCount,
    SuccessCount,
    Rate,
    ErrorRate,
    SuccessRate,
    MemoryUsage,
    CpuUsage,
    DiskUsage,
    Custom,
}

impl MetricType {
    pub const ALL: [MetricType; 13] = [
        MetricType::Duration,
        MetricType::Latency,
        MetricType::ResponseTime,
        MetricType::Count,
        MetricType::ErrorCount,
        MetricType::SuccessCount,
        MetricType::Rate,
        MetricType::ErrorRate,
        MetricType::SuccessRate,
        MetricType::MemoryUsage,
        MetricType::CpuUsage,
        MetricType::DiskUsage,
        MetricType::Custom,
    ];

    /// Persisted member name, e.g. `RESPONSE_TIME`
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Duration => "DURATION",
            MetricType::Latency => "LATENCY",
            MetricType::ResponseTime => "RESPONSE_TIME",
            MetricType::Count => "COUNT",
            MetricType::ErrorCount => "ERROR_COUNT",
            MetricType::SuccessCount => "SUCCESS_COUNT",
            MetricType::Rate => "RATE",
            MetricType::ErrorRate => "ERROR_RATE",
            MetricType::SuccessRate => "SUCCESS_RATE",
            MetricType::MemoryUsage => "MEMORY_USAGE",
            MetricType::CpuUsage => "CPU_USAGE",
            MetricType::DiskUsage => "DISK_USAGE",
            MetricType::Custom => "CUSTOM",
        }
    }

    /// Types measuring elapsed time
    pub fn is_duration(&self) -> bool {
        matches!(
            self,
            MetricType::Duration | MetricType::Latency | MetricType::ResponseTime
        )
    }

    /// Types measuring resource utilisation (percent)
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            MetricType::CpuUsage | MetricType::MemoryUsage | MetricType::DiskUsage
        )
    }

    /// Types considered by performance analysis
    pub fn is_performance(&self) -> bool {
        self.is_duration() || self.is_resource()
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AnalyticsError::malformed(format!("unknown metric type '{}'", s)))
    }
}

impl Serialize for MetricType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<MetricType>()
            .map_err(|_| serde::de::Error::custom(format!("unknown metric type '{}'", raw)))
    }
}

/// Numeric or boolean measurement.
///
/// Non-finite floats have no JSON number form and are written as the strings
/// `"NaN"`, `"Infinity"` and `"-Infinity"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl MetricValue {
    /// Numeric view of the value; booleans are not numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Bool(_) => None,
            MetricValue::Integer(i) => Some(*i as f64),
            MetricValue::Float(f) => Some(*f),
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

}

const NAN_TEXT: &str = "NaN";
const INFINITY_TEXT: &str = "Infinity";
const NEG_INFINITY_TEXT: &str = "-Infinity";

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            MetricValue::Bool(b) => serializer.serialize_bool(b),
            MetricValue::Integer(i) => serializer.serialize_i64(i),
            MetricValue::Float(f) if f.is_nan() => serializer.serialize_str(NAN_TEXT),
            MetricValue::Float(f) if f == f64::INFINITY => serializer.serialize_str(INFINITY_TEXT),
            MetricValue::Float(f) if f == f64::NEG_INFINITY => {
                serializer.serialize_str(NEG_INFINITY_TEXT)
            }
            MetricValue::Float(f) => serializer.serialize_f64(f),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawValue::deserialize(deserializer)? {
            RawValue::Bool(b) => Ok(MetricValue::Bool(b)),
            RawValue::Integer(i) => Ok(MetricValue::Integer(i)),
            RawValue::Float(f) => Ok(MetricValue::Float(f)),
            RawValue::Text(text) => match text.as_str() {
                NAN_TEXT => Ok(MetricValue::Float(f64::NAN)),
                INFINITY_TEXT => Ok(MetricValue::Float(f64::INFINITY)),
                NEG_INFINITY_TEXT => Ok(MetricValue::Float(f64::NEG_INFINITY)),
                _ => Err(serde::de::Error::custom(format!(
                    "invalid metric value '{}'",
                    text
                ))),
            },
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Bool(b) => write!(f, "{}", b),
            MetricValue::Integer(i) => write!(f, "{}", i),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Integer(value as i64)
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        MetricValue::Integer(value as i64)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => MetricValue::Integer(i),
            Err(_) => MetricValue::Float(value as f64),
        }
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::from(value as u64)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::Float(value as f64)
    }
}

/// A single timestamped measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub tags: Tags,
}

impl Metric {
    /// Create a metric stamped with the current time
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            metric_type,
            timestamp: Utc::now(),
            context: Context::new(),
            tags: Tags::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Context entry rendered as text; strings are returned unquoted
    pub fn context_text(&self, key: &str) -> Option<String> {
        match self.context.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Persisted object form of this metric
    pub fn to_json(&self) -> Result<Value, AnalyticsError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a metric from its persisted object form
    pub fn from_json(value: &Value) -> Result<Self, AnalyticsError> {
        Metric::deserialize(value).map_err(|e| AnalyticsError::malformed(e.to_string()))
    }
}

/// ISO-8601 timestamps; values without an offset are read as UTC
pub(crate) mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Ok(ts.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()),
        }
    }

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(timestamp))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_metric_type_names_round_trip() {
        for metric_type in MetricType::ALL {
            let parsed: MetricType = metric_type.as_str().parse().unwrap();
            assert_eq!(parsed, metric_type);
        }
        assert_eq!(MetricType::CpuUsage.as_str(), "CPU_USAGE");
        assert_eq!(MetricType::ResponseTime.to_string(), "RESPONSE_TIME");
    }

    #[test]
    fn test_unknown_metric_type_is_malformed() {
        let err = "THROUGHPUT".parse::<MetricType>().unwrap_err();
        assert!(matches!(err, AnalyticsError::MalformedMetric { .. }));
    }

    #[test]
    fn test_metric_json_round_trip() {
        let mut context = Context::new();
        context.insert("operation".to_string(), json!("login"));
        context.insert("attempt".to_string(), json!({"n": 2, "retry": true}));

        let metric = Metric::new("auth.login", 12.5, MetricType::Duration)
            .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap())
            .with_context(context)
            .with_tag("env", "staging");

        let restored = Metric::from_json(&metric.to_json().unwrap()).unwrap();
        assert_eq!(restored, metric);
    }

    #[test]
    fn test_value_variants_survive_json() {
        for value in [MetricValue::Bool(true), MetricValue::Integer(7), MetricValue::Float(1.0)] {
            let metric = Metric::new("v", value, MetricType::Custom);
            let restored = Metric::from_json(&metric.to_json().unwrap()).unwrap();
            assert_eq!(restored.value, value);
        }
    }

    #[test]
    fn test_persisted_shape() {
        let metric = Metric::new("x", 3, MetricType::ErrorCount)
            .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let value = metric.to_json().unwrap();
        assert_eq!(value["type"], json!("ERROR_COUNT"));
        assert_eq!(value["value"], json!(3));
        assert_eq!(value["timestamp"], json!("2024-01-02T03:04:05Z"));
        assert_eq!(value["tags"], json!({}));
    }

    #[test]
    fn test_naive_timestamp_is_read_as_utc() {
        let value = json!({
            "name": "x",
            "value": 1.5,
            "type": "LATENCY",
            "timestamp": "2024-05-06T07:08:09.250000",
            "context": {},
            "tags": {}
        });
        let metric = Metric::from_json(&value).unwrap();
        assert_eq!(
            metric.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap() + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_type() {
        let value = json!({
            "name": "x",
            "value": 1,
            "type": "BOGUS",
            "timestamp": "2024-05-06T07:08:09Z"
        });
        assert!(matches!(
            Metric::from_json(&value),
            Err(AnalyticsError::MalformedMetric { .. })
        ));
    }

    #[test]
    fn test_booleans_are_not_numeric() {
        assert_eq!(MetricValue::Bool(true).as_f64(), None);
        assert_eq!(MetricValue::Integer(4).as_f64(), Some(4.0));
        assert!(MetricValue::Float(0.5).is_numeric());
    }

    #[test]
    fn test_non_finite_floats_are_written_as_text() {
        let value = serde_json::to_value(MetricValue::Float(f64::NEG_INFINITY)).unwrap();
        assert_eq!(value, json!("-Infinity"));

        let nan: MetricValue = serde_json::from_value(json!("NaN")).unwrap();
        assert!(matches!(nan, MetricValue::Float(f) if f.is_nan()));
        let inf: MetricValue = serde_json::from_value(json!("Infinity")).unwrap();
        assert_eq!(inf, MetricValue::Float(f64::INFINITY));
    }

    #[test]
    fn test_other_text_values_are_rejected() {
        let value = json!({
            "name": "x",
            "value": "fast",
            "type": "CUSTOM",
            "timestamp": "2024-05-06T07:08:09Z"
        });
        assert!(matches!(
            Metric::from_json(&value),
            Err(AnalyticsError::MalformedMetric { .. })
        ));
    }
}
