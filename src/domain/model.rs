//! Result model for Loki query responses.
//!
//! A range or instant query answers with an envelope like
//!
//! ```text
//! {
//!   "status": "success",
//!   "data": {
//!     "resultType": "streams",
//!     "result": [
//!       { "stream": { "job": "checkout" }, "values": [ ["1719835200000000000", "line"] ] }
//!     ]
//!   }
//! }
//! ```
//!
//! Log queries produce `streams`, metric queries produce a `matrix` whose
//! elements look like `{ "metric": {..}, "values": [ [1719835200, "1.5"] ] }`.

use crate::utils::error::{LokiError, Result};
use serde::de::{self, DeserializeOwned, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

/// Label set of a stream or series.
pub type Labels = BTreeMap<String, String>;

pub type Streams = Vec<Stream>;

pub type Matrix = Vec<Metric>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Streams,
    Matrix,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Streams => "streams",
            ResultType::Matrix => "matrix",
        }
    }

    /// Classify the `resultType` of any query response. Instant metric
    /// queries answer with `vector` or `scalar`; over a range they yield a matrix.
    pub fn classify(raw: &str) -> Option<ResultType> {
        match raw {
            "streams" => Some(ResultType::Streams),
            "matrix" | "vector" | "scalar" => Some(ResultType::Matrix),
            _ => None,
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub status: String,
    pub data: Data,
}

/// The `data` object. The variant is chosen by `resultType` and holds the
/// decoded `result` array, so type and payload cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Streams(Streams),
    Matrix(Matrix),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(rename = "stream")]
    pub labels: Labels,
    pub values: Vec<LogEntry>,
}

/// One log line. On the wire: `["<epoch nanoseconds>", "<line>"]`, optionally
/// followed by a third element.
///
/// Push bodies carry structured metadata there as a flat label object. Query
/// responses encoded with `categorize-labels` nest it as
/// `{"structuredMetadata": {..}, "parsed": {..}}`; both shapes are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: i64,
    pub line: String,
    pub metadata: Labels,
    /// Labels extracted by a parser stage of the query. Never pushed.
    pub parsed: Labels,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Metric {
    #[serde(rename = "metric")]
    pub labels: Labels,
    pub values: Vec<MetricPoint>,
}

/// One sample. On the wire: `[<epoch seconds>, "<value>"]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    pub ts: i64,
    pub v: f64,
}

impl LogEntry {
    pub fn new(timestamp: i64, line: impl Into<String>) -> Self {
        Self {
            timestamp,
            line: line.into(),
            metadata: Labels::new(),
            parsed: Labels::new(),
        }
    }
}

impl QueryResult {
    /// Parse a response body.
    ///
    /// The envelope is read first and `result` is decoded once `resultType`
    /// is known, so an error path always reaches into `data.result` whatever
    /// the key order of the body.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = match serde_json::from_slice(bytes) {
            Ok(envelope) => envelope,
            Err(source) => return Err(envelope_error(bytes, source)),
        };

        let data = match envelope.data.result_type.as_str() {
            "streams" => Data::Streams(decode_result(&envelope.data.result)?),
            "matrix" => Data::Matrix(decode_result(&envelope.data.result)?),
            other => {
                return Err(LokiError::Deserialization {
                    path: "data.resultType".to_string(),
                    source: de::Error::unknown_variant(other, &["streams", "matrix"]),
                })
            }
        };

        Ok(QueryResult {
            status: envelope.status,
            data,
        })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_json(&bytes)
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn result_type(&self) -> ResultType {
        self.data.result_type()
    }

    pub fn into_streams(self) -> Result<Streams> {
        match self.data {
            Data::Streams(streams) => Ok(streams),
            other => Err(LokiError::UnexpectedResultType {
                expected: ResultType::Streams.to_string(),
                actual: other.result_type().to_string(),
            }),
        }
    }

    pub fn into_matrix(self) -> Result<Matrix> {
        match self.data {
            Data::Matrix(matrix) => Ok(matrix),
            other => Err(LokiError::UnexpectedResultType {
                expected: ResultType::Matrix.to_string(),
                actual: other.result_type().to_string(),
            }),
        }
    }
}

impl Data {
    pub fn result_type(&self) -> ResultType {
        match self {
            Data::Streams(_) => ResultType::Streams,
            Data::Matrix(_) => ResultType::Matrix,
        }
    }

    pub fn streams(&self) -> Option<&[Stream]> {
        match self {
            Data::Streams(streams) => Some(streams),
            Data::Matrix(_) => None,
        }
    }

    pub fn matrix(&self) -> Option<&[Metric]> {
        match self {
            Data::Matrix(metrics) => Some(metrics),
            Data::Streams(_) => None,
        }
    }

    /// Number of streams or series.
    pub fn len(&self) -> usize {
        match self {
            Data::Streams(streams) => streams.len(),
            Data::Matrix(metrics) => metrics.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeData {
    result_type: String,
    result: Box<RawValue>,
}

// Same shape as `Envelope` with the payload skipped; only used to locate an
// envelope error.
#[derive(Deserialize)]
#[allow(dead_code)]
struct EnvelopeShape {
    #[serde(default)]
    status: String,
    data: EnvelopeShapeData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct EnvelopeShapeData {
    result_type: String,
    result: IgnoredAny,
}

fn envelope_error(bytes: &[u8], source: serde_json::Error) -> LokiError {
    match parse_json::<EnvelopeShape>(bytes) {
        Err(located) => located,
        Ok(_) => LokiError::Deserialization {
            path: ".".to_string(),
            source,
        },
    }
}

fn decode_result<T: DeserializeOwned>(raw: &RawValue) -> Result<T> {
    let mut de = serde_json::Deserializer::from_str(raw.get());
    serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let inner = err.path().to_string();
        let path = match inner.as_str() {
            "." => "data.result".to_string(),
            _ if inner.starts_with('[') => format!("data.result{}", inner),
            _ => format!("data.result.{}", inner),
        };
        LokiError::Deserialization {
            path,
            source: err.into_inner(),
        }
    })
}

#[derive(Deserialize)]
struct ResultTypeProbe {
    data: ProbeData,
}

// `result` is not declared, so serde skips it without building it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeData {
    result_type: String,
}

/// Read only `data.resultType` from a response body and classify it.
pub fn result_type_from_json(bytes: &[u8]) -> Result<ResultType> {
    let probe: ResultTypeProbe = parse_json(bytes)?;
    ResultType::classify(&probe.data.result_type).ok_or(LokiError::UnexpectedResultType {
        expected: "streams, matrix, vector or scalar".to_string(),
        actual: probe.data.result_type,
    })
}

pub(crate) fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut de).map_err(from_path_error)?;
    de.end().map_err(|source| LokiError::Deserialization {
        path: ".".to_string(),
        source,
    })?;
    Ok(value)
}

fn from_path_error(err: serde_path_to_error::Error<serde_json::Error>) -> LokiError {
    LokiError::Deserialization {
        path: err.path().to_string(),
        source: err.into_inner(),
    }
}

impl<'de> Deserialize<'de> for LogEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LogEntryVisitor;

        impl<'de> Visitor<'de> for LogEntryVisitor {
            type Value = LogEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [\"<nanoseconds>\", \"<line>\"] array")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<LogEntry, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let raw_ts: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let timestamp = raw_ts.parse::<i64>().map_err(|_| {
                    de::Error::invalid_value(
                        de::Unexpected::Str(&raw_ts),
                        &"an integer nanosecond timestamp",
                    )
                })?;
                let line: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let (metadata, parsed) = match seq.next_element::<EntryLabels>()? {
                    Some(EntryLabels::Categorized(labels)) => {
                        (labels.structured_metadata, labels.parsed)
                    }
                    Some(EntryLabels::Flat(metadata)) => (metadata, Labels::new()),
                    None => (Labels::new(), Labels::new()),
                };

                Ok(LogEntry {
                    timestamp,
                    line,
                    metadata,
                    parsed,
                })
            }
        }

        deserializer.deserialize_seq(LogEntryVisitor)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryLabels {
    Categorized(CategorizedLabels),
    Flat(Labels),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CategorizedLabels {
    #[serde(default)]
    structured_metadata: Labels,
    #[serde(default)]
    parsed: Labels,
}

impl Serialize for LogEntry {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.metadata.is_empty() { 2 } else { 3 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.timestamp.to_string())?;
        seq.serialize_element(&self.line)?;
        if !self.metadata.is_empty() {
            seq.serialize_element(&self.metadata)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for MetricPoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MetricPointVisitor;

        impl<'de> Visitor<'de> for MetricPointVisitor {
            type Value = MetricPoint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [<seconds>, \"<value>\"] array")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<MetricPoint, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let ts: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                if !ts.is_finite() {
                    return Err(de::Error::invalid_value(
                        de::Unexpected::Float(ts),
                        &"a finite timestamp",
                    ));
                }
                let raw_value: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                // Rust accepts Prometheus' "NaN", "+Inf" and "-Inf" spellings.
                let v = raw_value.parse::<f64>().map_err(|_| {
                    de::Error::invalid_value(de::Unexpected::Str(&raw_value), &"a decimal sample value")
                })?;

                if ts < i64::MIN as f64 || ts >= i64::MAX as f64 {
                    return Err(de::Error::invalid_value(
                        de::Unexpected::Float(ts),
                        &"a timestamp in i64 seconds",
                    ));
                }

                Ok(MetricPoint {
                    ts: ts.trunc() as i64,
                    v,
                })
            }
        }

        deserializer.deserialize_seq(MetricPointVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAMS_FIXTURE: &str = include_str!("../../tests/fixtures/streams.json");
    const MATRIX_FIXTURE: &str = include_str!("../../tests/fixtures/matrix.json");

    #[test]
    fn test_deserialize_streams_fixture() {
        let result = QueryResult::from_json(STREAMS_FIXTURE.as_bytes()).unwrap();

        assert!(result.is_success());
        assert_eq!(result.result_type(), ResultType::Streams);
        let streams = result.into_streams().unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].values.len(), 89);
        assert_eq!(streams[0].labels["job"], "checkout");
        assert_eq!(streams[1].labels["level"], "error");
        assert_eq!(streams[2].labels["job"], "payments");
    }

    #[test]
    fn test_deserialize_matrix_fixture() {
        let result = QueryResult::from_json(MATRIX_FIXTURE.as_bytes()).unwrap();

        assert_eq!(result.result_type(), ResultType::Matrix);
        let metrics = result.into_matrix().unwrap();
        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics[0].values.len(), 22);
        assert_eq!(metrics[0].values[0].ts, 1719835200);
        assert_eq!(metrics[0].values[1].ts - metrics[0].values[0].ts, 60);
    }

    #[test]
    fn test_deserialize_empty_streams() {
        let json = r#"{"data":{"resultType":"streams","result":[]}}"#;
        let result = QueryResult::from_json(json.as_bytes()).unwrap();

        assert_eq!(result.data, Data::Streams(vec![]));
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_deserialize_empty_matrix() {
        let json = r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
        let result = QueryResult::from_json(json.as_bytes()).unwrap();

        assert_eq!(result.data, Data::Matrix(vec![]));
        assert_eq!(result.data.matrix().map(|m| m.len()), Some(0));
    }

    #[test]
    fn test_streams_keep_order_and_labels() {
        let json = r#"{"status":"success","data":{"resultType":"streams","result":[
            {"stream":{"app":"a"},"values":[["1","first"],["2","second"]]},
            {"stream":{"app":"b","env":"prod"},"values":[["3","third"]]}
        ]}}"#;
        let streams = QueryResult::from_json(json.as_bytes())
            .unwrap()
            .into_streams()
            .unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].labels, Labels::from([("app".into(), "a".into())]));
        assert_eq!(streams[0].values[0], LogEntry::new(1, "first"));
        assert_eq!(streams[0].values[1], LogEntry::new(2, "second"));
        assert_eq!(streams[1].labels.len(), 2);
        assert_eq!(streams[1].values[0].line, "third");
    }

    #[test]
    fn test_result_before_result_type() {
        let json = r#"{"data":{"result":[{"metric":{},"values":[[10,"1.5"]]}],"resultType":"matrix"}}"#;
        let metrics = QueryResult::from_json(json.as_bytes())
            .unwrap()
            .into_matrix()
            .unwrap();

        assert_eq!(metrics[0].values[0], MetricPoint { ts: 10, v: 1.5 });
    }

    #[test]
    fn test_unknown_result_type_is_rejected() {
        let json = r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        let err = QueryResult::from_json(json.as_bytes()).unwrap_err();

        match err {
            LokiError::Deserialization { path, source } => {
                assert_eq!(path, "data.resultType");
                assert!(source.to_string().contains("vector"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bad_timestamp_reports_path() {
        let json = r#"{"data":{"resultType":"streams","result":[
            {"stream":{},"values":[["not-a-number","line"]]}
        ]}}"#;
        let err = QueryResult::from_json(json.as_bytes()).unwrap_err();

        match err {
            LokiError::Deserialization { path, .. } => {
                assert_eq!(path, "data.result[0].values[0]");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_path_does_not_depend_on_key_order() {
        let type_first = r#"{"data":{"resultType":"streams","result":[
            {"stream":{},"values":[["1","a"],["x","b"]]}
        ]}}"#;
        let result_first = r#"{"data":{"result":[
            {"stream":{},"values":[["1","a"],["x","b"]]}
        ],"resultType":"streams"}}"#;

        for json in [type_first, result_first] {
            match QueryResult::from_json(json.as_bytes()).unwrap_err() {
                LokiError::Deserialization { path, .. } => {
                    assert_eq!(path, "data.result[0].values[1]", "body: {}", json)
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_envelope_errors_report_path() {
        let err = QueryResult::from_json(br#"{"data":{"resultType":7,"result":[]}}"#).unwrap_err();
        match err {
            LokiError::Deserialization { path, .. } => assert_eq!(path, "data.resultType"),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = QueryResult::from_json(br#"{"data":{"resultType":"matrix"}}"#).unwrap_err();
        assert!(err.to_string().contains("result"));
    }

    #[test]
    fn test_sample_timestamp_outside_i64_is_rejected() {
        let json = r#"{"data":{"resultType":"matrix","result":[
            {"metric":{},"values":[[1e300,"1"]]}
        ]}}"#;
        match QueryResult::from_json(json.as_bytes()).unwrap_err() {
            LokiError::Deserialization { path, source } => {
                assert_eq!(path, "data.result[0].values[0]");
                assert!(source.to_string().contains("i64 seconds"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_values_is_an_error() {
        let json = r#"{"data":{"resultType":"streams","result":[{"stream":{"a":"b"}}]}}"#;
        assert!(QueryResult::from_json(json.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let json = r#"{"status":"success"}"#;
        let err = QueryResult::from_json(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn test_special_sample_values() {
        let json = r#"{"data":{"resultType":"matrix","result":[
            {"metric":{"job":"x"},"values":[[1,"NaN"],[2,"+Inf"],[3,"-Inf"],[4.75,"0.25"]]}
        ]}}"#;
        let metrics = QueryResult::from_json(json.as_bytes())
            .unwrap()
            .into_matrix()
            .unwrap();
        let values = &metrics[0].values;

        assert!(values[0].v.is_nan());
        assert_eq!(values[1].v, f64::INFINITY);
        assert_eq!(values[2].v, f64::NEG_INFINITY);
        assert_eq!(values[3], MetricPoint { ts: 4, v: 0.25 });
    }

    #[test]
    fn test_sample_value_must_be_numeric() {
        let json = r#"{"data":{"resultType":"matrix","result":[
            {"metric":{},"values":[[1,"abc"]]}
        ]}}"#;
        assert!(QueryResult::from_json(json.as_bytes()).is_err());
    }

    #[test]
    fn test_structured_metadata_is_kept() {
        let json = r#"{"data":{"resultType":"streams","result":[
            {"stream":{"job":"api"},"values":[["5","hello",{"trace_id":"abc"}],["6","bye"]]}
        ]}}"#;
        let streams = QueryResult::from_json(json.as_bytes())
            .unwrap()
            .into_streams()
            .unwrap();

        assert_eq!(streams[0].values[0].metadata["trace_id"], "abc");
        assert!(streams[0].values[1].metadata.is_empty());
    }

    #[test]
    fn test_categorized_labels_are_split() {
        let json = r#"{"data":{"resultType":"streams","result":[
            {"stream":{"job":"api"},"values":[
                ["5","hello",{"structuredMetadata":{"trace_id":"abc"},"parsed":{"status":"200"}}],
                ["6","bye",{"structuredMetadata":{"trace_id":"def"}}],
                ["7","plain",{}]
            ]}
        ]}}"#;
        let streams = QueryResult::from_json(json.as_bytes())
            .unwrap()
            .into_streams()
            .unwrap();
        let values = &streams[0].values;

        assert_eq!(values[0].metadata["trace_id"], "abc");
        assert_eq!(values[0].parsed["status"], "200");
        assert_eq!(values[1].metadata["trace_id"], "def");
        assert!(values[1].parsed.is_empty());
        assert!(values[2].metadata.is_empty());
    }

    #[test]
    fn test_wrong_variant_accessor() {
        let json = r#"{"data":{"resultType":"matrix","result":[]}}"#;
        let err = QueryResult::from_json(json.as_bytes())
            .unwrap()
            .into_streams()
            .unwrap_err();

        assert!(matches!(err, LokiError::UnexpectedResultType { .. }));
    }

    #[test]
    fn test_from_reader() {
        let result = QueryResult::from_reader(STREAMS_FIXTURE.as_bytes()).unwrap();
        assert_eq!(result.data.len(), 3);
    }

    #[test]
    fn test_result_type_probe_skips_payload() {
        let json = r#"{"status":"success","data":{"resultType":"matrix","result":{"not":"a matrix"}}}"#;
        assert_eq!(
            result_type_from_json(json.as_bytes()).unwrap(),
            ResultType::Matrix
        );
        assert_eq!(
            result_type_from_json(STREAMS_FIXTURE.as_bytes()).unwrap(),
            ResultType::Streams
        );
        assert_eq!(
            result_type_from_json(br#"{"data":{"resultType":"vector","result":[]}}"#).unwrap(),
            ResultType::Matrix
        );
        assert_eq!(
            result_type_from_json(br#"{"data":{"resultType":"scalar","result":[1,"2"]}}"#).unwrap(),
            ResultType::Matrix
        );
        assert!(matches!(
            result_type_from_json(br#"{"data":{"resultType":"histogram"}}"#),
            Err(LokiError::UnexpectedResultType { .. })
        ));
        assert!(result_type_from_json(br#"{"status":"success"}"#).is_err());
    }

    #[test]
    fn test_log_entry_wire_form() {
        let entry = LogEntry::new(1_719_835_200_000_000_001, "line foo");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!(["1719835200000000001", "line foo"])
        );

        let mut with_metadata = entry.clone();
        with_metadata
            .metadata
            .insert("trace_id".to_string(), "abc".to_string());
        assert_eq!(
            serde_json::to_value(&with_metadata).unwrap(),
            serde_json::json!(["1719835200000000001", "line foo", {"trace_id": "abc"}])
        );
    }
}
