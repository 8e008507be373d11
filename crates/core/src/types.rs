use std::collections::BTreeMap;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form JSON object used for item inputs, outputs, extras and job options.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Named durations in seconds (e.g. `{"total": 1.42}`).
pub type Timings = BTreeMap<String, f64>;
