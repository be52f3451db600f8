//! Record sink DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Acknowledgement for an accepted record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendResponse {
    pub accepted: bool,
    /// Sequence number assigned to the record within the run
    pub num: u64,
}

/// Answer to a GetSummary call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub run_id: String,
    pub summary: BTreeMap<String, Value>,
}

/// One sampled history point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePoint {
    pub step: i64,
    pub value: Value,
}

/// Answer to a SampledHistory call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledHistoryResponse {
    pub run_id: String,
    pub key: String,
    /// Evenly spaced subset of the logged rows containing `key`
    pub points: Vec<SamplePoint>,
}
