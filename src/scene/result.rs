//! The record a showing resolves with.

use serde::Serialize;

use crate::value::{Record, Value};

/// Outcome of one showing.
///
/// Serializes as one flat row: `start_time`, `frame_times` when recorded,
/// then the setup's data fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SceneResult {
    /// Timestamp of the first refresh of the showing (0 if none fired).
    pub start_time: f64,
    /// Every refresh timestamp while shown, first equal to `start_time`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frame_times: Vec<f64>,
    /// Timestamp of the last refresh processed before closing.
    #[serde(skip)]
    pub last_frame: f64,
    #[serde(flatten)]
    pub data: Record,
}

impl SceneResult {
    /// Time from the first to the last refresh.
    pub fn elapsed(&self) -> f64 {
        self.last_frame - self.start_time
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Flat row for a data collector.
    pub fn to_record(&self) -> Record {
        let mut row = Record::new();
        row.insert("start_time".into(), Value::Number(self.start_time));
        if !self.frame_times.is_empty() {
            row.insert("frame_times".into(), Value::from(self.frame_times.clone()));
        }
        row.extend(self.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        row
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
