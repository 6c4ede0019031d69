//! JSON exporter for simulated sessions.
//!
//! One record per handled event, carrying everything the renderer would
//! have drawn afterwards. Useful for diffing two seeds or replaying a failure.

use mmsview_core::context::FrameState;
use mmsview_core::playback::SyncOutcome;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// State after one handled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Event counter within the run
    pub step: u64,

    /// Virtual wall-clock seconds
    pub time_sec: f64,

    /// Media element clock
    pub media_time: f64,

    /// Debug rendering of the event
    pub event: String,

    pub outcome: SyncOutcome,

    pub phase: String,

    /// Label text as shown
    pub label: String,

    pub state: FrameState,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Survey frames
    pub frame_count: usize,

    /// All recorded events
    pub frames: Vec<SimFrame>,

    /// Final result
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, frame_count: usize) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            frame_count,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    pub fn add_frame(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
