//! JSON exporter for metric timelines.
//!
//! The reporting loop appends one frame per cycle; the CLI writes the
//! collected frames to `--export` on exit.

use agora_core::MetricsSnapshot;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single reporting cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SimFrame {
    /// Seconds since the simulation started
    pub time_sec: f64,

    pub metrics: MetricsSnapshot,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Time of the last frame
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_metrics: Option<MetricsSnapshot>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            final_metrics: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, metrics: MetricsSnapshot) {
        self.passed = passed;
        self.final_metrics = Some(metrics);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
