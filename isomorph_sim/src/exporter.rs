//! JSON export of scenario runs.

use crate::runner::ScenarioResult;
use crate::statistics::StatisticsSnapshot;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One scenario run in an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedRun {
    pub scenario: String,
    pub seed: u64,
    pub expectation: String,
    pub passed: bool,
    pub iterations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub failed_iterations: Vec<u64>,
    pub statistics: StatisticsSnapshot,
}

impl From<&ScenarioResult> for ExportedRun {
    fn from(result: &ScenarioResult) -> Self {
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            expectation: result.expectation.to_string(),
            passed: result.passed,
            iterations: result.metrics.iterations,
            failure_reason: result.failure_reason.clone(),
            failed_iterations: result.failures.iter().map(|f| f.iteration).collect(),
            statistics: result.statistics.clone(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Master seed of the first run
    pub seed: u64,

    pub runs: Vec<ExportedRun>,

    /// Final results
    pub passed: bool,
}

impl SimExport {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            runs: Vec::new(),
            passed: false,
        }
    }

    pub fn add_result(&mut self, result: &ScenarioResult) {
        self.runs.push(ExportedRun::from(result));
    }

    pub fn finalize(&mut self) {
        self.passed = self.runs.iter().all(|run| run.passed);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
