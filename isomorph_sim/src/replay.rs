//! Record and replay the random numbers drawn during a simulation iteration.
//!
//! Every iteration is identified by a simulation id and an iteration id. In
//! record mode each drawn number is kept so the iteration can be saved to
//! `SimulationData_<simulation>.xml` under the replay directory; in replay
//! mode the saved numbers are handed back in order instead of fresh ones.

use crate::error::RngError;
use crate::rng::{RandomNumberGenerator, SeededRandomNumberGenerator};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

static SIMULATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Simulation\s+SimulationIdentifier='([^']*)'").expect("simulation regex is valid")
});

static ITERATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<SimulationIteration\s+SimulationIterationIdentifier='([^']*)'\s+RandomNumberSeed='([^']*)'\s*>\s*<RandomNumbers\s+Values='([^']*)'\s*/>",
    )
    .expect("iteration regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    Record,
    Replay,
}

#[derive(Debug)]
struct Session {
    simulation: String,
    iteration: String,
    mode: ReplayMode,
    numbers: Vec<u32>,
    cursor: usize,
}

/// A saved iteration as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedIteration {
    pub iteration: String,
    pub seed: Option<u64>,
    pub numbers: Vec<u32>,
}

/// Generator that records its draws and can replay a saved iteration.
#[derive(Debug)]
pub struct ReplayRandomNumberGenerator {
    directory: PathBuf,
    inner: SeededRandomNumberGenerator,
    session: Option<Session>,
}

impl ReplayRandomNumberGenerator {
    pub fn new(directory: impl Into<PathBuf>, inner: SeededRandomNumberGenerator) -> Self {
        Self {
            directory: directory.into(),
            inner,
            session: None,
        }
    }

    /// Starts an iteration. With `reuse_saved` the numbers previously saved
    /// for the same ids are loaded and replayed.
    pub fn on_iteration_starting(
        &mut self,
        simulation: &str,
        iteration: &str,
        reuse_saved: bool,
    ) -> Result<(), RngError> {
        let simulation = simulation.trim();
        let iteration = iteration.trim();
        if simulation.is_empty() {
            return Err(RngError::MissingIdentifier("simulation"));
        }
        if iteration.is_empty() {
            return Err(RngError::MissingIdentifier("iteration"));
        }

        let (mode, numbers) = if reuse_saved {
            let saved = self.load(simulation, iteration)?;
            info!(
                simulation,
                iteration,
                count = saved.numbers.len(),
                "Replaying saved random numbers"
            );
            (ReplayMode::Replay, saved.numbers)
        } else {
            debug!(simulation, iteration, "Recording random numbers");
            (ReplayMode::Record, Vec::new())
        };

        self.session = Some(Session {
            simulation: simulation.to_string(),
            iteration: iteration.to_string(),
            mode,
            numbers,
            cursor: 0,
        });
        Ok(())
    }

    pub fn mode(&self) -> Option<ReplayMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Numbers recorded or loaded for the current iteration.
    pub fn numbers(&self) -> &[u32] {
        self.session
            .as_ref()
            .map(|s| s.numbers.as_slice())
            .unwrap_or_default()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Replay file for a simulation id.
    pub fn file_path(&self, simulation: &str) -> PathBuf {
        self.directory
            .join(format!("SimulationData_{}.xml", simulation.trim()))
    }

    /// Saves the current iteration, replacing any previous file for the
    /// simulation.
    pub fn save(&self) -> Result<PathBuf, RngError> {
        let session = self.session.as_ref().ok_or(RngError::NotStarted)?;
        let path = self.file_path(&session.simulation);
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), RngError> {
        let session = self.session.as_ref().ok_or(RngError::NotStarted)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let document = render_document(
            &session.simulation,
            &session.iteration,
            self.inner.seed(),
            &session.numbers,
        );
        fs::write(path, document)?;
        info!(path = %path.display(), count = session.numbers.len(), "Saved random numbers");
        Ok(())
    }

    fn load(&self, simulation: &str, iteration: &str) -> Result<SavedIteration, RngError> {
        let path = self.file_path(simulation);
        if !path.exists() {
            return Err(RngError::ReplayFileMissing(path));
        }
        let text = fs::read_to_string(&path)?;
        let not_found = || RngError::ReplayDataNotFound {
            simulation: simulation.to_string(),
            iteration: iteration.to_string(),
            path: path.clone(),
        };

        let saved = parse_document(&text, simulation, iteration)?.ok_or_else(not_found)?;
        if saved.numbers.is_empty() {
            return Err(not_found());
        }
        Ok(saved)
    }
}

impl RandomNumberGenerator for ReplayRandomNumberGenerator {
    fn seed(&self) -> Option<u64> {
        self.inner.seed()
    }

    fn next_in_range(&mut self, min: u32, max: u32) -> Result<u32, RngError> {
        if max < min {
            return Err(RngError::InvalidRange { min, max });
        }
        let Some(session) = self.session.as_mut() else {
            return self.inner.next_in_range(min, max);
        };

        match session.mode {
            ReplayMode::Replay => {
                let value = *session
                    .numbers
                    .get(session.cursor)
                    .ok_or(RngError::ReplayExhausted)?;
                if value < min || value > max {
                    return Err(RngError::ReplayOutOfRange { value, min, max });
                }
                session.cursor += 1;
                Ok(value)
            }
            ReplayMode::Record => {
                let value = self.inner.next_in_range(min, max)?;
                session.numbers.push(value);
                Ok(value)
            }
        }
    }
}

fn render_document(simulation: &str, iteration: &str, seed: Option<u64>, numbers: &[u32]) -> String {
    let seed = seed.map(|s| s.to_string()).unwrap_or_default();
    let values = numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <Simulation SimulationIdentifier='{}' >\n\
         \x20   <SimulationIteration SimulationIterationIdentifier='{}' RandomNumberSeed='{}'>\n\
         \x20       <RandomNumbers Values='{}' />\n\
         \x20   </SimulationIteration>\n\
         </Simulation>\n",
        escape_attribute(simulation),
        escape_attribute(iteration),
        seed,
        values,
    )
}

/// Finds the saved iteration matching both ids, compared case-insensitively.
pub fn parse_document(
    text: &str,
    simulation: &str,
    iteration: &str,
) -> Result<Option<SavedIteration>, RngError> {
    let Some(found) = SIMULATION_RE.captures(text) else {
        return Ok(None);
    };
    let saved_simulation = unescape_attribute(&found[1]);
    if !saved_simulation.trim().eq_ignore_ascii_case(simulation.trim()) {
        return Ok(None);
    }

    for caps in ITERATION_RE.captures_iter(text) {
        let saved_iteration = unescape_attribute(&caps[1]);
        if !saved_iteration.trim().eq_ignore_ascii_case(iteration.trim()) {
            continue;
        }
        let seed = match caps[2].trim() {
            "" => None,
            s => Some(s.parse().map_err(|_| RngError::Parse(s.to_string()))?),
        };
        let numbers = caps[3]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u32>().map_err(|_| RngError::Parse(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(SavedIteration {
            iteration: saved_iteration,
            seed,
            numbers,
        }));
    }
    Ok(None)
}

fn escape_attribute(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_attribute(text: &str) -> String {
    text.replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
