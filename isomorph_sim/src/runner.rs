//! Scenario runner - drives graph scenarios through the cancellation harness.

use crate::context::SimContext;
use crate::error::{SimError, StatisticsError};
use crate::replay::ReplayRandomNumberGenerator;
use crate::rng::SeededRandomNumberGenerator;
use crate::scenarios::{Expectation, ScenarioCase, ScenarioId};
use crate::seeds::SeedProvider;
use crate::statistics::{StatisticsSnapshot, TestStatistic, TestStatistics};

use isomorph_core::options::DEFAULT_TIMEOUT;
use isomorph_core::{
    CancellationHarness, MemberVisit, ValidationError, ValidationOptions, ValidationStats, Value,
    ELEMENTS_MEMBER,
};
use isomorph_env::ValidationContext;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Virtual time between two iterations.
const ITERATION_TICK: Duration = Duration::from_secs(1);

/// Members of the simulated graph nodes, as counted by the statistics tree.
const NODE_MEMBERS: [&str; 6] = ["label", "weight", "payload", "values", "children", "link"];

/// Shape of the expected side of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleShape {
    Null,
    Primitive,
    Object,
}

/// One validated member, as fed to the statistics tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSample {
    pub member: &'static str,
    pub depth: usize,
    pub shape: SampleShape,
    /// Both sides are the very same object
    pub same_reference: bool,
    pub element: bool,
}

impl MemberSample {
    pub fn from_visit(visit: &MemberVisit<'_>) -> Self {
        let shape = match visit.expected {
            Value::Null => SampleShape::Null,
            Value::Primitive(_) => SampleShape::Primitive,
            Value::Object(_) => SampleShape::Object,
        };
        let same_reference = match (visit.expected, visit.actual) {
            (Value::Object(expected), Value::Object(actual)) => expected.ptr_eq(actual),
            _ => false,
        };
        Self {
            member: visit.member.name(),
            depth: visit.depth,
            shape,
            same_reference,
            element: visit.index.is_some(),
        }
    }
}

/// Statistics tree over member samples.
pub fn member_statistics() -> Result<TestStatistics<MemberSample>, StatisticsError> {
    let shape = TestStatistic::exclusive("shape")
        .with_child(TestStatistic::leaf("null", |s: &MemberSample| s.shape == SampleShape::Null))?
        .with_child(TestStatistic::leaf("primitive", |s: &MemberSample| {
            s.shape == SampleShape::Primitive
        }))?
        .with_child(TestStatistic::leaf("object", |s: &MemberSample| s.shape == SampleShape::Object))?;

    let mut members = TestStatistic::non_exclusive("member");
    for name in NODE_MEMBERS.into_iter().chain([ELEMENTS_MEMBER]) {
        members.add_child(TestStatistic::leaf(name, move |s: &MemberSample| s.member == name))?;
    }

    let depth = TestStatistic::exclusive("depth")
        .with_child(TestStatistic::leaf("shallow", |s: &MemberSample| s.depth <= 2))?
        .with_child(TestStatistic::leaf("medium", |s: &MemberSample| (3..=16).contains(&s.depth)))?
        .with_child(TestStatistic::leaf("deep", |s: &MemberSample| s.depth > 16))?;

    let sharing = TestStatistic::non_exclusive("sharing")
        .with_child(TestStatistic::leaf("same_reference", |s: &MemberSample| s.same_reference))?
        .with_child(TestStatistic::leaf("element", |s: &MemberSample| s.element))?;

    Ok(TestStatistics::new("member_samples", [shape, members, depth, sharing]))
}

/// A failing iteration.
#[derive(Debug, Clone, Serialize)]
pub struct IterationFailure {
    pub iteration: u64,
    pub seed: u64,
    pub reason: String,
    /// Saved random numbers that reproduce the iteration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_file: Option<PathBuf>,
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Master seed used
    pub seed: u64,

    pub expectation: Expectation,

    /// Whether every iteration produced the expected outcome
    pub passed: bool,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// First failure message if any
    pub failure_reason: Option<String>,

    pub failures: Vec<IterationFailure>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    pub statistics: StatisticsSnapshot,

    /// Rendered statistics tree
    #[serde(skip)]
    pub statistics_text: String,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub iterations: u64,
    pub passed_iterations: u64,

    /// Calls that found the graphs equal
    pub equal_results: u64,

    /// Mismatch counts by kind name
    pub mismatches: BTreeMap<String, u64>,

    pub timeouts: u64,

    /// Fatal errors (ceiling, accessor, task failure)
    pub fatal_errors: u64,

    pub members_visited: u64,
    pub frames_pushed: u64,
    pub max_depth: usize,
    pub dedup_skips: u64,
    pub reference_shortcuts: u64,
}

impl ScenarioMetrics {
    fn record(&mut self, result: &Result<ValidationStats, ValidationError>) {
        match result {
            Ok(stats) => {
                self.equal_results += 1;
                self.members_visited += stats.members_visited;
                self.frames_pushed += stats.frames_pushed;
                self.max_depth = self.max_depth.max(stats.max_depth);
                self.dedup_skips += stats.dedup_skips;
                self.reference_shortcuts += stats.reference_shortcuts;
            }
            Err(err) => {
                if let Some(report) = err.report() {
                    *self.mismatches.entry(report.kind.name().to_string()).or_default() += 1;
                } else if err.is_timeout() {
                    self.timeouts += 1;
                } else {
                    self.fatal_errors += 1;
                }
            }
        }
    }
}

/// Compares an iteration outcome with what the scenario expects.
pub fn check_outcome(
    expectation: Expectation,
    result: &Result<ValidationStats, ValidationError>,
) -> Result<(), String> {
    match (expectation, result) {
        (Expectation::Equal, Ok(_)) => Ok(()),
        (Expectation::Mismatch(kind), Err(err)) if err.report().map(|r| r.kind) == Some(kind) => Ok(()),
        (Expectation::Timeout, Err(err)) if err.is_timeout() => Ok(()),
        (_, Ok(_)) => Err(format!("expected {expectation}, graphs compared equal")),
        (_, Err(err)) => Err(format!("expected {expectation}, got {err}")),
    }
}

/// Runs graph scenarios.
pub struct ScenarioRunner {
    /// Master seed
    seed: u64,

    iterations: u64,

    /// Deadline of each comparison
    timeout: Duration,

    /// Hook delay per member in the slow scenario
    slow_member_delay: Duration,

    /// Directory of the replay files
    replay_dir: PathBuf,

    /// Save the random numbers of failing iterations
    save_failures: bool,

    /// Replay this iteration from its saved numbers instead of running all
    replay_iteration: Option<u64>,
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            iterations: 10,
            timeout: DEFAULT_TIMEOUT,
            slow_member_delay: Duration::from_millis(10),
            replay_dir: std::env::temp_dir().join("isomorph-sim"),
            save_failures: true,
            replay_iteration: None,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_slow_member_delay(mut self, delay: Duration) -> Self {
        self.slow_member_delay = delay;
        self
    }

    pub fn with_replay_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.replay_dir = dir.into();
        self
    }

    pub fn with_save_failures(mut self, save: bool) -> Self {
        self.save_failures = save;
        self
    }

    pub fn with_replay(mut self, iteration: u64) -> Self {
        self.replay_iteration = Some(iteration);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Iteration id used in replay files.
    pub fn iteration_id(iteration: u64) -> String {
        format!("iteration-{iteration}")
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, SimError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let ctx = SimContext::shared(self.seed);
        let harness = CancellationHarness::new(Arc::clone(&ctx));
        let seeds = SeedProvider::new(self.seed);
        let statistics = Arc::new(Mutex::new(member_statistics()?));
        let statistics_error: Arc<Mutex<Option<StatisticsError>>> = Arc::new(Mutex::new(None));
        let expectation = scenario.expectation();

        let iterations: Vec<u64> = match self.replay_iteration {
            Some(iteration) => vec![iteration],
            None => (0..self.iterations).collect(),
        };

        let mut metrics = ScenarioMetrics::default();
        let mut failures = Vec::new();

        for iteration in iterations {
            let iteration_seed = seeds.iteration_seed(iteration);
            let mut rng = ReplayRandomNumberGenerator::new(
                &self.replay_dir,
                SeededRandomNumberGenerator::from_rng(
                    ctx.derive_rng(iteration_seed),
                    Some(iteration_seed),
                ),
            );
            rng.on_iteration_starting(
                scenario.name(),
                &Self::iteration_id(iteration),
                self.replay_iteration.is_some(),
            )?;

            let case = scenario.case(&mut rng)?;
            debug!(
                scenario = scenario.name(),
                iteration,
                seed = iteration_seed,
                nodes = case.expected.len(),
                "Iteration built"
            );

            let options = self.options_for(scenario, &statistics, &statistics_error);
            let result = self
                .run_case(&harness, scenario, &case, iteration, iteration_seed, options)
                .await;

            metrics.iterations += 1;
            metrics.record(&result);

            match check_outcome(expectation, &result) {
                Ok(()) => metrics.passed_iterations += 1,
                Err(reason) => {
                    warn!(scenario = scenario.name(), iteration, seed = iteration_seed, "{reason}");
                    let replay_file = if self.save_failures && self.replay_iteration.is_none() {
                        Some(rng.save()?)
                    } else {
                        None
                    };
                    failures.push(IterationFailure {
                        iteration,
                        seed: iteration_seed,
                        reason,
                        replay_file,
                    });
                }
            }

            ctx.advance_time(ITERATION_TICK);
        }

        if let Some(err) = lock(&statistics_error).take() {
            return Err(err.into());
        }

        let (snapshot, statistics_text) = {
            let statistics = lock(&statistics);
            (statistics.snapshot(), statistics.to_string())
        };

        let passed = failures.is_empty();
        info!(
            scenario = scenario.name(),
            passed,
            iterations = metrics.iterations,
            "Scenario finished"
        );

        Ok(ScenarioResult {
            scenario,
            seed: self.seed,
            expectation,
            passed,
            final_time_secs: ctx.now().as_secs_f64(),
            failure_reason: failures.first().map(|f| f.reason.clone()),
            failures,
            metrics,
            statistics: snapshot,
            statistics_text,
        })
    }

    async fn run_case(
        &self,
        harness: &CancellationHarness<SimContext>,
        scenario: ScenarioId,
        case: &ScenarioCase,
        iteration: u64,
        seed: u64,
        options: ValidationOptions,
    ) -> Result<ValidationStats, ValidationError> {
        let expected = case.expected.build();
        let actual = case.actual.build();

        harness
            .validate(expected.root(), actual.root(), options, move || {
                format!("{scenario} iteration {iteration} seed {seed}")
            })
            .await
    }

    fn options_for(
        &self,
        scenario: ScenarioId,
        statistics: &Arc<Mutex<TestStatistics<MemberSample>>>,
        statistics_error: &Arc<Mutex<Option<StatisticsError>>>,
    ) -> ValidationOptions {
        let statistics = Arc::clone(statistics);
        let statistics_error = Arc::clone(statistics_error);

        let options = ValidationOptions::default()
            .with_timeout(self.timeout)
            .on_member_done(move |visit| {
                let sample = MemberSample::from_visit(visit);
                if let Err(err) = lock(&statistics).update(&sample) {
                    lock(&statistics_error).get_or_insert(err);
                }
            });

        if scenario == ScenarioId::SlowCompare {
            let delay = self.slow_member_delay;
            options
                .with_timeout(delay * 2)
                .on_member_start(move |_| std::thread::sleep(delay))
        } else {
            options
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isomorph_core::MismatchKind;
    use tempfile::TempDir;

    fn runner(dir: &TempDir, seed: u64) -> ScenarioRunner {
        ScenarioRunner::new(seed)
            .with_iterations(3)
            .with_replay_dir(dir.path())
    }

    #[tokio::test]
    async fn test_equal_scenarios_pass() {
        let dir = TempDir::new().unwrap();
        for scenario in [
            ScenarioId::Tree,
            ScenarioId::SharedDiamond,
            ScenarioId::SelfCycle,
            ScenarioId::Ring,
        ] {
            let result = runner(&dir, 42).run(scenario).await.unwrap();
            assert!(result.passed, "{scenario}: {:?}", result.failure_reason);
            assert_eq!(result.metrics.equal_results, 3);
            assert!(result.statistics.counter > 0);
        }
    }

    #[tokio::test]
    async fn test_deep_chain_depth_recorded() {
        let dir = TempDir::new().unwrap();
        let result = runner(&dir, 7)
            .with_iterations(1)
            .run(ScenarioId::DeepChain)
            .await
            .unwrap();
        assert!(result.passed);
        assert!(result.metrics.max_depth >= 2000);
        assert!(result.statistics_text.contains("[deep]"));
    }

    #[tokio::test]
    async fn test_drift_scenarios_report_kind() {
        let dir = TempDir::new().unwrap();
        for (scenario, kind) in [
            (ScenarioId::ValueDrift, MismatchKind::ValueMismatch),
            (ScenarioId::LengthDrift, MismatchKind::LengthMismatch),
            (ScenarioId::TypeDrift, MismatchKind::TypeMismatch),
            (ScenarioId::NullDrift, MismatchKind::NullMismatch),
        ] {
            let result = runner(&dir, 5).run(scenario).await.unwrap();
            assert!(result.passed, "{scenario}: {:?}", result.failure_reason);
            assert_eq!(result.metrics.mismatches.get(kind.name()), Some(&3));
        }
    }

    #[tokio::test]
    async fn test_slow_scenario_times_out() {
        let dir = TempDir::new().unwrap();
        let result = runner(&dir, 1)
            .with_iterations(1)
            .with_slow_member_delay(Duration::from_millis(5))
            .run(ScenarioId::SlowCompare)
            .await
            .unwrap();
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.timeouts, 1);
    }

    #[tokio::test]
    async fn test_virtual_time_advances_per_iteration() {
        let dir = TempDir::new().unwrap();
        let result = runner(&dir, 3).run(ScenarioId::Tree).await.unwrap();
        assert_eq!(result.final_time_secs, 3.0);
    }

    #[test]
    fn test_check_outcome() {
        let ok: Result<ValidationStats, ValidationError> = Ok(ValidationStats::default());
        assert!(check_outcome(Expectation::Equal, &ok).is_ok());
        let err = check_outcome(Expectation::Timeout, &ok).unwrap_err();
        assert_eq!(err, "expected timeout, graphs compared equal");

        let timeout: Result<ValidationStats, ValidationError> = Err(ValidationError::Timeout {
            task: "t".into(),
            timeout_ms: 5,
            label: None,
        });
        assert!(check_outcome(Expectation::Timeout, &timeout).is_ok());
        assert!(check_outcome(Expectation::Mismatch(MismatchKind::ValueMismatch), &timeout).is_err());
    }

    #[test]
    fn test_member_statistics_shape() {
        let stats = member_statistics().unwrap();
        let member = stats.find(&["member"]).unwrap();
        assert_eq!(member.children().len(), NODE_MEMBERS.len() + 1);
        assert!(stats.find(&["member", ELEMENTS_MEMBER]).is_some());
    }
}
