//! Graph scenarios for simulation runs.

use crate::error::RngError;
use crate::graphs::{GraphBlueprint, Mutation};
use crate::rng::RandomNumberGenerator;
use isomorph_core::MismatchKind;
use serde::Serialize;
use std::fmt;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Random trees, no sharing
    Tree,

    /// Nodes reachable along several paths
    SharedDiamond,

    /// Nodes linking to themselves
    SelfCycle,

    /// One long cycle through every node
    Ring,

    /// Linked chains far deeper than any call stack would like
    DeepChain,

    /// One weight differs
    ValueDrift,

    /// One value list is longer
    LengthDrift,

    /// One payload changes type
    TypeDrift,

    /// One payload is null on a single side
    NullDrift,

    /// Member hooks slower than the deadline
    SlowCompare,
}

/// Outcome a scenario iteration must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Expectation {
    Equal,
    Mismatch(MismatchKind),
    Timeout,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Equal => f.write_str("equal"),
            Expectation::Mismatch(kind) => write!(f, "{kind}"),
            Expectation::Timeout => f.write_str("timeout"),
        }
    }
}

/// The two blueprints of one iteration.
#[derive(Debug, Clone)]
pub struct ScenarioCase {
    pub expected: GraphBlueprint,
    pub actual: GraphBlueprint,
    pub mutation: Option<Mutation>,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Tree,
            ScenarioId::SharedDiamond,
            ScenarioId::SelfCycle,
            ScenarioId::Ring,
            ScenarioId::DeepChain,
            ScenarioId::ValueDrift,
            ScenarioId::LengthDrift,
            ScenarioId::TypeDrift,
            ScenarioId::NullDrift,
            ScenarioId::SlowCompare,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Tree => "tree",
            ScenarioId::SharedDiamond => "shared_diamond",
            ScenarioId::SelfCycle => "self_cycle",
            ScenarioId::Ring => "ring",
            ScenarioId::DeepChain => "deep_chain",
            ScenarioId::ValueDrift => "value_drift",
            ScenarioId::LengthDrift => "length_drift",
            ScenarioId::TypeDrift => "type_drift",
            ScenarioId::NullDrift => "null_drift",
            ScenarioId::SlowCompare => "slow_compare",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Tree => "Random trees up to 40 nodes, built twice, must compare equal",
            ScenarioId::SharedDiamond => "DAGs with shared children, must compare equal",
            ScenarioId::SelfCycle => "Trees whose nodes link to themselves, must terminate equal",
            ScenarioId::Ring => "Rings up to 60 nodes, must terminate equal",
            ScenarioId::DeepChain => "Chains of 2000-5000 links, must not exhaust the stack",
            ScenarioId::ValueDrift => "Tangled graph with one weight bumped, must report ValueMismatch",
            ScenarioId::LengthDrift => "Tangled graph with one longer list, must report LengthMismatch",
            ScenarioId::TypeDrift => "Tangled graph with one retyped payload, must report TypeMismatch",
            ScenarioId::NullDrift => "Tangled graph with one nulled payload, must report NullMismatch",
            ScenarioId::SlowCompare => "Member hooks slower than the deadline, must time out",
        }
    }

    pub fn expectation(&self) -> Expectation {
        match self {
            ScenarioId::ValueDrift => Expectation::Mismatch(MismatchKind::ValueMismatch),
            ScenarioId::LengthDrift => Expectation::Mismatch(MismatchKind::LengthMismatch),
            ScenarioId::TypeDrift => Expectation::Mismatch(MismatchKind::TypeMismatch),
            ScenarioId::NullDrift => Expectation::Mismatch(MismatchKind::NullMismatch),
            ScenarioId::SlowCompare => Expectation::Timeout,
            _ => Expectation::Equal,
        }
    }

    /// Builds the blueprints of one iteration from `rng`.
    pub fn case<R: RandomNumberGenerator>(&self, mut rng: R) -> Result<ScenarioCase, RngError> {
        let expected = match self {
            ScenarioId::Tree => GraphBlueprint::tree(&mut rng, 40)?,
            ScenarioId::SharedDiamond => GraphBlueprint::shared_dag(&mut rng, 30)?,
            ScenarioId::SelfCycle => GraphBlueprint::self_cycles(&mut rng, 20)?,
            ScenarioId::Ring => GraphBlueprint::ring(&mut rng, 60)?,
            ScenarioId::DeepChain => GraphBlueprint::chain(&mut rng, 2000, 5000)?,
            ScenarioId::SlowCompare => GraphBlueprint::tree(&mut rng, 2)?,
            ScenarioId::ValueDrift
            | ScenarioId::LengthDrift
            | ScenarioId::TypeDrift
            | ScenarioId::NullDrift => GraphBlueprint::tangled(&mut rng, 25)?,
        };

        let mutation = match self {
            ScenarioId::ValueDrift => Some(expected.pick_target(&mut rng, Mutation::Weight)?),
            ScenarioId::LengthDrift => Some(expected.pick_target(&mut rng, Mutation::AppendValue)?),
            ScenarioId::TypeDrift => Some(expected.pick_target(&mut rng, Mutation::RetypePayload)?),
            ScenarioId::NullDrift => Some(expected.pick_target(&mut rng, Mutation::TogglePayload)?),
            _ => None,
        };

        let actual = match mutation {
            Some(mutation) => expected.mutated(mutation),
            None => expected.clone(),
        };
        Ok(ScenarioCase {
            expected,
            actual,
            mutation,
        })
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tree" => Ok(ScenarioId::Tree),
            "shared_diamond" | "shareddiamond" | "diamond" => Ok(ScenarioId::SharedDiamond),
            "self_cycle" | "selfcycle" => Ok(ScenarioId::SelfCycle),
            "ring" => Ok(ScenarioId::Ring),
            "deep_chain" | "deepchain" | "chain" => Ok(ScenarioId::DeepChain),
            "value_drift" | "valuedrift" => Ok(ScenarioId::ValueDrift),
            "length_drift" | "lengthdrift" => Ok(ScenarioId::LengthDrift),
            "type_drift" | "typedrift" => Ok(ScenarioId::TypeDrift),
            "null_drift" | "nulldrift" => Ok(ScenarioId::NullDrift),
            "slow_compare" | "slowcompare" | "slow" => Ok(ScenarioId::SlowCompare),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
