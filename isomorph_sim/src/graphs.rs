//! Random object graphs for simulation scenarios.
//!
//! A [`GraphBlueprint`] is a plain description of a graph: nodes with their
//! fields plus child and link edges by index. Building the same blueprint
//! twice yields two graphs that are structurally identical but share no
//! allocation, which is exactly the input the validator must accept.
//! A [`Mutation`] changes one node of a blueprint so the built graphs
//! diverge in a known way.

use crate::error::RngError;
use crate::probability::ProbabilityRandomNumberGenerator;
use crate::rng::RandomNumberGenerator;
use isomorph_core::{introspect, MismatchKind, ToValue, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Resolution of the payload kind weights.
const PAYLOAD_SCALE: u32 = 100;

const PAYLOAD_NULL: u32 = 0;
const PAYLOAD_NUMBER: u32 = 1;
const PAYLOAD_TEXT: u32 = 2;

/// Node of a simulated graph, always reached through `Arc`.
pub struct GraphNode {
    pub label: String,
    pub weight: i64,
    pub payload: Value,
    pub values: Vec<i32>,
    pub children: Mutex<Vec<Arc<GraphNode>>>,
    pub link: Mutex<Option<Arc<GraphNode>>>,
}
introspect!(shared GraphNode { label, weight, payload, values, children, link });

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSpec {
    Null,
    Number(i32),
    Text(String),
}

impl PayloadSpec {
    fn to_value(&self) -> Value {
        match self {
            PayloadSpec::Null => Value::Null,
            PayloadSpec::Number(n) => n.to_value(),
            PayloadSpec::Text(text) => text.to_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub label: String,
    pub weight: i64,
    pub payload: PayloadSpec,
    pub values: Vec<i32>,
    pub children: Vec<usize>,
    pub link: Option<usize>,
}

/// Change applied to one node of a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Bumps `weight`
    Weight(usize),
    /// Appends to `values`
    AppendValue(usize),
    /// Swaps a number payload for text and back
    RetypePayload(usize),
    /// Nulls a present payload, fills a null one
    TogglePayload(usize),
}

impl Mutation {
    pub fn node(&self) -> usize {
        match *self {
            Mutation::Weight(node)
            | Mutation::AppendValue(node)
            | Mutation::RetypePayload(node)
            | Mutation::TogglePayload(node) => node,
        }
    }

    /// Mismatch the mutated graph is reported with.
    pub fn mismatch_kind(&self) -> MismatchKind {
        match self {
            Mutation::Weight(_) => MismatchKind::ValueMismatch,
            Mutation::AppendValue(_) => MismatchKind::LengthMismatch,
            Mutation::RetypePayload(_) => MismatchKind::TypeMismatch,
            Mutation::TogglePayload(_) => MismatchKind::NullMismatch,
        }
    }
}

/// Draws node fields and edges from a random number generator.
struct Generator<R> {
    draws: ProbabilityRandomNumberGenerator<R>,
}

impl<R: RandomNumberGenerator> Generator<R> {
    fn new(rng: R) -> Result<Self, RngError> {
        let mut draws = ProbabilityRandomNumberGenerator::new(rng, PAYLOAD_SCALE);
        draws
            .add_for_probability(15, [PAYLOAD_NULL])?
            .add_for_probability(55, [PAYLOAD_NUMBER])?
            .add_remaining([PAYLOAD_TEXT])?;
        Ok(Self { draws })
    }

    fn number(&mut self, max: u32) -> Result<u32, RngError> {
        self.draws.rng_mut().next(max)
    }

    fn between(&mut self, min: u32, max: u32) -> Result<u32, RngError> {
        self.draws.rng_mut().next_in_range(min, max)
    }

    fn index(&mut self, len: usize) -> Result<usize, RngError> {
        Ok(self.number(len.saturating_sub(1) as u32)? as usize)
    }

    fn payload(&mut self) -> Result<PayloadSpec, RngError> {
        Ok(match self.draws.next_value()? {
            PAYLOAD_NULL => PayloadSpec::Null,
            PAYLOAD_NUMBER => PayloadSpec::Number(self.number(10_000)? as i32),
            _ => PayloadSpec::Text(format!("text-{}", self.number(999)?)),
        })
    }

    fn node(&mut self, index: usize) -> Result<NodeSpec, RngError> {
        let count = self.number(4)?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(self.number(100)? as i32);
        }
        Ok(NodeSpec {
            label: format!("n{index}"),
            weight: i64::from(self.number(1000)?),
            payload: if index == 0 {
                PayloadSpec::Number(self.number(10_000)? as i32)
            } else {
                self.payload()?
            },
            values,
            children: Vec::new(),
            link: None,
        })
    }

    fn nodes(&mut self, count: usize) -> Result<Vec<NodeSpec>, RngError> {
        (0..count.max(1)).map(|i| self.node(i)).collect()
    }
}

/// Description of a graph rooted at node 0.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBlueprint {
    nodes: Vec<NodeSpec>,
}

impl GraphBlueprint {
    pub fn from_nodes(nodes: Vec<NodeSpec>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Random tree; every node but the root hangs off an earlier node.
    pub fn tree<R: RandomNumberGenerator>(rng: R, max_nodes: u32) -> Result<Self, RngError> {
        let mut gen = Generator::new(rng)?;
        let count = gen.between(1, max_nodes.max(1))? as usize;
        Self::random_tree(&mut gen, count)
    }

    /// Random tree with extra child edges to later nodes, so some nodes are
    /// reachable along several paths.
    pub fn shared_dag<R: RandomNumberGenerator>(rng: R, max_nodes: u32) -> Result<Self, RngError> {
        let mut gen = Generator::new(rng)?;
        let count = gen.between(2, max_nodes.max(2))? as usize;
        let mut blueprint = Self::random_tree(&mut gen, count)?;
        blueprint.add_shared_edges(&mut gen)?;
        Ok(blueprint)
    }

    /// Random tree where the root and some other nodes link to themselves.
    pub fn self_cycles<R: RandomNumberGenerator>(rng: R, max_nodes: u32) -> Result<Self, RngError> {
        let mut gen = Generator::new(rng)?;
        let count = gen.between(1, max_nodes.max(1))? as usize;
        let mut blueprint = Self::random_tree(&mut gen, count)?;
        blueprint.nodes[0].link = Some(0);
        for i in 1..blueprint.nodes.len() {
            if gen.number(2)? == 0 {
                blueprint.nodes[i].link = Some(i);
            }
        }
        Ok(blueprint)
    }

    /// Nodes linked head to tail, the last one back to the head.
    pub fn ring<R: RandomNumberGenerator>(rng: R, max_nodes: u32) -> Result<Self, RngError> {
        let mut gen = Generator::new(rng)?;
        let count = gen.between(2, max_nodes.max(2))? as usize;
        let mut nodes = gen.nodes(count)?;
        let len = nodes.len();
        for (i, node) in nodes.iter_mut().enumerate() {
            node.link = Some((i + 1) % len);
        }
        Ok(Self { nodes })
    }

    /// Nodes linked head to tail without closing the loop.
    pub fn chain<R: RandomNumberGenerator>(rng: R, min_nodes: u32, max_nodes: u32) -> Result<Self, RngError> {
        let mut gen = Generator::new(rng)?;
        let count = gen.between(min_nodes.max(1), max_nodes.max(min_nodes.max(1)))? as usize;
        let mut nodes = gen.nodes(count)?;
        let len = nodes.len();
        for (i, node) in nodes.iter_mut().enumerate() {
            node.link = (i + 1 < len).then_some(i + 1);
        }
        Ok(Self { nodes })
    }

    /// Shared DAG plus random links to any node, cycles included.
    pub fn tangled<R: RandomNumberGenerator>(rng: R, max_nodes: u32) -> Result<Self, RngError> {
        let mut gen = Generator::new(rng)?;
        let count = gen.between(2, max_nodes.max(2))? as usize;
        let mut blueprint = Self::random_tree(&mut gen, count)?;
        blueprint.add_shared_edges(&mut gen)?;
        let len = blueprint.nodes.len();
        for i in 0..len {
            if gen.number(2)? == 0 {
                blueprint.nodes[i].link = Some(gen.index(len)?);
            }
        }
        Ok(blueprint)
    }

    fn random_tree<R: RandomNumberGenerator>(gen: &mut Generator<R>, count: usize) -> Result<Self, RngError> {
        let mut nodes = gen.nodes(count)?;
        for i in 1..nodes.len() {
            let parent = gen.index(i)?;
            nodes[parent].children.push(i);
        }
        Ok(Self { nodes })
    }

    fn add_shared_edges<R: RandomNumberGenerator>(&mut self, gen: &mut Generator<R>) -> Result<(), RngError> {
        let len = self.nodes.len();
        if len < 2 {
            return Ok(());
        }
        let extra = gen.number((len / 2) as u32)?;
        for _ in 0..extra {
            let from = gen.number(len as u32 - 2)? as usize;
            let to = gen.between(from as u32 + 1, len as u32 - 1)? as usize;
            self.nodes[from].children.push(to);
        }
        Ok(())
    }

    /// Picks a node the mutation can apply to.
    pub fn pick_target<R: RandomNumberGenerator>(
        &self,
        rng: &mut R,
        mutation: fn(usize) -> Mutation,
    ) -> Result<Mutation, RngError> {
        let eligible: Vec<usize> = match mutation(0) {
            Mutation::RetypePayload(_) => self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.payload != PayloadSpec::Null)
                .map(|(i, _)| i)
                .collect(),
            _ => (0..self.nodes.len()).collect(),
        };
        if eligible.is_empty() {
            return Err(RngError::EmptyCandidates);
        }
        let pick = rng.next(eligible.len() as u32 - 1)? as usize;
        Ok(mutation(eligible[pick]))
    }

    /// Copy of this blueprint with one node changed.
    pub fn mutated(&self, mutation: Mutation) -> Self {
        let mut copy = self.clone();
        let Some(node) = copy.nodes.get_mut(mutation.node()) else {
            return copy;
        };
        match mutation {
            Mutation::Weight(_) => node.weight += 1,
            Mutation::AppendValue(_) => node.values.push(-1),
            Mutation::RetypePayload(_) => {
                node.payload = match &node.payload {
                    PayloadSpec::Number(n) => PayloadSpec::Text(n.to_string()),
                    PayloadSpec::Text(text) => PayloadSpec::Number(text.len() as i32),
                    PayloadSpec::Null => PayloadSpec::Null,
                }
            }
            Mutation::TogglePayload(_) => {
                node.payload = match node.payload {
                    PayloadSpec::Null => PayloadSpec::Number(0),
                    _ => PayloadSpec::Null,
                }
            }
        }
        copy
    }

    /// Allocates the graph.
    pub fn build(&self) -> BuiltGraph {
        let nodes: Vec<Arc<GraphNode>> = self
            .nodes
            .iter()
            .map(|spec| {
                Arc::new(GraphNode {
                    label: spec.label.clone(),
                    weight: spec.weight,
                    payload: spec.payload.to_value(),
                    values: spec.values.clone(),
                    children: Mutex::new(Vec::new()),
                    link: Mutex::new(None),
                })
            })
            .collect();

        for (spec, node) in self.nodes.iter().zip(&nodes) {
            *locked(&node.children) = spec
                .children
                .iter()
                .map(|&child| Arc::clone(&nodes[child]))
                .collect();
            *locked(&node.link) = spec.link.map(|target| Arc::clone(&nodes[target]));
        }

        BuiltGraph { nodes }
    }
}

/// An allocated graph. Dropping it breaks every edge so cyclic graphs are
/// freed.
pub struct BuiltGraph {
    nodes: Vec<Arc<GraphNode>>,
}

impl BuiltGraph {
    pub fn root(&self) -> Value {
        self.nodes.first().map_or(Value::Null, Value::shared)
    }

    pub fn node(&self, index: usize) -> Option<&Arc<GraphNode>> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Drop for BuiltGraph {
    fn drop(&mut self) {
        for node in &self.nodes {
            locked(&node.children).clear();
            *locked(&node.link) = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRandomNumberGenerator;
    use isomorph_core::{ValidationOptions, Validator};

    fn rng(seed: u64) -> SeededRandomNumberGenerator {
        SeededRandomNumberGenerator::with_seed(seed)
    }

    fn validate(expected: &GraphBlueprint, actual: &GraphBlueprint) -> Result<(), isomorph_core::ValidationError> {
        let (expected, actual) = (expected.build(), actual.build());
        Validator::new(ValidationOptions::default())
            .validate(&expected.root(), &actual.root())
            .map(|_| ())
    }

    #[test]
    fn test_same_seed_same_blueprint() {
        let a = GraphBlueprint::tangled(rng(9), 20).unwrap();
        let b = GraphBlueprint::tangled(rng(9), 20).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tree_shape() {
        let blueprint = GraphBlueprint::tree(rng(4), 25).unwrap();
        let mut parents = vec![0usize; blueprint.len()];
        for node in blueprint.nodes() {
            for &child in &node.children {
                parents[child] += 1;
            }
            assert!(node.link.is_none());
        }
        assert_eq!(parents[0], 0);
        assert!(parents[1..].iter().all(|&p| p == 1));
        assert!(matches!(blueprint.nodes()[0].payload, PayloadSpec::Number(_)));
    }

    #[test]
    fn test_ring_closes() {
        let blueprint = GraphBlueprint::ring(rng(2), 10).unwrap();
        let len = blueprint.len();
        assert!(len >= 2);
        assert_eq!(blueprint.nodes()[len - 1].link, Some(0));
    }

    #[test]
    fn test_chain_length_bounds() {
        let blueprint = GraphBlueprint::chain(rng(2), 40, 60).unwrap();
        assert!((40..=60).contains(&blueprint.len()));
        assert_eq!(blueprint.nodes().last().unwrap().link, None);
    }

    #[test]
    fn test_builds_are_distinct_but_equal() {
        let blueprint = GraphBlueprint::tangled(rng(17), 30).unwrap();
        let (a, b) = (blueprint.build(), blueprint.build());
        assert!(!Arc::ptr_eq(a.node(0).unwrap(), b.node(0).unwrap()));
        assert!(validate(&blueprint, &blueprint).is_ok());
    }

    #[test]
    fn test_shared_nodes_are_shared() {
        let blueprint = GraphBlueprint::from_nodes(vec![
            NodeSpec {
                label: "root".into(),
                weight: 1,
                payload: PayloadSpec::Number(1),
                values: vec![],
                children: vec![1, 1],
                link: None,
            },
            NodeSpec {
                label: "leaf".into(),
                weight: 2,
                payload: PayloadSpec::Null,
                values: vec![3],
                children: vec![],
                link: Some(0),
            },
        ]);
        let graph = blueprint.build();
        let children = locked(&graph.node(0).unwrap().children).clone();
        assert!(Arc::ptr_eq(&children[0], &children[1]));
        let back = locked(&children[0].link).clone().unwrap();
        assert!(Arc::ptr_eq(&back, graph.node(0).unwrap()));
    }

    #[test]
    fn test_drop_unlinks_cycles() {
        let blueprint = GraphBlueprint::ring(rng(5), 6).unwrap();
        let graph = blueprint.build();
        let head = Arc::clone(graph.node(0).unwrap());
        drop(graph);
        assert!(locked(&head.link).is_none());
        assert_eq!(Arc::strong_count(&head), 1);
    }

    #[test]
    fn test_mutations_report_their_kind() {
        let blueprint = GraphBlueprint::tangled(rng(23), 15).unwrap();
        let mut picker = rng(24);
        for make in [
            Mutation::Weight as fn(usize) -> Mutation,
            Mutation::AppendValue,
            Mutation::RetypePayload,
            Mutation::TogglePayload,
        ] {
            let mutation = blueprint.pick_target(&mut picker, make).unwrap();
            let err = validate(&blueprint, &blueprint.mutated(mutation)).unwrap_err();
            assert_eq!(err.report().map(|r| r.kind), Some(mutation.mismatch_kind()), "{mutation:?}");
        }
    }

    #[test]
    fn test_retype_skips_null_payloads() {
        let blueprint = GraphBlueprint::tree(rng(31), 30).unwrap();
        let mut picker = rng(1);
        for _ in 0..20 {
            let mutation = blueprint.pick_target(&mut picker, Mutation::RetypePayload).unwrap();
            assert_ne!(blueprint.nodes()[mutation.node()].payload, PayloadSpec::Null);
        }
    }
}
