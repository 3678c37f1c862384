//! Hierarchical match counters for simulation runs.
//!
//! A statistic is either a leaf with a predicate over a source sample or a
//! group of child statistics. Every node counts the samples it matched. An
//! exclusive group requires that at most one child matches a given sample;
//! a non-exclusive group accepts any number.

use crate::error::StatisticsError;
use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;

pub type StatisticPredicate<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;

/// Returns `true` for children that must not be added to a group.
pub type ChildFilter<S> = Box<dyn Fn(&TestStatistic<S>) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    Exclusive,
    NonExclusive,
}

enum StatisticKind<S> {
    Leaf(StatisticPredicate<S>),
    Group {
        kind: GroupKind,
        filter: Option<ChildFilter<S>>,
        children: Vec<TestStatistic<S>>,
    },
}

pub struct TestStatistic<S> {
    name: String,
    counter: u64,
    kind: StatisticKind<S>,
}

impl<S> TestStatistic<S> {
    pub fn leaf<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            counter: 0,
            kind: StatisticKind::Leaf(Box::new(predicate)),
        }
    }

    pub fn exclusive(name: impl Into<String>) -> Self {
        Self::group(name, GroupKind::Exclusive)
    }

    pub fn non_exclusive(name: impl Into<String>) -> Self {
        Self::group(name, GroupKind::NonExclusive)
    }

    fn group(name: impl Into<String>, kind: GroupKind) -> Self {
        Self {
            name: name.into(),
            counter: 0,
            kind: StatisticKind::Group {
                kind,
                filter: None,
                children: Vec::new(),
            },
        }
    }

    /// Sets the filter consulted by later `add_child` calls. No effect on a leaf.
    pub fn with_child_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&TestStatistic<S>) -> bool + Send + Sync + 'static,
    {
        if let StatisticKind::Group { filter: slot, .. } = &mut self.kind {
            *slot = Some(Box::new(filter));
        }
        self
    }

    pub fn with_child(mut self, child: TestStatistic<S>) -> Result<Self, StatisticsError> {
        self.add_child(child)?;
        Ok(self)
    }

    /// Adds a child unless the group's filter rejects it. Returns whether
    /// the child was added.
    pub fn add_child(&mut self, child: TestStatistic<S>) -> Result<bool, StatisticsError> {
        match &mut self.kind {
            StatisticKind::Leaf(_) => Err(StatisticsError::NotAGroup(self.name.clone())),
            StatisticKind::Group {
                filter, children, ..
            } => {
                if filter.as_ref().is_some_and(|filtered_out| filtered_out(&child)) {
                    return Ok(false);
                }
                children.push(child);
                Ok(true)
            }
        }
    }

    /// Offers a sample to this statistic and its children.
    pub fn update(&mut self, source: &S) -> Result<bool, StatisticsError> {
        let matched = match &mut self.kind {
            StatisticKind::Leaf(predicate) => predicate(source),
            StatisticKind::Group {
                kind: GroupKind::NonExclusive,
                children,
                ..
            } => {
                let mut any = false;
                for child in children.iter_mut() {
                    any |= child.update(source)?;
                }
                any
            }
            StatisticKind::Group {
                kind: GroupKind::Exclusive,
                children,
                ..
            } => {
                let mut first: Option<usize> = None;
                for i in 0..children.len() {
                    if !children[i].update(source)? {
                        continue;
                    }
                    if let Some(previous) = first {
                        return Err(StatisticsError::ExclusiveConflict {
                            group: self.name.clone(),
                            first: children[previous].name.clone(),
                            second: children[i].name.clone(),
                        });
                    }
                    first = Some(i);
                }
                first.is_some()
            }
        };

        if matched {
            self.counter += 1;
        }
        Ok(matched)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        match &self.kind {
            StatisticKind::Leaf(_) => None,
            StatisticKind::Group { kind, .. } => Some(*kind),
        }
    }

    pub fn is_group(&self) -> bool {
        self.group_kind().is_some()
    }

    pub fn children(&self) -> &[TestStatistic<S>] {
        match &self.kind {
            StatisticKind::Leaf(_) => &[],
            StatisticKind::Group { children, .. } => children,
        }
    }

    fn walk_inner<F>(&self, depth: usize, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&TestStatistic<S>, usize) -> ControlFlow<()>,
    {
        visit(self, depth)?;
        for child in self.children() {
            child.walk_inner(depth + 1, visit)?;
        }
        ControlFlow::Continue(())
    }

    fn snapshot(&self, parent_counter: u64) -> StatisticSnapshot {
        StatisticSnapshot {
            name: self.name.clone(),
            kind: match self.group_kind() {
                None => "leaf",
                Some(GroupKind::Exclusive) => "exclusive",
                Some(GroupKind::NonExclusive) => "non_exclusive",
            },
            counter: self.counter,
            percentage: percentage(self.counter, parent_counter),
            children: self
                .children()
                .iter()
                .map(|child| child.snapshot(self.counter))
                .collect(),
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize, parent_counter: u64) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}[{}] {} ({:.2}%)",
            "",
            self.name,
            self.counter,
            percentage(self.counter, parent_counter),
            indent = depth * 2
        )?;
        for child in self.children() {
            child.fmt_tree(f, depth + 1, self.counter)?;
        }
        Ok(())
    }
}

impl<S> fmt::Debug for TestStatistic<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStatistic")
            .field("name", &self.name)
            .field("counter", &self.counter)
            .field("group", &self.group_kind())
            .field("children", &self.children())
            .finish()
    }
}

/// Named root of a statistics tree.
pub struct TestStatistics<S> {
    name: String,
    counter: u64,
    statistics: Vec<TestStatistic<S>>,
}

impl<S> TestStatistics<S> {
    pub fn new(name: impl Into<String>, statistics: impl IntoIterator<Item = TestStatistic<S>>) -> Self {
        Self {
            name: name.into(),
            counter: 0,
            statistics: statistics.into_iter().collect(),
        }
    }

    /// Counts the sample and offers it to every top-level statistic.
    pub fn update(&mut self, source: &S) -> Result<(), StatisticsError> {
        self.counter += 1;
        for statistic in &mut self.statistics {
            statistic.update(source)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn statistics(&self) -> &[TestStatistic<S>] {
        &self.statistics
    }

    /// Depth-first pre-order walk; `visit` stops it with `Break`.
    pub fn walk<F>(&self, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(&TestStatistic<S>, usize) -> ControlFlow<()>,
    {
        for statistic in &self.statistics {
            statistic.walk_inner(0, &mut visit)?;
        }
        ControlFlow::Continue(())
    }

    /// Looks a statistic up by the names from the root down.
    pub fn find(&self, path: &[&str]) -> Option<&TestStatistic<S>> {
        let (first, rest) = path.split_first()?;
        let mut current = self.statistics.iter().find(|s| s.name == *first)?;
        for name in rest {
            current = current.children().iter().find(|s| s.name == *name)?;
        }
        Some(current)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            name: self.name.clone(),
            counter: self.counter,
            statistics: self
                .statistics
                .iter()
                .map(|s| s.snapshot(self.counter))
                .collect(),
        }
    }
}

impl<S> fmt::Display for TestStatistics<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.name, self.counter)?;
        for statistic in &self.statistics {
            statistic.fmt_tree(f, 1, self.counter)?;
        }
        Ok(())
    }
}

impl<S> fmt::Debug for TestStatistics<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStatistics")
            .field("name", &self.name)
            .field("counter", &self.counter)
            .field("statistics", &self.statistics)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub name: String,
    pub counter: u64,
    pub statistics: Vec<StatisticSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticSnapshot {
    pub name: String,
    pub kind: &'static str,
    pub counter: u64,
    /// Share of the parent's counter, 0 when the parent never counted.
    pub percentage: f64,
    pub children: Vec<StatisticSnapshot>,
}

/// Renders a name path as `[a]=>[b]`.
pub fn statistic_path<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(|name| format!("[{name}]"))
        .collect::<Vec<_>>()
        .join("=>")
}

fn percentage(counter: u64, parent_counter: u64) -> f64 {
    if parent_counter == 0 {
        0.0
    } else {
        counter as f64 * 100.0 / parent_counter as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parity() -> TestStatistic<u32> {
        TestStatistic::exclusive("parity")
            .with_child(TestStatistic::leaf("even", |n: &u32| n % 2 == 0))
            .unwrap()
            .with_child(TestStatistic::leaf("odd", |n: &u32| n % 2 == 1))
            .unwrap()
    }

    fn tags() -> TestStatistic<u32> {
        TestStatistic::non_exclusive("tags")
            .with_child(TestStatistic::leaf("small", |n: &u32| *n < 10))
            .unwrap()
            .with_child(TestStatistic::leaf("multiple_of_3", |n: &u32| n % 3 == 0))
            .unwrap()
    }

    #[test]
    fn test_counters_follow_matches() {
        let mut stats = TestStatistics::new("numbers", [parity(), tags()]);
        for n in [1u32, 2, 3, 12, 30] {
            stats.update(&n).unwrap();
        }
        assert_eq!(stats.counter(), 5);
        assert_eq!(stats.find(&["parity"]).unwrap().counter(), 5);
        assert_eq!(stats.find(&["parity", "even"]).unwrap().counter(), 3);
        assert_eq!(stats.find(&["parity", "odd"]).unwrap().counter(), 2);
        assert_eq!(stats.find(&["tags"]).unwrap().counter(), 4);
        assert_eq!(stats.find(&["tags", "small"]).unwrap().counter(), 3);
        assert_eq!(stats.find(&["tags", "multiple_of_3"]).unwrap().counter(), 3);
        assert!(stats.find(&["tags", "missing"]).is_none());
        assert!(stats.find(&[]).is_none());
    }

    #[test]
    fn test_exclusive_conflict() {
        let mut group = TestStatistic::exclusive("overlap")
            .with_child(TestStatistic::leaf("positive", |n: &i32| *n > 0))
            .unwrap()
            .with_child(TestStatistic::leaf("even", |n: &i32| n % 2 == 0))
            .unwrap();

        assert!(group.update(&3).unwrap());
        let err = group.update(&4).unwrap_err();
        assert_eq!(
            err,
            StatisticsError::ExclusiveConflict {
                group: "overlap".into(),
                first: "positive".into(),
                second: "even".into(),
            }
        );
        assert_eq!(group.counter(), 1);
        // Children that ran before the conflict keep their counts
        assert_eq!(group.children()[0].counter(), 2);
        assert_eq!(group.children()[1].counter(), 1);
    }

    #[test]
    fn test_child_filter_applies_at_insertion() {
        let mut group = TestStatistic::<u32>::non_exclusive("filtered")
            .with_child_filter(|child| child.name().starts_with('_'));
        assert!(group.add_child(TestStatistic::leaf("kept", |_| true)).unwrap());
        assert!(!group.add_child(TestStatistic::leaf("_hidden", |_| true)).unwrap());
        assert_eq!(group.children().len(), 1);
    }

    #[test]
    fn test_leaf_rejects_children() {
        let mut leaf = TestStatistic::<u32>::leaf("leaf", |_| true);
        assert_eq!(
            leaf.add_child(TestStatistic::leaf("x", |_| true)),
            Err(StatisticsError::NotAGroup("leaf".into()))
        );
    }

    #[test]
    fn test_walk_stops_early() {
        let stats = TestStatistics::new("numbers", [parity(), tags()]);
        let mut seen = Vec::new();
        let flow = stats.walk(|statistic, depth| {
            seen.push((statistic.name().to_string(), depth));
            if statistic.name() == "odd" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(
            seen,
            vec![
                ("parity".to_string(), 0),
                ("even".to_string(), 1),
                ("odd".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_display_shows_percentages() {
        let mut stats = TestStatistics::new("numbers", [parity()]);
        for n in [1u32, 2, 4, 6] {
            stats.update(&n).unwrap();
        }
        let text = stats.to_string();
        assert!(text.starts_with("numbers: 4\n"));
        assert!(text.contains("  [parity] 4 (100.00%)\n"));
        assert!(text.contains("    [even] 3 (75.00%)\n"));
        assert!(text.contains("    [odd] 1 (25.00%)\n"));
    }

    #[test]
    fn test_snapshot_with_empty_parent() {
        let stats = TestStatistics::new("numbers", [parity()]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.statistics[0].percentage, 0.0);
        assert_eq!(snapshot.statistics[0].kind, "exclusive");
        assert_eq!(snapshot.statistics[0].children[1].kind, "leaf");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["statistics"][0]["children"][0]["name"], "even");
    }

    #[test]
    fn test_statistic_path() {
        assert_eq!(statistic_path(["parity", "even"]), "[parity]=>[even]");
        assert_eq!(statistic_path(std::iter::empty()), "");
    }
}
