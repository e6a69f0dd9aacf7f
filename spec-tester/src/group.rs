//! The test tree.
//!
//! A [`Spec`] is an arena of [`TestGroup`] nodes built once from nested
//! [`GroupBuilder`]s. Groups point at their parent by [`GroupId`], which is
//! what result accounting walks upwards. Each group keeps its own
//! passed/failed/skipped counters behind a lock, so listener tasks of the
//! server harness can record results concurrently.
//!
//! The tree is generic over the scenario type `F`: the client driver and
//! the server harness hang different function signatures off the same
//! structure.

use parking_lot::Mutex;

use crate::config::Config;
use crate::result::{TestResult, Verdict};
use crate::target::RunMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaseId {
    group: GroupId,
    index: usize,
}

impl CaseId {
    pub fn group(&self) -> GroupId {
        self.group
    }
}

/// Recursive result totals of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    fn apply(&mut self, verdict: Verdict, delta: isize) {
        let slot = match verdict {
            Verdict::Passed => &mut self.passed,
            Verdict::Failed => &mut self.failed,
            Verdict::Skipped => &mut self.skipped,
        };
        *slot = slot.saturating_add_signed(delta);
    }
}

// =============================================================================
// Construction
// =============================================================================

struct CaseDef<F> {
    desc: String,
    requirement: String,
    strict: bool,
    run: F,
}

/// Describes one group and everything below it, before the tree is frozen.
pub struct GroupBuilder<F> {
    section: String,
    name: String,
    strict: bool,
    groups: Vec<GroupBuilder<F>>,
    cases: Vec<CaseDef<F>>,
}

impl<F> GroupBuilder<F> {
    pub fn new(section: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
            strict: false,
            groups: Vec::new(),
            cases: Vec::new(),
        }
    }

    /// The root of a document: no section number.
    pub fn root(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    /// Mark the group, and so everything below it, as strict-only.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Append a child group.
    ///
    /// # Panics
    ///
    /// Panics if a sibling with the same section number was already added.
    pub fn add_test_group(&mut self, group: GroupBuilder<F>) {
        assert!(
            self.groups.iter().all(|g| g.section != group.section),
            "duplicate section {} under {}",
            group.section,
            self.name
        );
        self.groups.push(group);
    }

    pub fn add_test_case(&mut self, desc: &str, requirement: &str, run: F) {
        self.push_case(desc, requirement, false, run);
    }

    /// Add a case that only runs in strict mode.
    pub fn add_strict_test_case(&mut self, desc: &str, requirement: &str, run: F) {
        self.push_case(desc, requirement, true, run);
    }

    fn push_case(&mut self, desc: &str, requirement: &str, strict: bool, run: F) {
        self.cases.push(CaseDef {
            desc: desc.to_string(),
            requirement: requirement.to_string(),
            strict,
            run,
        });
    }
}

// =============================================================================
// The frozen tree
// =============================================================================

pub struct TestCase<F> {
    id: CaseId,
    desc: String,
    requirement: String,
    strict: bool,
    level: usize,
    path: String,
    run: F,
    result: Mutex<Option<TestResult>>,
}

impl<F> TestCase<F> {
    pub fn id(&self) -> CaseId {
        self.id
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Level of the owning group.
    pub fn level(&self) -> usize {
        self.level
    }

    /// `<group id>/<seq>`, with `seq` counted from 1 over normal cases
    /// followed by strict-only ones.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn seq(&self) -> usize {
        self.id.index + 1
    }

    pub fn result(&self) -> Option<TestResult> {
        self.result.lock().clone()
    }
}

impl<F: Copy> TestCase<F> {
    pub fn run(&self) -> F {
        self.run
    }
}

pub struct TestGroup<F> {
    id: GroupId,
    key: String,
    section: String,
    name: String,
    strict: bool,
    path: String,
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    /// Normal cases first, then strict-only ones.
    cases: Vec<TestCase<F>>,
    normal_len: usize,
    counts: Mutex<Counts>,
}

impl<F> TestGroup<F> {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// `key` at the root, `key/section` below it.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn title(&self) -> String {
        if self.is_root() {
            self.name.clone()
        } else {
            format!("{}. {}", self.section, self.name)
        }
    }

    /// Number of dotted components in the section; 0 at the root.
    pub fn level(&self) -> usize {
        if self.section.is_empty() {
            0
        } else {
            self.section.split('.').count()
        }
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn tests(&self) -> &[TestCase<F>] {
        &self.cases[..self.normal_len]
    }

    pub fn strict_tests(&self) -> &[TestCase<F>] {
        &self.cases[self.normal_len..]
    }

    /// All cases in sequence order.
    pub fn cases(&self) -> &[TestCase<F>] {
        &self.cases
    }

    pub fn counts(&self) -> Counts {
        *self.counts.lock()
    }
}

/// A group together with the cases of it that a run will execute.
pub struct Selected<'a, F> {
    pub group: &'a TestGroup<F>,
    pub cases: Vec<&'a TestCase<F>>,
}

/// One document's test tree.
pub struct Spec<F> {
    groups: Vec<TestGroup<F>>,
}

impl<F> Spec<F> {
    pub fn build(key: &str, root: GroupBuilder<F>) -> Self {
        let mut spec = Self { groups: Vec::new() };
        spec.insert(key, root, None, false);
        spec
    }

    fn insert(
        &mut self,
        key: &str,
        builder: GroupBuilder<F>,
        parent: Option<GroupId>,
        inherited_strict: bool,
    ) -> GroupId {
        let id = GroupId(self.groups.len());
        let strict = inherited_strict || builder.strict;
        let path = if builder.section.is_empty() {
            key.to_string()
        } else {
            format!("{key}/{}", builder.section)
        };
        let level = if builder.section.is_empty() {
            0
        } else {
            builder.section.split('.').count()
        };

        let (strict_only, normal): (Vec<_>, Vec<_>) = builder
            .cases
            .into_iter()
            .partition(|def| strict || def.strict);
        let normal_len = normal.len();
        let cases = normal
            .into_iter()
            .chain(strict_only)
            .enumerate()
            .map(|(index, def)| TestCase {
                id: CaseId { group: id, index },
                path: format!("{path}/{}", index + 1),
                strict: strict || def.strict,
                level,
                desc: def.desc,
                requirement: def.requirement,
                run: def.run,
                result: Mutex::new(None),
            })
            .collect();

        self.groups.push(TestGroup {
            id,
            key: key.to_string(),
            section: builder.section,
            name: builder.name,
            strict,
            path,
            parent,
            children: Vec::new(),
            cases,
            normal_len,
            counts: Mutex::new(Counts::default()),
        });

        for child in builder.groups {
            let child_id = self.insert(key, child, Some(id), strict);
            self.groups[id.0].children.push(child_id);
        }
        id
    }

    pub fn root(&self) -> &TestGroup<F> {
        &self.groups[0]
    }

    pub fn group(&self, id: GroupId) -> &TestGroup<F> {
        &self.groups[id.0]
    }

    pub fn case(&self, id: CaseId) -> &TestCase<F> {
        &self.groups[id.group.0].cases[id.index]
    }

    /// Every group, depth first in document order.
    pub fn groups(&self) -> impl Iterator<Item = &TestGroup<F>> {
        let mut out = Vec::with_capacity(self.groups.len());
        self.walk(|group| {
            out.push(group);
            true
        });
        out.into_iter()
    }

    /// Visit groups depth first in document order. Returning `false` from
    /// `visit` skips that group's subtree.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a TestGroup<F>) -> bool) {
        let mut stack = vec![GroupId(0)];
        while let Some(id) = stack.pop() {
            let group = self.group(id);
            if visit(group) {
                stack.extend(group.children.iter().rev());
            }
        }
    }

    /// The groups a run enters and the cases it executes in each.
    ///
    /// A group resolved as `None`, or a strict group outside strict mode,
    /// prunes its subtree. Under `Group`, own cases are still resolved one
    /// by one so that a selector naming a single case runs just that case.
    pub fn select(&self, config: &Config) -> Vec<Selected<'_, F>> {
        let mut selected = Vec::new();
        self.walk(|group| {
            if group.strict && !config.strict {
                return false;
            }
            let mode = config.run_mode(group.path());
            if mode == RunMode::None {
                return false;
            }
            let cases = group
                .cases
                .iter()
                .filter(|case| config.strict || !case.strict)
                .filter(|case| mode == RunMode::All || config.run_mode(case.path()) == RunMode::All)
                .collect();
            selected.push(Selected { group, cases });
            true
        });
        selected
    }

    /// Store `result` for `case`, replacing any earlier one, and fold it into
    /// the counters of every ancestor group.
    ///
    /// The case's own lock is held for the whole update, so two results for
    /// the same case can never both be added.
    pub fn record(&self, case: &TestCase<F>, result: TestResult) {
        let mut slot = case.result.lock();
        if let Some(previous) = slot.as_ref() {
            self.propagate(case.id.group, previous.verdict(), -1);
        }
        self.propagate(case.id.group, result.verdict(), 1);
        *slot = Some(result);
    }

    fn propagate(&self, from: GroupId, verdict: Verdict, delta: isize) {
        let mut next = Some(from);
        while let Some(id) = next {
            let group = self.group(id);
            group.counts.lock().apply(verdict, delta);
            next = group.parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{Mismatch, TestError};
    use crate::target::Targets;

    type Noop = fn();

    fn noop() {}

    fn tree() -> Spec<Noop> {
        let mut root: GroupBuilder<Noop> = GroupBuilder::root("Proto");

        let mut frames: GroupBuilder<Noop> = GroupBuilder::new("6", "Frames");
        let mut data: GroupBuilder<Noop> = GroupBuilder::new("6.1", "DATA");
        data.add_test_case("a", "r", noop);
        data.add_test_case("b", "r", noop);
        data.add_strict_test_case("c", "r", noop);
        frames.add_test_group(data);
        let mut settings: GroupBuilder<Noop> = GroupBuilder::new("6.5", "SETTINGS");
        settings.add_test_case("d", "r", noop);
        frames.add_test_group(settings);
        let mut lax: GroupBuilder<Noop> = GroupBuilder::new("6.6", "Lax").strict();
        lax.add_test_case("e", "r", noop);
        frames.add_test_group(lax);

        root.add_test_case("top", "r", noop);
        root.add_test_group(frames);
        Spec::build("proto", root)
    }

    #[test]
    #[should_panic(expected = "duplicate section 6.1")]
    fn duplicate_section_is_rejected() {
        let mut frames: GroupBuilder<Noop> = GroupBuilder::new("6", "Frames");
        frames.add_test_group(GroupBuilder::new("6.1", "DATA"));
        frames.add_test_group(GroupBuilder::new("6.1", "DATA again"));
    }

    fn config(selectors: &[&str], strict: bool) -> Config {
        Config {
            targets: Targets::new(selectors).unwrap(),
            strict,
            ..Config::default()
        }
    }

    fn passed() -> TestResult {
        TestResult::passed(Duration::ZERO)
    }

    fn failed() -> TestResult {
        TestResult::new(
            Err(TestError::Mismatch(Mismatch {
                expected: vec!["x".into()],
                actual: "y".into(),
            })),
            Duration::ZERO,
        )
        .unwrap()
    }

    fn find<'a>(spec: &'a Spec<Noop>, path: &str) -> &'a TestGroup<Noop> {
        spec.groups().find(|g| g.path() == path).unwrap()
    }

    #[test]
    fn ids_titles_and_levels() {
        let spec = tree();
        assert_eq!(spec.root().path(), "proto");
        assert_eq!(spec.root().title(), "Proto");
        assert_eq!(spec.root().level(), 0);

        let data = find(&spec, "proto/6.1");
        assert_eq!(data.title(), "6.1. DATA");
        assert_eq!(data.level(), 2);
        assert_eq!(spec.group(data.parent().unwrap()).path(), "proto/6");
    }

    #[test]
    fn strict_cases_are_numbered_after_normal_ones() {
        let spec = tree();
        let data = find(&spec, "proto/6.1");
        assert_eq!(data.tests().len(), 2);
        assert_eq!(data.strict_tests().len(), 1);
        let paths: Vec<_> = data.cases().iter().map(|c| c.path()).collect();
        assert_eq!(paths, ["proto/6.1/1", "proto/6.1/2", "proto/6.1/3"]);
        assert_eq!(data.strict_tests()[0].desc(), "c");
    }

    #[test]
    fn strict_flag_is_inherited() {
        let spec = tree();
        let lax = find(&spec, "proto/6.6");
        assert!(lax.is_strict());
        assert!(lax.tests().is_empty());
        assert!(lax.strict_tests()[0].is_strict());
    }

    #[test]
    fn groups_are_walked_in_document_order() {
        let spec = tree();
        let paths: Vec<_> = spec.groups().map(|g| g.path().to_string()).collect();
        assert_eq!(
            paths,
            ["proto", "proto/6", "proto/6.1", "proto/6.5", "proto/6.6"]
        );
    }

    #[test]
    fn selection_without_strict_skips_strict_cases_and_groups() {
        let spec = tree();
        let selected = spec.select(&config(&[], false));
        let descs: Vec<_> = selected
            .iter()
            .flat_map(|s| s.cases.iter().map(|c| c.desc()))
            .collect();
        assert_eq!(descs, ["top", "a", "b", "d"]);
        assert!(selected.iter().all(|s| s.group.path() != "proto/6.6"));
    }

    #[test]
    fn selection_with_strict_includes_everything() {
        let spec = tree();
        let selected = spec.select(&config(&[], true));
        let count: usize = selected.iter().map(|s| s.cases.len()).sum();
        assert_eq!(count, 6);
    }

    #[test]
    fn selecting_a_section_enters_ancestors_without_running_them() {
        let spec = tree();
        let selected = spec.select(&config(&["proto/6.5"], false));
        let entered: Vec<_> = selected.iter().map(|s| s.group.path()).collect();
        assert_eq!(entered, ["proto", "proto/6", "proto/6.5"]);
        assert!(selected[0].cases.is_empty());
        assert_eq!(selected[2].cases.len(), 1);
    }

    #[test]
    fn selecting_one_case_runs_only_that_case() {
        let spec = tree();
        let selected = spec.select(&config(&["proto/6.1/2"], false));
        let data = selected.iter().find(|s| s.group.path() == "proto/6.1").unwrap();
        let descs: Vec<_> = data.cases.iter().map(|c| c.desc()).collect();
        assert_eq!(descs, ["b"]);
    }

    #[test]
    fn counters_sum_over_children_and_own_cases() {
        let spec = tree();
        let data = find(&spec, "proto/6.1");
        let settings = find(&spec, "proto/6.5");
        spec.record(&data.cases()[0], passed());
        spec.record(&data.cases()[1], failed());
        spec.record(&settings.cases()[0], passed());
        spec.record(&spec.root().cases()[0], failed());

        assert_eq!(
            data.counts(),
            Counts {
                passed: 1,
                failed: 1,
                skipped: 0
            }
        );
        assert_eq!(find(&spec, "proto/6").counts().total(), 3);
        assert_eq!(
            spec.root().counts(),
            Counts {
                passed: 2,
                failed: 2,
                skipped: 0
            }
        );

        for group in spec.groups() {
            let own = group.cases().iter().filter(|c| c.result().is_some()).count();
            let children: usize = group
                .children()
                .iter()
                .map(|id| spec.group(*id).counts().total())
                .sum();
            assert_eq!(group.counts().total(), own + children, "{}", group.path());
        }
    }

    #[test]
    fn re_recording_replaces_the_previous_result() {
        let spec = tree();
        let case = &find(&spec, "proto/6.5").cases()[0];
        spec.record(case, failed());
        spec.record(case, passed());
        spec.record(case, passed());

        assert_eq!(
            spec.root().counts(),
            Counts {
                passed: 1,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(case.result().unwrap().verdict(), Verdict::Passed);
    }

    #[test]
    fn concurrent_recording_loses_no_updates() {
        let spec = std::sync::Arc::new(tree());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let spec = spec.clone();
                std::thread::spawn(move || {
                    let group = if i % 2 == 0 { "proto/6.1" } else { "proto/6.5" };
                    let group = spec.groups().find(|g| g.path() == group).unwrap();
                    for case in group.tests() {
                        spec.record(case, if i % 3 == 0 { failed() } else { passed() });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // Three cases have results, however many times each was recorded.
        assert_eq!(spec.root().counts().total(), 3);
        assert_eq!(find(&spec, "proto/6").counts().total(), 3);
    }
}
