//! Path selectors and the three-valued run decision.
//!
//! A selector looks like `http2`, `http2/6.5`, `http2/6.5.3` or
//! `http2/6.5/2`: a key, an optional dotted section and an optional case
//! index. Each path is broken into typed segments so that a case index never
//! compares equal to a section component.

use std::fmt;

/// What to do with one node of the test tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunMode {
    /// Skip the node and everything below it.
    None,
    /// Skip the node's own cases but descend into its children.
    Group,
    /// Run the node's own cases and descend.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Section(String),
    Case(u32),
}

/// A selector that does not have the `key[/section[/case]]` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSelector(pub String);

impl fmt::Display for InvalidSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid test path `{}` (expected <key>[/<section>[/<case>]])",
            self.0
        )
    }
}

impl std::error::Error for InvalidSelector {}

/// The configured selectors, parsed once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    selectors: Vec<Vec<Segment>>,
}

impl Targets {
    pub fn new<I, S>(selectors: I) -> Result<Self, InvalidSelector>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selectors = selectors
            .into_iter()
            .map(|s| segments(s.as_ref()).ok_or_else(|| InvalidSelector(s.as_ref().to_string())))
            .collect::<Result<_, _>>()?;
        Ok(Self { selectors })
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Decide how to treat the node at `path`.
    ///
    /// The broadest contribution wins: `All` over `Group` over `None`.
    pub fn run_mode(&self, path: &str) -> RunMode {
        if self.selectors.is_empty() {
            return RunMode::All;
        }
        let Some(candidate) = segments(path) else {
            return RunMode::None;
        };
        self.selectors
            .iter()
            .map(|selector| contribution(&candidate, selector))
            .max()
            .unwrap_or(RunMode::None)
    }
}

fn contribution(candidate: &[Segment], selector: &[Segment]) -> RunMode {
    if candidate.starts_with(selector) {
        RunMode::All
    } else if selector.starts_with(candidate) {
        RunMode::Group
    } else {
        RunMode::None
    }
}

fn segments(path: &str) -> Option<Vec<Segment>> {
    let mut parts = path.split('/');
    let key = parts.next().filter(|key| !key.is_empty())?;
    let mut segments = vec![Segment::Key(key.to_string())];

    if let Some(section) = parts.next() {
        for component in section.split('.') {
            if component.is_empty() {
                return None;
            }
            segments.push(Segment::Section(component.to_string()));
        }
        if let Some(case) = parts.next() {
            segments.push(Segment::Case(case.parse().ok()?));
        }
    }

    if parts.next().is_some() {
        return None;
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(selectors: &[&str]) -> Targets {
        Targets::new(selectors).unwrap()
    }

    #[test]
    fn empty_selection_runs_everything() {
        let t = targets(&[]);
        for path in ["proto", "proto/5.1", "other/1/3"] {
            assert_eq!(t.run_mode(path), RunMode::All);
        }
    }

    #[test]
    fn selecting_a_key_runs_its_sections() {
        assert_eq!(targets(&["proto"]).run_mode("proto/5.1"), RunMode::All);
    }

    #[test]
    fn selecting_a_section_descends_through_ancestors() {
        let t = targets(&["proto/5.1"]);
        assert_eq!(t.run_mode("proto"), RunMode::Group);
        assert_eq!(t.run_mode("proto/5"), RunMode::Group);
        assert_eq!(t.run_mode("proto/5.1"), RunMode::All);
        assert_eq!(t.run_mode("proto/5.1.2"), RunMode::All);
        assert_eq!(t.run_mode("proto/5.2"), RunMode::None);
        assert_eq!(t.run_mode("other"), RunMode::None);
    }

    #[test]
    fn case_index_is_its_own_segment() {
        let t = targets(&["proto/6.5/2"]);
        assert_eq!(t.run_mode("proto/6.5"), RunMode::Group);
        assert_eq!(t.run_mode("proto/6.5/2"), RunMode::All);
        assert_eq!(t.run_mode("proto/6.5/1"), RunMode::None);
        // "6.5.2" is a subsection, not case 2 of 6.5.
        assert_eq!(t.run_mode("proto/6.5.2"), RunMode::None);
    }

    #[test]
    fn broadest_selector_wins() {
        let t = targets(&["proto/5.1", "proto"]);
        assert_eq!(t.run_mode("proto"), RunMode::All);
        assert_eq!(t.run_mode("proto/6"), RunMode::All);

        let t = targets(&["proto/5.1", "other/3"]);
        assert_eq!(t.run_mode("proto"), RunMode::Group);
        assert_eq!(t.run_mode("other/3.1"), RunMode::All);
        assert_eq!(t.run_mode("other/4"), RunMode::None);
    }

    #[test]
    fn resolution_is_repeatable() {
        let t = targets(&["proto/5.1", "proto/6"]);
        for path in ["proto", "proto/5", "proto/6.1/2", "x"] {
            assert_eq!(t.run_mode(path), t.run_mode(path));
        }
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for bad in ["", "/5.1", "proto/5..1", "proto/5.1/x", "proto/5/1/2"] {
            assert_eq!(
                Targets::new([bad]),
                Err(InvalidSelector(bad.to_string())),
                "{bad:?}"
            );
        }
    }
}
