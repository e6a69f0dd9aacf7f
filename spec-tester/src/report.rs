//! Console output and the JUnit XML report.
//!
//! Everything here only reads the finished (or in-progress) tree.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use owo_colors::OwoColorize;

use crate::error::RunError;
use crate::group::{Spec, TestCase, TestGroup};
use crate::result::{Outcome, TestResult};

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// Prints group titles and case results as a run progresses.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    enabled: bool,
}

impl Console {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// A console that prints nothing, for tests and embedding.
    pub fn quiet() -> Self {
        Self { enabled: false }
    }

    pub fn group<F>(&self, group: &TestGroup<F>) {
        if self.enabled {
            println!("{}{}", indent(group.level()), group.title());
        }
    }

    pub fn dry_run<F>(&self, case: &TestCase<F>) {
        if self.enabled {
            println!(
                "{}{}: {}",
                indent(case.level() + 1),
                case.seq(),
                case.desc()
            );
        }
    }

    pub fn result<F>(&self, case: &TestCase<F>, result: &TestResult) {
        if !self.enabled {
            return;
        }
        let pad = indent(case.level() + 1);
        let seq = format!("{}:", case.seq());
        match &result.outcome {
            Outcome::Passed => println!(
                "{pad}{} {} {}",
                "✔".green(),
                seq.bright_black(),
                case.desc().bright_black()
            ),
            Outcome::Skipped => println!("{pad}{}", format!("{seq} {}", case.desc()).cyan()),
            Outcome::Failed(mismatch) => {
                self.failure_header(&pad, &seq, case, result);
                println!("{pad}  {}", format!("-> {}", case.requirement()).red());
                for (i, expected) in mismatch.expected.iter().enumerate() {
                    let label = if i == 0 { "Expected: " } else { "          " };
                    println!("{pad}  {}", format!("   {label}{expected}").yellow());
                }
                println!(
                    "{pad}  {}",
                    format!("     Actual: {}", mismatch.actual).green()
                );
            }
            Outcome::Error(msg) => {
                self.failure_header(&pad, &seq, case, result);
                println!("{pad}  {}", format!("Error: {msg}").red());
            }
        }
    }

    fn failure_header<F>(&self, pad: &str, seq: &str, case: &TestCase<F>, result: &TestResult) {
        if let Some(addr) = result.source_addr {
            println!("{pad}{}", format!("using source address {addr}").red());
        }
        println!("{pad}{}", format!("× {seq} {}", case.desc()).red());
    }

    /// Replay every failed case under its group titles.
    pub fn failures<F>(&self, spec: &Spec<F>) {
        if !self.enabled || spec.root().counts().failed == 0 {
            return;
        }
        println!("Failures: \n");
        for group in spec.groups() {
            if group.counts().failed == 0 {
                continue;
            }
            self.group(group);
            for case in group.cases() {
                if let Some(result) = case.result().filter(TestResult::is_failed) {
                    self.result(case, &result);
                }
            }
            println!();
        }
    }

    pub fn summary<F>(&self, spec: &Spec<F>, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        let counts = spec.root().counts();
        println!("Finished in {:.4} seconds", elapsed.as_secs_f64());
        println!(
            "{} tests, {} passed, {} skipped, {} failed",
            counts.total(),
            counts.passed,
            counts.skipped,
            counts.failed
        );
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// JUnit
// =============================================================================

/// Render one `<testsuite>` per group that has at least one result.
pub fn render_junit<F>(spec: &Spec<F>) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites>\n");

    for group in spec.groups() {
        let results: Vec<_> = group
            .cases()
            .iter()
            .filter_map(|case| case.result().map(|result| (case, result)))
            .collect();
        if results.is_empty() {
            continue;
        }

        let mut skipped = 0;
        let mut failures = 0;
        let mut errors = 0;
        let mut body = String::new();
        for (case, result) in &results {
            let _ = write!(
                body,
                "    <testcase package=\"{}\" classname=\"{}\" time=\"{:.4}\"",
                escape(group.path()),
                escape(case.desc()),
                result.duration.as_secs_f64()
            );
            match &result.outcome {
                Outcome::Passed => body.push_str("></testcase>\n"),
                Outcome::Skipped => {
                    skipped += 1;
                    body.push_str(">\n      <skipped></skipped>\n    </testcase>\n");
                }
                Outcome::Failed(mismatch) => {
                    failures += 1;
                    let content = format!(
                        "Expect:\n{}\nActual:\n{}",
                        mismatch.expected.join("\n"),
                        mismatch.actual
                    );
                    let _ = write!(
                        body,
                        ">\n      <failure>{}</failure>\n    </testcase>\n",
                        escape(&content)
                    );
                }
                Outcome::Error(msg) => {
                    errors += 1;
                    let _ = write!(
                        body,
                        ">\n      <error>{}</error>\n    </testcase>\n",
                        escape(msg)
                    );
                }
            }
        }

        let _ = writeln!(
            out,
            "  <testsuite name=\"{}\" package=\"{}\" id=\"{}\" tests=\"{}\" skipped=\"{skipped}\" failures=\"{failures}\" errors=\"{errors}\">",
            escape(&group.title()),
            escape(group.path()),
            escape(group.section()),
            results.len(),
        );
        out.push_str(&body);
        out.push_str("  </testsuite>\n");
    }

    out.push_str("</testsuites>\n");
    out
}

pub fn write_junit<F>(spec: &Spec<F>, path: &Path) -> Result<(), RunError> {
    std::fs::write(path, render_junit(spec)).map_err(|source| RunError::Report {
        path: path.to_path_buf(),
        source,
    })
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Mismatch, TestError};
    use crate::group::GroupBuilder;

    type Noop = fn();

    fn noop() {}

    #[test]
    fn junit_has_one_suite_per_group_with_results() {
        let mut root: GroupBuilder<Noop> = GroupBuilder::root("Proto");
        let mut ping: GroupBuilder<Noop> = GroupBuilder::new("6.7", "PING");
        ping.add_test_case("Sends a PING frame", "r", noop);
        ping.add_test_case("Sends <bad> PING", "r", noop);
        ping.add_test_case("not run", "r", noop);
        root.add_test_group(ping);
        root.add_test_group(GroupBuilder::new("6.8", "GOAWAY"));
        let spec = Spec::build("proto", root);

        let group = spec.groups().find(|g| g.path() == "proto/6.7").unwrap();
        spec.record(&group.cases()[0], TestResult::passed(Duration::from_millis(5)));
        let failed = TestResult::new(
            Err(TestError::Mismatch(Mismatch {
                expected: vec!["GOAWAY Frame (Error Code: PROTOCOL_ERROR)".into()],
                actual: "Timeout".into(),
            })),
            Duration::ZERO,
        )
        .unwrap();
        spec.record(&group.cases()[1], failed);

        let xml = render_junit(&spec);
        assert_eq!(xml.matches("<testsuite ").count(), 1);
        assert!(xml.contains(
            "name=\"6.7. PING\" package=\"proto/6.7\" id=\"6.7\" tests=\"2\" skipped=\"0\" failures=\"1\" errors=\"0\""
        ));
        assert!(xml.contains("classname=\"Sends &lt;bad&gt; PING\""));
        assert!(xml.contains("Actual:\nTimeout</failure>"));
        assert!(!xml.contains("not run"));
    }
}
