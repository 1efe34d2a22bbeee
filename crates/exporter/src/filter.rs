//! Include/exclude filtering of metric names.
//!
//! A [`FilterRule`] is compiled once per device configuration and shared read-only by
//! every collector of a scrape. Patterns are unanchored regular expressions matched
//! against the bare metric name (e.g. `volume_size`, without the namespace prefix).

use core::error::Error;

use error_stack::Report;
use error_stack::ResultExt;
use regex::Regex;

/// Which list a pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PatternList {
    #[display("include")]
    Include,
    #[display("exclude")]
    Exclude,
}

#[derive(Debug, derive_more::Display)]
pub enum FilterError {
    #[display("Invalid {list} pattern `{pattern}`")]
    InvalidPattern { pattern: String, list: PatternList },
}

impl Error for FilterError {}

/// Compiled include/exclude patterns
#[derive(Debug, Clone, Default)]
pub struct FilterRule {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl FilterRule {
    /// A rule that accepts every name
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Compile both pattern lists.
    ///
    /// # Errors
    ///
    /// - [`FilterError::InvalidPattern`] for the first pattern that is not a valid regex
    pub fn compile<S: AsRef<str>>(
        include: &[S],
        exclude: &[S],
    ) -> Result<Self, Report<FilterError>> {
        Ok(Self {
            include: compile_list(include, PatternList::Include)?,
            exclude: compile_list(exclude, PatternList::Exclude)?,
        })
    }

    /// Decide whether `name` is published.
    ///
    /// An empty include list admits everything; exclusion always overrides inclusion.
    pub fn accept(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(name)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(name))
    }

    pub fn is_allow_all(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn compile_list<S: AsRef<str>>(
    patterns: &[S],
    list: PatternList,
) -> Result<Vec<Regex>, Report<FilterError>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(pattern).change_context(FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                list,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    const NAMES: &[&str] = &[
        "volume_size",
        "volume_size_used_by_snapshots",
        "aggr_size",
        "perf_system_node_cpu_busy",
        "",
    ];

    fn rule(include: &[&str], exclude: &[&str]) -> FilterRule {
        FilterRule::compile(include, exclude).expect("patterns should compile")
    }

    #[test]
    fn empty_rule_accepts_everything() {
        let rule = rule(&[], &[]);
        assert!(rule.is_allow_all());
        for name in NAMES {
            assert!(rule.accept(name), "{name} should be accepted");
        }
    }

    #[test]
    fn include_prefix_rejects_other_subsystems() {
        let rule = rule(&["^volume_"], &[]);
        assert!(rule.accept("volume_size"));
        assert!(!rule.accept("aggr_size"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let rule = rule(&["^volume_"], &["_used_by_snapshots$"]);
        assert!(rule.accept("volume_size"));
        assert!(!rule.accept("volume_size_used_by_snapshots"));
    }

    #[test]
    fn exclude_only_rule() {
        let rule = rule(&[], &["^perf_"]);
        assert!(rule.accept("volume_size"));
        assert!(!rule.accept("perf_system_node_cpu_busy"));
    }

    #[test]
    fn patterns_are_unanchored_search() {
        let rule = rule(&["size"], &[]);
        assert!(rule.accept("volume_size_total"));
        assert!(rule.accept("aggr_size"));
        assert!(!rule.accept("volume_state"));
    }

    #[test]
    fn any_include_pattern_is_enough() {
        let rule = rule(&["^lun_", "^disk_"], &[]);
        assert!(rule.accept("lun_size"));
        assert!(rule.accept("disk_state"));
        assert!(!rule.accept("volume_state"));
    }

    #[test]
    fn invalid_pattern_is_rejected_with_its_list() {
        let err = FilterRule::compile(&["^volume_"], &["(unclosed"]).expect_err("should fail");
        match err.current_context() {
            FilterError::InvalidPattern { pattern, list } => {
                assert_eq!(pattern, "(unclosed");
                assert_eq!(*list, PatternList::Exclude);
            }
        }

        let err = FilterRule::compile(&["[z-a]"], &[]).expect_err("should fail");
        assert_eq!(
            err.current_context().to_string(),
            "Invalid include pattern `[z-a]`"
        );
    }

    #[test]
    fn compiling_twice_gives_identical_decisions() {
        let include = ["^volume_", "^aggr_"];
        let exclude = ["_used_by_snapshots$", "state"];
        let first = rule(&include, &exclude);
        let second = rule(&include, &exclude);
        for name in NAMES.iter().chain(["aggr_state", "volume_size_total"].iter()) {
            assert_eq!(first.accept(name), second.accept(name), "{name}");
        }
    }
}
