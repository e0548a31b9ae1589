// LogWatch - core/pattern.rs
//
// Compiled error-pattern set.
// Core layer: pure logic, no I/O.
//
// A pattern starting with `^` is a case-insensitive regex; anything else is
// an escaped, case-insensitive substring. The literal/regex decision is made
// once here and never re-inspected per line.

use crate::core::model::PatternSpec;
use crate::util::constants::{MAX_REGEX_PATTERN_LENGTH, REGEX_PATTERN_PREFIX};
use crate::util::error::PatternError;
use regex::{Regex, RegexBuilder};

/// How a pattern's raw string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Literal,
    Regex,
}

/// One compiled pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub title: String,
    /// The configured string; used as the pattern's identifier.
    pub raw: String,
    pub kind: PatternKind,
    matcher: Regex,
}

impl Pattern {
    /// Compile a single pattern string.
    pub fn compile(spec: &PatternSpec) -> Result<Self, PatternError> {
        let raw = spec.pattern.as_str();
        if raw.len() > MAX_REGEX_PATTERN_LENGTH {
            return Err(PatternError::TooLong {
                length: raw.len(),
                max_length: MAX_REGEX_PATTERN_LENGTH,
            });
        }

        let (kind, source) = if raw.starts_with(REGEX_PATTERN_PREFIX) {
            (PatternKind::Regex, raw.to_string())
        } else {
            (PatternKind::Literal, regex::escape(raw))
        };

        let matcher = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| PatternError::InvalidRegex {
                pattern: raw.to_string(),
                source: e,
            })?;

        Ok(Self {
            title: spec.title.clone(),
            raw: raw.to_string(),
            kind,
            matcher,
        })
    }

    /// Returns true if the pattern occurs anywhere in `line`.
    pub fn is_match(&self, line: &str) -> bool {
        self.matcher.is_match(line)
    }
}

/// Ordered collection of compiled patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile every non-empty pattern, failing on the first invalid one.
    pub fn compile(specs: &[PatternSpec]) -> Result<Self, PatternError> {
        let patterns = specs
            .iter()
            .filter(|spec| !spec.pattern.is_empty())
            .map(Pattern::compile)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = patterns.len(), "Pattern set compiled");
        Ok(Self { patterns })
    }

    /// Compile bare pattern strings (titles derived from the text).
    pub fn from_strings<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let specs: Vec<PatternSpec> = patterns
            .iter()
            .map(|p| PatternSpec::new(p.as_ref()))
            .collect();
        Self::compile(&specs)
    }

    /// The built-in default patterns.
    pub fn default_set() -> Self {
        // Defaults are plain words; `test_default_set` guards them.
        Self::compile(&PatternSpec::defaults()).expect("built-in default patterns")
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Count how many patterns match `line` (each pattern counts at most
    /// once regardless of occurrences) and list their raw strings in
    /// configured order.
    pub fn count_matches(&self, line: &str) -> (usize, Vec<String>) {
        let matched: Vec<String> = self
            .patterns
            .iter()
            .filter(|p| p.is_match(line))
            .map(|p| p.raw.clone())
            .collect();
        (matched.len(), matched)
    }
}
