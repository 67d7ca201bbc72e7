use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Logical identity of a loaded source unit.
///
/// The line trace is scoped by this identity rather than by file path text,
/// so a target keeps the same identity wherever it is staged on disk. Dotted
/// names (`pkg.subject`) address nested modules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive an identity from a file name, dropping directories and extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dotted components, outermost first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|part| !part.is_empty())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModuleId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Observation of one test execution against one fresh target instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_id: String,
    pub executed_lines: BTreeSet<usize>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,
}

impl TestOutcome {
    pub fn passing(test_id: impl Into<String>, executed_lines: impl IntoIterator<Item = usize>) -> Self {
        Self {
            test_id: test_id.into(),
            executed_lines: executed_lines.into_iter().collect(),
            passed: true,
            failure_detail: None,
        }
    }

    pub fn failing(
        test_id: impl Into<String>,
        executed_lines: impl IntoIterator<Item = usize>,
        failure_detail: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            executed_lines: executed_lines.into_iter().collect(),
            passed: false,
            failure_detail: Some(failure_detail.into()),
        }
    }

    pub fn covers(&self, line: usize) -> bool {
        self.executed_lines.contains(&line)
    }
}

/// Ordered collection of test outcomes, one per supplied test, in
/// registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Spectra {
    outcomes: Vec<TestOutcome>,
}

impl Spectra {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: TestOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestOutcome> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// `nf`: number of failing tests
    pub fn failing_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed).count()
    }

    /// `ns`: number of passing tests
    pub fn passing_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn get(&self, test_id: &str) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|o| o.test_id == test_id)
    }
}

impl From<Vec<TestOutcome>> for Spectra {
    fn from(outcomes: Vec<TestOutcome>) -> Self {
        Self { outcomes }
    }
}

impl FromIterator<TestOutcome> for Spectra {
    fn from_iter<I: IntoIterator<Item = TestOutcome>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Spectra {
    type Item = &'a TestOutcome;
    type IntoIter = std::slice::Iter<'a, TestOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Per-line coverage counts derived from spectra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatistics {
    /// Failing tests that executed the line
    pub ncf: usize,
    /// Passing tests that executed the line
    pub ncs: usize,
}

/// Suspiciousness of one line under every formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousnessScore {
    pub tarantula: f64,
    pub ochiai: f64,
    pub dstar: f64,
    pub ensemble: f64,
    pub ncf: usize,
    pub ncs: usize,
}

impl SuspiciousnessScore {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Tarantula => self.tarantula,
            Metric::Ochiai => self.ochiai,
            Metric::DStar => self.dstar,
            Metric::Ensemble => self.ensemble,
        }
    }
}

/// Selects one score column, e.g. for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Tarantula,
    Ochiai,
    DStar,
    Ensemble,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tarantula => write!(f, "tarantula"),
            Self::Ochiai => write!(f, "ochiai"),
            Self::DStar => write!(f, "dstar"),
            Self::Ensemble => write!(f, "ensemble"),
        }
    }
}

/// Inputs that carry no usable fault signal. Reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateInput {
    NoTests,
    NoFailingTests,
    NoPassingTests,
}

impl fmt::Display for DegenerateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTests => write!(f, "no tests were run"),
            Self::NoFailingTests => write!(f, "no failing test; there is no fault signal"),
            Self::NoPassingTests => write!(f, "no passing test; every covered line looks alike"),
        }
    }
}

/// Complete per-line score table for lines `1..=total_lines`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub nf: usize,
    pub ns: usize,
    pub total_lines: usize,
    pub lines: BTreeMap<usize, SuspiciousnessScore>,
}

impl ScoreTable {
    pub fn get(&self, line: usize) -> Option<&SuspiciousnessScore> {
        self.lines.get(&line)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SuspiciousnessScore)> {
        self.lines.iter().map(|(line, score)| (*line, score))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn degeneracy(&self) -> Option<DegenerateInput> {
        match (self.nf, self.ns) {
            (0, 0) => Some(DegenerateInput::NoTests),
            (0, _) => Some(DegenerateInput::NoFailingTests),
            (_, 0) => Some(DegenerateInput::NoPassingTests),
            _ => None,
        }
    }

    /// Every line, most suspicious first. Ties keep ascending line order.
    pub fn ranked(&self, metric: Metric) -> Vec<(usize, &SuspiciousnessScore)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|(la, a), (lb, b)| {
            b.value(metric)
                .total_cmp(&a.value(metric))
                .then_with(|| la.cmp(lb))
        });
        ranked
    }

    /// The `limit` most suspicious lines with a non-zero score.
    pub fn top(&self, metric: Metric, limit: usize) -> Vec<(usize, &SuspiciousnessScore)> {
        self.ranked(metric)
            .into_iter()
            .filter(|(_, score)| score.value(metric) > 0.0)
            .take(limit)
            .collect()
    }

    pub fn to_json(&self) -> crate::core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
