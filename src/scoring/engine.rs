//! Aggregates spectra into a per-line score table

use super::metrics::{dstar, ochiai, tarantula, EnsembleStrategy};
use crate::config::FaultmapConfig;
use crate::core::{LineStatistics, ScoreTable, Spectra, SuspiciousnessScore};
use crate::observability::{set_phase, RunPhase};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuspiciousnessEngine {
    strategy: EnsembleStrategy,
}

impl SuspiciousnessEngine {
    pub fn new(strategy: EnsembleStrategy) -> Self {
        Self { strategy }
    }

    pub fn from_config(config: &FaultmapConfig) -> Self {
        Self::new(config.scoring.ensemble)
    }

    pub fn strategy(&self) -> EnsembleStrategy {
        self.strategy
    }

    /// Count failing and passing coverage for every line in
    /// `1..=total_lines`. Line 0 and lines past the end are ignored.
    pub fn line_statistics(spectra: &Spectra, total_lines: usize) -> Vec<LineStatistics> {
        let mut stats = vec![LineStatistics::default(); total_lines];
        if total_lines == 0 {
            return stats;
        }
        for outcome in spectra {
            for &line in outcome.executed_lines.range(1..=total_lines) {
                let entry = &mut stats[line - 1];
                if outcome.passed {
                    entry.ncs += 1;
                } else {
                    entry.ncf += 1;
                }
            }
        }
        stats
    }

    /// Score every line of a target with `total_lines` lines.
    ///
    /// Degenerate inputs (no tests, no failing or no passing test) still
    /// produce a complete table; they are logged and reported through
    /// [`ScoreTable::degeneracy`].
    pub fn compute(&self, spectra: &Spectra, total_lines: usize) -> ScoreTable {
        let _phase = set_phase(RunPhase::Scoring);
        let nf = spectra.failing_count();
        let ns = spectra.passing_count();
        let stats = Self::line_statistics(spectra, total_lines);

        let mut scores: Vec<SuspiciousnessScore> = stats
            .par_iter()
            .map(|s| SuspiciousnessScore {
                tarantula: tarantula(s.ncf, s.ncs, nf, ns),
                ochiai: ochiai(s.ncf, s.ncs, nf, ns),
                dstar: dstar(s.ncf, s.ncs, nf, ns),
                ensemble: 0.0,
                ncf: s.ncf,
                ncs: s.ncs,
            })
            .collect();

        let max_dstar = scores.iter().map(|s| s.dstar).fold(0.0, f64::max);
        let strategy = self.strategy;
        scores.par_iter_mut().for_each(|s| {
            s.ensemble = strategy.combine(s.tarantula, s.ochiai, s.dstar, max_dstar);
        });

        let lines: BTreeMap<usize, SuspiciousnessScore> =
            scores.into_iter().enumerate().map(|(i, s)| (i + 1, s)).collect();
        let table = ScoreTable {
            nf,
            ns,
            total_lines,
            lines,
        };

        if let Some(degeneracy) = table.degeneracy() {
            warn!(nf, ns, "Degenerate spectra: {}", degeneracy);
        }
        debug!(nf, ns, total_lines, strategy = %strategy, "Computed suspiciousness");
        table
    }
}

/// Score with the default engine (mean ensemble).
pub fn compute_suspiciousness(spectra: &Spectra, total_lines: usize) -> ScoreTable {
    SuspiciousnessEngine::default().compute(spectra, total_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DegenerateInput, Metric, TestOutcome};
    use proptest::prelude::*;

    fn spectra(outcomes: Vec<TestOutcome>) -> Spectra {
        Spectra::from(outcomes)
    }

    #[test]
    fn test_counts_discard_out_of_range_lines() {
        let s = spectra(vec![
            TestOutcome::failing("t1", [0, 1, 2, 9], "AssertionError"),
            TestOutcome::passing("t2", [2, 3]),
        ]);
        let stats = SuspiciousnessEngine::line_statistics(&s, 3);

        assert_eq!(
            stats,
            vec![
                LineStatistics { ncf: 1, ncs: 0 },
                LineStatistics { ncf: 1, ncs: 1 },
                LineStatistics { ncf: 0, ncs: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_suite_gives_all_zero_table() {
        let table = compute_suspiciousness(&Spectra::new(), 4);

        assert_eq!((table.nf, table.ns), (0, 0));
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|(_, s)| *s == SuspiciousnessScore::default()));
        assert_eq!(table.degeneracy(), Some(DegenerateInput::NoTests));
    }

    #[test]
    fn test_failing_only_line_ranks_first() {
        let s = spectra(vec![
            TestOutcome::failing("fails", [1, 2], "AssertionError"),
            TestOutcome::passing("p1", [1]),
            TestOutcome::passing("p2", [1]),
            TestOutcome::passing("p3", [1, 3]),
        ]);
        let table = compute_suspiciousness(&s, 3);

        let line2 = table.get(2).unwrap();
        assert_eq!(line2.tarantula, 1.0);
        assert_eq!(line2.ochiai, 1.0);
        assert_eq!(table.ranked(Metric::Ensemble)[0].0, 2);
        assert_eq!(table.degeneracy(), None);
    }

    #[test]
    fn test_max_scaled_strategy_keeps_raw_dstar() {
        let s = spectra(vec![
            TestOutcome::failing("f1", [1, 2], "AssertionError"),
            TestOutcome::failing("f2", [1], "AssertionError"),
            TestOutcome::passing("p1", [2]),
        ]);
        let mean = SuspiciousnessEngine::default().compute(&s, 2);
        let scaled = SuspiciousnessEngine::new(EnsembleStrategy::MaxScaledDStar).compute(&s, 2);

        // Line 1: ncf=2, ncs=0, denominator 0, so dstar is 0.
        // Line 2: ncf=1, ncs=1, nf-ncf=1, dstar = 1/2.
        assert_eq!(scaled.get(2).unwrap().dstar, 0.5);
        assert_eq!(mean.get(2).unwrap().dstar, scaled.get(2).unwrap().dstar);
        let line2 = scaled.get(2).unwrap();
        let expected = (line2.tarantula + line2.ochiai + 1.0) / 3.0;
        assert!((line2.ensemble - expected).abs() < 1e-12);
    }

    fn arbitrary_spectra() -> impl Strategy<Value = (Spectra, usize)> {
        (1usize..30).prop_flat_map(|total| {
            let outcome = (prop::collection::btree_set(0usize..total + 5, 0..10), any::<bool>());
            (prop::collection::vec(outcome, 0..12), Just(total))
        })
        .prop_map(|(outcomes, total)| {
            let outcomes = outcomes
                .into_iter()
                .enumerate()
                .map(|(i, (lines, passed))| {
                    if passed {
                        TestOutcome::passing(format!("t{i}"), lines)
                    } else {
                        TestOutcome::failing(format!("t{i}"), lines, "failed")
                    }
                })
                .collect::<Vec<_>>();
            (Spectra::from(outcomes), total)
        })
    }

    proptest! {
        #[test]
        fn table_covers_every_line_with_valid_scores((s, total) in arbitrary_spectra()) {
            let table = compute_suspiciousness(&s, total);

            prop_assert_eq!(table.len(), total);
            prop_assert_eq!(table.nf + table.ns, s.len());
            for (line, score) in table.iter() {
                prop_assert!((1..=total).contains(&line));
                prop_assert!(score.ncf <= table.nf && score.ncs <= table.ns);
                prop_assert!((0.0..=1.0).contains(&score.tarantula));
                prop_assert!((0.0..=1.0).contains(&score.ochiai));
                prop_assert!(score.dstar.is_finite() && score.dstar >= 0.0);
                prop_assert!(!score.ensemble.is_nan());
                if score.ncf + score.ncs == 0 {
                    prop_assert_eq!(*score, SuspiciousnessScore::default());
                }
                if table.nf == 0 {
                    prop_assert_eq!(score.tarantula, 0.0);
                    prop_assert_eq!(score.ochiai, 0.0);
                }
            }
        }

        #[test]
        fn compute_is_idempotent((s, total) in arbitrary_spectra()) {
            let engine = SuspiciousnessEngine::new(EnsembleStrategy::MaxScaledDStar);
            prop_assert_eq!(engine.compute(&s, total), engine.compute(&s, total));
        }

        #[test]
        fn scoring_ignores_test_order((s, total) in arbitrary_spectra()) {
            let reversed: Spectra = s.iter().rev().cloned().collect();
            prop_assert_eq!(compute_suspiciousness(&s, total), compute_suspiciousness(&reversed, total));
        }
    }
}
